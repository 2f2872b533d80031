use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub upload_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub max_image_size: usize,
    pub max_body_size: usize,
    pub cors_origins: Vec<String>,
    pub suggestion_timeout_secs: u64,
    pub gemini: Option<GeminiConfig>,
    pub admin_seed: Option<AdminSeed>,
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

/// Credentials for the administrator account created at startup when missing.
#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
    pub name: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url = env_required("DATABASE_URL")?;
        let jwt_secret = env_required("JWT_SECRET")?;

        let jwt_expiry_hours: i64 = env_or("JWT_EXPIRY_HOURS", "24")
            .parse()
            .map_err(|e| format!("Invalid JWT_EXPIRY_HOURS: {e}"))?;
        if jwt_expiry_hours <= 0 {
            return Err("JWT_EXPIRY_HOURS must be positive".to_string());
        }

        let host: IpAddr = env_or("MOTORMART_HOST", "0.0.0.0")
            .parse()
            .map_err(|e| format!("Invalid MOTORMART_HOST: {e}"))?;

        let port: u16 = env_or("MOTORMART_PORT", "5000")
            .parse()
            .map_err(|e| format!("Invalid MOTORMART_PORT: {e}"))?;

        let log_level = env_or("MOTORMART_LOG_LEVEL", "info");
        let upload_dir = PathBuf::from(env_or("MOTORMART_UPLOAD_DIR", "uploads"));
        let temp_dir = std::env::var("MOTORMART_TEMP_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir().join("motormart"));
        if temp_dir.starts_with(&upload_dir) {
            return Err("MOTORMART_TEMP_DIR must not be inside MOTORMART_UPLOAD_DIR".to_string());
        }

        let max_image_size: usize = env_or("MOTORMART_MAX_IMAGE_SIZE", "5242880")
            .parse()
            .map_err(|e| format!("Invalid MOTORMART_MAX_IMAGE_SIZE: {e}"))?;

        let max_body_size: usize = env_or("MOTORMART_MAX_BODY_SIZE", "26214400")
            .parse()
            .map_err(|e| format!("Invalid MOTORMART_MAX_BODY_SIZE: {e}"))?;

        let cors_origins = parse_list(&env_or("MOTORMART_CORS_ORIGINS", ""));

        let suggestion_timeout_secs: u64 = env_or("MOTORMART_SUGGESTION_TIMEOUT_SECS", "45")
            .parse()
            .map_err(|e| format!("Invalid MOTORMART_SUGGESTION_TIMEOUT_SECS: {e}"))?;

        let gemini = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .map(|api_key| GeminiConfig {
                api_key,
                model: env_or("GEMINI_MODEL", "gemini-1.5-flash"),
                base_url: env_or(
                    "GEMINI_BASE_URL",
                    "https://generativelanguage.googleapis.com/v1beta",
                ),
            });

        let admin_seed = match (
            std::env::var("MOTORMART_ADMIN_EMAIL").ok(),
            std::env::var("MOTORMART_ADMIN_PASSWORD").ok(),
        ) {
            (Some(email), Some(password)) => Some(AdminSeed {
                email,
                password,
                name: env_or("MOTORMART_ADMIN_NAME", "Administrator"),
            }),
            _ => None,
        };

        Ok(Config {
            database_url,
            jwt_secret,
            jwt_expiry_hours,
            host,
            port,
            log_level,
            upload_dir,
            temp_dir,
            max_image_size,
            max_body_size,
            cors_origins,
            suggestion_timeout_secs,
            gemini,
            admin_seed,
        })
    }
}

fn env_required(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("Missing required environment variable: {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_list_skips_blank_entries() {
        assert_eq!(
            parse_list(" http://a.test, ,http://b.test,"),
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
        assert!(parse_list("").is_empty());
    }
}
