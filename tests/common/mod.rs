use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tempfile::TempDir;
use uuid::Uuid;

use motormart::config::{AdminSeed, Config};
use motormart::suggestion::{VisionError, VisionModel};
use motormart::upload::ImageStore;

pub const ADMIN_EMAIL: &str = "admin@motormart.test";
pub const ADMIN_PASSWORD: &str = "admin-password";
pub const PASSWORD: &str = "password123";

/// Smallest byte string the upload sniffer accepts as a PNG.
pub const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];

/// Vision model stand-in for the suggestion endpoint.
pub enum FakeVision {
    Reply(&'static str),
    Fail,
    Hang,
}

#[async_trait]
impl VisionModel for FakeVision {
    fn name(&self) -> &str {
        "fake"
    }

    async fn describe(
        &self,
        _prompt: &str,
        _image: Bytes,
        _mime_type: &'static str,
    ) -> Result<String, VisionError> {
        match self {
            FakeVision::Reply(reply) => Ok(reply.to_string()),
            FakeVision::Fail => Err(VisionError::Upstream("HTTP 503".to_string())),
            FakeVision::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok("{}".to_string())
            }
        }
    }
}

/// A running test server instance with a dedicated test database.
pub struct TestApp {
    pub addr: SocketAddr,
    pub pool: PgPool,
    pub client: Client,
    pub db_name: String,
    pub uploads: TempDir,
    pub temp: TempDir,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn register(&self, name: &str, email: &str, role: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url("/api/v1/auth/register"))
            .json(&json!({ "name": name, "email": email, "password": PASSWORD, "role": role }))
            .send()
            .await
            .expect("register request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn login(&self, email: &str, password: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url("/api/v1/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("login request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Register and return the token.
    pub async fn register_token(&self, name: &str, email: &str, role: &str) -> String {
        let (body, status) = self.register(name, email, role).await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        body["data"]["token"].as_str().unwrap().to_string()
    }

    pub async fn admin_token(&self) -> String {
        let (body, status) = self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;
        assert_eq!(status, StatusCode::OK, "admin login failed: {body}");
        body["data"]["token"].as_str().unwrap().to_string()
    }

    /// Register an agent, create its agency and have the admin approve it.
    /// Returns `(agent token, agency id)`.
    pub async fn approved_agent(&self, email: &str, agency_name: &str) -> (String, String) {
        let token = self.register_token("Agent", email, "agent").await;
        let agency_id = self.create_agency(&token, agency_name).await;

        let admin = self.admin_token().await;
        let (body, status) = self
            .put_auth(
                &format!("/api/v1/admin/agencies/{agency_id}/status"),
                &admin,
                &json!({ "status": "approved" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "approve failed: {body}");

        (token, agency_id)
    }

    /// Create a pending agency handling both vehicle and transaction types.
    pub async fn create_agency(&self, token: &str, name: &str) -> String {
        let (body, status) = self
            .post_auth(
                "/api/v1/agencies",
                token,
                &json!({
                    "name": name,
                    "city": "Sfax",
                    "phone": "+216 74 000 000",
                    "vehicle_types": ["car", "motorcycle"],
                    "transaction_types": ["sale", "rental"],
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create agency failed: {body}");
        body["data"]["id"].as_str().unwrap().to_string()
    }

    pub async fn create_car(&self, token: &str, overrides: Value) -> (Value, StatusCode) {
        let mut body = car_body();
        merge(&mut body, overrides);
        self.post_auth("/api/v1/cars", token, &body).await
    }

    /// Build a multipart form from text fields plus `count` PNG files under `file_field`.
    pub fn multipart(fields: &Value, file_field: &str, count: usize) -> Form {
        let mut form = Form::new();
        if let Some(obj) = fields.as_object() {
            for (key, value) in obj {
                let text = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                form = form.text(key.clone(), text);
            }
        }
        for i in 0..count {
            let part = Part::bytes(PNG.to_vec())
                .file_name(format!("photo-{i}.png"))
                .mime_str("image/png")
                .unwrap();
            form = form.part(file_field.to_string(), part);
        }
        form
    }

    pub async fn post_multipart(&self, path: &str, token: &str, form: Form) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .expect("multipart post failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn put_multipart(&self, path: &str, token: &str, form: Form) -> (Value, StatusCode) {
        let resp = self
            .client
            .put(self.url(path))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .expect("multipart put failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Path on disk of an image served at `url`.
    pub fn image_path(&self, url: &str) -> std::path::PathBuf {
        ImageStore::new(self.uploads.path(), self.temp.path())
            .path_for_url(url)
            .expect("image url outside upload dir")
    }

    pub async fn get(&self, path: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("get request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn get_auth(&self, path: &str, token: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("get request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn post_auth(&self, path: &str, token: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("post request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn put_auth(&self, path: &str, token: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .put(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("put request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn delete_auth(&self, path: &str, token: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .delete(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("delete request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }
}

pub fn car_body() -> Value {
    json!({
        "brand": "Toyota",
        "model": "Corolla",
        "year": 2019,
        "condition": "used",
        "transaction_type": "sale",
        "price": 18500,
        "mileage": 64000,
        "fuel_type": "petrol",
        "category": "sedan",
    })
}

pub fn motorcycle_body() -> Value {
    json!({
        "brand": "Yamaha",
        "model": "MT-07",
        "year": 2022,
        "condition": "used",
        "transaction_type": "sale",
        "price": 7200,
        "displacement": 689,
        "category": "naked",
    })
}

pub fn merge(base: &mut Value, overrides: Value) {
    if let (Some(base), Value::Object(overrides)) = (base.as_object_mut(), overrides) {
        for (key, value) in overrides {
            base.insert(key, value);
        }
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(Arc::new(FakeVision::Fail), 45).await
}

/// Spawn a test app with a fresh temporary database and upload directory.
pub async fn spawn_app_with(vision: Arc<dyn VisionModel>, suggestion_timeout_secs: u64) -> TestApp {
    let _ = dotenvy::dotenv();

    let base_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let db_name = format!("motormart_test_{}", Uuid::now_v7().simple());

    let admin_url = base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/postgres"))
        .unwrap_or_else(|| base_url.clone());

    let admin_pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&admin_url)
        .await
        .expect("Failed to connect to postgres for test DB creation");

    sqlx::query(&format!("CREATE DATABASE \"{db_name}\""))
        .execute(&admin_pool)
        .await
        .expect("Failed to create test database");

    admin_pool.close().await;

    let test_url = base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/{db_name}"))
        .unwrap_or_else(|| base_url.clone());

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&test_url)
        .await
        .expect("Failed to connect to test database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations on test database");

    let uploads = tempfile::tempdir().expect("Failed to create upload dir");
    let temp = tempfile::tempdir().expect("Failed to create temp dir");
    ImageStore::new(uploads.path(), temp.path())
        .ensure_dirs()
        .await
        .expect("Failed to create upload subdirs");

    let config = Config {
        database_url: test_url,
        jwt_secret: "test-jwt-secret-that-is-long-enough".to_string(),
        jwt_expiry_hours: 1,
        host: "127.0.0.1".parse().unwrap(),
        port: 0,
        log_level: "warn".to_string(),
        upload_dir: uploads.path().to_path_buf(),
        temp_dir: temp.path().to_path_buf(),
        max_image_size: 5 * 1024 * 1024,
        max_body_size: 25 * 1024 * 1024,
        cors_origins: vec![],
        suggestion_timeout_secs,
        gemini: None,
        admin_seed: Some(AdminSeed {
            email: ADMIN_EMAIL.to_string(),
            password: ADMIN_PASSWORD.to_string(),
            name: "Admin".to_string(),
        }),
    };

    motormart::bootstrap_admin(&pool, &config)
        .await
        .expect("Failed to seed admin");

    let app = motormart::build_app_with_vision(pool.clone(), config, vision);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });

    let client = Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    TestApp {
        addr,
        pool,
        client,
        db_name,
        uploads,
        temp,
    }
}

/// Drop the test database after tests complete.
pub async fn cleanup(app: TestApp) {
    let db_name = app.db_name.clone();
    app.pool.close().await;

    let base_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");
    let admin_url = base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/postgres"))
        .unwrap_or_else(|| base_url.clone());

    let admin_pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&admin_url)
        .await
        .expect("Failed to connect for cleanup");

    let _ = sqlx::query(&format!("DROP DATABASE IF EXISTS \"{db_name}\" WITH (FORCE)"))
        .execute(&admin_pool)
        .await;

    admin_pool.close().await;
}
