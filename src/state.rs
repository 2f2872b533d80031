use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::rate_limit::LoginRateLimiter;
use crate::suggestion::Suggester;
use crate::upload::ImageStore;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub images: ImageStore,
    pub suggester: Suggester,
    pub login_limiter: LoginRateLimiter,
}
