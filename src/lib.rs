pub mod admin;
pub mod appresult;
pub mod auth;
pub mod chats;
pub mod config;
pub mod db;
pub mod entry;
pub mod index;
pub mod markdown;
pub mod posts;
pub mod res;
pub mod session;
pub mod users;

use std::sync::Arc;

use axum::{
    extract::FromRef,
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    routing::get,
    Router,
};
use serde_json::Value;
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer};

pub use appresult::{AppError, AppResult, Rejection};
use chats::ChatEvent;
use config::Config;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub clients: auth::Clients,
    pub config: Arc<Config>,
    pub tx: broadcast::Sender<ChatEvent>,
}

impl AppState {
    pub fn new(config: Config, db_pool: SqlitePool) -> AppResult<Self> {
        Ok(AppState {
            clients: auth::Clients::from_config(&config)?,
            config: Arc::new(config),
            db_pool,
            tx: broadcast::channel(256).0,
        })
    }
}

pub trait GetField {
    fn get_str_field(&self, field: &str) -> AppResult<String>;
}

impl GetField for Value {
    fn get_str_field(&self, field: &str) -> AppResult<String> {
        Ok(
            self.get(field)
            .ok_or_else(|| anyhow::anyhow!("expected {field} in response"))?
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("expected {field} in response to be a string"))?
            .to_owned()
        )
    }
}

pub fn app(state: AppState) -> AppResult<Router> {
    let config = state.config.clone();

    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(config.secure_cookies)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::days(config.session_days)));

    let api = Router::new()
        .nest("/users", users::router())
        .nest("/posts", posts::router())
        .nest("/chats", chats::router())
        .nest("/admin", admin::router());

    let mut app = Router::new()
        .route("/", get(index::index))
        .merge(auth::router())
        .nest("/api", api)
        .with_state(state)
        .layer(session_layer);

    if let Some(origin) = &config.frontend_origin {
        let cors = CorsLayer::new()
            .allow_origin(HeaderValue::from_str(origin)?)
            .allow_credentials(true)
            .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
            .allow_headers([CONTENT_TYPE]);
        app = app.layer(cors);
    }

    Ok(app.layer(TraceLayer::new_for_http()))
}
