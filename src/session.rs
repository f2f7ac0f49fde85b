use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::{
    config::Config,
    db::{self, User},
    AppResult, Rejection,
};

pub const CSRF_STATE: &str = "csrf_state";
pub const PKCE_VERIFIER: &str = "pkce_verifier";
pub const RETURN_URL: &str = "return_url";
pub const USER_ID: &str = "user_id";

/// Loads the signed-in user. Blocked accounts are signed out on the spot.
pub async fn require_user(session: &Session, db_pool: &SqlitePool) -> AppResult<User> {
    let Some(user_id) = session.get::<String>(USER_ID).await? else {
        return Err(Rejection::Unauthorized)?;
    };

    let Some(user) = db::find_user(db_pool, &user_id).await? else {
        session.flush().await?;
        return Err(Rejection::Unauthorized)?;
    };

    if db::is_blocked(db_pool, &user.email).await? {
        tracing::info!("signing out blocked user {}", user.email);
        session.flush().await?;
        return Err(Rejection::Blocked)?;
    }

    Ok(user)
}

pub async fn require_admin(session: &Session, db_pool: &SqlitePool, config: &Config) -> AppResult<User> {
    let user = require_user(session, db_pool).await?;
    if !config.is_admin(&user.email) {
        return Err(Rejection::Forbidden)?;
    }
    Ok(user)
}

/// Marks the session as belonging to `user_id`, under a fresh session id.
pub async fn sign_in(session: &Session, user_id: &str) -> AppResult<()> {
    session.cycle_id().await?;
    session.insert(USER_ID, user_id).await?;
    Ok(())
}

/// Only same-site absolute paths are followed after login/logout.
pub fn sanitize_return_url(return_url: Option<String>) -> String {
    match return_url {
        Some(url) if url.starts_with('/') && !url.starts_with("//") && !url.starts_with("/\\") => url,
        _ => "/".to_owned(),
    }
}
