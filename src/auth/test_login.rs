use axum::{debug_handler, extract::State, Json};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use subtle::ConstantTimeEq;
use tower_sessions::Session;

use crate::{
    db::{self, SignIn, User},
    session, AppResult, Rejection,
};

#[derive(Deserialize)]
pub(crate) struct TestLoginRequest {
    email: String,
    password: String,
}

pub(crate) fn new_salt() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

pub(crate) fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant-time check of `password` against a stored hash.
pub(crate) fn password_matches(salt: &str, password: &str, password_hash: &str) -> bool {
    hash_password(salt, password)
        .as_bytes()
        .ct_eq(password_hash.as_bytes())
        .into()
}

/// Password sign-in for accounts an admin has set up, e.g. for reviewers
/// without an institute mailbox.
#[debug_handler(state = crate::AppState)]
pub(crate) async fn test_login(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Json(TestLoginRequest { email, password }): Json<TestLoginRequest>,
) -> AppResult<Json<User>> {
    let email = email.trim().to_lowercase();

    let row: Option<(String, String, String)> =
        sqlx::query_as("SELECT name,salt,password_hash FROM test_logins WHERE email=?")
            .bind(&email)
            .fetch_optional(&db_pool)
            .await?;

    let Some((name, salt, password_hash)) = row else {
        return Err(Rejection::Unauthorized)?;
    };
    if !password_matches(&salt, &password, &password_hash) {
        tracing::info!("bad test-login password for {email}");
        return Err(Rejection::Unauthorized)?;
    }
    if db::is_blocked(&db_pool, &email).await? {
        return Err(Rejection::Blocked)?;
    }

    let user = db::upsert_user(&db_pool, SignIn {
        google_sub: None,
        email: &email,
        name: &name,
        picture: None,
    }).await?;
    session::sign_in(&session, &user.id).await?;

    tracing::info!("test login for {} ({})", user.email, user.id);
    Ok(Json(user))
}
