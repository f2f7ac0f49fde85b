use std::sync::Arc;

use axum::{debug_handler, extract::{Path, State}, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use tower_sessions::Session;

use crate::{
    appresult::bad_request,
    auth::{hash_password, new_salt},
    config::Config,
    db::now_millis,
    session::require_admin,
    AppResult, Rejection,
};

#[derive(Debug, Serialize, FromRow)]
pub struct TestLogin {
    pub email: String,
    pub name: String,
    pub created_by: String,
    pub created_at: i64,
}

#[derive(Deserialize)]
pub(crate) struct NewTestLogin {
    email: String,
    name: String,
    password: String,
}

/// Registers a password login. Fails with a conflict if `email` already has one.
pub async fn create_test_login(
    db_pool: &SqlitePool,
    email: &str,
    name: &str,
    password: &str,
    created_by: &str,
) -> AppResult<TestLogin> {
    let email = email.trim().to_lowercase();
    let name = name.trim();
    if !email.contains('@') {
        return Err(bad_request("not an email address"));
    }
    if name.is_empty() {
        return Err(bad_request("name is required"));
    }
    if password.chars().count() < 8 {
        return Err(bad_request("password must be at least 8 characters"));
    }

    let salt = new_salt();
    let inserted = sqlx::query(
        "INSERT OR IGNORE INTO test_logins (email,name,salt,password_hash,created_by,created_at) VALUES (?,?,?,?,?,?)",
    )
    .bind(&email)
    .bind(name)
    .bind(&salt)
    .bind(hash_password(&salt, password))
    .bind(created_by)
    .bind(now_millis())
    .execute(db_pool)
    .await?;
    if inserted.rows_affected() == 0 {
        return Err(Rejection::Conflict(format!("{email} already has a test login")))?;
    }

    tracing::info!("{created_by} added test login {email}");
    Ok(
        sqlx::query_as::<_, TestLogin>("SELECT email,name,created_by,created_at FROM test_logins WHERE email=?")
            .bind(&email)
            .fetch_one(db_pool)
            .await?
    )
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn list_test_logins(
    State(db_pool): State<SqlitePool>,
    State(config): State<Arc<Config>>,
    session: Session,
) -> AppResult<Json<Vec<TestLogin>>> {
    require_admin(&session, &db_pool, &config).await?;

    let logins = sqlx::query_as::<_, TestLogin>(
        "SELECT email,name,created_by,created_at FROM test_logins ORDER BY created_at DESC",
    )
    .fetch_all(&db_pool)
    .await?;
    Ok(Json(logins))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn new_test_login(
    State(db_pool): State<SqlitePool>,
    State(config): State<Arc<Config>>,
    session: Session,
    Json(NewTestLogin { email, name, password }): Json<NewTestLogin>,
) -> AppResult<(StatusCode, Json<TestLogin>)> {
    let admin = require_admin(&session, &db_pool, &config).await?;
    let login = create_test_login(&db_pool, &email, &name, &password, &admin.email).await?;
    Ok((StatusCode::CREATED, Json(login)))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn delete_test_login(
    Path(email): Path<String>,
    State(db_pool): State<SqlitePool>,
    State(config): State<Arc<Config>>,
    session: Session,
) -> AppResult<StatusCode> {
    let admin = require_admin(&session, &db_pool, &config).await?;
    let email = email.trim().to_lowercase();

    let removed = sqlx::query("DELETE FROM test_logins WHERE email=?")
        .bind(&email)
        .execute(&db_pool)
        .await?;
    if removed.rows_affected() == 0 {
        return Err(Rejection::NotFound("test login"))?;
    }

    tracing::info!("{} removed test login {email}", admin.email);
    Ok(StatusCode::NO_CONTENT)
}
