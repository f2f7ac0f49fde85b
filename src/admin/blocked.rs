use std::sync::Arc;

use axum::{debug_handler, extract::{Path, State}, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use tower_sessions::Session;

use crate::{
    appresult::bad_request,
    config::Config,
    db::now_millis,
    session::require_admin,
    AppResult, Rejection,
};

#[derive(Debug, Serialize, FromRow)]
pub(crate) struct BlockedUser {
    email: String,
    reason: String,
    blocked_by: String,
    created_at: i64,
    user_id: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct BlockRequest {
    email: String,
    #[serde(default)]
    reason: String,
}

const BLOCKED_SELECT: &str = "SELECT b.email,b.reason,b.blocked_by,b.created_at,u.id AS user_id
    FROM blocked_users b LEFT JOIN users u ON u.email=b.email";

#[debug_handler(state = crate::AppState)]
pub(crate) async fn list_blocked(
    State(db_pool): State<SqlitePool>,
    State(config): State<Arc<Config>>,
    session: Session,
) -> AppResult<Json<Vec<BlockedUser>>> {
    require_admin(&session, &db_pool, &config).await?;

    let blocked = sqlx::query_as::<_, BlockedUser>(&format!("{BLOCKED_SELECT} ORDER BY b.created_at DESC"))
        .fetch_all(&db_pool)
        .await?;
    Ok(Json(blocked))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn block(
    State(db_pool): State<SqlitePool>,
    State(config): State<Arc<Config>>,
    session: Session,
    Json(BlockRequest { email, reason }): Json<BlockRequest>,
) -> AppResult<(StatusCode, Json<BlockedUser>)> {
    let admin = require_admin(&session, &db_pool, &config).await?;

    let email = email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(bad_request("not an email address"));
    }
    if email == admin.email {
        return Err(bad_request("admins can't block themselves"));
    }

    sqlx::query("INSERT OR IGNORE INTO blocked_users (email,reason,blocked_by,created_at) VALUES (?,?,?,?)")
        .bind(&email)
        .bind(reason.trim())
        .bind(&admin.email)
        .bind(now_millis())
        .execute(&db_pool)
        .await?;
    tracing::info!("{} blocked {email}", admin.email);

    let blocked = sqlx::query_as::<_, BlockedUser>(&format!("{BLOCKED_SELECT} WHERE b.email=?"))
        .bind(&email)
        .fetch_one(&db_pool)
        .await?;
    Ok((StatusCode::CREATED, Json(blocked)))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn unblock(
    Path(email): Path<String>,
    State(db_pool): State<SqlitePool>,
    State(config): State<Arc<Config>>,
    session: Session,
) -> AppResult<StatusCode> {
    let admin = require_admin(&session, &db_pool, &config).await?;
    let email = email.trim().to_lowercase();

    let removed = sqlx::query("DELETE FROM blocked_users WHERE email=?")
        .bind(&email)
        .execute(&db_pool)
        .await?;
    if removed.rows_affected() == 0 {
        return Err(Rejection::NotFound("blocked user"))?;
    }

    tracing::info!("{} unblocked {email}", admin.email);
    Ok(StatusCode::NO_CONTENT)
}
