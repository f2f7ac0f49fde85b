use axum::{debug_handler, extract::{Path, State}, http::StatusCode, Json};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{
    appresult::bad_request,
    db::{self, now_millis},
    session::require_user,
    AppResult, Rejection,
};

use super::require_member;

#[derive(Deserialize)]
pub(crate) struct AddMember {
    user_id: Uuid,
}

async fn is_group(db_pool: &SqlitePool, chat_id: &str) -> AppResult<bool> {
    let (is_group,): (bool,) = sqlx::query_as("SELECT is_group FROM chats WHERE id=?")
        .bind(chat_id)
        .fetch_one(db_pool)
        .await?;
    Ok(is_group)
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn add_member(
    Path(chat_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
    session: Session,
    Json(AddMember { user_id }): Json<AddMember>,
) -> AppResult<StatusCode> {
    let user = require_user(&session, &db_pool).await?;
    let chat_id = chat_id.to_string();
    let role = require_member(&db_pool, &chat_id, &user.id).await?;

    if !is_group(&db_pool, &chat_id).await? {
        return Err(bad_request("direct chats have fixed members"));
    }
    if role != "admin" {
        return Err(Rejection::Forbidden)?;
    }

    let user_id = user_id.to_string();
    if db::find_summary(&db_pool, &user_id).await?.is_none() {
        return Err(Rejection::NotFound("user"))?;
    }

    sqlx::query("INSERT OR IGNORE INTO chat_members (chat_id,user_id,role,joined_at) VALUES (?,?,'member',?)")
        .bind(&chat_id)
        .bind(&user_id)
        .bind(now_millis())
        .execute(&db_pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Admins may remove anyone; everyone may leave. A group left without an
/// admin hands the role to its longest-standing member.
#[debug_handler(state = crate::AppState)]
pub(crate) async fn remove_member(
    Path((chat_id, member_id)): Path<(Uuid, Uuid)>,
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<StatusCode> {
    let user = require_user(&session, &db_pool).await?;
    let chat_id = chat_id.to_string();
    let member_id = member_id.to_string();
    let role = require_member(&db_pool, &chat_id, &user.id).await?;

    if !is_group(&db_pool, &chat_id).await? {
        return Err(bad_request("direct chats have fixed members"));
    }
    if member_id != user.id && role != "admin" {
        return Err(Rejection::Forbidden)?;
    }

    let mut tx = db_pool.begin().await?;
    let removed = sqlx::query("DELETE FROM chat_members WHERE chat_id=? AND user_id=?")
        .bind(&chat_id)
        .bind(&member_id)
        .execute(&mut *tx)
        .await?;
    if removed.rows_affected() == 0 {
        return Err(Rejection::NotFound("member"))?;
    }
    sqlx::query("DELETE FROM message_reads WHERE chat_id=? AND user_id=?")
        .bind(&chat_id)
        .bind(&member_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        "UPDATE chat_members SET role='admin'
         WHERE chat_id=?1 AND NOT EXISTS (SELECT 1 FROM chat_members WHERE chat_id=?1 AND role='admin')
         AND user_id=(SELECT user_id FROM chat_members WHERE chat_id=?1 ORDER BY joined_at, user_id LIMIT 1)",
    )
    .bind(&chat_id)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}
