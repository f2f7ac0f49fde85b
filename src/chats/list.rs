use axum::{debug_handler, extract::{Path, State}, Json};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use tower_sessions::Session;
use uuid::Uuid;

use crate::{session::require_user, AppResult};

use super::{members, require_member, Member};

#[derive(FromRow)]
struct ChatRow {
    id: String,
    name: Option<String>,
    is_group: bool,
    created_at: i64,
    last_content: Option<String>,
    last_sender_id: Option<String>,
    last_at: Option<i64>,
    unread_count: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct LastMessage {
    content: String,
    sender_id: String,
    created_at: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatView {
    id: String,
    name: Option<String>,
    is_group: bool,
    created_at: i64,
    members: Vec<Member>,
    last_message: Option<LastMessage>,
    unread_count: i64,
}

/// `?1` is the viewer. Unread counts only other people's messages after the
/// viewer's read marker. Message ids are UUIDv7, so they sort by creation.
const CHAT_SELECT: &str = "WITH latest AS (
        SELECT m.chat_id, m.content, m.sender_id, m.created_at,
               ROW_NUMBER() OVER (PARTITION BY m.chat_id ORDER BY m.created_at DESC, m.id DESC) AS rn
        FROM messages m
    )
    SELECT c.id, c.name, c.is_group, c.created_at,
        l.content AS last_content, l.sender_id AS last_sender_id, l.created_at AS last_at,
        (SELECT COUNT(*) FROM messages m
            WHERE m.chat_id=c.id AND m.sender_id<>?1
            AND m.id > COALESCE(
                (SELECT r.last_read_id FROM message_reads r WHERE r.chat_id=c.id AND r.user_id=?1), '')
        ) AS unread_count
    FROM chats c
    JOIN chat_members cm ON cm.chat_id=c.id AND cm.user_id=?1
    LEFT JOIN latest l ON l.chat_id=c.id AND l.rn=1";

async fn into_view(db_pool: &SqlitePool, row: ChatRow) -> AppResult<ChatView> {
    let last_message = match (row.last_content, row.last_sender_id, row.last_at) {
        (Some(content), Some(sender_id), Some(created_at)) => Some(LastMessage { content, sender_id, created_at }),
        _ => None,
    };

    Ok(ChatView {
        members: members(db_pool, &row.id).await?,
        id: row.id,
        name: row.name,
        is_group: row.is_group,
        created_at: row.created_at,
        last_message,
        unread_count: row.unread_count,
    })
}

pub(crate) async fn find_chat(db_pool: &SqlitePool, viewer_id: &str, chat_id: &str) -> AppResult<Option<ChatView>> {
    let row = sqlx::query_as::<_, ChatRow>(&format!("{CHAT_SELECT} WHERE c.id=?2"))
        .bind(viewer_id)
        .bind(chat_id)
        .fetch_optional(db_pool)
        .await?;

    match row {
        Some(row) => Ok(Some(into_view(db_pool, row).await?)),
        None => Ok(None),
    }
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn list_chats(
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Json<Vec<ChatView>>> {
    let user = require_user(&session, &db_pool).await?;

    let rows = sqlx::query_as::<_, ChatRow>(&format!(
        "{CHAT_SELECT} ORDER BY COALESCE(l.created_at, c.created_at) DESC, c.id DESC"
    ))
    .bind(&user.id)
    .fetch_all(&db_pool)
    .await?;

    let mut chats = Vec::with_capacity(rows.len());
    for row in rows {
        chats.push(into_view(&db_pool, row).await?);
    }
    Ok(Json(chats))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn get_chat(
    Path(chat_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Json<ChatView>> {
    let user = require_user(&session, &db_pool).await?;
    let chat_id = chat_id.to_string();
    require_member(&db_pool, &chat_id, &user.id).await?;

    let chat = find_chat(&db_pool, &user.id, &chat_id)
        .await?
        .ok_or(crate::Rejection::NotFound("chat"))?;
    Ok(Json(chat))
}
