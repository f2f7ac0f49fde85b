use axum::{debug_handler, extract::{Path, Query, State}, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use tokio::sync::broadcast;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{
    appresult::bad_request,
    db::{self, new_id, now_millis, UserSummary},
    markdown,
    posts::check_content,
    session::require_user,
    AppResult, AppState,
};

use super::{require_member, ChatEvent};

#[derive(Deserialize)]
pub(crate) struct SendMessage {
    pub(crate) content: String,
    pub(crate) reply_to_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub(crate) struct PageQuery {
    before: Option<Uuid>,
    limit: Option<i64>,
}

#[derive(FromRow)]
struct MessageRow {
    id: String,
    chat_id: String,
    content: String,
    created_at: i64,
    sender_id: String,
    sender_name: String,
    sender_picture: Option<String>,
    sender_department: Option<String>,
    reply_to_id: Option<String>,
    reply_to_content: Option<String>,
    reply_to_sender: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplyPreview {
    pub id: String,
    pub content: String,
    pub sender_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageView {
    pub id: String,
    pub chat_id: String,
    pub sender: UserSummary,
    pub content: String,
    pub content_html: String,
    pub reply_to: Option<ReplyPreview>,
    pub created_at: i64,
}

impl From<MessageRow> for MessageView {
    fn from(row: MessageRow) -> Self {
        let reply_to = match (row.reply_to_id, row.reply_to_content, row.reply_to_sender) {
            (Some(id), Some(content), Some(sender_name)) => Some(ReplyPreview { id, content, sender_name }),
            _ => None,
        };

        MessageView {
            content_html: markdown::render(&row.content),
            id: row.id,
            chat_id: row.chat_id,
            sender: UserSummary {
                id: row.sender_id,
                name: row.sender_name,
                picture: row.sender_picture,
                department: row.sender_department,
            },
            content: row.content,
            reply_to,
            created_at: row.created_at,
        }
    }
}

const MESSAGE_SELECT: &str = "SELECT m.id,m.chat_id,m.content,m.created_at,
    u.id AS sender_id,u.name AS sender_name,u.picture AS sender_picture,u.department AS sender_department,
    r.id AS reply_to_id,r.content AS reply_to_content,ru.name AS reply_to_sender
    FROM messages m
    JOIN users u ON u.id=m.sender_id
    LEFT JOIN messages r ON r.id=m.reply_to_id
    LEFT JOIN users ru ON ru.id=r.sender_id";

/// Stores a message from `sender_id` (who must already be a member) and
/// announces it to the chat's websocket subscribers.
pub(crate) async fn send_msg(
    db_pool: &SqlitePool,
    tx: &broadcast::Sender<ChatEvent>,

    sender_id: &str,
    chat_id: &str,

    SendMessage { content, reply_to_id }: SendMessage,
) -> AppResult<MessageView> {
    let content = check_content(&content, 4000, "message")?;

    let reply_to_id = reply_to_id.map(|id| id.to_string());
    if let Some(reply_to_id) = &reply_to_id {
        if sqlx::query("SELECT 1 FROM messages WHERE id=? AND chat_id=?")
            .bind(reply_to_id)
            .bind(chat_id)
            .fetch_optional(db_pool)
            .await?
            .is_none() {
            return Err(bad_request("reply_to_id is not a message in this chat"));
        }
    }

    let id = new_id();
    let now = now_millis();
    sqlx::query("INSERT INTO messages (id,chat_id,sender_id,reply_to_id,content,created_at) VALUES (?,?,?,?,?,?)")
        .bind(&id)
        .bind(chat_id)
        .bind(sender_id)
        .bind(&reply_to_id)
        .bind(&content)
        .bind(now)
        .execute(db_pool)
        .await?;

    // Sending implies having read everything up to here.
    mark_read_up_to(db_pool, chat_id, sender_id, &id).await?;

    let message: MessageView = sqlx::query_as::<_, MessageRow>(&format!("{MESSAGE_SELECT} WHERE m.id=?"))
        .bind(&id)
        .fetch_one(db_pool)
        .await?
        .into();

    let _ = tx.send(ChatEvent::Message {
        chat_id: chat_id.to_owned(),
        message: message.clone(),
    });

    Ok(message)
}

async fn mark_read_up_to(db_pool: &SqlitePool, chat_id: &str, user_id: &str, message_id: &str) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO message_reads (chat_id,user_id,last_read_id) VALUES (?1,?2,?3)
         ON CONFLICT (chat_id,user_id) DO UPDATE SET last_read_id=MAX(last_read_id, excluded.last_read_id)",
    )
    .bind(chat_id)
    .bind(user_id)
    .bind(message_id)
    .execute(db_pool)
    .await?;
    Ok(())
}

#[debug_handler(state = AppState)]
pub(crate) async fn list_messages(
    Path(chat_id): Path<Uuid>,
    Query(PageQuery { before, limit }): Query<PageQuery>,
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Json<Vec<MessageView>>> {
    let user = require_user(&session, &db_pool).await?;
    let chat_id = chat_id.to_string();
    require_member(&db_pool, &chat_id, &user.id).await?;

    let mut rows = sqlx::query_as::<_, MessageRow>(&format!(
        "{MESSAGE_SELECT} WHERE m.chat_id=?1 AND (?2 IS NULL OR m.id < ?2)
         ORDER BY m.id DESC LIMIT ?3"
    ))
    .bind(&chat_id)
    .bind(before.map(|b| b.to_string()))
    .bind(db::page_limit(limit, 50, 100))
    .fetch_all(&db_pool)
    .await?;
    rows.reverse();

    Ok(Json(rows.into_iter().map(MessageView::from).collect()))
}

#[debug_handler(state = AppState)]
pub(crate) async fn post_message(
    Path(chat_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
    State(tx): State<broadcast::Sender<ChatEvent>>,
    session: Session,
    Json(msg): Json<SendMessage>,
) -> AppResult<(StatusCode, Json<MessageView>)> {
    let user = require_user(&session, &db_pool).await?;
    let chat_id = chat_id.to_string();
    require_member(&db_pool, &chat_id, &user.id).await?;

    let message = send_msg(&db_pool, &tx, &user.id, &chat_id, msg).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[debug_handler(state = AppState)]
pub(crate) async fn mark_read(
    Path(chat_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<StatusCode> {
    let user = require_user(&session, &db_pool).await?;
    let chat_id = chat_id.to_string();
    require_member(&db_pool, &chat_id, &user.id).await?;

    let (latest,): (Option<String>,) = sqlx::query_as("SELECT MAX(id) FROM messages WHERE chat_id=?")
        .bind(&chat_id)
        .fetch_one(&db_pool)
        .await?;
    if let Some(latest) = latest {
        mark_read_up_to(&db_pool, &chat_id, &user.id, &latest).await?;
    }

    Ok(StatusCode::NO_CONTENT)
}
