mod list;
mod members;
mod msg;
mod new;
mod ws;

use axum::{routing::{get, post, delete}, Router};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

use crate::{db::UserSummary, AppResult, AppState, Rejection};

pub use msg::MessageView;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list::list_chats))
        .route("/direct", post(new::new_direct))
        .route("/group", post(new::new_group))
        .route("/{id}", get(list::get_chat))
        .route("/{id}/members", post(members::add_member))
        .route("/{id}/members/{user_id}", delete(members::remove_member))
        .route("/{id}/messages", get(msg::list_messages).post(msg::post_message))
        .route("/{id}/read", post(msg::mark_read))
        .route("/{id}/ws", get(ws::chat_ws))
}

/// Pushed to websocket subscribers of a chat.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    Message {
        chat_id: String,
        message: MessageView,
    },
}

impl ChatEvent {
    pub fn chat_id(&self) -> &str {
        match self {
            ChatEvent::Message { chat_id, .. } => chat_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Member {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub user: UserSummary,
    pub role: String,
    pub joined_at: i64,
}

pub(crate) async fn members(db_pool: &SqlitePool, chat_id: &str) -> AppResult<Vec<Member>> {
    Ok(
        sqlx::query_as::<_, Member>(
            "SELECT u.id,u.name,u.picture,u.department,cm.role,cm.joined_at
             FROM chat_members cm JOIN users u ON u.id=cm.user_id
             WHERE cm.chat_id=? ORDER BY cm.joined_at, u.name",
        )
        .bind(chat_id)
        .fetch_all(db_pool)
        .await?
    )
}

pub(crate) async fn member_role(db_pool: &SqlitePool, chat_id: &str, user_id: &str) -> AppResult<Option<String>> {
    let role: Option<(String,)> = sqlx::query_as("SELECT role FROM chat_members WHERE chat_id=? AND user_id=?")
        .bind(chat_id)
        .bind(user_id)
        .fetch_optional(db_pool)
        .await?;
    Ok(role.map(|(role,)| role))
}

/// Non-members can't tell a chat exists.
pub(crate) async fn require_member(db_pool: &SqlitePool, chat_id: &str, user_id: &str) -> AppResult<String> {
    member_role(db_pool, chat_id, user_id)
        .await?
        .ok_or_else(|| Rejection::NotFound("chat").into())
}
