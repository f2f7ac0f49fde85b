use axum::{debug_handler, extract::State, http::StatusCode, Json};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{
    appresult::bad_request,
    db::{self, new_id, now_millis},
    posts::check_content,
    session::require_user,
    AppResult, Rejection,
};

use super::list::{find_chat, ChatView};

#[derive(Debug, Deserialize)]
pub(crate) struct NewDirect {
    user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NewGroup {
    name: String,
    #[serde(default)]
    member_ids: Vec<Uuid>,
}

/// The one key a pair of users' direct chat is stored under, whoever starts it.
pub(crate) fn direct_key(a: &str, b: &str) -> String {
    if a < b { format!("{a}:{b}") } else { format!("{b}:{a}") }
}

/// Creates a chat with its members in one go. Returns `None` when a direct
/// chat for `direct_key` already exists, e.g. because the other user got
/// there first.
async fn create_chat(
    db_pool: &SqlitePool,
    name: Option<&str>,
    direct_key: Option<&str>,
    creator_id: &str,
    other_ids: &[String],
) -> AppResult<Option<String>> {
    let chat_id = new_id();
    let now = now_millis();
    let is_group = direct_key.is_none();

    let mut tx = db_pool.begin().await?;
    let created = sqlx::query(
        "INSERT OR IGNORE INTO chats (id,name,is_group,direct_key,created_by,created_at) VALUES (?,?,?,?,?,?)",
    )
    .bind(&chat_id)
    .bind(name)
    .bind(is_group)
    .bind(direct_key)
    .bind(creator_id)
    .bind(now)
    .execute(&mut *tx)
    .await?;
    if created.rows_affected() == 0 {
        return Ok(None);
    }

    let creator_role = if is_group { "admin" } else { "member" };
    sqlx::query("INSERT INTO chat_members (chat_id,user_id,role,joined_at) VALUES (?,?,?,?)")
        .bind(&chat_id)
        .bind(creator_id)
        .bind(creator_role)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    for user_id in other_ids {
        sqlx::query("INSERT OR IGNORE INTO chat_members (chat_id,user_id,role,joined_at) VALUES (?,?,'member',?)")
            .bind(&chat_id)
            .bind(user_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    Ok(Some(chat_id))
}

async fn find_direct(db_pool: &SqlitePool, key: &str) -> AppResult<Option<String>> {
    let chat: Option<(String,)> = sqlx::query_as("SELECT id FROM chats WHERE direct_key=?")
        .bind(key)
        .fetch_optional(db_pool)
        .await?;
    Ok(chat.map(|(id,)| id))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn new_direct(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Json(NewDirect { user_id }): Json<NewDirect>,
) -> AppResult<(StatusCode, Json<ChatView>)> {
    let user = require_user(&session, &db_pool).await?;
    let other_id = user_id.to_string();

    if other_id == user.id {
        return Err(bad_request("can't start a chat with yourself"));
    }
    let Some(other) = db::find_user(&db_pool, &other_id).await? else {
        return Err(Rejection::NotFound("user"))?;
    };
    if db::is_blocked(&db_pool, &other.email).await? {
        return Err(Rejection::Forbidden)?;
    }

    let key = direct_key(&user.id, &other.id);
    let (status, chat_id) = match find_direct(&db_pool, &key).await? {
        Some(chat_id) => (StatusCode::OK, chat_id),
        None => match create_chat(&db_pool, None, Some(&key), &user.id, &[other.id]).await? {
            Some(chat_id) => (StatusCode::CREATED, chat_id),
            None => {
                let chat_id = find_direct(&db_pool, &key).await?.ok_or(Rejection::NotFound("chat"))?;
                (StatusCode::OK, chat_id)
            }
        },
    };

    let chat = find_chat(&db_pool, &user.id, &chat_id)
        .await?
        .ok_or(Rejection::NotFound("chat"))?;
    Ok((status, Json(chat)))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn new_group(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Json(NewGroup { name, member_ids }): Json<NewGroup>,
) -> AppResult<(StatusCode, Json<ChatView>)> {
    let user = require_user(&session, &db_pool).await?;
    let name = check_content(&name, 80, "group name")?;

    let mut others = Vec::with_capacity(member_ids.len());
    for member_id in member_ids {
        let member_id = member_id.to_string();
        if member_id == user.id || others.contains(&member_id) {
            continue;
        }
        if db::find_summary(&db_pool, &member_id).await?.is_none() {
            return Err(Rejection::NotFound("user"))?;
        }
        others.push(member_id);
    }

    let chat_id = create_chat(&db_pool, Some(&name), None, &user.id, &others)
        .await?
        .ok_or_else(|| anyhow::anyhow!("group chat insert was ignored"))?;
    tracing::info!("{} created group {chat_id} ({name})", user.email);

    let chat = find_chat(&db_pool, &user.id, &chat_id)
        .await?
        .ok_or(Rejection::NotFound("chat"))?;
    Ok((StatusCode::CREATED, Json(chat)))
}
