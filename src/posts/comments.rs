use std::sync::Arc;

use axum::{debug_handler, extract::{Path, State}, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use tower_sessions::Session;
use uuid::Uuid;

use crate::{
    config::Config,
    db::{new_id, now_millis, UserSummary},
    markdown,
    session::require_user,
    AppResult, Rejection,
};

use super::check_content;

#[derive(FromRow)]
struct CommentRow {
    id: String,
    post_id: String,
    content: String,
    created_at: i64,
    author_id: String,
    author_name: String,
    author_picture: Option<String>,
    author_department: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CommentView {
    id: String,
    post_id: String,
    author: UserSummary,
    content: String,
    content_html: String,
    created_at: i64,
}

impl From<CommentRow> for CommentView {
    fn from(row: CommentRow) -> Self {
        CommentView {
            content_html: markdown::render(&row.content),
            id: row.id,
            post_id: row.post_id,
            author: UserSummary {
                id: row.author_id,
                name: row.author_name,
                picture: row.author_picture,
                department: row.author_department,
            },
            content: row.content,
            created_at: row.created_at,
        }
    }
}

const COMMENT_SELECT: &str = "SELECT c.id,c.post_id,c.content,c.created_at,
    u.id AS author_id,u.name AS author_name,u.picture AS author_picture,u.department AS author_department
    FROM comments c JOIN users u ON u.id=c.author_id";

#[derive(Deserialize)]
pub(crate) struct NewComment {
    content: String,
}

async fn post_author(db_pool: &SqlitePool, post_id: &str) -> AppResult<String> {
    let Some((author_id,)): Option<(String,)> = sqlx::query_as("SELECT author_id FROM posts WHERE id=?")
        .bind(post_id)
        .fetch_optional(db_pool)
        .await?
    else {
        return Err(Rejection::NotFound("post"))?;
    };
    Ok(author_id)
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn list_comments(
    Path(post_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Json<Vec<CommentView>>> {
    require_user(&session, &db_pool).await?;
    let post_id = post_id.to_string();
    post_author(&db_pool, &post_id).await?;

    let comments = sqlx::query_as::<_, CommentRow>(&format!(
        "{COMMENT_SELECT} WHERE c.post_id=? ORDER BY c.created_at, c.id"
    ))
    .bind(&post_id)
    .fetch_all(&db_pool)
    .await?;

    Ok(Json(comments.into_iter().map(CommentView::from).collect()))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn create_comment(
    Path(post_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
    session: Session,
    Json(NewComment { content }): Json<NewComment>,
) -> AppResult<(StatusCode, Json<CommentView>)> {
    let user = require_user(&session, &db_pool).await?;
    let post_id = post_id.to_string();
    post_author(&db_pool, &post_id).await?;
    let content = check_content(&content, 1000, "comment")?;

    let id = new_id();
    sqlx::query("INSERT INTO comments (id,post_id,author_id,content,created_at) VALUES (?,?,?,?,?)")
        .bind(&id)
        .bind(&post_id)
        .bind(&user.id)
        .bind(&content)
        .bind(now_millis())
        .execute(&db_pool)
        .await?;

    let comment = sqlx::query_as::<_, CommentRow>(&format!("{COMMENT_SELECT} WHERE c.id=?"))
        .bind(&id)
        .fetch_one(&db_pool)
        .await?;
    Ok((StatusCode::CREATED, Json(comment.into())))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn delete_comment(
    Path((post_id, comment_id)): Path<(Uuid, Uuid)>,
    State(db_pool): State<SqlitePool>,
    State(config): State<Arc<Config>>,
    session: Session,
) -> AppResult<StatusCode> {
    let user = require_user(&session, &db_pool).await?;
    let post_id = post_id.to_string();
    let post_author_id = post_author(&db_pool, &post_id).await?;

    let Some((author_id,)): Option<(String,)> = sqlx::query_as("SELECT author_id FROM comments WHERE id=? AND post_id=?")
        .bind(comment_id.to_string())
        .bind(&post_id)
        .fetch_optional(&db_pool)
        .await?
    else {
        return Err(Rejection::NotFound("comment"))?;
    };

    if user.id != author_id && user.id != post_author_id && !config.is_admin(&user.email) {
        return Err(Rejection::Forbidden)?;
    }

    sqlx::query("DELETE FROM comments WHERE id=?")
        .bind(comment_id.to_string())
        .execute(&db_pool)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
