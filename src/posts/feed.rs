use std::sync::Arc;

use axum::{debug_handler, extract::{Path, Query, State}, http::StatusCode, Json};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{
    config::Config,
    db::{self, new_id, now_millis},
    session::require_user,
    AppResult, Rejection,
};

use super::{check_content, find_post, PostRow, PostView, POST_SELECT};

#[derive(Deserialize)]
pub(crate) struct FeedQuery {
    before: Option<Uuid>,
    limit: Option<i64>,
    author: Option<Uuid>,
}

#[derive(Deserialize)]
pub(crate) struct NewPost {
    content: String,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn list_posts(
    Query(FeedQuery { before, limit, author }): Query<FeedQuery>,
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Json<Vec<PostView>>> {
    let viewer = require_user(&session, &db_pool).await?;

    let posts = sqlx::query_as::<_, PostRow>(&format!(
        "{POST_SELECT}
         WHERE (?2 IS NULL OR p.id < ?2)
         AND (?3 IS NULL OR p.author_id=?3)
         AND u.email NOT IN (SELECT email FROM blocked_users)
         ORDER BY p.id DESC LIMIT ?4"
    ))
    .bind(&viewer.id)
    .bind(before.map(|b| b.to_string()))
    .bind(author.map(|a| a.to_string()))
    .bind(db::page_limit(limit, 20, 50))
    .fetch_all(&db_pool)
    .await?;

    Ok(Json(posts.into_iter().map(PostView::from).collect()))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn create_post(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Json(NewPost { content }): Json<NewPost>,
) -> AppResult<(StatusCode, Json<PostView>)> {
    let author = require_user(&session, &db_pool).await?;
    let content = check_content(&content, 5000, "post")?;

    let id = new_id();
    sqlx::query("INSERT INTO posts (id,author_id,content,created_at) VALUES (?,?,?,?)")
        .bind(&id)
        .bind(&author.id)
        .bind(&content)
        .bind(now_millis())
        .execute(&db_pool)
        .await?;

    let post = find_post(&db_pool, &author.id, &id)
        .await?
        .ok_or(Rejection::NotFound("post"))?;
    Ok((StatusCode::CREATED, Json(post)))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn get_post(
    Path(post_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Json<PostView>> {
    let viewer = require_user(&session, &db_pool).await?;
    let post = find_post(&db_pool, &viewer.id, &post_id.to_string())
        .await?
        .ok_or(Rejection::NotFound("post"))?;
    Ok(Json(post))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn delete_post(
    Path(post_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
    State(config): State<Arc<Config>>,
    session: Session,
) -> AppResult<StatusCode> {
    let user = require_user(&session, &db_pool).await?;
    let post_id = post_id.to_string();

    let Some((author_id,)): Option<(String,)> = sqlx::query_as("SELECT author_id FROM posts WHERE id=?")
        .bind(&post_id)
        .fetch_optional(&db_pool)
        .await?
    else {
        return Err(Rejection::NotFound("post"))?;
    };

    if author_id != user.id && !config.is_admin(&user.email) {
        return Err(Rejection::Forbidden)?;
    }

    let mut tx = db_pool.begin().await?;
    for table in ["likes", "comments"] {
        sqlx::query(&format!("DELETE FROM {table} WHERE post_id=?"))
            .bind(&post_id)
            .execute(&mut *tx)
            .await?;
    }
    sqlx::query("DELETE FROM posts WHERE id=?")
        .bind(&post_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!("{} deleted post {post_id}", user.email);
    Ok(StatusCode::NO_CONTENT)
}
