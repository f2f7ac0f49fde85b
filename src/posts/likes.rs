use axum::{debug_handler, extract::{Path, State}, Json};
use serde::Serialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{db::now_millis, session::require_user, AppResult, Rejection};

#[derive(Debug, Serialize)]
pub(crate) struct LikeState {
    like_count: i64,
    liked: bool,
}

async fn ensure_post(db_pool: &SqlitePool, post_id: &str) -> AppResult<()> {
    if sqlx::query("SELECT 1 FROM posts WHERE id=?")
        .bind(post_id)
        .fetch_optional(db_pool)
        .await?
        .is_none() {
        return Err(Rejection::NotFound("post"))?;
    }
    Ok(())
}

async fn like_state(db_pool: &SqlitePool, post_id: &str, user_id: &str) -> AppResult<LikeState> {
    let (like_count, liked): (i64, bool) = sqlx::query_as(
        "SELECT COUNT(*), COALESCE(SUM(user_id=?), 0) > 0 FROM likes WHERE post_id=?",
    )
    .bind(user_id)
    .bind(post_id)
    .fetch_one(db_pool)
    .await?;
    Ok(LikeState { like_count, liked })
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn like(
    Path(post_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Json<LikeState>> {
    let user = require_user(&session, &db_pool).await?;
    let post_id = post_id.to_string();
    ensure_post(&db_pool, &post_id).await?;

    sqlx::query("INSERT OR IGNORE INTO likes (post_id,user_id,created_at) VALUES (?,?,?)")
        .bind(&post_id)
        .bind(&user.id)
        .bind(now_millis())
        .execute(&db_pool)
        .await?;

    Ok(Json(like_state(&db_pool, &post_id, &user.id).await?))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn unlike(
    Path(post_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Json<LikeState>> {
    let user = require_user(&session, &db_pool).await?;
    let post_id = post_id.to_string();
    ensure_post(&db_pool, &post_id).await?;

    sqlx::query("DELETE FROM likes WHERE post_id=? AND user_id=?")
        .bind(&post_id)
        .bind(&user.id)
        .execute(&db_pool)
        .await?;

    Ok(Json(like_state(&db_pool, &post_id, &user.id).await?))
}
