use axum::{debug_handler, extract::{Path, State}, Json};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{appresult::bad_request, db::{self, User}, session::require_user, AppResult, Rejection};

#[derive(Serialize)]
pub(crate) struct Profile {
    #[serde(flatten)]
    user: User,
    post_count: i64,
    is_blocked: bool,
}

#[derive(Deserialize)]
pub(crate) struct UpdateProfile {
    name: Option<String>,
    bio: Option<String>,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn me(
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Json<User>> {
    Ok(Json(require_user(&session, &db_pool).await?))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn update_me(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Json(UpdateProfile { name, bio }): Json<UpdateProfile>,
) -> AppResult<Json<User>> {
    let user = require_user(&session, &db_pool).await?;

    let name = match name.as_deref().map(str::trim) {
        Some(name) if name.is_empty() || name.chars().count() > 80 => {
            return Err(bad_request("name must be 1 to 80 characters"));
        }
        Some(name) => name.to_owned(),
        None => user.name,
    };
    let bio = match bio {
        Some(bio) if bio.chars().count() > 500 => {
            return Err(bad_request("bio must be at most 500 characters"));
        }
        Some(bio) => bio,
        None => user.bio,
    };

    sqlx::query("UPDATE users SET name=?,bio=? WHERE id=?")
        .bind(&name)
        .bind(&bio)
        .bind(&user.id)
        .execute(&db_pool)
        .await?;

    let updated = db::find_user(&db_pool, &user.id)
        .await?
        .ok_or(Rejection::NotFound("user"))?;
    Ok(Json(updated))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn profile(
    Path(user_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Json<Profile>> {
    require_user(&session, &db_pool).await?;

    let Some(user) = db::find_user(&db_pool, &user_id.to_string()).await? else {
        return Err(Rejection::NotFound("user"))?;
    };

    let (post_count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts WHERE author_id=?")
        .bind(&user.id)
        .fetch_one(&db_pool)
        .await?;
    let is_blocked = db::is_blocked(&db_pool, &user.email).await?;

    Ok(Json(Profile { user, post_count, is_blocked }))
}
