use axum::{debug_handler, extract::{Query, State}, Json};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::{db::{self, UserSummary}, session::require_user, AppResult};

#[derive(Deserialize)]
pub(crate) struct SearchQuery {
    q: Option<String>,
    limit: Option<i64>,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn search(
    Query(SearchQuery { q, limit }): Query<SearchQuery>,
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Json<Vec<UserSummary>>> {
    require_user(&session, &db_pool).await?;

    let needle = q.unwrap_or_default().trim().to_lowercase();
    let pattern = format!("%{}%", escape_like(&needle));

    let users = sqlx::query_as::<_, UserSummary>(
        "SELECT u.id,u.name,u.picture,u.department FROM users u
         WHERE (lower(u.name) LIKE ?1 ESCAPE '\\' OR u.email LIKE ?1 ESCAPE '\\')
         AND u.email NOT IN (SELECT email FROM blocked_users)
         ORDER BY u.name LIMIT ?2",
    )
    .bind(pattern)
    .bind(db::page_limit(limit, 20, 50))
    .fetch_all(&db_pool)
    .await?;

    Ok(Json(users))
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}
