mod comments;
mod feed;
mod likes;

use axum::{routing::{get, post, delete}, Router};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

use crate::{db::UserSummary, markdown, AppResult, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(feed::list_posts).post(feed::create_post))
        .route("/{id}", get(feed::get_post).delete(feed::delete_post))
        .route("/{id}/like", post(likes::like).delete(likes::unlike))
        .route("/{id}/comments", get(comments::list_comments).post(comments::create_comment))
        .route("/{id}/comments/{comment_id}", delete(comments::delete_comment))
}

#[derive(FromRow)]
struct PostRow {
    id: String,
    content: String,
    created_at: i64,
    author_id: String,
    author_name: String,
    author_picture: Option<String>,
    author_department: Option<String>,
    like_count: i64,
    comment_count: i64,
    liked_by_me: bool,
}

#[derive(Debug, Serialize)]
pub struct PostView {
    pub id: String,
    pub author: UserSummary,
    pub content: String,
    pub content_html: String,
    pub created_at: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub liked_by_me: bool,
}

impl From<PostRow> for PostView {
    fn from(row: PostRow) -> Self {
        PostView {
            content_html: markdown::render(&row.content),
            id: row.id,
            author: UserSummary {
                id: row.author_id,
                name: row.author_name,
                picture: row.author_picture,
                department: row.author_department,
            },
            content: row.content,
            created_at: row.created_at,
            like_count: row.like_count,
            comment_count: row.comment_count,
            liked_by_me: row.liked_by_me,
        }
    }
}

/// `?1` is bound to the viewer's user id.
const POST_SELECT: &str = "SELECT p.id,p.content,p.created_at,
    u.id AS author_id,u.name AS author_name,u.picture AS author_picture,u.department AS author_department,
    (SELECT COUNT(*) FROM likes l WHERE l.post_id=p.id) AS like_count,
    (SELECT COUNT(*) FROM comments c WHERE c.post_id=p.id) AS comment_count,
    EXISTS(SELECT 1 FROM likes l WHERE l.post_id=p.id AND l.user_id=?1) AS liked_by_me
    FROM posts p JOIN users u ON u.id=p.author_id";

pub(crate) async fn find_post(db_pool: &SqlitePool, viewer_id: &str, post_id: &str) -> AppResult<Option<PostView>> {
    Ok(
        sqlx::query_as::<_, PostRow>(&format!("{POST_SELECT} WHERE p.id=?2"))
            .bind(viewer_id)
            .bind(post_id)
            .fetch_optional(db_pool)
            .await?
            .map(PostView::from)
    )
}

pub(crate) fn check_content(content: &str, max: usize, what: &str) -> AppResult<String> {
    let content = content.trim();
    if content.is_empty() || content.chars().count() > max {
        return Err(crate::appresult::bad_request(format!("{what} must be 1 to {max} characters")));
    }
    Ok(content.to_owned())
}
