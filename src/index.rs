use axum::{debug_handler, extract::State, response::{Html, IntoResponse, Redirect, Response}};
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::{db, include_res, session::USER_ID, AppResult};

#[debug_handler(state = crate::AppState)]
pub async fn index(
    State(db_pool): State<SqlitePool>,
    session: Session
) -> AppResult<Response> {
    let Some(user_id) = session.get::<String>(USER_ID).await? else {
        return Ok(
            Redirect::to("/login")
                .into_response()
        );
    };

    let Some(user) = db::find_summary(&db_pool, &user_id).await? else {
        session.flush().await?;
        return Ok(Redirect::to("/login").into_response());
    };

    Ok(
        Html(
            include_res!(str, "/pages/index.html")
                .replace("{name}", &escape_html(&user.name))
        ).into_response()
    )
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
