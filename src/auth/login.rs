use axum::{debug_handler, extract::{Query, State}, response::{Html, IntoResponse, Redirect, Response}};
use oauth2::{CsrfToken, PkceCodeChallenge, Scope};
use serde::Deserialize;
use std::sync::Arc;
use tower_sessions::Session;

use crate::{config::Config, include_res, session::{sanitize_return_url, CSRF_STATE, PKCE_VERIFIER, RETURN_URL}, AppResult};

use super::Clients;

#[derive(Deserialize)]
pub(crate) struct LoginQuery {
    pub(crate) return_url: Option<String>,
}

#[debug_handler]
pub(crate) async fn login_page() -> impl IntoResponse {
    Html(include_res!(str, "/pages/login.html"))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn login(
    Query(LoginQuery { return_url }): Query<LoginQuery>,
    State(clients): State<Clients>,
    State(config): State<Arc<Config>>,
    session: Session,
) -> AppResult<Response> {
    let client = clients.google()?;

    let (pkce_code_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

    let (authorize_url, csrf_state) = client.authorize_url(CsrfToken::new_random)
        .add_scope(Scope::new("openid".to_string()))
        .add_scope(Scope::new("email".to_string()))
        .add_scope(Scope::new("profile".to_string()))
        .add_extra_param("hd", config.allowed_email_domain.clone())
        .set_pkce_challenge(pkce_code_challenge)
        .url();

    session.insert(CSRF_STATE, csrf_state.secret()).await?;
    session.insert(PKCE_VERIFIER, pkce_verifier.secret()).await?;
    session.insert(RETURN_URL, sanitize_return_url(return_url)).await?;

    Ok(Redirect::to(authorize_url.as_str()).into_response())
}
