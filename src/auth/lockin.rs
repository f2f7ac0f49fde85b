use std::sync::Arc;

use axum::{debug_handler, extract::{Query, State}, response::{IntoResponse, Redirect}};
use oauth2::{AuthorizationCode, CsrfToken, PkceCodeVerifier, TokenResponse};
use serde::Deserialize;
use serde_json::Value;
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::{
    config::Config,
    db::{self, SignIn},
    session::{self, sanitize_return_url, CSRF_STATE, PKCE_VERIFIER, RETURN_URL},
    AppResult, AppState, GetField, Rejection,
};

use super::{clients::USERINFO_URL, Clients};

#[derive(Deserialize)]
pub struct LockinQuery {
    pub state: Option<String>,
    pub code: Option<String>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn lockin(
    Query(LockinQuery { state, code }): Query<LockinQuery>,
    State(db_pool): State<SqlitePool>,
    State(clients): State<Clients>,
    State(config): State<Arc<Config>>,
    session: Session,
) -> AppResult<impl IntoResponse> {
    let state = CsrfToken::new(state.ok_or_else(|| Rejection::BadRequest("OAuth: without state".into()))?);
    let code = AuthorizationCode::new(code.ok_or_else(|| Rejection::BadRequest("OAuth: without code".into()))?);

    let Some(stored_state) = session.remove::<String>(CSRF_STATE).await? else {
        return Err(Rejection::BadRequest("no csrf_state".into()))?;
    };

    if state.secret().as_str() != stored_state.as_str() {
        return Err(Rejection::BadRequest("csrf tokens don't match".into()))?;
    }

    let Some(pkce_verifier) = session.remove::<String>(PKCE_VERIFIER).await? else {
        return Err(Rejection::BadRequest("no pkce_verifier".into()))?;
    };

    let token_result = clients.google()?
        .exchange_code(code)
        .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier))
        .request_async(&clients.http)
        .await?;

    let access_token = token_result.access_token().secret();
    let body: Value = clients.http.get(USERINFO_URL)
        .bearer_auth(access_token)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let sub = body.get_str_field("sub")?;
    let email = body.get_str_field("email")?.to_lowercase();
    let verified = body.get("email_verified").and_then(Value::as_bool).unwrap_or(false);

    if !verified || !config.is_allowed_email(&email) {
        tracing::info!("refusing sign-in from {email}");
        return Err(Rejection::Forbidden)?;
    }
    if db::is_blocked(&db_pool, &email).await? {
        tracing::info!("refusing sign-in from blocked {email}");
        return Err(Rejection::Blocked)?;
    }

    let name = body.get_str_field("name").unwrap_or_default();
    let picture = body.get_str_field("picture").ok();
    let user = db::upsert_user(&db_pool, SignIn {
        google_sub: Some(&sub),
        email: &email,
        name: &name,
        picture: picture.as_deref(),
    }).await?;

    let return_url = session.remove::<String>(RETURN_URL).await?;
    session::sign_in(&session, &user.id).await?;

    tracing::info!("welcome {} ({})", user.email, user.id);

    Ok(Redirect::to(&sanitize_return_url(return_url)))
}
