mod profile;
mod search;

use axum::{routing::get, Router};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(search::search))
        .route("/me", get(profile::me).patch(profile::update_me))
        .route("/{id}", get(profile::profile))
}
