mod clients;
mod login;
mod lockin;
mod logout;
mod test_login;

use axum::{routing::{get, post}, Router};

use crate::AppState;

pub use clients::Clients;
pub(crate) use test_login::{hash_password, new_salt};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login::login_page))
        .route("/login/google", get(login::login))
        .route("/lockin/google", get(lockin::lockin))
        .route("/logout", get(logout::logout))
        .route("/auth/test-login", post(test_login::test_login))
}
