mod blocked;
mod test_logins;

use axum::{routing::{get, delete}, Router};

use crate::AppState;

pub use test_logins::{create_test_login, TestLogin};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/blocked", get(blocked::list_blocked).post(blocked::block))
        .route("/blocked/{email}", delete(blocked::unblock))
        .route("/test-logins", get(test_logins::list_test_logins).post(test_logins::new_test_login))
        .route("/test-logins/{email}", delete(test_logins::delete_test_login))
}
