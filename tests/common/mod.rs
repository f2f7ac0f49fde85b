#![allow(dead_code)]

use std::net::SocketAddr;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use iitconnect::{admin::create_test_login, app, config::Config, db, AppState};
use serde_json::Value;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, client::IntoClientRequest, http::HeaderValue},
    MaybeTlsStream, WebSocketStream,
};
use tower::ServiceExt;

pub type Socket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

pub const ADMIN: &str = "admin@iitd.ac.in";
pub const PASSWORD: &str = "correct horse";

pub struct TestApp {
    pub router: Router,
    pub db_pool: SqlitePool,
}

pub struct Response {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub async fn new() -> Self {
        let db_pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        db::migrate(&db_pool).await.unwrap();

        let config = Config {
            admin_emails: vec![ADMIN.to_owned()],
            ..Config::default()
        };
        let state = AppState::new(config, db_pool.clone()).unwrap();
        let router = app(state).unwrap();

        TestApp { router, db_pool }
    }

    /// Sets up a test login for `email` and signs in with it. Returns the
    /// session cookie.
    pub async fn login(&self, email: &str, name: &str) -> String {
        create_test_login(&self.db_pool, email, name, PASSWORD, "tests").await.unwrap();
        let resp = self
            .send(Method::POST, "/auth/test-login", None, Some(serde_json::json!({
                "email": email,
                "password": PASSWORD,
            })))
            .await;
        assert_eq!(resp.status, StatusCode::OK, "{}", resp.body);
        cookie_from(&resp)
    }

    /// Serves the router on a local port, for clients that need a real
    /// connection.
    pub async fn serve(&self) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = self.router.clone();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        addr
    }

    pub async fn get(&self, uri: &str, cookie: &str) -> Response {
        self.send(Method::GET, uri, Some(cookie), None).await
    }

    pub async fn post(&self, uri: &str, cookie: &str, body: Value) -> Response {
        self.send(Method::POST, uri, Some(cookie), Some(body)).await
    }

    pub async fn patch(&self, uri: &str, cookie: &str, body: Value) -> Response {
        self.send(Method::PATCH, uri, Some(cookie), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, cookie: &str) -> Response {
        self.send(Method::DELETE, uri, Some(cookie), None).await
    }

    pub async fn send(&self, method: Method, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Response {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            req = req.header(header::COOKIE, cookie);
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };

        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        Response { status, headers, body }
    }
}

pub fn cookie_from(resp: &Response) -> String {
    resp.headers
        .get(header::SET_COOKIE)
        .expect("session cookie")
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_owned()
}

pub async fn connect_ws(addr: SocketAddr, chat_id: &str, cookie: &str) -> Result<Socket, tungstenite::Error> {
    let mut req = format!("ws://{addr}/api/chats/{chat_id}/ws").into_client_request()?;
    req.headers_mut().insert("cookie", HeaderValue::from_str(cookie).unwrap());
    let (socket, _) = connect_async(req).await?;
    Ok(socket)
}
