mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::{connect_ws, Socket, TestApp, ADMIN};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

async fn user_id(app: &TestApp, cookie: &str) -> String {
    app.get("/api/users/me", cookie).await.body["id"].as_str().unwrap().to_owned()
}

/// The next pushed event, or `None` once the server closes the socket (or
/// stays quiet for too long).
async fn next_event(socket: &mut Socket) -> Option<Value> {
    loop {
        match timeout(Duration::from_secs(5), socket.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => return Some(serde_json::from_str(&text).unwrap()),
            Ok(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => continue,
            _ => return None,
        }
    }
}

async fn send_frame(socket: &mut Socket, text: &str) {
    socket.send(Message::Text(text.into())).await.unwrap();
}

#[tokio::test]
async fn only_members_can_connect() {
    let app = TestApp::new().await;
    let asha = app.login("cs1200123@iitd.ac.in", "Asha").await;
    let ravi = app.login("ee1210001@iitd.ac.in", "Ravi").await;
    let meera = app.login("me1220042@iitd.ac.in", "Meera").await;
    let ravi_id = user_id(&app, &ravi).await;

    let chat = app.post("/api/chats/direct", &asha, json!({ "user_id": ravi_id })).await;
    let chat_id = chat.body["id"].as_str().unwrap().to_owned();
    let addr = app.serve().await;

    assert!(connect_ws(addr, &chat_id, &meera).await.is_err());
    assert!(connect_ws(addr, &chat_id, "id=nonsense").await.is_err());
    assert!(connect_ws(addr, &chat_id, &ravi).await.is_ok());
}

#[tokio::test]
async fn frames_are_stored_and_pushed_to_the_chat_only() {
    let app = TestApp::new().await;
    let asha = app.login("cs1200123@iitd.ac.in", "Asha").await;
    let ravi = app.login("ee1210001@iitd.ac.in", "Ravi").await;
    let meera = app.login("me1220042@iitd.ac.in", "Meera").await;
    let ravi_id = user_id(&app, &ravi).await;
    let meera_id = user_id(&app, &meera).await;

    let with_ravi = app.post("/api/chats/direct", &asha, json!({ "user_id": ravi_id })).await;
    let chat_id = with_ravi.body["id"].as_str().unwrap().to_owned();
    let with_meera = app.post("/api/chats/direct", &asha, json!({ "user_id": meera_id })).await;
    let other_chat_id = with_meera.body["id"].as_str().unwrap().to_owned();

    let addr = app.serve().await;
    let mut ravi_socket = connect_ws(addr, &chat_id, &ravi).await.unwrap();
    let mut asha_socket = connect_ws(addr, &chat_id, &asha).await.unwrap();

    send_frame(&mut asha_socket, "not json").await;
    send_frame(&mut asha_socket, r#"{"content": "   "}"#).await;
    let elsewhere = app
        .post(&format!("/api/chats/{other_chat_id}/messages"), &asha, json!({ "content": "elsewhere" }))
        .await;
    assert_eq!(elsewhere.status, StatusCode::CREATED);
    send_frame(&mut asha_socket, r#"{"content": "over the socket"}"#).await;

    let event = next_event(&mut ravi_socket).await.expect("a message event");
    assert_eq!(event["type"], "message");
    assert_eq!(event["chat_id"], chat_id.as_str());
    assert_eq!(event["message"]["content"], "over the socket");
    assert_eq!(event["message"]["sender"]["name"], "Asha");

    let stored = app.get(&format!("/api/chats/{chat_id}/messages"), &ravi).await;
    let stored = stored.body.as_array().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0]["id"], event["message"]["id"]);
}

#[tokio::test]
async fn removed_member_stops_receiving() {
    let app = TestApp::new().await;
    let asha = app.login("cs1200123@iitd.ac.in", "Asha").await;
    let ravi = app.login("ee1210001@iitd.ac.in", "Ravi").await;
    let ravi_id = user_id(&app, &ravi).await;

    let group = app
        .post("/api/chats/group", &asha, json!({ "name": "hostel", "member_ids": [ravi_id] }))
        .await;
    let chat_id = group.body["id"].as_str().unwrap().to_owned();

    let addr = app.serve().await;
    let mut ravi_socket = connect_ws(addr, &chat_id, &ravi).await.unwrap();

    let before = app
        .post(&format!("/api/chats/{chat_id}/messages"), &asha, json!({ "content": "welcome" }))
        .await;
    assert_eq!(before.status, StatusCode::CREATED);
    assert_eq!(next_event(&mut ravi_socket).await.unwrap()["message"]["content"], "welcome");

    let kick = app.delete(&format!("/api/chats/{chat_id}/members/{ravi_id}"), &asha).await;
    assert_eq!(kick.status, StatusCode::NO_CONTENT);
    app.post(&format!("/api/chats/{chat_id}/messages"), &asha, json!({ "content": "secret after kick" }))
        .await;

    assert_eq!(next_event(&mut ravi_socket).await, None);
}

#[tokio::test]
async fn blocked_member_stops_receiving() {
    let app = TestApp::new().await;
    let admin = app.login(ADMIN, "Admin").await;
    let asha = app.login("cs1200123@iitd.ac.in", "Asha").await;
    let ravi = app.login("ee1210001@iitd.ac.in", "Ravi").await;
    let ravi_id = user_id(&app, &ravi).await;

    let chat = app.post("/api/chats/direct", &asha, json!({ "user_id": ravi_id })).await;
    let chat_id = chat.body["id"].as_str().unwrap().to_owned();

    let addr = app.serve().await;
    let mut ravi_socket = connect_ws(addr, &chat_id, &ravi).await.unwrap();

    let block = app
        .post("/api/admin/blocked", &admin, json!({ "email": "ee1210001@iitd.ac.in" }))
        .await;
    assert_eq!(block.status, StatusCode::CREATED);
    app.post(&format!("/api/chats/{chat_id}/messages"), &asha, json!({ "content": "after the block" }))
        .await;

    assert_eq!(next_event(&mut ravi_socket).await, None);
}
