use axum::{debug_handler, extract::{ws::Message, Path, State, WebSocketUpgrade}, response::Response};
use futures_util::{SinkExt, StreamExt};
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{db, session::require_user, AppResult};

use super::{member_role, msg, ChatEvent};

/// Whether `user_id` may still see `chat_id`: a member whose email isn't blocked.
async fn still_allowed(db_pool: &SqlitePool, chat_id: &str, user_id: &str, email: &str) -> AppResult<bool> {
    Ok(member_role(db_pool, chat_id, user_id).await?.is_some() && !db::is_blocked(db_pool, email).await?)
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn chat_ws(
    Path(chat_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
    State(tx): State<broadcast::Sender<ChatEvent>>,
    session: Session,

    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let user = require_user(&session, &db_pool).await?;
    let chat_id = chat_id.to_string();
    super::require_member(&db_pool, &chat_id, &user.id).await?;

    // Subscribed before the upgrade completes, so nothing sent after the
    // handshake is missed.
    let mut rx = tx.subscribe();

    Ok(ws.on_upgrade(move |stream| async move {
        let (mut sender, mut receiver) = stream.split();

        let (watch_pool, watched, watcher, watcher_email) =
            (db_pool.clone(), chat_id.clone(), user.id.clone(), user.email.clone());
        let mut broadcast_task = tokio::spawn(async move {
            loop {
                let event = match rx.recv().await {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("websocket for chat {watched} skipped {skipped} events");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if event.chat_id() != watched {
                    continue;
                }

                match still_allowed(&watch_pool, &watched, &watcher, &watcher_email).await {
                    Ok(true) => {}
                    Ok(false) => {
                        tracing::info!("closing websocket of {watcher} for chat {watched}");
                        let _ = sender.send(Message::Close(None)).await;
                        break;
                    }
                    Err(e) => {
                        tracing::error!("websocket membership check failed: {:?}", e.0);
                        let _ = sender.send(Message::Close(None)).await;
                        break;
                    }
                }

                let Ok(text) = serde_json::to_string(&event) else {
                    continue;
                };
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        });

        let mut receive_task = tokio::spawn(async move {
            while let Some(Ok(frame)) = receiver.next().await {
                let Message::Text(text) = frame else {
                    continue;
                };
                let Ok(msg) = serde_json::from_str::<msg::SendMessage>(&text) else {
                    continue;
                };

                if !still_allowed(&db_pool, &chat_id, &user.id, &user.email).await.unwrap_or(false) {
                    break;
                }
                if let Err(e) = msg::send_msg(&db_pool, &tx, &user.id, &chat_id, msg).await {
                    tracing::debug!("dropping websocket message from {}: {:?}", user.id, e.0);
                }
            }
        });

        tokio::select! {
            _ = &mut broadcast_task => receive_task.abort(),
            _ = &mut receive_task => broadcast_task.abort(),
        };
    }))
}
