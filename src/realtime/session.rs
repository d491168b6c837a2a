use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;

use crate::model::UserContext;
use crate::realtime::hub::{ClientFrame, NotificationHub};

/// Drives one socket until either side goes away: client frames are handed
/// to the hub, hub deliveries addressed to this user are written back.
pub async fn run_session(socket: WebSocket, hub: NotificationHub, user: UserContext) {
    let (mut sink, mut stream) = socket.split();
    let mut deliveries = hub.subscribe();
    hub.user_joined(&user.username);

    loop {
        tokio::select! {
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientFrame>(&text) {
                    Ok(frame) => hub.handle_frame(&user, frame),
                    Err(e) => log::warn!("Ignoring malformed frame from {}: {}", user.username, e),
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    log::debug!("Socket error for {}: {}", user.username, e);
                    break;
                }
            },
            delivery = deliveries.recv() => match delivery {
                Ok(delivery) if delivery.is_for(&user.username) => {
                    let text = match serde_json::to_string(&delivery.envelope) {
                        Ok(text) => text,
                        Err(e) => {
                            log::error!("Failed to encode envelope: {}", e);
                            continue;
                        }
                    };
                    if sink.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("Session for {} skipped {} notification(s)", user.username, skipped);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    hub.user_left(&user.username);
}
