use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::broadcast;

use crate::model::UserContext;

pub const NOTIFICATIONS_TOPIC: &str = "/topic/notifications";
pub const GREETINGS_TOPIC: &str = "/topic/greetings";
pub const PRIVATE_QUEUE: &str = "/user/queue/private";

/// What a session writes to its socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub destination: String,
    pub payload: serde_json::Value,
}

/// An envelope on the hub, optionally addressed to a single user.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub recipient: Option<String>,
    pub envelope: Envelope,
}

impl Delivery {
    pub fn is_for(&self, username: &str) -> bool {
        match &self.recipient {
            Some(recipient) => recipient == username,
            None => true,
        }
    }
}

/// Frames a client may send over the socket.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientFrame {
    Hello { name: String },
    PrivateMessage { recipient: String, content: String },
}

/// Fan-out point for realtime notifications. Every session subscribes to the
/// same broadcast channel and drops deliveries addressed to someone else.
#[derive(Debug, Clone)]
pub struct NotificationHub {
    sender: broadcast::Sender<Delivery>,
}

impl NotificationHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Delivery> {
        self.sender.subscribe()
    }

    fn send(&self, delivery: Delivery) {
        // An error only means nobody is connected right now.
        if self.sender.send(delivery).is_err() {
            log::debug!("No realtime subscribers connected");
        }
    }

    pub fn publish(&self, destination: &str, payload: serde_json::Value) {
        self.send(Delivery {
            recipient: None,
            envelope: Envelope {
                destination: destination.to_string(),
                payload,
            },
        });
    }

    pub fn send_to_user(&self, username: &str, destination: &str, payload: serde_json::Value) {
        self.send(Delivery {
            recipient: Some(username.to_string()),
            envelope: Envelope {
                destination: destination.to_string(),
                payload,
            },
        });
    }

    pub fn user_joined(&self, username: &str) {
        log::info!("Realtime session opened for {}", username);
        self.publish(
            NOTIFICATIONS_TOPIC,
            json!({"from": "SYSTEM", "message": format!("User {} joined the chat", username)}),
        );
    }

    pub fn user_left(&self, username: &str) {
        log::info!("Realtime session closed for {}", username);
        self.publish(
            NOTIFICATIONS_TOPIC,
            json!({"from": "SYSTEM", "message": format!("User {} left the chat", username)}),
        );
    }

    pub fn handle_frame(&self, sender: &UserContext, frame: ClientFrame) {
        match frame {
            ClientFrame::Hello { name } => {
                self.publish(GREETINGS_TOPIC, json!({"content": format!("Hello, {}!", name)}));
            }
            ClientFrame::PrivateMessage { recipient, content } => {
                log::debug!("Private message from {} to {}", sender.username, recipient);
                self.send_to_user(
                    &recipient,
                    PRIVATE_QUEUE,
                    json!({"sender": sender.username, "recipient": recipient, "content": content}),
                );
            }
        }
    }
}
