use std::sync::Arc;

use axum::{
    extract::{Query, State, WebSocketUpgrade},
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};

use crate::api::auth::{bearer_token, TokenVerifier};
use crate::model::UserContext;
use crate::realtime::{run_session, NotificationHub};
use crate::store::traits::Store;

/// Shared state handed to every handler.
pub struct AppState<S> {
    pub store: Arc<S>,
    pub verifier: Arc<TokenVerifier>,
    pub hub: NotificationHub,
}

impl<S> AppState<S> {
    pub fn new(store: Arc<S>, verifier: TokenVerifier, hub: NotificationHub) -> Self {
        Self {
            store,
            verifier: Arc::new(verifier),
            hub,
        }
    }
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            verifier: self.verifier.clone(),
            hub: self.hub.clone(),
        }
    }
}

/// Simple health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

pub async fn public_hello() -> &'static str {
    "Hello, World! This is a public endpoint."
}

pub async fn user_hello(user: UserContext) -> String {
    format!("Hello, {}! You have USER role.", user.username)
}

pub async fn admin_hello(user: UserContext) -> String {
    format!("Hello, {}! You have ADMIN role.", user.username)
}

/// `201 Created` with a `Location` pointing at the new child of the request path.
pub(crate) fn created<T: Serialize>(uri: &Uri, id: &str, body: T) -> Response {
    let location = format!("{}/{}", uri.path().trim_end_matches('/'), id);
    (StatusCode::CREATED, [(header::LOCATION, location)], Json(body)).into_response()
}

#[derive(Debug, Deserialize)]
pub struct SocketParams {
    pub access_token: Option<String>,
}

/// GET /ws
/// Upgrades to the realtime channel. A missing or unverifiable token
/// connects the session anonymously.
pub async fn realtime_socket<S: Store + 'static>(
    ws: WebSocketUpgrade,
    State(state): State<AppState<S>>,
    Query(params): Query<SocketParams>,
    headers: HeaderMap,
) -> Response {
    let token = bearer_token(&headers)
        .map(str::to_string)
        .or(params.access_token);

    let user = match token {
        Some(token) => state.verifier.verify(&token).unwrap_or_else(|e| {
            log::warn!("Realtime token rejected, connecting anonymously: {}", e);
            UserContext::anonymous()
        }),
        None => UserContext::anonymous(),
    };

    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| run_session(socket, hub, user))
}
