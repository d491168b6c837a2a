use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::api::auth::{authenticate, require_admin, require_user};
use crate::api::error::{attach_error_path, not_found_fallback};
use crate::api::handlers::AppState;
use crate::api::{assignment_handlers, handlers, message_handlers, release_handlers};
use crate::store::traits::Store;

/// Routes under `/ispw/{srid}`. Reads and writes need `ROLE_USER`, deletes
/// need `ROLE_ADMIN`.
fn pipeline_routes<S: Store + 'static>() -> Router<AppState<S>> {
    let user_routes = Router::new()
        // Assignments
        .route(
            "/ispw/:srid/assignments",
            get(assignment_handlers::list_assignments::<S>)
                .post(assignment_handlers::create_assignment::<S>),
        )
        .route(
            "/ispw/:srid/assignments/:assignment_id",
            get(assignment_handlers::get_assignment::<S>)
                .put(assignment_handlers::update_assignment::<S>),
        )
        // Tasks
        .route(
            "/ispw/:srid/assignments/:assignment_id/tasks",
            get(assignment_handlers::list_tasks::<S>).post(assignment_handlers::create_task::<S>),
        )
        .route(
            "/ispw/:srid/assignments/:assignment_id/tasks/:task_id",
            get(assignment_handlers::get_task::<S>).put(assignment_handlers::update_task::<S>),
        )
        // Releases
        .route(
            "/ispw/:srid/releases",
            get(release_handlers::list_releases::<S>).post(release_handlers::create_release::<S>),
        )
        .route(
            "/ispw/:srid/releases/:release_id",
            get(release_handlers::get_release::<S>).put(release_handlers::update_release::<S>),
        )
        .route(
            "/ispw/:srid/releases/:release_id/deploy",
            post(release_handlers::deploy_release::<S>),
        )
        .route(
            "/ispw/:srid/releases/:release_id/sets",
            get(release_handlers::list_release_sets_for_release::<S>),
        )
        // Release sets. `:key` is a set id for GET and a release id for POST.
        .route("/ispw/:srid/sets", get(release_handlers::list_release_sets::<S>))
        .route(
            "/ispw/:srid/sets/:key",
            get(release_handlers::get_release_set::<S>).post(release_handlers::create_release_set::<S>),
        )
        .route(
            "/ispw/:srid/sets/:key/deploy",
            post(release_handlers::deploy_release_set::<S>),
        )
        .route(
            "/ispw/:srid/sets/:key/:set_id",
            put(release_handlers::update_release_set::<S>),
        )
        .route_layer(from_fn(require_user));

    let admin_routes = Router::new()
        .route(
            "/ispw/:srid/assignments/:assignment_id",
            delete(assignment_handlers::delete_assignment::<S>),
        )
        .route(
            "/ispw/:srid/assignments/:assignment_id/tasks/:task_id",
            delete(assignment_handlers::delete_task::<S>),
        )
        .route(
            "/ispw/:srid/releases/:release_id",
            delete(release_handlers::delete_release::<S>),
        )
        .route(
            "/ispw/:srid/sets/:key/:set_id",
            delete(release_handlers::delete_release_set::<S>),
        )
        .route_layer(from_fn(require_admin));

    user_routes.merge(admin_routes)
}

fn message_routes<S: Store + 'static>() -> Router<AppState<S>> {
    Router::new()
        .route(
            "/api/messages",
            get(message_handlers::list_messages::<S>).post(message_handlers::create_message::<S>),
        )
        .route("/api/messages/search", get(message_handlers::search_messages::<S>))
        .route(
            "/api/messages/:id",
            get(message_handlers::get_message::<S>)
                .put(message_handlers::update_message::<S>)
                .delete(message_handlers::delete_message::<S>),
        )
        .route_layer(from_fn(require_user))
}

fn hello_routes<S: Store + 'static>() -> Router<AppState<S>> {
    Router::new()
        .route("/api/hello", get(handlers::public_hello))
        .merge(
            Router::new()
                .route("/api/hello/user", get(handlers::user_hello))
                .route_layer(from_fn(require_user)),
        )
        .merge(
            Router::new()
                .route("/api/hello/admin", get(handlers::admin_hello))
                .route_layer(from_fn(require_admin)),
        )
}

pub fn create_router<S: Store + 'static>(state: AppState<S>) -> Router {
    let authenticated = Router::new()
        .merge(pipeline_routes::<S>())
        .merge(message_routes::<S>())
        .merge(hello_routes::<S>())
        .layer(from_fn_with_state(state.verifier.clone(), authenticate));

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Realtime channel authenticates from its own token sources
        .route("/ws", get(handlers::realtime_socket::<S>))
        .merge(authenticated)
        .fallback(not_found_fallback)
        .layer(from_fn(attach_error_path))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::api::auth::TokenVerifier;
    use crate::api::error::ErrorResponse;
    use crate::config::AuthConfig;
    use crate::realtime::NotificationHub;
    use crate::store::MemoryStore;

    fn router() -> Router {
        let verifier = TokenVerifier::new(&AuthConfig {
            jwt_secret: "routes-secret".to_string(),
            issuer: None,
            audience: None,
        });
        create_router(AppState::new(
            Arc::new(MemoryStore::new()),
            verifier,
            NotificationHub::new(8),
        ))
    }

    async fn status_of(method: &str, uri: &str) -> StatusCode {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        router().oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn open_routes_need_no_token() {
        assert_eq!(status_of("GET", "/health").await, StatusCode::OK);
        assert_eq!(status_of("GET", "/api/hello").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn guarded_routes_reject_anonymous_callers() {
        assert_eq!(status_of("GET", "/ispw/PRJ1/assignments").await, StatusCode::UNAUTHORIZED);
        assert_eq!(status_of("DELETE", "/ispw/PRJ1/releases/R1").await, StatusCode::UNAUTHORIZED);
        assert_eq!(status_of("GET", "/api/messages").await, StatusCode::UNAUTHORIZED);
        assert_eq!(status_of("GET", "/api/hello/admin").await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn error_bodies_carry_the_request_path() {
        let request = Request::builder()
            .uri("/ispw/PRJ1/sets")
            .body(Body::empty())
            .unwrap();
        let response = router().oneshot(request).await.unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.status, 401);
        assert_eq!(body.path, "/ispw/PRJ1/sets");
    }

    async fn body_of(response: axum::response::Response) -> ErrorResponse {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn unsupported_methods_use_the_error_body() {
        let request = Request::builder()
            .method("PATCH")
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert!(response.headers().contains_key("allow"));

        let body = body_of(response).await;
        assert_eq!(body.status, 405);
        assert_eq!(body.error, "Method Not Allowed");
        assert_eq!(body.path, "/health");
    }

    #[tokio::test]
    async fn undecodable_path_segments_are_validation_errors() {
        let claims = serde_json::json!({
            "preferred_username": "alice",
            "exp": chrono::Utc::now().timestamp() + 600,
            "realm_access": {"roles": ["ROLE_USER"]}
        });
        let token = jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(b"routes-secret"),
        )
        .unwrap();

        let request = Request::builder()
            .uri("/api/messages/%FF")
            .header("authorization", format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        let response = router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_of(response).await;
        assert_eq!(body.error, "Validation Error");
        assert_eq!(body.path, "/api/messages/%FF");
    }
}
