pub mod assignment_handlers;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod message_handlers;
pub mod release_handlers;
pub mod routes;

pub use error::{ApiError, ErrorResponse};
pub use handlers::AppState;
pub use routes::create_router;
