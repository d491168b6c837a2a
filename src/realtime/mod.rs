pub mod hub;
pub mod session;

pub use hub::*;
pub use session::run_session;
