pub mod assignment;
pub mod common;
pub mod filter;
pub mod message;
pub mod page;
pub mod release;
pub mod user_context;

pub use assignment::*;
pub use common::*;
pub use filter::*;
pub use message::*;
pub use page::*;
pub use release::*;
pub use user_context::*;
