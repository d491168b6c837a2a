pub mod assignments;
pub mod error;
pub mod messages;
pub mod release_sets;
pub mod releases;
pub mod tasks;

pub use assignments::AssignmentOperations;
pub use error::{ServiceError, ServiceResult};
pub use messages::MessageOperations;
pub use release_sets::ReleaseSetOperations;
pub use releases::ReleaseOperations;
pub use tasks::TaskOperations;
