use std::fmt;

use crate::model::Id;

/// Natural-key constraints the stores enforce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueKey {
    /// `assignment_id` within `srid`
    Assignment,
    /// `task_id` within its assignment
    Task,
    /// `release_id` within `srid`
    Release,
    /// `set_id` within its release
    ReleaseSet,
}

impl fmt::Display for UniqueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UniqueKey::Assignment => "assignment",
            UniqueKey::Task => "task",
            UniqueKey::Release => "release",
            UniqueKey::ReleaseSet => "release set",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate {0} key")]
    Duplicate(UniqueKey),

    #[error("stale version for {id}: expected {expected}")]
    StaleVersion { id: Id, expected: i64 },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
