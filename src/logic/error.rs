use crate::store::error::{StoreError, UniqueKey};

/// Failures surfaced by the service operations. The HTTP layer maps each
/// variant to one status code.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    PermissionDenied(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    OptimisticConflict(String),

    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

impl ServiceError {
    pub fn not_found(what: impl Into<String>) -> Self {
        ServiceError::NotFound(what.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(key) => {
                let message = match key {
                    UniqueKey::Assignment => "An assignment with this id already exists in this scope",
                    UniqueKey::Task => "A task with this id already exists in this assignment",
                    UniqueKey::Release => "A release with this id already exists in this scope",
                    UniqueKey::ReleaseSet => "A release set with this id already exists in this release",
                };
                ServiceError::Conflict(message.to_string())
            }
            StoreError::StaleVersion { id, .. } => ServiceError::OptimisticConflict(format!(
                "Message {} was modified by another request. Reload and try again.",
                id
            )),
            StoreError::Other(err) => ServiceError::Unexpected(err),
        }
    }
}

/// Rejects a missing or blank natural key.
pub(crate) fn require_key(value: &str, field: &str) -> ServiceResult<()> {
    if value.trim().is_empty() {
        return Err(ServiceError::validation(format!("{} must not be blank", field)));
    }
    Ok(())
}

/// Rejects blank or repeated child keys inside one payload.
pub(crate) fn require_distinct_keys<'a>(
    keys: impl IntoIterator<Item = &'a str>,
    field: &str,
) -> ServiceResult<()> {
    let mut seen = std::collections::HashSet::new();
    for key in keys {
        require_key(key, field)?;
        if !seen.insert(key) {
            return Err(ServiceError::validation(format!(
                "{} '{}' appears more than once",
                field, key
            )));
        }
    }
    Ok(())
}
