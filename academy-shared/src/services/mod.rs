/// Business operations that span several models
///
/// Services validate their input, run the writes (in a transaction where more
/// than one row changes) and report the outcome as a [`ServiceResponse`]:
/// either the resulting data or a list of human-readable error messages.
/// Validation failures and unexpected persistence failures have the same
/// shape.
///
/// # Modules
///
/// - `guardian_invitation`: links a player to a (possibly new) parent account
/// - `user_management`: account creation, updates and the bootstrap admin
/// - `academy`: academy creation and updates

use serde::{Deserialize, Deserializer, Serialize};

pub mod academy;
pub mod guardian_invitation;
pub mod user_management;

/// Maximum page size accepted by list operations
pub const MAX_PAGE_SIZE: i64 = 100;

/// Default page size for list operations
pub const DEFAULT_PAGE_SIZE: i64 = 25;

/// Clamps pagination parameters into the accepted range
pub fn page_bounds(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = offset.unwrap_or(0).max(0);
    (limit, offset)
}

/// Deserializes a nullable field of a partial update
///
/// A missing field stays `None`, an explicit `null` becomes `Some(None)`.
/// Use with `#[serde(default, deserialize_with = "double_option")]`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Errors that can be reported as a list of messages
pub trait ErrorMessages {
    fn messages(&self) -> Vec<String>;
}

/// Uniform result of a service call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub errors: Vec<String>,
}

impl<T> ServiceResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            errors: Vec::new(),
        }
    }

    pub fn failure(errors: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            errors,
        }
    }
}

impl<T, E: ErrorMessages> From<Result<T, E>> for ServiceResponse<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(data) => ServiceResponse::ok(data),
            Err(err) => ServiceResponse::failure(err.messages()),
        }
    }
}

/// Validation messages collected by a service, or a persistence failure
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{}", .0.join(", "))]
    Invalid(Vec<String>),

    #[error("Record not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ServiceError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ServiceError::Invalid(vec![message.into()])
    }
}

impl ErrorMessages for ServiceError {
    fn messages(&self) -> Vec<String> {
        match self {
            ServiceError::Invalid(messages) => messages.clone(),
            other => vec![other.to_string()],
        }
    }
}
