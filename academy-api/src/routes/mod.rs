/// API route handlers, organized by resource
///
/// - `health`: Health check endpoint
/// - `auth`: Sign-in, token refresh and the current user
/// - `users`: Account administration
/// - `academies`: Academy administration
/// - `guardians`: Guardian invitations and responses

pub mod academies;
pub mod auth;
pub mod guardians;
pub mod health;
pub mod users;

use crate::error::ApiError;

pub(crate) fn not_found(what: &str) -> ApiError {
    ApiError::NotFound(format!("{} not found", what))
}
