/// Academy management
///
/// Validates and persists academies. Subdomains are normalized to lowercase
/// before validation; duplicate emails and subdomains are reported from the
/// unique constraints, so concurrent creates cannot slip past a pre-check.

use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;
use validator::ValidateEmail;

use super::{double_option, ServiceError, ServiceResponse};
use crate::db::errors::unique_violation_constraint;
use crate::models::academy::{
    is_valid_subdomain, normalize_subdomain, Academy, AcademyStatus, CreateAcademy, UpdateAcademy,
    SUBDOMAIN_MAX_LENGTH, SUBDOMAIN_MIN_LENGTH,
};
use crate::models::user::normalize_email;

pub const NAME_REQUIRED: &str = "Name can't be blank";
pub const NAME_TOO_LONG: &str = "Name is too long (maximum is 255 characters)";
pub const EMAIL_INVALID: &str = "Email is invalid";
pub const EMAIL_TAKEN: &str = "Email has already been taken";
pub const SUBDOMAIN_TAKEN: &str = "Subdomain has already been taken";

const NAME_MAX_LENGTH: usize = 255;

/// Input for a new academy
#[derive(Debug, Clone, Deserialize)]
pub struct NewAcademy {
    pub name: String,
    pub email: String,
    pub subdomain: String,
    #[serde(default)]
    pub status: AcademyStatus,
    pub address: Option<String>,
    pub phone: Option<String>,
}

/// Partial edit of an academy
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AcademyChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub subdomain: Option<String>,
    pub status: Option<AcademyStatus>,

    #[serde(default, deserialize_with = "double_option")]
    pub address: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
}

impl AcademyChanges {
    /// The academy as it would look after these changes
    pub fn preview(&self, current: &Academy) -> Academy {
        let mut proposed = current.clone();
        UpdateAcademy {
            name: self.name.as_deref().map(|n| n.trim().to_string()),
            email: self.email.as_deref().map(normalize_email),
            subdomain: self.subdomain.as_deref().map(normalize_subdomain),
            status: self.status,
            address: self.address.clone(),
            phone: self.phone.clone(),
        }
        .apply_to(&mut proposed);
        proposed
    }
}

/// Validation messages for an academy's fields
pub fn academy_errors(name: &str, email: &str, subdomain: &str) -> Vec<String> {
    let mut errors = Vec::new();

    if name.trim().is_empty() {
        errors.push(NAME_REQUIRED.to_string());
    } else if name.chars().count() > NAME_MAX_LENGTH {
        errors.push(NAME_TOO_LONG.to_string());
    }

    if !email.validate_email() {
        errors.push(EMAIL_INVALID.to_string());
    }

    if !is_valid_subdomain(subdomain) {
        errors.push(format!(
            "Subdomain must be {}-{} lowercase letters, digits or single hyphens",
            SUBDOMAIN_MIN_LENGTH, SUBDOMAIN_MAX_LENGTH
        ));
    }

    errors
}

fn map_write_error(err: sqlx::Error) -> ServiceError {
    match unique_violation_constraint(&err) {
        Some("academies_email_key") => ServiceError::invalid(EMAIL_TAKEN),
        Some("academies_subdomain_key") => ServiceError::invalid(SUBDOMAIN_TAKEN),
        _ => {
            tracing::error!(error = %err, "Failed to write academy");
            ServiceError::Database(err)
        }
    }
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Clone)]
pub struct AcademyService {
    pool: PgPool,
}

impl AcademyService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, academy: NewAcademy) -> ServiceResponse<Academy> {
        self.try_create(academy).await.into()
    }

    pub async fn try_create(&self, academy: NewAcademy) -> Result<Academy, ServiceError> {
        let name = academy.name.trim().to_string();
        let email = normalize_email(&academy.email);
        let subdomain = normalize_subdomain(&academy.subdomain);

        let errors = academy_errors(&name, &email, &subdomain);
        if !errors.is_empty() {
            return Err(ServiceError::Invalid(errors));
        }

        let created = Academy::create(
            &self.pool,
            CreateAcademy {
                name,
                email,
                subdomain,
                status: academy.status,
                address: optional_text(academy.address),
                phone: optional_text(academy.phone),
            },
        )
        .await
        .map_err(map_write_error)?;

        info!(academy_id = %created.id, subdomain = %created.subdomain, "Academy created");
        Ok(created)
    }

    pub async fn update(&self, current: &Academy, changes: AcademyChanges) -> ServiceResponse<Academy> {
        self.try_update(current, changes).await.into()
    }

    pub async fn try_update(
        &self,
        current: &Academy,
        changes: AcademyChanges,
    ) -> Result<Academy, ServiceError> {
        let mut proposed = changes.preview(current);
        proposed.address = optional_text(proposed.address);
        proposed.phone = optional_text(proposed.phone);

        let errors = academy_errors(&proposed.name, &proposed.email, &proposed.subdomain);
        if !errors.is_empty() {
            return Err(ServiceError::Invalid(errors));
        }

        let saved = Academy::save(&self.pool, &proposed)
            .await
            .map_err(map_write_error)?
            .ok_or(ServiceError::NotFound)?;

        info!(academy_id = %saved.id, status = %saved.status, "Academy updated");
        Ok(saved)
    }

    /// Hard delete; member accounts stay with no academy
    pub async fn delete(&self, academy_id: Uuid) -> Result<(), ServiceError> {
        if !Academy::delete(&self.pool, academy_id).await? {
            return Err(ServiceError::NotFound);
        }

        info!(academy_id = %academy_id, "Academy deleted");
        Ok(())
    }
}
