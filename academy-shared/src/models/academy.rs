//! Academy model and database operations
//!
//! Academies are the tenants of the system. Every non-super-admin account
//! belongs to exactly one academy via `users.academy_id`.
//!
//! # Schema
//!
//! ```sql
//! CREATE TYPE academy_status AS ENUM ('active', 'inactive', 'suspended');
//!
//! CREATE TABLE academies (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     name VARCHAR(255) NOT NULL,
//!     email VARCHAR(255) NOT NULL UNIQUE CHECK (email = lower(email)),
//!     subdomain VARCHAR(63) NOT NULL UNIQUE,
//!     status academy_status NOT NULL DEFAULT 'active',
//!     address TEXT,
//!     phone VARCHAR(32),
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

const ACADEMY_COLUMNS: &str =
    "id, name, email, subdomain, status, address, phone, created_at, updated_at";

/// Shortest accepted subdomain
pub const SUBDOMAIN_MIN_LENGTH: usize = 3;

/// Longest accepted subdomain (DNS label limit)
pub const SUBDOMAIN_MAX_LENGTH: usize = 63;

/// Academy lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "academy_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AcademyStatus {
    /// Operating normally
    Active,

    /// Closed or paused by its owner
    Inactive,

    /// Disabled by a platform administrator
    Suspended,
}

impl AcademyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AcademyStatus::Active => "active",
            AcademyStatus::Inactive => "inactive",
            AcademyStatus::Suspended => "suspended",
        }
    }
}

impl fmt::Display for AcademyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AcademyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(AcademyStatus::Active),
            "inactive" => Ok(AcademyStatus::Inactive),
            "suspended" => Ok(AcademyStatus::Suspended),
            other => Err(format!("Unknown academy status: {}", other)),
        }
    }
}

impl Default for AcademyStatus {
    fn default() -> Self {
        AcademyStatus::Active
    }
}

/// Academy model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Academy {
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// Contact email (unique)
    pub email: String,

    /// Lowercase slug used as the academy's subdomain (unique)
    pub subdomain: String,

    pub status: AcademyStatus,

    pub address: Option<String>,

    pub phone: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new academy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAcademy {
    pub name: String,

    pub email: String,

    /// Stored as given; callers normalize with [`normalize_subdomain`] first
    pub subdomain: String,

    #[serde(default)]
    pub status: AcademyStatus,

    pub address: Option<String>,

    pub phone: Option<String>,
}

/// Partial update for an academy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAcademy {
    pub name: Option<String>,

    pub email: Option<String>,

    pub subdomain: Option<String>,

    pub status: Option<AcademyStatus>,

    pub address: Option<Option<String>>,

    pub phone: Option<Option<String>>,
}

impl UpdateAcademy {
    /// Applies the present fields to `academy`
    pub fn apply_to(self, academy: &mut Academy) {
        if let Some(name) = self.name {
            academy.name = name;
        }
        if let Some(email) = self.email {
            academy.email = email;
        }
        if let Some(subdomain) = self.subdomain {
            academy.subdomain = subdomain;
        }
        if let Some(status) = self.status {
            academy.status = status;
        }
        if let Some(address) = self.address {
            academy.address = address;
        }
        if let Some(phone) = self.phone {
            academy.phone = phone;
        }
    }
}

/// Trims and lowercases a subdomain
pub fn normalize_subdomain(subdomain: &str) -> String {
    subdomain.trim().to_lowercase()
}

/// Checks a (normalized) subdomain against the slug pattern
///
/// Accepted: lowercase ASCII letters and digits in groups separated by single
/// hyphens, 3 to 63 characters, e.g. `north-fc` or `u12academy`.
pub fn is_valid_subdomain(subdomain: &str) -> bool {
    if subdomain.len() < SUBDOMAIN_MIN_LENGTH || subdomain.len() > SUBDOMAIN_MAX_LENGTH {
        return false;
    }

    subdomain.split('-').all(|segment| {
        !segment.is_empty()
            && segment
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    })
}

impl Academy {
    pub fn is_active(&self) -> bool {
        self.status == AcademyStatus::Active
    }

    /// Creates a new academy
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Email or subdomain is already taken (`academies_email_key`,
    ///   `academies_subdomain_key`)
    /// - Subdomain fails the schema's format check
    /// - Database connection fails
    pub async fn create<'e, E>(executor: E, data: CreateAcademy) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            r#"
            INSERT INTO academies (name, email, subdomain, status, address, phone)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ACADEMY_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Academy>(&sql)
            .bind(data.name)
            .bind(data.email)
            .bind(data.subdomain)
            .bind(data.status)
            .bind(data.address)
            .bind(data.phone)
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!("SELECT {ACADEMY_COLUMNS} FROM academies WHERE id = $1");

        sqlx::query_as::<_, Academy>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_by_subdomain<'e, E>(
        executor: E,
        subdomain: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!("SELECT {ACADEMY_COLUMNS} FROM academies WHERE subdomain = $1");

        sqlx::query_as::<_, Academy>(&sql)
            .bind(subdomain)
            .fetch_optional(executor)
            .await
    }

    /// Writes every mutable column back; `None` if the academy is gone
    pub async fn save<'e, E>(executor: E, academy: &Academy) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            r#"
            UPDATE academies
            SET name = $2, email = $3, subdomain = $4, status = $5,
                address = $6, phone = $7, updated_at = NOW()
            WHERE id = $1
            RETURNING {ACADEMY_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Academy>(&sql)
            .bind(academy.id)
            .bind(&academy.name)
            .bind(&academy.email)
            .bind(&academy.subdomain)
            .bind(academy.status)
            .bind(&academy.address)
            .bind(&academy.phone)
            .fetch_optional(executor)
            .await
    }

    /// Deletes an academy
    ///
    /// Member accounts are kept with `academy_id` set to NULL by the schema.
    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM academies WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists academies alphabetically with pagination
    pub async fn list<'e, E>(executor: E, limit: i64, offset: i64) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            r#"
            SELECT {ACADEMY_COLUMNS}
            FROM academies
            ORDER BY name ASC
            LIMIT $1 OFFSET $2
            "#
        );

        sqlx::query_as::<_, Academy>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(executor)
            .await
    }

    pub async fn count<'e, E>(executor: E) -> Result<i64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM academies")
            .fetch_one(executor)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_academy_status_as_str() {
        assert_eq!(AcademyStatus::Active.as_str(), "active");
        assert_eq!(AcademyStatus::Inactive.as_str(), "inactive");
        assert_eq!(AcademyStatus::Suspended.as_str(), "suspended");
    }

    #[test]
    fn test_academy_status_from_str() {
        assert_eq!("suspended".parse::<AcademyStatus>(), Ok(AcademyStatus::Suspended));
        assert!("closed".parse::<AcademyStatus>().is_err());
    }

    #[test]
    fn test_default_status_is_active() {
        assert_eq!(AcademyStatus::default(), AcademyStatus::Active);
    }

    #[test]
    fn test_valid_subdomains() {
        for subdomain in ["north-fc", "u12academy", "abc", "a1-b2-c3"] {
            assert!(is_valid_subdomain(subdomain), "{} should be valid", subdomain);
        }
    }

    #[test]
    fn test_invalid_subdomains() {
        let too_long = "a".repeat(SUBDOMAIN_MAX_LENGTH + 1);
        for subdomain in [
            "ab",
            "North-FC",
            "-north",
            "north-",
            "north--fc",
            "north_fc",
            "north.fc",
            "",
            too_long.as_str(),
        ] {
            assert!(!is_valid_subdomain(subdomain), "{} should be invalid", subdomain);
        }
    }

    #[test]
    fn test_normalize_subdomain() {
        assert_eq!(normalize_subdomain("  North-FC "), "north-fc");
        assert!(is_valid_subdomain(&normalize_subdomain("North-FC")));
    }

    #[test]
    fn test_update_academy_apply() {
        let mut academy = Academy {
            id: Uuid::new_v4(),
            name: "North FC".to_string(),
            email: "info@northfc.test".to_string(),
            subdomain: "north-fc".to_string(),
            status: AcademyStatus::Active,
            address: Some("1 Pitch Lane".to_string()),
            phone: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        UpdateAcademy {
            status: Some(AcademyStatus::Suspended),
            address: Some(None),
            ..Default::default()
        }
        .apply_to(&mut academy);

        assert_eq!(academy.status, AcademyStatus::Suspended);
        assert!(!academy.is_active());
        assert!(academy.address.is_none());
        assert_eq!(academy.name, "North FC");
    }
}
