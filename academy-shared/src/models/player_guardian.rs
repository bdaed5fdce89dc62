//! Player-guardian relationships
//!
//! A `PlayerGuardian` row links a player account to a parent account. Rows are
//! created in `pending` state by the guardian invitation service and afterwards
//! only change status; they are never deleted by the application.
//!
//! # Status workflow
//!
//! ```text
//! pending ──► accepted ──► revoked
//!    │
//!    ├──────► declined
//!    └──────► revoked
//! ```
//!
//! Nothing leads back to `pending`. Accepting stamps `accepted_at`; declining
//! and revoking leave it untouched.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE player_guardians (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     player_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
//!     guardian_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
//!     relationship_type guardian_relationship NOT NULL,
//!     status guardian_status NOT NULL DEFAULT 'pending',
//!     invited_by UUID REFERENCES users(id) ON DELETE SET NULL,
//!     invited_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     accepted_at TIMESTAMPTZ,
//!     notes TEXT,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     UNIQUE (player_id, guardian_id),
//!     CHECK (player_id <> guardian_id)
//! );
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

const PLAYER_GUARDIAN_COLUMNS: &str = "id, player_id, guardian_id, relationship_type, status, \
                                       invited_by, invited_at, accepted_at, notes, created_at, updated_at";

/// Name of the unique constraint on (player_id, guardian_id)
pub const PAIR_CONSTRAINT: &str = "player_guardians_pair_key";

/// How a guardian is related to the player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "guardian_relationship", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    Mother,
    Father,
    Stepmother,
    Stepfather,
    Grandparent,
    LegalGuardian,
    Other,
}

impl RelationshipType {
    /// Every accepted relationship type
    pub const ALL: [RelationshipType; 7] = [
        RelationshipType::Mother,
        RelationshipType::Father,
        RelationshipType::Stepmother,
        RelationshipType::Stepfather,
        RelationshipType::Grandparent,
        RelationshipType::LegalGuardian,
        RelationshipType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::Mother => "mother",
            RelationshipType::Father => "father",
            RelationshipType::Stepmother => "stepmother",
            RelationshipType::Stepfather => "stepfather",
            RelationshipType::Grandparent => "grandparent",
            RelationshipType::LegalGuardian => "legal_guardian",
            RelationshipType::Other => "other",
        }
    }

    /// Comma separated list of accepted values, for error messages
    pub fn allowed_values() -> String {
        RelationshipType::ALL
            .iter()
            .map(RelationshipType::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationshipType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RelationshipType::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("Unknown relationship type: {}", s))
    }
}

/// Relationship status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "guardian_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum GuardianStatus {
    /// Invited, awaiting the guardian's answer
    Pending,

    /// Confirmed by the guardian
    Accepted,

    /// Refused by the guardian
    Declined,

    /// Withdrawn after the fact
    Revoked,
}

impl GuardianStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuardianStatus::Pending => "pending",
            GuardianStatus::Accepted => "accepted",
            GuardianStatus::Declined => "declined",
            GuardianStatus::Revoked => "revoked",
        }
    }

    /// Whether `self -> next` is an allowed transition
    pub fn can_transition_to(&self, next: GuardianStatus) -> bool {
        matches!(
            (self, next),
            (
                GuardianStatus::Pending,
                GuardianStatus::Accepted | GuardianStatus::Declined | GuardianStatus::Revoked
            ) | (GuardianStatus::Accepted, GuardianStatus::Revoked)
        )
    }

    /// Declined and revoked relationships never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, GuardianStatus::Declined | GuardianStatus::Revoked)
    }
}

impl fmt::Display for GuardianStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected status change
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Cannot change guardian relationship from {from} to {to}")]
pub struct TransitionError {
    pub from: GuardianStatus,
    pub to: GuardianStatus,
}

/// Errors from persisting a status change
#[derive(Debug, thiserror::Error)]
pub enum GuardianError {
    /// The requested transition is not allowed from the current status
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    /// The row changed status (or vanished) between read and write
    #[error("Guardian relationship was modified concurrently")]
    Conflict,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Player-guardian relationship row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PlayerGuardian {
    pub id: Uuid,

    /// User with role `player`
    pub player_id: Uuid,

    /// User with role `parent`
    pub guardian_id: Uuid,

    pub relationship_type: RelationshipType,

    pub status: GuardianStatus,

    /// Who sent the invitation (None once that account is deleted)
    pub invited_by: Option<Uuid>,

    pub invited_at: DateTime<Utc>,

    /// Set when the guardian accepts
    pub accepted_at: Option<DateTime<Utc>>,

    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Input for inserting a relationship; status always starts as `pending`
#[derive(Debug, Clone)]
pub struct NewPlayerGuardian {
    pub player_id: Uuid,
    pub guardian_id: Uuid,
    pub relationship_type: RelationshipType,
    pub invited_by: Option<Uuid>,
    pub invited_at: DateTime<Utc>,
    pub notes: Option<String>,
}

impl PlayerGuardian {
    /// Applies a status change in memory
    ///
    /// Accepting sets `accepted_at` to `at`; other transitions leave it as is.
    pub fn apply_transition(
        &mut self,
        next: GuardianStatus,
        at: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                from: self.status,
                to: next,
            });
        }

        self.status = next;
        if next == GuardianStatus::Accepted {
            self.accepted_at = Some(at);
        }
        self.updated_at = at;

        Ok(())
    }

    /// Persists a status change for this relationship
    ///
    /// The update only matches while the row still has the status `self` was
    /// read with, so a concurrent change yields [`GuardianError::Conflict`].
    pub async fn transition_to<'e, E>(
        &self,
        executor: E,
        next: GuardianStatus,
    ) -> Result<Self, GuardianError>
    where
        E: PgExecutor<'e>,
    {
        let mut updated = self.clone();
        updated.apply_transition(next, Utc::now())?;

        let sql = format!(
            r#"
            UPDATE player_guardians
            SET status = $2, accepted_at = $3, updated_at = $4
            WHERE id = $1 AND status = $5
            RETURNING {PLAYER_GUARDIAN_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, PlayerGuardian>(&sql)
            .bind(updated.id)
            .bind(updated.status)
            .bind(updated.accepted_at)
            .bind(updated.updated_at)
            .bind(self.status)
            .fetch_optional(executor)
            .await?;

        let row = row.ok_or(GuardianError::Conflict)?;

        tracing::info!(
            relationship_id = %row.id,
            from = %self.status,
            to = %row.status,
            "Guardian relationship status changed"
        );

        Ok(row)
    }

    /// Guardian confirms the relationship
    pub async fn accept<'e, E>(&self, executor: E) -> Result<Self, GuardianError>
    where
        E: PgExecutor<'e>,
    {
        self.transition_to(executor, GuardianStatus::Accepted).await
    }

    /// Guardian refuses the invitation
    pub async fn decline<'e, E>(&self, executor: E) -> Result<Self, GuardianError>
    where
        E: PgExecutor<'e>,
    {
        self.transition_to(executor, GuardianStatus::Declined).await
    }

    /// Withdraws a pending or accepted relationship
    pub async fn revoke<'e, E>(&self, executor: E) -> Result<Self, GuardianError>
    where
        E: PgExecutor<'e>,
    {
        self.transition_to(executor, GuardianStatus::Revoked).await
    }

    /// Inserts a new `pending` relationship
    ///
    /// # Errors
    ///
    /// A second row for the same pair violates [`PAIR_CONSTRAINT`].
    pub async fn create<'e, E>(executor: E, data: NewPlayerGuardian) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            r#"
            INSERT INTO player_guardians
                (player_id, guardian_id, relationship_type, status, invited_by, invited_at, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {PLAYER_GUARDIAN_COLUMNS}
            "#
        );

        sqlx::query_as::<_, PlayerGuardian>(&sql)
            .bind(data.player_id)
            .bind(data.guardian_id)
            .bind(data.relationship_type)
            .bind(GuardianStatus::Pending)
            .bind(data.invited_by)
            .bind(data.invited_at)
            .bind(data.notes)
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!("SELECT {PLAYER_GUARDIAN_COLUMNS} FROM player_guardians WHERE id = $1");

        sqlx::query_as::<_, PlayerGuardian>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Finds the relationship between a player and a guardian, in any status
    pub async fn find_by_pair<'e, E>(
        executor: E,
        player_id: Uuid,
        guardian_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "SELECT {PLAYER_GUARDIAN_COLUMNS} FROM player_guardians \
             WHERE player_id = $1 AND guardian_id = $2"
        );

        sqlx::query_as::<_, PlayerGuardian>(&sql)
            .bind(player_id)
            .bind(guardian_id)
            .fetch_optional(executor)
            .await
    }

    /// Checks whether any relationship exists for the pair
    pub async fn exists_for_pair<'e, E>(
        executor: E,
        player_id: Uuid,
        guardian_id: Uuid,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM player_guardians
                WHERE player_id = $1 AND guardian_id = $2
            )
            "#,
        )
        .bind(player_id)
        .bind(guardian_id)
        .fetch_one(executor)
        .await?;

        Ok(exists)
    }

    /// Whether `user_id` is the player, and whether the guardian, of any
    /// relationship, in that order
    pub async fn linked_sides<'e, E>(executor: E, user_id: Uuid) -> Result<(bool, bool), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r#"
            SELECT
                EXISTS(SELECT 1 FROM player_guardians WHERE player_id = $1),
                EXISTS(SELECT 1 FROM player_guardians WHERE guardian_id = $1)
            "#,
        )
        .bind(user_id)
        .fetch_one(executor)
        .await
    }

    /// Lists a player's guardian relationships, oldest invitation first
    pub async fn list_for_player<'e, E>(
        executor: E,
        player_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "SELECT {PLAYER_GUARDIAN_COLUMNS} FROM player_guardians \
             WHERE player_id = $1 ORDER BY invited_at ASC"
        );

        sqlx::query_as::<_, PlayerGuardian>(&sql)
            .bind(player_id)
            .fetch_all(executor)
            .await
    }

    /// Lists a guardian's relationships, optionally filtered by status
    pub async fn list_for_guardian<'e, E>(
        executor: E,
        guardian_id: Uuid,
        status: Option<GuardianStatus>,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            r#"
            SELECT {PLAYER_GUARDIAN_COLUMNS}
            FROM player_guardians
            WHERE guardian_id = $1
              AND ($2::guardian_status IS NULL OR status = $2)
            ORDER BY invited_at ASC
            "#
        );

        sqlx::query_as::<_, PlayerGuardian>(&sql)
            .bind(guardian_id)
            .bind(status)
            .fetch_all(executor)
            .await
    }
}
