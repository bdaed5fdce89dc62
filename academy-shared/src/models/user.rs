//! User model and database operations
//!
//! This module provides the User model, the seven-level role enum and CRUD
//! operations for managing accounts. Every account (players, parents, staff and
//! administrators) is a row in the same table; the `role` column decides what
//! the account may do.
//!
//! # Schema
//!
//! ```sql
//! CREATE TYPE user_role AS ENUM (
//!     'player', 'parent', 'staff', 'coach',
//!     'academy_admin', 'academy_owner', 'super_admin'
//! );
//!
//! CREATE TABLE users (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     email VARCHAR(255) NOT NULL UNIQUE CHECK (email = lower(email)),
//!     password_hash VARCHAR(255) NOT NULL,
//!     role user_role NOT NULL DEFAULT 'player',
//!     first_name VARCHAR(100),
//!     last_name VARCHAR(100),
//!     phone VARCHAR(32),
//!     academy_id UUID REFERENCES academies(id) ON DELETE SET NULL,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     last_sign_in_at TIMESTAMPTZ
//! );
//! ```
//!
//! # Example
//!
//! ```no_run
//! use academy_shared::models::user::{CreateUser, User, UserRole};
//! use academy_shared::db::pool::{create_pool, DatabaseConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = create_pool(DatabaseConfig::default()).await?;
//!
//! let user = User::create(&pool, CreateUser {
//!     email: "coach@example.com".to_string(),
//!     password_hash: "$argon2id$...".to_string(),
//!     role: UserRole::Coach,
//!     first_name: Some("Sam".to_string()),
//!     last_name: None,
//!     phone: None,
//!     academy_id: None,
//! }).await?;
//!
//! let found = User::find_by_email(&pool, "coach@example.com").await?;
//! assert_eq!(found.map(|u| u.id), Some(user.id));
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

/// Column list shared by every query that returns a full `User` row
const USER_COLUMNS: &str = "id, email, password_hash, role, first_name, last_name, phone, \
                            academy_id, created_at, updated_at, last_sign_in_at";

/// Account role
///
/// Variants are declared in rank order (player lowest, super_admin highest), so
/// the derived `Ord` and the PostgreSQL enum sort the same way. The rank is for
/// display and grouping only: authorization uses the explicit predicates below,
/// never a rank comparison.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Athlete enrolled at an academy
    Player,

    /// Guardian of one or more players
    Parent,

    /// Non-coaching academy staff
    Staff,

    /// Coach
    Coach,

    /// Day-to-day administrator of an academy
    AcademyAdmin,

    /// Owner of an academy
    AcademyOwner,

    /// Platform-wide administrator
    SuperAdmin,
}

impl UserRole {
    /// Every role, lowest rank first
    pub const ALL: [UserRole; 7] = [
        UserRole::Player,
        UserRole::Parent,
        UserRole::Staff,
        UserRole::Coach,
        UserRole::AcademyAdmin,
        UserRole::AcademyOwner,
        UserRole::SuperAdmin,
    ];

    /// Converts role to its storage/wire string
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Player => "player",
            UserRole::Parent => "parent",
            UserRole::Staff => "staff",
            UserRole::Coach => "coach",
            UserRole::AcademyAdmin => "academy_admin",
            UserRole::AcademyOwner => "academy_owner",
            UserRole::SuperAdmin => "super_admin",
        }
    }

    /// Ordinal rank (0 = player, 6 = super_admin) used for sorting and grouping
    pub fn rank(&self) -> u8 {
        match self {
            UserRole::Player => 0,
            UserRole::Parent => 1,
            UserRole::Staff => 2,
            UserRole::Coach => 3,
            UserRole::AcademyAdmin => 4,
            UserRole::AcademyOwner => 5,
            UserRole::SuperAdmin => 6,
        }
    }

    /// Players and parents must carry a first and last name
    pub fn requires_full_name(&self) -> bool {
        matches!(self, UserRole::Player | UserRole::Parent)
    }

    /// Every role except super_admin belongs to an academy
    pub fn requires_academy(&self) -> bool {
        !self.is_super_admin()
    }

    pub fn is_super_admin(&self) -> bool {
        matches!(self, UserRole::SuperAdmin)
    }

    /// Owners and admins manage an academy's accounts
    pub fn is_academy_manager(&self) -> bool {
        matches!(self, UserRole::AcademyOwner | UserRole::AcademyAdmin)
    }

    /// Anyone working for an academy (staff and up, below super_admin)
    pub fn is_academy_staff(&self) -> bool {
        matches!(
            self,
            UserRole::Staff | UserRole::Coach | UserRole::AcademyAdmin | UserRole::AcademyOwner
        )
    }

    /// Roles an account with this role may hand out
    pub fn assignable_roles(&self) -> &'static [UserRole] {
        const OWNER_ASSIGNABLE: &[UserRole] = &[
            UserRole::Player,
            UserRole::Parent,
            UserRole::Staff,
            UserRole::Coach,
            UserRole::AcademyAdmin,
            UserRole::AcademyOwner,
        ];
        const ADMIN_ASSIGNABLE: &[UserRole] = &[
            UserRole::Player,
            UserRole::Parent,
            UserRole::Staff,
            UserRole::Coach,
        ];

        match self {
            UserRole::SuperAdmin => &Self::ALL,
            UserRole::AcademyOwner => OWNER_ASSIGNABLE,
            UserRole::AcademyAdmin => ADMIN_ASSIGNABLE,
            UserRole::Coach | UserRole::Staff | UserRole::Parent | UserRole::Player => &[],
        }
    }

    /// Checks whether this role may assign `role` to another account
    pub fn can_assign(&self, role: UserRole) -> bool {
        self.assignable_roles().contains(&role)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UserRole::ALL
            .iter()
            .copied()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| format!("Unknown role: {}", s))
    }
}

/// User model representing an account
///
/// Passwords are stored as Argon2id hashes and never serialized.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Unique user ID
    pub id: Uuid,

    /// Email address, stored lowercase (unique)
    pub email: String,

    /// Argon2id password hash
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    /// Account role
    pub role: UserRole,

    pub first_name: Option<String>,

    pub last_name: Option<String>,

    pub phone: Option<String>,

    /// Owning academy (None for super admins)
    pub academy_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Last successful sign-in (None if never signed in)
    pub last_sign_in_at: Option<DateTime<Utc>>,
}

/// Input for creating a new user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    /// Email address
    pub email: String,

    /// Argon2id password hash (NOT plaintext password!)
    pub password_hash: String,

    pub role: UserRole,

    pub first_name: Option<String>,

    pub last_name: Option<String>,

    pub phone: Option<String>,

    pub academy_id: Option<Uuid>,
}

/// Partial update for an existing user
///
/// Only `Some` fields are applied. Nullable columns use `Option<Option<_>>`
/// so `Some(None)` clears them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUser {
    pub email: Option<String>,

    pub password_hash: Option<String>,

    pub role: Option<UserRole>,

    pub first_name: Option<Option<String>>,

    pub last_name: Option<Option<String>>,

    pub phone: Option<Option<String>>,

    pub academy_id: Option<Option<Uuid>>,
}

impl UpdateUser {
    /// Applies the present fields to `user`
    pub fn apply_to(self, user: &mut User) {
        if let Some(email) = self.email {
            user.email = email;
        }
        if let Some(password_hash) = self.password_hash {
            user.password_hash = password_hash;
        }
        if let Some(role) = self.role {
            user.role = role;
        }
        if let Some(first_name) = self.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = self.last_name {
            user.last_name = last_name;
        }
        if let Some(phone) = self.phone {
            user.phone = phone;
        }
        if let Some(academy_id) = self.academy_id {
            user.academy_id = academy_id;
        }
    }
}

/// Filters for listing users
#[derive(Debug, Clone, Copy, Default)]
pub struct UserFilter {
    pub academy_id: Option<Uuid>,
    pub role: Option<UserRole>,
}

/// Returns the name errors for an account with `role`
///
/// Players and parents need both names; other roles may leave them blank.
pub fn name_errors(
    role: UserRole,
    first_name: Option<&str>,
    last_name: Option<&str>,
) -> Vec<String> {
    let mut errors = Vec::new();

    if !role.requires_full_name() {
        return errors;
    }

    if first_name.map_or(true, |n| n.trim().is_empty()) {
        errors.push("First name is required".to_string());
    }
    if last_name.map_or(true, |n| n.trim().is_empty()) {
        errors.push("Last name is required".to_string());
    }

    errors
}

/// Normalizes an email for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl User {
    /// Full display name, falling back to the email address
    pub fn display_name(&self) -> String {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();

        if parts.is_empty() {
            self.email.clone()
        } else {
            parts.join(" ")
        }
    }

    /// Creates a new user
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Email already exists (unique constraint `users_email_key`)
    /// - The academy doesn't exist (foreign key violation)
    /// - Database connection fails
    pub async fn create<'e, E>(executor: E, data: CreateUser) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            r#"
            INSERT INTO users (email, password_hash, role, first_name, last_name, phone, academy_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(data.email)
            .bind(data.password_hash)
            .bind(data.role)
            .bind(data.first_name)
            .bind(data.last_name)
            .bind(data.phone)
            .bind(data.academy_id)
            .fetch_one(executor)
            .await
    }

    /// Inserts a user unless the email is already taken
    ///
    /// Returns `None` when a row with the same email exists, including one
    /// committed by a concurrent transaction while this insert waited on it.
    pub async fn insert_if_absent<'e, E>(
        executor: E,
        data: CreateUser,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            r#"
            INSERT INTO users (email, password_hash, role, first_name, last_name, phone, academy_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (email) DO NOTHING
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(data.email)
            .bind(data.password_hash)
            .bind(data.role)
            .bind(data.first_name)
            .bind(data.last_name)
            .bind(data.phone)
            .bind(data.academy_id)
            .fetch_optional(executor)
            .await
    }

    /// Finds a user by ID
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");

        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Finds a user by email address
    ///
    /// Emails are stored lowercase; callers pass the output of [`normalize_email`].
    pub async fn find_by_email<'e, E>(
        executor: E,
        email: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");

        sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(executor)
            .await
    }

    /// Writes every mutable column of `user` back to the database
    ///
    /// `updated_at` is set to the current time. Returns `None` if the user no
    /// longer exists.
    pub async fn save<'e, E>(executor: E, user: &User) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            r#"
            UPDATE users
            SET email = $2, password_hash = $3, role = $4, first_name = $5,
                last_name = $6, phone = $7, academy_id = $8, updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(user.id)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.phone)
            .bind(user.academy_id)
            .fetch_optional(executor)
            .await
    }

    /// Deletes a user by ID
    ///
    /// Guardian relationships referencing the user are removed by the schema
    /// (ON DELETE CASCADE).
    ///
    /// # Returns
    ///
    /// True if user was deleted, false if user didn't exist
    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Records a successful sign-in
    pub async fn update_last_sign_in<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("UPDATE users SET last_sign_in_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists users matching `filter` with pagination
    ///
    /// Ordered by role rank (highest first), then by name.
    pub async fn list<'e, E>(
        executor: E,
        filter: UserFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE ($1::uuid IS NULL OR academy_id = $1)
              AND ($2::user_role IS NULL OR role = $2)
            ORDER BY role DESC, last_name ASC NULLS LAST, first_name ASC NULLS LAST, email ASC
            LIMIT $3 OFFSET $4
            "#
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(filter.academy_id)
            .bind(filter.role)
            .bind(limit)
            .bind(offset)
            .fetch_all(executor)
            .await
    }

    /// Counts users matching `filter`
    pub async fn count<'e, E>(executor: E, filter: UserFilter) -> Result<i64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM users
            WHERE ($1::uuid IS NULL OR academy_id = $1)
              AND ($2::user_role IS NULL OR role = $2)
            "#,
        )
        .bind(filter.academy_id)
        .bind(filter.role)
        .fetch_one(executor)
        .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user(role: UserRole) -> User {
        User {
            id: Uuid::new_v4(),
            email: "someone@example.com".to_string(),
            password_hash: "hash".to_string(),
            role,
            first_name: Some("Alex".to_string()),
            last_name: Some("Morgan".to_string()),
            phone: None,
            academy_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_sign_in_at: None,
        }
    }

    #[test]
    fn test_role_rank_matches_ordering() {
        for pair in UserRole::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
            assert_eq!(pair[0].rank() + 1, pair[1].rank());
        }
        assert_eq!(UserRole::Player.rank(), 0);
        assert_eq!(UserRole::SuperAdmin.rank(), 6);
    }

    #[test]
    fn test_role_string_conversion() {
        for role in UserRole::ALL {
            assert_eq!(role.as_str().parse::<UserRole>(), Ok(role));
            assert_eq!(role.to_string(), role.as_str());
        }
        assert!("owner".parse::<UserRole>().is_err());
        assert_eq!(UserRole::AcademyAdmin.as_str(), "academy_admin");
    }

    #[test]
    fn test_role_serde_uses_snake_case() {
        let json = serde_json::to_string(&UserRole::AcademyOwner).unwrap();
        assert_eq!(json, "\"academy_owner\"");

        let role: UserRole = serde_json::from_str("\"super_admin\"").unwrap();
        assert_eq!(role, UserRole::SuperAdmin);
    }

    #[test]
    fn test_role_predicates() {
        assert!(UserRole::Player.requires_full_name());
        assert!(UserRole::Parent.requires_full_name());
        assert!(!UserRole::Coach.requires_full_name());

        assert!(UserRole::AcademyOwner.is_academy_manager());
        assert!(UserRole::AcademyAdmin.is_academy_manager());
        assert!(!UserRole::Coach.is_academy_manager());
        assert!(!UserRole::SuperAdmin.is_academy_manager());

        assert!(UserRole::Staff.is_academy_staff());
        assert!(UserRole::Coach.is_academy_staff());
        assert!(!UserRole::Parent.is_academy_staff());
        assert!(!UserRole::SuperAdmin.is_academy_staff());

        assert!(!UserRole::SuperAdmin.requires_academy());
        assert!(UserRole::Player.requires_academy());
    }

    #[test]
    fn test_assignable_roles() {
        assert_eq!(UserRole::SuperAdmin.assignable_roles().len(), 7);

        assert!(UserRole::AcademyOwner.can_assign(UserRole::AcademyOwner));
        assert!(!UserRole::AcademyOwner.can_assign(UserRole::SuperAdmin));

        assert!(UserRole::AcademyAdmin.can_assign(UserRole::Coach));
        assert!(!UserRole::AcademyAdmin.can_assign(UserRole::AcademyAdmin));
        assert!(!UserRole::AcademyAdmin.can_assign(UserRole::AcademyOwner));

        assert!(UserRole::Coach.assignable_roles().is_empty());
        assert!(UserRole::Parent.assignable_roles().is_empty());
    }

    #[test]
    fn test_name_errors_only_for_players_and_parents() {
        assert_eq!(
            name_errors(UserRole::Parent, None, Some(" ")),
            vec!["First name is required", "Last name is required"]
        );
        assert_eq!(
            name_errors(UserRole::Player, Some("Jo"), None),
            vec!["Last name is required"]
        );
        assert!(name_errors(UserRole::Player, Some("Jo"), Some("Doe")).is_empty());
        assert!(name_errors(UserRole::Coach, None, None).is_empty());
    }

    #[test]
    fn test_display_name() {
        let mut user = sample_user(UserRole::Player);
        assert_eq!(user.display_name(), "Alex Morgan");

        user.last_name = None;
        assert_eq!(user.display_name(), "Alex");

        user.first_name = None;
        assert_eq!(user.display_name(), "someone@example.com");
    }

    #[test]
    fn test_update_user_apply() {
        let mut user = sample_user(UserRole::Coach);
        let academy_id = Uuid::new_v4();

        UpdateUser {
            role: Some(UserRole::Staff),
            phone: Some(Some("555-0100".to_string())),
            first_name: Some(None),
            academy_id: Some(Some(academy_id)),
            ..Default::default()
        }
        .apply_to(&mut user);

        assert_eq!(user.role, UserRole::Staff);
        assert_eq!(user.phone.as_deref(), Some("555-0100"));
        assert!(user.first_name.is_none());
        assert_eq!(user.last_name.as_deref(), Some("Morgan"));
        assert_eq!(user.academy_id, Some(academy_id));
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = sample_user(UserRole::Parent);
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "parent");
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Parent@Example.COM "), "parent@example.com");
    }
}
