/// Account management
///
/// Creates, edits and deletes user accounts on behalf of administrators, and
/// seeds the first super admin at startup. Authorization happens before these
/// calls (see [`crate::auth::policy::UserPolicy`]); this module enforces the
/// data rules:
///
/// - email present, well formed, unique (stored lowercase)
/// - players and parents carry a first and last name
/// - every role except super_admin belongs to an existing academy, and
///   super admins belong to none
/// - passwords meet the strength rules and are stored as Argon2id hashes

use serde::Deserialize;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;
use validator::ValidateEmail;

use super::{double_option, ServiceError, ServiceResponse};
use crate::auth::password::{hash_password, validate_password_strength};
use crate::db::errors::is_unique_violation_of;
use crate::models::academy::Academy;
use crate::models::player_guardian::PlayerGuardian;
use crate::models::user::{name_errors, normalize_email, CreateUser, UpdateUser, User, UserRole};

pub const EMAIL_TAKEN: &str = "Email has already been taken";
pub const EMAIL_INVALID: &str = "Email is invalid";
pub const ACADEMY_REQUIRED: &str = "Academy is required for this role";
pub const ACADEMY_NOT_FOUND: &str = "Academy does not exist";
pub const SUPER_ADMIN_WITHOUT_ACADEMY: &str = "Super admins cannot belong to an academy";
pub const ROLE_LOCKED_BY_GUARDIANSHIP: &str =
    "Role cannot change while the user has guardian relationships";

const EMAIL_CONSTRAINT: &str = "users_email_key";

/// Input for a new account
#[derive(Debug, Clone, Deserialize)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub role: UserRole,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub academy_id: Option<Uuid>,
}

/// Partial edit of an account; absent fields are left alone
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountChanges {
    pub email: Option<String>,

    /// New plaintext password
    pub password: Option<String>,

    pub role: Option<UserRole>,

    #[serde(default, deserialize_with = "double_option")]
    pub first_name: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub last_name: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub academy_id: Option<Option<Uuid>>,
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl AccountChanges {
    /// The account as it would look after these changes (password untouched)
    pub fn preview(&self, current: &User) -> User {
        let mut proposed = current.clone();
        self.to_update(None).apply_to(&mut proposed);
        proposed
    }

    fn to_update(&self, password_hash: Option<String>) -> UpdateUser {
        UpdateUser {
            email: self.email.as_deref().map(normalize_email),
            password_hash,
            role: self.role,
            first_name: self.first_name.clone().map(trimmed),
            last_name: self.last_name.clone().map(trimmed),
            phone: self.phone.clone().map(trimmed),
            academy_id: self.academy_id,
        }
    }
}

/// Data rules every stored account must satisfy
///
/// `password` is checked only when one is being set.
pub fn account_errors(user: &User, password: Option<&str>) -> Vec<String> {
    let mut errors = Vec::new();

    if !user.email.validate_email() {
        errors.push(EMAIL_INVALID.to_string());
    }

    errors.extend(name_errors(
        user.role,
        user.first_name.as_deref(),
        user.last_name.as_deref(),
    ));

    if user.role.requires_academy() && user.academy_id.is_none() {
        errors.push(ACADEMY_REQUIRED.to_string());
    }
    if user.role.is_super_admin() && user.academy_id.is_some() {
        errors.push(SUPER_ADMIN_WITHOUT_ACADEMY.to_string());
    }

    if let Some(password) = password {
        if let Err(message) = validate_password_strength(password) {
            errors.push(message);
        }
    }

    errors
}

fn map_write_error(err: sqlx::Error) -> ServiceError {
    if is_unique_violation_of(&err, EMAIL_CONSTRAINT) {
        ServiceError::invalid(EMAIL_TAKEN)
    } else {
        tracing::error!(error = %err, "Failed to write user");
        ServiceError::Database(err)
    }
}

fn hash(password: &str) -> Result<String, ServiceError> {
    hash_password(password).map_err(|e| {
        tracing::error!(error = %e, "Password hashing failed");
        ServiceError::invalid("Password could not be processed")
    })
}

/// Account operations backed by the pool
#[derive(Clone)]
pub struct UserManagementService {
    pool: PgPool,
}

impl UserManagementService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn academy_errors(&self, academy_id: Option<Uuid>) -> Result<Vec<String>, ServiceError> {
        match academy_id {
            Some(id) if Academy::find_by_id(&self.pool, id).await?.is_none() => {
                Ok(vec![ACADEMY_NOT_FOUND.to_string()])
            }
            _ => Ok(Vec::new()),
        }
    }

    pub async fn create(&self, account: NewAccount) -> ServiceResponse<User> {
        self.try_create(account).await.into()
    }

    pub async fn try_create(&self, account: NewAccount) -> Result<User, ServiceError> {
        let now = chrono::Utc::now();
        let candidate = User {
            id: Uuid::nil(),
            email: normalize_email(&account.email),
            password_hash: String::new(),
            role: account.role,
            first_name: trimmed(account.first_name),
            last_name: trimmed(account.last_name),
            phone: trimmed(account.phone),
            academy_id: account.academy_id,
            created_at: now,
            updated_at: now,
            last_sign_in_at: None,
        };

        let mut errors = account_errors(&candidate, Some(&account.password));
        errors.extend(self.academy_errors(candidate.academy_id).await?);
        if !errors.is_empty() {
            return Err(ServiceError::Invalid(errors));
        }

        let user = User::create(
            &self.pool,
            CreateUser {
                email: candidate.email,
                password_hash: hash(&account.password)?,
                role: candidate.role,
                first_name: candidate.first_name,
                last_name: candidate.last_name,
                phone: candidate.phone,
                academy_id: candidate.academy_id,
            },
        )
        .await
        .map_err(map_write_error)?;

        info!(user_id = %user.id, role = %user.role, "User created");
        Ok(user)
    }

    pub async fn update(&self, current: &User, changes: AccountChanges) -> ServiceResponse<User> {
        self.try_update(current, changes).await.into()
    }

    pub async fn try_update(
        &self,
        current: &User,
        changes: AccountChanges,
    ) -> Result<User, ServiceError> {
        let proposed = changes.preview(current);

        let mut errors = account_errors(&proposed, changes.password.as_deref());
        if proposed.academy_id != current.academy_id {
            errors.extend(self.academy_errors(proposed.academy_id).await?);
        }
        if proposed.role != current.role {
            let sides = PlayerGuardian::linked_sides(&self.pool, current.id).await?;
            if role_conflicts_with_relationships(proposed.role, sides) {
                errors.push(ROLE_LOCKED_BY_GUARDIANSHIP.to_string());
            }
        }
        if !errors.is_empty() {
            return Err(ServiceError::Invalid(errors));
        }

        let password_hash = changes.password.as_deref().map(hash).transpose()?;

        let mut updated = current.clone();
        changes.to_update(password_hash).apply_to(&mut updated);

        let saved = User::save(&self.pool, &updated)
            .await
            .map_err(map_write_error)?
            .ok_or(ServiceError::NotFound)?;

        info!(user_id = %saved.id, role = %saved.role, "User updated");
        Ok(saved)
    }

    /// Hard delete; guardian relationships go with the account
    pub async fn delete(&self, user_id: Uuid) -> Result<(), ServiceError> {
        if !User::delete(&self.pool, user_id).await? {
            return Err(ServiceError::NotFound);
        }

        info!(user_id = %user_id, "User deleted");
        Ok(())
    }

    /// Creates a super admin with `email` unless an account with it exists
    ///
    /// Returns the new account, or `None` when nothing was created.
    pub async fn bootstrap_super_admin(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, ServiceError> {
        let email = normalize_email(email);

        if let Some(existing) = User::find_by_email(&self.pool, &email).await? {
            if !existing.role.is_super_admin() {
                warn!(
                    user_id = %existing.id,
                    role = %existing.role,
                    "Bootstrap admin email belongs to a non-admin account"
                );
            }
            return Ok(None);
        }

        let admin = self
            .try_create(NewAccount {
                email,
                password: password.to_string(),
                role: UserRole::SuperAdmin,
                first_name: None,
                last_name: None,
                phone: None,
                academy_id: None,
            })
            .await?;

        info!(user_id = %admin.id, "Bootstrapped super admin account");
        Ok(Some(admin))
    }
}

/// Players stay players and guardians stay parents while linked
fn role_conflicts_with_relationships(role: UserRole, (as_player, as_guardian): (bool, bool)) -> bool {
    (as_player && role != UserRole::Player) || (as_guardian && role != UserRole::Parent)
}
