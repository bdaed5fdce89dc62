/// Guardian invitations
///
/// Links a player to a parent account identified by email. If no account
/// exists for the email a parent account is created in the player's academy
/// with a random password. The relationship starts out `pending` until the
/// guardian accepts or declines it.
///
/// Lookup, account creation and relationship creation run in one transaction:
/// either all rows are written or none are. Two concurrent invitations for the
/// same new email cannot create two accounts (the insert is an upsert on
/// `users.email`), and two concurrent invitations for the same pair cannot
/// create two relationships (the `player_guardians_pair_key` constraint turns
/// the loser into an "already exists" failure). A transaction that hits a
/// serialization failure or deadlock is retried once.
///
/// # Example
///
/// ```no_run
/// use academy_shared::services::guardian_invitation::{GuardianInvitationService, InvitationRequest};
/// use academy_shared::models::user::User;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool, player: User, coach: User) {
/// let service = GuardianInvitationService::new(pool);
/// let response = service
///     .invite(&player, &coach, InvitationRequest::new("new@x.com", "mother"))
///     .await;
///
/// if response.success {
///     println!("invited: {:?}", response.data.map(|outcome| outcome.relationship.id));
/// } else {
///     println!("failed: {}", response.errors.join(", "));
/// }
/// # }
/// ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::ValidateEmail;

use super::{ErrorMessages, ServiceResponse};
use crate::auth::password::{self, PasswordError, GENERATED_PASSWORD_LENGTH};
use crate::db::errors::{is_transient, is_unique_violation_of};
use crate::models::player_guardian::{
    GuardianError, GuardianStatus, NewPlayerGuardian, PlayerGuardian, RelationshipType,
    PAIR_CONSTRAINT,
};
use crate::models::user::{normalize_email, CreateUser, User, UserRole};

/// Attempts per invitation, counting the first
const MAX_ATTEMPTS: u32 = 2;

pub const PLAYER_ROLE_REQUIRED: &str = "Player must have the player role";
pub const INVALID_EMAIL: &str = "Guardian email is invalid";
pub const RELATIONSHIP_EXISTS: &str = "Guardian relationship already exists for this player";
pub const NOT_A_PARENT: &str = "A user with this email already exists and is not a parent";

/// Last name given to a new parent when the email yields only one name part
pub const PLACEHOLDER_LAST_NAME: &str = "Guardian";
pub const SELF_GUARDIAN: &str = "A player cannot be their own guardian";

/// Invitation input as received from the caller
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvitationRequest {
    pub guardian_email: String,

    /// One of the seven relationship type names, e.g. `legal_guardian`
    pub relationship_type: String,

    /// Used only when a new parent account has to be created; derived from
    /// the email when absent
    pub guardian_first_name: Option<String>,

    pub guardian_last_name: Option<String>,

    pub guardian_phone: Option<String>,

    pub notes: Option<String>,
}

impl InvitationRequest {
    pub fn new(guardian_email: impl Into<String>, relationship_type: impl Into<String>) -> Self {
        Self {
            guardian_email: guardian_email.into(),
            relationship_type: relationship_type.into(),
            ..Default::default()
        }
    }

    pub fn with_guardian_name(
        mut self,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        self.guardian_first_name = Some(first_name.into());
        self.guardian_last_name = Some(last_name.into());
        self
    }
}

/// An invitation whose input passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedInvitation {
    pub player_id: Uuid,
    pub academy_id: Option<Uuid>,
    pub email: String,
    pub relationship_type: RelationshipType,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

/// Result of a successful invitation
#[derive(Debug, Clone, Serialize)]
pub struct InvitationOutcome {
    pub relationship: PlayerGuardian,

    pub guardian: User,

    /// Whether the guardian account was created by this invitation
    pub guardian_created: bool,
}

/// Why an invitation failed
#[derive(Debug, thiserror::Error)]
pub enum InvitationError {
    #[error("{}", .0.join(", "))]
    Invalid(Vec<String>),

    #[error("Failed to create guardian invitation: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to create guardian invitation: {0}")]
    Password(#[from] PasswordError),
}

impl InvitationError {
    fn invalid(message: &str) -> Self {
        InvitationError::Invalid(vec![message.to_string()])
    }
}

impl ErrorMessages for InvitationError {
    fn messages(&self) -> Vec<String> {
        match self {
            InvitationError::Invalid(messages) => messages.clone(),
            other => vec![other.to_string()],
        }
    }
}

impl ErrorMessages for GuardianError {
    fn messages(&self) -> Vec<String> {
        vec![self.to_string()]
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Checks the invitation input without touching the database
///
/// Every failing check contributes one message.
pub fn validate_request(
    player: &User,
    request: InvitationRequest,
) -> Result<ValidatedInvitation, InvitationError> {
    let mut errors = Vec::new();

    if player.role != UserRole::Player {
        errors.push(PLAYER_ROLE_REQUIRED.to_string());
    }

    let email = normalize_email(&request.guardian_email);
    if !email.validate_email() {
        errors.push(INVALID_EMAIL.to_string());
    }

    let relationship_type = request.relationship_type.trim().parse::<RelationshipType>();
    if relationship_type.is_err() {
        errors.push(format!(
            "Relationship type must be one of: {}",
            RelationshipType::allowed_values()
        ));
    }

    match relationship_type {
        Ok(relationship_type) if errors.is_empty() => Ok(ValidatedInvitation {
            player_id: player.id,
            academy_id: player.academy_id,
            email,
            relationship_type,
            first_name: non_blank(request.guardian_first_name),
            last_name: non_blank(request.guardian_last_name),
            phone: non_blank(request.guardian_phone),
            notes: non_blank(request.notes),
        }),
        _ => Err(InvitationError::Invalid(errors)),
    }
}

/// Ensures a parent account found for the invitation email may be linked
fn check_existing_guardian(player_id: Uuid, guardian: &User) -> Result<(), InvitationError> {
    if guardian.id == player_id {
        return Err(InvitationError::invalid(SELF_GUARDIAN));
    }
    if guardian.role != UserRole::Parent {
        return Err(InvitationError::invalid(NOT_A_PARENT));
    }
    Ok(())
}

/// Names for a new parent account derived from the email's local part
///
/// `ana.reed@x.com` gives `("Ana", "Reed")`, `new@x.com` gives
/// `("New", "Guardian")`. The parent can correct them after signing in.
pub fn placeholder_names(email: &str) -> (String, String) {
    let local = email.split('@').next().unwrap_or_default();
    let mut parts = local
        .split(|c: char| matches!(c, '.' | '_' | '-' | '+'))
        .filter(|part| !part.is_empty())
        .map(capitalize);

    let first = parts.next().unwrap_or_else(|| PLACEHOLDER_LAST_NAME.to_string());
    let rest: Vec<String> = parts.collect();
    let last = if rest.is_empty() {
        PLACEHOLDER_LAST_NAME.to_string()
    } else {
        rest.join(" ")
    };

    (first, last)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Given names, falling back to ones derived from the email
fn new_guardian_names(invitation: &ValidatedInvitation) -> (String, String) {
    let (first, last) = placeholder_names(&invitation.email);
    (
        invitation.first_name.clone().unwrap_or(first),
        invitation.last_name.clone().unwrap_or(last),
    )
}

/// Creates and answers guardian invitations
#[derive(Clone)]
pub struct GuardianInvitationService {
    pool: PgPool,
}

impl GuardianInvitationService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Invites the owner of `request.guardian_email` to be `player`'s guardian
    pub async fn invite(
        &self,
        player: &User,
        inviter: &User,
        request: InvitationRequest,
    ) -> ServiceResponse<InvitationOutcome> {
        self.try_invite(player, inviter, request).await.into()
    }

    /// [`invite`](Self::invite) with the typed error
    pub async fn try_invite(
        &self,
        player: &User,
        inviter: &User,
        request: InvitationRequest,
    ) -> Result<InvitationOutcome, InvitationError> {
        let invitation = validate_request(player, request)?;

        let mut attempt = 1;
        loop {
            match self.invite_once(&invitation, inviter.id).await {
                Err(InvitationError::Database(e)) if attempt < MAX_ATTEMPTS && is_transient(&e) => {
                    warn!(
                        player_id = %invitation.player_id,
                        attempt,
                        error = %e,
                        "Guardian invitation hit a transient conflict, retrying"
                    );
                    attempt += 1;
                }
                Err(e @ (InvitationError::Database(_) | InvitationError::Password(_))) => {
                    tracing::error!(
                        player_id = %invitation.player_id,
                        error = %e,
                        "Guardian invitation failed"
                    );
                    return Err(e);
                }
                other => return other,
            }
        }
    }

    async fn invite_once(
        &self,
        invitation: &ValidatedInvitation,
        invited_by: Uuid,
    ) -> Result<InvitationOutcome, InvitationError> {
        let mut tx = self.pool.begin().await?;

        let (guardian, guardian_created) = find_or_create_guardian(&mut *tx, invitation).await?;

        if !guardian_created
            && PlayerGuardian::exists_for_pair(&mut *tx, invitation.player_id, guardian.id).await?
        {
            return Err(InvitationError::invalid(RELATIONSHIP_EXISTS));
        }

        let relationship = PlayerGuardian::create(
            &mut *tx,
            NewPlayerGuardian {
                player_id: invitation.player_id,
                guardian_id: guardian.id,
                relationship_type: invitation.relationship_type,
                invited_by: Some(invited_by),
                invited_at: Utc::now(),
                notes: invitation.notes.clone(),
            },
        )
        .await
        .map_err(|e| {
            if is_unique_violation_of(&e, PAIR_CONSTRAINT) {
                InvitationError::invalid(RELATIONSHIP_EXISTS)
            } else {
                InvitationError::Database(e)
            }
        })?;

        tx.commit().await?;

        info!(
            relationship_id = %relationship.id,
            player_id = %relationship.player_id,
            guardian_id = %guardian.id,
            relationship_type = %relationship.relationship_type,
            guardian_created,
            "Guardian invitation created"
        );

        // TODO: deliver the invitation email once an SMTP relay is configured
        info!(
            guardian_email = %guardian.email,
            guardian_name = %guardian.display_name(),
            "Invitation email delivery not configured, skipping"
        );

        Ok(InvitationOutcome {
            relationship,
            guardian,
            guardian_created,
        })
    }

    /// Moves a relationship to `next` and reports the outcome
    pub async fn change_status(
        &self,
        relationship: &PlayerGuardian,
        next: GuardianStatus,
    ) -> ServiceResponse<PlayerGuardian> {
        relationship.transition_to(&self.pool, next).await.into()
    }
}

/// Two-phase upsert: insert the parent unless the email exists, else read it
async fn find_or_create_guardian(
    conn: &mut PgConnection,
    invitation: &ValidatedInvitation,
) -> Result<(User, bool), InvitationError> {
    if let Some(existing) = User::find_by_email(&mut *conn, &invitation.email).await? {
        check_existing_guardian(invitation.player_id, &existing)?;
        return Ok((existing, false));
    }

    let (first_name, last_name) = new_guardian_names(invitation);
    let password_hash = password::hash_password(&password::generate_password(
        GENERATED_PASSWORD_LENGTH,
    ))?;

    let inserted = User::insert_if_absent(
        &mut *conn,
        CreateUser {
            email: invitation.email.clone(),
            password_hash,
            role: UserRole::Parent,
            first_name: Some(first_name),
            last_name: Some(last_name),
            phone: invitation.phone.clone(),
            academy_id: invitation.academy_id,
        },
    )
    .await?;

    if let Some(created) = inserted {
        debug!(guardian_id = %created.id, "Created parent account for invitation");
        return Ok((created, true));
    }

    // Lost the race to a concurrent insert of the same email
    let existing = User::find_by_email(&mut *conn, &invitation.email)
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;
    check_existing_guardian(invitation.player_id, &existing)?;

    Ok((existing, false))
}
