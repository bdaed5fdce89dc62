/// Guardian endpoints
///
/// - `GET /v1/players/:player_id/guardians` - A player's relationships
/// - `POST /v1/players/:player_id/guardians` - Invite a guardian by email
/// - `GET /v1/guardianships?status` - The signed-in guardian's relationships
/// - `POST /v1/guardianships/:id/accept`
/// - `POST /v1/guardianships/:id/decline`
/// - `POST /v1/guardianships/:id/revoke`
///
/// # Invitation
///
/// ```text
/// POST /v1/players/:player_id/guardians
///
/// {
///   "guardian_email": "ana.reed@example.com",
///   "relationship_type": "mother",
///   "guardian_first_name": "Ana",
///   "guardian_last_name": "Reed"
/// }
/// ```
///
/// Answers `201` with `{ "success": true, "data": { "relationship", "guardian",
/// "guardian_created" }, "errors": [] }`, or `422` with the error messages.

use super::not_found;
use crate::{
    app::AppState,
    error::{ApiResult, ServiceReply},
};
use academy_shared::{
    auth::{middleware::AuthContext, policy::GuardianPolicy},
    models::{
        player_guardian::{GuardianStatus, PlayerGuardian},
        user::{User, UserRole},
    },
    services::guardian_invitation::{InvitationOutcome, InvitationRequest},
};
use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct GuardianshipQuery {
    pub status: Option<GuardianStatus>,
}

async fn load_player(state: &AppState, id: Uuid) -> ApiResult<User> {
    User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| not_found("Player"))
}

async fn load_relationship(state: &AppState, id: Uuid) -> ApiResult<PlayerGuardian> {
    PlayerGuardian::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| not_found("Guardian relationship"))
}

/// Whether `user` is an accepted guardian of `player_id`
async fn is_linked_guardian(state: &AppState, player_id: Uuid, user: &User) -> ApiResult<bool> {
    if user.role != UserRole::Parent {
        return Ok(false);
    }

    let relationship = PlayerGuardian::find_by_pair(&state.db, player_id, user.id).await?;
    Ok(matches!(relationship, Some(r) if r.status == GuardianStatus::Accepted))
}

pub async fn list_player_guardians(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(player_id): Path<Uuid>,
) -> ApiResult<Json<Vec<PlayerGuardian>>> {
    let player = load_player(&state, player_id).await?;
    let linked = is_linked_guardian(&state, player.id, &auth.user).await?;
    GuardianPolicy::list(&auth.actor(), &player, linked)?;

    Ok(Json(PlayerGuardian::list_for_player(&state.db, player.id).await?))
}

pub async fn invite_guardian(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(player_id): Path<Uuid>,
    Json(request): Json<InvitationRequest>,
) -> ApiResult<ServiceReply<InvitationOutcome>> {
    let player = load_player(&state, player_id).await?;
    GuardianPolicy::invite(&auth.actor(), &player)?;

    let response = state.guardians().invite(&player, &auth.user, request).await;

    Ok(ServiceReply::created(response))
}

pub async fn my_guardianships(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<GuardianshipQuery>,
) -> ApiResult<Json<Vec<PlayerGuardian>>> {
    let relationships =
        PlayerGuardian::list_for_guardian(&state.db, auth.user_id(), query.status).await?;

    Ok(Json(relationships))
}

async fn respond(
    state: &AppState,
    auth: &AuthContext,
    id: Uuid,
    next: GuardianStatus,
) -> ApiResult<ServiceReply<PlayerGuardian>> {
    let relationship = load_relationship(state, id).await?;
    GuardianPolicy::respond(&auth.actor(), &relationship)?;

    Ok(ServiceReply::ok(
        state.guardians().change_status(&relationship, next).await,
    ))
}

pub async fn accept(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<ServiceReply<PlayerGuardian>> {
    respond(&state, &auth, id, GuardianStatus::Accepted).await
}

pub async fn decline(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<ServiceReply<PlayerGuardian>> {
    respond(&state, &auth, id, GuardianStatus::Declined).await
}

pub async fn revoke(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<ServiceReply<PlayerGuardian>> {
    let relationship = load_relationship(&state, id).await?;
    let player = load_player(&state, relationship.player_id).await?;
    GuardianPolicy::revoke(&auth.actor(), &relationship, &player)?;

    Ok(ServiceReply::ok(
        state
            .guardians()
            .change_status(&relationship, GuardianStatus::Revoked)
            .await,
    ))
}
