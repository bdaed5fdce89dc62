/// Account administration endpoints
///
/// - `GET /v1/users?academy_id&role&limit&offset`
/// - `POST /v1/users`
/// - `GET /v1/users/:id`
/// - `PUT /v1/users/:id`
/// - `DELETE /v1/users/:id`
///
/// Listing is scoped by [`UserPolicy::index`]: super admins see every
/// account, academy staff see their own academy.

use super::not_found;
use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ServiceReply},
};
use academy_shared::{
    auth::{middleware::AuthContext, policy::UserPolicy},
    models::user::{User, UserFilter, UserRole},
    services::{
        page_bounds,
        user_management::{AccountChanges, NewAccount},
    },
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct ListUsersQuery {
    pub academy_id: Option<Uuid>,
    pub role: Option<UserRole>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct UserList {
    pub users: Vec<User>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

async fn load_user(state: &AppState, id: Uuid) -> ApiResult<User> {
    User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| not_found("User"))
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListUsersQuery>,
) -> ApiResult<Json<UserList>> {
    let scope = UserPolicy::index(&auth.actor())?;
    let academy_id = scope.restrict(query.academy_id).ok_or_else(|| {
        ApiError::Forbidden("Not authorized to list users of that academy".to_string())
    })?;

    let filter = UserFilter {
        academy_id,
        role: query.role,
    };
    let (limit, offset) = page_bounds(query.limit, query.offset);

    let users = User::list(&state.db, filter, limit, offset).await?;
    let total = User::count(&state.db, filter).await?;

    Ok(Json(UserList {
        users,
        total,
        limit,
        offset,
    }))
}

/// Creates an account
///
/// Academy managers who omit `academy_id` create the account in their own
/// academy.
pub async fn create_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(mut account): Json<NewAccount>,
) -> ApiResult<ServiceReply<User>> {
    let actor = auth.actor();

    if account.academy_id.is_none() && !actor.role.is_super_admin() {
        account.academy_id = actor.academy_id;
    }

    UserPolicy::create(&actor, account.role, account.academy_id)?;

    Ok(ServiceReply::created(state.users().create(account).await))
}

pub async fn get_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<User>> {
    let user = load_user(&state, id).await?;
    UserPolicy::show(&auth.actor(), &user)?;

    Ok(Json(user))
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(changes): Json<AccountChanges>,
) -> ApiResult<ServiceReply<User>> {
    let current = load_user(&state, id).await?;
    UserPolicy::update(&auth.actor(), &current, &changes.preview(&current))?;

    Ok(ServiceReply::ok(state.users().update(&current, changes).await))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let target = load_user(&state, id).await?;
    UserPolicy::destroy(&auth.actor(), &target)?;

    state.users().delete(target.id).await?;
    tracing::info!(user_id = %target.id, deleted_by = %auth.user_id(), "Account removed");

    Ok(StatusCode::NO_CONTENT)
}
