/// Academy administration endpoints
///
/// - `GET /v1/academies?limit&offset`
/// - `POST /v1/academies`
/// - `GET /v1/academies/:id`
/// - `PUT /v1/academies/:id`
/// - `DELETE /v1/academies/:id`

use super::not_found;
use crate::{
    app::AppState,
    error::{ApiResult, ServiceReply},
};
use academy_shared::{
    auth::{
        middleware::AuthContext,
        policy::{AcademyPolicy, Scope},
    },
    models::academy::Academy,
    services::{
        academy::{AcademyChanges, NewAcademy},
        page_bounds,
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
pub struct ListAcademiesQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct AcademyList {
    pub academies: Vec<Academy>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

async fn load_academy(state: &AppState, id: Uuid) -> ApiResult<Academy> {
    Academy::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| not_found("Academy"))
}

/// Lists academies; anyone but a super admin sees at most their own
pub async fn list_academies(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListAcademiesQuery>,
) -> ApiResult<Json<AcademyList>> {
    let (limit, offset) = page_bounds(query.limit, query.offset);

    let (academies, total) = match AcademyPolicy::index(&auth.actor()) {
        Scope::All => (
            Academy::list(&state.db, limit, offset).await?,
            Academy::count(&state.db).await?,
        ),
        Scope::Academy(id) => {
            let own: Vec<Academy> = Academy::find_by_id(&state.db, id).await?.into_iter().collect();
            let total = own.len() as i64;
            let page = own.into_iter().skip(offset as usize).take(limit as usize).collect();
            (page, total)
        }
        Scope::Nothing => (Vec::new(), 0),
    };

    Ok(Json(AcademyList {
        academies,
        total,
        limit,
        offset,
    }))
}

pub async fn create_academy(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(academy): Json<NewAcademy>,
) -> ApiResult<ServiceReply<Academy>> {
    AcademyPolicy::create(&auth.actor())?;

    Ok(ServiceReply::created(state.academies().create(academy).await))
}

pub async fn get_academy(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Academy>> {
    let academy = load_academy(&state, id).await?;
    AcademyPolicy::show(&auth.actor(), &academy)?;

    Ok(Json(academy))
}

pub async fn update_academy(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(changes): Json<AcademyChanges>,
) -> ApiResult<ServiceReply<Academy>> {
    let current = load_academy(&state, id).await?;
    AcademyPolicy::update(&auth.actor(), &current, &changes.preview(&current))?;

    Ok(ServiceReply::ok(state.academies().update(&current, changes).await))
}

pub async fn delete_academy(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    AcademyPolicy::destroy(&auth.actor())?;
    let academy = load_academy(&state, id).await?;

    state.academies().delete(academy.id).await?;

    Ok(StatusCode::NO_CONTENT)
}
