/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use academy_api::{app::{build_router, AppState}, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let app = build_router(AppState::new(pool, config));
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, error::ApiError, middleware::security::SecurityHeadersLayer, routes};
use academy_shared::auth::middleware::authenticate;
use academy_shared::services::{
    academy::AcademyService, guardian_invitation::GuardianInvitationService,
    user_management::UserManagementService,
};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::{from_fn_with_state, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state, cloned into every handler
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,

    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }

    pub fn users(&self) -> UserManagementService {
        UserManagementService::new(self.db.clone())
    }

    pub fn academies(&self) -> AcademyService {
        AcademyService::new(self.db.clone())
    }

    pub fn guardians(&self) -> GuardianInvitationService {
        GuardianInvitationService::new(self.db.clone())
    }
}

/// Builds the complete router with all routes and middleware
///
/// ```text
/// /health                                  public
/// /v1/auth/sign_in, /v1/auth/refresh       public
/// /v1/auth/me                              bearer token
/// /v1/users[/:id]                          bearer token
/// /v1/academies[/:id]                      bearer token
/// /v1/players/:player_id/guardians         bearer token
/// /v1/guardianships[/:id/{accept,decline,revoke}]  bearer token
/// ```
pub fn build_router(state: AppState) -> Router {
    let public_auth_routes = Router::new()
        .route("/sign_in", post(routes::auth::sign_in))
        .route("/refresh", post(routes::auth::refresh));

    let user_routes = Router::new()
        .route("/", get(routes::users::list_users).post(routes::users::create_user))
        .route(
            "/:id",
            get(routes::users::get_user)
                .put(routes::users::update_user)
                .delete(routes::users::delete_user),
        );

    let academy_routes = Router::new()
        .route(
            "/",
            get(routes::academies::list_academies).post(routes::academies::create_academy),
        )
        .route(
            "/:id",
            get(routes::academies::get_academy)
                .put(routes::academies::update_academy)
                .delete(routes::academies::delete_academy),
        );

    let guardianship_routes = Router::new()
        .route("/", get(routes::guardians::my_guardianships))
        .route("/:id/accept", post(routes::guardians::accept))
        .route("/:id/decline", post(routes::guardians::decline))
        .route("/:id/revoke", post(routes::guardians::revoke));

    let protected_routes = Router::new()
        .route("/auth/me", get(routes::auth::me))
        .nest("/users", user_routes)
        .nest("/academies", academy_routes)
        .route(
            "/players/:player_id/guardians",
            get(routes::guardians::list_player_guardians).post(routes::guardians::invite_guardian),
        )
        .nest("/guardianships", guardianship_routes)
        .layer(from_fn_with_state(state.clone(), jwt_auth_layer));

    let v1_routes = Router::new()
        .nest("/auth", public_auth_routes)
        .merge(protected_routes);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CompressionLayer::new())
        .layer(cors_layer(&state.config))
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.allows_any_origin() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}

/// Resolves the bearer token to a user and stores the `AuthContext`
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth = authenticate(&state.db, state.jwt_secret(), req.headers()).await?;

    tracing::debug!(user_id = %auth.user_id(), role = %auth.role(), "Request authenticated");
    req.extensions_mut().insert(auth);

    Ok(next.run(req).await)
}
