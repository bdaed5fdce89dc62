/// Authentication endpoints
///
/// - `POST /v1/auth/sign_in` - Exchange email and password for tokens
/// - `POST /v1/auth/refresh` - Exchange a refresh token for an access token
/// - `GET /v1/auth/me` - The signed-in user

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use academy_shared::{
    auth::{
        jwt::{self, Claims, TokenPair, TokenType},
        middleware::AuthContext,
        password,
    },
    models::user::{normalize_email, User},
};
use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Sign-in request
#[derive(Debug, Deserialize, Validate)]
pub struct SignInRequest {
    #[validate(email(message = "Email is invalid"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password can't be blank"))]
    pub password: String,
}

/// Sign-in response
#[derive(Debug, Serialize)]
pub struct SignInResponse {
    pub user: User,

    #[serde(flatten)]
    pub tokens: TokenPair,
}

/// Refresh token request
#[derive(Debug, Deserialize, Validate)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "Refresh token can't be blank"))]
    pub refresh_token: String,
}

/// Refresh token response
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

/// Sign in
///
/// ```text
/// POST /v1/auth/sign_in
///
/// { "email": "coach@northfc.test", "password": "Str0ng!Pass" }
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: Unknown email or wrong password
/// - `422 Unprocessable Entity`: Malformed request
pub async fn sign_in(
    State(state): State<AppState>,
    Json(req): Json<SignInRequest>,
) -> ApiResult<Json<SignInResponse>> {
    req.validate()?;

    let email = normalize_email(&req.email);
    let user = match User::find_by_email(&state.db, &email).await? {
        Some(user) => user,
        None => {
            tracing::debug!("Sign-in for unknown email");
            return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }
    };

    if !password::verify_password(&req.password, &user.password_hash)? {
        tracing::info!(user_id = %user.id, "Sign-in with wrong password");
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    User::update_last_sign_in(&state.db, user.id).await?;
    let tokens = jwt::issue_token_pair(user.id, state.jwt_secret())?;

    tracing::info!(user_id = %user.id, role = %user.role, "User signed in");

    Ok(Json(SignInResponse { user, tokens }))
}

/// Trade a refresh token for a new access token
///
/// The user must still exist.
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    req.validate()?;

    let claims = jwt::validate_refresh_token(&req.refresh_token, state.jwt_secret())?;

    if User::find_by_id(&state.db, claims.sub).await?.is_none() {
        return Err(ApiError::Unauthorized("User no longer exists".to_string()));
    }

    let access = Claims::new(claims.sub, TokenType::Access);

    Ok(Json(RefreshResponse {
        access_token: jwt::create_token(&access, state.jwt_secret())?,
        token_type: "Bearer",
        expires_in: access.expires_in_seconds(),
    }))
}

pub async fn me(Extension(auth): Extension<AuthContext>) -> Json<User> {
    Json(auth.user)
}
