use axum::{
    extract::{FromRef, State},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, PublicUser, RefreshRequest, RegisterRequest},
        jwt::{AuthUser, JwtKeys, TokenKind},
        password::{check_email, check_password, hash_password, verify_password},
    },
    error::AppError,
    extract::AppJson,
    state::AppState,
    store::{NewUser, User},
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/me", get(get_me))
}

fn issue_tokens(state: &AppState, user: User) -> Result<AuthResponse, AppError> {
    let pair = JwtKeys::from_ref(state).issue_pair(user.id)?;
    Ok(AuthResponse {
        access_token: pair.access,
        refresh_token: pair.refresh,
        user: user.into(),
    })
}

/// Trims and drops blank optional strings.
pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let name = payload.name.trim();
    let email = payload.email.trim();

    if name.is_empty() {
        warn!("missing name");
        return Err(AppError::validation("Name is required"));
    }

    check_email(email)?;
    check_password(&payload.password)?;

    // Ensure email is not taken
    if state.store.find_user_by_email(email).await?.is_some() {
        warn!(%email, "email already registered");
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let hash = hash_password(&payload.password)?;

    let user = state
        .store
        .create_user(NewUser {
            name,
            email,
            password_hash: &hash,
            phone: non_blank(payload.phone.as_deref()),
        })
        .await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(Json(issue_tokens(&state, user)?))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let email = payload.email.trim();
    check_email(email)?;

    let Some(user) = state.store.find_user_by_email(email).await? else {
        warn!(%email, "login unknown email");
        return Err(AppError::unauthorized("Invalid credentials"));
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(%email, user_id = %user.id, "login invalid password");
        return Err(AppError::unauthorized("Invalid credentials"));
    }

    info!(user_id = %user.id, "user logged in");
    Ok(Json(issue_tokens(&state, user)?))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RefreshRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let user_id =
        JwtKeys::from_ref(&state).verify_as(&payload.refresh_token, TokenKind::Refresh)?;

    let user = state
        .store
        .find_user(user_id)
        .await?
        .ok_or_else(|| AppError::unauthorized("User not found"))?;

    Ok(Json(issue_tokens(&state, user)?))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, AppError> {
    let user = state
        .store
        .find_user(user_id)
        .await?
        .ok_or_else(|| AppError::unauthorized("User not found"))?;

    Ok(Json(user.into()))
}
