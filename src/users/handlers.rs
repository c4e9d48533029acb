use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::{UpdateProfileRequest, UpdateProfileResponse};
use crate::{
    auth::{handlers::non_blank, password::check_email, AuthUser, PublicUser},
    error::AppError,
    extract::{AppJson, AppPath},
    state::AppState,
    store::UserUpdate,
};

pub fn user_routes() -> Router<AppState> {
    Router::new().route("/users/:id", get(get_profile).put(update_profile))
}

fn ensure_self(caller: Uuid, id: Uuid) -> Result<(), AppError> {
    if caller != id {
        warn!(%caller, target_user = %id, "profile access denied");
        return Err(AppError::Forbidden("Access denied".into()));
    }
    Ok(())
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<PublicUser>, AppError> {
    ensure_self(caller, id)?;
    let user = state
        .store
        .find_user(id)
        .await?
        .ok_or(AppError::NotFound("user"))?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateProfileRequest>,
) -> Result<Json<UpdateProfileResponse>, AppError> {
    ensure_self(caller, id)?;

    let email = non_blank(payload.email.as_deref());
    if let Some(email) = email {
        check_email(email)?;
    }

    let user = state
        .store
        .update_user(
            id,
            UserUpdate {
                name: non_blank(payload.name.as_deref()),
                email,
                phone: non_blank(payload.phone.as_deref()),
            },
        )
        .await?;

    info!(user_id = %user.id, "profile updated");
    Ok(Json(UpdateProfileResponse {
        message: "Profile updated successfully",
        user: user.into(),
    }))
}
