use serde::{Deserialize, Serialize};

use crate::auth::PublicUser;

/// Profile edit; absent or blank fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UpdateProfileResponse {
    pub message: &'static str,
    pub user: PublicUser,
}
