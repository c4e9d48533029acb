use serde::{Deserialize, Serialize};

use crate::store::{Booking, Ride};

#[derive(Debug, Deserialize)]
pub struct CreateRideRequest {
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub destination: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub seats: i32,
}

/// `GET /rides` query; every filter is optional.
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BookRequest {
    #[serde(default = "default_seats")]
    pub seats: i32,
}

fn default_seats() -> i32 {
    1
}

impl Default for BookRequest {
    fn default() -> Self {
        Self {
            seats: default_seats(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub message: &'static str,
    pub ride: Ride,
    pub booking: Booking,
}
