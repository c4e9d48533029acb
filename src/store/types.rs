use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, not exposed in JSON
    pub phone: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Ride offered by a driver. `seats` is the remaining inventory.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct Ride {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub origin: String,
    pub destination: String,
    pub time: String,
    pub seats: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Ride joined with its driver's display name.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct RideListing {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub driver_name: String,
    pub origin: String,
    pub destination: String,
    pub time: String,
    pub seats: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct Booking {
    pub id: Uuid,
    pub ride_id: Uuid,
    pub user_id: Uuid,
    pub seats: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Booking joined with the ride it reserves and that ride's driver.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BookingDetails {
    pub id: Uuid,
    pub ride_id: Uuid,
    pub seats: i32,
    pub origin: String,
    pub destination: String,
    pub time: String,
    pub seats_left: i32,
    pub driver_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub phone: Option<&'a str>,
}

/// Profile edit; `None` keeps the stored value.
#[derive(Default)]
pub struct UserUpdate<'a> {
    pub name: Option<&'a str>,
    pub email: Option<&'a str>,
    pub phone: Option<&'a str>,
}

pub struct NewRide<'a> {
    pub driver_id: Uuid,
    pub origin: &'a str,
    pub destination: &'a str,
    pub time: &'a str,
    pub seats: i32,
}

/// Search filters, already normalized: blank strings are `None`.
#[derive(Debug, Default, Clone)]
pub struct RideFilter {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub date: Option<Date>,
}

impl RideFilter {
    /// The `YYYY-MM-DD` prefix a ride's time text must start with.
    pub fn date_prefix(&self) -> Option<String> {
        self.date.map(|d| {
            format!(
                "{:04}-{:02}-{:02}",
                d.year(),
                u8::from(d.month()),
                d.day()
            )
        })
    }
}
