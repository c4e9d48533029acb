use time::{macros::format_description, Date};
use tracing::{info, warn};
use uuid::Uuid;

use super::dto::{CreateRideRequest, SearchQuery};
use crate::{
    error::AppError,
    store::{
        Booking, BookingDetails, NewRide, Ride, RideFilter, RideListing, Store, StoreError,
    },
};

/// Attempts for a booking whose transaction hits a transient storage conflict.
const MAX_BOOK_ATTEMPTS: u32 = 3;

fn required<'a>(value: &'a str, field: &str) -> Result<&'a str, AppError> {
    let v = value.trim();
    if v.is_empty() {
        return Err(AppError::validation(format!("{field} is required")));
    }
    Ok(v)
}

fn filter_value(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn parse_filter(q: SearchQuery) -> Result<RideFilter, AppError> {
    let date = match filter_value(q.date) {
        Some(raw) => Some(
            Date::parse(&raw, format_description!("[year]-[month]-[day]"))
                .map_err(|_| AppError::validation("date must be YYYY-MM-DD"))?,
        ),
        None => None,
    };
    Ok(RideFilter {
        origin: filter_value(q.origin),
        destination: filter_value(q.destination),
        date,
    })
}

pub async fn create_ride(
    store: &dyn Store,
    driver_id: Uuid,
    req: &CreateRideRequest,
) -> Result<Ride, AppError> {
    let origin = required(&req.origin, "origin")?;
    let destination = required(&req.destination, "destination")?;
    let time = required(&req.time, "time")?;
    if req.seats < 1 {
        return Err(AppError::validation("seats must be at least 1"));
    }

    let ride = store
        .create_ride(NewRide {
            driver_id,
            origin,
            destination,
            time,
            seats: req.seats,
        })
        .await?;

    info!(ride_id = %ride.id, %driver_id, seats = ride.seats, "ride created");
    Ok(ride)
}

pub async fn search_rides(
    store: &dyn Store,
    filter: &RideFilter,
) -> Result<Vec<RideListing>, AppError> {
    Ok(store.search_rides(filter).await?)
}

pub async fn get_ride(store: &dyn Store, ride_id: Uuid) -> Result<RideListing, AppError> {
    store
        .find_ride(ride_id)
        .await?
        .ok_or(AppError::NotFound("ride"))
}

/// Atomically reserves `seats` on a ride for `booker_id`.
///
/// Input is validated before storage is touched. A transient conflict from
/// the store is retried up to [`MAX_BOOK_ATTEMPTS`] times; every other
/// outcome, including losing a race for the last seats, is final.
pub async fn book_seats(
    store: &dyn Store,
    ride_id: Uuid,
    booker_id: Uuid,
    seats: i32,
) -> Result<(Ride, Booking), AppError> {
    if seats < 1 {
        return Err(AppError::validation("seats must be at least 1"));
    }

    let mut attempt = 1;
    loop {
        match store.book_seats(ride_id, booker_id, seats).await {
            Ok((ride, booking)) => {
                info!(
                    %ride_id, %booker_id, booking_id = %booking.id,
                    seats, seats_left = ride.seats, "seats booked"
                );
                return Ok((ride, booking));
            }
            Err(StoreError::Conflict(reason)) if attempt < MAX_BOOK_ATTEMPTS => {
                warn!(%ride_id, attempt, %reason, "booking conflict, retrying");
                attempt += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

pub async fn list_bookings_for_user(
    store: &dyn Store,
    user_id: Uuid,
) -> Result<Vec<BookingDetails>, AppError> {
    Ok(store.list_bookings_for_user(user_id).await?)
}
