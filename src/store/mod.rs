use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

mod postgres;
pub mod types;

#[cfg(test)]
pub mod memory;

pub use postgres::PgStore;
pub use types::*;

/// Failures surfaced by a [`Store`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("insufficient seats: requested {requested}, available {available}")]
    InsufficientSeats { requested: i32, available: i32 },

    #[error("email already registered")]
    DuplicateEmail,

    /// Serialization failure or deadlock; the transaction may succeed if retried.
    #[error("transient conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            match db_err.code().as_deref() {
                Some("40001") | Some("40P01") => {
                    return StoreError::Conflict(db_err.message().to_string())
                }
                Some("23505") => return StoreError::DuplicateEmail,
                Some("23503") => return StoreError::NotFound("referenced record"),
                _ => {}
            }
        }
        StoreError::Database(e)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Durable state for users, rides and bookings.
///
/// `book_seats` is the only mutation of `Ride::seats` and must run as one
/// atomic check-and-decrement: no two concurrent calls against the same ride
/// may both act on the same seat count.
#[async_trait]
pub trait Store: Send + Sync {
    async fn create_user(&self, new: NewUser<'_>) -> StoreResult<User>;
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn update_user(&self, id: Uuid, update: UserUpdate<'_>) -> StoreResult<User>;

    async fn create_ride(&self, new: NewRide<'_>) -> StoreResult<Ride>;
    async fn find_ride(&self, id: Uuid) -> StoreResult<Option<RideListing>>;
    /// Newest first, ties broken by id.
    async fn search_rides(&self, filter: &RideFilter) -> StoreResult<Vec<RideListing>>;

    async fn book_seats(&self, ride_id: Uuid, user_id: Uuid, seats: i32)
        -> StoreResult<(Ride, Booking)>;
    /// Newest first.
    async fn list_bookings_for_user(&self, user_id: Uuid) -> StoreResult<Vec<BookingDetails>>;

    async fn close(&self);
}
