//! In-process [`Store`] used by handler and service tests.

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    Booking, BookingDetails, NewRide, NewUser, Ride, RideFilter, RideListing, Store, StoreError,
    StoreResult, User, UserUpdate,
};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    // insertion order stands in for created_at ordering
    rides: Vec<Ride>,
    bookings: Vec<Booking>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn bookings_for_ride(&self, ride_id: Uuid) -> Vec<Booking> {
        let t = self.tables.lock().await;
        t.bookings.iter().filter(|b| b.ride_id == ride_id).cloned().collect()
    }
}

impl Tables {
    fn listing(&self, ride: &Ride) -> RideListing {
        let driver_name = self
            .users
            .iter()
            .find(|u| u.id == ride.driver_id)
            .map(|u| u.name.clone())
            .unwrap_or_default();
        RideListing {
            id: ride.id,
            driver_id: ride.driver_id,
            driver_name,
            origin: ride.origin.clone(),
            destination: ride.destination.clone(),
            time: ride.time.clone(),
            seats: ride.seats,
            created_at: ride.created_at,
        }
    }
}

fn contains_ci(haystack: &str, needle: &Option<String>) -> bool {
    match needle {
        Some(n) => haystack.to_lowercase().contains(&n.to_lowercase()),
        None => true,
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, new: NewUser<'_>) -> StoreResult<User> {
        let mut t = self.tables.lock().await;
        if t.users.iter().any(|u| u.email == new.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let user = User {
            id: Uuid::new_v4(),
            name: new.name.to_string(),
            email: new.email.to_string(),
            password_hash: new.password_hash.to_string(),
            phone: new.phone.map(str::to_string),
            created_at: OffsetDateTime::now_utc(),
        };
        t.users.push(user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let t = self.tables.lock().await;
        Ok(t.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let t = self.tables.lock().await;
        Ok(t.users.iter().find(|u| u.email == email).cloned())
    }

    async fn update_user(&self, id: Uuid, update: UserUpdate<'_>) -> StoreResult<User> {
        let mut t = self.tables.lock().await;
        if let Some(email) = update.email {
            if t.users.iter().any(|u| u.email == email && u.id != id) {
                return Err(StoreError::DuplicateEmail);
            }
        }
        let user = t
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(StoreError::NotFound("user"))?;
        if let Some(name) = update.name {
            user.name = name.to_string();
        }
        if let Some(email) = update.email {
            user.email = email.to_string();
        }
        if let Some(phone) = update.phone {
            user.phone = Some(phone.to_string());
        }
        Ok(user.clone())
    }

    async fn create_ride(&self, new: NewRide<'_>) -> StoreResult<Ride> {
        let mut t = self.tables.lock().await;
        if !t.users.iter().any(|u| u.id == new.driver_id) {
            return Err(StoreError::NotFound("driver"));
        }
        let ride = Ride {
            id: Uuid::new_v4(),
            driver_id: new.driver_id,
            origin: new.origin.to_string(),
            destination: new.destination.to_string(),
            time: new.time.to_string(),
            seats: new.seats,
            created_at: OffsetDateTime::now_utc(),
        };
        t.rides.push(ride.clone());
        Ok(ride)
    }

    async fn find_ride(&self, id: Uuid) -> StoreResult<Option<RideListing>> {
        let t = self.tables.lock().await;
        Ok(t.rides.iter().find(|r| r.id == id).map(|r| t.listing(r)))
    }

    async fn search_rides(&self, filter: &RideFilter) -> StoreResult<Vec<RideListing>> {
        let t = self.tables.lock().await;
        let date = filter.date_prefix();
        Ok(t.rides
            .iter()
            .rev()
            .filter(|r| contains_ci(&r.origin, &filter.origin))
            .filter(|r| contains_ci(&r.destination, &filter.destination))
            .filter(|r| date.as_deref().map_or(true, |d| r.time.starts_with(d)))
            .map(|r| t.listing(r))
            .collect())
    }

    async fn book_seats(
        &self,
        ride_id: Uuid,
        user_id: Uuid,
        seats: i32,
    ) -> StoreResult<(Ride, Booking)> {
        // The table lock is held across check and decrement, like a row lock.
        let mut guard = self.tables.lock().await;
        let t = &mut *guard;
        // Same order as PgStore: ride lookup, seat check, then the booker.
        let ride = t
            .rides
            .iter_mut()
            .find(|r| r.id == ride_id)
            .ok_or(StoreError::NotFound("ride"))?;
        if seats > ride.seats {
            return Err(StoreError::InsufficientSeats {
                requested: seats,
                available: ride.seats,
            });
        }
        if !t.users.iter().any(|u| u.id == user_id) {
            return Err(StoreError::NotFound("user"));
        }
        ride.seats -= seats;
        let ride = ride.clone();
        let booking = Booking {
            id: Uuid::new_v4(),
            ride_id,
            user_id,
            seats,
            created_at: OffsetDateTime::now_utc(),
        };
        t.bookings.push(booking.clone());
        Ok((ride, booking))
    }

    async fn list_bookings_for_user(&self, user_id: Uuid) -> StoreResult<Vec<BookingDetails>> {
        let t = self.tables.lock().await;
        Ok(t.bookings
            .iter()
            .rev()
            .filter(|b| b.user_id == user_id)
            .filter_map(|b| {
                let ride = t.rides.iter().find(|r| r.id == b.ride_id)?;
                let listing = t.listing(ride);
                Some(BookingDetails {
                    id: b.id,
                    ride_id: b.ride_id,
                    seats: b.seats,
                    origin: listing.origin,
                    destination: listing.destination,
                    time: listing.time,
                    seats_left: listing.seats,
                    driver_name: listing.driver_name,
                    created_at: b.created_at,
                })
            })
            .collect())
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn booking_errors_follow_ride_then_seats_then_user() {
        let store = MemoryStore::new();
        let driver = store
            .create_user(NewUser {
                name: "Njeri",
                email: "njeri@example.com",
                password_hash: "x",
                phone: None,
            })
            .await
            .unwrap();
        let ride = store
            .create_ride(NewRide {
                driver_id: driver.id,
                origin: "Nairobi",
                destination: "Naivasha",
                time: "08:00",
                seats: 2,
            })
            .await
            .unwrap();
        let stranger = Uuid::new_v4();

        let err = store.book_seats(Uuid::new_v4(), stranger, 1).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound("ride")));

        let err = store.book_seats(ride.id, stranger, 3).await.unwrap_err();
        assert!(matches!(err, StoreError::InsufficientSeats { requested: 3, available: 2 }));

        let err = store.book_seats(ride.id, stranger, 1).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound("user")));

        assert!(store.bookings_for_ride(ride.id).await.is_empty());
        let listing = store.find_ride(ride.id).await.unwrap().unwrap();
        assert_eq!(listing.seats, 2);
    }
}
