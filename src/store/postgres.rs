use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::debug;
use uuid::Uuid;

use super::{
    Booking, BookingDetails, NewRide, NewUser, Ride, RideFilter, RideListing, Store, StoreError,
    StoreResult, User, UserUpdate,
};

const USER_COLUMNS: &str = "id, name, email, password_hash, phone, created_at";
const RIDE_COLUMNS: &str = "id, driver_id, origin, destination, time, seats, created_at";
const LISTING_SELECT: &str = r#"
    SELECT r.id, r.driver_id, u.name AS driver_name, r.origin, r.destination,
           r.time, r.seats, r.created_at
      FROM rides r
      JOIN users u ON u.id = r.driver_id
"#;

/// PostgreSQL-backed [`Store`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("connect to database")?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("run migrations")?;
        Ok(())
    }
}

fn referenced(what: &'static str) -> impl Fn(sqlx::Error) -> StoreError {
    move |e| match StoreError::from(e) {
        StoreError::NotFound(_) => StoreError::NotFound(what),
        other => other,
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, new: NewUser<'_>) -> StoreResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, password_hash, phone)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(new.name)
        .bind(new.email)
        .bind(new.password_hash)
        .bind(new.phone)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn update_user(&self, id: Uuid, update: UserUpdate<'_>) -> StoreResult<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET name  = COALESCE($2, name),
                   email = COALESCE($3, email),
                   phone = COALESCE($4, phone)
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(update.name)
        .bind(update.email)
        .bind(update.phone)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("user"))
    }

    async fn create_ride(&self, new: NewRide<'_>) -> StoreResult<Ride> {
        let ride = sqlx::query_as::<_, Ride>(&format!(
            r#"
            INSERT INTO rides (driver_id, origin, destination, time, seats)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {RIDE_COLUMNS}
            "#
        ))
        .bind(new.driver_id)
        .bind(new.origin)
        .bind(new.destination)
        .bind(new.time)
        .bind(new.seats)
        .fetch_one(&self.pool)
        .await
        .map_err(referenced("driver"))?;
        Ok(ride)
    }

    async fn find_ride(&self, id: Uuid) -> StoreResult<Option<RideListing>> {
        let ride = sqlx::query_as::<_, RideListing>(&format!("{LISTING_SELECT} WHERE r.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(ride)
    }

    async fn search_rides(&self, filter: &RideFilter) -> StoreResult<Vec<RideListing>> {
        // strpos instead of ILIKE so '%' and '_' in a filter match literally
        let rides = sqlx::query_as::<_, RideListing>(&format!(
            r#"
            {LISTING_SELECT}
             WHERE ($1::text IS NULL OR strpos(lower(r.origin), lower($1)) > 0)
               AND ($2::text IS NULL OR strpos(lower(r.destination), lower($2)) > 0)
               AND ($3::text IS NULL OR left(r.time, 10) = $3)
             ORDER BY r.created_at DESC, r.id DESC
            "#
        ))
        .bind(filter.origin.as_deref())
        .bind(filter.destination.as_deref())
        .bind(filter.date_prefix())
        .fetch_all(&self.pool)
        .await?;
        Ok(rides)
    }

    async fn book_seats(
        &self,
        ride_id: Uuid,
        user_id: Uuid,
        seats: i32,
    ) -> StoreResult<(Ride, Booking)> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent bookings of this ride until commit.
        let available: i32 =
            sqlx::query_scalar::<_, i32>("SELECT seats FROM rides WHERE id = $1 FOR UPDATE")
                .bind(ride_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(StoreError::NotFound("ride"))?;

        if seats > available {
            debug!(%ride_id, requested = seats, available, "booking rejected");
            return Err(StoreError::InsufficientSeats {
                requested: seats,
                available,
            });
        }

        let ride = sqlx::query_as::<_, Ride>(&format!(
            "UPDATE rides SET seats = seats - $2 WHERE id = $1 RETURNING {RIDE_COLUMNS}"
        ))
        .bind(ride_id)
        .bind(seats)
        .fetch_one(&mut *tx)
        .await?;

        let booking = sqlx::query_as::<_, Booking>(
            r#"
            INSERT INTO bookings (ride_id, user_id, seats)
            VALUES ($1, $2, $3)
            RETURNING id, ride_id, user_id, seats, created_at
            "#,
        )
        .bind(ride_id)
        .bind(user_id)
        .bind(seats)
        .fetch_one(&mut *tx)
        .await
        .map_err(referenced("user"))?;

        tx.commit().await?;
        Ok((ride, booking))
    }

    async fn list_bookings_for_user(&self, user_id: Uuid) -> StoreResult<Vec<BookingDetails>> {
        let rows = sqlx::query_as::<_, BookingDetails>(
            r#"
            SELECT b.id, b.ride_id, b.seats, r.origin, r.destination, r.time,
                   r.seats AS seats_left, u.name AS driver_name, b.created_at
              FROM bookings b
              JOIN rides r ON r.id = b.ride_id
              JOIN users u ON u.id = r.driver_id
             WHERE b.user_id = $1
             ORDER BY b.created_at DESC, b.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
