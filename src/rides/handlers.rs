use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{BookRequest, BookingResponse, CreateRideRequest, SearchQuery},
    services,
};
use crate::{
    auth::AuthUser,
    error::AppError,
    extract::{AppJson, AppPath, AppQuery},
    state::AppState,
    store::{BookingDetails, Ride, RideListing},
};

// --- public routers ---

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/rides", get(search_rides))
        .route("/rides/:id", get(get_ride))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/rides", post(create_ride))
        .route("/rides/:id/book", post(book_ride))
        .route("/bookings/me", get(my_bookings))
}

// --- handlers ---

#[instrument(skip(state))]
pub async fn search_rides(
    State(state): State<AppState>,
    AppQuery(q): AppQuery<SearchQuery>,
) -> Result<Json<Vec<RideListing>>, AppError> {
    let filter = services::parse_filter(q)?;
    let rides = services::search_rides(state.store.as_ref(), &filter).await?;
    Ok(Json(rides))
}

#[instrument(skip(state))]
pub async fn get_ride(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<RideListing>, AppError> {
    Ok(Json(services::get_ride(state.store.as_ref(), id).await?))
}

/// POST /rides → 201 with `Location: /rides/{id}`
#[instrument(skip(state, body))]
pub async fn create_ride(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppJson(body): AppJson<CreateRideRequest>,
) -> Result<(StatusCode, HeaderMap, Json<Ride>), AppError> {
    let ride = services::create_ride(state.store.as_ref(), user_id, &body).await?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/rides/{}", ride.id)) {
        headers.insert(header::LOCATION, location);
    }

    Ok((StatusCode::CREATED, headers, Json(ride)))
}

/// POST /rides/:id/book { seats?: n }
///
/// Only an empty body means one seat; any other body must parse.
#[instrument(skip(state, body))]
pub async fn book_ride(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
    body: Bytes,
) -> Result<Json<BookingResponse>, AppError> {
    let req = if body.iter().all(u8::is_ascii_whitespace) {
        BookRequest::default()
    } else {
        Json::<BookRequest>::from_bytes(&body)?.0
    };
    let (ride, booking) =
        services::book_seats(state.store.as_ref(), id, user_id, req.seats).await?;
    Ok(Json(BookingResponse {
        message: "Ride booked successfully",
        ride,
        booking,
    }))
}

#[instrument(skip(state))]
pub async fn my_bookings(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<BookingDetails>>, AppError> {
    Ok(Json(
        services::list_bookings_for_user(state.store.as_ref(), user_id).await?,
    ))
}
