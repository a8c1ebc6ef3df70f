use axum::{
    extract::{Path, State},
    routing::{get, put},
    Extension, Json, Router,
};
use chrono::Utc;
use uuid::Uuid;

use staydesk_core::booking::BookingSummary;
use staydesk_core::hotel::{BankDetails, BookingConfig, Branding, ContactInfo, Hotel, HotelUpdate, SmtpSettings};

use crate::error::AppError;
use crate::middleware::{hotel_guard, SessionClaims};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/hotels/{hotel_id}", get(get_own_hotel))
        .route("/v1/hotels/{hotel_id}/branding", put(update_branding))
        .route("/v1/hotels/{hotel_id}/contact", put(update_contact))
        .route("/v1/hotels/{hotel_id}/bank", put(update_bank))
        .route("/v1/hotels/{hotel_id}/smtp", put(update_smtp))
        .route("/v1/hotels/{hotel_id}/booking-config", put(update_booking_config))
        .route("/v1/hotels/{hotel_id}/stats", get(get_stats))
        .route_layer(axum::middleware::from_fn_with_state(state, hotel_guard))
}

pub(crate) async fn load_hotel(state: &AppState, id: Uuid) -> Result<Hotel, AppError> {
    state
        .hotel_repo
        .get_hotel(id)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("Hotel {} not found", id)))
}

async fn get_own_hotel(
    State(state): State<AppState>,
    Path(hotel_id): Path<Uuid>,
) -> Result<Json<Hotel>, AppError> {
    let hotel = load_hotel(&state, hotel_id).await?;
    Ok(Json(hotel.redacted()))
}

async fn apply_section(
    state: &AppState,
    claims: &SessionClaims,
    hotel_id: Uuid,
    update: HotelUpdate,
) -> Result<Json<Hotel>, AppError> {
    let mut hotel = load_hotel(state, hotel_id).await?;
    let section = update.section();
    hotel.apply(claims.role, update)?;
    state.hotel_repo.update_hotel(&hotel).await?;
    tracing::info!("Hotel {} section {} updated by {}", hotel_id, section.as_str(), claims.sub);
    Ok(Json(hotel.redacted()))
}

async fn update_branding(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Path(hotel_id): Path<Uuid>,
    Json(body): Json<Branding>,
) -> Result<Json<Hotel>, AppError> {
    apply_section(&state, &claims, hotel_id, HotelUpdate::Branding(body)).await
}

async fn update_contact(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Path(hotel_id): Path<Uuid>,
    Json(body): Json<ContactInfo>,
) -> Result<Json<Hotel>, AppError> {
    apply_section(&state, &claims, hotel_id, HotelUpdate::Contact(body)).await
}

async fn update_bank(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Path(hotel_id): Path<Uuid>,
    Json(body): Json<BankDetails>,
) -> Result<Json<Hotel>, AppError> {
    apply_section(&state, &claims, hotel_id, HotelUpdate::Bank(body)).await
}

async fn update_smtp(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Path(hotel_id): Path<Uuid>,
    Json(body): Json<SmtpSettings>,
) -> Result<Json<Hotel>, AppError> {
    apply_section(&state, &claims, hotel_id, HotelUpdate::Smtp(body)).await
}

async fn update_booking_config(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Path(hotel_id): Path<Uuid>,
    Json(body): Json<BookingConfig>,
) -> Result<Json<Hotel>, AppError> {
    apply_section(&state, &claims, hotel_id, HotelUpdate::BookingConfig(body)).await
}

async fn get_stats(
    State(state): State<AppState>,
    Path(hotel_id): Path<Uuid>,
) -> Result<Json<BookingSummary>, AppError> {
    // 404 for unknown hotels rather than an empty summary
    load_hotel(&state, hotel_id).await?;
    let bookings = state.booking_repo.list_bookings(hotel_id, None).await?;
    let today = Utc::now().date_naive();
    Ok(Json(BookingSummary::from_bookings(
        &bookings,
        today,
        state.guest.arrival_horizon_days,
    )))
}
