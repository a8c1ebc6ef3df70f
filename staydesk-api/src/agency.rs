use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::Utc;
use uuid::Uuid;

use staydesk_core::hotel::{Hotel, HotelPermissions, HotelUpdate, NewHotel};
use staydesk_core::identity::Role;
use staydesk_core::CoreError;
use staydesk_shared::models::events::{HotelCreatedEvent, TOPIC_HOTEL_CREATED};

use crate::error::AppError;
use crate::hotels::load_hotel;
use crate::middleware::{agency_guard, SessionClaims};
use crate::notify::publish_event;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/agency/hotels", post(create_hotel).get(list_hotels))
        .route("/v1/agency/hotels/{id}", get(get_hotel).delete(delete_hotel))
        .route("/v1/agency/hotels/{id}/permissions", put(update_permissions))
        .route_layer(axum::middleware::from_fn_with_state(state, agency_guard))
}

async fn create_hotel(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Json(req): Json<NewHotel>,
) -> Result<(StatusCode, Json<Hotel>), AppError> {
    let hotel = Hotel::create(req)?;

    if state.hotel_repo.get_hotel_by_slug(&hotel.slug).await?.is_some() {
        return Err(CoreError::Conflict(format!("slug {} is taken", hotel.slug)).into());
    }
    state.hotel_repo.create_hotel(&hotel).await?;

    let event = HotelCreatedEvent {
        hotel_id: hotel.id,
        slug: hotel.slug.clone(),
        timestamp: Utc::now().timestamp(),
    };
    publish_event(&state, TOPIC_HOTEL_CREATED, &hotel.id.to_string(), &event).await;

    tracing::info!("Hotel {} ({}) created by {}", hotel.id, hotel.slug, claims.sub);
    Ok((StatusCode::CREATED, Json(hotel.redacted())))
}

async fn list_hotels(State(state): State<AppState>) -> Result<Json<Vec<Hotel>>, AppError> {
    let hotels = state.hotel_repo.list_hotels().await?;
    Ok(Json(hotels.iter().map(Hotel::redacted).collect()))
}

async fn get_hotel(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Hotel>, AppError> {
    let hotel = load_hotel(&state, id).await?;
    Ok(Json(hotel.redacted()))
}

async fn delete_hotel(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state.hotel_repo.delete_hotel(id).await? {
        return Err(AppError::NotFoundError(format!("Hotel {} not found", id)));
    }
    tracing::info!("Hotel {} deleted by {}", id, claims.sub);
    Ok(StatusCode::NO_CONTENT)
}

async fn update_permissions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(permissions): Json<HotelPermissions>,
) -> Result<Json<Hotel>, AppError> {
    let mut hotel = load_hotel(&state, id).await?;
    hotel.apply(Role::Agency, HotelUpdate::Permissions(permissions))?;
    state.hotel_repo.update_hotel(&hotel).await?;
    Ok(Json(hotel.redacted()))
}
