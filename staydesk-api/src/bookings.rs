use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use staydesk_core::booking::{Booking, BookingStatus, BookingUpdate, NewBooking};
use staydesk_core::hotel::Hotel;
use staydesk_core::identity::Actor;
use staydesk_core::link::{BookingLink, LinkStatus};
use staydesk_core::mail::{booking_link_email, status_changed_email};
use staydesk_shared::models::events::{
    BookingCreatedEvent, BookingStatusChangedEvent, LinkIssuedEvent, TOPIC_BOOKING_CREATED,
    TOPIC_BOOKING_STATUS_CHANGED, TOPIC_LINK_ISSUED,
};

use crate::error::AppError;
use crate::hotels::load_hotel;
use crate::middleware::{hotel_guard, SessionClaims};
use crate::notify::{discard_draft, publish_event, send_mail};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct ListQuery {
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusChangeRequest {
    status: BookingStatus,
    #[serde(default)]
    notify_guest: bool,
}

#[derive(Debug, Serialize)]
struct StatusChangeResponse {
    booking: Booking,
    previous_status: BookingStatus,
    guest_notified: bool,
}

#[derive(Debug, Default, Deserialize)]
struct IssueLinkRequest {
    #[serde(default)]
    send_email: bool,
}

#[derive(Debug, Serialize)]
struct LinkResponse {
    link_id: Uuid,
    token: String,
    url: String,
    status: LinkStatus,
    reused: bool,
    emailed: bool,
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/hotels/{hotel_id}/bookings", post(create_booking).get(list_bookings))
        .route(
            "/v1/hotels/{hotel_id}/bookings/{booking_id}",
            get(get_booking).put(update_booking).delete(delete_booking),
        )
        .route("/v1/hotels/{hotel_id}/bookings/{booking_id}/status", post(change_status))
        .route("/v1/hotels/{hotel_id}/bookings/{booking_id}/link", post(issue_link))
        .route("/v1/hotels/{hotel_id}/bookings/{booking_id}/link/resend", post(resend_link))
        .route_layer(axum::middleware::from_fn_with_state(state, hotel_guard))
}

async fn load_booking(state: &AppState, hotel_id: Uuid, booking_id: Uuid) -> Result<Booking, AppError> {
    state
        .booking_repo
        .get_booking(hotel_id, booking_id)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("Booking {} not found", booking_id)))
}

fn session_actor(claims: &SessionClaims) -> Result<Actor, AppError> {
    claims
        .actor()
        .ok_or_else(|| AppError::AuthorizationError("Session is not bound to a hotel".to_string()))
}

async fn create_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Path(hotel_id): Path<Uuid>,
    Json(req): Json<NewBooking>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let hotel = load_hotel(&state, hotel_id).await?;
    let booking = Booking::create(hotel.id, req, &hotel.booking_config)?;
    state.booking_repo.create_booking(&booking).await?;

    let event = BookingCreatedEvent {
        hotel_id,
        booking_id: booking.id,
        check_in: booking.check_in,
        check_out: booking.check_out,
        total_price_cents: booking.total_price_cents,
        timestamp: Utc::now().timestamp(),
    };
    publish_event(&state, TOPIC_BOOKING_CREATED, &booking.id.to_string(), &event).await;

    tracing::info!("Booking {} created at hotel {} by {}", booking.id, hotel_id, claims.sub);
    Ok((StatusCode::CREATED, Json(booking)))
}

async fn list_bookings(
    State(state): State<AppState>,
    Path(hotel_id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let status = match query.status.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(raw.parse::<BookingStatus>()?),
        None => None,
    };
    let bookings = state.booking_repo.list_bookings(hotel_id, status).await?;
    Ok(Json(bookings))
}

async fn get_booking(
    State(state): State<AppState>,
    Path((hotel_id, booking_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(load_booking(&state, hotel_id, booking_id).await?))
}

async fn update_booking(
    State(state): State<AppState>,
    Path((hotel_id, booking_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<BookingUpdate>,
) -> Result<Json<Booking>, AppError> {
    let hotel = load_hotel(&state, hotel_id).await?;
    let mut booking = load_booking(&state, hotel_id, booking_id).await?;
    booking.apply(req, &hotel.booking_config)?;
    if !state.booking_repo.update_booking_if(&booking, booking.status).await? {
        return Err(AppError::ConflictError(format!(
            "Booking {} changed while it was being updated",
            booking_id
        )));
    }
    Ok(Json(booking))
}

async fn delete_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Path((hotel_id, booking_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    // links are keyed by booking only, so ownership is checked first
    let booking = load_booking(&state, hotel_id, booking_id).await?;

    if let Some(link) = state.link_repo.find_active_link(booking.id).await? {
        discard_draft(&state, &link.token).await;
    }
    state.link_repo.delete_links_for_booking(booking.id).await?;

    if !state.booking_repo.delete_booking(hotel_id, booking.id).await? {
        return Err(AppError::NotFoundError(format!("Booking {} not found", booking_id)));
    }
    tracing::info!("Booking {} deleted by {}", booking_id, claims.sub);
    Ok(StatusCode::NO_CONTENT)
}

async fn change_status(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Path((hotel_id, booking_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<StatusChangeRequest>,
) -> Result<Json<StatusChangeResponse>, AppError> {
    let actor = session_actor(&claims)?;
    let hotel = load_hotel(&state, hotel_id).await?;
    let mut booking = load_booking(&state, hotel_id, booking_id).await?;

    let previous_status = booking.transition(req.status, &actor)?;
    if !state.booking_repo.update_booking_if(&booking, previous_status).await? {
        return Err(AppError::ConflictError(format!(
            "Booking {} changed while it was being updated",
            booking_id
        )));
    }

    let event = BookingStatusChangedEvent {
        hotel_id,
        booking_id,
        from: previous_status.to_string(),
        to: booking.status.to_string(),
        actor: actor.label(),
        timestamp: Utc::now().timestamp(),
    };
    publish_event(&state, TOPIC_BOOKING_STATUS_CHANGED, &booking_id.to_string(), &event).await;
    tracing::info!(
        "Booking {} moved {} -> {} by {}",
        booking_id,
        previous_status,
        booking.status,
        actor.label()
    );

    let mut guest_notified = false;
    if req.notify_guest {
        if let Some(message) = status_changed_email(&hotel, &booking)? {
            send_mail(&state, &hotel, message).await?;
            guest_notified = true;
        }
    }

    Ok(Json(StatusChangeResponse {
        booking,
        previous_status,
        guest_notified,
    }))
}

/// Returns the booking's open link, issuing one if there is none.
async fn active_or_new_link(
    state: &AppState,
    hotel: &Hotel,
    booking: &Booking,
) -> Result<(BookingLink, bool), AppError> {
    booking.ensure_awaiting_guest()?;
    if let Some(link) = state.link_repo.find_active_link(booking.id).await? {
        return Ok((link, true));
    }

    let link = BookingLink::issue(hotel, booking)?;
    state.link_repo.create_link(&link).await?;

    let event = LinkIssuedEvent {
        hotel_id: hotel.id,
        booking_id: booking.id,
        link_id: link.id,
        timestamp: Utc::now().timestamp(),
    };
    publish_event(state, TOPIC_LINK_ISSUED, &booking.id.to_string(), &event).await;
    tracing::info!("Link {} issued for booking {}", link.id, booking.id);
    Ok((link, false))
}

async fn email_link(state: &AppState, hotel: &Hotel, booking: &Booking, url: &str) -> Result<(), AppError> {
    let message = booking_link_email(hotel, booking, url)?;
    send_mail(state, hotel, message).await?;
    Ok(())
}

async fn issue_link(
    State(state): State<AppState>,
    Path((hotel_id, booking_id)): Path<(Uuid, Uuid)>,
    body: Bytes,
) -> Result<Json<LinkResponse>, AppError> {
    // body is optional
    let req: IssueLinkRequest = if body.is_empty() {
        IssueLinkRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::BadRequest(e.to_string()))?
    };
    let hotel = load_hotel(&state, hotel_id).await?;
    let booking = load_booking(&state, hotel_id, booking_id).await?;

    let (link, reused) = active_or_new_link(&state, &hotel, &booking).await?;
    let url = link.guest_url(&state.guest.public_base_url);

    if req.send_email {
        email_link(&state, &hotel, &booking, &url).await?;
    }

    Ok(Json(LinkResponse {
        link_id: link.id,
        token: link.token,
        url,
        status: link.status,
        reused,
        emailed: req.send_email,
    }))
}

async fn resend_link(
    State(state): State<AppState>,
    Path((hotel_id, booking_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<LinkResponse>, AppError> {
    let hotel = load_hotel(&state, hotel_id).await?;
    let booking = load_booking(&state, hotel_id, booking_id).await?;
    booking.ensure_awaiting_guest()?;

    let link = state
        .link_repo
        .find_active_link(booking_id)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("No active link for booking {}", booking_id)))?;
    let url = link.guest_url(&state.guest.public_base_url);
    email_link(&state, &hotel, &booking, &url).await?;

    Ok(Json(LinkResponse {
        link_id: link.id,
        token: link.token,
        url,
        status: link.status,
        reused: true,
        emailed: true,
    }))
}
