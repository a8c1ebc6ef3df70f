//! Guest-facing wizard. The token in the path is the only credential.

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use staydesk_core::booking::{Booking, BookingStatus};
use staydesk_core::hotel::{Hotel, PublicHotelProfile};
use staydesk_core::link::{is_token_shaped, BookingLink, BookingSnapshot, LinkAccess};
use staydesk_core::mail::{guest_confirmation_email, hotel_notification_email};
use staydesk_core::storage::{prepare_upload, UploadRequest, UploadTicket};
use staydesk_core::wizard::{WizardContext, WizardDraft, WizardStep};
use staydesk_core::CoreError;
use staydesk_shared::models::events::{
    BookingStatusChangedEvent, GuestDataSubmittedEvent, TOPIC_BOOKING_STATUS_CHANGED,
    TOPIC_GUEST_DATA_SUBMITTED,
};

use crate::error::AppError;
use crate::hotels::load_hotel;
use crate::notify::{discard_draft, publish_event, try_send_mail};
use crate::state::AppState;

#[derive(Debug, Serialize)]
struct LinkView {
    hotel: PublicHotelProfile,
    booking: BookingSnapshot,
    deposit_cents: i64,
    steps: Vec<WizardStep>,
    draft: WizardDraft,
}

#[derive(Debug, Serialize)]
struct DraftResponse {
    step: WizardStep,
    step_index: usize,
    draft: WizardDraft,
}

#[derive(Debug, Serialize)]
struct SubmitResponse {
    booking_id: Uuid,
    status: BookingStatus,
    redirect_url: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/links/{token}", get(open_link))
        .route("/v1/links/{token}/draft", put(save_draft))
        .route("/v1/links/{token}/draft/advance", post(advance_draft))
        .route("/v1/links/{token}/draft/back", post(back_draft))
        .route("/v1/links/{token}/uploads", post(create_upload))
        .route("/v1/links/{token}/submit", post(submit))
}

/// Everything a guest request works against.
struct GuestSession {
    link: BookingLink,
    hotel: Hotel,
    booking: Booking,
}

impl GuestSession {
    fn context<'a>(&'a self, state: &'a AppState) -> WizardContext<'a> {
        WizardContext {
            booking: &self.booking,
            config: &self.hotel.booking_config,
            has_bank_details: self.hotel.bank.is_some(),
            storage_base_url: &state.guest.storage_base_url,
        }
    }
}

async fn find_link(state: &AppState, token: &str) -> Result<BookingLink, AppError> {
    if !is_token_shaped(token) {
        return Err(AppError::NotFoundError("Link not found".to_string()));
    }
    state
        .link_repo
        .get_link_by_token(token)
        .await?
        .ok_or_else(|| AppError::NotFoundError("Link not found".to_string()))
}

async fn link_booking(state: &AppState, link: &BookingLink) -> Result<Booking, AppError> {
    state
        .booking_repo
        .get_booking(link.hotel_id, link.booking_id)
        .await?
        .ok_or_else(|| AppError::NotFoundError("Link not found".to_string()))
}

/// Resolves an active link with its hotel and booking. Used links and
/// bookings that left Pending are rejected.
async fn open_session(state: &AppState, token: &str) -> Result<GuestSession, AppError> {
    let link = find_link(state, token).await?;
    if !link.is_active() {
        return Err(CoreError::LinkAlreadyUsed.into());
    }
    let hotel = load_hotel(state, link.hotel_id).await?;
    let booking = link_booking(state, &link).await?;
    booking.ensure_awaiting_guest()?;
    Ok(GuestSession { link, hotel, booking })
}

async fn load_draft(state: &AppState, token: &str) -> Result<WizardDraft, AppError> {
    Ok(state.drafts.load_draft(token).await?.unwrap_or_default())
}

async fn store_draft(state: &AppState, token: &str, draft: &WizardDraft) -> Result<(), AppError> {
    state
        .drafts
        .save_draft(token, draft, state.guest.draft_ttl_seconds)
        .await?;
    Ok(())
}

fn draft_response(draft: WizardDraft) -> Json<DraftResponse> {
    Json(DraftResponse {
        step: draft.step,
        step_index: draft.step.index(),
        draft,
    })
}

async fn open_link(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Response, AppError> {
    let link = find_link(&state, &token).await?;
    let link = match link.resolve(&state.guest.public_base_url) {
        LinkAccess::Redirect(location) => {
            tracing::debug!("Used link opened, redirecting");
            return Ok(Redirect::to(&location).into_response());
        }
        LinkAccess::Open(link) => link,
    };

    let hotel = load_hotel(&state, link.hotel_id).await?;
    let booking = link_booking(&state, &link).await?;
    // guest data stored but the link was never flipped
    if booking.link_id == Some(link.id) {
        return Ok(Redirect::to(&link.completion_url(&state.guest.public_base_url)).into_response());
    }
    booking.ensure_awaiting_guest()?;

    let draft = load_draft(&state, &token).await?;
    let deposit_cents = booking.deposit_cents(hotel.booking_config.deposit_percentage);

    Ok(Json(LinkView {
        hotel: hotel.public_profile(),
        booking: link.snapshot,
        deposit_cents,
        steps: WizardStep::ALL.to_vec(),
        draft,
    })
    .into_response())
}

async fn save_draft(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(incoming): Json<WizardDraft>,
) -> Result<Json<DraftResponse>, AppError> {
    open_session(&state, &token).await?;
    let mut draft = load_draft(&state, &token).await?;
    draft.merge_form(incoming);
    store_draft(&state, &token, &draft).await?;
    Ok(draft_response(draft))
}

async fn advance_draft(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(incoming): Json<WizardDraft>,
) -> Result<Json<DraftResponse>, AppError> {
    let session = open_session(&state, &token).await?;
    let mut draft = load_draft(&state, &token).await?;
    draft.merge_form(incoming);

    // form values are kept even when the step does not validate
    let outcome = draft.advance(&session.context(&state));
    store_draft(&state, &token, &draft).await?;
    outcome?;

    Ok(draft_response(draft))
}

async fn back_draft(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<DraftResponse>, AppError> {
    open_session(&state, &token).await?;
    let mut draft = load_draft(&state, &token).await?;
    draft.back();
    store_draft(&state, &token, &draft).await?;
    Ok(draft_response(draft))
}

async fn create_upload(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(req): Json<UploadRequest>,
) -> Result<Json<UploadTicket>, AppError> {
    let session = open_session(&state, &token).await?;
    let ticket = prepare_upload(
        session.booking.id,
        &req,
        Utc::now().timestamp_millis(),
        &state.guest.storage_base_url,
        state.guest.max_upload_bytes,
    )?;
    tracing::debug!("Upload ticket issued for booking {}", session.booking.id);
    Ok(Json(ticket))
}

async fn submit(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(incoming): Json<WizardDraft>,
) -> Result<Json<SubmitResponse>, AppError> {
    let session = open_session(&state, &token).await?;

    let mut draft = load_draft(&state, &token).await?;
    draft.merge_form(incoming);
    let data = match draft.clone().into_guest_data(&session.context(&state), Utc::now()) {
        Ok(data) => data,
        Err(e) => {
            store_draft(&state, &token, &draft).await?;
            return Err(e.into());
        }
    };
    let GuestSession { mut link, hotel, mut booking } = session;

    let previous_status = booking.status;
    booking.finalize(data, link.id)?;
    link.mark_used()?;

    // only one writer gets the booking out of Pending: a concurrent
    // submission or a hotelier status change makes this fail
    if !state.booking_repo.update_booking_if(&booking, previous_status).await? {
        tracing::warn!("Booking {} left {} before link {} was submitted", booking.id, previous_status, link.id);
        return Err(AppError::ConflictError(format!(
            "Booking {} no longer takes guest data",
            booking.id
        )));
    }
    match state.link_repo.mark_link_used(&link).await {
        Ok(true) => {}
        Ok(false) => tracing::warn!("Link {} was already marked used", link.id),
        Err(e) => tracing::error!("Guest data stored but link {} not marked used: {}", link.id, e),
    }
    discard_draft(&state, &token).await;

    let Some(data) = booking.guest_data.as_ref() else {
        return Err(AppError::InternalServerError(format!(
            "booking {} lost its guest data",
            booking.id
        )));
    };

    let now = Utc::now().timestamp();
    let key = booking.id.to_string();
    publish_event(
        &state,
        TOPIC_GUEST_DATA_SUBMITTED,
        &key,
        &GuestDataSubmittedEvent {
            hotel_id: hotel.id,
            booking_id: booking.id,
            link_id: link.id,
            traveler_count: data.party_size(),
            document_count: data.documents.len(),
            timestamp: now,
        },
    )
    .await;
    publish_event(
        &state,
        TOPIC_BOOKING_STATUS_CHANGED,
        &key,
        &BookingStatusChangedEvent {
            hotel_id: hotel.id,
            booking_id: booking.id,
            from: previous_status.to_string(),
            to: booking.status.to_string(),
            actor: format!("guest:{}", link.id),
            timestamp: now,
        },
    )
    .await;

    try_send_mail(&state, &hotel, guest_confirmation_email(&hotel, &booking, data)).await;
    try_send_mail(&state, &hotel, hotel_notification_email(&hotel, &booking, data)).await;

    tracing::info!("Guest data submitted for booking {} via link {}", booking.id, link.id);
    Ok(Json(SubmitResponse {
        booking_id: booking.id,
        status: booking.status,
        redirect_url: link.completion_url(&state.guest.public_base_url),
    }))
}
