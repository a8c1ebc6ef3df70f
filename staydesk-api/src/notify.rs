//! Fire-and-forget side effects that follow a committed change.

use serde::Serialize;

use staydesk_core::hotel::Hotel;
use staydesk_core::mail::{EmailMessage, OutboundMail};
use staydesk_core::CoreResult;
use staydesk_shared::pii::email_hint;

use crate::state::AppState;

/// Publishing failures are logged, never surfaced: the change is already stored.
pub async fn publish_event<E: Serialize>(state: &AppState, topic: &str, key: &str, event: &E) {
    let payload = match serde_json::to_string(event) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!("Failed to serialize {} event: {}", topic, e);
            return;
        }
    };
    if let Err(e) = state.events.publish(topic, key, &payload).await {
        tracing::warn!("Failed to publish {} for {}: {}", topic, key, e);
    }
}

/// Queues a message on the hotel's own SMTP account.
pub async fn send_mail(state: &AppState, hotel: &Hotel, message: EmailMessage) -> CoreResult<()> {
    let recipient = email_hint(&message.to);
    let mail = OutboundMail::for_hotel(hotel, message)?;
    state.mail.enqueue(&mail).await?;
    tracing::info!("Queued mail {} to {} for hotel {}", mail.id, recipient, hotel.id);
    Ok(())
}

/// Like `send_mail` but only logs failures.
pub async fn try_send_mail(state: &AppState, hotel: &Hotel, message: EmailMessage) -> bool {
    match send_mail(state, hotel, message).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Mail for hotel {} not sent: {}", hotel.id, e);
            false
        }
    }
}

/// Drafts expire on their own, so a failed discard is only logged.
pub async fn discard_draft(state: &AppState, token: &str) {
    if let Err(e) = state.drafts.discard_draft(token).await {
        tracing::warn!("Failed to discard wizard draft: {}", e);
    }
}
