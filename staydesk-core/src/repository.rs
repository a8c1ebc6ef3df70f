use async_trait::async_trait;
use uuid::Uuid;

use crate::booking::{Booking, BookingStatus};
use crate::hotel::Hotel;
use crate::link::BookingLink;
use crate::mail::OutboundMail;
use crate::wizard::WizardDraft;
use crate::CoreResult;

/// Repository trait for hotel tenants
#[async_trait]
pub trait HotelRepository: Send + Sync {
    async fn create_hotel(&self, hotel: &Hotel) -> CoreResult<()>;

    async fn get_hotel(&self, id: Uuid) -> CoreResult<Option<Hotel>>;

    async fn get_hotel_by_slug(&self, slug: &str) -> CoreResult<Option<Hotel>>;

    async fn list_hotels(&self) -> CoreResult<Vec<Hotel>>;

    async fn update_hotel(&self, hotel: &Hotel) -> CoreResult<()>;

    /// Removes the hotel together with its bookings and links.
    async fn delete_hotel(&self, id: Uuid) -> CoreResult<bool>;
}

/// Repository trait for bookings, always scoped by hotel
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn create_booking(&self, booking: &Booking) -> CoreResult<()>;

    async fn get_booking(&self, hotel_id: Uuid, id: Uuid) -> CoreResult<Option<Booking>>;

    async fn list_bookings(
        &self,
        hotel_id: Uuid,
        status: Option<BookingStatus>,
    ) -> CoreResult<Vec<Booking>>;

    /// Writes the booking only while its stored status is still `expected`.
    async fn update_booking_if(&self, booking: &Booking, expected: BookingStatus) -> CoreResult<bool>;

    async fn delete_booking(&self, hotel_id: Uuid, id: Uuid) -> CoreResult<bool>;
}

/// Repository trait for guest links
#[async_trait]
pub trait LinkRepository: Send + Sync {
    async fn create_link(&self, link: &BookingLink) -> CoreResult<()>;

    async fn get_link_by_token(&self, token: &str) -> CoreResult<Option<BookingLink>>;

    async fn find_active_link(&self, booking_id: Uuid) -> CoreResult<Option<BookingLink>>;

    /// Compare-and-set: flips the link to used only if it is still active.
    /// Returns false when another request got there first.
    async fn mark_link_used(&self, link: &BookingLink) -> CoreResult<bool>;

    async fn delete_links_for_booking(&self, booking_id: Uuid) -> CoreResult<u64>;
}

/// Server-side wizard progress, keyed by link token
#[async_trait]
pub trait DraftStore: Send + Sync {
    async fn load_draft(&self, token: &str) -> CoreResult<Option<WizardDraft>>;

    async fn save_draft(&self, token: &str, draft: &WizardDraft, ttl_seconds: u64) -> CoreResult<()>;

    async fn discard_draft(&self, token: &str) -> CoreResult<()>;
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: &str, key: &str, payload: &str) -> CoreResult<()>;
}

#[async_trait]
pub trait MailOutbox: Send + Sync {
    async fn enqueue(&self, mail: &OutboundMail) -> CoreResult<()>;
}
