//! Process-local adapters for every persistence seam. Used by the test
//! suites and by `STAYDESK__SERVER__BACKEND=memory` for local runs.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::booking::{Booking, BookingStatus};
use crate::hotel::Hotel;
use crate::link::{BookingLink, LinkStatus};
use crate::mail::OutboundMail;
use crate::repository::{
    BookingRepository, DraftStore, EventPublisher, HotelRepository, LinkRepository, MailOutbox,
};
use crate::wizard::WizardDraft;
use crate::{CoreError, CoreResult};

/// Hotels, bookings and links behind one lock so deletes cascade atomically.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Tables>,
}

#[derive(Default)]
struct Tables {
    hotels: HashMap<Uuid, Hotel>,
    bookings: HashMap<Uuid, Booking>,
    links: HashMap<Uuid, BookingLink>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HotelRepository for MemoryStore {
    async fn create_hotel(&self, hotel: &Hotel) -> CoreResult<()> {
        let mut t = self.inner.write().await;
        if t.hotels.values().any(|h| h.slug == hotel.slug) {
            return Err(CoreError::Conflict(format!("slug {} is taken", hotel.slug)));
        }
        t.hotels.insert(hotel.id, hotel.clone());
        Ok(())
    }

    async fn get_hotel(&self, id: Uuid) -> CoreResult<Option<Hotel>> {
        Ok(self.inner.read().await.hotels.get(&id).cloned())
    }

    async fn get_hotel_by_slug(&self, slug: &str) -> CoreResult<Option<Hotel>> {
        Ok(self.inner.read().await.hotels.values().find(|h| h.slug == slug).cloned())
    }

    async fn list_hotels(&self) -> CoreResult<Vec<Hotel>> {
        let mut hotels: Vec<Hotel> = self.inner.read().await.hotels.values().cloned().collect();
        hotels.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(hotels)
    }

    async fn update_hotel(&self, hotel: &Hotel) -> CoreResult<()> {
        let mut t = self.inner.write().await;
        match t.hotels.get_mut(&hotel.id) {
            Some(existing) => {
                *existing = hotel.clone();
                Ok(())
            }
            None => Err(CoreError::NotFound(format!("Hotel {}", hotel.id))),
        }
    }

    async fn delete_hotel(&self, id: Uuid) -> CoreResult<bool> {
        let mut t = self.inner.write().await;
        let removed = t.hotels.remove(&id).is_some();
        t.bookings.retain(|_, b| b.hotel_id != id);
        t.links.retain(|_, l| l.hotel_id != id);
        Ok(removed)
    }
}

#[async_trait]
impl BookingRepository for MemoryStore {
    async fn create_booking(&self, booking: &Booking) -> CoreResult<()> {
        self.inner.write().await.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn get_booking(&self, hotel_id: Uuid, id: Uuid) -> CoreResult<Option<Booking>> {
        Ok(self
            .inner
            .read()
            .await
            .bookings
            .get(&id)
            .filter(|b| b.hotel_id == hotel_id)
            .cloned())
    }

    async fn list_bookings(
        &self,
        hotel_id: Uuid,
        status: Option<BookingStatus>,
    ) -> CoreResult<Vec<Booking>> {
        let mut bookings: Vec<Booking> = self
            .inner
            .read()
            .await
            .bookings
            .values()
            .filter(|b| b.hotel_id == hotel_id)
            .filter(|b| status.map_or(true, |s| b.status == s))
            .cloned()
            .collect();
        bookings.sort_by(|a, b| a.check_in.cmp(&b.check_in).then(a.created_at.cmp(&b.created_at)));
        Ok(bookings)
    }

    async fn update_booking_if(&self, booking: &Booking, expected: BookingStatus) -> CoreResult<bool> {
        let mut t = self.inner.write().await;
        match t.bookings.get_mut(&booking.id) {
            Some(existing) if existing.hotel_id == booking.hotel_id => {
                if existing.status != expected {
                    return Ok(false);
                }
                *existing = booking.clone();
                Ok(true)
            }
            _ => Err(CoreError::NotFound(format!("Booking {}", booking.id))),
        }
    }

    async fn delete_booking(&self, hotel_id: Uuid, id: Uuid) -> CoreResult<bool> {
        let mut t = self.inner.write().await;
        let owned = t.bookings.get(&id).map_or(false, |b| b.hotel_id == hotel_id);
        if owned {
            t.bookings.remove(&id);
            t.links.retain(|_, l| l.booking_id != id);
        }
        Ok(owned)
    }
}

#[async_trait]
impl LinkRepository for MemoryStore {
    async fn create_link(&self, link: &BookingLink) -> CoreResult<()> {
        let mut t = self.inner.write().await;
        let has_active = t
            .links
            .values()
            .any(|l| l.booking_id == link.booking_id && l.status == LinkStatus::Active);
        if link.is_active() && has_active {
            return Err(CoreError::Conflict(format!(
                "booking {} already has an active link",
                link.booking_id
            )));
        }
        t.links.insert(link.id, link.clone());
        Ok(())
    }

    async fn get_link_by_token(&self, token: &str) -> CoreResult<Option<BookingLink>> {
        Ok(self.inner.read().await.links.values().find(|l| l.token == token).cloned())
    }

    async fn find_active_link(&self, booking_id: Uuid) -> CoreResult<Option<BookingLink>> {
        Ok(self
            .inner
            .read()
            .await
            .links
            .values()
            .find(|l| l.booking_id == booking_id && l.status == LinkStatus::Active)
            .cloned())
    }

    async fn mark_link_used(&self, link: &BookingLink) -> CoreResult<bool> {
        let mut t = self.inner.write().await;
        match t.links.get_mut(&link.id) {
            Some(stored) if stored.status == LinkStatus::Active => {
                stored.status = LinkStatus::Used;
                stored.used_at = link.used_at.or_else(|| Some(chrono::Utc::now()));
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(CoreError::NotFound(format!("Link {}", link.id))),
        }
    }

    async fn delete_links_for_booking(&self, booking_id: Uuid) -> CoreResult<u64> {
        let mut t = self.inner.write().await;
        let before = t.links.len();
        t.links.retain(|_, l| l.booking_id != booking_id);
        Ok((before - t.links.len()) as u64)
    }
}

/// Drafts kept in a map; TTL is ignored.
#[derive(Default)]
pub struct MemoryDraftStore {
    drafts: RwLock<HashMap<String, WizardDraft>>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DraftStore for MemoryDraftStore {
    async fn load_draft(&self, token: &str) -> CoreResult<Option<WizardDraft>> {
        Ok(self.drafts.read().await.get(token).cloned())
    }

    async fn save_draft(&self, token: &str, draft: &WizardDraft, _ttl_seconds: u64) -> CoreResult<()> {
        self.drafts.write().await.insert(token.to_string(), draft.clone());
        Ok(())
    }

    async fn discard_draft(&self, token: &str) -> CoreResult<()> {
        self.drafts.write().await.remove(token);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublishedEvent {
    pub topic: String,
    pub key: String,
    pub payload: String,
}

/// Keeps everything published so tests can assert on it.
#[derive(Default)]
pub struct RecordingPublisher {
    events: RwLock<Vec<PublishedEvent>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<PublishedEvent> {
        self.events.read().await.clone()
    }

    pub async fn topics(&self) -> Vec<String> {
        self.events.read().await.iter().map(|e| e.topic.clone()).collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, topic: &str, key: &str, payload: &str) -> CoreResult<()> {
        tracing::debug!("Recorded event {} for {}", topic, key);
        self.events.write().await.push(PublishedEvent {
            topic: topic.to_string(),
            key: key.to_string(),
            payload: payload.to_string(),
        });
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingOutbox {
    mails: RwLock<Vec<OutboundMail>>,
}

impl RecordingOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn mails(&self) -> Vec<OutboundMail> {
        self.mails.read().await.clone()
    }
}

#[async_trait]
impl MailOutbox for RecordingOutbox {
    async fn enqueue(&self, mail: &OutboundMail) -> CoreResult<()> {
        tracing::debug!("Recorded mail {} for hotel {}", mail.id, mail.hotel_id);
        self.mails.write().await.push(mail.clone());
        Ok(())
    }
}
