use uuid::Uuid;

pub const TOPIC_HOTEL_CREATED: &str = "hotel.created";
pub const TOPIC_BOOKING_CREATED: &str = "booking.created";
pub const TOPIC_BOOKING_STATUS_CHANGED: &str = "booking.status_changed";
pub const TOPIC_LINK_ISSUED: &str = "link.issued";
pub const TOPIC_GUEST_DATA_SUBMITTED: &str = "guest.data_submitted";
pub const TOPIC_MAIL_OUTBOUND: &str = "mail.outbound";

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct HotelCreatedEvent {
    pub hotel_id: Uuid,
    pub slug: String,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct BookingCreatedEvent {
    pub hotel_id: Uuid,
    pub booking_id: Uuid,
    pub check_in: chrono::NaiveDate,
    pub check_out: chrono::NaiveDate,
    pub total_price_cents: i64,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct BookingStatusChangedEvent {
    pub hotel_id: Uuid,
    pub booking_id: Uuid,
    pub from: String,
    pub to: String,
    pub actor: String,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct LinkIssuedEvent {
    pub hotel_id: Uuid,
    pub booking_id: Uuid,
    pub link_id: Uuid,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct GuestDataSubmittedEvent {
    pub hotel_id: Uuid,
    pub booking_id: Uuid,
    pub link_id: Uuid,
    pub traveler_count: usize,
    pub document_count: usize,
    pub timestamp: i64,
}
