use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::booking::{Booking, RoomRequest};
use crate::hotel::Hotel;
use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkStatus {
    Active,
    Used,
}

impl LinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStatus::Active => "ACTIVE",
            LinkStatus::Used => "USED",
        }
    }

    pub fn parse(value: &str) -> CoreResult<Self> {
        match value {
            "ACTIVE" => Ok(LinkStatus::Active),
            "USED" => Ok(LinkStatus::Used),
            other => Err(CoreError::InternalError(format!("unknown link status {}", other))),
        }
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Booking as it looked when the link was issued; what the guest reviews.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingSnapshot {
    pub hotel_name: String,
    pub guest_first_name: String,
    pub guest_last_name: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub nights: i64,
    pub rooms: Vec<RoomRequest>,
    pub total_price_cents: i64,
    pub currency: String,
}

/// Single-use access token for the guest wizard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingLink {
    pub id: Uuid,
    pub token: String,
    pub hotel_id: Uuid,
    pub booking_id: Uuid,
    pub snapshot: BookingSnapshot,
    pub status: LinkStatus,
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

impl BookingLink {
    pub fn issue(hotel: &Hotel, booking: &Booking) -> CoreResult<Self> {
        if booking.hotel_id != hotel.id {
            return Err(CoreError::NotFound(format!("Booking {}", booking.id)));
        }
        booking.ensure_awaiting_guest()?;

        Ok(Self {
            id: Uuid::new_v4(),
            token: generate_token(),
            hotel_id: hotel.id,
            booking_id: booking.id,
            snapshot: BookingSnapshot {
                hotel_name: hotel.name.clone(),
                guest_first_name: booking.guest_first_name.clone(),
                guest_last_name: booking.guest_last_name.clone(),
                check_in: booking.check_in,
                check_out: booking.check_out,
                nights: booking.nights(),
                rooms: booking.rooms.clone(),
                total_price_cents: booking.total_price_cents,
                currency: booking.currency.clone(),
            },
            status: LinkStatus::Active,
            created_at: Utc::now(),
            used_at: None,
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == LinkStatus::Active
    }

    /// The only transition a link has: active to used.
    pub fn mark_used(&mut self) -> CoreResult<()> {
        if self.status == LinkStatus::Used {
            return Err(CoreError::LinkAlreadyUsed);
        }
        self.status = LinkStatus::Used;
        self.used_at = Some(Utc::now());
        Ok(())
    }

    pub fn guest_url(&self, public_base_url: &str) -> String {
        format!("{}/links/{}", public_base_url.trim_end_matches('/'), self.token)
    }

    pub fn completion_url(&self, public_base_url: &str) -> String {
        format!("{}/complete", self.guest_url(public_base_url))
    }

    pub fn resolve(self, public_base_url: &str) -> LinkAccess {
        match self.status {
            LinkStatus::Active => LinkAccess::Open(self),
            LinkStatus::Used => LinkAccess::Redirect(self.completion_url(public_base_url)),
        }
    }
}

/// Outcome of opening a link.
#[derive(Debug)]
pub enum LinkAccess {
    Open(BookingLink),
    Redirect(String),
}

/// 128 bits from a v4 UUID, hex encoded: 32 URL-safe characters.
pub fn generate_token() -> String {
    Uuid::new_v4().simple().to_string()
}

pub fn is_token_shaped(token: &str) -> bool {
    token.len() == 32 && token.chars().all(|c| c.is_ascii_hexdigit())
}
