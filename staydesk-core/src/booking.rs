use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use staydesk_shared::Masked;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::guest::GuestData;
use crate::hotel::BookingConfig;
use crate::identity::Actor;
use crate::validation::Validator;
use crate::{CoreError, CoreResult};

/// Booking status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    DataProvided,
    PartialPayment,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 6] = [
        BookingStatus::Pending,
        BookingStatus::DataProvided,
        BookingStatus::PartialPayment,
        BookingStatus::Confirmed,
        BookingStatus::Cancelled,
        BookingStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::DataProvided => "DATA_PROVIDED",
            BookingStatus::PartialPayment => "PARTIAL_PAYMENT",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Completed => "COMPLETED",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "Pending",
            BookingStatus::DataProvided => "Data Provided",
            BookingStatus::PartialPayment => "Partial Payment",
            BookingStatus::Confirmed => "Confirmed",
            BookingStatus::Cancelled => "Cancelled",
            BookingStatus::Completed => "Completed",
        }
    }

    pub fn allowed_next(&self) -> &'static [BookingStatus] {
        use BookingStatus::*;
        match self {
            Pending => &[DataProvided, Confirmed, Cancelled],
            DataProvided => &[PartialPayment, Confirmed, Cancelled],
            PartialPayment => &[Confirmed, Cancelled],
            Confirmed => &[Completed, Cancelled],
            Cancelled | Completed => &[],
        }
    }

    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        self.allowed_next().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_next().is_empty()
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BookingStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| CoreError::invalid("status", &format!("unknown booking status {}", s)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomRequest {
    pub category: String,
    pub meal_type: Option<String>,
    pub adults: u8,
    #[serde(default)]
    pub children: u8,
    #[serde(default)]
    pub child_ages: Vec<u8>,
}

/// A stay at one hotel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub hotel_id: Uuid,
    pub guest_first_name: String,
    pub guest_last_name: String,
    pub guest_email: Option<Masked<String>>,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub total_price_cents: i64,
    pub currency: String,
    pub rooms: Vec<RoomRequest>,
    pub notes: Option<String>,
    pub status: BookingStatus,
    pub guest_data: Option<GuestData>,
    /// Link the guest data came through.
    #[serde(default)]
    pub link_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewBooking {
    pub guest_first_name: String,
    pub guest_last_name: String,
    pub guest_email: Option<String>,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub total_price_cents: i64,
    pub rooms: Vec<RoomRequest>,
    pub notes: Option<String>,
}

/// Hotelier edits; any field left out stays as is.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingUpdate {
    pub guest_first_name: Option<String>,
    pub guest_last_name: Option<String>,
    pub guest_email: Option<String>,
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    pub total_price_cents: Option<i64>,
    pub rooms: Option<Vec<RoomRequest>>,
    pub notes: Option<String>,
}

impl NewBooking {
    pub fn validate(&self, config: &BookingConfig) -> CoreResult<()> {
        let mut v = Validator::new();
        v.require("guest_first_name", &self.guest_first_name);
        v.require("guest_last_name", &self.guest_last_name);
        if let Some(email) = self.guest_email.as_deref().filter(|e| !e.trim().is_empty()) {
            v.email("guest_email", email);
        }
        check_stay(&mut v, self.check_in, self.check_out, self.total_price_cents, &self.rooms, config);
        v.finish()
    }
}

/// Ten million in the major unit; keeps cent arithmetic far from overflow.
pub const MAX_PRICE_CENTS: i64 = 1_000_000_000;

/// Share of `total_cents`, rounded up to whole cents.
pub fn deposit_of(total_cents: i64, percentage: u8) -> i64 {
    let pct = i128::from(percentage.min(100));
    let cents = (i128::from(total_cents) * pct + 99) / 100;
    i64::try_from(cents).unwrap_or(i64::MAX)
}

fn check_stay(
    v: &mut Validator,
    check_in: NaiveDate,
    check_out: NaiveDate,
    price_cents: i64,
    rooms: &[RoomRequest],
    config: &BookingConfig,
) {
    v.check(check_out > check_in, "check_out", "must be after check-in");
    v.check(price_cents >= 0, "total_price_cents", "may not be negative");
    v.check(price_cents <= MAX_PRICE_CENTS, "total_price_cents", "is too large");
    v.check(!rooms.is_empty(), "rooms", "at least one room is required");

    for (i, room) in rooms.iter().enumerate() {
        let field = |name: &str| format!("rooms[{}].{}", i, name);
        if v.require(&field("category"), &room.category) {
            v.check(
                config.allows_room_category(&room.category),
                &field("category"),
                "is not offered by this hotel",
            );
        }
        if let Some(meal) = &room.meal_type {
            v.check(config.allows_meal_type(meal), &field("meal_type"), "is not offered by this hotel");
        }
        v.check(room.adults >= 1, &field("adults"), "at least one adult per room");
        v.check(
            room.child_ages.len() == room.children as usize,
            &field("child_ages"),
            "must list an age for every child",
        );
        v.check(
            room.child_ages.iter().all(|age| *age <= 17),
            &field("child_ages"),
            "children must be 17 or younger",
        );
    }
}

fn clean_email(email: Option<String>) -> Option<Masked<String>> {
    email
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .map(Masked)
}

impl Booking {
    pub fn create(hotel_id: Uuid, new: NewBooking, config: &BookingConfig) -> CoreResult<Self> {
        new.validate(config)?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            hotel_id,
            guest_first_name: new.guest_first_name.trim().to_string(),
            guest_last_name: new.guest_last_name.trim().to_string(),
            guest_email: clean_email(new.guest_email),
            check_in: new.check_in,
            check_out: new.check_out,
            total_price_cents: new.total_price_cents,
            currency: config.currency.clone(),
            rooms: new.rooms,
            notes: new.notes,
            status: BookingStatus::Pending,
            guest_data: None,
            link_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn guest_name(&self) -> String {
        format!("{} {}", self.guest_first_name, self.guest_last_name)
    }

    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    pub fn adult_count(&self) -> usize {
        self.rooms.iter().map(|r| r.adults as usize).sum()
    }

    pub fn child_count(&self) -> usize {
        self.rooms.iter().map(|r| r.children as usize).sum()
    }

    pub fn guest_count(&self) -> usize {
        self.adult_count() + self.child_count()
    }

    pub fn deposit_cents(&self, percentage: u8) -> i64 {
        deposit_of(self.total_price_cents, percentage)
    }

    /// Guest links only work while the booking is pending.
    pub fn ensure_awaiting_guest(&self) -> CoreResult<()> {
        if self.status != BookingStatus::Pending {
            return Err(CoreError::Conflict(format!(
                "booking {} is {} and no longer takes guest data",
                self.id, self.status
            )));
        }
        Ok(())
    }

    pub fn is_editable(&self) -> bool {
        matches!(self.status, BookingStatus::Pending | BookingStatus::DataProvided)
    }

    pub fn apply(&mut self, update: BookingUpdate, config: &BookingConfig) -> CoreResult<()> {
        if !self.is_editable() {
            return Err(CoreError::Conflict(format!(
                "booking {} can no longer be edited in status {}",
                self.id, self.status
            )));
        }

        let mut next = self.clone();
        if let Some(name) = update.guest_first_name {
            next.guest_first_name = name.trim().to_string();
        }
        if let Some(name) = update.guest_last_name {
            next.guest_last_name = name.trim().to_string();
        }
        if update.guest_email.is_some() {
            next.guest_email = clean_email(update.guest_email);
        }
        if let Some(date) = update.check_in {
            next.check_in = date;
        }
        if let Some(date) = update.check_out {
            next.check_out = date;
        }
        if let Some(price) = update.total_price_cents {
            next.total_price_cents = price;
        }
        if let Some(rooms) = update.rooms {
            next.rooms = rooms;
        }
        if update.notes.is_some() {
            next.notes = update.notes;
        }

        let mut v = Validator::new();
        v.require("guest_first_name", &next.guest_first_name);
        v.require("guest_last_name", &next.guest_last_name);
        if let Some(email) = &next.guest_email {
            v.email("guest_email", email.expose());
        }
        check_stay(&mut v, next.check_in, next.check_out, next.total_price_cents, &next.rooms, config);
        v.finish()?;

        next.updated_at = Utc::now();
        *self = next;
        Ok(())
    }

    /// Moves the booking to `next` and returns the previous status.
    pub fn transition(&mut self, next: BookingStatus, actor: &Actor) -> CoreResult<BookingStatus> {
        let guest_only = next == BookingStatus::DataProvided;
        let is_guest = matches!(actor, Actor::Guest { .. });
        if guest_only != is_guest || !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }

        let previous = self.status;
        self.status = next;
        self.updated_at = Utc::now();
        Ok(previous)
    }

    /// Stores the guest's submission. Happens exactly once per booking.
    pub fn finalize(&mut self, data: GuestData, link_id: Uuid) -> CoreResult<()> {
        if self.guest_data.is_some() {
            return Err(CoreError::Conflict(format!(
                "guest data for booking {} was already submitted",
                self.id
            )));
        }
        self.transition(BookingStatus::DataProvided, &Actor::Guest { link_id })?;
        if self.guest_email.is_none() {
            self.guest_email = Some(data.primary.email.clone());
        }
        self.guest_data = Some(data);
        self.link_id = Some(link_id);
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrivalSummary {
    pub booking_id: Uuid,
    pub guest_name: String,
    pub check_in: NaiveDate,
    pub nights: i64,
    pub status: BookingStatus,
}

/// Dashboard figures for one hotel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingSummary {
    pub total: usize,
    pub by_status: BTreeMap<BookingStatus, usize>,
    pub awaiting_guest_data: usize,
    pub secured_revenue_cents: i64,
    pub upcoming_arrivals: Vec<ArrivalSummary>,
}

impl BookingSummary {
    pub fn from_bookings(bookings: &[Booking], today: NaiveDate, horizon_days: i64) -> Self {
        let mut by_status: BTreeMap<BookingStatus, usize> =
            BookingStatus::ALL.iter().map(|s| (*s, 0)).collect();
        for booking in bookings {
            *by_status.entry(booking.status).or_default() += 1;
        }

        let secured_revenue_cents = bookings
            .iter()
            .filter(|b| {
                matches!(
                    b.status,
                    BookingStatus::PartialPayment | BookingStatus::Confirmed | BookingStatus::Completed
                )
            })
            .map(|b| b.total_price_cents)
            .sum();

        let horizon = today + chrono::Duration::days(horizon_days);
        let mut upcoming_arrivals: Vec<ArrivalSummary> = bookings
            .iter()
            .filter(|b| !matches!(b.status, BookingStatus::Cancelled | BookingStatus::Completed))
            .filter(|b| b.check_in >= today && b.check_in <= horizon)
            .map(|b| ArrivalSummary {
                booking_id: b.id,
                guest_name: b.guest_name(),
                check_in: b.check_in,
                nights: b.nights(),
                status: b.status,
            })
            .collect();
        upcoming_arrivals.sort_by_key(|a| a.check_in);

        Self {
            total: bookings.len(),
            awaiting_guest_data: by_status[&BookingStatus::Pending],
            by_status,
            secured_revenue_cents,
            upcoming_arrivals,
        }
    }
}
