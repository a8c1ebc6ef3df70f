use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use staydesk_core::booking::{Booking, BookingStatus, RoomRequest};
use staydesk_core::guest::GuestData;
use staydesk_core::repository::BookingRepository;
use staydesk_core::{CoreError, CoreResult};
use staydesk_shared::Masked;

use crate::{db_err, StoreError};

pub struct StoreBookingRepository {
    pool: PgPool,
}

impl StoreBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    hotel_id: Uuid,
    guest_first_name: String,
    guest_last_name: String,
    guest_email: Option<String>,
    check_in: NaiveDate,
    check_out: NaiveDate,
    total_price_cents: i64,
    currency: String,
    rooms: Json<Vec<RoomRequest>>,
    notes: Option<String>,
    status: String,
    guest_data: Option<Json<GuestData>>,
    link_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = CoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let status: BookingStatus = row.status.parse().map_err(|_| {
            CoreError::from(StoreError::CorruptRow(format!(
                "booking {} has unknown status {}",
                row.id, row.status
            )))
        })?;

        Ok(Booking {
            id: row.id,
            hotel_id: row.hotel_id,
            guest_first_name: row.guest_first_name,
            guest_last_name: row.guest_last_name,
            guest_email: row.guest_email.map(Masked),
            check_in: row.check_in,
            check_out: row.check_out,
            total_price_cents: row.total_price_cents,
            currency: row.currency,
            rooms: row.rooms.0,
            notes: row.notes,
            status,
            guest_data: row.guest_data.map(|g| g.0),
            link_id: row.link_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_BOOKING: &str = "SELECT id, hotel_id, guest_first_name, guest_last_name, guest_email, check_in, check_out, total_price_cents, currency, rooms, notes, status, guest_data, link_id, created_at, updated_at FROM bookings";

#[async_trait]
impl BookingRepository for StoreBookingRepository {
    async fn create_booking(&self, booking: &Booking) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO bookings (id, hotel_id, guest_first_name, guest_last_name, guest_email, check_in, check_out,
                                  total_price_cents, currency, rooms, notes, status, guest_data, link_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(booking.id)
        .bind(booking.hotel_id)
        .bind(&booking.guest_first_name)
        .bind(&booking.guest_last_name)
        .bind(booking.guest_email.as_ref().map(|e| e.expose().clone()))
        .bind(booking.check_in)
        .bind(booking.check_out)
        .bind(booking.total_price_cents)
        .bind(&booking.currency)
        .bind(Json(&booking.rooms))
        .bind(&booking.notes)
        .bind(booking.status.as_str())
        .bind(booking.guest_data.as_ref().map(Json))
        .bind(booking.link_id)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_booking(&self, hotel_id: Uuid, id: Uuid) -> CoreResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "{} WHERE hotel_id = $1 AND id = $2",
            SELECT_BOOKING
        ))
        .bind(hotel_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(Booking::try_from).transpose()
    }

    async fn list_bookings(
        &self,
        hotel_id: Uuid,
        status: Option<BookingStatus>,
    ) -> CoreResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "{} WHERE hotel_id = $1 AND ($2::TEXT IS NULL OR status = $2) ORDER BY check_in, created_at",
            SELECT_BOOKING
        ))
        .bind(hotel_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(Booking::try_from).collect()
    }

    async fn update_booking_if(&self, booking: &Booking, expected: BookingStatus) -> CoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET guest_first_name = $3, guest_last_name = $4, guest_email = $5, check_in = $6, check_out = $7,
                total_price_cents = $8, currency = $9, rooms = $10, notes = $11, status = $12,
                guest_data = $13, link_id = $14, updated_at = $15
            WHERE hotel_id = $1 AND id = $2 AND status = $16
            "#,
        )
        .bind(booking.hotel_id)
        .bind(booking.id)
        .bind(&booking.guest_first_name)
        .bind(&booking.guest_last_name)
        .bind(booking.guest_email.as_ref().map(|e| e.expose().clone()))
        .bind(booking.check_in)
        .bind(booking.check_out)
        .bind(booking.total_price_cents)
        .bind(&booking.currency)
        .bind(Json(&booking.rooms))
        .bind(&booking.notes)
        .bind(booking.status.as_str())
        .bind(booking.guest_data.as_ref().map(Json))
        .bind(booking.link_id)
        .bind(booking.updated_at)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 && self.get_booking(booking.hotel_id, booking.id).await?.is_none() {
            return Err(CoreError::NotFound(format!("Booking {}", booking.id)));
        }
        Ok(result.rows_affected() == 1)
    }

    async fn delete_booking(&self, hotel_id: Uuid, id: Uuid) -> CoreResult<bool> {
        let result = sqlx::query("DELETE FROM bookings WHERE hotel_id = $1 AND id = $2")
            .bind(hotel_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }
}
