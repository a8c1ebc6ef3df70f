use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use staydesk_core::hotel::{BankDetails, BookingConfig, Branding, ContactInfo, Hotel, HotelPermissions, SmtpSettings};
use staydesk_core::repository::HotelRepository;
use staydesk_core::{CoreError, CoreResult};

use crate::db_err;

pub struct StoreHotelRepository {
    pool: PgPool,
}

impl StoreHotelRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal struct for type-safe querying
#[derive(sqlx::FromRow)]
struct HotelRow {
    id: Uuid,
    name: String,
    slug: String,
    branding: Json<Branding>,
    contact: Json<ContactInfo>,
    bank: Option<Json<BankDetails>>,
    smtp: Option<Json<SmtpSettings>>,
    booking_config: Json<BookingConfig>,
    permissions: Json<HotelPermissions>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<HotelRow> for Hotel {
    fn from(row: HotelRow) -> Self {
        Hotel {
            id: row.id,
            name: row.name,
            slug: row.slug,
            branding: row.branding.0,
            contact: row.contact.0,
            bank: row.bank.map(|b| b.0),
            smtp: row.smtp.map(|s| s.0),
            booking_config: row.booking_config.0,
            permissions: row.permissions.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SELECT_HOTEL: &str = "SELECT id, name, slug, branding, contact, bank, smtp, booking_config, permissions, created_at, updated_at FROM hotels";

#[async_trait]
impl HotelRepository for StoreHotelRepository {
    async fn create_hotel(&self, hotel: &Hotel) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO hotels (id, name, slug, branding, contact, bank, smtp, booking_config, permissions, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(hotel.id)
        .bind(&hotel.name)
        .bind(&hotel.slug)
        .bind(Json(&hotel.branding))
        .bind(Json(&hotel.contact))
        .bind(hotel.bank.as_ref().map(Json))
        .bind(hotel.smtp.as_ref().map(Json))
        .bind(Json(&hotel.booking_config))
        .bind(Json(&hotel.permissions))
        .bind(hotel.created_at)
        .bind(hotel.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_hotel(&self, id: Uuid) -> CoreResult<Option<Hotel>> {
        let row = sqlx::query_as::<_, HotelRow>(&format!("{} WHERE id = $1", SELECT_HOTEL))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Hotel::from))
    }

    async fn get_hotel_by_slug(&self, slug: &str) -> CoreResult<Option<Hotel>> {
        let row = sqlx::query_as::<_, HotelRow>(&format!("{} WHERE slug = $1", SELECT_HOTEL))
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Hotel::from))
    }

    async fn list_hotels(&self) -> CoreResult<Vec<Hotel>> {
        let rows = sqlx::query_as::<_, HotelRow>(&format!("{} ORDER BY name", SELECT_HOTEL))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(Hotel::from).collect())
    }

    async fn update_hotel(&self, hotel: &Hotel) -> CoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE hotels
            SET name = $2, slug = $3, branding = $4, contact = $5, bank = $6, smtp = $7,
                booking_config = $8, permissions = $9, updated_at = $10
            WHERE id = $1
            "#,
        )
        .bind(hotel.id)
        .bind(&hotel.name)
        .bind(&hotel.slug)
        .bind(Json(&hotel.branding))
        .bind(Json(&hotel.contact))
        .bind(hotel.bank.as_ref().map(Json))
        .bind(hotel.smtp.as_ref().map(Json))
        .bind(Json(&hotel.booking_config))
        .bind(Json(&hotel.permissions))
        .bind(hotel.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("Hotel {}", hotel.id)));
        }
        Ok(())
    }

    async fn delete_hotel(&self, id: Uuid) -> CoreResult<bool> {
        // bookings and links go with it via ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM hotels WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }
}
