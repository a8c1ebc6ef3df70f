use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use staydesk_core::link::{BookingLink, BookingSnapshot, LinkStatus};
use staydesk_core::repository::LinkRepository;
use staydesk_core::CoreResult;

use crate::db_err;

pub struct StoreLinkRepository {
    pool: PgPool,
}

impl StoreLinkRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct LinkRow {
    id: Uuid,
    token: String,
    hotel_id: Uuid,
    booking_id: Uuid,
    snapshot: Json<BookingSnapshot>,
    status: String,
    created_at: DateTime<Utc>,
    used_at: Option<DateTime<Utc>>,
}

impl LinkRow {
    fn into_link(self) -> CoreResult<BookingLink> {
        Ok(BookingLink {
            id: self.id,
            token: self.token,
            hotel_id: self.hotel_id,
            booking_id: self.booking_id,
            snapshot: self.snapshot.0,
            status: LinkStatus::parse(&self.status)?,
            created_at: self.created_at,
            used_at: self.used_at,
        })
    }
}

const SELECT_LINK: &str =
    "SELECT id, token, hotel_id, booking_id, snapshot, status, created_at, used_at FROM booking_links";

#[async_trait]
impl LinkRepository for StoreLinkRepository {
    async fn create_link(&self, link: &BookingLink) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO booking_links (id, token, hotel_id, booking_id, snapshot, status, created_at, used_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(link.id)
        .bind(&link.token)
        .bind(link.hotel_id)
        .bind(link.booking_id)
        .bind(Json(&link.snapshot))
        .bind(link.status.as_str())
        .bind(link.created_at)
        .bind(link.used_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_link_by_token(&self, token: &str) -> CoreResult<Option<BookingLink>> {
        let row = sqlx::query_as::<_, LinkRow>(&format!("{} WHERE token = $1", SELECT_LINK))
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(LinkRow::into_link).transpose()
    }

    async fn find_active_link(&self, booking_id: Uuid) -> CoreResult<Option<BookingLink>> {
        let row = sqlx::query_as::<_, LinkRow>(&format!(
            "{} WHERE booking_id = $1 AND status = 'ACTIVE'",
            SELECT_LINK
        ))
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.map(LinkRow::into_link).transpose()
    }

    async fn mark_link_used(&self, link: &BookingLink) -> CoreResult<bool> {
        let used_at = link.used_at.unwrap_or_else(Utc::now);
        let result = sqlx::query(
            "UPDATE booking_links SET status = 'USED', used_at = $2 WHERE id = $1 AND status = 'ACTIVE'",
        )
        .bind(link.id)
        .bind(used_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_links_for_booking(&self, booking_id: Uuid) -> CoreResult<u64> {
        let result = sqlx::query("DELETE FROM booking_links WHERE booking_id = $1")
            .bind(booking_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected())
    }
}
