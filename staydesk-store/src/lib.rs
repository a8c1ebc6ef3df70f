pub mod app_config;
pub mod database;
pub mod hotel_repo;
pub mod booking_repo;
pub mod link_repo;
pub mod redis_repo;
pub mod events;

use staydesk_core::CoreError;

pub use database::DbClient;
pub use hotel_repo::StoreHotelRepository;
pub use booking_repo::StoreBookingRepository;
pub use link_repo::StoreLinkRepository;
pub use redis_repo::RedisClient;
pub use events::EventProducer;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Corrupt row: {0}")]
    CorruptRow(String),
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                CoreError::Conflict(db.message().to_string())
            }
            other => CoreError::StorageError(other.to_string()),
        }
    }
}

pub(crate) fn db_err(err: sqlx::Error) -> CoreError {
    StoreError::from(err).into()
}
