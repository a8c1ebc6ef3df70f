use std::sync::Arc;

use staydesk_core::memory::{MemoryDraftStore, MemoryStore, RecordingOutbox, RecordingPublisher};
use staydesk_core::repository::{
    BookingRepository, DraftStore, EventPublisher, HotelRepository, LinkRepository, MailOutbox,
};
use staydesk_store::app_config::Config;
use staydesk_store::RedisClient;

#[derive(Clone)]
pub struct AuthConfig {
    /// Signs and verifies session tokens.
    pub secret: String,
    pub expiration: u64,
    /// Shared secret of the identity provider's ID tokens.
    pub identity_secret: String,
    pub cookie_secure: bool,
}

/// Knobs of the guest-facing flow.
#[derive(Clone)]
pub struct GuestSettings {
    pub public_base_url: String,
    pub storage_base_url: String,
    pub max_upload_bytes: u64,
    pub draft_ttl_seconds: u64,
    pub arrival_horizon_days: i64,
}

#[derive(Clone)]
pub struct AppState {
    pub hotel_repo: Arc<dyn HotelRepository>,
    pub booking_repo: Arc<dyn BookingRepository>,
    pub link_repo: Arc<dyn LinkRepository>,
    pub drafts: Arc<dyn DraftStore>,
    pub events: Arc<dyn EventPublisher>,
    pub mail: Arc<dyn MailOutbox>,
    /// Rate limiting is skipped when absent.
    pub redis: Option<Arc<RedisClient>>,
    pub rate_limit_per_minute: i64,
    pub auth: AuthConfig,
    pub guest: GuestSettings,
}

impl AuthConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
            identity_secret: config.auth.identity_secret.clone(),
            cookie_secure: config.auth.cookie_secure,
        }
    }
}

impl GuestSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            public_base_url: config.links.public_base_url.clone(),
            storage_base_url: config.storage.public_base_url.clone(),
            max_upload_bytes: config.storage.max_upload_bytes,
            draft_ttl_seconds: config.wizard.draft_ttl_seconds,
            arrival_horizon_days: config.wizard.arrival_horizon_days,
        }
    }
}

impl AppState {
    /// Everything in-process; events and mail are only recorded.
    pub fn in_memory(auth: AuthConfig, guest: GuestSettings) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            hotel_repo: store.clone(),
            booking_repo: store.clone(),
            link_repo: store,
            drafts: Arc::new(MemoryDraftStore::new()),
            events: Arc::new(RecordingPublisher::new()),
            mail: Arc::new(RecordingOutbox::new()),
            redis: None,
            rate_limit_per_minute: 0,
            auth,
            guest,
        }
    }
}
