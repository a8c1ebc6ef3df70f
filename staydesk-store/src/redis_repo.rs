use async_trait::async_trait;
use redis::{AsyncCommands, RedisResult};
use tracing::debug;

use staydesk_core::repository::DraftStore;
use staydesk_core::wizard::WizardDraft;
use staydesk_core::CoreResult;

use crate::StoreError;

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

fn draft_key(token: &str) -> String {
    format!("draft:{}", token)
}

fn rate_limit_pipeline(key: &str, window_seconds: i64) -> redis::Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic()
        .incr(key, 1)
        .cmd("EXPIRE")
        .arg(key)
        .arg(window_seconds)
        .arg("NX")
        .ignore();
    pipe
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    /// Fixed-window counter. Returns false once `limit` requests were seen
    /// inside the current window. The TTL is only set by the request that
    /// opens the window (`EXPIRE .. NX`), so rejected retries do not extend it.
    pub async fn check_rate_limit(&self, key: &str, limit: i64, window_seconds: i64) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let (count,): (i64,) = rate_limit_pipeline(key, window_seconds)
            .query_async(&mut conn)
            .await?;

        Ok(count <= limit)
    }

    async fn get_json(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }
}

#[async_trait]
impl DraftStore for RedisClient {
    async fn load_draft(&self, token: &str) -> CoreResult<Option<WizardDraft>> {
        let Some(raw) = self.get_json(&draft_key(token)).await? else {
            return Ok(None);
        };
        let draft = serde_json::from_str(&raw).map_err(StoreError::from)?;
        Ok(Some(draft))
    }

    async fn save_draft(&self, token: &str, draft: &WizardDraft, ttl_seconds: u64) -> CoreResult<()> {
        let payload = serde_json::to_string(draft).map_err(StoreError::from)?;
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(StoreError::from)?;
        conn.set_ex::<_, _, ()>(draft_key(token), payload, ttl_seconds)
            .await
            .map_err(StoreError::from)?;
        debug!("Draft saved for link at step {}", draft.step.index());
        Ok(())
    }

    async fn discard_draft(&self, token: &str) -> CoreResult<()> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(StoreError::from)?;
        conn.del::<_, ()>(draft_key(token)).await.map_err(StoreError::from)?;
        Ok(())
    }
}
