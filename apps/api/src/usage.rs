//! Usage ledger — counts successfully delivered cover letters per user.
//!
//! Called by the HTTP boundary only after a compile has resolved to a PDF;
//! failed or abandoned compiles never touch the ledger. Ledger errors are
//! logged and never turn a delivered letter into a failed response.

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::{info, warn};
use uuid::Uuid;

const USAGE_KEY_PREFIX: &str = "usage:cover_letters";

#[async_trait]
pub trait UsageLedger: Send + Sync {
    /// Records one successful letter for `user_id`.
    async fn record_success(&self, user_id: Uuid) -> anyhow::Result<()>;
}

pub fn usage_key(user_id: Uuid) -> String {
    format!("{USAGE_KEY_PREFIX}:{user_id}")
}

/// Increments a per-user counter in Redis.
pub struct RedisUsageLedger {
    client: redis::Client,
}

impl RedisUsageLedger {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl UsageLedger for RedisUsageLedger {
    async fn record_success(&self, user_id: Uuid) -> anyhow::Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let total: i64 = conn.incr(usage_key(user_id), 1).await?;
        info!("Recorded cover letter for user {user_id} (total {total})");
        Ok(())
    }
}

/// Fallback when no Redis is configured: the event is only logged.
pub struct LogUsageLedger;

#[async_trait]
impl UsageLedger for LogUsageLedger {
    async fn record_success(&self, user_id: Uuid) -> anyhow::Result<()> {
        info!("Cover letter delivered for user {user_id}");
        Ok(())
    }
}

/// Records usage if a user is known, swallowing ledger failures.
pub async fn record_delivery(ledger: &dyn UsageLedger, user_id: Option<Uuid>) {
    let Some(user_id) = user_id else {
        return;
    };
    if let Err(e) = ledger.record_success(user_id).await {
        warn!("Failed to record usage for user {user_id}: {e:#}");
    }
}
