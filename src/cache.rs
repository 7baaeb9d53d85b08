use std::fmt::Display;

use redis::{AsyncCommands, Client};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Seconds a cached trending result stays fresh; staleness inside this
/// window is acceptable for a read-only popularity query
pub const TRENDING_TTL: u64 = 300;

/// Seconds a cached similar-movies result stays fresh
pub const SIMILAR_TTL: u64 = 600;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Trending,
    Similar(Uuid),
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::Trending => write!(f, "rec:trending"),
            CacheKey::Similar(movie_id) => write!(f, "rec:similar:{}", movie_id),
        }
    }
}

/// Creates a Redis client for caching
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Message for asynchronous cache writes
struct CacheWriteMessage {
    key: String,
    value: String,
    ttl: u64,
}

/// Redis-backed cache for recommendation reads.
///
/// Reads happen on the request path; writes go through a background task
/// so a slow Redis never delays a response. Cache writes are advisory:
/// a dropped write only costs a recompute.
#[derive(Clone)]
pub struct Cache {
    redis_client: Client,
    write_tx: mpsc::UnboundedSender<CacheWriteMessage>,
}

impl Cache {
    pub fn new(redis_client: Client) -> Self {
        let (write_tx, mut write_rx) = mpsc::unbounded_channel::<CacheWriteMessage>();

        let client = redis_client.clone();
        tokio::spawn(async move {
            while let Some(msg) = write_rx.recv().await {
                if let Err(e) = Self::write_to_redis(&client, msg).await {
                    tracing::warn!(error = %e, "Cache write failed");
                }
            }
        });

        Self {
            redis_client,
            write_tx,
        }
    }

    async fn write_to_redis(client: &Client, msg: CacheWriteMessage) -> AppResult<()> {
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: () = conn.set_ex(msg.key, msg.value, msg.ttl).await?;
        Ok(())
    }

    /// Retrieves a cached value by key; `None` on miss
    pub async fn get<T: serde::de::DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> AppResult<Option<T>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let cached: Option<String> = conn.get(format!("{}", key)).await?;

        match cached {
            Some(json) => {
                let data = serde_json::from_str(&json).map_err(|e| {
                    AppError::Internal(format!("Cache deserialization error: {}", e))
                })?;
                Ok(Some(data))
            }
            None => Ok(None),
        }
    }

    /// Stores a value without blocking the caller; the write happens on
    /// the background task
    pub fn set_in_background<T: serde::Serialize>(&self, key: &CacheKey, value: &T, ttl: u64) {
        let json = match serde_json::to_string(value) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "Cache serialization error");
                return;
            }
        };

        let msg = CacheWriteMessage {
            key: format!("{}", key),
            value: json,
            ttl,
        };

        if let Err(e) = self.write_tx.send(msg) {
            tracing::error!(error = %e, "Failed to send cache write message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_display_trending() {
        assert_eq!(format!("{}", CacheKey::Trending), "rec:trending");
    }

    #[test]
    fn test_cache_key_display_similar() {
        let id = Uuid::from_u128(7);
        assert_eq!(
            format!("{}", CacheKey::Similar(id)),
            format!("rec:similar:{}", id)
        );
    }
}
