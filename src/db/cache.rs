use redis::{AsyncCommands, Client};
use std::fmt::Display;

use crate::error::{AppError, AppResult};

/// Typed keys for the Redis cache
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// External source search: (source id or "all", query)
    SourceSearch(String, String),
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::SourceSearch(source, query) => {
                write!(f, "srcsearch:{}:{}", source, query.to_lowercase())
            }
        }
    }
}

/// Creates a Redis client for caching
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Cache handler for storing and retrieving JSON payloads from Redis
///
/// External source searches are slow and rate-limited upstream, so their
/// results are cached with a TTL. The cache is best-effort: callers treat
/// any cache error as a miss.
#[derive(Clone)]
pub struct Cache {
    redis_client: Client,
}

impl Cache {
    pub fn new(redis_client: Client) -> Self {
        Self { redis_client }
    }

    /// Retrieves and deserializes a cached value, `None` on miss
    pub async fn get<T: serde::de::DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> AppResult<Option<T>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let cached: Option<String> = conn.get(key.to_string()).await?;

        match cached {
            Some(json) => {
                let value = serde_json::from_str(&json).map_err(|e| {
                    AppError::Internal(format!("Cache deserialization error: {}", e))
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Serializes and stores a value with the given TTL in seconds
    pub async fn put<T: serde::Serialize>(
        &self,
        key: &CacheKey,
        value: &T,
        ttl: u64,
    ) -> AppResult<()> {
        let json = serde_json::to_string(value)
            .map_err(|e| AppError::Internal(format!("Cache serialization error: {}", e)))?;

        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let _: () = conn.set_ex(key.to_string(), json, ttl).await?;

        tracing::debug!(key = %key, ttl, "Cached value");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_lowercases_query() {
        let key = CacheKey::SourceSearch("openlibrary".to_string(), "DUNE".to_string());
        assert_eq!(key.to_string(), "srcsearch:openlibrary:dune");
    }

    #[test]
    fn test_cache_key_all_sources() {
        let key = CacheKey::SourceSearch("all".to_string(), "The Hobbit".to_string());
        assert_eq!(key.to_string(), "srcsearch:all:the hobbit");
    }
}
