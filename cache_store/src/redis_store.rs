use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use std::time::Duration;
use tax_core::{CacheError, CacheStore};
use tracing::{debug, info};

/// Redis-backed shared cache.
///
/// Keys are namespaced with a configurable prefix so several deployments can
/// share one instance.
#[derive(Clone)]
pub struct RedisCache {
    connection: MultiplexedConnection,
    key_prefix: String,
}

fn backend(e: redis::RedisError) -> CacheError {
    CacheError::Backend(e.to_string())
}

impl RedisCache {
    pub async fn connect(redis_url: &str, key_prefix: &str) -> Result<Self, CacheError> {
        let client = Client::open(redis_url).map_err(backend)?;
        let mut connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(backend)?;

        // Test the connection
        let _: String = redis::cmd("PING")
            .query_async(&mut connection)
            .await
            .map_err(backend)?;

        info!("Connected to Redis cache at {}", redis_url);
        Ok(Self {
            connection,
            key_prefix: key_prefix.to_string(),
        })
    }

    fn namespaced(&self, key: &str) -> String {
        if self.key_prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}:{}", self.key_prefix, key)
        }
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(self.namespaced(key)).await.map_err(backend)?;
        if value.is_some() {
            debug!("Redis cache hit: {}", key);
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        // SET EX rejects a zero expiry
        let seconds = ttl.as_secs().max(1);
        let mut conn = self.connection.clone();
        let _: () = conn
            .set_ex(self.namespaced(key), value, seconds)
            .await
            .map_err(backend)?;
        Ok(())
    }
}
