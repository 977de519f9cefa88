//! Redis-backed admission store.
//!
//! Each window is a sorted set scored by event time. The check-and-record
//! step runs as a single Lua script, which Redis executes without
//! interleaving other commands.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Script;
use tracing::info;

use super::check::CheckOutcome;
use super::store::{AdmissionRequest, AdmissionStore};
use crate::error::{KeygateError, Result};

/// KEYS: the three window keys.
/// ARGV: now, member, then (max, window_secs) for each window in KEYS order.
/// Returns {1, "0"} on admission or {0, "<wait>"} on rejection.
const ADMISSION_SCRIPT: &str = r#"
local now = tonumber(ARGV[1])
local member = ARGV[2]

local function check_window(key, max_events, window)
    redis.call('ZREMRANGEBYSCORE', key, '-inf', now - window)
    local count = redis.call('ZCARD', key)
    if count < max_events then
        return -1
    end
    local earliest = redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')
    if #earliest == 0 then
        return 0
    end
    return math.max(tonumber(earliest[2]) + window - now, 0)
end

local allowed = true
local max_wait = 0
for i = 1, #KEYS do
    local wait = check_window(KEYS[i], tonumber(ARGV[1 + 2 * i]), tonumber(ARGV[2 + 2 * i]))
    if wait >= 0 then
        allowed = false
        max_wait = math.max(max_wait, wait)
    end
end

if not allowed then
    return {0, tostring(max_wait)}
end

for i = 1, #KEYS do
    local window = tonumber(ARGV[2 + 2 * i])
    redis.call('ZADD', KEYS[i], now, member)
    redis.call('EXPIRE', KEYS[i], math.ceil(window))
end
return {1, "0"}
"#;

/// An [`AdmissionStore`] shared through Redis.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    script: Script,
}

impl RedisStore {
    /// Connect to the Redis server at `url`.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;
        info!("Connected to Redis admission store");
        Ok(Self::with_connection(connection))
    }

    /// Use an existing connection manager.
    pub fn with_connection(connection: ConnectionManager) -> Self {
        Self {
            connection,
            script: Script::new(ADMISSION_SCRIPT),
        }
    }
}

#[async_trait]
impl AdmissionStore for RedisStore {
    async fn check_and_record(&self, request: &AdmissionRequest) -> Result<CheckOutcome> {
        let mut invocation = self.script.prepare_invoke();
        for window in &request.windows {
            invocation.key(&window.key);
        }
        invocation.arg(request.now).arg(&request.member);
        for window in &request.windows {
            invocation.arg(window.max).arg(window.window_secs);
        }

        let mut connection = self.connection.clone();
        let (admitted, wait): (i64, String) = invocation.invoke_async(&mut connection).await?;

        if admitted == 1 {
            return Ok(CheckOutcome::admitted());
        }

        let wait_secs = wait
            .parse::<f64>()
            .map_err(|e| KeygateError::Store(format!("invalid wait {:?} from script: {}", wait, e)))?;
        Ok(CheckOutcome::rejected(wait_secs))
    }

    async fn load_cursor(&self, key: &str) -> Result<Option<String>> {
        let mut connection = self.connection.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut connection).await?;
        Ok(value)
    }

    async fn store_cursor(&self, key: &str, value: &str) -> Result<()> {
        let mut connection = self.connection.clone();
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .query_async(&mut connection)
            .await?;
        Ok(())
    }

    async fn occupancy(&self, key: &str, window_secs: f64, now: f64) -> Result<u64> {
        let mut connection = self.connection.clone();
        let count: u64 = redis::cmd("ZCOUNT")
            .arg(key)
            .arg(format!("({}", now - window_secs))
            .arg("+inf")
            .query_async(&mut connection)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitingConfig;
    use crate::ratelimit::{AdmissionCheck, Credential};
    use std::sync::Arc;

    fn redis_url() -> String {
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
    }

    #[tokio::test]
    #[ignore = "requires a running Redis server"]
    async fn test_script_admits_then_rejects() {
        let store = Arc::new(RedisStore::connect(&redis_url()).await.unwrap());
        let config = RateLimitingConfig {
            key_prefix: format!("keygate_test_{}", uuid::Uuid::new_v4()),
            ..RateLimitingConfig::default()
        };
        let check = AdmissionCheck::new(store.clone(), config.clone());
        let credential = Credential::new("key", 1, 10, 10);

        assert!(check.check(&credential, 100.0).await.admitted);

        let outcome = check.check(&credential, 104.0).await;
        assert!(!outcome.admitted);
        assert!((outcome.wait_secs - 6.0).abs() < 1e-6);

        let key = config.window_key("key", crate::ratelimit::Dimension::UnitsPerMinute);
        assert_eq!(store.occupancy(&key, 60.0, 104.0).await.unwrap(), 1);
    }
}
