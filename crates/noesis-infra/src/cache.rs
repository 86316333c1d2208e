//! Smart Cache (§4.1): fingerprint key + TTL + single-flight over an
//! external KV.

use async_trait::async_trait;
use noesis_types::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

/// The external KV this cache wraps. A Redis-backed implementation and an
/// in-memory implementation both satisfy this; callers depend only on the
/// trait.
#[async_trait]
#[allow(async_fn_in_trait)]
pub trait CacheBackend: Send + Sync {
    async fn get_raw(&self, key: &str) -> Result<Option<String>>;
    async fn set_raw(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()>;
}

/// Normalize a single JSON value the way the fingerprint key construction
/// requires: strings are trimmed and internal whitespace collapsed,
/// `null`/missing reads as `""`. Non-string values are left as-is so their
/// canonical JSON form participates in the hash.
fn normalize_value(value: &Value) -> Value {
    match value {
        Value::String(s) => {
            let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
            Value::String(collapsed)
        }
        Value::Null => Value::String(String::new()),
        other => other.clone(),
    }
}

fn normalize_request_data(data: &serde_json::Map<String, Value>) -> serde_json::Map<String, Value> {
    let mut normalized = serde_json::Map::new();
    for (k, v) in data {
        normalized.insert(k.clone(), normalize_value(v));
    }
    normalized
}

/// Deterministic MD5-hex fingerprint over a normalized, sorted-key JSON
/// object. `serde_json::Map` iterates in insertion order by default but
/// this crate enables no `preserve_order` feature, so map serialization is
/// already key-sorted — matching the `sort_keys=True` contract this is
/// grounded on.
pub fn generate_cache_key(request_data: &serde_json::Map<String, Value>) -> String {
    let normalized = normalize_request_data(request_data);
    let serialized = serde_json::to_string(&normalized).unwrap_or_default();
    format!("{:x}", md5::compute(serialized.as_bytes()))
}

/// `build_fingerprint_key(prefix, request_data)` (§4.1, §8 property 1):
/// prepend an interface-identifying prefix to the fingerprint.
pub fn build_fingerprint_key(prefix: &str, request_data: &serde_json::Map<String, Value>) -> String {
    format!("{prefix}{}", generate_cache_key(request_data))
}

type InFlight = Arc<Mutex<()>>;

/// The Smart Cache itself: wraps a `CacheBackend` with JSON
/// (de)serialization and in-process single-flight coalescing.
pub struct SmartCache<B: CacheBackend> {
    backend: B,
    in_flight: Mutex<HashMap<String, InFlight>>,
}

impl<B: CacheBackend> SmartCache<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Read-only lookup. Deserialization failure degrades to `None` and
    /// logs, never raises (§4.1 invariant b).
    pub async fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.backend.get_raw(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(key, error = %e, "cache value failed to deserialize, treating as miss");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key, error = %e, "cache backend read failed, treating as miss");
                None
            }
        }
    }

    /// Write-through. Serialization or backend failure logs and is
    /// swallowed: cache writes are best-effort (§4.1 invariant b/TTL
    /// policy note).
    pub async fn set<T: serde::Serialize>(&self, key: &str, value: &T, ttl_seconds: u64) {
        if ttl_seconds == 0 {
            return;
        }
        match serde_json::to_string(value) {
            Ok(raw) => {
                if let Err(e) = self.backend.set_raw(key, &raw, ttl_seconds).await {
                    warn!(key, error = %e, "cache write failed");
                }
            }
            Err(e) => warn!(key, error = %e, "cache value failed to serialize, skipping write"),
        }
    }

    /// `get_or_set`: a miss runs `producer` and writes exactly once.
    /// `ttl_seconds == 0` disables caching for this call (producer always
    /// runs, nothing is written). Concurrent callers on the same key await
    /// a shared per-key lock so `producer` runs at most once.
    pub async fn get_or_set<T, F, Fut>(&self, key: &str, ttl_seconds: u64, producer: F) -> Result<(T, bool)>
    where
        T: serde::Serialize + serde::de::DeserializeOwned + Clone,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if ttl_seconds == 0 {
            return Ok((producer().await?, false));
        }

        if let Some(value) = self.get::<T>(key).await {
            return Ok((value, true));
        }

        let lock = {
            let mut guards = self.in_flight.lock().await;
            guards.entry(key.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
        };
        let _permit = lock.lock().await;

        // Re-check: another caller may have populated the key while we
        // waited for the in-flight lock.
        if let Some(value) = self.get::<T>(key).await {
            return Ok((value, true));
        }

        let value = producer().await?;
        self.set(key, &value, ttl_seconds).await;
        Ok((value, false))
    }
}

/// Type-erased `CacheBackend`, for callers that want one concrete
/// `SmartCache<_>` type to hold regardless of which backend it wraps,
/// rather than threading a backend generic through unrelated structs.
pub struct DynCacheBackend(Arc<dyn CacheBackend>);

impl DynCacheBackend {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self(backend)
    }
}

#[async_trait]
impl CacheBackend for DynCacheBackend {
    async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        self.0.get_raw(key).await
    }

    async fn set_raw(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()> {
        self.0.set_raw(key, value, ttl_seconds).await
    }
}

/// In-memory `CacheBackend`, used by tests and by any deployment with no
/// Redis endpoint configured.
#[derive(Default)]
pub struct InMemoryCacheBackend {
    entries: Mutex<HashMap<String, (String, std::time::Instant, u64)>>,
}

#[async_trait]
impl CacheBackend for InMemoryCacheBackend {
    async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().await;
        Ok(entries.get(key).and_then(|(value, written_at, ttl)| {
            if written_at.elapsed().as_secs() < *ttl {
                Some(value.clone())
            } else {
                None
            }
        }))
    }

    async fn set_raw(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), (value.to_string(), std::time::Instant::now(), ttl_seconds));
        Ok(())
    }
}

/// Redis-backed `CacheBackend` using an async connection manager, the
/// production deployment target.
pub struct RedisCacheBackend {
    manager: redis::aio::ConnectionManager,
}

impl RedisCacheBackend {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| noesis_types::EngineError::CacheError(e.to_string()))?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| noesis_types::EngineError::CacheError(e.to_string()))?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl CacheBackend for RedisCacheBackend {
    async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        use redis::AsyncCommands;
        let mut conn = self.manager.clone();
        conn.get(key)
            .await
            .map_err(|e| noesis_types::EngineError::CacheError(e.to_string()))
    }

    async fn set_raw(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()> {
        use redis::AsyncCommands;
        let mut conn = self.manager.clone();
        let _: () = conn
            .set_ex(key, value, ttl_seconds)
            .await
            .map_err(|e| noesis_types::EngineError::CacheError(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn req(pairs: &[(&str, &str)]) -> serde_json::Map<String, Value> {
        let mut m = serde_json::Map::new();
        for (k, v) in pairs {
            m.insert(k.to_string(), json!(v));
        }
        m
    }

    #[test]
    fn fingerprint_is_stable_under_whitespace_normalization() {
        let a = req(&[("topic", "  降噪耳机  ")]);
        let b = req(&[("topic", "降噪耳机")]);
        assert_eq!(generate_cache_key(&a), generate_cache_key(&b));
    }

    #[test]
    fn fingerprint_is_stable_under_key_reordering() {
        let mut a = serde_json::Map::new();
        a.insert("brand".into(), json!("x"));
        a.insert("topic".into(), json!("y"));
        let mut b = serde_json::Map::new();
        b.insert("topic".into(), json!("y"));
        b.insert("brand".into(), json!("x"));
        assert_eq!(generate_cache_key(&a), generate_cache_key(&b));
    }

    #[test]
    fn prefix_is_included() {
        let data = req(&[("a", "b")]);
        let key = build_fingerprint_key("analyze:", &data);
        assert!(key.starts_with("analyze:"));
    }

    #[tokio::test]
    async fn get_or_set_writes_once_on_miss() {
        let cache = SmartCache::new(InMemoryCacheBackend::default());
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let (value, hit) = cache
            .get_or_set("k", 60, || {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, noesis_types::EngineError>("v".to_string())
                }
            })
            .await
            .unwrap();
        assert_eq!(value, "v");
        assert!(!hit);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let calls_clone2 = calls.clone();
        let (value2, hit2) = cache
            .get_or_set("k", 60, || async move {
                calls_clone2.fetch_add(1, Ordering::SeqCst);
                Ok::<_, noesis_types::EngineError>("v".to_string())
            })
            .await
            .unwrap();
        assert_eq!(value2, "v");
        assert!(hit2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_ttl_disables_caching() {
        let cache = SmartCache::new(InMemoryCacheBackend::default());
        let calls = Arc::new(AtomicU32::new(0));
        for _ in 0..2 {
            let calls_clone = calls.clone();
            cache
                .get_or_set("k", 0, || async move {
                    calls_clone.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, noesis_types::EngineError>(1)
                })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
