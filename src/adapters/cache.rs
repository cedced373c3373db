use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Identifies one request: method, path and query parameters sorted by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub method: String,
    pub path: String,
    pub params: Vec<(String, String)>,
}

impl CacheKey {
    pub fn new(method: &str, path: &str, params: &[(&str, &str)]) -> Self {
        let mut params: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        params.sort();
        Self {
            method: method.to_ascii_uppercase(),
            path: path.trim_matches('/').to_string(),
            params,
        }
    }
}

struct Entry {
    value: serde_json::Value,
    stored_at: Instant,
}

/// Cache of decoded GET responses shared with [`DcimClient`].
///
/// Entries older than the TTL are treated as misses and dropped. The client
/// clears the whole cache after any request that modifies data.
///
/// [`DcimClient`]: crate::adapters::http::DcimClient
pub struct ResponseCache {
    ttl: Option<Duration>,
    entries: Mutex<HashMap<CacheKey, Entry>>,
}

impl ResponseCache {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<serde_json::Value> {
        let mut entries = self.entries.lock().ok()?;
        let expired = match (entries.get(key), self.ttl) {
            (None, _) => return None,
            (Some(entry), Some(ttl)) => entry.stored_at.elapsed() >= ttl,
            (Some(_), None) => false,
        };
        if expired {
            entries.remove(key);
            return None;
        }
        entries.get(key).map(|e| e.value.clone())
    }

    pub fn insert(&self, key: CacheKey, value: serde_json::Value) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                key,
                Entry {
                    value,
                    stored_at: Instant::now(),
                },
            );
        }
    }

    /// Drop every entry whose path starts with `prefix`.
    pub fn invalidate_prefix(&self, prefix: &str) {
        let prefix = prefix.trim_matches('/');
        if let Ok(mut entries) = self.entries.lock() {
            entries.retain(|key, _| !key.path.starts_with(prefix));
        }
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_ignores_param_order_and_slashes() {
        let a = CacheKey::new("get", "/api/v1/device", &[("Label", "x"), ("Cabinet", "1")]);
        let b = CacheKey::new("GET", "api/v1/device/", &[("Cabinet", "1"), ("Label", "x")]);
        assert_eq!(a, b);

        let c = CacheKey::new("GET", "api/v1/device", &[("Label", "y")]);
        assert_ne!(a, c);
    }

    #[test]
    fn test_get_and_insert() {
        let cache = ResponseCache::default();
        let key = CacheKey::new("GET", "api/v1/cabinet/1", &[]);

        assert!(cache.get(&key).is_none());
        cache.insert(key.clone(), json!({"cabinet": []}));
        assert_eq!(cache.get(&key), Some(json!({"cabinet": []})));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = ResponseCache::new(Some(Duration::from_millis(0)));
        let key = CacheKey::new("GET", "api/v1/cabinet/1", &[]);

        cache.insert(key.clone(), json!(1));
        assert!(cache.get(&key).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidation() {
        let cache = ResponseCache::default();
        cache.insert(CacheKey::new("GET", "api/v1/device", &[("Label", "a")]), json!(1));
        cache.insert(CacheKey::new("GET", "api/v1/device/1", &[]), json!(2));
        cache.insert(CacheKey::new("GET", "api/v1/cabinet/1", &[]), json!(3));

        cache.invalidate_prefix("/api/v1/device");
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}
