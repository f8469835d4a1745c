use crate::cache::{CacheError, CacheResult, KeyValueCache, MemoryCache};
use std::sync::Mutex;
use std::time::Duration;

/// Memory cache whose writes or deletes can be made to fail for keys
/// containing a given substring
#[derive(Default)]
pub struct FailingCache {
    inner: MemoryCache,
    fail_set: Mutex<Vec<String>>,
    fail_delete: Mutex<Vec<String>>,
}

impl FailingCache {
    pub fn new(inner: MemoryCache) -> Self {
        Self {
            inner,
            ..Default::default()
        }
    }

    pub fn fail_set_on(self, pattern: &str) -> Self {
        self.fail_set.lock().unwrap().push(pattern.to_string());
        self
    }

    pub fn fail_delete_on(self, pattern: &str) -> Self {
        self.fail_delete.lock().unwrap().push(pattern.to_string());
        self
    }

    fn matches(patterns: &Mutex<Vec<String>>, key: &str) -> bool {
        patterns
            .lock()
            .unwrap()
            .iter()
            .any(|pattern| key.contains(pattern.as_str()))
    }
}

#[async_trait::async_trait]
impl KeyValueCache for FailingCache {
    fn backend(&self) -> &'static str {
        "failing"
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        if Self::matches(&self.fail_set, key) {
            return Err(CacheError::Connection(format!("set refused for {}", key)));
        }
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        if Self::matches(&self.fail_delete, key) {
            return Err(CacheError::Connection(format!("delete refused for {}", key)));
        }
        self.inner.delete(key).await
    }
}
