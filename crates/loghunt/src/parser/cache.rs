use std::sync::Arc;

use dashmap::DashMap;
use regex::Regex;

/// Compiled-pattern cache keyed by pattern text.
///
/// Each distinct key is compiled at most once for the lifetime of the
/// cache: the entry API holds the shard lock while compiling. Compile
/// failures are cached too (`None`), so a broken pattern is not retried on
/// every call.
#[derive(Debug, Default)]
pub struct RegexCache {
    patterns: DashMap<String, Option<Arc<Regex>>>,
}

impl RegexCache {
    pub fn new() -> Self {
        Self {
            patterns: DashMap::new(),
        }
    }

    /// Look up `key`, building the regex with `build` on first use.
    pub fn get_or_build<F>(&self, key: &str, build: F) -> Option<Arc<Regex>>
    where
        F: FnOnce() -> Result<Regex, regex::Error>,
    {
        if let Some(hit) = self.patterns.get(key) {
            return hit.clone();
        }

        self.patterns
            .entry(key.to_string())
            .or_insert_with(|| match build() {
                Ok(re) => Some(Arc::new(re)),
                Err(e) => {
                    tracing::debug!(pattern = %key, error = %e, "pattern failed to compile");
                    None
                }
            })
            .clone()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
