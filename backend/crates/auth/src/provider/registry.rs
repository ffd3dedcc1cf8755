//! Provider Registry
//!
//! Explicit key to provider map, built once at start-up and shared
//! read-only afterwards.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::provider::Provider;

#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provider` under `key` (lowercased). Re-registering a key
    /// replaces the previous provider.
    pub fn register(&mut self, key: impl AsRef<str>, provider: Arc<dyn Provider>) -> &mut Self {
        let key = key.as_ref().to_lowercase();
        tracing::info!(provider = %key, name = provider.name(), "Registered auth provider");
        if self.providers.insert(key.clone(), provider).is_some() {
            tracing::warn!(provider = %key, "Auth provider replaced");
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(&key.to_lowercase()).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.providers.contains_key(&key.to_lowercase())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.keys()).finish()
    }
}
