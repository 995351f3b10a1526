use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use folio_core::provider::AnalyticsProvider;

/// Builds a ready-to-use (already initialized) provider.
pub type ProviderFactory = Arc<dyn Fn() -> Box<dyn AnalyticsProvider> + Send + Sync>;

/// Name-keyed provider factories plus the instances built from them.
///
/// Instances are created on first [`get`](Self::get) and cached, so repeated
/// lookups return the same `Arc`.
#[derive(Default)]
pub struct ProviderRegistry {
    factories: RwLock<HashMap<String, ProviderFactory>>,
    active: RwLock<HashMap<String, Arc<dyn AnalyticsProvider>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the factory for `name`. A cached instance built
    /// from a previous factory is dropped.
    pub async fn register<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn AnalyticsProvider> + Send + Sync + 'static,
    {
        let name = name.into();
        self.active.write().await.remove(&name);
        self.factories.write().await.insert(name, Arc::new(factory));
    }

    /// Return the cached instance for `name`, building it on first use.
    /// `None` if no factory is registered under that name.
    pub async fn get(&self, name: &str) -> Option<Arc<dyn AnalyticsProvider>> {
        if let Some(provider) = self.active.read().await.get(name) {
            return Some(Arc::clone(provider));
        }

        let factory = self.factories.read().await.get(name).cloned()?;
        let mut active = self.active.write().await;
        // Another caller may have built it while we waited for the lock.
        let provider = active
            .entry(name.to_string())
            .or_insert_with(|| Arc::from(factory()));
        Some(Arc::clone(provider))
    }

    /// Every instantiated provider, ordered by name.
    pub async fn get_all(&self) -> Vec<Arc<dyn AnalyticsProvider>> {
        let active = self.active.read().await;
        let mut names: Vec<&String> = active.keys().collect();
        names.sort();
        names
            .into_iter()
            .filter_map(|name| active.get(name).map(Arc::clone))
            .collect()
    }

    pub async fn registered_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn has(&self, name: &str) -> bool {
        self.factories.read().await.contains_key(name)
    }

    pub async fn remove(&self, name: &str) {
        self.factories.write().await.remove(name);
        self.active.write().await.remove(name);
    }

    /// Drop every factory and instance.
    pub async fn clear(&self) {
        self.factories.write().await.clear();
        self.active.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use folio_core::{
        event::{PageViewData, ServerContext},
        provider::{ProviderConfig, ProviderResult},
    };

    struct Named(&'static str);

    #[async_trait]
    impl AnalyticsProvider for Named {
        fn name(&self) -> &str {
            self.0
        }
        fn initialize(&mut self, _config: &ProviderConfig) {}
        fn is_configured(&self) -> bool {
            true
        }
        async fn track_page_view(
            &self,
            _data: &PageViewData,
            _context: Option<&ServerContext>,
        ) -> ProviderResult {
            ProviderResult::ok(self.0, 0)
        }
    }

    #[tokio::test]
    async fn get_builds_once_and_caches() {
        let registry = ProviderRegistry::new();
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        registry
            .register("alpha", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Box::new(Named("alpha"))
            })
            .await;

        let first = registry.get("alpha").await.expect("registered");
        let second = registry.get("alpha").await.expect("registered");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_names_return_none() {
        let registry = ProviderRegistry::new();
        assert!(registry.get("missing").await.is_none());
        assert!(!registry.has("missing").await);
    }

    #[tokio::test]
    async fn get_all_returns_only_instantiated() {
        let registry = ProviderRegistry::new();
        registry.register("beta", || Box::new(Named("beta"))).await;
        registry.register("alpha", || Box::new(Named("alpha"))).await;
        assert!(registry.get_all().await.is_empty());

        registry.get("beta").await;
        registry.get("alpha").await;
        let names: Vec<String> = registry
            .get_all()
            .await
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(names, vec!["alpha", "beta"]);
        assert_eq!(registry.registered_names().await, vec!["alpha", "beta"]);
    }

    #[tokio::test]
    async fn remove_and_clear_forget_factories_and_instances() {
        let registry = ProviderRegistry::new();
        registry.register("alpha", || Box::new(Named("alpha"))).await;
        registry.register("beta", || Box::new(Named("beta"))).await;
        registry.get("alpha").await;

        registry.remove("alpha").await;
        assert!(!registry.has("alpha").await);
        assert!(registry.get_all().await.is_empty());

        registry.get("beta").await;
        registry.clear().await;
        assert!(registry.registered_names().await.is_empty());
        assert!(registry.get_all().await.is_empty());
        assert!(registry.get("beta").await.is_none());
    }

    #[tokio::test]
    async fn re_registering_replaces_cached_instance() {
        let registry = ProviderRegistry::new();
        registry.register("p", || Box::new(Named("first"))).await;
        assert_eq!(registry.get("p").await.expect("p").name(), "first");

        registry.register("p", || Box::new(Named("second"))).await;
        assert_eq!(registry.get("p").await.expect("p").name(), "second");
    }
}
