//! Resolution engine: parser → cache → strategy chain → cache write

use crate::cache::{CacheManager, PersistentCache};
use crate::errors::*;
use crate::identifier;
use crate::settings::ResolutionConfig;
use crate::strategy::StrategyChain;
use crate::transport::{HickoryTxtResolver, HttpsFetcher, ReqwestFetcher, TxtResolver};
use crate::types::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Name resolver
///
/// Resolves keys, versioned keys, domains, versioned domains and protocol
/// URLs to a lowercase 64-hex key:
/// 1. Direct keys are returned as-is (no cache, no network)
/// 2. In-memory cache, keyed by the caller's spelling of the name
/// 3. DNS TXT, well-known HTTPS file, DNS-over-HTTPS (first success wins)
/// 4. Persistent cache, only after every live strategy failed
///
/// Clones share the same cache; separate engines never do.
#[derive(Debug)]
pub struct DnsResolver {
    config: Arc<ResolutionConfig>,
    chain: Arc<StrategyChain>,
    cache: Arc<CacheManager>,
}

/// Build an engine backed by the system DNS resolver and a `reqwest` client.
///
/// `None` uses [`ResolutionConfig::default`], the `dwebx` protocol.
pub fn create_engine(config: Option<ResolutionConfig>) -> Result<DnsResolver> {
    DnsResolver::new(config.unwrap_or_default())
}

impl DnsResolver {
    /// Create a resolver with the production network collaborators
    pub fn new(config: ResolutionConfig) -> Result<Self> {
        let txt = Arc::new(HickoryTxtResolver::from_system(config.strategy_timeout));
        let https = ReqwestFetcher::new(config.strategy_timeout)
            .map_err(|err| ResolutionError::Settings(format!("HTTPS client: {err}")))?;
        Ok(Self::with_transports(config, txt, Arc::new(https)))
    }

    /// Create a resolver over caller-supplied DNS and HTTPS collaborators
    pub fn with_transports(
        config: ResolutionConfig,
        txt: Arc<dyn TxtResolver>,
        https: Arc<dyn HttpsFetcher>,
    ) -> Self {
        let config = Arc::new(config);
        let chain = StrategyChain::standard(config.clone(), txt, https);
        Self::with_chain(config, chain)
    }

    /// Create a resolver over an explicit strategy chain
    pub fn with_chain(config: Arc<ResolutionConfig>, chain: StrategyChain) -> Self {
        Self {
            config,
            chain: Arc::new(chain),
            cache: Arc::new(CacheManager::default()),
        }
    }

    /// Attach a persistent fallback cache. Starts from an empty in-memory cache.
    pub fn with_persistent_cache(self, persistent: Arc<dyn PersistentCache>) -> Self {
        Self {
            cache: Arc::new(CacheManager::new(Some(persistent))),
            ..self
        }
    }

    pub fn config(&self) -> &ResolutionConfig {
        &self.config
    }

    /// Resolve `input` to a key.
    pub async fn resolve_name(&self, input: &str, options: ResolveOptions) -> Result<String> {
        let host = match identifier::parse(input, &self.config)? {
            ParsedIdentifier::DirectKey(key) => return Ok(key),
            ParsedIdentifier::Hostname(host) => host,
        };
        let cache_name = input.trim();

        if !options.ignore_cache {
            if let Some(entry) = self.cache.lookup(cache_name) {
                debug!(name = cache_name, "In-memory cache hit");
                return Ok(entry.key);
            }
        }

        match self.chain.resolve(&host, &options).await {
            Ok(record) => {
                let ttl = self.config.effective_ttl(record.ttl);
                self.cache.store(cache_name, &record.key, ttl);
                self.cache.write_persistent(&host, &record.key, ttl);
                info!(
                    name = %host,
                    key = %record.key,
                    source = %record.source,
                    ttl_secs = ttl.as_secs(),
                    "Resolved name"
                );
                Ok(record.key)
            }
            Err(err) => match self.cache.read_persistent(&host).await {
                Ok(key) => {
                    info!(name = %host, error = %err, "Live resolution failed, using persistent cache");
                    Ok(key)
                }
                Err(_) => Err(err),
            },
        }
    }

    /// Callback-style adapter over [`resolve_name`](Self::resolve_name).
    ///
    /// Runs on the current tokio runtime; the callback receives exactly what
    /// the future would have produced. Aborting the handle before completion
    /// leaves the cache untouched.
    pub fn resolve_name_with_callback<F>(
        &self,
        input: impl Into<String>,
        options: ResolveOptions,
        callback: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(Result<String>) + Send + 'static,
    {
        let resolver = self.clone();
        let input = input.into();
        tokio::spawn(async move {
            let result = resolver.resolve_name(&input, options).await;
            callback(result);
        })
    }

    /// Live in-memory entries, name → key
    pub fn list_cache(&self) -> HashMap<String, String> {
        self.cache.list_all()
    }

    /// Drop every in-memory entry
    pub fn flush_cache(&self) {
        self.cache.flush();
    }
}

impl Clone for DnsResolver {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            chain: self.chain.clone(),
            cache: self.cache.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::ResolutionStrategy;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    const KEY: &str = "40a7f6b6147ae695bcbcff432f684c7bb5291ea339c28c1755896cdeb80bd2f9";

    struct CountingStrategy {
        calls: Arc<Mutex<usize>>,
        ttl: Option<Duration>,
    }

    #[async_trait]
    impl ResolutionStrategy for CountingStrategy {
        fn kind(&self) -> StrategyKind {
            StrategyKind::DnsTxt
        }

        async fn resolve(&self, _host: &str) -> std::result::Result<ResolvedRecord, StrategyError> {
            *self.calls.lock() += 1;
            Ok(ResolvedRecord::new(KEY.to_uppercase(), self.ttl, StrategyKind::DnsTxt))
        }
    }

    fn resolver(ttl: Option<Duration>) -> (DnsResolver, Arc<Mutex<usize>>) {
        let calls = Arc::new(Mutex::new(0));
        let chain = StrategyChain::new(
            vec![Arc::new(CountingStrategy {
                calls: calls.clone(),
                ttl,
            })],
            Duration::from_secs(1),
        );
        (
            DnsResolver::with_chain(Arc::new(ResolutionConfig::default()), chain),
            calls,
        )
    }

    #[tokio::test]
    async fn engine_defaults_to_dwebx_protocol() {
        let engine = create_engine(None).expect("default engine");
        assert_eq!(engine.config().record_name, "dwebx");

        let engine = create_engine(Some(ResolutionConfig::for_protocol("hyper")))
            .expect("custom engine");
        assert_eq!(engine.config().record_name, "hyper");

        // keys never touch the network, so this works offline
        let key = engine
            .resolve_name(&format!("hyper://{KEY}"), ResolveOptions::default())
            .await
            .unwrap();
        assert_eq!(key, KEY);
    }

    #[tokio::test]
    async fn direct_keys_bypass_everything() {
        let (resolver, calls) = resolver(None);
        let key = resolver
            .resolve_name(&format!("{}+5", KEY.to_uppercase()), ResolveOptions::default())
            .await
            .unwrap();
        assert_eq!(key, KEY);
        assert_eq!(*calls.lock(), 0);
        assert!(resolver.list_cache().is_empty());
    }

    #[tokio::test]
    async fn second_call_is_served_from_cache() {
        let (resolver, calls) = resolver(None);
        let first = resolver
            .resolve_name("dwebx.org", ResolveOptions::default())
            .await
            .unwrap();
        let second = resolver
            .resolve_name("dwebx.org", ResolveOptions::default())
            .await
            .unwrap();
        assert_eq!(first, KEY);
        assert_eq!(first, second);
        assert_eq!(*calls.lock(), 1);

        resolver
            .resolve_name("dwebx.org", ResolveOptions::default().ignore_cache())
            .await
            .unwrap();
        assert_eq!(*calls.lock(), 2);
    }

    #[tokio::test]
    async fn zero_ttl_results_are_not_cached() {
        let (resolver, calls) = resolver(Some(Duration::ZERO));
        resolver
            .resolve_name("dwebx.org", ResolveOptions::default())
            .await
            .unwrap();
        resolver
            .resolve_name("dwebx.org", ResolveOptions::default())
            .await
            .unwrap();
        assert_eq!(*calls.lock(), 2);
        assert!(resolver.list_cache().is_empty());
    }

    #[tokio::test]
    async fn invalid_input_fails_before_any_io() {
        let (resolver, calls) = resolver(None);
        for input in ["", "foo bar"] {
            let err = resolver
                .resolve_name(input, ResolveOptions::default())
                .await
                .unwrap_err();
            assert!(matches!(err, ResolutionError::InvalidInput { .. }));
        }
        assert_eq!(*calls.lock(), 0);
    }

    #[tokio::test]
    async fn callback_receives_the_same_result() {
        let (resolver, _) = resolver(None);
        let (tx, rx) = tokio::sync::oneshot::channel();
        resolver
            .resolve_name_with_callback("dwebx.org", ResolveOptions::default(), move |result| {
                let _ = tx.send(result);
            })
            .await
            .expect("callback task");
        assert_eq!(rx.await.unwrap().unwrap(), KEY);
    }

    #[tokio::test]
    async fn flush_clears_cache() {
        let (resolver, _) = resolver(None);
        resolver
            .resolve_name("dwebx.org", ResolveOptions::default())
            .await
            .unwrap();
        assert_eq!(resolver.list_cache().len(), 1);
        resolver.flush_cache();
        assert!(resolver.list_cache().is_empty());
    }
}
