//! Ordered, short-circuiting resolution strategies.
//!
//! Each strategy maps a hostname to a key through one network mechanism.
//! [`StrategyChain`] runs the enabled ones in order (TXT, well-known file,
//! DNS-over-HTTPS), bounds each by a timeout and returns the first success.
//! Individual failures are absorbed; only exhaustion surfaces.

mod doh;
mod txt;
mod wellknown;

pub use doh::DnsOverHttpsStrategy;
pub use txt::DnsTxtStrategy;
pub use wellknown::WellKnownStrategy;

use crate::errors::*;
use crate::identifier::is_qualified;
use crate::settings::ResolutionConfig;
use crate::transport::{HttpsFetcher, TxtResolver};
use crate::types::*;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

#[async_trait]
pub trait ResolutionStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    async fn resolve(&self, host: &str) -> std::result::Result<ResolvedRecord, StrategyError>;
}

#[derive(Clone)]
pub struct StrategyChain {
    strategies: Vec<Arc<dyn ResolutionStrategy>>,
    timeout: Duration,
}

impl std::fmt::Debug for StrategyChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds: Vec<StrategyKind> = self.strategies.iter().map(|s| s.kind()).collect();
        f.debug_struct("StrategyChain")
            .field("strategies", &kinds)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl StrategyChain {
    /// Strategies run in the order given.
    pub fn new(strategies: Vec<Arc<dyn ResolutionStrategy>>, timeout: Duration) -> Self {
        Self {
            strategies,
            timeout,
        }
    }

    /// TXT, then well-known file, then DNS-over-HTTPS.
    pub fn standard(
        config: Arc<ResolutionConfig>,
        txt: Arc<dyn TxtResolver>,
        https: Arc<dyn HttpsFetcher>,
    ) -> Self {
        let strategies: Vec<Arc<dyn ResolutionStrategy>> = vec![
            Arc::new(DnsTxtStrategy::new(config.clone(), txt)),
            Arc::new(WellKnownStrategy::new(config.clone(), https.clone())),
            Arc::new(DnsOverHttpsStrategy::new(config.clone(), https)),
        ];
        Self::new(strategies, config.strategy_timeout)
    }

    pub fn kinds(&self) -> Vec<StrategyKind> {
        self.strategies.iter().map(|s| s.kind()).collect()
    }

    /// First key any enabled strategy produces for `host`.
    pub async fn resolve(&self, host: &str, options: &ResolveOptions) -> Result<ResolvedRecord> {
        if !is_qualified(host) {
            return Err(ResolutionError::UnqualifiedDomain {
                name: host.to_string(),
            });
        }

        let mut saw_malformed = false;

        for strategy in self.strategies.iter().filter(|s| options.allows(s.kind())) {
            let kind = strategy.kind();
            match timeout(self.timeout, strategy.resolve(host)).await {
                Ok(Ok(record)) => {
                    debug!(host, strategy = %kind, "Resolved");
                    return Ok(record);
                }
                Ok(Err(StrategyError::Malformed)) => {
                    saw_malformed = true;
                    debug!(host, strategy = %kind, "Record found but malformed");
                }
                Ok(Err(err)) => {
                    debug!(host, strategy = %kind, error = %err, "Strategy failed");
                }
                Err(_) => {
                    debug!(host, strategy = %kind, timeout = ?self.timeout, "Strategy timed out");
                }
            }
        }

        if saw_malformed {
            Err(ResolutionError::MalformedRecord {
                name: host.to_string(),
            })
        } else {
            Err(ResolutionError::NotFound {
                name: host.to_string(),
            })
        }
    }
}
