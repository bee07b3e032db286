use super::ResolutionStrategy;
use crate::errors::StrategyError;
use crate::settings::ResolutionConfig;
use crate::transport::TxtResolver;
use crate::types::{ResolvedRecord, StrategyKind};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Conventional DNS TXT lookup.
pub struct DnsTxtStrategy {
    config: Arc<ResolutionConfig>,
    resolver: Arc<dyn TxtResolver>,
}

impl DnsTxtStrategy {
    pub fn new(config: Arc<ResolutionConfig>, resolver: Arc<dyn TxtResolver>) -> Self {
        Self { config, resolver }
    }
}

#[async_trait]
impl ResolutionStrategy for DnsTxtStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::DnsTxt
    }

    async fn resolve(&self, host: &str) -> Result<ResolvedRecord, StrategyError> {
        let query = self.config.txt_query_name(host);
        let answer = self.resolver.lookup_txt(&query).await?;

        if let Some(key) = answer
            .records
            .iter()
            .find_map(|value| self.config.key_from_txt(value))
        {
            let ttl = answer.ttl.map(|secs| Duration::from_secs(secs.into()));
            return Ok(ResolvedRecord::new(key, ttl, self.kind()));
        }

        if answer
            .records
            .iter()
            .any(|value| self.config.mentions_record(value))
        {
            Err(StrategyError::Malformed)
        } else {
            Err(StrategyError::NoRecord)
        }
    }
}
