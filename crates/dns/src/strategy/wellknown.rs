use super::ResolutionStrategy;
use crate::errors::StrategyError;
use crate::settings::ResolutionConfig;
use crate::transport::HttpsFetcher;
use crate::types::{ResolvedRecord, StrategyKind};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// `GET https://<host>/.well-known/<record>`.
///
/// The first non-empty line of the body carries the key, as a protocol URL
/// (`dwebx://<key>`), a bare key, or a TXT-style `dwebxkey=<key>` value.
/// A later `ttl=<seconds>` line sets the TTL.
pub struct WellKnownStrategy {
    config: Arc<ResolutionConfig>,
    fetcher: Arc<dyn HttpsFetcher>,
}

impl WellKnownStrategy {
    pub fn new(config: Arc<ResolutionConfig>, fetcher: Arc<dyn HttpsFetcher>) -> Self {
        Self { config, fetcher }
    }

    pub fn url_for(&self, host: &str) -> String {
        format!("https://{host}/.well-known/{}", self.config.record_name)
    }

    fn key_from_line(&self, line: &str) -> Option<String> {
        if let Some(captures) = self.config.protocol_pattern.captures(line) {
            let authority = captures.get(1)?.as_str();
            return self
                .config
                .is_key(authority)
                .then(|| authority.to_ascii_lowercase());
        }
        if self.config.is_key(line) {
            return Some(line.to_ascii_lowercase());
        }
        self.config.key_from_txt(line)
    }

    fn parse_body(&self, body: &str) -> Option<(String, Option<Duration>)> {
        let mut lines = body.lines().map(str::trim).filter(|line| !line.is_empty());
        let key = self.key_from_line(lines.next()?)?;
        let ttl = lines.find_map(parse_ttl_line);
        Some((key, ttl))
    }
}

fn parse_ttl_line(line: &str) -> Option<Duration> {
    let (name, value) = line.split_once('=')?;
    if !name.trim().eq_ignore_ascii_case("ttl") {
        return None;
    }
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[async_trait]
impl ResolutionStrategy for WellKnownStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::WellKnown
    }

    async fn resolve(&self, host: &str) -> Result<ResolvedRecord, StrategyError> {
        let response = self.fetcher.get(&self.url_for(host), None).await?;
        if !response.is_success() {
            return Err(StrategyError::NoRecord);
        }

        let (key, ttl) = self
            .parse_body(&response.body)
            .ok_or(StrategyError::Malformed)?;
        Ok(ResolvedRecord::new(key, ttl, self.kind()))
    }
}
