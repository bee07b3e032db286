use super::ResolutionStrategy;
use crate::errors::StrategyError;
use crate::settings::ResolutionConfig;
use crate::transport::HttpsFetcher;
use crate::types::{ResolvedRecord, StrategyKind};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const DNS_JSON: &str = "application/dns-json";
const TXT_RECORD_TYPE: u16 = 16;
const RCODE_NOERROR: u32 = 0;

/// JSON DNS-over-HTTPS response (`application/dns-json`).
#[derive(Debug, Deserialize)]
struct DohResponse {
    #[serde(rename = "Status", default)]
    status: u32,
    #[serde(rename = "Answer", default)]
    answer: Vec<DohAnswer>,
}

#[derive(Debug, Deserialize)]
struct DohAnswer {
    #[serde(rename = "type", default)]
    record_type: u16,
    #[serde(rename = "TTL", default)]
    ttl: Option<u64>,
    #[serde(default)]
    data: String,
}

/// TXT lookup over a JSON DNS-over-HTTPS endpoint, for networks where plain
/// DNS is blocked or untrusted. One provider is picked per engine.
pub struct DnsOverHttpsStrategy {
    config: Arc<ResolutionConfig>,
    fetcher: Arc<dyn HttpsFetcher>,
    provider: Option<String>,
}

impl DnsOverHttpsStrategy {
    pub fn new(config: Arc<ResolutionConfig>, fetcher: Arc<dyn HttpsFetcher>) -> Self {
        let provider = config
            .doh_providers
            .choose(&mut rand::thread_rng())
            .cloned();
        Self {
            config,
            fetcher,
            provider,
        }
    }

    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    fn query_url(&self, provider: &str, host: &str) -> Result<Url, StrategyError> {
        let query = self.config.txt_query_name(host);
        Url::parse_with_params(provider, &[("name", query.as_str()), ("type", "TXT")])
            .map_err(|err| StrategyError::Transport(format!("bad DoH provider {provider}: {err}")))
    }
}

/// `"\"a\" \"b\""` → `ab`; unquoted data is returned as is.
fn unquote_txt(data: &str) -> String {
    let data = data.trim();
    if !data.starts_with('"') {
        return data.to_string();
    }
    data.split('"').skip(1).step_by(2).collect()
}

#[async_trait]
impl ResolutionStrategy for DnsOverHttpsStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::DnsOverHttps
    }

    async fn resolve(&self, host: &str) -> Result<ResolvedRecord, StrategyError> {
        let provider = self
            .provider
            .as_deref()
            .ok_or_else(|| StrategyError::Transport("no DNS-over-HTTPS provider".into()))?;
        let url = self.query_url(provider, host)?;

        let response = self.fetcher.get(url.as_str(), Some(DNS_JSON)).await?;
        if !response.is_success() {
            return Err(StrategyError::Transport(format!(
                "DNS-over-HTTPS provider answered {}",
                response.status
            )));
        }

        let parsed: DohResponse = serde_json::from_str(&response.body)
            .map_err(|err| StrategyError::Transport(format!("bad DoH response: {err}")))?;
        if parsed.status != RCODE_NOERROR {
            return Err(StrategyError::NoRecord);
        }

        let values: Vec<(String, Option<u64>)> = parsed
            .answer
            .iter()
            .filter(|answer| answer.record_type == TXT_RECORD_TYPE)
            .map(|answer| (unquote_txt(&answer.data), answer.ttl))
            .collect();

        if let Some((key, ttl)) = values
            .iter()
            .find_map(|(value, ttl)| self.config.key_from_txt(value).map(|key| (key, *ttl)))
        {
            return Ok(ResolvedRecord::new(
                key,
                ttl.map(Duration::from_secs),
                self.kind(),
            ));
        }

        if values
            .iter()
            .any(|(value, _)| self.config.mentions_record(value))
        {
            Err(StrategyError::Malformed)
        } else {
            Err(StrategyError::NoRecord)
        }
    }
}
