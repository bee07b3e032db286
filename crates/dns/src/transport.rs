//! Network collaborators: a TXT record resolver and an HTTPS GET client.
//!
//! The strategies only see the [`TxtResolver`] and [`HttpsFetcher`] traits;
//! `hickory-resolver` and `reqwest` back the production implementations.

use crate::errors::TransportError;
use async_trait::async_trait;
use hickory_resolver::config::ResolverConfig;
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::TokioResolver;
use reqwest::header::ACCEPT;
use reqwest::{redirect, Client};
use std::time::Duration;
use tracing::warn;

const MAX_REDIRECTS: usize = 5;

/// TXT values for one query name, in answer order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxtAnswer {
    pub records: Vec<String>,
    /// Smallest TTL across the answer, in seconds.
    pub ttl: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait TxtResolver: Send + Sync {
    /// TXT records for `name`. An empty or missing answer is `NoRecords`.
    async fn lookup_txt(&self, name: &str) -> Result<TxtAnswer, TransportError>;
}

#[async_trait]
pub trait HttpsFetcher: Send + Sync {
    async fn get(&self, url: &str, accept: Option<&str>) -> Result<HttpResponse, TransportError>;
}

/// TXT lookups through the system's configured DNS servers.
#[derive(Clone)]
pub struct HickoryTxtResolver {
    resolver: TokioResolver,
}

impl HickoryTxtResolver {
    /// Build from `/etc/resolv.conf` (or the platform equivalent), falling
    /// back to Cloudflare upstreams when the system config is unusable.
    pub fn from_system(timeout: Duration) -> Self {
        let mut builder = match TokioResolver::builder_tokio() {
            Ok(builder) => builder,
            Err(err) => {
                warn!("System DNS configuration unavailable, using Cloudflare: {err}");
                TokioResolver::builder_with_config(
                    ResolverConfig::cloudflare(),
                    TokioConnectionProvider::default(),
                )
            }
        };

        builder.options_mut().timeout = timeout;
        Self {
            resolver: builder.build(),
        }
    }

    pub fn with_resolver(resolver: TokioResolver) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl TxtResolver for HickoryTxtResolver {
    async fn lookup_txt(&self, name: &str) -> Result<TxtAnswer, TransportError> {
        let lookup = match self.resolver.txt_lookup(name).await {
            Ok(lookup) => lookup,
            Err(err) if err.is_no_records_found() => return Err(TransportError::NoRecords),
            Err(err) => return Err(err.into()),
        };

        let records: Vec<String> = lookup
            .iter()
            .map(|txt| {
                txt.txt_data()
                    .iter()
                    .map(|chunk| String::from_utf8_lossy(chunk))
                    .collect::<String>()
            })
            .collect();

        if records.is_empty() {
            return Err(TransportError::NoRecords);
        }

        let ttl = lookup
            .as_lookup()
            .records()
            .iter()
            .map(|record| record.ttl())
            .min();

        Ok(TxtAnswer { records, ttl })
    }
}

/// HTTPS GETs with a per-request timeout and a bounded redirect chain.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpsFetcher for ReqwestFetcher {
    async fn get(&self, url: &str, accept: Option<&str>) -> Result<HttpResponse, TransportError> {
        let mut request = self.client.get(url);
        if let Some(accept) = accept {
            request = request.header(ACCEPT, accept);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpResponse { status, body })
    }
}
