#![allow(dead_code)]

use async_trait::async_trait;
use dwebx_dns::{
    DnsResolver, HttpResponse, HttpsFetcher, PersistentCache, PersistentCacheError,
    ResolutionConfig, TransportError, TxtAnswer, TxtResolver,
};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use url::Url;

pub const KEY: &str = "40a7f6b6147ae695bcbcff432f684c7bb5291ea339c28c1755896cdeb80bd2f9";
pub const DWEBX_ORG_KEY: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
pub const DBROWSER_KEY: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
pub const DOH_PROVIDER: &str = "https://doh.test/dns-query";

/// Which collaborator served a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    Txt(String),
    WellKnown(String),
    Doh(String),
}

/// In-memory stand-in for DNS, well-known files and a DoH provider.
#[derive(Default)]
pub struct MockNetwork {
    txt: RwLock<HashMap<String, Vec<String>>>,
    wellknown: RwLock<HashMap<String, (u16, String)>>,
    doh: RwLock<HashMap<String, Vec<String>>>,
    hung: RwLock<Vec<String>>,
    probes: Mutex<Vec<Probe>>,
}

impl MockNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// dwebx.org publishes TXT; dbrowser.com publishes only well-known and
    /// DoH; the bad record host publishes a broken TXT; example.com only SPF.
    pub fn reference() -> Arc<Self> {
        let net = Self::new();
        net.set_txt("dwebx.org", &[&format!("dwebxkey={DWEBX_ORG_KEY}")]);
        net.set_wellknown("dwebx.org", 200, &format!("dwebx://{DWEBX_ORG_KEY}\nttl=3600"));
        net.set_wellknown("dbrowser.com", 200, &format!("dwebx://{DBROWSER_KEY}\nttl=3600"));
        net.set_doh("dbrowser.com", &[&format!("\"dwebxkey={DBROWSER_KEY}\"")]);
        net.set_txt("bad-dwebx-record1.dbrowser.com", &["dwebxkey=not-a-key"]);
        net.set_txt("example.com", &["v=spf1 -all"]);
        net.set_wellknown("example.com", 404, "Not Found");
        net
    }

    pub fn set_txt(&self, name: &str, records: &[&str]) {
        self.txt.write().insert(
            name.to_string(),
            records.iter().map(|r| r.to_string()).collect(),
        );
    }

    pub fn set_wellknown(&self, host: &str, status: u16, body: &str) {
        self.wellknown
            .write()
            .insert(host.to_string(), (status, body.to_string()));
    }

    pub fn set_doh(&self, name: &str, records: &[&str]) {
        self.doh.write().insert(
            name.to_string(),
            records.iter().map(|r| r.to_string()).collect(),
        );
    }

    /// Every probe for `name` never answers.
    pub fn hang(&self, name: &str) {
        self.hung.write().push(name.to_string());
    }

    pub fn probes(&self) -> Vec<Probe> {
        self.probes.lock().clone()
    }

    pub fn probe_count(&self) -> usize {
        self.probes.lock().len()
    }

    pub fn clear_probes(&self) {
        self.probes.lock().clear();
    }

    async fn maybe_hang(&self, name: &str) {
        let hung = self.hung.read().iter().any(|h| h == name);
        if hung {
            tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
        }
    }
}

#[async_trait]
impl TxtResolver for MockNetwork {
    async fn lookup_txt(&self, name: &str) -> Result<TxtAnswer, TransportError> {
        self.probes.lock().push(Probe::Txt(name.to_string()));
        self.maybe_hang(name).await;
        let records = self
            .txt
            .read()
            .get(name)
            .cloned()
            .ok_or(TransportError::NoRecords)?;
        Ok(TxtAnswer {
            records,
            ttl: Some(300),
        })
    }
}

#[async_trait]
impl HttpsFetcher for MockNetwork {
    async fn get(&self, url: &str, _accept: Option<&str>) -> Result<HttpResponse, TransportError> {
        let url = Url::parse(url).map_err(|err| TransportError::Other(err.to_string()))?;
        let host = url.host_str().unwrap_or_default().to_string();

        if url.path().starts_with("/.well-known/") {
            self.probes.lock().push(Probe::WellKnown(host.clone()));
            self.maybe_hang(&host).await;
            let (status, body) = self
                .wellknown
                .read()
                .get(&host)
                .cloned()
                .ok_or_else(|| TransportError::Other(format!("could not connect to {host}")))?;
            return Ok(HttpResponse { status, body });
        }

        let name = url
            .query_pairs()
            .find(|(k, _)| k == "name")
            .map(|(_, v)| v.into_owned())
            .unwrap_or_default();
        self.probes.lock().push(Probe::Doh(name.clone()));
        self.maybe_hang(&name).await;

        let body = match self.doh.read().get(&name) {
            Some(records) => serde_json::json!({
                "Status": 0,
                "Answer": records
                    .iter()
                    .map(|data| serde_json::json!({ "name": name, "type": 16, "TTL": 600, "data": data }))
                    .collect::<Vec<_>>(),
            }),
            None => serde_json::json!({ "Status": 3 }),
        };
        Ok(HttpResponse {
            status: 200,
            body: body.to_string(),
        })
    }
}

pub fn test_config() -> ResolutionConfig {
    ResolutionConfig::default()
        .with_doh_providers(vec![DOH_PROVIDER.to_string()])
        .with_strategy_timeout(Duration::from_secs(2))
}

pub fn resolver_over(net: &Arc<MockNetwork>) -> DnsResolver {
    DnsResolver::with_transports(test_config(), net.clone(), net.clone())
}

/// Persistent cache backed by a map; writes are reported on a channel.
pub struct MemoryPersistentCache {
    entries: RwLock<HashMap<String, String>>,
    writes: mpsc::UnboundedSender<(String, String, Duration)>,
    fail_writes: bool,
}

impl MemoryPersistentCache {
    pub fn new(
        seed: &[(&str, &str)],
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<(String, String, Duration)>) {
        Self::build(seed, false)
    }

    pub fn failing_writes(
        seed: &[(&str, &str)],
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<(String, String, Duration)>) {
        Self::build(seed, true)
    }

    fn build(
        seed: &[(&str, &str)],
        fail_writes: bool,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<(String, String, Duration)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let entries = seed
            .iter()
            .map(|(name, key)| (name.to_string(), key.to_string()))
            .collect();
        (
            Arc::new(Self {
                entries: RwLock::new(entries),
                writes: tx,
                fail_writes,
            }),
            rx,
        )
    }
}

#[async_trait]
impl PersistentCache for MemoryPersistentCache {
    async fn read(&self, name: &str) -> Result<String, PersistentCacheError> {
        self.entries
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| PersistentCacheError::Miss {
                name: name.to_string(),
            })
    }

    async fn write(&self, name: &str, key: &str, ttl: Duration) -> Result<(), PersistentCacheError> {
        let _ = self.writes.send((name.to_string(), key.to_string(), ttl));
        if self.fail_writes {
            return Err(PersistentCacheError::Backend("read-only store".into()));
        }
        self.entries
            .write()
            .insert(name.to_string(), key.to_string());
        Ok(())
    }
}
