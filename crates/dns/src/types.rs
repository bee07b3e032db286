//! Types shared by the parser, cache and strategy chain

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Classified caller input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParsedIdentifier {
    /// Already a fully-qualified key (lowercase hex). No network step.
    DirectKey(String),
    /// Domain name that needs resolving. Version suffix and URL parts are gone.
    Hostname(String),
}

impl ParsedIdentifier {
    pub fn as_str(&self) -> &str {
        match self {
            ParsedIdentifier::DirectKey(key) => key,
            ParsedIdentifier::Hostname(name) => name,
        }
    }

    pub fn is_direct_key(&self) -> bool {
        matches!(self, ParsedIdentifier::DirectKey(_))
    }
}

/// Per-call resolution overrides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveOptions {
    /// Skip the in-memory cache lookup (results are still written back).
    pub ignore_cache: bool,
    /// Skip the conventional DNS TXT lookup.
    pub no_dns_txt: bool,
    /// Skip the DNS-over-HTTPS lookup.
    pub no_dns_over_https: bool,
    /// Skip the `/.well-known/<record>` HTTPS lookup.
    pub no_wellknown: bool,
}

impl ResolveOptions {
    pub fn ignore_cache(mut self) -> Self {
        self.ignore_cache = true;
        self
    }

    pub fn no_dns_txt(mut self) -> Self {
        self.no_dns_txt = true;
        self
    }

    pub fn no_dns_over_https(mut self) -> Self {
        self.no_dns_over_https = true;
        self
    }

    pub fn no_wellknown(mut self) -> Self {
        self.no_wellknown = true;
        self
    }

    /// Whether the given strategy may run under these options.
    pub fn allows(&self, kind: StrategyKind) -> bool {
        match kind {
            StrategyKind::DnsTxt => !self.no_dns_txt,
            StrategyKind::WellKnown => !self.no_wellknown,
            StrategyKind::DnsOverHttps => !self.no_dns_over_https,
        }
    }
}

/// The network mechanisms, in preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyKind {
    DnsTxt,
    WellKnown,
    DnsOverHttps,
}

impl StrategyKind {
    pub const ORDER: [StrategyKind; 3] = [
        StrategyKind::DnsTxt,
        StrategyKind::WellKnown,
        StrategyKind::DnsOverHttps,
    ];
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StrategyKind::DnsTxt => "dns-txt",
            StrategyKind::WellKnown => "well-known",
            StrategyKind::DnsOverHttps => "dns-over-https",
        };
        f.write_str(name)
    }
}

/// A key produced by one strategy, with the TTL the record advertised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRecord {
    pub key: String,
    pub ttl: Option<Duration>,
    pub source: StrategyKind,
}

impl ResolvedRecord {
    pub fn new(key: impl Into<String>, ttl: Option<Duration>, source: StrategyKind) -> Self {
        Self {
            key: key.into().to_ascii_lowercase(),
            ttl,
            source,
        }
    }
}
