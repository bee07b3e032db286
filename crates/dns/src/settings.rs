//! Resolver configuration
//!
//! [`ResolutionConfig`] is the compiled, immutable form owned by an engine.
//! [`ResolverSettings`] is its file/environment form, loaded through the
//! `config` crate and compiled with `ResolutionConfig::try_from`.

use crate::errors::*;
use config::{Config, Environment, File};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_RECORD_NAME: &str = "dwebx";
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);
pub const MAX_TTL: Duration = Duration::from_secs(3600 * 24 * 7);
pub const DEFAULT_STRATEGY_TIMEOUT: Duration = Duration::from_secs(5);
/// Largest accepted `max_ttl`; DNS TTLs are 32-bit.
pub const TTL_CEILING: Duration = Duration::from_secs(u32::MAX as u64);
pub const ENV_PREFIX: &str = "DWEBX_DNS";

pub const DEFAULT_DOH_PROVIDERS: [&str; 2] = [
    "https://cloudflare-dns.com/dns-query",
    "https://dns.google/resolve",
];

const DEFAULT_HASH_PATTERN: &str = r"(?i)^[0-9a-f]{64}$";

// Group 1 is the host: userinfo and port are outside it.
fn protocol_pattern_for(record_name: &str) -> String {
    format!(
        r"(?i)^{}://(?:[^@/?#]*@)?([^:/?#]+)",
        regex::escape(record_name)
    )
}

fn txt_pattern_for(record_name: &str) -> String {
    format!(r#"(?i)^"?{}key=([0-9a-f]{{64}})"?$"#, regex::escape(record_name))
}

/// Compiled resolver configuration.
#[derive(Debug, Clone)]
pub struct ResolutionConfig {
    /// A fully-qualified key must match this in full.
    pub hash_pattern: Regex,
    /// TXT record / well-known file / DoH record name.
    pub record_name: String,
    /// Recognizes `<scheme>://<key-or-host>/...`; group 1 is the authority.
    pub protocol_pattern: Regex,
    /// Extracts the key (group 1) from a TXT value.
    pub txt_pattern: Regex,
    pub default_ttl: Duration,
    pub max_ttl: Duration,
    /// Upper bound for each individual strategy call.
    pub strategy_timeout: Duration,
    pub doh_providers: Vec<String>,
    /// Query TXT on `_<record_name>.<host>` instead of `<host>`.
    pub use_record_subdomain: bool,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self::for_protocol(DEFAULT_RECORD_NAME)
    }
}

impl ResolutionConfig {
    /// Default patterns for a `<name>://` protocol with `<name>key=` TXT records.
    pub fn for_protocol(record_name: &str) -> Self {
        Self {
            hash_pattern: compile_builtin(DEFAULT_HASH_PATTERN),
            record_name: record_name.to_string(),
            protocol_pattern: compile_builtin(&protocol_pattern_for(record_name)),
            txt_pattern: compile_builtin(&txt_pattern_for(record_name)),
            default_ttl: DEFAULT_TTL,
            max_ttl: MAX_TTL,
            strategy_timeout: DEFAULT_STRATEGY_TIMEOUT,
            doh_providers: DEFAULT_DOH_PROVIDERS.iter().map(|p| p.to_string()).collect(),
            use_record_subdomain: false,
        }
    }

    pub fn with_hash_pattern(mut self, pattern: &str) -> Result<Self> {
        self.hash_pattern = Regex::new(pattern)?;
        Ok(self)
    }

    pub fn with_protocol_pattern(mut self, pattern: &str) -> Result<Self> {
        self.protocol_pattern = Regex::new(pattern)?;
        Ok(self)
    }

    pub fn with_txt_pattern(mut self, pattern: &str) -> Result<Self> {
        self.txt_pattern = Regex::new(pattern)?;
        Ok(self)
    }

    pub fn with_strategy_timeout(mut self, timeout: Duration) -> Self {
        self.strategy_timeout = timeout;
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_doh_providers(mut self, providers: Vec<String>) -> Self {
        self.doh_providers = providers;
        self
    }

    pub fn with_record_subdomain(mut self, enabled: bool) -> Self {
        self.use_record_subdomain = enabled;
        self
    }

    /// Clamp an advertised TTL; missing TTLs fall back to the default.
    pub fn effective_ttl(&self, advertised: Option<Duration>) -> Duration {
        advertised.unwrap_or(self.default_ttl).min(self.max_ttl)
    }

    /// Name queried for TXT records of `host`.
    pub fn txt_query_name(&self, host: &str) -> String {
        if self.use_record_subdomain {
            format!("_{}.{}", self.record_name, host)
        } else {
            host.to_string()
        }
    }

    /// Returns the key captured by `txt_pattern`, if the value carries one.
    pub fn key_from_txt(&self, value: &str) -> Option<String> {
        let captures = self.txt_pattern.captures(value.trim())?;
        let key = captures.get(1)?.as_str();
        self.is_key(key).then(|| key.to_ascii_lowercase())
    }

    pub fn is_key(&self, candidate: &str) -> bool {
        self.hash_pattern.is_match(candidate)
    }

    /// True when a TXT value claims to be one of our records (`<name>key=...`),
    /// whether or not the key itself is well formed.
    pub fn mentions_record(&self, value: &str) -> bool {
        let value = value.trim().trim_start_matches('"');
        let prefix = format!("{}key=", self.record_name);
        value
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(&prefix))
    }
}

// Built-in patterns are constants; a failure here is a programming error.
fn compile_builtin(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in pattern")
}

/// File and environment form of [`ResolutionConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    pub record_name: String,
    pub hash_pattern: Option<String>,
    pub protocol_pattern: Option<String>,
    pub txt_pattern: Option<String>,
    pub default_ttl_secs: u64,
    pub max_ttl_secs: u64,
    pub strategy_timeout_ms: u64,
    pub doh_providers: Vec<String>,
    pub use_record_subdomain: bool,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            record_name: DEFAULT_RECORD_NAME.to_string(),
            hash_pattern: None,
            protocol_pattern: None,
            txt_pattern: None,
            default_ttl_secs: DEFAULT_TTL.as_secs(),
            max_ttl_secs: MAX_TTL.as_secs(),
            strategy_timeout_ms: DEFAULT_STRATEGY_TIMEOUT.as_millis() as u64,
            doh_providers: DEFAULT_DOH_PROVIDERS.iter().map(|p| p.to_string()).collect(),
            use_record_subdomain: false,
        }
    }
}

impl ResolverSettings {
    /// Load settings from an optional TOML file, then `DWEBX_DNS_*` variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(ResolutionError::Settings(format!(
                    "configuration file {} not found",
                    path.display()
                )));
            }
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("doh_providers"),
        );

        let settings: ResolverSettings = builder.build()?.try_deserialize()?;
        Ok(settings)
    }
}

impl TryFrom<ResolverSettings> for ResolutionConfig {
    type Error = ResolutionError;

    fn try_from(settings: ResolverSettings) -> Result<Self> {
        let record_name = settings.record_name.trim();
        if record_name.is_empty() {
            return Err(ResolutionError::Settings("record_name is empty".into()));
        }

        let hash = settings
            .hash_pattern
            .unwrap_or_else(|| DEFAULT_HASH_PATTERN.to_string());
        let protocol = settings
            .protocol_pattern
            .unwrap_or_else(|| protocol_pattern_for(record_name));
        let txt = settings
            .txt_pattern
            .unwrap_or_else(|| txt_pattern_for(record_name));

        let max_ttl = Duration::from_secs(settings.max_ttl_secs);
        if max_ttl > TTL_CEILING {
            return Err(ResolutionError::Settings(format!(
                "max_ttl_secs {} exceeds {}",
                settings.max_ttl_secs,
                TTL_CEILING.as_secs()
            )));
        }

        let doh_providers: Vec<String> = settings
            .doh_providers
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        Ok(Self {
            hash_pattern: Regex::new(&hash)?,
            record_name: record_name.to_string(),
            protocol_pattern: Regex::new(&protocol)?,
            txt_pattern: Regex::new(&txt)?,
            default_ttl: Duration::from_secs(settings.default_ttl_secs),
            max_ttl,
            strategy_timeout: Duration::from_millis(settings.strategy_timeout_ms),
            doh_providers,
            use_record_subdomain: settings.use_record_subdomain,
        })
    }
}
