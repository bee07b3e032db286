//! Classifies raw caller input into a direct key or a hostname.
//!
//! Accepted forms: `<key>`, `<key>+<version>`, `<domain>`, `<domain>+<version>`,
//! `<scheme>://<key-or-domain>[/path][?query]`. Version suffixes and URL
//! decoration carry no resolution meaning and are dropped.

use crate::errors::*;
use crate::settings::ResolutionConfig;
use crate::types::ParsedIdentifier;
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

const MAX_NAME_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

fn version_suffix() -> &'static Regex {
    static VERSION: OnceLock<Regex> = OnceLock::new();
    VERSION.get_or_init(|| Regex::new(r"\+[^/]+$").expect("version suffix pattern"))
}

/// Parse caller input. Pure: never touches the cache or the network.
pub fn parse(input: &str, config: &ResolutionConfig) -> Result<ParsedIdentifier> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ResolutionError::invalid(input, "name is empty"));
    }
    if trimmed.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ResolutionError::invalid(input, "name contains whitespace"));
    }

    let authority = extract_authority(trimmed, config)
        .ok_or_else(|| ResolutionError::invalid(input, "malformed URL"))?;
    let name = version_suffix().replace(&authority, "");

    if config.is_key(&name) {
        return Ok(ParsedIdentifier::DirectKey(name.to_ascii_lowercase()));
    }

    let name = name
        .strip_suffix('.')
        .unwrap_or(&*name)
        .to_ascii_lowercase();
    if !is_plausible_hostname(&name) {
        return Err(ResolutionError::invalid(input, "not a key or domain name"));
    }

    Ok(ParsedIdentifier::Hostname(name))
}

/// Strip URL decoration, keeping the key or host part.
fn extract_authority(input: &str, config: &ResolutionConfig) -> Option<String> {
    if let Some(captures) = config.protocol_pattern.captures(input) {
        return captures.get(1).map(|m| m.as_str().to_string());
    }

    if input.contains("://") {
        let url = Url::parse(input).ok()?;
        return url.host_str().map(str::to_string);
    }

    Some(input.to_string())
}

/// Syntactic domain check. Single-label names pass; the strategy chain
/// refuses them as unqualified.
pub fn is_plausible_hostname(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return false;
    }

    name.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= MAX_LABEL_LEN
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    })
}

/// True when the name has a domain separator (i.e. a TLD).
pub fn is_qualified(name: &str) -> bool {
    name.contains('.')
}
