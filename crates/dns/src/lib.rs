//! dwebx name resolution
//!
//! Resolves human-meaningful names to the 64-hex public keys that address
//! content on the dwebx network. Accepts:
//! - Direct keys, optionally versioned (`<key>+5`)
//! - Domain names, optionally versioned (`dwebx.org+foo`)
//! - Protocol URLs (`dwebx://dwebx.org/path?query`)
//!
//! Domains are resolved through DNS TXT records, a `/.well-known/dwebx`
//! HTTPS file and DNS-over-HTTPS, in that order, with an in-memory TTL cache
//! in front and an optional persistent cache behind.

pub mod cache;
pub mod errors;
pub mod identifier;
pub mod resolver;
pub mod settings;
pub mod strategy;
pub mod transport;
pub mod types;

pub use cache::{CacheEntry, CacheManager, PersistentCache};
pub use errors::*;
pub use identifier::parse;
pub use resolver::{create_engine, DnsResolver};
pub use settings::{ResolutionConfig, ResolverSettings};
pub use strategy::{ResolutionStrategy, StrategyChain};
pub use transport::{HickoryTxtResolver, HttpResponse, HttpsFetcher, ReqwestFetcher, TxtAnswer, TxtResolver};
pub use types::*;
