//! dwebx name resolution command line interface
//!
//! Resolves names, versioned names and `dwebx://` URLs to public keys.

mod file_cache;

use anyhow::{Context, Result};
use clap::Parser;
use dwebx_dns::{DnsResolver, ResolutionConfig, ResolveOptions, ResolverSettings};
use file_cache::JsonFileCache;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "dwebx-dns")]
#[command(about = "Resolve dwebx names to public keys", long_about = None)]
#[command(version)]
struct Cli {
    /// Settings file (TOML); DWEBX_DNS_* environment variables override it
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// JSON file used as the persistent fallback cache
    #[arg(long, value_name = "PATH")]
    cache_file: Option<PathBuf>,

    /// Skip the in-memory cache lookup
    #[arg(long)]
    ignore_cache: bool,

    /// Do not query DNS TXT records
    #[arg(long)]
    no_dns_txt: bool,

    /// Do not query DNS-over-HTTPS providers
    #[arg(long)]
    no_dns_over_https: bool,

    /// Do not fetch the /.well-known file
    #[arg(long)]
    no_wellknown: bool,

    /// Print the in-memory cache as JSON when done
    #[arg(long)]
    list_cache: bool,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Names, keys or URLs to resolve
    #[arg(required_unless_present = "list_cache")]
    names: Vec<String>,
}

impl Cli {
    fn options(&self) -> ResolveOptions {
        ResolveOptions {
            ignore_cache: self.ignore_cache,
            no_dns_txt: self.no_dns_txt,
            no_dns_over_https: self.no_dns_over_https,
            no_wellknown: self.no_wellknown,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let resolver = build_resolver(&cli)?;
    let options = cli.options();

    let mut failed = 0usize;
    for name in &cli.names {
        let result = resolver.resolve_name(name, options).await;
        if !report(name, &result, &mut io::stdout(), &mut io::stderr())? {
            failed += 1;
        }
    }

    if cli.list_cache {
        println!("{}", serde_json::to_string_pretty(&resolver.list_cache())?);
    }

    debug!(total = cli.names.len(), failed, "Done");
    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Keys go to `out` as `name key`; failures go to `err` as `name error`.
/// Returns whether the name resolved.
fn report(
    name: &str,
    result: &dwebx_dns::Result<String>,
    out: &mut impl Write,
    err: &mut impl Write,
) -> io::Result<bool> {
    match result {
        Ok(key) => {
            writeln!(out, "{name} {key}")?;
            Ok(true)
        }
        Err(error) => {
            writeln!(err, "{name} {error}")?;
            Ok(false)
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn build_resolver(cli: &Cli) -> Result<DnsResolver> {
    let settings = ResolverSettings::load(cli.config.as_deref()).context("failed to load settings")?;
    let config = ResolutionConfig::try_from(settings).context("invalid settings")?;
    let resolver = dwebx_dns::create_engine(Some(config)).context("failed to build resolver")?;

    Ok(match &cli.cache_file {
        Some(path) => {
            let cache = JsonFileCache::open(path)?;
            debug!(path = %cache.path().display(), "Using persistent cache file");
            resolver.with_persistent_cache(Arc::new(cache))
        }
        None => resolver,
    })
}
