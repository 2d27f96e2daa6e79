pub mod cli;
pub mod core;
pub mod providers;

use crate::core::cache::ConfigCache;
use crate::core::config::AppConfig;
use crate::core::currency::RateSource;
use crate::core::schema::SchemaResolver;
use crate::core::table::TableSource;
use crate::core::{ClosingCycle, LedgerEntry, RateResolver};
use anyhow::{Result, bail};
use chrono::NaiveDate;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Where the `rate` command takes its currency from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateTarget {
    Currency(String),
    Country(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CloseOptions {
    pub country: String,
    pub date: NaiveDate,
    pub amounts_file: Option<PathBuf>,
    pub amounts: Vec<LedgerEntry>,
    pub allow_unverified_rate: bool,
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    Countries,
    Accounts,
    Rate { target: RateTarget, date: NaiveDate },
    Close(CloseOptions),
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("fxclose starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let cache = Arc::new(ConfigCache::new(
        table_source(&config)?,
        config.tables.clone(),
        config.cache_ttl(),
    ));

    match command {
        AppCommand::Countries => {
            let resolver = SchemaResolver::new(&config.base_currency);
            cli::tables::run_countries(&cache, &resolver).await
        }
        AppCommand::Accounts => {
            let resolver = SchemaResolver::new(&config.base_currency);
            cli::tables::run_accounts(&cache, &resolver).await
        }
        AppCommand::Rate { target, date } => {
            let cycle = ClosingCycle::new(cache, rate_resolver(&config)?);
            cli::rate::run(&cycle, &target, date).await
        }
        AppCommand::Close(options) => {
            let cycle = ClosingCycle::new(cache, rate_resolver(&config)?);
            cli::close::run(&cycle, &options).await
        }
    }
}

fn table_source(config: &AppConfig) -> Result<Arc<dyn TableSource>> {
    if let Some(postgrest) = &config.providers.postgrest {
        let source = providers::postgrest::PostgrestTableSource::new(
            &postgrest.base_url,
            &postgrest.api_key,
            Duration::from_secs(postgrest.timeout_secs),
        )?;
        return Ok(Arc::new(source));
    }
    if let Some(file) = &config.providers.file {
        return Ok(Arc::new(providers::file_source::FileTableSource::new(
            &file.path,
        )));
    }
    bail!("No table source configured: set providers.postgrest or providers.file")
}

fn rate_resolver(config: &AppConfig) -> Result<RateResolver> {
    let Some(api) = &config.providers.exchangerate_api else {
        bail!("No rate source configured: set providers.exchangerate_api");
    };
    let source: Arc<dyn RateSource> =
        Arc::new(providers::exchangerate_api::ExchangeRateApiSource::new(
            &api.base_url,
            &api.api_key,
            Duration::from_secs(api.timeout_secs),
        )?);
    Ok(RateResolver::new(source, &config.base_currency))
}
