use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use clap::{ArgGroup, CommandFactory, Parser, Subcommand};
use fxclose::core::LedgerEntry;
use fxclose::core::log::init_logging;
use fxclose::{AppCommand, CloseOptions, RateTarget};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// List the configured countries and their currencies
    Countries,
    /// List the chart of accounts
    Accounts,
    /// Look up the exchange rate to the base currency
    #[command(group(ArgGroup::new("target").required(true).args(["currency", "country"])))]
    Rate {
        /// Currency code, e.g. USD
        #[arg(long)]
        currency: Option<String>,
        /// Country name as it appears in the configuration
        #[arg(long)]
        country: Option<String>,
        /// Closing date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
    },
    /// Summarize and export the closing entries of one country
    Close {
        /// Country name as it appears in the configuration
        #[arg(long)]
        country: String,
        /// Closing date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
        /// YAML or JSON file with a list of {code, amount} entries
        #[arg(long)]
        amounts: Option<PathBuf>,
        /// Set one amount, overriding the file; may be repeated
        #[arg(long = "set", value_name = "CODE=AMOUNT", value_parser = parse_entry)]
        set: Vec<LedgerEntry>,
        /// Export records even when no exchange rate could be obtained
        #[arg(long)]
        allow_unverified_rate: bool,
        /// Write the records as JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl From<Commands> for AppCommand {
    fn from(cmd: Commands) -> AppCommand {
        match cmd {
            Commands::Countries => AppCommand::Countries,
            Commands::Accounts => AppCommand::Accounts,
            Commands::Rate {
                currency,
                country,
                date,
            } => {
                let target = match (currency, country) {
                    (Some(currency), _) => RateTarget::Currency(currency),
                    (None, Some(country)) => RateTarget::Country(country),
                    (None, None) => unreachable!("clap requires --currency or --country"),
                };
                AppCommand::Rate { target, date }
            }
            Commands::Close {
                country,
                date,
                amounts,
                set,
                allow_unverified_rate,
                output,
            } => AppCommand::Close(CloseOptions {
                country,
                date,
                amounts_file: amounts,
                amounts: set,
                allow_unverified_rate,
                output,
            }),
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

fn parse_entry(value: &str) -> Result<LedgerEntry> {
    let (code, amount) = value
        .split_once('=')
        .ok_or_else(|| anyhow!("expected CODE=AMOUNT, got '{value}'"))?;
    let code = code.trim();
    if code.is_empty() {
        return Err(anyhow!("account code is empty in '{value}'"));
    }
    let amount = Decimal::from_str(amount.trim())
        .map_err(|e| anyhow!("invalid amount in '{value}': {e}"))?;
    Ok(LedgerEntry::new(code, amount))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => fxclose::cli::setup::setup(),
        Some(cmd) => fxclose::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_entry() {
        assert_eq!(
            parse_entry(" 1010 = -12.50").unwrap(),
            LedgerEntry::new("1010", dec!(-12.50))
        );
        assert!(parse_entry("1010").is_err());
        assert!(parse_entry("=5").is_err());
        assert!(parse_entry("1010=abc").is_err());
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_rate_requires_a_target() {
        let parsed = Cli::try_parse_from(["fxclose", "rate", "--date", "2024-12-31"]);
        assert!(parsed.is_err());

        let cli = Cli::try_parse_from([
            "fxclose",
            "rate",
            "--currency",
            "USD",
            "--date",
            "2024-12-31",
        ])
        .unwrap();
        let command: AppCommand = cli.command.unwrap().into();
        assert_eq!(
            command,
            AppCommand::Rate {
                target: RateTarget::Currency("USD".to_string()),
                date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            }
        );
    }
}
