//! mUSD Collateral Core CLI
//!
//! Operator tool for previewing and simulating liquidations against an
//! in-memory world.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use console::{style, Term};

use musd_core::cli::{
    bps_to_percent, format_health_factor, format_timestamp, format_units, parse_units, CoreConfig,
    OutputFormat, Report, Scenario,
};
use musd_core::utils::constants::{DEBT_TOKEN_DECIMALS, MIN_LIQUIDATION_AMOUNT};

/// mUSD collateral core CLI - liquidation previews and simulations
#[derive(Parser)]
#[command(name = "musd")]
#[command(author = "mUSD Team")]
#[command(version = musd_core::VERSION)]
#[command(about = "Command-line interface for the mUSD collateral core", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the JSON config file
    #[arg(short, long, env = "MUSD_CONFIG")]
    config: Option<PathBuf>,

    /// Output format (text, json, json-pretty); overrides the config
    #[arg(short, long)]
    output: Option<OutputFormat>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Run a liquidation against a one-borrower world
    Simulate(ScenarioArgs),

    /// Preview the seizure for a liquidation without running it
    Estimate(ScenarioArgs),

    /// Print the effective configuration
    Params,
}

#[derive(Args, Clone)]
struct ScenarioArgs {
    /// Collateral deposited, in whole tokens (e.g. 1.5)
    #[arg(long, default_value = "1")]
    deposit: String,

    /// Collateral decimals (at most 38)
    #[arg(long, default_value_t = 18, value_parser = clap::value_parser!(u8).range(0..=38))]
    decimals: u8,

    /// USD price of one collateral token
    #[arg(long, default_value = "2000")]
    price: String,

    /// Liquidation threshold in bps
    #[arg(long, default_value_t = 8_000)]
    threshold: u64,

    /// Liquidation penalty in bps
    #[arg(long, default_value_t = 500)]
    penalty: u64,

    /// Borrower debt in mUSD
    #[arg(long)]
    debt: String,

    /// mUSD the liquidator repays
    #[arg(long)]
    repay: String,
}

impl ScenarioArgs {
    fn to_scenario(&self) -> anyhow::Result<Scenario> {
        Ok(Scenario {
            deposit: parse_units(&self.deposit, self.decimals).context("--deposit")?,
            decimals: self.decimals,
            price: parse_units(&self.price, DEBT_TOKEN_DECIMALS).context("--price")?,
            liquidation_threshold_bps: self.threshold,
            liquidation_penalty_bps: self.penalty,
            debt: parse_units(&self.debt, DEBT_TOKEN_DECIMALS).context("--debt")?,
            repay: parse_units(&self.repay, DEBT_TOKEN_DECIMALS).context("--repay")?,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MAIN
// ═══════════════════════════════════════════════════════════════════════════════

fn main() {
    let cli = Cli::parse();
    let term = Term::stdout();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {:#}", style("Error:").red().bold(), e);
            std::process::exit(1);
        }
    };

    // Initialize logging; RUST_LOG wins over the config file
    let filter = if cli.verbose {
        "debug".to_string()
    } else {
        config.log_filter.clone()
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run_command(&cli, &config, &term) {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }
}

fn run_command(cli: &Cli, config: &CoreConfig, term: &Term) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Init { force } => cmd_init(cli, *force, term),
        Commands::Simulate(args) => cmd_simulate(config, args, term),
        Commands::Estimate(args) => cmd_estimate(config, args, term),
        Commands::Params => cmd_params(cli, config, term),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMMAND HANDLERS
// ═══════════════════════════════════════════════════════════════════════════════

fn cmd_init(cli: &Cli, force: bool, term: &Term) -> anyhow::Result<()> {
    let path = config_path(cli);

    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            path.display()
        );
    }

    CoreConfig::default()
        .save(&path)
        .with_context(|| format!("writing {}", path.display()))?;

    term.write_line(&format!(
        "{} Configuration written to {}",
        style("✓").green(),
        style(path.display()).yellow()
    ))?;
    Ok(())
}

fn cmd_simulate(config: &CoreConfig, args: &ScenarioArgs, term: &Term) -> anyhow::Result<()> {
    let scenario = args.to_scenario()?;
    let report = scenario.simulate(config).context("liquidation failed")?;
    let dec = scenario.decimals;

    let rendered = Report::new("Liquidation Outcome", &report)?
        .row("As of", format_timestamp(report.timestamp))
        .row(
            "Health factor before",
            format_health_factor(report.outcome.health_factor_before),
        )
        .row(
            "Debt repaid",
            format!("{} mUSD", format_units(report.outcome.debt_repaid, DEBT_TOKEN_DECIMALS)),
        )
        .row(
            "Collateral seized",
            format_units(report.outcome.collateral_seized, dec),
        )
        .row(
            "Bad debt recorded",
            format!(
                "{} mUSD",
                format_units(report.outcome.bad_debt_recorded, DEBT_TOKEN_DECIMALS)
            ),
        )
        .row(
            "Remaining debt",
            format!("{} mUSD", format_units(report.remaining_debt, DEBT_TOKEN_DECIMALS)),
        )
        .row("Remaining collateral", format_units(report.remaining_collateral, dec))
        .row("Health factor after", format_health_factor(report.health_factor_after))
        .render(config.output);

    term.write_str(&rendered)?;
    if config.output != OutputFormat::Text {
        term.write_line("")?;
    }
    Ok(())
}

fn cmd_estimate(config: &CoreConfig, args: &ScenarioArgs, term: &Term) -> anyhow::Result<()> {
    let scenario = args.to_scenario()?;
    let estimate = scenario.estimate(config).context("estimate failed")?;
    let dec = scenario.decimals;

    let liquidatable = if estimate.liquidatable {
        style("yes").red().bold().to_string()
    } else {
        style("no").green().to_string()
    };

    let rendered = Report::new("Seizure Estimate", &estimate)?
        .row("As of", format_timestamp(estimate.timestamp))
        .row("Health factor", format_health_factor(estimate.health_factor))
        .row("Liquidatable", liquidatable)
        .row(
            "Max repayable",
            format!("{} mUSD", format_units(estimate.max_repayable, DEBT_TOKEN_DECIMALS)),
        )
        .row(
            "Debt to repay",
            format!(
                "{} mUSD",
                format_units(estimate.quote.debt_to_repay, DEBT_TOKEN_DECIMALS)
            ),
        )
        .row(
            "Collateral to seize",
            format_units(estimate.quote.collateral_to_seize, dec),
        )
        .row(
            "Bad debt",
            format!("{} mUSD", format_units(estimate.quote.bad_debt, DEBT_TOKEN_DECIMALS)),
        )
        .row("Capped", estimate.quote.capped)
        .render(config.output);

    term.write_str(&rendered)?;
    if config.output != OutputFormat::Text {
        term.write_line("")?;
    }
    Ok(())
}

fn cmd_params(cli: &Cli, config: &CoreConfig, term: &Term) -> anyhow::Result<()> {
    let data = serde_json::json!({
        "config_path": config_path(cli),
        "close_factor_bps": config.liquidation.close_factor_bps,
        "full_liquidation_threshold_bps": config.liquidation.full_liquidation_threshold_bps,
        "min_liquidation_amount": config.min_liquidation_amount().to_string(),
        "log_filter": config.log_filter,
        "output": config.output,
        "version": musd_core::VERSION,
    });

    let rendered = Report::new(format!("{} Parameters", musd_core::PROTOCOL_NAME), &data)?
        .row("Config", config_path(cli).display())
        .row("Close factor", bps_to_percent(config.liquidation.close_factor_bps))
        .row(
            "Full liquidation below",
            format_health_factor(config.liquidation.full_liquidation_threshold_bps),
        )
        .row(
            "Dust floor",
            format!("{} mUSD", format_units(MIN_LIQUIDATION_AMOUNT, DEBT_TOKEN_DECIMALS)),
        )
        .row("Log filter", &config.log_filter)
        .row("Output", config.output)
        .render(config.output);

    term.write_str(&rendered)?;
    if config.output != OutputFormat::Text {
        term.write_line("")?;
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// HELPER FUNCTIONS
// ═══════════════════════════════════════════════════════════════════════════════

fn config_path(cli: &Cli) -> PathBuf {
    cli.config.clone().unwrap_or_else(CoreConfig::default_path)
}

fn load_config(cli: &Cli) -> anyhow::Result<CoreConfig> {
    let path = config_path(cli);
    let file = if path.exists() { Some(path.as_path()) } else { None };

    let mut config = CoreConfig::resolve(file)
        .with_context(|| format!("loading configuration from {}", path.display()))?;
    if let Some(output) = cli.output {
        config.output = output;
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimate_with_decimals(decimals: &str) -> Result<Cli, clap::Error> {
        Cli::try_parse_from([
            "musd",
            "estimate",
            "--deposit",
            "0",
            "--decimals",
            decimals,
            "--debt",
            "1000",
            "--repay",
            "500",
        ])
    }

    #[test]
    fn test_decimals_bounded() {
        assert!(estimate_with_decimals("38").is_ok());
        assert!(estimate_with_decimals("39").is_err());
    }
}
