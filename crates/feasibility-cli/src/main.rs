mod commands;
mod input;
mod logging;
mod output;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;

use commands::asset_mix::AssetMixArgs;
use commands::cash_flows::CashFlowArgs;
use commands::construction::{DrawdownArgs, LoanInterestArgs};
use commands::debt::{CapitalStackArgs, DscrArgs};
use commands::escalation::EscalateArgs;
use commands::feasibility::FeasibilityArgs;
use commands::sensitivity::{RunJobArgs, SensitivityArgs};
use commands::Runtime;
use logging::LogFormat;

/// Real-estate development feasibility calculations
#[derive(Parser)]
#[command(
    name = "feas",
    version,
    about = "Real-estate development feasibility calculations",
    long_about = "A CLI for underwriting real-estate developments with decimal precision. \
                  Supports cost escalation, NPV/IRR, DSCR timelines, capital stacks, \
                  construction drawdown and interest, asset-mix breakdowns and \
                  sensitivity analysis."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Engine configuration file (YAML or JSON)
    #[arg(long, global = true, env = "FEAS_CONFIG")]
    config: Option<String>,

    /// Log line format on stderr
    #[arg(long, default_value = "text", global = true)]
    log_format: LogFormat,

    /// Root directory for queued sensitivity jobs
    #[arg(long, default_value = "feas-spool", global = true, env = "FEAS_SPOOL_DIR")]
    spool_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Escalate a construction cost along a cost index
    Escalate(EscalateArgs),
    /// Net present value of a cash-flow series
    Npv(CashFlowArgs),
    /// Internal rate of return of a cash-flow series
    Irr(CashFlowArgs),
    /// NPV, IRR and payback together
    CashFlows(CashFlowArgs),
    /// Debt service coverage timeline with covenant summary
    Dscr(DscrArgs),
    /// Allocate a capital stack into equity, debt and other
    CapitalStack(CapitalStackArgs),
    /// Cumulative equity and debt drawdown schedule
    Drawdown(DrawdownArgs),
    /// Construction loan interest and facility fees
    LoanInterest(LoanInterestArgs),
    /// Per-asset NOI, yield and portfolio summary
    AssetMix(AssetMixArgs),
    /// Evaluate or queue sensitivity bands
    Sensitivity(SensitivityArgs),
    /// Run every block of a feasibility request
    Feasibility(FeasibilityArgs),
    /// Execute a spooled sensitivity job
    RunJob(RunJobArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.log_format);

    if let Commands::Version = cli.command {
        println!("feas {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    match execute(cli.command, cli.config.as_deref(), cli.spool_dir) {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}

fn execute(
    command: Commands,
    config_path: Option<&str>,
    spool_dir: PathBuf,
) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let config = input::file::read_config(config_path)?;
    let runtime = Runtime::new(config, spool_dir);

    match command {
        Commands::Escalate(args) => commands::escalation::run_escalate(args),
        Commands::Npv(args) => commands::cash_flows::run_npv(args),
        Commands::Irr(args) => commands::cash_flows::run_irr(args),
        Commands::CashFlows(args) => commands::cash_flows::run_cash_flows(args),
        Commands::Dscr(args) => commands::debt::run_dscr(args, &runtime.config),
        Commands::CapitalStack(args) => commands::debt::run_capital_stack(args),
        Commands::Drawdown(args) => commands::construction::run_drawdown(args),
        Commands::LoanInterest(args) => {
            commands::construction::run_loan_interest(args, &runtime.config)
        }
        Commands::AssetMix(args) => commands::asset_mix::run_asset_mix(args),
        Commands::Sensitivity(args) => commands::sensitivity::run_sensitivity(args, &runtime),
        Commands::Feasibility(args) => commands::feasibility::run(args, &runtime),
        Commands::RunJob(args) => commands::sensitivity::run_job(args, &runtime),
        Commands::Version => Ok(serde_json::json!({ "version": env!("CARGO_PKG_VERSION") })),
    }
}
