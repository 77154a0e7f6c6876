//! Command-line client for interacting with a stream channel node.

use clap::{Parser, Subcommand, ValueEnum};
use reqwest::Url;
use uuid::Uuid;

use crate::client::{AppContext, CliResult, parse_url};
use crate::commands::{health, process, tail};

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_API_URL: &str = "http://127.0.0.1:7175";
const DEFAULT_TAIL_RETRY_SECS: u64 = 5;

/// Parses CLI arguments, executes the requested command, and returns the
/// process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    let trace_id = Uuid::new_v4().to_string();
    let ctx = match AppContext::from_cli(&cli, &trace_id) {
        Ok(ctx) => ctx,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            return err.exit_code();
        }
    };

    match dispatch(cli, &ctx).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

async fn dispatch(cli: Cli, ctx: &AppContext) -> CliResult<()> {
    match cli.command {
        Command::Process(command) => match command {
            ProcessCommand::List => process::handle_list(ctx, cli.output).await,
            ProcessCommand::Status(args) => process::handle_status(ctx, &args.id, cli.output).await,
            ProcessCommand::Start(args) => process::handle_start(ctx, &args.id, cli.output).await,
            ProcessCommand::Stop(args) => process::handle_stop(ctx, &args.id, cli.output).await,
        },
        Command::Tail(args) => tail::handle_tail(ctx, args.retry_secs).await,
        Command::Health => health::handle_health(ctx).await,
        Command::Metrics => health::handle_metrics(ctx).await,
    }
}

#[derive(Parser)]
#[command(name = "omnibar-cli", about = "Operator CLI for a stream channel node")]
pub(crate) struct Cli {
    /// Base URL of the node's Stream Channel API.
    #[arg(long, global = true, env = "OMNIBAR_API_URL", value_parser = parse_url, default_value = DEFAULT_API_URL)]
    pub(crate) api_url: Url,
    /// Per-request timeout, in seconds.
    #[arg(long, global = true, env = "OMNIBAR_HTTP_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub(crate) timeout: u64,
    /// Output rendering format.
    #[arg(long = "output", global = true, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    #[command(subcommand)]
    command: Command,
}

/// Output rendering format shared by every command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Human-readable table.
    Table,
    /// Pretty-printed JSON.
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Inspect or control supervised processes.
    #[command(subcommand)]
    Process(ProcessCommand),
    /// Follow the node's `process.state_changed` event stream.
    Tail(TailArgs),
    /// Check the node's liveness.
    Health,
    /// Fetch the node's Prometheus metrics.
    Metrics,
}

#[derive(Subcommand)]
enum ProcessCommand {
    /// List every process the node supervises.
    List,
    /// Show one process's current record.
    Status(ProcessIdArgs),
    /// Start a supervised process.
    Start(ProcessIdArgs),
    /// Stop a supervised process.
    Stop(ProcessIdArgs),
}

#[derive(clap::Args)]
struct ProcessIdArgs {
    /// Process id, as keyed in the process-config file.
    id: String,
}

#[derive(clap::Args)]
struct TailArgs {
    /// Seconds to wait before reconnecting after a dropped stream.
    #[arg(long, default_value_t = DEFAULT_TAIL_RETRY_SECS)]
    retry_secs: u64,
}

impl Cli {
    #[cfg(test)]
    fn timeout_for_test() -> u64 {
        DEFAULT_TIMEOUT_SECS
    }
}
