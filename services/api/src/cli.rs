use crate::commands::{run_calculate, run_history, CalculateArgs, HistoryArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use ecotrack::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "EcoTrack",
    about = "Carbon footprint calculator service and command-line tools",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Convert a consumption figure to kg CO2e
    Calculate(CalculateArgs),
    /// Show a user's most recent calculations
    History(HistoryArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Override the history database path (`:memory:` keeps history in process)
    #[arg(long)]
    pub(crate) database: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Calculate(args) => run_calculate(args),
        Command::History(args) => run_history(args),
    }
}
