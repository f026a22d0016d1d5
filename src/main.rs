use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use valuation_tools::collect::{self, FetchOptions, RecordSource};
use valuation_tools::flatten::DEFAULT_SECTIONS;
use valuation_tools::io::client::DEFAULT_ENDPOINT;
use valuation_tools::logging::{self, LogConfig};
use valuation_tools::{Result, ToolError};

fn main() {
    let cli = Cli::parse();
    if let Err(error) = run(cli) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Fetch(args) => execute_fetch(args),
    }
}

fn execute_fetch(args: FetchArgs) -> Result<()> {
    let log_config = match &args.log_config {
        Some(path) => LogConfig::from_path(path)?,
        None => LogConfig::default(),
    };
    logging::init_logging(&log_config)?;

    let source = match (args.fixtures, args.api_key_file) {
        (Some(path), _) => RecordSource::Fixtures(path),
        (None, Some(api_key_file)) => RecordSource::Http {
            endpoint: args.endpoint,
            api_key_file,
            timeout: Duration::from_secs(args.timeout_secs),
        },
        (None, None) => {
            return Err(ToolError::InvalidInput(
                "either --api-key-file or --fixtures is required".into(),
            ));
        }
    };

    let sections = if args.sections.is_empty() {
        DEFAULT_SECTIONS.iter().map(|name| name.to_string()).collect()
    } else {
        args.sections
    };

    let options = FetchOptions {
        input: args.input_file,
        output: args.output_file,
        sections,
        source,
    };
    collect::run_fetch(&options)?;
    Ok(())
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Look up property valuations and export them as a flat table."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Query the valuation provider for every address in a file.
    Fetch(FetchArgs),
}

#[derive(clap::Args)]
struct FetchArgs {
    /// CSV or XLSX file of (address, postal code) rows without a header.
    #[arg(short, long)]
    input_file: PathBuf,

    /// Output path; the extension selects CSV, XLSX, or JSON.
    #[arg(short, long)]
    output_file: PathBuf,

    /// File whose first line holds the provider API key.
    #[arg(long)]
    api_key_file: Option<PathBuf>,

    /// Replay responses from a JSON file keyed by address instead of calling the provider.
    #[arg(long, conflicts_with = "api_key_file")]
    fixtures: Option<PathBuf>,

    /// Deep-search endpoint of the provider.
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Response section to merge into each row. Repeat to merge several; later ones win.
    #[arg(long = "section")]
    sections: Vec<String>,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// JSON logging configuration.
    #[arg(long)]
    log_config: Option<PathBuf>,
}
