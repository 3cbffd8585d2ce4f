//! Command-line interface for the OpenBounds build pipeline.
#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod error;
mod process;
mod tiling;

pub use error::CliError;

use process::{ProcessArgs, run_process};
use tiling::{TilingArgs, run_tiling};

const ARG_PROCESS_SOURCES: &str = "sources";
const ARG_PROCESS_OUTPUT: &str = "output";
const ARG_PROCESS_FORCE: &str = "force";
const ARG_PROCESS_USER_AGENT: &str = "user-agent";
const ARG_PROCESS_TIMEOUT_SECS: &str = "timeout-secs";
const ENV_PROCESS_SOURCES: &str = "OPENBOUNDS_CMDS_PROCESS_SOURCES";
const ENV_PROCESS_OUTPUT: &str = "OPENBOUNDS_CMDS_PROCESS_OUTPUT";

const ARG_TILING_OUTPUT: &str = "output";
const ARG_TILING_SOURCES: &str = "sources";
const ARG_TILING_CATALOG: &str = "catalog";
const ARG_TILING_MIN_ZOOM: &str = "min-zoom";
const ARG_TILING_MAX_ZOOM: &str = "max-zoom";
const ARG_TILING_LAYER: &str = "layer";
const ARG_TILING_TIPPECANOE: &str = "tippecanoe";
const ENV_TILING_OUTPUT: &str = "OPENBOUNDS_CMDS_VECTOR_TILING_OUTPUT";
const ENV_TILING_SOURCES: &str = "OPENBOUNDS_CMDS_VECTOR_TILING_SOURCES";

const DEFAULT_LOG_FILTER: &str = "info";
const VERBOSE_LOG_FILTER: &str = "debug";

/// Run the OpenBounds CLI with the current process arguments and environment.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    init_logging(cli.verbose);
    match cli.command {
        Command::Process(args) => run_process(args),
        Command::VectorTiling(args) => run_tiling(args),
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `--verbose`.
fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        VERBOSE_LOG_FILTER
    } else {
        DEFAULT_LOG_FILTER
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());
    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
    if installed.is_err() {
        log::debug!("logging already initialised");
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "openbounds",
    about = "Build boundary artefacts and vector tiles from source descriptors",
    version
)]
struct Cli {
    /// Log debug detail for every source.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Convert source descriptors into GeoJSON artefacts and a catalog.
    Process(ProcessArgs),
    /// Build an MBTiles file from processed artefacts.
    VectorTiling(TilingArgs),
}

#[cfg(test)]
mod tests;
