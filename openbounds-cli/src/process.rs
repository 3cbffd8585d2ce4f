//! Process command implementation for the OpenBounds CLI.

use std::time::Duration;

use camino::Utf8PathBuf;
use clap::Parser;
use log::{info, warn};
use openbounds_data::{
    BatchDriver, BatchResult, DEFAULT_USER_AGENT, HttpFetcher, HttpFetcherConfig, LogReporter,
    ResourceFetcher, default_registry,
};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_PROCESS_FORCE, ARG_PROCESS_OUTPUT, ARG_PROCESS_SOURCES, ARG_PROCESS_TIMEOUT_SECS,
    ARG_PROCESS_USER_AGENT, CliError, ENV_PROCESS_OUTPUT, ENV_PROCESS_SOURCES,
};

/// Default HTTP timeout applied to every download.
pub(crate) const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// CLI arguments for the `process` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "process",
    long_about = "Convert every source descriptor under SOURCES into a \
                 GeoJSON artefact under OUTPUT, reusing artefacts that are \
                 newer than their descriptor, and write catalog.geojson \
                 listing every successful source.",
    about = "Convert source descriptors into GeoJSON artefacts"
)]
#[ortho_config(prefix = "OPENBOUNDS")]
pub(crate) struct ProcessArgs {
    /// Descriptor file or directory of descriptors.
    #[arg(value_name = "sources")]
    #[serde(default)]
    pub(crate) sources: Option<Utf8PathBuf>,
    /// Existing directory receiving artefacts and the catalog.
    #[arg(value_name = "output")]
    #[serde(default)]
    pub(crate) output: Option<Utf8PathBuf>,
    /// Regenerate artefacts even when they are up to date.
    #[arg(long = ARG_PROCESS_FORCE)]
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub(crate) force: bool,
    /// User agent sent with HTTP downloads.
    #[arg(long = ARG_PROCESS_USER_AGENT, value_name = "agent")]
    #[serde(default)]
    pub(crate) user_agent: Option<String>,
    /// HTTP timeout in seconds.
    #[arg(long = ARG_PROCESS_TIMEOUT_SECS, value_name = "seconds")]
    #[serde(default)]
    pub(crate) timeout_secs: Option<u64>,
}

impl ProcessArgs {
    pub(crate) fn into_config(self) -> Result<ProcessConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ProcessConfig::try_from(merged)
    }
}

/// Validated settings for one batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProcessConfig {
    pub(crate) sources: Utf8PathBuf,
    pub(crate) output: Utf8PathBuf,
    pub(crate) force: bool,
    pub(crate) user_agent: String,
    pub(crate) timeout: Duration,
}

impl ProcessConfig {
    pub(crate) fn validate_paths(&self) -> Result<(), CliError> {
        let sources_exist = openbounds_fs::modified_time(&self.sources)
            .map_err(|source| CliError::InspectSourcePath {
                field: ARG_PROCESS_SOURCES,
                path: self.sources.clone(),
                source,
            })?
            .is_some();
        if !sources_exist {
            return Err(CliError::MissingSourcePath {
                field: ARG_PROCESS_SOURCES,
                path: self.sources.clone(),
            });
        }
        let output_is_dir =
            openbounds_fs::dir_is_dir(&self.output).map_err(|source| {
                CliError::InspectSourcePath {
                    field: ARG_PROCESS_OUTPUT,
                    path: self.output.clone(),
                    source,
                }
            })?;
        if output_is_dir {
            Ok(())
        } else {
            Err(CliError::OutputDirectoryNotDirectory {
                path: self.output.clone(),
            })
        }
    }

    pub(crate) fn fetcher_config(&self) -> HttpFetcherConfig {
        HttpFetcherConfig::default()
            .with_timeout(self.timeout)
            .with_user_agent(self.user_agent.clone())
    }
}

impl TryFrom<ProcessArgs> for ProcessConfig {
    type Error = CliError;

    fn try_from(args: ProcessArgs) -> Result<Self, Self::Error> {
        let sources = args.sources.ok_or(CliError::MissingArgument {
            field: ARG_PROCESS_SOURCES,
            env: ENV_PROCESS_SOURCES,
        })?;
        let output = args.output.ok_or(CliError::MissingArgument {
            field: ARG_PROCESS_OUTPUT,
            env: ENV_PROCESS_OUTPUT,
        })?;
        Ok(Self {
            sources,
            output,
            force: args.force,
            user_agent: args
                .user_agent
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_owned()),
            timeout: Duration::from_secs(args.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
        })
    }
}

pub(super) fn run_process(args: ProcessArgs) -> Result<(), CliError> {
    let config = args.into_config()?;
    config.validate_paths()?;
    let fetcher = HttpFetcher::with_config(config.fetcher_config())?;
    let result = execute_process(&config, &fetcher)?;
    summarise(&result)
}

/// Run the batch described by `config` with `fetcher`.
pub(super) fn execute_process(
    config: &ProcessConfig,
    fetcher: &dyn ResourceFetcher,
) -> Result<BatchResult, CliError> {
    let registry = default_registry();
    let reporter = LogReporter;
    let result = BatchDriver::new(&registry, fetcher, &reporter)
        .force(config.force)
        .run(&config.sources, &config.output)?;
    Ok(result)
}

/// Map a finished batch to the command outcome.
pub(super) fn summarise(result: &BatchResult) -> Result<(), CliError> {
    info!(
        "{} catalog entries written to {}",
        result.catalog_entries,
        result.catalog_path
    );
    if result.is_success() {
        return Ok(());
    }
    for failed in &result.failures {
        warn!("{}: {}", failed.descriptor, failed.failure);
    }
    Err(CliError::BatchFailed {
        count: result.failures.len(),
    })
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<ProcessConfig, CliError> {
    let merged = ProcessArgs::merge_from_layers(layers).map_err(CliError::from)?;
    ProcessConfig::try_from(merged)
}
