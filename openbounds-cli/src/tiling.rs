//! Vector-tiling command implementation for the OpenBounds CLI.

use camino::Utf8PathBuf;
use clap::Parser;
use openbounds_data::tiling::{
    DEFAULT_LAYER, DEFAULT_MAX_ZOOM, DEFAULT_MIN_ZOOM, DEFAULT_TIPPECANOE,
};
use openbounds_data::{TilingRequest, TilingSources};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_TILING_CATALOG, ARG_TILING_LAYER, ARG_TILING_MAX_ZOOM, ARG_TILING_MIN_ZOOM,
    ARG_TILING_OUTPUT, ARG_TILING_SOURCES, ARG_TILING_TIPPECANOE, CliError, ENV_TILING_OUTPUT,
    ENV_TILING_SOURCES,
};

/// CLI arguments for the `vector-tiling` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "vector-tiling",
    long_about = "Build an MBTiles file from GeoJSON artefacts with \
                 tippecanoe. Sources are either explicit files and \
                 directories or the entries of a catalog written by the \
                 process command.",
    about = "Build vector tiles from processed artefacts"
)]
#[ortho_config(prefix = "OPENBOUNDS")]
pub(crate) struct TilingArgs {
    /// MBTiles file to create; must not exist yet.
    #[arg(value_name = "output")]
    #[serde(default)]
    pub(crate) output: Option<Utf8PathBuf>,
    /// GeoJSON files or directories to tile.
    #[arg(value_name = "sources")]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) sources: Vec<Utf8PathBuf>,
    /// Take sources from the `path` entries of this catalog.
    #[arg(long = ARG_TILING_CATALOG, value_name = "path")]
    #[serde(default)]
    pub(crate) catalog: Option<Utf8PathBuf>,
    /// Lowest zoom level (default 5).
    #[arg(long = ARG_TILING_MIN_ZOOM, value_name = "zoom")]
    #[serde(default)]
    pub(crate) min_zoom: Option<u8>,
    /// Highest zoom level (default 14).
    #[arg(long = ARG_TILING_MAX_ZOOM, value_name = "zoom")]
    #[serde(default)]
    pub(crate) max_zoom: Option<u8>,
    /// Tile layer name (default "lands").
    #[arg(long = ARG_TILING_LAYER, value_name = "name")]
    #[serde(default)]
    pub(crate) layer: Option<String>,
    /// Tile builder executable (default "tippecanoe").
    #[arg(long = ARG_TILING_TIPPECANOE, value_name = "program")]
    #[serde(default)]
    pub(crate) tippecanoe: Option<String>,
}

impl TilingArgs {
    pub(crate) fn into_config(self) -> Result<TilingConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        TilingConfig::try_from(merged)
    }
}

/// Validated settings for one tiling job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TilingConfig {
    pub(crate) output: Utf8PathBuf,
    pub(crate) sources: TilingSources,
    pub(crate) min_zoom: u8,
    pub(crate) max_zoom: u8,
    pub(crate) layer: String,
    pub(crate) program: String,
}

impl TilingConfig {
    pub(crate) fn into_request(self) -> TilingRequest {
        TilingRequest {
            output: self.output,
            sources: self.sources,
            min_zoom: self.min_zoom,
            max_zoom: self.max_zoom,
            layer: self.layer,
            program: self.program,
        }
    }
}

impl TryFrom<TilingArgs> for TilingConfig {
    type Error = CliError;

    fn try_from(args: TilingArgs) -> Result<Self, Self::Error> {
        let output = args.output.ok_or(CliError::MissingArgument {
            field: ARG_TILING_OUTPUT,
            env: ENV_TILING_OUTPUT,
        })?;
        let sources = match (args.catalog, args.sources.is_empty()) {
            (Some(_), false) => return Err(CliError::ConflictingTilingSources),
            (Some(catalog), true) => TilingSources::Catalog(catalog),
            (None, false) => TilingSources::Paths(args.sources),
            (None, true) => {
                return Err(CliError::MissingArgument {
                    field: ARG_TILING_SOURCES,
                    env: ENV_TILING_SOURCES,
                });
            }
        };
        Ok(Self {
            output,
            sources,
            min_zoom: args.min_zoom.unwrap_or(DEFAULT_MIN_ZOOM),
            max_zoom: args.max_zoom.unwrap_or(DEFAULT_MAX_ZOOM),
            layer: args.layer.unwrap_or_else(|| DEFAULT_LAYER.to_owned()),
            program: args
                .tippecanoe
                .unwrap_or_else(|| DEFAULT_TIPPECANOE.to_owned()),
        })
    }
}

pub(super) fn run_tiling(args: TilingArgs) -> Result<(), CliError> {
    let request = args.into_config()?.into_request();
    request.run()?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn tiling_config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<TilingConfig, CliError> {
    let merged = TilingArgs::merge_from_layers(layers).map_err(CliError::from)?;
    TilingConfig::try_from(merged)
}
