//! Unit tests for vector-tiling argument resolution.

use super::helpers::{Workspace, write_utf8};
use super::*;
use crate::tiling::{TilingConfig, tiling_config_from_layers_for_test};
use camino::Utf8PathBuf;
use openbounds_data::TilingSources;
use ortho_config::MergeComposer;
use rstest::rstest;
use serde_json::json;

fn tiling_args(output: Option<&str>, sources: &[&str], catalog: Option<&str>) -> TilingArgs {
    TilingArgs {
        output: output.map(Utf8PathBuf::from),
        sources: sources.iter().copied().map(Utf8PathBuf::from).collect(),
        catalog: catalog.map(Utf8PathBuf::from),
        ..TilingArgs::default()
    }
}

#[rstest]
fn conversion_applies_defaults() {
    let config = TilingConfig::try_from(tiling_args(Some("tiles.mbtiles"), &["out"], None))
        .expect("config should build");
    assert_eq!(
        config,
        TilingConfig {
            output: Utf8PathBuf::from("tiles.mbtiles"),
            sources: TilingSources::Paths(vec![Utf8PathBuf::from("out")]),
            min_zoom: 5,
            max_zoom: 14,
            layer: "lands".to_owned(),
            program: "tippecanoe".to_owned(),
        }
    );
}

#[rstest]
fn catalog_selects_catalog_sources() {
    let config = TilingConfig::try_from(tiling_args(
        Some("tiles.mbtiles"),
        &[],
        Some("out/catalog.geojson"),
    ))
    .expect("config should build");
    assert_eq!(
        config.sources,
        TilingSources::Catalog(Utf8PathBuf::from("out/catalog.geojson"))
    );
}

#[rstest]
#[case::no_output(None, &[], Some("catalog.geojson"), ARG_TILING_OUTPUT)]
#[case::no_sources(Some("tiles.mbtiles"), &[], None, ARG_TILING_SOURCES)]
fn converting_without_required_fields_errors(
    #[case] output: Option<&str>,
    #[case] sources: &[&str],
    #[case] catalog: Option<&str>,
    #[case] expected: &'static str,
) {
    let err = TilingConfig::try_from(tiling_args(output, sources, catalog))
        .expect_err("missing field should error");
    match err {
        CliError::MissingArgument { field, .. } => assert_eq!(field, expected),
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
fn catalog_and_paths_conflict() {
    let err = TilingConfig::try_from(tiling_args(
        Some("tiles.mbtiles"),
        &["out"],
        Some("out/catalog.geojson"),
    ))
    .expect_err("conflicting sources");
    assert!(
        matches!(err, CliError::ConflictingTilingSources),
        "unexpected {err:?}"
    );
}

#[rstest]
fn parsing_tiling_flags() {
    let cli = Cli::try_parse_from([
        "openbounds",
        "vector-tiling",
        "tiles.mbtiles",
        "a.geojson",
        "more",
        "--min-zoom",
        "3",
        "--max-zoom",
        "10",
        "--layer",
        "coasts",
    ])
    .expect("arguments parse");
    match cli.command {
        Command::VectorTiling(args) => {
            let config = TilingConfig::try_from(args).expect("config should build");
            assert_eq!(
                config.sources,
                TilingSources::Paths(vec![
                    Utf8PathBuf::from("a.geojson"),
                    Utf8PathBuf::from("more")
                ])
            );
            assert_eq!((config.min_zoom, config.max_zoom), (3, 10));
            assert_eq!(config.layer, "coasts");
        }
        other => panic!("expected vector-tiling command, found {other:?}"),
    }
}

#[rstest]
fn merge_layers_honours_precedence() {
    let mut composer = MergeComposer::new();
    composer.push_file(json!({ "layer": "from-file", "max_zoom": 12 }), None);
    composer.push_environment(json!({ "layer": "from-env", "min_zoom": 2 }));
    composer.push_cli(json!({
        "output": "tiles.mbtiles",
        "catalog": "out/catalog.geojson",
    }));

    let config = tiling_config_from_layers_for_test(composer.layers())
        .expect("merged config should build");
    assert_eq!(config.layer, "from-env");
    assert_eq!((config.min_zoom, config.max_zoom), (2, 12));
}

#[rstest]
fn existing_output_is_refused_before_spawning() {
    let workspace = Workspace::new();
    let output = workspace.root().join("tiles.mbtiles");
    write_utf8(&output, b"existing");
    write_utf8(&workspace.output().join("lands.geojson"), b"{}");

    let mut config = TilingConfig::try_from(tiling_args(
        Some(output.as_str()),
        &[workspace.output().as_str()],
        None,
    ))
    .expect("config should build");
    config.program = "openbounds-missing-tile-builder".to_owned();

    let err = config
        .into_request()
        .run()
        .map_err(CliError::from)
        .expect_err("existing output");
    assert!(
        matches!(err, CliError::Tiling(openbounds_data::TilingError::OutputExists { .. })),
        "unexpected {err:?}"
    );
}
