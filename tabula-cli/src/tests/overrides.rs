//! Clap parsing and service override validation.

use super::*;
use crate::config::{ARG_DEFAULT_PREVIEW_ROWS, ARG_ROW_GROUP_SIZE};
use rstest::rstest;
use std::time::Duration;
use tabula_core::ServiceConfig;

#[rstest]
fn parse_command_takes_request_path_and_overrides() {
    let cli = Cli::try_parse_from([
        "tabula",
        "parse",
        "request.json",
        "--max-file-size-mb",
        "5",
        "--max-processing-secs",
        "30",
    ])
    .expect("arguments parse");

    let (action, overrides) = cli.command.into_parts();
    assert_eq!(action, Action::Parse(Utf8PathBuf::from("request.json")));
    assert_eq!(overrides.max_file_size_mb, Some(5));
    assert_eq!(overrides.max_processing_secs, Some(30));
}

#[rstest]
#[case::info("info", Action::Info)]
#[case::sweep("sweep", Action::Sweep)]
fn service_commands_need_no_request(#[case] name: &str, #[case] expected: Action) {
    let cli = Cli::try_parse_from(["tabula", name]).expect("arguments parse");
    let (action, overrides) = cli.command.into_parts();
    assert_eq!(action, expected);
    assert!(overrides.scratch_dir.is_none());
}

#[rstest]
fn convert_requires_a_request_path() {
    let err = Cli::try_parse_from(["tabula", "convert"]).expect_err("missing path");
    assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
}

#[rstest]
fn unset_overrides_keep_defaults() {
    let config = ServiceArgs::default()
        .apply(ServiceConfig::default())
        .expect("defaults are valid");
    assert_eq!(config, ServiceConfig::default());
}

#[rstest]
fn overrides_replace_defaults() {
    let args = ServiceArgs {
        scratch_dir: Some(Utf8PathBuf::from("/var/tmp/tabula")),
        max_sql_response_mb: Some(7),
        max_processing_secs: Some(12),
        max_concurrent_conversions: Some(2),
        default_preview_rows: Some(50),
        default_sql_limit: Some(500),
        row_group_size: Some(1_000),
        scratch_max_age_secs: Some(90),
        ..ServiceArgs::default()
    };

    let config = args.apply(ServiceConfig::default()).expect("valid overrides");

    assert_eq!(config.scratch_dir, std::path::PathBuf::from("/var/tmp/tabula"));
    assert_eq!(config.max_sql_response_mb, 7);
    assert_eq!(config.max_processing_time, Duration::from_secs(12));
    assert_eq!(config.max_concurrent_conversions, 2);
    assert_eq!(config.default_preview_rows, 50);
    assert_eq!(config.default_sql_limit, 500);
    assert_eq!(config.row_group_size, 1_000);
    assert_eq!(config.scratch_max_age, Duration::from_secs(90));
    assert_eq!(config.max_file_size_mb, ServiceConfig::default().max_file_size_mb);
}

#[rstest]
#[case::row_group(ServiceArgs { row_group_size: Some(0), ..ServiceArgs::default() }, ARG_ROW_GROUP_SIZE)]
#[case::zero_preview(ServiceArgs { default_preview_rows: Some(0), ..ServiceArgs::default() }, ARG_DEFAULT_PREVIEW_ROWS)]
#[case::oversized_preview(ServiceArgs { default_preview_rows: Some(10_001), ..ServiceArgs::default() }, ARG_DEFAULT_PREVIEW_ROWS)]
fn out_of_range_overrides_are_rejected(#[case] args: ServiceArgs, #[case] expected: &str) {
    let err = args
        .apply(ServiceConfig::default())
        .expect_err("override should be rejected");
    match err {
        CliError::InvalidOverride { field, .. } => assert_eq!(field, expected),
        other => panic!("expected InvalidOverride, found {other:?}"),
    }
}
