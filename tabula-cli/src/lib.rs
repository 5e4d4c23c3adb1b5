//! Command-line interface for the Tabula ingestion engine.
//!
//! `parse` and `convert` read a JSON request file and print the resulting
//! envelope on stdout; `info` prints capabilities and limits; `sweep` runs a
//! single scratch-directory sweep.
#![forbid(unsafe_code)]

mod config;
mod error;

use std::io::{BufReader, Read, Write};
use std::process::ExitCode;

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand};
use log::debug;
use serde::Serialize;
use tabula_core::{ConversionRequest, ErrorKind, ParseRequest, RequestError, ResultEnvelope};
use tabula_data::IngestService;
use tabula_data::sweep::sweep_once;
use tabula_fs::open_utf8_file;

use config::ServiceArgs;
pub use error::CliError;

/// How a successful invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The command did what it was asked.
    Success,
    /// A failure envelope was printed.
    Failure,
}

impl Outcome {
    /// Process exit status for this outcome.
    #[must_use]
    pub fn exit_code(self) -> ExitCode {
        match self {
            Self::Success => ExitCode::SUCCESS,
            Self::Failure => ExitCode::FAILURE,
        }
    }

    fn of<T>(envelope: &ResultEnvelope<T>) -> Self {
        if envelope.is_success() {
            Self::Success
        } else {
            Self::Failure
        }
    }
}

/// Run the Tabula CLI with the current process arguments and environment.
///
/// # Errors
///
/// Returns [`CliError`] when arguments or configuration are invalid, or when
/// output cannot be produced. Request failures are printed as envelopes and
/// reported through [`Outcome::Failure`] instead.
pub fn run() -> Result<Outcome, CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    let (action, overrides) = cli.command.into_parts();
    let config = overrides.into_config()?;
    let service = IngestService::with_http(config)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    let mut stdout = std::io::stdout().lock();
    runtime.block_on(execute(action, &service, &mut stdout))
}

#[derive(Debug, Parser)]
#[command(
    name = "tabula",
    about = "Read remote tabular sources and convert them to Parquet",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parse a source and print its rows.
    Parse(RequestArgs),
    /// Convert a source to Parquet and upload it.
    Convert(RequestArgs),
    /// Print supported formats and active limits.
    Info(ServiceArgs),
    /// Remove stale files from the scratch directory once.
    Sweep(ServiceArgs),
}

impl Command {
    fn into_parts(self) -> (Action, ServiceArgs) {
        match self {
            Self::Parse(args) => (Action::Parse(args.request), args.service),
            Self::Convert(args) => (Action::Convert(args.request), args.service),
            Self::Info(service) => (Action::Info, service),
            Self::Sweep(service) => (Action::Sweep, service),
        }
    }
}

/// Arguments for commands that read a request file.
#[derive(Debug, Args)]
struct RequestArgs {
    /// Path to a JSON request file.
    #[arg(value_name = "path")]
    request: Utf8PathBuf,
    #[command(flatten)]
    service: ServiceArgs,
}

/// A resolved command, independent of how its configuration was layered.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    Parse(Utf8PathBuf),
    Convert(Utf8PathBuf),
    Info,
    Sweep,
}

#[derive(Debug, Serialize)]
struct SweepSummary<'a> {
    directory: &'a str,
    scanned: usize,
    removed: usize,
    failed: usize,
}

async fn execute(
    action: Action,
    service: &IngestService,
    writer: &mut dyn Write,
) -> Result<Outcome, CliError> {
    match action {
        Action::Parse(path) => {
            let envelope = match read_request(&path, |r| ParseRequest::from_reader(r))? {
                Ok(request) => service.parse(request).await,
                Err(err) => ResultEnvelope::failure(ErrorKind::Validation, err),
            };
            write_json(writer, &envelope)?;
            Ok(Outcome::of(&envelope))
        }
        Action::Convert(path) => {
            let envelope = match read_request(&path, |r| ConversionRequest::from_reader(r))? {
                Ok(request) => service.convert(request).await,
                Err(err) => ResultEnvelope::failure(ErrorKind::Validation, err),
            };
            write_json(writer, &envelope)?;
            Ok(Outcome::of(&envelope))
        }
        Action::Info => {
            write_json(writer, &service.info())?;
            Ok(Outcome::Success)
        }
        Action::Sweep => {
            let dir = service.scratch().dir();
            let report = sweep_once(service.scratch(), service.config().scratch_max_age)
                .await
                .map_err(|source| CliError::Sweep {
                    dir: dir.to_owned(),
                    source,
                })?;
            write_json(
                writer,
                &SweepSummary {
                    directory: dir.as_str(),
                    scanned: report.scanned,
                    removed: report.removed,
                    failed: report.failed,
                },
            )?;
            Ok(Outcome::Success)
        }
    }
}

/// Open `path` and decode it; decoding failures are returned, not raised.
fn read_request<T>(
    path: &Utf8Path,
    decode: impl FnOnce(&mut dyn Read) -> Result<T, RequestError>,
) -> Result<Result<T, RequestError>, CliError> {
    debug!("reading request from {path}");
    let file = open_utf8_file(path).map_err(|source| CliError::OpenRequest {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);
    Ok(decode(&mut reader))
}

fn write_json(writer: &mut dyn Write, value: &impl Serialize) -> Result<(), CliError> {
    serde_json::to_writer_pretty(&mut *writer, value).map_err(CliError::SerializeOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)
}

#[cfg(test)]
mod tests;
