//! Command line entry point for docshift.
//!
//! Parses the command line, loads and validates configuration, then runs one transformation on a
//! single-threaded runtime. Failures are reported on stderr and the process exits with status 1.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use docshift::pipeline::Pipeline;
use docshift_config::shared::Transformation;
use docshift_telemetry::tracing::init_tracing;
use tracing::{error, info};

use crate::config::{Overrides, load_transform_config};
use crate::error::{CliError, CliResult};

mod config;
mod error;

/// Rewrites JSON document collections and converts CSV files to JSON.
#[derive(Parser, Debug)]
#[command(name = "docshift", version)]
struct Args {
    /// Transformation to run: clear-identifiers, assign-identifiers or csv-to-json
    transformation: String,

    /// File to read documents or CSV rows from
    source: PathBuf,

    /// File to write the result to, replaced if it exists
    target: PathBuf,

    /// Indentation: a number of spaces, or `tabs` [default: 2]
    #[arg(short, long)]
    indent: Option<String>,

    /// Base url of the document store handing out identifiers [default: http://localhost:5984]
    #[arg(short, long)]
    url: Option<String>,
}

/// Entry point for the `docshift` binary.
fn main() -> ExitCode {
    let args = Args::parse();

    let _log_flusher = match init_tracing(env!("CARGO_BIN_NAME")) {
        Ok(flusher) => flusher,
        Err(err) => {
            eprint!("{}", CliError::config(err).render_report());
            return ExitCode::FAILURE;
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            eprint!("{}", err.render_report());
            ExitCode::FAILURE
        }
    }
}

/// Validates the invocation and runs the transformation to completion.
fn run(args: Args) -> CliResult<()> {
    let transformation = args.transformation.parse::<Transformation>()?;
    let overrides = Overrides {
        indent: args.indent,
        url: args.url,
    };
    let config = load_transform_config(&overrides)?;
    let pipeline = Pipeline::new(config)?;

    // Transformations are single-threaded; the runtime only drives I/O and identifier fetches.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let summary = runtime.block_on(pipeline.run(transformation, &args.source, &args.target))?;

    info!(
        transformation = %transformation,
        documents = summary.documents,
        sink = %summary.target,
        "transformation finished"
    );

    Ok(())
}
