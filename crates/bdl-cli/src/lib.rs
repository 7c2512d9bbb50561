//! CLI logic for the BDL compiler.
//!
//! This module contains the core CLI logic: loading the configuration,
//! running the requested stage over the inputs and writing the result.

pub mod error_adapter;

mod args;
mod config;

pub use args::{Args, Stage};

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use log::{debug, info};

use bdl::{BdlError, Compiler, Object};

/// Run the BDL CLI application
///
/// The preprocess stage compiles each input on its own and emits the unit
/// artifacts. The compose stage compiles every input, elaborates the
/// configured targets and emits the composition views as a JSON array.
///
/// # Arguments
///
/// * `args` - Command-line arguments
///
/// # Errors
///
/// Returns `BdlError` for:
/// - File I/O errors
/// - Configuration loading errors
/// - Compilation and composition diagnostics
pub fn run(args: &Args) -> Result<(), BdlError> {
    info!(
        inputs:? = args.inputs,
        stage:? = args.stage;
        "Processing units"
    );

    let app_config = config::load_config(args.config.as_ref())?
        .with_search_paths(args.include.iter().cloned())
        .with_targets(args.targets.clone());
    let app_config = if args.no_cache {
        app_config.with_cache_enabled(false)
    } else {
        app_config
    };
    debug!(config:? = app_config; "Effective configuration");

    let compiler = Compiler::new(app_config)?;
    let objects = args
        .inputs
        .iter()
        .map(|input| compiler.compile(input))
        .collect::<Result<Vec<Object>, _>>()?;

    let output = match args.stage {
        Stage::Preprocess => objects
            .iter()
            .zip(&args.inputs)
            .map(|(object, input)| object.to_json().map_err(|err| serialize_error(input, err)))
            .collect::<Result<Vec<_>, _>>()?
            .join("\n"),
        Stage::Compose => {
            let views = compiler.compose(&objects)?;
            info!(targets = views.len(); "Composition elaborated");
            serde_json::to_string_pretty(&views)
                .map_err(|err| serialize_error(output_path(args), err))?
        }
    };

    match &args.output {
        Some(path) => {
            fs::write(path, output).map_err(|source| BdlError::Io {
                path: path.clone(),
                source,
            })?;
            info!(output_file:? = path; "Output written");
        }
        None => println!("{output}"),
    }

    Ok(())
}

fn output_path(args: &Args) -> &Path {
    args.output
        .as_deref()
        .unwrap_or_else(|| Path::new("<stdout>"))
}

fn serialize_error(path: &Path, err: serde_json::Error) -> BdlError {
    BdlError::Io {
        path: PathBuf::from(path),
        source: io::Error::from(err),
    }
}
