//! Command-line argument definitions for the BDL CLI.
//!
//! This module defines the [`Args`] structure parsed from the command line
//! using [`clap`]. Arguments select the stage to run, the inputs and output,
//! the configuration file, overrides of configuration values, and logging
//! verbosity.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// How far the inputs are processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Stage {
    /// Compile each input and write its cache artifact.
    Preprocess,
    /// Compile every input and elaborate the composition targets.
    Compose,
}

/// Command-line arguments for the BDL compiler
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Paths to the input BDL files
    #[arg(required = true, help = "Paths to the input files")]
    pub inputs: Vec<PathBuf>,

    /// Stage to run
    #[arg(long, value_enum, default_value_t = Stage::Compose)]
    pub stage: Stage,

    /// Composition target, may be repeated (replaces the configured targets)
    #[arg(short, long = "target")]
    pub targets: Vec<String>,

    /// Additional include search directory, may be repeated
    #[arg(short = 'I', long = "include")]
    pub include: Vec<PathBuf>,

    /// Path to the output file, standard output if omitted
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Path to configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Neither read nor write cache artifacts
    #[arg(long)]
    pub no_cache: bool,

    /// Report errors in the plain `path:line:column` format
    #[arg(long)]
    pub plain: bool,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["bdl", "main.bdl"]);

        assert_eq!(args.inputs, [PathBuf::from("main.bdl")]);
        assert_eq!(args.stage, Stage::Compose);
        assert!(args.targets.is_empty());
        assert!(!args.no_cache);
        assert_eq!(args.log_level, "warn");
    }

    #[test]
    fn test_repeated_options() {
        let args = Args::parse_from([
            "bdl", "--stage", "preprocess", "-t", "linux", "--target", "esp32", "-I", "lib", "-I",
            "vendor", "a.bdl", "b.bdl",
        ]);

        assert_eq!(args.stage, Stage::Preprocess);
        assert_eq!(args.targets, ["linux", "esp32"]);
        assert_eq!(args.include, [PathBuf::from("lib"), PathBuf::from("vendor")]);
        assert_eq!(args.inputs.len(), 2);
    }

    #[test]
    fn test_inputs_are_required() {
        assert!(Args::try_parse_from(["bdl"]).is_err());
    }
}
