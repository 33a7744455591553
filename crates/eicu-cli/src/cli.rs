//! CLI argument definitions for the eICU tuple pipeline.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

use eicu_cli::commands::ConfigOverrides;

#[derive(Parser)]
#[command(
    name = "eicu-tuples",
    version,
    about = "Turn an eICU export into integer-coded patient event tuples",
    long_about = "Build code vocabularies from eICU tables, merge them into one dictionary,\n\
                  encode every event as (patient, admission, time, code, value) and\n\
                  check the resulting tuple file against the dictionary."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Count codes per source table into `<index>/<table>_dict.dict`.
    Vocabulary,

    /// Merge the table vocabularies into the indexed code dictionary.
    Dictionary,

    /// Encode every table into per-patient partial tuple files.
    Encode,

    /// Merge partial files into the time-ordered tuple file.
    Merge,

    /// Recount frequencies from the tuple file and write the revised dictionary.
    Revise(ReviseArgs),

    /// Write demographics for patients present in the tuple file.
    Patients,

    /// Run every stage in order.
    Run(ReviseArgs),
}

#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
    /// Pipeline configuration file (TOML).
    #[arg(long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the eICU CSV tables.
    #[arg(long = "source-dir", value_name = "DIR", global = true)]
    pub source_dir: Option<PathBuf>,

    /// Directory receiving every generated artifact.
    #[arg(long = "output-dir", value_name = "DIR", global = true)]
    pub output_dir: Option<PathBuf>,

    /// Maximum rows held in memory per scan.
    #[arg(long = "chunk-rows", value_name = "ROWS", global = true)]
    pub chunk_rows: Option<usize>,
}

impl PipelineArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            config: self.config.clone(),
            source_dir: self.source_dir.clone(),
            output_dir: self.output_dir.clone(),
            chunk_rows: self.chunk_rows,
        }
    }
}

#[derive(Args, Debug, Clone, Copy, Default)]
pub struct ReviseArgs {
    /// Exit non-zero when recounted frequencies differ from the dictionary.
    #[arg(long = "fail-on-drift")]
    pub fail_on_drift: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
