//! eICU tuple pipeline CLI.

use clap::{ColorChoice, Parser};
use eicu_cli::commands::{
    resolve_config, run_dictionary, run_encode, run_merge, run_patients, run_pipeline,
    run_revise, run_vocabulary,
};
use eicu_cli::logging::{LogConfig, LogFormat, init_logging};
use std::io::{self, IsTerminal};
use tracing::level_filters::LevelFilter;

mod cli;
mod summary;

use crate::cli::{Cli, Command, LogFormatArg, LogLevelArg};
use crate::summary::{
    print_dictionary_summary, print_encode_summary, print_merge_summary, print_patients_summary,
    print_revision_summary, print_run_summary, print_vocabulary_summary,
};

fn main() {
    let cli = Cli::parse();
    cli.color.write_global();
    let log_config = log_config_from_cli(&cli);
    if let Err(error) = init_logging(&log_config) {
        eprintln!("error: failed to initialize logging: {error}");
        std::process::exit(1);
    }
    let exit_code = match run(&cli) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error:#}");
            1
        }
    };
    std::process::exit(exit_code);
}

fn run(cli: &Cli) -> anyhow::Result<i32> {
    let config = resolve_config(&cli.pipeline.overrides())?;
    let code = match cli.command {
        Command::Vocabulary => {
            print_vocabulary_summary(&run_vocabulary(&config)?);
            0
        }
        Command::Dictionary => {
            print_dictionary_summary(&run_dictionary(&config)?);
            0
        }
        Command::Encode => {
            print_encode_summary(&run_encode(&config)?);
            0
        }
        Command::Merge => {
            print_merge_summary(run_merge(&config)?.as_ref());
            0
        }
        Command::Revise(args) => {
            let result = run_revise(&config)?;
            print_revision_summary(&result);
            i32::from(result.is_failure(args.fail_on_drift))
        }
        Command::Patients => {
            print_patients_summary(&run_patients(&config)?);
            0
        }
        Command::Run(args) => {
            let result = run_pipeline(&config, args.fail_on_drift)?;
            print_run_summary(&result);
            i32::from(result.has_errors)
        }
    };
    Ok(code)
}

/// Build logging configuration from CLI flags with consistent precedence.
fn log_config_from_cli(cli: &Cli) -> LogConfig {
    let mut config = LogConfig {
        level_filter: cli.verbosity.tracing_level_filter(),
        ..LogConfig::default()
    };
    config.use_env_filter = !(cli.verbosity.is_present() || cli.log_level.is_some());
    if let Some(level) = cli.log_level {
        config.level_filter = match level {
            LogLevelArg::Error => LevelFilter::ERROR,
            LogLevelArg::Warn => LevelFilter::WARN,
            LogLevelArg::Info => LevelFilter::INFO,
            LogLevelArg::Debug => LevelFilter::DEBUG,
            LogLevelArg::Trace => LevelFilter::TRACE,
        };
    }
    config.format = match cli.log_format {
        LogFormatArg::Pretty => LogFormat::Pretty,
        LogFormatArg::Compact => LogFormat::Compact,
        LogFormatArg::Json => LogFormat::Json,
    };
    config.log_file = cli.log_file.clone();
    config.with_ansi = match cli.color.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => cli.log_file.is_none() && io::stderr().is_terminal(),
    };
    config
}
