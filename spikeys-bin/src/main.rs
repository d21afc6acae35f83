//! `spikeys` is a small HTTP load generator.
//! It sends a number of `GET` requests to a single URL, a few at a time,
//! and reports latency and throughput of the server behind it.
//!
//! The spikeys binary is a wrapper around spikeys-lib, which provides
//! convenience functions for calling spikeys from the command-line.
//!
//! Send 100 requests, 10 at a time:
//! ```sh
//! spikeys -n 100 -c 10 http://localhost:8080/
//! ```
//!
//! Give every request at most 2 seconds and the whole run at most a minute:
//! ```sh
//! spikeys -n 1000 -c 50 -s 2 -t 60 http://localhost:8080/health
//! ```
//!
//! Print the report as JSON:
//! ```sh
//! spikeys -n 100 -c 10 --format json http://localhost:8080/
//! ```
#![warn(clippy::all, clippy::pedantic)]
#![warn(
    absolute_paths_not_starting_with_crate,
    rustdoc::invalid_html_tags,
    missing_copy_implementations,
    missing_debug_implementations,
    semicolon_in_expressions_from_macros,
    unreachable_pub,
    unused_extern_crates,
    variant_size_differences,
    clippy::missing_const_for_fn
)]
#![deny(anonymous_parameters, macro_use_extern_crate)]
#![deny(missing_docs)]

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Error, Result, bail};
use clap::Parser;
use formatters::log::init_logging;
use log::{debug, info};
use spikeys_lib::{BenchmarkConfig, Dispatcher, ErrorKind, HttpPerformer};

mod formatters;
mod options;
mod stats;
mod verbosity;

use crate::{
    formatters::get_stats_formatter,
    options::{Config, SPIKEYS_CONFIG_FILE, SpikeysOptions},
    stats::BenchmarkStats,
};

/// A C-like enum that can be cast to `i32` and used as process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitCode {
    Success = 0,
    // NOTE: exit code 1 is used for any `Result::Err` bubbled up to `main()`
    // using the `?` operator. Configuration errors and both timeouts end up
    // here as well.
    Failure = 1,
}

fn main() -> Result<()> {
    // std::process::exit doesn't guarantee that all destructors will be run,
    // therefore we wrap the main code in another function to ensure that.
    // See: https://doc.rust-lang.org/stable/std/process/fn.exit.html
    let exit_code = run_main()?;
    std::process::exit(exit_code);
}

/// Merge all provided config options into one.
/// This includes a potential config file and command-line arguments.
fn load_config() -> Result<SpikeysOptions> {
    let mut opts = SpikeysOptions::try_parse()?;

    init_logging(&opts.config.verbose);

    // Load a potentially existing config file and merge it into the config from
    // the CLI
    if let Some(config_file) = &opts.config_file {
        match Config::load_from_file(config_file) {
            Ok(c) => opts.config.merge(c),
            Err(e) => {
                bail!(
                    "Cannot load configuration file `{}`: {e:?}",
                    config_file.display()
                );
            }
        }
    } else {
        // If no config file was explicitly provided, we try to load the default
        // config file from the current directory if the file exits. This will
        // raise an error if the file is invalid, just like the explicit provided
        // config file.
        let default_config = PathBuf::from(SPIKEYS_CONFIG_FILE);
        if default_config.is_file() {
            match Config::load_from_file(&default_config) {
                Ok(c) => opts.config.merge(c),
                Err(e) => {
                    bail!(
                        "Cannot load default configuration file `{}`: {e:?}",
                        default_config.display()
                    );
                }
            }
        }
    }

    Ok(opts)
}

/// Validate the options, set up the runtime and run the benchmark
fn run_main() -> Result<i32> {
    let opts = match load_config() {
        Ok(opts) => opts,
        Err(e) => {
            if let Some(clap_error) = e.downcast_ref::<clap::Error>() {
                clap_error.print()?;
                // `--help` and `--version` are not errors
                let code = if clap_error.use_stderr() {
                    ExitCode::Failure
                } else {
                    ExitCode::Success
                };
                return Ok(code as i32);
            }
            report_failure(&format!("Error while loading config: {e}"));
            return Ok(ExitCode::Failure as i32);
        }
    };

    // Everything is validated before the first request goes out
    let validated = opts.benchmark_config().and_then(|config| {
        let performer = opts.config.performer_builder()?.performer()?;
        Ok((config, performer))
    });
    let (benchmark_config, performer) = match validated {
        Ok(validated) => validated,
        Err(e) => {
            report_failure(&e.to_string());
            return Ok(ExitCode::Failure as i32);
        }
    };

    let runtime = tokio::runtime::Runtime::new()?;
    match runtime.block_on(run(&opts, benchmark_config, performer)) {
        Ok(code) => Ok(code),
        Err(e) if is_broken_pipe(&e) => Ok(ExitCode::Success as i32),
        Err(e) => {
            match e.downcast_ref::<ErrorKind>() {
                Some(kind) if kind.is_timeout() || kind.is_config_error() => {
                    report_failure(&kind.to_string());
                }
                _ => report_failure(&format!("Unexpected error during benchmarking: {e:?}")),
            }
            Ok(ExitCode::Failure as i32)
        }
    }
}

/// Print why the run failed.
///
/// Goes to stderr directly, so the message shows up even with logging off.
fn report_failure(message: &str) {
    debug!("Benchmark failed: {message}");
    eprintln!("Error: {message}");
}

/// Check if the given error can be traced back to a closed stdout
fn is_broken_pipe(error: &Error) -> bool {
    error.chain().any(|cause| {
        cause
            .downcast_ref::<io::Error>()
            .is_some_and(|e| e.kind() == io::ErrorKind::BrokenPipe)
    })
}

/// Run the benchmark and write the report
async fn run(
    opts: &SpikeysOptions,
    config: BenchmarkConfig,
    performer: HttpPerformer,
) -> Result<i32> {
    println!(
        "Benchmarking {} ...",
        config.url().host_str().unwrap_or_default()
    );

    let concurrency = config.max_concurrency();
    let result = Dispatcher::new(config, performer).run().await?;
    info!(
        "{} of {} requests completed",
        result.successful(),
        result.outcomes.len()
    );

    let stats = BenchmarkStats::from_run(&result, concurrency);
    let formatter = get_stats_formatter(opts.config.format);
    let report = formatter.format(&stats)?;

    if let Some(output) = &opts.config.output {
        fs::write(output, report).context("Cannot write status output to file")?;
    } else {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{report}")?;
    }

    Ok(ExitCode::Success as i32)
}
