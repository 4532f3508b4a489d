//! Slipway CLI - bootstrap the build toolchain and run MSBuild

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use slipway::core::config::load_config;
use slipway::core::errors::BootstrapError;
use slipway::ops;
use slipway::toolchain::ToolResolver;

mod cli;

use cli::Cli;

fn main() {
    // Exit quietly on Ctrl-C instead of surfacing an abort trace; the
    // interrupted subprocesses print their own notices.
    let _ = ctrlc::set_handler(|| std::process::exit(1));

    let cli = Cli::parse();

    // Set up logging
    let filter = match cli.verbosity.as_deref() {
        Some("detailed") | Some("diagnostic") => EnvFilter::new("slipway=debug"),
        _ => EnvFilter::new("slipway=info"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    if let Err(e) = run(&cli) {
        std::process::exit(report_error(&e, cli.ci));
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = load_config(cli.overrides())?;

    if config.clean {
        return ops::clean::run(&config);
    }

    let mut resolver = ToolResolver::for_host();
    ops::build::run(&config, &mut resolver, &cli.engine_args)
}

/// Print the failure and pick the process exit code.
///
/// An engine failure keeps its exit code and gets only a short plain
/// diagnostic: the engine already logged the real error, and a pipeline
/// annotation here would only duplicate it in CI summaries. Other typed
/// failures are rendered as pipeline annotations under CI so the hosting
/// system shows them as first-class errors.
fn report_error(error: &anyhow::Error, ci: bool) -> i32 {
    match error.downcast_ref::<BootstrapError>() {
        Some(BootstrapError::EngineFailed { code }) => {
            eprintln!("Build failed with exit code {}. Check errors above.", code);
            *code
        }
        Some(bootstrap) if ci => {
            eprintln!("::error title={}::{:#}", bootstrap.pipeline_title(), error);
            1
        }
        _ => {
            eprintln!("error: {:#}", error);
            1
        }
    }
}
