//! carthage-step - Carthage with dependency build caching
//!
//! CI entry point: reads inputs from flags or the environment and runs the
//! step pipeline. This is the only place the process exits with failure.

use carthage_step::cli::Cli;
use carthage_step::config::StepConfig;
use carthage_step::error::StepResult;
use clap::Parser;
use console::style;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> StepResult<()> {
    let cli = Cli::parse();
    let config = StepConfig::from_cli(cli)?;

    let filter = if config.verbose_log {
        EnvFilter::new("carthage_step=debug")
    } else {
        EnvFilter::new("carthage_step=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    config.print();

    let outcome = carthage_step::step::execute(&config).await?;
    debug!("Step finished: {:?}", outcome);
    Ok(())
}
