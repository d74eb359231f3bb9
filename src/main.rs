//! Takeout export - bulk export of account data into browsable files.
//!
//! Usage:
//!   takeout-export init                       # Write the default config
//!   takeout-export check my.toml              # Show the effective settings
//!   takeout-export export -r fixture.json     # Export from a recorded session
//!   takeout-export export -r f.json -f json -o ./out

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use takeout_export::application::{
    format_failure, format_progress, format_settings_table, format_start, format_stats,
    ExportController,
};
use takeout_export::cli::{Cli, Commands};
use takeout_export::domain::{AppConfig, AppError, ExportEvent};
use takeout_export::infrastructure::{config_file_path, ensure_config_exists, load_config, ReplayClient};

fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose);

    if let Err(e) = run(&cli) {
        match e.downcast_ref::<AppError>() {
            Some(app) => eprintln!("{}", format_failure(app.kind(), &app.to_string(), app.path())),
            None => eprintln!("{} {e:#}", "Error:".red().bold()),
        }
        std::process::exit(1);
    }
}

/// Main application logic.
fn run(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Init { path } => {
            let path = path.clone().unwrap_or_else(config_file_path);
            cmd_init(&path)?;
        }
        Commands::Check { .. } => {
            let config = load_effective_config(cli)?;
            cmd_check(&config);
        }
        Commands::Export { replay, .. } => {
            let config = load_effective_config(cli)?;
            cmd_export(&config, replay)?;
        }
    }

    Ok(())
}

fn load_effective_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut config = load_config(cli.config_path())?;
    cli.apply_overrides(&mut config).map_err(AppError::config)?;
    config.validate()?;
    Ok(config)
}

/// Write the default configuration command.
fn cmd_init(path: &Path) -> anyhow::Result<()> {
    if ensure_config_exists(path)? {
        println!("{} Created {}", "✓".green().bold(), path.display());
    } else {
        println!("{} {} already exists", "•".yellow(), path.display());
    }
    Ok(())
}

/// Show the effective settings command.
fn cmd_check(config: &AppConfig) {
    println!("{}", format_settings_table(&config.resolved_settings(), &config.transfer));
    println!("{} Configuration is valid", "✓".green().bold());
}

/// Run one export to completion, printing its events.
fn cmd_export(config: &AppConfig, replay: &Path) -> anyhow::Result<()> {
    let client = ReplayClient::from_file(replay)
        .with_context(|| format!("Loading replay fixture {}", replay.display()))?;
    let settings = config.resolved_settings();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;

    runtime.block_on(async {
        let (controller, mut events) =
            ExportController::new(Arc::new(client), settings, &config.transfer);
        let printer = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                print_event(&event);
            }
        });
        let result = controller.run().await;
        printer.await.context("Event printer stopped unexpectedly")?;
        result.map(|_| ()).map_err(anyhow::Error::from)
    })
}

fn print_event(event: &ExportEvent) {
    match event {
        ExportEvent::Started(info) => println!("{}", format_start(info)),
        ExportEvent::Progress(snapshot) => {
            tracing::info!("{}", format_progress(snapshot));
        }
        ExportEvent::Finished { path, stats } => println!("{}", format_stats(stats, path)),
        // The error is reported once on exit.
        ExportEvent::Error { .. } => {}
    }
}

/// Setup tracing/logging based on verbosity level.
fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}
