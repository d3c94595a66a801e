//! rotolog CLI - pipes stdin through a severity dispatcher

use anyhow::{Context, Result};
use clap::Parser;
use rotolog_core::{LoggerConfig, ADAPTER_FILE};
use rotolog_logs::{AdapterRegistry, Dispatcher};
use std::io::{self, BufRead};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

use cli::Cli;

fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    // Diagnostics go to stderr so they never mix with console output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("rotolog={},rotolog_logs={}", log_level, log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr).without_time())
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(exit_code(&e));
    }
}

/// Configuration mistakes exit with 2, runtime failures with 1
fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<rotolog_core::Error>() {
        Some(e) if e.is_config() => 2,
        _ => 1,
    }
}

fn run(cli: Cli) -> Result<()> {
    let registry = AdapterRegistry::global();

    if cli.list_adapters {
        for name in registry.names() {
            println!("{}", name);
        }
        return Ok(());
    }

    let config = load_config(&cli)?;
    let dispatcher = Dispatcher::new(registry);

    if let Some(levels) = &config.levels {
        dispatcher.set_recognized_severities(levels.iter().cloned());
    }
    if let Some(level) = &config.level {
        dispatcher.set_minimum_severity(level);
    }

    dispatcher
        .configure_output(&config.output, &config.options)
        .with_context(|| format!("Failed to configure output '{}'", config.output))?;
    info!(
        "Writing to '{}' with minimum severity {}",
        config.output,
        dispatcher.minimum_severity()
    );

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let mut line = Vec::new();
    let mut count = 0u64;
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        dispatcher.write(&line)?;
        count += 1;
    }
    debug!("Read {} line(s) from stdin", count);

    dispatcher.flush();
    dispatcher.close();
    Ok(())
}

/// Merge the config file with command line overrides
fn load_config(cli: &Cli) -> Result<LoggerConfig> {
    let mut config = match &cli.config {
        Some(path) => LoggerConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => LoggerConfig::default(),
    };

    if let Some(output) = &cli.output {
        config.output = output.clone();
    }
    if let Some(file) = &cli.file {
        config.output = ADAPTER_FILE.to_string();
        let mut options = match config.options {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        options.insert("filepath".to_string(), serde_json::json!(file));
        config.options = serde_json::Value::Object(options);
    }
    if let Some(level) = &cli.level {
        config.level = Some(level.clone());
    }
    if !cli.levels.is_empty() {
        config.levels = Some(cli.levels.clone());
    }

    Ok(config)
}
