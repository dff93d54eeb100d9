// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Axon Daemon (axond)
//!
//! Hosts the reactor, the manager and the node fleet. The HTTP control
//! surface and protocol plugins attach from outside; this binary only runs
//! the data plane.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axon_bus::{PortTable, Reactor};
use axon_core::{LogLevel, SystemClock};
use axon_manager::{Manager, ManagerConfig, PluginRegistry};
use axon_metrics::Registry;
use axon_storage::FileStore;
use tracing::{error, info};
use tracing_subscriber::{reload, EnvFilter};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut config_path = PathBuf::from("/etc/axon/axond.toml");
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("axond {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("axond {}", env!("CARGO_PKG_VERSION"));
                println!("Axon daemon - industrial IoT data-plane broker");
                println!();
                println!("USAGE:");
                println!("    axond [--config <path>]");
                println!();
                println!("OPTIONS:");
                println!("    -c, --config <path>  Configuration file (TOML)");
                println!("    -h, --help           Print help information");
                println!("    -v, --version        Print version information");
                return Ok(());
            }
            "--config" | "-c" => {
                config_path = args
                    .next()
                    .map(PathBuf::from)
                    .ok_or("--config requires a path")?;
            }
            other => {
                eprintln!("error: unexpected argument '{other}'");
                eprintln!("Usage: axond [--config <path>]");
                std::process::exit(1);
            }
        }
    }

    let config = ManagerConfig::load(&config_path)?;
    let reload_handle = setup_logging(&config)?;

    info!(version = env!("CARGO_PKG_VERSION"), "starting axond");

    let reactor = Arc::new(Reactor::new());
    let ports = PortTable::new();
    let store = Arc::new(FileStore::open(&config.state_file)?);
    let metrics = Registry::new();
    metrics.set_state_path(
        config
            .state_file
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/")),
    );
    if let Some(dump_dir) = &config.dump_dir {
        metrics.set_dump_dir(dump_dir.clone());
    }

    // Protocol plugins register here; the data plane does not ship any
    let plugins = Arc::new(PluginRegistry::new());

    let manager = match Manager::new(reactor, ports, store, metrics, plugins, SystemClock) {
        Ok(manager) => manager,
        Err(code) => {
            error!(code = %code, "manager bring-up failed");
            std::process::exit(1);
        }
    };
    manager.set_core_level_hook(move |level| {
        let filter = EnvFilter::new(level_to_filter(level));
        if let Err(e) = reload_handle.reload(filter) {
            error!(error = %e, "log filter reload failed");
        }
    });

    info!("axond running");
    // The reactor thread owns all the work; this thread just keeps the
    // process alive until a signal terminates it.
    loop {
        std::thread::sleep(Duration::from_secs(3600));
    }
}

fn level_to_filter(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Trace => "trace",
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    }
}

type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

fn setup_logging(
    config: &ManagerConfig,
) -> Result<ReloadHandle, Box<dyn std::error::Error>> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    std::fs::create_dir_all(&config.log_dir)?;
    let appender = tracing_appender::rolling::daily(&config.log_dir, "axond.log");

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));
    let (filter, reload_handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(appender).with_ansi(false))
        .init();

    Ok(reload_handle)
}
