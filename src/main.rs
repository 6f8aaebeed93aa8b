mod catalog;
mod config;
mod dispatch;
mod error;
mod midi;
mod server;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use catalog::ControllerCatalog;
use config::{MessageKind, ServerConfig};
use dispatch::DispatchEngine;
use midi::monitor::MidiMonitor;
use midi::transport::{self, MidirTransport, PortInfo};

/// HTTP control surface for VYPYR amplifiers
#[derive(Parser, Debug)]
#[command(name = "vypyr-control")]
#[command(about = "Forward HTTP commands to a VYPYR amplifier over MIDI", long_about = None)]
struct Args {
    /// Configuration file (YAML)
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// HTTP listen port
    #[arg(short = 'p', long = "port", env = "PORT")]
    port: Option<u16>,

    /// HTTP listen address
    #[arg(long = "host")]
    host: Option<String>,

    /// Controller catalog (YAML) replacing the builtin one
    #[arg(long = "catalog")]
    catalog: Option<PathBuf>,

    /// List available MIDI ports and exit
    #[arg(short = 'l', long = "list")]
    list_devices: bool,

    /// Log messages arriving from the amplifier
    #[arg(short = 'm', long = "monitor")]
    monitor: bool,

    /// Input port index for the monitor
    #[arg(long = "monitor-port")]
    monitor_port: Option<usize>,

    /// Message kinds the monitor should stop ignoring
    #[arg(long = "receive", value_enum)]
    receive: Vec<MessageKind>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    if args.list_devices {
        return list_devices(&config);
    }

    let catalog = match &config.catalog {
        Some(path) => ControllerCatalog::load(path)?,
        None => ControllerCatalog::builtin()?,
    };
    info!(entries = catalog.len(), "loaded controller catalog");
    for (category, specs) in catalog.categories() {
        for spec in specs {
            debug!(
                category,
                program = spec.program,
                ctrlr = spec.controller,
                rule = spec.rule().map_or("none", |rule| rule.name),
                "catalog entry"
            );
        }
    }

    // Kept alive for the lifetime of the server
    let _monitor = if config.monitor.enabled {
        match MidiMonitor::start(&config.monitor, &config.device_prefix, &config.client_name) {
            Ok(monitor) => {
                info!(port = monitor.port().index, "monitoring {}", monitor.port().name);
                Some(monitor)
            }
            Err(e) => {
                warn!("MIDI monitor unavailable: {:#}", e);
                None
            }
        }
    } else {
        None
    };

    let engine = Arc::new(DispatchEngine::new(
        MidirTransport::new(config.client_name.clone()),
        Arc::new(catalog),
        config.device_prefix.clone(),
    ));

    let server = server::start(&config, engine)
        .with_context(|| format!("Failed to start HTTP server on {}", config.listen_addr()))?;
    info!("Listening on {}", server.listen);
    server.join();

    Ok(())
}

/// Merge the config file (if any) with command line overrides
fn load_config(args: &Args) -> Result<ServerConfig> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };

    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(catalog) = &args.catalog {
        config.catalog = Some(catalog.clone());
    }
    if args.monitor {
        config.monitor.enabled = true;
    }
    if let Some(port) = args.monitor_port {
        config.monitor.port = Some(port);
    }
    if !args.receive.is_empty() {
        config.monitor.receive = args.receive.clone();
    }

    config.validate()?;
    Ok(config)
}

fn list_devices(config: &ServerConfig) -> Result<()> {
    let outputs = transport::list_output_ports(&config.client_name)?;
    let inputs = transport::list_input_ports(&config.client_name)?;

    println!("Available MIDI Output Ports:");
    print_ports(&outputs, &config.device_prefix);
    println!("\nAvailable MIDI Input Ports:");
    print_ports(&inputs, &config.device_prefix);
    Ok(())
}

fn print_ports(ports: &[PortInfo], prefix: &str) {
    if ports.is_empty() {
        println!("  (none)");
    }
    for port in ports {
        let marker = if port.name.starts_with(prefix) { "*" } else { " " };
        println!("  {} {}: {}", marker, port.index, port.name);
    }
}
