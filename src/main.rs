use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn, Level};

mod bus;
mod config;
mod error;
mod gamma;
mod model;
mod pixel_format;
mod probe;
mod protocol;
mod server;
mod show;
mod strip;

use config::Config;
use server::HttpServer;

#[derive(Parser)]
#[command(name = "ws2801_server")]
#[command(about = "WS2801 LED strip controller\n\nReceives frames and shows over HTTP and drives the strip over SPI.", long_about = None)]
struct Cli {
    /// Path to configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// HTTP port (overrides the config file)
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Enable debug output (statistics)
    #[arg(long)]
    debug: bool,

    /// Enable detailed debug (hex dumps every frame)
    #[arg(long)]
    ddebug: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Check the bus wiring: send a test pattern and time transfers
    Probe {
        /// Number of LEDs to light
        #[arg(long, default_value_t = 10)]
        leds: usize,

        /// Also cycle through the test colours
        #[arg(long)]
        colors: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // ddebug implies debug
    let debug = cli.debug || cli.ddebug;
    init_logging(debug, cli.ddebug);

    let config = load_config(&cli)?;

    match cli.command {
        Some(Command::Probe { leds, colors }) => probe::run(&config, leds, colors),
        None => serve(config, debug),
    }
}

fn init_logging(debug: bool, ddebug: bool) {
    let level = if ddebug {
        Level::TRACE
    } else if debug {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::fmt().with_max_level(level).with_target(false).init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            let data = fs::read_to_string(path)
                .context(format!("Failed to read config file {}", path.display()))?;
            Config::from_json(&data)?
        }
        None => Config::default(),
    };

    if let Some(port) = cli.port {
        config.http.port = port;
    }

    Ok(config)
}

fn serve(config: Config, debug: bool) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    // Nothing works without the bus, so this is the one fatal startup error
    let bus = bus::open(&config.bus).context("Failed to open LED bus")?;
    let server = HttpServer::new(config, bus, debug)?;

    // Set up Ctrl-C handler with graceful shutdown
    let stop = server.get_stop_handle();
    let result = ctrlc::set_handler(move || {
        info!("Shutting down...");
        stop.notify_one();
    });

    if let Err(e) = result {
        warn!("Could not set Ctrl-C handler: {}", e);
    }

    // Run server (blocks until shutdown)
    let served = runtime.block_on(server.run());

    // Clear the strip even if serving failed
    server.shutdown();

    served
}
