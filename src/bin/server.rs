use clap::Parser;
use roster_server::{Config, Server};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = 35000)]
    port: u16,

    /// Bind address
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    /// Number of worker threads (0 = number of CPUs)
    #[arg(short = 't', long, default_value_t = 0)]
    threads: usize,

    /// Config file path (holds the [[servers]] roster)
    #[arg(short, long)]
    config: Option<String>,

    /// Tunnel server IP advertised to clients, overriding per-entry values
    #[arg(long)]
    tunnel_ip: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let log_level = if args.verbose {
        "debug"
    } else {
        &args.log_level
    };
    tracing_subscriber::fmt()
        .with_env_filter(format!("roster_server={}", log_level))
        .init();

    // Create configuration
    let config = if let Some(config_path) = args.config {
        let mut config = Config::from_file(&config_path)?;

        // Flags override file values where given
        if args.tunnel_ip.is_some() {
            config.tunnel_ip_override = args.tunnel_ip;
        }
        if args.threads != 0 {
            config.threads = args.threads;
        }
        config
    } else {
        let threads = if args.threads == 0 {
            num_cpus::get()
        } else {
            args.threads
        };

        Config {
            bind_addr: args.bind,
            port: args.port,
            threads,
            tunnel_ip_override: args.tunnel_ip,
            ..Default::default()
        }
    };

    info!(
        "Starting roster-server v{} on {}:{} with {} worker threads",
        env!("CARGO_PKG_VERSION"),
        config.bind_addr,
        config.port,
        config.threads
    );

    // Create and run server
    let server = Arc::new(Server::new(config)?);

    // Setup signal handler for graceful shutdown
    let server_clone = Arc::clone(&server);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal, shutting down gracefully...");
        server_clone.shutdown();
    })?;

    // Run the server
    if let Err(e) = server.run() {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
