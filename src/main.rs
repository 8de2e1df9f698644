//! qsonac server binary.
//!
//! ```text
//! CLI → config (file + overrides) → logging → runtime → listener → sessions
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use qsonac::config::{load_config, validation::validate_config, ConfigError, ServerConfig};
use qsonac::lifecycle::startup;
use qsonac::observability::logging;
use qsonac::MessageApp;

#[derive(Parser, Debug)]
#[command(name = "qsonac", version)]
#[command(about = "Single-application HTTP/1.x server", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind.
    #[arg(long)]
    host: Option<String>,

    /// Port to bind.
    #[arg(short, long)]
    port: Option<u16>,

    /// Message served by the built-in application.
    #[arg(short, long)]
    message: Option<String>,

    /// Send error pages for requests that would otherwise be dropped.
    #[arg(long)]
    debug: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn apply(&self, config: &mut ServerConfig) {
        if let Some(host) = &self.host {
            config.listener.host = host.clone();
        }
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(message) = &self.message {
            config.app.message = message.clone();
        }
        if self.debug {
            config.session.debug = true;
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    cli.apply(&mut config);
    validate_config(&config).map_err(ConfigError::from)?;

    logging::init(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.bind_address(),
        max_connections = config.listener.max_connections,
        receive_timeout_secs = config.session.receive_timeout_secs,
        "qsonac starting"
    );

    let runtime = startup::build_runtime(&config)?;
    let app = Arc::new(MessageApp::new(config.app.message.clone()));
    startup::block_on_server(runtime, startup::run(config, app))?;

    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_config() {
        let cli = Cli::parse_from(["qsonac", "--port", "9001", "--message", "yo", "--debug"]);
        let mut config = ServerConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.listener.port, 9001);
        assert_eq!(config.listener.host, "127.0.0.1");
        assert_eq!(config.app.message, "yo");
        assert!(config.session.debug);
    }
}
