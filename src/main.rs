//! TCP Tunnel Command Line Tool
//!
//! This binary is the command-line interface for TCP Tunnel.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use log::{debug, error, info, warn};

use tcp_tunnel::common::init_logger;
use tcp_tunnel::config::{check_warnings, redact_proxy, ConfigBuilder, ConfigValues, TunnelConfig, ENV_PREFIX};
use tcp_tunnel::{GlobalLogger, Result, Supervisor, APP_NAME, VERSION};

/// TCP Tunnel: relay TCP connections to a fixed target, optionally through a proxy
#[derive(Parser, Debug)]
#[clap(author, version = VERSION, about, long_about = None)]
struct Args {
    /// Listening address (<host>:<port>)
    #[clap(long)]
    listen: Option<String>,

    /// Remote target (<host>:<port>)
    #[clap(long)]
    target: Option<String>,

    /// Proxy address (<proto>://[user[:password]@]<host>:<port>/)
    #[clap(long)]
    proxy: Option<String>,

    /// Dial timeout in seconds [default: 10]
    #[clap(long)]
    timeout: Option<u64>,

    /// Keep-alive interval in seconds, 0 disables [default: 30]
    #[clap(long)]
    keepalive: Option<u64>,

    /// More verbose logging
    #[clap(long)]
    debug: bool,

    /// Log level (error, warn, info, debug, trace) [default: info]
    #[clap(long)]
    log_level: Option<String>,

    /// Copy buffer size in bytes [default: 8192]
    #[clap(long)]
    buffer_size: Option<usize>,

    /// Grace period for in-flight connections at shutdown, in seconds [default: 10]
    #[clap(long)]
    shutdown_timeout: Option<u64>,

    /// Load configuration from a JSON file
    #[clap(long)]
    config_file: Option<PathBuf>,
}

impl Args {
    fn cli_values(&self) -> ConfigValues {
        ConfigValues {
            listen: self.listen.clone(),
            target: self.target.clone(),
            proxy: self.proxy.clone(),
            dial_timeout: self.timeout,
            keepalive: self.keepalive,
            log_level: if self.debug {
                Some("debug".to_string())
            } else {
                self.log_level.clone()
            },
            buffer_size: self.buffer_size,
            shutdown_timeout: self.shutdown_timeout,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let mut builder = ConfigBuilder::new().with_defaults();
    if let Some(path) = &args.config_file {
        builder = builder.with_file(path);
    }
    let values = match builder.with_env(ENV_PREFIX).with_cli(args.cli_values()).merged() {
        Ok(values) => values,
        Err(e) => {
            eprintln!("{}: {}", APP_NAME, e);
            return ExitCode::FAILURE;
        }
    };

    init_logger(values.log_level.as_deref().unwrap_or("info"));
    debug!("logging level set to {}", log::max_level());

    if values.listen.is_none() || values.target.is_none() {
        let _ = Args::command().print_help();
        return ExitCode::SUCCESS;
    }

    match run(values).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("exiting on error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(values: ConfigValues) -> Result<()> {
    let config = TunnelConfig::from_values(values)?;

    info!("Starting {} v{}", APP_NAME, VERSION);
    for warning in check_warnings(&config) {
        warn!("{}", warning);
    }

    info!("Target: {}", config.target);
    if let Some(proxy) = &config.proxy {
        info!("Upstream proxy: {}", redact_proxy(proxy));
    }

    let supervisor = Supervisor::new(&config, GlobalLogger::shared())?;
    supervisor.run(shutdown_signal()).await
}

/// Resolves on SIGINT, or SIGTERM on Unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("could not listen for Ctrl+C: {}", e);
            futures::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("could not listen for SIGTERM: {}", e);
                futures::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = futures::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
