//! Gatehouse - Entry point
//!
//! `gatehouse start` serves files until stopped; `gatehouse stop` asks a
//! running instance to stop and exits whatever the answer.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use gatehouse::app::{self, StartOverrides, StopOverrides};
use gatehouse::config::{ConfigLoader, GatehouseConfig};
use gatehouse::server::Server;
use gatehouse::telemetry::init_logging;

/// Configuration file read when `--config` is not given, if present.
const DEFAULT_CONFIG_FILE: &str = "gatehouse.toml";

/// Prefix of `GATEHOUSE__SECTION__KEY` environment overrides.
const ENV_PREFIX: &str = "GATEHOUSE";

#[derive(Parser, Debug)]
#[command(
    name = "gatehouse",
    version,
    about = "Static file server with a header allow-list and token-guarded remote shutdown"
)]
struct Cli {
    /// Configuration file (TOML or JSON)
    #[arg(short, long, global = true, env = "GATEHOUSE_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve files until stopped
    Start(StartArgs),
    /// Ask a running server to stop
    Stop(StopArgs),
}

#[derive(Args, Debug)]
struct StartArgs {
    /// Directory to serve
    static_dir: Option<String>,

    /// Plain HTTP port, 0 disables
    http_port: Option<u16>,

    /// TLS port, 0 disables
    secure_port: Option<u16>,

    /// PEM certificate chain for the TLS port
    #[arg(long, value_name = "PEM")]
    cert: Option<String>,

    /// PEM private key for the TLS port
    #[arg(long, value_name = "PEM")]
    key: Option<String>,

    /// Shutdown token
    #[arg(long, env = "GATEHOUSE_SHUTDOWN_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Accept any POST /shutdown without checking the token
    #[arg(long)]
    no_require_token: bool,
}

#[derive(Args, Debug)]
struct StopArgs {
    /// Plain HTTP port of the running server
    http_port: Option<u16>,

    /// Shutdown token
    #[arg(long, env = "GATEHOUSE_SHUTDOWN_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Connect and response timeout
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Start(args) => start(cli.config.as_deref(), args).await,
        Command::Stop(args) => stop(cli.config.as_deref(), args).await,
    }
}

async fn start(config_path: Option<&Path>, args: StartArgs) -> anyhow::Result<()> {
    let overrides = StartOverrides {
        static_dir: args.static_dir,
        http_port: args.http_port,
        secure_port: args.secure_port,
        cert_path: args.cert,
        key_path: args.key,
        token: args.token,
        no_require_token: args.no_require_token,
    };

    let mut config = load_config(config_path)?;
    overrides.apply(&mut config);
    config.validate().context("invalid configuration")?;

    init_logging(&app::log_config(&config.logging)).context("failed to initialise logging")?;

    let server_config = app::server_config(&config).context("invalid server configuration")?;
    let access = app::access_filter(&config.access).context("invalid access rules")?;

    info!(version = gatehouse::VERSION, "Starting gatehouse");

    Server::new(server_config, access)
        .run()
        .await
        .context("server did not stop cleanly")
}

async fn stop(config_path: Option<&Path>, args: StopArgs) -> anyhow::Result<()> {
    let overrides = StopOverrides {
        http_port: args.http_port,
        token: args.token,
        timeout_secs: args.timeout,
    };

    let mut config = load_config(config_path)?;
    overrides.apply(&mut config);

    init_logging(&app::log_config(&config.logging)).context("failed to initialise logging")?;

    let port = config.server.http_port;
    if port == 0 {
        bail!("no plain HTTP port to send the stop request to");
    }

    // Every outcome is reported by the client; none is an error here
    app::stop_client(&config.server, &config.shutdown)
        .stop(port, &config.shutdown.token)
        .await;
    Ok(())
}

/// Loads defaults, then the configuration file, `.env` and environment
/// overrides. Validation is left to the caller.
fn load_config(path: Option<&Path>) -> anyhow::Result<GatehouseConfig> {
    let loader = ConfigLoader::new()
        .with_defaults()
        .with_dotenv()
        .context("failed to load .env")?;

    let loader = match path {
        Some(path) => loader
            .with_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => loader
            .with_optional_file(DEFAULT_CONFIG_FILE)
            .with_context(|| format!("failed to load {DEFAULT_CONFIG_FILE}"))?,
    };

    loader
        .with_env_prefix(ENV_PREFIX)
        .load_unvalidated()
        .context("invalid environment override")
}
