//! `teskvm`: control a TESmart KVM switch from the command line.
//!
//! # Usage
//!
//! ```text
//! teskvm [OPTIONS] <COMMAND>
//!
//! Commands:
//!   list                      List configured port names
//!   get port                  Show the active port
//!   set port <NUMBER|NAME>    Switch to a port
//!   set buzzer <on|off>       Enable or disable the buzzer
//!   set lcd <off|10|30>       Set the LCD backlight timeout
//!   set auto <on|off>         Enable or disable auto input detection
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable              | Flag             |
//! |-----------------------|------------------|
//! | `TESKVM_HOST`         | `--host`         |
//! | `TESKVM_PORT`         | `--port`         |
//! | `TESKVM_TIMEOUT`      | `--timeout`      |
//! | `TESKVM_DELAY`        | `--delay`        |
//! | `TESKVM_NUM_PORTS`    | `--num-ports`    |
//! | `TESKVM_CONFIG`       | `--config`       |
//! | `TESKVM_CONNECTION`   | `--connection`   |
//!
//! Flags and environment variables take precedence over the config file.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use tesmart_cli::commands::{self, LcdSetting, Toggle};
use tesmart_cli::config::{default_config_path, Config, Overrides};
use tesmart_client::KvmController;
use tesmart_core::PortCount;

const EXAMPLES: &str = "\
Examples:
  teskvm get port               Get current active port
  teskvm list                   List configured port names
  teskvm set port 3             Switch to port 3
  teskvm set port workstation   Switch to port by name (from config)
  teskvm set buzzer off         Disable buzzer
  teskvm set lcd 10             Set LCD timeout to 10 seconds
  teskvm set auto on            Enable auto input detection

Configuration:
  Settings can be stored in ~/.config/tesmartkvm/config.toml
  Use --host, --port, etc. to override config file values.";

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Control TESmart KVM switches over TCP/IP.
#[derive(Debug, Parser)]
#[command(name = "teskvm", version, after_help = EXAMPLES)]
struct Cli {
    /// KVM IP address (overrides config file).
    #[arg(long, env = "TESKVM_HOST", global = true)]
    host: Option<String>,

    /// KVM TCP port (overrides config file).
    #[arg(long, env = "TESKVM_PORT", global = true)]
    port: Option<u16>,

    /// Socket timeout in seconds (overrides config file).
    #[arg(long, env = "TESKVM_TIMEOUT", global = true)]
    timeout: Option<f64>,

    /// Delay between commands in seconds (overrides config file).
    #[arg(long, env = "TESKVM_DELAY", global = true)]
    delay: Option<f64>,

    /// Number of ports on the KVM: 8 or 16 (overrides config file).
    #[arg(long, env = "TESKVM_NUM_PORTS", value_parser = parse_port_count, global = true)]
    num_ports: Option<PortCount>,

    /// Path to config file [default: ~/.config/tesmartkvm/config.toml].
    #[arg(long, env = "TESKVM_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Connection name to use (from config file).
    #[arg(short = 'c', long, env = "TESKVM_CONNECTION", global = true)]
    connection: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List configured port names.
    List,
    /// Get current settings.
    Get {
        #[command(subcommand)]
        property: GetProperty,
    },
    /// Set KVM settings.
    Set {
        #[command(subcommand)]
        property: SetProperty,
    },
}

#[derive(Debug, Subcommand)]
enum GetProperty {
    /// Active port (the only value the KVM protocol can read).
    Port,
}

#[derive(Debug, Subcommand)]
enum SetProperty {
    /// Set active port.
    Port {
        /// Port number or friendly name from config.
        value: String,
    },
    /// Set buzzer state.
    Buzzer {
        #[arg(value_enum)]
        value: Toggle,
    },
    /// Set LCD timeout in seconds.
    Lcd {
        #[arg(value_enum)]
        value: LcdSetting,
    },
    /// Set auto input detection.
    Auto {
        #[arg(value_enum)]
        value: Toggle,
    },
}

fn parse_port_count(s: &str) -> Result<PortCount, String> {
    let n: u8 = s.parse().map_err(|_| format!("'{s}' is not a number"))?;
    PortCount::try_from(n).map_err(|e| e.to_string())
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            host: self.host.clone(),
            port: self.port,
            timeout: self.timeout,
            delay: self.delay,
            num_ports: self.num_ports,
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries command output only.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<String> {
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    let config = Config::load(&config_path)?;
    let connection = config.active_connection(cli.connection.as_deref())?;
    debug!(
        "using connection '{}' from {}",
        connection.name(),
        config.path().display()
    );

    let property = match &cli.command {
        Command::List => return Ok(commands::list_ports(connection, config.path())),
        Command::Get {
            property: GetProperty::Port,
        } => None,
        Command::Set { property } => Some(property),
    };

    let kvm = KvmController::tcp(connection.params(&cli.overrides())?);
    let output = match property {
        None => commands::get_port(&kvm, connection).await,
        Some(SetProperty::Port { value }) => commands::set_port(&kvm, connection, value).await,
        Some(SetProperty::Buzzer { value }) => commands::set_buzzer(&kvm, *value).await,
        Some(SetProperty::Lcd { value }) => commands::set_lcd(&kvm, *value).await,
        Some(SetProperty::Auto { value }) => commands::set_auto(&kvm, *value).await,
    };
    kvm.close().await;

    Ok(output?)
}
