//! Handlers for each `teskvm` subcommand.
//!
//! Every handler returns the text to print on success.  Handlers that talk to
//! the switch are generic over [`KvmTransport`] so tests can drive them with
//! the scripted transport.

use std::fmt::Write as _;
use std::path::Path;

use clap::ValueEnum;
use tesmart_client::{KvmController, KvmTransport, DEFAULT_GET_PORT_RETRIES};
use tesmart_core::{KvmError, LcdTimeout};
use thiserror::Error;

use crate::config::Connection;

/// Placeholder shown for ports without a configured name.
pub const NO_ALIAS: &str = "NO_ALIAS";

/// Errors a subcommand can report.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Kvm(#[from] KvmError),

    /// `set port` was given something that is neither a valid number nor a
    /// configured name.
    #[error(
        "Invalid port '{identifier}'\nMust be a number (1-{max_port}) or a configured port name{}",
        available_names(.names)
    )]
    UnknownPort {
        identifier: String,
        max_port: u8,
        names: Vec<String>,
    },
}

fn available_names(names: &[String]) -> String {
    if names.is_empty() {
        String::new()
    } else {
        format!("\nAvailable port names: {}", names.join(", "))
    }
}

/// `on`/`off` argument for buzzer and auto-detect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    #[value(name = "on", alias = "1")]
    On,
    #[value(name = "off", alias = "0")]
    Off,
}

impl Toggle {
    pub fn enabled(self) -> bool {
        self == Toggle::On
    }
}

/// LCD timeout argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LcdSetting {
    #[value(name = "off", alias = "0")]
    Off,
    #[value(name = "10")]
    TenSeconds,
    #[value(name = "30")]
    ThirtySeconds,
}

impl LcdSetting {
    pub fn timeout(self) -> LcdTimeout {
        match self {
            LcdSetting::Off => LcdTimeout::Off,
            LcdSetting::TenSeconds => LcdTimeout::TenSeconds,
            LcdSetting::ThirtySeconds => LcdTimeout::ThirtySeconds,
        }
    }

    pub fn seconds(self) -> u32 {
        self.timeout().seconds()
    }
}

/// `N (name)`, or `N (NO_ALIAS)` when the port has no name.
pub fn port_display(connection: &Connection, port: u8) -> String {
    format!("{port} ({})", connection.port_name(port).unwrap_or(NO_ALIAS))
}

/// `list`: configured port names sorted by port number.
pub fn list_ports(connection: &Connection, config_path: &Path) -> String {
    let names = connection.port_names();
    if names.is_empty() {
        return format!(
            "No port names configured\n\
             Add port names to {}\n\
             \n\
             Example:\n\
             [connections.{}.ports]\n\
             workstation = 1\n\
             server = 2",
            config_path.display(),
            connection.name()
        );
    }

    let mut sorted: Vec<(&String, &u8)> = names.iter().collect();
    sorted.sort_by_key(|(_, port)| **port);
    let width = names.keys().map(|n| n.len()).max().unwrap_or(0);

    let mut out = String::from("Configured port names:");
    for (name, port) in sorted {
        // Writing to a String cannot fail.
        let _ = write!(out, "\n  {name:<width$} = {port}");
    }
    out
}

/// `get port`
pub async fn get_port<T: KvmTransport>(
    kvm: &KvmController<T>,
    connection: &Connection,
) -> Result<String, CommandError> {
    let port = kvm.get_port(DEFAULT_GET_PORT_RETRIES).await?;
    Ok(port_display(connection, port))
}

/// `set port <number|name>`
pub async fn set_port<T: KvmTransport>(
    kvm: &KvmController<T>,
    connection: &Connection,
    identifier: &str,
) -> Result<String, CommandError> {
    let port = connection
        .resolve_port(identifier)
        .ok_or_else(|| CommandError::UnknownPort {
            identifier: identifier.to_string(),
            max_port: connection.num_ports().max_port(),
            names: connection.port_names().keys().cloned().collect(),
        })?;

    let switch = kvm.set_port(port).await?;
    let shown = port_display(connection, switch.new_port);
    Ok(if switch.changed {
        format!("Switched to port {shown}")
    } else {
        format!("Already on port {shown}")
    })
}

/// `set buzzer on|off`
pub async fn set_buzzer<T: KvmTransport>(
    kvm: &KvmController<T>,
    state: Toggle,
) -> Result<String, CommandError> {
    kvm.set_buzzer(state.enabled()).await?;
    Ok(format!("Buzzer {}", enabled_word(state)))
}

/// `set lcd off|10|30`
pub async fn set_lcd<T: KvmTransport>(
    kvm: &KvmController<T>,
    setting: LcdSetting,
) -> Result<String, CommandError> {
    kvm.set_lcd_timeout(setting.seconds()).await?;
    Ok(match setting {
        LcdSetting::Off => "LCD timeout disabled".to_string(),
        other => format!("LCD timeout set to {} seconds", other.seconds()),
    })
}

/// `set auto on|off`
pub async fn set_auto<T: KvmTransport>(
    kvm: &KvmController<T>,
    state: Toggle,
) -> Result<String, CommandError> {
    kvm.set_auto_detect(state.enabled()).await?;
    Ok(format!("Auto input detection {}", enabled_word(state)))
}

fn enabled_word(state: Toggle) -> &'static str {
    match state {
        Toggle::On => "enabled",
        Toggle::Off => "disabled",
    }
}
