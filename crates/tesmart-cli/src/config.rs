//! TOML configuration for one or more named switches.
//!
//! The file lives at `$XDG_CONFIG_HOME/tesmartkvm/config.toml`, falling back
//! to `~/.config/tesmartkvm/config.toml`.  Example:
//!
//! ```toml
//! default_connection = "home"
//!
//! [connections.home]
//! host = "192.168.1.10"
//! port = 5000
//! timeout = 5.0
//! delay = 1.0
//! num_ports = 16
//!
//! [connections.home.ports]
//! proxmox = 1
//! workstation = 2
//!
//! [connections.work]
//! host = "10.1.99.1"
//! num_ports = 8
//! ```
//!
//! # Serde default values
//!
//! Every field of a connection is optional.  Fields annotated with
//! `#[serde(default = "some_fn")]` take the stock device value when absent, so
//! an entry can be as small as `[connections.lab]`.
//!
//! # Missing file
//!
//! If the file does not exist the loader behaves as if it contained a single
//! connection named `default` with stock settings.  A file that exists but
//! cannot be parsed is an error.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tesmart_core::domain::params::{DEFAULT_DELAY, DEFAULT_HOST, DEFAULT_TCP_PORT, DEFAULT_TIMEOUT};
use tesmart_core::{ConnectionParams, ParamsError, PortCount};
use thiserror::Error;
use tracing::{debug, warn};

/// Directory name under the user config directory.
pub const CONFIG_DIR_NAME: &str = "tesmartkvm";
/// Name of the implicit connection used when no config file exists.
pub const DEFAULT_CONNECTION_NAME: &str = "default";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither `XDG_CONFIG_HOME` nor `HOME` is set.
    #[error("could not determine config directory: neither XDG_CONFIG_HOME nor HOME is set")]
    NoConfigDir,

    /// A file system I/O error other than "not found".
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// The file has no `[connections]` table.
    #[error("invalid config format in {0}: missing [connections] section")]
    MissingConnections(PathBuf),

    /// `--connection` named a connection the file does not define.
    #[error("connection '{name}' not found. Available connections: {available}")]
    UnknownConnection { name: String, available: String },

    /// A connection's settings (after overrides) are out of range.
    #[error("connection '{name}': {source}")]
    Params {
        name: String,
        #[source]
        source: ParamsError,
    },
}

// ── File schema ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawConfig {
    default_connection: Option<String>,
    connections: Option<BTreeMap<String, RawConnection>>,
}

#[derive(Debug, Deserialize)]
struct RawConnection {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_timeout")]
    timeout: f64,
    #[serde(default = "default_delay")]
    delay: f64,
    #[serde(default)]
    num_ports: PortCount,
    /// Raw values so a single bad entry is dropped instead of failing the file.
    #[serde(default)]
    ports: BTreeMap<String, toml::Value>,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}
fn default_port() -> u16 {
    DEFAULT_TCP_PORT
}
fn default_timeout() -> f64 {
    DEFAULT_TIMEOUT.as_secs_f64()
}
fn default_delay() -> f64 {
    DEFAULT_DELAY.as_secs_f64()
}

// ── Connections ───────────────────────────────────────────────────────────────

/// One named switch from the config file.
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    name: String,
    host: String,
    tcp_port: u16,
    timeout: f64,
    delay: f64,
    num_ports: PortCount,
    /// Lower-cased friendly name → port number, all within `[1, num_ports]`.
    port_names: BTreeMap<String, u8>,
}

impl Connection {
    /// A connection with stock settings and no port names.
    pub fn stock(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: default_host(),
            tcp_port: default_port(),
            timeout: default_timeout(),
            delay: default_delay(),
            num_ports: PortCount::default(),
            port_names: BTreeMap::new(),
        }
    }

    fn from_raw(name: &str, raw: RawConnection) -> Self {
        let port_names = parse_port_names(name, raw.ports, raw.num_ports);
        Self {
            name: name.to_string(),
            host: raw.host,
            tcp_port: raw.port,
            timeout: raw.timeout,
            delay: raw.delay,
            num_ports: raw.num_ports,
            port_names,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_ports(&self) -> PortCount {
        self.num_ports
    }

    pub fn port_names(&self) -> &BTreeMap<String, u8> {
        &self.port_names
    }

    /// Resolves a port number or friendly name.
    ///
    /// Integers must lie in `[1, num_ports]`; anything else is looked up by
    /// name, case-insensitively.
    pub fn resolve_port(&self, identifier: &str) -> Option<u8> {
        let identifier = identifier.trim();
        match identifier.parse::<i64>() {
            Ok(n) => u8::try_from(n).ok().filter(|p| self.num_ports.contains(*p)),
            Err(_) => self.port_names.get(&identifier.to_lowercase()).copied(),
        }
    }

    /// Returns the friendly name configured for `port`, if any.
    ///
    /// When several names map to the same port, the alphabetically first wins.
    pub fn port_name(&self, port: u8) -> Option<&str> {
        self.port_names
            .iter()
            .find(|(_, p)| **p == port)
            .map(|(name, _)| name.as_str())
    }

    /// Builds connection parameters, applying `overrides` on top of the file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Params`] if the resulting port, timeout, or delay
    /// is out of range.
    pub fn params(&self, overrides: &Overrides) -> Result<ConnectionParams, ConfigError> {
        let wrap = |source: ParamsError| ConfigError::Params {
            name: self.name.clone(),
            source,
        };
        let timeout = ConnectionParams::duration_from_secs(
            "timeout",
            overrides.timeout.unwrap_or(self.timeout),
        )
        .map_err(wrap)?;
        let delay =
            ConnectionParams::duration_from_secs("delay", overrides.delay.unwrap_or(self.delay))
                .map_err(wrap)?;

        ConnectionParams::new(
            overrides.host.clone().unwrap_or_else(|| self.host.clone()),
            overrides.port.unwrap_or(self.tcp_port),
            timeout,
            delay,
            overrides.num_ports.unwrap_or(self.num_ports),
        )
        .map_err(wrap)
    }
}

/// Drops entries that are not integers in `[1, num_ports]`, warning for each.
fn parse_port_names(
    connection: &str,
    raw: BTreeMap<String, toml::Value>,
    num_ports: PortCount,
) -> BTreeMap<String, u8> {
    let mut names = BTreeMap::new();
    for (name, value) in raw {
        match value.as_integer() {
            Some(n) if u8::try_from(n).is_ok_and(|p| num_ports.contains(p)) => {
                names.insert(name.to_lowercase(), n as u8);
            }
            Some(n) => warn!(
                "connection '{connection}': port name '{name}' has invalid port number {n}; \
                 must be between 1 and {}. Ignoring",
                num_ports.max_port()
            ),
            None => warn!(
                "connection '{connection}': port name '{name}' has non-integer value {value}. Ignoring"
            ),
        }
    }
    names
}

/// Connection settings given on the command line or in the environment.
/// Each `Some` replaces the corresponding config file value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub timeout: Option<f64>,
    pub delay: Option<f64>,
    pub num_ports: Option<PortCount>,
}

// ── Config ────────────────────────────────────────────────────────────────────

/// All connections from one config file.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    path: PathBuf,
    connections: BTreeMap<String, Connection>,
    default_connection: Option<String>,
}

impl Config {
    /// Loads `path`, or the stock single-connection config if it does not
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] for file-system errors other than "not
    /// found", [`ConfigError::Parse`] if the TOML is malformed, and
    /// [`ConfigError::MissingConnections`] if there is no `[connections]`
    /// table.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(path, &content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no config at {}; using stock settings", path.display());
                Ok(Self::stock(path))
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Parses config text.  `path` is only recorded for messages.
    ///
    /// # Errors
    ///
    /// See [`load`](Self::load).
    pub fn from_toml_str(path: &Path, content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let raw_connections = raw
            .connections
            .ok_or_else(|| ConfigError::MissingConnections(path.to_path_buf()))?;

        let connections = raw_connections
            .into_iter()
            .map(|(name, raw)| {
                let conn = Connection::from_raw(&name, raw);
                (name, conn)
            })
            .collect();

        Ok(Self {
            path: path.to_path_buf(),
            connections,
            default_connection: raw.default_connection,
        })
    }

    /// The config used when no file exists.
    pub fn stock(path: &Path) -> Self {
        let mut connections = BTreeMap::new();
        connections.insert(
            DEFAULT_CONNECTION_NAME.to_string(),
            Connection::stock(DEFAULT_CONNECTION_NAME),
        );
        Self {
            path: path.to_path_buf(),
            connections,
            default_connection: Some(DEFAULT_CONNECTION_NAME.to_string()),
        }
    }

    /// Path the config was loaded from (or would have been).
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Configured connection names in sorted order.
    pub fn connection_names(&self) -> Vec<&str> {
        self.connections.keys().map(String::as_str).collect()
    }

    /// The connection used when none is requested: `default_connection` if it
    /// names an existing entry, otherwise the first by name.
    pub fn default_connection(&self) -> Option<&Connection> {
        self.default_connection
            .as_deref()
            .and_then(|name| self.connections.get(name))
            .or_else(|| self.connections.values().next())
    }

    /// Selects the connection to use.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownConnection`] if `requested` is not
    /// configured, or if the file defines no connections at all.
    pub fn active_connection(&self, requested: Option<&str>) -> Result<&Connection, ConfigError> {
        let found = match requested {
            Some(name) => self.connections.get(name),
            None => self.default_connection(),
        };
        found.ok_or_else(|| ConfigError::UnknownConnection {
            name: requested.unwrap_or(DEFAULT_CONNECTION_NAME).to_string(),
            available: self.connection_names().join(", "),
        })
    }
}

/// Resolves the default config file path.
///
/// # Errors
///
/// Returns [`ConfigError::NoConfigDir`] when neither `XDG_CONFIG_HOME` nor
/// `HOME` is set.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
        .ok_or(ConfigError::NoConfigDir)?;
    Ok(base.join(CONFIG_DIR_NAME).join("config.toml"))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use uuid::Uuid;

    const SAMPLE: &str = r#"
default_connection = "home"

[connections.home]
host = "192.168.1.10"
port = 5001
timeout = 2.5
delay = 0.5
num_ports = 16

[connections.home.ports]
Proxmox = 1
workstation = 2
nas = 17
broken = "three"

[connections.work]
host = "10.1.99.1"
num_ports = 8

[connections.work.ports]
laptop = 1
desktop = 2
"#;

    fn sample() -> Config {
        Config::from_toml_str(Path::new("sample.toml"), SAMPLE).unwrap()
    }

    // ── Loading ───────────────────────────────────────────────────────────────

    #[test]
    fn test_missing_file_yields_stock_default_connection() {
        // Arrange
        let path = std::env::temp_dir()
            .join(format!("tesmart-cli-{}", Uuid::new_v4()))
            .join("config.toml");

        // Act
        let cfg = Config::load(&path).unwrap();

        // Assert
        assert_eq!(cfg.connection_names(), vec!["default"]);
        let conn = cfg.active_connection(None).unwrap();
        assert_eq!(conn.params(&Overrides::default()).unwrap(), ConnectionParams::default());
        assert!(conn.port_names().is_empty());
    }

    #[test]
    fn test_load_reads_file_from_disk() {
        let dir = std::env::temp_dir().join(format!("tesmart-cli-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let cfg = Config::load(&path).unwrap();

        assert_eq!(cfg.path(), path.as_path());
        assert_eq!(cfg.connection_names(), vec!["home", "work"]);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let result = Config::from_toml_str(Path::new("bad.toml"), "connections = [[[");
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_missing_connections_table_is_rejected() {
        let result = Config::from_toml_str(Path::new("old.toml"), "host = \"1.2.3.4\"\n");
        assert!(matches!(result, Err(ConfigError::MissingConnections(_))));
    }

    #[test]
    fn test_unsupported_num_ports_is_parse_error() {
        let text = "[connections.a]\nnum_ports = 12\n";
        let result = Config::from_toml_str(Path::new("c.toml"), text);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_empty_connection_table_uses_stock_values() {
        let cfg = Config::from_toml_str(Path::new("c.toml"), "[connections.lab]\n").unwrap();
        let params = cfg
            .active_connection(None)
            .unwrap()
            .params(&Overrides::default())
            .unwrap();
        assert_eq!(params, ConnectionParams::default());
    }

    // ── Connection selection ──────────────────────────────────────────────────

    #[test]
    fn test_active_connection_prefers_requested_then_default() {
        let cfg = sample();
        assert_eq!(cfg.active_connection(None).unwrap().name(), "home");
        assert_eq!(cfg.active_connection(Some("work")).unwrap().name(), "work");
    }

    #[test]
    fn test_unknown_requested_connection_lists_available() {
        let err = sample().active_connection(Some("lab")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "connection 'lab' not found. Available connections: home, work"
        );
    }

    #[test]
    fn test_first_connection_by_name_when_no_default() {
        let text = "[connections.zeta]\n[connections.alpha]\n";
        let cfg = Config::from_toml_str(Path::new("c.toml"), text).unwrap();
        assert_eq!(cfg.active_connection(None).unwrap().name(), "alpha");
    }

    #[test]
    fn test_dangling_default_connection_falls_back_to_first() {
        let text = "default_connection = \"gone\"\n[connections.beta]\n";
        let cfg = Config::from_toml_str(Path::new("c.toml"), text).unwrap();
        assert_eq!(cfg.active_connection(None).unwrap().name(), "beta");
    }

    // ── Port names ────────────────────────────────────────────────────────────

    #[test]
    fn test_port_names_are_lower_cased_and_invalid_entries_dropped() {
        let cfg = sample();
        let home = cfg.active_connection(None).unwrap();
        let names: Vec<(&str, u8)> = home
            .port_names()
            .iter()
            .map(|(n, p)| (n.as_str(), *p))
            .collect();
        assert_eq!(names, vec![("proxmox", 1), ("workstation", 2)]);
    }

    #[test]
    fn test_port_names_are_checked_against_connection_port_count() {
        let text = "[connections.small]\nnum_ports = 8\n[connections.small.ports]\nok = 8\ntoo_high = 9\n";
        let cfg = Config::from_toml_str(Path::new("c.toml"), text).unwrap();
        let conn = cfg.active_connection(None).unwrap();
        assert_eq!(conn.resolve_port("ok"), Some(8));
        assert_eq!(conn.resolve_port("too_high"), None);
    }

    #[test]
    fn test_resolve_port_accepts_numbers_and_names() {
        let cfg = sample();
        let home = cfg.active_connection(None).unwrap();
        assert_eq!(home.resolve_port("3"), Some(3));
        assert_eq!(home.resolve_port("16"), Some(16));
        assert_eq!(home.resolve_port("0"), None);
        assert_eq!(home.resolve_port("17"), None);
        assert_eq!(home.resolve_port("-1"), None);
        assert_eq!(home.resolve_port("WorkStation"), Some(2));
        assert_eq!(home.resolve_port("printer"), None);
    }

    #[test]
    fn test_port_name_reverse_lookup() {
        let cfg = sample();
        let home = cfg.active_connection(None).unwrap();
        assert_eq!(home.port_name(1), Some("proxmox"));
        assert_eq!(home.port_name(5), None);
    }

    // ── Parameters ────────────────────────────────────────────────────────────

    #[test]
    fn test_params_come_from_file() {
        let cfg = sample();
        let params = cfg
            .active_connection(None)
            .unwrap()
            .params(&Overrides::default())
            .unwrap();
        assert_eq!(params.host(), "192.168.1.10");
        assert_eq!(params.tcp_port(), 5001);
        assert_eq!(params.timeout(), Duration::from_millis(2500));
        assert_eq!(params.delay(), Duration::from_millis(500));
        assert_eq!(params.num_ports(), PortCount::Sixteen);
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let cfg = sample();
        let overrides = Overrides {
            host: Some("127.0.0.1".to_string()),
            port: Some(6000),
            timeout: Some(1.0),
            delay: Some(0.0),
            num_ports: Some(PortCount::Eight),
        };
        let params = cfg
            .active_connection(Some("home"))
            .unwrap()
            .params(&overrides)
            .unwrap();
        assert_eq!(params.address(), "127.0.0.1:6000");
        assert_eq!(params.timeout(), Duration::from_secs(1));
        assert!(params.delay().is_zero());
        assert_eq!(params.num_ports(), PortCount::Eight);
    }

    #[test]
    fn test_invalid_values_surface_as_params_error() {
        let text = "[connections.bad]\ntimeout = 0.0\n";
        let cfg = Config::from_toml_str(Path::new("c.toml"), text).unwrap();
        let err = cfg
            .active_connection(None)
            .unwrap()
            .params(&Overrides::default())
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Params { ref name, source: ParamsError::ZeroTimeout } if name == "bad"
        ));

        let negative = Overrides {
            delay: Some(-1.0),
            ..Overrides::default()
        };
        assert!(cfg
            .active_connection(None)
            .unwrap()
            .params(&negative)
            .is_err());
    }

    #[test]
    fn test_integer_durations_are_accepted() {
        let text = "[connections.a]\ntimeout = 3\ndelay = 0\n";
        let cfg = Config::from_toml_str(Path::new("c.toml"), text).unwrap();
        let params = cfg
            .active_connection(None)
            .unwrap()
            .params(&Overrides::default())
            .unwrap();
        assert_eq!(params.timeout(), Duration::from_secs(3));
        assert!(params.delay().is_zero());
    }
}
