//! Configuration: command-line arguments and data folder resolution

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::{Error, Result};

/// Command-line arguments for paramvault
#[derive(Parser, Debug)]
#[command(name = "paramvault")]
#[command(about = "Avatar parameter snapshot service for OSCQuery-capable hosts")]
#[command(version)]
pub struct Args {
    /// Port for the HTTP control surface
    #[arg(short, long, default_value = "5000", env = "PARAMVAULT_PORT")]
    pub port: u16,

    /// Host the remote OSC input listens on
    #[arg(long, default_value = "127.0.0.1", env = "PARAMVAULT_OSC_HOST")]
    pub osc_host: IpAddr,

    /// Port the remote OSC input listens on
    #[arg(long, default_value = "9000", env = "PARAMVAULT_OSC_PORT")]
    pub osc_port: u16,

    /// Folder holding snapshot data (resolved via config file / OS default when omitted)
    #[arg(short, long, env = "PARAMVAULT_DATA_FOLDER")]
    pub data_folder: Option<PathBuf>,

    /// Name fragment of the remote OSCQuery service to discover
    #[arg(long, default_value = "VRChat", env = "PARAMVAULT_REMOTE_SERVICE")]
    pub remote_service: String,

    /// Seconds between discovery/readiness polls
    #[arg(long, default_value = "2", env = "PARAMVAULT_POLL_INTERVAL")]
    pub poll_interval: u64,

    /// Overall discovery timeout in seconds (0 waits forever)
    #[arg(long, default_value = "0", env = "PARAMVAULT_DISCOVERY_TIMEOUT")]
    pub discovery_timeout: u64,
}

/// Resolved runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP control surface port
    pub http_port: u16,
    /// Destination for outbound parameter datagrams
    pub osc_target: SocketAddr,
    /// Root data folder; snapshots live under `saves/`
    pub data_folder: PathBuf,
    /// Name fragment identifying the remote service
    pub remote_service: String,
    /// Delay between discovery/readiness polls
    pub poll_interval: Duration,
    /// Overall discovery deadline (None waits forever)
    pub discovery_timeout: Option<Duration>,
}

impl Config {
    /// Build runtime configuration from parsed arguments
    pub fn from_args(args: Args) -> Result<Self> {
        let data_folder = resolve_data_folder(args.data_folder)?;
        Ok(Self {
            http_port: args.port,
            osc_target: SocketAddr::new(args.osc_host, args.osc_port),
            data_folder,
            remote_service: args.remote_service,
            poll_interval: Duration::from_secs(args.poll_interval.max(1)),
            discovery_timeout: match args.discovery_timeout {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        })
    }

    /// Folder the snapshot store operates in
    pub fn saves_folder(&self) -> PathBuf {
        self.data_folder.join("saves")
    }
}

/// Data folder resolution priority order:
/// 1. Command-line argument / environment variable (via clap)
/// 2. TOML config file
/// 3. OS-dependent compiled default (fallback)
fn resolve_data_folder(cli_arg: Option<PathBuf>) -> Result<PathBuf> {
    // Priority 1: command line or environment
    if let Some(path) = cli_arg {
        return Ok(path);
    }

    // Priority 2: TOML config file
    if let Some(config_path) = config_file_path() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            let config = toml::from_str::<toml::Value>(&toml_content)
                .map_err(|e| Error::Config(format!("{}: {e}", config_path.display())))?;
            if let Some(folder) = config.get("data_folder").and_then(|v| v.as_str()) {
                return Ok(PathBuf::from(folder));
            }
        }
    }

    // Priority 3: OS-dependent default
    Ok(default_data_folder())
}

/// Platform config file location (~/.config/paramvault/config.toml or equivalent)
fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("paramvault").join("config.toml"))
}

/// OS-dependent default data folder
fn default_data_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("paramvault"))
        .unwrap_or_else(|| PathBuf::from("./paramvault_data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_argument_wins() {
        let folder = resolve_data_folder(Some(PathBuf::from("/tmp/pv"))).unwrap();
        assert_eq!(folder, PathBuf::from("/tmp/pv"));
    }

    #[test]
    fn zero_timeout_means_unbounded() {
        let args = Args::parse_from(["paramvault", "--data-folder", "/tmp/pv"]);
        let config = Config::from_args(args).unwrap();
        assert!(config.discovery_timeout.is_none());
        assert_eq!(config.poll_interval, Duration::from_secs(2));
    }

    #[test]
    fn explicit_timeout_is_bounded() {
        let args = Args::parse_from([
            "paramvault",
            "--data-folder",
            "/tmp/pv",
            "--discovery-timeout",
            "30",
        ]);
        let config = Config::from_args(args).unwrap();
        assert_eq!(config.discovery_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn saves_folder_is_under_data_folder() {
        let args = Args::parse_from(["paramvault", "--data-folder", "/tmp/pv"]);
        let config = Config::from_args(args).unwrap();
        assert_eq!(config.saves_folder(), PathBuf::from("/tmp/pv/saves"));
    }
}
