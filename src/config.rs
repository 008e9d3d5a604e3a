//! Process configuration
//!
//! Read once at startup: a JSON file with `server` and `streams` sections,
//! or, when the file is absent, command-line flags.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::StreamDescriptor;
use crate::viewer::SessionOptions;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/config.json";

/// Default HTTP listen address
pub const DEFAULT_HTTP_ADDR: &str = ":8083";

/// Configuration failure
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid configuration JSON
    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// `webrtc_port_min` is above `webrtc_port_max`
    #[error("Invalid UDP port range {min}-{max}")]
    InvalidPortRange { min: u16, max: u16 },
}

/// Command-line flags
#[derive(Parser, Debug, Clone)]
#[command(name = "camrelay")]
#[command(about = "Camera stream relay", long_about = None)]
pub struct Args {
    /// Configuration file
    #[arg(long, env = "CAMRELAY_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// HTTP host:port (used when the configuration file is absent)
    #[arg(long, env = "CAMRELAY_LISTEN", default_value = DEFAULT_HTTP_ADDR)]
    pub listen: String,

    /// Lowest WebRTC UDP port
    #[arg(long = "udp-min", env = "CAMRELAY_UDP_MIN", default_value = "0")]
    pub udp_min: u16,

    /// Highest WebRTC UDP port
    #[arg(long = "udp-max", env = "CAMRELAY_UDP_MAX", default_value = "0")]
    pub udp_max: u16,

    /// ICE server URL
    #[arg(long = "ice-server", env = "CAMRELAY_ICE_SERVER")]
    pub ice_server: Option<String>,
}

/// Server-wide settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(rename = "http_port")]
    pub http_addr: String,

    /// STUN/TURN server URLs
    pub ice_servers: Vec<String>,

    /// TURN username
    pub ice_username: Option<String>,

    /// TURN credential
    pub ice_credential: Option<String>,

    /// Lowest WebRTC UDP port (0 = unrestricted)
    pub webrtc_port_min: u16,

    /// Highest WebRTC UDP port (0 = unrestricted)
    pub webrtc_port_max: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: DEFAULT_HTTP_ADDR.to_string(),
            ice_servers: Vec::new(),
            ice_username: None,
            ice_credential: None,
            webrtc_port_min: 0,
            webrtc_port_max: 0,
        }
    }
}

impl ServerConfig {
    /// Options for viewer sessions
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            ice_servers: self.ice_servers.clone(),
            ice_username: self.ice_username.clone(),
            ice_credential: self.ice_credential.clone(),
            port_min: self.webrtc_port_min,
            port_max: self.webrtc_port_max,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let (min, max) = (self.webrtc_port_min, self.webrtc_port_max);
        if max != 0 && min > max {
            return Err(ConfigError::InvalidPortRange { min, max });
        }
        Ok(())
    }
}

/// One stream in the `streams` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfigEntry {
    /// Source address
    pub url: String,
    #[serde(default)]
    pub on_demand: bool,
    #[serde(default)]
    pub disable_audio: bool,
    #[serde(default)]
    pub debug: bool,
}

/// Whole configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    /// Streams keyed by ID
    pub streams: BTreeMap<String, StreamConfigEntry>,
}

impl AppConfig {
    /// Parse configuration JSON
    pub fn from_json(data: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(data)?;
        config.server.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_json(&data)
    }

    /// Build a configuration with no streams from command-line flags
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        let server = ServerConfig {
            http_addr: args.listen.clone(),
            ice_servers: args.ice_server.iter().cloned().collect(),
            webrtc_port_min: args.udp_min,
            webrtc_port_max: args.udp_max,
            ..Default::default()
        };
        server.validate()?;

        Ok(Self {
            server,
            streams: BTreeMap::new(),
        })
    }

    /// Load the file named by `args`, falling back to the flags if it is absent
    ///
    /// A file that exists but fails to parse is an error.
    pub async fn resolve(args: &Args) -> Result<Self, ConfigError> {
        match Self::load(&args.config).await {
            Ok(config) => {
                tracing::info!(
                    path = %args.config.display(),
                    streams = config.streams.len(),
                    "Configuration loaded"
                );
                Ok(config)
            }
            Err(ConfigError::Io { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                tracing::info!(
                    path = %args.config.display(),
                    "Configuration file absent, using flags"
                );
                Self::from_args(args)
            }
            Err(e) => Err(e),
        }
    }

    /// Stream descriptors from the `streams` section, ordered by ID
    pub fn descriptors(&self) -> Vec<StreamDescriptor> {
        self.streams
            .iter()
            .map(|(id, entry)| {
                StreamDescriptor::new(id.clone(), entry.url.clone())
                    .on_demand(entry.on_demand)
                    .disable_audio(entry.disable_audio)
                    .debug(entry.debug)
            })
            .collect()
    }
}
