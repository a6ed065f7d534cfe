use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::Path;

// =============================================================================
// File config (figment-deserialized from defaults / tictac.toml / env vars)
// =============================================================================
//
// Three equivalent ways to configure:
//
//   tictac.toml:     [server]
//                    port = 9000
//
//   env var:         TICTAC_SERVER__PORT=9000   (double underscore = nesting)
//
//   (single underscore stays within field names: TICTAC_WEBSOCKET__MAX_MESSAGE_KB)

pub const DEFAULT_CONFIG_FILE: &str = "tictac.toml";

/// Named configuration presets.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// host=127.0.0.1
    Local,
    /// host=0.0.0.0
    Server,
}

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub websocket: WebSocketFileConfig,
}

/// Listener settings (lives under `[server]` in tictac.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerFileConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: default_port(),
        }
    }
}

/// Per-connection tunables (lives under `[websocket]` in tictac.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebSocketFileConfig {
    #[serde(default = "default_send_channel_capacity")]
    pub send_channel_capacity: usize,
    #[serde(default = "default_max_message_kb")]
    pub max_message_kb: usize,
}

impl Default for WebSocketFileConfig {
    fn default() -> Self {
        Self {
            send_channel_capacity: default_send_channel_capacity(),
            max_message_kb: default_max_message_kb(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_send_channel_capacity() -> usize {
    100
}
fn default_max_message_kb() -> usize {
    64
}

/// Build a figment that layers: defaults → profile defaults → tictac.toml → TICTAC_* env vars.
///
/// Profile defaults sit above struct defaults but below the file and env.
/// The CLI profile takes priority over the file profile. A missing file is
/// treated as empty.
///
/// Env vars use double-underscore for nesting into sections:
///   `TICTAC_SERVER__PORT=9000`  →  `server.port = 9000`
///   `TICTAC_WEBSOCKET__SEND_CHANNEL_CAPACITY=32`  →  `websocket.send_channel_capacity = 32`
pub fn load_config(config_path: &Path, cli_profile: Option<&Profile>) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    // Pass 1: peek at profile from the file/env (CLI overrides file)
    let base = Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(config_path))
        .merge(Env::prefixed("TICTAC_").split("__"));

    let profile: Option<Profile> = cli_profile
        .cloned()
        .or_else(|| base.extract_inner("profile").ok());

    // Pass 2: rebuild with profile defaults as a layer between defaults and the file
    let profile_layer = profile_to_file_config(profile.as_ref());

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Serialized::defaults(profile_layer))
        .merge(Toml::file(config_path))
        .merge(Env::prefixed("TICTAC_").split("__"))
}

/// Convert a profile into a `FileConfig` with the profile's default values filled in.
fn profile_to_file_config(profile: Option<&Profile>) -> FileConfig {
    match profile {
        Some(Profile::Local) => FileConfig {
            profile: Some(Profile::Local),
            server: ServerFileConfig {
                host: Some("127.0.0.1".to_string()),
                ..Default::default()
            },
            websocket: Default::default(),
        },
        Some(Profile::Server) => FileConfig {
            profile: Some(Profile::Server),
            server: ServerFileConfig {
                host: Some("0.0.0.0".to_string()),
                ..Default::default()
            },
            websocket: Default::default(),
        },
        None => FileConfig::default(),
    }
}

// =============================================================================
// Runtime config (derived from FileConfig, used throughout the server)
// =============================================================================

#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub bind_addr: SocketAddr,
    pub websocket: WebSocketConfig,
}

#[derive(Clone, Debug)]
pub struct WebSocketConfig {
    /// Outbound queue depth per connection
    pub send_channel_capacity: usize,
    /// Largest inbound frame accepted, in bytes
    pub max_message_bytes: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        WebSocketConfig::from_file(&WebSocketFileConfig::default())
    }
}

impl WebSocketConfig {
    pub fn from_file(fc: &WebSocketFileConfig) -> Self {
        Self {
            send_channel_capacity: fc.send_channel_capacity.max(1),
            max_message_bytes: fc.max_message_kb * 1024,
        }
    }
}

impl RelayConfig {
    pub fn from_file(fc: &FileConfig) -> Result<Self> {
        let host = fc.server.host.clone().unwrap_or_else(default_host);
        let ip: IpAddr = host
            .parse()
            .with_context(|| format!("Invalid server host: {:?}", host))?;
        Ok(Self {
            bind_addr: SocketAddr::new(ip, fc.server.port),
            websocket: WebSocketConfig::from_file(&fc.websocket),
        })
    }
}
