//! Coordinator configuration.
//!
//! Stored as TOML at `$XDG_CONFIG_HOME/panelcast/coordinator.toml`
//! (`~/.config/panelcast/coordinator.toml` when unset). `PANELCAST_CONFIG`
//! replaces the directory.

use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::path::PathBuf;

use anyhow::bail;
use serde::{Deserialize, Serialize};

use panelcast_protocol::constants::{
    CONTROL_PORT, DISCOVERY_PORT, MULTICAST_GROUP, SLIDE_PORT, SPOT_PORT,
};

const FILE_NAME: &str = "coordinator.toml";

/// Coordinator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// UDP port panels multicast `getServer` to.
    #[serde(default = "default_discovery_port")]
    pub discovery_port: u16,

    #[serde(default = "default_multicast_group")]
    pub multicast_group: Ipv4Addr,

    #[serde(default = "default_control_port")]
    pub control_port: u16,

    #[serde(default = "default_spot_port")]
    pub spot_port: u16,

    #[serde(default = "default_slide_port")]
    pub slide_port: u16,

    #[serde(default = "default_slide_dir")]
    pub slide_dir: PathBuf,

    #[serde(default = "default_spot_dir")]
    pub spot_dir: PathBuf,

    /// Space-separated glob filters for slide images.
    #[serde(default = "default_slide_filters")]
    pub slide_filters: String,

    /// Space-separated glob filters for spot videos.
    #[serde(default = "default_spot_filters")]
    pub spot_filters: String,

    /// Seconds to wait for a network interface at startup.
    #[serde(default = "default_network_wait_attempts")]
    pub network_wait_attempts: u32,
}

fn default_discovery_port() -> u16 {
    DISCOVERY_PORT
}

fn default_multicast_group() -> Ipv4Addr {
    MULTICAST_GROUP
}

fn default_control_port() -> u16 {
    CONTROL_PORT
}

fn default_spot_port() -> u16 {
    SPOT_PORT
}

fn default_slide_port() -> u16 {
    SLIDE_PORT
}

fn home() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
}

fn default_slide_dir() -> PathBuf {
    home().join("Pictures")
}

fn default_spot_dir() -> PathBuf {
    home().join("Videos")
}

fn default_slide_filters() -> String {
    "*.jpg *.jpeg *.png *.JPG *.JPEG *.PNG".into()
}

fn default_spot_filters() -> String {
    "*.mp4 *.MP4".into()
}

fn default_network_wait_attempts() -> u32 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discovery_port: default_discovery_port(),
            multicast_group: default_multicast_group(),
            control_port: default_control_port(),
            spot_port: default_spot_port(),
            slide_port: default_slide_port(),
            slide_dir: default_slide_dir(),
            spot_dir: default_spot_dir(),
            slide_filters: default_slide_filters(),
            spot_filters: default_spot_filters(),
            network_wait_attempts: default_network_wait_attempts(),
        }
    }
}

impl Config {
    /// Loads configuration from disk, or creates a default if not found.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(config_path())
    }

    fn load_from(path: PathBuf) -> anyhow::Result<Self> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            toml::from_str(&content)?
        } else {
            let config = Config::default();
            config.save_to(&path)?;
            config
        };
        config.validate()?;
        Ok(config)
    }

    fn save_to(&self, path: &std::path::Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Rejects zero or repeated ports.
    pub fn validate(&self) -> anyhow::Result<()> {
        let ports = [
            ("discovery_port", self.discovery_port),
            ("control_port", self.control_port),
            ("spot_port", self.spot_port),
            ("slide_port", self.slide_port),
        ];

        let mut seen = HashSet::new();
        for (field, port) in ports {
            if port == 0 {
                bail!("{field} must not be 0");
            }
            if !seen.insert(port) {
                bail!("{field} {port} is already used by another service");
            }
        }
        Ok(())
    }
}

fn config_path() -> PathBuf {
    if let Some(dir) = std::env::var_os("PANELCAST_CONFIG") {
        return PathBuf::from(dir).join(FILE_NAME);
    }
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| home().join(".config"));
    base.join("panelcast").join(FILE_NAME)
}
