use crate::registry::ServerEntry;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Bind address
    pub bind_addr: String,

    /// Port to listen on (0 = OS-assigned)
    pub port: u16,

    /// Number of worker threads
    pub threads: usize,

    /// TCP nodelay
    pub tcp_nodelay: bool,

    /// Per-connection I/O deadline in milliseconds (0 disables)
    pub io_timeout_ms: u64,

    /// Replace every entry's tunnel_server_ip with this address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tunnel_ip_override: Option<String>,

    /// Log level
    pub log_level: String,

    /// Advertised server roster
    #[serde(default)]
    pub servers: Vec<ServerEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 35000,
            threads: num_cpus::get(),
            tcp_nodelay: true,
            io_timeout_ms: 5000,
            tunnel_ip_override: None,
            log_level: "info".to_string(),
            servers: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Example
    ///
    /// ```no_run
    /// use roster_server::Config;
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let config = Config::from_file("config.toml")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.threads == 0 {
            anyhow::bail!("threads must be > 0");
        }

        if self.bind_addr.is_empty() {
            anyhow::bail!("bind_addr must not be empty");
        }

        Ok(())
    }
}
