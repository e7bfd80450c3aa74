//! Configuration for the broker.
//!
//! Loaded from a TOML file; every field has a default so an empty (or
//! absent) file yields a runnable configuration:
//!
//! ```toml
//! [server]
//! transport = "unix"            # or "tcp"
//! listen_addr = "multiplex.sock"  # socket path, or host for tcp
//! port = 9001
//! password = ""                 # empty means no authentication gate
//! password_gracetime = 15       # seconds
//!
//! [java]
//! server_jar = "minecraft_server.jar"
//! heap_max = "1024M"
//! heap_min = "1024M"
//! nogui = true
//! extra_flags = []
//! ```

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

/// Listening transport selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Tcp,
    Unix,
}

/// Resolved broker configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub java: JavaConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub transport: Transport,
    /// Socket path for `unix`, host/interface for `tcp`.
    pub listen_addr: String,
    /// TCP port; ignored for `unix`.
    pub port: u16,
    /// Shared secret; the empty string disables the gate.
    pub password: String,
    /// Seconds an unauthenticated peer is tolerated before eviction.
    pub password_gracetime: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JavaConfig {
    pub server_jar: String,
    pub heap_max: String,
    pub heap_min: String,
    pub nogui: bool,
    pub extra_flags: Vec<String>,
}

/// Resolved child-process launch command.
#[derive(Debug, Clone)]
pub struct Launch {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            transport: Transport::Unix,
            listen_addr: "multiplex.sock".to_string(),
            port: 9001,
            password: String::new(),
            password_gracetime: 15,
        }
    }
}

impl Default for JavaConfig {
    fn default() -> Self {
        JavaConfig {
            server_jar: "minecraft_server.jar".to_string(),
            heap_max: "1024M".to_string(),
            heap_min: "1024M".to_string(),
            nogui: true,
            extra_flags: Vec::new(),
        }
    }
}

impl Config {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> anyhow::Result<Config> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// The shared secret, with the empty string normalized to `None`.
    pub fn password(&self) -> Option<&str> {
        if self.server.password.is_empty() {
            None
        } else {
            Some(&self.server.password)
        }
    }

    /// Convenience: `addr:port` socket string for TCP listening.
    pub fn socket_addr_string(&self) -> String {
        format!("{}:{}", self.server.listen_addr, self.server.port)
    }

    /// Build the child-process launch command from the `[java]` section.
    pub fn launch(&self) -> Launch {
        let mut args = vec![
            format!("-Xmx{}", self.java.heap_max),
            format!("-Xms{}", self.java.heap_min),
            "-jar".to_string(),
            self.java.server_jar.clone(),
        ];
        args.extend(self.java.extra_flags.iter().cloned());
        if self.java.nogui {
            args.push("nogui".to_string());
        }
        Launch {
            program: "java".to_string(),
            args,
        }
    }
}
