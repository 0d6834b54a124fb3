use std::net::SocketAddr;

use serde::Deserialize;

fn default_enabled() -> bool {
    true
}

fn default_listen_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

/// Configuration for the health probe server.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Whether the server is started at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Address and port to listen on.
    #[serde(default = "default_listen_address")]
    pub listen_address: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { enabled: default_enabled(), listen_address: default_listen_address() }
    }
}
