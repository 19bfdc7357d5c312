use std::time::Duration;

use crate::cache::DEFAULT_CACHE_LIMIT;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 31337;
pub const DEFAULT_MAX_CONNECTIONS: usize = 256;

/// A client has this long to send a complete request head.
pub const DEFAULT_HEADER_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// How long shutdown waits for in-flight requests.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Runtime settings of the HTTP server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    /// `0` binds an ephemeral port.
    pub port: u16,
    /// Cache flush threshold in bytes.
    pub cache_limit: usize,
    pub max_connections: usize,
    pub header_read_timeout: Duration,
    pub drain_timeout: Duration,
    /// Put error details into 500 response bodies.
    pub expose_errors: bool,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            cache_limit: DEFAULT_CACHE_LIMIT,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            header_read_timeout: DEFAULT_HEADER_READ_TIMEOUT,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            expose_errors: false,
        }
    }
}
