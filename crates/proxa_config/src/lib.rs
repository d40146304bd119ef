use serde::Deserialize;

mod proxa;
pub mod validation;

pub use proxa::ProxaConfig;
pub use validation::ConfigReport;

// =======================================================
// GLOBAL CONFIG + DEFAULTS
// =======================================================
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub worker_connections: u16,
    pub log_level: String,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            worker_connections: 1024,
            log_level: "info".into(),
        }
    }
}

// =======================================================
// SERVER CONFIG + DEFAULTS
// =======================================================
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: String,

    // Timeouts (seconds)
    pub client_read_timeout_secs: u64,
    pub keepalive_timeout_secs: u64,

    // Limits (bytes)
    pub max_request_headers_bytes: u64,
    pub max_request_body_bytes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8000".into(),
            client_read_timeout_secs: 15,
            keepalive_timeout_secs: 65,
            max_request_headers_bytes: 64 * 1024,
            max_request_body_bytes: 10 * 1024 * 1024,
        }
    }
}

// =======================================================
// ORIGIN CONFIG + DEFAULTS
// =======================================================
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OriginConfig {
    /// Fully-qualified upstream base address, e.g. "http://localhost:9000".
    /// Required: there is no sensible default origin, so an empty value
    /// fails validation.
    pub address: String,
    pub fetch_timeout_secs: u64,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            fetch_timeout_secs: 30,
        }
    }
}

// =======================================================
// STORE CONFIG + DEFAULTS
// =======================================================
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub db: i64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 6379,
            db: 0,
        }
    }
}

// =======================================================
// CACHE CONFIG + DEFAULTS
// =======================================================
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub default_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: 300,
        }
    }
}
