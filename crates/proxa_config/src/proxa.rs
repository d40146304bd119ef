use serde::Deserialize;

use crate::validation::{ConfigReport, validate};
use crate::{CacheConfig, GlobalConfig, OriginConfig, ServerConfig, StoreConfig};

// =======================================================
// PROXA CONFIG — main config
// =======================================================
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProxaConfig {
    pub global: GlobalConfig,

    pub server: ServerConfig,

    pub origin: OriginConfig,

    pub store: StoreConfig,

    pub cache: CacheConfig,
}

impl ProxaConfig {
    pub fn from_file(file_name: &str) -> Result<Self, config::ConfigError> {
        let built = config::Config::builder()
            .add_source(config::File::new(file_name, config::FileFormat::Toml).required(false))
            .build()?;

        built.try_deserialize()
    }

    pub fn from_file_or_default(file_name: &str) -> Self {
        match Self::from_file(file_name) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("⚠️  Error reading config '{file_name}': {e}");
                eprintln!("➡️  Using default config (in-memory)...");
                ProxaConfig::default()
            }
        }
    }

    /// Validate the configuration and return a report of warnings and errors.
    pub fn validate(&self) -> ConfigReport {
        validate(self)
    }

    pub fn print(&self) {
        println!("================ PROXA CONFIG ================");

        println!("\n[global]");
        println!("  worker_connections   = {}", self.global.worker_connections);
        println!("  log_level            = {}", self.global.log_level);

        println!("\n[server]");
        println!("  listen               = {}", self.server.listen);
        println!(
            "  client_read_timeout_secs = {}",
            self.server.client_read_timeout_secs
        );
        println!(
            "  keepalive_timeout_secs   = {}",
            self.server.keepalive_timeout_secs
        );
        println!(
            "  max_request_headers_bytes = {}",
            self.server.max_request_headers_bytes
        );
        println!(
            "  max_request_body_bytes   = {}",
            self.server.max_request_body_bytes
        );

        println!("\n[origin]");
        println!("  address              = {}", self.origin.address);
        println!(
            "  fetch_timeout_secs   = {}",
            self.origin.fetch_timeout_secs
        );

        println!("\n[store]");
        println!("  host                 = {}", self.store.host);
        println!("  port                 = {}", self.store.port);
        println!("  db                   = {}", self.store.db);

        println!("\n[cache]");
        println!("  default_ttl_secs     = {}", self.cache.default_ttl_secs);

        println!("==============================================");
    }
}
