use std::net::SocketAddr;

use crate::ProxaConfig;

/// Validation output for a loaded proxa configuration.
#[derive(Debug, Default)]
pub struct ConfigReport {
    warnings: Vec<String>,
    errors: Vec<String>,
}

impl ConfigReport {
    /// Returns true when no errors were found.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns true when at least one error was found.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns the collected warning messages.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Returns the collected error messages.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Render warnings and errors into a readable, multi-line string.
    pub fn format(&self) -> String {
        let mut out = String::new();
        if !self.errors.is_empty() {
            out.push_str("Errors:\n");
            for err in &self.errors {
                out.push_str("  - ");
                out.push_str(err);
                out.push('\n');
            }
        }
        if !self.warnings.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str("Warnings:\n");
            for warn in &self.warnings {
                out.push_str("  - ");
                out.push_str(warn);
                out.push('\n');
            }
        }
        out
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }
}

/// Validate a proxa configuration and return a report of issues.
pub fn validate(cfg: &ProxaConfig) -> ConfigReport {
    let mut report = ConfigReport::default();

    validate_global(cfg, &mut report);
    validate_server(cfg, &mut report);
    validate_origin(cfg, &mut report);
    validate_cache(cfg, &mut report);

    report
}

fn validate_global(cfg: &ProxaConfig, report: &mut ConfigReport) {
    if cfg.global.worker_connections == 0 {
        report.error("global.worker_connections must be greater than 0");
    }
}

fn validate_server(cfg: &ProxaConfig, report: &mut ConfigReport) {
    if cfg.server.listen.parse::<SocketAddr>().is_err() {
        report.error(format!(
            "server.listen '{}' is not a valid host:port address",
            cfg.server.listen
        ));
    }
    if cfg.server.client_read_timeout_secs == 0 {
        report.warn("server.client_read_timeout_secs is 0; slow clients will never time out");
    }
}

fn validate_origin(cfg: &ProxaConfig, report: &mut ConfigReport) {
    let address = cfg.origin.address.trim();

    if address.is_empty() {
        report.error("origin.address is required (no default upstream exists)");
        return;
    }
    if !address.starts_with("http://") && !address.starts_with("https://") {
        report.warn(format!(
            "origin.address '{address}' has no http(s) scheme; fetches will likely fail"
        ));
    }
    if address.ends_with('/') {
        report.warn(
            "origin.address ends with '/'; forwarded URLs will contain a double slash",
        );
    }
    if cfg.origin.fetch_timeout_secs == 0 {
        report.warn("origin.fetch_timeout_secs is 0; origin fetches will never time out");
    }
}

fn validate_cache(cfg: &ProxaConfig, report: &mut ConfigReport) {
    if cfg.cache.default_ttl_secs == 0 {
        report.error("cache.default_ttl_secs must be greater than 0 (the store rejects a zero expiry)");
    }
}
