//! Process configuration, sourced from the environment.

use std::time::Duration;

use memberhub_core::Action;

/// Which (entity type, action) pairs the audit layer never records.
///
/// The defaults keep read traffic against the audit log itself and member
/// note lookups out of the log.
#[derive(Debug, Clone)]
pub struct AuditConfig {
    /// Prefix under which classified API traffic lives, e.g. "/api".
    pub api_prefix: String,
    /// Authentication endpoints are never audited (they carry credentials).
    pub auth_prefix: String,
    pub deny_list: Vec<(String, Action)>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            api_prefix: "/api".to_string(),
            auth_prefix: "/api/auth".to_string(),
            deny_list: vec![
                ("audit".to_string(), Action::Search),
                ("audit".to_string(), Action::View),
                ("member".to_string(), Action::Note),
            ],
        }
    }
}

impl AuditConfig {
    pub fn is_denied(&self, entity_type: &str, action: Action) -> bool {
        self.deny_list
            .iter()
            .any(|(e, a)| e == entity_type && *a == action)
    }
}

/// Top-level API configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub request_timeout: Duration,
    pub audit: AuditConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            request_timeout: Duration::from_secs(30),
            audit: AuditConfig::default(),
        }
    }
}

impl ApiConfig {
    /// Read configuration from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(addr) = std::env::var("BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(secs) = std::env::var("REQUEST_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse::<u64>() {
                config.request_timeout = Duration::from_secs(secs);
            }
        }
        if let Ok(prefix) = std::env::var("API_PREFIX") {
            config.audit.auth_prefix = format!("{prefix}/auth");
            config.audit.api_prefix = prefix;
        }
        config
    }
}
