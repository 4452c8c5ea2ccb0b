//! Environment configuration and dependency wiring.

mod dependencies;

pub use dependencies::Dependencies;

use std::env;
use std::time::Duration;

use tracing::warn;

use custom_fields_repository::config::DEFAULT_MAX_UPDATES;
use custom_fields_repository::{ComplianceQuery, EntityRef};

use crate::session::SessionOptions;

/// Default API base URL.
const DEFAULT_API_URL: &str = "http://localhost:8000/api/";

/// Default entity type.
const DEFAULT_ENTITY_TYPE: &str = "user";

/// Default per-request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Settings for one engine session.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub api_url: String,
    pub entity_type: String,
    /// Required to open a session.
    pub entity_slug: Option<String>,
    pub request_timeout: Duration,
    pub include_management: bool,
    pub include_compliance: bool,
    pub compliance_role: Option<String>,
    pub compliance_asset_type: Option<String>,
    /// `0` disables the limit.
    pub max_updates: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            entity_type: DEFAULT_ENTITY_TYPE.to_string(),
            entity_slug: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            include_management: true,
            include_compliance: true,
            compliance_role: None,
            compliance_asset_type: None,
            max_updates: DEFAULT_MAX_UPDATES,
        }
    }
}

fn non_blank_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn flag_var(name: &str, default: bool) -> bool {
    match non_blank_var(name).map(|value| value.to_lowercase()) {
        None => default,
        Some(value) => match value.as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                warn!(variable = name, value = %value, default, "Invalid boolean, using default");
                default
            }
        },
    }
}

fn number_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    match non_blank_var(name) {
        None => default,
        Some(value) => value.parse().unwrap_or_else(|_| {
            warn!(variable = name, value = %value, "Invalid number, using default");
            default
        }),
    }
}

impl EngineConfig {
    /// Read the configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `CUSTOM_FIELDS_API_URL`: API base URL (default: http://localhost:8000/api/)
    /// - `CUSTOM_FIELDS_ENTITY_TYPE`: Entity type (default: user)
    /// - `CUSTOM_FIELDS_ENTITY_SLUG`: Entity slug (required to open a session)
    /// - `CUSTOM_FIELDS_REQUEST_TIMEOUT_SECS`: Request timeout (default: 30)
    /// - `CUSTOM_FIELDS_INCLUDE_MANAGEMENT`: Fetch the management listing (default: true)
    /// - `CUSTOM_FIELDS_INCLUDE_COMPLIANCE`: Fetch compliance values (default: true)
    /// - `CUSTOM_FIELDS_COMPLIANCE_ROLE`: Compliance role filter (optional)
    /// - `CUSTOM_FIELDS_COMPLIANCE_ASSET_TYPE`: Compliance asset type filter (optional)
    /// - `CUSTOM_FIELDS_MAX_UPDATES`: Maximum updates per submission, 0 for no limit (default: 500)
    pub fn from_env() -> Self {
        Self {
            api_url: non_blank_var("CUSTOM_FIELDS_API_URL")
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            entity_type: non_blank_var("CUSTOM_FIELDS_ENTITY_TYPE")
                .unwrap_or_else(|| DEFAULT_ENTITY_TYPE.to_string()),
            entity_slug: non_blank_var("CUSTOM_FIELDS_ENTITY_SLUG"),
            request_timeout: Duration::from_secs(number_var(
                "CUSTOM_FIELDS_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )),
            include_management: flag_var("CUSTOM_FIELDS_INCLUDE_MANAGEMENT", true),
            include_compliance: flag_var("CUSTOM_FIELDS_INCLUDE_COMPLIANCE", true),
            compliance_role: non_blank_var("CUSTOM_FIELDS_COMPLIANCE_ROLE"),
            compliance_asset_type: non_blank_var("CUSTOM_FIELDS_COMPLIANCE_ASSET_TYPE"),
            max_updates: number_var("CUSTOM_FIELDS_MAX_UPDATES", DEFAULT_MAX_UPDATES),
        }
    }

    pub fn with_entity(mut self, entity_type: impl Into<String>, entity_slug: impl Into<String>) -> Self {
        self.entity_type = entity_type.into();
        self.entity_slug = Some(entity_slug.into());
        self
    }

    /// The entity the session binds to, if a slug is configured.
    pub fn entity(&self) -> Option<EntityRef> {
        self.entity_slug
            .as_ref()
            .map(|slug| EntityRef::new(self.entity_type.clone(), slug.clone()))
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            include_management: self.include_management,
            include_compliance: self.include_compliance,
            compliance_query: ComplianceQuery {
                role: self.compliance_role.clone(),
                asset_type: self.compliance_asset_type.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.entity_type, "user");
        assert!(config.entity().is_none());
        assert_eq!(config.max_updates, 500);
    }

    #[test]
    fn test_session_options_carry_filters() {
        let config = EngineConfig {
            include_management: false,
            compliance_role: Some("driver".to_string()),
            ..EngineConfig::default()
        }
        .with_entity("asset", "van-1");

        let options = config.session_options();
        assert!(!options.include_management);
        assert!(options.include_compliance);
        assert_eq!(options.compliance_query.role.as_deref(), Some("driver"));
        assert_eq!(config.entity(), Some(EntityRef::new("asset", "van-1")));
    }
}
