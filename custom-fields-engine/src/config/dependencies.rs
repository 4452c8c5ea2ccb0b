//! Dependency initialization and wiring for an engine session.

use std::sync::Arc;

use tracing::info;

use custom_fields_repository::{
    CustomFieldsProvider, EntityRef, FieldsService, HttpFieldsProvider, HttpProviderConfig,
    ServiceConfig,
};

use crate::config::EngineConfig;
use crate::session::EngineSession;
use crate::InspectError;

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The session, not yet loaded.
    pub session: EngineSession,
}

impl Dependencies {
    /// Build the HTTP provider, service and session from configuration.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(InspectError)` - If no entity slug is configured or the provider cannot be built
    pub fn new(config: &EngineConfig) -> Result<Self, InspectError> {
        let entity = config
            .entity()
            .ok_or_else(|| InspectError::config("CUSTOM_FIELDS_ENTITY_SLUG is not set"))?;

        info!(
            api_url = %config.api_url,
            entity = %entity,
            request_timeout_secs = config.request_timeout.as_secs(),
            include_management = config.include_management,
            include_compliance = config.include_compliance,
            max_updates = config.max_updates,
            "Initializing dependencies"
        );

        let provider = HttpFieldsProvider::new(
            HttpProviderConfig::new(config.api_url.clone()).with_timeout(config.request_timeout),
        )
        .map_err(|e| InspectError::config(format!("Failed to create HTTP provider: {}", e)))?;

        Ok(Self::with_provider(config, Arc::new(provider), entity))
    }

    /// Wire a session over any provider.
    pub fn with_provider(
        config: &EngineConfig,
        provider: Arc<dyn CustomFieldsProvider>,
        entity: EntityRef,
    ) -> Self {
        let service = FieldsService::with_config(
            provider,
            ServiceConfig::default().with_max_updates(config.max_updates),
        );
        let session = EngineSession::with_options(service, entity, config.session_options());
        Self { session }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use custom_fields_repository::MockFieldsProvider;

    #[test]
    fn test_missing_slug_is_a_config_error() {
        let result = Dependencies::new(&EngineConfig::default());
        assert!(matches!(result, Err(InspectError::ConfigError(_))));
    }

    #[test]
    fn test_invalid_url_is_a_config_error() {
        let config = EngineConfig {
            api_url: "not a url".to_string(),
            ..EngineConfig::default()
        }
        .with_entity("user", "jane");
        assert!(matches!(
            Dependencies::new(&config),
            Err(InspectError::ConfigError(_))
        ));
    }

    #[test]
    fn test_with_provider_binds_entity() {
        let config = EngineConfig::default();
        let deps = Dependencies::with_provider(
            &config,
            Arc::new(MockFieldsProvider::new()),
            EntityRef::new("asset", "van-1"),
        );
        assert_eq!(deps.session.entity(), &EntityRef::new("asset", "van-1"));
        assert!(deps.session.options().include_compliance);
    }
}
