//! Endpoint URL construction for the HTTP provider.
//!
//! Path segments are appended through `path_segments_mut`, so slugs are
//! percent-encoded and never interpreted as path separators.

use url::Url;

use custom_fields_shared::EntryId;

use crate::errors::FieldsApiError;
use crate::types::{ComplianceQuery, EntityRef};

/// Builds endpoint URLs relative to the API base.
#[derive(Debug, Clone)]
pub struct Routes {
    base: Url,
}

impl Routes {
    /// Create routes for the given API base URL.
    ///
    /// # Errors
    ///
    /// Returns `FieldsApiError::ValidationError` when the URL does not parse
    /// or is not an `http`/`https` URL.
    pub fn new(base_url: &str) -> Result<Self, FieldsApiError> {
        let base = Url::parse(base_url)?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(FieldsApiError::validation(format!(
                "API base URL must be http or https, got '{}'",
                base.scheme()
            )));
        }
        Ok(Self { base })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        url.set_query(None);
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub fn hierarchy(&self, entity_type: &str, entity_slug: Option<&str>) -> Url {
        let mut url = self.endpoint(&["custom-fields", "hierarchy"]);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("entity_type", entity_type);
            if let Some(slug) = entity_slug {
                query.append_pair("entity_slug", slug);
            }
        }
        url
    }

    pub fn entity_values(&self, entity: &EntityRef) -> Url {
        self.endpoint(&[
            "custom-fields",
            "entities",
            &entity.entity_type,
            &entity.entity_slug,
            "values",
        ])
    }

    pub fn management_fields(&self, entity_type: &str) -> Url {
        let mut url = self.endpoint(&["custom-fields", "management"]);
        url.query_pairs_mut().append_pair("entity_type", entity_type);
        url
    }

    pub fn compliance_fields(&self, entity: &EntityRef, query: &ComplianceQuery) -> Url {
        let mut url = self.endpoint(&[
            "compliance",
            "entities",
            &entity.entity_type,
            &entity.entity_slug,
            "fields",
        ]);
        if query.role.is_some() || query.asset_type.is_some() {
            let mut pairs = url.query_pairs_mut();
            if let Some(role) = &query.role {
                pairs.append_pair("role", role);
            }
            if let Some(asset_type) = &query.asset_type {
                pairs.append_pair("asset_type", asset_type);
            }
        }
        url
    }

    pub fn compliance_history(&self, value_id: i64) -> Url {
        self.endpoint(&["compliance", "values", &value_id.to_string(), "history"])
    }

    pub fn submit_updates(&self, entity_slug: &str) -> Url {
        self.endpoint(&["custom-fields", "entities", entity_slug, "values"])
    }

    pub fn files(&self) -> Url {
        self.endpoint(&["files"])
    }

    pub fn file_url(&self, file_id: i64) -> Url {
        self.endpoint(&["files", &file_id.to_string(), "url"])
    }

    pub fn compliance_values(&self) -> Url {
        self.endpoint(&["compliance", "values"])
    }

    pub fn renew_compliance(&self, value_slug: &str) -> Url {
        self.endpoint(&["compliance", "values", value_slug, "renew"])
    }

    pub fn group_entries(&self) -> Url {
        self.endpoint(&["custom-fields", "entries"])
    }

    pub fn group_entry(&self, entry_id: EntryId) -> Url {
        self.endpoint(&["custom-fields", "entries", &entry_id.to_string()])
    }

    pub fn group_entry_values(&self, entry_id: EntryId) -> Url {
        self.endpoint(&["custom-fields", "entries", &entry_id.to_string(), "values"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn routes() -> Routes {
        Routes::new("https://admin.example.com/api/").unwrap()
    }

    #[test]
    fn test_rejects_non_http_base() {
        assert!(matches!(
            Routes::new("ftp://example.com/"),
            Err(FieldsApiError::ValidationError(_))
        ));
        assert!(Routes::new("not a url").is_err());
    }

    #[test]
    fn test_hierarchy_url() {
        assert_eq!(
            routes().hierarchy("user", Some("jane doe")).as_str(),
            "https://admin.example.com/api/custom-fields/hierarchy?entity_type=user&entity_slug=jane+doe"
        );
        assert_eq!(
            routes().hierarchy("asset", None).as_str(),
            "https://admin.example.com/api/custom-fields/hierarchy?entity_type=asset"
        );
    }

    #[test]
    fn test_base_without_trailing_slash() {
        let routes = Routes::new("https://admin.example.com/api").unwrap();
        assert_eq!(
            routes.entity_values(&EntityRef::new("user", "jane")).as_str(),
            "https://admin.example.com/api/custom-fields/entities/user/jane/values"
        );
    }

    #[test]
    fn test_slug_is_percent_encoded() {
        assert_eq!(
            routes().renew_compliance("a/b").as_str(),
            "https://admin.example.com/api/compliance/values/a%2Fb/renew"
        );
    }

    #[test]
    fn test_compliance_fields_filters() {
        let entity = EntityRef::new("user", "jane");
        assert_eq!(
            routes()
                .compliance_fields(&entity, &ComplianceQuery::default())
                .as_str(),
            "https://admin.example.com/api/compliance/entities/user/jane/fields"
        );

        let query = ComplianceQuery {
            role: Some("driver".to_string()),
            asset_type: Some("van".to_string()),
        };
        assert_eq!(
            routes().compliance_fields(&entity, &query).as_str(),
            "https://admin.example.com/api/compliance/entities/user/jane/fields?role=driver&asset_type=van"
        );
    }

    #[test]
    fn test_entry_urls() {
        assert_eq!(
            routes().group_entry_values(77).as_str(),
            "https://admin.example.com/api/custom-fields/entries/77/values"
        );
        assert_eq!(
            routes().file_url(5).as_str(),
            "https://admin.example.com/api/files/5/url"
        );
    }
}
