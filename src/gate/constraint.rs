use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::gate::pattern::UrlPattern;
use crate::gate::scheme::AuthScheme;

/// A secured URL declaration as it appears in the application descriptor.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    pub url_pattern: String,
    pub auth_type: AuthScheme,
    pub realm_name: String,
    #[serde(default)]
    pub authorized_roles: Option<BTreeSet<String>>,
    #[serde(default)]
    pub scheme_params: BTreeMap<String, String>,
}

/// Binds a URL pattern to the scheme and realm a matching request must authenticate with.
#[derive(Clone, Debug, PartialEq)]
pub struct SecuredUrlConstraint {
    url_pattern: UrlPattern,
    auth_type: AuthScheme,
    realm_name: String,
    // Carried for completeness, the gate verifies identity only.
    authorized_roles: Option<BTreeSet<String>>,
    scheme_params: BTreeMap<String, String>,
}

impl SecuredUrlConstraint {
    pub fn new(url_pattern: &str, auth_type: AuthScheme, realm_name: &str) -> Self {
        Self {
            url_pattern: UrlPattern::compile(url_pattern),
            auth_type,
            realm_name: realm_name.to_string(),
            authorized_roles: None,
            scheme_params: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_authorized_roles(mut self, roles: BTreeSet<String>) -> Self {
        self.authorized_roles = Some(roles);
        self
    }

    #[must_use]
    pub fn with_scheme_param(mut self, key: &str, value: &str) -> Self {
        self.scheme_params
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn url_pattern(&self) -> &UrlPattern {
        &self.url_pattern
    }

    pub fn auth_type(&self) -> &AuthScheme {
        &self.auth_type
    }

    pub fn realm_name(&self) -> &str {
        &self.realm_name
    }

    pub fn authorized_roles(&self) -> Option<&BTreeSet<String>> {
        self.authorized_roles.as_ref()
    }

    pub fn scheme_params(&self) -> &BTreeMap<String, String> {
        &self.scheme_params
    }

    pub fn scheme_param(&self, key: &str) -> Option<&str> {
        self.scheme_params.get(key).map(String::as_str)
    }
}

impl From<&Config> for SecuredUrlConstraint {
    fn from(config: &Config) -> Self {
        Self {
            url_pattern: UrlPattern::compile(&config.url_pattern),
            auth_type: config.auth_type.clone(),
            realm_name: config.realm_name.clone(),
            authorized_roles: config.authorized_roles.clone(),
            scheme_params: config.scheme_params.clone(),
        }
    }
}

/// Secured URL constraints of one application, in declaration order.
///
/// The first constraint whose pattern matches a resource path wins; overlapping
/// constraints are never merged.
#[derive(Debug, Default)]
pub struct ConstraintTable {
    constraints: Vec<SecuredUrlConstraint>,
}

impl ConstraintTable {
    pub fn load<I>(constraints: I) -> Self
    where
        I: IntoIterator<Item = SecuredUrlConstraint>,
    {
        let constraints: Vec<_> = constraints.into_iter().collect();
        for constraint in &constraints {
            if !constraint.url_pattern.is_valid() {
                warn!(
                    "Malformed URL pattern '{}' will never match",
                    constraint.url_pattern
                );
            }
        }

        Self { constraints }
    }

    pub fn from_config(configs: &[Config]) -> Self {
        Self::load(configs.iter().map(SecuredUrlConstraint::from))
    }

    pub fn find(&self, request_path: &str) -> Option<&SecuredUrlConstraint> {
        let found = self
            .constraints
            .iter()
            .find(|constraint| constraint.url_pattern.matches(request_path));

        if let Some(constraint) = found {
            debug!(
                "Path '{request_path}' matches '{}' ({})",
                constraint.url_pattern, constraint.auth_type
            );
        }
        found
    }

    pub fn iter(&self) -> impl Iterator<Item = &SecuredUrlConstraint> {
        self.constraints.iter()
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }
}
