//! Request-time authentication gate.
//!
//! Each application owns a [`ConstraintTable`] of secured URL patterns. For every request the
//! [`AuthenticationGate`] looks up the first constraint matching the resource path and, when one
//! applies, lets the strategy registered for the constraint's scheme verify the credentials.
//! Paths no constraint matches are not protected.

pub mod constraint;
mod error;
pub mod pattern;
pub mod realm;
pub mod request_ext;
pub mod scheme;
pub mod strategy;

use std::sync::Arc;

use hyper::http::{request, response};
use tracing::{debug, info, instrument};

pub use constraint::{ConstraintTable, SecuredUrlConstraint};
pub use error::Error;
pub use realm::{CredentialStore, Realms};
pub use request_ext::{ResourcePath, ServletRequestExt};
pub use scheme::AuthScheme;
pub use strategy::{AuthenticationContext, AuthenticationStrategy, StrategyFactory};

use crate::metrics_provider::AUTH_ATTEMPTS;

pub struct AuthenticationGate {
    constraints: Arc<ConstraintTable>,
    strategies: Arc<StrategyFactory>,
}

impl AuthenticationGate {
    pub fn new(constraints: Arc<ConstraintTable>, strategies: Arc<StrategyFactory>) -> Self {
        Self {
            constraints,
            strategies,
        }
    }

    pub fn constraints(&self) -> &ConstraintTable {
        &self.constraints
    }

    /// Authenticates the request if a constraint protects its resource path.
    ///
    /// Returns `Ok(true)` when the request may proceed, `Ok(false)` when it was denied, in which
    /// case `response` already carries the 401 status and challenge. Errors denote deployment
    /// defects and are raised before anything is written to `response`.
    #[instrument(skip_all, fields(path))]
    pub async fn handle(
        &self,
        request: &request::Parts,
        response: &mut response::Parts,
    ) -> Result<bool, Error> {
        let request_path = request.resource_path();
        tracing::Span::current().record("path", request_path.as_str());

        let Some(constraint) = self.constraints.find(&request_path) else {
            debug!("No constraint protects '{request_path}'");
            return Ok(true);
        };

        let scheme = constraint.auth_type();
        let mut strategy = self.strategies.create(scheme, constraint)?;

        let mut context = AuthenticationContext {
            request,
            response,
            constraint,
        };
        strategy.initialize(&context);
        let authenticated = strategy.authenticate(&mut context).await;

        let result = if authenticated { "success" } else { "failure" };
        AUTH_ATTEMPTS
            .with_label_values(&[scheme.as_str(), result])
            .inc();

        if authenticated {
            debug!("Authenticated '{request_path}' ({scheme})");
        } else {
            info!(
                "Denied '{request_path}' for realm '{}' ({scheme})",
                constraint.realm_name()
            );
        }

        Ok(authenticated)
    }

    /// Contextual authentication data is not available yet; always fails.
    pub fn get_attribute(&self, key: &str) -> Result<String, Error> {
        Err(Error::NotImplemented(format!(
            "AuthenticationGate::get_attribute('{key}')"
        )))
    }
}
