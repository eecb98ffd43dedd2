pub mod basic;
pub mod digest;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use hyper::header::{HeaderValue, WWW_AUTHENTICATE};
use hyper::http::{request, response};
use hyper::StatusCode;
use tracing::error;

pub use basic::BasicAuthentication;
pub use digest::DigestAuthentication;

use crate::gate::constraint::SecuredUrlConstraint;
use crate::gate::realm::{CredentialStore, Realms};
use crate::gate::scheme::AuthScheme;
use crate::gate::Error;

/// Per-request bundle a strategy works on. Never outlives a single `handle` call.
pub struct AuthenticationContext<'a> {
    pub request: &'a request::Parts,
    pub response: &'a mut response::Parts,
    pub constraint: &'a SecuredUrlConstraint,
}

impl AuthenticationContext<'_> {
    /// Marks the response as `401 Unauthorized` carrying the given `WWW-Authenticate` challenge.
    pub fn challenge(&mut self, challenge: &str) {
        self.response.status = StatusCode::UNAUTHORIZED;
        match HeaderValue::from_str(challenge) {
            Ok(value) => {
                self.response.headers.insert(WWW_AUTHENTICATE, value);
            }
            Err(err) => error!("Unable to encode challenge '{challenge}': {err}"),
        }
    }
}

/// Escapes a value for use inside a quoted-string auth parameter.
pub fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// A credential-verification scheme, instantiated fresh for each authentication attempt.
#[async_trait]
pub trait AuthenticationStrategy: Send {
    /// Reads the credentials the request presents for this scheme.
    fn initialize(&mut self, context: &AuthenticationContext<'_>);

    /// Verifies the credentials read by `initialize`.
    ///
    /// When returning `false` the response carries a 401 status and a challenge for the
    /// constraint's realm; when returning `true` the response is left untouched.
    async fn authenticate(&mut self, context: &mut AuthenticationContext<'_>) -> bool;
}

pub type StrategyConstructor = Arc<
    dyn Fn(&SecuredUrlConstraint) -> Result<Box<dyn AuthenticationStrategy>, Error>
        + Send
        + Sync,
>;

/// Registry mapping scheme tokens to strategy constructors.
#[derive(Clone, Default)]
pub struct StrategyFactory {
    constructors: HashMap<AuthScheme, StrategyConstructor>,
}

/// Resolves the credential store a constraint refers to: the `store` scheme parameter
/// when present, the realm name otherwise.
pub fn resolve_store(
    realms: &Realms,
    constraint: &SecuredUrlConstraint,
) -> Result<Arc<dyn CredentialStore>, Error> {
    let name = constraint
        .scheme_param("store")
        .unwrap_or(constraint.realm_name());

    realms.get(name).ok_or_else(|| {
        Error::Configuration(format!(
            "No credential store '{name}' for constraint '{}'",
            constraint.url_pattern()
        ))
    })
}

impl StrategyFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory with the `Basic` and `Digest` schemes bound to the given realms.
    pub fn with_builtins(realms: Arc<Realms>) -> Self {
        let mut factory = Self::new();

        let basic_realms = Arc::clone(&realms);
        factory.register(AuthScheme::Basic, move |constraint| {
            let store = resolve_store(&basic_realms, constraint)?;
            Ok(Box::new(BasicAuthentication::new(store)))
        });

        let nonce_secret = uuid::Uuid::new_v4().simple().to_string();
        factory.register(AuthScheme::Digest, move |constraint| {
            let store = resolve_store(&realms, constraint)?;
            let strategy = DigestAuthentication::from_constraint(store, constraint, &nonce_secret)?;
            Ok(Box::new(strategy))
        });

        factory
    }

    /// Associates `scheme` with `constructor`, replacing any previous registration.
    pub fn register<F>(&mut self, scheme: AuthScheme, constructor: F)
    where
        F: Fn(&SecuredUrlConstraint) -> Result<Box<dyn AuthenticationStrategy>, Error>
            + Send
            + Sync
            + 'static,
    {
        self.constructors.insert(scheme, Arc::new(constructor));
    }

    pub fn is_registered(&self, scheme: &AuthScheme) -> bool {
        self.constructors.contains_key(scheme)
    }

    pub fn create(
        &self,
        scheme: &AuthScheme,
        constraint: &SecuredUrlConstraint,
    ) -> Result<Box<dyn AuthenticationStrategy>, Error> {
        let constructor = self
            .constructors
            .get(scheme)
            .ok_or_else(|| Error::UnsupportedScheme(scheme.to_string()))?;

        constructor(constraint)
    }
}
