#[cfg(test)]
mod tests;

mod nonce;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest as ShaDigestTrait, Sha256};
use subtle::ConstantTimeEq;
use tracing::{debug, instrument};

pub use nonce::{NonceIssuer, NonceStatus};

use super::{quote, AuthenticationContext, AuthenticationStrategy};
use crate::gate::constraint::SecuredUrlConstraint;
use crate::gate::realm::CredentialStore;
use crate::gate::request_ext::HeaderExt;
use crate::gate::Error;

const ALGORITHM: &str = "SHA-256";
const QOP_AUTH: &str = "auth";
const DEFAULT_NONCE_LIFETIME: i64 = 300;

pub fn sha256_hex(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

/// Constant-time equality for hex digests and signatures.
pub fn digest_eq(left: &str, right: &str) -> bool {
    left.as_bytes().ct_eq(right.as_bytes()).into()
}

/// `H(username:realm:password)`, the value a realm stores for Digest users.
pub fn ha1(username: &str, realm: &str, password: &str) -> String {
    sha256_hex(&format!("{username}:{realm}:{password}"))
}

/// Parameters of an `Authorization: Digest ...` header.
#[derive(Clone, Debug, PartialEq)]
pub struct DigestCredentials {
    pub username: String,
    pub realm: String,
    pub nonce: String,
    pub uri: String,
    pub response: String,
    pub algorithm: Option<String>,
    pub qop: Option<String>,
    pub nc: Option<String>,
    pub cnonce: Option<String>,
    pub opaque: Option<String>,
}

impl DigestCredentials {
    pub fn from_params(mut params: HashMap<String, String>) -> Option<Self> {
        Some(Self {
            username: params.remove("username")?,
            realm: params.remove("realm")?,
            nonce: params.remove("nonce")?,
            uri: params.remove("uri")?,
            response: params.remove("response")?.to_lowercase(),
            algorithm: params.remove("algorithm"),
            qop: params.remove("qop"),
            nc: params.remove("nc"),
            cnonce: params.remove("cnonce"),
            opaque: params.remove("opaque"),
        })
    }

    /// Response the client should have sent for the given `HA1` and request method.
    pub fn expected_response(&self, ha1: &str, method: &str) -> Option<String> {
        let ha2 = sha256_hex(&format!("{method}:{}", self.uri));
        match &self.qop {
            Some(qop) => {
                let nc = self.nc.as_ref()?;
                let cnonce = self.cnonce.as_ref()?;
                Some(sha256_hex(&format!(
                    "{ha1}:{}:{nc}:{cnonce}:{qop}:{ha2}",
                    self.nonce
                )))
            }
            None => Some(sha256_hex(&format!("{ha1}:{}:{ha2}", self.nonce))),
        }
    }
}

/// HTTP Digest authentication (RFC 7616) using `SHA-256` and `qop=auth`.
pub struct DigestAuthentication {
    store: Arc<dyn CredentialStore>,
    nonces: NonceIssuer,
    opaque: String,
    credentials: Option<DigestCredentials>,
}

impl DigestAuthentication {
    pub fn new(store: Arc<dyn CredentialStore>, nonces: NonceIssuer, opaque: &str) -> Self {
        Self {
            store,
            nonces,
            opaque: opaque.to_string(),
            credentials: None,
        }
    }

    /// Builds the strategy from the constraint's scheme parameters:
    /// `nonce_lifetime` (seconds), `nonce_secret` and `opaque`.
    pub fn from_constraint(
        store: Arc<dyn CredentialStore>,
        constraint: &SecuredUrlConstraint,
        default_secret: &str,
    ) -> Result<Self, Error> {
        let lifetime = match constraint.scheme_param("nonce_lifetime") {
            Some(value) => value.parse::<i64>().ok().filter(|v| *v > 0).ok_or_else(|| {
                Error::Configuration(format!("Invalid Digest nonce_lifetime '{value}'"))
            })?,
            None => DEFAULT_NONCE_LIFETIME,
        };

        let realm = constraint.realm_name();
        let secret = constraint
            .scheme_param("nonce_secret")
            .unwrap_or(default_secret);
        let opaque = match constraint.scheme_param("opaque") {
            Some(opaque) => opaque.to_string(),
            None => sha256_hex(&format!("{realm}:{secret}")),
        };

        let nonces = NonceIssuer::new(realm, secret, lifetime);
        Ok(Self::new(store, nonces, &opaque))
    }

    pub fn challenge(&self, realm: &str, stale: bool) -> String {
        let mut challenge = format!(
            "Digest realm=\"{}\", qop=\"{QOP_AUTH}\", algorithm={ALGORITHM}, nonce=\"{}\", opaque=\"{}\"",
            quote(realm),
            self.nonces.issue(),
            quote(&self.opaque)
        );
        if stale {
            challenge.push_str(", stale=true");
        }
        challenge
    }

    fn uri_matches(credentials: &DigestCredentials, context: &AuthenticationContext<'_>) -> bool {
        let uri = &context.request.uri;
        let path_and_query = uri.path_and_query().map_or("/", |p| p.as_str());
        credentials.uri == path_and_query || credentials.uri == uri.to_string()
    }

    /// Checks everything but the password. Returns the nonce status on success.
    fn check_parameters(
        &self,
        credentials: &DigestCredentials,
        context: &AuthenticationContext<'_>,
    ) -> Option<NonceStatus> {
        if let Some(algorithm) = &credentials.algorithm {
            if !algorithm.eq_ignore_ascii_case(ALGORITHM) {
                debug!("Unsupported Digest algorithm '{algorithm}'");
                return None;
            }
        }

        if credentials.realm != context.constraint.realm_name() {
            debug!("Digest realm '{}' does not match", credentials.realm);
            return None;
        }

        if !Self::uri_matches(credentials, context) {
            debug!("Digest uri '{}' does not match the request", credentials.uri);
            return None;
        }

        if credentials.opaque.as_deref() != Some(self.opaque.as_str()) {
            debug!("Digest opaque value does not match");
            return None;
        }

        if let Some(qop) = &credentials.qop {
            if qop != QOP_AUTH || credentials.nc.is_none() || credentials.cnonce.is_none() {
                debug!("Unsupported or incomplete Digest qop '{qop}'");
                return None;
            }
        }

        match self.nonces.validate(&credentials.nonce) {
            NonceStatus::Invalid => {
                debug!("Digest nonce was not issued by this server");
                None
            }
            status => Some(status),
        }
    }

    async fn verify(&self, context: &AuthenticationContext<'_>) -> Result<(), bool> {
        let Some(credentials) = &self.credentials else {
            debug!("No Digest credentials presented");
            return Err(false);
        };

        let nonce_status = self.check_parameters(credentials, context).ok_or(false)?;

        let Some(ha1) = self.store.digest_ha1(&credentials.username).await else {
            debug!("No Digest credential for '{}'", credentials.username);
            return Err(false);
        };

        let method = context.request.method.as_str();
        let expected = credentials.expected_response(&ha1, method).ok_or(false)?;
        if !digest_eq(&expected, &credentials.response) {
            debug!("Digest response mismatch for '{}'", credentials.username);
            return Err(false);
        }

        if nonce_status == NonceStatus::Stale {
            debug!("Digest nonce is stale");
            return Err(true);
        }

        Ok(())
    }
}

#[async_trait]
impl AuthenticationStrategy for DigestAuthentication {
    fn initialize(&mut self, context: &AuthenticationContext<'_>) {
        self.credentials = context
            .request
            .digest_auth()
            .and_then(DigestCredentials::from_params);
    }

    #[instrument(skip_all)]
    async fn authenticate(&mut self, context: &mut AuthenticationContext<'_>) -> bool {
        match self.verify(context).await {
            Ok(()) => true,
            Err(stale) => {
                let challenge = self.challenge(context.constraint.realm_name(), stale);
                context.challenge(&challenge);
                false
            }
        }
    }
}
