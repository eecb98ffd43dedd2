use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use chrono::Utc;

use super::{digest_eq, sha256_hex};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NonceStatus {
    Valid,
    /// Genuine, but older than the configured lifetime.
    Stale,
    Invalid,
}

/// Issues and checks stateless server nonces.
///
/// A nonce is `base64(timestamp ":" hex(sha256(timestamp ":" realm ":" secret)))`, so any
/// instance sharing the secret can verify it without keeping state.
#[derive(Clone, Debug)]
pub struct NonceIssuer {
    realm: String,
    secret: String,
    lifetime: i64,
}

impl NonceIssuer {
    pub fn new(realm: &str, secret: &str, lifetime: i64) -> Self {
        Self {
            realm: realm.to_string(),
            secret: secret.to_string(),
            lifetime,
        }
    }

    fn sign(&self, timestamp: i64) -> String {
        sha256_hex(&format!("{timestamp}:{}:{}", self.realm, self.secret))
    }

    pub fn issue(&self) -> String {
        self.issue_at(Utc::now().timestamp())
    }

    pub fn issue_at(&self, timestamp: i64) -> String {
        let signature = self.sign(timestamp);
        BASE64_STANDARD.encode(format!("{timestamp}:{signature}"))
    }

    pub fn validate(&self, nonce: &str) -> NonceStatus {
        self.validate_at(nonce, Utc::now().timestamp())
    }

    pub fn validate_at(&self, nonce: &str, now: i64) -> NonceStatus {
        let Some(decoded) = BASE64_STANDARD
            .decode(nonce)
            .ok()
            .and_then(|decoded| String::from_utf8(decoded).ok())
        else {
            return NonceStatus::Invalid;
        };

        let Some((timestamp, signature)) = decoded.split_once(':') else {
            return NonceStatus::Invalid;
        };

        let Ok(timestamp) = timestamp.parse::<i64>() else {
            return NonceStatus::Invalid;
        };

        if !digest_eq(signature, &self.sign(timestamp)) || timestamp > now {
            return NonceStatus::Invalid;
        }

        if now - timestamp > self.lifetime {
            NonceStatus::Stale
        } else {
            NonceStatus::Valid
        }
    }
}
