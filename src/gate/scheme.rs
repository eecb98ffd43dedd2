use serde::Deserialize;
use std::fmt;

/// Authentication scheme token declared by a constraint's `auth_type`.
///
/// Tokens are case-sensitive: only `Basic` and `Digest` map to the built-in
/// variants, anything else is carried as `Custom` and resolved through the
/// strategy registry.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Hash)]
#[serde(from = "String")]
pub enum AuthScheme {
    Basic,
    Digest,
    Custom(String),
}

impl AuthScheme {
    pub fn as_str(&self) -> &str {
        match self {
            AuthScheme::Basic => "Basic",
            AuthScheme::Digest => "Digest",
            AuthScheme::Custom(token) => token,
        }
    }
}

impl From<&str> for AuthScheme {
    fn from(token: &str) -> Self {
        match token {
            "Basic" => AuthScheme::Basic,
            "Digest" => AuthScheme::Digest,
            other => AuthScheme::Custom(other.to_string()),
        }
    }
}

impl From<String> for AuthScheme {
    fn from(token: String) -> Self {
        match token.as_str() {
            "Basic" => AuthScheme::Basic,
            "Digest" => AuthScheme::Digest,
            _ => AuthScheme::Custom(token),
        }
    }
}

impl fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
