use std::collections::HashMap;
use std::sync::Arc;

use argon2::password_hash::PasswordHashString;
use argon2::{Argon2, PasswordVerifier};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

/// Source of valid credentials for a realm.
///
/// Implementations may perform I/O; the gate does not bound how long they take.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Checks a clear-text password as presented by the Basic scheme.
    async fn verify_password(&self, username: &str, password: &str) -> bool;

    /// Returns the hex encoded `SHA-256(username:realm:password)` used by the Digest scheme.
    async fn digest_ha1(&self, username: &str) -> Option<String>;
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct UserConfig {
    /// argon2 PHC string
    pub password: Option<String>,
    pub digest_ha1: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub users: HashMap<String, UserConfig>,
}

#[derive(Debug, Default)]
struct User {
    password: Option<PasswordHashString>,
    digest_ha1: Option<String>,
}

/// Credential store backed by the realm section of the configuration file.
#[derive(Debug, Default)]
pub struct StaticRealm {
    users: HashMap<String, User>,
}

fn build_users(users: &HashMap<String, UserConfig>) -> HashMap<String, User> {
    let mut credentials = HashMap::new();
    for (username, config) in users {
        let password = match config.password.as_deref().map(PasswordHashString::new) {
            Some(Ok(hash)) => Some(hash),
            Some(Err(err)) => {
                warn!("Invalid password hash for user {username}: {err}");
                None
            }
            None => None,
        };

        let digest_ha1 = config.digest_ha1.as_ref().map(|ha1| ha1.to_lowercase());
        if password.is_none() && digest_ha1.is_none() {
            warn!("User {username} has no usable credential, skipping");
            continue;
        }

        credentials.insert(
            username.clone(),
            User {
                password,
                digest_ha1,
            },
        );
    }

    credentials
}

impl StaticRealm {
    pub fn new(config: &Config) -> Self {
        Self {
            users: build_users(&config.users),
        }
    }
}

#[async_trait]
impl CredentialStore for StaticRealm {
    #[instrument(skip(self, password))]
    async fn verify_password(&self, username: &str, password: &str) -> bool {
        let Some(user) = self.users.get(username) else {
            debug!("Username not found in realm");
            return false;
        };

        let Some(hash) = &user.password else {
            debug!("User has no password hash configured");
            return false;
        };

        match Argon2::default().verify_password(password.as_bytes(), &hash.password_hash()) {
            Ok(()) => true,
            Err(error) => {
                debug!("Password verification failed: {error}");
                false
            }
        }
    }

    async fn digest_ha1(&self, username: &str) -> Option<String> {
        self.users.get(username)?.digest_ha1.clone()
    }
}

/// Named credential stores available to strategies.
#[derive(Clone, Default)]
pub struct Realms {
    stores: HashMap<String, Arc<dyn CredentialStore>>,
}

impl Realms {
    pub fn from_config(realms: &HashMap<String, Config>) -> Self {
        let stores = realms
            .iter()
            .map(|(name, config)| {
                let store: Arc<dyn CredentialStore> = Arc::new(StaticRealm::new(config));
                (name.clone(), store)
            })
            .collect();

        Self { stores }
    }

    pub fn insert(&mut self, name: &str, store: Arc<dyn CredentialStore>) {
        self.stores.insert(name.to_string(), store);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CredentialStore>> {
        self.stores.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.stores.keys().map(String::as_str)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use argon2::password_hash::rand_core::OsRng;
    use argon2::password_hash::SaltString;
    use argon2::PasswordHasher;

    pub fn hash_password(password: &str) -> String {
        let salt = SaltString::generate(OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_verify_password() {
        let config = Config {
            users: HashMap::from([(
                "alice".to_string(),
                UserConfig {
                    password: Some(hash_password("secret")),
                    digest_ha1: None,
                },
            )]),
        };
        let realm = StaticRealm::new(&config);

        assert!(realm.verify_password("alice", "secret").await);
        assert!(!realm.verify_password("alice", "wrong").await);
        assert!(!realm.verify_password("bob", "secret").await);
    }

    #[tokio::test]
    async fn test_invalid_entries_are_skipped() {
        static TEST_CONFIG: &str = r#"
        [users.alice]
        password = "invalid-password-hash"

        [users.bob]
        password = "invalid-password-hash"
        digest_ha1 = "ABCDEF"

        [users.carol]
        "#;

        let config: Config = toml::from_str(TEST_CONFIG).unwrap();
        let realm = StaticRealm::new(&config);

        assert!(!realm.users.contains_key("alice"));
        assert!(!realm.users.contains_key("carol"));
        assert!(!realm.verify_password("bob", "anything").await);
        assert_eq!(realm.digest_ha1("bob").await, Some("abcdef".to_string()));
        assert_eq!(realm.digest_ha1("alice").await, None);
    }

    #[tokio::test]
    async fn test_realms_lookup() {
        let mut realms = Realms::from_config(&HashMap::from([(
            "R".to_string(),
            Config::default(),
        )]));
        assert!(realms.get("R").is_some());
        assert!(realms.get("missing").is_none());

        let mut store = MockCredentialStore::new();
        store.expect_digest_ha1().returning(|_| None);
        realms.insert("mock", Arc::new(store));

        let mut names: Vec<_> = realms.names().collect();
        names.sort_unstable();
        assert_eq!(names, vec!["R", "mock"]);
        assert_eq!(realms.get("mock").unwrap().digest_ha1("x").await, None);
    }
}
