use crate::command;
use argh::FromArgs;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHasher, Version};

#[derive(FromArgs, PartialEq, Debug)]
#[argh(
    subcommand,
    name = "argon",
    description = "Hash a Basic realm password following the argon2id algorithm"
)]
pub struct Options {}

pub struct Command {}

impl Command {
    pub fn run() -> Result<(), command::Error> {
        let password = rpassword::prompt_password("Input Password: ")?;
        println!("{}", hash_password(&password)?);
        Ok(())
    }
}

/// PHC string suitable for a realm user's `password` entry.
pub fn hash_password(password: &str) -> Result<String, command::Error> {
    let salt = SaltString::generate(OsRng);

    let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, Params::default());
    let hash = argon.hash_password(password.as_bytes(), &salt)?;

    Ok(hash.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::realm::{Config, StaticRealm, UserConfig};
    use crate::gate::CredentialStore;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_hash_is_accepted_by_realm() {
        let hash = hash_password("my_secure_password").unwrap();
        assert!(hash.starts_with("$argon2id$"));

        let realm = StaticRealm::new(&Config {
            users: HashMap::from([(
                "alice".to_string(),
                UserConfig {
                    password: Some(hash),
                    digest_ha1: None,
                },
            )]),
        });

        assert!(realm.verify_password("alice", "my_secure_password").await);
        assert!(!realm.verify_password("alice", "other").await);
    }
}
