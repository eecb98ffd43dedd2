
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{quote, AuthenticationContext, AuthenticationStrategy};
use crate::gate::realm::CredentialStore;
use crate::gate::request_ext::HeaderExt;

/// HTTP Basic authentication (RFC 7617).
pub struct BasicAuthentication {
    store: Arc<dyn CredentialStore>,
    credentials: Option<(String, String)>,
}

impl BasicAuthentication {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            credentials: None,
        }
    }

    pub fn challenge(realm: &str) -> String {
        format!("Basic realm=\"{}\"", quote(realm))
    }
}

#[async_trait]
impl AuthenticationStrategy for BasicAuthentication {
    fn initialize(&mut self, context: &AuthenticationContext<'_>) {
        self.credentials = context.request.basic_auth();
    }

    #[instrument(skip_all)]
    async fn authenticate(&mut self, context: &mut AuthenticationContext<'_>) -> bool {
        let authenticated = match &self.credentials {
            Some((username, password)) => {
                debug!("Verifying Basic credentials of '{username}'");
                self.store.verify_password(username, password).await
            }
            None => {
                debug!("No Basic credentials presented");
                false
            }
        };

        if !authenticated {
            let challenge = Self::challenge(context.constraint.realm_name());
            context.challenge(&challenge);
        }

        authenticated
    }
}
