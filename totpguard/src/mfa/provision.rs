use serde::Serialize;
use tracing::info;
use url::form_urlencoded;

use super::{Authenticator, bounded};
use crate::error::{Result, StoreError};
use crate::secure::generate_secret;

/// What an authenticator app needs to enroll an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Provisioning {
    pub identity: String,
    /// Base32 secret without padding.
    pub secret: String,
    pub uri: String,
    /// False when the account already existed.
    pub created: bool,
}

/// Builds the `otpauth://` URI understood by common authenticator apps.
///
/// The identity is form-URL-encoded (a space becomes `+`); the issuer is used verbatim.
pub fn provisioning_uri(issuer: &str, identity: &str, secret: &str) -> String {
    let name: String = form_urlencoded::byte_serialize(identity.as_bytes()).collect();
    format!(
        "otpauth://totp/{issuer}:{name}@{issuer}?algorithm=SHA1&digits=6&issuer={issuer}&period=30&secret={secret}"
    )
}

impl Authenticator {
    /// Returns the provisioning data for `identity`, creating its account on first use.
    pub async fn provision(&self, identity: &str) -> Result<Provisioning> {
        let timeout = self.settings.storage_timeout();

        let (secret, created) = match bounded(timeout, self.secrets.secret(identity)).await? {
            Some(stored) => (self.reveal(stored)?, false),
            None => {
                let secret = generate_secret()?;
                let stored = self.conceal(&secret)?;
                match bounded(timeout, self.secrets.create_account(identity, stored)).await {
                    Ok(()) => {
                        info!(identity, encrypted = self.settings.shall_encrypt, "account created");
                        (secret, true)
                    }
                    // Lost a race with a concurrent provisioning call; use the winner's secret.
                    Err(StoreError::Conflict(_)) => {
                        let stored = bounded(timeout, self.secrets.secret(identity))
                            .await?
                            .ok_or_else(|| {
                                StoreError::Unavailable(format!("account {identity} vanished"))
                            })?;
                        (self.reveal(stored)?, false)
                    }
                    Err(err) => return Err(err.into()),
                }
            }
        };

        let secret = secret.trim_end_matches('=').to_owned();
        let uri = provisioning_uri(&self.settings.issuer_domain, identity, &secret);

        Ok(Provisioning {
            identity: identity.to_owned(),
            secret,
            uri,
            created,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uri_matches_authenticator_format() {
        let uri = provisioning_uri("example.org", "alice", "JBSWY3DPEHPK3PXP");
        assert_eq!(
            uri,
            "otpauth://totp/example.org:alice@example.org?algorithm=SHA1&digits=6&issuer=example.org&period=30&secret=JBSWY3DPEHPK3PXP"
        );
    }

    #[test]
    fn identity_is_form_encoded() {
        let uri = provisioning_uri("corp", "jane doe/ops", "ABC");
        assert!(uri.starts_with("otpauth://totp/corp:jane+doe%2Fops@corp?"));
    }
}
