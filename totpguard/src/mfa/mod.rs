//! Token validation, activation, provisioning and account administration.

mod limiter;
mod provision;
mod qrcode;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::env::Settings;
use crate::error::{CipherError, Result, StoreError};
use crate::secure::{Clock, SystemClock, generate_code, sanitize_token, step_at};
use crate::store::{
    Account, AccountStore, AttemptStore, IdentityDirectory, SecretCipher, SecretStore,
    StoredSecret, ValidationAttempt,
};

pub use limiter::{AttemptLimiter, AttemptPermit};
pub use provision::{Provisioning, provisioning_uri};
pub use qrcode::{parse_hex_color, render_qr_png};

/// Runs a storage call under a deadline.
pub(crate) async fn bounded<T, F>(timeout: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(timeout.as_millis() as u64)),
    }
}

/// Outcome of a single validation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", content = "reason", rename_all = "snake_case")]
pub enum Verdict {
    Accepted,
    Rejected(Rejection),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    WrongCode,
    AccountDisabled,
    AttemptsExceeded,
    NoSecret,
    SystemError(&'static str),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }
}

/// Validates tokens against the current time step and keeps the audit trail.
pub struct Authenticator {
    settings: Settings,
    secrets: Arc<dyn SecretStore>,
    accounts: Arc<dyn AccountStore>,
    attempts: Arc<dyn AttemptStore>,
    directory: Arc<dyn IdentityDirectory>,
    cipher: Option<Arc<dyn SecretCipher>>,
    clock: Arc<dyn Clock>,
    limiter: AttemptLimiter,
}

impl Authenticator {
    /// Builds an authenticator whose collaborators are all served by `store`.
    pub fn new<S>(settings: Settings, store: Arc<S>) -> Self
    where
        S: SecretStore + AccountStore + AttemptStore + IdentityDirectory + 'static,
    {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let attempts: Arc<dyn AttemptStore> = store.clone();
        let limiter = Self::limiter_for(&settings, attempts.clone(), clock.clone());

        Self {
            settings,
            secrets: store.clone(),
            accounts: store.clone(),
            attempts,
            directory: store,
            cipher: None,
            clock,
            limiter,
        }
    }

    fn limiter_for(
        settings: &Settings,
        attempts: Arc<dyn AttemptStore>,
        clock: Arc<dyn Clock>,
    ) -> AttemptLimiter {
        AttemptLimiter::new(
            attempts,
            clock,
            settings.max_attempts,
            settings.storage_timeout(),
        )
    }

    pub fn with_cipher(mut self, cipher: Arc<dyn SecretCipher>) -> Self {
        self.cipher = Some(cipher);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.limiter = Self::limiter_for(&self.settings, self.attempts.clone(), clock.clone());
        self.clock = clock;
        self
    }

    pub fn with_attempt_store(mut self, attempts: Arc<dyn AttemptStore>) -> Self {
        self.limiter = Self::limiter_for(&self.settings, attempts.clone(), self.clock.clone());
        self.attempts = attempts;
        self
    }

    pub fn with_account_store(mut self, accounts: Arc<dyn AccountStore>) -> Self {
        self.accounts = accounts;
        self
    }

    pub fn with_secret_store(mut self, secrets: Arc<dyn SecretStore>) -> Self {
        self.secrets = secrets;
        self
    }

    pub fn with_directory(mut self, directory: Arc<dyn IdentityDirectory>) -> Self {
        self.directory = directory;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn limiter(&self) -> &AttemptLimiter {
        &self.limiter
    }

    pub fn current_step(&self) -> i64 {
        step_at(self.clock.unix_seconds())
    }

    fn timeout(&self) -> Duration {
        self.settings.storage_timeout()
    }

    /// Validates `token` for `identity` at the current time step. Never fails: any error is
    /// logged and reported as `false`.
    pub async fn validate_token(&self, identity: &str, token: &str) -> bool {
        self.validate_token_detailed(identity, token)
            .await
            .is_accepted()
    }

    /// Like [`Self::validate_token`], but says why a token was rejected.
    #[tracing::instrument(name = "validate_token", skip(self, token))]
    pub async fn validate_token_detailed(&self, identity: &str, token: &str) -> Verdict {
        let step = self.current_step();

        // Every audit write for this key happens under the permit.
        let _permit = self.limiter.acquire(identity, step).await;

        let enabled = match bounded(self.timeout(), self.accounts.is_enabled(identity)).await {
            Ok(enabled) => enabled.unwrap_or(true),
            Err(err) => {
                error!(error.message = %err, "could not read account state, assuming enabled");
                true
            }
        };

        if !enabled {
            warn!(step, "account is disabled");
            self.record(identity, step, false, false).await;
            return Verdict::Rejected(Rejection::AccountDisabled);
        }

        // Fails open: a storage error counts as zero prior attempts.
        let attempts = match self.limiter.count_failed_attempts(identity, step).await {
            Ok(count) => count,
            Err(err) => {
                error!(error.message = %err, step, "could not count failed attempts, assuming none");
                0
            }
        };

        if self.limiter.is_exhausted(attempts) {
            warn!(
                step,
                attempts,
                max_attempts = self.limiter.max_attempts(),
                "number of failed attempts exceeded limit"
            );
            return Verdict::Rejected(Rejection::AttemptsExceeded);
        }

        let submitted = sanitize_token(token);
        let verdict = match self.expected_code(identity, step).await {
            Ok(Some(expected)) if u64::from(expected) == submitted => Verdict::Accepted,
            Ok(Some(_)) => Verdict::Rejected(Rejection::WrongCode),
            Ok(None) => {
                warn!(step, "no secret stored for identity");
                Verdict::Rejected(Rejection::NoSecret)
            }
            Err(err) => {
                error!(error.kind = err.kind(), error.message = %err, step, "could not compute expected code");
                Verdict::Rejected(Rejection::SystemError(err.kind()))
            }
        };

        self.record(identity, step, true, verdict.is_accepted()).await;
        info!(step, accepted = verdict.is_accepted(), "token validated");
        verdict
    }

    /// Validates `token` and, on success, grants the activation capability to `identity`.
    pub async fn activate_token(&self, identity: &str, token: &str) -> bool {
        if !self.validate_token(identity, token).await {
            return false;
        }

        let capability = self.settings.activation_capability.as_str();
        match bounded(
            self.timeout(),
            self.directory.grant_capability(identity, capability),
        )
        .await
        {
            Ok(()) => {
                info!(identity, capability, "identity activated");
                true
            }
            Err(err) => {
                error!(identity, capability, error.message = %err, "could not grant capability");
                false
            }
        }
    }

    async fn expected_code(&self, identity: &str, step: i64) -> Result<Option<u32>> {
        let Some(stored) = bounded(self.timeout(), self.secrets.secret(identity)).await? else {
            return Ok(None);
        };
        let secret = self.reveal(stored)?;
        Ok(Some(generate_code(step, &secret)?))
    }

    async fn record(&self, identity: &str, step: i64, account_enabled: bool, succeeded: bool) {
        if let Err(err) = self
            .limiter
            .record_attempt(identity, step, account_enabled, succeeded)
            .await
        {
            error!(error.message = %err, step, "could not record validation attempt");
        }
    }

    fn reveal(&self, stored: StoredSecret) -> Result<String> {
        if !stored.encrypted {
            return Ok(stored.value);
        }
        let cipher = self.cipher.as_ref().ok_or(CipherError::Unavailable)?;
        Ok(cipher.decrypt(&stored.value)?)
    }

    fn conceal(&self, secret: &str) -> Result<StoredSecret> {
        if !self.settings.shall_encrypt {
            return Ok(StoredSecret {
                value: secret.to_owned(),
                encrypted: false,
            });
        }
        let cipher = self.cipher.as_ref().ok_or(CipherError::Unavailable)?;
        Ok(StoredSecret {
            value: cipher.encrypt(secret)?,
            encrypted: true,
        })
    }

    /// Returns whether an account existed and was updated.
    pub async fn set_account_enabled(&self, identity: &str, enabled: bool) -> Result<bool> {
        let updated = bounded(self.timeout(), self.accounts.set_enabled(identity, enabled)).await?;
        info!(identity, enabled, updated, "account state changed");
        Ok(updated)
    }

    pub async fn account(&self, identity: &str) -> Result<Option<Account>> {
        Ok(bounded(self.timeout(), self.accounts.account(identity)).await?)
    }

    pub async fn accounts(&self, limit: Option<usize>) -> Result<Vec<Account>> {
        Ok(bounded(self.timeout(), self.accounts.accounts(limit)).await?)
    }

    /// Validation attempts, newest first.
    pub async fn audit(&self, limit: Option<usize>) -> Result<Vec<ValidationAttempt>> {
        Ok(bounded(self.timeout(), self.attempts.recent(limit)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secure::ManualClock;
    use crate::store::MemoryStore;

    #[test]
    fn verdict_serializes_with_reason() {
        let accepted = serde_json::to_value(Verdict::Accepted).unwrap();
        assert_eq!(accepted, serde_json::json!({ "verdict": "accepted" }));

        let locked = serde_json::to_value(Verdict::Rejected(Rejection::AttemptsExceeded)).unwrap();
        assert_eq!(
            locked,
            serde_json::json!({ "verdict": "rejected", "reason": "attempts_exceeded" })
        );

        let failed =
            serde_json::to_value(Verdict::Rejected(Rejection::SystemError("storage"))).unwrap();
        assert_eq!(
            failed,
            serde_json::json!({ "verdict": "rejected", "reason": { "system_error": "storage" } })
        );
    }

    #[test]
    fn current_step_follows_the_clock() {
        let clock = Arc::new(ManualClock::at_seconds(59));
        let auth = Authenticator::new(Settings::default(), Arc::new(MemoryStore::new()))
            .with_clock(clock.clone());
        assert_eq!(auth.current_step(), 1);

        clock.advance_seconds(1);
        assert_eq!(auth.current_step(), 2);
    }
}
