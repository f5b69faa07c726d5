//! Time-based one-time password core.
//!
//! Provisions per-identity secrets, validates six digit codes against the current 30 second time
//! step, limits failed attempts per identity and step, and keeps an audit trail of every
//! validation. Persistence, encryption at rest and capability management belong to the host and
//! are reached through the traits in [`store`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use totpguard::{env::Settings, mfa::Authenticator, store::MemoryStore};
//!
//! # async fn run() -> totpguard::error::Result<()> {
//! let auth = Authenticator::new(Settings::default(), Arc::new(MemoryStore::new()));
//! let provisioning = auth.provision("alice").await?;
//! println!("{}", provisioning.uri);
//!
//! let accepted = auth.validate_token("alice", "123 456").await;
//! # let _ = accepted;
//! # Ok(())
//! # }
//! ```

pub mod env;
pub mod error;
pub mod instrument;
pub mod mfa;
pub mod secure;
pub mod server;
pub mod store;

pub use error::{Error, Result};
pub use mfa::{Authenticator, Rejection, Verdict};
