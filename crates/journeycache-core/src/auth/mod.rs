//! Authentication module for managing user sessions and credentials.
//!
//! This module provides:
//! - `Session`: Token-based session persisted next to the journey cache
//! - `CredentialStore`: Secure OS-level credential storage via keyring
//!
//! Tokens are treated as expired 24 hours after login.

pub mod credentials;
pub mod session;

pub use credentials::CredentialStore;
pub use session::{Session, SessionData};
