//! Credential storage for the backend API key.
//!
//! The key is kept in the OS keychain through `CredentialStore`, keyed by
//! backend URL so several deployments can coexist.

pub mod credentials;

pub use credentials::CredentialStore;
