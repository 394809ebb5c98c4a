use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "agora";

/// Keychain access for backend API keys, one entry per backend.
pub struct CredentialStore;

impl CredentialStore {
    pub fn store_api_key(backend_url: &str, api_key: &str) -> Result<()> {
        entry(backend_url)?
            .set_password(api_key)
            .with_context(|| format!("Failed to store API key for {}", account(backend_url)))
    }

    /// The stored key, or `None` if this backend has none.
    pub fn api_key(backend_url: &str) -> Result<Option<String>> {
        match entry(backend_url)?.get_password() {
            Ok(key) => Ok(Some(key)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to read API key from keychain"),
        }
    }

    /// Remove the stored key. Removing a key that is not there succeeds.
    pub fn delete(backend_url: &str) -> Result<()> {
        match entry(backend_url)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete API key from keychain"),
        }
    }
}

fn entry(backend_url: &str) -> Result<Entry> {
    Entry::new(SERVICE_NAME, &account(backend_url)).context("Failed to create keyring entry")
}

/// Keychain account name. `https://x/` and `https://x` share one entry.
fn account(backend_url: &str) -> String {
    backend_url.trim().trim_end_matches('/').to_string()
}
