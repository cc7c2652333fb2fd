//! OS keychain storage for the catalog API key.

use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "menucart";

/// Keychain account the API key is filed under.
const API_KEY_ACCOUNT: &str = "catalog-api-key";

pub struct CredentialStore;

impl CredentialStore {
    fn entry() -> Result<Entry> {
        Entry::new(SERVICE_NAME, API_KEY_ACCOUNT).context("Failed to create keyring entry")
    }

    /// Store the catalog API key in the OS keychain
    pub fn store_api_key(api_key: &str) -> Result<()> {
        Self::entry()?
            .set_password(api_key)
            .context("Failed to store API key in keychain")?;
        Ok(())
    }

    /// The stored API key, if any
    pub fn api_key() -> Result<Option<String>> {
        match Self::entry()?.get_password() {
            Ok(key) => Ok(Some(key)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve API key from keychain"),
        }
    }

    /// Delete the stored API key. Deleting a missing key is not an error.
    pub fn delete_api_key() -> Result<()> {
        match Self::entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete API key from keychain"),
        }
    }
}
