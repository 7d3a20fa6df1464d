//! Provider credentials
//!
//! One static key pair is shared by every region client of a provider
//! instance. Keys come from the layered configuration; nothing here reads
//! files or touches the network.

use anyhow::{bail, Result};
use std::fmt;

/// Hint appended to every credential error
const CHECK_CONFIG: &str = "Please check your configuration";

/// Static access/secret key pair
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    access_key: String,
    secret_key: String,
}

impl Credentials {
    /// Create credentials, rejecting empty or malformed keys
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Result<Self> {
        let access_key = access_key.into();
        let secret_key = secret_key.into();

        if access_key.is_empty() {
            bail!("Access key is not set. {}", CHECK_CONFIG);
        }
        if secret_key.is_empty() {
            bail!("Secret key is not set. {}", CHECK_CONFIG);
        }
        if !is_valid_key(&access_key) {
            bail!("Access key contains invalid characters. {}", CHECK_CONFIG);
        }
        if !is_valid_key(&secret_key) {
            bail!("Secret key contains invalid characters. {}", CHECK_CONFIG);
        }

        Ok(Self {
            access_key,
            secret_key,
        })
    }

    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    pub(crate) fn secret_key(&self) -> &str {
        &self.secret_key
    }
}

// Security: never print the secret key, even in debug logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &mask(&self.access_key))
            .field("secret_key", &"****")
            .finish()
    }
}

/// Keys are sent in an Authorization header, so whitespace and control
/// characters are not allowed
fn is_valid_key(key: &str) -> bool {
    key.chars().all(|c| c.is_ascii_graphic())
}

/// Keep the first four characters of a key for diagnostics
fn mask(key: &str) -> String {
    let visible: String = key.chars().take(4).collect();
    format!("{}****", visible)
}
