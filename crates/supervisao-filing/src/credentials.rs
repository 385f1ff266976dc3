//! Per-supervisor portal credential resolution.
//!
//! Credentials are fully resolved, secret decode included, before any
//! browser is launched for a report.

use crate::error::{FilingError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::fmt;
use std::sync::Arc;
use supervisao_core::OwnerId;
use zeroize::Zeroizing;

/// Credential entry as kept by the store, secret still encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCredentials {
    /// Portal login name
    pub login_name: String,
    /// Base64 of the portal secret
    pub encoded_secret: String,
}

/// Read-only source of credential entries keyed by owner.
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    /// Fetch the entry for `owner_id`, if any.
    async fn fetch(&self, owner_id: &OwnerId) -> Result<Option<StoredCredentials>>;
}

/// Decoded credentials ready for the login form.
///
/// The secret is wiped from memory when dropped.
pub struct PortalCredentials {
    login_name: String,
    secret: Zeroizing<String>,
}

impl PortalCredentials {
    /// Build credentials from a login name and plaintext secret.
    #[must_use]
    pub fn new(login_name: impl Into<String>, secret: Zeroizing<String>) -> Self {
        Self {
            login_name: login_name.into(),
            secret,
        }
    }

    /// Portal login name.
    #[must_use]
    pub fn login_name(&self) -> &str {
        &self.login_name
    }

    /// Plaintext portal secret.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for PortalCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortalCredentials")
            .field("login_name", &self.login_name)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Decode a stored secret.
///
/// # Errors
/// Returns `FilingError::InternalError` if the value is not valid base64 or
/// does not decode to UTF-8.
pub fn decode_secret(encoded: &str) -> Result<Zeroizing<String>> {
    let bytes = Zeroizing::new(
        STANDARD
            .decode(encoded.trim())
            .map_err(|e| FilingError::InternalError(format!("stored secret is not valid base64: {e}")))?,
    );

    let text = std::str::from_utf8(&bytes).map_err(|_| {
        FilingError::InternalError("stored secret does not decode to UTF-8 text".to_string())
    })?;

    Ok(Zeroizing::new(text.to_owned()))
}

/// Resolves an owner's portal credentials from a [`CredentialStore`].
#[derive(Clone)]
pub struct CredentialResolver {
    store: Arc<dyn CredentialStore>,
}

impl CredentialResolver {
    /// Create a resolver over the given store.
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Fetch and decode the credentials for `owner_id`.
    ///
    /// # Errors
    /// `CredentialsMissing` when no entry exists, `InternalError` when the
    /// stored secret is malformed. Neither is worth retrying.
    pub async fn resolve(&self, owner_id: &OwnerId) -> Result<PortalCredentials> {
        let stored = self
            .store
            .fetch(owner_id)
            .await?
            .ok_or_else(|| FilingError::CredentialsMissing {
                owner_id: owner_id.to_string(),
            })?;

        let secret = decode_secret(&stored.encoded_secret)?;

        tracing::debug!(owner_id = %owner_id, "resolved portal credentials");
        Ok(PortalCredentials::new(stored.login_name, secret))
    }
}
