//! Supervisor portal credential storage.
//!
//! Each supervisor has at most one entry. The secret is stored base64-encoded
//! exactly as the producer wrote it; decoding happens in the filing layer.

use serde::{Deserialize, Serialize};
use sqlx::{Pool, Row, Sqlite};
use supervisao_core::{OwnerId, Timestamp};

/// A stored credential entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialEntry {
    /// Supervisor the credentials belong to
    pub owner_id: String,
    /// Portal login name
    pub login_name: String,
    /// Base64 of the portal secret
    pub encoded_secret: String,
    /// Last time the entry was written
    pub updated_at: Timestamp,
}

/// Get the credential entry for a supervisor.
///
/// # Errors
/// Returns `sqlx::Error` if the query fails.
pub async fn get_credentials(
    pool: &Pool<Sqlite>,
    owner_id: &OwnerId,
) -> Result<Option<CredentialEntry>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT owner_id, login_name, encoded_secret, updated_at
         FROM supervisor_credentials WHERE owner_id = ?",
    )
    .bind(owner_id.as_str())
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let updated_at_str: String = row.get("updated_at");
    let updated_at =
        Timestamp::from_rfc3339(&updated_at_str).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

    Ok(Some(CredentialEntry {
        owner_id: row.get("owner_id"),
        login_name: row.get("login_name"),
        encoded_secret: row.get("encoded_secret"),
        updated_at,
    }))
}

/// Create or replace the credential entry for a supervisor.
///
/// # Errors
/// Returns `sqlx::Error` if the write fails.
pub async fn upsert_credentials(
    pool: &Pool<Sqlite>,
    owner_id: &OwnerId,
    login_name: &str,
    encoded_secret: &str,
) -> Result<CredentialEntry, sqlx::Error> {
    let updated_at = Timestamp::now();

    sqlx::query(
        "INSERT INTO supervisor_credentials (owner_id, login_name, encoded_secret, updated_at)
         VALUES (?, ?, ?, ?)
         ON CONFLICT(owner_id) DO UPDATE SET
            login_name = excluded.login_name,
            encoded_secret = excluded.encoded_secret,
            updated_at = excluded.updated_at",
    )
    .bind(owner_id.as_str())
    .bind(login_name)
    .bind(encoded_secret)
    .bind(updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    tracing::debug!(owner_id = %owner_id, "stored portal credentials");

    Ok(CredentialEntry {
        owner_id: owner_id.as_str().to_string(),
        login_name: login_name.to_string(),
        encoded_secret: encoded_secret.to_string(),
        updated_at,
    })
}
