// Cloud account scope for a run, and its registry record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle a gateway resolves to real credentials. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialRef(String);

impl CredentialRef {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }
}

impl fmt::Debug for CredentialRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CredentialRef(<redacted>)")
    }
}

/// Account/region pair that scopes every gateway query. Immutable for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub account_id: String,
    pub region: String,
    pub credentials: CredentialRef,
}

impl Account {
    pub fn new(
        account_id: impl Into<String>,
        region: impl Into<String>,
        credentials: CredentialRef,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            region: region.into(),
            credentials,
        }
    }
}

/// Registry row (secrets live encrypted in the store, never here).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    pub id: i64,
    pub account_name: String,
    pub account_id: String,
    pub region: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub last_analysis_run: Option<DateTime<Utc>>,
}

impl AccountRecord {
    pub fn to_account(&self) -> Account {
        Account::new(
            self.account_id.clone(),
            self.region.clone(),
            CredentialRef::new(format!("account:{}", self.id)),
        )
    }
}

/// Registration payload.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    pub account_name: String,
    pub account_id: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
}

impl fmt::Debug for NewAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewAccount")
            .field("account_name", &self.account_name)
            .field("account_id", &self.account_id)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

/// Decrypted credentials, only handed to gateway construction.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credentials(<redacted>)")
    }
}
