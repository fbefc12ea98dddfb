//! Credential bundle types
//!
//! The bundle is the only entity that outlives a job. Passwords are
//! sensitive: they exist decrypted in memory only while a job or probe
//! runs, and the status view never serializes them.

use serde::{Deserialize, Serialize};

/// Login for one external service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceAccount {
    pub url: String,
    pub username: String,
    pub password: String,
}

/// Full credentials bundle.
///
/// All three sections are required together; a bundle missing any of them
/// is treated as "not configured" at the API boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsBundle {
    /// Remote file-hosting service (login/upload API)
    pub remote_storage: ServiceAccount,
    /// Content-management system (draft post API)
    pub cms: ServiceAccount,
    /// Base URL prepended to `{year}/{filename}` for the public podcast URL
    pub public_base_url: String,
}

/// Passwords-stripped view of one account for the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ServiceAccountView {
    pub url: String,
    pub username: String,
}

impl From<&ServiceAccount> for ServiceAccountView {
    fn from(account: &ServiceAccount) -> Self {
        Self {
            url: account.url.clone(),
            username: account.username.clone(),
        }
    }
}

/// GET /credentials response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsStatus {
    pub configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_storage: Option<ServiceAccountView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cms: Option<ServiceAccountView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_base_url: Option<String>,
}

impl CredentialsStatus {
    pub fn not_configured() -> Self {
        Self {
            configured: false,
            remote_storage: None,
            cms: None,
            public_base_url: None,
        }
    }

    pub fn from_bundle(bundle: &CredentialsBundle) -> Self {
        Self {
            configured: true,
            remote_storage: Some((&bundle.remote_storage).into()),
            cms: Some((&bundle.cms).into()),
            public_base_url: Some(bundle.public_base_url.clone()),
        }
    }
}
