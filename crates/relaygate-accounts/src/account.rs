//! The persisted account record.

use chrono::{DateTime, Utc};
use relaygate_common::{Secret, fingerprint};
use serde::{Deserialize, Serialize};

/// An identified credential bundle for exactly one provider.
///
/// `id` is opaque and unique only within its provider's namespace — the
/// same literal id may exist under two different providers without
/// colliding, since accounts are always addressed as `(provider, id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    pub access_token: Secret<String>,
    #[serde(default)]
    pub refresh_token: Option<Secret<String>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub project_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn new(id: impl Into<String>, access_token: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            email: None,
            login: None,
            label: None,
            access_token: Secret::new(access_token.into()),
            refresh_token: None,
            expires_at: None,
            project_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// A redacted view of an account, safe to hand to the (out-of-core)
/// dashboard: tokens are collapsed to a fingerprint, never the raw value.
#[derive(Debug, Clone, Serialize)]
pub struct AccountSummary {
    pub id: String,
    pub email: Option<String>,
    pub login: Option<String>,
    pub label: Option<String>,
    pub access_token_fingerprint: String,
    pub has_refresh_token: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub project_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Account> for AccountSummary {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.clone(),
            email: account.email.clone(),
            login: account.login.clone(),
            label: account.label.clone(),
            access_token_fingerprint: fingerprint(account.access_token.expose()),
            has_refresh_token: account.refresh_token.is_some(),
            expires_at: account.expires_at,
            project_id: account.project_id.clone(),
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_redacts_tokens() {
        let account = Account::new("acct-1", "sk-ant-0123456789abcdef");
        let summary = AccountSummary::from(&account);
        assert_eq!(summary.access_token_fingerprint, "sk-a…cdef");
        assert!(!summary.has_refresh_token);
    }
}
