//! The persisted account store.
//!
//! Persistence is one JSON shard per `(provider, account_id)` under
//! `<data-dir>/auth/<provider>/<account-id>.json`, written atomically
//! (temp file + rename) the way `gproxy-storage`'s snapshot writer does.
//! Runtime state (cooldowns, in-flight counts) lives in a separate
//! `RwLock`-guarded map that is never written to disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use relaygate_common::{ProviderId, RateLimitReason};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::account::{Account, AccountSummary};
use crate::error::{Error, Result};
use crate::runtime::RuntimeState;

type AccountKey = (ProviderId, String);

/// Classifies a rate-limit reason from the upstream status/body.
pub fn classify_rate_limit_reason(status: u16, body: &str) -> RateLimitReason {
    match status {
        401 | 403 => RateLimitReason::Unauthorized,
        429 => {
            let lower = body.to_lowercase();
            if lower.contains("resource_exhausted") || lower.contains("quota") {
                RateLimitReason::QuotaExhausted
            } else {
                RateLimitReason::RateLimited
            }
        }
        500..=599 => RateLimitReason::ServerError,
        _ => RateLimitReason::Other,
    }
}

/// Computes the effective cooldown for a rate-limit event: a parseable
/// upstream delay wins (buffered by 500ms, capped at 30s only for 429),
/// else the reason's default cooldown.
fn effective_cooldown(
    status: u16,
    body: &str,
    retry_after_header: Option<&str>,
    reason: RateLimitReason,
) -> Duration {
    if let Some(delay) = relaygate_retry::parse_retry_delay(body, retry_after_header) {
        let buffered = delay + Duration::from_millis(500);
        return if status == 429 { buffered.min(Duration::from_secs(30)) } else { buffered };
    }
    reason.default_cooldown()
}

pub struct AccountStore {
    data_dir: PathBuf,
    accounts: RwLock<HashMap<AccountKey, Account>>,
    runtime: RwLock<HashMap<AccountKey, RuntimeState>>,
}

impl AccountStore {
    /// Loads every account shard found under `<data_dir>/auth/<provider>/`.
    /// Missing directories are treated as zero accounts for that provider,
    /// not an error — a fresh install has no accounts yet.
    pub async fn load(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        let mut accounts = HashMap::new();

        for provider in ProviderId::ALL {
            let dir = provider_dir(&data_dir, provider);
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => {
                    return Err(Error::Io {
                        account_id: dir.display().to_string(),
                        source: err,
                    });
                }
            };

            while let Some(entry) = entries.next_entry().await.map_err(|err| Error::Io {
                account_id: dir.display().to_string(),
                source: err,
            })? {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                let contents = tokio::fs::read_to_string(&path)
                    .await
                    .map_err(|err| Error::Io {
                        account_id: path.display().to_string(),
                        source: err,
                    })?;
                let account: Account = serde_json::from_str(&contents).map_err(|err| Error::Corrupt {
                    path: path.display().to_string(),
                    source: err,
                })?;
                accounts.insert((provider, account.id.clone()), account);
            }
        }

        info!(accounts = accounts.len(), path = %data_dir.display(), "loaded account store");

        Ok(Self {
            data_dir,
            accounts: RwLock::new(accounts),
            runtime: RwLock::new(HashMap::new()),
        })
    }

    /// Atomic write-then-rename of one account shard, then updates the
    /// in-memory copy. Emits no events — callers (dispatch, admin) decide
    /// whether a save is log-worthy.
    pub async fn save_account(&self, provider: ProviderId, mut account: Account) -> Result<()> {
        account.touch();
        let path = account_path(&self.data_dir, provider, &account.id);
        write_atomic(&path, &account).await?;

        self.accounts
            .write()
            .await
            .insert((provider, account.id.clone()), account);
        Ok(())
    }

    pub async fn get_account(&self, provider: ProviderId, id: &str) -> Option<Account> {
        self.accounts
            .read()
            .await
            .get(&(provider, id.to_string()))
            .cloned()
    }

    /// Accounts for a provider, in creation order.
    pub async fn list_accounts(&self, provider: ProviderId) -> Vec<Account> {
        let mut accounts: Vec<Account> = self
            .accounts
            .read()
            .await
            .iter()
            .filter(|((p, _), _)| *p == provider)
            .map(|(_, account)| account.clone())
            .collect();
        accounts.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        accounts
    }

    pub async fn list_summaries(&self, provider: ProviderId) -> Vec<AccountSummary> {
        self.list_accounts(provider)
            .await
            .iter()
            .map(AccountSummary::from)
            .collect()
    }

    pub async fn remove_account(&self, provider: ProviderId, id: &str) -> Result<()> {
        let path = account_path(&self.data_dir, provider, id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(Error::Io {
                    account_id: id.to_string(),
                    source: err,
                });
            }
        }
        self.accounts.write().await.remove(&(provider, id.to_string()));
        self.runtime.write().await.remove(&(provider, id.to_string()));
        Ok(())
    }

    /// Records a rate-limit event and returns the effective cooldown, for
    /// the caller to log.
    pub async fn mark_rate_limited(
        &self,
        provider: ProviderId,
        id: &str,
        status: u16,
        body: &str,
        retry_after_header: Option<&str>,
    ) -> Duration {
        let reason = classify_rate_limit_reason(status, body);
        let cooldown = effective_cooldown(status, body, retry_after_header, reason);
        let mut runtime = self.runtime.write().await;
        runtime
            .entry((provider, id.to_string()))
            .or_default()
            .mark_rate_limited(Instant::now(), cooldown, reason);
        warn!(
            provider = %provider,
            account_id = id,
            status,
            reason = ?reason,
            cooldown_ms = cooldown.as_millis() as u64,
            "account rate limited"
        );
        cooldown
    }

    pub async fn mark_success(&self, provider: ProviderId, id: &str) {
        let mut runtime = self.runtime.write().await;
        runtime
            .entry((provider, id.to_string()))
            .or_default()
            .mark_success(Instant::now());
    }

    /// A non-auth, non-rate-limit 4xx: the account answered, so it's
    /// healthy and any lingering cooldown no longer applies.
    pub async fn mark_success_from_error(&self, provider: ProviderId, id: &str) {
        self.mark_success(provider, id).await;
    }

    pub async fn is_rate_limited(&self, provider: ProviderId, id: &str) -> bool {
        self.runtime
            .read()
            .await
            .get(&(provider, id.to_string()))
            .is_some_and(|state| state.is_rate_limited(Instant::now()))
    }

    pub async fn in_flight(&self, provider: ProviderId, id: &str) -> u32 {
        self.runtime
            .read()
            .await
            .get(&(provider, id.to_string()))
            .map(|state| state.in_flight())
            .unwrap_or(0)
    }

    pub async fn mark_in_flight(&self, provider: ProviderId, id: &str) {
        self.runtime
            .write()
            .await
            .entry((provider, id.to_string()))
            .or_default()
            .mark_in_flight();
    }

    pub async fn release_in_flight(&self, provider: ProviderId, id: &str) {
        if let Some(state) = self.runtime.write().await.get_mut(&(provider, id.to_string())) {
            state.release_in_flight();
        }
    }
}

fn provider_dir(data_dir: &Path, provider: ProviderId) -> PathBuf {
    data_dir.join("auth").join(provider.as_str())
}

fn account_path(data_dir: &Path, provider: ProviderId, id: &str) -> PathBuf {
    provider_dir(data_dir, provider).join(format!("{id}.json"))
}

async fn write_atomic(path: &Path, account: &Account) -> Result<()> {
    let dir = path.parent().expect("account path always has a parent");
    tokio::fs::create_dir_all(dir).await.map_err(|err| Error::Io {
        account_id: account.id.clone(),
        source: err,
    })?;

    let json = serde_json::to_string_pretty(account).expect("account always serializes");
    let tmp_path = dir.join(format!(".{}.tmp.{}", account.id, std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|err| Error::Io {
            account_id: account.id.clone(),
            source: err,
        })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|err| Error::Io {
                account_id: account.id.clone(),
                source: err,
            })?;
    }

    tokio::fs::rename(&tmp_path, path).await.map_err(|err| Error::Io {
        account_id: account.id.clone(),
        source: err,
    })?;

    debug!(path = %path.display(), "persisted account");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_account(id: &str) -> Account {
        Account::new(id, "at-token")
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = AccountStore::load(dir.path()).await.unwrap();
        store
            .save_account(ProviderId::Codex, test_account("acct-1"))
            .await
            .unwrap();

        let reloaded = AccountStore::load(dir.path()).await.unwrap();
        let got = reloaded.get_account(ProviderId::Codex, "acct-1").await;
        assert!(got.is_some());
    }

    #[tokio::test]
    async fn missing_data_dir_is_zero_accounts_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist-yet");
        let store = AccountStore::load(&missing).await.unwrap();
        assert!(store.list_accounts(ProviderId::Copilot).await.is_empty());
    }

    #[tokio::test]
    async fn list_accounts_is_creation_ordered() {
        let dir = tempfile::tempdir().unwrap();
        let store = AccountStore::load(dir.path()).await.unwrap();
        let mut first = test_account("first");
        first.created_at -= chrono::Duration::seconds(10);
        let second = test_account("second");
        store.save_account(ProviderId::Antigravity, second).await.unwrap();
        store.save_account(ProviderId::Antigravity, first).await.unwrap();

        let accounts = store.list_accounts(ProviderId::Antigravity).await;
        assert_eq!(accounts[0].id, "first");
        assert_eq!(accounts[1].id, "second");
    }

    #[tokio::test]
    async fn mark_rate_limited_then_is_rate_limited_until_cooldown_elapses() {
        let dir = tempfile::tempdir().unwrap();
        let store = AccountStore::load(dir.path()).await.unwrap();
        store
            .save_account(ProviderId::Codex, test_account("acct-1"))
            .await
            .unwrap();

        let cooldown = store
            .mark_rate_limited(ProviderId::Codex, "acct-1", 429, "{}", None)
            .await;
        assert_eq!(cooldown, Duration::from_secs(60));
        assert!(store.is_rate_limited(ProviderId::Codex, "acct-1").await);
    }

    #[tokio::test]
    async fn mark_success_clears_rate_limit() {
        let dir = tempfile::tempdir().unwrap();
        let store = AccountStore::load(dir.path()).await.unwrap();
        store
            .save_account(ProviderId::Codex, test_account("acct-1"))
            .await
            .unwrap();
        store
            .mark_rate_limited(ProviderId::Codex, "acct-1", 500, "", None)
            .await;
        store.mark_success(ProviderId::Codex, "acct-1").await;
        assert!(!store.is_rate_limited(ProviderId::Codex, "acct-1").await);
    }

    #[tokio::test]
    async fn in_flight_counter_tracks_dispatch_holds() {
        let dir = tempfile::tempdir().unwrap();
        let store = AccountStore::load(dir.path()).await.unwrap();
        store.mark_in_flight(ProviderId::Copilot, "acct-1").await;
        store.mark_in_flight(ProviderId::Copilot, "acct-1").await;
        assert_eq!(store.in_flight(ProviderId::Copilot, "acct-1").await, 2);
        store.release_in_flight(ProviderId::Copilot, "acct-1").await;
        assert_eq!(store.in_flight(ProviderId::Copilot, "acct-1").await, 1);
    }

    #[tokio::test]
    async fn quota_exhausted_body_gets_ten_minute_default_cooldown() {
        let dir = tempfile::tempdir().unwrap();
        let store = AccountStore::load(dir.path()).await.unwrap();
        let cooldown = store
            .mark_rate_limited(
                ProviderId::Antigravity,
                "acct-1",
                429,
                r#"{"error":"quota exceeded"}"#,
                None,
            )
            .await;
        assert_eq!(cooldown, Duration::from_secs(600));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn account_shard_is_0600() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let store = AccountStore::load(dir.path()).await.unwrap();
        store
            .save_account(ProviderId::Codex, test_account("acct-1"))
            .await
            .unwrap();
        let path = account_path(dir.path(), ProviderId::Codex, "acct-1");
        let mode = tokio::fs::metadata(&path).await.unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}
