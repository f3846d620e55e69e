//! Per-account in-flight cap and a cancel-safe
//! release guard.

use relaygate_accounts::AccountManager;
use relaygate_common::ProviderId;

/// Default per-account concurrency cap: Antigravity's cookie-bound calls are
/// capped at 1; Codex and Copilot accept concurrent calls.
pub fn in_flight_cap(provider: ProviderId) -> Option<u32> {
    match provider {
        ProviderId::Antigravity => Some(1),
        ProviderId::Codex | ProviderId::Copilot => None,
    }
}

/// Releases an account's in-flight slot exactly once, even if the holding
/// task is cancelled mid-call: the normal path calls `release().await`
/// directly; if the guard is dropped first (the caller abandoned the
/// request), `Drop` spawns the release so the counter doesn't leak a
/// permanently-held slot.
pub struct InFlightGuard {
    manager: AccountManager,
    account_id: String,
    released: bool,
}

impl InFlightGuard {
    pub async fn acquire(manager: AccountManager, account_id: String) -> Self {
        manager.mark_in_flight(&account_id).await;
        Self {
            manager,
            account_id,
            released: false,
        }
    }

    pub async fn release(mut self) {
        self.manager.release_in_flight(&self.account_id).await;
        self.released = true;
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if !self.released {
            let manager = self.manager.clone();
            let account_id = std::mem::take(&mut self.account_id);
            tokio::spawn(async move {
                manager.release_in_flight(&account_id).await;
            });
        }
    }
}
