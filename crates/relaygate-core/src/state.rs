//! Process-wide shared state.
//!
//! The routing document itself is *not* cached here — the loader is cheap
//! enough to invoke on each read, so changes to `routing.json` take effect
//! on the very next request without a restart.
//! Everything else (accounts, dispatch engine, provider registry) is wired
//! once at startup and shared behind `Arc`.

use std::path::PathBuf;
use std::sync::Arc;

use relaygate_accounts::{AccountManagers, AccountStore};
use relaygate_dispatch::DispatchEngine;
use relaygate_providers::{ModelCatalog, ProviderRegistry, StaticCatalog};

pub struct AppState {
    pub data_dir: PathBuf,
    pub store: Arc<AccountStore>,
    pub accounts: AccountManagers,
    pub registry: ProviderRegistry,
    pub catalog: StaticCatalog,
    pub dispatch: Arc<DispatchEngine>,
}

impl AppState {
    pub async fn load(data_dir: PathBuf, entry_timeout: std::time::Duration) -> anyhow::Result<Self> {
        let store = Arc::new(AccountStore::load(&data_dir).await?);
        let accounts = AccountManagers::new(store.clone());
        let registry = ProviderRegistry::with_builtin_adapters();
        let dispatch = Arc::new(DispatchEngine::new(registry.clone(), accounts.clone(), entry_timeout));

        Ok(Self {
            data_dir,
            store,
            accounts,
            registry,
            catalog: StaticCatalog,
            dispatch,
        })
    }

    pub async fn routing_document(&self) -> anyhow::Result<relaygate_routing::RoutingDocument> {
        Ok(relaygate_routing::load(&self.data_dir, &self.catalog as &dyn ModelCatalog).await?)
    }
}
