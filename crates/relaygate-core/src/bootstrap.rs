//! Startup wiring: resolves the data directory and per-entry timeout from
//! flags/env, loads the account store, and builds `AppState`.

use std::path::PathBuf;

use crate::config::{entry_timeout, resolve_data_dir};
use crate::state::AppState;

pub struct Bootstrap {
    pub state: AppState,
}

pub async fn bootstrap(data_dir_override: Option<PathBuf>) -> anyhow::Result<Bootstrap> {
    let data_dir = resolve_data_dir(data_dir_override)?;
    tokio::fs::create_dir_all(&data_dir).await?;
    let timeout = entry_timeout();
    let state = AppState::load(data_dir, timeout).await?;
    Ok(Bootstrap { state })
}
