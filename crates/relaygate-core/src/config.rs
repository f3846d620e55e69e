//! Process-level configuration: data-dir resolution, the Codex fallback
//! model, and the per-entry request timeout override, each read from an
//! environment variable with a CLI flag able to take precedence.

use std::path::PathBuf;
use std::time::Duration;

use relaygate_dispatch::DEFAULT_ENTRY_TIMEOUT;

const DATA_DIR_ENV: &str = "RELAYGATE_DATA_DIR";
const TIMEOUT_ENV: &str = "RELAYGATE_REQUEST_TIMEOUT_MS";
const CODEX_FALLBACK_ENV: &str = "CODEX_FALLBACK_MODEL";
const DEFAULT_CODEX_FALLBACK_MODEL: &str = "gpt-5";

/// Resolves the data directory: an explicit override first, else
/// `RELAYGATE_DATA_DIR` if set, else `$HOME/.relaygate`
/// (`$USERPROFILE` on Windows).
pub fn resolve_data_dir(override_dir: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    if let Some(dir) = override_dir {
        return Ok(dir);
    }
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }

    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("neither HOME nor USERPROFILE is set; pass --data-dir explicitly"))?;
    Ok(PathBuf::from(home).join(".relaygate"))
}

/// The model substituted when a request names no upstream model at all,
/// overridable via `CODEX_FALLBACK_MODEL` (default `gpt-5`).
pub fn codex_fallback_model() -> String {
    std::env::var(CODEX_FALLBACK_ENV).unwrap_or_else(|_| DEFAULT_CODEX_FALLBACK_MODEL.to_string())
}

/// Per-entry adapter-call timeout. Defaults to
/// `relaygate_dispatch::DEFAULT_ENTRY_TIMEOUT`, overridable via
/// `RELAYGATE_REQUEST_TIMEOUT_MS`.
pub fn entry_timeout() -> Duration {
    match std::env::var(TIMEOUT_ENV) {
        Ok(raw) => match raw.trim().parse::<u64>() {
            Ok(ms) if ms > 0 => Duration::from_millis(ms),
            _ => DEFAULT_ENTRY_TIMEOUT,
        },
        Err(_) => DEFAULT_ENTRY_TIMEOUT,
    }
}
