//! The ambient HTTP surface, configuration, and wiring around the dispatch
//! core. Everything dispatch-relevant lives in
//! `relaygate-routing`/`relaygate-dispatch`/`relaygate-accounts`/
//! `relaygate-providers`; this crate only classifies inbound requests,
//! calls through, and re-encodes the result.

mod bootstrap;
mod config;
mod error;
mod handler;
mod logical;
mod router;
mod state;
mod wire;

pub use bootstrap::{Bootstrap, bootstrap};
pub use config::{codex_fallback_model, entry_timeout, resolve_data_dir};
pub use error::ProxyError;
pub use router::public_router;
pub use state::AppState;
