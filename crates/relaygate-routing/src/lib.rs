//! Routing: `routing.json` persistence plus the flow/account-routing
//! resolver.

mod config;
mod error;
mod model;
mod resolver;

pub use config::{load, sanitize, save};
pub use error::{Error, Result};
pub use model::{
    AUTO_ACCOUNT, AccountRoute, AccountRouting, AccountRoutingEntry, Flow, ROUTING_DOCUMENT_VERSION,
    RoutingDocument, RoutingEntry,
};
pub use resolver::{ResolvedEntry, ResolvedRoute, resolve};
