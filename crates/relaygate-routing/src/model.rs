//! The persisted routing document.

use chrono::{DateTime, Utc};
use relaygate_common::ProviderId;
use serde::{Deserialize, Serialize};

pub const ROUTING_DOCUMENT_VERSION: u32 = 2;

/// Sentinel `accountId` that expands at resolve time into every account of
/// the entry's provider supporting the entry's model.
pub const AUTO_ACCOUNT: &str = "auto";

/// One way to fulfill a request: `(provider, accountId, modelId)` plus a
/// stable id and an optional display label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingEntry {
    pub id: String,
    pub provider: ProviderId,
    pub account_id: String,
    pub model_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl RoutingEntry {
    /// An entry is usable iff both `accountId` and `modelId` are non-empty
    /// and the referenced model is currently visible for that provider.
    pub fn is_usable(&self, catalog: &dyn relaygate_providers::ModelCatalog) -> bool {
        !self.account_id.is_empty()
            && !self.model_id.is_empty()
            && catalog.is_visible(self.provider, &self.model_id)
    }

    pub fn is_auto(&self) -> bool {
        self.account_id == AUTO_ACCOUNT
    }
}

/// A named ordered list of entries, selected by logical model name
///.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flow {
    pub id: String,
    pub name: String,
    pub entries: Vec<RoutingEntry>,
}

/// One entry in a per-official-model account-routing row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRoutingEntry {
    pub id: String,
    pub provider: ProviderId,
    pub account_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_label: Option<String>,
}

impl AccountRoutingEntry {
    pub fn is_auto(&self) -> bool {
        self.account_id == AUTO_ACCOUNT
    }
}

/// One row of the account-routing table, keyed by an official model id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRoute {
    pub id: String,
    pub model_id: String,
    #[serde(default)]
    pub entries: Vec<AccountRoutingEntry>,
}

/// Per-official-model table used when the request names a provider-native
/// model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRouting {
    #[serde(default)]
    pub smart_switch: bool,
    #[serde(default)]
    pub routes: Vec<AccountRoute>,
}

impl Default for AccountRouting {
    fn default() -> Self {
        Self {
            smart_switch: true,
            routes: Vec::new(),
        }
    }
}

/// `<data-dir>/routing.json`, version 2.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDocument {
    pub version: u32,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_flow_id: Option<String>,
    #[serde(default)]
    pub flows: Vec<Flow>,
    #[serde(default)]
    pub account_routing: AccountRouting,
}

impl Default for RoutingDocument {
    fn default() -> Self {
        Self {
            version: ROUTING_DOCUMENT_VERSION,
            updated_at: Utc::now(),
            active_flow_id: None,
            flows: Vec::new(),
            account_routing: AccountRouting::default(),
        }
    }
}
