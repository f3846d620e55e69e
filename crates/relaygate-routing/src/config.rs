//! Routing config loading, sanitizing, and atomic persistence.
//!
//! The loader is invoked on each read so changes take effect by the next
//! request; there is no in-process cache here — `relaygate-core` decides
//! how often to call it.

use std::path::{Path, PathBuf};

use chrono::Utc;
use relaygate_providers::ModelCatalog;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::model::RoutingDocument;

fn routing_path(data_dir: &Path) -> PathBuf {
    data_dir.join("routing.json")
}

/// Loads `<data_dir>/routing.json`, or an empty default document if the file
/// doesn't exist yet, then sanitizes it against the live catalog.
pub async fn load(data_dir: &Path, catalog: &dyn ModelCatalog) -> Result<RoutingDocument> {
    let path = routing_path(data_dir);
    let document = match tokio::fs::read_to_string(&path).await {
        Ok(contents) => serde_json::from_str(&contents)?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => RoutingDocument::default(),
        Err(err) => return Err(err.into()),
    };

    Ok(sanitize(document, catalog))
}

/// Atomically persists `document` via write-then-rename.
pub async fn save(data_dir: &Path, mut document: RoutingDocument) -> Result<()> {
    document.updated_at = Utc::now();
    tokio::fs::create_dir_all(data_dir).await?;
    let path = routing_path(data_dir);
    let tmp_path = data_dir.join(format!(".routing.json.tmp.{}", std::process::id()));
    let json = serde_json::to_string_pretty(&document)?;
    tokio::fs::write(&tmp_path, json.as_bytes()).await?;
    tokio::fs::rename(&tmp_path, &path).await?;
    debug!(path = %path.display(), "persisted routing config");
    Ok(())
}

/// Drops flow entries that reference a hidden model, drops flows left with
/// zero usable entries, and clears `active_flow_id` if it pointed at a
/// dropped flow.
pub fn sanitize(mut document: RoutingDocument, catalog: &dyn ModelCatalog) -> RoutingDocument {
    let before = document.flows.len();
    document.flows.retain_mut(|flow| {
        flow.entries.retain(|entry| entry.is_usable(catalog));
        !flow.entries.is_empty()
    });

    if before != document.flows.len() {
        warn!(
            dropped = before - document.flows.len(),
            "dropped flows referencing hidden or unusable models"
        );
    }

    if let Some(active) = &document.active_flow_id
        && !document.flows.iter().any(|f| &f.id == active)
    {
        info!(flow_id = %active, "cleared active_flow_id pointing at a dropped flow");
        document.active_flow_id = None;
    }

    document
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Flow, RoutingEntry};
    use relaygate_common::ProviderId;
    use relaygate_providers::StaticCatalog;

    fn entry(provider: ProviderId, account: &str, model: &str) -> RoutingEntry {
        RoutingEntry {
            id: format!("{provider}-{account}-{model}"),
            provider,
            account_id: account.to_string(),
            model_id: model.to_string(),
            label: None,
        }
    }

    #[tokio::test]
    async fn missing_file_loads_empty_default() {
        let dir = tempfile::tempdir().unwrap();
        let document = load(dir.path(), &StaticCatalog).await.unwrap();
        assert!(document.flows.is_empty());
        assert_eq!(document.version, crate::model::ROUTING_DOCUMENT_VERSION);
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut document = RoutingDocument::default();
        document.flows.push(Flow {
            id: "flow-1".into(),
            name: "my-flow".into(),
            entries: vec![entry(ProviderId::Codex, "acct-1", "gpt-5")],
        });
        save(dir.path(), document).await.unwrap();

        let reloaded = load(dir.path(), &StaticCatalog).await.unwrap();
        assert_eq!(reloaded.flows.len(), 1);
        assert_eq!(reloaded.flows[0].name, "my-flow");
    }

    #[test]
    fn hidden_model_purge_drops_flow_and_clears_active_flow_id() {
        let mut document = RoutingDocument::default();
        document.active_flow_id = Some("flow-hidden".into());
        document.flows.push(Flow {
            id: "flow-hidden".into(),
            name: "flow-hidden".into(),
            entries: vec![entry(ProviderId::Codex, "acct-1", "gpt-5-codex-preview")],
        });

        let sanitized = sanitize(document, &StaticCatalog);
        assert!(sanitized.flows.is_empty());
        assert!(sanitized.active_flow_id.is_none());
    }

    #[test]
    fn flow_with_mixed_usable_and_hidden_entries_keeps_only_usable() {
        let mut document = RoutingDocument::default();
        document.flows.push(Flow {
            id: "flow-1".into(),
            name: "flow-1".into(),
            entries: vec![
                entry(ProviderId::Codex, "acct-1", "gpt-5"),
                entry(ProviderId::Codex, "acct-2", "gpt-5-codex-preview"),
            ],
        });

        let sanitized = sanitize(document, &StaticCatalog);
        assert_eq!(sanitized.flows.len(), 1);
        assert_eq!(sanitized.flows[0].entries.len(), 1);
        assert_eq!(sanitized.flows[0].entries[0].model_id, "gpt-5");
    }

    #[test]
    fn entry_with_empty_account_id_is_not_usable() {
        let entry = RoutingEntry {
            id: "e1".into(),
            provider: ProviderId::Codex,
            account_id: String::new(),
            model_id: "gpt-5".into(),
            label: None,
        };
        assert!(!entry.is_usable(&StaticCatalog));
    }

    #[test]
    fn auto_entry_is_usable_when_model_visible() {
        let entry = entry(ProviderId::Codex, "auto", "gpt-5");
        assert!(entry.is_usable(&StaticCatalog));
        assert!(entry.is_auto());
    }
}
