//! The sticky-head cursor.
//!
//! One map, `flowKey -> last-good index`, behind a single `RwLock` rather
//! than an `ArcSwap` snapshot — the map is mutated per-key, not replaced
//! wholesale, so a keyed lock fits better than a swapped snapshot.

use std::collections::HashMap;

use tokio::sync::RwLock;

#[derive(Default)]
pub struct StickyCursors {
    by_flow: RwLock<HashMap<String, usize>>,
}

impl StickyCursors {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, flow_key: &str) -> Option<usize> {
        self.by_flow.read().await.get(flow_key).copied()
    }

    pub async fn set(&self, flow_key: &str, index: usize) {
        self.by_flow.write().await.insert(flow_key.to_string(), index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unset_flow_has_no_cursor() {
        let cursors = StickyCursors::new();
        assert_eq!(cursors.get("flow-a").await, None);
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cursors = StickyCursors::new();
        cursors.set("flow-a", 2).await;
        assert_eq!(cursors.get("flow-a").await, Some(2));
    }
}
