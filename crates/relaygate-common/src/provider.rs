use std::fmt;

/// The closed set of upstream providers this proxy dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Antigravity,
    Codex,
    Copilot,
}

impl ProviderId {
    pub const ALL: [ProviderId; 3] = [ProviderId::Antigravity, ProviderId::Codex, ProviderId::Copilot];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Antigravity => "antigravity",
            ProviderId::Codex => "codex",
            ProviderId::Copilot => "copilot",
        }
    }

    pub fn parse(s: &str) -> Option<ProviderId> {
        match s {
            "antigravity" => Some(ProviderId::Antigravity),
            "codex" => Some(ProviderId::Codex),
            "copilot" => Some(ProviderId::Copilot),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
