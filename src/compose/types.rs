use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// An outbound email, ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Destination settings for the email flow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Address of the scheduling service's email intake
    #[serde(default)]
    pub to: String,
    /// Where [`super::OutboxSender`] drops rendered messages; defaults under `.vts/`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outbox_dir: Option<PathBuf>,
    /// Send new tasks as soon as their file is saved (used by `vts watch`)
    #[serde(default)]
    pub auto_send_on_save: bool,
}

/// Translation table between two priority vocabularies.
///
/// Lookup tries the exact key first and then a case-insensitive match.
/// Values without an entry map to `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriorityMap(pub BTreeMap<String, String>);

impl PriorityMap {
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    /// Vault letters to the scheduler's levels.
    pub fn vault_to_remote() -> Self {
        Self::from_pairs(&[("A", "HIGH"), ("B", "MEDIUM"), ("C", "LOW"), ("D", "LOW")])
    }

    /// Scheduler levels back to vault letters.
    pub fn remote_to_vault() -> Self {
        Self::from_pairs(&[("HIGH", "A"), ("MEDIUM", "B"), ("LOW", "C"), ("NONE", "D")])
    }

    pub fn translate(&self, value: &str) -> Option<String> {
        self.0
            .get(value)
            .or_else(|| {
                self.0
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(value))
                    .map(|(_, v)| v)
            })
            .cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_translation() {
        let map = PriorityMap::vault_to_remote();
        assert_eq!(map.translate("A").as_deref(), Some("HIGH"));
        assert_eq!(map.translate("d").as_deref(), Some("LOW"));
        assert_eq!(map.translate("Z"), None);

        let back = PriorityMap::remote_to_vault();
        assert_eq!(back.translate("Medium").as_deref(), Some("B"));
    }

    #[test]
    fn test_priority_map_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            map: PriorityMap,
        }
        let wrapper: Wrapper = toml::from_str("[map]\nHighest = \"HIGH\"\nLow = \"LOW\"").unwrap();
        assert_eq!(wrapper.map.translate("highest").as_deref(), Some("HIGH"));
        assert_eq!(wrapper.map.0.len(), 2);
    }
}
