//! Per-identity compliance state for every configured PPE item.

use std::collections::HashMap;
use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::compliance::state::{ComplianceState, RawObservation};

/// One frame's verifier output for a single identity, keyed by item name.
///
/// Items missing from the map count as `Unknown`; names that are not
/// configured are ignored.
pub type Observations = HashMap<String, RawObservation>;

/// Compliance states of one identity, in configured item order.
///
/// The item list is shared between all identities; the states are owned.
#[derive(Debug, Clone, PartialEq)]
pub struct PpeStates {
    items: Arc<[String]>,
    states: Vec<ComplianceState>,
}

impl PpeStates {
    /// Every item starts `Unknown`.
    pub fn new(items: Arc<[String]>) -> Self {
        let states = vec![ComplianceState::Unknown; items.len()];
        Self { items, states }
    }

    /// Advance every item's state machine with this frame's observations.
    pub fn apply(&mut self, observations: &Observations) {
        for (item, state) in self.items.iter().zip(self.states.iter_mut()) {
            let observed = observations.get(item).copied().unwrap_or_default();
            *state = state.next(observed);
        }
    }

    pub fn get(&self, item: &str) -> Option<ComplianceState> {
        self.items
            .iter()
            .position(|name| name == item)
            .map(|idx| self.states[idx])
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ComplianceState)> {
        self.items
            .iter()
            .map(String::as_str)
            .zip(self.states.iter().copied())
    }

    /// Overwrite states from another identity's record over the same items.
    pub(crate) fn copy_from(&mut self, other: &PpeStates) {
        debug_assert_eq!(self.items, other.items);
        self.states.copy_from_slice(&other.states);
    }
}

// Serialized as a map so the report keeps the configured item order.
impl Serialize for PpeStates {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.states.len()))?;
        for (item, state) in self.iter() {
            map.serialize_entry(item, &state)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items() -> Arc<[String]> {
        ["helmet", "uniform", "glasses"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn obs(pairs: &[(&str, RawObservation)]) -> Observations {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_starts_unknown() {
        let ppe = PpeStates::new(items());
        assert!(ppe.iter().all(|(_, s)| s == ComplianceState::Unknown));
    }

    #[test]
    fn test_missing_items_are_unknown_and_extra_items_ignored() {
        let mut ppe = PpeStates::new(items());
        ppe.apply(&obs(&[
            ("helmet", RawObservation::Compliant),
            ("uniform", RawObservation::NonCompliant),
        ]));
        ppe.apply(&obs(&[("boots", RawObservation::Compliant)]));

        assert_eq!(ppe.get("helmet"), Some(ComplianceState::Compliant));
        assert_eq!(ppe.get("uniform"), Some(ComplianceState::NonCompliant));
        assert_eq!(ppe.get("glasses"), Some(ComplianceState::Unknown));
        assert_eq!(ppe.get("boots"), None);
    }

    #[test]
    fn test_serializes_in_configured_order() {
        let mut ppe = PpeStates::new(
            ["uniform", "helmet"].into_iter().map(String::from).collect(),
        );
        ppe.apply(&obs(&[("helmet", RawObservation::NonCompliant)]));

        let json = serde_json::to_string(&ppe).unwrap();
        assert_eq!(json, r#"{"uniform":"UNKNOWN","helmet":"NON_COMPLIANT"}"#);
    }
}
