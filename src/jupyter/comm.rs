//! Custom-message comm registry.
//!
//! Comms are created by `comm_open`, updated by `comm_msg`, removed by
//! `comm_close`. The target index holds exactly the comms whose
//! `target_name` equals the key and disappears when it empties.

use std::collections::HashMap;

use serde_json::Value as JsonValue;

#[derive(Debug, Clone)]
pub struct Comm {
    pub comm_id: String,
    pub target_name: String,
    pub data: JsonValue,
}

#[derive(Debug, Default)]
pub struct CommRegistry {
    comms: HashMap<String, Comm>,
    /// target_name -> comm ids, in open order
    targets: HashMap<String, Vec<String>>,
}

impl CommRegistry {
    pub fn open(&mut self, comm_id: &str, target_name: &str, data: JsonValue) {
        if self.comms.contains_key(comm_id) {
            return;
        }
        self.comms.insert(
            comm_id.to_string(),
            Comm {
                comm_id: comm_id.to_string(),
                target_name: target_name.to_string(),
                data,
            },
        );
        self.targets
            .entry(target_name.to_string())
            .or_default()
            .push(comm_id.to_string());
    }

    pub fn update(&mut self, comm_id: &str, data: JsonValue) -> bool {
        match self.comms.get_mut(comm_id) {
            Some(comm) => {
                comm.data = data;
                true
            }
            None => false,
        }
    }

    pub fn close(&mut self, comm_id: &str) {
        let Some(comm) = self.comms.remove(comm_id) else {
            return;
        };
        if let Some(ids) = self.targets.get_mut(&comm.target_name) {
            ids.retain(|id| id != comm_id);
            if ids.is_empty() {
                self.targets.remove(&comm.target_name);
            }
        }
    }

    pub fn get(&self, comm_id: &str) -> Option<&Comm> {
        self.comms.get(comm_id)
    }

    pub fn has_target(&self, target_name: &str) -> bool {
        self.targets.contains_key(target_name)
    }

    pub fn by_target(&self, target_name: &str) -> Vec<&Comm> {
        self.targets
            .get(target_name)
            .map(|ids| ids.iter().filter_map(|id| self.comms.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn all(&self) -> impl Iterator<Item = &Comm> {
        self.comms.values()
    }

    pub fn len(&self) -> usize {
        self.comms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn open_update_close_lifecycle() {
        let mut registry = CommRegistry::default();
        registry.open("c1", "widget", json!({"a": 1}));
        assert_eq!(registry.len(), 1);
        assert!(registry.has_target("widget"));

        assert!(registry.update("c1", json!({"a": 2})));
        assert_eq!(registry.get("c1").unwrap().data, json!({"a": 2}));

        registry.close("c1");
        assert!(registry.is_empty());
        assert!(!registry.has_target("widget"));
    }

    #[test]
    fn target_index_tracks_membership_in_order() {
        let mut registry = CommRegistry::default();
        registry.open("c1", "widget", json!({}));
        registry.open("c2", "widget", json!({}));
        registry.open("c3", "other", json!({}));

        let ids: Vec<&str> = registry
            .by_target("widget")
            .iter()
            .map(|c| c.comm_id.as_str())
            .collect();
        assert_eq!(ids, vec!["c1", "c2"]);

        registry.close("c1");
        assert!(registry.has_target("widget"));
        registry.close("c2");
        assert!(!registry.has_target("widget"));
        assert!(registry.has_target("other"));
    }

    #[test]
    fn duplicate_open_is_ignored() {
        let mut registry = CommRegistry::default();
        registry.open("c1", "widget", json!({"v": 1}));
        registry.open("c1", "widget", json!({"v": 2}));
        assert_eq!(registry.get("c1").unwrap().data, json!({"v": 1}));
        assert_eq!(registry.by_target("widget").len(), 1);
    }

    #[test]
    fn closing_unknown_comm_is_a_no_op() {
        let mut registry = CommRegistry::default();
        registry.close("ghost");
        assert!(!registry.update("ghost", json!({})));
    }
}
