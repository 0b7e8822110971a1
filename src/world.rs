/*!
 * World synchronization: reconcile remote villages and discover world features
 */

use crate::config::document::{ConfigDocument, FeatureState, WorldFlag, SECTION_BOT, SECTION_WORLD};
use crate::config::ConfigStore;
use crate::remote::{PageExtractor, Transport, TransportError, OVERVIEW_PATH};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of one reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    /// Villages present remotely; `None` when discovery is disabled and every
    /// configured village counts as present
    pub known_ids: Option<HashSet<String>>,

    /// Raw overview page from the last fetch
    pub overview: String,

    /// Number of overview fetches it took to converge
    pub fetches: usize,
}

pub struct WorldSync {
    transport: Arc<dyn Transport>,
    extractor: Arc<dyn PageExtractor>,
}

impl WorldSync {
    pub fn new(transport: Arc<dyn Transport>, extractor: Arc<dyn PageExtractor>) -> Self {
        Self {
            transport,
            extractor,
        }
    }

    /// Fetch the overview and add config entries for unknown villages.
    ///
    /// With `bot.add_new_villages` off this is a single fetch. Otherwise the
    /// overview is fetched again after every pass that added a village, until
    /// a pass adds nothing. Each such pass grows the village map and nothing
    /// is ever removed, so the loop ends once every remote id is configured.
    pub fn reconcile(
        &self,
        store: &mut ConfigStore,
        doc: &mut ConfigDocument,
    ) -> Result<Reconciled, TransportError> {
        let mut fetches = 0;
        loop {
            let overview = self.transport.get(OVERVIEW_PATH)?;
            fetches += 1;

            if !doc.get_bool(SECTION_BOT, "add_new_villages", false) {
                return Ok(Reconciled {
                    known_ids: None,
                    overview,
                    fetches,
                });
            }

            let ids = self.extractor.village_ids(&overview);
            let mut has_new = false;
            for id in &ids {
                if doc.has_village(id) {
                    continue;
                }
                info!(
                    village = %id,
                    "Village was found but no config entry was found. Adding automatically"
                );
                has_new |= store.add_entity(doc, id, None);
            }

            if !has_new {
                return Ok(Reconciled {
                    known_ids: Some(ids.into_iter().collect()),
                    overview,
                    fetches,
                });
            }
            debug!(fetches, "New villages added, fetching overview again");
        }
    }
}

/// Settle every still-unknown world flag from the overview markup.
///
/// Known flags are never touched. Returns whether any flag left `Unknown`.
pub fn discover_world_flags(overview: &str, doc: &mut ConfigDocument) -> bool {
    let mut changed = false;
    for flag in WorldFlag::ALL {
        if doc.world_flag(flag).is_known() {
            continue;
        }
        if let Some(raw) = doc.get(SECTION_WORLD, flag.key()).filter(|v| !v.is_null()) {
            warn!(
                flag = flag.key(),
                value = %raw,
                "World option is not true/false/null, replacing it with the discovered value"
            );
        }
        let state = FeatureState::from_presence(overview.contains(flag.marker()));
        debug!(flag = flag.key(), ?state, "Discovered world option");
        doc.set_world_flag(flag, state);
        changed = true;
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MemoryStorage, Slot};
    use crate::remote::MarkupExtractor;
    use serde_json::json;
    use std::sync::Mutex;

    /// Serves overview pages in order, repeating the last one
    struct ScriptedTransport {
        pages: Mutex<Vec<String>>,
        calls: Mutex<usize>,
    }

    impl ScriptedTransport {
        fn new(pages: Vec<String>) -> Self {
            Self {
                pages: Mutex::new(pages),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    impl Transport for ScriptedTransport {
        fn get(&self, path: &str) -> Result<String, TransportError> {
            assert_eq!(path, OVERVIEW_PATH);
            *self.calls.lock().unwrap() += 1;
            let mut pages = self.pages.lock().unwrap();
            if pages.len() > 1 {
                Ok(pages.remove(0))
            } else {
                pages
                    .first()
                    .cloned()
                    .ok_or_else(|| TransportError::Network("no page".to_string()))
            }
        }
    }

    fn overview(ids: &[&str]) -> String {
        ids.iter()
            .map(|id| format!(r#"<span class="quickedit-vn" data-id="{}">v</span>"#, id))
            .collect()
    }

    fn document(add_new: bool) -> ConfigDocument {
        ConfigDocument::from_json(&format!(
            r#"{{
                "build": {{"version": "1"}},
                "bot": {{"add_new_villages": {}}},
                "world": {{"flags_enabled": null, "knight_enabled": null,
                          "boosters_enabled": null, "quests_enabled": null}},
                "villages": {{"1": {{"managed": true}}}},
                "village_template": {{"managed": false}}
            }}"#,
            add_new
        ))
        .unwrap()
    }

    #[test]
    fn test_discovery_disabled_single_fetch() {
        let transport = Arc::new(ScriptedTransport::new(vec![overview(&["1", "2"])]));
        let sync = WorldSync::new(transport.clone(), Arc::new(MarkupExtractor));
        let storage = MemoryStorage::new();
        let mut store = ConfigStore::new(storage.clone());
        let mut doc = document(false);

        let result = sync.reconcile(&mut store, &mut doc).unwrap();
        assert_eq!(result.known_ids, None);
        assert_eq!(result.fetches, 1);
        assert_eq!(transport.calls(), 1);
        assert_eq!(doc.village_ids(), vec!["1"]);
        assert!(storage.writes().is_empty());
    }

    #[test]
    fn test_discovery_adds_and_refetches() {
        let transport = Arc::new(ScriptedTransport::new(vec![overview(&["1", "2", "3"])]));
        let sync = WorldSync::new(transport.clone(), Arc::new(MarkupExtractor));
        let storage = MemoryStorage::new();
        let mut store = ConfigStore::new(storage.clone());
        let mut doc = document(true);

        let result = sync.reconcile(&mut store, &mut doc).unwrap();
        assert_eq!(doc.village_ids(), vec!["1", "2", "3"]);
        assert_eq!(doc.village("3"), Some(&json!({"managed": false})));
        assert_eq!(result.fetches, 2);
        let known = result.known_ids.unwrap();
        assert_eq!(known.len(), 3);
        assert!(known.contains("2"));
    }

    #[test]
    fn test_discovery_follows_growing_overview() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            overview(&["1", "2"]),
            overview(&["1", "2", "5"]),
            overview(&["1", "2", "5"]),
        ]));
        let sync = WorldSync::new(transport.clone(), Arc::new(MarkupExtractor));
        let storage = MemoryStorage::new().with(Slot::Primary, document(true).to_json_pretty());
        let mut store = ConfigStore::new(storage.clone());
        let mut doc = document(true);

        let result = sync.reconcile(&mut store, &mut doc).unwrap();
        assert_eq!(result.fetches, 3);
        assert_eq!(doc.village_ids(), vec!["1", "2", "5"]);
        assert_eq!(storage.write_count(Slot::Backup), 2);
    }

    #[test]
    fn test_missing_template_does_not_loop() {
        let transport = Arc::new(ScriptedTransport::new(vec![overview(&["1", "7"])]));
        let sync = WorldSync::new(transport.clone(), Arc::new(MarkupExtractor));
        let mut store = ConfigStore::new(MemoryStorage::new());
        let mut doc = document(true);
        doc.as_map_mut().remove("village_template");

        let result = sync.reconcile(&mut store, &mut doc).unwrap();
        assert_eq!(result.fetches, 1);
        assert_eq!(doc.village_ids(), vec!["1"]);
    }

    #[test]
    fn test_transport_error_propagates() {
        let transport = Arc::new(ScriptedTransport::new(Vec::new()));
        let sync = WorldSync::new(transport, Arc::new(MarkupExtractor));
        let mut store = ConfigStore::new(MemoryStorage::new());
        let mut doc = document(true);
        assert!(sync.reconcile(&mut store, &mut doc).is_err());
    }

    #[test]
    fn test_discover_world_flags() {
        let mut doc = document(false);
        let page = "<a href=\"game.php?screen=statue\">Knight</a><script>Quests.setQuestData({})</script>";

        assert!(discover_world_flags(page, &mut doc));
        assert_eq!(doc.world_flag(WorldFlag::Knight), FeatureState::Enabled);
        assert_eq!(doc.world_flag(WorldFlag::Quests), FeatureState::Enabled);
        assert_eq!(doc.world_flag(WorldFlag::Flags), FeatureState::Disabled);
        assert_eq!(doc.world_flag(WorldFlag::Boosters), FeatureState::Disabled);
    }

    #[test]
    fn test_world_flags_are_monotonic() {
        let mut doc = document(false);
        assert!(discover_world_flags("screen=flags", &mut doc));
        let settled = doc.clone();

        // A later page without the marker changes nothing
        assert!(!discover_world_flags("", &mut doc));
        assert!(!discover_world_flags("screen=inventory screen=statue", &mut doc));
        assert_eq!(doc, settled);
        assert_eq!(doc.world_flag(WorldFlag::Flags), FeatureState::Enabled);
    }

    #[test]
    fn test_partially_known_flags() {
        let mut doc = document(false);
        doc.set_world_flag(WorldFlag::Flags, FeatureState::Disabled);
        doc.set_world_flag(WorldFlag::Knight, FeatureState::Disabled);
        doc.set_world_flag(WorldFlag::Boosters, FeatureState::Enabled);

        assert!(discover_world_flags("screen=flags", &mut doc));
        assert_eq!(doc.world_flag(WorldFlag::Flags), FeatureState::Disabled);
        assert_eq!(doc.world_flag(WorldFlag::Quests), FeatureState::Disabled);
    }

    #[test]
    fn test_malformed_flag_is_rediscovered() {
        let mut doc = document(false);
        doc.set("world", "knight_enabled", json!("true"));
        doc.set("world", "flags_enabled", json!(false));

        assert!(discover_world_flags("screen=flags", &mut doc));
        assert_eq!(doc.get("world", "knight_enabled"), Some(&json!(false)));
        // Known values are never replaced
        assert_eq!(doc.get("world", "flags_enabled"), Some(&json!(false)));
    }
}
