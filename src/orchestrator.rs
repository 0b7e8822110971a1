/*!
 * Entity orchestration: run every configured village once per cycle
 *
 * Villages are dispatched in document order. A village that fails is logged
 * and recorded, and the cycle moves on to the next one. Only errors that make
 * the rest of the cycle pointless (a lost session) stop it early.
 */

use crate::config::{BotSettings, ConfigDocument};
use crate::entity::{Entity, EntityFactory};
use crate::error::Result;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, warn};

/// Village id -> whether it is under attack and accepts support
pub type DefenseStates = BTreeMap<String, bool>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityOutcome {
    Completed,
    /// Configured but absent from the remote overview
    Skipped,
    Failed(String),
}

/// What happened to each village in one cycle, in dispatch order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub outcomes: Vec<(String, EntityOutcome)>,
    pub defense_states: DefenseStates,
}

impl CycleReport {
    pub fn completed(&self) -> usize {
        self.count(|o| matches!(o, EntityOutcome::Completed))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, EntityOutcome::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, EntityOutcome::Failed(_)))
    }

    pub fn outcome(&self, id: &str) -> Option<&EntityOutcome> {
        self.outcomes
            .iter()
            .find(|(entity, _)| entity == id)
            .map(|(_, outcome)| outcome)
    }

    fn count(&self, pred: impl Fn(&EntityOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }
}

pub struct EntityOrchestrator {
    factory: EntityFactory,
    roster: HashMap<String, Box<dyn Entity>>,
    defense_states: DefenseStates,
}

impl EntityOrchestrator {
    pub fn new(factory: EntityFactory) -> Self {
        Self {
            factory,
            roster: HashMap::new(),
            defense_states: DefenseStates::new(),
        }
    }

    /// Defense states gathered so far; entries survive across cycles
    pub fn defense_states(&self) -> &DefenseStates {
        &self.defense_states
    }

    /// Number of entities created so far
    pub fn roster_len(&self) -> usize {
        self.roster.len()
    }

    /// Run every configured village once.
    ///
    /// `known_ids` is the set of villages seen remotely; when present and
    /// non-empty, villages outside it are skipped. An empty set filters
    /// nothing. Naming positions count skipped villages too so
    /// numbers stay stable while a village is temporarily missing.
    pub fn dispatch(
        &mut self,
        doc: &ConfigDocument,
        known_ids: Option<&HashSet<String>>,
    ) -> Result<CycleReport> {
        let naming = doc.bot_settings().unwrap_or_else(|e| {
            warn!("Invalid bot settings, village naming disabled: {}", e);
            BotSettings::default()
        });

        self.roster.retain(|id, _| doc.has_village(id));
        self.defense_states.retain(|id, _| doc.has_village(id));
        let known_ids = known_ids.filter(|known| !known.is_empty());

        let mut report = CycleReport::default();
        for (position, id) in doc.village_ids().into_iter().enumerate() {
            if let Some(known) = known_ids {
                if !known.contains(&id) {
                    info!(
                        village = %id,
                        "Village will be ignored because it is not available anymore"
                    );
                    report.outcomes.push((id, EntityOutcome::Skipped));
                    continue;
                }
            }

            let factory = &self.factory;
            let entity = self
                .roster
                .entry(id.clone())
                .or_insert_with(|| factory(&id));

            if let Some(name) = naming.village_name(position) {
                entity.set_display_name(name);
            }

            debug!(village = %id, "Running village");
            let outcome = match entity.run(doc) {
                Ok(()) => {
                    match defense_state(&**entity) {
                        Some(state) => self.defense_states.insert(id.clone(), state),
                        None => self.defense_states.remove(&id),
                    };
                    EntityOutcome::Completed
                }
                Err(e) if e.aborts_cycle() => return Err(e),
                Err(e) => {
                    warn!(village = %id, category = %e.category(), "Village run failed: {}", e);
                    EntityOutcome::Failed(e.to_string())
                }
            };
            report.outcomes.push((id, outcome));
        }

        report.defense_states = self.defense_states.clone();
        Ok(report)
    }
}

/// `Some` only for villages that manage defense and carry a defense component
fn defense_state(entity: &dyn Entity) -> Option<bool> {
    let manages = entity
        .get_config("units", "manage_defence", false.into())
        .as_bool()
        .unwrap_or(false);
    if !manages {
        return None;
    }
    entity
        .defense()
        .map(|d| d.allow_support_recv && d.under_attack)
}
