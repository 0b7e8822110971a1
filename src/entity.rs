/*!
 * Villages as units of work
 *
 * Each configured village is driven through the [`Entity`] trait. The game
 * logic a village runs is outside this crate's concern; the shipped
 * [`OverviewVillage`] only refreshes the village page and tracks whether it
 * is under attack.
 */

use crate::config::ConfigDocument;
use crate::error::{AgentError, Result};
use crate::remote::{PageExtractor, Transport, TransportError};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Defense posture reported by a village
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DefenseStatus {
    pub under_attack: bool,
    pub allow_support_recv: bool,
}

pub trait Entity {
    fn id(&self) -> &str;

    /// One round of work for this village
    fn run(&mut self, config: &ConfigDocument) -> Result<()>;

    /// `villages[id][section][parameter]` as of the last run, or `default`
    fn get_config(&self, section: &str, parameter: &str, default: Value) -> Value;

    /// Name computed from the naming template; kept in memory only
    fn set_display_name(&mut self, name: String);

    fn display_name(&self) -> Option<&str>;

    /// Present when the village has a defense component attached
    fn defense(&self) -> Option<&DefenseStatus>;
}

/// Builds the entity for a village id the first time it is dispatched
pub type EntityFactory = Box<dyn Fn(&str) -> Box<dyn Entity>>;

/// Default village: refreshes its overview page each cycle
pub struct OverviewVillage {
    id: String,
    transport: Arc<dyn Transport>,
    extractor: Arc<dyn PageExtractor>,
    settings: Option<Value>,
    display_name: Option<String>,
    defense: Option<DefenseStatus>,
}

impl OverviewVillage {
    pub fn new(
        id: impl Into<String>,
        transport: Arc<dyn Transport>,
        extractor: Arc<dyn PageExtractor>,
    ) -> Self {
        Self {
            id: id.into(),
            transport,
            extractor,
            settings: None,
            display_name: None,
            defense: None,
        }
    }

    fn overview_path(&self) -> String {
        format!("game.php?village={}&screen=overview", self.id)
    }

    fn flag(&self, section: &str, parameter: &str, default: bool) -> bool {
        self.get_config(section, parameter, Value::Bool(default))
            .as_bool()
            .unwrap_or(default)
    }
}

impl Entity for OverviewVillage {
    fn id(&self) -> &str {
        &self.id
    }

    fn run(&mut self, config: &ConfigDocument) -> Result<()> {
        self.settings = config.village(&self.id).cloned();

        if !self.flag("", "managed", true) {
            debug!(village = %self.id, "Village is not managed, skipping");
            return Ok(());
        }

        let page = self.transport.get(&self.overview_path()).map_err(|e| match e {
            TransportError::SessionExpired => AgentError::SessionExpired,
            other => AgentError::EntityDispatch {
                id: self.id.clone(),
                reason: other.to_string(),
            },
        })?;

        self.defense = if self.flag("units", "manage_defence", false) {
            let incoming = self.extractor.incoming_attacks(&page).unwrap_or(0);
            Some(DefenseStatus {
                under_attack: incoming > 0,
                allow_support_recv: self.flag("units", "allow_support_recv", true),
            })
        } else {
            None
        };

        debug!(
            village = %self.id,
            name = self.display_name.as_deref().unwrap_or("-"),
            "Village refreshed"
        );
        Ok(())
    }

    fn get_config(&self, section: &str, parameter: &str, default: Value) -> Value {
        let Some(settings) = self.settings.as_ref() else {
            return default;
        };
        let scope = if section.is_empty() {
            Some(settings)
        } else {
            settings.get(section)
        };
        scope
            .and_then(|s| s.get(parameter))
            .cloned()
            .unwrap_or(default)
    }

    fn set_display_name(&mut self, name: String) {
        self.display_name = Some(name);
    }

    fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    fn defense(&self) -> Option<&DefenseStatus> {
        self.defense.as_ref()
    }
}
