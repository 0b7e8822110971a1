/*!
 * The versioned configuration document
 *
 * The document is kept as an ordered JSON object rather than a fixed struct:
 * its shape is defined by whichever template shipped with the binary, and
 * migration has to carry unknown fields forward. Typed views ([`BotSettings`],
 * [`FeatureState`]) are read out of it where the agent needs them.
 */

use outpost_core_schedule::{ActiveWindow, SleepPolicy, WindowParseError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

pub const SECTION_BUILD: &str = "build";
pub const SECTION_SERVER: &str = "server";
pub const SECTION_BOT: &str = "bot";
pub const SECTION_WORLD: &str = "world";
pub const SECTION_VILLAGES: &str = "villages";
pub const SECTION_VILLAGE_TEMPLATE: &str = "village_template";

/// Configuration document backed by an insertion-ordered JSON object
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigDocument {
    root: Map<String, Value>,
}

impl ConfigDocument {
    pub fn new(root: Map<String, Value>) -> Self {
        Self { root }
    }

    /// Parse a document; the top level must be a JSON object
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        let root: Map<String, Value> = serde_json::from_str(text)?;
        Ok(Self { root })
    }

    /// Two-space indented JSON, keys in document order
    pub fn to_json_pretty(&self) -> String {
        // Serializing a Map of Values cannot fail
        serde_json::to_string_pretty(&self.root).unwrap_or_default()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.root
    }

    pub fn as_map_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.root
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.root
    }

    /// `build.version`, if present
    pub fn version(&self) -> Option<&Value> {
        self.get(SECTION_BUILD, "version")
    }

    pub fn section(&self, name: &str) -> Option<&Map<String, Value>> {
        self.root.get(name).and_then(Value::as_object)
    }

    /// Section as a mutable object, replacing a missing or non-object value
    pub fn section_mut(&mut self, name: &str) -> &mut Map<String, Value> {
        let entry = self
            .root
            .entry(name.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        match entry {
            Value::Object(map) => map,
            _ => unreachable!("section was just replaced with an object"),
        }
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&Value> {
        self.section(section).and_then(|s| s.get(key))
    }

    pub fn set(&mut self, section: &str, key: &str, value: Value) {
        self.section_mut(section).insert(key.to_string(), value);
    }

    pub fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.get(section, key)
            .and_then(Value::as_bool)
            .unwrap_or(default)
    }

    pub fn get_str(&self, section: &str, key: &str) -> Option<&str> {
        self.get(section, key).and_then(Value::as_str)
    }

    pub fn villages(&self) -> Option<&Map<String, Value>> {
        self.section(SECTION_VILLAGES)
    }

    /// Village identifiers in document order
    pub fn village_ids(&self) -> Vec<String> {
        self.villages()
            .map(|v| v.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn has_village(&self, id: &str) -> bool {
        self.villages().is_some_and(|v| v.contains_key(id))
    }

    pub fn village(&self, id: &str) -> Option<&Value> {
        self.villages().and_then(|v| v.get(id))
    }

    pub fn insert_village(&mut self, id: &str, entry: Value) {
        self.section_mut(SECTION_VILLAGES)
            .insert(id.to_string(), entry);
    }

    pub fn village_template(&self) -> Option<&Value> {
        self.root.get(SECTION_VILLAGE_TEMPLATE)
    }

    /// Typed view of the `bot` section
    pub fn bot_settings(&self) -> serde_json::Result<BotSettings> {
        let bot = self.section(SECTION_BOT).cloned().unwrap_or_default();
        serde_json::from_value(Value::Object(bot))
    }

    pub fn world_flag(&self, flag: WorldFlag) -> FeatureState {
        self.get(SECTION_WORLD, flag.key())
            .map(FeatureState::from_value)
            .unwrap_or_default()
    }

    pub fn set_world_flag(&mut self, flag: WorldFlag, state: FeatureState) {
        self.set(SECTION_WORLD, flag.key(), state.to_value());
    }
}

/// Behavioural parameters from the `bot` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotSettings {
    /// Active window as `"start-end"`
    #[serde(default = "default_active_hours")]
    pub active_hours: String,

    /// Base delay in seconds inside active hours
    #[serde(default = "default_active_delay")]
    pub active_delay: u64,

    /// Base delay in seconds outside active hours
    #[serde(default = "default_inactive_delay")]
    pub inactive_delay: u64,

    #[serde(default = "default_true")]
    pub inactive_still_active: bool,

    /// Create config entries for villages found on the overview page
    #[serde(default)]
    pub add_new_villages: bool,

    #[serde(default)]
    pub auto_set_village_names: bool,

    /// Name pattern; `{num}` is replaced by the padded village number
    #[serde(default = "default_name_template")]
    pub village_name_template: String,

    #[serde(default = "default_name_number_length")]
    pub village_name_number_length: usize,

    #[serde(default)]
    pub user_agent: Option<String>,
}

impl BotSettings {
    pub fn active_window(&self) -> Result<ActiveWindow, WindowParseError> {
        self.active_hours.parse()
    }

    pub fn sleep_policy(&self) -> Result<SleepPolicy, WindowParseError> {
        Ok(SleepPolicy {
            window: self.active_window()?,
            active_delay_secs: self.active_delay,
            inactive_delay_secs: self.inactive_delay,
            inactive_still_active: self.inactive_still_active,
        })
    }

    /// Display name for the village at `position`, when naming is enabled
    pub fn village_name(&self, position: usize) -> Option<String> {
        if !self.auto_set_village_names {
            return None;
        }
        let number = format!(
            "{:0width$}",
            position,
            width = self.village_name_number_length
        );
        Some(self.village_name_template.replace("{num}", &number))
    }
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            active_hours: default_active_hours(),
            active_delay: default_active_delay(),
            inactive_delay: default_inactive_delay(),
            inactive_still_active: true,
            add_new_villages: false,
            auto_set_village_names: false,
            village_name_template: default_name_template(),
            village_name_number_length: default_name_number_length(),
            user_agent: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_active_hours() -> String {
    ActiveWindow::default().to_string()
}

fn default_active_delay() -> u64 {
    120
}

fn default_inactive_delay() -> u64 {
    600
}

fn default_name_template() -> String {
    "A{num} village".to_string()
}

fn default_name_number_length() -> usize {
    3
}

/// Discovered world feature. `Unknown` until the overview page has been seen;
/// stored as `null`, `true` or `false`. Any other stored value reads as
/// `Unknown` and is replaced on the next discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeatureState {
    #[default]
    Unknown,
    Enabled,
    Disabled,
}

impl FeatureState {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Bool(true) => FeatureState::Enabled,
            Value::Bool(false) => FeatureState::Disabled,
            _ => FeatureState::Unknown,
        }
    }

    pub fn to_value(self) -> Value {
        match self {
            FeatureState::Unknown => Value::Null,
            FeatureState::Enabled => Value::Bool(true),
            FeatureState::Disabled => Value::Bool(false),
        }
    }

    pub fn from_presence(present: bool) -> Self {
        if present {
            FeatureState::Enabled
        } else {
            FeatureState::Disabled
        }
    }

    pub fn is_known(self) -> bool {
        !matches!(self, FeatureState::Unknown)
    }
}

impl Serialize for FeatureState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let flag = match self {
            FeatureState::Unknown => None,
            FeatureState::Enabled => Some(true),
            FeatureState::Disabled => Some(false),
        };
        flag.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FeatureState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<bool>::deserialize(deserializer)? {
            None => FeatureState::Unknown,
            Some(present) => FeatureState::from_presence(present),
        })
    }
}

/// The world-level flags kept in the `world` section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorldFlag {
    Flags,
    Knight,
    Boosters,
    Quests,
}

impl WorldFlag {
    pub const ALL: [WorldFlag; 4] = [
        WorldFlag::Flags,
        WorldFlag::Knight,
        WorldFlag::Boosters,
        WorldFlag::Quests,
    ];

    pub fn key(self) -> &'static str {
        match self {
            WorldFlag::Flags => "flags_enabled",
            WorldFlag::Knight => "knight_enabled",
            WorldFlag::Boosters => "boosters_enabled",
            WorldFlag::Quests => "quests_enabled",
        }
    }

    /// Literal that appears in the overview page when the feature exists
    pub fn marker(self) -> &'static str {
        match self {
            WorldFlag::Flags => "screen=flags",
            WorldFlag::Knight => "screen=statue",
            WorldFlag::Boosters => "screen=inventory",
            WorldFlag::Quests => "Quests.setQuestData",
        }
    }
}
