/*!
 * Outpost - unattended game session agent
 *
 * Keeps a versioned JSON configuration in step with a remote game account
 * and runs every configured village on a jittered schedule:
 * - schema migration against a shipped template, with a rotating backup
 * - automatic config entries for newly discovered villages
 * - world feature discovery from the overview page
 * - connectivity-aware backoff and a bounded restart budget
 */

pub mod commands;
pub mod config;
pub mod controller;
pub mod entity;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod remote;
pub mod settings;
pub mod world;

// Re-export commonly used types
pub use config::{ConfigDocument, ConfigStore, DocumentStorage, FsStorage, MemoryStorage, Slot};
pub use controller::{supervise, Controller, CycleOutcome, Sleeper};
pub use entity::{DefenseStatus, Entity, OverviewVillage};
pub use error::{AgentError, Result};
pub use orchestrator::{CycleReport, EntityOrchestrator, EntityOutcome};
pub use outpost_core_schedule::{ActiveWindow, SleepPolicy};
pub use settings::RuntimeSettings;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
