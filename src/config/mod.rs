/*!
 * Versioned configuration: document model, migration and persistence
 */

pub mod document;
pub mod migrate;
pub mod storage;
pub mod store;

pub use document::{BotSettings, ConfigDocument, FeatureState, WorldFlag};
pub use storage::{DocumentStorage, FsStorage, MemoryStorage, Slot};
pub use store::{Bootstrap, ConfigStore, NoBootstrap};
