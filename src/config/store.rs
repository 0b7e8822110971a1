/*!
 * ConfigStore: load, migrate and persist the configuration document
 *
 * The store does not own the document. Callers hold the `ConfigDocument` and
 * hand it in for every operation; the store remembers the last document it
 * successfully wrote so unchanged documents cause no I/O.
 *
 * Every primary write is preceded by copying the current on-disk primary,
 * byte for byte, into the backup slot. If the backup cannot be written the
 * primary is left alone.
 */

use super::document::ConfigDocument;
use super::migrate::{merge_into_template, needs_migration};
use super::storage::{DocumentStorage, Slot};
use crate::error::{AgentError, Result};
use serde_json::Value;
use tracing::{debug, error, info, warn};

/// Creates a first document when none exists
pub trait Bootstrap {
    /// `Ok(None)` means setup is impossible or was declined
    fn bootstrap(&self, template: &ConfigDocument) -> Result<Option<ConfigDocument>>;
}

/// Bootstrap for unattended runs: never creates anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBootstrap;

impl Bootstrap for NoBootstrap {
    fn bootstrap(&self, _template: &ConfigDocument) -> Result<Option<ConfigDocument>> {
        Ok(None)
    }
}

pub struct ConfigStore {
    storage: Box<dyn DocumentStorage>,
    snapshot: Option<ConfigDocument>,
}

impl ConfigStore {
    pub fn new(storage: impl DocumentStorage + 'static) -> Self {
        Self {
            storage: Box::new(storage),
            snapshot: None,
        }
    }

    pub fn storage(&self) -> &dyn DocumentStorage {
        self.storage.as_ref()
    }

    /// Last document known to be on disk
    pub fn snapshot(&self) -> Option<&ConfigDocument> {
        self.snapshot.as_ref()
    }

    /// The shipped template, if there is one
    pub fn load_template(&self) -> Result<Option<ConfigDocument>> {
        self.read_document(Slot::Template)
    }

    /// Load the primary document, creating it through `bootstrap` when missing.
    ///
    /// A document that exists but does not parse is reported as
    /// `CorruptConfig` and left untouched on disk.
    pub fn load(&mut self, bootstrap: &dyn Bootstrap) -> Result<ConfigDocument> {
        let template = self.load_template()?;

        let doc = match self.read_document(Slot::Primary)? {
            Some(doc) => doc,
            None => {
                let primary = self.storage.location(Slot::Primary);
                let Some(template) = template.as_ref() else {
                    error!(
                        "Neither {} nor the template {} exist",
                        primary.display(),
                        self.storage.location(Slot::Template).display()
                    );
                    return Err(AgentError::MissingConfig(primary));
                };
                info!("No configuration file yet, starting first-run setup");
                let doc = bootstrap
                    .bootstrap(template)?
                    .ok_or(AgentError::MissingConfig(primary))?;
                self.persist(&doc)?;
                info!("Deployed new configuration file");
                self.snapshot = Some(doc.clone());
                doc
            }
        };

        if doc.version().is_none() && template.is_none() {
            return Err(AgentError::CorruptConfig {
                path: self.storage.location(Slot::Primary),
                reason: "build.version is missing and no template is available".to_string(),
            });
        }

        self.snapshot = Some(doc.clone());
        Ok(doc)
    }

    /// Bring `doc` up to the template's schema. Equal versions return `doc`
    /// unchanged, so running this twice is a no-op.
    pub fn migrate_if_needed(
        &mut self,
        doc: ConfigDocument,
        template: &ConfigDocument,
    ) -> ConfigDocument {
        if !needs_migration(&doc, template) {
            return doc;
        }

        info!(
            from = %version_label(doc.version()),
            to = %version_label(template.version()),
            "Outdated config file found, merging (old copy saved as {})",
            self.storage.location(Slot::Backup).display()
        );
        let migrated = merge_into_template(&doc, template);
        if self.save(&migrated) {
            info!("Deployed migrated configuration file");
        }
        migrated
    }

    /// Persist `doc`. Failures are logged and reported as `false`; the
    /// previous on-disk document stays authoritative.
    pub fn save(&mut self, doc: &ConfigDocument) -> bool {
        match self.persist(doc) {
            Ok(()) => {
                self.snapshot = Some(doc.clone());
                true
            }
            Err(e) => {
                error!(category = %e.category(), "{}", e);
                false
            }
        }
    }

    /// Persist only when `doc` differs from the last saved document
    pub fn update_if_changed(&mut self, doc: &ConfigDocument) -> bool {
        if self.snapshot.as_ref() == Some(doc) {
            return false;
        }
        let saved = self.save(doc);
        if saved {
            info!("Config file updated");
        }
        saved
    }

    /// Add a village entry, from `entry` or a copy of `village_template`.
    ///
    /// Returns whether the village was added to `doc`. The document is
    /// persisted afterwards; a failed write is logged and retried by the next
    /// `update_if_changed`.
    pub fn add_entity(&mut self, doc: &mut ConfigDocument, id: &str, entry: Option<Value>) -> bool {
        let entry = match entry.or_else(|| doc.village_template().cloned()) {
            Some(entry) => entry,
            None => {
                warn!(village = %id, "Village entry could not be added, no village_template in config");
                return false;
            }
        };

        doc.insert_village(id, entry);
        if self.save(doc) {
            debug!(village = %id, "Village entry persisted");
        }
        true
    }

    fn read_document(&self, slot: Slot) -> Result<Option<ConfigDocument>> {
        let path = self.storage.location(slot);
        let Some(text) = self.storage.read(slot)? else {
            return Ok(None);
        };
        ConfigDocument::from_json(&text)
            .map(Some)
            .map_err(|e| AgentError::CorruptConfig {
                path,
                reason: e.to_string(),
            })
    }

    /// Backup the current primary bytes, then write the new primary
    fn persist(&self, doc: &ConfigDocument) -> Result<()> {
        let previous = self.storage.read(Slot::Primary).map_err(|e| {
            AgentError::PersistFailure(format!("could not read current config: {}", e))
        })?;

        if let Some(previous) = previous {
            self.storage.write(Slot::Backup, &previous).map_err(|e| {
                AgentError::PersistFailure(format!(
                    "backup to {} failed, config left unchanged: {}",
                    self.storage.location(Slot::Backup).display(),
                    e
                ))
            })?;
        }

        self.storage
            .write(Slot::Primary, &doc.to_json_pretty())
            .map_err(|e| {
                AgentError::PersistFailure(format!(
                    "writing {} failed: {}",
                    self.storage.location(Slot::Primary).display(),
                    e
                ))
            })
    }
}

fn version_label(version: Option<&Value>) -> String {
    match version {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "none".to_string(),
    }
}
