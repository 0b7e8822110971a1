/*!
 * Integration tests for first-run setup
 */

use outpost::commands::init::{bootstrap_document, server_target_from_url};
use outpost::config::{Bootstrap, ConfigDocument, ConfigStore, FsStorage, MemoryStorage, Slot};
use outpost::error::{AgentError, Result};
use serde_json::json;
use std::fs;
use tempfile::TempDir;

const TEMPLATE: &str = r#"{
  "build": {"version": 2},
  "server": {"endpoint": null, "server": null, "cookie": null},
  "bot": {"active_hours": "6-23", "user_agent": null},
  "villages": {},
  "village_template": {"managed": true}
}"#;

/// Answers the wizard the way a user pasting a URL would
struct Answers {
    url: &'static str,
    user_agent: &'static str,
}

impl Bootstrap for Answers {
    fn bootstrap(&self, template: &ConfigDocument) -> Result<Option<ConfigDocument>> {
        let target = server_target_from_url(self.url)?;
        Ok(Some(bootstrap_document(template, &target, self.user_agent)))
    }
}

/// A user who quits at the first prompt
struct Declined;

impl Bootstrap for Declined {
    fn bootstrap(&self, _template: &ConfigDocument) -> Result<Option<ConfigDocument>> {
        Ok(None)
    }
}

#[test]
fn test_fresh_bootstrap_fills_server_from_url() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("config.example.json"), TEMPLATE).unwrap();
    let mut store = ConfigStore::new(FsStorage::new(
        dir.path().join("config.json"),
        dir.path().join("config.bak"),
        dir.path().join("config.example.json"),
    ));

    let answers = Answers {
        url: "https://nl92.tribalwars.nl/game.php?village=5521&screen=overview",
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64)",
    };
    let doc = store.load(&answers).unwrap();

    assert_eq!(doc.version(), Some(&json!(2)));
    assert_eq!(
        doc.get_str("server", "endpoint"),
        Some("https://nl92.tribalwars.nl/game.php")
    );
    assert_eq!(doc.get_str("server", "server"), Some("nl92"));
    assert_eq!(
        doc.get_str("bot", "user_agent"),
        Some("Mozilla/5.0 (Windows NT 10.0; Win64; x64)")
    );

    let written = fs::read_to_string(dir.path().join("config.json")).unwrap();
    assert_eq!(ConfigDocument::from_json(&written).unwrap(), doc);
    assert!(!dir.path().join("config.bak").exists());
}

#[test]
fn test_declined_bootstrap_is_missing_config() {
    let storage = MemoryStorage::new().with(Slot::Template, TEMPLATE);
    let mut store = ConfigStore::new(storage.clone());

    let err = store.load(&Declined).unwrap_err();
    assert!(matches!(err, AgentError::MissingConfig(_)));
    assert!(storage.contents(Slot::Primary).is_none());
}

#[test]
fn test_bad_url_aborts_bootstrap() {
    let storage = MemoryStorage::new().with(Slot::Template, TEMPLATE);
    let mut store = ConfigStore::new(storage.clone());

    let answers = Answers {
        url: "nl92.tribalwars.nl",
        user_agent: "",
    };
    let err = store.load(&answers).unwrap_err();
    assert!(matches!(err, AgentError::Bootstrap(_)));
    assert!(err.is_fatal());
}

#[test]
fn test_existing_document_skips_bootstrap() {
    let storage = MemoryStorage::new()
        .with(Slot::Primary, TEMPLATE)
        .with(Slot::Template, TEMPLATE);
    let mut store = ConfigStore::new(storage.clone());

    store.load(&Declined).unwrap();
    assert!(storage.writes().is_empty());
}
