/*!
 * Schema migration
 *
 * A shipped template defines the current schema. When the document's
 * `build.version` differs from the template's, the template becomes the new
 * document and the old values are poured back into it, field by field, for
 * every field the template still knows about. Villages are carried over
 * whole and backfilled with any field the village template added.
 */

use super::document::{ConfigDocument, SECTION_BUILD, SECTION_VILLAGES, SECTION_VILLAGE_TEMPLATE};
use serde_json::{Map, Value};

/// Sections never merged field-by-field
const UNMERGED_SECTIONS: [&str; 2] = [SECTION_VILLAGES, SECTION_BUILD];

/// Version mismatch is the only migration trigger
pub fn needs_migration(doc: &ConfigDocument, template: &ConfigDocument) -> bool {
    doc.version() != template.version()
}

/// Merge `old` into a copy of `template`.
///
/// - fields present in both keep the old value
/// - fields only in the template keep the template default
/// - fields only in the old document are dropped
/// - every village keeps all of its fields and gains missing template fields
pub fn merge_into_template(old: &ConfigDocument, template: &ConfigDocument) -> ConfigDocument {
    let mut merged = template.clone().into_map();

    for (section, old_value) in old.as_map() {
        if UNMERGED_SECTIONS.contains(&section.as_str()) {
            continue;
        }
        let Some(new_value) = merged.get_mut(section) else {
            continue;
        };
        match (old_value, new_value) {
            (Value::Object(old_fields), Value::Object(new_fields)) => {
                for (field, value) in old_fields {
                    if let Some(slot) = new_fields.get_mut(field) {
                        *slot = value.clone();
                    }
                }
            }
            (old_scalar, slot) if !old_scalar.is_object() && !slot.is_object() => {
                *slot = old_scalar.clone();
            }
            // Section changed shape; the template wins
            _ => {}
        }
    }

    let village_template = merged
        .get(SECTION_VILLAGE_TEMPLATE)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let mut villages = Map::new();
    if let Some(old_villages) = old.villages() {
        for (id, entry) in old_villages {
            villages.insert(id.clone(), backfill(entry, &village_template));
        }
    }
    merged.insert(SECTION_VILLAGES.to_string(), Value::Object(villages));

    ConfigDocument::new(merged)
}

/// Add template fields missing from a village entry; existing fields win
fn backfill(entry: &Value, template: &Map<String, Value>) -> Value {
    match entry {
        Value::Object(fields) => {
            let mut filled = fields.clone();
            for (field, default) in template {
                if !filled.contains_key(field) {
                    filled.insert(field.clone(), default.clone());
                }
            }
            Value::Object(filled)
        }
        // Not an object; nothing sensible to backfill into
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> ConfigDocument {
        match value {
            Value::Object(map) => ConfigDocument::new(map),
            _ => panic!("test documents must be objects"),
        }
    }

    fn old_document() -> ConfigDocument {
        doc(json!({
            "build": {"version": "1"},
            "server": {"endpoint": "https://en90.example.net/game.php", "server": "en90"},
            "bot": {"active_delay": 300, "retired_option": true},
            "obsolete_section": {"x": 1},
            "villages": {
                "11": {"managed": false, "custom": "keep"},
                "22": {"managed": true, "units": {"recruit": true}}
            },
            "village_template": {"managed": true}
        }))
    }

    fn template() -> ConfigDocument {
        doc(json!({
            "build": {"version": "2"},
            "server": {"endpoint": null, "server": null, "cookie": null},
            "bot": {"active_delay": 120, "inactive_delay": 600},
            "world": {"flags_enabled": null},
            "villages": {},
            "village_template": {"managed": true, "units": {"recruit": false}, "farm": true}
        }))
    }

    #[test]
    fn test_needs_migration() {
        assert!(needs_migration(&old_document(), &template()));
        assert!(!needs_migration(&template(), &template()));
    }

    #[test]
    fn test_old_values_override_known_fields() {
        let merged = merge_into_template(&old_document(), &template());
        assert_eq!(merged.get("bot", "active_delay"), Some(&json!(300)));
        assert_eq!(merged.get("bot", "inactive_delay"), Some(&json!(600)));
        assert_eq!(merged.get("bot", "retired_option"), None);
        assert_eq!(merged.get_str("server", "server"), Some("en90"));
        assert_eq!(merged.get("server", "cookie"), Some(&Value::Null));
    }

    #[test]
    fn test_build_comes_from_template() {
        let merged = merge_into_template(&old_document(), &template());
        assert_eq!(merged.version(), Some(&json!("2")));
        assert!(!needs_migration(&merged, &template()));
    }

    #[test]
    fn test_dropped_sections_are_discarded() {
        let merged = merge_into_template(&old_document(), &template());
        assert!(merged.section("obsolete_section").is_none());
        assert!(merged.section("world").is_some());
    }

    #[test]
    fn test_villages_backfilled_not_overwritten() {
        let merged = merge_into_template(&old_document(), &template());
        assert_eq!(
            merged.village("11"),
            Some(&json!({
                "managed": false,
                "custom": "keep",
                "units": {"recruit": false},
                "farm": true
            }))
        );
        assert_eq!(
            merged.village("22").and_then(|v| v.get("units")),
            Some(&json!({"recruit": true}))
        );
        assert_eq!(merged.village_ids(), vec!["11", "22"]);
    }

    #[test]
    fn test_village_template_fields_merge_like_other_sections() {
        let mut old = old_document();
        old.set("village_template", "farm", json!(false));
        let merged = merge_into_template(&old, &template());
        assert_eq!(merged.get("village_template", "farm"), Some(&json!(false)));
        assert_eq!(
            merged.village("11").and_then(|v| v.get("farm")),
            Some(&json!(false))
        );
    }
}
