//! Condition suggestions and automatic repairs for raw pack documents.
//!
//! Both operate on `serde_json::Value` so they work on documents that do not
//! yet deserialize into a [`ContentPack`](crate::ContentPack).

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::CompatibilityCondition;

/// Name written into a pack whose metadata has none.
pub const UNTITLED_PACK_NAME: &str = "Untitled Content Pack";

/// Version written into a pack whose metadata has none.
pub const DEFAULT_PACK_VERSION: &str = "1.0.0";

/// A condition derived from what a pack contains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    /// The content that triggered the suggestion.
    pub finding: String,
    pub condition: CompatibilityCondition,
}

impl Suggestion {
    fn new(finding: &str, min_version: &str, reason: &str) -> Self {
        Self {
            finding: finding.to_string(),
            condition: CompatibilityCondition::version_range(Some(min_version), None, reason),
        }
    }
}

/// Suggests conditions from the sections a pack uses.
///
/// A `database` section suggests 1.0.0, a `timeline` state module 1.2.0 and
/// an `email` state module 1.1.0. A pack using none of these gets a single
/// general 1.0.0 condition, so the result is never empty.
///
/// # Examples
///
/// ```
/// use contentpack_core::suggest_conditions;
/// use serde_json::json;
///
/// let pack = json!({"state": {"timeline": {}}});
/// let suggestions = suggest_conditions(&pack);
/// assert_eq!(suggestions.len(), 1);
/// assert_eq!(suggestions[0].condition.min_version.as_deref(), Some("1.2.0"));
/// ```
pub fn suggest_conditions(pack: &Value) -> Vec<Suggestion> {
    let mut suggestions = Vec::new();

    if pack.get("database").is_some() {
        suggestions.push(Suggestion::new(
            "Content pack uses database features",
            "1.0.0",
            "Requires database module support",
        ));
    }

    if let Some(state) = pack.get("state").and_then(Value::as_object) {
        if state.contains_key("timeline") {
            suggestions.push(Suggestion::new(
                "Content pack uses timeline module",
                "1.2.0",
                "Requires timeline module features",
            ));
        }
        if state.contains_key("email") {
            suggestions.push(Suggestion::new(
                "Content pack uses email module",
                "1.1.0",
                "Requires email module support",
            ));
        }
    }

    if suggestions.is_empty() {
        suggestions.push(default_suggestion());
    }
    suggestions
}

fn default_suggestion() -> Suggestion {
    Suggestion::new(
        "General compatibility",
        DEFAULT_PACK_VERSION,
        "Requires core features from 1.0.0",
    )
}

/// Replaces `metadata.compatibility_conditions` with `conditions`.
///
/// Creates `metadata` when it is absent. Returns `false`, leaving the
/// document untouched, when the document or its metadata is not an object.
pub fn apply_conditions(pack: &mut Value, conditions: &[CompatibilityCondition]) -> bool {
    let Some(metadata) = metadata_mut(pack) else {
        return false;
    };
    metadata.insert(
        "compatibility_conditions".to_string(),
        Value::Array(conditions.iter().map(condition_value).collect()),
    );
    true
}

/// Fills in the metadata fields a pack most often forgets.
///
/// Missing `name`, `version`, `date_exported` and `compatibility_conditions`
/// keys are added; fields that are present but wrong are left for the
/// validator to report. `exported_at` is used for `date_exported`. Returns a
/// description of each repair, empty when nothing changed.
///
/// # Examples
///
/// ```
/// use contentpack_core::attempt_fixes;
/// use serde_json::json;
///
/// let mut pack = json!({"metadata": {"name": "Demo"}});
/// let fixes = attempt_fixes(&mut pack, "2024-01-01T00:00:00Z");
/// assert_eq!(fixes.len(), 3);
/// assert_eq!(pack["metadata"]["version"], "1.0.0");
/// assert!(attempt_fixes(&mut pack, "2024-01-01T00:00:00Z").is_empty());
/// ```
pub fn attempt_fixes(pack: &mut Value, exported_at: &str) -> Vec<String> {
    let had_metadata = pack.get("metadata").is_some();
    let Some(metadata) = metadata_mut(pack) else {
        return Vec::new();
    };

    let mut fixes = Vec::new();
    if !had_metadata {
        fixes.push("added metadata".to_string());
    }

    let defaults = [
        ("name", Value::from(UNTITLED_PACK_NAME)),
        ("version", Value::from(DEFAULT_PACK_VERSION)),
        ("date_exported", Value::from(exported_at)),
    ];
    for (field, value) in defaults {
        if !metadata.contains_key(field) {
            fixes.push(format!("set metadata.{field} to {value}"));
            metadata.insert(field.to_string(), value);
        }
    }

    if !metadata.contains_key("compatibility_conditions") {
        let condition = default_suggestion().condition;
        fixes.push(format!(
            "added default compatibility condition (min {DEFAULT_PACK_VERSION})"
        ));
        metadata.insert(
            "compatibility_conditions".to_string(),
            Value::Array(vec![condition_value(&condition)]),
        );
    }

    fixes
}

fn metadata_mut(pack: &mut Value) -> Option<&mut Map<String, Value>> {
    let root = pack.as_object_mut()?;
    root.entry("metadata")
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
}

fn condition_value(condition: &CompatibilityCondition) -> Value {
    let mut value = Map::new();
    value.insert("type".to_string(), Value::from(condition.kind.to_string()));
    if let Some(min) = &condition.min_version {
        value.insert("min_version".to_string(), json!(min));
    }
    if let Some(max) = &condition.max_version {
        value.insert("max_version".to_string(), json!(max));
    }
    if let Some(reason) = &condition.reason {
        value.insert("reason".to_string(), json!(reason));
    }
    Value::Object(value)
}
