//! Content pack type definitions.
//!
//! These types mirror the on-disk JSON layout of a content pack. Optional
//! sections and fields are `Option`s so a missing section stays
//! distinguishable from an empty one. Structural checks against raw JSON
//! live in [`validate`](crate::SchemaValidator); the types here assume a
//! document that already deserialized.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Reason recorded for a condition that does not supply one.
pub const DEFAULT_CONDITION_REASON: &str = "Version compatibility requirement";

/// Tag of the only condition type currently understood.
pub const VERSION_RANGE: &str = "version_range";

/// A declarative bundle of seed statements, state fragments, and prompts.
///
/// # Examples
///
/// ```
/// use contentpack_core::ContentPack;
///
/// let raw = serde_json::json!({
///     "metadata": {
///         "name": "Demo",
///         "summary": "s",
///         "detailed_description": "d",
///         "date_exported": "2024-01-01T00:00:00Z",
///         "author_name": "A",
///         "author_email": "a@example.com",
///         "version": "1.0.0"
///     },
///     "database": ["CREATE TABLE t (id INTEGER);"]
/// });
/// let pack = ContentPack::from_value(raw).unwrap();
/// assert_eq!(pack.metadata.name, "Demo");
/// assert_eq!(pack.database.as_ref().map(Vec::len), Some(1));
/// assert!(pack.state.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPack {
    pub metadata: Metadata,
    /// Ordered SQL statements applied when the pack is loaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<Vec<String>>,
    /// Module name to module state object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<BTreeMap<String, serde_json::Map<String, serde_json::Value>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompts: Option<Prompts>,
}

impl ContentPack {
    /// Deserializes a pack from an already parsed JSON document.
    pub fn from_value(value: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    /// Declared compatibility conditions, or an empty slice.
    pub fn conditions(&self) -> &[CompatibilityCondition] {
        self.metadata.conditions()
    }

    /// Number of database statements (zero when the section is absent).
    pub fn database_statement_count(&self) -> usize {
        self.database.as_ref().map_or(0, Vec::len)
    }

    /// State module names in sorted order.
    pub fn state_modules(&self) -> Vec<String> {
        self.state
            .as_ref()
            .map(|state| state.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of prompt definitions in either form.
    pub fn prompt_count(&self) -> usize {
        self.prompts.as_ref().map_or(0, Prompts::len)
    }
}

/// Descriptive metadata shared by every pack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
    pub summary: String,
    pub detailed_description: String,
    /// `YYYY-MM-DDTHH:MM:SSZ`.
    pub date_exported: String,
    pub author_name: String,
    pub author_email: String,
    /// The pack's own `MAJOR.MINOR.PATCH` version.
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compatibility_conditions: Option<Vec<CompatibilityCondition>>,
}

impl Metadata {
    /// Declared compatibility conditions, or an empty slice.
    pub fn conditions(&self) -> &[CompatibilityCondition] {
        self.compatibility_conditions.as_deref().unwrap_or(&[])
    }

    /// Category, falling back to `"uncategorized"`.
    pub fn category_or_default(&self) -> &str {
        self.category.as_deref().unwrap_or("uncategorized")
    }
}

/// Prompt definitions in list or mapping form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Prompts {
    /// `[{"name", "description", "content"}, ...]`
    List(Vec<PromptDefinition>),
    /// `{"name": "text", ...}`
    Map(BTreeMap<String, String>),
}

impl Prompts {
    pub fn len(&self) -> usize {
        match self {
            Self::List(items) => items.len(),
            Self::Map(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptDefinition {
    pub name: String,
    pub description: String,
    pub content: String,
}

/// Kind of a compatibility condition.
///
/// Unrecognized tags are preserved in [`ConditionKind::Unknown`] so the
/// resolver can refuse them instead of dropping them.
///
/// # Examples
///
/// ```
/// use contentpack_core::ConditionKind;
///
/// assert_eq!(ConditionKind::from("version_range".to_string()), ConditionKind::VersionRange);
/// assert_eq!(
///     ConditionKind::from("feature_flag".to_string()),
///     ConditionKind::Unknown("feature_flag".into())
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConditionKind {
    VersionRange,
    Unknown(String),
}

impl From<String> for ConditionKind {
    fn from(raw: String) -> Self {
        if raw == VERSION_RANGE {
            Self::VersionRange
        } else {
            Self::Unknown(raw)
        }
    }
}

impl From<ConditionKind> for String {
    fn from(kind: ConditionKind) -> Self {
        match kind {
            ConditionKind::VersionRange => VERSION_RANGE.to_string(),
            ConditionKind::Unknown(raw) => raw,
        }
    }
}

impl std::fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VersionRange => f.write_str(VERSION_RANGE),
            Self::Unknown(raw) => f.write_str(raw),
        }
    }
}

/// A declared requirement on the host application version.
///
/// Bounds are kept as the raw declared strings; they are parsed when a
/// [`CompatibilityRequirement`](crate::CompatibilityRequirement) is built so
/// that a malformed bound is reported instead of coerced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityCondition {
    #[serde(rename = "type")]
    pub kind: ConditionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl CompatibilityCondition {
    /// Creates a `version_range` condition.
    ///
    /// # Examples
    ///
    /// ```
    /// use contentpack_core::CompatibilityCondition;
    ///
    /// let cond = CompatibilityCondition::version_range(Some("1.0.0"), None, "needs timeline");
    /// assert_eq!(cond.reason_text(), "needs timeline");
    /// assert!(cond.max_version.is_none());
    /// ```
    pub fn version_range(min: Option<&str>, max: Option<&str>, reason: &str) -> Self {
        Self {
            kind: ConditionKind::VersionRange,
            min_version: min.map(String::from),
            max_version: max.map(String::from),
            reason: Some(reason.to_string()),
        }
    }

    /// Declared reason, or [`DEFAULT_CONDITION_REASON`].
    pub fn reason_text(&self) -> &str {
        self.reason.as_deref().unwrap_or(DEFAULT_CONDITION_REASON)
    }

    /// `true` if at least one bound is declared.
    pub fn has_bounds(&self) -> bool {
        self.min_version.is_some() || self.max_version.is_some()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn metadata_json() -> serde_json::Value {
        json!({
            "name": "Demo",
            "summary": "Demo pack",
            "detailed_description": "A demonstration pack",
            "date_exported": "2024-01-01T00:00:00Z",
            "author_name": "Ada",
            "author_email": "ada@example.com",
            "version": "1.0.0"
        })
    }

    #[test]
    fn test_missing_sections_stay_none() {
        let pack = ContentPack::from_value(json!({ "metadata": metadata_json() })).unwrap();
        assert!(pack.database.is_none());
        assert!(pack.state.is_none());
        assert!(pack.prompts.is_none());
        assert!(pack.metadata.compatibility_conditions.is_none());
        assert!(pack.conditions().is_empty());
    }

    #[test]
    fn test_empty_sections_are_distinct_from_missing() {
        let pack = ContentPack::from_value(json!({
            "metadata": metadata_json(),
            "database": [],
            "state": {}
        }))
        .unwrap();
        assert_eq!(pack.database, Some(Vec::new()));
        assert_eq!(pack.state, Some(BTreeMap::new()));
    }

    #[test]
    fn test_prompts_accept_list_and_map_forms() {
        let list = ContentPack::from_value(json!({
            "metadata": metadata_json(),
            "prompts": [{ "name": "p", "description": "d", "content": "c" }]
        }))
        .unwrap();
        assert!(matches!(list.prompts, Some(Prompts::List(ref items)) if items.len() == 1));

        let map = ContentPack::from_value(json!({
            "metadata": metadata_json(),
            "prompts": { "welcome": "Hello", "help": "Help text" }
        }))
        .unwrap();
        assert_eq!(map.prompt_count(), 2);
    }

    #[test]
    fn test_condition_kind_preserves_unknown_tags() {
        let cond: CompatibilityCondition =
            serde_json::from_value(json!({ "type": "feature_flag", "reason": "x" })).unwrap();
        assert_eq!(cond.kind, ConditionKind::Unknown("feature_flag".to_string()));
        let back = serde_json::to_value(&cond).unwrap();
        assert_eq!(back["type"], "feature_flag");
    }

    #[test]
    fn test_condition_reason_defaults() {
        let cond: CompatibilityCondition =
            serde_json::from_value(json!({ "type": "version_range", "min_version": "1.0.0" }))
                .unwrap();
        assert_eq!(cond.reason_text(), DEFAULT_CONDITION_REASON);
        assert!(cond.has_bounds());
    }

    #[test]
    fn test_category_falls_back_to_uncategorized() {
        let pack = ContentPack::from_value(json!({ "metadata": metadata_json() })).unwrap();
        assert_eq!(pack.metadata.category_or_default(), "uncategorized");
    }
}
