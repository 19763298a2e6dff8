//! Content pack structural validation.
//!
//! Validation runs over the raw JSON document rather than the typed
//! [`ContentPack`](crate::ContentPack) so that a wrong-typed field is
//! reported precisely instead of surfacing as one opaque deserialization
//! failure. Every problem found is collected; errors decide validity and
//! warnings never do.
//!
//! # Examples
//!
//! ```
//! use contentpack_core::*;
//! use serde_json::json;
//!
//! let config = SchemaConfig::new().unwrap();
//! let validator = SchemaValidator::new(&config);
//!
//! let doc = json!({
//!     "metadata": {
//!         "name": "Demo",
//!         "summary": "s",
//!         "detailed_description": "d",
//!         "date_exported": "2024-01-01T00:00:00Z",
//!         "author_name": "A",
//!         "author_email": "a@example.com",
//!         "version": "1.0.0"
//!     },
//!     "database": []
//! });
//! let result = validator.validate(&doc);
//! assert!(result.is_valid);
//! assert_eq!(result.warnings.len(), 1);
//!
//! let bad = json!({ "metadata": { "name": "" } });
//! assert!(!validator.validate(&bad).is_valid);
//! ```

use std::collections::HashMap;

use regex::Regex;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{SemanticVersion, VERSION_RANGE};

/// Required `metadata` fields, in report order.
pub const REQUIRED_METADATA_FIELDS: &[&str] = &[
    "name",
    "summary",
    "detailed_description",
    "date_exported",
    "author_name",
    "author_email",
    "version",
];

/// Required fields of a list-form prompt entry.
pub const REQUIRED_PROMPT_FIELDS: &[&str] = &["name", "description", "content"];

/// State modules the host application understands.
pub const KNOWN_STATE_MODULES: &[&str] = &[
    "filesystem",
    "email",
    "memory",
    "web_search",
    "timeline",
    "database",
];

/// Leading keywords accepted for seed statements.
pub const SQL_KEYWORDS: &[&str] = &["CREATE", "INSERT", "UPDATE", "DELETE", "ALTER", "DROP", "REPLACE"];

const DATE_PATTERN: &str = r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}Z$";
const VERSION_PATTERN: &str = r"^\d+\.\d+\.\d+$";
const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";

/// Immutable validation rules, built once and shared by reference.
#[derive(Debug, Clone)]
pub struct SchemaConfig {
    pub required_metadata_fields: Vec<String>,
    pub required_prompt_fields: Vec<String>,
    pub known_state_modules: Vec<String>,
    pub sql_keywords: Vec<String>,
    pub date_pattern: Regex,
    pub version_pattern: Regex,
    pub email_pattern: Regex,
}

impl SchemaConfig {
    /// Builds the standard rule set.
    ///
    /// # Errors
    ///
    /// Returns an error only if one of the built-in patterns fails to
    /// compile.
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            required_metadata_fields: to_owned(REQUIRED_METADATA_FIELDS),
            required_prompt_fields: to_owned(REQUIRED_PROMPT_FIELDS),
            known_state_modules: to_owned(KNOWN_STATE_MODULES),
            sql_keywords: to_owned(SQL_KEYWORDS),
            date_pattern: Regex::new(DATE_PATTERN)?,
            version_pattern: Regex::new(VERSION_PATTERN)?,
            email_pattern: Regex::new(EMAIL_PATTERN)?,
        })
    }
}

fn to_owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// A problem that makes a document invalid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The file is not parseable JSON.
    #[error("invalid JSON: {0}")]
    MalformedJson(String),
    #[error("cannot read file: {0}")]
    Unreadable(String),
    #[error("missing required field: {0}")]
    MissingField(String),
    /// A field holds the wrong JSON type.
    #[error("{path} must be {expected}, found {found}")]
    WrongType {
        path: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("{0} cannot be empty")]
    EmptyField(String),
    #[error("{path} must match YYYY-MM-DDTHH:MM:SSZ, found {value:?}")]
    InvalidDate { path: String, value: String },
    #[error("{path} must be MAJOR.MINOR.PATCH, found {value:?}")]
    InvalidVersion { path: String, value: String },
    #[error("{path} is not a valid email address: {value:?}")]
    InvalidEmail { path: String, value: String },
    /// A declared compatibility bound does not parse.
    #[error("{path} is not a semantic version: {value:?}")]
    InvalidConditionBound { path: String, value: String },
    /// Two valid packs share `metadata.name`.
    #[error("duplicate content pack name {name:?} in {first} and {second}")]
    DuplicateName {
        name: String,
        first: String,
        second: String,
    },
}

/// A problem worth reporting that does not affect validity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationWarning {
    #[error("{0} section is present but empty")]
    EmptySection(&'static str),
    #[error("{0} declares neither min_version nor max_version")]
    UnboundedCondition(String),
    #[error("{path} has unknown condition type {kind:?}")]
    UnknownConditionType { path: String, kind: String },
    #[error("state.{0} is not a known state module")]
    UnknownStateModule(String),
    #[error("{path} does not start with a recognized SQL keyword")]
    UnrecognizedStatement { path: String },
}

/// Section counts reported alongside the verdict.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationSummary {
    pub has_metadata: bool,
    pub database_statements: usize,
    pub state_modules: Vec<String>,
    pub prompt_count: usize,
    pub compatibility_conditions: usize,
}

/// Outcome of validating one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    #[serde(serialize_with = "display_list")]
    pub errors: Vec<ValidationError>,
    #[serde(serialize_with = "display_list")]
    pub warnings: Vec<ValidationWarning>,
    pub summary: ValidationSummary,
}

impl ValidationResult {
    /// A result for a file that could not be parsed at all.
    pub fn malformed(detail: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            errors: vec![ValidationError::MalformedJson(detail.into())],
            ..Self::default()
        }
    }

    /// A result for a file that could not be read.
    pub fn unreadable(detail: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            errors: vec![ValidationError::Unreadable(detail.into())],
            ..Self::default()
        }
    }

    fn error(&mut self, err: ValidationError) {
        self.errors.push(err);
    }

    fn warn(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }
}

fn display_list<T: std::fmt::Display, S: Serializer>(
    items: &[T],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(items.iter().map(ToString::to_string))
}

/// Validates pack documents against a [`SchemaConfig`].
#[derive(Debug, Clone, Copy)]
pub struct SchemaValidator<'a> {
    config: &'a SchemaConfig,
}

impl<'a> SchemaValidator<'a> {
    pub fn new(config: &'a SchemaConfig) -> Self {
        Self { config }
    }

    /// Validates one parsed document.
    pub fn validate(&self, document: &Value) -> ValidationResult {
        let mut result = ValidationResult::default();

        match document.as_object() {
            Some(root) => {
                self.check_metadata(root, &mut result);
                self.check_database(root, &mut result);
                self.check_state(root, &mut result);
                self.check_prompts(root, &mut result);
            }
            None => result.error(wrong_type("document", "an object", document)),
        }

        result.is_valid = result.errors.is_empty();
        result
    }

    /// Parses and validates raw JSON text.
    pub fn validate_str(&self, text: &str) -> ValidationResult {
        match serde_json::from_str::<Value>(text) {
            Ok(document) => self.validate(&document),
            Err(err) => ValidationResult::malformed(err.to_string()),
        }
    }

    fn check_metadata(&self, root: &Map<String, Value>, result: &mut ValidationResult) {
        let Some(value) = root.get("metadata") else {
            result.error(ValidationError::MissingField("metadata".to_string()));
            return;
        };
        let Some(metadata) = value.as_object() else {
            result.error(wrong_type("metadata", "an object", value));
            return;
        };
        result.summary.has_metadata = true;

        for field in &self.config.required_metadata_fields {
            let path = format!("metadata.{field}");
            let Some(value) = metadata.get(field) else {
                result.error(ValidationError::MissingField(path));
                continue;
            };
            let Some(text) = value.as_str() else {
                result.error(wrong_type(&path, "a string", value));
                continue;
            };
            if text.trim().is_empty() {
                result.error(ValidationError::EmptyField(path));
                continue;
            }
            self.check_format(field, path, text, result);
        }

        if let Some(tags) = metadata.get("tags") {
            match tags.as_array() {
                Some(items) => {
                    for (i, tag) in items.iter().enumerate() {
                        if !tag.is_string() {
                            result.error(wrong_type(&format!("metadata.tags[{i}]"), "a string", tag));
                        }
                    }
                }
                None => result.error(wrong_type("metadata.tags", "an array", tags)),
            }
        }

        if let Some(category) = metadata.get("category") {
            if !category.is_string() {
                result.error(wrong_type("metadata.category", "a string", category));
            }
        }

        if let Some(conditions) = metadata.get("compatibility_conditions") {
            self.check_conditions(conditions, result);
        }
    }

    fn check_format(&self, field: &str, path: String, text: &str, result: &mut ValidationResult) {
        let value = text.to_string();
        match field {
            "date_exported" if !self.config.date_pattern.is_match(text) => {
                result.error(ValidationError::InvalidDate { path, value });
            }
            "version" if !self.config.version_pattern.is_match(text) => {
                result.error(ValidationError::InvalidVersion { path, value });
            }
            "author_email" if !self.config.email_pattern.is_match(text) => {
                result.error(ValidationError::InvalidEmail { path, value });
            }
            _ => {}
        }
    }

    fn check_conditions(&self, conditions: &Value, result: &mut ValidationResult) {
        let Some(items) = conditions.as_array() else {
            result.error(wrong_type("metadata.compatibility_conditions", "an array", conditions));
            return;
        };
        result.summary.compatibility_conditions = items.len();

        for (i, item) in items.iter().enumerate() {
            let path = format!("metadata.compatibility_conditions[{i}]");
            let Some(condition) = item.as_object() else {
                result.error(wrong_type(&path, "an object", item));
                continue;
            };

            let kind = match condition.get("type") {
                Some(Value::String(kind)) => kind.as_str(),
                Some(other) => {
                    result.error(wrong_type(&format!("{path}.type"), "a string", other));
                    continue;
                }
                None => {
                    result.error(ValidationError::MissingField(format!("{path}.type")));
                    continue;
                }
            };

            let mut bounds = 0;
            for bound in ["min_version", "max_version"] {
                let Some(value) = condition.get(bound) else {
                    continue;
                };
                bounds += 1;
                let bound_path = format!("{path}.{bound}");
                match value.as_str() {
                    Some(raw) if SemanticVersion::is_valid(raw) => {}
                    Some(raw) => result.error(ValidationError::InvalidConditionBound {
                        path: bound_path,
                        value: raw.to_string(),
                    }),
                    None => result.error(wrong_type(&bound_path, "a string", value)),
                }
            }

            if let Some(reason) = condition.get("reason") {
                if !reason.is_string() {
                    result.error(wrong_type(&format!("{path}.reason"), "a string", reason));
                }
            }

            if kind != VERSION_RANGE {
                result.warn(ValidationWarning::UnknownConditionType {
                    path,
                    kind: kind.to_string(),
                });
            } else if bounds == 0 {
                result.warn(ValidationWarning::UnboundedCondition(path));
            }
        }
    }

    fn check_database(&self, root: &Map<String, Value>, result: &mut ValidationResult) {
        let Some(value) = root.get("database") else {
            return;
        };
        let Some(statements) = value.as_array() else {
            result.error(wrong_type("database", "an array", value));
            return;
        };
        if statements.is_empty() {
            result.warn(ValidationWarning::EmptySection("database"));
        }
        result.summary.database_statements = statements.len();

        for (i, statement) in statements.iter().enumerate() {
            let path = format!("database[{i}]");
            let Some(sql) = statement.as_str() else {
                result.error(wrong_type(&path, "a string", statement));
                continue;
            };
            if sql.trim().is_empty() {
                result.error(ValidationError::EmptyField(path));
                continue;
            }
            if !self.starts_with_keyword(sql) {
                result.warn(ValidationWarning::UnrecognizedStatement { path });
            }
        }
    }

    fn starts_with_keyword(&self, sql: &str) -> bool {
        let first = sql
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();
        self.config.sql_keywords.iter().any(|k| *k == first)
    }

    fn check_state(&self, root: &Map<String, Value>, result: &mut ValidationResult) {
        let Some(value) = root.get("state") else {
            return;
        };
        let Some(state) = value.as_object() else {
            result.error(wrong_type("state", "an object", value));
            return;
        };
        if state.is_empty() {
            result.warn(ValidationWarning::EmptySection("state"));
        }

        for (module, fragment) in state {
            result.summary.state_modules.push(module.clone());
            if !fragment.is_object() {
                result.error(wrong_type(&format!("state.{module}"), "an object", fragment));
            }
            if !self.config.known_state_modules.iter().any(|m| m == module) {
                result.warn(ValidationWarning::UnknownStateModule(module.clone()));
            }
        }
    }

    fn check_prompts(&self, root: &Map<String, Value>, result: &mut ValidationResult) {
        let Some(value) = root.get("prompts") else {
            return;
        };
        match value {
            Value::Array(items) => {
                if items.is_empty() {
                    result.warn(ValidationWarning::EmptySection("prompts"));
                }
                result.summary.prompt_count = items.len();
                for (i, item) in items.iter().enumerate() {
                    let path = format!("prompts[{i}]");
                    let Some(prompt) = item.as_object() else {
                        result.error(wrong_type(&path, "an object", item));
                        continue;
                    };
                    for field in &self.config.required_prompt_fields {
                        match prompt.get(field) {
                            Some(Value::String(_)) => {}
                            Some(other) => {
                                result.error(wrong_type(&format!("{path}.{field}"), "a string", other))
                            }
                            None => result.error(ValidationError::MissingField(format!("{path}.{field}"))),
                        }
                    }
                }
            }
            Value::Object(entries) => {
                if entries.is_empty() {
                    result.warn(ValidationWarning::EmptySection("prompts"));
                }
                result.summary.prompt_count = entries.len();
                for (name, text) in entries {
                    if !text.is_string() {
                        result.error(wrong_type(&format!("prompts.{name}"), "a string", text));
                    }
                }
            }
            other => result.error(wrong_type("prompts", "an array or object", other)),
        }
    }
}

fn wrong_type(path: &str, expected: &'static str, found: &Value) -> ValidationError {
    ValidationError::WrongType {
        path: path.to_string(),
        expected,
        found: json_type_name(found),
    }
}

/// JSON type name used in messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// One validated file as seen by the duplicate-name check.
#[derive(Debug, Clone, Copy)]
pub struct NamedResult<'a> {
    pub path: &'a str,
    pub result: &'a ValidationResult,
    /// `metadata.name`, when it could be read.
    pub name: Option<&'a str>,
}

/// Reports packs that share `metadata.name`.
///
/// Only documents that are otherwise valid take part. Each duplicate names
/// the first file that claimed the name and the file that repeated it.
///
/// # Examples
///
/// ```
/// use contentpack_core::*;
///
/// let ok = ValidationResult { is_valid: true, ..Default::default() };
/// let entries = [
///     NamedResult { path: "a.json", result: &ok, name: Some("Demo") },
///     NamedResult { path: "b.json", result: &ok, name: Some("Demo") },
/// ];
/// let errors = check_duplicate_names(&entries);
/// assert_eq!(errors.len(), 1);
/// assert!(errors[0].to_string().contains("a.json"));
/// assert!(errors[0].to_string().contains("b.json"));
/// ```
pub fn check_duplicate_names(entries: &[NamedResult<'_>]) -> Vec<ValidationError> {
    let mut seen: HashMap<&str, &str> = HashMap::new();
    let mut errors = Vec::new();

    for entry in entries.iter().filter(|e| e.result.is_valid) {
        let Some(name) = entry.name else {
            continue;
        };
        match seen.get(name) {
            Some(first) => errors.push(ValidationError::DuplicateName {
                name: name.to_string(),
                first: (*first).to_string(),
                second: entry.path.to_string(),
            }),
            None => {
                seen.insert(name, entry.path);
            }
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn config() -> SchemaConfig {
        SchemaConfig::new().unwrap()
    }

    fn valid_doc() -> Value {
        json!({
            "metadata": {
                "name": "Demo",
                "summary": "Demo pack",
                "detailed_description": "A demonstration pack",
                "date_exported": "2024-01-01T00:00:00Z",
                "author_name": "Ada",
                "author_email": "ada@example.com",
                "version": "1.0.0",
                "tags": ["demo"],
                "category": "demo",
                "compatibility_conditions": [
                    { "type": "version_range", "min_version": "1.0.0", "reason": "core" }
                ]
            },
            "database": ["CREATE TABLE t (id INTEGER);", "INSERT INTO t VALUES (1);"],
            "state": { "filesystem": {}, "memory": { "notes": [] } },
            "prompts": [{ "name": "p", "description": "d", "content": "c" }]
        })
    }

    #[test]
    fn test_valid_document_has_no_errors_and_full_summary() {
        let config = config();
        let result = SchemaValidator::new(&config).validate(&valid_doc());
        assert!(result.is_valid, "{:?}", result.errors);
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
        assert_eq!(
            result.summary,
            ValidationSummary {
                has_metadata: true,
                database_statements: 2,
                state_modules: vec!["filesystem".into(), "memory".into()],
                prompt_count: 1,
                compatibility_conditions: 1,
            }
        );
    }

    #[test]
    fn test_missing_metadata_is_an_error() {
        let config = config();
        let result = SchemaValidator::new(&config).validate(&json!({ "database": [] }));
        assert!(!result.is_valid);
        assert!(result.errors.contains(&ValidationError::MissingField("metadata".into())));
    }

    #[test]
    fn test_each_missing_metadata_field_is_reported() {
        let config = config();
        let result = SchemaValidator::new(&config).validate(&json!({ "metadata": {} }));
        assert_eq!(result.errors.len(), REQUIRED_METADATA_FIELDS.len());
        assert!(result.errors.contains(&ValidationError::MissingField("metadata.author_email".into())));
    }

    #[test]
    fn test_field_formats_are_checked() {
        let config = config();
        let validator = SchemaValidator::new(&config);
        let mut doc = valid_doc();
        doc["metadata"]["date_exported"] = json!("2024-01-01");
        doc["metadata"]["version"] = json!("1.0");
        doc["metadata"]["author_email"] = json!("not-an-email");
        let result = validator.validate(&doc);
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 3);
        assert!(matches!(result.errors[0], ValidationError::InvalidDate { .. }));
        assert!(matches!(result.errors[1], ValidationError::InvalidEmail { .. }));
        assert!(matches!(result.errors[2], ValidationError::InvalidVersion { .. }));
    }

    #[test]
    fn test_wrong_types_are_errors_not_warnings() {
        let config = config();
        let validator = SchemaValidator::new(&config);
        let mut doc = valid_doc();
        doc["metadata"]["name"] = json!(42);
        doc["metadata"]["tags"] = json!("demo");
        doc["database"] = json!("CREATE TABLE t (id INTEGER);");
        let result = validator.validate(&doc);
        assert_eq!(result.errors.len(), 3);
        assert!(result.errors.iter().all(|e| matches!(e, ValidationError::WrongType { .. })));
        assert_eq!(
            result.errors[0].to_string(),
            "metadata.name must be a string, found a number"
        );
    }

    #[test]
    fn test_empty_sections_warn_but_stay_valid() {
        let config = config();
        let mut doc = valid_doc();
        doc["database"] = json!([]);
        doc["state"] = json!({});
        doc["prompts"] = json!([]);
        let result = SchemaValidator::new(&config).validate(&doc);
        assert!(result.is_valid);
        assert_eq!(
            result.warnings,
            vec![
                ValidationWarning::EmptySection("database"),
                ValidationWarning::EmptySection("state"),
                ValidationWarning::EmptySection("prompts"),
            ]
        );
    }

    #[test]
    fn test_empty_statement_is_an_error() {
        let config = config();
        let mut doc = valid_doc();
        doc["database"] = json!(["   "]);
        let result = SchemaValidator::new(&config).validate(&doc);
        assert_eq!(result.errors, vec![ValidationError::EmptyField("database[0]".into())]);
    }

    #[test]
    fn test_unrecognized_statement_keyword_warns() {
        let config = config();
        let mut doc = valid_doc();
        doc["database"] = json!(["select 1;", "replace into t values (2);"]);
        let result = SchemaValidator::new(&config).validate(&doc);
        assert!(result.is_valid);
        assert_eq!(
            result.warnings,
            vec![ValidationWarning::UnrecognizedStatement { path: "database[0]".into() }]
        );
    }

    #[test]
    fn test_prompt_entries_require_fields() {
        let config = config();
        let mut doc = valid_doc();
        doc["prompts"] = json!([{ "name": "p", "content": 3 }]);
        let result = SchemaValidator::new(&config).validate(&doc);
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors.contains(&ValidationError::MissingField("prompts[0].description".into())));
    }

    #[test]
    fn test_prompt_mapping_form_requires_string_values() {
        let config = config();
        let mut doc = valid_doc();
        doc["prompts"] = json!({ "welcome": "Hi", "broken": ["x"] });
        let result = SchemaValidator::new(&config).validate(&doc);
        assert_eq!(result.summary.prompt_count, 2);
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn test_state_modules() {
        let config = config();
        let mut doc = valid_doc();
        doc["state"] = json!({ "timeline": {}, "weather": {}, "email": "inbox" });
        let result = SchemaValidator::new(&config).validate(&doc);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.warnings, vec![ValidationWarning::UnknownStateModule("weather".into())]);
    }

    #[test]
    fn test_condition_checks() {
        let config = config();
        let mut doc = valid_doc();
        doc["metadata"]["compatibility_conditions"] = json!([
            { "type": "version_range" },
            { "type": "feature_flag" },
            { "type": "version_range", "min_version": "1.0" },
            { "min_version": "1.0.0" },
            "bogus"
        ]);
        let result = SchemaValidator::new(&config).validate(&doc);
        assert_eq!(result.summary.compatibility_conditions, 5);
        assert_eq!(result.errors.len(), 3);
        assert!(matches!(result.errors[0], ValidationError::InvalidConditionBound { .. }));
        assert_eq!(result.warnings.len(), 2);
        assert!(matches!(result.warnings[0], ValidationWarning::UnboundedCondition(_)));
        assert!(matches!(result.warnings[1], ValidationWarning::UnknownConditionType { .. }));
    }

    #[test]
    fn test_non_object_document() {
        let config = config();
        let result = SchemaValidator::new(&config).validate(&json!([1, 2]));
        assert!(!result.is_valid);
        assert!(!result.summary.has_metadata);
    }

    #[test]
    fn test_validate_str_reports_malformed_json() {
        let config = config();
        let result = SchemaValidator::new(&config).validate_str("{ not json");
        assert!(!result.is_valid);
        assert!(matches!(result.errors[0], ValidationError::MalformedJson(_)));
    }

    #[test]
    fn test_duplicate_names_skip_invalid_documents() {
        let ok = ValidationResult { is_valid: true, ..Default::default() };
        let bad = ValidationResult::malformed("x");
        let entries = [
            NamedResult { path: "a.json", result: &bad, name: Some("Demo") },
            NamedResult { path: "b.json", result: &ok, name: Some("Demo") },
            NamedResult { path: "c.json", result: &ok, name: Some("Other") },
        ];
        assert!(check_duplicate_names(&entries).is_empty());
    }

    #[test]
    fn test_duplicate_names_attribute_both_files() {
        let ok = ValidationResult { is_valid: true, ..Default::default() };
        let entries = [
            NamedResult { path: "a.json", result: &ok, name: Some("Demo") },
            NamedResult { path: "b.json", result: &ok, name: Some("Other") },
            NamedResult { path: "c.json", result: &ok, name: Some("Demo") },
        ];
        assert_eq!(
            check_duplicate_names(&entries),
            vec![ValidationError::DuplicateName {
                name: "Demo".into(),
                first: "a.json".into(),
                second: "c.json".into(),
            }]
        );
    }

    #[test]
    fn test_result_serializes_messages() {
        let config = config();
        let result = SchemaValidator::new(&config).validate(&json!({ "metadata": [] }));
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["is_valid"], false);
        assert_eq!(value["errors"][0], "metadata must be an object, found an array");
    }
}
