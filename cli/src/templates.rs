//! Skeleton packs written by `cpcompat init`.

use serde_json::{Map, Value, json};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Template {
    /// Metadata only.
    Basic,
    /// Metadata plus a seeded table.
    Database,
    /// Metadata plus a `memory` state module.
    State,
    /// Metadata plus timeline events.
    Timeline,
    /// Database, state, timeline and prompts.
    Full,
}

/// Template parameters.
#[derive(Debug, Clone)]
pub struct TemplateOptions {
    pub name: String,
    pub min_version: String,
    pub category: String,
    pub author_name: String,
    pub author_email: String,
    pub tags: Vec<String>,
    /// `YYYY-MM-DDTHH:MM:SSZ`.
    pub date_exported: String,
}

/// Lower-cased name with every non-alphanumeric replaced by `_`, used for
/// table names and state keys.
pub fn safe_identifier(name: &str) -> String {
    let ident: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
        format!("pack_{ident}")
    } else {
        ident
    }
}

pub fn render(template: Template, options: &TemplateOptions) -> Value {
    let mut pack = Map::new();
    let mut metadata = metadata(options);
    let ident = safe_identifier(&options.name);

    match template {
        Template::Basic => {}
        Template::Database => {
            pack.insert("database".into(), database(&ident));
        }
        Template::State => {
            pack.insert("state".into(), json!({ "memory": memory_state(&ident) }));
        }
        Template::Timeline => {
            raise_minimum(&mut metadata, options, "1.2.0", "Requires the timeline module");
            pack.insert("state".into(), json!({ "timeline": timeline_state(options) }));
        }
        Template::Full => {
            raise_minimum(&mut metadata, options, "1.2.0", "Requires the timeline module for event tracking");
            pack.insert("database".into(), database(&ident));
            pack.insert(
                "state".into(),
                json!({
                    "memory": memory_state(&ident),
                    "timeline": timeline_state(options),
                }),
            );
            pack.insert(
                "prompts".into(),
                json!({
                    "welcome": format!("Welcome to {}!", options.name),
                    "help": format!("This is the {} content pack.", options.name),
                    "error_generic": "An error occurred. Please try again.",
                }),
            );
        }
    }

    pack.insert("metadata".into(), metadata);
    Value::Object(pack)
}

fn metadata(options: &TemplateOptions) -> Value {
    let mut metadata = json!({
        "name": options.name,
        "summary": format!("{} content pack", options.name),
        "detailed_description": format!("Describe what {} adds to the host application.", options.name),
        "date_exported": options.date_exported,
        "author_name": options.author_name,
        "author_email": options.author_email,
        "version": "1.0.0",
        "category": options.category,
        "compatibility_conditions": [{
            "type": "version_range",
            "min_version": options.min_version,
            "reason": format!("Requires {}+ features", options.min_version),
        }],
    });
    if !options.tags.is_empty() {
        metadata["tags"] = json!(options.tags);
    }
    metadata
}

/// Adds a second condition when the template needs a newer host than the
/// requested minimum. Both conditions are kept; the stricter wins.
fn raise_minimum(metadata: &mut Value, options: &TemplateOptions, floor: &str, reason: &str) {
    let requested = contentpack_core::SemanticVersion::parse(&options.min_version).ok();
    let floor_version = contentpack_core::SemanticVersion::parse(floor).ok();
    if requested >= floor_version {
        return;
    }
    if let Some(conditions) = metadata["compatibility_conditions"].as_array_mut() {
        conditions.push(json!({
            "type": "version_range",
            "min_version": floor,
            "reason": reason,
        }));
    }
}

fn database(ident: &str) -> Value {
    json!([
        format!(
            "CREATE TABLE IF NOT EXISTS {ident}_data (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL, value TEXT, created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP);"
        ),
        format!(
            "INSERT OR IGNORE INTO {ident}_data (name, value) VALUES ('example_item_1', 'Example value 1'), ('example_item_2', 'Example value 2');"
        ),
    ])
}

fn memory_state(ident: &str) -> Value {
    let mut state = Map::new();
    state.insert(
        ident.to_string(),
        json!({
            "settings": { "enabled": true, "debug_mode": false, "max_items": 100 },
            "data": {
                "example_key": "example_value",
                "items": [{ "id": 1, "name": "Item 1" }, { "id": 2, "name": "Item 2" }],
            },
        }),
    );
    Value::Object(state)
}

fn timeline_state(options: &TemplateOptions) -> Value {
    json!({
        "events": [{
            "timestamp": options.date_exported,
            "type": "system",
            "description": format!("{} content pack installed", options.name),
            "metadata": { "source": "content_pack", "pack_name": options.name },
        }]
    })
}
