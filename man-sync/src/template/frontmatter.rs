//! Frontmatter builder: render configured `(key, template, type)` triples
//! into a typed record, then convert that record to metadata values.

use super::engine::TemplateEngine;
use super::filters::{to_text, MULTI_VALUE_DELIMITER};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use strum::{Display, EnumString};

/// Metadata key marking a note as managed by the sync
pub const MARKER_KEY: &str = "man";
pub const MARKER_VALUE: &str = "man";
/// Metadata key holding the list entry id
pub const ID_KEY: &str = "id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    List,
    Number,
    Checkbox,
    Date,
    Datetime,
}

/// One configured frontmatter field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontmatterEntry {
    pub key: String,
    pub value: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
}

impl FrontmatterEntry {
    pub fn new(key: &str, value: &str, field_type: FieldType) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
            field_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderedValue {
    Scalar(String),
    List(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedField {
    pub value: RenderedValue,
    pub field_type: FieldType,
}

/// Rendered record, in configured order; a repeated key keeps its first
/// position and its last value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frontmatter {
    fields: Vec<(String, RenderedField)>,
}

impl Frontmatter {
    fn set(&mut self, key: &str, field: RenderedField) {
        match self.fields.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = field,
            None => self.fields.push((key.to_string(), field)),
        }
    }

    /// Typed metadata values, ready to be merged into a note
    pub fn to_metadata(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .map(|(key, field)| (key.clone(), metadata_value(field)))
            .collect()
    }
}

/// Fields every managed note carries; they override user fields of the same key
pub fn required_fields() -> Vec<FrontmatterEntry> {
    vec![
        FrontmatterEntry::new(ID_KEY, "{{id}}", FieldType::Number),
        FrontmatterEntry::new(MARKER_KEY, MARKER_VALUE, FieldType::Text),
    ]
}

pub fn build_frontmatter(
    engine: &TemplateEngine,
    fields: &[FrontmatterEntry],
    context: &Value,
) -> Frontmatter {
    let mut frontmatter = Frontmatter::default();

    for field in fields.iter().chain(required_fields().iter()) {
        let key = field.key.trim();
        if key.is_empty() {
            continue;
        }
        let rendered = engine.render_value(&field.value, context);
        let value = match field.field_type {
            FieldType::List => RenderedValue::List(to_list(&rendered)),
            _ => RenderedValue::Scalar(to_text(&rendered)),
        };
        frontmatter.set(
            key,
            RenderedField {
                value,
                field_type: field.field_type,
            },
        );
    }

    frontmatter
}

fn to_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| to_text(item).trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        other => {
            let text = to_text(other);
            let pieces: Vec<&str> = if text.contains(MULTI_VALUE_DELIMITER) {
                text.split(MULTI_VALUE_DELIMITER).collect()
            } else {
                text.lines().collect()
            };
            pieces
                .into_iter()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        }
    }
}

fn metadata_value(field: &RenderedField) -> Value {
    let text = match &field.value {
        RenderedValue::List(items) => {
            return Value::Array(items.iter().cloned().map(Value::String).collect());
        }
        RenderedValue::Scalar(text) => text,
    };

    match field.field_type {
        FieldType::Text => Value::String(text.clone()),
        _ if text.trim().is_empty() => Value::Null,
        FieldType::Number => parse_number(text.trim()).unwrap_or_else(|| Value::String(text.clone())),
        FieldType::Checkbox => match text.trim().to_ascii_lowercase().as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(text.clone()),
        },
        FieldType::Date | FieldType::Datetime | FieldType::List => Value::String(text.clone()),
    }
}

fn parse_number(text: &str) -> Option<Value> {
    if let Ok(n) = text.parse::<i64>() {
        return Some(Value::Number(n.into()));
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}
