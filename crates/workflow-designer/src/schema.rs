//! Form schemas and field lookup
//!
//! Forms are owned by an external store. Their schema may arrive already
//! decoded or as a JSON string, and option lists inside it have no fixed
//! shape. This module turns whatever arrives into [`FieldInfo`] values the
//! condition rule engine can work with.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{DesignerError, Result};
use crate::types::{FormRef, RecordId};

/// The input type of a form field
///
/// Type names this crate does not know are kept as [`FieldType::Other`] so
/// they are written back as they were read.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    Text,
    Textarea,
    Email,
    Number,
    Date,
    Select,
    Radio,
    Checkbox,
    Relation,
    #[default]
    Unknown,
    Other(String),
}

impl FieldType {
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::Text => "text",
            FieldType::Textarea => "textarea",
            FieldType::Email => "email",
            FieldType::Number => "number",
            FieldType::Date => "date",
            FieldType::Select => "select",
            FieldType::Radio => "radio",
            FieldType::Checkbox => "checkbox",
            FieldType::Relation => "relation",
            FieldType::Unknown => "unknown",
            FieldType::Other(name) => name.as_str(),
        }
    }

    /// Whether values of this type are free text
    pub fn is_text_like(&self) -> bool {
        matches!(self, FieldType::Text | FieldType::Textarea | FieldType::Email)
    }

    /// Whether values of this type are picked from a list of options
    pub fn has_options(&self) -> bool {
        matches!(
            self,
            FieldType::Select | FieldType::Radio | FieldType::Checkbox | FieldType::Relation
        )
    }
}

impl From<String> for FieldType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "text" => FieldType::Text,
            "textarea" => FieldType::Textarea,
            "email" => FieldType::Email,
            "number" => FieldType::Number,
            "date" => FieldType::Date,
            "select" => FieldType::Select,
            "radio" => FieldType::Radio,
            "checkbox" => FieldType::Checkbox,
            "relation" => FieldType::Relation,
            "" | "unknown" => FieldType::Unknown,
            _ => FieldType::Other(value.clone()),
        }
    }
}

impl From<FieldType> for String {
    fn from(value: FieldType) -> Self {
        match value {
            FieldType::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

/// Accept a field id written either as a string or as a number
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number field id, found {}",
            other
        ))),
    }
}

/// A field definition inside a form schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    /// Raw option list as stored; see [`normalize_field_options`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<serde_json::Value>>,
}

/// A decoded form schema
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FormSchema {
    #[serde(default)]
    pub fields: Vec<FormField>,
}

/// A form schema as delivered by the store: decoded, or still a JSON string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaPayload {
    Encoded(String),
    Decoded(FormSchema),
}

impl SchemaPayload {
    /// Decode the payload into a schema
    pub fn decode(&self) -> Result<FormSchema> {
        match self {
            SchemaPayload::Decoded(schema) => Ok(schema.clone()),
            SchemaPayload::Encoded(raw) => serde_json::from_str(raw)
                .map_err(|e| DesignerError::SchemaDecode(e.to_string())),
        }
    }
}

/// A form as returned by the form schema provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormDocument {
    pub id: RecordId,
    pub title: String,
    #[serde(default)]
    pub schema: Option<SchemaPayload>,
}

impl FormDocument {
    /// The form's fields, or an empty list when the schema is missing or malformed
    pub fn fields_or_empty(&self) -> Vec<FormField> {
        match &self.schema {
            Some(payload) => match payload.decode() {
                Ok(schema) => schema.fields,
                Err(e) => {
                    log::warn!("Form '{}' has an unreadable schema, using no fields: {}", self.id, e);
                    Vec::new()
                }
            },
            None => {
                log::debug!("Form '{}' has no schema", self.id);
                Vec::new()
            }
        }
    }

    /// Snapshot of this form for storing inside node data
    pub fn to_form_ref(&self) -> FormRef {
        FormRef::new(self.id.clone(), self.title.clone()).with_fields(self.fields_or_empty())
    }
}

/// A selectable option of a field
///
/// `value` is what the form store sent, not necessarily a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOption {
    pub value: serde_json::Value,
    pub label: String,
}

impl FieldOption {
    /// The value as it appears in a rule's value text
    pub fn value_text(&self) -> String {
        scalar_to_string(&self.value)
    }
}

fn scalar_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Normalize a heterogeneous option list into `{value, label}` pairs
///
/// Strings become self-labelled options. Objects carrying a `value` key keep
/// their value as sent; a missing label shows the value. Anything else is
/// serialized and used as both value and label.
pub fn normalize_field_options(options: &[serde_json::Value]) -> Vec<FieldOption> {
    options
        .iter()
        .map(|option| match option {
            serde_json::Value::String(s) => FieldOption {
                value: option.clone(),
                label: s.clone(),
            },
            serde_json::Value::Object(map) if map.contains_key("value") => {
                let value = map.get("value").cloned().unwrap_or_default();
                let label = map
                    .get("label")
                    .map(scalar_to_string)
                    .unwrap_or_else(|| scalar_to_string(&value));
                FieldOption { value, label }
            }
            other => {
                let text = other.to_string();
                FieldOption {
                    value: serde_json::Value::String(text.clone()),
                    label: text,
                }
            }
        })
        .collect()
}

/// A resolved field, ready for rule editing
#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    pub id: String,
    pub label: String,
    pub field_type: FieldType,
    pub options: Vec<FieldOption>,
}

impl From<&FormField> for FieldInfo {
    fn from(field: &FormField) -> Self {
        Self {
            id: field.id.clone(),
            label: field.label.clone(),
            field_type: field.field_type.clone(),
            options: field
                .options
                .as_deref()
                .map(normalize_field_options)
                .unwrap_or_default(),
        }
    }
}

/// Sentinel field id meaning "no field chosen"
pub const NO_FIELD: &str = "none";

/// Decoded forms known to the session, keyed by form id
#[derive(Debug, Clone, Default)]
pub struct FormCatalog {
    forms: HashMap<RecordId, CatalogEntry>,
}

#[derive(Debug, Clone)]
struct CatalogEntry {
    title: String,
    fields: Vec<FormField>,
}

impl FormCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a form, decoding its schema
    pub fn insert(&mut self, form: &FormDocument) {
        self.forms.insert(
            form.id.clone(),
            CatalogEntry {
                title: form.title.clone(),
                fields: form.fields_or_empty(),
            },
        );
    }

    /// Add or replace a form from a snapshot already stored in node data
    pub fn insert_snapshot(&mut self, form: &FormRef) {
        if let Some(fields) = &form.fields {
            self.forms.insert(
                form.id.clone(),
                CatalogEntry {
                    title: form.title.clone(),
                    fields: fields.clone(),
                },
            );
        }
    }

    pub fn contains(&self, form_id: &RecordId) -> bool {
        self.forms.contains_key(form_id)
    }

    pub fn title(&self, form_id: &RecordId) -> Option<&str> {
        self.forms.get(form_id).map(|entry| entry.title.as_str())
    }

    /// All fields of a form, resolved for rule editing
    pub fn fields(&self, form_id: &RecordId) -> Vec<FieldInfo> {
        self.forms
            .get(form_id)
            .map(|entry| entry.fields.iter().map(FieldInfo::from).collect())
            .unwrap_or_default()
    }

    /// Look up a single field of a form
    ///
    /// Absent when either id is missing, the field id is the `none`
    /// sentinel, or the form or field is unknown.
    pub fn resolve_field(&self, form_id: Option<&RecordId>, field_id: Option<&str>) -> Option<FieldInfo> {
        let form_id = form_id?;
        let field_id = field_id.filter(|id| !id.is_empty() && *id != NO_FIELD)?;
        self.forms
            .get(form_id)?
            .fields
            .iter()
            .find(|field| field.id == field_id)
            .map(FieldInfo::from)
    }
}
