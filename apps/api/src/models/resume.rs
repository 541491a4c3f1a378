use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

/// Output of the parse stage. Staged as `parsed/<stem>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedRecord {
    pub content: String,
    #[serde(default)]
    pub links: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub original_filename: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    /// Any additional keys the model produced (description, location, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Education {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The canonical resume shape every downstream consumer reads.
///
/// Every field is optional: a missing field is tolerated, a field of the
/// wrong JSON type is not (see [`validate_canonical`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub experience: Vec<Experience>,
    #[serde(default)]
    pub education: Vec<Education>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_filename: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Keys owned by the pipeline rather than by the model.
pub const PROVENANCE_FIELDS: &[&str] = &["timestamp", "source_file", "original_filename"];

const STRING_FIELDS: &[&str] = &["name", "email", "phone", "location"];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("expected a JSON object at the top level, found {found}")]
    NotAnObject { found: &'static str },

    #[error("field '{field}' must be {expected}, found {found}")]
    WrongType {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("record could not be decoded: {0}")]
    Decode(String),
}

/// Checks the top-level shape of a model payload and decodes it.
///
/// `null` is accepted anywhere a field may be absent and is dropped before
/// decoding, so `{"email": null}` and `{}` produce the same record.
pub fn validate_canonical(value: Value) -> Result<CanonicalRecord, SchemaError> {
    let mut object = match value {
        Value::Object(object) => object,
        other => {
            return Err(SchemaError::NotAnObject {
                found: json_type(&other),
            })
        }
    };

    object.retain(|_, v| !v.is_null());

    for field in STRING_FIELDS {
        if let Some(v) = object.get(*field) {
            expect_string(field, v)?;
        }
    }

    if let Some(skills) = object.get("skills") {
        let items = expect_array("skills", skills)?;
        for (i, item) in items.iter().enumerate() {
            expect_string(&format!("skills[{i}]"), item)?;
        }
    }

    validate_entries(&mut object, "experience", &["title", "company", "duration"])?;
    validate_entries(&mut object, "education", &["institution"])?;

    serde_json::from_value(Value::Object(object)).map_err(|e| SchemaError::Decode(e.to_string()))
}

fn validate_entries(
    object: &mut Map<String, Value>,
    field: &str,
    string_keys: &[&str],
) -> Result<(), SchemaError> {
    let Some(value) = object.get_mut(field) else {
        return Ok(());
    };
    let entries = match value {
        Value::Array(entries) => entries,
        other => {
            return Err(SchemaError::WrongType {
                field: field.to_string(),
                expected: "an array",
                found: json_type(other),
            })
        }
    };

    for (i, entry) in entries.iter_mut().enumerate() {
        let entry = match entry {
            Value::Object(entry) => entry,
            other => {
                return Err(SchemaError::WrongType {
                    field: format!("{field}[{i}]"),
                    expected: "an object",
                    found: json_type(other),
                })
            }
        };
        entry.retain(|_, v| !v.is_null());
        for key in string_keys {
            if let Some(v) = entry.get(*key) {
                expect_string(&format!("{field}[{i}].{key}"), v)?;
            }
        }
    }
    Ok(())
}

fn expect_string(field: &str, value: &Value) -> Result<(), SchemaError> {
    if value.is_string() {
        Ok(())
    } else {
        Err(SchemaError::WrongType {
            field: field.to_string(),
            expected: "a string",
            found: json_type(value),
        })
    }
}

fn expect_array<'a>(field: &str, value: &'a Value) -> Result<&'a Vec<Value>, SchemaError> {
    value.as_array().ok_or_else(|| SchemaError::WrongType {
        field: field.to_string(),
        expected: "an array",
        found: json_type(value),
    })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Row shape of the `resumes` table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResumeRow {
    pub id: Uuid,
    pub identity_key: String,
    pub data: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
