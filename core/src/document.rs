use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub type DocId = u32;

/// A catalogued source record.
///
/// `title` and `description` are the indexed text. Every other field of the
/// source record is kept as its JSON text in `extra` so the catalog can hand
/// back the full record for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl Document {
    pub fn new(id: DocId, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self { id, title: title.into(), description: description.into(), extra: BTreeMap::new() }
    }

    /// Validate and convert one JSON record.
    pub fn from_value(value: Value) -> Result<Self> {
        let mut obj = match value {
            Value::Object(obj) => obj,
            other => return Err(Error::format(format!("expected a JSON object, got {}", kind(&other)))),
        };
        let id = obj
            .remove("id")
            .ok_or_else(|| Error::format("record has no \"id\" field"))
            .and_then(|v| parse_id(&v))?;
        let title = take_text(&mut obj, "title", id)?;
        let description = take_text(&mut obj, "description", id)?;
        let extra = obj
            .into_iter()
            .map(|(k, v)| Ok((k, serde_json::to_string(&v)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(Self { id, title, description, extra })
    }

    /// The text that gets tokenized for this document.
    pub fn indexed_text(&self) -> String {
        format!("{} {}", self.title, self.description)
    }

    pub fn extra_value(&self, key: &str) -> Option<Value> {
        self.extra.get(key).and_then(|raw| serde_json::from_str(raw).ok())
    }

    /// Rebuild the original record as JSON.
    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("id".into(), Value::from(self.id));
        obj.insert("title".into(), Value::String(self.title.clone()));
        obj.insert("description".into(), Value::String(self.description.clone()));
        for key in self.extra.keys() {
            if let Some(v) = self.extra_value(key) {
                obj.insert(key.clone(), v);
            }
        }
        Value::Object(obj)
    }
}

/// Parse a document collection.
///
/// Accepts an array of records, an object wrapping the array under `movies`
/// or `documents`, or a single record object.
pub fn parse_collection(value: Value) -> Result<Vec<Document>> {
    match value {
        Value::Array(records) => records.into_iter().map(Document::from_value).collect(),
        Value::Object(mut obj) => {
            for key in ["movies", "documents"] {
                if let Some(inner) = obj.remove(key) {
                    return match inner {
                        Value::Array(records) => records.into_iter().map(Document::from_value).collect(),
                        other => Err(Error::format(format!("\"{key}\" must be an array, got {}", kind(&other)))),
                    };
                }
            }
            Document::from_value(Value::Object(obj)).map(|d| vec![d])
        }
        other => Err(Error::format(format!("expected an array or object of records, got {}", kind(&other)))),
    }
}

fn parse_id(v: &Value) -> Result<DocId> {
    let parsed = match v {
        Value::Number(n) => n.as_u64().and_then(|n| DocId::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<DocId>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| Error::format(format!("\"id\" must be a non-negative integer, got {v}")))
}

fn take_text(obj: &mut Map<String, Value>, field: &str, id: DocId) -> Result<String> {
    match obj.remove(field) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(Error::format(format!("document {id}: \"{field}\" must be a string, got {}", kind(&other)))),
        None => Err(Error::format(format!("document {id}: missing \"{field}\" field"))),
    }
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keeps_extra_fields() {
        let doc = Document::from_value(json!({
            "id": 7,
            "title": "Heat",
            "description": "A heist.",
            "year": 1995,
        }))
        .unwrap();
        assert_eq!(doc.id, 7);
        assert_eq!(doc.indexed_text(), "Heat A heist.");
        assert_eq!(doc.extra_value("year"), Some(json!(1995)));
        assert_eq!(doc.to_value()["year"], json!(1995));
    }

    #[test]
    fn accepts_numeric_string_id() {
        let doc = Document::from_value(json!({"id": " 12", "title": "", "description": ""})).unwrap();
        assert_eq!(doc.id, 12);
    }

    #[test]
    fn rejects_missing_id() {
        let err = Document::from_value(json!({"title": "x", "description": "y"})).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn rejects_bad_id_and_fields() {
        for v in [
            json!({"id": -1, "title": "x", "description": "y"}),
            json!({"id": "abc", "title": "x", "description": "y"}),
            json!({"id": 1, "title": 3, "description": "y"}),
            json!({"id": 1, "title": "x"}),
            json!("just a string"),
        ] {
            assert!(matches!(Document::from_value(v), Err(Error::Format(_))));
        }
    }

    #[test]
    fn parses_wrapped_and_bare_collections() {
        let wrapped = json!({"movies": [{"id": 1, "title": "a", "description": "b"}]});
        assert_eq!(parse_collection(wrapped).unwrap().len(), 1);

        let bare = json!([
            {"id": 1, "title": "a", "description": "b"},
            {"id": 2, "title": "c", "description": "d"},
        ]);
        assert_eq!(parse_collection(bare).unwrap().len(), 2);

        assert!(matches!(parse_collection(json!({"movies": 3})), Err(Error::Format(_))));
        assert!(matches!(parse_collection(json!(42)), Err(Error::Format(_))));
    }
}
