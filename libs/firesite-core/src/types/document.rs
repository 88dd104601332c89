use crate::constants::field;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type Fields = Map<String, Value>;

/// A record of the remote store. The store-assigned id is kept in the `id` field.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Fields);

impl Document {
    pub fn new<S: Into<String>>(id: S, mut fields: Fields) -> Self {
        fields.insert(field::ID.into(), Value::String(id.into()));
        Self(fields)
    }

    pub fn id(&self) -> &str {
        self.0.get(field::ID).and_then(Value::as_str).unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Seconds since epoch of the last update, if stamped.
    pub fn lastmod(&self) -> Option<f64> {
        self.0.get(field::LASTMOD).and_then(Value::as_f64)
    }

    pub fn fields(&self) -> &Fields {
        &self.0
    }

    pub fn into_fields(self) -> Fields {
        self.0
    }

    /// Shallow merge: fields in `partial` overwrite, everything else is kept.
    /// The id never changes.
    pub fn merge(&mut self, partial: &Fields) {
        for (key, value) in partial {
            if key != field::ID {
                self.0.insert(key.clone(), value.clone());
            }
        }
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        Value::Object(doc.0)
    }
}
