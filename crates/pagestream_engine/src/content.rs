use serde_json::{Map, Value};

/// Row-shaped view of a decoded page body, resolved once when the output is built.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    /// `null`, an empty array or an empty object. Signals depletion.
    Empty,
    /// An array of objects, one row each.
    Records(Vec<Map<String, Value>>),
    /// A single object, one row.
    Record(Map<String, Value>),
    /// An array of non-object values, one row each.
    Scalars(Vec<Value>),
    /// Anything else: a bare scalar or an array mixing objects and scalars.
    Opaque(Value),
}

impl Content {
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => Content::Empty,
            Value::Array(items) if items.is_empty() => Content::Empty,
            Value::Array(items) => {
                if items.iter().all(Value::is_object) {
                    Content::Records(
                        items
                            .into_iter()
                            .filter_map(|item| match item {
                                Value::Object(map) => Some(map),
                                _ => None,
                            })
                            .collect(),
                    )
                } else if items.iter().any(Value::is_object) {
                    Content::Opaque(Value::Array(items))
                } else {
                    Content::Scalars(items)
                }
            }
            Value::Object(map) if map.is_empty() => Content::Empty,
            Value::Object(map) => Content::Record(map),
            // Some APIs return their payload as a JSON document inside a JSON string.
            Value::String(text) => match serde_json::from_str::<Value>(&text) {
                Ok(inner @ (Value::Array(_) | Value::Object(_) | Value::Null)) => {
                    Content::from_json(inner)
                }
                _ => Content::Opaque(Value::String(text)),
            },
            other => Content::Opaque(other),
        }
    }

    /// Decode a response body. An empty body is empty content.
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Content::Empty);
        }
        serde_json::from_slice(body).map(Content::from_json)
    }

    pub fn row_count(&self) -> usize {
        match self {
            Content::Empty => 0,
            Content::Records(rows) => rows.len(),
            Content::Scalars(values) => values.len(),
            Content::Record(_) | Content::Opaque(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    pub fn to_json(&self) -> Value {
        match self {
            Content::Empty => Value::Array(Vec::new()),
            Content::Records(rows) => {
                Value::Array(rows.iter().cloned().map(Value::Object).collect())
            }
            Content::Record(map) => Value::Object(map.clone()),
            Content::Scalars(values) => Value::Array(values.clone()),
            Content::Opaque(value) => value.clone(),
        }
    }
}
