//! String accessors over unstructured documents
//!
//! [`StructuredDocument`] is the only view the reconciliation code has of a
//! resource body: read a string at a path, write a string at a path.

use crate::path::{FieldPath, Segment};
use serde_json::{Map, Value};

/// Narrow read/write access to string fields of a document
pub trait StructuredDocument {
    /// Read the string at `path`
    ///
    /// # Errors
    /// - [`DocumentError::NotFound`] if any segment of the path is absent
    /// - [`DocumentError::NotAString`] if the value exists but is not a string
    /// - [`DocumentError::TypeMismatch`] if an intermediate value cannot be traversed
    fn get_string(&self, path: &FieldPath) -> Result<String, DocumentError>;

    /// Write `value` at `path`, creating intermediate objects and arrays as needed
    ///
    /// # Errors
    /// Returns [`DocumentError::TypeMismatch`] when an existing intermediate
    /// value has the wrong shape for the next segment.
    fn set_string(&mut self, path: &FieldPath, value: &str) -> Result<(), DocumentError>;
}

impl StructuredDocument for Value {
    fn get_string(&self, path: &FieldPath) -> Result<String, DocumentError> {
        let mut current = self;
        for segment in path.segments() {
            current = match (segment, current) {
                (Segment::Field(name), Value::Object(map)) => map
                    .get(name)
                    .ok_or_else(|| DocumentError::not_found(path))?,
                (Segment::Index(position), Value::Array(items)) => items
                    .get(*position)
                    .ok_or_else(|| DocumentError::not_found(path))?,
                // Kubernetes treats a null parent the same as a missing one
                (_, Value::Null) => return Err(DocumentError::not_found(path)),
                (segment, other) => {
                    return Err(DocumentError::TypeMismatch {
                        path: path.to_string(),
                        expected: expected_container(segment),
                        found: kind_of(other),
                    })
                }
            };
        }

        match current {
            Value::String(s) => Ok(s.clone()),
            other => Err(DocumentError::NotAString {
                path: path.to_string(),
                found: kind_of(other),
            }),
        }
    }

    fn set_string(&mut self, path: &FieldPath, value: &str) -> Result<(), DocumentError> {
        let segments = path.segments();
        let mut current = self;

        for (i, segment) in segments.iter().enumerate() {
            if current.is_null() {
                *current = empty_container(segment);
            }

            let slot = match (segment, current) {
                (Segment::Field(name), Value::Object(map)) => {
                    map.entry(name.clone()).or_insert(Value::Null)
                }
                (Segment::Index(position), Value::Array(items)) => {
                    if items.len() <= *position {
                        items.resize(*position + 1, Value::Null);
                    }
                    &mut items[*position]
                }
                (segment, other) => {
                    return Err(DocumentError::TypeMismatch {
                        path: path.to_string(),
                        expected: expected_container(segment),
                        found: kind_of(other),
                    })
                }
            };

            if i + 1 == segments.len() {
                *slot = Value::String(value.to_string());
                return Ok(());
            }
            current = slot;
        }

        Ok(())
    }
}

fn empty_container(segment: &Segment) -> Value {
    match segment {
        Segment::Field(_) => Value::Object(Map::new()),
        Segment::Index(_) => Value::Array(Vec::new()),
    }
}

fn expected_container(segment: &Segment) -> &'static str {
    match segment {
        Segment::Field(_) => "object",
        Segment::Index(_) => "array",
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Errors reading or writing document fields
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    /// Path does not exist in the document
    #[error("{path}: no such field")]
    NotFound { path: String },

    /// Value exists but is not a string
    #[error("{path}: expected string, found {found}")]
    NotAString { path: String, found: &'static str },

    /// Intermediate value cannot be traversed by the next segment
    #[error("{path}: expected {expected}, found {found}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        found: &'static str,
    },
}

impl DocumentError {
    fn not_found(path: &FieldPath) -> Self {
        Self::NotFound {
            path: path.to_string(),
        }
    }

    /// Whether the error only means the field is absent
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
