//! Field paths over unstructured documents
//!
//! Composition resources arrive as opaque JSON. This crate is the single
//! place that knows how to address a value inside one:
//!
//! - [`FieldPath`]: parsed `metadata.annotations["key"]`-style paths
//! - [`StructuredDocument`]: `get_string` / `set_string` over a document
//!
//! # Example
//!
//! ```rust
//! use importer_fieldpath::{FieldPath, StructuredDocument};
//! use serde_json::json;
//!
//! let mut doc = json!({"metadata": {"name": "test"}});
//! let path = FieldPath::annotation("crossplane.io/external-name");
//!
//! doc.set_string(&path, "sg-123").unwrap();
//! assert_eq!(doc.get_string(&path).unwrap(), "sg-123");
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod document;
mod path;

pub use document::{DocumentError, StructuredDocument};
pub use path::{FieldPath, PathError, Segment};
