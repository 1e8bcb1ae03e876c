//! Error types for the importer core
//!
//! One enum per layer, folded into [`ReconcileError`] at the pass boundary:
//! - [`InputError`]: malformed Function input
//! - [`FilterError`]: dynamic filter values that cannot be resolved
//! - [`GatewayError`]: tag-index transport and identity extraction failures
//! - [`ResourceError`]: resource set lookups and document writes
//! - [`RequestError`]: RunFunction envelopes that cannot be decoded
//!
//! Every variant of [`ReconcileError`] aborts the whole pass. Only
//! [`ReconcileError::IndexUnavailable`] is worth retrying.

use importer_fieldpath::{DocumentError, PathError};

/// Failure of a reconciliation pass
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// Function input is structurally invalid
    #[error("invalid Function input: {0}")]
    Validation(#[from] InputError),

    /// A `valuePath` filter does not exist in the composite resource
    #[error("cannot resolve tag filters for {composition_name:?}: {source}")]
    UnresolvablePath {
        composition_name: String,
        #[source]
        source: FilterError,
    },

    /// More than one external resource satisfies the predicates
    #[error("found more than one resource matching tag filters for {composition_name:?}: {candidates:?}")]
    AmbiguousMatch {
        composition_name: String,
        candidates: Vec<String>,
    },

    /// A unique match carries no adoptable identity
    #[error("found resource {resource_ref:?} matching tag filters for {composition_name:?}, but {tag:?} tag is not present or is empty")]
    IdentityTagMissing {
        composition_name: String,
        resource_ref: String,
        tag: String,
    },

    /// Tag index could not be queried
    #[error("cannot get resources tag mappings: {0}")]
    IndexUnavailable(#[source] IndexError),

    /// Resource set construction or identity write failed
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// Request envelope could not be decoded
    #[error(transparent)]
    Request(#[from] RequestError),
}

impl ReconcileError {
    /// Check if the pass may succeed when the orchestrator runs it again
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::IndexUnavailable(_))
    }

    /// Attach the composition name to a gateway failure
    pub(crate) fn from_gateway(composition_name: &str, error: GatewayError) -> Self {
        match error {
            GatewayError::IndexUnavailable(source) => Self::IndexUnavailable(source),
            GatewayError::IdentityTagMissing { resource_ref, tag } => Self::IdentityTagMissing {
                composition_name: composition_name.to_string(),
                resource_ref,
                tag,
            },
        }
    }
}

/// Function input validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    /// Request carried no input at all
    #[error("Function input is missing")]
    Missing,

    /// Input could not be decoded
    #[error("cannot decode Function input: {0}")]
    Decode(String),

    /// `resourceName` given but empty
    #[error("resourceName must not be empty")]
    EmptyResourceName,

    /// Tag filter without a key
    #[error(r#"invalid tag filter #{index}: "key" must not be empty"#)]
    EmptyKey { index: usize },

    /// Tag filter without a strategy
    #[error(r#"invalid tag filter {key:?}: "strategy" must not be empty"#)]
    EmptyStrategy { key: String },

    /// Unknown strategy name
    #[error("invalid tag filter {key:?}: invalid strategy {strategy:?}, valid options are: [value valuePath]")]
    InvalidStrategy { key: String, strategy: String },

    /// `value` strategy without a value
    #[error(r#"invalid tag filter {key:?}: using "value" strategy, but "value" is empty"#)]
    EmptyValue { key: String },

    /// `valuePath` strategy without a path
    #[error(r#"invalid tag filter {key:?}: using "valuePath" strategy, but "valuePath" is empty"#)]
    EmptyValuePath { key: String },

    /// `valuePath` is not a parseable field path
    #[error("invalid tag filter {key:?}: {source}")]
    InvalidValuePath {
        key: String,
        #[source]
        source: PathError,
    },
}

/// Filter resolution errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    /// Dynamic value missing from the reference object
    #[error("getting valuePath ({path}) for tag {key:?} from composite resource: {source}")]
    UnresolvablePath {
        key: String,
        path: String,
        #[source]
        source: DocumentError,
    },
}

/// Tag-index gateway errors
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Transport or pagination failure
    #[error("cannot get resources tag mappings: {0}")]
    IndexUnavailable(#[from] IndexError),

    /// Unique match without the identity tag
    #[error("resource {resource_ref:?} has no non-empty {tag:?} tag")]
    IdentityTagMissing { resource_ref: String, tag: String },
}

/// Error reported by a tag index implementation
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct IndexError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl IndexError {
    /// Create error from a message
    #[inline]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create error wrapping an underlying cause
    #[inline]
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Human-readable message
    #[inline]
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Request envelope errors
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// Envelope is not valid JSON for the request schema
    #[error("cannot decode RunFunction request: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Resource set errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResourceError {
    /// No desired resource with this composition name
    #[error("cannot get desired composed resource {0:?}")]
    UnknownResource(String),

    /// Reading or writing a document field failed
    #[error("composed resource {composition_name:?}: {source}")]
    Document {
        composition_name: String,
        #[source]
        source: DocumentError,
    },

    /// Attempt to replace an identity already recorded for the resource
    #[error("composed resource {composition_name:?} already has external name {current:?}, refusing to set {proposed:?}")]
    IdentityConflict {
        composition_name: String,
        current: String,
        proposed: String,
    },

    /// Attempt to record an empty identity
    #[error("refusing to set an empty external name on {0:?}")]
    EmptyIdentity(String),
}
