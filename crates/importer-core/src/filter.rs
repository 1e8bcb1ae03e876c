//! Tag predicate resolution
//!
//! Turns the validated input filters plus the target resource into the
//! predicate list sent to the tag index. Every list ends with the two
//! implicit predicates the provider stamps on everything it creates.

use crate::error::FilterError;
use crate::input::{FilterValue, TagFilter};
use crate::resources::Resource;
use importer_fieldpath::StructuredDocument;
use serde::{Deserialize, Serialize};

/// Implicit tag carrying the resource's `metadata.name`
pub const NAME_TAG_KEY: &str = "crossplane-name";

/// Implicit tag carrying the resource's lower-cased group-kind
pub const KIND_TAG_KEY: &str = "crossplane-kind";

/// One tag constraint: the tag `key` must equal one of `values`
///
/// Predicates in a query are conjunctive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Predicate {
    pub key: String,
    pub values: Vec<String>,
}

impl Predicate {
    /// Predicate matching exactly one value
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            values: vec![value.into()],
        }
    }
}

/// Build the predicate list for `target`
///
/// Explicit filters come first in input order, followed by the name and
/// kind predicates. `valuePath` filters read from `reference`, normally
/// the observed composite resource; an empty string there is a valid
/// match value.
///
/// # Errors
/// [`FilterError::UnresolvablePath`] when a `valuePath` is absent from
/// `reference` or does not hold a string.
pub fn resolve_filters<D>(
    filters: &[TagFilter],
    reference: &D,
    target: &Resource,
) -> Result<Vec<Predicate>, FilterError>
where
    D: StructuredDocument + ?Sized,
{
    let mut predicates = Vec::with_capacity(filters.len() + 2);

    for filter in filters {
        let value = match filter.value() {
            FilterValue::Static(value) => value.clone(),
            FilterValue::FromPath(path) => {
                reference
                    .get_string(path)
                    .map_err(|source| FilterError::UnresolvablePath {
                        key: filter.key().to_string(),
                        path: path.to_string(),
                        source,
                    })?
            }
        };
        predicates.push(Predicate::new(filter.key(), value));
    }

    predicates.push(Predicate::new(NAME_TAG_KEY, target.platform_name()));
    predicates.push(Predicate::new(KIND_TAG_KEY, target.group_kind()));
    Ok(predicates)
}
