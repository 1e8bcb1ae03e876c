//! Function input
//!
//! [`Input`] is the wire form embedded in the composition pipeline step.
//! Validation turns it into [`ValidatedInput`], whose [`TagFilter`]s carry a
//! tagged [`FilterValue`], so a filter with a mismatched strategy/value pair
//! cannot exist past this module.

use crate::error::InputError;
use importer_fieldpath::FieldPath;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// API version of the input document
pub const INPUT_API_VERSION: &str = "template.fn.crossplane.io/v1beta1";

/// Kind of the input document
pub const INPUT_KIND: &str = "Input";

/// Function input as written in the composition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Input {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Restricts the pass to a single composed resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
    /// Filters applied to every resource in scope
    #[serde(default)]
    pub tag_filters: Vec<TagFilterSpec>,
}

impl Input {
    /// Create an input in multi-resource mode
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            api_version: Some(INPUT_API_VERSION.to_string()),
            kind: Some(INPUT_KIND.to_string()),
            ..Self::default()
        }
    }

    /// Restrict to one composed resource
    #[inline]
    #[must_use]
    pub fn with_resource_name(mut self, name: impl Into<String>) -> Self {
        self.resource_name = Some(name.into());
        self
    }

    /// Add a tag filter
    #[inline]
    #[must_use]
    pub fn with_filter(mut self, filter: TagFilterSpec) -> Self {
        self.tag_filters.push(filter);
        self
    }

    /// Decode from the request's embedded input object
    ///
    /// # Errors
    /// Returns [`InputError::Decode`] when the value does not match the schema.
    pub fn from_value(value: serde_json::Value) -> Result<Self, InputError> {
        serde_json::from_value(value).map_err(|e| InputError::Decode(e.to_string()))
    }

    /// Validate structure and build the typed filters
    ///
    /// Filters are checked in order and the first violation is reported.
    ///
    /// # Errors
    /// Any [`InputError`] describing the first invalid field.
    pub fn validate(&self) -> Result<ValidatedInput, InputError> {
        if matches!(&self.resource_name, Some(name) if name.is_empty()) {
            return Err(InputError::EmptyResourceName);
        }

        let filters = self
            .tag_filters
            .iter()
            .enumerate()
            .map(|(index, spec)| spec.validate(index))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ValidatedInput {
            resource_name: self.resource_name.clone(),
            filters,
        })
    }
}

/// Tag filter as written in the composition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagFilterSpec {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub strategy: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value_path: String,
}

impl TagFilterSpec {
    /// Filter matching a fixed tag value
    #[must_use]
    pub fn value(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            strategy: Strategy::Value.to_string(),
            value: value.into(),
            value_path: String::new(),
        }
    }

    /// Filter matching a value read from the composite resource
    #[must_use]
    pub fn value_path(key: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            strategy: Strategy::ValuePath.to_string(),
            value: String::new(),
            value_path: path.into(),
        }
    }

    fn validate(&self, index: usize) -> Result<TagFilter, InputError> {
        if self.key.is_empty() {
            return Err(InputError::EmptyKey { index });
        }
        if self.strategy.is_empty() {
            return Err(InputError::EmptyStrategy {
                key: self.key.clone(),
            });
        }

        let strategy: Strategy = self.strategy.parse().map_err(|()| InputError::InvalidStrategy {
            key: self.key.clone(),
            strategy: self.strategy.clone(),
        })?;

        let value = match strategy {
            Strategy::Value => {
                if self.value.is_empty() {
                    return Err(InputError::EmptyValue {
                        key: self.key.clone(),
                    });
                }
                FilterValue::Static(self.value.clone())
            }
            Strategy::ValuePath => {
                if self.value_path.is_empty() {
                    return Err(InputError::EmptyValuePath {
                        key: self.key.clone(),
                    });
                }
                let path = FieldPath::from_str(&self.value_path).map_err(|source| {
                    InputError::InvalidValuePath {
                        key: self.key.clone(),
                        source,
                    }
                })?;
                FilterValue::FromPath(path)
            }
        };

        Ok(TagFilter {
            key: self.key.clone(),
            value,
        })
    }
}

/// How a filter obtains its value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Fixed value from the input
    Value,
    /// Value read from a path on the composite resource
    ValuePath,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value => f.write_str("value"),
            Self::ValuePath => f.write_str("valuePath"),
        }
    }
}

impl FromStr for Strategy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "value" => Ok(Self::Value),
            "valuePath" => Ok(Self::ValuePath),
            _ => Err(()),
        }
    }
}

/// Source of a filter's match value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    /// Match this value verbatim
    Static(String),
    /// Match the string found at this path on the composite resource
    FromPath(FieldPath),
}

/// Validated tag filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFilter {
    key: String,
    value: FilterValue,
}

impl TagFilter {
    /// Tag key the filter applies to
    #[inline]
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Where the match value comes from
    #[inline]
    #[must_use]
    pub fn value(&self) -> &FilterValue {
        &self.value
    }
}

/// Input that passed validation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatedInput {
    resource_name: Option<String>,
    filters: Vec<TagFilter>,
}

impl ValidatedInput {
    /// Composition name the pass is restricted to, if any
    #[inline]
    #[must_use]
    pub fn resource_name(&self) -> Option<&str> {
        self.resource_name.as_deref()
    }

    /// Filters in input order
    #[inline]
    #[must_use]
    pub fn filters(&self) -> &[TagFilter] {
        &self.filters
    }
}
