//! Desired and observed composed resources for one pass
//!
//! [`ResourceSet`] owns copies of the desired resource bodies for the
//! duration of a pass and is the only place that writes the external-name
//! annotation. Both collections are insertion-ordered arenas keyed by
//! composition name; callers must not depend on that order for correctness.

use crate::envelope::{ComposedResource, State};
use crate::error::ResourceError;
use importer_fieldpath::{FieldPath, Segment, StructuredDocument};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::BTreeMap;

/// Annotation holding a managed resource's external name
pub const EXTERNAL_NAME_ANNOTATION: &str = "crossplane.io/external-name";

/// Identity view of one composed resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    composition_name: String,
    platform_name: String,
    group_kind: String,
    external_name: String,
}

impl Resource {
    fn from_document(
        composition_name: &str,
        document: &Value,
        annotation: &FieldPath,
    ) -> Result<Self, ResourceError> {
        let read = |path: &FieldPath| read_optional(composition_name, document, path);
        let name = FieldPath::field("metadata").child(Segment::field("name"));

        Ok(Self {
            composition_name: composition_name.to_string(),
            platform_name: read(&name)?,
            group_kind: group_kind(
                &read(&FieldPath::field("apiVersion"))?,
                &read(&FieldPath::field("kind"))?,
            ),
            external_name: read(annotation)?,
        })
    }

    /// Name assigned by the composition template
    #[inline]
    #[must_use]
    pub fn composition_name(&self) -> &str {
        &self.composition_name
    }

    /// The object's own `metadata.name`
    #[inline]
    #[must_use]
    pub fn platform_name(&self) -> &str {
        &self.platform_name
    }

    /// Lower-cased `Kind.group` (eg, `securitygroup.ec2.aws.upbound.io`)
    #[inline]
    #[must_use]
    pub fn group_kind(&self) -> &str {
        &self.group_kind
    }

    /// Resolved identity, empty when unresolved
    #[inline]
    #[must_use]
    pub fn external_name(&self) -> &str {
        &self.external_name
    }

    /// Check if an identity is known
    #[inline]
    #[must_use]
    pub fn has_identity(&self) -> bool {
        !self.external_name.is_empty()
    }
}

/// Absent fields read as empty, anything else malformed is an error
fn read_optional(
    composition_name: &str,
    document: &Value,
    path: &FieldPath,
) -> Result<String, ResourceError> {
    match document.get_string(path) {
        Ok(value) => Ok(value),
        Err(e) if e.is_not_found() => Ok(String::new()),
        Err(source) => Err(ResourceError::Document {
            composition_name: composition_name.to_string(),
            source,
        }),
    }
}

/// Lower-cased group-kind string derived from `apiVersion` and `kind`
///
/// Core resources (`apiVersion: v1`) have no group and yield just the kind.
#[must_use]
pub fn group_kind(api_version: &str, kind: &str) -> String {
    match api_version.rsplit_once('/') {
        Some((group, _version)) if !group.is_empty() => format!("{kind}.{group}").to_lowercase(),
        _ => kind.to_lowercase(),
    }
}

#[derive(Debug, Clone)]
struct DesiredEntry {
    resource: Resource,
    composed: ComposedResource,
}

/// Every desired and observed composed resource of a pass
#[derive(Debug, Clone)]
pub struct ResourceSet {
    desired: IndexMap<String, DesiredEntry>,
    observed: IndexMap<String, Resource>,
    annotation: FieldPath,
}

impl ResourceSet {
    /// Build from the request's observed and desired state
    ///
    /// Desired bodies are copied; the request itself is never modified.
    /// A desired resource starts with the identity of its observed
    /// counterpart, or failing that with an annotation its body already
    /// carries. A desired resource without `metadata.name` borrows the
    /// observed counterpart's name.
    ///
    /// # Errors
    /// [`ResourceError::Document`] when a name, kind or external-name field
    /// exists but is not a string.
    pub fn new(observed: Option<&State>, desired: Option<&State>) -> Result<Self, ResourceError> {
        let annotation = FieldPath::annotation(EXTERNAL_NAME_ANNOTATION);

        let mut observed_set = IndexMap::new();
        for (name, composed) in observed.map(|s| &s.resources).into_iter().flatten() {
            let resource = Resource::from_document(name, &composed.resource, &annotation)?;
            observed_set.insert(name.clone(), resource);
        }

        let mut desired_set = IndexMap::new();
        for (name, composed) in desired.map(|s| &s.resources).into_iter().flatten() {
            let mut resource = Resource::from_document(name, &composed.resource, &annotation)?;
            if let Some(seen) = observed_set.get(name) {
                if seen.has_identity() {
                    resource.external_name.clone_from(&seen.external_name);
                }
                if resource.platform_name.is_empty() {
                    resource.platform_name.clone_from(&seen.platform_name);
                }
            }
            desired_set.insert(
                name.clone(),
                DesiredEntry {
                    resource,
                    composed: composed.clone(),
                },
            );
        }

        Ok(Self {
            desired: desired_set,
            observed: observed_set,
            annotation,
        })
    }

    /// Check if the orchestrator already round-tripped every identity
    ///
    /// True iff at least one observed resource exists and all of them have
    /// a non-empty external name.
    #[must_use]
    pub fn all_identities_known(&self) -> bool {
        !self.observed.is_empty() && self.observed.values().all(Resource::has_identity)
    }

    /// Check if any desired resource carries an identity
    #[must_use]
    pub fn any_identity_resolved(&self) -> bool {
        self.desired.values().any(|e| e.resource.has_identity())
    }

    /// Write `identity` into the desired resource's external-name annotation
    ///
    /// Writing the identity a resource already has is a no-op on content,
    /// which is how known identities are re-asserted.
    ///
    /// # Errors
    /// - [`ResourceError::UnknownResource`] if there is no such desired resource
    /// - [`ResourceError::EmptyIdentity`] if `identity` is empty
    /// - [`ResourceError::IdentityConflict`] if a different identity is already recorded
    /// - [`ResourceError::Document`] if the annotation cannot be written
    pub fn set_identity(
        &mut self,
        composition_name: &str,
        identity: &str,
    ) -> Result<(), ResourceError> {
        let entry = self
            .desired
            .get_mut(composition_name)
            .ok_or_else(|| ResourceError::UnknownResource(composition_name.to_string()))?;

        if identity.is_empty() {
            return Err(ResourceError::EmptyIdentity(composition_name.to_string()));
        }
        if entry.resource.has_identity() && entry.resource.external_name != identity {
            return Err(ResourceError::IdentityConflict {
                composition_name: composition_name.to_string(),
                current: entry.resource.external_name.clone(),
                proposed: identity.to_string(),
            });
        }

        entry
            .composed
            .resource
            .set_string(&self.annotation, identity)
            .map_err(|source| ResourceError::Document {
                composition_name: composition_name.to_string(),
                source,
            })?;
        entry.resource.external_name = identity.to_string();
        Ok(())
    }

    /// Desired resources without a known identity
    pub fn unresolved_desired(&self) -> impl Iterator<Item = &Resource> {
        self.desired_resources().filter(|r| !r.has_identity())
    }

    /// All desired resources
    pub fn desired_resources(&self) -> impl Iterator<Item = &Resource> {
        self.desired.values().map(|e| &e.resource)
    }

    /// Desired resource by composition name
    #[must_use]
    pub fn desired(&self, composition_name: &str) -> Option<&Resource> {
        self.desired.get(composition_name).map(|e| &e.resource)
    }

    /// Observed resource by composition name
    #[must_use]
    pub fn observed(&self, composition_name: &str) -> Option<&Resource> {
        self.observed.get(composition_name)
    }

    /// Composition names of the desired resources
    #[must_use]
    pub fn desired_composition_names(&self) -> Vec<String> {
        self.desired.keys().cloned().collect()
    }

    /// Number of desired resources
    #[inline]
    #[must_use]
    pub fn len_desired(&self) -> usize {
        self.desired.len()
    }

    /// Number of observed resources
    #[inline]
    #[must_use]
    pub fn len_observed(&self) -> usize {
        self.observed.len()
    }

    /// Observed external names by composition name (empty when unknown)
    #[must_use]
    pub fn observed_identities(&self) -> BTreeMap<String, String> {
        self.observed
            .iter()
            .map(|(name, r)| (name.clone(), r.external_name.clone()))
            .collect()
    }

    /// Desired external names by composition name (empty when unresolved)
    #[must_use]
    pub fn desired_identities(&self) -> BTreeMap<String, String> {
        self.desired
            .iter()
            .map(|(name, e)| (name.clone(), e.resource.external_name.clone()))
            .collect()
    }

    /// Hand back the desired resource bodies, including written annotations
    #[must_use]
    pub fn into_desired_documents(self) -> IndexMap<String, ComposedResource> {
        self.desired
            .into_iter()
            .map(|(name, entry)| (name, entry.composed))
            .collect()
    }
}
