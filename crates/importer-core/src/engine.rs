//! Reconciliation engine
//!
//! One [`Reconciler::reconcile`] call is one pass over a desired/observed
//! snapshot. The pass either converges, stops short with nothing to write,
//! or fails as a whole; a failing pass never hands back a partially
//! updated desired state.

use crate::envelope::{ComposedResource, State};
use crate::error::{ReconcileError, ResourceError};
use crate::filter::resolve_filters;
use crate::gateway::{Gateway, MatchResult};
use crate::input::{Input, TagFilter};
use crate::resources::{Resource, ResourceSet};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Result of a pass that did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Every identity that could be established is written
    Converged(Convergence),
    /// Nothing was written; the orchestrator should try again later
    PartiallyConverged(Pending),
}

/// Data of a converged pass
#[derive(Debug, Clone, PartialEq)]
pub struct Convergence {
    /// Desired composed resources to return, keyed by composition name
    pub resources: IndexMap<String, ComposedResource>,
    /// Identities discovered by this pass, in resolution order
    pub resolved: Vec<Resolution>,
    pub reason: ConvergedReason,
}

/// Why a pass converged
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvergedReason {
    /// Every observed resource already had an identity; they were re-asserted
    AllObserved,
    /// At least one desired resource has an identity after querying
    Resolved,
    /// The single resource named by the input already has an identity
    AlreadySet {
        composition_name: String,
        external_name: String,
    },
}

/// Why a pass made no changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pending {
    /// There are no desired composed resources
    NothingToReconcile,
    /// No matching external resource exists yet for these resources
    NotFoundYet { unresolved: Vec<String> },
}

/// Identity discovered through the tag index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub composition_name: String,
    pub external_name: String,
    /// Reference of the matched external resource
    pub resource_ref: String,
}

/// Drives reconciliation passes against one tag index
#[derive(Debug, Clone)]
pub struct Reconciler {
    gateway: Gateway,
}

impl Reconciler {
    /// Create reconciler
    #[inline]
    #[must_use]
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    /// Run one pass
    ///
    /// `reference` is the document `valuePath` filters read from, normally
    /// the observed composite resource. Neither `observed` nor `desired` is
    /// modified; updated documents are returned in the [`Outcome`].
    ///
    /// # Errors
    /// Any [`ReconcileError`]. The pass is abandoned at the first one.
    pub async fn reconcile(
        &self,
        input: &Input,
        reference: &Value,
        observed: Option<&State>,
        desired: Option<&State>,
    ) -> Result<Outcome, ReconcileError> {
        let input = input.validate()?;
        let mut set = ResourceSet::new(observed, desired)?;

        info!(
            desired = set.len_desired(),
            observed = set.len_observed(),
            filters = input.filters().len(),
            "starting reconciliation pass"
        );

        if let Some(name) = input.resource_name() {
            return self.reconcile_one(name, input.filters(), reference, set).await;
        }

        if set.len_desired() == 0 {
            info!("no desired composed resources, nothing to reconcile");
            return Ok(Outcome::PartiallyConverged(Pending::NothingToReconcile));
        }

        if set.all_identities_known() {
            for (name, identity) in set.observed_identities() {
                if set.desired(&name).is_some() {
                    set.set_identity(&name, &identity)?;
                }
            }
            info!("all observed resources have external names, re-asserted");
            return Ok(Outcome::Converged(Convergence {
                resources: set.into_desired_documents(),
                resolved: Vec::new(),
                reason: ConvergedReason::AllObserved,
            }));
        }

        let mut resolved = Vec::new();
        for name in set.desired_composition_names() {
            let Some(target) = set.desired(&name).cloned() else {
                continue;
            };

            if target.has_identity() {
                debug!(
                    composition_name = %name,
                    external_name = %target.external_name(),
                    "re-asserting known external name"
                );
                set.set_identity(&name, target.external_name())?;
                continue;
            }

            if let Some(resolution) = self.resolve(input.filters(), reference, &target).await? {
                set.set_identity(&name, &resolution.external_name)?;
                resolved.push(resolution);
            }
        }

        if !set.any_identity_resolved() {
            let unresolved: Vec<String> = set
                .unresolved_desired()
                .map(|r| r.composition_name().to_string())
                .collect();
            info!(unresolved = unresolved.len(), "no external resources found yet");
            return Ok(Outcome::PartiallyConverged(Pending::NotFoundYet { unresolved }));
        }

        info!(
            newly_resolved = resolved.len(),
            unresolved = set.unresolved_desired().count(),
            "reconciliation pass converged"
        );
        Ok(Outcome::Converged(Convergence {
            resources: set.into_desired_documents(),
            resolved,
            reason: ConvergedReason::Resolved,
        }))
    }

    /// Pass restricted to a single named resource
    async fn reconcile_one(
        &self,
        name: &str,
        filters: &[TagFilter],
        reference: &Value,
        mut set: ResourceSet,
    ) -> Result<Outcome, ReconcileError> {
        let known = set
            .observed(name)
            .filter(|r| r.has_identity())
            .or_else(|| set.desired(name).filter(|r| r.has_identity()))
            .map(|r| r.external_name().to_string());
        if let Some(external_name) = known {
            debug!(composition_name = %name, external_name = %external_name, "external name already set");
            return Ok(Outcome::Converged(Convergence {
                resources: set.into_desired_documents(),
                resolved: Vec::new(),
                reason: ConvergedReason::AlreadySet {
                    composition_name: name.to_string(),
                    external_name,
                },
            }));
        }

        let target = set
            .desired(name)
            .cloned()
            .ok_or_else(|| ResourceError::UnknownResource(name.to_string()))?;

        match self.resolve(filters, reference, &target).await? {
            Some(resolution) => {
                set.set_identity(name, &resolution.external_name)?;
                Ok(Outcome::Converged(Convergence {
                    resources: set.into_desired_documents(),
                    resolved: vec![resolution],
                    reason: ConvergedReason::Resolved,
                }))
            }
            None => Ok(Outcome::PartiallyConverged(Pending::NotFoundYet {
                unresolved: vec![name.to_string()],
            })),
        }
    }

    /// Query the index for one unidentified resource
    async fn resolve(
        &self,
        filters: &[TagFilter],
        reference: &Value,
        target: &Resource,
    ) -> Result<Option<Resolution>, ReconcileError> {
        let composition_name = target.composition_name();

        let predicates = resolve_filters(filters, reference, target).map_err(|source| {
            ReconcileError::UnresolvablePath {
                composition_name: composition_name.to_string(),
                source,
            }
        })?;
        debug!(composition_name, predicates = ?predicates, "querying tag index");

        let result = self
            .gateway
            .query(&predicates)
            .await
            .map_err(|e| ReconcileError::from_gateway(composition_name, e))?;

        match result {
            MatchResult::NotFound => {
                debug!(composition_name, "no external resource matches");
                Ok(None)
            }
            MatchResult::Found {
                identity,
                resource_ref,
            } => {
                info!(
                    composition_name,
                    external_name = %identity,
                    resource_ref = %resource_ref,
                    "matched external resource"
                );
                Ok(Some(Resolution {
                    composition_name: composition_name.to_string(),
                    external_name: identity,
                    resource_ref,
                }))
            }
            MatchResult::Ambiguous(candidates) => {
                warn!(composition_name, candidates = ?candidates, "tag filters match more than one resource");
                Err(ReconcileError::AmbiguousMatch {
                    composition_name: composition_name.to_string(),
                    candidates,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IndexError;
    use crate::gateway::{GetResourcesPage, MockTagIndex, ResourceTagMapping, Tag};
    use crate::input::TagFilterSpec;
    use crate::resources::EXTERNAL_NAME_ANNOTATION;
    use importer_fieldpath::{FieldPath, StructuredDocument};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    fn body(name: &str) -> Value {
        json!({
            "apiVersion": "ec2.aws.upbound.io/v1beta1",
            "kind": "SecurityGroup",
            "metadata": {"name": name}
        })
    }

    fn annotated(name: &str, external_name: &str) -> Value {
        let mut body = body(name);
        body.set_string(&FieldPath::annotation(EXTERNAL_NAME_ANNOTATION), external_name)
            .unwrap();
        body
    }

    fn state(resources: &[(&str, Value)]) -> State {
        State {
            composite: None,
            resources: resources
                .iter()
                .map(|(n, b)| ((*n).to_string(), ComposedResource::new(b.clone())))
                .collect(),
        }
    }

    fn hit(identity: &str) -> GetResourcesPage {
        GetResourcesPage {
            mappings: vec![ResourceTagMapping {
                resource_ref: format!("arn:aws:ec2:us-east-1:123:security-group/{identity}"),
                tags: vec![Tag::new(EXTERNAL_NAME_ANNOTATION, identity)],
            }],
            pagination_token: None,
        }
    }

    fn reconciler(index: MockTagIndex) -> Reconciler {
        Reconciler::new(Gateway::new(Arc::new(index)))
    }

    fn external_name(outcome: &Outcome, name: &str) -> Option<String> {
        match outcome {
            Outcome::Converged(c) => c.resources[name]
                .resource
                .get_string(&FieldPath::annotation(EXTERNAL_NAME_ANNOTATION))
                .ok(),
            Outcome::PartiallyConverged(_) => None,
        }
    }

    #[tokio::test]
    async fn invalid_input_fails_before_querying() {
        let mut index = MockTagIndex::new();
        index.expect_get_resources().never();

        let input = Input::new().with_filter(TagFilterSpec::value("foo", ""));
        let desired = state(&[("sg", body("a"))]);
        let err = reconciler(index)
            .reconcile(&input, &Value::Null, None, Some(&desired))
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Validation(_)));
    }

    #[tokio::test]
    async fn zero_desired_is_nothing_to_reconcile() {
        let mut index = MockTagIndex::new();
        index.expect_get_resources().never();

        let outcome = reconciler(index)
            .reconcile(&Input::new(), &Value::Null, None, None)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            Outcome::PartiallyConverged(Pending::NothingToReconcile)
        );
    }

    #[tokio::test]
    async fn single_hit_is_written() {
        let mut index = MockTagIndex::new();
        index
            .expect_get_resources()
            .times(1)
            .returning(|_| Ok(hit("sg-123")));

        let desired = state(&[("sg", body("test"))]);
        let outcome = reconciler(index)
            .reconcile(&Input::new(), &Value::Null, None, Some(&desired))
            .await
            .unwrap();

        assert_eq!(external_name(&outcome, "sg").as_deref(), Some("sg-123"));
        let Outcome::Converged(convergence) = outcome else {
            panic!("expected convergence");
        };
        assert_eq!(convergence.reason, ConvergedReason::Resolved);
        assert_eq!(convergence.resolved.len(), 1);
        assert_eq!(convergence.resolved[0].composition_name, "sg");
        assert_eq!(convergence.resolved[0].external_name, "sg-123");
    }

    #[tokio::test]
    async fn known_identities_are_reasserted_without_querying() {
        let mut index = MockTagIndex::new();
        index.expect_get_resources().never();

        let observed = state(&[("sg", annotated("test", "sg-123"))]);
        let desired = state(&[("sg", body("test"))]);
        let outcome = reconciler(index)
            .reconcile(&Input::new(), &Value::Null, Some(&observed), Some(&desired))
            .await
            .unwrap();

        assert_eq!(external_name(&outcome, "sg").as_deref(), Some("sg-123"));
        let Outcome::Converged(convergence) = outcome else {
            panic!("expected convergence");
        };
        assert_eq!(convergence.reason, ConvergedReason::AllObserved);
        assert!(convergence.resolved.is_empty());
    }

    #[tokio::test]
    async fn no_hits_is_not_found_yet() {
        let mut index = MockTagIndex::new();
        index
            .expect_get_resources()
            .times(2)
            .returning(|_| Ok(GetResourcesPage::default()));

        let desired = state(&[("a", body("a")), ("b", body("b"))]);
        let outcome = reconciler(index)
            .reconcile(&Input::new(), &Value::Null, None, Some(&desired))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            Outcome::PartiallyConverged(Pending::NotFoundYet {
                unresolved: vec!["a".into(), "b".into()],
            })
        );
    }

    #[tokio::test]
    async fn index_failure_aborts_pass() {
        let mut index = MockTagIndex::new();
        index
            .expect_get_resources()
            .returning(|_| Err(IndexError::new("access denied")));

        let desired = state(&[("sg", body("a"))]);
        let err = reconciler(index)
            .reconcile(&Input::new(), &Value::Null, None, Some(&desired))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn legacy_mode_with_observed_identity_is_already_set() {
        let mut index = MockTagIndex::new();
        index.expect_get_resources().never();

        let observed = state(&[("sg", annotated("test", "sg-1"))]);
        let desired = state(&[("sg", body("test"))]);
        let input = Input::new().with_resource_name("sg");
        let outcome = reconciler(index)
            .reconcile(&input, &Value::Null, Some(&observed), Some(&desired))
            .await
            .unwrap();

        let Outcome::Converged(convergence) = outcome else {
            panic!("expected convergence");
        };
        assert_eq!(
            convergence.reason,
            ConvergedReason::AlreadySet {
                composition_name: "sg".into(),
                external_name: "sg-1".into(),
            }
        );
        assert_eq!(convergence.resources["sg"].resource, body("test"));
    }

    #[tokio::test]
    async fn legacy_mode_queries_only_the_named_resource() {
        let mut index = MockTagIndex::new();
        index
            .expect_get_resources()
            .times(1)
            .withf(|req| req.tag_filters.iter().any(|p| p.values == vec!["wanted".to_string()]))
            .returning(|_| Ok(hit("sg-9")));

        let desired = state(&[("other", body("other")), ("sg", body("wanted"))]);
        let input = Input::new().with_resource_name("sg");
        let outcome = reconciler(index)
            .reconcile(&input, &Value::Null, None, Some(&desired))
            .await
            .unwrap();

        assert_eq!(external_name(&outcome, "sg").as_deref(), Some("sg-9"));
        assert_eq!(external_name(&outcome, "other"), None);
    }

    #[tokio::test]
    async fn legacy_mode_unknown_resource_fails() {
        let mut index = MockTagIndex::new();
        index.expect_get_resources().never();

        let desired = state(&[("sg", body("a"))]);
        let input = Input::new().with_resource_name("missing");
        let err = reconciler(index)
            .reconcile(&input, &Value::Null, None, Some(&desired))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::Resource(ResourceError::UnknownResource(name)) if name == "missing"
        ));
    }
}
