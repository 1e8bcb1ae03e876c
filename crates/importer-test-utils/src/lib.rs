//! Testing utilities for the tag importer workspace
//!
//! An in-memory [`FakeTagIndex`] plus fixtures for building requests and
//! resource bodies.

#![allow(missing_docs)]
#![allow(clippy::missing_panics_doc, clippy::must_use_candidate)]

use async_trait::async_trait;
use importer_core::{
    ComposedResource, GetResourcesPage, GetResourcesRequest, IndexError, Input,
    ResourceTagMapping, RunFunctionRequest, State, Tag, TagIndex, EXTERNAL_NAME_ANNOTATION,
};
use importer_fieldpath::{FieldPath, StructuredDocument};
use serde_json::{json, Value};
use std::sync::Mutex;
use std::time::Duration;

/// Tag index backed by a vector of resources
///
/// Matching is conjunctive over predicates, pagination uses opaque offset
/// tokens, and failures or latency can be injected.
#[derive(Debug, Default)]
pub struct FakeTagIndex {
    resources: Vec<ResourceTagMapping>,
    page_size: Option<usize>,
    fail_on_call: Option<(usize, String)>,
    delay: Option<Duration>,
    requests: Mutex<Vec<GetResourcesRequest>>,
}

impl FakeTagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an external resource
    pub fn with_resource(mut self, resource_ref: &str, tags: &[(&str, &str)]) -> Self {
        self.resources.push(ResourceTagMapping {
            resource_ref: resource_ref.to_string(),
            tags: tags.iter().map(|(k, v)| Tag::new(*k, *v)).collect(),
        });
        self
    }

    /// Add a resource tagged the way the provider tags what it creates
    pub fn with_managed_resource(
        self,
        resource_ref: &str,
        platform_name: &str,
        group_kind: &str,
        external_name: &str,
        extra: &[(&str, &str)],
    ) -> Self {
        let mut tags = vec![
            (importer_core::NAME_TAG_KEY, platform_name),
            (importer_core::KIND_TAG_KEY, group_kind),
            (EXTERNAL_NAME_ANNOTATION, external_name),
        ];
        tags.extend_from_slice(extra);
        self.with_resource(resource_ref, &tags)
    }

    /// Serve at most `n` matches per page regardless of the request
    pub fn with_page_size(mut self, n: usize) -> Self {
        self.page_size = Some(n);
        self
    }

    /// Fail the `n`th call (1-based)
    pub fn failing_on_call(mut self, n: usize, message: &str) -> Self {
        self.fail_on_call = Some((n, message.to_string()));
        self
    }

    /// Sleep before answering every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<GetResourcesRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of calls received so far
    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn matches(resource: &ResourceTagMapping, request: &GetResourcesRequest) -> bool {
        request.tag_filters.iter().all(|predicate| {
            resource
                .tag(&predicate.key)
                .is_some_and(|value| predicate.values.iter().any(|v| v == value))
        })
    }
}

#[async_trait]
impl TagIndex for FakeTagIndex {
    async fn get_resources(
        &self,
        request: &GetResourcesRequest,
    ) -> Result<GetResourcesPage, IndexError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len()
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some((n, message)) = &self.fail_on_call {
            if *n == call {
                return Err(IndexError::new(message.clone()));
            }
        }

        let offset = match request.pagination_token.as_deref() {
            None => 0,
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| IndexError::new(format!("invalid pagination token {token:?}")))?,
        };
        let page_size = self
            .page_size
            .or(request.resources_per_page.map(|n| n as usize))
            .unwrap_or(usize::MAX)
            .max(1);

        let matching: Vec<_> = self
            .resources
            .iter()
            .filter(|r| Self::matches(r, request))
            .cloned()
            .collect();
        let end = offset.saturating_add(page_size).min(matching.len());
        let mappings = matching.get(offset..end).unwrap_or_default().to_vec();
        let pagination_token = (end < matching.len()).then(|| end.to_string());

        Ok(GetResourcesPage {
            mappings,
            pagination_token,
        })
    }
}

/// Security group body as a composition would declare it
pub fn security_group(name: &str) -> Value {
    json!({
        "apiVersion": "ec2.aws.upbound.io/v1beta1",
        "kind": "SecurityGroup",
        "metadata": {"name": name},
        "spec": {"forProvider": {"region": "us-east-1"}}
    })
}

/// VPC body as a composition would declare it
pub fn vpc(name: &str) -> Value {
    json!({
        "apiVersion": "ec2.aws.upbound.io/v1beta1",
        "kind": "VPC",
        "metadata": {"name": name},
        "spec": {"forProvider": {"region": "us-east-1"}}
    })
}

/// Copy of `body` carrying the external-name annotation
pub fn with_external_name(mut body: Value, external_name: &str) -> Value {
    body.set_string(&FieldPath::annotation(EXTERNAL_NAME_ANNOTATION), external_name)
        .unwrap();
    body
}

/// External name annotation of `body`, if any
pub fn external_name_of(body: &Value) -> Option<String> {
    body.get_string(&FieldPath::annotation(EXTERNAL_NAME_ANNOTATION))
        .ok()
}

/// Fluent builder for [`RunFunctionRequest`]
#[derive(Debug, Clone, Default)]
pub struct RequestBuilder {
    request: RunFunctionRequest,
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self::default().tag("test")
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.request.meta.tag = tag.to_string();
        self
    }

    pub fn input(mut self, input: &Input) -> Self {
        self.request.input = Some(serde_json::to_value(input).unwrap());
        self
    }

    pub fn raw_input(mut self, input: Value) -> Self {
        self.request.input = Some(input);
        self
    }

    /// Set the observed composite resource
    pub fn composite(mut self, body: Value) -> Self {
        self.request
            .observed
            .get_or_insert_with(State::default)
            .composite = Some(ComposedResource::new(body));
        self
    }

    pub fn observed(mut self, name: &str, body: Value) -> Self {
        self.request
            .observed
            .get_or_insert_with(State::default)
            .resources
            .insert(name.to_string(), ComposedResource::new(body));
        self
    }

    pub fn desired(mut self, name: &str, body: Value) -> Self {
        self.request
            .desired
            .get_or_insert_with(State::default)
            .resources
            .insert(name.to_string(), ComposedResource::new(body));
        self
    }

    /// Present but empty desired state
    pub fn empty_desired(mut self) -> Self {
        self.request.desired.get_or_insert_with(State::default);
        self
    }

    pub fn build(self) -> RunFunctionRequest {
        self.request
    }
}
