//! RunFunction request and response envelopes
//!
//! JSON rendering of the messages exchanged with the composition
//! orchestrator. Resource bodies stay opaque [`serde_json::Value`]s; only
//! the reconciliation layer looks inside them, and only through
//! [`importer_fieldpath::StructuredDocument`].

use crate::error::RequestError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Default time the orchestrator may cache a response
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// One invocation of the function
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunFunctionRequest {
    #[serde(default)]
    pub meta: RequestMeta,
    /// Embedded Function input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    /// Last-known actual state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed: Option<State>,
    /// Target state accumulated by earlier pipeline steps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired: Option<State>,
}

impl RunFunctionRequest {
    /// Decode a JSON-encoded request
    ///
    /// # Errors
    /// [`RequestError::Decode`] when the bytes are not a valid request.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, RequestError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Observed composite resource body, if any
    #[must_use]
    pub fn observed_composite(&self) -> Option<&Value> {
        self.observed
            .as_ref()
            .and_then(|state| state.composite.as_ref())
            .map(|composite| &composite.resource)
    }
}

/// Request metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMeta {
    /// Opaque tag identifying the request content
    #[serde(default)]
    pub tag: String,
}

/// Composite plus composed resources
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composite: Option<ComposedResource>,
    /// Composed resources keyed by composition name
    #[serde(default)]
    pub resources: IndexMap<String, ComposedResource>,
}

/// One resource body with its readiness
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposedResource {
    pub resource: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready: Option<Ready>,
}

impl ComposedResource {
    /// Wrap a resource body
    #[inline]
    #[must_use]
    pub fn new(resource: Value) -> Self {
        Self {
            resource,
            ready: None,
        }
    }
}

/// Readiness reported for a desired resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ready {
    #[serde(rename = "READY_UNSPECIFIED")]
    Unspecified,
    #[serde(rename = "READY_TRUE")]
    True,
    #[serde(rename = "READY_FALSE")]
    False,
}

/// Reply to the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunFunctionResponse {
    pub meta: ResponseMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired: Option<State>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<FunctionResult>,
}

impl RunFunctionResponse {
    /// Start a response that echoes the request's tag and desired state
    #[must_use]
    pub fn to(request: &RunFunctionRequest, ttl: Duration) -> Self {
        Self {
            meta: ResponseMeta {
                tag: request.meta.tag.clone(),
                ttl: format_ttl(ttl),
            },
            desired: request.desired.clone(),
            results: Vec::new(),
        }
    }

    /// Append a fatal result
    pub fn fatal(&mut self, message: impl Into<String>) {
        self.push(Severity::Fatal, message);
    }

    /// Append a warning result
    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(Severity::Warning, message);
    }

    /// Append a normal result
    pub fn normal(&mut self, message: impl Into<String>) {
        self.push(Severity::Normal, message);
    }

    fn push(&mut self, severity: Severity, message: impl Into<String>) {
        self.results.push(FunctionResult {
            severity,
            message: message.into(),
        });
    }

    /// Most severe result, if any
    #[must_use]
    pub fn severity(&self) -> Option<Severity> {
        self.results.iter().map(|r| r.severity).max()
    }
}

/// Response metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMeta {
    #[serde(default)]
    pub tag: String,
    /// Cache lifetime in protobuf duration notation (`"60s"`)
    pub ttl: String,
}

/// Outcome message for the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionResult {
    pub severity: Severity,
    pub message: String,
}

/// Result severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    #[serde(rename = "SEVERITY_UNSPECIFIED")]
    Unspecified,
    #[serde(rename = "SEVERITY_NORMAL")]
    Normal,
    #[serde(rename = "SEVERITY_WARNING")]
    Warning,
    #[serde(rename = "SEVERITY_FATAL")]
    Fatal,
}

fn format_ttl(ttl: Duration) -> String {
    let nanos = ttl.subsec_nanos();
    if nanos == 0 {
        format!("{}s", ttl.as_secs())
    } else {
        let fraction = format!("{nanos:09}");
        format!("{}.{}s", ttl.as_secs(), fraction.trim_end_matches('0'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn request_decodes_orchestrator_json() {
        let request: RunFunctionRequest = serde_json::from_value(json!({
            "meta": {"tag": "abc"},
            "input": {"tagFilters": []},
            "observed": {
                "composite": {"resource": {"kind": "XNetwork"}},
                "resources": {"sg": {"resource": {"kind": "SecurityGroup"}}}
            },
            "desired": {
                "resources": {"sg": {"resource": {"kind": "SecurityGroup"}, "ready": "READY_TRUE"}}
            }
        }))
        .unwrap();

        assert_eq!(request.meta.tag, "abc");
        assert_eq!(
            request.observed_composite(),
            Some(&json!({"kind": "XNetwork"}))
        );
        let desired = request.desired.as_ref().unwrap();
        assert_eq!(desired.resources["sg"].ready, Some(Ready::True));
    }

    #[test]
    fn response_echoes_tag_and_desired() {
        let request = RunFunctionRequest {
            meta: RequestMeta { tag: "t".into() },
            desired: Some(State::default()),
            ..RunFunctionRequest::default()
        };

        let mut response = RunFunctionResponse::to(&request, DEFAULT_TTL);
        response.normal("ok");
        response.warning("hmm");

        assert_eq!(response.meta.ttl, "60s");
        assert_eq!(response.meta.tag, "t");
        assert_eq!(response.desired, Some(State::default()));
        assert_eq!(response.severity(), Some(Severity::Warning));

        let encoded = serde_json::to_value(&response).unwrap();
        assert_eq!(encoded["results"][1]["severity"], "SEVERITY_WARNING");
    }

    #[test]
    fn response_without_desired_omits_field() {
        let mut response = RunFunctionResponse::to(&RunFunctionRequest::default(), DEFAULT_TTL);
        response.fatal("boom");

        let encoded = serde_json::to_value(&response).unwrap();
        assert!(encoded.get("desired").is_none());
        assert_eq!(encoded["results"][0]["severity"], "SEVERITY_FATAL");
    }

    #[test]
    fn malformed_request_is_rejected() {
        let err = RunFunctionRequest::from_slice(b"{\"observed\": \"nope\"}").unwrap_err();
        assert!(err.to_string().starts_with("cannot decode RunFunction request"));
    }

    #[test]
    fn ttl_formatting() {
        assert_eq!(format_ttl(Duration::from_secs(60)), "60s");
        assert_eq!(format_ttl(Duration::from_millis(1500)), "1.5s");
    }
}
