//! RunFunction entry point
//!
//! [`FunctionRunner`] wraps one reconciliation pass in the request/response
//! envelope: it decodes the embedded input, enforces the pass deadline and
//! turns the [`Outcome`] or error into results for the orchestrator. It
//! always produces a response; failures are reported in-band.

use crate::config::ImporterConfig;
use crate::engine::{ConvergedReason, Convergence, Outcome, Pending, Reconciler};
use crate::envelope::{RunFunctionRequest, RunFunctionResponse, State, DEFAULT_TTL};
use crate::error::{IndexError, InputError, ReconcileError};
use crate::gateway::{Gateway, TagIndex};
use crate::input::Input;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Default deadline for one pass
pub const DEFAULT_PASS_TIMEOUT: Duration = Duration::from_secs(30);

static NO_COMPOSITE: Value = Value::Null;

/// Runs reconciliation passes for RunFunction requests
#[derive(Debug, Clone)]
pub struct FunctionRunner {
    reconciler: Reconciler,
    ttl: Duration,
    pass_timeout: Duration,
}

impl FunctionRunner {
    /// Create runner with default TTL and deadline
    #[must_use]
    pub fn new(reconciler: Reconciler) -> Self {
        Self {
            reconciler,
            ttl: DEFAULT_TTL,
            pass_timeout: DEFAULT_PASS_TIMEOUT,
        }
    }

    /// Create runner over `index` as described by `config`
    #[must_use]
    pub fn from_config(config: &ImporterConfig, index: Arc<dyn TagIndex>) -> Self {
        let gateway = Gateway::new(index)
            .with_identity_tag_key(config.identity_tag_key.clone())
            .with_resources_per_page(config.resources_per_page);
        Self::new(Reconciler::new(gateway))
            .with_ttl(config.response_ttl())
            .with_pass_timeout(config.pass_timeout())
    }

    /// With response TTL
    #[inline]
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// With pass deadline
    #[inline]
    #[must_use]
    pub fn with_pass_timeout(mut self, timeout: Duration) -> Self {
        self.pass_timeout = timeout;
        self
    }

    /// Handle one request
    pub async fn run_function(&self, request: &RunFunctionRequest) -> RunFunctionResponse {
        info!(tag = %request.meta.tag, "running function");
        let mut response = RunFunctionResponse::to(request, self.ttl);

        let input = match decode_input(request) {
            Ok(input) => input,
            Err(e) => {
                let e = ReconcileError::from(e);
                warn!(error = %e, "rejecting request");
                response.fatal(e.to_string());
                return response;
            }
        };

        let pass = self.reconciler.reconcile(
            &input,
            request.observed_composite().unwrap_or(&NO_COMPOSITE),
            request.observed.as_ref(),
            request.desired.as_ref(),
        );

        let outcome = match tokio::time::timeout(self.pass_timeout, pass).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                warn!(error = %e, retryable = e.is_retryable(), "reconciliation pass failed");
                response.fatal(e.to_string());
                return response;
            }
            Err(_) => {
                let e = ReconcileError::IndexUnavailable(IndexError::new(format!(
                    "reconciliation pass exceeded its deadline of {}s",
                    self.pass_timeout.as_secs_f64()
                )));
                warn!(error = %e, "reconciliation pass timed out");
                response.fatal(e.to_string());
                return response;
            }
        };

        let legacy = input.resource_name.is_some();
        match outcome {
            Outcome::Converged(convergence) => {
                converged(&mut response, request, convergence, legacy);
            }
            Outcome::PartiallyConverged(pending) => pending_result(&mut response, &pending, legacy),
        }
        response
    }
}

fn decode_input(request: &RunFunctionRequest) -> Result<Input, InputError> {
    let raw = request.input.clone().ok_or(InputError::Missing)?;
    Input::from_value(raw)
}

fn converged(
    response: &mut RunFunctionResponse,
    request: &RunFunctionRequest,
    convergence: Convergence,
    legacy: bool,
) {
    let Convergence {
        resources,
        resolved,
        reason,
    } = convergence;

    if let ConvergedReason::AlreadySet {
        composition_name,
        external_name,
    } = &reason
    {
        response.normal(format!(
            "external name annotation for {composition_name:?} is already set to {external_name:?}"
        ));
        return;
    }

    let total = resources.len();
    response.desired = Some(State {
        composite: request.desired.as_ref().and_then(|d| d.composite.clone()),
        resources,
    });

    if !legacy {
        let message = match reason {
            ConvergedReason::AllObserved => {
                format!("external names of all {total} composed resources are already known")
            }
            _ => format!(
                "resolved {} new external names, {total} desired composed resources",
                resolved.len()
            ),
        };
        response.normal(message);
    }

    for resolution in &resolved {
        response.normal(format!(
            "added external name annotation to {:?} with value {:?}",
            resolution.composition_name, resolution.external_name
        ));
    }
}

fn pending_result(response: &mut RunFunctionResponse, pending: &Pending, legacy: bool) {
    match pending {
        Pending::NothingToReconcile => {
            response.warning("no desired composed resources to reconcile");
        }
        Pending::NotFoundYet { unresolved } if legacy => {
            let name = unresolved.first().map_or("", String::as_str);
            response.normal(format!("external resource ({name:?}) not found"));
        }
        Pending::NotFoundYet { unresolved } => {
            response.normal(format!(
                "no external resources found matching tag filters for {unresolved:?}"
            ));
        }
    }
}
