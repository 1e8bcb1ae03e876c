//! Importer Core - tag-based identity reconciliation
//!
//! Adopts pre-existing cloud resources into a composition by finding them
//! through their tags and writing their identity onto the desired composed
//! resources:
//! - Validates the Function input into typed tag filters
//! - Resolves filters against the composite resource into tag predicates
//! - Queries a paginated tag index and classifies the matches
//! - Writes identities into a per-pass copy of the desired state
//! - Maps the pass outcome onto a RunFunction response
//!
//! # Example
//!
//! ```rust,ignore
//! use importer_core::{FunctionRunner, ImporterConfig, RunFunctionRequest};
//! use std::sync::Arc;
//!
//! # async fn example(index: Arc<dyn importer_core::TagIndex>, bytes: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
//! let config = ImporterConfig::new();
//! let runner = FunctionRunner::from_config(&config, index);
//!
//! let request = RunFunctionRequest::from_slice(bytes)?;
//! let response = runner.run_function(&request).await;
//!
//! println!("{}", serde_json::to_string(&response)?);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod filter;
pub mod function;
pub mod gateway;
pub mod input;
pub mod resources;

// Re-exports for convenience
pub use config::{ConfigError, ImporterConfig, TaggingConfig, MAX_RESOURCES_PER_PAGE};
pub use engine::{ConvergedReason, Convergence, Outcome, Pending, Reconciler, Resolution};
pub use envelope::{
    ComposedResource, FunctionResult, Ready, RequestMeta, ResponseMeta, RunFunctionRequest,
    RunFunctionResponse, Severity, State, DEFAULT_TTL,
};
pub use error::{
    FilterError, GatewayError, IndexError, InputError, ReconcileError, RequestError,
    ResourceError,
};
pub use filter::{resolve_filters, Predicate, KIND_TAG_KEY, NAME_TAG_KEY};
pub use function::{FunctionRunner, DEFAULT_PASS_TIMEOUT};
pub use gateway::{
    Gateway, GetResourcesPage, GetResourcesRequest, MatchResult, ResourceTagMapping, Tag,
    TagIndex, DEFAULT_IDENTITY_TAG_KEY, DEFAULT_RESOURCES_PER_PAGE,
};
pub use input::{
    FilterValue, Input, Strategy, TagFilter, TagFilterSpec, ValidatedInput, INPUT_API_VERSION,
    INPUT_KIND,
};
pub use resources::{group_kind, Resource, ResourceSet, EXTERNAL_NAME_ANNOTATION};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the importer core
    pub use crate::{
        FunctionRunner, Gateway, ImporterConfig, Input, Outcome, Reconciler, ReconcileError,
        RunFunctionRequest, RunFunctionResponse, Severity, TagFilterSpec, TagIndex,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
