//! Importer Tagging - HTTP tag index client
//!
//! Implements [`importer_core::TagIndex`] over the Resource Groups Tagging
//! `GetResources` JSON protocol. One call sends one POST and returns one page;
//! pagination and retries are left to the caller.
//!
//! # Example
//!
//! ```rust,ignore
//! use importer_core::TaggingConfig;
//! use importer_tagging::HttpTagIndex;
//!
//! let config = TaggingConfig::default().with_endpoint("http://localhost:8080");
//! let index = HttpTagIndex::new(&config)?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod client;
mod error;
mod wire;

pub use client::{HttpTagIndex, AMZ_JSON_CONTENT_TYPE, GET_RESOURCES_TARGET};
pub use error::TaggingError;
