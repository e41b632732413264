//! Image commit and layer materialization pipeline
//!
//! This crate converts the live filesystem delta of a stopped container into
//! an immutable, content-addressed image layer, links that layer into a
//! parent-chain image graph, and persists the result so it can be referenced
//! or re-run exactly like a layer pulled from a registry. The hypervisor
//! session, guest bootstrap and stream transport are external collaborators
//! consumed through the traits in [`backend`].

pub mod backend;
pub mod cache;
pub mod commit;
pub mod config;
pub mod digest;
pub mod error;
pub mod events;
pub mod image;
pub mod layer;
pub mod logging;

pub use commit::{CommitRequest, Committer};
pub use error::{CommitError, Result};
pub use image::store::ImageStore;
pub use logging::Logger;

/// Engine version recorded in layer metadata
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
