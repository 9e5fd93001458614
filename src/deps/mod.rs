//! Dependency materialization
//!
//! Symbolic library and platform names are resolved to source repositories
//! through the [`Registry`], fetched through the global cache, and copied
//! (never symlinked) into the project tree by the [`Materializer`].

pub mod materialize;
pub mod registry;

pub use materialize::{MaterializeFailure, MaterializeReport, Materializer};
pub use registry::{Registry, Resolution};
