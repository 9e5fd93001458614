//! tpo - Two-tier build cache for embedded toolchains
//!
//! A per-project cache of fingerprinted build directories, a per-user cache
//! of downloaded source archives, and a materializer that copies cached
//! dependencies into projects. Safe to use from many concurrent builds.

pub mod cache;
pub mod cli;
pub mod config;
pub mod constants;
pub mod deps;
pub mod error;
pub mod ui;

pub use error::{TpoError, TpoResult};
