//! fspop library
//!
//! Manifest-driven filesystem population: parse a line-oriented manifest of
//! files, directories, and symlinks, and materialize it through a pluggable
//! filesystem backend.

pub mod backend;
pub mod error;
pub mod hostdir;
pub mod manifest;
pub mod populate;

pub use error::{Error, Result};
