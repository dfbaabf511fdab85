//! Read-only collaborator lookups

pub mod queries;

pub use queries::*;
