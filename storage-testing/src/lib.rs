//! Test support for the reconciler.
//!
//! [`FakeEngine`] stands in for every collaborator of the reconciler at
//! once: it answers inventory queries, applies the LVM commands it is
//! asked to run to its own state, and remembers formatting and mounts.

pub mod engine;
pub mod fixtures;

pub use engine::FakeEngine;
