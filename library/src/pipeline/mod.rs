//! Graph execution pipeline.
//!
//! A run goes through three stages: [`preprocess`] turns the user graph into
//! a canonical dependency graph, [`schedule`] orders it, and the
//! [`Executor`] evaluates the nodes in that order against a fresh result
//! cache.

pub mod executor;
pub mod preprocess;
pub mod schedule;

pub use executor::Executor;
pub use preprocess::{AdapterSplice, CanonicalGraph, CanonicalLink, materialize_adapters, preprocess};
pub use schedule::schedule;
