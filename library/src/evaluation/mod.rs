//! Level-matching evaluation of compiled node functions.
//!
//! Each node compiles into a `FunctionDescriptor`. The engine feeds it
//! `DataTree` containers whose depth may exceed what the function declares,
//! descending and re-invoking until levels line up.

pub mod data_tree;
pub mod engine;
pub mod function;
pub mod value;

pub use data_tree::DataTree;
pub use engine::recurse_levels;
pub use function::{FunctionDescriptor, NodeFunction, ParamSource, Parameter, PureFn, Return};
pub use value::{Data, Returned, Value};
