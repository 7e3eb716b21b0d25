pub mod cache;
mod cli;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod model;
pub mod pipeline;
pub mod plugin;
pub mod util;

pub use cache::ResultCache;
pub use cli::run;
pub use config::{AdapterMode, ExecutionConfig};
pub use error::{ExecutionError, NodeError};
pub use evaluation::DataTree;
pub use model::NodeGraph;
pub use pipeline::Executor;
pub use plugin::Registry;
