pub mod config;
pub mod engine;
pub mod error;
pub mod io;
pub mod nested;
pub mod paths;
pub mod seed;
pub mod store;
pub mod transform;
pub mod types;
pub mod workflow;

pub use engine::DataFlowEngine;
pub use error::{Result, SpecflowError};
pub use store::{FlowDb, FlowStore};
