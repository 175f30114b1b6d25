pub mod config;
pub mod flow;
pub mod init;
pub mod relationship;
pub mod seed;
pub mod step;
pub mod workflow;

use anyhow::Context;
use specflow_core::config::Config;
use specflow_core::{DataFlowEngine, FlowDb};
use std::path::Path;

/// Load config and open the engine over the configured database.
pub fn open_engine(root: &Path) -> anyhow::Result<(Config, DataFlowEngine<FlowDb>)> {
    let config = Config::load(root).context("failed to load config")?;
    let db_path = config.db_path(root);
    let db = FlowDb::open(&db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;
    let engine = DataFlowEngine::with_config(db, config.workflow.clone());
    Ok((config, engine))
}
