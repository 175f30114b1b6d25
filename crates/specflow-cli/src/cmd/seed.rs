use super::open_engine;
use crate::output::print_json;
use anyhow::Context;
use specflow_core::{paths, seed};
use std::path::Path;

pub fn run(root: &Path, project_id: &str, json: bool) -> anyhow::Result<()> {
    paths::validate_project_id(project_id)?;
    let (_, engine) = open_engine(root)?;
    let report = seed::create_default_data_flows(engine.store(), project_id)
        .with_context(|| format!("failed to seed data flows for '{project_id}'"))?;

    if json {
        print_json(&report)?;
    } else {
        println!(
            "Seeded {project_id}: {} inserted, {} already present",
            report.inserted, report.skipped
        );
    }
    Ok(())
}
