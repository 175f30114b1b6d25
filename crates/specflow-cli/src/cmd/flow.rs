use super::open_engine;
use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use specflow_core::transform::display_value;
use specflow_core::types::{FieldMapping, FlowContext, StepId};
use std::path::Path;

#[derive(Subcommand)]
pub enum FlowSubcommand {
    /// Map fields from one step's responses into another's
    Run {
        project_id: String,
        source_step: StepId,
        target_step: StepId,
        /// Compute mappings without writing the target step
        #[arg(long)]
        dry_run: bool,
    },
}

pub fn run(root: &Path, subcmd: FlowSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        FlowSubcommand::Run {
            project_id,
            source_step,
            target_step,
            dry_run,
        } => run_flow(root, &project_id, source_step, target_step, dry_run, json),
    }
}

fn run_flow(
    root: &Path,
    project_id: &str,
    source_step: StepId,
    target_step: StepId,
    dry_run: bool,
    json: bool,
) -> anyhow::Result<()> {
    let (_, engine) = open_engine(root)?;
    let ctx = FlowContext::new(project_id, source_step, target_step);
    let mappings = if dry_run {
        engine.process_data_flow(&ctx)
    } else {
        engine.propagate(&ctx)
    }
    .with_context(|| format!("data flow {source_step} -> {target_step} failed"))?;

    if json {
        print_json(&serde_json::json!({
            "context": ctx,
            "dry_run": dry_run,
            "mappings": mappings,
        }))?;
        return Ok(());
    }

    if mappings.is_empty() {
        println!("No fields to map from step {source_step} to step {target_step}.");
        return Ok(());
    }
    print_mappings(&mappings);
    if dry_run {
        println!("(dry run: step {target_step} not written)");
    } else {
        println!("Wrote {} field(s) into step {target_step}.", mappings.len());
    }
    Ok(())
}

pub fn print_mappings(mappings: &[FieldMapping]) {
    let rows = mappings
        .iter()
        .map(|m| {
            vec![
                m.source_field.clone(),
                m.target_field.clone(),
                display_value(&m.value),
            ]
        })
        .collect();
    print_table(&["SOURCE", "TARGET", "VALUE"], rows);
}
