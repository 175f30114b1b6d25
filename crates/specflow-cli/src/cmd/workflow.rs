use super::open_engine;
use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use specflow_core::{workflow, FlowStore};
use std::path::Path;

#[derive(Subcommand)]
pub enum WorkflowSubcommand {
    /// Create a project workflow and seed its relationships
    Create { project_id: String },
    /// Show a workflow and the state of each step
    Show { project_id: String },
}

pub fn run(root: &Path, subcmd: WorkflowSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        WorkflowSubcommand::Create { project_id } => create(root, &project_id, json),
        WorkflowSubcommand::Show { project_id } => show(root, &project_id, json),
    }
}

fn create(root: &Path, project_id: &str, json: bool) -> anyhow::Result<()> {
    let (config, engine) = open_engine(root)?;
    let init = workflow::init_project(engine.store(), project_id, &config.seed)
        .with_context(|| format!("failed to create workflow for '{project_id}'"))?;

    if json {
        print_json(&init)?;
    } else {
        let verb = if init.created { "Created" } else { "Found existing" };
        println!("{verb} workflow {} for {project_id}", init.workflow.id);
        println!(
            "Relationships: {} seeded, {} already present",
            init.seeded.inserted, init.seeded.skipped
        );
    }
    Ok(())
}

fn show(root: &Path, project_id: &str, json: bool) -> anyhow::Result<()> {
    let (config, engine) = open_engine(root)?;
    let wf = engine
        .store()
        .find_workflow(project_id)?
        .with_context(|| format!("no workflow for project '{project_id}'"))?;
    let docs = engine.store().list_step_responses(wf.id)?;

    if json {
        print_json(&serde_json::json!({ "workflow": wf, "steps": docs }))?;
        return Ok(());
    }

    println!("Workflow {} ({project_id})", wf.id);
    println!("Current step: {}/{}", wf.current_step, config.workflow.steps);
    println!();
    let rows = (1..=config.workflow.steps)
        .map(|step| {
            let doc = docs.iter().find(|d| d.step_id == step);
            let status = match doc {
                Some(d) if d.completed => "completed",
                Some(_) => "prefilled",
                None => "empty",
            };
            let fields = doc
                .and_then(|d| d.responses.as_object())
                .map(|o| o.len().to_string())
                .unwrap_or_else(|| "-".to_string());
            let updated = doc
                .map(|d| d.updated_at.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();
            vec![step.to_string(), status.to_string(), fields, updated]
        })
        .collect();
    print_table(&["STEP", "STATUS", "FIELDS", "UPDATED"], rows);
    Ok(())
}
