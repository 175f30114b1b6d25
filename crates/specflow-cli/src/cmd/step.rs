use super::open_engine;
use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use specflow_core::types::StepId;
use specflow_core::FlowStore;
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Subcommand)]
pub enum StepSubcommand {
    /// Print a step's response document
    Show { project_id: String, step: StepId },
    /// Save a step's responses as completed and propagate to the next step
    Complete {
        project_id: String,
        step: StepId,
        /// JSON file with the responses (default: read stdin)
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

pub fn run(root: &Path, subcmd: StepSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        StepSubcommand::Show { project_id, step } => show(root, &project_id, step, json),
        StepSubcommand::Complete {
            project_id,
            step,
            file,
        } => complete(root, &project_id, step, file.as_deref(), json),
    }
}

fn show(root: &Path, project_id: &str, step: StepId, json: bool) -> anyhow::Result<()> {
    let (_, engine) = open_engine(root)?;
    let wf = engine
        .store()
        .find_workflow(project_id)?
        .with_context(|| format!("no workflow for project '{project_id}'"))?;
    let doc = engine
        .store()
        .find_step_response(wf.id, step)?
        .with_context(|| format!("step {step} of '{project_id}' has no responses"))?;

    if json {
        print_json(&doc)?;
    } else {
        let status = if doc.completed { "completed" } else { "not completed" };
        println!("Step {step} ({status}), updated {}", doc.updated_at.to_rfc3339());
        println!("{}", serde_json::to_string_pretty(&doc.responses)?);
    }
    Ok(())
}

fn complete(
    root: &Path,
    project_id: &str,
    step: StepId,
    file: Option<&Path>,
    json: bool,
) -> anyhow::Result<()> {
    let raw = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read responses from stdin")?;
            buf
        }
    };
    let responses: serde_json::Value =
        serde_json::from_str(&raw).context("responses must be valid JSON")?;
    anyhow::ensure!(responses.is_object(), "responses must be a JSON object");

    let (_, engine) = open_engine(root)?;
    let completion = engine
        .complete_step(project_id, step, responses)
        .with_context(|| format!("failed to complete step {step} of '{project_id}'"))?;

    if json {
        print_json(&completion)?;
        return Ok(());
    }

    println!("Completed step {step} of {project_id}");
    if let Some(err) = &completion.propagation_error {
        eprintln!("warning: data flow to the next step failed: {err}");
    } else if let Some(next) = completion.next_step {
        if completion.propagated.is_empty() {
            println!("No fields mapped into step {next}.");
        } else {
            println!("Mapped into step {next}:");
            super::flow::print_mappings(&completion.propagated);
        }
    }
    Ok(())
}
