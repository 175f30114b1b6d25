use super::open_engine;
use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::{Args, Subcommand};
use specflow_core::transform::TransformType;
use specflow_core::types::{FieldMappingRelationship, RelationshipKey, StepId};
use specflow_core::{paths, FlowStore};
use std::path::Path;

#[derive(Args)]
pub struct RelationshipArgs {
    pub project_id: String,
    pub source_step: StepId,
    pub target_step: StepId,
    /// Dot-separated path in the source step's responses
    pub source_field: String,
    /// Dot-separated path in the target step's responses
    pub target_field: String,
}

impl RelationshipArgs {
    fn key(&self) -> RelationshipKey {
        RelationshipKey {
            project_id: self.project_id.clone(),
            source_step: self.source_step,
            target_step: self.target_step,
            source_field: self.source_field.clone(),
            target_field: self.target_field.clone(),
        }
    }
}

#[derive(Subcommand)]
pub enum RelationshipSubcommand {
    /// List relationships for a project
    List {
        project_id: String,
        /// Include deactivated relationships
        #[arg(long)]
        all: bool,
    },
    /// Add a relationship (no-op if the same one already exists)
    Add {
        #[command(flatten)]
        rel: RelationshipArgs,
        /// Transform name (copy, uppercase, lowercase, trim, extract, join,
        /// split, aggregate, map, template)
        #[arg(long)]
        transform: Option<String>,
        /// Transform config as a JSON object
        #[arg(long)]
        config: Option<String>,
    },
    /// Stop a relationship from participating in flow runs
    Deactivate {
        #[command(flatten)]
        rel: RelationshipArgs,
    },
    /// Re-enable a deactivated relationship
    Activate {
        #[command(flatten)]
        rel: RelationshipArgs,
    },
}

pub fn run(root: &Path, subcmd: RelationshipSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        RelationshipSubcommand::List { project_id, all } => list(root, &project_id, all, json),
        RelationshipSubcommand::Add {
            rel,
            transform,
            config,
        } => add(root, &rel, transform.as_deref(), config.as_deref(), json),
        RelationshipSubcommand::Deactivate { rel } => set_active(root, &rel, false, json),
        RelationshipSubcommand::Activate { rel } => set_active(root, &rel, true, json),
    }
}

fn list(root: &Path, project_id: &str, all: bool, json: bool) -> anyhow::Result<()> {
    let (_, engine) = open_engine(root)?;
    let mut rels = engine.store().list_relationships(project_id)?;
    if !all {
        rels.retain(|r| r.is_active);
    }

    if json {
        print_json(&rels)?;
        return Ok(());
    }
    if rels.is_empty() {
        println!("No relationships for {project_id}.");
        return Ok(());
    }
    let rows = rels
        .iter()
        .map(|r| {
            vec![
                format!("{}->{}", r.source_step, r.target_step),
                r.source_field.clone(),
                r.target_field.clone(),
                r.transform_type
                    .as_ref()
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                if r.is_active { "yes" } else { "no" }.to_string(),
            ]
        })
        .collect();
    print_table(&["STEPS", "SOURCE", "TARGET", "TRANSFORM", "ACTIVE"], rows);
    Ok(())
}

fn add(
    root: &Path,
    args: &RelationshipArgs,
    transform: Option<&str>,
    config: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    paths::validate_project_id(&args.project_id)?;
    let (_, engine) = open_engine(root)?;

    let transform_config = config
        .map(serde_json::from_str::<serde_json::Value>)
        .transpose()
        .context("--config must be valid JSON")?;
    let mut rel = FieldMappingRelationship::new(
        args.project_id.as_str(),
        args.source_step,
        args.target_step,
        args.source_field.as_str(),
        args.target_field.as_str(),
    );
    if let Some(t) = transform {
        let t = TransformType::from(t);
        if !t.is_known() {
            tracing::warn!(
                transform = %t,
                known = %TransformType::known_names(),
                "unknown transform; values will be copied"
            );
        }
        rel = rel.with_transform(t, transform_config);
    } else {
        rel.transform_config = transform_config;
    }

    let added = match engine.store().insert_relationship(&rel) {
        Ok(()) => true,
        Err(e) if e.is_duplicate() => false,
        Err(e) => return Err(e).context("failed to add relationship"),
    };

    if json {
        print_json(&serde_json::json!({ "added": added, "relationship": rel }))?;
    } else if added {
        println!("Added {}", rel.key());
    } else {
        println!("Already exists: {}", rel.key());
    }
    Ok(())
}

fn set_active(root: &Path, args: &RelationshipArgs, active: bool, json: bool) -> anyhow::Result<()> {
    let (_, engine) = open_engine(root)?;
    let key = args.key();
    let rel = engine
        .store()
        .set_relationship_active(&key, active)
        .with_context(|| format!("failed to update relationship {key}"))?;

    if json {
        print_json(&rel)?;
    } else {
        let state = if active { "Activated" } else { "Deactivated" };
        println!("{state} {key}");
    }
    Ok(())
}
