//! Built-in field mappings seeded into every new project.
//!
//! The table is plain data; [`seed_data_flows`] takes any list so callers can
//! seed custom flows (from config, tests) through the same idempotent path.

use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

use crate::config::RelationshipSpec;
use crate::error::Result;
use crate::store::FlowStore;
use crate::transform::TransformType;
use crate::types::StepId;

/// Source and target paths of the built-in copy flows.
const DEFAULT_COPY_FLOWS: &[(StepId, StepId, &str, &str)] = &[
    // 1 idea -> 2 validation
    (1, 2, "idea.description", "appDetails.problemStatement"),
    (1, 2, "idea.targetAudience", "appDetails.targetAudience"),
    // 2 validation -> 3 blueprint
    (2, 3, "appDetails.appName", "blueprint.appName"),
    (2, 3, "appDetails.valueProposition", "blueprint.valueProposition"),
    (2, 3, "appDetails.problemStatement", "blueprint.problemStatement"),
    (2, 3, "personas", "blueprint.personas"),
    // 3 blueprint -> 4 user flows
    (3, 4, "blueprint.personas", "userFlows.personas"),
    (3, 4, "blueprint.coreFeatures", "userFlows.features"),
    // 4 user flows -> 5 architecture
    (4, 5, "userFlows.flows", "architecture.userFlows"),
    (4, 5, "userFlows.features", "architecture.features"),
    // 5 architecture -> 6 data model
    (5, 6, "architecture.techStack", "dataModel.techStack"),
    (5, 6, "architecture.entities", "dataModel.entities"),
];

/// The built-in relationships, in seeding order.
pub fn default_data_flows() -> Vec<RelationshipSpec> {
    let mut flows: Vec<RelationshipSpec> = DEFAULT_COPY_FLOWS
        .iter()
        .map(|&(source_step, target_step, source_field, target_field)| RelationshipSpec {
            source_step,
            target_step,
            source_field: source_field.to_string(),
            target_field: target_field.to_string(),
            transform_type: None,
            transform_config: None,
        })
        .collect();

    let transformed = [
        RelationshipSpec {
            source_step: 1,
            target_step: 2,
            source_field: "idea.appName".to_string(),
            target_field: "appDetails.appName".to_string(),
            transform_type: Some(TransformType::Trim),
            transform_config: None,
        },
        RelationshipSpec {
            source_step: 2,
            target_step: 3,
            source_field: "personas".to_string(),
            target_field: "blueprint.personaSummary".to_string(),
            transform_type: Some(TransformType::Aggregate),
            transform_config: Some(json!({ "type": "count" })),
        },
        RelationshipSpec {
            source_step: 3,
            target_step: 4,
            source_field: "blueprint.coreFeatures".to_string(),
            target_field: "userFlows.featureSummary".to_string(),
            transform_type: Some(TransformType::Aggregate),
            transform_config: Some(json!({ "type": "concat", "separator": ", " })),
        },
        RelationshipSpec {
            source_step: 3,
            target_step: 4,
            source_field: "blueprint.appName".to_string(),
            target_field: "userFlows.context".to_string(),
            transform_type: Some(TransformType::Template),
            transform_config: Some(json!({ "template": "User flows for {value}" })),
        },
    ];
    flows.extend(transformed);
    flows.sort_by_key(|f| (f.source_step, f.target_step));
    flows
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeedReport {
    pub inserted: usize,
    /// Relationships that already existed for the project.
    pub skipped: usize,
}

/// Insert `flows` for `project_id`, ignoring ones that already exist.
///
/// Any storage error other than the uniqueness violation propagates.
pub fn seed_data_flows<S: FlowStore>(
    store: &S,
    project_id: &str,
    flows: &[RelationshipSpec],
) -> Result<SeedReport> {
    let mut report = SeedReport::default();
    for spec in flows {
        let rel = spec.to_relationship(project_id);
        match store.insert_relationship(&rel) {
            Ok(()) => report.inserted += 1,
            Err(e) if e.is_duplicate() => {
                debug!(relationship = %rel.key(), "already seeded");
                report.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }
    info!(
        project = %project_id,
        inserted = report.inserted,
        skipped = report.skipped,
        "seeded data flows"
    );
    Ok(report)
}

/// Seed the built-in flows. Safe to call repeatedly.
pub fn create_default_data_flows<S: FlowStore>(store: &S, project_id: &str) -> Result<SeedReport> {
    seed_data_flows(store, project_id, &default_data_flows())
}
