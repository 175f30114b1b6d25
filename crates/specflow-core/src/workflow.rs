//! Project initialization: workflow row plus seeded data flows.

use serde::Serialize;
use tracing::info;

use crate::config::SeedConfig;
use crate::error::Result;
use crate::paths;
use crate::seed::{self, SeedReport};
use crate::store::FlowStore;
use crate::types::ProjectWorkflow;

#[derive(Debug, Clone, Serialize)]
pub struct ProjectInit {
    pub workflow: ProjectWorkflow,
    /// False when the workflow already existed.
    pub created: bool,
    pub seeded: SeedReport,
}

/// Create the project's workflow and seed its relationships per `seed`.
///
/// Idempotent: an existing workflow is returned as-is and already-present
/// relationships are skipped.
pub fn init_project<S: FlowStore>(
    store: &S,
    project_id: &str,
    seed_config: &SeedConfig,
) -> Result<ProjectInit> {
    paths::validate_project_id(project_id)?;

    let created = store.find_workflow(project_id)?.is_none();
    let workflow = store.create_workflow(project_id)?;

    let mut seeded = SeedReport::default();
    if seed_config.defaults {
        let report = seed::create_default_data_flows(store, project_id)?;
        seeded.inserted += report.inserted;
        seeded.skipped += report.skipped;
    }
    if !seed_config.relationships.is_empty() {
        let report = seed::seed_data_flows(store, project_id, &seed_config.relationships)?;
        seeded.inserted += report.inserted;
        seeded.skipped += report.skipped;
    }

    info!(project = %project_id, created, "project initialized");
    Ok(ProjectInit {
        workflow,
        created,
        seeded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelationshipSpec;
    use crate::error::SpecflowError;
    use crate::store::FlowDb;
    use tempfile::TempDir;

    fn open_tmp() -> (TempDir, FlowDb) {
        let dir = TempDir::new().unwrap();
        let db = FlowDb::open(&dir.path().join("flows.db")).unwrap();
        (dir, db)
    }

    #[test]
    fn init_creates_workflow_and_seeds_defaults() {
        let (_dir, db) = open_tmp();
        let init = init_project(&db, "p1", &SeedConfig::default()).unwrap();
        assert!(init.created);
        assert_eq!(init.workflow.current_step, 1);
        assert_eq!(init.seeded.inserted, seed::default_data_flows().len());
    }

    #[test]
    fn init_twice_keeps_workflow_and_skips_seeds() {
        let (_dir, db) = open_tmp();
        let first = init_project(&db, "p1", &SeedConfig::default()).unwrap();
        let second = init_project(&db, "p1", &SeedConfig::default()).unwrap();
        assert!(!second.created);
        assert_eq!(second.workflow.id, first.workflow.id);
        assert_eq!(second.seeded.inserted, 0);
        assert_eq!(second.seeded.skipped, first.seeded.inserted);
    }

    #[test]
    fn init_with_custom_relationships_only() {
        let (_dir, db) = open_tmp();
        let seed_config = SeedConfig {
            defaults: false,
            relationships: vec![RelationshipSpec {
                source_step: 1,
                target_step: 2,
                source_field: "a".to_string(),
                target_field: "b".to_string(),
                transform_type: None,
                transform_config: None,
            }],
        };
        let init = init_project(&db, "p1", &seed_config).unwrap();
        assert_eq!(init.seeded.inserted, 1);
        assert_eq!(db.list_relationships("p1").unwrap().len(), 1);
    }

    #[test]
    fn init_rejects_bad_project_id() {
        let (_dir, db) = open_tmp();
        let err = init_project(&db, "bad id", &SeedConfig::default()).unwrap_err();
        assert!(matches!(err, SpecflowError::InvalidProjectId(_)));
    }
}
