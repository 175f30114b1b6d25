//! The data flow engine: moves field values between workflow steps.
//!
//! A flow run is a single pass: load the active relationships for a
//! `(project, source, target)` triple, load the source step's document,
//! extract and transform each field, then merge the results into the target
//! step's document. Missing relationships, documents or workflows are not
//! errors; they turn the run into a no-op. Storage errors propagate.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::config::WorkflowConfig;
use crate::error::{Result, SpecflowError};
use crate::nested::{get_nested_value, set_nested_value};
use crate::store::FlowStore;
use crate::transform::apply_transform;
use crate::types::{FieldMapping, FlowContext, StepId, StepResponseDocument};

// ---------------------------------------------------------------------------
// StepCompletion
// ---------------------------------------------------------------------------

/// Outcome of [`DataFlowEngine::complete_step`].
#[derive(Debug, Clone, Serialize)]
pub struct StepCompletion {
    pub project_id: String,
    pub step_id: StepId,
    pub next_step: Option<StepId>,
    /// Mappings written into `next_step`'s document.
    pub propagated: Vec<FieldMapping>,
    /// Set when propagation failed. The completed step itself was saved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub propagation_error: Option<String>,
}

// ---------------------------------------------------------------------------
// DataFlowEngine
// ---------------------------------------------------------------------------

pub struct DataFlowEngine<S> {
    store: S,
    workflow: WorkflowConfig,
}

impl<S: FlowStore> DataFlowEngine<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, WorkflowConfig::default())
    }

    pub fn with_config(store: S, workflow: WorkflowConfig) -> Self {
        Self { store, workflow }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Compute the mappings for one source→target transition without writing.
    ///
    /// Mappings come back in relationship insertion order. Relationships whose
    /// source path does not resolve are skipped.
    pub fn process_data_flow(&self, ctx: &FlowContext) -> Result<Vec<FieldMapping>> {
        let relationships =
            self.store
                .active_relationships(&ctx.project_id, ctx.source_step, ctx.target_step)?;
        if relationships.is_empty() {
            debug!(
                project = %ctx.project_id,
                from_step = ctx.source_step,
                to_step = ctx.target_step,
                "no active relationships"
            );
            return Ok(Vec::new());
        }

        let Some(workflow) = self.store.find_workflow(&ctx.project_id)? else {
            debug!(project = %ctx.project_id, "no workflow; nothing to propagate");
            return Ok(Vec::new());
        };
        let Some(source) = self.store.find_step_response(workflow.id, ctx.source_step)? else {
            debug!(
                project = %ctx.project_id,
                step = ctx.source_step,
                "source step has no responses yet"
            );
            return Ok(Vec::new());
        };

        let mappings: Vec<FieldMapping> = relationships
            .iter()
            .filter_map(|rel| {
                let raw = get_nested_value(&source.responses, &rel.source_field)?;
                let value = match &rel.transform_type {
                    Some(t) => apply_transform(raw, Some(t), rel.transform_config.as_ref()),
                    None => raw.clone(),
                };
                Some(FieldMapping {
                    source_field: rel.source_field.clone(),
                    target_field: rel.target_field.clone(),
                    value,
                })
            })
            .collect();

        debug!(
            project = %ctx.project_id,
            from_step = ctx.source_step,
            to_step = ctx.target_step,
            relationships = relationships.len(),
            mappings = mappings.len(),
            "processed data flow"
        );
        Ok(mappings)
    }

    /// Merge `mappings` into the step document, creating it if absent.
    ///
    /// Mappings apply in order, so a later mapping to the same (or an
    /// enclosing) path wins. Unrelated fields of the document are preserved.
    /// Without a workflow row for the project this is a no-op.
    pub fn apply_mappings_to_step(
        &self,
        project_id: &str,
        step_id: StepId,
        mappings: &[FieldMapping],
    ) -> Result<()> {
        if mappings.is_empty() {
            return Ok(());
        }
        let Some(workflow) = self.store.find_workflow(project_id)? else {
            debug!(project = %project_id, step = step_id, "no workflow; mappings dropped");
            return Ok(());
        };

        let mut doc = match self.store.find_step_response(workflow.id, step_id)? {
            Some(doc) => doc,
            None => StepResponseDocument::new(workflow.id, step_id, Value::Object(Map::new())),
        };
        for mapping in mappings {
            set_nested_value(&mut doc.responses, &mapping.target_field, mapping.value.clone());
        }
        self.store.upsert_step_response(&doc)?;

        info!(
            project = %project_id,
            step = step_id,
            fields = mappings.len(),
            "applied mappings"
        );
        Ok(())
    }

    /// Run [`process_data_flow`](Self::process_data_flow) and write the result
    /// into the target step. Returns the mappings that were applied.
    pub fn propagate(&self, ctx: &FlowContext) -> Result<Vec<FieldMapping>> {
        let mappings = self.process_data_flow(ctx)?;
        self.apply_mappings_to_step(&ctx.project_id, ctx.target_step, &mappings)?;
        Ok(mappings)
    }

    /// Record a step's responses as completed, advance the workflow and push
    /// mapped fields into the following step.
    ///
    /// Failing to save the completed step is an error. Failing to propagate
    /// afterwards is logged and reported in [`StepCompletion::propagation_error`].
    pub fn complete_step(
        &self,
        project_id: &str,
        step_id: StepId,
        responses: Value,
    ) -> Result<StepCompletion> {
        self.workflow.check_step(step_id)?;
        let mut workflow = self
            .store
            .find_workflow(project_id)?
            .ok_or_else(|| SpecflowError::WorkflowNotFound(project_id.to_string()))?;

        let mut doc = match self.store.find_step_response(workflow.id, step_id)? {
            Some(doc) => doc,
            None => StepResponseDocument::new(workflow.id, step_id, Value::Null),
        };
        doc.responses = responses;
        doc.completed = true;
        self.store.upsert_step_response(&doc)?;

        let next_step = (step_id < self.workflow.steps).then_some(step_id + 1);
        let reached = next_step.unwrap_or(step_id);
        if reached > workflow.current_step {
            workflow.current_step = reached;
            workflow.updated_at = chrono::Utc::now();
            self.store.save_workflow(&workflow)?;
        }
        info!(project = %project_id, step = step_id, "step completed");

        let mut completion = StepCompletion {
            project_id: project_id.to_string(),
            step_id,
            next_step,
            propagated: Vec::new(),
            propagation_error: None,
        };
        let Some(target) = next_step.filter(|_| self.workflow.propagate_on_complete) else {
            return Ok(completion);
        };

        match self.propagate(&FlowContext::new(project_id, step_id, target)) {
            Ok(mappings) => completion.propagated = mappings,
            Err(e) => {
                warn!(
                    project = %project_id,
                    from_step = step_id,
                    to_step = target,
                    error = %e,
                    "data flow propagation failed"
                );
                completion.propagation_error = Some(e.to_string());
            }
        }
        Ok(completion)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FlowDb;
    use crate::transform::TransformType;
    use crate::types::{FieldMappingRelationship, ProjectWorkflow, RelationshipKey};
    use serde_json::json;
    use std::cell::Cell;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn engine() -> (TempDir, DataFlowEngine<FlowDb>) {
        let dir = TempDir::new().unwrap();
        let db = FlowDb::open(&dir.path().join("flows.db")).unwrap();
        (dir, DataFlowEngine::new(db))
    }

    fn write_step(engine: &DataFlowEngine<FlowDb>, project: &str, step: StepId, responses: Value) {
        let wf = engine.store().create_workflow(project).unwrap();
        engine
            .store()
            .upsert_step_response(&StepResponseDocument::new(wf.id, step, responses))
            .unwrap();
    }

    fn read_step(engine: &DataFlowEngine<FlowDb>, project: &str, step: StepId) -> Option<Value> {
        let wf = engine.store().find_workflow(project).unwrap()?;
        engine
            .store()
            .find_step_response(wf.id, step)
            .unwrap()
            .map(|d| d.responses)
    }

    fn add(engine: &DataFlowEngine<FlowDb>, rel: FieldMappingRelationship) {
        engine.store().insert_relationship(&rel).unwrap();
    }

    #[test]
    fn no_relationships_yields_no_mappings() {
        let (_dir, engine) = engine();
        write_step(&engine, "p1", 1, json!({ "appName": "Foo" }));
        let mappings = engine.process_data_flow(&FlowContext::new("p1", 1, 9)).unwrap();
        assert!(mappings.is_empty());
    }

    #[test]
    fn missing_source_document_yields_no_mappings() {
        let (_dir, engine) = engine();
        add(&engine, FieldMappingRelationship::new("p1", 1, 2, "appName", "projectName"));
        // No workflow at all.
        assert!(engine.process_data_flow(&FlowContext::new("p1", 1, 2)).unwrap().is_empty());
        // Workflow, but step 1 never written.
        engine.store().create_workflow("p1").unwrap();
        assert!(engine.process_data_flow(&FlowContext::new("p1", 1, 2)).unwrap().is_empty());
    }

    #[test]
    fn copy_relationship_maps_value() {
        let (_dir, engine) = engine();
        add(
            &engine,
            FieldMappingRelationship::new("p1", 1, 2, "appName", "projectName")
                .with_transform(TransformType::Copy, None),
        );
        write_step(&engine, "p1", 1, json!({ "appName": "Foo" }));

        let mappings = engine.process_data_flow(&FlowContext::new("p1", 1, 2)).unwrap();
        assert_eq!(
            mappings,
            vec![FieldMapping {
                source_field: "appName".into(),
                target_field: "projectName".into(),
                value: json!("Foo"),
            }]
        );
    }

    #[test]
    fn unresolved_source_paths_are_skipped_but_nulls_propagate() {
        let (_dir, engine) = engine();
        add(&engine, FieldMappingRelationship::new("p1", 1, 2, "missing.path", "a"));
        add(&engine, FieldMappingRelationship::new("p1", 1, 2, "present", "b"));
        add(&engine, FieldMappingRelationship::new("p1", 1, 2, "empty", "c"));
        write_step(&engine, "p1", 1, json!({ "present": 1, "empty": null }));

        let mappings = engine.process_data_flow(&FlowContext::new("p1", 1, 2)).unwrap();
        let targets: Vec<&str> = mappings.iter().map(|m| m.target_field.as_str()).collect();
        assert_eq!(targets, ["b", "c"]);
        assert_eq!(mappings[1].value, Value::Null);
    }

    #[test]
    fn inactive_relationships_do_not_participate() {
        let (_dir, engine) = engine();
        let rel = FieldMappingRelationship::new("p1", 1, 2, "appName", "projectName");
        add(&engine, rel.clone());
        engine.store().set_relationship_active(&rel.key(), false).unwrap();
        write_step(&engine, "p1", 1, json!({ "appName": "Foo" }));
        assert!(engine.process_data_flow(&FlowContext::new("p1", 1, 2)).unwrap().is_empty());
    }

    #[test]
    fn transforms_apply_per_relationship() {
        let (_dir, engine) = engine();
        add(
            &engine,
            FieldMappingRelationship::new("p1", 3, 4, "features", "featureList").with_transform(
                TransformType::Aggregate,
                Some(json!({ "type": "concat", "separator": ", " })),
            ),
        );
        add(
            &engine,
            FieldMappingRelationship::new("p1", 3, 4, "theme", "summary.color").with_transform(
                TransformType::Template,
                Some(json!({ "template": "Color: {value}" })),
            ),
        );
        write_step(&engine, "p1", 3, json!({ "features": ["a", "b", "c"], "theme": "blue" }));

        let mappings = engine.process_data_flow(&FlowContext::new("p1", 3, 4)).unwrap();
        assert_eq!(mappings[0].value, json!("a, b, c"));
        assert_eq!(mappings[1].value, json!("Color: blue"));
    }

    #[test]
    fn apply_merges_and_preserves_siblings() {
        let (_dir, engine) = engine();
        write_step(&engine, "p1", 2, json!({ "a": { "c": 1 }, "z": 2 }));
        let mappings = [FieldMapping {
            source_field: "x".into(),
            target_field: "a.b".into(),
            value: json!(5),
        }];
        engine.apply_mappings_to_step("p1", 2, &mappings).unwrap();
        assert_eq!(
            read_step(&engine, "p1", 2).unwrap(),
            json!({ "a": { "b": 5, "c": 1 }, "z": 2 })
        );
    }

    #[test]
    fn apply_creates_incomplete_document_when_absent() {
        let (_dir, engine) = engine();
        let wf = engine.store().create_workflow("p1").unwrap();
        let mappings = [FieldMapping {
            source_field: "appName".into(),
            target_field: "appDetails.name".into(),
            value: json!("Foo"),
        }];
        engine.apply_mappings_to_step("p1", 2, &mappings).unwrap();

        let doc = engine.store().find_step_response(wf.id, 2).unwrap().unwrap();
        assert_eq!(doc.responses, json!({ "appDetails": { "name": "Foo" } }));
        assert!(!doc.completed);
    }

    #[test]
    fn apply_without_workflow_is_silent_noop() {
        let (_dir, engine) = engine();
        let mappings = [FieldMapping {
            source_field: "a".into(),
            target_field: "b".into(),
            value: json!(1),
        }];
        engine.apply_mappings_to_step("ghost", 2, &mappings).unwrap();
        assert!(engine.store().find_workflow("ghost").unwrap().is_none());
    }

    #[test]
    fn apply_empty_mappings_writes_nothing() {
        let (_dir, engine) = engine();
        engine.store().create_workflow("p1").unwrap();
        engine.apply_mappings_to_step("p1", 2, &[]).unwrap();
        assert!(read_step(&engine, "p1", 2).is_none());
    }

    #[test]
    fn later_relationship_wins_on_same_target_field() {
        let (_dir, engine) = engine();
        add(&engine, FieldMappingRelationship::new("p1", 1, 2, "first", "name"));
        add(&engine, FieldMappingRelationship::new("p1", 1, 2, "second", "name"));
        write_step(&engine, "p1", 1, json!({ "first": "A", "second": "B" }));

        engine.propagate(&FlowContext::new("p1", 1, 2)).unwrap();
        assert_eq!(read_step(&engine, "p1", 2).unwrap(), json!({ "name": "B" }));
    }

    #[test]
    fn later_mapping_to_enclosing_path_replaces_subtree() {
        let (_dir, engine) = engine();
        engine.store().create_workflow("p1").unwrap();
        let mappings = [
            FieldMapping {
                source_field: "x".into(),
                target_field: "a.b".into(),
                value: json!(1),
            },
            FieldMapping {
                source_field: "y".into(),
                target_field: "a".into(),
                value: json!("flat"),
            },
        ];
        engine.apply_mappings_to_step("p1", 2, &mappings).unwrap();
        assert_eq!(read_step(&engine, "p1", 2).unwrap(), json!({ "a": "flat" }));
    }

    #[test]
    fn complete_step_saves_and_propagates_to_next_step() {
        let (_dir, engine) = engine();
        engine.store().create_workflow("p1").unwrap();
        add(&engine, FieldMappingRelationship::new("p1", 1, 2, "idea.appName", "appDetails.name"));
        write_step(&engine, "p1", 2, json!({ "appDetails": { "tagline": "kept" } }));

        let completion = engine
            .complete_step("p1", 1, json!({ "idea": { "appName": "Foo" } }))
            .unwrap();
        assert_eq!(completion.next_step, Some(2));
        assert_eq!(completion.propagated.len(), 1);
        assert!(completion.propagation_error.is_none());

        let wf = engine.store().find_workflow("p1").unwrap().unwrap();
        assert_eq!(wf.current_step, 2);
        assert!(engine.store().find_step_response(wf.id, 1).unwrap().unwrap().completed);
        assert_eq!(
            read_step(&engine, "p1", 2).unwrap(),
            json!({ "appDetails": { "tagline": "kept", "name": "Foo" } })
        );
    }

    #[test]
    fn complete_last_step_has_no_next() {
        let (_dir, engine) = engine();
        engine.store().create_workflow("p1").unwrap();
        let completion = engine.complete_step("p1", 9, json!({ "done": true })).unwrap();
        assert_eq!(completion.next_step, None);
        let wf = engine.store().find_workflow("p1").unwrap().unwrap();
        assert_eq!(wf.current_step, 9);
    }

    #[test]
    fn complete_step_validates_inputs() {
        let (_dir, engine) = engine();
        assert!(matches!(
            engine.complete_step("p1", 1, json!({})).unwrap_err(),
            SpecflowError::WorkflowNotFound(_)
        ));
        engine.store().create_workflow("p1").unwrap();
        assert!(matches!(
            engine.complete_step("p1", 0, json!({})).unwrap_err(),
            SpecflowError::InvalidStep { .. }
        ));
        assert!(matches!(
            engine.complete_step("p1", 10, json!({})).unwrap_err(),
            SpecflowError::InvalidStep { .. }
        ));
    }

    #[test]
    fn complete_step_skips_propagation_when_disabled() {
        let dir = TempDir::new().unwrap();
        let db = FlowDb::open(&dir.path().join("flows.db")).unwrap();
        let engine = DataFlowEngine::with_config(
            db,
            WorkflowConfig {
                steps: 9,
                propagate_on_complete: false,
            },
        );
        engine.store().create_workflow("p1").unwrap();
        add(&engine, FieldMappingRelationship::new("p1", 1, 2, "a", "b"));
        let completion = engine.complete_step("p1", 1, json!({ "a": 1 })).unwrap();
        assert!(completion.propagated.is_empty());
        assert!(read_step(&engine, "p1", 2).is_none());
    }

    // -----------------------------------------------------------------------
    // Storage failures
    // -----------------------------------------------------------------------

    /// Delegates to a real store but fails writes to one step.
    struct FailingStore {
        inner: FlowDb,
        fail_writes_to: StepId,
        fail_reads: Cell<bool>,
    }

    impl FlowStore for FailingStore {
        fn insert_relationship(&self, rel: &FieldMappingRelationship) -> Result<()> {
            self.inner.insert_relationship(rel)
        }
        fn active_relationships(
            &self,
            project_id: &str,
            source_step: StepId,
            target_step: StepId,
        ) -> Result<Vec<FieldMappingRelationship>> {
            if self.fail_reads.get() {
                return Err(SpecflowError::Db("read failed".into()));
            }
            self.inner.active_relationships(project_id, source_step, target_step)
        }
        fn list_relationships(&self, project_id: &str) -> Result<Vec<FieldMappingRelationship>> {
            self.inner.list_relationships(project_id)
        }
        fn set_relationship_active(
            &self,
            key: &RelationshipKey,
            active: bool,
        ) -> Result<FieldMappingRelationship> {
            self.inner.set_relationship_active(key, active)
        }
        fn find_workflow(&self, project_id: &str) -> Result<Option<ProjectWorkflow>> {
            self.inner.find_workflow(project_id)
        }
        fn create_workflow(&self, project_id: &str) -> Result<ProjectWorkflow> {
            self.inner.create_workflow(project_id)
        }
        fn save_workflow(&self, workflow: &ProjectWorkflow) -> Result<()> {
            self.inner.save_workflow(workflow)
        }
        fn find_step_response(
            &self,
            workflow_id: Uuid,
            step_id: StepId,
        ) -> Result<Option<StepResponseDocument>> {
            self.inner.find_step_response(workflow_id, step_id)
        }
        fn upsert_step_response(&self, doc: &StepResponseDocument) -> Result<()> {
            if doc.step_id == self.fail_writes_to {
                return Err(SpecflowError::Db("disk full".into()));
            }
            self.inner.upsert_step_response(doc)
        }
        fn list_step_responses(&self, workflow_id: Uuid) -> Result<Vec<StepResponseDocument>> {
            self.inner.list_step_responses(workflow_id)
        }
    }

    fn failing_engine(fail_writes_to: StepId) -> (TempDir, DataFlowEngine<FailingStore>) {
        let dir = TempDir::new().unwrap();
        let inner = FlowDb::open(&dir.path().join("flows.db")).unwrap();
        let store = FailingStore {
            inner,
            fail_writes_to,
            fail_reads: Cell::new(false),
        };
        (dir, DataFlowEngine::new(store))
    }

    #[test]
    fn storage_errors_propagate_from_flow_operations() {
        let (_dir, engine) = failing_engine(2);
        engine.store().create_workflow("p1").unwrap();
        let mapping = FieldMapping {
            source_field: "a".into(),
            target_field: "b".into(),
            value: json!(1),
        };
        assert!(matches!(
            engine.apply_mappings_to_step("p1", 2, &[mapping]).unwrap_err(),
            SpecflowError::Db(_)
        ));

        engine.store().fail_reads.set(true);
        assert!(engine.process_data_flow(&FlowContext::new("p1", 1, 2)).is_err());
    }

    #[test]
    fn propagation_failure_does_not_fail_step_completion() {
        let (_dir, engine) = failing_engine(2);
        engine.store().create_workflow("p1").unwrap();
        engine
            .store()
            .insert_relationship(&FieldMappingRelationship::new("p1", 1, 2, "a", "b"))
            .unwrap();

        let completion = engine.complete_step("p1", 1, json!({ "a": 1 })).unwrap();
        assert!(completion.propagated.is_empty());
        assert!(completion.propagation_error.unwrap().contains("disk full"));

        let wf = engine.store().find_workflow("p1").unwrap().unwrap();
        assert!(engine.store().find_step_response(wf.id, 1).unwrap().unwrap().completed);
    }

    #[test]
    fn failing_to_save_the_step_itself_is_an_error() {
        let (_dir, engine) = failing_engine(1);
        engine.store().create_workflow("p1").unwrap();
        assert!(engine.complete_step("p1", 1, json!({})).is_err());
    }
}
