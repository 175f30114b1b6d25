//! Persistence seam for the data flow engine.
//!
//! [`FlowStore`] is the key-value document interface the engine, seeder and
//! workflow helpers talk to. [`FlowDb`] is the redb-backed implementation.
//! Every method is atomic on its own; nothing spans a read-transform-write
//! sequence, so concurrent writers to the same step document interleave.

pub mod db;

pub use db::FlowDb;

use crate::error::Result;
use crate::types::{
    FieldMappingRelationship, ProjectWorkflow, RelationshipKey, StepId, StepResponseDocument,
};
use uuid::Uuid;

pub trait FlowStore {
    /// Insert a relationship. Fails with `DuplicateRelationship` when the
    /// `(project, source, target, source_field, target_field)` tuple exists.
    fn insert_relationship(&self, rel: &FieldMappingRelationship) -> Result<()>;

    /// Active relationships for one `(project, source, target)` triple, in
    /// insertion order.
    fn active_relationships(
        &self,
        project_id: &str,
        source_step: StepId,
        target_step: StepId,
    ) -> Result<Vec<FieldMappingRelationship>>;

    /// Every relationship of a project, active or not, ordered by
    /// `(source_step, target_step, insertion)`.
    fn list_relationships(&self, project_id: &str) -> Result<Vec<FieldMappingRelationship>>;

    /// Flip `is_active` on an existing relationship and return the updated row.
    fn set_relationship_active(
        &self,
        key: &RelationshipKey,
        active: bool,
    ) -> Result<FieldMappingRelationship>;

    fn find_workflow(&self, project_id: &str) -> Result<Option<ProjectWorkflow>>;

    /// Return the project's workflow, creating it first if absent.
    fn create_workflow(&self, project_id: &str) -> Result<ProjectWorkflow>;

    fn save_workflow(&self, workflow: &ProjectWorkflow) -> Result<()>;

    fn find_step_response(
        &self,
        workflow_id: Uuid,
        step_id: StepId,
    ) -> Result<Option<StepResponseDocument>>;

    /// Insert or replace the document for `(doc.workflow_id, doc.step_id)`.
    fn upsert_step_response(&self, doc: &StepResponseDocument) -> Result<()>;

    /// All step documents of a workflow, ordered by step.
    fn list_step_responses(&self, workflow_id: Uuid) -> Result<Vec<StepResponseDocument>>;
}
