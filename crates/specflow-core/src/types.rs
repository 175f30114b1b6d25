use crate::transform::TransformType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Workflow step number. Opaque to the engine; the guided workflow uses 1..=9.
pub type StepId = u32;

// ---------------------------------------------------------------------------
// RelationshipKey
// ---------------------------------------------------------------------------

/// The uniqueness tuple of a [`FieldMappingRelationship`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationshipKey {
    pub project_id: String,
    pub source_step: StepId,
    pub target_step: StepId,
    pub source_field: String,
    pub target_field: String,
}

impl fmt::Display for RelationshipKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}:{} -> {}:{}",
            self.project_id, self.source_step, self.source_field, self.target_step, self.target_field
        )
    }
}

// ---------------------------------------------------------------------------
// FieldMappingRelationship
// ---------------------------------------------------------------------------

/// One edge of a project's data flow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMappingRelationship {
    pub project_id: String,
    pub source_step: StepId,
    pub target_step: StepId,
    pub source_field: String,
    pub target_field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform_type: Option<TransformType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform_config: Option<Value>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl FieldMappingRelationship {
    /// An active, untransformed (copy) relationship.
    pub fn new(
        project_id: impl Into<String>,
        source_step: StepId,
        target_step: StepId,
        source_field: impl Into<String>,
        target_field: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            source_step,
            target_step,
            source_field: source_field.into(),
            target_field: target_field.into(),
            transform_type: None,
            transform_config: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    pub fn with_transform(mut self, transform: TransformType, config: Option<Value>) -> Self {
        self.transform_type = Some(transform);
        self.transform_config = config;
        self
    }

    pub fn key(&self) -> RelationshipKey {
        RelationshipKey {
            project_id: self.project_id.clone(),
            source_step: self.source_step,
            target_step: self.target_step,
            source_field: self.source_field.clone(),
            target_field: self.target_field.clone(),
        }
    }

    pub fn matches(&self, key: &RelationshipKey) -> bool {
        self.project_id == key.project_id
            && self.source_step == key.source_step
            && self.target_step == key.target_step
            && self.source_field == key.source_field
            && self.target_field == key.target_field
    }
}

// ---------------------------------------------------------------------------
// ProjectWorkflow
// ---------------------------------------------------------------------------

/// Parent row that step responses attach to. One per project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectWorkflow {
    pub id: Uuid,
    pub project_id: String,
    pub current_step: StepId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProjectWorkflow {
    pub fn new(project_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            project_id: project_id.into(),
            current_step: 1,
            created_at: now,
            updated_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// StepResponseDocument
// ---------------------------------------------------------------------------

/// Persisted state for one `(workflow, step)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResponseDocument {
    pub workflow_id: Uuid,
    pub step_id: StepId,
    pub responses: Value,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StepResponseDocument {
    /// A fresh, not-yet-completed document.
    pub fn new(workflow_id: Uuid, step_id: StepId, responses: Value) -> Self {
        let now = Utc::now();
        Self {
            workflow_id,
            step_id,
            responses,
            completed: false,
            created_at: now,
            updated_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// Flow run types
// ---------------------------------------------------------------------------

/// The `(project, source, target)` triple a flow run is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowContext {
    pub project_id: String,
    pub source_step: StepId,
    pub target_step: StepId,
}

impl FlowContext {
    pub fn new(project_id: impl Into<String>, source_step: StepId, target_step: StepId) -> Self {
        Self {
            project_id: project_id.into(),
            source_step,
            target_step,
        }
    }
}

/// One extracted and transformed value bound for `target_field`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub source_field: String,
    pub target_field: String,
    pub value: Value,
}
