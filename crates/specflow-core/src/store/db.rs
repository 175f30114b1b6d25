//! redb-backed [`FlowStore`].
//!
//! # Table design
//!
//! `RELATIONSHIPS` uses a composite byte key:
//! ```text
//! [ project_id bytes | 0x00 | source_step u32 BE | target_step u32 BE | seq u64 BE ]
//! ```
//! Project ids never contain NUL, so a range scan over
//! `prefix ++ 0x00..=prefix ++ 0xff` returns exactly one triple's
//! relationships, in insertion order because `seq` is monotonic.
//!
//! `STEP_RESPONSES` is keyed by `[ workflow uuid (16 bytes) | step_id u32 BE ]`.
//! `WORKFLOWS` is keyed by project id. All values are JSON.

use std::path::Path;

use chrono::Utc;
use redb::{Database, ReadableTable, TableDefinition};
use uuid::Uuid;

use crate::error::{Result, SpecflowError};
use crate::paths::validate_project_id;
use crate::types::{
    FieldMappingRelationship, ProjectWorkflow, RelationshipKey, StepId, StepResponseDocument,
};

use super::FlowStore;

// ---------------------------------------------------------------------------
// Table definitions
// ---------------------------------------------------------------------------

const RELATIONSHIPS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("relationships");
const WORKFLOWS: TableDefinition<&str, &[u8]> = TableDefinition::new("workflows");
const STEP_RESPONSES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("step_responses");
const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

const RELATIONSHIP_SEQ: &str = "relationship_seq";

fn db_err<E: std::fmt::Display>(e: E) -> SpecflowError {
    SpecflowError::Db(e.to_string())
}

// ---------------------------------------------------------------------------
// Key helpers
// ---------------------------------------------------------------------------

fn triple_prefix(project_id: &str, source_step: StepId, target_step: StepId) -> Vec<u8> {
    let mut key = Vec::with_capacity(project_id.len() + 1 + 8 + 8);
    key.extend_from_slice(project_id.as_bytes());
    key.push(0);
    key.extend_from_slice(&source_step.to_be_bytes());
    key.extend_from_slice(&target_step.to_be_bytes());
    key
}

fn relationship_key(rel: &FieldMappingRelationship, seq: u64) -> Vec<u8> {
    let mut key = triple_prefix(&rel.project_id, rel.source_step, rel.target_step);
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

/// Inclusive bounds covering every key that starts with `prefix` and carries
/// `suffix_len` more bytes.
fn prefix_bounds(prefix: &[u8], suffix_len: usize) -> (Vec<u8>, Vec<u8>) {
    let mut lower = prefix.to_vec();
    lower.resize(prefix.len() + suffix_len, 0x00);
    let mut upper = prefix.to_vec();
    upper.resize(prefix.len() + suffix_len, 0xff);
    (lower, upper)
}

fn step_key(workflow_id: Uuid, step_id: StepId) -> [u8; 20] {
    let mut key = [0u8; 20];
    key[..16].copy_from_slice(workflow_id.as_bytes());
    key[16..].copy_from_slice(&step_id.to_be_bytes());
    key
}

// ---------------------------------------------------------------------------
// FlowDb
// ---------------------------------------------------------------------------

/// Persistent store for relationships, workflows and step documents.
pub struct FlowDb {
    db: Database,
}

impl FlowDb {
    /// Open or create the redb database at `path`, creating all tables.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            crate::io::ensure_dir(parent)?;
        }
        let db = Database::create(path).map_err(db_err)?;
        let wt = db.begin_write().map_err(db_err)?;
        wt.open_table(RELATIONSHIPS).map_err(db_err)?;
        wt.open_table(WORKFLOWS).map_err(db_err)?;
        wt.open_table(STEP_RESPONSES).map_err(db_err)?;
        wt.open_table(META).map_err(db_err)?;
        wt.commit().map_err(db_err)?;
        Ok(Self { db })
    }

    fn scan_relationships(&self, lower: &[u8], upper: &[u8]) -> Result<Vec<FieldMappingRelationship>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(RELATIONSHIPS).map_err(db_err)?;

        let mut result = Vec::new();
        for entry in table.range(lower..=upper).map_err(db_err)? {
            let (_, v) = entry.map_err(db_err)?;
            result.push(serde_json::from_slice(v.value())?);
        }
        Ok(result)
    }
}

impl FlowStore for FlowDb {
    fn insert_relationship(&self, rel: &FieldMappingRelationship) -> Result<()> {
        validate_project_id(&rel.project_id)?;
        let prefix = triple_prefix(&rel.project_id, rel.source_step, rel.target_step);
        let (lower, upper) = prefix_bounds(&prefix, 8);
        let key = rel.key();
        let value = serde_json::to_vec(rel)?;

        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let mut table = wt.open_table(RELATIONSHIPS).map_err(db_err)?;

            // Existence check and insert share the write transaction.
            for entry in table
                .range(lower.as_slice()..=upper.as_slice())
                .map_err(db_err)?
            {
                let (_, v) = entry.map_err(db_err)?;
                let existing: FieldMappingRelationship = serde_json::from_slice(v.value())?;
                if existing.matches(&key) {
                    return Err(SpecflowError::DuplicateRelationship(key.to_string()));
                }
            }

            let mut meta = wt.open_table(META).map_err(db_err)?;
            let seq = meta
                .get(RELATIONSHIP_SEQ)
                .map_err(db_err)?
                .map(|g| g.value())
                .unwrap_or(0);
            meta.insert(RELATIONSHIP_SEQ, seq + 1).map_err(db_err)?;

            let raw_key = relationship_key(rel, seq);
            table
                .insert(raw_key.as_slice(), value.as_slice())
                .map_err(db_err)?;
        }
        wt.commit().map_err(db_err)?;
        Ok(())
    }

    fn active_relationships(
        &self,
        project_id: &str,
        source_step: StepId,
        target_step: StepId,
    ) -> Result<Vec<FieldMappingRelationship>> {
        let prefix = triple_prefix(project_id, source_step, target_step);
        let (lower, upper) = prefix_bounds(&prefix, 8);
        let mut rels = self.scan_relationships(&lower, &upper)?;
        rels.retain(|r| r.is_active);
        Ok(rels)
    }

    fn list_relationships(&self, project_id: &str) -> Result<Vec<FieldMappingRelationship>> {
        let mut prefix = project_id.as_bytes().to_vec();
        prefix.push(0);
        let (lower, upper) = prefix_bounds(&prefix, 16);
        self.scan_relationships(&lower, &upper)
    }

    fn set_relationship_active(
        &self,
        key: &RelationshipKey,
        active: bool,
    ) -> Result<FieldMappingRelationship> {
        let prefix = triple_prefix(&key.project_id, key.source_step, key.target_step);
        let (lower, upper) = prefix_bounds(&prefix, 8);

        let wt = self.db.begin_write().map_err(db_err)?;
        let updated = {
            let mut table = wt.open_table(RELATIONSHIPS).map_err(db_err)?;

            let mut found = None;
            for entry in table
                .range(lower.as_slice()..=upper.as_slice())
                .map_err(db_err)?
            {
                let (k, v) = entry.map_err(db_err)?;
                let rel: FieldMappingRelationship = serde_json::from_slice(v.value())?;
                if rel.matches(key) {
                    found = Some((k.value().to_vec(), rel));
                    break;
                }
            }

            let (raw_key, mut rel) =
                found.ok_or_else(|| SpecflowError::RelationshipNotFound(key.to_string()))?;
            rel.is_active = active;
            let value = serde_json::to_vec(&rel)?;
            table
                .insert(raw_key.as_slice(), value.as_slice())
                .map_err(db_err)?;
            rel
        };
        wt.commit().map_err(db_err)?;
        Ok(updated)
    }

    fn find_workflow(&self, project_id: &str) -> Result<Option<ProjectWorkflow>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(WORKFLOWS).map_err(db_err)?;
        let guard = table.get(project_id).map_err(db_err)?;
        let workflow = match guard {
            Some(v) => Some(serde_json::from_slice(v.value())?),
            None => None,
        };
        Ok(workflow)
    }

    fn create_workflow(&self, project_id: &str) -> Result<ProjectWorkflow> {
        validate_project_id(project_id)?;
        let wt = self.db.begin_write().map_err(db_err)?;
        let workflow = {
            let mut table = wt.open_table(WORKFLOWS).map_err(db_err)?;
            let existing: Option<ProjectWorkflow> = match table.get(project_id).map_err(db_err)? {
                Some(v) => Some(serde_json::from_slice(v.value())?),
                None => None,
            };
            match existing {
                Some(workflow) => workflow,
                None => {
                    let workflow = ProjectWorkflow::new(project_id);
                    let value = serde_json::to_vec(&workflow)?;
                    table.insert(project_id, value.as_slice()).map_err(db_err)?;
                    workflow
                }
            }
        };
        wt.commit().map_err(db_err)?;
        Ok(workflow)
    }

    fn save_workflow(&self, workflow: &ProjectWorkflow) -> Result<()> {
        let value = serde_json::to_vec(workflow)?;
        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let mut table = wt.open_table(WORKFLOWS).map_err(db_err)?;
            table
                .insert(workflow.project_id.as_str(), value.as_slice())
                .map_err(db_err)?;
        }
        wt.commit().map_err(db_err)?;
        Ok(())
    }

    fn find_step_response(
        &self,
        workflow_id: Uuid,
        step_id: StepId,
    ) -> Result<Option<StepResponseDocument>> {
        let key = step_key(workflow_id, step_id);
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(STEP_RESPONSES).map_err(db_err)?;
        let guard = table.get(key.as_slice()).map_err(db_err)?;
        let doc = match guard {
            Some(v) => Some(serde_json::from_slice(v.value())?),
            None => None,
        };
        Ok(doc)
    }

    fn upsert_step_response(&self, doc: &StepResponseDocument) -> Result<()> {
        let key = step_key(doc.workflow_id, doc.step_id);
        let mut doc = doc.clone();
        doc.updated_at = Utc::now();
        let value = serde_json::to_vec(&doc)?;

        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let mut table = wt.open_table(STEP_RESPONSES).map_err(db_err)?;
            table
                .insert(key.as_slice(), value.as_slice())
                .map_err(db_err)?;
        }
        wt.commit().map_err(db_err)?;
        Ok(())
    }

    fn list_step_responses(&self, workflow_id: Uuid) -> Result<Vec<StepResponseDocument>> {
        let (lower, upper) = prefix_bounds(workflow_id.as_bytes(), 4);
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(STEP_RESPONSES).map_err(db_err)?;

        let mut result = Vec::new();
        for entry in table
            .range(lower.as_slice()..=upper.as_slice())
            .map_err(db_err)?
        {
            let (_, v) = entry.map_err(db_err)?;
            result.push(serde_json::from_slice(v.value())?);
        }
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
