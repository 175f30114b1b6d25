use crate::error::{Result, SpecflowError};
use crate::paths;
use crate::transform::TransformType;
use crate::types::{FieldMappingRelationship, StepId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// WorkflowConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Number of steps; valid step ids are `1..=steps`.
    #[serde(default = "default_steps")]
    pub steps: StepId,
    /// Push mapped fields into step N+1 when step N completes.
    #[serde(default = "default_propagate")]
    pub propagate_on_complete: bool,
}

fn default_steps() -> StepId {
    9
}

fn default_propagate() -> bool {
    true
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            steps: default_steps(),
            propagate_on_complete: default_propagate(),
        }
    }
}

impl WorkflowConfig {
    pub fn contains(&self, step: StepId) -> bool {
        (1..=self.steps).contains(&step)
    }

    pub fn check_step(&self, step: StepId) -> Result<()> {
        if self.contains(step) {
            Ok(())
        } else {
            Err(SpecflowError::InvalidStep {
                step,
                reason: format!("must be between 1 and {}", self.steps),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// SeedConfig
// ---------------------------------------------------------------------------

/// A relationship declared in config, seeded alongside the built-in flows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipSpec {
    pub source_step: StepId,
    pub target_step: StepId,
    pub source_field: String,
    pub target_field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform_type: Option<TransformType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform_config: Option<Value>,
}

impl RelationshipSpec {
    pub fn to_relationship(&self, project_id: &str) -> FieldMappingRelationship {
        let mut rel = FieldMappingRelationship::new(
            project_id,
            self.source_step,
            self.target_step,
            self.source_field.as_str(),
            self.target_field.as_str(),
        );
        rel.transform_type = self.transform_type.clone();
        rel.transform_config = self.transform_config.clone();
        rel
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedConfig {
    /// Seed the built-in flows when a workflow is created.
    #[serde(default = "default_seed_defaults")]
    pub defaults: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<RelationshipSpec>,
}

fn default_seed_defaults() -> bool {
    true
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            defaults: default_seed_defaults(),
            relationships: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// ProjectConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    pub project: ProjectConfig,
    /// Database file, relative to the project root unless absolute.
    #[serde(default = "default_database")]
    pub database: PathBuf,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub seed: SeedConfig,
}

fn default_version() -> u32 {
    1
}

fn default_database() -> PathBuf {
    PathBuf::from(paths::DEFAULT_DB_FILE)
}

impl Config {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            version: 1,
            project: ProjectConfig {
                name: project_name.into(),
                description: None,
            },
            database: default_database(),
            workflow: WorkflowConfig::default(),
            seed: SeedConfig::default(),
        }
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(SpecflowError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn db_path(&self, root: &Path) -> PathBuf {
        paths::db_path(root, &self.database)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.workflow.steps == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "workflow.steps must be at least 1".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for (i, spec) in self.seed.relationships.iter().enumerate() {
            let label = format!(
                "seed.relationships[{i}] ({}:{} -> {}:{})",
                spec.source_step, spec.source_field, spec.target_step, spec.target_field
            );

            for step in [spec.source_step, spec.target_step] {
                if !self.workflow.contains(step) {
                    warnings.push(ConfigWarning {
                        level: WarnLevel::Error,
                        message: format!(
                            "{label}: step {step} is outside 1..={}",
                            self.workflow.steps
                        ),
                    });
                }
            }

            if spec.source_step >= spec.target_step {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("{label}: flows backwards or onto the same step"),
                });
            }

            if spec.source_field.trim().is_empty() || spec.target_field.trim().is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("{label}: field paths must not be empty"),
                });
            }

            if let Some(t) = &spec.transform_type {
                if !t.is_known() {
                    warnings.push(ConfigWarning {
                        level: WarnLevel::Warning,
                        message: format!(
                            "{label}: unknown transform '{t}' will copy the value (known: {})",
                            TransformType::known_names()
                        ),
                    });
                }
            }

            let key = (
                spec.source_step,
                spec.target_step,
                spec.source_field.as_str(),
                spec.target_field.as_str(),
            );
            if !seen.insert(key) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("{label}: duplicate relationship will be skipped"),
                });
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
