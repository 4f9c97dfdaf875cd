//! Startup loading of the workspace catalog and the schema context.
//!
//! Both are read once at process start and treated as immutable for the
//! rest of the session.

use crate::domain::error::{AppError, Result};
use crate::domain::usage_schema::UsageSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// One entry of `workspaces.json`: display name -> Power BI identifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceInfo {
    pub workspace_id: String,
    pub dataset_id: String,
    /// Report names known for this workspace, used to resolve unquoted
    /// report mentions in questions.
    #[serde(default)]
    pub reports: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceCatalog {
    #[serde(flatten)]
    workspaces: BTreeMap<String, WorkspaceInfo>,
}

impl WorkspaceCatalog {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::ConfigError(format!(
                "Cannot read workspaces file {}: {}",
                path.display(),
                e
            ))
        })?;
        let catalog: WorkspaceCatalog = serde_json::from_str(&raw)
            .map_err(|e| AppError::ParseError(format!("Invalid workspaces JSON: {}", e)))?;
        if catalog.workspaces.is_empty() {
            return Err(AppError::ConfigError(
                "Workspaces file contains no workspaces".to_string(),
            ));
        }
        info!(count = catalog.workspaces.len(), "loaded workspace catalog");
        Ok(catalog)
    }

    pub fn names(&self) -> Vec<&str> {
        self.workspaces.keys().map(|k| k.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Result<&WorkspaceInfo> {
        self.workspaces.get(name).ok_or_else(|| {
            AppError::ConfigError(format!(
                "Unknown workspace '{}'. Available: {:?}",
                name,
                self.names()
            ))
        })
    }

    /// The only workspace, when exactly one is configured.
    pub fn sole_entry(&self) -> Option<(&str, &WorkspaceInfo)> {
        if self.workspaces.len() == 1 {
            self.workspaces.iter().next().map(|(k, v)| (k.as_str(), v))
        } else {
            None
        }
    }
}

/// Load the schema context. A present context file replaces the compiled-in
/// description; the reference template always stays the compiled constant
/// so adaptation has a fixed, known starting point.
pub fn load_schema(context_file: Option<&Path>) -> Result<UsageSchema> {
    let mut schema = UsageSchema::default();
    if let Some(path) = context_file {
        if path.exists() {
            schema.description = std::fs::read_to_string(path).map_err(|e| {
                AppError::ConfigError(format!(
                    "Cannot read context file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            schema.version += 1;
            info!(path = %path.display(), "loaded schema context from file");
        }
    }
    Ok(schema)
}
