//! The set of workflow definitions served by this instance.
//!
//! Loaded from the workflow file on the first invocation after a cold start and
//! shared read-only afterwards.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::models::{WorkflowDefinition, WorkflowFile};
use crate::validate::validate_workflow;
use crate::EngineError;

#[derive(Debug, Clone, Default)]
pub struct WorkflowCatalog {
    workflows: Vec<Arc<WorkflowDefinition>>,
}

impl WorkflowCatalog {
    /// Build a catalog from already-parsed definitions, validating each.
    pub fn new(workflows: Vec<WorkflowDefinition>) -> Result<Self, EngineError> {
        for workflow in &workflows {
            let reachable = validate_workflow(workflow)?;
            if reachable.len() < workflow.workflow.len() {
                warn!(
                    workflow = %workflow.name,
                    "{} step(s) unreachable from '{}'",
                    workflow.workflow.len() - reachable.len(),
                    workflow.start_at
                );
            }
        }

        Ok(Self {
            workflows: workflows.into_iter().map(Arc::new).collect(),
        })
    }

    /// Parse a workflow file's contents.
    pub fn from_json_str(content: &str) -> Result<Self, EngineError> {
        let file: WorkflowFile = serde_json::from_str(content)
            .map_err(|e| EngineError::DefinitionLoad(format!("invalid JSON: {e}")))?;
        Self::new(file.workflows)
    }

    /// Read and parse a workflow file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            EngineError::DefinitionLoad(format!("cannot read {}: {e}", path.display()))
        })?;
        let catalog = Self::from_json_str(&content)?;
        info!(path = %path.display(), workflows = catalog.len(), "workflow definitions loaded");
        Ok(catalog)
    }

    /// Look up a workflow by name.
    ///
    /// # Errors
    /// [`EngineError::UnknownWorkflow`] when no definition carries `name`.
    pub fn find(&self, name: &str) -> Result<Arc<WorkflowDefinition>, EngineError> {
        self.workflows
            .iter()
            .find(|w| w.name == name)
            .cloned()
            .ok_or_else(|| EngineError::UnknownWorkflow(name.to_owned()))
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<WorkflowDefinition>> {
        self.workflows.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FILE: &str = r#"{
        "workflows": [{
            "name": "wf",
            "startAt": "a",
            "workflow": {
                "a": { "type": "Task", "provider": "aws", "functionEndpoint": { "hostname": "a.example", "path": "/a" },
                       "inputPath": "aIn", "resultPath": "aOut", "next": "b" },
                "b": { "type": "Task", "provider": "openWhisk", "functionEndpoint": { "hostname": "b.example", "path": "/b" },
                       "inputPath": "bIn", "resultPath": "bOut", "end": "true" }
            }
        }]
    }"#;

    #[test]
    fn finds_workflows_by_name() {
        let catalog = WorkflowCatalog::from_json_str(FILE).unwrap();
        assert_eq!(catalog.len(), 1);
        let wf = catalog.find("wf").unwrap();
        assert_eq!(wf.start_at, "a");
        assert_eq!(wf.workflow.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn unknown_name_is_an_unknown_workflow_error() {
        let catalog = WorkflowCatalog::from_json_str(FILE).unwrap();
        assert!(matches!(
            catalog.find("other"),
            Err(EngineError::UnknownWorkflow(name)) if name == "other"
        ));
    }

    #[test]
    fn malformed_file_is_a_load_error() {
        assert!(matches!(
            WorkflowCatalog::from_json_str("{ not json"),
            Err(EngineError::DefinitionLoad(_))
        ));
    }

    #[tokio::test]
    async fn loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FILE.as_bytes()).unwrap();

        let catalog = WorkflowCatalog::load(file.path()).await.unwrap();
        assert!(catalog.find("wf").is_ok());
    }

    #[tokio::test]
    async fn missing_file_is_a_load_error() {
        let err = WorkflowCatalog::load("/definitely/not/here.json").await.unwrap_err();
        assert!(matches!(err, EngineError::DefinitionLoad(_)));
    }
}
