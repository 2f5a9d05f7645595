//! Loads a workflow document from YAML (§6 "Workflow configuration").
//! Parsing itself is just `serde_yaml`; everything shape-specific lives on
//! `orka_core::config::WorkflowDocument`.

use orka_core::config::WorkflowDocument;

use crate::error::{OrchestratorError, Result};

pub fn load_from_str(yaml: &str) -> Result<WorkflowDocument> {
    Ok(serde_yaml::from_str(yaml)?)
}

pub async fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<WorkflowDocument> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| OrchestratorError::Run(format!("reading {}: {e}", path.display())))?;
    load_from_str(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_a_minimal_document() {
        let yaml = r#"
orchestrator:
  id: demo
  agents: [a, b]
agents:
  - id: a
    type: echo
    queue: b
  - id: b
    type: echo
"#;
        let doc = load_from_str(yaml).unwrap();
        assert_eq!(doc.orchestrator.id, "demo");
        assert_eq!(doc.agents.len(), 2);
    }

    #[test]
    fn rejects_malformed_yaml() {
        let result = load_from_str("agents: [this is not: valid");
        assert!(result.is_err());
    }
}
