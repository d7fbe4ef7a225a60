//! End-to-end workflow validation: parse, infer, report.

use std::path::{Path, PathBuf};

use super::ast::Ast;
use super::checker::{TypeEnvironment, TypeInference};
use super::parser;

/// Outcome of validating one workflow.
#[derive(Debug)]
pub struct ValidationReport {
    pub workflow_path: PathBuf,
    pub success: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Bindings built during inference; present only on success.
    pub type_environment: Option<TypeEnvironment>,
}

impl ValidationReport {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn summary(&self) -> String {
        let mut lines = vec![
            format!(
                "Validation Report: {}",
                self.workflow_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| self.workflow_path.display().to_string())
            ),
            "=".repeat(60),
            String::new(),
        ];

        if self.success {
            lines.push("✓ Validation PASSED".to_owned());
        } else {
            lines.push("✗ Validation FAILED".to_owned());
        }
        lines.push(String::new());
        lines.push(format!("Errors:   {}", self.errors.len()));
        lines.push(format!("Warnings: {}", self.warnings.len()));

        if !self.errors.is_empty() {
            lines.push(String::new());
            lines.push("Errors:".to_owned());
            for (i, error) in self.errors.iter().enumerate() {
                lines.push(format!("  {}. {error}", i + 1));
            }
        }
        if !self.warnings.is_empty() {
            lines.push(String::new());
            lines.push("Warnings:".to_owned());
            for (i, warning) in self.warnings.iter().enumerate() {
                lines.push(format!("  {}. {warning}", i + 1));
            }
        }

        if let Some(env) = &self.type_environment {
            let mut bindings: Vec<String> = env
                .bindings()
                .map(|(name, ty)| format!("  {name} :: {ty}"))
                .collect();
            if !bindings.is_empty() {
                bindings.sort();
                lines.push(String::new());
                lines.push("Type Environment:".to_owned());
                lines.extend(bindings);
            }
        }

        lines.join("\n")
    }
}

/// Validates workflow files before they are allowed to run.
#[derive(Default)]
pub struct WorkflowValidator;

impl WorkflowValidator {
    pub fn new() -> Self {
        Self
    }

    pub async fn validate_file(&self, path: impl AsRef<Path>) -> ValidationReport {
        let path = path.as_ref();
        match tokio::fs::read_to_string(path).await {
            Ok(source) => self.validate_text(&source, path),
            Err(e) => ValidationReport {
                workflow_path: path.to_path_buf(),
                success: false,
                errors: vec![format!("Error reading workflow file: {e}")],
                warnings: Vec::new(),
                type_environment: None,
            },
        }
    }

    pub fn validate_text(&self, source: &str, name: impl AsRef<Path>) -> ValidationReport {
        let workflow_path = name.as_ref().to_path_buf();

        let statements = match parser::parse_program(source) {
            Ok(statements) => statements,
            Err(e) => {
                return ValidationReport {
                    workflow_path,
                    success: false,
                    errors: vec![format!("Parse error: {e}")],
                    warnings: Vec::new(),
                    type_environment: None,
                };
            }
        };

        let mut inference = TypeInference::new();
        inference.infer_program(&statements);

        let success = !inference.diagnostics.has_errors();
        ValidationReport {
            workflow_path,
            success,
            errors: inference.diagnostics.errors,
            warnings: inference.diagnostics.warnings,
            type_environment: success.then_some(inference.type_env),
        }
    }

    /// Parse and validate together, for callers that go on to execute.
    pub fn parse_and_validate(
        &self,
        source: &str,
        name: impl AsRef<Path>,
    ) -> (Option<Vec<Ast>>, ValidationReport) {
        let report = self.validate_text(source, name);
        if !report.success {
            return (None, report);
        }
        // The program parsed during validation; reparse for the caller.
        let statements = parser::parse_program(source).ok();
        (statements, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELL_TYPED: &str = "\
fetch :: () -> Data
process :: Data -> Result
pipeline = process ∘ fetch
";

    const ILL_TYPED: &str = "\
fetch :: () -> Data
render :: Html -> Page
render ∘ fetch
";

    #[test]
    fn test_well_typed_workflow_passes() {
        let report = WorkflowValidator::new().validate_text(WELL_TYPED, "pipeline.ct");
        assert!(report.success, "{}", report.summary());
        assert!(!report.has_errors());
        let env = report.type_environment.unwrap();
        assert!(env.lookup("pipeline").is_some());
    }

    #[test]
    fn test_ill_typed_workflow_fails_with_report() {
        let report = WorkflowValidator::new().validate_text(ILL_TYPED, "broken.ct");
        assert!(!report.success);
        assert!(report.has_errors());
        let summary = report.summary();
        assert!(summary.contains("Validation FAILED"));
        assert!(summary.contains("Expected: Html"));
        assert!(report.type_environment.is_none());
    }

    #[test]
    fn test_parse_error_reported() {
        let report = WorkflowValidator::new().validate_text("f ∘ (", "bad.ct");
        assert!(!report.success);
        assert!(report.errors[0].contains("Parse error"));
    }

    #[test]
    fn test_unannotated_tasks_warn_but_pass() {
        let report = WorkflowValidator::new().validate_text("deploy", "untyped.ct");
        // A lone unannotated literal produces a warning, not an error.
        assert!(report.success);
        assert!(report.has_warnings());
    }

    #[tokio::test]
    async fn test_validate_missing_file() {
        let report = WorkflowValidator::new()
            .validate_file("/nonexistent/workflow.ct")
            .await;
        assert!(!report.success);
        assert!(report.errors[0].contains("reading workflow file"));
    }

    #[tokio::test]
    async fn test_validate_file_roundtrip() {
        let path = std::env::temp_dir().join(format!("maestro-{}.ct", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, WELL_TYPED).await.unwrap();
        let report = WorkflowValidator::new().validate_file(&path).await;
        assert!(report.success);
    }
}
