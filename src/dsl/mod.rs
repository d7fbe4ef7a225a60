//! Workflow DSL: categorical composition over named tasks.
//!
//! Workflows are written as compositions (`∘`, ASCII `o`), products (`×`,
//! ASCII `*`), and broadcasts (`**`), with `::` type annotations and
//! `functor` definitions. A program is parsed ([`parser`]), type checked
//! with Hindley–Milner unification ([`types`], [`checker`]), validated as a
//! whole ([`validator`]), and executed by an async [`interpreter`] that
//! delegates task names to the orchestration runtime.

pub mod ast;
pub mod checker;
pub mod interpreter;
pub mod parser;
pub mod types;
pub mod validator;

use std::sync::Arc;

use thiserror::Error;

use ast::Ast;
use interpreter::{Interpreter, TaskExecutor, Value};
use validator::WorkflowValidator;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Parse(#[from] parser::ParseError),
    #[error("workflow validation failed:\n{0}")]
    Validation(String),
    #[error("runtime type error: {0}")]
    RuntimeType(String),
    #[error("task '{name}' failed: {message}")]
    TaskFailed { name: String, message: String },
}

/// Result of running a workflow program.
#[derive(Debug)]
pub struct WorkflowRun {
    pub output: Value,
    pub warnings: Vec<String>,
}

/// Validate and execute a workflow program.
///
/// Statements run in order; annotations only populate the type
/// environment. The run refuses to start when validation reports errors.
pub async fn run_workflow(
    source: &str,
    executor: Arc<dyn TaskExecutor>,
    strict: bool,
) -> Result<WorkflowRun, WorkflowError> {
    let validator = WorkflowValidator::new();
    let (statements, report) = validator.parse_and_validate(source, "<workflow>");
    let Some(statements) = statements else {
        return Err(WorkflowError::Validation(report.summary()));
    };

    let interpreter = Interpreter::new(executor)
        .with_type_env(report.type_environment.unwrap_or_default())
        .with_strict(strict);

    let mut output = Value::Null;
    for statement in &statements {
        if matches!(statement, Ast::TypeAnnotation { .. }) {
            continue;
        }
        output = interpreter.execute(statement, Value::Null).await?;
    }

    Ok(WorkflowRun {
        output,
        warnings: interpreter.take_warnings(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use std::sync::Mutex;

    struct EchoExecutor(Mutex<Vec<String>>);

    impl TaskExecutor for EchoExecutor {
        fn execute_task<'a>(
            &'a self,
            name: &'a str,
            _input: Value,
        ) -> BoxFuture<'a, Result<Value, WorkflowError>> {
            Box::pin(async move {
                self.0.lock().unwrap().push(name.to_owned());
                Ok(Value::text(name))
            })
        }
    }

    #[tokio::test]
    async fn test_run_workflow_end_to_end() {
        let source = "\
build :: () -> Artifact
test :: Artifact -> Report
test ∘ build
";
        let executor = Arc::new(EchoExecutor(Mutex::new(Vec::new())));
        let run = run_workflow(source, Arc::clone(&executor) as Arc<dyn TaskExecutor>, false)
            .await
            .unwrap();

        assert_eq!(*executor.0.lock().unwrap(), vec!["build", "test"]);
        assert_eq!(run.output.clone().unwrap_typed(), Value::text("test"));
    }

    #[tokio::test]
    async fn test_run_refuses_ill_typed_workflow() {
        let source = "\
build :: () -> Artifact
lint :: Source -> Report
lint ∘ build
";
        let executor = Arc::new(EchoExecutor(Mutex::new(Vec::new())));
        let err = run_workflow(source, executor, false).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }
}
