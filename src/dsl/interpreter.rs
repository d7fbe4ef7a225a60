//! Workflow interpreter.
//!
//! An async visitor over [`Ast`] that delegates literal names to an injected
//! [`TaskExecutor`]. Sequential composition runs right before left; products
//! run both sides concurrently; `duplicate` turns one value into a pair.
//! When a type environment is available, results are wrapped as typed data
//! and composition boundaries are validated at runtime.

use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;

use crate::coordinator::AgentCoordinator;

use super::WorkflowError;
use super::ast::Ast;
use super::checker::TypeEnvironment;
use super::types::Type;
use crate::agent::Agent;
use crate::coordinator::TaskCoordinator;
use crate::task::Task;

/// A runtime value flowing between workflow steps.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Pair(Box<Value>, Box<Value>),
    Typed(Box<TypedValue>),
}

/// A value tagged with its type and the step that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedValue {
    pub value: Value,
    pub type_info: Type,
    pub source: Option<String>,
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn pair(left: Value, right: Value) -> Self {
        Value::Pair(Box::new(left), Box::new(right))
    }

    /// Strip a typed wrapper, if any.
    pub fn unwrap_typed(self) -> Value {
        match self {
            Value::Typed(typed) => typed.value,
            other => other,
        }
    }

    /// The type attached to this value, if it carries one.
    pub fn type_info(&self) -> Option<&Type> {
        match self {
            Value::Typed(typed) => Some(&typed.type_info),
            _ => None,
        }
    }

    /// Wrap in typed data when a type is known; pass through otherwise.
    pub fn wrap_if_needed(self, type_info: Option<Type>, source: Option<String>) -> Value {
        match (self, type_info) {
            (value @ Value::Typed(_), _) => value,
            (value, Some(type_info)) => Value::Typed(Box::new(TypedValue {
                value,
                type_info,
                source,
            })),
            (value, None) => value,
        }
    }
}

/// Executes one named workflow step.
pub trait TaskExecutor: Send + Sync {
    fn execute_task<'a>(
        &'a self,
        name: &'a str,
        input: Value,
    ) -> BoxFuture<'a, Result<Value, WorkflowError>>;
}

/// Async AST walker with runtime type validation.
///
/// In strict mode a boundary mismatch aborts execution; otherwise it is
/// recorded as a warning and execution continues.
pub struct Interpreter {
    executor: Arc<dyn TaskExecutor>,
    type_env: TypeEnvironment,
    strict: bool,
    warnings: Mutex<Vec<String>>,
}

impl Interpreter {
    pub fn new(executor: Arc<dyn TaskExecutor>) -> Self {
        Self {
            executor,
            type_env: TypeEnvironment::new(),
            strict: false,
            warnings: Mutex::new(Vec::new()),
        }
    }

    pub fn with_type_env(mut self, type_env: TypeEnvironment) -> Self {
        self.type_env = type_env;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Warnings accumulated so far, draining the buffer.
    pub fn take_warnings(&self) -> Vec<String> {
        std::mem::take(&mut self.warnings.lock().expect("warnings lock poisoned"))
    }

    fn warn(&self, message: String) {
        tracing::warn!("{message}");
        self.warnings
            .lock()
            .expect("warnings lock poisoned")
            .push(message);
    }

    pub fn execute<'a>(
        &'a self,
        node: &'a Ast,
        input: Value,
    ) -> BoxFuture<'a, Result<Value, WorkflowError>> {
        Box::pin(async move {
            match node {
                Ast::Literal(name) => self.execute_literal(name, input).await,
                Ast::Composition { left, right } => {
                    let right_result = self.execute(right, input).await?;
                    self.validate_boundary(left, &right_result)?;
                    self.execute(left, right_result).await
                }
                Ast::Product { left, right } => self.execute_product(left, right, input).await,
                Ast::Duplicate => Ok(Value::pair(input.clone(), input)),
                Ast::Functor { name, expression } => {
                    let result = self.execute(expression, input).await?;
                    let functor_output = match self.type_env.lookup(name) {
                        Some(Type::Function { output, .. }) => Some((**output).clone()),
                        _ => None,
                    };
                    Ok(result
                        .unwrap_typed()
                        .wrap_if_needed(functor_output, Some(name.clone())))
                }
                // Annotations only affect the type environment.
                Ast::TypeAnnotation { .. } => Ok(Value::Null),
            }
        })
    }

    async fn execute_literal(&self, name: &str, input: Value) -> Result<Value, WorkflowError> {
        let result = self
            .executor
            .execute_task(name, input.unwrap_typed())
            .await?;

        match self.type_env.lookup(name) {
            Some(Type::Function { output, .. }) => {
                Ok(result.wrap_if_needed(Some((**output).clone()), Some(name.to_owned())))
            }
            Some(other) => {
                let other = other.clone();
                Ok(result.wrap_if_needed(Some(other), Some(name.to_owned())))
            }
            None => {
                self.warn(format!(
                    "No type annotation for task '{name}', skipping runtime validation"
                ));
                Ok(result)
            }
        }
    }

    async fn execute_product(
        &self,
        left: &Ast,
        right: &Ast,
        input: Value,
    ) -> Result<Value, WorkflowError> {
        let (left_input, right_input) = match input.unwrap_typed() {
            Value::Pair(a, b) => (*a, *b),
            other => {
                // Pairless input broadcasts to both sides. Kept for
                // workflows that predate `duplicate`.
                if self.strict {
                    self.warn(
                        "product received a non-pair input; broadcasting it to both sides \
                         (precede the product with 'duplicate' to make this explicit)"
                            .to_owned(),
                    );
                }
                (other.clone(), other)
            }
        };

        let (left_result, right_result) = futures::future::try_join(
            self.execute(left, left_input),
            self.execute(right, right_input),
        )
        .await?;

        Ok(Value::pair(left_result, right_result))
    }

    /// Validate a composition boundary when both sides carry type info.
    fn validate_boundary(&self, left: &Ast, right_result: &Value) -> Result<(), WorkflowError> {
        let Some(produced) = right_result.type_info() else {
            return Ok(());
        };
        let Some(Type::Function { input: expected, .. }) = self.node_type(left) else {
            return Ok(());
        };

        if produced.unify(&expected).is_none() {
            let source = match right_result {
                Value::Typed(typed) => typed.source.clone().unwrap_or_else(|| "?".to_owned()),
                _ => "?".to_owned(),
            };
            let message = format!(
                "composition boundary mismatch: '{source}' produces {produced}, \
                 but '{left}' expects {expected}"
            );
            if self.strict {
                return Err(WorkflowError::RuntimeType(message));
            }
            self.warn(message);
        }
        Ok(())
    }

    fn node_type(&self, node: &Ast) -> Option<Type> {
        match node {
            Ast::Literal(name) => self.type_env.lookup(name).cloned(),
            Ast::Functor { name, .. } => self.type_env.lookup(name).cloned(),
            _ => None,
        }
    }
}

/// Bridges workflow literals onto the task coordinator.
///
/// Each step name becomes a one-task coordination run against the
/// configured agents; the previous step's value is appended to the task
/// description so downstream agents see their input.
pub struct CoordinatorTaskExecutor {
    coordinator: Arc<TaskCoordinator>,
    agents: Vec<Agent>,
}

impl CoordinatorTaskExecutor {
    pub fn new(coordinator: Arc<TaskCoordinator>, agents: Vec<Agent>) -> Self {
        Self {
            coordinator,
            agents,
        }
    }

    fn describe(name: &str, input: &Value) -> String {
        let step = name.replace('_', " ");
        match render(input) {
            Some(rendered) => {
                format!("{step}\n\nInput from the previous workflow step:\n{rendered}")
            }
            None => step,
        }
    }
}

fn render(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Text(text) => Some(text.clone()),
        Value::Pair(a, b) => {
            let a = render(a).unwrap_or_default();
            let b = render(b).unwrap_or_default();
            Some(format!("({a}, {b})"))
        }
        Value::Typed(typed) => render(&typed.value),
    }
}

impl TaskExecutor for CoordinatorTaskExecutor {
    fn execute_task<'a>(
        &'a self,
        name: &'a str,
        input: Value,
    ) -> BoxFuture<'a, Result<Value, WorkflowError>> {
        Box::pin(async move {
            let task = Task::new(Self::describe(name, &input)).with_id(name.to_owned());
            let results = self
                .coordinator
                .coordinate(std::slice::from_ref(&task), &self.agents, None)
                .await;

            let result = results.into_iter().next().ok_or_else(|| {
                WorkflowError::TaskFailed {
                    name: name.to_owned(),
                    message: "coordination returned no result".to_owned(),
                }
            })?;

            if !result.is_success() {
                return Err(WorkflowError::TaskFailed {
                    name: name.to_owned(),
                    message: result
                        .errors
                        .first()
                        .cloned()
                        .unwrap_or_else(|| "unknown failure".to_owned()),
                });
            }

            let output = match result.output {
                Some(serde_json::Value::String(text)) => Value::Text(text),
                Some(other) => Value::Text(other.to_string()),
                None => Value::Null,
            };
            Ok(output)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::parser::parse_expression;
    use futures::future;
    use mockall::{mock, predicate};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    mock! {
        pub StepExecutor {}

        impl TaskExecutor for StepExecutor {
            fn execute_task(
                &self,
                name: &str,
                input: Value,
            ) -> BoxFuture<'static, Result<Value, WorkflowError>>;
        }
    }

    /// Executor that records the order of executed steps.
    struct TracingExecutor {
        trace: StdMutex<Vec<String>>,
        delay: Option<Duration>,
    }

    impl TracingExecutor {
        fn new() -> Self {
            Self {
                trace: StdMutex::new(Vec::new()),
                delay: None,
            }
        }

        fn slow(delay: Duration) -> Self {
            Self {
                trace: StdMutex::new(Vec::new()),
                delay: Some(delay),
            }
        }

        fn trace(&self) -> Vec<String> {
            self.trace.lock().unwrap().clone()
        }
    }

    impl TaskExecutor for TracingExecutor {
        fn execute_task<'a>(
            &'a self,
            name: &'a str,
            input: Value,
        ) -> BoxFuture<'a, Result<Value, WorkflowError>> {
            Box::pin(async move {
                if let Some(delay) = self.delay {
                    tokio::time::sleep(delay).await;
                }
                self.trace.lock().unwrap().push(name.to_owned());
                let rendered = match input {
                    Value::Null => format!("{name}()"),
                    other => format!("{name}({})", render(&other).unwrap_or_default()),
                };
                Ok(Value::Text(rendered))
            })
        }
    }

    fn interpreter(executor: Arc<TracingExecutor>) -> Interpreter {
        Interpreter::new(executor)
    }

    #[tokio::test]
    async fn test_sequential_composition_runs_right_to_left() {
        let executor = Arc::new(TracingExecutor::new());
        let interp = interpreter(Arc::clone(&executor));
        let ast = parse_expression("deploy ∘ test ∘ build").unwrap();

        let result = interp.execute(&ast, Value::Null).await.unwrap();

        assert_eq!(executor.trace(), vec!["build", "test", "deploy"]);
        assert_eq!(result, Value::text("deploy(test(build()))"));
    }

    #[tokio::test]
    async fn test_product_executes_both_sides() {
        let executor = Arc::new(TracingExecutor::new());
        let interp = interpreter(Arc::clone(&executor));
        let ast = parse_expression("frontend × backend").unwrap();

        let result = interp.execute(&ast, Value::Null).await.unwrap();

        let mut trace = executor.trace();
        trace.sort();
        assert_eq!(trace, vec!["backend", "frontend"]);
        assert_eq!(
            result,
            Value::pair(Value::text("frontend()"), Value::text("backend()"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_product_sides_run_concurrently() {
        let executor = Arc::new(TracingExecutor::slow(Duration::from_secs(1)));
        let interp = interpreter(Arc::clone(&executor));
        let ast = parse_expression("frontend × backend").unwrap();

        let started = tokio::time::Instant::now();
        interp.execute(&ast, Value::Null).await.unwrap();
        let elapsed = started.elapsed();

        // Wall time is max of the two sides, not their sum.
        assert!(elapsed >= Duration::from_secs(1));
        assert!(elapsed < Duration::from_millis(1900));
    }

    #[tokio::test]
    async fn test_duplicate_pairs_its_input() {
        let executor = Arc::new(TracingExecutor::new());
        let interp = interpreter(executor);
        let result = interp
            .execute(&Ast::Duplicate, Value::text("x"))
            .await
            .unwrap();
        assert_eq!(result, Value::pair(Value::text("x"), Value::text("x")));
    }

    #[tokio::test]
    async fn test_product_unpacks_pair_input() {
        let executor = Arc::new(TracingExecutor::new());
        let interp = interpreter(Arc::clone(&executor));
        let ast = parse_expression("f × g").unwrap();

        let input = Value::pair(Value::text("a"), Value::text("b"));
        let result = interp.execute(&ast, input).await.unwrap();

        assert_eq!(
            result,
            Value::pair(Value::text("f(a)"), Value::text("g(b)"))
        );
    }

    #[tokio::test]
    async fn test_broadcast_runs_source_once() {
        let executor = Arc::new(TracingExecutor::new());
        let interp = interpreter(Arc::clone(&executor));
        let ast = parse_expression(
            "(analyse_style × analyse_security) ∘ duplicate ∘ get_files",
        )
        .unwrap();

        let result = interp.execute(&ast, Value::Null).await.unwrap();

        let trace = executor.trace();
        assert_eq!(
            trace.iter().filter(|s| s.as_str() == "get_files").count(),
            1
        );
        assert_eq!(
            result,
            Value::pair(
                Value::text("analyse_style(get_files())"),
                Value::text("analyse_security(get_files())"),
            )
        );
    }

    #[tokio::test]
    async fn test_task_failure_aborts_composition() {
        let mut executor = MockStepExecutor::new();
        executor
            .expect_execute_task()
            .with(predicate::eq("build"), predicate::always())
            .returning(|_, _| {
                Box::pin(future::ready(Err(WorkflowError::TaskFailed {
                    name: "build".to_owned(),
                    message: "compiler crashed".to_owned(),
                })))
            });
        // No expectation for "deploy": reaching it would fail the test.

        let interp = Interpreter::new(Arc::new(executor));
        let ast = parse_expression("deploy ∘ build").unwrap();
        let err = interp.execute(&ast, Value::Null).await.unwrap_err();
        assert!(matches!(err, WorkflowError::TaskFailed { ref name, .. } if name == "build"));
    }

    #[tokio::test]
    async fn test_typed_results_validate_boundaries() {
        let mut env = TypeEnvironment::new();
        env.bind(
            "build",
            Type::function(Type::unit(), Type::mono("Artifact")),
        );
        env.bind(
            "lint",
            Type::function(Type::mono("Source"), Type::mono("Report")),
        );

        let executor = Arc::new(TracingExecutor::new());
        let interp = Interpreter::new(executor).with_type_env(env).with_strict(true);
        let ast = parse_expression("lint ∘ build").unwrap();

        let err = interp.execute(&ast, Value::Null).await.unwrap_err();
        assert!(matches!(err, WorkflowError::RuntimeType(_)));
    }

    #[tokio::test]
    async fn test_boundary_mismatch_is_warning_when_lenient() {
        let mut env = TypeEnvironment::new();
        env.bind(
            "build",
            Type::function(Type::unit(), Type::mono("Artifact")),
        );
        env.bind(
            "lint",
            Type::function(Type::mono("Source"), Type::mono("Report")),
        );

        let executor = Arc::new(TracingExecutor::new());
        let interp = Interpreter::new(executor).with_type_env(env);
        let ast = parse_expression("lint ∘ build").unwrap();

        interp.execute(&ast, Value::Null).await.unwrap();
        let warnings = interp.take_warnings();
        assert!(warnings.iter().any(|w| w.contains("boundary mismatch")));
    }

    #[tokio::test]
    async fn test_untyped_task_produces_warning() {
        let executor = Arc::new(TracingExecutor::new());
        let interp = interpreter(executor);
        interp
            .execute(&Ast::literal("mystery"), Value::Null)
            .await
            .unwrap();
        let warnings = interp.take_warnings();
        assert!(warnings[0].contains("No type annotation"));
    }

    #[tokio::test]
    async fn test_strict_mode_flags_bare_broadcast() {
        let executor = Arc::new(TracingExecutor::new());
        let interp = Interpreter::new(executor).with_strict(true);
        let ast = parse_expression("f × g").unwrap();

        interp.execute(&ast, Value::text("shared")).await.unwrap();
        let warnings = interp.take_warnings();
        assert!(warnings.iter().any(|w| w.contains("broadcasting")));
    }
}
