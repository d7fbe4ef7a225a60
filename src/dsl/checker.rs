//! Type checking for workflow composition.
//!
//! `check_composition` and `check_product` implement the two composition
//! rules; [`TypeInference`] walks an AST, accumulating errors instead of
//! failing fast so a whole workflow can be reported on in one pass.

use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};

use thiserror::Error;

use super::ast::Ast;
use super::types::Type;

/// A failed unification at a composition boundary.
#[derive(Debug, Clone, Error)]
#[error("Type mismatch{}: expected {expected}, got {got}", context_suffix(.context))]
pub struct TypeMismatch {
    pub expected: Type,
    pub got: Type,
    pub context: String,
}

fn context_suffix(context: &str) -> String {
    if context.is_empty() {
        String::new()
    } else {
        format!(" in {context}")
    }
}

/// Name → type bindings built from annotations and functor definitions.
#[derive(Debug, Clone, Default)]
pub struct TypeEnvironment {
    bindings: HashMap<String, Type>,
}

impl TypeEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, name: impl Into<String>, signature: Type) {
        self.bindings.insert(name.into(), signature);
    }

    pub fn lookup(&self, name: &str) -> Option<&Type> {
        self.bindings.get(name)
    }

    pub fn bindings(&self) -> impl Iterator<Item = (&String, &Type)> {
        self.bindings.iter()
    }
}

impl Display for TypeEnvironment {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<String> = self
            .bindings
            .iter()
            .map(|(name, ty)| format!("{name} :: {ty}"))
            .collect();
        entries.sort();
        write!(f, "TypeEnv({})", entries.join(", "))
    }
}

/// Type check sequential composition `g ∘ f`.
///
/// `f: A → B` and `g: B' → C` compose iff `B` unifies with `B'`; the result
/// is the substituted `A → C`.
pub fn check_composition(g: &Type, f: &Type) -> Result<Type, TypeMismatch> {
    let (Type::Function {
        input: f_input,
        output: f_output,
    }, Type::Function {
        input: g_input,
        output: g_output,
    }) = (f, g)
    else {
        return Err(TypeMismatch {
            expected: g.clone(),
            got: f.clone(),
            context: "composition of non-function types".to_owned(),
        });
    };

    let subst = f_output.unify(g_input).ok_or_else(|| TypeMismatch {
        expected: (**g_input).clone(),
        got: (**f_output).clone(),
        context: format!("composition {g} ∘ {f}"),
    })?;

    Ok(Type::function((**f_input).clone(), (**g_output).clone()).apply(&subst))
}

/// Type check parallel composition `f × g`.
///
/// `f: A → B` and `g: C → D` always combine into `(A × C) → (B × D)`.
pub fn check_product(f: &Type, g: &Type) -> Result<Type, TypeMismatch> {
    let (Type::Function {
        input: f_input,
        output: f_output,
    }, Type::Function {
        input: g_input,
        output: g_output,
    }) = (f, g)
    else {
        return Err(TypeMismatch {
            expected: f.clone(),
            got: g.clone(),
            context: "product of non-function types".to_owned(),
        });
    };

    Ok(Type::function(
        Type::product((**f_input).clone(), (**g_input).clone()),
        Type::product((**f_output).clone(), (**g_output).clone()),
    ))
}

/// Errors and warnings gathered during one checking pass.
#[derive(Debug, Clone, Default)]
pub struct ErrorAccumulator {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ErrorAccumulator {
    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        if self.errors.is_empty() && self.warnings.is_empty() {
            return "No type issues detected".to_owned();
        }
        if !self.errors.is_empty() {
            lines.push(format!("Errors: {}", self.errors.len()));
            for (i, error) in self.errors.iter().enumerate() {
                lines.push(format!("  {}. {error}", i + 1));
            }
        }
        if !self.warnings.is_empty() {
            lines.push(format!("Warnings: {}", self.warnings.len()));
            for (i, warning) in self.warnings.iter().enumerate() {
                lines.push(format!("  {}. {warning}", i + 1));
            }
        }
        lines.join("\n")
    }
}

/// Single-pass inference walker over workflow ASTs.
///
/// Returns the inferred type per node where one exists; problems are
/// accumulated, never thrown, so every statement gets checked.
#[derive(Debug, Default)]
pub struct TypeInference {
    pub type_env: TypeEnvironment,
    pub diagnostics: ErrorAccumulator,
}

impl TypeInference {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_env(type_env: TypeEnvironment) -> Self {
        Self {
            type_env,
            diagnostics: ErrorAccumulator::default(),
        }
    }

    pub fn infer_program(&mut self, statements: &[Ast]) -> Option<Type> {
        let mut last = None;
        for statement in statements {
            last = self.infer(statement);
        }
        last
    }

    pub fn infer(&mut self, node: &Ast) -> Option<Type> {
        match node {
            Ast::Literal(name) => {
                let signature = self.type_env.lookup(name).cloned();
                if signature.is_none() {
                    self.diagnostics
                        .add_warning(format!("No type annotation for '{name}'"));
                }
                signature
            }
            Ast::Composition { left, right } => {
                let left_type = self.infer(left);
                let right_type = self.infer(right);
                let (Some(left_type), Some(right_type)) = (left_type, right_type) else {
                    self.diagnostics
                        .add_error(format!("Cannot infer types for composition: {node}"));
                    return None;
                };
                if !matches!(left_type, Type::Function { .. }) {
                    self.diagnostics.add_error(format!(
                        "Left side of composition must be a function, got {left_type}"
                    ));
                    return None;
                }
                if !matches!(right_type, Type::Function { .. }) {
                    self.diagnostics.add_error(format!(
                        "Right side of composition must be a function, got {right_type}"
                    ));
                    return None;
                }
                match check_composition(&left_type, &right_type) {
                    Ok(result) => Some(result),
                    Err(mismatch) => {
                        self.diagnostics.add_error(format_type_error(
                            &mismatch,
                            Some(&format!("composition at {node}")),
                        ));
                        None
                    }
                }
            }
            Ast::Product { left, right } => {
                let left_type = self.infer(left);
                let right_type = self.infer(right);
                let (Some(left_type), Some(right_type)) = (left_type, right_type) else {
                    self.diagnostics
                        .add_error(format!("Cannot infer types for product: {node}"));
                    return None;
                };
                if !matches!(left_type, Type::Function { .. }) {
                    self.diagnostics.add_error(format!(
                        "Left side of product must be a function, got {left_type}"
                    ));
                    return None;
                }
                if !matches!(right_type, Type::Function { .. }) {
                    self.diagnostics.add_error(format!(
                        "Right side of product must be a function, got {right_type}"
                    ));
                    return None;
                }
                match check_product(&left_type, &right_type) {
                    Ok(result) => Some(result),
                    Err(mismatch) => {
                        self.diagnostics
                            .add_error(format_type_error(&mismatch, None));
                        None
                    }
                }
            }
            // Δ is polymorphic: a → (a × a).
            Ast::Duplicate => Some(Type::function(
                Type::var("a"),
                Type::product(Type::var("a"), Type::var("a")),
            )),
            Ast::Functor { name, expression } => {
                let expression_type = self.infer(expression);
                if let Some(expression_type) = &expression_type {
                    self.type_env.bind(name.clone(), expression_type.clone());
                }
                expression_type
            }
            Ast::TypeAnnotation { name, signature } => {
                self.type_env.bind(name.clone(), signature.clone());
                Some(signature.clone())
            }
        }
    }
}

/// Render a type mismatch with context and up to three actionable hints.
pub fn format_type_error(error: &TypeMismatch, source_location: Option<&str>) -> String {
    let mut lines = vec!["Type Error".to_owned()];

    if let Some(location) = source_location {
        lines.push(format!("  at {location}"));
    }
    if !error.context.is_empty() {
        lines.push(format!("  in {}", error.context));
    }
    lines.push(String::new());
    lines.push(format!("  Expected: {}", error.expected));
    lines.push(format!("  Got:      {}", error.got));

    let hints = generate_hints(error);
    if !hints.is_empty() {
        lines.push(String::new());
        lines.push("  Hints:".to_owned());
        for hint in hints {
            lines.push(format!("    • {hint}"));
        }
    }

    lines.join("\n")
}

fn generate_hints(error: &TypeMismatch) -> Vec<String> {
    let mut hints = Vec::new();
    let context = error.context.to_lowercase();

    if context.contains("composition") {
        hints.push(
            "In composition g ∘ f, the output type of f must match the input type of g"
                .to_owned(),
        );
        hints.push("Check the order: g ∘ f means 'f first, then g'".to_owned());
    }
    if context.contains("product") {
        hints.push(
            "In parallel composition f × g, each function runs on its own side of the pair"
                .to_owned(),
        );
    }
    if hints.len() < 3 && error.expected != error.got {
        hints.push(format!(
            "Try converting {} to {}, or update the type annotations",
            error.got, error.expected
        ));
    }
    hints.truncate(3);
    hints
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int() -> Type {
        Type::mono("Int")
    }

    fn string() -> Type {
        Type::mono("String")
    }

    fn bool_ty() -> Type {
        Type::mono("Bool")
    }

    #[test]
    fn test_composition_of_compatible_functions() {
        let f = Type::function(int(), string());
        let g = Type::function(string(), bool_ty());
        let composed = check_composition(&g, &f).unwrap();
        assert_eq!(composed, Type::function(int(), bool_ty()));
    }

    #[test]
    fn test_composition_mismatch_carries_context() {
        let f = Type::function(int(), string());
        let g = Type::function(bool_ty(), int());
        let err = check_composition(&g, &f).unwrap_err();
        assert_eq!(err.expected, bool_ty());
        assert_eq!(err.got, string());
        assert!(err.context.contains('∘'));
    }

    #[test]
    fn test_product_rule() {
        let f = Type::function(int(), string());
        let g = Type::function(bool_ty(), int());
        let product = check_product(&f, &g).unwrap();
        assert_eq!(
            product,
            Type::function(
                Type::product(int(), bool_ty()),
                Type::product(string(), int())
            )
        );
    }

    #[test]
    fn test_composition_associativity() {
        let f = Type::function(int(), string());
        let g = Type::function(string(), bool_ty());
        let h = Type::function(bool_ty(), int());

        let left_grouped =
            check_composition(&h, &check_composition(&g, &f).unwrap()).unwrap();
        let right_grouped =
            check_composition(&check_composition(&h, &g).unwrap(), &f).unwrap();
        assert_eq!(left_grouped, right_grouped);
    }

    #[test]
    fn test_identity_laws() {
        let f = Type::function(int(), string());
        let id_in = Type::function(int(), int());
        let id_out = Type::function(string(), string());

        assert_eq!(check_composition(&id_out, &f).unwrap(), f);
        assert_eq!(check_composition(&f, &id_in).unwrap(), f);
    }

    #[test]
    fn test_inference_flags_missing_annotation() {
        let mut inference = TypeInference::new();
        let result = inference.infer(&Ast::literal("mystery"));
        assert!(result.is_none());
        assert!(inference.diagnostics.has_warnings());
        assert!(inference.diagnostics.warnings[0].contains("mystery"));
    }

    #[test]
    fn test_inference_checks_composition_chain() {
        let mut inference = TypeInference::new();
        let program = [
            Ast::annotation("build", Type::function(Type::unit(), Type::mono("Artifact"))),
            Ast::annotation("test", Type::function(Type::mono("Artifact"), Type::mono("Report"))),
            Ast::composition(Ast::literal("test"), Ast::literal("build")),
        ];
        let final_type = inference.infer_program(&program).unwrap();
        assert_eq!(
            final_type,
            Type::function(Type::unit(), Type::mono("Report"))
        );
        assert!(!inference.diagnostics.has_errors());
    }

    #[test]
    fn test_inference_accumulates_mismatch_errors() {
        let mut inference = TypeInference::new();
        let program = [
            Ast::annotation("build", Type::function(Type::unit(), Type::mono("Artifact"))),
            Ast::annotation("lint", Type::function(Type::mono("Source"), Type::mono("Report"))),
            Ast::composition(Ast::literal("lint"), Ast::literal("build")),
        ];
        inference.infer_program(&program);
        assert!(inference.diagnostics.has_errors());
        let rendered = inference.diagnostics.summary();
        assert!(rendered.contains("Expected: Source"));
        assert!(rendered.contains("Got:      Artifact"));
    }

    #[test]
    fn test_broadcast_composition_types() {
        // (f × g) ∘ duplicate : A → (B × D)
        let mut inference = TypeInference::new();
        let program = [
            Ast::annotation(
                "analyse_style",
                Type::function(Type::mono("FileList"), Type::mono("StyleReport")),
            ),
            Ast::annotation(
                "analyse_security",
                Type::function(Type::mono("FileList"), Type::mono("SecurityReport")),
            ),
            Ast::composition(
                Ast::product(Ast::literal("analyse_style"), Ast::literal("analyse_security")),
                Ast::Duplicate,
            ),
        ];
        let final_type = inference.infer_program(&program).unwrap();
        assert_eq!(
            final_type,
            Type::function(
                Type::mono("FileList"),
                Type::product(Type::mono("StyleReport"), Type::mono("SecurityReport"))
            )
        );
        assert!(!inference.diagnostics.has_errors());
    }

    #[test]
    fn test_functor_definition_binds_inferred_type() {
        let mut inference = TypeInference::new();
        let program = [
            Ast::annotation("build", Type::function(Type::unit(), Type::mono("Artifact"))),
            Ast::functor("pipeline", Ast::literal("build")),
        ];
        inference.infer_program(&program);
        assert_eq!(
            inference.type_env.lookup("pipeline"),
            Some(&Type::function(Type::unit(), Type::mono("Artifact")))
        );
    }

    #[test]
    fn test_error_formatting_includes_hints() {
        let mismatch = TypeMismatch {
            expected: string(),
            got: int(),
            context: "composition g ∘ f".to_owned(),
        };
        let rendered = format_type_error(&mismatch, Some("line 3"));
        assert!(rendered.contains("at line 3"));
        assert!(rendered.contains("Expected: String"));
        assert!(rendered.contains("Hints:"));
        assert!(rendered.contains("'f first, then g'"));
    }
}
