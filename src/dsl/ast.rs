//! Workflow AST.
//!
//! Nodes are immutable; equality and hashing are structural, so parsed
//! expressions can be deduplicated and compared directly in tests.

use std::fmt::{self, Display, Formatter};

use super::types::Type;

/// A parsed workflow expression or statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ast {
    /// A task or function name. Unknown identifiers parse as literals; the
    /// type checker, not the parser, rejects them.
    Literal(String),
    /// Sequential composition `left ∘ right`: run `right`, then `left`.
    Composition { left: Box<Ast>, right: Box<Ast> },
    /// Parallel composition `left × right`.
    Product { left: Box<Ast>, right: Box<Ast> },
    /// Diagonal `Δ`: duplicates its input into a pair.
    Duplicate,
    /// Named workflow definition `functor name = expression`.
    Functor { name: String, expression: Box<Ast> },
    /// Type annotation `name :: signature`.
    TypeAnnotation { name: String, signature: Type },
}

impl Ast {
    pub fn literal(name: impl Into<String>) -> Self {
        Ast::Literal(name.into())
    }

    pub fn composition(left: Ast, right: Ast) -> Self {
        Ast::Composition {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn product(left: Ast, right: Ast) -> Self {
        Ast::Product {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn functor(name: impl Into<String>, expression: Ast) -> Self {
        Ast::Functor {
            name: name.into(),
            expression: Box::new(expression),
        }
    }

    pub fn annotation(name: impl Into<String>, signature: Type) -> Self {
        Ast::TypeAnnotation {
            name: name.into(),
            signature,
        }
    }
}

impl Display for Ast {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Ast::Literal(name) => f.write_str(name),
            Ast::Composition { left, right } => write!(f, "({left} ∘ {right})"),
            Ast::Product { left, right } => write!(f, "({left} × {right})"),
            Ast::Duplicate => f.write_str("duplicate"),
            Ast::Functor { name, expression } => write!(f, "functor {name} = {expression}"),
            Ast::TypeAnnotation { name, signature } => write!(f, "{name} :: {signature}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_equality() {
        let a = Ast::composition(Ast::literal("deploy"), Ast::literal("build"));
        let b = Ast::composition(Ast::literal("deploy"), Ast::literal("build"));
        let c = Ast::composition(Ast::literal("build"), Ast::literal("deploy"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_hashing_matches_equality() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(Ast::product(Ast::literal("f"), Ast::literal("g")));
        assert!(set.contains(&Ast::product(Ast::literal("f"), Ast::literal("g"))));
    }

    #[test]
    fn test_display() {
        let ast = Ast::composition(
            Ast::product(Ast::literal("f"), Ast::literal("g")),
            Ast::Duplicate,
        );
        assert_eq!(ast.to_string(), "((f × g) ∘ duplicate)");
    }
}
