//! Type algebra for workflow composition.
//!
//! Types form a small algebra (variables, monomorphic types, functions,
//! products) with Robinson unification. Composition of morphisms type-checks
//! iff the codomain of the first unifies with the domain of the second.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display, Formatter};

/// A DSL type. Equality and hashing are structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// Polymorphic type variable, e.g. `a` in `a → (a × a)`.
    Variable(String),
    /// Concrete type, optionally parameterized, e.g. `Int` or `List[Commit]`.
    Mono { name: String, params: Vec<Type> },
    /// Function type `A → B`.
    Function { input: Box<Type>, output: Box<Type> },
    /// Product type `A × B`.
    Product { left: Box<Type>, right: Box<Type> },
}

impl Type {
    pub fn var(name: impl Into<String>) -> Self {
        Type::Variable(name.into())
    }

    pub fn mono(name: impl Into<String>) -> Self {
        Type::Mono {
            name: name.into(),
            params: Vec::new(),
        }
    }

    pub fn mono_with(name: impl Into<String>, params: Vec<Type>) -> Self {
        Type::Mono {
            name: name.into(),
            params,
        }
    }

    pub fn unit() -> Self {
        Type::mono("()")
    }

    pub fn function(input: Type, output: Type) -> Self {
        Type::Function {
            input: Box::new(input),
            output: Box::new(output),
        }
    }

    pub fn product(left: Type, right: Type) -> Self {
        Type::Product {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Free type variables appearing anywhere in this type.
    pub fn free_variables(&self) -> BTreeSet<String> {
        let mut vars = BTreeSet::new();
        self.collect_free_variables(&mut vars);
        vars
    }

    fn collect_free_variables(&self, vars: &mut BTreeSet<String>) {
        match self {
            Type::Variable(name) => {
                vars.insert(name.clone());
            }
            Type::Mono { params, .. } => {
                for param in params {
                    param.collect_free_variables(vars);
                }
            }
            Type::Function { input, output } => {
                input.collect_free_variables(vars);
                output.collect_free_variables(vars);
            }
            Type::Product { left, right } => {
                left.collect_free_variables(vars);
                right.collect_free_variables(vars);
            }
        }
    }

    /// Apply a substitution, replacing bound variables throughout.
    pub fn apply(&self, subst: &Substitution) -> Type {
        match self {
            Type::Variable(name) => subst
                .mappings
                .get(name)
                .cloned()
                .unwrap_or_else(|| self.clone()),
            Type::Mono { name, params } => {
                if params.is_empty() {
                    self.clone()
                } else {
                    Type::Mono {
                        name: name.clone(),
                        params: params.iter().map(|p| p.apply(subst)).collect(),
                    }
                }
            }
            Type::Function { input, output } => {
                Type::function(input.apply(subst), output.apply(subst))
            }
            Type::Product { left, right } => {
                Type::product(left.apply(subst), right.apply(subst))
            }
        }
    }

    /// Robinson unification: the most general substitution σ with
    /// σ(self) = σ(other), or `None` if the types cannot be unified.
    /// Binding a variable to a type containing it fails (occurs check).
    pub fn unify(&self, other: &Type) -> Option<Substitution> {
        match (self, other) {
            (Type::Variable(a), Type::Variable(b)) if a == b => Some(Substitution::empty()),
            (Type::Variable(a), t) => {
                if t.free_variables().contains(a) {
                    None
                } else {
                    Some(Substitution::singleton(a.clone(), t.clone()))
                }
            }
            (_, Type::Variable(_)) => other.unify(self),
            (
                Type::Mono { name: n, params: ps },
                Type::Mono { name: m, params: qs },
            ) => {
                if n != m || ps.len() != qs.len() {
                    return None;
                }
                let mut subst = Substitution::empty();
                for (p, q) in ps.iter().zip(qs) {
                    let next = p.apply(&subst).unify(&q.apply(&subst))?;
                    subst = next.compose(&subst);
                }
                Some(subst)
            }
            (
                Type::Function {
                    input: i1,
                    output: o1,
                },
                Type::Function {
                    input: i2,
                    output: o2,
                },
            ) => {
                let s1 = i1.unify(i2)?;
                let s2 = o1.apply(&s1).unify(&o2.apply(&s1))?;
                Some(s2.compose(&s1))
            }
            (
                Type::Product {
                    left: l1,
                    right: r1,
                },
                Type::Product {
                    left: l2,
                    right: r2,
                },
            ) => {
                let s1 = l1.unify(l2)?;
                let s2 = r1.apply(&s1).unify(&r2.apply(&s1))?;
                Some(s2.compose(&s1))
            }
            _ => None,
        }
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Type::Variable(name) => f.write_str(name),
            Type::Mono { name, params } => {
                if params.is_empty() {
                    f.write_str(name)
                } else {
                    let params = params
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", ");
                    write!(f, "{name}[{params}]")
                }
            }
            Type::Function { input, output } => {
                if matches!(**input, Type::Function { .. }) {
                    write!(f, "({input}) → {output}")
                } else {
                    write!(f, "{input} → {output}")
                }
            }
            Type::Product { left, right } => {
                let left = match **left {
                    Type::Function { .. } | Type::Product { .. } => format!("({left})"),
                    _ => left.to_string(),
                };
                let right = match **right {
                    Type::Function { .. } | Type::Product { .. } => format!("({right})"),
                    _ => right.to_string(),
                };
                write!(f, "{left} × {right}")
            }
        }
    }
}

/// Immutable mapping from type variables to types.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Substitution {
    pub mappings: BTreeMap<String, Type>,
}

impl Substitution {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn singleton(var: String, ty: Type) -> Self {
        Self {
            mappings: BTreeMap::from([(var, ty)]),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn apply(&self, ty: &Type) -> Type {
        ty.apply(self)
    }

    /// `self ∘ earlier`: apply `self` to `earlier`'s range, then union with
    /// `self`, which wins on overlapping variables.
    pub fn compose(&self, earlier: &Substitution) -> Substitution {
        let mut mappings: BTreeMap<String, Type> = earlier
            .mappings
            .iter()
            .map(|(var, ty)| (var.clone(), self.apply(ty)))
            .collect();
        for (var, ty) in &self.mappings {
            mappings.insert(var.clone(), ty.clone());
        }
        Substitution { mappings }
    }
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

    #[test]
    fn test_unify_same_variable_is_empty() {
        let subst = Type::var("a").unify(&Type::var("a")).unwrap();
        assert!(subst.is_empty());
    }

    #[test]
    fn test_unify_variable_binds() {
        let subst = Type::var("a").unify(&int()).unwrap();
        assert_eq!(subst.apply(&Type::var("a")), int());
    }

    #[test]
    fn test_occurs_check_fails() {
        let recursive = Type::function(Type::var("a"), Type::var("a"));
        assert!(Type::var("a").unify(&recursive).is_none());
    }

    #[test]
    fn test_unify_mismatched_monos_fails() {
        assert!(int().unify(&string()).is_none());
    }

    #[test]
    fn test_unify_parameterized_monos() {
        let list_a = Type::mono_with("List", vec![Type::var("a")]);
        let list_int = Type::mono_with("List", vec![int()]);
        let subst = list_a.unify(&list_int).unwrap();
        assert_eq!(subst.apply(&Type::var("a")), int());

        let dict = Type::mono_with("Dict", vec![int(), string()]);
        assert!(list_int.unify(&dict).is_none());
    }

    #[test]
    fn test_unify_functions_threads_substitution() {
        // (a → a) unifies with (Int → b) giving a=Int, b=Int.
        let f = Type::function(Type::var("a"), Type::var("a"));
        let g = Type::function(int(), Type::var("b"));
        let subst = f.unify(&g).unwrap();
        assert_eq!(subst.apply(&Type::var("a")), int());
        assert_eq!(subst.apply(&Type::var("b")), int());
    }

    #[test]
    fn test_unify_products() {
        let p1 = Type::product(Type::var("a"), int());
        let p2 = Type::product(string(), Type::var("b"));
        let subst = p1.unify(&p2).unwrap();
        assert_eq!(subst.apply(&p1), subst.apply(&p2));
    }

    #[test]
    fn test_function_and_product_do_not_unify() {
        let f = Type::function(int(), int());
        let p = Type::product(int(), int());
        assert!(f.unify(&p).is_none());
    }

    #[test]
    fn test_unification_idempotence() {
        let t1 = Type::function(Type::var("a"), Type::product(Type::var("b"), int()));
        let t2 = Type::function(string(), Type::var("c"));
        let subst = t1.unify(&t2).unwrap();

        assert_eq!(subst.apply(&t1), subst.apply(&t2));
        // Applying twice equals applying once.
        assert_eq!(subst.apply(&subst.apply(&t1)), subst.apply(&t1));
    }

    #[test]
    fn test_compose_is_left_biased() {
        // earlier: a ↦ b; later: b ↦ Int. Composition maps a ↦ Int.
        let earlier = Substitution::singleton("a".to_owned(), Type::var("b"));
        let later = Substitution::singleton("b".to_owned(), int());
        let composed = later.compose(&earlier);
        assert_eq!(composed.apply(&Type::var("a")), int());
        assert_eq!(composed.apply(&Type::var("b")), int());

        // Overlap: later's binding wins.
        let earlier = Substitution::singleton("a".to_owned(), string());
        let later = Substitution::singleton("a".to_owned(), int());
        assert_eq!(later.compose(&earlier).apply(&Type::var("a")), int());
    }

    #[test]
    fn test_display_formatting() {
        let t = Type::function(
            Type::function(int(), string()),
            Type::product(Type::mono_with("List", vec![int()]), Type::var("a")),
        );
        assert_eq!(t.to_string(), "(Int → String) → List[Int] × a");
    }
}
