//! Unification engine.
//!
//! Consumes the constraint store of one materialization event and produces
//! a binding map from variable identities to concrete types.
//!
//! # Rules
//!
//! - A *subtype* constraint on a variable narrows its working upper bound
//!   to the most specific type consistent with every subtype constraint
//!   seen so far.
//! - A *supertype* constraint raises the working lower bound to the least
//!   upper bound of all lower bounds.
//! - A lower bound that is not a subtype of the upper bound is a fatal
//!   conflict.
//! - Variable-variable constraints record equivalence edges; they are
//!   deferred until all concrete constraints have been applied, then
//!   bindings propagate across the edges.
//!
//! The engine binds a variable to its lower-bound join when one exists
//! (the type that actually flowed in), otherwise to its narrowed upper
//! bound. Variables left without either stay unbound; the materializer
//! reports them as ambiguous if the resulting signature reaches them.

use crate::check::Checker;
use crate::error::{Result, TypeError};
use crate::infer::constraints::{Constraint, Relation};
use crate::infer::vars::VarId;
use crate::types::Ty;
use crate::types::compat::Decision;
use fxhash::{FxHashMap, FxHashSet};
use spinel_syntax::Span;

/// Solves one materialization's constraints.
pub struct Unifier<'c, 'a> {
    checker: &'c mut Checker<'a>,
    uppers: FxHashMap<VarId, Vec<Ty>>,
    lowers: FxHashMap<VarId, Vec<Ty>>,
    edges: Vec<(VarId, VarId)>,
}

impl<'c, 'a> Unifier<'c, 'a> {
    /// Creates a unifier borrowing the checker for subtype decisions.
    pub fn new(checker: &'c mut Checker<'a>) -> Self {
        Self {
            checker,
            uppers: FxHashMap::default(),
            lowers: FxHashMap::default(),
            edges: Vec::new(),
        }
    }

    /// Runs the solve. The constraint collection is consumed; it is never
    /// reused across call sites.
    pub fn run(
        mut self,
        constraints: Vec<Constraint>,
        span: Span,
    ) -> Result<FxHashMap<VarId, Ty>> {
        for constraint in constraints {
            self.classify(constraint, span)?;
        }

        let mut bindings = FxHashMap::default();
        let vars: FxHashSet<VarId> = self
            .uppers
            .keys()
            .chain(self.lowers.keys())
            .copied()
            .collect();

        for var in vars {
            if let Some(ty) = self.solve_var(var, span)? {
                bindings.insert(var, ty);
            }
        }

        self.propagate_edges(&mut bindings, span)?;

        Ok(bindings)
    }

    fn classify(&mut self, constraint: Constraint, span: Span) -> Result<()> {
        let lhs = self.checker.vars.resolve(&constraint.lhs);
        let rhs = self.checker.vars.resolve(&constraint.rhs);

        match (lhs, rhs, constraint.relation) {
            (Ty::Var(a), Ty::Var(b), _) => {
                self.edges.push((a, b));
                Ok(())
            }

            (Ty::Var(v), ty, Relation::Subtype) => {
                self.uppers.entry(v).or_default().push(ty);
                Ok(())
            }
            (Ty::Var(v), ty, Relation::Supertype) => {
                self.lowers.entry(v).or_default().push(ty);
                Ok(())
            }
            (ty, Ty::Var(v), Relation::Subtype) => {
                self.lowers.entry(v).or_default().push(ty);
                Ok(())
            }
            (ty, Ty::Var(v), Relation::Supertype) => {
                self.uppers.entry(v).or_default().push(ty);
                Ok(())
            }

            // Both sides concrete: decide now.
            (lhs, rhs, relation) => {
                let direction = match relation {
                    Relation::Subtype => crate::types::Direction::Sub,
                    Relation::Supertype => crate::types::Direction::Super,
                };
                if self.checker.compatible(&lhs, &rhs, direction, span)? {
                    Ok(())
                } else {
                    Err(TypeError::Mismatch {
                        expected: self.checker.render(&rhs),
                        found: self.checker.render(&lhs),
                        context: "type argument".to_string(),
                        span,
                    })
                }
            }
        }
    }

    fn solve_var(&mut self, var: VarId, span: Span) -> Result<Option<Ty>> {
        let name = self.checker.render_sym(self.checker.vars.get(var).name);

        // Narrow the upper bound to the most specific consistent type.
        let mut upper: Option<Ty> = None;
        for candidate in self.uppers.get(&var).cloned().unwrap_or_default() {
            upper = Some(match upper {
                None => candidate,
                Some(current) => match self.checker.decide(&candidate, &current) {
                    Decision::Yes => candidate,
                    Decision::No => current,
                    Decision::Unknown => {
                        return Err(TypeError::ConflictingBounds {
                            variable: name,
                            lower: self.checker.render(&candidate),
                            upper: self.checker.render(&current),
                            span,
                        });
                    }
                },
            });
        }

        // Raise the lower bound to the join of everything that flowed in.
        let mut lower: Option<Ty> = None;
        for candidate in self.lowers.get(&var).cloned().unwrap_or_default() {
            lower = Some(match lower {
                None => candidate,
                Some(current) => self.checker.join(&current, &candidate),
            });
        }

        if let (Some(lo), Some(up)) = (&lower, &upper) {
            if self.checker.decide(lo, up) != Decision::Yes {
                return Err(TypeError::ConflictingBounds {
                    variable: name,
                    lower: self.checker.render(lo),
                    upper: self.checker.render(up),
                    span,
                });
            }
        }

        let candidate = lower.or(upper);

        // The declared bound of the variable still applies.
        if let Some(ty) = &candidate {
            let declared = self.checker.vars.get(var).bound.clone();
            if let Some(bound) = declared {
                let bound = self.checker.vars.resolve(&bound);
                let mut bound_vars = Vec::new();
                bound.collect_vars(&mut bound_vars);
                // A bound still mentioning unresolved variables cannot be
                // decided yet; a fully concrete one is enforced here.
                if bound_vars.is_empty()
                    && self.checker.decide(ty, &bound) != Decision::Yes
                {
                    return Err(TypeError::ConflictingBounds {
                        variable: name,
                        lower: self.checker.render(ty),
                        upper: self.checker.render(&bound),
                        span,
                    });
                }
            }
        }

        Ok(candidate)
    }

    /// Propagates bindings across equivalence edges after the concrete
    /// constraints have been applied.
    fn propagate_edges(
        &mut self,
        bindings: &mut FxHashMap<VarId, Ty>,
        span: Span,
    ) -> Result<()> {
        if self.edges.is_empty() {
            return Ok(());
        }

        // Connected components over the equivalence edges.
        let mut adjacency: FxHashMap<VarId, Vec<VarId>> = FxHashMap::default();
        for (a, b) in &self.edges {
            adjacency.entry(*a).or_default().push(*b);
            adjacency.entry(*b).or_default().push(*a);
        }

        let mut visited: FxHashSet<VarId> = FxHashSet::default();
        for start in adjacency.keys().copied().collect::<Vec<_>>() {
            if visited.contains(&start) {
                continue;
            }
            let mut component = Vec::new();
            let mut stack = vec![start];
            while let Some(var) = stack.pop() {
                if !visited.insert(var) {
                    continue;
                }
                component.push(var);
                if let Some(next) = adjacency.get(&var) {
                    stack.extend(next.iter().copied());
                }
            }

            // One representative binding per component.
            let mut chosen: Option<Ty> = None;
            for var in &component {
                if let Some(ty) = bindings.get(var) {
                    match &chosen {
                        None => chosen = Some(ty.clone()),
                        Some(existing) => {
                            let ok = self.checker.decide(existing, ty) == Decision::Yes
                                && self.checker.decide(ty, existing) == Decision::Yes;
                            if !ok {
                                let name = self
                                    .checker
                                    .render_sym(self.checker.vars.get(*var).name);
                                return Err(TypeError::ConflictingBounds {
                                    variable: name,
                                    lower: self.checker.render(ty),
                                    upper: self.checker.render(existing),
                                    span,
                                });
                            }
                        }
                    }
                }
            }

            if let Some(ty) = chosen {
                for var in component {
                    bindings.entry(var).or_insert_with(|| ty.clone());
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SignatureRegistry;
    use crate::infer::{DeclLevel, VarStore};
    use spinel_mem::{StringInterner, names};

    fn span() -> Span {
        Span::new(0, 1, 1, 1)
    }

    struct Fixture {
        interner: StringInterner,
        registry: SignatureRegistry,
        vars: VarStore,
    }

    fn fixture() -> Fixture {
        let interner = StringInterner::new();
        let mut vars = VarStore::new();
        let registry = SignatureRegistry::with_core_types(&mut vars);
        Fixture {
            interner,
            registry,
            vars,
        }
    }

    fn constraint(lhs: Ty, relation: Relation, rhs: Ty) -> Constraint {
        Constraint { lhs, relation, rhs }
    }

    #[test]
    fn test_equality_constraints_bind_var() {
        let fx = fixture();
        let mut checker = Checker::new(&fx.interner, &fx.registry, fx.vars.clone());
        let t = checker.vars.fresh(names::SYMBOL, DeclLevel::Class, None);

        let bindings = Unifier::new(&mut checker)
            .run(
                vec![
                    constraint(Ty::Var(t), Relation::Subtype, Ty::Object(names::INTEGER)),
                    constraint(Ty::Var(t), Relation::Supertype, Ty::Object(names::INTEGER)),
                ],
                span(),
            )
            .expect("solvable");
        assert_eq!(bindings.get(&t), Some(&Ty::Object(names::INTEGER)));
    }

    #[test]
    fn test_subtype_constraints_narrow() {
        let fx = fixture();
        let mut checker = Checker::new(&fx.interner, &fx.registry, fx.vars.clone());
        let t = checker.vars.fresh(names::SYMBOL, DeclLevel::Class, None);

        // T <: Numeric, T <: Integer narrows to Integer.
        let bindings = Unifier::new(&mut checker)
            .run(
                vec![
                    constraint(Ty::Var(t), Relation::Subtype, Ty::Object(names::NUMERIC)),
                    constraint(Ty::Var(t), Relation::Subtype, Ty::Object(names::INTEGER)),
                ],
                span(),
            )
            .expect("solvable");
        assert_eq!(bindings.get(&t), Some(&Ty::Object(names::INTEGER)));
    }

    #[test]
    fn test_supertype_constraints_raise() {
        let fx = fixture();
        let mut checker = Checker::new(&fx.interner, &fx.registry, fx.vars.clone());
        let t = checker.vars.fresh(names::SYMBOL, DeclLevel::Class, None);

        // T :> Integer, T :> Float raises to their join, Numeric.
        let bindings = Unifier::new(&mut checker)
            .run(
                vec![
                    constraint(Ty::Var(t), Relation::Supertype, Ty::Object(names::INTEGER)),
                    constraint(Ty::Var(t), Relation::Supertype, Ty::Object(names::FLOAT)),
                ],
                span(),
            )
            .expect("solvable");
        assert_eq!(bindings.get(&t), Some(&Ty::Object(names::NUMERIC)));
    }

    #[test]
    fn test_conflicting_bounds_are_fatal() {
        let fx = fixture();
        let mut checker = Checker::new(&fx.interner, &fx.registry, fx.vars.clone());
        let t = checker.vars.fresh(names::SYMBOL, DeclLevel::Class, None);

        // T :> String but T <: Integer has no common type.
        let result = Unifier::new(&mut checker).run(
            vec![
                constraint(Ty::Var(t), Relation::Supertype, Ty::Object(names::STRING)),
                constraint(Ty::Var(t), Relation::Subtype, Ty::Object(names::INTEGER)),
            ],
            span(),
        );
        let err = result.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::AmbiguousGeneric);
    }

    #[test]
    fn test_equivalence_edges_propagate() {
        let fx = fixture();
        let mut checker = Checker::new(&fx.interner, &fx.registry, fx.vars.clone());
        let t = checker.vars.fresh(names::SYMBOL, DeclLevel::Class, None);
        let u = checker.vars.fresh(names::SYMBOL, DeclLevel::Class, None);

        let bindings = Unifier::new(&mut checker)
            .run(
                vec![
                    constraint(Ty::Var(t), Relation::Subtype, Ty::Var(u)),
                    constraint(Ty::Var(u), Relation::Supertype, Ty::Object(names::INTEGER)),
                    constraint(Ty::Var(u), Relation::Subtype, Ty::Object(names::INTEGER)),
                ],
                span(),
            )
            .expect("solvable");
        assert_eq!(bindings.get(&t), Some(&Ty::Object(names::INTEGER)));
        assert_eq!(bindings.get(&u), Some(&Ty::Object(names::INTEGER)));
    }

    #[test]
    fn test_unconstrained_var_stays_unbound() {
        let fx = fixture();
        let mut checker = Checker::new(&fx.interner, &fx.registry, fx.vars.clone());
        let t = checker.vars.fresh(names::SYMBOL, DeclLevel::Class, None);

        let bindings = Unifier::new(&mut checker)
            .run(vec![], span())
            .expect("empty solve");
        assert!(bindings.get(&t).is_none());
    }

    #[test]
    fn test_declared_bound_is_enforced() {
        let fx = fixture();
        let mut checker = Checker::new(&fx.interner, &fx.registry, fx.vars.clone());
        let t = checker.vars.fresh(
            names::SYMBOL,
            DeclLevel::Class,
            Some(Ty::Object(names::NUMERIC)),
        );

        let result = Unifier::new(&mut checker).run(
            vec![
                constraint(Ty::Var(t), Relation::Supertype, Ty::Object(names::NUMERIC)),
                constraint(Ty::Var(t), Relation::Subtype, Ty::Object(names::NUMERIC)),
            ],
            span(),
        );
        assert!(result.is_ok());

        let u = checker.vars.fresh(
            names::SYMBOL,
            DeclLevel::Class,
            Some(Ty::Object(names::INTEGER)),
        );
        let result = Unifier::new(&mut checker).run(
            vec![
                constraint(Ty::Var(u), Relation::Supertype, Ty::Object(names::NUMERIC)),
                constraint(Ty::Var(u), Relation::Subtype, Ty::Object(names::NUMERIC)),
            ],
            span(),
        );
        // Numeric does not fit under the declared Integer bound.
        assert!(result.is_err());
    }
}
