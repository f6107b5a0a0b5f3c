//! The subtype relation.
//!
//! `compatible` is the single arbiter of type compatibility. It is a
//! decidable partial order, not a total one: two nominal types with no
//! relation in either direction are *uncomparable*, which is a distinct
//! outcome from a decided "incompatible".
//!
//! During generic checking the relation doubles as a constraint emitter:
//! when one side resolves to an unbound type variable, the comparison emits
//! a constraint into the active store and optimistically succeeds, leaving
//! the decision to the unification engine.

use crate::check::Checker;
use crate::error::{Result, TypeError};
use crate::infer::Relation;
use crate::types::{FunctionType, Ty};
use spinel_mem::names;
use spinel_syntax::Span;

/// Direction of a compatibility query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Is the left side a subtype of the right?
    Sub,
    /// Is the left side a supertype of the right?
    Super,
}

/// Three-valued outcome of a decided comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decision {
    Yes,
    No,
    Unknown,
}

impl Decision {
    fn and(self, other: Decision) -> Decision {
        match (self, other) {
            (Decision::Yes, Decision::Yes) => Decision::Yes,
            (Decision::No, _) | (_, Decision::No) => Decision::No,
            _ => Decision::Unknown,
        }
    }
}

impl Checker<'_> {
    /// Compatibility of `a` against `b` in `direction`.
    ///
    /// - `Ok(true)`: compatible (or deferred to unification via an emitted
    ///   constraint).
    /// - `Ok(false)`: decidedly incompatible.
    /// - `Err(..)`: no subtype relation exists in either direction.
    pub fn compatible(
        &mut self,
        a: &Ty,
        b: &Ty,
        direction: Direction,
        span: Span,
    ) -> Result<bool> {
        let left = self.vars.resolve(a);
        let right = self.vars.resolve(b);

        if matches!(left, Ty::Dynamic) || matches!(right, Ty::Dynamic) {
            return Ok(true);
        }

        // An unresolved variable side defers the decision: emit a
        // constraint and let unification arbitrate.
        if let Ty::Var(id) = left {
            let relation = match direction {
                Direction::Sub => Relation::Subtype,
                Direction::Super => Relation::Supertype,
            };
            self.constraints.emit(Ty::Var(id), relation, right);
            return Ok(true);
        }
        if let Ty::Var(id) = right {
            let relation = match direction {
                Direction::Sub => Relation::Supertype,
                Direction::Super => Relation::Subtype,
            };
            self.constraints.emit(Ty::Var(id), relation, left);
            return Ok(true);
        }

        let (sub, sup) = match direction {
            Direction::Sub => (&left, &right),
            Direction::Super => (&right, &left),
        };

        // Function comparison recurses through `compatible` so that
        // variables nested in parameter or return position still emit
        // constraints instead of failing as uncomparable.
        if let (Ty::Function(f), Ty::Function(g)) = (sub, sup) {
            let (f, g) = (f.clone(), g.clone());
            return self.compatible_function(&f, &g, span);
        }

        // Same for generic arguments of one nominal base: a variable slot
        // turns the comparison into constraint generation.
        if let (
            Ty::Generic { name: n1, args: a1 },
            Ty::Generic { name: n2, args: a2 },
        ) = (sub, sup)
        {
            if n1 == n2 {
                let (base, a1, a2) = (*n1, a1.clone(), a2.clone());
                return self.compatible_generic_args(base, &a1, &a2, span);
            }
        }

        match self.decide(sub, sup) {
            Decision::Yes => Ok(true),
            Decision::No => Ok(false),
            Decision::Unknown => Err(TypeError::Uncomparable {
                left: self.render(&left),
                right: self.render(&right),
                span,
            }),
        }
    }

    /// Decides `a <: b` without emitting constraints. Returns `Unknown`
    /// when the nominal hierarchy relates the two in neither direction.
    pub(crate) fn decide(&self, a: &Ty, b: &Ty) -> Decision {
        if a == b {
            return Decision::Yes;
        }

        match (a, b) {
            (Ty::Dynamic, _) | (_, Ty::Dynamic) => Decision::Yes,

            // Jump tags compare through their payloads.
            (Ty::StackJump { payload, .. }, other) => self.decide(payload, other),
            (other, Ty::StackJump { payload, .. }) => self.decide(other, payload),

            // An alternative set is a subtype when every alternative is.
            (Ty::Either { normal, ret, brk }, other) => {
                let mut result = Decision::Yes;
                for t in [normal, ret, brk].into_iter().flatten() {
                    result = result.and(self.decide(t, other));
                }
                result
            }
            (other, Ty::Either { .. }) => {
                let max = self.either_max(b);
                self.decide(other, &max)
            }

            (Ty::Unit, Ty::Unit) => Decision::Yes,
            (Ty::Unit, Ty::Object(m)) => self.nominal_subtype(names::NIL_CLASS, *m),
            (Ty::Object(n), Ty::Unit) => self.nominal_subtype(*n, names::NIL_CLASS),

            (Ty::Function(f), Ty::Function(g)) => self.decide_function(f, g),
            (Ty::Function(_), Ty::Object(m)) => self.nominal_subtype(names::PROC, *m),

            (Ty::Generic { name: n1, args: a1 }, Ty::Generic { name: n2, args: a2 }) => {
                if n1 == n2 {
                    self.decide_generic_args(*n1, a1, a2)
                } else {
                    self.nominal_subtype(*n1, *n2)
                }
            }
            (Ty::Generic { name, .. }, Ty::Object(m)) => self.nominal_subtype(*name, *m),
            (Ty::Object(n), Ty::Generic { name, .. }) => self.nominal_subtype(*n, *name),

            (Ty::Object(n), Ty::Existential { name }) => {
                if self.registry.ancestors(*n).contains(name) {
                    Decision::Yes
                } else {
                    Decision::Unknown
                }
            }
            (Ty::Generic { name: n, .. }, Ty::Existential { name }) => {
                if self.registry.ancestors(*n).contains(name) {
                    Decision::Yes
                } else {
                    Decision::Unknown
                }
            }
            (Ty::Existential { name: n }, Ty::Existential { name: m }) => {
                if n == m {
                    Decision::Yes
                } else {
                    Decision::Unknown
                }
            }
            (Ty::Existential { .. }, Ty::Object(m)) => {
                self.nominal_subtype(names::MODULE, *m)
            }

            (Ty::Singleton(n), Ty::Singleton(m)) => self.nominal_subtype(*n, *m),
            (Ty::GenericSingleton { name: n, .. }, Ty::Singleton(m))
            | (Ty::Singleton(n), Ty::GenericSingleton { name: m, .. })
            | (
                Ty::GenericSingleton { name: n, .. },
                Ty::GenericSingleton { name: m, .. },
            ) => self.nominal_subtype(*n, *m),
            // Class objects are module instances.
            (Ty::Singleton(_), Ty::Object(m))
            | (Ty::GenericSingleton { .. }, Ty::Object(m)) => {
                self.nominal_subtype(names::MODULE, *m)
            }

            (Ty::Object(n), Ty::Object(m)) => self.nominal_subtype(*n, *m),

            _ => Decision::Unknown,
        }
    }

    /// `a <: b` along the declared ancestor chains.
    fn nominal_subtype(&self, a: spinel_mem::Symbol, b: spinel_mem::Symbol) -> Decision {
        if a == b {
            return Decision::Yes;
        }
        if self.registry.ancestors(a).contains(&b) {
            return Decision::Yes;
        }
        if self.registry.ancestors(b).contains(&a) {
            // Related, but in the other direction: decidedly not a subtype.
            return Decision::No;
        }
        Decision::Unknown
    }

    /// Constraint-emitting function subtyping: `f <: g` with parameters
    /// contravariant and return/block covariant, recursing through
    /// [`Self::compatible`] so variable sides defer to unification.
    pub(crate) fn compatible_function(
        &mut self,
        f: &FunctionType,
        g: &FunctionType,
        span: Span,
    ) -> Result<bool> {
        if f.params.len() != g.params.len() {
            return Ok(false);
        }
        for (fp, gp) in f.params.iter().zip(&g.params) {
            if !self.compatible(gp, fp, Direction::Sub, span)? {
                return Ok(false);
            }
        }
        if !self.compatible(&f.ret, &g.ret, Direction::Sub, span)? {
            return Ok(false);
        }
        match (&f.block, &g.block) {
            (_, None) => Ok(true),
            (Some(fb), Some(gb)) => {
                let (fb, gb) = ((**fb).clone(), (**gb).clone());
                self.compatible_function(&fb, &gb, span)
            }
            (None, Some(_)) => Ok(false),
        }
    }

    /// Constraint-emitting pairwise generic-argument comparison under each
    /// slot's declared variance.
    fn compatible_generic_args(
        &mut self,
        base: spinel_mem::Symbol,
        a: &[Ty],
        b: &[Ty],
        span: Span,
    ) -> Result<bool> {
        if a.len() != b.len() {
            return Ok(false);
        }
        let variances: Vec<crate::context::Variance> = (0..a.len())
            .map(|i| {
                self.registry
                    .generic(base)
                    .and_then(|d| d.params.get(i))
                    .map(|p| p.variance)
                    .unwrap_or_default()
            })
            .collect();
        for ((x, y), variance) in a.iter().zip(b).zip(variances) {
            let slot = match variance {
                crate::context::Variance::Covariant => {
                    self.compatible(x, y, Direction::Sub, span)?
                }
                crate::context::Variance::Contravariant => {
                    self.compatible(y, x, Direction::Sub, span)?
                }
                crate::context::Variance::Invariant => {
                    self.compatible(x, y, Direction::Sub, span)?
                        && self.compatible(y, x, Direction::Sub, span)?
                }
            };
            if !slot {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Function subtyping: contravariant parameters, covariant return and
    /// block.
    fn decide_function(&self, f: &FunctionType, g: &FunctionType) -> Decision {
        if f.params.len() != g.params.len() {
            return Decision::No;
        }
        let mut result = Decision::Yes;
        for (fp, gp) in f.params.iter().zip(&g.params) {
            result = result.and(self.decide(gp, fp));
        }
        result = result.and(self.decide(&f.ret, &g.ret));
        match (&f.block, &g.block) {
            (_, None) => {}
            (Some(fb), Some(gb)) => {
                result = result.and(self.decide_function(fb, gb));
            }
            (None, Some(_)) => return Decision::No,
        }
        result
    }

    /// Pairwise generic-argument compatibility under each slot's variance;
    /// invariant by default.
    fn decide_generic_args(
        &self,
        base: spinel_mem::Symbol,
        a: &[Ty],
        b: &[Ty],
    ) -> Decision {
        if a.len() != b.len() {
            return Decision::No;
        }
        let descriptor = self.registry.generic(base);
        let mut result = Decision::Yes;
        for (i, (x, y)) in a.iter().zip(b).enumerate() {
            let variance = descriptor
                .and_then(|d| d.params.get(i))
                .map(|p| p.variance)
                .unwrap_or_default();
            let slot = match variance {
                crate::context::Variance::Covariant => self.decide(x, y),
                crate::context::Variance::Contravariant => self.decide(y, x),
                crate::context::Variance::Invariant => {
                    self.decide(x, y).and(self.decide(y, x))
                }
            };
            result = result.and(slot);
        }
        result
    }

    /// Least upper bound of two types. Total: unrelated nominal types join
    /// at their closest common ancestor, everything else at the escape
    /// type.
    pub fn join(&self, a: &Ty, b: &Ty) -> Ty {
        let left = self.vars.resolve(a);
        let right = self.vars.resolve(b);

        if left == right {
            return left;
        }
        if self.decide(&left, &right) == Decision::Yes {
            return right;
        }
        if self.decide(&right, &left) == Decision::Yes {
            return left;
        }

        let ln = left.nominal();
        let rn = right.nominal();
        if let (Some(l), Some(r)) = (ln, rn) {
            if let Some(common) = self.common_ancestor(l, r) {
                return Ty::Object(common);
            }
        }

        Ty::Dynamic
    }

    fn common_ancestor(
        &self,
        a: spinel_mem::Symbol,
        b: spinel_mem::Symbol,
    ) -> Option<spinel_mem::Symbol> {
        let chain_b = self.registry.ancestors(b);
        self.registry
            .ancestors(a)
            .into_iter()
            .find(|candidate| chain_b.contains(candidate))
    }

    /// Least upper bound across the alternatives of an `Either` type.
    /// Plain types and jump payloads pass through.
    pub fn either_max(&self, ty: &Ty) -> Ty {
        match ty {
            Ty::Either { normal, ret, brk } => {
                let mut max: Option<Ty> = None;
                for t in [normal, ret, brk].into_iter().flatten() {
                    let inner = self.either_max(t);
                    max = Some(match max {
                        Some(current) => self.join(&current, &inner),
                        None => inner,
                    });
                }
                max.unwrap_or(Ty::Unit)
            }
            Ty::StackJump { payload, .. } => self.either_max(payload),
            other => other.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ClassInfo, SignatureRegistry};
    use crate::infer::VarStore;
    use crate::types::JumpKind;
    use spinel_mem::StringInterner;

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

    impl Fixture {
        fn checker(&self) -> Checker<'_> {
            Checker::new(&self.interner, &self.registry, self.vars.clone())
        }
    }

    #[test]
    fn test_reflexive_for_all_shapes() {
        let fx = fixture();
        let mut checker = fx.checker();
        for ty in [
            Ty::Dynamic,
            Ty::Unit,
            Ty::Object(names::INTEGER),
            Ty::Singleton(names::INTEGER),
            Ty::Generic {
                name: names::ARRAY,
                args: vec![Ty::Object(names::STRING)],
            },
            Ty::Function(FunctionType::new(
                vec![Ty::Object(names::INTEGER)],
                Ty::Object(names::STRING),
            )),
        ] {
            assert_eq!(
                checker.compatible(&ty, &ty, Direction::Sub, span()),
                Ok(true),
                "reflexivity failed for {ty:?}"
            );
        }
    }

    #[test]
    fn test_transitive_over_ancestor_chain() {
        let fx = fixture();
        let mut checker = fx.checker();
        let int = Ty::Object(names::INTEGER);
        let num = Ty::Object(names::NUMERIC);
        let obj = Ty::Object(names::OBJECT);

        assert_eq!(checker.compatible(&int, &num, Direction::Sub, span()), Ok(true));
        assert_eq!(checker.compatible(&num, &obj, Direction::Sub, span()), Ok(true));
        assert_eq!(checker.compatible(&int, &obj, Direction::Sub, span()), Ok(true));
    }

    #[test]
    fn test_supertype_direction() {
        let fx = fixture();
        let mut checker = fx.checker();
        let int = Ty::Object(names::INTEGER);
        let num = Ty::Object(names::NUMERIC);

        assert_eq!(checker.compatible(&num, &int, Direction::Super, span()), Ok(true));
        assert_eq!(checker.compatible(&num, &int, Direction::Sub, span()), Ok(false));
    }

    #[test]
    fn test_unrelated_nominals_are_uncomparable() {
        let fx = fixture();
        let mut checker = fx.checker();
        let int = Ty::Object(names::INTEGER);
        let s = Ty::Object(names::STRING);

        let err = checker
            .compatible(&int, &s, Direction::Sub, span())
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Uncomparable);
    }

    #[test]
    fn test_dynamic_compatible_both_directions() {
        let fx = fixture();
        let mut checker = fx.checker();
        let int = Ty::Object(names::INTEGER);

        assert_eq!(checker.compatible(&Ty::Dynamic, &int, Direction::Sub, span()), Ok(true));
        assert_eq!(checker.compatible(&int, &Ty::Dynamic, Direction::Sub, span()), Ok(true));
        assert_eq!(checker.compatible(&Ty::Dynamic, &int, Direction::Super, span()), Ok(true));
    }

    #[test]
    fn test_function_contravariant_params_covariant_ret() {
        let fx = fixture();
        let mut checker = fx.checker();

        // (Numeric) -> Integer  <:  (Integer) -> Numeric
        let general = Ty::Function(FunctionType::new(
            vec![Ty::Object(names::NUMERIC)],
            Ty::Object(names::INTEGER),
        ));
        let specific = Ty::Function(FunctionType::new(
            vec![Ty::Object(names::INTEGER)],
            Ty::Object(names::NUMERIC),
        ));
        assert_eq!(
            checker.compatible(&general, &specific, Direction::Sub, span()),
            Ok(true)
        );
        assert_eq!(
            checker.compatible(&specific, &general, Direction::Sub, span()),
            Ok(false)
        );
    }

    #[test]
    fn test_generic_invariant_by_default() {
        let fx = fixture();
        let mut checker = fx.checker();
        let of_int = Ty::Generic {
            name: names::ARRAY,
            args: vec![Ty::Object(names::INTEGER)],
        };
        let of_num = Ty::Generic {
            name: names::ARRAY,
            args: vec![Ty::Object(names::NUMERIC)],
        };
        assert_eq!(
            checker.compatible(&of_int, &of_num, Direction::Sub, span()),
            Ok(false)
        );
        assert_eq!(
            checker.compatible(&of_int, &of_int, Direction::Sub, span()),
            Ok(true)
        );
    }

    #[test]
    fn test_unbound_var_emits_constraint() {
        let fx = fixture();
        let mut checker = fx.checker();
        let t = checker
            .vars
            .fresh(names::SYMBOL, crate::infer::DeclLevel::Method, None);

        checker.constraints.push_frame();
        assert_eq!(
            checker.compatible(
                &Ty::Object(names::INTEGER),
                &Ty::Var(t),
                Direction::Sub,
                span()
            ),
            Ok(true)
        );
        let frame = checker.constraints.pop_frame();
        assert_eq!(frame.len(), 1);
        assert_eq!(frame[0].lhs, Ty::Var(t));
        assert_eq!(frame[0].relation, Relation::Supertype);
    }

    #[test]
    fn test_instance_compatible_with_included_module() {
        let mut interner = StringInterner::new();
        let a = interner.intern("A");
        let m = interner.intern("M");
        let mut vars = VarStore::new();
        let mut registry = SignatureRegistry::with_core_types(&mut vars);
        registry.register_module(m);
        registry.register_class(ClassInfo::new(a).with_include(m));

        let mut checker = Checker::new(&interner, &registry, vars);
        assert_eq!(
            checker.compatible(
                &Ty::Object(a),
                &Ty::Existential { name: m },
                Direction::Sub,
                span()
            ),
            Ok(true)
        );
    }

    #[test]
    fn test_join_at_common_ancestor() {
        let fx = fixture();
        let checker = fx.checker();
        let joined = checker.join(
            &Ty::Object(names::INTEGER),
            &Ty::Object(names::FLOAT),
        );
        assert_eq!(joined, Ty::Object(names::NUMERIC));
    }

    #[test]
    fn test_either_max_folds_alternatives() {
        let fx = fixture();
        let checker = fx.checker();
        let either = Ty::Either {
            normal: Some(Box::new(Ty::Object(names::INTEGER))),
            ret: Some(Box::new(Ty::Object(names::FLOAT))),
            brk: None,
        };
        assert_eq!(checker.either_max(&either), Ty::Object(names::NUMERIC));
    }

    #[test]
    fn test_stack_jump_compares_through_payload() {
        let fx = fixture();
        let mut checker = fx.checker();
        let jump = Ty::jump(JumpKind::Break, Ty::Object(names::INTEGER));
        assert_eq!(
            checker.compatible(&jump, &Ty::Object(names::NUMERIC), Direction::Sub, span()),
            Ok(true)
        );
    }
}
