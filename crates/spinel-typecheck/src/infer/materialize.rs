//! Generic materialization.
//!
//! Materializing a generic type at a call site walks through a fixed
//! sequence of states:
//!
//! 1. **Context computed** — the descriptor's minimal context (its
//!    canonical variables with their declared bounds) is derived lazily on
//!    first use and memoized for the checker's lifetime.
//! 2. **Cloned** — every variable in the graph gets a fresh identity; the
//!    bounds are retargeted at the clones. Nothing chosen at one call site
//!    can leak into another.
//! 3. **Constraints applied** — each actual type argument contributes
//!    equality constraints against its fresh variable, matched
//!    positionally. When materializing against another generic context the
//!    slots match by declared variable name instead, and unmatched
//!    method-only variables are left as they are.
//! 4. **Solved** — the unification engine consumes the constraint frame.
//! 5. **Bound** — bindings are written (once) over the cloned graph. The
//!    frame is discarded, never merged or reused.

use crate::check::Checker;
use crate::context::Signature;
use crate::error::{Result, TypeError};
use crate::infer::unify::Unifier;
use crate::infer::vars::VarId;
use crate::infer::Relation;
use crate::types::Ty;
use fxhash::FxHashMap;
use spinel_mem::Symbol;
use spinel_syntax::{Span, Term};

impl Checker<'_> {
    /// The minimal materialization context of a generic descriptor: its
    /// canonical variables. Derived on first use, memoized, and reused for
    /// every later materialization of the same descriptor.
    pub(crate) fn minimal_context(&mut self, name: Symbol, span: Span) -> Result<Vec<VarId>> {
        if let Some(ids) = self.minimal_contexts.get(&name) {
            return Ok(ids.clone());
        }

        let descriptor = self.registry.generic(name).ok_or(TypeError::UnknownGenericType {
            name: self.render_sym(name),
            span,
        })?;
        let ids: Vec<VarId> = descriptor.params.iter().map(|p| p.id).collect();

        spinel_log::debug!(
            "computed minimal context for generic type '{}' ({} vars)",
            self.render_sym(name),
            ids.len()
        );
        self.minimal_contexts.insert(name, ids.clone());
        Ok(ids)
    }

    /// Materializes `name` against concrete type arguments, producing a
    /// bound generic metatype. This is the `Box.(Integer)` path.
    pub(crate) fn materialize_generic(
        &mut self,
        name: Symbol,
        type_args: &[Ty],
        span: Span,
    ) -> Result<Ty> {
        let canonical = self.minimal_context(name, span)?;
        if type_args.len() != canonical.len() {
            return Err(TypeError::WrongTypeArgumentCount {
                name: self.render_sym(name),
                expected: canonical.len(),
                found: type_args.len(),
                span,
            });
        }

        let fresh = self.clone_var_graph(&canonical);

        self.constraints.push_frame();
        for (var, arg) in fresh.iter().zip(type_args) {
            self.constraints
                .emit(Ty::Var(*var), Relation::Subtype, arg.clone());
            self.constraints
                .emit(Ty::Var(*var), Relation::Supertype, arg.clone());
        }
        let constraints = self.constraints.pop_frame();
        let bindings = Unifier::new(self).run(constraints, span)?;

        self.apply_bindings(&fresh, &bindings, span)?;

        let super_type = self
            .registry
            .generic(name)
            .and_then(|d| d.super_type.clone())
            .map(Box::new);
        Ok(Ty::GenericSingleton {
            name,
            vars: fresh,
            super_type,
        })
    }

    /// Materializes a method-level generic signature at one call site:
    /// clones the signature's variable scope fresh, runs the ordinary
    /// application check with constraint emission active, solves, and
    /// returns the bound result type.
    pub(crate) fn materialize_method(
        &mut self,
        signature: &Signature,
        args: &[Term],
        block: Option<&Term>,
        message: Symbol,
        span: Span,
    ) -> Result<Ty> {
        let fresh = self.clone_var_graph(&signature.generic_vars);
        let rename: FxHashMap<VarId, Ty> = signature
            .generic_vars
            .iter()
            .zip(&fresh)
            .map(|(old, new)| (*old, Ty::Var(*new)))
            .collect();
        let cloned = signature.map_types(&|t| t.substitute(&rename));

        self.constraints.push_frame();
        let applied = self.check_application(&cloned, args, block, message, span);
        let constraints = self.constraints.pop_frame();
        applied?;

        let bindings = Unifier::new(self).run(constraints, span)?;
        for var in &fresh {
            if let Some(ty) = bindings.get(var) {
                self.vars.bind(*var, ty.clone());
            }
        }

        // Every variable the result type reaches must have been bound.
        let result = self.vars.resolve(&cloned.ret);
        let mut unresolved = Vec::new();
        result.collect_vars(&mut unresolved);
        if let Some(id) = unresolved.into_iter().find(|id| fresh.contains(id)) {
            return Err(TypeError::AmbiguousGeneric {
                variable: self.render_sym(self.vars.get(id).name),
                span,
            });
        }

        Ok(result)
    }

    /// Clones a variable graph into fresh identities, retargeting bounds
    /// at the clones. A visited map guards self-referential bounds.
    pub(crate) fn clone_var_graph(&mut self, canonical: &[VarId]) -> Vec<VarId> {
        let mut mapping: FxHashMap<VarId, Ty> = FxHashMap::default();
        let fresh: Vec<VarId> = canonical
            .iter()
            .map(|id| {
                let clone = self.vars.clone_fresh(*id);
                mapping.insert(*id, Ty::Var(clone));
                clone
            })
            .collect();

        for id in &fresh {
            let bound = self.vars.get(*id).bound.clone();
            if let Some(bound) = bound {
                self.vars.set_bound(*id, Some(bound.substitute(&mapping)));
            }
        }

        fresh
    }

    /// Writes the solved bindings over a cloned graph. A binding that is
    /// itself a generic object propagates the same binding map into that
    /// object's arguments; unbound variables are ambiguous.
    fn apply_bindings(
        &mut self,
        fresh: &[VarId],
        bindings: &FxHashMap<VarId, Ty>,
        span: Span,
    ) -> Result<()> {
        let as_tys: FxHashMap<VarId, Ty> = bindings.clone();
        for var in fresh {
            match bindings.get(var) {
                Some(ty) => {
                    let propagated = ty.substitute(&as_tys);
                    self.vars.bind(*var, propagated);
                }
                None => {
                    return Err(TypeError::AmbiguousGeneric {
                        variable: self.render_sym(self.vars.get(*var).name),
                        span,
                    });
                }
            }
        }
        Ok(())
    }

    /// Concretizes a signature found on `found_owner` for a generic
    /// receiver: the receiver's applied arguments replace the descriptor's
    /// canonical variables. Positional when the signature lives on the
    /// receiver's own class; matched by declared variable name when it was
    /// found on a generic ancestor, with unmatched variables left as-is.
    pub(crate) fn concretize_for_receiver(
        &mut self,
        receiver: &Ty,
        found_owner: Symbol,
        signature: &Signature,
    ) -> Signature {
        let (base, args) = match receiver {
            Ty::Generic { name, args } => (*name, args.clone()),
            Ty::GenericSingleton { name, vars, .. } => (
                *name,
                vars.iter()
                    .map(|id| {
                        self.vars
                            .binding(*id)
                            .cloned()
                            .unwrap_or(Ty::Var(*id))
                    })
                    .collect::<Vec<_>>(),
            ),
            _ => return signature.clone(),
        };

        let Some(owner_desc) = self.registry.generic(found_owner) else {
            return signature.clone();
        };

        let mut substitution: FxHashMap<VarId, Ty> = FxHashMap::default();
        if found_owner == base {
            for (param, arg) in owner_desc.params.iter().zip(&args) {
                substitution.insert(param.id, arg.clone());
            }
        } else if let Some(receiver_desc) = self.registry.generic(base) {
            // Ancestor signature: match slots by declared variable name.
            for param in &owner_desc.params {
                let name = self.vars.get(param.id).name;
                let position = receiver_desc
                    .params
                    .iter()
                    .position(|p| self.vars.get(p.id).name == name);
                if let Some(pos) = position {
                    if let Some(arg) = args.get(pos) {
                        substitution.insert(param.id, arg.clone());
                    }
                }
            }
        }

        if substitution.is_empty() {
            signature.clone()
        } else {
            signature.map_types(&|t| t.substitute(&substitution))
        }
    }
}
