//! Type-variable arena.
//!
//! Type variables are addressed by identity: a [`VarId`] indexes into the
//! [`VarStore`], which owns the variable's declared name, declaration
//! level, upper bound, and eventual binding.
//!
//! # Design
//!
//! - **Identity per materialization**: every materialization event clones
//!   fresh identities ([`VarStore::clone_fresh`]); bindings chosen at one
//!   call site can never leak into another.
//! - **Write-once bindings**: a binding is written exactly once, after
//!   unification solves the materialization's constraint store. It is never
//!   mutated incrementally during constraint collection.
//! - **Visited guards**: every traversal that follows bindings carries a
//!   visited set, so self-referential generic graphs terminate.

use crate::types::Ty;
use fxhash::FxHashSet;
use spinel_mem::Symbol;
use std::fmt;

/// Identity of a type variable in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(u32);

impl VarId {
    /// Creates an id from a raw index. Only meaningful for ids produced by
    /// a [`VarStore`].
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// The raw index.
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.0)
    }
}

/// Declaration level a generic placeholder was introduced at. Signature
/// text resolves placeholder names innermost-first: method, then class,
/// then module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclLevel {
    /// Method-level generic variable.
    Method,
    /// Class-level generic variable.
    Class,
    /// Module-level variable (the existential self of a module body).
    Module,
}

/// A type variable: declared name, level, upper bound, write-once binding.
#[derive(Debug, Clone)]
pub struct TypeVar {
    /// Declared placeholder name (`T`, `E`, ...).
    pub name: Symbol,
    /// Where the variable was declared.
    pub level: DeclLevel,
    /// Declared upper bound, possibly itself generic.
    pub bound: Option<Ty>,
    binding: Option<Ty>,
}

/// Arena of type variables.
#[derive(Debug, Clone, Default)]
pub struct VarStore {
    vars: Vec<TypeVar>,
}

impl VarStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of variables allocated so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Returns `true` if no variable has been allocated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Allocates a fresh variable.
    pub fn fresh(&mut self, name: Symbol, level: DeclLevel, bound: Option<Ty>) -> VarId {
        let id = VarId(self.vars.len() as u32);
        self.vars.push(TypeVar {
            name,
            level,
            bound,
            binding: None,
        });
        id
    }

    /// Clones a variable into a fresh identity, keeping its name, level and
    /// bound but not any binding. The clone belongs to a new
    /// materialization event.
    pub fn clone_fresh(&mut self, id: VarId) -> VarId {
        let source = self.get(id);
        let (name, level, bound) = (source.name, source.level, source.bound.clone());
        self.fresh(name, level, bound)
    }

    /// Rewrites the bound of a variable. Used right after cloning a
    /// variable graph, to point cloned bounds at cloned identities.
    pub(crate) fn set_bound(&mut self, id: VarId, bound: Option<Ty>) {
        self.vars[id.as_usize()].bound = bound;
    }

    /// Returns the variable behind an id.
    ///
    /// # Panics
    ///
    /// Panics if the id does not belong to this store.
    #[must_use]
    pub fn get(&self, id: VarId) -> &TypeVar {
        &self.vars[id.as_usize()]
    }

    /// The binding of a variable, if unification has produced one.
    #[must_use]
    pub fn binding(&self, id: VarId) -> Option<&Ty> {
        self.vars[id.as_usize()].binding.as_ref()
    }

    /// Returns `true` once the variable has been bound.
    #[must_use]
    pub fn is_bound(&self, id: VarId) -> bool {
        self.binding(id).is_some()
    }

    /// Writes the binding of a variable. Bindings are write-once: the
    /// caller only binds after a materialization's solve completes.
    pub fn bind(&mut self, id: VarId, ty: Ty) {
        let slot = &mut self.vars[id.as_usize()].binding;
        debug_assert!(slot.is_none(), "type variable bound twice");
        *slot = Some(ty);
    }

    /// Substitutes bindings into `ty`, recursively. Unbound variables stay
    /// as variables. A visited set guards against self-referential
    /// bindings.
    #[must_use]
    pub fn resolve(&self, ty: &Ty) -> Ty {
        let mut visited = FxHashSet::default();
        self.resolve_guarded(ty, &mut visited)
    }

    fn resolve_guarded(&self, ty: &Ty, visited: &mut FxHashSet<VarId>) -> Ty {
        match ty {
            Ty::Var(id) => {
                if !visited.insert(*id) {
                    return Ty::Var(*id);
                }
                let out = match self.binding(*id) {
                    Some(bound) => self.resolve_guarded(&bound.clone(), visited),
                    None => Ty::Var(*id),
                };
                visited.remove(id);
                out
            }

            Ty::Generic { name, args } => Ty::Generic {
                name: *name,
                args: args
                    .iter()
                    .map(|a| self.resolve_guarded(a, visited))
                    .collect(),
            },

            Ty::Function(f) => Ty::Function(self.resolve_fn_guarded(f, visited)),

            Ty::Either { normal, ret, brk } => Ty::Either {
                normal: normal
                    .as_ref()
                    .map(|t| Box::new(self.resolve_guarded(t, visited))),
                ret: ret
                    .as_ref()
                    .map(|t| Box::new(self.resolve_guarded(t, visited))),
                brk: brk
                    .as_ref()
                    .map(|t| Box::new(self.resolve_guarded(t, visited))),
            },

            Ty::StackJump { kind, payload } => Ty::StackJump {
                kind: *kind,
                payload: Box::new(self.resolve_guarded(payload, visited)),
            },

            Ty::Dynamic
            | Ty::Unit
            | Ty::Object(_)
            | Ty::Singleton(_)
            | Ty::GenericSingleton { .. }
            | Ty::Existential { .. } => ty.clone(),
        }
    }

    fn resolve_fn_guarded(
        &self,
        f: &crate::types::FunctionType,
        visited: &mut FxHashSet<VarId>,
    ) -> crate::types::FunctionType {
        crate::types::FunctionType {
            params: f
                .params
                .iter()
                .map(|p| self.resolve_guarded(p, visited))
                .collect(),
            ret: Box::new(self.resolve_guarded(&f.ret, visited)),
            block: f
                .block
                .as_ref()
                .map(|b| Box::new(self.resolve_fn_guarded(b, visited))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spinel_mem::names;

    fn store() -> VarStore {
        VarStore::new()
    }

    #[test]
    fn test_fresh_identities_are_distinct() {
        let mut vars = store();
        let a = vars.fresh(names::SYMBOL, DeclLevel::Class, None);
        let b = vars.fresh(names::SYMBOL, DeclLevel::Class, None);
        assert_ne!(a, b);
        assert_eq!(vars.len(), 2);
    }

    #[test]
    fn test_clone_fresh_keeps_bound_not_binding() {
        let mut vars = store();
        let a = vars.fresh(
            names::SYMBOL,
            DeclLevel::Class,
            Some(Ty::Object(names::NUMERIC)),
        );
        vars.bind(a, Ty::Object(names::INTEGER));

        let b = vars.clone_fresh(a);
        assert_ne!(a, b);
        assert_eq!(vars.get(b).bound, Some(Ty::Object(names::NUMERIC)));
        assert!(!vars.is_bound(b));
        assert!(vars.is_bound(a));
    }

    #[test]
    fn test_resolve_follows_bindings() {
        let mut vars = store();
        let a = vars.fresh(names::SYMBOL, DeclLevel::Method, None);
        vars.bind(a, Ty::Object(names::INTEGER));

        let ty = Ty::Generic {
            name: names::ARRAY,
            args: vec![Ty::Var(a)],
        };
        assert_eq!(
            vars.resolve(&ty),
            Ty::Generic {
                name: names::ARRAY,
                args: vec![Ty::Object(names::INTEGER)],
            }
        );
    }

    #[test]
    fn test_resolve_unbound_stays_var() {
        let mut vars = store();
        let a = vars.fresh(names::SYMBOL, DeclLevel::Method, None);
        assert_eq!(vars.resolve(&Ty::Var(a)), Ty::Var(a));
    }

    #[test]
    fn test_resolve_self_referential_terminates() {
        let mut vars = store();
        let a = vars.fresh(names::SYMBOL, DeclLevel::Class, None);
        // a := Array[a]; resolution must not loop.
        vars.bind(
            a,
            Ty::Generic {
                name: names::ARRAY,
                args: vec![Ty::Var(a)],
            },
        );
        let resolved = vars.resolve(&Ty::Var(a));
        match resolved {
            Ty::Generic { name, args } => {
                assert_eq!(name, names::ARRAY);
                assert_eq!(args[0], Ty::Var(a));
            }
            other => panic!("unexpected resolution: {other:?}"),
        }
    }
}
