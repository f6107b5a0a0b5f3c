//! Core type representation for type checking.
//!
//! This module defines the `Ty` enum: the closed set of types the checker
//! computes for terms. It is distinct from the textual annotations the
//! external signature parser consumes; every value here is an already
//! resolved, structural description.
//!
//! # Design
//!
//! - **The escape type** (`Dynamic`) is an explicit variant, so every match
//!   over types is exhaustive; it is never represented as an absent value.
//! - **Type variables** (`Var`) are addressed by arena identity
//!   ([`VarId`]); their bound and eventual binding live in the
//!   [`VarStore`](crate::infer::VarStore), never inline.
//! - **Control-flow escapes** are carried as tags (`StackJump`, `Either`)
//!   on inferred types; the checker inspects them but never transfers
//!   control.

use crate::infer::VarId;
use fxhash::FxHashMap;
use spinel_mem::Symbol;

/// Which non-local exit produced a [`Ty::StackJump`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JumpKind {
    /// `return` from the enclosing method.
    Return,
    /// `break` out of the enclosing block or loop.
    Break,
    /// `next` to the following iteration.
    Next,
}

/// A function (lambda/block) type.
///
/// Parameters compare contravariantly, the return type and the nested block
/// type covariantly.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionType {
    /// Parameter types, in order.
    pub params: Vec<Ty>,
    /// Return type.
    pub ret: Box<Ty>,
    /// Declared block type, when the function itself takes a block.
    pub block: Option<Box<FunctionType>>,
}

impl FunctionType {
    /// A function type with no block.
    #[must_use]
    pub fn new(params: Vec<Ty>, ret: Ty) -> Self {
        Self {
            params,
            ret: Box::new(ret),
            block: None,
        }
    }

    /// Attaches a block type.
    #[must_use]
    pub fn with_block(mut self, block: FunctionType) -> Self {
        self.block = Some(Box::new(block));
        self
    }

    /// Applies `f` to every type in this function, recursively.
    pub fn map_types(&self, f: &impl Fn(&Ty) -> Ty) -> FunctionType {
        FunctionType {
            params: self.params.iter().map(|p| f(p)).collect(),
            ret: Box::new(f(&self.ret)),
            block: self
                .block
                .as_ref()
                .map(|b| Box::new(b.map_types(f))),
        }
    }
}

/// Internal type representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Ty {
    /// The escape type: compatible with everything, in both directions.
    /// An intentional, unchecked trapdoor.
    Dynamic,

    /// The nil/unit type. Statement-like terms and annotation markers
    /// evaluate to it.
    Unit,

    /// Nominal instance type.
    Object(Symbol),

    /// The metatype of a nominal type: the class object itself.
    Singleton(Symbol),

    /// Generic instance type with applied type arguments.
    Generic {
        /// Base nominal name.
        name: Symbol,
        /// Applied type arguments, in declaration order.
        args: Vec<Ty>,
    },

    /// Generic metatype carrying its (possibly bound) type variables.
    GenericSingleton {
        /// Base nominal name.
        name: Symbol,
        /// The variable graph of this materialization.
        vars: Vec<VarId>,
        /// Explicit super type, when declared.
        super_type: Option<Box<Ty>>,
    },

    /// Function type (lambdas, procs, declared block types).
    Function(FunctionType),

    /// Type variable, by arena identity.
    Var(VarId),

    /// Module/mixin requirement surface. The recorded capability table is
    /// keyed by the module name in the checker state.
    Existential {
        /// Module name.
        name: Symbol,
    },

    /// Control-flow alternative set: the possible result channels of a
    /// branching expression whose arms escape differently.
    Either {
        /// Normal-completion type.
        normal: Option<Box<Ty>>,
        /// `return`-escape payload type.
        ret: Option<Box<Ty>>,
        /// `break`-escape payload type.
        brk: Option<Box<Ty>>,
    },

    /// A non-local exit surfacing through an inferred type.
    StackJump {
        /// Which exit.
        kind: JumpKind,
        /// The value carried by the exit.
        payload: Box<Ty>,
    },
}

impl Ty {
    /// Convenience constructor for a stack jump.
    #[must_use]
    pub fn jump(kind: JumpKind, payload: Ty) -> Self {
        Ty::StackJump {
            kind,
            payload: Box::new(payload),
        }
    }

    /// The nominal class name used for method lookup on this type, when it
    /// has one. The unit type resolves through the nil class, functions
    /// through the proc class.
    #[must_use]
    pub fn nominal(&self) -> Option<Symbol> {
        match self {
            Ty::Object(name)
            | Ty::Generic { name, .. }
            | Ty::Existential { name } => Some(*name),
            Ty::Unit => Some(spinel_mem::names::NIL_CLASS),
            Ty::Function(_) => Some(spinel_mem::names::PROC),
            _ => None,
        }
    }

    /// Returns `true` for metatypes (class objects).
    #[must_use]
    pub fn is_metatype(&self) -> bool {
        matches!(self, Ty::Singleton(_) | Ty::GenericSingleton { .. })
    }

    /// Returns `true` for stack jumps.
    #[must_use]
    pub fn is_stack_jump(&self) -> bool {
        matches!(self, Ty::StackJump { .. })
    }

    /// Replaces variables according to `map`, recursively. Variables not in
    /// the map are left untouched. Variable-id slots (the graph of a
    /// generic metatype) are only renamed when the replacement is itself a
    /// variable.
    #[must_use]
    pub fn substitute(&self, map: &FxHashMap<VarId, Ty>) -> Ty {
        match self {
            Ty::Var(id) => map.get(id).cloned().unwrap_or(Ty::Var(*id)),

            Ty::Generic { name, args } => Ty::Generic {
                name: *name,
                args: args.iter().map(|a| a.substitute(map)).collect(),
            },

            Ty::GenericSingleton {
                name,
                vars,
                super_type,
            } => Ty::GenericSingleton {
                name: *name,
                vars: vars
                    .iter()
                    .map(|id| match map.get(id) {
                        Some(Ty::Var(new_id)) => *new_id,
                        _ => *id,
                    })
                    .collect(),
                super_type: super_type
                    .as_ref()
                    .map(|s| Box::new(s.substitute(map))),
            },

            Ty::Function(f) => Ty::Function(f.map_types(&|t| t.substitute(map))),

            Ty::Either { normal, ret, brk } => Ty::Either {
                normal: normal.as_ref().map(|t| Box::new(t.substitute(map))),
                ret: ret.as_ref().map(|t| Box::new(t.substitute(map))),
                brk: brk.as_ref().map(|t| Box::new(t.substitute(map))),
            },

            Ty::StackJump { kind, payload } => Ty::StackJump {
                kind: *kind,
                payload: Box::new(payload.substitute(map)),
            },

            Ty::Dynamic
            | Ty::Unit
            | Ty::Object(_)
            | Ty::Singleton(_)
            | Ty::Existential { .. } => self.clone(),
        }
    }

    /// Collects every variable identity mentioned by this type.
    pub fn collect_vars(&self, acc: &mut Vec<VarId>) {
        match self {
            Ty::Var(id) => acc.push(*id),

            Ty::Generic { args, .. } => {
                for a in args {
                    a.collect_vars(acc);
                }
            }

            Ty::GenericSingleton { vars, .. } => acc.extend(vars.iter().copied()),

            Ty::Function(f) => {
                for p in &f.params {
                    p.collect_vars(acc);
                }
                f.ret.collect_vars(acc);
                if let Some(b) = &f.block {
                    for p in &b.params {
                        p.collect_vars(acc);
                    }
                    b.ret.collect_vars(acc);
                }
            }

            Ty::Either { normal, ret, brk } => {
                for t in [normal, ret, brk].into_iter().flatten() {
                    t.collect_vars(acc);
                }
            }

            Ty::StackJump { payload, .. } => payload.collect_vars(acc),

            Ty::Dynamic
            | Ty::Unit
            | Ty::Object(_)
            | Ty::Singleton(_)
            | Ty::Existential { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spinel_mem::names;

    #[test]
    fn test_nominal_lookup_names() {
        assert_eq!(Ty::Object(names::INTEGER).nominal(), Some(names::INTEGER));
        assert_eq!(Ty::Unit.nominal(), Some(names::NIL_CLASS));
        assert_eq!(
            Ty::Function(FunctionType::new(vec![], Ty::Unit)).nominal(),
            Some(names::PROC)
        );
        assert_eq!(Ty::Singleton(names::INTEGER).nominal(), None);
    }

    #[test]
    fn test_is_metatype() {
        assert!(Ty::Singleton(names::OBJECT).is_metatype());
        assert!(!Ty::Object(names::OBJECT).is_metatype());
    }

    #[test]
    fn test_substitute_in_function() {
        let id = VarId::new(0);
        let f = FunctionType::new(vec![Ty::Var(id)], Ty::Var(id));
        let mut map = FxHashMap::default();
        map.insert(id, Ty::Object(names::INTEGER));

        let out = Ty::Function(f).substitute(&map);
        match out {
            Ty::Function(f) => {
                assert_eq!(f.params[0], Ty::Object(names::INTEGER));
                assert_eq!(*f.ret, Ty::Object(names::INTEGER));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_substitute_leaves_unmapped_vars() {
        let a = VarId::new(0);
        let b = VarId::new(1);
        let map = FxHashMap::default();
        let ty = Ty::Generic {
            name: names::HASH,
            args: vec![Ty::Var(a), Ty::Var(b)],
        };
        assert_eq!(ty.substitute(&map), ty);
    }

    #[test]
    fn test_collect_vars() {
        let a = VarId::new(3);
        let b = VarId::new(7);
        let ty = Ty::Generic {
            name: names::HASH,
            args: vec![Ty::Var(a), Ty::Function(FunctionType::new(vec![], Ty::Var(b)))],
        };
        let mut acc = Vec::new();
        ty.collect_vars(&mut acc);
        assert_eq!(acc, vec![a, b]);
    }
}
