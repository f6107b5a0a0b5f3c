//! Type checking over the term tree.
//!
//! - [`Checker`] — the checking state: interner, registry, scoped context,
//!   variable arena, constraint frames, recorded module surfaces
//! - [`term`] — recursive descent over the term vocabulary
//! - [`send`] — message-send dispatch
//! - [`apply`] — function application and block matching

pub mod apply;
pub mod send;
pub mod term;

use crate::context::{SignatureRegistry, TypingContext};
use crate::error::Result;
use crate::infer::{Capability, ConstraintStore, VarId, VarStore};
use crate::types::Ty;
use fxhash::FxHashMap;
use spinel_mem::{StringInterner, Symbol};
use spinel_syntax::Term;

/// The type checker.
///
/// One checker checks one program against one registry. The registry and
/// interner are shared read-only; the scoped context, the variable arena,
/// and the constraint frames are the checker's own mutable state.
pub struct Checker<'a> {
    /// Interner, for rendering type names into errors.
    pub interner: &'a StringInterner,

    /// Declared signatures and type descriptors; read-only.
    pub registry: &'a SignatureRegistry,

    /// Scoped typing environment.
    pub env: TypingContext,

    /// Type-variable arena. Canonical declaration-time variables and
    /// per-call-site clones all live here, so identities never collide.
    pub vars: VarStore,

    /// Per-materialization constraint frames.
    pub constraints: ConstraintStore,

    /// Minimal materialization contexts, derived lazily from generic
    /// descriptors on first use and memoized for the checker's lifetime.
    pub(crate) minimal_contexts: FxHashMap<Symbol, Vec<VarId>>,

    /// Capabilities recorded against unresolved variable receivers.
    pub(crate) var_capabilities: FxHashMap<VarId, Vec<Capability>>,

    /// Capability tables of checked module bodies, keyed by module name.
    /// Consulted at inclusion time.
    pub(crate) module_surfaces: FxHashMap<Symbol, Vec<Capability>>,
}

impl<'a> Checker<'a> {
    /// Creates a checker with a fresh top-level context.
    ///
    /// The variable store is taken over from the declaration pass so that
    /// canonical declaration-time variables and the fresh ones cloned per
    /// call site share one identity space.
    pub fn new(
        interner: &'a StringInterner,
        registry: &'a SignatureRegistry,
        vars: VarStore,
    ) -> Self {
        Self {
            interner,
            registry,
            env: TypingContext::new(),
            vars,
            constraints: ConstraintStore::new(),
            minimal_contexts: FxHashMap::default(),
            var_capabilities: FxHashMap::default(),
            module_surfaces: FxHashMap::default(),
        }
    }

    /// Checks a term, yielding its type. The primary entry point.
    pub fn check(&mut self, term: &Term) -> Result<Ty> {
        self.check_term(term)
    }

    /// Renders a type for an error message.
    pub(crate) fn render(&self, ty: &Ty) -> String {
        format!("{}", ty.display(self.interner))
    }

    /// Renders a symbol for an error message.
    pub(crate) fn render_sym(&self, sym: Symbol) -> String {
        self.interner.resolve(sym).unwrap_or("?").to_string()
    }

    /// The instance type behind a metatype: the type `new` produces.
    /// Unbound slots of a generic metatype degrade to the escape type.
    pub(crate) fn instance_of(&self, ty: &Ty) -> Ty {
        match ty {
            Ty::Singleton(name) => Ty::Object(*name),
            Ty::GenericSingleton { name, vars, .. } => Ty::Generic {
                name: *name,
                args: vars
                    .iter()
                    .map(|id| match self.vars.binding(*id) {
                        Some(bound) => self.vars.resolve(&bound.clone()),
                        None => Ty::Dynamic,
                    })
                    .collect(),
            },
            other => other.clone(),
        }
    }
}
