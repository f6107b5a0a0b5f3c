//! Signature registry: declared signatures and type descriptors.
//!
//! The registry is populated by an external declaration pass (annotation
//! scanning) before checking starts, and queried read-only by the checker.
//! It stores:
//!
//! - **Signatures**, keyed by owner, message, and side (instance or
//!   singleton); the query interface selects by argument count.
//! - **Class info**: superclass, included modules, declared instance
//!   variable types.
//! - **Generic descriptors**: the canonical type variables and optional
//!   explicit super type of a parameterized class.
//! - **Global variable types.**
//!
//! Lookup walks the ancestor chain (included modules first, then the
//! superclass chain) and reports the owner the signature was found on; the
//! instantiation checker uses that owner to recognize inherited default
//! constructors.

use crate::infer::{DeclLevel, VarId, VarStore};
use crate::types::{FunctionType, Ty};
use fxhash::{FxHashMap, FxHashSet};
use spinel_mem::{Symbol, names};
use spinel_syntax::ParamKind;

/// A formal parameter of a declared signature.
#[derive(Debug, Clone)]
pub struct ParamInfo {
    /// Slot kind.
    pub kind: ParamKind,
    /// Declared name.
    pub name: Symbol,
    /// Declared type; `None` when the annotation omitted it.
    pub ty: Option<Ty>,
}

impl ParamInfo {
    /// A required parameter with a declared type.
    #[must_use]
    pub fn required(name: Symbol, ty: Ty) -> Self {
        Self {
            kind: ParamKind::Required,
            name,
            ty: Some(ty),
        }
    }

    /// An optional parameter with a declared type.
    #[must_use]
    pub fn optional(name: Symbol, ty: Ty) -> Self {
        Self {
            kind: ParamKind::Optional,
            name,
            ty: Some(ty),
        }
    }

    /// A rest parameter typed as an array of `elem`.
    #[must_use]
    pub fn rest(name: Symbol, elem: Ty) -> Self {
        Self {
            kind: ParamKind::Rest,
            name,
            ty: Some(Ty::Generic {
                name: names::ARRAY,
                args: vec![elem],
            }),
        }
    }
}

/// A declared method signature.
#[derive(Debug, Clone)]
pub struct Signature {
    /// Ordered formal parameters.
    pub params: Vec<ParamInfo>,
    /// Declared return type.
    pub ret: Ty,
    /// Declared block type, if any.
    pub block: Option<FunctionType>,
    /// Escape signature: applied without any argument checking.
    pub dynamic: bool,
    /// Method-level generic variables; empty for plain signatures.
    pub generic_vars: Vec<VarId>,
}

impl Signature {
    /// A plain, checked signature.
    #[must_use]
    pub fn new(params: Vec<ParamInfo>, ret: Ty) -> Self {
        Self {
            params,
            ret,
            block: None,
            dynamic: false,
            generic_vars: Vec::new(),
        }
    }

    /// An escape signature: any application succeeds and yields `ret`.
    #[must_use]
    pub fn dynamic_sig(name: Symbol, ret: Ty) -> Self {
        Self {
            params: vec![ParamInfo {
                kind: ParamKind::Rest,
                name,
                ty: Some(Ty::Generic {
                    name: names::ARRAY,
                    args: vec![Ty::Dynamic],
                }),
            }],
            ret,
            block: None,
            dynamic: true,
            generic_vars: Vec::new(),
        }
    }

    /// Attaches a declared block type.
    #[must_use]
    pub fn with_block(mut self, block: FunctionType) -> Self {
        self.block = Some(block);
        self
    }

    /// Marks the signature generic at the method level.
    #[must_use]
    pub fn with_generic_vars(mut self, vars: Vec<VarId>) -> Self {
        self.generic_vars = vars;
        self
    }

    /// Whether this signature is generic at the method level.
    #[must_use]
    pub fn generic(&self) -> bool {
        !self.generic_vars.is_empty()
    }

    /// Smallest number of positional arguments this signature accepts.
    #[must_use]
    pub fn min_arity(&self) -> usize {
        self.params
            .iter()
            .filter(|p| p.kind == ParamKind::Required)
            .count()
    }

    /// Largest number of positional arguments, `None` when unbounded.
    #[must_use]
    pub fn max_arity(&self) -> Option<usize> {
        if self.params.iter().any(|p| p.kind == ParamKind::Rest) {
            return None;
        }
        Some(
            self.params
                .iter()
                .filter(|p| matches!(p.kind, ParamKind::Required | ParamKind::Optional))
                .count(),
        )
    }

    /// Whether `argc` positional arguments fit this signature. Escape
    /// signatures accept anything.
    #[must_use]
    pub fn accepts(&self, argc: usize) -> bool {
        if self.dynamic {
            return true;
        }
        argc >= self.min_arity() && self.max_arity().is_none_or(|max| argc <= max)
    }

    /// Applies `f` to every declared type in the signature.
    #[must_use]
    pub fn map_types(&self, f: &impl Fn(&Ty) -> Ty) -> Signature {
        Signature {
            params: self
                .params
                .iter()
                .map(|p| ParamInfo {
                    kind: p.kind,
                    name: p.name,
                    ty: p.ty.as_ref().map(|t| f(t)),
                })
                .collect(),
            ret: f(&self.ret),
            block: self.block.as_ref().map(|b| b.map_types(f)),
            dynamic: self.dynamic,
            generic_vars: self.generic_vars.clone(),
        }
    }
}

/// Declared information about a class.
#[derive(Debug, Clone)]
pub struct ClassInfo {
    /// Class name.
    pub name: Symbol,
    /// Superclass; `None` only for the universal base type.
    pub superclass: Option<Symbol>,
    /// Included modules, in inclusion order.
    pub includes: Vec<Symbol>,
    /// Declared instance variable types.
    pub ivars: FxHashMap<Symbol, Ty>,
}

impl ClassInfo {
    /// A class extending the default superclass.
    #[must_use]
    pub fn new(name: Symbol) -> Self {
        Self {
            name,
            superclass: Some(names::OBJECT),
            includes: Vec::new(),
            ivars: FxHashMap::default(),
        }
    }

    /// Sets an explicit superclass.
    #[must_use]
    pub fn with_superclass(mut self, superclass: Symbol) -> Self {
        self.superclass = Some(superclass);
        self
    }

    /// Declares an included module.
    #[must_use]
    pub fn with_include(mut self, module: Symbol) -> Self {
        self.includes.push(module);
        self
    }

    /// Declares an instance variable type.
    #[must_use]
    pub fn with_ivar(mut self, name: Symbol, ty: Ty) -> Self {
        self.ivars.insert(name, ty);
        self
    }

    fn root(name: Symbol) -> Self {
        Self {
            name,
            superclass: None,
            includes: Vec::new(),
            ivars: FxHashMap::default(),
        }
    }
}

/// Variance of one generic slot. Comparisons default to invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Variance {
    /// Arguments must be compatible in both directions.
    #[default]
    Invariant,
    /// Arguments compare along the outer direction.
    Covariant,
    /// Arguments compare against the outer direction.
    Contravariant,
}

/// One canonical generic slot of a descriptor.
#[derive(Debug, Clone)]
pub struct GenericParam {
    /// The canonical declaration-time variable.
    pub id: VarId,
    /// Slot variance.
    pub variance: Variance,
}

/// Descriptor of a parameterized class: its canonical variables and
/// optional explicit super type.
#[derive(Debug, Clone)]
pub struct GenericDescriptor {
    /// Class name.
    pub name: Symbol,
    /// Canonical slots, in declaration order.
    pub params: Vec<GenericParam>,
    /// Explicit super type, when annotated.
    pub super_type: Option<Ty>,
}

/// Process-wide store of declared signatures and type descriptors.
///
/// Built mutably during the declaration pass, then handed to the checker
/// by shared reference; ownership is the freeze.
#[derive(Debug, Default)]
pub struct SignatureRegistry {
    classes: FxHashMap<Symbol, ClassInfo>,
    modules: FxHashSet<Symbol>,
    signatures: FxHashMap<(Symbol, Symbol, bool), Vec<Signature>>,
    generics: FxHashMap<Symbol, GenericDescriptor>,
    globals: FxHashMap<Symbol, Ty>,
}

impl SignatureRegistry {
    /// An empty registry. Most callers want [`Self::with_core_types`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry seeded with the host language's core hierarchy: the
    /// universal base type and default superclass, the core literal
    /// classes, the generic containers, the `cast` escape hatch, the
    /// `include` implementation, and the fallback default constructor.
    #[must_use]
    pub fn with_core_types(vars: &mut VarStore) -> Self {
        let mut registry = Self::new();

        registry.register_class(ClassInfo::root(names::BASIC_OBJECT));
        registry.register_class(
            ClassInfo::new(names::OBJECT).with_superclass(names::BASIC_OBJECT),
        );
        registry.register_class(ClassInfo::new(names::MODULE));
        registry.register_class(ClassInfo::new(names::NIL_CLASS));
        registry.register_class(ClassInfo::new(names::BOOLEAN));
        registry.register_class(ClassInfo::new(names::NUMERIC));
        registry.register_class(
            ClassInfo::new(names::INTEGER).with_superclass(names::NUMERIC),
        );
        registry.register_class(
            ClassInfo::new(names::FLOAT).with_superclass(names::NUMERIC),
        );
        registry.register_class(ClassInfo::new(names::STRING));
        registry.register_class(ClassInfo::new(names::SYMBOL));
        registry.register_class(ClassInfo::new(names::REGEXP));
        registry.register_class(ClassInfo::new(names::PROC));
        registry.register_module(names::KERNEL);

        for (name, slots) in [
            (names::ARRAY, 1usize),
            (names::HASH, 2),
            (names::RANGE, 1),
        ] {
            registry.register_class(ClassInfo::new(name));
            let params = (0..slots)
                .map(|_| GenericParam {
                    id: vars.fresh(name, DeclLevel::Class, None),
                    variance: Variance::Invariant,
                })
                .collect();
            registry.register_generic(GenericDescriptor {
                name,
                params,
                super_type: None,
            });
        }

        // The escape hatch: `cast(value, 'Type')` on the universal base.
        registry.register_signature(
            names::BASIC_OBJECT,
            names::CAST,
            false,
            Signature::new(
                vec![
                    ParamInfo::required(names::CAST, Ty::Dynamic),
                    ParamInfo::required(names::CAST, Ty::Dynamic),
                ],
                Ty::Dynamic,
            ),
        );

        // Module inclusion; argument checking is special-cased in the
        // message-send checker.
        registry.register_signature(
            names::MODULE,
            names::INCLUDE,
            false,
            Signature::new(
                vec![ParamInfo::rest(names::INCLUDE, Ty::Dynamic)],
                Ty::Dynamic,
            ),
        );

        // The fallback default constructor. Lives on the universal base so
        // a class without a user constructor resolves `initialize` to an
        // ancestor owner.
        registry.register_signature(
            names::BASIC_OBJECT,
            names::INITIALIZE,
            false,
            Signature::dynamic_sig(names::INITIALIZE, Ty::Unit),
        );

        registry
    }

    /// Registers a class.
    pub fn register_class(&mut self, info: ClassInfo) {
        self.classes.insert(info.name, info);
    }

    /// Registers a module name.
    pub fn register_module(&mut self, name: Symbol) {
        self.modules.insert(name);
    }

    /// Registers a signature for `message` on `owner`. `singleton` selects
    /// the class side.
    pub fn register_signature(
        &mut self,
        owner: Symbol,
        message: Symbol,
        singleton: bool,
        signature: Signature,
    ) {
        self.signatures
            .entry((owner, message, singleton))
            .or_default()
            .push(signature);
    }

    /// Registers a generic descriptor.
    pub fn register_generic(&mut self, descriptor: GenericDescriptor) {
        self.generics.insert(descriptor.name, descriptor);
    }

    /// Registers a global variable type.
    pub fn register_global(&mut self, name: Symbol, ty: Ty) {
        self.globals.insert(name, ty);
    }

    /// Class info by name.
    #[must_use]
    pub fn lookup_class(&self, name: Symbol) -> Option<&ClassInfo> {
        self.classes.get(&name)
    }

    /// Whether `name` names a module.
    #[must_use]
    pub fn is_module(&self, name: Symbol) -> bool {
        self.modules.contains(&name)
    }

    /// Generic descriptor by name.
    #[must_use]
    pub fn generic(&self, name: Symbol) -> Option<&GenericDescriptor> {
        self.generics.get(&name)
    }

    /// Global variable type by name.
    #[must_use]
    pub fn global(&self, name: Symbol) -> Option<&Ty> {
        self.globals.get(&name)
    }

    /// The ancestor chain of a nominal type: the type itself, its included
    /// modules (innermost first), then the superclass chain the same way.
    /// Unknown names get the default chain so core messages still resolve.
    #[must_use]
    pub fn ancestors(&self, name: Symbol) -> Vec<Symbol> {
        let mut chain = Vec::new();
        let mut seen = FxHashSet::default();
        let mut cursor = Some(name);

        while let Some(current) = cursor {
            if !seen.insert(current) {
                break;
            }
            chain.push(current);

            match self.classes.get(&current) {
                Some(info) => {
                    for module in info.includes.iter().rev() {
                        if seen.insert(*module) {
                            chain.push(*module);
                        }
                    }
                    cursor = info.superclass;
                }
                None => {
                    // Unregistered receiver: assume the default superclass
                    // unless we already are at the roots.
                    cursor = if current == names::OBJECT {
                        Some(names::BASIC_OBJECT)
                    } else if current == names::BASIC_OBJECT {
                        None
                    } else {
                        Some(names::OBJECT)
                    };
                }
            }
        }

        chain
    }

    /// Looks a signature up by owner nominal type, message, side and
    /// argument count, walking the ancestor chain. Returns the owner the
    /// signature was found on together with the signature.
    ///
    /// The argument count selects among one owner's overloads; it never
    /// skips an owner that declares the message, so arity failures surface
    /// on the declaring type instead of resolving to an ancestor. Singleton
    /// lookups fall through to the instance side of the module chain: class
    /// objects are module instances.
    #[must_use]
    pub fn find(
        &self,
        owner: Symbol,
        message: Symbol,
        singleton: bool,
        argc: usize,
    ) -> Option<(Symbol, &Signature)> {
        for ancestor in self.ancestors(owner) {
            if let Some(found) = self.find_on(ancestor, message, singleton, argc) {
                return Some((ancestor, found));
            }
        }

        if singleton {
            // Fall through to the metaclass chain.
            for ancestor in self.ancestors(names::MODULE) {
                if let Some(found) = self.find_on(ancestor, message, false, argc) {
                    return Some((ancestor, found));
                }
            }
        }

        None
    }

    fn find_on(
        &self,
        owner: Symbol,
        message: Symbol,
        singleton: bool,
        argc: usize,
    ) -> Option<&Signature> {
        let sigs = self.signatures.get(&(owner, message, singleton))?;
        sigs.iter()
            .find(|s| s.accepts(argc))
            .or_else(|| sigs.first())
    }

    /// The signature a method definition should check its body against:
    /// first one declared for the exact owner, ignoring arity.
    #[must_use]
    pub fn signature_for_definition(
        &self,
        owner: Symbol,
        message: Symbol,
        singleton: bool,
    ) -> Option<&Signature> {
        self.signatures
            .get(&(owner, message, singleton))
            .and_then(|sigs| sigs.first())
    }

    /// Declared instance variable type, walking the ancestor chain.
    #[must_use]
    pub fn ivar_type(&self, owner: Symbol, name: Symbol) -> Option<&Ty> {
        for ancestor in self.ancestors(owner) {
            if let Some(info) = self.classes.get(&ancestor) {
                if let Some(ty) = info.ivars.get(&name) {
                    return Some(ty);
                }
            }
        }
        None
    }
}
