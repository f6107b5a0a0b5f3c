//! Typing context: scoped environment for the checker.
//!
//! The context is a stack of scopes. Each scope maps symbolic keys —
//! `self`, the enclosing block type under the `yield` key, local names —
//! to types, and owns the generic-placeholder registry of its declaration
//! level, so signature text can reference previously declared type
//! variables.
//!
//! # Scoping
//!
//! Lookup walks inward-out but stops at the first method, class, or module
//! boundary: methods do not close over enclosing locals, blocks do. Each
//! method scope binds its own `self`; a block inherits the `self` and
//! `yield` of its enclosing method.

use crate::infer::{DeclLevel, VarId};
use crate::types::Ty;
use fxhash::FxHashMap;
use spinel_mem::{Symbol, names};

/// What kind of declaration opened a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// The program's outermost scope.
    TopLevel,
    /// A class body.
    Class,
    /// A module body.
    Module,
    /// A method body.
    Method,
    /// A block/lambda body.
    Block,
}

impl ScopeKind {
    /// Scopes of this kind are closure boundaries for plain lookups.
    fn is_barrier(self) -> bool {
        matches!(self, ScopeKind::Method | ScopeKind::Class | ScopeKind::Module)
    }

    fn level(self) -> Option<DeclLevel> {
        match self {
            ScopeKind::Method => Some(DeclLevel::Method),
            ScopeKind::Class => Some(DeclLevel::Class),
            ScopeKind::Module => Some(DeclLevel::Module),
            ScopeKind::TopLevel | ScopeKind::Block => None,
        }
    }
}

/// The method a scope is checking, for `super` resolution.
#[derive(Debug, Clone)]
pub struct CurrentMethod {
    /// Owner the method is defined on.
    pub owner: Symbol,
    /// Method name.
    pub message: Symbol,
    /// Whether it is a singleton (class-side) method.
    pub singleton: bool,
}

#[derive(Debug)]
struct Scope {
    kind: ScopeKind,
    bindings: FxHashMap<Symbol, Ty>,
    type_vars: FxHashMap<Symbol, VarId>,
    current_method: Option<CurrentMethod>,
    /// Inside `class << self`, plain method definitions target the
    /// singleton side.
    singleton_ctx: bool,
}

impl Scope {
    fn new(kind: ScopeKind) -> Self {
        Self {
            kind,
            bindings: FxHashMap::default(),
            type_vars: FxHashMap::default(),
            current_method: None,
            singleton_ctx: false,
        }
    }
}

/// The scoped typing environment.
#[derive(Debug)]
pub struct TypingContext {
    scopes: Vec<Scope>,
}

impl TypingContext {
    /// Creates a fresh top-level context. Top-level `self` is a plain
    /// object.
    #[must_use]
    pub fn new() -> Self {
        let mut top = Scope::new(ScopeKind::TopLevel);
        top.bindings.insert(names::SELF, Ty::Object(names::OBJECT));
        Self { scopes: vec![top] }
    }

    /// Current nesting depth.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Enters a scope.
    pub fn push(&mut self, kind: ScopeKind) {
        self.scopes.push(Scope::new(kind));
    }

    /// Leaves the innermost scope. The top-level scope is never popped.
    pub fn pop(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Binds a key in the innermost scope.
    pub fn bind(&mut self, key: Symbol, ty: Ty) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.bindings.insert(key, ty);
        }
    }

    /// Looks a key up, innermost first, stopping after the first closure
    /// boundary.
    #[must_use]
    pub fn lookup(&self, key: Symbol) -> Option<&Ty> {
        for scope in self.scopes.iter().rev() {
            if let Some(ty) = scope.bindings.get(&key) {
                return Some(ty);
            }
            if scope.kind.is_barrier() {
                return None;
            }
        }
        None
    }

    /// The type of `self` in the current scope.
    #[must_use]
    pub fn self_type(&self) -> Ty {
        self.lookup(names::SELF)
            .cloned()
            .unwrap_or(Ty::Object(names::OBJECT))
    }

    /// The enclosing block type, when the current method declares one.
    #[must_use]
    pub fn yield_type(&self) -> Option<Ty> {
        self.lookup(names::YIELD).cloned()
    }

    /// Registers a generic placeholder in the innermost scope.
    pub fn register_type_var(&mut self, name: Symbol, id: VarId) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.type_vars.insert(name, id);
        }
    }

    /// Resolves a generic placeholder name: method level first, then class,
    /// then module, following scope nesting.
    #[must_use]
    pub fn find_type_var(&self, name: Symbol) -> Option<VarId> {
        for scope in self.scopes.iter().rev() {
            if let Some(id) = scope.type_vars.get(&name) {
                return Some(*id);
            }
        }
        None
    }

    /// Resolves a placeholder at one declaration level only.
    #[must_use]
    pub fn find_type_var_at(&self, name: Symbol, level: DeclLevel) -> Option<VarId> {
        for scope in self.scopes.iter().rev() {
            if scope.kind.level() == Some(level) {
                if let Some(id) = scope.type_vars.get(&name) {
                    return Some(*id);
                }
            }
        }
        None
    }

    /// Marks the innermost scope as checking `method`.
    pub fn set_current_method(&mut self, method: CurrentMethod) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.current_method = Some(method);
        }
    }

    /// The method currently being checked, visible from nested blocks.
    #[must_use]
    pub fn current_method(&self) -> Option<&CurrentMethod> {
        for scope in self.scopes.iter().rev() {
            if let Some(m) = &scope.current_method {
                return Some(m);
            }
            if scope.kind == ScopeKind::Method {
                return scope.current_method.as_ref();
            }
        }
        None
    }

    /// Marks the innermost scope as a singleton-class body.
    pub fn set_singleton_ctx(&mut self) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.singleton_ctx = true;
        }
    }

    /// Whether plain definitions currently target the singleton side.
    #[must_use]
    pub fn in_singleton_ctx(&self) -> bool {
        for scope in self.scopes.iter().rev() {
            match scope.kind {
                ScopeKind::Class | ScopeKind::Module | ScopeKind::TopLevel => {
                    return scope.singleton_ctx;
                }
                _ => {}
            }
        }
        false
    }
}

impl Default for TypingContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infer::VarStore;
    use spinel_mem::StringInterner;

    #[test]
    fn test_top_level_self() {
        let ctx = TypingContext::new();
        assert_eq!(ctx.self_type(), Ty::Object(names::OBJECT));
    }

    #[test]
    fn test_scope_shadowing() {
        let mut interner = StringInterner::new();
        let x = interner.intern("x");

        let mut ctx = TypingContext::new();
        ctx.bind(x, Ty::Object(names::INTEGER));

        ctx.push(ScopeKind::Block);
        ctx.bind(x, Ty::Object(names::STRING));
        assert_eq!(ctx.lookup(x), Some(&Ty::Object(names::STRING)));

        ctx.pop();
        assert_eq!(ctx.lookup(x), Some(&Ty::Object(names::INTEGER)));
    }

    #[test]
    fn test_method_scope_is_closure_boundary() {
        let mut interner = StringInterner::new();
        let x = interner.intern("x");

        let mut ctx = TypingContext::new();
        ctx.bind(x, Ty::Object(names::INTEGER));

        // Blocks see enclosing locals, methods do not.
        ctx.push(ScopeKind::Block);
        assert!(ctx.lookup(x).is_some());
        ctx.pop();

        ctx.push(ScopeKind::Method);
        assert!(ctx.lookup(x).is_none());
        ctx.pop();
    }

    #[test]
    fn test_yield_visible_from_block() {
        let mut ctx = TypingContext::new();
        ctx.push(ScopeKind::Method);
        ctx.bind(names::YIELD, Ty::Dynamic);

        ctx.push(ScopeKind::Block);
        assert!(ctx.yield_type().is_some());

        ctx.pop();
        ctx.pop();
        assert!(ctx.yield_type().is_none());
    }

    #[test]
    fn test_type_var_resolution_order() {
        let mut interner = StringInterner::new();
        let t = interner.intern("T");
        let mut vars = VarStore::new();
        let class_var = vars.fresh(t, DeclLevel::Class, None);
        let method_var = vars.fresh(t, DeclLevel::Method, None);

        let mut ctx = TypingContext::new();
        ctx.push(ScopeKind::Class);
        ctx.register_type_var(t, class_var);

        ctx.push(ScopeKind::Method);
        ctx.register_type_var(t, method_var);

        // Innermost (method) declaration wins.
        assert_eq!(ctx.find_type_var(t), Some(method_var));
        assert_eq!(ctx.find_type_var_at(t, DeclLevel::Class), Some(class_var));

        ctx.pop();
        assert_eq!(ctx.find_type_var(t), Some(class_var));
    }

    #[test]
    fn test_current_method_from_nested_block() {
        let mut interner = StringInterner::new();
        let m = interner.intern("compute");

        let mut ctx = TypingContext::new();
        ctx.push(ScopeKind::Method);
        ctx.set_current_method(CurrentMethod {
            owner: names::OBJECT,
            message: m,
            singleton: false,
        });

        ctx.push(ScopeKind::Block);
        let found = ctx.current_method().expect("method visible from block");
        assert_eq!(found.message, m);
    }
}
