//! String interning with ID-based references.
//!
//! The interner maintains a bidirectional mapping between strings and
//! [`Symbol`] IDs:
//!
//! - `strings`: `Symbol` → `&str`, for resolving IDs back to text
//! - `symbols`: `&str` → `Symbol`, for deduplicating on intern
//!
//! A fixed set of *well-known names* is interned at construction time with
//! stable IDs (see [`names`]), covering the identifiers the type checker
//! special-cases during dispatch: `self`, `yield`, `new`, `initialize`,
//! `call`, `include`, `cast`, plus the core class names of the host
//! language's object hierarchy.
//!
//! # Examples
//!
//! ```
//! use spinel_mem::{StringInterner, names};
//!
//! let mut interner = StringInterner::new();
//! let sym1 = interner.intern("count");
//! let sym2 = interner.intern("count");
//! assert_eq!(sym1, sym2);
//! assert_eq!(interner.resolve(sym1), Some("count"));
//!
//! // Well-known names have stable, pre-interned IDs.
//! assert_eq!(interner.intern("initialize"), names::INITIALIZE);
//! ```

use crate::symbol::Symbol;

// The "string-interner" feature swaps the map implementation for hashbrown.
#[cfg(feature = "string-interner")]
use hashbrown::HashMap;

#[cfg(not(feature = "string-interner"))]
use std::collections::HashMap;

/// All well-known names, in ID order. Keep in sync with [`names`].
const WELL_KNOWN: &[&str] = &[
    "self", "yield", "new", "initialize", "call", "include", "cast", "each",
    "sig", "[]", "BasicObject", "Object", "Module", "Kernel", "NilClass",
    "Boolean", "Integer", "Float", "Numeric", "String", "Symbol", "Regexp",
    "Array", "Hash", "Range", "Proc",
];

/// Stable symbols for the pre-interned well-known names.
///
/// These constants are valid for any [`StringInterner`] because the
/// well-known list is interned first, in order, at construction time.
pub mod names {
    use crate::symbol::Symbol;

    /// `self` receiver key.
    pub const SELF: Symbol = Symbol::new(0);
    /// Enclosing block key (`yield` target).
    pub const YIELD: Symbol = Symbol::new(1);
    /// Constructor message.
    pub const NEW: Symbol = Symbol::new(2);
    /// Instance-side initializer message.
    pub const INITIALIZE: Symbol = Symbol::new(3);
    /// Lambda invocation / generic type application message.
    pub const CALL: Symbol = Symbol::new(4);
    /// Module inclusion message.
    pub const INCLUDE: Symbol = Symbol::new(5);
    /// Escape-hatch cast pseudo-message.
    pub const CAST: Symbol = Symbol::new(6);
    /// Iteration message used by `for` desugaring.
    pub const EACH: Symbol = Symbol::new(7);
    /// Type-annotation marker message.
    pub const SIG: Symbol = Symbol::new(8);
    /// Index message, an alias for lambda invocation.
    pub const INDEX: Symbol = Symbol::new(9);

    /// Universal base type.
    pub const BASIC_OBJECT: Symbol = Symbol::new(10);
    /// Default superclass.
    pub const OBJECT: Symbol = Symbol::new(11);
    /// Owner of the `include` implementation.
    pub const MODULE: Symbol = Symbol::new(12);
    /// Kernel module.
    pub const KERNEL: Symbol = Symbol::new(13);
    /// Nil class; the unit type renders through it.
    pub const NIL_CLASS: Symbol = Symbol::new(14);
    /// Boolean class (true/false literals).
    pub const BOOLEAN: Symbol = Symbol::new(15);
    /// Integer class.
    pub const INTEGER: Symbol = Symbol::new(16);
    /// Float class.
    pub const FLOAT: Symbol = Symbol::new(17);
    /// Numeric superclass of Integer/Float.
    pub const NUMERIC: Symbol = Symbol::new(18);
    /// String class.
    pub const STRING: Symbol = Symbol::new(19);
    /// Symbol-literal class.
    pub const SYMBOL: Symbol = Symbol::new(20);
    /// Regexp class.
    pub const REGEXP: Symbol = Symbol::new(21);
    /// Array generic class.
    pub const ARRAY: Symbol = Symbol::new(22);
    /// Hash generic class.
    pub const HASH: Symbol = Symbol::new(23);
    /// Range generic class.
    pub const RANGE: Symbol = Symbol::new(24);
    /// Proc class backing function values.
    pub const PROC: Symbol = Symbol::new(25);
}

/// String interner with bidirectional mapping.
///
/// Interned string data is owned by the interner; `resolve` hands out
/// borrowed slices. Well-known names are interned eagerly so their IDs are
/// stable across interner instances.
pub struct StringInterner {
    /// Symbol ID → string data.
    strings: Vec<Box<str>>,

    /// String → symbol ID.
    symbols: HashMap<Box<str>, Symbol>,
}

impl StringInterner {
    /// Creates a new interner with the well-known names pre-interned.
    #[must_use]
    pub fn new() -> Self {
        let mut interner = Self {
            strings: Vec::with_capacity(WELL_KNOWN.len()),
            symbols: HashMap::new(),
        };
        for name in WELL_KNOWN {
            interner.intern(name);
        }
        interner
    }

    /// Interns a string, returning its symbol.
    ///
    /// Returns the existing symbol when the string was interned before.
    pub fn intern(&mut self, s: &str) -> Symbol {
        if let Some(&sym) = self.symbols.get(s) {
            return sym;
        }

        let sym = Symbol::new(self.strings.len() as u32);
        let data: Box<str> = s.into();
        self.strings.push(data.clone());
        self.symbols.insert(data, sym);
        sym
    }

    /// Looks up a string without interning it.
    #[must_use]
    pub fn get(&self, s: &str) -> Option<Symbol> {
        self.symbols.get(s).copied()
    }

    /// Resolves a symbol back to its string.
    #[must_use]
    pub fn resolve(&self, sym: Symbol) -> Option<&str> {
        self.strings.get(sym.as_usize()).map(|s| &**s)
    }

    /// Returns the number of interned strings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Returns `true` if nothing has been interned. Never true in practice:
    /// the well-known names are always present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Returns `true` if the symbol is one of the pre-interned well-known
    /// names.
    #[must_use]
    pub fn is_well_known(&self, sym: Symbol) -> bool {
        sym.as_usize() < WELL_KNOWN.len()
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_round_trip() {
        let mut interner = StringInterner::new();
        let sym = interner.intern("wblock1");
        assert_eq!(interner.resolve(sym), Some("wblock1"));
    }

    #[test]
    fn test_intern_dedup() {
        let mut interner = StringInterner::new();
        let a = interner.intern("value");
        let b = interner.intern("value");
        let c = interner.intern("other");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_well_known_ids_are_stable() {
        let mut interner = StringInterner::new();
        assert_eq!(interner.intern("self"), names::SELF);
        assert_eq!(interner.intern("yield"), names::YIELD);
        assert_eq!(interner.intern("new"), names::NEW);
        assert_eq!(interner.intern("initialize"), names::INITIALIZE);
        assert_eq!(interner.intern("Integer"), names::INTEGER);
        assert_eq!(interner.intern("BasicObject"), names::BASIC_OBJECT);
    }

    #[test]
    fn test_well_known_table_matches_constants() {
        let interner = StringInterner::new();
        assert_eq!(interner.resolve(names::CAST), Some("cast"));
        assert_eq!(interner.resolve(names::MODULE), Some("Module"));
        assert_eq!(interner.resolve(names::PROC), Some("Proc"));
        assert_eq!(interner.len(), 26);
    }

    #[test]
    fn test_get_does_not_intern() {
        let mut interner = StringInterner::new();
        assert_eq!(interner.get("not_there"), None);
        let before = interner.len();
        let _ = interner.get("not_there");
        assert_eq!(interner.len(), before);
        let sym = interner.intern("now_there");
        assert_eq!(interner.get("now_there"), Some(sym));
    }

    #[test]
    fn test_is_well_known() {
        let mut interner = StringInterner::new();
        assert!(interner.is_well_known(names::SELF));
        let user = interner.intern("user_method");
        assert!(!interner.is_well_known(user));
    }
}
