//! Spinel type checker: message-send checking and unification.
//!
//! This crate implements the core of the Spinel static type checker for a
//! dynamically-typed, object-oriented host language:
//!
//! - the closed type model, including the escape type and control-flow
//!   escape tags ([`types`])
//! - the scoped typing context and the read-only signature registry
//!   ([`context`])
//! - constraint-based unification and per-call-site generic
//!   materialization ([`infer`])
//! - the message-send, function-application, and term checkers
//!   ([`check`])
//! - structured, fail-fast errors ([`error`])
//!
//! The checker consumes an already-built term tree (`spinel-syntax`) and an
//! already-populated registry; building either is an external concern.
//!
//! # Example
//!
//! ```
//! use spinel_mem::StringInterner;
//! use spinel_syntax::{Span, Term};
//! use spinel_typecheck::{SignatureRegistry, Ty, VarStore, check_program};
//!
//! let interner = StringInterner::new();
//! let mut vars = VarStore::new();
//! let registry = SignatureRegistry::with_core_types(&mut vars);
//!
//! let program = Term::Int { value: 3, span: Span::new(0, 1, 1, 1) };
//! let ty = check_program(&program, &registry, &interner, vars).unwrap();
//! assert_eq!(ty, Ty::Object(spinel_mem::names::INTEGER));
//! ```

#![warn(missing_docs)]

pub mod check;
pub mod context;
pub mod error;
pub mod infer;
pub mod types;

pub use check::Checker;
pub use context::{
    ClassInfo, GenericDescriptor, GenericParam, ParamInfo, Signature, SignatureRegistry,
    Variance,
};
pub use error::{ErrorKind, Result, TypeError};
pub use infer::{DeclLevel, VarId, VarStore};
pub use types::{Direction, FunctionType, JumpKind, Ty};

use spinel_mem::StringInterner;
use spinel_syntax::Term;

/// Checks a whole program under a fresh top-level context.
///
/// The variable store is taken over from the declaration pass so the
/// canonical declaration-time variables keep their identities.
pub fn check_program(
    program: &Term,
    registry: &SignatureRegistry,
    interner: &StringInterner,
    vars: VarStore,
) -> Result<Ty> {
    let mut checker = Checker::new(interner, registry, vars);
    checker.check(program)
}
