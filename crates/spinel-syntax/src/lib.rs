//! Spinel syntax: the term tree consumed by the type checker.
//!
//! This crate defines the vocabulary of an already-parsed program:
//!
//! - [`span`] — source location tracking
//! - [`term`] — the immutable tree of tagged nodes (declarations, message
//!   sends, block literals, literals, control forms)
//!
//! Translating concrete syntax into this tree is the front end's concern;
//! nothing here lexes or parses text. The checker only reads these nodes.

#![warn(missing_docs)]

pub mod span;
pub mod term;

pub use span::{Span, Spanned};
pub use term::{BoolOpKind, Param, ParamKind, RescueClause, Term, WhenClause};
