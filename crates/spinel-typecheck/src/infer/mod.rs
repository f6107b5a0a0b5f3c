//! Constraint generation, unification, and generic materialization.
//!
//! - **`vars`**: the type-variable arena
//! - **`constraints`**: per-materialization constraint frames
//! - **`unify`**: the constraint solver
//! - **`materialize`**: fresh-clone-and-solve of generic graphs

pub mod constraints;
pub mod materialize;
pub mod unify;
pub mod vars;

pub use constraints::{Capability, Constraint, ConstraintStore, Relation};
pub use unify::Unifier;
pub use vars::{DeclLevel, TypeVar, VarId, VarStore};
