//! Type representation and relations.
//!
//! - **`ty`**: the closed `Ty` variant set and traversal helpers
//! - **`compat`**: the subtype relation, doubling as constraint emitter
//! - **`display`**: interner-aware pretty printing

pub mod compat;
pub mod display;
pub mod ty;

pub use compat::Direction;
pub use display::DisplayTy;
pub use ty::{FunctionType, JumpKind, Ty};
