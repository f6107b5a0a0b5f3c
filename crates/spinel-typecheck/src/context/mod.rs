//! Typing context and signature registry.
//!
//! - **`env`**: the scoped environment (`self`, `yield`, locals, generic
//!   placeholder registries)
//! - **`registry`**: declared signatures, class info, generic descriptors

pub mod env;
pub mod registry;

pub use env::{CurrentMethod, ScopeKind, TypingContext};
pub use registry::{
    ClassInfo, GenericDescriptor, GenericParam, ParamInfo, Signature, SignatureRegistry,
    Variance,
};
