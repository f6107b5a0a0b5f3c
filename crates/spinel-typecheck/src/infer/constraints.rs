//! Constraint accumulation.
//!
//! During generic checking, subtype comparisons that touch an unresolved
//! variable do not decide anything: they emit a constraint into the active
//! store instead. Each materialization event owns one store frame; the
//! frame is drained into the unification engine exactly once and then
//! discarded. Constraints are never merged or reused across call sites.

use crate::types::Ty;
use spinel_mem::Symbol;

/// Side relation of a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// `lhs` must be a subtype of `rhs`.
    Subtype,
    /// `lhs` must be a supertype of `rhs`.
    Supertype,
}

/// One collected constraint. Either side may be a variable or a concrete
/// type.
#[derive(Debug, Clone)]
pub struct Constraint {
    /// Left-hand side.
    pub lhs: Ty,
    /// Relation between the sides.
    pub relation: Relation,
    /// Right-hand side.
    pub rhs: Ty,
}

/// Stack of per-materialization constraint frames.
///
/// The base frame always exists; comparisons that happen outside any
/// materialization emit into it and the emissions are simply never solved.
#[derive(Debug, Default)]
pub struct ConstraintStore {
    frames: Vec<Vec<Constraint>>,
}

impl ConstraintStore {
    /// Creates a store with the base frame.
    #[must_use]
    pub fn new() -> Self {
        Self {
            frames: vec![Vec::new()],
        }
    }

    /// Opens a frame for one materialization event.
    pub fn push_frame(&mut self) {
        self.frames.push(Vec::new());
    }

    /// Closes the innermost frame, returning its constraints for one solve.
    pub fn pop_frame(&mut self) -> Vec<Constraint> {
        if self.frames.len() > 1 {
            self.frames.pop().unwrap_or_default()
        } else {
            // Never pop the base frame; drain it instead.
            std::mem::take(&mut self.frames[0])
        }
    }

    /// Emits a constraint into the innermost frame.
    pub fn emit(&mut self, lhs: Ty, relation: Relation, rhs: Ty) {
        if let Some(frame) = self.frames.last_mut() {
            frame.push(Constraint { lhs, relation, rhs });
        }
    }

    /// Nesting depth, counting the base frame.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

/// A capability recorded against an existential self type: a message the
/// eventual including class must answer, with the argument types observed
/// at the recording site. Verified at inclusion time.
#[derive(Debug, Clone)]
pub struct Capability {
    /// Required message name.
    pub message: Symbol,
    /// Argument types observed at the call site.
    pub args: Vec<Ty>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use spinel_mem::names;

    #[test]
    fn test_frames_isolate_materializations() {
        let mut store = ConstraintStore::new();
        store.emit(Ty::Dynamic, Relation::Subtype, Ty::Unit);

        store.push_frame();
        store.emit(
            Ty::Object(names::INTEGER),
            Relation::Subtype,
            Ty::Object(names::NUMERIC),
        );
        let inner = store.pop_frame();
        assert_eq!(inner.len(), 1);

        // The base frame still holds its own emission.
        let base = store.pop_frame();
        assert_eq!(base.len(), 1);
        assert_eq!(store.depth(), 1);
    }

    #[test]
    fn test_pop_never_drops_base_frame() {
        let mut store = ConstraintStore::new();
        let _ = store.pop_frame();
        store.emit(Ty::Unit, Relation::Supertype, Ty::Unit);
        assert_eq!(store.depth(), 1);
        assert_eq!(store.pop_frame().len(), 1);
    }
}
