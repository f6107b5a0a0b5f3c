//! Type checking errors.
//!
//! Every failure surfaced by the checker is one of the variants below,
//! carrying the span of the offending term node and the already-rendered
//! names of the types involved. The variants group into three kinds
//! (see [`ErrorKind`]): plain type-check failures, undecidable subtype
//! comparisons, and unification failures.

use spinel_syntax::Span;
use std::fmt;

/// The three failure families of the checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unresolved messages, arity problems, missing declarations, and the
    /// other plain check failures.
    TypeCheck,
    /// No decidable subtype relation where one was required.
    Uncomparable,
    /// Unification left a reachable variable unbound, or produced
    /// conflicting bounds.
    AmbiguousGeneric,
}

/// Type checking errors.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeError {
    /// No signature found for a message on the receiver type.
    UnresolvedMessage {
        /// Rendered receiver type.
        receiver: String,
        /// Message name.
        message: String,
        /// Source location.
        span: Span,
    },

    /// Wrong number of arguments for a lambda or block invocation.
    ArityMismatch {
        /// What was invoked.
        message: String,
        /// Declared parameter count.
        expected: usize,
        /// Supplied argument count.
        found: usize,
        /// Source location.
        span: Span,
    },

    /// Missing mandatory argument.
    MissingArgument {
        /// Formal parameter name.
        name: String,
        /// Message being checked.
        message: String,
        /// Source location.
        span: Span,
    },

    /// A matched formal parameter has no declared type.
    MissingTypeInformation {
        /// Formal parameter name.
        name: String,
        /// Message being checked.
        message: String,
        /// Source location.
        span: Span,
    },

    /// A decided type mismatch: the found type is not a subtype of the
    /// expected type.
    Mismatch {
        /// Rendered expected type.
        expected: String,
        /// Rendered found type.
        found: String,
        /// What was being checked (message name, `block`, `return`, ...).
        context: String,
        /// Source location.
        span: Span,
    },

    /// `yield` with no enclosing block type in the typing context.
    MissingBlockContext {
        /// Source location.
        span: Span,
    },

    /// `include` argument did not resolve to a module.
    NotAModule {
        /// Rendered argument type.
        found: String,
        /// Source location.
        span: Span,
    },

    /// A module's recorded capability is not satisfied by the including
    /// class.
    UnmetCapability {
        /// Module name.
        module: String,
        /// Required message.
        message: String,
        /// Rendered including type.
        owner: String,
        /// Source location.
        span: Span,
    },

    /// Unknown constant (class or module name).
    UnresolvedConstant {
        /// Constant name.
        name: String,
        /// Source location.
        span: Span,
    },

    /// Unknown local identifier.
    UnresolvedIdentifier {
        /// Identifier name.
        name: String,
        /// Source location.
        span: Span,
    },

    /// Type application on a name with no generic descriptor.
    UnknownGenericType {
        /// Type name.
        name: String,
        /// Source location.
        span: Span,
    },

    /// Wrong number of type arguments in a generic application.
    WrongTypeArgumentCount {
        /// Generic type name.
        name: String,
        /// Declared variable count.
        expected: usize,
        /// Supplied argument count.
        found: usize,
        /// Source location.
        span: Span,
    },

    /// A string argument in type position did not resolve to a declared
    /// placeholder or a registered type name.
    InvalidTypeLiteral {
        /// The literal text.
        text: String,
        /// Source location.
        span: Span,
    },

    /// No decidable subtype relation between two types.
    Uncomparable {
        /// Rendered left type.
        left: String,
        /// Rendered right type.
        right: String,
        /// Source location.
        span: Span,
    },

    /// Unification left a variable reachable from the signature unbound.
    AmbiguousGeneric {
        /// Variable name.
        variable: String,
        /// Source location.
        span: Span,
    },

    /// Unification collected bounds that admit no common type.
    ConflictingBounds {
        /// Variable name.
        variable: String,
        /// Rendered lower bound.
        lower: String,
        /// Rendered upper bound.
        upper: String,
        /// Source location.
        span: Span,
    },
}

impl TypeError {
    /// The span of the offending node.
    pub fn span(&self) -> Span {
        match self {
            TypeError::UnresolvedMessage { span, .. }
            | TypeError::ArityMismatch { span, .. }
            | TypeError::MissingArgument { span, .. }
            | TypeError::MissingTypeInformation { span, .. }
            | TypeError::Mismatch { span, .. }
            | TypeError::MissingBlockContext { span, .. }
            | TypeError::NotAModule { span, .. }
            | TypeError::UnmetCapability { span, .. }
            | TypeError::UnresolvedConstant { span, .. }
            | TypeError::UnresolvedIdentifier { span, .. }
            | TypeError::UnknownGenericType { span, .. }
            | TypeError::WrongTypeArgumentCount { span, .. }
            | TypeError::InvalidTypeLiteral { span, .. }
            | TypeError::Uncomparable { span, .. }
            | TypeError::AmbiguousGeneric { span, .. }
            | TypeError::ConflictingBounds { span, .. } => *span,
        }
    }

    /// The failure family of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TypeError::Uncomparable { .. } => ErrorKind::Uncomparable,
            TypeError::AmbiguousGeneric { .. } | TypeError::ConflictingBounds { .. } => {
                ErrorKind::AmbiguousGeneric
            }
            _ => ErrorKind::TypeCheck,
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeError::UnresolvedMessage {
                receiver, message, ..
            } => {
                write!(
                    f,
                    "type information for {receiver}:{message} not found"
                )
            }

            TypeError::ArityMismatch {
                message,
                expected,
                found,
                ..
            } => {
                write!(
                    f,
                    "wrong number of arguments for '{message}': expected {expected}, found {found}"
                )
            }

            TypeError::MissingArgument { name, message, .. } => {
                write!(f, "missing mandatory argument {name} in '{message}'")
            }

            TypeError::MissingTypeInformation { name, message, .. } => {
                write!(
                    f,
                    "missing type information for argument '{name}' in '{message}'"
                )
            }

            TypeError::Mismatch {
                expected,
                found,
                context,
                ..
            } => {
                write!(
                    f,
                    "checking '{context}': {expected} expected, {found} found"
                )
            }

            TypeError::MissingBlockContext { .. } => {
                write!(f, "cannot find yield block in the typing context")
            }

            TypeError::NotAModule { found, .. } => {
                write!(f, "module type expected for inclusion, {found} found")
            }

            TypeError::UnmetCapability {
                module,
                message,
                owner,
                ..
            } => {
                write!(
                    f,
                    "including {module}: {owner} does not provide '{message}'"
                )
            }

            TypeError::UnresolvedConstant { name, .. } => {
                write!(f, "unresolved constant: {name}")
            }

            TypeError::UnresolvedIdentifier { name, .. } => {
                write!(f, "unresolved identifier: {name}")
            }

            TypeError::UnknownGenericType { name, .. } => {
                write!(f, "missing generic type annotation for {name}")
            }

            TypeError::WrongTypeArgumentCount {
                name,
                expected,
                found,
                ..
            } => {
                write!(
                    f,
                    "wrong number of type arguments for {name}: expected {expected}, found {found}"
                )
            }

            TypeError::InvalidTypeLiteral { text, .. } => {
                write!(f, "cannot resolve type literal '{text}'")
            }

            TypeError::Uncomparable { left, right, .. } => {
                write!(f, "no subtype relation between {left} and {right}")
            }

            TypeError::AmbiguousGeneric { variable, .. } => {
                write!(f, "ambiguous generic: variable {variable} left unbound")
            }

            TypeError::ConflictingBounds {
                variable,
                lower,
                upper,
                ..
            } => {
                write!(
                    f,
                    "conflicting bounds for {variable}: {lower} is not within {upper}"
                )
            }
        }
    }
}

impl std::error::Error for TypeError {}

/// A result type for checking operations.
pub type Result<T> = std::result::Result<T, TypeError>;
