//! Type pretty-printing for error messages.
//!
//! Types store interned symbols, so rendering needs the interner. The
//! [`DisplayTy`] wrapper pairs a type with an interner and implements
//! `fmt::Display`.

use crate::types::Ty;
use spinel_mem::StringInterner;
use std::fmt;

/// A wrapper for displaying types with symbol resolution.
pub struct DisplayTy<'a> {
    ty: &'a Ty,
    interner: &'a StringInterner,
}

impl<'a> DisplayTy<'a> {
    /// Pairs a type with an interner for rendering.
    pub fn new(ty: &'a Ty, interner: &'a StringInterner) -> Self {
        Self { ty, interner }
    }

    fn name(&self, sym: spinel_mem::Symbol) -> &str {
        self.interner.resolve(sym).unwrap_or("?")
    }

    fn format_type(&self, ty: &Ty, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match ty {
            Ty::Dynamic => write!(f, "dynamic"),

            Ty::Unit => write!(f, "unit"),

            Ty::Object(name) => write!(f, "{}", self.name(*name)),

            Ty::Singleton(name) => write!(f, "Class[{}]", self.name(*name)),

            Ty::Generic { name, args } => {
                write!(f, "{}[", self.name(*name))?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    self.format_type(arg, f)?;
                }
                write!(f, "]")
            }

            Ty::GenericSingleton { name, vars, .. } => {
                write!(f, "Class[{}[", self.name(*name))?;
                for (i, var) in vars.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{var}")?;
                }
                write!(f, "]]")
            }

            Ty::Function(fun) => self.format_function(fun, f),

            Ty::Var(id) => write!(f, "{id}"),

            Ty::Existential { name } => write!(f, "module {}", self.name(*name)),

            Ty::Either { normal, ret, brk } => {
                write!(f, "either[")?;
                let mut first = true;
                for (label, slot) in
                    [("normal", normal), ("return", ret), ("break", brk)]
                {
                    if let Some(t) = slot {
                        if !first {
                            write!(f, ", ")?;
                        }
                        first = false;
                        write!(f, "{label}: ")?;
                        self.format_type(t, f)?;
                    }
                }
                write!(f, "]")
            }

            Ty::StackJump { kind, payload } => {
                let label = match kind {
                    crate::types::JumpKind::Return => "return",
                    crate::types::JumpKind::Break => "break",
                    crate::types::JumpKind::Next => "next",
                };
                write!(f, "{label}[")?;
                self.format_type(payload, f)?;
                write!(f, "]")
            }
        }
    }

    fn format_function(
        &self,
        fun: &crate::types::FunctionType,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "(")?;
        for (i, param) in fun.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            self.format_type(param, f)?;
        }
        write!(f, ")")?;
        if let Some(block) = &fun.block {
            write!(f, " &")?;
            self.format_function(block, f)?;
        }
        write!(f, " -> ")?;
        self.format_type(&fun.ret, f)
    }
}

impl fmt::Display for DisplayTy<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.format_type(self.ty, f)
    }
}

impl Ty {
    /// Creates a display wrapper for this type.
    pub fn display<'a>(&'a self, interner: &'a StringInterner) -> DisplayTy<'a> {
        DisplayTy::new(self, interner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FunctionType, JumpKind};
    use spinel_mem::names;

    #[test]
    fn test_display_nominal() {
        let interner = StringInterner::new();
        assert_eq!(
            format!("{}", Ty::Object(names::INTEGER).display(&interner)),
            "Integer"
        );
        assert_eq!(
            format!("{}", Ty::Singleton(names::INTEGER).display(&interner)),
            "Class[Integer]"
        );
        assert_eq!(format!("{}", Ty::Unit.display(&interner)), "unit");
        assert_eq!(format!("{}", Ty::Dynamic.display(&interner)), "dynamic");
    }

    #[test]
    fn test_display_generic() {
        let interner = StringInterner::new();
        let ty = Ty::Generic {
            name: names::ARRAY,
            args: vec![Ty::Object(names::STRING)],
        };
        assert_eq!(format!("{}", ty.display(&interner)), "Array[String]");
    }

    #[test]
    fn test_display_function_with_block() {
        let interner = StringInterner::new();
        let block = FunctionType::new(
            vec![Ty::Object(names::INTEGER)],
            Ty::Object(names::INTEGER),
        );
        let fun = FunctionType::new(
            vec![Ty::Object(names::INTEGER)],
            Ty::Object(names::INTEGER),
        )
        .with_block(block);
        assert_eq!(
            format!("{}", Ty::Function(fun).display(&interner)),
            "(Integer) &(Integer) -> Integer -> Integer"
        );
    }

    #[test]
    fn test_display_jump() {
        let interner = StringInterner::new();
        let ty = Ty::jump(JumpKind::Break, Ty::Object(names::STRING));
        assert_eq!(format!("{}", ty.display(&interner)), "break[String]");
    }
}
