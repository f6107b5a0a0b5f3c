//! Shared fixtures for the end-to-end checking tests.
//!
//! Tests build a fresh registry and hand-construct term trees; the
//! annotation parser and term builder that would normally do this are
//! external to the checker.

#![allow(dead_code)]

use spinel_mem::{StringInterner, Symbol};
use spinel_syntax::{Param, ParamKind, Span, Term};
use spinel_typecheck::{Result, SignatureRegistry, Ty, VarStore, check_program};

/// A registry/interner/variable-store triple for one test program.
pub struct Fixture {
    pub interner: StringInterner,
    pub vars: VarStore,
    pub registry: SignatureRegistry,
}

impl Fixture {
    pub fn new() -> Self {
        let interner = StringInterner::new();
        let mut vars = VarStore::new();
        let registry = SignatureRegistry::with_core_types(&mut vars);
        Self {
            interner,
            vars,
            registry,
        }
    }

    pub fn sym(&mut self, name: &str) -> Symbol {
        self.interner.intern(name)
    }

    /// Checks a whole program under a fresh top-level context.
    pub fn check(self, program: &Term) -> Result<Ty> {
        check_program(program, &self.registry, &self.interner, self.vars)
    }
}

pub fn sp() -> Span {
    Span::new(0, 1, 1, 1)
}

pub fn int(value: i64) -> Term {
    Term::Int { value, span: sp() }
}

pub fn str_lit(value: &str) -> Term {
    Term::Str {
        value: value.to_string(),
        span: sp(),
    }
}

pub fn cnst(name: Symbol) -> Term {
    Term::Const { name, span: sp() }
}

pub fn lvar(name: Symbol) -> Term {
    Term::LocalVar { name, span: sp() }
}

pub fn asgn(name: Symbol, value: Term) -> Term {
    Term::LocalAsgn {
        name,
        value: Box::new(value),
        span: sp(),
    }
}

pub fn seq(terms: Vec<Term>) -> Term {
    Term::Seq {
        terms,
        span: sp(),
    }
}

pub fn send(receiver: Option<Term>, message: Symbol, args: Vec<Term>) -> Term {
    Term::Send {
        receiver: receiver.map(Box::new),
        message,
        args,
        block: None,
        span: sp(),
    }
}

pub fn send_block(
    receiver: Option<Term>,
    message: Symbol,
    args: Vec<Term>,
    block: Term,
) -> Term {
    Term::Send {
        receiver: receiver.map(Box::new),
        message,
        args,
        block: Some(Box::new(block)),
        span: sp(),
    }
}

pub fn lambda(params: Vec<Param>, body: Term) -> Term {
    Term::Lambda {
        params,
        body: Box::new(body),
        span: sp(),
    }
}

pub fn req(name: Symbol) -> Param {
    Param::required(name)
}

pub fn req_annotated(name: Symbol, annotation: Symbol) -> Param {
    Param {
        kind: ParamKind::Required,
        name,
        annotation: Some(annotation),
    }
}

pub fn block_param(name: Symbol) -> Param {
    Param {
        kind: ParamKind::Block,
        name,
        annotation: None,
    }
}

pub fn method_def(name: Symbol, params: Vec<Param>, body: Term) -> Term {
    Term::MethodDef {
        name,
        params,
        body: Box::new(body),
        singleton: false,
        span: sp(),
    }
}

pub fn class_decl(name: Symbol, body: Option<Term>) -> Term {
    Term::ClassDecl {
        name,
        superclass: None,
        body: body.map(Box::new),
        span: sp(),
    }
}

pub fn module_decl(name: Symbol, body: Option<Term>) -> Term {
    Term::ModuleDecl {
        name,
        body: body.map(Box::new),
        span: sp(),
    }
}
