//! Function application checking.
//!
//! Positional matching of actual arguments against a signature's formal
//! parameter list, with the block matched out of band. The block comparison
//! is function subtyping (parameters contravariant, return and nested block
//! covariant), refined by the two control-escape cases: a stack-jump body
//! return checks its payload against the call's declared return type, and
//! an alternative-set body return checks its least upper bound.

use crate::check::Checker;
use crate::context::Signature;
use crate::error::{Result, TypeError};
use crate::types::{Direction, FunctionType, Ty};
use spinel_mem::Symbol;
use spinel_syntax::{Param, ParamKind, Span, Spanned, Term};

impl Checker<'_> {
    /// Checks an application of `signature` to the call's arguments and
    /// block, yielding the declared result type.
    pub(crate) fn check_application(
        &mut self,
        signature: &Signature,
        args: &[Term],
        block: Option<&Term>,
        message: Symbol,
        span: Span,
    ) -> Result<Ty> {
        let mut index = 0usize;

        for param in &signature.params {
            match param.kind {
                ParamKind::Block => {
                    // Matched out of band below, never positionally.
                }

                ParamKind::Required => {
                    let Some(actual) = args.get(index) else {
                        return Err(TypeError::MissingArgument {
                            name: self.render_sym(param.name),
                            message: self.render_sym(message),
                            span,
                        });
                    };
                    self.check_positional(param.ty.as_ref(), param.name, actual, message)?;
                    index += 1;
                }

                ParamKind::Optional => {
                    if let Some(actual) = args.get(index) {
                        self.check_positional(param.ty.as_ref(), param.name, actual, message)?;
                        index += 1;
                    }
                }

                ParamKind::Rest => {
                    if args.get(index).is_none() {
                        break;
                    }
                    let elem = self.rest_element_type(param.ty.as_ref());
                    for actual in &args[index..] {
                        let actual_ty = self.check(actual)?;
                        if !self.compatible(&actual_ty, &elem, Direction::Sub, actual.span())? {
                            return Err(TypeError::Mismatch {
                                expected: self.render(&elem),
                                found: self.render(&actual_ty),
                                context: self.render_sym(message),
                                span: actual.span(),
                            });
                        }
                    }
                    index = args.len();
                    break;
                }
            }
        }

        if args.len() > index {
            return Err(TypeError::ArityMismatch {
                message: self.render_sym(message),
                expected: index,
                found: args.len(),
                span,
            });
        }

        self.check_block_slot(signature, block, message, span)?;

        Ok(self.vars.resolve(&signature.ret))
    }

    fn check_positional(
        &mut self,
        declared: Option<&Ty>,
        name: Symbol,
        actual: &Term,
        message: Symbol,
    ) -> Result<()> {
        let Some(declared) = declared.cloned() else {
            // A matched formal with no declared type is its own failure
            // mode, distinct from a missing argument.
            return Err(TypeError::MissingTypeInformation {
                name: self.render_sym(name),
                message: self.render_sym(message),
                span: actual.span(),
            });
        };
        let actual_ty = self.check(actual)?;
        if !self.compatible(&actual_ty, &declared, Direction::Sub, actual.span())? {
            return Err(TypeError::Mismatch {
                expected: self.render(&declared),
                found: self.render(&actual_ty),
                context: self.render_sym(message),
                span: actual.span(),
            });
        }
        Ok(())
    }

    /// The element type a rest parameter checks each remaining actual
    /// against. A variable element is unwrapped to its declared bound.
    fn rest_element_type(&self, declared: Option<&Ty>) -> Ty {
        let elem = match declared {
            Some(Ty::Generic { name, args })
                if *name == spinel_mem::names::ARRAY && !args.is_empty() =>
            {
                args[0].clone()
            }
            Some(other) => other.clone(),
            None => Ty::Dynamic,
        };
        match elem {
            Ty::Var(id) => self
                .vars
                .get(id)
                .bound
                .clone()
                .unwrap_or(Ty::Var(id)),
            other => other,
        }
    }

    /// Out-of-band block matching.
    fn check_block_slot(
        &mut self,
        signature: &Signature,
        block: Option<&Term>,
        message: Symbol,
        span: Span,
    ) -> Result<()> {
        match (&signature.block, block) {
            (None, None) | (Some(_), None) => Ok(()),

            (None, Some(term)) => {
                // Undeclared block: check it for internal consistency only.
                let _ = self.check_block_argument(term, None)?;
                Ok(())
            }

            (Some(declared), Some(term)) => {
                let declared = declared.clone();
                let actual = self.check_block_argument(term, Some(&declared))?;

                // A jump-tagged body return is not compared covariantly
                // against the declared block return; it checks against the
                // call's own declared return type below.
                let body_ret = self.vars.resolve(&actual.ret);
                let escaped = matches!(
                    body_ret,
                    Ty::StackJump { .. } | Ty::Either { .. }
                );
                let compared_fn = if escaped {
                    FunctionType {
                        params: actual.params.clone(),
                        ret: declared.ret.clone(),
                        block: actual.block.clone(),
                    }
                } else {
                    actual.clone()
                };

                // Comparison against the declared block type may emit
                // constraints on the block's inferred parameter variables;
                // solve them as one materialization.
                self.constraints.push_frame();
                let compared = self.compatible(
                    &Ty::Function(compared_fn),
                    &Ty::Function(declared.clone()),
                    Direction::Sub,
                    term.span(),
                );
                let frame = self.constraints.pop_frame();
                let ok = compared?;
                let bindings =
                    crate::infer::Unifier::new(self).run(frame, term.span())?;
                for (id, ty) in bindings {
                    if !self.vars.is_bound(id) {
                        self.vars.bind(id, ty);
                    }
                }
                if !ok {
                    return Err(TypeError::Mismatch {
                        expected: self.render(&Ty::Function(declared)),
                        found: self.render(&Ty::Function(actual)),
                        context: self.render_sym(message),
                        span: term.span(),
                    });
                }

                // Control escapes surfacing through the block body check
                // against the call's own declared return type, naming both
                // types on failure.
                match &body_ret {
                    Ty::StackJump { payload, .. } => {
                        let payload = (**payload).clone();
                        if !self.compatible(&payload, &signature.ret, Direction::Sub, span)? {
                            return Err(TypeError::Mismatch {
                                expected: self.render(&signature.ret),
                                found: self.render(&payload),
                                context: "break".to_string(),
                                span,
                            });
                        }
                    }
                    Ty::Either { .. } => {
                        let max = self.either_max(&body_ret);
                        if !self.compatible(&max, &signature.ret, Direction::Sub, span)? {
                            return Err(TypeError::Mismatch {
                                expected: self.render(&signature.ret),
                                found: self.render(&max),
                                context: "block result".to_string(),
                                span,
                            });
                        }
                    }
                    _ => {}
                }

                Ok(())
            }
        }
    }

    /// The type of an actual block argument: a literal checks as a lambda
    /// against the expected block type; a block-pass expression must
    /// already be a function.
    pub(crate) fn check_block_argument(
        &mut self,
        term: &Term,
        expected: Option<&FunctionType>,
    ) -> Result<FunctionType> {
        match term {
            Term::Lambda { params, body, .. } => self.check_lambda(params, body, expected),

            other => {
                let ty = self.check(other)?;
                match self.vars.resolve(&ty) {
                    Ty::Function(f) => Ok(f),
                    Ty::Dynamic => Ok(FunctionType::new(
                        expected.map(|e| e.params.clone()).unwrap_or_default(),
                        Ty::Dynamic,
                    )),
                    found => Err(TypeError::Mismatch {
                        expected: "block".to_string(),
                        found: self.render(&found),
                        context: "block argument".to_string(),
                        span: other.span(),
                    }),
                }
            }
        }
    }

    /// Checks a lambda/block literal. Parameter types come from explicit
    /// annotations, from the expected block position, or default to fresh
    /// variables.
    pub(crate) fn check_lambda(
        &mut self,
        params: &[Param],
        body: &Term,
        expected: Option<&FunctionType>,
    ) -> Result<FunctionType> {
        self.env.push(crate::context::ScopeKind::Block);

        let mut param_types = Vec::with_capacity(params.len());
        let result = (|| {
            for (i, param) in params.iter().enumerate() {
                let ty = match param.annotation {
                    Some(name) => self.resolve_type_name(name, body.span())?,
                    None => match expected.and_then(|e| e.params.get(i)) {
                        Some(declared) => declared.clone(),
                        None => Ty::Var(self.vars.fresh(
                            param.name,
                            crate::infer::DeclLevel::Method,
                            None,
                        )),
                    },
                };
                self.env.bind(param.name, ty.clone());
                param_types.push(ty);
            }
            self.check(body)
        })();

        self.env.pop();
        let body_ty = result?;

        Ok(FunctionType::new(param_types, body_ty))
    }

    /// Direct lambda application: `f.call(args)`, `f[args]`, and `yield`.
    /// Arguments validate against the function's own parameter types; no
    /// registry lookup is involved.
    pub(crate) fn check_lambda_application(
        &mut self,
        function: &FunctionType,
        args: &[Term],
        span: Span,
    ) -> Result<Ty> {
        if args.len() > function.params.len() {
            return Err(TypeError::ArityMismatch {
                message: "call".to_string(),
                expected: function.params.len(),
                found: args.len(),
                span,
            });
        }

        for (i, declared) in function.params.iter().enumerate() {
            let Some(actual) = args.get(i) else {
                return Err(TypeError::MissingArgument {
                    name: format!("argument {i}"),
                    message: "call".to_string(),
                    span,
                });
            };
            let declared = declared.clone();
            let actual_ty = self.check(actual)?;
            if !self.compatible(&actual_ty, &declared, Direction::Sub, actual.span())? {
                return Err(TypeError::Mismatch {
                    expected: self.render(&declared),
                    found: self.render(&actual_ty),
                    context: "call".to_string(),
                    span: actual.span(),
                });
            }
        }

        Ok(self.vars.resolve(&function.ret))
    }

    /// Resolves a simple nominal annotation: a declared generic
    /// placeholder, a class, a generic class (raw), or a module.
    pub(crate) fn resolve_type_name(&mut self, name: Symbol, span: Span) -> Result<Ty> {
        if let Some(id) = self.env.find_type_var(name) {
            return Ok(Ty::Var(id));
        }
        if let Some(descriptor) = self.registry.generic(name) {
            let slots = descriptor.params.len();
            return Ok(Ty::Generic {
                name,
                args: vec![Ty::Dynamic; slots],
            });
        }
        if self.registry.lookup_class(name).is_some() {
            return Ok(Ty::Object(name));
        }
        if self.registry.is_module(name) {
            return Ok(Ty::Existential { name });
        }
        Err(TypeError::UnresolvedConstant {
            name: self.render_sym(name),
            span,
        })
    }
}
