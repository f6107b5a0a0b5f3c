//! Message-send checking.
//!
//! The dispatch ladder, first match wins:
//!
//! 1. Annotation markers are no-ops (handled in the term checker).
//! 2. `new` on a (generic) metatype checks the instance-side initializer
//!    and returns the instance type; an initializer found only on an
//!    ancestor means "no user constructor, nothing to check".
//! 3. Receiverless `yield` routes to the enclosing block type.
//! 4. Receiverless sends resolve the receiver to `self`.
//! 5. Explicit receivers: an unresolved variable records a capability
//!    constraint; a generic metatype receiving `call` applies type
//!    arguments; a function receiving `call`/`[]` is lambda application;
//!    everything else is a registry lookup, with the dynamic, `cast`,
//!    `include`, and method-generic cases peeled off before ordinary
//!    function application.

use crate::check::Checker;
use crate::error::{Result, TypeError};
use crate::infer::Capability;
use crate::types::Ty;
use spinel_mem::{Symbol, names};
use spinel_syntax::{Span, Spanned, Term};

impl Checker<'_> {
    /// Checks one message send.
    pub(crate) fn check_send(
        &mut self,
        receiver: Option<&Term>,
        message: Symbol,
        args: &[Term],
        block: Option<&Term>,
        span: Span,
    ) -> Result<Ty> {
        spinel_log::debug!(
            "type checking message send '{}' at {}",
            self.render_sym(message),
            span
        );

        // Constructor calls against a metatype check the initializer.
        if message == names::NEW {
            let receiver_ty = match receiver {
                Some(term) => self.check(term)?,
                None => self.env.self_type(),
            };
            let resolved = self.vars.resolve(&receiver_ty);
            if resolved.is_metatype() {
                return self.check_instantiation(&resolved, args, block, span);
            }
            return self.dispatch_lookup(&resolved, message, args, block, span);
        }

        // Implicit block invocation.
        if receiver.is_none() && message == names::YIELD {
            return self.check_yield(args, span);
        }

        let receiver_ty = match receiver {
            Some(term) => self.check(term)?,
            None => self.env.self_type(),
        };
        let resolved = self.vars.resolve(&receiver_ty);

        match resolved {
            // An unresolved variable receiver (the existential self inside
            // a module body): the send cannot be checked here. Record the
            // capability for inclusion-time verification.
            Ty::Var(id) => {
                let mut arg_types = Vec::with_capacity(args.len());
                for arg in args {
                    arg_types.push(self.check(arg)?);
                }
                self.var_capabilities
                    .entry(id)
                    .or_default()
                    .push(Capability {
                        message,
                        args: arg_types,
                    });
                Ok(Ty::Dynamic)
            }

            // Applying type arguments to a generic metatype.
            Ty::GenericSingleton { name, .. } if message == names::CALL => {
                let mut type_args = Vec::with_capacity(args.len());
                for arg in args {
                    type_args.push(self.parse_type_argument(arg)?);
                }
                self.materialize_generic(name, &type_args, span)
            }

            // Invoking a function value.
            Ty::Function(f)
                if message == names::CALL || message == names::INDEX =>
            {
                self.check_lambda_application(&f, args, span)
            }

            // A dynamic receiver escapes all checking.
            Ty::Dynamic => {
                for arg in args {
                    self.check(arg)?;
                }
                Ok(Ty::Dynamic)
            }

            other => self.dispatch_lookup(&other, message, args, block, span),
        }
    }

    /// `yield` routes through the enclosing block type; its absence is
    /// fatal.
    fn check_yield(&mut self, args: &[Term], span: Span) -> Result<Ty> {
        let Some(yield_ty) = self.env.yield_type() else {
            return Err(TypeError::MissingBlockContext { span });
        };
        match self.vars.resolve(&yield_ty) {
            Ty::Function(f) => self.check_lambda_application(&f, args, span),
            Ty::Dynamic => {
                for arg in args {
                    self.check(arg)?;
                }
                Ok(Ty::Dynamic)
            }
            other => Err(TypeError::Mismatch {
                expected: "block".to_string(),
                found: self.render(&other),
                context: "yield".to_string(),
                span,
            }),
        }
    }

    /// Constructor call: look the *instance*-side initializer up, apply it,
    /// return the instance type regardless of the initializer's declared
    /// result.
    fn check_instantiation(
        &mut self,
        receiver: &Ty,
        args: &[Term],
        block: Option<&Term>,
        span: Span,
    ) -> Result<Ty> {
        let instance = self.instance_of(receiver);
        let Some(nominal) = instance.nominal() else {
            return Err(TypeError::UnresolvedMessage {
                receiver: self.render(receiver),
                message: "new".to_string(),
                span,
            });
        };

        let Some((found_owner, signature)) =
            self.registry.find(nominal, names::INITIALIZE, false, args.len())
        else {
            return Err(TypeError::UnresolvedMessage {
                receiver: self.render(&instance),
                message: "initialize".to_string(),
                span,
            });
        };

        if signature.dynamic {
            spinel_log::warn!(
                "dynamic initializer for {}, skipping constructor checks",
                self.render(&instance)
            );
            return Ok(instance);
        }

        let signature = signature.clone();
        let concrete = self.concretize_for_receiver(&instance, found_owner, &signature);
        let applied = if concrete.generic() {
            self.materialize_method(&concrete, args, block, names::INITIALIZE, span)
                .map(|_| ())
        } else {
            self.check_application(&concrete, args, block, names::INITIALIZE, span)
                .map(|_| ())
        };

        match applied {
            Ok(()) => {}
            Err(error) => {
                // An initializer inherited from an ancestor is not a user
                // constructor on this type: swallow the failure. The exact
                // owner-identity comparison is deliberate.
                if found_owner == nominal {
                    return Err(error);
                }
                spinel_log::debug!(
                    "ignoring inherited constructor failure on {}: {}",
                    self.render(&instance),
                    error
                );
            }
        }

        Ok(instance)
    }

    /// Ordinary lookup-and-apply dispatch for a resolved receiver.
    fn dispatch_lookup(
        &mut self,
        receiver: &Ty,
        message: Symbol,
        args: &[Term],
        block: Option<&Term>,
        span: Span,
    ) -> Result<Ty> {
        let (owner, singleton) = self.receiver_key(receiver, message, span)?;

        let Some((found_owner, signature)) =
            self.registry.find(owner, message, singleton, args.len())
        else {
            return Err(TypeError::UnresolvedMessage {
                receiver: self.render(receiver),
                message: self.render_sym(message),
                span,
            });
        };

        // An escape signature is applied without any argument checking and
        // yields exactly its declared result.
        if signature.dynamic {
            spinel_log::warn!(
                "message '{}' on {} resolved to a dynamic signature",
                self.render_sym(message),
                self.render(receiver)
            );
            return Ok(signature.ret.clone());
        }

        // The cast pseudo-operation on the universal base type bypasses
        // checking entirely.
        if found_owner == names::BASIC_OBJECT && message == names::CAST {
            return self.check_casting(args, span);
        }

        // Module inclusion verifies recorded capability tables.
        if found_owner == names::MODULE && message == names::INCLUDE {
            return self.check_module_inclusions(receiver, args, span);
        }

        let signature = signature.clone();
        let concrete = self.concretize_for_receiver(receiver, found_owner, &signature);

        if concrete.generic() {
            self.materialize_method(&concrete, args, block, message, span)
        } else {
            self.check_application(&concrete, args, block, message, span)
        }
    }

    /// Maps a receiver type onto its lookup key: nominal owner plus side.
    fn receiver_key(
        &mut self,
        receiver: &Ty,
        message: Symbol,
        span: Span,
    ) -> Result<(Symbol, bool)> {
        match receiver {
            Ty::Singleton(name) | Ty::GenericSingleton { name, .. } => Ok((*name, true)),
            Ty::Either { .. } | Ty::StackJump { .. } => {
                let max = self.either_max(receiver);
                self.receiver_key(&max, message, span)
            }
            other => match other.nominal() {
                Some(name) => Ok((name, false)),
                None => Err(TypeError::UnresolvedMessage {
                    receiver: self.render(receiver),
                    message: self.render_sym(message),
                    span,
                }),
            },
        }
    }

    /// Explicit escape: the result is the requested type, unchecked.
    fn check_casting(&mut self, args: &[Term], span: Span) -> Result<Ty> {
        let from = match args.first() {
            Some(value) => self.check(value)?,
            None => Ty::Dynamic,
        };
        let Some(target) = args.get(1) else {
            return Err(TypeError::MissingArgument {
                name: "type".to_string(),
                message: "cast".to_string(),
                span,
            });
        };
        let to = self.parse_type_argument(target)?;
        spinel_log::info!(
            "casting {} into {}",
            self.render(&from),
            self.render(&to)
        );
        Ok(to)
    }

    /// Module inclusion: every argument must be a module whose recorded
    /// capability table the receiver satisfies.
    fn check_module_inclusions(
        &mut self,
        receiver: &Ty,
        args: &[Term],
        span: Span,
    ) -> Result<Ty> {
        for arg in args {
            let ty = self.check(arg)?;
            match self.vars.resolve(&ty) {
                Ty::Existential { name } => {
                    match self.module_surfaces.get(&name).cloned() {
                        Some(capabilities) => {
                            self.check_inclusion(name, &capabilities, receiver, span)?;
                        }
                        None => {
                            spinel_log::debug!(
                                "not checking inclusion of module {}: no module information",
                                self.render_sym(name)
                            );
                        }
                    }
                }
                other => {
                    return Err(TypeError::NotAModule {
                        found: self.render(&other),
                        span: arg.span(),
                    });
                }
            }
        }
        Ok(receiver.clone())
    }

    /// Verifies one module's capability table against the including type.
    fn check_inclusion(
        &mut self,
        module: Symbol,
        capabilities: &[Capability],
        receiver: &Ty,
        span: Span,
    ) -> Result<()> {
        let target = self.instance_of(receiver);
        let Some(nominal) = target.nominal() else {
            return Err(TypeError::NotAModule {
                found: self.render(receiver),
                span,
            });
        };

        for capability in capabilities {
            let found = self
                .registry
                .find(nominal, capability.message, false, capability.args.len());
            let Some((_, signature)) = found else {
                return Err(TypeError::UnmetCapability {
                    module: self.render_sym(module),
                    message: self.render_sym(capability.message),
                    owner: self.render(&target),
                    span,
                });
            };

            if signature.dynamic {
                continue;
            }

            // Observed argument types must fit the declared parameters.
            let declared: Vec<Ty> = signature
                .params
                .iter()
                .filter(|p| {
                    matches!(
                        p.kind,
                        spinel_syntax::ParamKind::Required | spinel_syntax::ParamKind::Optional
                    )
                })
                .map(|p| p.ty.clone().unwrap_or(Ty::Dynamic))
                .collect();
            for (observed, expected) in capability.args.iter().zip(&declared) {
                let fits = self
                    .compatible(observed, expected, crate::types::Direction::Sub, span)
                    .unwrap_or(false);
                if !fits {
                    return Err(TypeError::UnmetCapability {
                        module: self.render_sym(module),
                        message: self.render_sym(capability.message),
                        owner: self.render(&target),
                        span,
                    });
                }
            }
        }

        Ok(())
    }

    /// Parses one argument of a type-application or cast: a string literal
    /// resolves as a type name (declared placeholders first, then registry
    /// types); anything else is checked as an expression and taken at its
    /// instance type.
    pub(crate) fn parse_type_argument(&mut self, term: &Term) -> Result<Ty> {
        match term {
            Term::Str { value, span } => {
                let Some(sym) = self.interner.get(value) else {
                    return Err(TypeError::InvalidTypeLiteral {
                        text: value.clone(),
                        span: *span,
                    });
                };
                self.resolve_type_name(sym, *span).map_err(|_| {
                    TypeError::InvalidTypeLiteral {
                        text: value.clone(),
                        span: *span,
                    }
                })
            }
            other => {
                let ty = self.check(other)?;
                Ok(self.instance_of(&self.vars.resolve(&ty)))
            }
        }
    }
}
