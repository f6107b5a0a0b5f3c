//! Recursive descent over the term tree.
//!
//! `check_term` maps every node of the vocabulary to a type: literals to
//! their nominal classes, control forms to joins over their branches with
//! jump tags folded into alternative sets, declarations to scope
//! management plus `unit`.

use crate::check::Checker;
use crate::context::{CurrentMethod, ScopeKind, Signature};
use crate::error::{Result, TypeError};
use crate::types::{Direction, JumpKind, Ty};
use spinel_mem::{Symbol, names};
use spinel_syntax::{ParamKind, RescueClause, Span, Spanned, Term, WhenClause};

impl Checker<'_> {
    pub(crate) fn check_term(&mut self, term: &Term) -> Result<Ty> {
        match term {
            // Annotation markers are no-ops.
            Term::Annotation { .. } => Ok(Ty::Unit),

            Term::Nil { .. } => Ok(Ty::Unit),
            Term::Boolean { .. } => Ok(Ty::Object(names::BOOLEAN)),
            Term::Int { .. } => Ok(Ty::Object(names::INTEGER)),
            Term::Float { .. } => Ok(Ty::Object(names::FLOAT)),
            Term::Str { .. } => Ok(Ty::Object(names::STRING)),
            Term::Sym { .. } => Ok(Ty::Object(names::SYMBOL)),
            Term::Regexp { .. } => Ok(Ty::Object(names::REGEXP)),

            Term::ArrayLit { elems, .. } => {
                let elem = self.join_all(elems)?;
                Ok(Ty::Generic {
                    name: names::ARRAY,
                    args: vec![elem],
                })
            }

            Term::HashLit { pairs, .. } => {
                let mut key: Option<Ty> = None;
                let mut value: Option<Ty> = None;
                for (k, v) in pairs {
                    let kt = self.check(k)?;
                    let vt = self.check(v)?;
                    key = Some(match key {
                        Some(current) => self.join(&current, &kt),
                        None => kt,
                    });
                    value = Some(match value {
                        Some(current) => self.join(&current, &vt),
                        None => vt,
                    });
                }
                Ok(Ty::Generic {
                    name: names::HASH,
                    args: vec![
                        key.unwrap_or(Ty::Dynamic),
                        value.unwrap_or(Ty::Dynamic),
                    ],
                })
            }

            Term::RangeLit { start, end, .. } => {
                let start_ty = self.check(start)?;
                let end_ty = self.check(end)?;
                let elem = self.join(&start_ty, &end_ty);
                Ok(Ty::Generic {
                    name: names::RANGE,
                    args: vec![elem],
                })
            }

            Term::SelfRef { .. } => Ok(self.env.self_type()),

            Term::Const { name, span } => self.check_const(*name, *span),

            Term::LocalVar { name, span } => match self.env.lookup(*name) {
                Some(ty) => Ok(ty.clone()),
                None => Err(TypeError::UnresolvedIdentifier {
                    name: self.render_sym(*name),
                    span: *span,
                }),
            },

            Term::LocalAsgn { name, value, .. } => {
                let ty = self.check(value)?;
                let stored = self.vars.resolve(&ty);
                self.env.bind(*name, stored.clone());
                Ok(stored)
            }

            Term::MassAsgn { names: targets, value, .. } => {
                let ty = self.check(value)?;
                let elem = match self.vars.resolve(&ty) {
                    Ty::Generic { name, args }
                        if name == names::ARRAY && !args.is_empty() =>
                    {
                        args[0].clone()
                    }
                    _ => Ty::Dynamic,
                };
                for target in targets {
                    self.env.bind(*target, elem.clone());
                }
                Ok(ty)
            }

            Term::InstanceVar { name, span } => {
                let owner = self.self_nominal();
                match owner.and_then(|o| self.registry.ivar_type(o, *name)) {
                    Some(ty) => Ok(ty.clone()),
                    None => {
                        spinel_log::warn!(
                            "no declared type for instance variable '{}' at {}",
                            self.render_sym(*name),
                            span
                        );
                        Ok(Ty::Dynamic)
                    }
                }
            }

            Term::InstanceAsgn { name, value, span } => {
                let ty = self.check(value)?;
                let owner = self.self_nominal();
                if let Some(declared) =
                    owner.and_then(|o| self.registry.ivar_type(o, *name)).cloned()
                {
                    if !self.compatible(&ty, &declared, Direction::Sub, *span)? {
                        return Err(TypeError::Mismatch {
                            expected: self.render(&declared),
                            found: self.render(&ty),
                            context: self.render_sym(*name),
                            span: *span,
                        });
                    }
                }
                Ok(ty)
            }

            Term::GlobalVar { name, span } => match self.registry.global(*name) {
                Some(ty) => Ok(ty.clone()),
                None => {
                    spinel_log::warn!(
                        "no declared type for global variable '{}' at {}",
                        self.render_sym(*name),
                        span
                    );
                    Ok(Ty::Dynamic)
                }
            },

            Term::GlobalAsgn { name, value, span } => {
                let ty = self.check(value)?;
                if let Some(declared) = self.registry.global(*name).cloned() {
                    if !self.compatible(&ty, &declared, Direction::Sub, *span)? {
                        return Err(TypeError::Mismatch {
                            expected: self.render(&declared),
                            found: self.render(&ty),
                            context: self.render_sym(*name),
                            span: *span,
                        });
                    }
                }
                Ok(ty)
            }

            Term::Seq { terms, .. } => {
                let mut last = Ty::Unit;
                for term in terms {
                    last = self.check(term)?;
                }
                Ok(last)
            }

            Term::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                self.check(cond)?;
                let then_ty = match then_branch {
                    Some(branch) => self.check(branch)?,
                    None => Ty::Unit,
                };
                let else_ty = match else_branch {
                    Some(branch) => self.check(branch)?,
                    None => Ty::Unit,
                };
                Ok(self.combine_branches(&then_ty, &else_ty))
            }

            Term::Case {
                scrutinee,
                clauses,
                default,
                ..
            } => self.check_case(scrutinee, clauses, default.as_deref()),

            Term::While { cond, body, .. } => {
                self.check(cond)?;
                if let Some(body) = body {
                    // Loops absorb break.
                    let _ = self.check(body)?;
                }
                Ok(Ty::Unit)
            }

            Term::For {
                binding,
                iterable,
                body,
                ..
            } => self.check_for(*binding, iterable, body),

            Term::Try { body, rescues, .. } => self.check_try(body, rescues),

            Term::Return { value, .. } => {
                let payload = match value {
                    Some(v) => self.check(v)?,
                    None => Ty::Unit,
                };
                Ok(Ty::jump(JumpKind::Return, payload))
            }

            Term::Break { value, .. } => {
                let payload = match value {
                    Some(v) => self.check(v)?,
                    None => Ty::Unit,
                };
                Ok(Ty::jump(JumpKind::Break, payload))
            }

            Term::Next { value, .. } => {
                let payload = match value {
                    Some(v) => self.check(v)?,
                    None => Ty::Unit,
                };
                Ok(Ty::jump(JumpKind::Next, payload))
            }

            Term::SuperCall { args, span } => self.check_super(args.as_deref(), *span),

            Term::BoolOp { left, right, .. } => {
                let lt = self.check(left)?;
                let rt = self.check(right)?;
                Ok(self.join(&lt, &rt))
            }

            Term::Send {
                receiver,
                message,
                args,
                block,
                span,
            } => self.check_send(
                receiver.as_deref(),
                *message,
                args,
                block.as_deref(),
                *span,
            ),

            Term::Lambda { params, body, .. } => {
                let function = self.check_lambda(params, body, None)?;
                Ok(Ty::Function(function))
            }

            Term::MethodDef {
                name,
                params,
                body,
                singleton,
                span,
            } => self.check_method_def(*name, params, body, *singleton, *span),

            Term::ClassDecl {
                name, body, span, ..
            } => self.check_class_decl(*name, body.as_deref(), *span),

            Term::ModuleDecl { name, body, .. } => {
                self.check_module_decl(*name, body.as_deref())
            }

            Term::SingletonClassDecl { body, .. } => {
                let self_ty = self.env.self_type();
                let target = match self.vars.resolve(&self_ty) {
                    Ty::Singleton(n) | Ty::GenericSingleton { name: n, .. } => {
                        Ty::Singleton(n)
                    }
                    Ty::Object(n) | Ty::Generic { name: n, .. } => Ty::Singleton(n),
                    other => other,
                };
                self.env.push(ScopeKind::Class);
                self.env.bind(names::SELF, target);
                self.env.set_singleton_ctx();
                let result = match body {
                    Some(body) => self.check(body).map(|_| ()),
                    None => Ok(()),
                };
                self.env.pop();
                result?;
                Ok(Ty::Unit)
            }
        }
    }

    fn join_all(&mut self, terms: &[Term]) -> Result<Ty> {
        let mut joined: Option<Ty> = None;
        for term in terms {
            let ty = self.check(term)?;
            joined = Some(match joined {
                Some(current) => self.join(&current, &ty),
                None => ty,
            });
        }
        Ok(joined.unwrap_or(Ty::Dynamic))
    }

    /// Merges two branch types. Jump-tagged branches fold into an
    /// alternative set; plain branches join at their least upper bound.
    pub(crate) fn combine_branches(&self, a: &Ty, b: &Ty) -> Ty {
        let (mut normal, mut ret, mut brk) = (None, None, None);
        for ty in [a, b] {
            self.fold_alternative(ty, &mut normal, &mut ret, &mut brk);
        }

        if ret.is_none() && brk.is_none() {
            return normal.unwrap_or(Ty::Unit);
        }
        Ty::Either {
            normal: normal.map(Box::new),
            ret: ret.map(Box::new),
            brk: brk.map(Box::new),
        }
    }

    fn fold_alternative(
        &self,
        ty: &Ty,
        normal: &mut Option<Ty>,
        ret: &mut Option<Ty>,
        brk: &mut Option<Ty>,
    ) {
        let merge = |slot: &mut Option<Ty>, ty: &Ty, checker: &Self| {
            *slot = Some(match slot.take() {
                Some(current) => checker.join(&current, ty),
                None => ty.clone(),
            });
        };
        match ty {
            Ty::StackJump {
                kind: JumpKind::Return,
                payload,
            } => merge(ret, payload, self),
            Ty::StackJump {
                kind: JumpKind::Break,
                payload,
            } => merge(brk, payload, self),
            Ty::StackJump {
                kind: JumpKind::Next,
                payload,
            } => merge(normal, payload, self),
            Ty::Either {
                normal: n,
                ret: r,
                brk: b,
            } => {
                if let Some(n) = n {
                    merge(normal, n, self);
                }
                if let Some(r) = r {
                    merge(ret, r, self);
                }
                if let Some(b) = b {
                    merge(brk, b, self);
                }
            }
            other => merge(normal, other, self),
        }
    }

    fn check_const(&mut self, name: Symbol, span: Span) -> Result<Ty> {
        if self.registry.generic(name).is_some() {
            let vars = self.minimal_context(name, span)?;
            let super_type = self
                .registry
                .generic(name)
                .and_then(|d| d.super_type.clone())
                .map(Box::new);
            return Ok(Ty::GenericSingleton {
                name,
                vars,
                super_type,
            });
        }
        if self.registry.lookup_class(name).is_some() {
            return Ok(Ty::Singleton(name));
        }
        if self.registry.is_module(name) {
            return Ok(Ty::Existential { name });
        }
        Err(TypeError::UnresolvedConstant {
            name: self.render_sym(name),
            span,
        })
    }

    fn check_case(
        &mut self,
        scrutinee: &Term,
        clauses: &[WhenClause],
        default: Option<&Term>,
    ) -> Result<Ty> {
        self.check(scrutinee)?;
        let mut result: Option<Ty> = None;
        for clause in clauses {
            for matcher in &clause.matches {
                self.check(matcher)?;
            }
            let body_ty = self.check(&clause.body)?;
            result = Some(match result {
                Some(current) => self.combine_branches(&current, &body_ty),
                None => body_ty,
            });
        }
        let default_ty = match default {
            Some(term) => self.check(term)?,
            None => Ty::Unit,
        };
        Ok(match result {
            Some(current) => self.combine_branches(&current, &default_ty),
            None => default_ty,
        })
    }

    /// For iteration: the element type comes from the iterable's applied
    /// argument or from the block of its `each` signature.
    fn check_for(&mut self, binding: Symbol, iterable: &Term, body: &Term) -> Result<Ty> {
        let iterable_ty = self.check(iterable)?;
        let resolved = self.vars.resolve(&iterable_ty);

        let elem = match &resolved {
            Ty::Generic { args, .. } if !args.is_empty() => args[0].clone(),
            other => match other
                .nominal()
                .and_then(|n| self.registry.find(n, names::EACH, false, 0))
            {
                Some((_, sig)) => sig
                    .block
                    .as_ref()
                    .and_then(|b| b.params.first().cloned())
                    .unwrap_or(Ty::Dynamic),
                None => {
                    spinel_log::debug!("iterating a receiver without 'each' information");
                    Ty::Dynamic
                }
            },
        };

        self.env.bind(binding, elem);
        let _ = self.check(body)?;
        Ok(resolved)
    }

    fn check_try(&mut self, body: &Term, rescues: &[RescueClause]) -> Result<Ty> {
        let mut result = self.check(body)?;
        for rescue in rescues {
            for exception in &rescue.exceptions {
                // Handler classes must at least resolve.
                self.check_const(*exception, body.span())?;
            }
            if let Some(handler) = &rescue.body {
                self.env.push(ScopeKind::Block);
                if let Some(name) = rescue.binding {
                    let ty = rescue
                        .exceptions
                        .first()
                        .map(|e| Ty::Object(*e))
                        .unwrap_or(Ty::Dynamic);
                    self.env.bind(name, ty);
                }
                let handler_ty = self.check(handler);
                self.env.pop();
                result = self.combine_branches(&result, &handler_ty?);
            }
        }
        Ok(result)
    }

    fn check_super(&mut self, args: Option<&[Term]>, span: Span) -> Result<Ty> {
        let Some(current) = self.env.current_method().cloned() else {
            return Err(TypeError::UnresolvedMessage {
                receiver: "self".to_string(),
                message: "super".to_string(),
                span,
            });
        };
        let Some(parent) = self
            .registry
            .lookup_class(current.owner)
            .and_then(|c| c.superclass)
        else {
            return Err(TypeError::UnresolvedMessage {
                receiver: self.render_sym(current.owner),
                message: "super".to_string(),
                span,
            });
        };

        let argc = args.map(<[Term]>::len).unwrap_or(0);
        let Some((_, signature)) =
            self.registry
                .find(parent, current.message, current.singleton, argc)
        else {
            return Err(TypeError::UnresolvedMessage {
                receiver: self.render_sym(parent),
                message: self.render_sym(current.message),
                span,
            });
        };

        if signature.dynamic {
            return Ok(signature.ret.clone());
        }
        let signature = signature.clone();
        match args {
            Some(args) => {
                self.check_application(&signature, args, None, current.message, span)
            }
            // The implicit-argument form forwards the current formals,
            // which already matched this signature shape.
            None => Ok(self.vars.resolve(&signature.ret)),
        }
    }

    fn check_method_def(
        &mut self,
        name: Symbol,
        params: &[spinel_syntax::Param],
        body: &Term,
        singleton: bool,
        span: Span,
    ) -> Result<Ty> {
        let self_ty = self.vars.resolve(&self.env.self_type());
        let (owner, instance_self) = match &self_ty {
            Ty::Singleton(n) => (*n, Ty::Object(*n)),
            Ty::GenericSingleton { name: n, vars, .. } => (
                *n,
                Ty::Generic {
                    name: *n,
                    args: vars.iter().map(|id| Ty::Var(*id)).collect(),
                },
            ),
            Ty::Object(n) | Ty::Generic { name: n, .. } => (*n, self_ty.clone()),
            // Module bodies: definitions belong to the module name, and
            // `self` stays existential so sends against it are recorded.
            Ty::Var(id) => (self.vars.get(*id).name, self_ty.clone()),
            Ty::Existential { name: n } => (*n, self_ty.clone()),
            _ => (names::OBJECT, Ty::Object(names::OBJECT)),
        };
        let singleton = singleton || self.env.in_singleton_ctx();

        let Some(signature) = self
            .registry
            .signature_for_definition(owner, name, singleton)
            .cloned()
        else {
            spinel_log::debug!(
                "no signature for {}#{}, checking permissively",
                self.render_sym(owner),
                self.render_sym(name)
            );
            self.env.push(ScopeKind::Method);
            let method_self = if singleton { self_ty.clone() } else { instance_self };
            self.env.bind(names::SELF, method_self);
            for param in params {
                self.env.bind(param.name, Ty::Dynamic);
            }
            self.env.bind(names::YIELD, Ty::Dynamic);
            let result = self.check(body);
            self.env.pop();
            result?;
            return Ok(Ty::Unit);
        };

        self.env.push(ScopeKind::Method);
        let method_self = if singleton { self_ty.clone() } else { instance_self };
        self.env.bind(names::SELF, method_self);
        self.env.set_current_method(CurrentMethod {
            owner,
            message: name,
            singleton,
        });

        // Method-level generic placeholders become referencable in the
        // body.
        for id in &signature.generic_vars {
            let var_name = self.vars.get(*id).name;
            self.env.register_type_var(var_name, *id);
        }

        self.bind_method_params(params, &signature);
        if let Some(block) = &signature.block {
            self.env.bind(names::YIELD, Ty::Function(block.clone()));
        }

        let result = self.check(body);
        self.env.pop();
        let body_ty = result?;

        self.check_declared_return(&body_ty, &signature, name, span)?;
        Ok(Ty::Unit)
    }

    fn bind_method_params(&mut self, params: &[spinel_syntax::Param], signature: &Signature) {
        let mut declared = signature.params.iter();
        for param in params {
            let info = declared.next();
            let ty = match (param.kind, info) {
                (ParamKind::Block, _) => signature
                    .block
                    .clone()
                    .map(Ty::Function)
                    .unwrap_or(Ty::Dynamic),
                (_, Some(info)) => info.ty.clone().unwrap_or(Ty::Dynamic),
                (_, None) => Ty::Dynamic,
            };
            self.env.bind(param.name, ty);
        }
    }

    /// The body type must fit the declared return type, unless the
    /// declaration says `unit` (a constructor-style signature whose body
    /// value is ignored).
    fn check_declared_return(
        &mut self,
        body_ty: &Ty,
        signature: &Signature,
        name: Symbol,
        span: Span,
    ) -> Result<()> {
        if signature.ret == Ty::Unit || signature.dynamic {
            return Ok(());
        }

        let mut check_one = |checker: &mut Self, ty: &Ty| -> Result<()> {
            if !checker.compatible(ty, &signature.ret, Direction::Sub, span)? {
                return Err(TypeError::Mismatch {
                    expected: checker.render(&signature.ret),
                    found: checker.render(ty),
                    context: checker.render_sym(name),
                    span,
                });
            }
            Ok(())
        };

        match self.vars.resolve(body_ty) {
            Ty::StackJump {
                kind: JumpKind::Return,
                payload,
            } => check_one(self, &payload),
            Ty::Either { normal, ret, .. } => {
                if let Some(normal) = normal {
                    check_one(self, &normal)?;
                }
                if let Some(ret) = ret {
                    check_one(self, &ret)?;
                }
                Ok(())
            }
            other => check_one(self, &other),
        }
    }

    fn check_class_decl(
        &mut self,
        name: Symbol,
        body: Option<&Term>,
        span: Span,
    ) -> Result<Ty> {
        self.env.push(ScopeKind::Class);

        let result = (|| {
            if self.registry.generic(name).is_some() {
                let vars = self.minimal_context(name, span)?;
                for id in &vars {
                    let var_name = self.vars.get(*id).name;
                    self.env.register_type_var(var_name, *id);
                }
                let super_type = self
                    .registry
                    .generic(name)
                    .and_then(|d| d.super_type.clone())
                    .map(Box::new);
                self.env.bind(
                    names::SELF,
                    Ty::GenericSingleton {
                        name,
                        vars,
                        super_type,
                    },
                );
            } else {
                self.env.bind(names::SELF, Ty::Singleton(name));
            }

            match body {
                Some(body) => self.check(body).map(|_| ()),
                None => Ok(()),
            }
        })();

        self.env.pop();
        result?;
        Ok(Ty::Unit)
    }

    /// Module bodies get an existential self: an unresolved variable whose
    /// message sends are recorded as the module's capability table.
    fn check_module_decl(&mut self, name: Symbol, body: Option<&Term>) -> Result<Ty> {
        self.env.push(ScopeKind::Module);
        let self_var = self
            .vars
            .fresh(name, crate::infer::DeclLevel::Module, None);
        self.env.bind(names::SELF, Ty::Var(self_var));

        let result = match body {
            Some(body) => self.check(body).map(|_| ()),
            None => Ok(()),
        };
        self.env.pop();

        let capabilities = self.var_capabilities.remove(&self_var).unwrap_or_default();
        spinel_log::debug!(
            "module {} recorded {} capabilities",
            self.render_sym(name),
            capabilities.len()
        );
        self.module_surfaces.insert(name, capabilities);

        result?;
        Ok(Ty::Unit)
    }

    fn self_nominal(&self) -> Option<Symbol> {
        match self.vars.resolve(&self.env.self_type()) {
            Ty::Singleton(n) | Ty::GenericSingleton { name: n, .. } => Some(n),
            other => other.nominal(),
        }
    }
}
