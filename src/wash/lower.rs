//! Bodies pass
//!
//! A [`Lowerer`] owns the IR body of one member while it is being built:
//! the instruction arena, the lexical scope and the labels of enclosing
//! loops. Statement, expression, resolution, conversion and closure
//! lowering are `impl Lowerer` blocks in the sibling modules.

use crate::ast::{Span, TypeRef};
use crate::common::repository::TypeRepository;
use crate::common::scope::{Binding, Scope, SelfRef};
use crate::common::types::{MethodId, PrimitiveKind, TypeId, TypeKind};
use crate::error::{Error, LineCol, Result};
use crate::ir::{Body, Callee, Constant, Ins, InsId, InvokeKind};

use super::enter::{BodyJob, InitPart, JobKind, StaticPart, UnitContext};
use super::Session;

/// Branch targets of an enclosing loop
#[derive(Debug, Clone, Copy)]
pub(crate) struct LoopLabels {
    pub cont: InsId,
    pub end: InsId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MemberKind {
    Method,
    Constructor,
    StaticInit,
}

pub struct Lowerer<'s, 'a> {
    pub(crate) session: &'s mut Session<'a>,
    pub(crate) unit: &'s UnitContext,
    pub(crate) owner: TypeId,
    pub(crate) body: Body,
    pub(crate) scope: Scope,
    pub(crate) loops: Vec<LoopLabels>,
    pub(crate) return_type: TypeId,
    pub(crate) member: MemberKind,
}

impl<'s, 'a> Lowerer<'s, 'a> {
    pub(crate) fn new(
        session: &'s mut Session<'a>,
        unit: &'s UnitContext,
        owner: TypeId,
        self_ref: SelfRef,
        return_type: TypeId,
        member: MemberKind,
    ) -> Self {
        Self {
            session,
            unit,
            owner,
            body: Body::new(),
            scope: Scope::new(owner, self_ref),
            loops: Vec::new(),
            return_type,
            member,
        }
    }

    pub(crate) fn finish(self) -> Body {
        self.body
    }

    pub(crate) fn pos(&self, span: Span) -> LineCol {
        self.unit.pos(span)
    }

    pub(crate) fn repo(&self) -> &TypeRepository {
        &*self.session.repo
    }

    pub(crate) fn repo_mut(&mut self) -> &mut TypeRepository {
        &mut *self.session.repo
    }

    /// Adds an instruction to the arena without placing it
    pub(crate) fn add(&mut self, ins: Ins, pos: &LineCol) -> InsId {
        self.body.add(ins, pos)
    }

    /// Adds an instruction and appends it to the statement list
    pub(crate) fn emit(&mut self, ins: Ins, pos: &LineCol) -> InsId {
        let id = self.body.add(ins, pos);
        self.body.code.push(id);
        id
    }

    pub(crate) fn place(&mut self, id: InsId) {
        self.body.code.push(id);
    }

    pub(crate) fn ty_of(&self, id: InsId) -> Result<TypeId> {
        self.body
            .type_of(id)
            .ok_or_else(|| Error::internal(format!("instruction #{} has no value", id.index())))
    }

    pub(crate) fn well_known(&mut self, name: &str) -> Result<TypeId> {
        self.session.repo.well_known(name)
    }

    pub(crate) fn resolve_type_ref(&mut self, t: &TypeRef) -> Result<TypeId> {
        let pos = self.pos(t.span);
        self.unit.imports.require_type(self.session.repo, &t.spelled(), &pos)
    }

    /// Type a written name denotes, if any
    pub(crate) fn type_named(&mut self, name: &str, pos: &LineCol) -> Result<Option<TypeId>> {
        self.unit.imports.resolve_type(self.session.repo, name, pos)
    }

    pub(crate) fn is_primitive(&self, ty: TypeId) -> bool {
        self.repo().get(ty).is_primitive()
    }

    pub(crate) fn primitive_of(&self, ty: TypeId) -> Option<PrimitiveKind> {
        self.repo().get(ty).primitive()
    }

    pub(crate) fn bind_local(&mut self, name: &str, ty: TypeId) -> Binding {
        let width = self.repo().get(ty).category().max(1);
        self.scope.bind(name, ty, width)
    }

    pub(crate) fn load(&mut self, binding: &Binding, pos: &LineCol) -> InsId {
        self.add(Ins::Load { slot: binding.slot, ty: binding.ty }, pos)
    }

    /// Binds a fresh temporary and returns it with the store of `value`
    pub(crate) fn store_temp(&mut self, value: InsId, pos: &LineCol) -> Result<(Binding, InsId)> {
        let ty = self.ty_of(value)?;
        let name = self.scope.fresh_temp();
        let binding = self.bind_local(&name, ty);
        let store = self.add(Ins::Store { slot: binding.slot, value, ty }, pos);
        Ok((binding, store))
    }

    pub(crate) fn constant(&mut self, value: Constant, ty: TypeId, pos: &LineCol) -> InsId {
        self.add(Ins::Const { value, ty }, pos)
    }

    pub(crate) fn string_constant(&mut self, value: &str, pos: &LineCol) -> Result<InsId> {
        let ty = self.well_known(crate::consts::STRING)?;
        Ok(self.constant(Constant::String(value.to_string()), ty, pos))
    }

    pub(crate) fn class_literal(&mut self, of: TypeId, pos: &LineCol) -> Result<InsId> {
        let ty = self.well_known(crate::consts::CLASS)?;
        Ok(self.add(Ins::ClassLiteral { of, ty }, pos))
    }

    pub(crate) fn pack(&mut self, items: Vec<InsId>, pos: &LineCol) -> InsId {
        self.add(Ins::Pack { items, auto_pop: true }, pos)
    }

    /// Reference to the current self value
    pub(crate) fn load_self(&mut self, pos: &LineCol) -> Result<InsId> {
        match self.scope.self_ref() {
            SelfRef::None => Err(Error::unexpected("`this` in a static context", pos)),
            SelfRef::This(ty) => Ok(self.add(Ins::This { ty }, pos)),
            SelfRef::Local { slot, ty } => Ok(self.add(Ins::Load { slot, ty }, pos)),
        }
    }

    /// The zero value of a type
    pub(crate) fn default_value(&mut self, ty: TypeId, pos: &LineCol) -> InsId {
        let value = match self.repo().get(ty).kind {
            TypeKind::Primitive(kind) => match kind {
                PrimitiveKind::Long => Constant::Long(0),
                PrimitiveKind::Float => Constant::Float(0.0),
                PrimitiveKind::Double => Constant::Double(0.0),
                _ => Constant::Int(0),
            },
            _ => return self.constant(Constant::Null, TypeId::NULL, pos),
        };
        self.constant(value, ty, pos)
    }

    /// Method `name` of a library class with the given parameter count
    pub(crate) fn library_method(&mut self, class: &str, name: &str, arity: usize) -> Result<MethodId> {
        let ty = self.well_known(class)?;
        let repo = self.repo();
        repo.methods_of(ty)
            .iter()
            .copied()
            .find(|id| {
                let m = repo.method(*id);
                m.name == name && m.params.len() == arity
            })
            .ok_or_else(|| Error::internal(format!("library method {}.{} is missing", class, name)))
    }

    /// Static method `name` of the runtime helper class
    pub(crate) fn runtime_method(&mut self, name: &str, arity: usize) -> Result<MethodId> {
        let class = self.session.config.runtime.runtime_class.clone();
        self.library_method(&class, name, arity)
    }

    /// Invocation of a library method with arguments already of the
    /// parameter types
    pub(crate) fn library_call(&mut self, method: MethodId, target: Option<InsId>, args: Vec<InsId>, pos: &LineCol) -> InsId {
        let kind = self.invoke_kind(method, false);
        let ty = self.repo().method(method).return_type;
        self.add(Ins::Invoke { kind, callee: Callee::Method(method), target, args, ty }, pos)
    }

    /// Calls a runtime helper, converting the arguments to its parameters
    pub(crate) fn runtime_call(&mut self, name: &str, args: Vec<InsId>, pos: &LineCol) -> Result<InsId> {
        let method = self.runtime_method(name, args.len())?;
        let (params, ret) = {
            let m = self.repo().method(method);
            (m.param_types(), m.return_type)
        };
        let mut converted = Vec::with_capacity(args.len());
        for (arg, param) in args.into_iter().zip(params) {
            converted.push(self.cast(arg, param, pos)?);
        }
        Ok(self.add(
            Ins::Invoke { kind: InvokeKind::Static, callee: Callee::Method(method), target: None, args: converted, ty: ret },
            pos,
        ))
    }
}

/// Lowers one queued member body and stores it on its descriptor
pub fn lower_job(session: &mut Session<'_>, unit: &UnitContext, job: &BodyJob<'_>) -> Result<()> {
    let owner = job.owner;
    let pos = &job.pos;
    match &job.kind {
        JobKind::Method { id, body } => {
            let (is_static, ret, params) = {
                let m = session.repo.method(*id);
                (m.modifiers.is_static(), m.return_type, m.params.clone())
            };
            log::trace!("lowering {}.{}", session.repo.name(owner), session.repo.method(*id).name);
            let self_ref = if is_static { SelfRef::None } else { SelfRef::This(owner) };
            let mut lowerer = Lowerer::new(session, unit, owner, self_ref, ret, MemberKind::Method);
            for p in &params {
                lowerer.bind_local(&p.name, p.ty);
            }
            lowerer.statements(body)?;
            let code = lowerer.finish();
            session.repo.method_mut(*id).body = Some(code);
        }
        JobKind::ForwardMethod { id, target, default } => {
            let (is_static, ret, params) = {
                let m = session.repo.method(*id);
                (m.modifiers.is_static(), m.return_type, m.params.clone())
            };
            let self_ref = if is_static { SelfRef::None } else { SelfRef::This(owner) };
            let mut lowerer = Lowerer::new(session, unit, owner, self_ref, ret, MemberKind::Method);
            let mut args = Vec::with_capacity(params.len() + 1);
            for p in &params {
                let binding = lowerer.bind_local(&p.name, p.ty);
                args.push(lowerer.load(&binding, pos));
            }
            let default_ty = lowerer.repo().method(*target).params[params.len()].ty;
            args.push(lowerer.expr(default, Some(default_ty))?);
            let receiver = if is_static { None } else { Some(lowerer.load_self(pos)?) };
            let kind = lowerer.invoke_kind(*target, false);
            let call = lowerer.add(
                Ins::Invoke { kind, callee: Callee::Method(*target), target: receiver, args, ty: ret },
                pos,
            );
            if ret == TypeId::VOID {
                lowerer.place(call);
            } else {
                lowerer.emit(Ins::Return { value: Some(call) }, pos);
            }
            let code = lowerer.finish();
            session.repo.method_mut(*id).body = Some(code);
        }
        JobKind::Constructor { id, super_args, param_fields, parts } => {
            let params = session.repo.constructor(*id).params.clone();
            let mut lowerer = Lowerer::new(session, unit, owner, SelfRef::This(owner), TypeId::VOID, MemberKind::Constructor);
            let mut bindings = Vec::with_capacity(params.len());
            for p in &params {
                bindings.push(lowerer.bind_local(&p.name, p.ty));
            }
            lowerer.super_constructor_call(super_args, pos)?;
            for (binding, field) in bindings.iter().zip(param_fields) {
                let this = lowerer.load_self(pos)?;
                let value = lowerer.load(binding, pos);
                lowerer.emit(Ins::PutField { target: this, field: *field, value }, pos);
            }
            for part in parts {
                match part {
                    InitPart::Field(field, init) => {
                        let ty = lowerer.repo().field(*field).ty;
                        let fpos = lowerer.pos(crate::ast::AstNode::span(*init));
                        let value = lowerer.expr(init, Some(ty))?;
                        let this = lowerer.load_self(&fpos)?;
                        lowerer.emit(Ins::PutField { target: this, field: *field, value }, &fpos);
                    }
                    InitPart::Stmt(stmt) => lowerer.statement(stmt)?,
                }
            }
            let code = lowerer.finish();
            session.repo.constructor_mut(*id).body = Some(code);
        }
        JobKind::ForwardConstructor { id, target, default } => {
            let params = session.repo.constructor(*id).params.clone();
            let mut lowerer = Lowerer::new(session, unit, owner, SelfRef::This(owner), TypeId::VOID, MemberKind::Constructor);
            let mut args = Vec::with_capacity(params.len() + 1);
            for p in &params {
                let binding = lowerer.bind_local(&p.name, p.ty);
                args.push(lowerer.load(&binding, pos));
            }
            let default_ty = lowerer.repo().constructor(*target).params[params.len()].ty;
            args.push(lowerer.expr(default, Some(default_ty))?);
            let this = lowerer.load_self(pos)?;
            lowerer.emit(
                Ins::Invoke {
                    kind: InvokeKind::Special,
                    callee: Callee::Constructor(*target),
                    target: Some(this),
                    args,
                    ty: TypeId::VOID,
                },
                pos,
            );
            let code = lowerer.finish();
            session.repo.constructor_mut(*id).body = Some(code);
        }
        JobKind::StaticInit { parts } => {
            let mut lowerer = Lowerer::new(session, unit, owner, SelfRef::None, TypeId::VOID, MemberKind::StaticInit);
            for part in parts {
                match part {
                    StaticPart::Field(field, init) => {
                        let ty = lowerer.repo().field(*field).ty;
                        let fpos = lowerer.pos(crate::ast::AstNode::span(*init));
                        let value = lowerer.expr(init, Some(ty))?;
                        lowerer.emit(Ins::PutStatic { field: *field, value }, &fpos);
                    }
                    StaticPart::Block(stmts) => {
                        lowerer.scope.push();
                        lowerer.statements(stmts)?;
                        lowerer.scope.pop();
                    }
                }
            }
            let code = lowerer.finish();
            if let Some(info) = session.repo.get_mut(owner).ref_info_mut() {
                info.static_init = Some(code);
            }
        }
    }
    Ok(())
}

impl Lowerer<'_, '_> {
    /// `super(args)` on the parent class, resolved statically
    fn super_constructor_call(&mut self, args: &[crate::ast::Expr], pos: &LineCol) -> Result<()> {
        let parent = match self.repo().parent_of(self.owner) {
            Some(parent) => parent,
            None => self.well_known(crate::consts::OBJECT)?,
        };
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.arg(arg)?);
        }
        let (ctor, converted) = self.constructor_call(parent, values, pos)?;
        let this = self.load_self(pos)?;
        self.emit(
            Ins::Invoke {
                kind: InvokeKind::Special,
                callee: Callee::Constructor(ctor),
                target: Some(this),
                args: converted,
                ty: TypeId::VOID,
            },
            pos,
        );
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use crate::common::builtin::BuiltinSource;
    use crate::common::import::ImportContext;
    use crate::common::repository::TypeRepository;
    use crate::config::Config;

    use super::*;

    /// Runs `f` against a lowerer for a static method of `java.lang.Object`
    pub(crate) fn with_lowerer(f: impl FnOnce(&mut Lowerer<'_, '_>)) {
        let config = Config::default();
        let mut repo = TypeRepository::new().with_source(Box::new(BuiltinSource::new(&config.runtime)));
        let unit = UnitContext {
            imports: ImportContext::new("", &[], &config.runtime),
            file: Arc::from("T.lt"),
            types: Vec::new(),
        };
        let owner = repo.well_known(crate::consts::OBJECT).unwrap();
        let mut session = Session::new(&mut repo, &config);
        let mut lowerer = Lowerer::new(&mut session, &unit, owner, SelfRef::None, TypeId::VOID, MemberKind::Method);
        f(&mut lowerer);
    }

    #[test]
    fn test_wide_locals_take_two_slots() {
        with_lowerer(|lw| {
            let a = lw.bind_local("a", TypeId::DOUBLE);
            let b = lw.bind_local("b", TypeId::INT);
            assert_eq!((a.slot, a.width), (0, 2));
            assert_eq!(b.slot, 2);
        });
    }

    #[test]
    fn test_this_in_static_context_is_rejected() {
        with_lowerer(|lw| {
            let err = lw.load_self(&LineCol::synthetic()).unwrap_err();
            assert!(matches!(err, Error::UnexpectedConstruct { .. }));
        });
    }
}
