//! Function literals and inner methods
//!
//! Both become static synthetic methods on the enclosing type. Their leading
//! parameters are the locals visible at the definition site, followed by
//! the enclosing `this` when there is one. A function literal then turns into
//! a value of its target type in one of two ways:
//!
//! - an `invokedynamic` through `LambdaMetafactory`, for interface targets in
//!   static contexts;
//! - an instance of a synthesized `Owner$Lambda$N` class that keeps a method
//!   handle to the synthetic method together with the captured values, and
//!   forwards its single abstract method to the handle.

use std::collections::HashSet;

use crate::ast::{LambdaExpr, MethodDecl, Stmt};
use crate::codegen::bytecode::access_flags::*;
use crate::common::builtin::MAX_FUNCTION_ARITY;
use crate::common::repository::DeclKind;
use crate::common::scope::{Binding, InnerCallable, SelfRef};
use crate::common::types::{
    ConstructorDef, CtorId, FieldDef, FieldId, MethodDef, MethodId, Modifiers, Param, RefTypeInfo, TypeId,
};
use crate::consts::{
    ARRAY_LIST, CLOSURE_HANDLE_FIELD, CLOSURE_LOCALS_FIELD, CLOSURE_SELF_FIELD, LAMBDA_METAFACTORY, LIST,
    METHOD_HANDLE, OBJECT, SELF_BINDING,
};
use crate::error::{Error, LineCol, Result, SemanticErrorKind};
use crate::ir::{Body, BootstrapArg, Callee, Ins, InsId, InvokeKind};

use super::enter::{translate_modifiers, Site};
use super::lower::MemberKind;
use super::resolve::Arg;
use super::Lowerer;

/// Shape of a synthetic method body lowered in its own [`Lowerer`]
struct Synthetic<'b> {
    method: MethodId,
    captured: Vec<Binding>,
    self_ty: Option<TypeId>,
    /// Declared parameters whose written type differs from the parameter
    /// they arrive in
    shadows: Vec<(String, TypeId)>,
    body: &'b [Stmt],
    /// Whether a trailing expression statement is the result
    implicit_return: bool,
}

impl Lowerer<'_, '_> {
    /// Whether a function literal with `arity` parameters can be passed
    /// where `param` is expected
    pub(crate) fn lambda_fits(&mut self, param: TypeId, arity: usize) -> bool {
        if self.well_known(OBJECT).ok() == Some(param) {
            return arity <= MAX_FUNCTION_ARITY;
        }
        match self.functional_method(param, &LineCol::synthetic()) {
            Ok(sam) => self.repo().method(sam).params.len() == arity,
            Err(_) => false,
        }
    }

    /// The single abstract method of a type a function literal may
    /// implement: an interface, or an abstract class with an accessible
    /// no-argument constructor
    pub(crate) fn functional_method(&self, ty: TypeId, pos: &LineCol) -> Result<MethodId> {
        let repo = self.repo();
        let desc = repo.get(ty);
        let not_functional =
            |why: &str| Error::semantic(SemanticErrorKind::IllegalClosureTarget, format!("{} {}", desc.full_name, why), pos);
        if desc.is_class() {
            if !desc.modifiers().is_abstract() {
                return Err(not_functional("is not abstract"));
            }
            let constructible = repo.constructors_of(ty).iter().any(|c| {
                let c = repo.constructor(*c);
                c.params.is_empty() && self.accessible(c.modifiers, c.declaring)
            });
            if !constructible {
                return Err(not_functional("has no accessible constructor without parameters"));
            }
        } else if !desc.is_interface() {
            return Err(not_functional("is not an interface or abstract class"));
        }

        let mut chain = vec![ty];
        chain.extend(repo.ancestors(ty));
        if desc.is_interface() {
            if let Some(object) = repo.lookup(OBJECT) {
                chain.push(object);
            }
        }
        let members = || chain.iter().flat_map(|t| repo.methods_of(*t).iter().copied()).filter(|m| !repo.method(*m).modifiers.is_static());
        let concrete: HashSet<(String, Vec<TypeId>)> = members()
            .map(|m| repo.method(m))
            .filter(|m| !m.modifiers.is_abstract())
            .map(|m| (m.name.clone(), m.param_types()))
            .collect();
        let mut seen = HashSet::new();
        let abstract_methods: Vec<MethodId> = members()
            .filter(|m| {
                let def = repo.method(*m);
                let signature = (def.name.clone(), def.param_types());
                def.modifiers.is_abstract() && !concrete.contains(&signature) && seen.insert(signature)
            })
            .collect();
        match abstract_methods.as_slice() {
            [sam] => Ok(*sam),
            [] => Err(not_functional("has no abstract method")),
            _ => Err(not_functional("has more than one abstract method")),
        }
    }

    fn self_type(&self) -> Option<TypeId> {
        match self.scope.self_ref() {
            SelfRef::None => None,
            SelfRef::This(ty) | SelfRef::Local { ty, .. } => Some(ty),
        }
    }

    /// Locals a synthetic method receives ahead of the self reference
    fn captured_locals(&self) -> Vec<Binding> {
        self.scope.visible_locals().into_iter().filter(|b| b.name != SELF_BINDING).collect()
    }

    fn leading_params(&self, captured: &[Binding], self_ty: Option<TypeId>) -> Vec<Param> {
        let mut params: Vec<Param> =
            captured.iter().map(|b| Param { name: b.name.clone(), ty: b.ty, annotations: Vec::new() }).collect();
        if let Some(ty) = self_ty {
            params.push(Param { name: SELF_BINDING.to_string(), ty, annotations: Vec::new() });
        }
        params
    }

    /// Lowers the body of a synthetic method in a fresh lowerer that sees
    /// the same inner methods as this one
    fn lower_synthetic(&mut self, synthetic: Synthetic<'_>, pos: &LineCol) -> Result<()> {
        let (params, ret) = {
            let m = self.repo().method(synthetic.method);
            (m.params.clone(), m.return_type)
        };
        let inner = self.scope.visible_inner();
        let mut nested = Lowerer::new(&mut *self.session, self.unit, self.owner, SelfRef::None, ret, MemberKind::Method);
        for param in &params {
            let binding = nested.bind_local(&param.name, param.ty);
            if param.name == SELF_BINDING && synthetic.self_ty.is_some() {
                nested.scope.set_self(SelfRef::Local { slot: binding.slot, ty: param.ty });
            }
        }
        for callable in inner {
            nested.scope.register_inner(callable);
        }
        if !synthetic.shadows.is_empty() {
            nested.scope.push();
            for (name, ty) in &synthetic.shadows {
                let arrived = nested
                    .scope
                    .lookup(name)
                    .cloned()
                    .ok_or_else(|| Error::internal(format!("parameter {} is not bound", name)))?;
                let loaded = nested.load(&arrived, pos);
                let value = nested.cast(loaded, *ty, pos)?;
                let shadow = nested.bind_local(name, *ty);
                nested.emit(Ins::Store { slot: shadow.slot, value, ty: *ty }, pos);
            }
        }

        match synthetic.body.split_last() {
            Some((Stmt::Expr(last), init)) if synthetic.implicit_return && ret != TypeId::VOID => {
                nested.statements(init)?;
                let value = nested.expr(last, Some(ret))?;
                nested.emit(Ins::Return { value: Some(value) }, pos);
            }
            _ => nested.statements(synthetic.body)?,
        }
        let code = nested.finish();
        log::trace!("{}: lowered synthetic {} ({} captured)", pos, self.repo().method(synthetic.method).name, synthetic.captured.len());
        self.repo_mut().method_mut(synthetic.method).body = Some(code);
        Ok(())
    }

    /// A named method declared inside a body. Callable from the rest of the
    /// enclosing block, including its own body.
    pub(crate) fn inner_method(&mut self, decl: &MethodDecl) -> Result<()> {
        let pos = self.pos(decl.span);
        translate_modifiers(&decl.modifiers, Site::Method, &pos)?;
        let Some(body) = &decl.body else {
            return Err(Error::unexpected(format!("inner method {} without a body", decl.name), &pos));
        };
        if decl.params.iter().any(|p| p.default.is_some()) {
            return Err(Error::unexpected(format!("default parameter value on inner method {}", decl.name), &pos));
        }

        let captured = self.captured_locals();
        let self_ty = self.self_type();
        let mut params = self.leading_params(&captured, self_ty);
        let object = self.well_known(OBJECT)?;
        for p in &decl.params {
            let ty = match &p.ty {
                Some(t) => self.resolve_type_ref(t)?,
                None => object,
            };
            params.push(Param { name: p.name.clone(), ty, annotations: Vec::new() });
        }
        let return_type = match &decl.return_type {
            Some(t) => self.resolve_type_ref(t)?,
            None => object,
        };

        let owner = self.owner;
        let index = self.session.next_index(owner, "inner");
        let name = format!("inner${}${}", decl.name, index);
        let method = self.repo_mut().add_method(MethodDef {
            name,
            declaring: owner,
            return_type,
            params,
            modifiers: Modifiers(ACC_PRIVATE | ACC_STATIC | ACC_SYNTHETIC),
            body: None,
            annotations: Vec::new(),
            overrides: Vec::new(),
            overridden_by: Vec::new(),
            annotation_default: None,
            line_col: pos.clone(),
        });
        self.scope.register_inner(InnerCallable {
            name: decl.name.clone(),
            method,
            captured: captured.iter().map(|b| b.name.clone()).collect(),
            takes_self: self_ty.is_some(),
            arity: decl.params.len(),
        });
        log::debug!("{}: inner method {} with {} captured locals", pos, decl.name, captured.len());
        self.lower_synthetic(
            Synthetic { method, captured, self_ty, shadows: Vec::new(), body, implicit_return: false },
            &pos,
        )
    }

    /// A function literal as a value of `required`, or of the `FunctionN`
    /// interface of its arity when nothing more specific is required
    pub(crate) fn closure(&mut self, l: &LambdaExpr, required: Option<TypeId>) -> Result<InsId> {
        let pos = self.pos(l.span);
        let object = self.well_known(OBJECT)?;
        let arity = l.params.len();
        let target = match required {
            Some(ty) if ty != object => ty,
            _ => {
                if arity > MAX_FUNCTION_ARITY {
                    return Err(Error::semantic(
                        SemanticErrorKind::IllegalClosureTarget,
                        format!("function literals take at most {} parameters", MAX_FUNCTION_ARITY),
                        &pos,
                    ));
                }
                let name = self.session.config.runtime.function_type(arity);
                self.well_known(&name)?
            }
        };
        let sam = self.functional_method(target, &pos)?;
        let (sam_name, sam_params, sam_ret) = {
            let m = self.repo().method(sam);
            (m.name.clone(), m.param_types(), m.return_type)
        };
        if sam_params.len() != arity {
            return Err(Error::semantic(
                SemanticErrorKind::IllegalClosureTarget,
                format!("{}.{} takes {} parameters, the function literal {}", self.repo().name(target), sam_name, sam_params.len(), arity),
                &pos,
            ));
        }

        let captured = self.captured_locals();
        let self_ty = self.self_type();
        let indy = self.repo().get(target).is_interface() && self_ty.is_none();
        let mut params = self.leading_params(&captured, self_ty);
        let mut shadows = Vec::new();
        for (p, ty) in l.params.iter().zip(&sam_params) {
            params.push(Param { name: p.name.clone(), ty: *ty, annotations: Vec::new() });
            if let Some(written) = &p.ty {
                let written = self.resolve_type_ref(written)?;
                if written != *ty {
                    shadows.push((p.name.clone(), written));
                }
            }
        }

        let owner = self.owner;
        let index = self.session.next_index(owner, "lambda");
        let access = if indy { ACC_PRIVATE } else { ACC_PUBLIC };
        let method = self.repo_mut().add_method(MethodDef {
            name: format!("lambda${}", index),
            declaring: owner,
            return_type: sam_ret,
            params,
            modifiers: Modifiers(access | ACC_STATIC | ACC_SYNTHETIC),
            body: None,
            annotations: Vec::new(),
            overrides: Vec::new(),
            overridden_by: Vec::new(),
            annotation_default: None,
            line_col: pos.clone(),
        });
        self.lower_synthetic(
            Synthetic { method, captured: captured.clone(), self_ty, shadows, body: &l.body, implicit_return: true },
            &pos,
        )?;

        if indy {
            log::debug!("{}: function literal as {} through LambdaMetafactory", pos, self.repo().name(target));
            let bootstrap = self.library_method(LAMBDA_METAFACTORY, "metafactory", 6)?;
            let args = captured.iter().map(|b| self.load(b, &pos)).collect();
            return Ok(self.add(
                Ins::InvokeDynamic {
                    bootstrap,
                    name: sam_name,
                    args,
                    static_args: vec![
                        BootstrapArg::MethodTypeOf(sam),
                        BootstrapArg::Handle(method),
                        BootstrapArg::MethodTypeOf(sam),
                    ],
                    ty: target,
                },
                &pos,
            ));
        }

        log::debug!("{}: function literal as {} through a closure class", pos, self.repo().name(target));
        let class = self.closure_class(target, sam, self_ty.is_some(), &pos)?;
        self.closure_instance(class, method, &captured, &pos)
    }

    /// `new Owner$Lambda$N(handle, this, [captured...])`
    fn closure_instance(&mut self, class: ClosureClass, method: MethodId, captured: &[Binding], pos: &LineCol) -> Result<InsId> {
        let handle_ty = self.well_known(METHOD_HANDLE)?;
        let mut args = vec![self.add(Ins::MethodHandle { method, ty: handle_ty }, pos)];
        if class.takes_self {
            args.push(self.load_self(pos)?);
        }

        let list_ty = self.well_known(ARRAY_LIST)?;
        let list = self.new_instance(list_ty, Vec::new(), pos)?;
        let (tmp, store) = self.store_temp(list, pos)?;
        let add = self.library_method(ARRAY_LIST, "add", 1)?;
        let mut items = vec![store];
        for binding in captured {
            let receiver = self.load(&tmp, pos);
            let value = self.load(binding, pos);
            let value = self.to_reference(value, pos)?;
            items.push(self.library_call(add, Some(receiver), vec![value], pos));
        }
        items.push(self.load(&tmp, pos));
        args.push(self.pack(items, pos));

        Ok(self.add(Ins::New { ctor: class.ctor, args, ty: class.ty }, pos))
    }

    /// Declares `Owner$Lambda$N` extending or implementing `target`, with
    /// its constructor and the override of `sam`
    fn closure_class(&mut self, target: TypeId, sam: MethodId, takes_self: bool, pos: &LineCol) -> Result<ClosureClass> {
        let object = self.well_known(OBJECT)?;
        let handle_ty = self.well_known(METHOD_HANDLE)?;
        let list_ty = self.well_known(LIST)?;
        let (package, source_file) = match self.repo().get(self.owner).ref_info() {
            Some(info) => (info.package.clone(), info.source_file.clone()),
            None => (String::new(), None),
        };
        let index = self.session.next_index(self.owner, "closure class");
        let name = format!("{}{}{}", self.repo().name(self.owner), self.session.config.runtime.lambda_infix, index);
        let target_is_interface = self.repo().get(target).is_interface();
        let info = RefTypeInfo {
            package,
            modifiers: Modifiers(ACC_PUBLIC | ACC_FINAL | ACC_SYNTHETIC),
            parent: Some(if target_is_interface { object } else { target }),
            interfaces: if target_is_interface { vec![target] } else { Vec::new() },
            source_file,
            line_col: pos.clone(),
            in_unit: true,
            ..RefTypeInfo::default()
        };
        let ty = self.repo_mut().declare(&name, DeclKind::Class, info, pos)?;
        self.session.generated.push(ty);

        let field = |lw: &mut Self, name: &str, fty: TypeId| {
            lw.repo_mut().add_field(FieldDef {
                name: name.to_string(),
                ty: fty,
                modifiers: Modifiers(ACC_PRIVATE | ACC_FINAL | ACC_SYNTHETIC),
                declaring: ty,
                annotations: Vec::new(),
                line_col: pos.clone(),
            })
        };
        let handle_field = field(self, CLOSURE_HANDLE_FIELD, handle_ty);
        let self_field = if takes_self { Some(field(self, CLOSURE_SELF_FIELD, object)) } else { None };
        let locals_field = field(self, CLOSURE_LOCALS_FIELD, list_ty);
        let fields = ClosureFields { handle: handle_field, this: self_field, locals: locals_field };

        let mut params = vec![Param { name: CLOSURE_HANDLE_FIELD.to_string(), ty: handle_ty, annotations: Vec::new() }];
        if takes_self {
            params.push(Param { name: CLOSURE_SELF_FIELD.to_string(), ty: object, annotations: Vec::new() });
        }
        params.push(Param { name: CLOSURE_LOCALS_FIELD.to_string(), ty: list_ty, annotations: Vec::new() });
        let ctor = self.repo_mut().add_constructor(ConstructorDef {
            declaring: ty,
            params,
            modifiers: Modifiers(ACC_PUBLIC),
            body: None,
            annotations: Vec::new(),
            line_col: pos.clone(),
        });
        let ctor_body = self.closure_constructor_body(ty, ctor, &fields, pos)?;
        self.repo_mut().constructor_mut(ctor).body = Some(ctor_body);

        let (sam_name, sam_params, sam_ret) = {
            let m = self.repo().method(sam);
            (m.name.clone(), m.params.clone(), m.return_type)
        };
        let params = sam_params
            .iter()
            .enumerate()
            .map(|(i, p)| Param { name: format!("p{}", i), ty: p.ty, annotations: Vec::new() })
            .collect();
        let forward = self.repo_mut().add_method(MethodDef {
            name: sam_name,
            declaring: ty,
            return_type: sam_ret,
            params,
            modifiers: Modifiers(ACC_PUBLIC),
            body: None,
            annotations: Vec::new(),
            overrides: vec![sam],
            overridden_by: Vec::new(),
            annotation_default: None,
            line_col: pos.clone(),
        });
        let forward_body = self.closure_forward_body(ty, forward, &fields, pos)?;
        self.repo_mut().method_mut(forward).body = Some(forward_body);

        Ok(ClosureClass { ty, ctor, takes_self })
    }

    /// `super(); this.methodHandle = methodHandle; this.self = self; this.local = local`
    fn closure_constructor_body(
        &mut self,
        class: TypeId,
        ctor: CtorId,
        fields: &ClosureFields,
        pos: &LineCol,
    ) -> Result<Body> {
        let params = self.repo().constructor(ctor).params.clone();
        let parent = self.repo().parent_of(class).ok_or_else(|| Error::internal("closure class without a parent"))?;
        let mut lw = Lowerer::new(&mut *self.session, self.unit, class, SelfRef::This(class), TypeId::VOID, MemberKind::Constructor);
        let (super_ctor, _) = lw.constructor_call(parent, Vec::new(), pos)?;
        let this = lw.load_self(pos)?;
        lw.emit(
            Ins::Invoke {
                kind: InvokeKind::Special,
                callee: Callee::Constructor(super_ctor),
                target: Some(this),
                args: Vec::new(),
                ty: TypeId::VOID,
            },
            pos,
        );
        let targets = [Some(fields.handle), fields.this, Some(fields.locals)];
        let mut bindings = params.iter().map(|p| lw.bind_local(&p.name, p.ty)).collect::<Vec<_>>().into_iter();
        for field in targets.into_iter().flatten() {
            let binding = bindings.next().ok_or_else(|| Error::internal("closure constructor is missing a parameter"))?;
            let this = lw.load_self(pos)?;
            let value = lw.load(&binding, pos);
            lw.emit(Ins::PutField { target: this, field, value }, pos);
        }
        Ok(lw.finish())
    }

    /// Packs `local`, `self` and the arguments into one list and invokes the
    /// handle with it
    fn closure_forward_body(&mut self, class: TypeId, method: MethodId, fields: &ClosureFields, pos: &LineCol) -> Result<Body> {
        let (params, ret) = {
            let m = self.repo().method(method);
            (m.params.clone(), m.return_type)
        };
        let list_ty = self.well_known(ARRAY_LIST)?;
        let handle_ty = self.well_known(METHOD_HANDLE)?;
        let mut lw = Lowerer::new(&mut *self.session, self.unit, class, SelfRef::This(class), ret, MemberKind::Method);
        let bindings: Vec<Binding> = params.iter().map(|p| lw.bind_local(&p.name, p.ty)).collect();

        let this = lw.load_self(pos)?;
        let locals_ty = lw.repo().field(fields.locals).ty;
        let captured = lw.add(Ins::GetField { target: this, field: fields.locals, ty: locals_ty }, pos);
        let list = lw.new_instance(list_ty, vec![Arg::Value(captured)], pos)?;
        let (tmp, store) = lw.store_temp(list, pos)?;
        lw.place(store);

        let add = lw.library_method(ARRAY_LIST, "add", 1)?;
        if let Some(self_field) = fields.this {
            let this = lw.load_self(pos)?;
            let self_ty = lw.repo().field(self_field).ty;
            let value = lw.add(Ins::GetField { target: this, field: self_field, ty: self_ty }, pos);
            let receiver = lw.load(&tmp, pos);
            let call = lw.library_call(add, Some(receiver), vec![value], pos);
            lw.place(call);
        }
        for binding in &bindings {
            let value = lw.load(binding, pos);
            let value = lw.to_reference(value, pos)?;
            let receiver = lw.load(&tmp, pos);
            let call = lw.library_call(add, Some(receiver), vec![value], pos);
            lw.place(call);
        }

        let invoke = lw.library_method(METHOD_HANDLE, "invokeWithArguments", 1)?;
        let this = lw.load_self(pos)?;
        let handle = lw.add(Ins::GetField { target: this, field: fields.handle, ty: handle_ty }, pos);
        let arguments = lw.load(&tmp, pos);
        let result = lw.library_call(invoke, Some(handle), vec![arguments], pos);
        if ret == TypeId::VOID {
            lw.place(result);
        } else {
            let value = lw.cast(result, ret, pos)?;
            lw.emit(Ins::Return { value: Some(value) }, pos);
        }
        Ok(lw.finish())
    }
}

struct ClosureFields {
    handle: FieldId,
    this: Option<FieldId>,
    locals: FieldId,
}

struct ClosureClass {
    ty: TypeId,
    ctor: CtorId,
    takes_self: bool,
}
