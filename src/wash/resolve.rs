//! Member resolution and invocation lowering
//!
//! Candidates are collected from the receiver type and its ancestors, with
//! signatures already seen lower in the hierarchy hidden. Selection runs in
//! two phases like Java's: first without boxing, then with it. Among the
//! applicable candidates the one whose parameters convert to every other
//! candidate's parameters wins; without such a candidate the call is
//! ambiguous. Calls that resolve to nothing become late-bound call sites.

use crate::ast::{AccessExpr, Expr, InvocationExpr, LambdaExpr};
use crate::common::repository::is_widening;
use crate::common::types::{Access, CtorId, FieldId, MethodId, Modifiers, TypeId};
use crate::consts::{OBJECT, STATIC_CALL_PREFIX};
use crate::error::{Error, LineCol, Result, SemanticErrorKind};
use crate::ir::{Callee, Ins, InsId, InvokeKind};

use super::Lowerer;

/// Which members a lookup may return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FindMode {
    Any,
    Static,
    Instance,
}

impl FindMode {
    fn admits(self, modifiers: Modifiers) -> bool {
        match self {
            FindMode::Any => true,
            FindMode::Static => modifiers.is_static(),
            FindMode::Instance => !modifiers.is_static(),
        }
    }
}

/// Call argument; function literals are lowered only once the parameter
/// type they must implement is known
#[derive(Debug, Clone, Copy)]
pub(crate) enum Arg<'e> {
    Value(InsId),
    Lambda(&'e LambdaExpr),
}

impl Lowerer<'_, '_> {
    pub(crate) fn arg<'e>(&mut self, e: &'e Expr) -> Result<Arg<'e>> {
        match e {
            Expr::Lambda(l) => Ok(Arg::Lambda(l)),
            other => Ok(Arg::Value(self.expr(other, None)?)),
        }
    }

    fn args<'e>(&mut self, exprs: &'e [Expr]) -> Result<Vec<Arg<'e>>> {
        exprs.iter().map(|e| self.arg(e)).collect()
    }

    /// Whether the current owner may use a member of `declaring`
    pub(crate) fn accessible(&self, modifiers: Modifiers, declaring: TypeId) -> bool {
        let repo = self.repo();
        let same_package = repo.get(declaring).package() == repo.get(self.owner).package();
        match modifiers.access() {
            Access::Public => true,
            Access::Protected => same_package || repo.is_subtype(self.owner, declaring),
            Access::Package => same_package,
            Access::Private => declaring == self.owner,
        }
    }

    /// `ty` followed by its ancestors; interfaces and arrays also see the
    /// members of `java.lang.Object`
    fn member_chain(&self, ty: TypeId) -> Vec<TypeId> {
        let repo = self.repo();
        let mut chain = vec![ty];
        chain.extend(repo.ancestors(ty));
        let desc = repo.get(ty);
        if desc.is_interface() || desc.is_array() {
            if let Some(object) = repo.lookup(OBJECT) {
                if !chain.contains(&object) {
                    chain.push(object);
                }
            }
        }
        chain
    }

    pub(crate) fn find_field(&self, ty: TypeId, name: &str, mode: FindMode) -> Option<FieldId> {
        let repo = self.repo();
        self.member_chain(ty).into_iter().find_map(|t| {
            repo.fields_of(t).iter().copied().find(|id| {
                let f = repo.field(*id);
                f.name == name && mode.admits(f.modifiers) && self.accessible(f.modifiers, f.declaring)
            })
        })
    }

    pub(crate) fn find_methods(&self, ty: TypeId, name: &str, mode: FindMode) -> Vec<MethodId> {
        let repo = self.repo();
        let mut out = Vec::new();
        let mut signatures: Vec<Vec<TypeId>> = Vec::new();
        for t in self.member_chain(ty) {
            for id in repo.methods_of(t) {
                let m = repo.method(*id);
                if m.name != name || !mode.admits(m.modifiers) || !self.accessible(m.modifiers, m.declaring) {
                    continue;
                }
                let signature = m.param_types();
                if signatures.contains(&signature) {
                    continue;
                }
                signatures.push(signature);
                out.push(*id);
            }
        }
        out
    }

    /// Conversion without boxing: identity, primitive widening, reference
    /// assignability
    fn converts_strictly(&self, from: TypeId, to: TypeId) -> bool {
        if from == to {
            return true;
        }
        match (self.primitive_of(from), self.primitive_of(to)) {
            (Some(f), Some(t)) => is_widening(f, t),
            (None, None) => self.repo().is_assignable(from, to),
            _ => false,
        }
    }

    fn converts(&mut self, from: TypeId, to: TypeId, loose: bool) -> Result<bool> {
        if self.converts_strictly(from, to) {
            return Ok(true);
        }
        if !loose {
            return Ok(false);
        }
        Ok(match (self.primitive_of(from), self.primitive_of(to)) {
            (Some(f), None) => {
                let wrapper = self.repo_mut().wrapper_of(f)?;
                self.repo().is_assignable(wrapper, to)
            }
            (None, Some(t)) => self.repo().unboxed_kind(from).map(|k| is_widening(k, t)).unwrap_or(false),
            _ => false,
        })
    }

    fn applicable(&mut self, args: &[Arg<'_>], params: &[TypeId], loose: bool) -> Result<bool> {
        if args.len() != params.len() {
            return Ok(false);
        }
        for (arg, param) in args.iter().zip(params) {
            let fits = match arg {
                Arg::Value(v) => {
                    let ty = self.ty_of(*v)?;
                    self.converts(ty, *param, loose)?
                }
                Arg::Lambda(l) => self.lambda_fits(*param, l.params.len()),
            };
            if !fits {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn signature(&self, params: &[TypeId]) -> String {
        params.iter().map(|p| self.repo().name(*p).to_string()).collect::<Vec<_>>().join(", ")
    }

    pub(crate) fn describe_args(&self, args: &[Arg<'_>]) -> String {
        args.iter()
            .map(|a| match a {
                Arg::Value(v) => self.body.type_of(*v).map(|t| self.repo().name(t).to_string()).unwrap_or_default(),
                Arg::Lambda(_) => "<function>".to_string(),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Picks the most specific applicable candidate
    fn most_specific<C: Copy>(
        &mut self,
        candidates: Vec<(C, Vec<TypeId>)>,
        args: &[Arg<'_>],
        what: &str,
        pos: &LineCol,
    ) -> Result<Option<(C, Vec<TypeId>)>> {
        for loose in [false, true] {
            let mut applicable = Vec::new();
            for (candidate, params) in &candidates {
                if self.applicable(args, params, loose)? {
                    applicable.push((*candidate, params.clone()));
                }
            }
            if applicable.is_empty() {
                continue;
            }
            let dominates =
                |a: &[TypeId], b: &[TypeId]| a.iter().zip(b).all(|(p, o)| self.converts_strictly(*p, *o));
            for (i, (candidate, params)) in applicable.iter().enumerate() {
                if applicable.iter().enumerate().all(|(j, (_, other))| i == j || dominates(params, other)) {
                    return Ok(Some((*candidate, params.clone())));
                }
            }
            // report a pair where neither is more specific than the other
            let (first, second) = (0..applicable.len())
                .flat_map(|i| (i + 1..applicable.len()).map(move |j| (i, j)))
                .find(|&(i, j)| {
                    !dominates(&applicable[i].1, &applicable[j].1) && !dominates(&applicable[j].1, &applicable[i].1)
                })
                .unwrap_or((0, 1));
            return Err(Error::semantic(
                SemanticErrorKind::Ambiguous,
                format!(
                    "{} is ambiguous: ({}) and ({}) both apply",
                    what,
                    self.signature(&applicable[first].1),
                    self.signature(&applicable[second].1)
                ),
                pos,
            ));
        }
        Ok(None)
    }

    pub(crate) fn select_method(
        &mut self,
        candidates: Vec<MethodId>,
        args: &[Arg<'_>],
        name: &str,
        pos: &LineCol,
    ) -> Result<Option<MethodId>> {
        let with_params = candidates.into_iter().map(|id| (id, self.repo().method(id).param_types())).collect();
        Ok(self.most_specific(with_params, args, &format!("call to {}", name), pos)?.map(|(id, _)| id))
    }

    pub(crate) fn invoke_kind(&self, method: MethodId, via_super: bool) -> InvokeKind {
        let m = self.repo().method(method);
        if m.modifiers.is_static() {
            InvokeKind::Static
        } else if via_super || m.modifiers.is_private() {
            InvokeKind::Special
        } else if self.repo().get(m.declaring).is_interface() {
            InvokeKind::Interface
        } else {
            InvokeKind::Virtual
        }
    }

    /// Lowers an argument against the parameter type it is passed as
    pub(crate) fn materialize(&mut self, arg: Arg<'_>, param: TypeId, pos: &LineCol) -> Result<InsId> {
        match arg {
            Arg::Value(v) => self.cast(v, param, pos),
            Arg::Lambda(l) => self.closure(l, Some(param)),
        }
    }

    /// Invocation of a resolved method. A static method reached through a
    /// receiver still evaluates the receiver.
    pub(crate) fn call_method(
        &mut self,
        method: MethodId,
        target: Option<InsId>,
        args: Vec<Arg<'_>>,
        via_super: bool,
        pos: &LineCol,
    ) -> Result<InsId> {
        let (params, ret, is_static) = {
            let m = self.repo().method(method);
            (m.param_types(), m.return_type, m.modifiers.is_static())
        };
        let mut values = Vec::with_capacity(args.len());
        for (arg, param) in args.into_iter().zip(params) {
            values.push(self.materialize(arg, param, pos)?);
        }
        let kind = self.invoke_kind(method, via_super);
        if is_static {
            let call = self.add(
                Ins::Invoke { kind, callee: Callee::Method(method), target: None, args: values, ty: ret },
                pos,
            );
            return Ok(match target {
                Some(receiver) => self.pack(vec![receiver, call], pos),
                None => call,
            });
        }
        let receiver = match target {
            Some(receiver) => receiver,
            None => return Err(Error::internal(format!("instance call to {} without a receiver", self.repo().method(method).name))),
        };
        Ok(self.add(
            Ins::Invoke { kind, callee: Callee::Method(method), target: Some(receiver), args: values, ty: ret },
            pos,
        ))
    }

    /// Resolves a constructor of `ty` and converts the arguments
    pub(crate) fn constructor_call(&mut self, ty: TypeId, args: Vec<Arg<'_>>, pos: &LineCol) -> Result<(CtorId, Vec<InsId>)> {
        let repo = self.repo();
        let candidates: Vec<(CtorId, Vec<TypeId>)> = repo
            .constructors_of(ty)
            .iter()
            .copied()
            .filter(|id| {
                let c = repo.constructor(*id);
                self.accessible(c.modifiers, c.declaring)
            })
            .map(|id| (id, repo.constructor(id).param_types()))
            .collect();
        let what = format!("constructor of {}", repo.name(ty));
        let Some((ctor, params)) = self.most_specific(candidates, &args, &what, pos)? else {
            return Err(Error::not_found(
                format!("no constructor of {} accepts ({})", self.repo().name(ty), self.describe_args(&args)),
                pos,
            ));
        };
        let mut values = Vec::with_capacity(args.len());
        for (arg, param) in args.into_iter().zip(params) {
            values.push(self.materialize(arg, param, pos)?);
        }
        Ok((ctor, values))
    }

    pub(crate) fn new_instance(&mut self, ty: TypeId, args: Vec<Arg<'_>>, pos: &LineCol) -> Result<InsId> {
        let desc = self.repo().get(ty);
        if !desc.is_class() || desc.modifiers().is_abstract() {
            return Err(Error::semantic(
                SemanticErrorKind::TypeMismatch,
                format!("cannot instantiate {}", desc.full_name),
                pos,
            ));
        }
        let (ctor, values) = self.constructor_call(ty, args, pos)?;
        Ok(self.add(Ins::New { ctor, args: values, ty }, pos))
    }

    /// Late-bound call site resolved by the runtime bootstrap
    pub(crate) fn dynamic_call(&mut self, name: &str, leading: Vec<InsId>, args: Vec<Arg<'_>>, pos: &LineCol) -> Result<InsId> {
        let class = self.session.config.runtime.dynamic_class.clone();
        let dynamic = self.well_known(&class)?;
        let bootstrap = self
            .repo()
            .methods_of(dynamic)
            .iter()
            .copied()
            .find(|id| self.repo().method(*id).name == "bootstrap")
            .ok_or_else(|| Error::internal(format!("{} has no bootstrap method", class)))?;
        let mut values = Vec::with_capacity(leading.len() + args.len());
        for value in leading {
            values.push(self.to_reference(value, pos)?);
        }
        for arg in args {
            let value = match arg {
                Arg::Value(v) => self.to_reference(v, pos)?,
                Arg::Lambda(l) => self.closure(l, None)?,
            };
            values.push(value);
        }
        let object = self.well_known(OBJECT)?;
        log::debug!("{}: late-bound call to {} with {} arguments", pos, name, values.len());
        Ok(self.add(
            Ins::InvokeDynamic { bootstrap, name: name.to_string(), args: values, static_args: Vec::new(), ty: object },
            pos,
        ))
    }

    /// Late-bound call of a static method `name` of `ty`
    fn dynamic_static_call(&mut self, ty: TypeId, name: &str, args: Vec<Arg<'_>>, pos: &LineCol) -> Result<InsId> {
        let class = self.class_literal(ty, pos)?;
        self.dynamic_call(&format!("{}{}", STATIC_CALL_PREFIX, name), vec![class], args, pos)
    }

    /// Type a qualifier denotes when it is not a variable or field
    pub(crate) fn as_type_name(&mut self, e: &Expr, pos: &LineCol) -> Result<Option<TypeId>> {
        let Some(dotted) = e.dotted_name() else {
            return Ok(None);
        };
        let head = dotted.split('.').next().unwrap_or(&dotted);
        if self.scope.lookup(head).is_some() || self.find_field(self.owner, head, FindMode::Any).is_some() {
            return Ok(None);
        }
        self.type_named(&dotted, pos)
    }

    pub(crate) fn invocation(&mut self, call: &InvocationExpr) -> Result<InsId> {
        let pos = self.pos(call.span);
        match &*call.callee {
            Expr::Name(n) => self.call_by_name(&n.name, &call.args, &pos),
            Expr::Access(a) => self.call_on_access(a, &call.args, &pos),
            Expr::This(_) | Expr::Super(_) => Err(Error::unexpected("explicit constructor call", &pos)),
            other => {
                let function = self.expr(other, None)?;
                let args = self.args(&call.args)?;
                self.call_function_value(function, args, &pos)
            }
        }
    }

    /// `name(args)`: inner methods, function-valued locals, own methods,
    /// static imports, then a late-bound call
    fn call_by_name(&mut self, name: &str, exprs: &[Expr], pos: &LineCol) -> Result<InsId> {
        if let Some(inner) = self.scope.lookup_inner(name).cloned() {
            if inner.arity != exprs.len() {
                return Err(Error::not_found(
                    format!("{} takes {} arguments, {} given", name, inner.arity, exprs.len()),
                    pos,
                ));
            }
            let mut leading = Vec::with_capacity(inner.captured.len() + 1);
            for captured in &inner.captured {
                let binding = self
                    .scope
                    .lookup(captured)
                    .cloned()
                    .ok_or_else(|| Error::internal(format!("captured local {} is not in scope", captured)))?;
                leading.push(self.load(&binding, pos));
            }
            if inner.takes_self {
                leading.push(self.load_self(pos)?);
            }
            let params = self.repo().method(inner.method).param_types();
            let ret = self.repo().method(inner.method).return_type;
            let args = self.args(exprs)?;
            let mut values = leading;
            let declared = params[values.len()..].to_vec();
            for (arg, param) in args.into_iter().zip(declared) {
                values.push(self.materialize(arg, param, pos)?);
            }
            return Ok(self.add(
                Ins::Invoke {
                    kind: InvokeKind::Static,
                    callee: Callee::Method(inner.method),
                    target: None,
                    args: values,
                    ty: ret,
                },
                pos,
            ));
        }

        if let Some(binding) = self.scope.lookup(name).cloned() {
            let function = self.load(&binding, pos);
            let args = self.args(exprs)?;
            return self.call_function_value(function, args, pos);
        }

        let args = self.args(exprs)?;
        let mode = if self.scope.is_static() { FindMode::Static } else { FindMode::Any };
        let candidates = self.find_methods(self.owner, name, mode);
        if let Some(method) = self.select_method(candidates, &args, name, pos)? {
            let target = if self.repo().method(method).modifiers.is_static() { None } else { Some(self.load_self(pos)?) };
            return self.call_method(method, target, args, false, pos);
        }

        let sources: Vec<String> = self.unit.imports.static_sources(name).into_iter().map(str::to_string).collect();
        for source in sources {
            let Some(ty) = self.type_named(&source, pos)? else {
                continue;
            };
            let candidates = self.find_methods(ty, name, FindMode::Static);
            if let Some(method) = self.select_method(candidates, &args, name, pos)? {
                return self.call_method(method, None, args, false, pos);
            }
        }

        if self.scope.is_static() {
            self.dynamic_static_call(self.owner, name, args, pos)
        } else {
            let this = self.load_self(pos)?;
            self.dynamic_call(name, vec![this], args, pos)
        }
    }

    fn call_on_access(&mut self, access: &AccessExpr, exprs: &[Expr], pos: &LineCol) -> Result<InsId> {
        let Some(target) = access.target.as_deref() else {
            return self.call_by_name(&access.name, exprs, pos);
        };
        if let Expr::Super(_) = target {
            let parent = self
                .repo()
                .parent_of(self.owner)
                .ok_or_else(|| Error::unexpected("`super` in a type without a parent class", pos))?;
            let this = self.load_self(pos)?;
            let args = self.args(exprs)?;
            let candidates = self.find_methods(parent, &access.name, FindMode::Instance);
            return match self.select_method(candidates, &args, &access.name, pos)? {
                Some(method) => self.call_method(method, Some(this), args, true, pos),
                None => Err(Error::not_found(
                    format!("no method {}({}) in {}", access.name, self.describe_args(&args), self.repo().name(parent)),
                    pos,
                )),
            };
        }
        if let Some(ty) = self.as_type_name(target, pos)? {
            let args = self.args(exprs)?;
            let candidates = self.find_methods(ty, &access.name, FindMode::Static);
            return match self.select_method(candidates, &args, &access.name, pos)? {
                Some(method) => self.call_method(method, None, args, false, pos),
                None => self.dynamic_static_call(ty, &access.name, args, pos),
            };
        }
        let receiver = self.expr(target, None)?;
        let receiver = self.to_reference(receiver, pos)?;
        let ty = self.ty_of(receiver)?;
        let args = self.args(exprs)?;
        let candidates = self.find_methods(ty, &access.name, FindMode::Any);
        match self.select_method(candidates, &args, &access.name, pos)? {
            Some(method) => self.call_method(method, Some(receiver), args, false, pos),
            None => self.dynamic_call(&access.name, vec![receiver], args, pos),
        }
    }

    /// Applies a function value: through its single abstract method when
    /// the static type has one, late-bound `apply` otherwise
    fn call_function_value(&mut self, function: InsId, args: Vec<Arg<'_>>, pos: &LineCol) -> Result<InsId> {
        let function = self.to_reference(function, pos)?;
        let ty = self.ty_of(function)?;
        if let Ok(sam) = self.functional_method(ty, pos) {
            if self.repo().method(sam).params.len() == args.len() {
                return self.call_method(sam, Some(function), args, false, pos);
            }
        }
        self.dynamic_call("apply", vec![function], args, pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_mode_filters() {
        use crate::codegen::bytecode::access_flags::*;
        let static_member = Modifiers(ACC_PUBLIC | ACC_STATIC);
        let instance_member = Modifiers(ACC_PUBLIC);
        assert!(FindMode::Static.admits(static_member));
        assert!(!FindMode::Static.admits(instance_member));
        assert!(FindMode::Instance.admits(instance_member));
        assert!(FindMode::Any.admits(static_member));
    }
}
