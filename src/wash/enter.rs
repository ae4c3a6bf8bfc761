//! Record and members passes
//!
//! Record gives every declared type an empty descriptor so that members can
//! refer to any type of the compilation. Members then resolves parents and
//! builds the field, method and constructor signatures. Statement bodies are
//! not looked at here: each member that needs code is queued as a
//! [`BodyJob`] for the bodies pass.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use crate::ast::{self, AstNode, ClassMember, Expr, InterfaceMember, Literal, Modifier, Stmt, TypeDecl, TypeRef, UnaryOp};
use crate::codegen::bytecode::access_flags::*;
use crate::common::import::ImportContext;
use crate::common::repository::DeclKind;
use crate::common::types::*;
use crate::consts::{CLASS, OBJECT};
use crate::error::{Error, LineCol, Result, SemanticErrorKind};
use crate::ir::Constant;

use super::expr::number_constant;
use super::Session;

const ANNOTATION_ROOT: &str = "java.lang.annotation.Annotation";
const ENUM_ROOT: &str = "java.lang.Enum";

/// Per-unit state shared by the later passes
#[derive(Debug)]
pub struct UnitContext {
    pub imports: ImportContext,
    pub file: Arc<str>,
    /// Types declared by the unit, in source order
    pub types: Vec<TypeId>,
}

impl UnitContext {
    pub fn pos(&self, span: ast::Span) -> LineCol {
        span.line_col(&self.file)
    }
}

/// Code that runs in a constructor after the super call and the
/// parameter-field stores
#[derive(Debug, Clone, Copy)]
pub enum InitPart<'u> {
    Field(FieldId, &'u Expr),
    Stmt(&'u Stmt),
}

/// Code of the static initializer
#[derive(Debug, Clone, Copy)]
pub enum StaticPart<'u> {
    Field(FieldId, &'u Expr),
    Block(&'u [Stmt]),
}

#[derive(Debug)]
pub enum JobKind<'u> {
    Method {
        id: MethodId,
        body: &'u [Stmt],
    },
    /// Overload generated for a trailing default: calls `target` with the
    /// received arguments plus the default
    ForwardMethod {
        id: MethodId,
        target: MethodId,
        default: &'u Expr,
    },
    Constructor {
        id: CtorId,
        super_args: &'u [Expr],
        param_fields: Vec<FieldId>,
        parts: Vec<InitPart<'u>>,
    },
    ForwardConstructor {
        id: CtorId,
        target: CtorId,
        default: &'u Expr,
    },
    StaticInit {
        parts: Vec<StaticPart<'u>>,
    },
}

/// A member body waiting for the bodies pass
#[derive(Debug)]
pub struct BodyJob<'u> {
    /// Index of the compilation unit
    pub unit: usize,
    pub owner: TypeId,
    pub pos: LineCol,
    pub kind: JobKind<'u>,
}

/// Where a modifier list is written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Site {
    Class,
    Interface,
    Annotation,
    Field,
    ClassParam,
    Method,
    Param,
    Local,
}

impl Site {
    fn name(self) -> &'static str {
        match self {
            Site::Class => "class",
            Site::Interface => "interface",
            Site::Annotation => "annotation type",
            Site::Field => "field",
            Site::ClassParam => "class parameter",
            Site::Method => "method",
            Site::Param => "parameter",
            Site::Local => "local variable",
        }
    }

    fn allows(self, m: Modifier) -> bool {
        use Modifier::*;
        let access = matches!(m, Public | Protected | Private | Package);
        match self {
            Site::Class => matches!(m, Public | Package | Final | Abstract),
            Site::Interface => matches!(m, Public | Package | Abstract),
            Site::Annotation => matches!(m, Public | Package),
            Site::Field => access || matches!(m, Static | Final | Volatile | Transient),
            Site::ClassParam => access || matches!(m, Final | Volatile | Transient),
            Site::Method => access || matches!(m, Static | Final | Abstract | Synchronized | Strictfp),
            Site::Param | Site::Local => matches!(m, Final),
        }
    }

    fn has_access(self) -> bool {
        !matches!(self, Site::Param | Site::Local)
    }
}

/// Translates written modifiers to flags. Types and members without an
/// access modifier are public; `pkg` selects package access.
pub(crate) fn translate_modifiers(mods: &[Modifier], site: Site, pos: &LineCol) -> Result<Modifiers> {
    let mut seen = HashSet::new();
    let mut access: Option<Modifier> = None;
    let mut flags = 0u16;
    for m in mods {
        if !seen.insert(*m) {
            return Err(Error::semantic(SemanticErrorKind::IllegalModifier, format!("repeated modifier {}", m), pos));
        }
        if !site.allows(*m) {
            return Err(Error::unexpected(format!("modifier {} on {}", m, site.name()), pos));
        }
        match m {
            Modifier::Public | Modifier::Protected | Modifier::Private | Modifier::Package => {
                if let Some(prev) = access {
                    return Err(Error::semantic(
                        SemanticErrorKind::IllegalModifier,
                        format!("conflicting access modifiers {} and {}", prev, m),
                        pos,
                    ));
                }
                access = Some(*m);
            }
            Modifier::Static => flags |= ACC_STATIC,
            Modifier::Final => flags |= ACC_FINAL,
            Modifier::Abstract => flags |= ACC_ABSTRACT,
            Modifier::Synchronized => flags |= ACC_SYNCHRONIZED,
            Modifier::Volatile => flags |= ACC_VOLATILE,
            Modifier::Transient => flags |= ACC_TRANSIENT,
            Modifier::Strictfp => flags |= ACC_STRICT,
        }
    }
    if site.has_access() {
        flags |= match access {
            None | Some(Modifier::Public) => ACC_PUBLIC,
            Some(Modifier::Protected) => ACC_PROTECTED,
            Some(Modifier::Private) => ACC_PRIVATE,
            _ => 0,
        };
    }
    let illegal = |what: &str| Error::semantic(SemanticErrorKind::IllegalModifier, what.to_string(), pos);
    if flags & ACC_ABSTRACT != 0 {
        if flags & ACC_FINAL != 0 {
            return Err(illegal("abstract and final"));
        }
        if site == Site::Method && flags & (ACC_PRIVATE | ACC_STATIC | ACC_SYNCHRONIZED) != 0 {
            return Err(illegal("abstract method cannot be private, static or synchronized"));
        }
    }
    if flags & ACC_FINAL != 0 && flags & ACC_VOLATILE != 0 && matches!(site, Site::Field | Site::ClassParam) {
        return Err(illegal("final and volatile"));
    }
    Ok(Modifiers(flags))
}

fn source_file_name(file: &str) -> String {
    Path::new(file)
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| file.to_string())
}

/// Record pass for one unit
pub fn record(session: &mut Session<'_>, unit: &ast::CompilationUnit) -> Result<UnitContext> {
    let file: Arc<str> = Arc::from(unit.file.as_str());
    let package = unit.package.clone().unwrap_or_default();
    let imports = ImportContext::new(&package, &unit.imports, &session.config.runtime);
    let mut types = Vec::with_capacity(unit.types.len());
    for decl in &unit.types {
        let pos = decl.span().line_col(&file);
        let (kind, site) = match decl {
            TypeDecl::Class(_) => (DeclKind::Class, Site::Class),
            TypeDecl::Interface(_) => (DeclKind::Interface, Site::Interface),
            TypeDecl::Annotation(_) => (DeclKind::Annotation, Site::Annotation),
        };
        let mut modifiers = translate_modifiers(decl.modifiers(), site, &pos)?;
        if kind != DeclKind::Class {
            modifiers.insert(ACC_ABSTRACT);
        }
        let info = RefTypeInfo {
            package: package.clone(),
            modifiers,
            source_file: Some(source_file_name(&unit.file)),
            line_col: pos.clone(),
            in_unit: true,
            ..RefTypeInfo::default()
        };
        let full_name = imports.qualify(decl.name());
        let id = session.repo.declare(&full_name, kind, info, &pos)?;
        log::trace!("recorded {}", full_name);
        types.push(id);
    }
    Ok(UnitContext { imports, file, types })
}

/// Members pass for one unit; returns the bodies to lower
pub fn enter_members<'u>(
    session: &mut Session<'_>,
    ctx: &UnitContext,
    unit_index: usize,
    unit: &'u ast::CompilationUnit,
) -> Result<Vec<BodyJob<'u>>> {
    let mut enter = MemberEnter { session, ctx, unit: unit_index, jobs: Vec::new() };
    for (decl, id) in unit.types.iter().zip(ctx.types.iter().copied()) {
        match decl {
            TypeDecl::Class(c) => enter.class(id, c)?,
            TypeDecl::Interface(i) => enter.interface(id, i)?,
            TypeDecl::Annotation(a) => enter.annotation(id, a)?,
        }
    }
    Ok(enter.jobs)
}

struct MemberEnter<'s, 'a, 'u> {
    session: &'s mut Session<'a>,
    ctx: &'s UnitContext,
    unit: usize,
    jobs: Vec<BodyJob<'u>>,
}

impl<'s, 'a, 'u> MemberEnter<'s, 'a, 'u> {
    fn pos(&self, span: ast::Span) -> LineCol {
        self.ctx.pos(span)
    }

    fn job(&mut self, owner: TypeId, pos: LineCol, kind: JobKind<'u>) {
        self.jobs.push(BodyJob { unit: self.unit, owner, pos, kind });
    }

    fn type_ref(&mut self, t: &TypeRef) -> Result<TypeId> {
        let pos = self.pos(t.span);
        self.ctx.imports.require_type(self.session.repo, &t.spelled(), &pos)
    }

    /// Written type, `java.lang.Object` when absent
    fn type_or_object(&mut self, t: Option<&TypeRef>) -> Result<TypeId> {
        match t {
            Some(t) => self.type_ref(t),
            None => self.session.repo.well_known(OBJECT),
        }
    }

    fn set_hierarchy(&mut self, id: TypeId, parent: Option<TypeId>, interfaces: Vec<TypeId>, annotations: Vec<AnnotationInstance>) {
        if let Some(info) = self.session.repo.get_mut(id).ref_info_mut() {
            info.parent = parent;
            info.interfaces = interfaces;
            info.annotations = annotations;
        }
    }

    fn class(&mut self, id: TypeId, decl: &'u ast::ClassDecl) -> Result<()> {
        let pos = self.pos(decl.span);
        let parent = match &decl.extends {
            Some(call) => self.type_ref(&call.ty)?,
            None => self.session.repo.well_known(OBJECT)?,
        };
        let mut interfaces = Vec::with_capacity(decl.implements.len());
        for i in &decl.implements {
            interfaces.push(self.type_ref(i)?);
        }
        let annotations = self.annotations(&decl.annotations)?;
        self.set_hierarchy(id, Some(parent), interfaces, annotations);

        let (params, first_default) = self.params(&decl.params)?;
        let mut field_names = HashSet::new();
        let mut param_fields = Vec::with_capacity(params.len());
        for (p, written) in params.iter().zip(&decl.params) {
            let ppos = self.pos(written.span);
            let modifiers = translate_modifiers(&written.modifiers, Site::ClassParam, &ppos)?;
            param_fields.push(self.add_field(id, &p.name, p.ty, modifiers, p.annotations.clone(), ppos, &mut field_names)?);
        }

        let mut init_parts = Vec::new();
        let mut static_parts = Vec::new();
        for member in &decl.body {
            match member {
                ClassMember::Field(f) => {
                    let fpos = self.pos(f.span);
                    let modifiers = translate_modifiers(&f.modifiers, Site::Field, &fpos)?;
                    let ty = self.type_or_object(f.ty.as_ref())?;
                    let annotations = self.annotations(&f.annotations)?;
                    let fid = self.add_field(id, &f.name, ty, modifiers, annotations, fpos, &mut field_names)?;
                    if let Some(init) = &f.init {
                        if modifiers.is_static() {
                            static_parts.push(StaticPart::Field(fid, init));
                        } else {
                            init_parts.push(InitPart::Field(fid, init));
                        }
                    }
                }
                ClassMember::Method(m) => self.method(id, m, false)?,
                ClassMember::StaticBlock(stmts) => static_parts.push(StaticPart::Block(stmts)),
                ClassMember::Stmt(s) => init_parts.push(InitPart::Stmt(s)),
            }
        }

        // primary constructor, then one overload per trailing default
        let full = self.session.repo.add_constructor(ConstructorDef {
            declaring: id,
            params: params.clone(),
            modifiers: Modifiers(ACC_PUBLIC),
            body: None,
            annotations: Vec::new(),
            line_col: pos.clone(),
        });
        let super_args: &'u [Expr] = match &decl.extends {
            Some(call) => &call.args,
            None => &[],
        };
        self.job(id, pos.clone(), JobKind::Constructor { id: full, super_args, param_fields, parts: init_parts });
        let mut target = full;
        for count in (first_default..params.len()).rev() {
            let overload = self.session.repo.add_constructor(ConstructorDef {
                declaring: id,
                params: params[..count].to_vec(),
                modifiers: Modifiers(ACC_PUBLIC),
                body: None,
                annotations: Vec::new(),
                line_col: pos.clone(),
            });
            if let Some(default) = &decl.params[count].default {
                self.job(id, pos.clone(), JobKind::ForwardConstructor { id: overload, target, default });
            }
            target = overload;
        }

        if !static_parts.is_empty() {
            self.job(id, pos, JobKind::StaticInit { parts: static_parts });
        }
        Ok(())
    }

    fn interface(&mut self, id: TypeId, decl: &'u ast::InterfaceDecl) -> Result<()> {
        let mut interfaces = Vec::with_capacity(decl.extends.len());
        for i in &decl.extends {
            interfaces.push(self.type_ref(i)?);
        }
        let annotations = self.annotations(&decl.annotations)?;
        self.set_hierarchy(id, None, interfaces, annotations);

        let mut field_names = HashSet::new();
        let mut static_parts = Vec::new();
        for member in &decl.body {
            match member {
                InterfaceMember::Field(f) => {
                    let fpos = self.pos(f.span);
                    let written = translate_modifiers(&f.modifiers, Site::Field, &fpos)?;
                    if written.access() != Access::Public {
                        return Err(Error::semantic(
                            SemanticErrorKind::IllegalModifier,
                            format!("interface field {} must be public", f.name),
                            &fpos,
                        ));
                    }
                    let ty = self.type_or_object(f.ty.as_ref())?;
                    let annotations = self.annotations(&f.annotations)?;
                    let modifiers = Modifiers(ACC_PUBLIC | ACC_STATIC | ACC_FINAL);
                    let fid = self.add_field(id, &f.name, ty, modifiers, annotations, fpos, &mut field_names)?;
                    if let Some(init) = &f.init {
                        static_parts.push(StaticPart::Field(fid, init));
                    }
                }
                InterfaceMember::Method(m) => self.method(id, m, true)?,
            }
        }
        if !static_parts.is_empty() {
            let pos = self.pos(decl.span);
            self.job(id, pos, JobKind::StaticInit { parts: static_parts });
        }
        Ok(())
    }

    fn annotation(&mut self, id: TypeId, decl: &'u ast::AnnotationDecl) -> Result<()> {
        let root = self.session.repo.well_known(ANNOTATION_ROOT)?;
        let annotations = self.annotations(&decl.annotations)?;
        self.set_hierarchy(id, None, vec![root], annotations);
        let mut names = HashSet::new();
        for element in &decl.elements {
            let pos = self.pos(element.span);
            if !names.insert(element.name.as_str()) {
                return Err(Error::semantic(
                    SemanticErrorKind::Duplicate,
                    format!("duplicate element {}", element.name),
                    &pos,
                ));
            }
            let ty = self.type_ref(&element.ty)?;
            let annotation_default = match &element.default {
                Some(value) => Some(self.element_value(value, ty)?),
                None => None,
            };
            self.session.repo.add_method(MethodDef {
                name: element.name.clone(),
                declaring: id,
                return_type: ty,
                params: Vec::new(),
                modifiers: Modifiers(ACC_PUBLIC | ACC_ABSTRACT),
                body: None,
                annotations: Vec::new(),
                overrides: Vec::new(),
                overridden_by: Vec::new(),
                annotation_default,
                line_col: pos,
            });
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn add_field(
        &mut self,
        owner: TypeId,
        name: &str,
        ty: TypeId,
        modifiers: Modifiers,
        annotations: Vec<AnnotationInstance>,
        pos: LineCol,
        names: &mut HashSet<String>,
    ) -> Result<FieldId> {
        if !names.insert(name.to_string()) {
            return Err(Error::semantic(SemanticErrorKind::Duplicate, format!("duplicate field {}", name), &pos));
        }
        if ty == TypeId::VOID {
            return Err(Error::semantic(SemanticErrorKind::TypeMismatch, format!("field {} cannot be void", name), &pos));
        }
        Ok(self.session.repo.add_field(FieldDef {
            name: name.to_string(),
            ty,
            modifiers,
            declaring: owner,
            annotations,
            line_col: pos,
        }))
    }

    /// Parameter descriptors and the index of the first defaulted one
    fn params(&mut self, params: &[ast::Param]) -> Result<(Vec<Param>, usize)> {
        let mut out = Vec::with_capacity(params.len());
        let mut names = HashSet::new();
        let mut first_default = params.len();
        for (i, p) in params.iter().enumerate() {
            let pos = self.pos(p.span);
            translate_modifiers(&p.modifiers, Site::Param, &pos)?;
            if !names.insert(p.name.as_str()) {
                return Err(Error::semantic(SemanticErrorKind::Duplicate, format!("duplicate parameter {}", p.name), &pos));
            }
            match (&p.default, first_default < params.len()) {
                (Some(_), false) => first_default = i,
                (None, true) => {
                    return Err(Error::unexpected(
                        format!("parameter {} without a default after a defaulted parameter", p.name),
                        &pos,
                    ))
                }
                _ => {}
            }
            let ty = self.type_or_object(p.ty.as_ref())?;
            if ty == TypeId::VOID {
                return Err(Error::semantic(SemanticErrorKind::TypeMismatch, format!("parameter {} cannot be void", p.name), &pos));
            }
            let annotations = self.annotations(&p.annotations)?;
            out.push(Param { name: p.name.clone(), ty, annotations });
        }
        Ok((out, first_default))
    }

    fn check_signature_free(&self, owner: TypeId, name: &str, params: &[TypeId], pos: &LineCol) -> Result<()> {
        let repo = &*self.session.repo;
        let taken = repo
            .methods_of(owner)
            .iter()
            .map(|m| repo.method(*m))
            .any(|m| m.name == name && m.param_types() == params);
        if taken {
            return Err(Error::semantic(
                SemanticErrorKind::Duplicate,
                format!("duplicate method {}({} parameters)", name, params.len()),
                pos,
            ));
        }
        Ok(())
    }

    fn method(&mut self, owner: TypeId, decl: &'u ast::MethodDecl, in_interface: bool) -> Result<()> {
        let pos = self.pos(decl.span);
        let mut modifiers = translate_modifiers(&decl.modifiers, Site::Method, &pos)?;
        if decl.body.is_some() && modifiers.is_abstract() {
            return Err(Error::semantic(
                SemanticErrorKind::IllegalModifier,
                format!("abstract method {} has a body", decl.name),
                &pos,
            ));
        }
        if in_interface && modifiers.access() != Access::Public {
            return Err(Error::semantic(
                SemanticErrorKind::IllegalModifier,
                format!("interface method {} must be public", decl.name),
                &pos,
            ));
        }
        if in_interface && modifiers.is_final() {
            return Err(Error::semantic(
                SemanticErrorKind::IllegalModifier,
                format!("interface method {} cannot be final", decl.name),
                &pos,
            ));
        }
        if decl.body.is_none() {
            if modifiers.is_static() {
                return Err(Error::semantic(
                    SemanticErrorKind::IllegalModifier,
                    format!("static method {} needs a body", decl.name),
                    &pos,
                ));
            }
            modifiers.insert(ACC_ABSTRACT);
        }

        let (params, first_default) = self.params(&decl.params)?;
        let return_type = self.type_or_object(decl.return_type.as_ref())?;
        let annotations = self.annotations(&decl.annotations)?;
        let types: Vec<TypeId> = params.iter().map(|p| p.ty).collect();
        self.check_signature_free(owner, &decl.name, &types, &pos)?;
        let id = self.session.repo.add_method(MethodDef {
            name: decl.name.clone(),
            declaring: owner,
            return_type,
            params: params.clone(),
            modifiers,
            body: None,
            annotations,
            overrides: Vec::new(),
            overridden_by: Vec::new(),
            annotation_default: None,
            line_col: pos.clone(),
        });
        if let Some(body) = &decl.body {
            self.job(owner, pos.clone(), JobKind::Method { id, body });
        }

        let mut overload_modifiers = modifiers;
        overload_modifiers.remove(ACC_ABSTRACT);
        let mut target = id;
        for count in (first_default..params.len()).rev() {
            self.check_signature_free(owner, &decl.name, &types[..count], &pos)?;
            let overload = self.session.repo.add_method(MethodDef {
                name: decl.name.clone(),
                declaring: owner,
                return_type,
                params: params[..count].to_vec(),
                modifiers: overload_modifiers,
                body: None,
                annotations: Vec::new(),
                overrides: Vec::new(),
                overridden_by: Vec::new(),
                annotation_default: None,
                line_col: pos.clone(),
            });
            if let Some(default) = &decl.params[count].default {
                self.job(owner, pos.clone(), JobKind::ForwardMethod { id: overload, target, default });
            }
            target = overload;
        }
        Ok(())
    }

    fn annotations(&mut self, written: &[ast::Annotation]) -> Result<Vec<AnnotationInstance>> {
        let mut out: Vec<AnnotationInstance> = Vec::with_capacity(written.len());
        for a in written {
            let pos = self.pos(a.span);
            let ty = self.ctx.imports.require_type(self.session.repo, &a.name, &pos)?;
            if !matches!(self.session.repo.get(ty).kind, TypeKind::Annotation(_)) {
                return Err(Error::semantic(
                    SemanticErrorKind::TypeMismatch,
                    format!("{} is not an annotation type", self.session.repo.name(ty)),
                    &pos,
                ));
            }
            if out.iter().any(|existing| existing.ty == ty) {
                return Err(Error::semantic(
                    SemanticErrorKind::Duplicate,
                    format!("duplicate annotation @{}", a.name),
                    &pos,
                ));
            }
            let mut values = Vec::with_capacity(a.args.len());
            for (name, value) in &a.args {
                let repo = &*self.session.repo;
                let element = repo
                    .methods_of(ty)
                    .iter()
                    .map(|m| repo.method(*m))
                    .find(|m| &m.name == name && m.params.is_empty())
                    .map(|m| m.return_type);
                let Some(element_ty) = element else {
                    return Err(Error::not_found(
                        format!("annotation {} has no element {}", repo.name(ty), name),
                        &pos,
                    ));
                };
                values.push((name.clone(), self.element_value(value, element_ty)?));
            }
            out.push(AnnotationInstance { ty, values });
        }
        Ok(out)
    }

    /// Constant value of an annotation element of type `ty`
    fn element_value(&mut self, value: &Expr, ty: TypeId) -> Result<ElementValue> {
        let pos = self.pos(value.span());
        let unexpected = || Error::unexpected("non-constant annotation element value", &pos);
        let kind = self.session.repo.get(ty).kind.clone();
        match kind {
            TypeKind::Array { component, .. } => {
                let items: Vec<&Expr> = match value {
                    Expr::ArrayLit(list) => list.items.iter().collect(),
                    single => vec![single],
                };
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.element_value(item, component)?);
                }
                Ok(ElementValue::Array(out))
            }
            TypeKind::Primitive(kind) => {
                let (constant, kind) = match value {
                    Expr::Literal(lit) => self.literal_constant(&lit.value, false, kind, &pos)?,
                    Expr::Unary(u) if u.op == UnaryOp::Neg => match &*u.operand {
                        Expr::Literal(lit) => self.literal_constant(&lit.value, true, kind, &pos)?,
                        _ => return Err(unexpected()),
                    },
                    _ => return Err(unexpected()),
                };
                Ok(match (kind, constant) {
                    (PrimitiveKind::Boolean, Constant::Int(v)) => ElementValue::Bool(v != 0),
                    (PrimitiveKind::Byte, Constant::Int(v)) => ElementValue::Byte(v as i8),
                    (PrimitiveKind::Short, Constant::Int(v)) => ElementValue::Short(v as i16),
                    (PrimitiveKind::Char, Constant::Int(v)) => ElementValue::Char(v as u16),
                    (_, Constant::Int(v)) => ElementValue::Int(v),
                    (_, Constant::Long(v)) => ElementValue::Long(v),
                    (_, Constant::Float(v)) => ElementValue::Float(v),
                    (_, Constant::Double(v)) => ElementValue::Double(v),
                    _ => return Err(unexpected()),
                })
            }
            _ => {
                let name = self.session.repo.name(ty).to_string();
                if name == crate::consts::STRING {
                    return match value {
                        Expr::Literal(lit) => match &lit.value {
                            Literal::String(s) => Ok(ElementValue::String(s.clone())),
                            Literal::Char(c) => Ok(ElementValue::String(c.to_string())),
                            _ => Err(unexpected()),
                        },
                        _ => Err(unexpected()),
                    };
                }
                if name == CLASS {
                    let of = match value {
                        Expr::TypeOf(t) => self.type_ref(&t.ty)?,
                        other => match other.dotted_name() {
                            Some(dotted) => self.ctx.imports.require_type(self.session.repo, &dotted, &pos)?,
                            None => return Err(unexpected()),
                        },
                    };
                    return Ok(ElementValue::Class(self.session.repo.name(of).to_string()));
                }
                let is_enum = self
                    .session
                    .repo
                    .parent_of(ty)
                    .map(|p| self.session.repo.name(p) == ENUM_ROOT)
                    .unwrap_or(false);
                if is_enum {
                    let constant = match value {
                        Expr::Name(n) => n.name.clone(),
                        Expr::Access(a) => {
                            if let Some(target) = &a.target {
                                let qualifier = target.dotted_name().ok_or_else(unexpected)?;
                                let qualified = self.ctx.imports.require_type(self.session.repo, &qualifier, &pos)?;
                                if qualified != ty {
                                    return Err(Error::semantic(
                                        SemanticErrorKind::TypeMismatch,
                                        format!("{} is not a constant of {}", a.name, name),
                                        &pos,
                                    ));
                                }
                            }
                            a.name.clone()
                        }
                        _ => return Err(unexpected()),
                    };
                    return Ok(ElementValue::Enum { type_name: name, constant });
                }
                Err(unexpected())
            }
        }
    }

    fn literal_constant(
        &self,
        lit: &Literal,
        negative: bool,
        kind: PrimitiveKind,
        pos: &LineCol,
    ) -> Result<(Constant, PrimitiveKind)> {
        let mismatch = || {
            Error::semantic(SemanticErrorKind::TypeMismatch, format!("literal does not fit element type {}", kind), pos)
        };
        match lit {
            Literal::Number(text) => number_constant(text, negative, Some(kind), pos),
            Literal::Bool(b) if kind == PrimitiveKind::Boolean && !negative => Ok((Constant::Int(*b as i32), kind)),
            Literal::Char(c) if kind == PrimitiveKind::Char && !negative => Ok((Constant::Int(*c as i32), kind)),
            Literal::String(s) if kind == PrimitiveKind::Char && s.chars().count() == 1 && !negative => {
                Ok((Constant::Int(s.chars().next().map(|c| c as i32).unwrap_or(0)), kind))
            }
            _ => Err(mismatch()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos() -> LineCol {
        LineCol::synthetic()
    }

    #[test]
    fn test_members_default_to_public() {
        let m = translate_modifiers(&[Modifier::Static], Site::Method, &pos()).unwrap();
        assert_eq!(m.access(), Access::Public);
        assert!(m.is_static());
        let pkg = translate_modifiers(&[Modifier::Package], Site::Field, &pos()).unwrap();
        assert_eq!(pkg.access(), Access::Package);
        let local = translate_modifiers(&[Modifier::Final], Site::Local, &pos()).unwrap();
        assert_eq!(local.bits(), ACC_FINAL);
    }

    #[test]
    fn test_illegal_combinations() {
        let err = translate_modifiers(&[Modifier::Abstract, Modifier::Final], Site::Method, &pos()).unwrap_err();
        assert_eq!(err.semantic_kind(), Some(SemanticErrorKind::IllegalModifier));
        let err = translate_modifiers(&[Modifier::Public, Modifier::Private], Site::Field, &pos()).unwrap_err();
        assert_eq!(err.semantic_kind(), Some(SemanticErrorKind::IllegalModifier));
        let err = translate_modifiers(&[Modifier::Static, Modifier::Static], Site::Field, &pos()).unwrap_err();
        assert_eq!(err.semantic_kind(), Some(SemanticErrorKind::IllegalModifier));
    }

    #[test]
    fn test_misplaced_modifier_is_unexpected() {
        let err = translate_modifiers(&[Modifier::Synchronized], Site::Field, &pos()).unwrap_err();
        assert!(matches!(err, Error::UnexpectedConstruct { .. }));
        let err = translate_modifiers(&[Modifier::Private], Site::Param, &pos()).unwrap_err();
        assert!(matches!(err, Error::UnexpectedConstruct { .. }));
    }

    #[test]
    fn test_source_file_is_base_name() {
        assert_eq!(source_file_name("src/demo/Main.lt"), "Main.lt");
        assert_eq!(source_file_name("Main.lt"), "Main.lt");
    }
}
