//! Class writer: turns one class, interface or annotation descriptor compiled
//! in this run into a [`ClassFile`]

use crate::common::repository::TypeRepository;
use crate::common::types::{TypeId, TypeKind};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::ir::Body;

use super::annotation::{annotation_attributes, annotation_default_attribute};
use super::attribute::{make_bootstrap_methods_attribute, make_code_attribute, make_source_file_attribute, AttributeInfo};
use super::bytecode::access_flags::*;
use super::class::{ClassFile, MemberInfo};
use super::defs::{CONSTRUCTOR_METHOD_NAME, STATIC_INITIALIZER_METHOD_NAME};
use super::descriptor::{internal_name, method_descriptor, type_descriptor};
use super::emitter::{emit_body, BootstrapTable, ClassContext, MemberShape};
use super::error::ClassGenerationError;
use super::writer::ClassfileWritable;

const CLASS_FLAGS: u16 = ACC_PUBLIC | ACC_FINAL | ACC_ABSTRACT;
const FIELD_FLAGS: u16 = ACC_PUBLIC | ACC_PRIVATE | ACC_PROTECTED | ACC_STATIC | ACC_FINAL | ACC_VOLATILE | ACC_TRANSIENT | ACC_SYNTHETIC;
const METHOD_FLAGS: u16 = ACC_PUBLIC
    | ACC_PRIVATE
    | ACC_PROTECTED
    | ACC_STATIC
    | ACC_FINAL
    | ACC_SYNCHRONIZED
    | ACC_VARARGS
    | ACC_ABSTRACT
    | ACC_STRICT
    | ACC_SYNTHETIC;

/// Class writer for one type
pub struct ClassWriter<'a> {
    repo: &'a TypeRepository,
    config: &'a Config,
}

impl<'a> ClassWriter<'a> {
    pub fn new(repo: &'a TypeRepository, config: &'a Config) -> Self {
        Self { repo, config }
    }

    /// Serializes the type to class-file bytes
    pub fn write(&self, ty: TypeId) -> Result<Vec<u8>> {
        let class = self.generate(ty)?;
        Ok(class.to_classfile_bytes()?)
    }

    pub fn generate(&self, ty: TypeId) -> Result<ClassFile> {
        let repo = self.repo;
        let desc = repo.get(ty);
        let info = desc
            .ref_info()
            .ok_or_else(|| Error::internal(format!("cannot generate a class file for {}", desc.full_name)))?;
        log::debug!("emitting {}", desc.full_name);

        let mut class = ClassFile::new();
        class.major_version = self.config.major_version()?;
        let mut bootstraps = BootstrapTable::new();
        let cp = &mut class.constant_pool;

        let modifiers = info.modifiers.bits();
        class.access_flags = match desc.kind {
            TypeKind::Class(_) => (modifiers & CLASS_FLAGS) | ACC_SUPER,
            TypeKind::Interface(_) => (modifiers & ACC_PUBLIC) | ACC_INTERFACE | ACC_ABSTRACT,
            _ => (modifiers & ACC_PUBLIC) | ACC_INTERFACE | ACC_ABSTRACT | ACC_ANNOTATION,
        };
        class.this_class = cp.try_add_class(&internal_name(repo, ty))?;
        class.super_class = match info.parent {
            Some(parent) => cp.try_add_class(&internal_name(repo, parent))?,
            None => cp.try_add_class("java/lang/Object")?,
        };
        for interface in &info.interfaces {
            class.interfaces.push(cp.try_add_class(&internal_name(repo, *interface))?);
        }

        for field in &info.fields {
            let def = repo.field(*field);
            let name_index = cp.try_add_utf8(&def.name)?;
            let descriptor_index = cp.try_add_utf8(&type_descriptor(repo, def.ty))?;
            let mut field_info = MemberInfo::new(def.modifiers.bits() & FIELD_FLAGS, name_index, descriptor_index);
            field_info.attributes = annotation_attributes(repo, cp, &def.annotations)?;
            class.fields.push(field_info);
        }

        let mut ctx = ClassContext { repo, config: self.config, cp, bootstraps: &mut bootstraps };

        for ctor in &info.constructors {
            let def = repo.constructor(*ctor);
            let params = def.param_types();
            let mut method = self.method_info(
                &mut ctx,
                CONSTRUCTOR_METHOD_NAME,
                def.modifiers.bits(),
                &params,
                TypeId::VOID,
                def.body.as_ref(),
            )?;
            method.attributes.extend(annotation_attributes(repo, ctx.cp, &def.annotations)?);
            class.methods.push(method);
        }

        for m in &info.methods {
            let def = repo.method(*m);
            let params = def.param_types();
            let mut method =
                self.method_info(&mut ctx, &def.name, def.modifiers.bits(), &params, def.return_type, def.body.as_ref())?;
            method.attributes.extend(annotation_attributes(repo, ctx.cp, &def.annotations)?);
            if let Some(default) = &def.annotation_default {
                method.attributes.push(annotation_default_attribute(repo, ctx.cp, default)?);
            }
            class.methods.push(method);
        }

        if let Some(static_init) = &info.static_init {
            let method = self.method_info(
                &mut ctx,
                STATIC_INITIALIZER_METHOD_NAME,
                ACC_STATIC,
                &[],
                TypeId::VOID,
                Some(static_init),
            )?;
            class.methods.push(method);
        }

        let mut attributes: Vec<AttributeInfo> = Vec::new();
        if self.config.emit_source_file {
            if let Some(file) = &info.source_file {
                attributes.push(make_source_file_attribute(ctx.cp, file)?);
            }
        }
        attributes.extend(annotation_attributes(repo, ctx.cp, &info.annotations)?);
        if !bootstraps.is_empty() {
            attributes.push(make_bootstrap_methods_attribute(&mut class.constant_pool, bootstraps.methods())?);
        }
        class.attributes = attributes;

        check_count("fields", class.fields.len())?;
        check_count("methods", class.methods.len())?;
        check_count("interfaces", class.interfaces.len())?;
        Ok(class)
    }

    fn method_info(
        &self,
        ctx: &mut ClassContext<'_>,
        name: &str,
        flags: u16,
        params: &[TypeId],
        return_type: TypeId,
        body: Option<&Body>,
    ) -> Result<MemberInfo> {
        let name_index = ctx.cp.try_add_utf8(name)?;
        let descriptor_index = ctx.cp.try_add_utf8(&method_descriptor(self.repo, params, return_type))?;
        let mut method = MemberInfo::new(flags & METHOD_FLAGS, name_index, descriptor_index);
        if let Some(body) = body {
            let shape = MemberShape { name, is_static: flags & ACC_STATIC != 0, params, return_type };
            let code = emit_body(ctx, &shape, body)?;
            method.attributes.push(make_code_attribute(ctx.cp, &code)?);
        }
        Ok(method)
    }
}

fn check_count(what: &'static str, count: usize) -> Result<()> {
    if count > u16::MAX as usize {
        return Err(ClassGenerationError::TooMany { what, count }.into());
    }
    Ok(())
}
