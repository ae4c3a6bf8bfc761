//! Annotation attributes
//!
//! An annotation is written into `RuntimeVisibleAnnotations` only when its
//! type carries `@Retention(RetentionPolicy.RUNTIME)`; every other annotation
//! goes to `RuntimeInvisibleAnnotations`.

use crate::common::repository::TypeRepository;
use crate::common::types::{AnnotationInstance, ElementValue, TypeId};

use super::attribute::AttributeInfo;
use super::constpool::ConstantPool;
use super::descriptor::{descriptor_of_name, type_descriptor};
use super::error::ConstPoolResult;

pub const RETENTION: &str = "java.lang.annotation.Retention";
pub const RETENTION_POLICY: &str = "java.lang.annotation.RetentionPolicy";

/// Whether instances of the annotation type are visible at run time
pub fn is_runtime_visible(repo: &TypeRepository, annotation_type: TypeId) -> bool {
    let Some(info) = repo.get(annotation_type).ref_info() else {
        return false;
    };
    info.annotations.iter().any(|a| {
        repo.name(a.ty) == RETENTION
            && matches!(
                a.value("value"),
                Some(ElementValue::Enum { type_name, constant })
                    if type_name == RETENTION_POLICY && constant == "RUNTIME"
            )
    })
}

/// Builds the visible and invisible annotation attributes, omitting empty ones
pub fn annotation_attributes(
    repo: &TypeRepository,
    cp: &mut ConstantPool,
    annotations: &[AnnotationInstance],
) -> ConstPoolResult<Vec<AttributeInfo>> {
    let (visible, invisible): (Vec<_>, Vec<_>) =
        annotations.iter().partition(|a| is_runtime_visible(repo, a.ty));
    let mut attributes = Vec::new();
    for (name, group) in [("RuntimeVisibleAnnotations", visible), ("RuntimeInvisibleAnnotations", invisible)] {
        if group.is_empty() {
            continue;
        }
        let mut info = Vec::new();
        info.extend_from_slice(&(group.len() as u16).to_be_bytes());
        for annotation in group {
            write_annotation(repo, cp, annotation, &mut info)?;
        }
        attributes.push(AttributeInfo::named(cp, name, info)?);
    }
    Ok(attributes)
}

pub fn annotation_default_attribute(
    repo: &TypeRepository,
    cp: &mut ConstantPool,
    value: &ElementValue,
) -> ConstPoolResult<AttributeInfo> {
    let mut info = Vec::new();
    write_element_value(repo, cp, value, &mut info)?;
    AttributeInfo::named(cp, "AnnotationDefault", info)
}

fn write_annotation(
    repo: &TypeRepository,
    cp: &mut ConstantPool,
    annotation: &AnnotationInstance,
    out: &mut Vec<u8>,
) -> ConstPoolResult<()> {
    let type_index = cp.try_add_utf8(&type_descriptor(repo, annotation.ty))?;
    out.extend_from_slice(&type_index.to_be_bytes());
    out.extend_from_slice(&(annotation.values.len() as u16).to_be_bytes());
    for (name, value) in &annotation.values {
        out.extend_from_slice(&cp.try_add_utf8(name)?.to_be_bytes());
        write_element_value(repo, cp, value, out)?;
    }
    Ok(())
}

fn write_element_value(
    repo: &TypeRepository,
    cp: &mut ConstantPool,
    value: &ElementValue,
    out: &mut Vec<u8>,
) -> ConstPoolResult<()> {
    let (tag, index) = match value {
        ElementValue::Int(v) => (b'I', cp.try_add_integer(*v)?),
        ElementValue::Long(v) => (b'J', cp.try_add_long(*v)?),
        ElementValue::Float(v) => (b'F', cp.try_add_float(*v)?),
        ElementValue::Double(v) => (b'D', cp.try_add_double(*v)?),
        ElementValue::Bool(v) => (b'Z', cp.try_add_integer(*v as i32)?),
        ElementValue::Char(v) => (b'C', cp.try_add_integer(*v as i32)?),
        ElementValue::Short(v) => (b'S', cp.try_add_integer(*v as i32)?),
        ElementValue::Byte(v) => (b'B', cp.try_add_integer(*v as i32)?),
        ElementValue::String(v) => (b's', cp.try_add_utf8(v)?),
        ElementValue::Class(name) => (b'c', cp.try_add_utf8(&descriptor_of_name(name))?),
        ElementValue::Enum { type_name, constant } => {
            out.push(b'e');
            out.extend_from_slice(&cp.try_add_utf8(&descriptor_of_name(type_name))?.to_be_bytes());
            out.extend_from_slice(&cp.try_add_utf8(constant)?.to_be_bytes());
            return Ok(());
        }
        ElementValue::Annotation(nested) => {
            out.push(b'@');
            return write_annotation(repo, cp, nested, out);
        }
        ElementValue::Array(values) => {
            out.push(b'[');
            out.extend_from_slice(&(values.len() as u16).to_be_bytes());
            for v in values {
                write_element_value(repo, cp, v, out)?;
            }
            return Ok(());
        }
    };
    out.push(tag);
    out.extend_from_slice(&index.to_be_bytes());
    Ok(())
}
