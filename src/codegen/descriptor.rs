//! Utilities to build and parse method/field descriptors
//!
//! Type names inside the repository use the platform's binary-name form:
//! `int`, `java.lang.String`, and `[I` / `[Ljava.lang.String;` for arrays.

use crate::common::repository::TypeRepository;
use crate::common::types::{PrimitiveKind, TypeId, TypeKind};

use super::error::DescriptorError;

pub fn type_descriptor(repo: &TypeRepository, ty: TypeId) -> String {
    let desc = repo.get(ty);
    match &desc.kind {
        TypeKind::Primitive(kind) => kind.descriptor().to_string(),
        TypeKind::Void => "V".to_string(),
        TypeKind::Array { .. } => desc.full_name.replace('.', "/"),
        // the null type never reaches a signature; treat it as the root type
        TypeKind::Null => "Ljava/lang/Object;".to_string(),
        _ => format!("L{};", desc.full_name.replace('.', "/")),
    }
}

/// Name used in `CONSTANT_Class` entries
pub fn internal_name(repo: &TypeRepository, ty: TypeId) -> String {
    repo.get(ty).full_name.replace('.', "/")
}

pub fn method_descriptor(repo: &TypeRepository, params: &[TypeId], ret: TypeId) -> String {
    let mut d = String::from("(");
    for p in params {
        d.push_str(&type_descriptor(repo, *p));
    }
    d.push(')');
    d.push_str(&type_descriptor(repo, ret));
    d
}

/// Parses one field descriptor at the start of `desc`, returning the
/// repository type name and the number of bytes consumed
pub fn parse_field_descriptor(desc: &str) -> Result<(String, usize), DescriptorError> {
    let invalid = || DescriptorError::InvalidTypeDescriptor { descriptor: desc.to_string() };
    let bytes = desc.as_bytes();
    let mut dims = 0;
    while dims < bytes.len() && bytes[dims] == b'[' {
        dims += 1;
    }
    let first = *bytes.get(dims).ok_or_else(invalid)? as char;
    let end = if first == 'L' {
        dims + desc[dims..].find(';').ok_or_else(invalid)? + 1
    } else if PrimitiveKind::from_descriptor(first).is_some() || (first == 'V' && dims == 0) {
        dims + 1
    } else {
        return Err(invalid());
    };
    let name = if dims > 0 {
        desc[..end].replace('/', ".")
    } else if first == 'L' {
        desc[1..end - 1].replace('/', ".")
    } else if first == 'V' {
        "void".to_string()
    } else {
        PrimitiveKind::from_descriptor(first).ok_or_else(invalid)?.name().to_string()
    };
    Ok((name, end))
}

/// Parses `(params)ret` into repository type names
pub fn parse_method_descriptor(desc: &str) -> Result<(Vec<String>, String), DescriptorError> {
    let invalid = || DescriptorError::InvalidMethodDescriptor { descriptor: desc.to_string() };
    let inner = desc.strip_prefix('(').ok_or_else(invalid)?;
    let close = inner.find(')').ok_or_else(invalid)?;
    let mut params = Vec::new();
    let mut rest = &inner[..close];
    while !rest.is_empty() {
        let (name, used) = parse_field_descriptor(rest).map_err(|_| invalid())?;
        params.push(name);
        rest = &rest[used..];
    }
    let ret_desc = &inner[close + 1..];
    let (ret, used) = parse_field_descriptor(ret_desc).map_err(|_| invalid())?;
    if used != ret_desc.len() {
        return Err(invalid());
    }
    Ok((params, ret))
}

/// Field descriptor of a repository type name, without a repository lookup
pub fn descriptor_of_name(name: &str) -> String {
    if let Some(kind) = PrimitiveKind::from_name(name) {
        kind.descriptor().to_string()
    } else if name == "void" {
        "V".to_string()
    } else if name.starts_with('[') {
        name.replace('.', "/")
    } else {
        format!("L{};", name.replace('.', "/"))
    }
}

/// Array type name for `dimension` levels over an element type name
pub fn array_type_name(element_descriptor: &str, dimension: u8) -> String {
    let mut name = "[".repeat(dimension as usize);
    name.push_str(&element_descriptor.replace('/', "."));
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_field_descriptors() {
        assert_eq!(parse_field_descriptor("I").unwrap(), ("int".to_string(), 1));
        assert_eq!(
            parse_field_descriptor("Ljava/lang/String;I").unwrap(),
            ("java.lang.String".to_string(), 18)
        );
        assert_eq!(parse_field_descriptor("[[J").unwrap(), ("[[J".to_string(), 3));
        assert_eq!(
            parse_field_descriptor("[Ljava/lang/Object;").unwrap().0,
            "[Ljava.lang.Object;"
        );
        assert!(parse_field_descriptor("Q").is_err());
        assert!(parse_field_descriptor("[V").is_err());
    }

    #[test]
    fn test_parse_method_descriptor() {
        let (params, ret) = parse_method_descriptor("(ILjava/lang/String;[D)V").unwrap();
        assert_eq!(params, vec!["int", "java.lang.String", "[D"]);
        assert_eq!(ret, "void");
        assert!(parse_method_descriptor("I)V").is_err());
        assert!(parse_method_descriptor("()VV").is_err());
    }

    #[test]
    fn test_descriptor_of_name() {
        assert_eq!(descriptor_of_name("long"), "J");
        assert_eq!(descriptor_of_name("java.lang.String"), "Ljava/lang/String;");
        assert_eq!(descriptor_of_name("[Ljava.lang.String;"), "[Ljava/lang/String;");
    }

    #[test]
    fn test_array_type_name() {
        assert_eq!(array_type_name("Ljava/lang/String;", 2), "[[Ljava.lang.String;");
        assert_eq!(array_type_name("I", 1), "[I");
    }
}
