//! Class-file type source
//!
//! Indexes the `.class` files under a set of class-path directories and
//! describes a requested type by parsing its class file. Runtime-visible
//! annotations are decoded so that `@Retention` survives the round trip
//! through compiled libraries.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use classfile_parser::attribute_info::AttributeInfo;
use classfile_parser::class_parser;
use classfile_parser::constant_info::ConstantInfo;
use walkdir::WalkDir;

use crate::codegen::descriptor::parse_field_descriptor;
use crate::error::{Error, Result};

use super::repository::{AnnotationStub, ClassStub, MemberStub, TypeSource};
use super::types::ElementValue;

const RUNTIME_VISIBLE_ANNOTATIONS: &str = "RuntimeVisibleAnnotations";

pub struct ClassFileSource {
    roots: Vec<PathBuf>,
    /// Binary name → class file
    index: HashMap<String, PathBuf>,
}

impl ClassFileSource {
    /// Indexes every class file below the given directories; the first
    /// directory providing a name wins
    pub fn new(roots: &[PathBuf]) -> Result<Self> {
        let mut index = HashMap::new();
        for root in roots {
            if !root.is_dir() {
                log::debug!("class path entry {} is not a directory, skipped", root.display());
                continue;
            }
            for entry in WalkDir::new(root).follow_links(true) {
                let entry = entry.map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
                let path = entry.path();
                if !entry.file_type().is_file() || path.extension().and_then(|e| e.to_str()) != Some("class") {
                    continue;
                }
                if let Some(name) = binary_name(root, path) {
                    index.entry(name).or_insert_with(|| path.to_path_buf());
                }
            }
        }
        log::debug!("class path indexed: {} classes under {} roots", index.len(), roots.len());
        Ok(Self { roots: roots.to_vec(), index })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }
}

/// `root/a/b/C$D.class` → `a.b.C$D`
fn binary_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?.with_extension("");
    let parts: Vec<&str> = relative.components().map(|c| c.as_os_str().to_str()).collect::<Option<_>>()?;
    Some(parts.join("."))
}

fn invalid(path: &Path, message: impl std::fmt::Display) -> Error {
    io::Error::new(io::ErrorKind::InvalidData, format!("{}: {}", path.display(), message)).into()
}

impl TypeSource for ClassFileSource {
    fn describe(&self) -> String {
        format!("class path ({} roots, {} classes)", self.roots.len(), self.index.len())
    }

    fn load(&self, full_name: &str) -> Result<Option<ClassStub>> {
        let Some(path) = self.index.get(full_name) else {
            return Ok(None);
        };
        let bytes = fs::read(path)?;
        let class = match class_parser(&bytes) {
            Ok((_, class)) => class,
            Err(e) => return Err(invalid(path, format!("malformed class file ({:?})", e))),
        };
        let pool = Pool { entries: &class.const_pool, path };

        let super_name = match class.super_class {
            0 => None,
            index => Some(pool.class_name(index)?),
        };
        let mut interfaces = Vec::with_capacity(class.interfaces.len());
        for index in &class.interfaces {
            interfaces.push(pool.class_name(*index)?);
        }
        let mut fields = Vec::with_capacity(class.fields.len());
        for field in &class.fields {
            fields.push(MemberStub {
                name: pool.utf8(field.name_index)?.to_string(),
                descriptor: pool.utf8(field.descriptor_index)?.to_string(),
                access_flags: field.access_flags.bits(),
                annotations: pool.annotations(&field.attributes)?,
            });
        }
        let mut methods = Vec::with_capacity(class.methods.len());
        for method in &class.methods {
            methods.push(MemberStub {
                name: pool.utf8(method.name_index)?.to_string(),
                descriptor: pool.utf8(method.descriptor_index)?.to_string(),
                access_flags: method.access_flags.bits(),
                annotations: pool.annotations(&method.attributes)?,
            });
        }
        Ok(Some(ClassStub {
            name: full_name.to_string(),
            access_flags: class.access_flags.bits(),
            super_name,
            interfaces,
            fields,
            methods,
            annotations: pool.annotations(&class.attributes)?,
        }))
    }
}

/// Typed access to a parsed constant pool (1-based indices)
struct Pool<'a> {
    entries: &'a [ConstantInfo],
    path: &'a Path,
}

impl<'a> Pool<'a> {
    fn entry(&self, index: u16) -> Result<&'a ConstantInfo> {
        (index as usize)
            .checked_sub(1)
            .and_then(|i| self.entries.get(i))
            .ok_or_else(|| invalid(self.path, format!("constant pool index {} out of range", index)))
    }

    fn utf8(&self, index: u16) -> Result<&'a str> {
        match self.entry(index)? {
            ConstantInfo::Utf8(c) => Ok(&c.utf8_string),
            _ => Err(invalid(self.path, format!("constant {} is not a Utf8 entry", index))),
        }
    }

    fn class_name(&self, index: u16) -> Result<String> {
        match self.entry(index)? {
            ConstantInfo::Class(c) => Ok(self.utf8(c.name_index)?.replace('/', ".")),
            _ => Err(invalid(self.path, format!("constant {} is not a Class entry", index))),
        }
    }

    fn type_name(&self, index: u16) -> Result<String> {
        let desc = self.utf8(index)?;
        parse_field_descriptor(desc).map(|(name, _)| name).map_err(|e| invalid(self.path, e))
    }

    fn annotations(&self, attributes: &[AttributeInfo]) -> Result<Vec<AnnotationStub>> {
        let mut out = Vec::new();
        for attribute in attributes {
            if self.utf8(attribute.attribute_name_index)? != RUNTIME_VISIBLE_ANNOTATIONS {
                continue;
            }
            let mut reader = Reader { bytes: &attribute.info, pos: 0, path: self.path };
            let count = reader.u2()?;
            for _ in 0..count {
                out.push(self.annotation(&mut reader)?);
            }
        }
        Ok(out)
    }

    fn annotation(&self, reader: &mut Reader<'_>) -> Result<AnnotationStub> {
        let type_name = self.type_name(reader.u2()?)?;
        let pairs = reader.u2()?;
        let mut values = Vec::with_capacity(pairs as usize);
        for _ in 0..pairs {
            let name = self.utf8(reader.u2()?)?.to_string();
            values.push((name, self.element_value(reader)?));
        }
        Ok(AnnotationStub { type_name, values })
    }

    fn element_value(&self, reader: &mut Reader<'_>) -> Result<ElementValue> {
        let tag = reader.u1()?;
        let value = match tag {
            b'B' | b'C' | b'I' | b'S' | b'Z' => {
                let v = match self.entry(reader.u2()?)? {
                    ConstantInfo::Integer(c) => c.value,
                    _ => return Err(invalid(self.path, "integer element value expected")),
                };
                match tag {
                    b'B' => ElementValue::Byte(v as i8),
                    b'C' => ElementValue::Char(v as u16),
                    b'S' => ElementValue::Short(v as i16),
                    b'Z' => ElementValue::Bool(v != 0),
                    _ => ElementValue::Int(v),
                }
            }
            b'J' => match self.entry(reader.u2()?)? {
                ConstantInfo::Long(c) => ElementValue::Long(c.value),
                _ => return Err(invalid(self.path, "long element value expected")),
            },
            b'F' => match self.entry(reader.u2()?)? {
                ConstantInfo::Float(c) => ElementValue::Float(c.value),
                _ => return Err(invalid(self.path, "float element value expected")),
            },
            b'D' => match self.entry(reader.u2()?)? {
                ConstantInfo::Double(c) => ElementValue::Double(c.value),
                _ => return Err(invalid(self.path, "double element value expected")),
            },
            b's' => ElementValue::String(self.utf8(reader.u2()?)?.to_string()),
            b'e' => {
                let type_name = self.type_name(reader.u2()?)?;
                let constant = self.utf8(reader.u2()?)?.to_string();
                ElementValue::Enum { type_name, constant }
            }
            b'c' => ElementValue::Class(self.type_name(reader.u2()?)?),
            b'@' => {
                // nested annotations keep only their type name and values;
                // they are never re-emitted from a loaded stub
                let nested = self.annotation(reader)?;
                ElementValue::Array(nested.values.into_iter().map(|(_, v)| v).collect())
            }
            b'[' => {
                let count = reader.u2()?;
                let mut items = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    items.push(self.element_value(reader)?);
                }
                ElementValue::Array(items)
            }
            other => return Err(invalid(self.path, format!("unknown element value tag {:?}", other as char))),
        };
        Ok(value)
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
    path: &'a Path,
}

impl Reader<'_> {
    fn u1(&mut self) -> Result<u8> {
        let b = *self.bytes.get(self.pos).ok_or_else(|| invalid(self.path, "truncated annotation"))?;
        self.pos += 1;
        Ok(b)
    }

    fn u2(&mut self) -> Result<u16> {
        Ok(((self.u1()? as u16) << 8) | self.u1()? as u16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_names_from_paths() {
        let root = Path::new("/cp");
        assert_eq!(binary_name(root, Path::new("/cp/a/b/C$D.class")), Some("a.b.C$D".to_string()));
        assert_eq!(binary_name(root, Path::new("/cp/Top.class")), Some("Top".to_string()));
    }

    #[test]
    fn test_missing_directory_is_skipped() {
        let source = ClassFileSource::new(&[PathBuf::from("/definitely/not/here")]).unwrap();
        assert!(source.is_empty());
        assert!(source.load("a.B").unwrap().is_none());
    }
}
