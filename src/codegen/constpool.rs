//! Constant pool and constants for Java class files
//!
//! Entries are 1-based and deduplicated by their serialized form. `long` and
//! `double` entries take two indices.

use std::collections::HashMap;

use super::error::{ConstPoolError, ConstPoolResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class(u16),
    String(u16),
    FieldRef(u16, u16),
    MethodRef(u16, u16),
    InterfaceMethodRef(u16, u16),
    NameAndType(u16, u16),
    MethodHandle(u8, u16),
    MethodType(u16),
    InvokeDynamic(u16, u16),
}

mod constant_tags {
    pub const CONSTANT_UTF8: u8 = 1;
    pub const CONSTANT_INTEGER: u8 = 3;
    pub const CONSTANT_FLOAT: u8 = 4;
    pub const CONSTANT_LONG: u8 = 5;
    pub const CONSTANT_DOUBLE: u8 = 6;
    pub const CONSTANT_CLASS: u8 = 7;
    pub const CONSTANT_STRING: u8 = 8;
    pub const CONSTANT_FIELDREF: u8 = 9;
    pub const CONSTANT_METHODREF: u8 = 10;
    pub const CONSTANT_INTERFACEMETHODREF: u8 = 11;
    pub const CONSTANT_NAMEANDTYPE: u8 = 12;
    pub const CONSTANT_METHODHANDLE: u8 = 15;
    pub const CONSTANT_METHODTYPE: u8 = 16;
    pub const CONSTANT_INVOKEDYNAMIC: u8 = 18;
}

/// Encodes a string in the class-file "modified UTF-8" form
pub fn modified_utf8(value: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len());
    for unit in value.encode_utf16() {
        match unit {
            0x0001..=0x007f => out.push(unit as u8),
            0x0000 | 0x0080..=0x07ff => {
                out.push(0xc0 | ((unit >> 6) & 0x1f) as u8);
                out.push(0x80 | (unit & 0x3f) as u8);
            }
            _ => {
                out.push(0xe0 | ((unit >> 12) & 0x0f) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3f) as u8);
                out.push(0x80 | (unit & 0x3f) as u8);
            }
        }
    }
    out
}

impl Constant {
    pub fn to_bytes(&self) -> Vec<u8> {
        use constant_tags::*;
        let mut bytes = Vec::new();
        match self {
            Constant::Utf8(value) => {
                bytes.push(CONSTANT_UTF8);
                let utf8_bytes = modified_utf8(value);
                bytes.extend_from_slice(&(utf8_bytes.len() as u16).to_be_bytes());
                bytes.extend_from_slice(&utf8_bytes);
            }
            Constant::Integer(value) => {
                bytes.push(CONSTANT_INTEGER);
                bytes.extend_from_slice(&value.to_be_bytes());
            }
            Constant::Float(value) => {
                bytes.push(CONSTANT_FLOAT);
                bytes.extend_from_slice(&value.to_bits().to_be_bytes());
            }
            Constant::Long(value) => {
                bytes.push(CONSTANT_LONG);
                bytes.extend_from_slice(&value.to_be_bytes());
            }
            Constant::Double(value) => {
                bytes.push(CONSTANT_DOUBLE);
                bytes.extend_from_slice(&value.to_bits().to_be_bytes());
            }
            Constant::Class(name_index) => {
                bytes.push(CONSTANT_CLASS);
                bytes.extend_from_slice(&name_index.to_be_bytes());
            }
            Constant::String(string_index) => {
                bytes.push(CONSTANT_STRING);
                bytes.extend_from_slice(&string_index.to_be_bytes());
            }
            Constant::FieldRef(class_index, name_and_type_index) => {
                bytes.push(CONSTANT_FIELDREF);
                bytes.extend_from_slice(&class_index.to_be_bytes());
                bytes.extend_from_slice(&name_and_type_index.to_be_bytes());
            }
            Constant::MethodRef(class_index, name_and_type_index) => {
                bytes.push(CONSTANT_METHODREF);
                bytes.extend_from_slice(&class_index.to_be_bytes());
                bytes.extend_from_slice(&name_and_type_index.to_be_bytes());
            }
            Constant::InterfaceMethodRef(class_index, name_and_type_index) => {
                bytes.push(CONSTANT_INTERFACEMETHODREF);
                bytes.extend_from_slice(&class_index.to_be_bytes());
                bytes.extend_from_slice(&name_and_type_index.to_be_bytes());
            }
            Constant::NameAndType(name_index, descriptor_index) => {
                bytes.push(CONSTANT_NAMEANDTYPE);
                bytes.extend_from_slice(&name_index.to_be_bytes());
                bytes.extend_from_slice(&descriptor_index.to_be_bytes());
            }
            Constant::MethodHandle(reference_kind, reference_index) => {
                bytes.push(CONSTANT_METHODHANDLE);
                bytes.push(*reference_kind);
                bytes.extend_from_slice(&reference_index.to_be_bytes());
            }
            Constant::MethodType(descriptor_index) => {
                bytes.push(CONSTANT_METHODTYPE);
                bytes.extend_from_slice(&descriptor_index.to_be_bytes());
            }
            Constant::InvokeDynamic(bootstrap_method_attr_index, name_and_type_index) => {
                bytes.push(CONSTANT_INVOKEDYNAMIC);
                bytes.extend_from_slice(&bootstrap_method_attr_index.to_be_bytes());
                bytes.extend_from_slice(&name_and_type_index.to_be_bytes());
            }
        }
        bytes
    }

    /// Number of pool indices the entry occupies
    pub fn width(&self) -> u16 {
        match self {
            Constant::Long(_) | Constant::Double(_) => 2,
            _ => 1,
        }
    }
}

#[derive(Debug, Default)]
pub struct ConstantPool {
    constants: Vec<Constant>,
    index: HashMap<Vec<u8>, u16>,
    /// Next free index; index 0 is never used
    next: u16,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self { constants: Vec::new(), index: HashMap::new(), next: 1 }
    }

    /// Number of entries as written in `constant_pool_count`
    pub fn count(&self) -> u16 {
        self.next
    }

    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }

    fn add(&mut self, constant: Constant) -> ConstPoolResult<u16> {
        let key = constant.to_bytes();
        if let Some(existing) = self.index.get(&key) {
            return Ok(*existing);
        }
        let idx = self.next;
        let next = idx as u32 + constant.width() as u32;
        if next > u16::MAX as u32 {
            return Err(ConstPoolError::OutOfSpace);
        }
        self.next = next as u16;
        self.constants.push(constant);
        self.index.insert(key, idx);
        Ok(idx)
    }

    pub fn try_add_utf8(&mut self, value: &str) -> ConstPoolResult<u16> {
        self.add(Constant::Utf8(value.to_string()))
    }

    /// `name` is the internal (slash-separated) name or an array descriptor
    pub fn try_add_class(&mut self, name: &str) -> ConstPoolResult<u16> {
        let name_index = self.try_add_utf8(name)?;
        self.add(Constant::Class(name_index))
    }

    pub fn try_add_name_and_type(&mut self, name: &str, descriptor: &str) -> ConstPoolResult<u16> {
        let name_index = self.try_add_utf8(name)?;
        let descriptor_index = self.try_add_utf8(descriptor)?;
        self.add(Constant::NameAndType(name_index, descriptor_index))
    }

    pub fn try_add_field_ref(&mut self, class: &str, name: &str, descriptor: &str) -> ConstPoolResult<u16> {
        let class_index = self.try_add_class(class)?;
        let name_and_type_index = self.try_add_name_and_type(name, descriptor)?;
        self.add(Constant::FieldRef(class_index, name_and_type_index))
    }

    pub fn try_add_method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> ConstPoolResult<u16> {
        let class_index = self.try_add_class(class)?;
        let name_and_type_index = self.try_add_name_and_type(name, descriptor)?;
        self.add(Constant::MethodRef(class_index, name_and_type_index))
    }

    pub fn try_add_interface_method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> ConstPoolResult<u16> {
        let class_index = self.try_add_class(class)?;
        let name_and_type_index = self.try_add_name_and_type(name, descriptor)?;
        self.add(Constant::InterfaceMethodRef(class_index, name_and_type_index))
    }

    pub fn try_add_string(&mut self, value: &str) -> ConstPoolResult<u16> {
        let utf8_index = self.try_add_utf8(value)?;
        self.add(Constant::String(utf8_index))
    }

    pub fn try_add_integer(&mut self, value: i32) -> ConstPoolResult<u16> {
        self.add(Constant::Integer(value))
    }

    pub fn try_add_float(&mut self, value: f32) -> ConstPoolResult<u16> {
        self.add(Constant::Float(value))
    }

    pub fn try_add_long(&mut self, value: i64) -> ConstPoolResult<u16> {
        self.add(Constant::Long(value))
    }

    pub fn try_add_double(&mut self, value: f64) -> ConstPoolResult<u16> {
        self.add(Constant::Double(value))
    }

    pub fn try_add_method_handle(&mut self, reference_kind: u8, reference_index: u16) -> ConstPoolResult<u16> {
        self.add(Constant::MethodHandle(reference_kind, reference_index))
    }

    pub fn try_add_method_type(&mut self, descriptor: &str) -> ConstPoolResult<u16> {
        let descriptor_index = self.try_add_utf8(descriptor)?;
        self.add(Constant::MethodType(descriptor_index))
    }

    pub fn try_add_invoke_dynamic(&mut self, bootstrap_index: u16, name: &str, descriptor: &str) -> ConstPoolResult<u16> {
        let name_and_type_index = self.try_add_name_and_type(name, descriptor)?;
        self.add(Constant::InvokeDynamic(bootstrap_index, name_and_type_index))
    }

    /// Entry at a 1-based pool index
    pub fn get(&self, index: u16) -> ConstPoolResult<&Constant> {
        let mut cursor = 1u16;
        for constant in &self.constants {
            if cursor == index {
                return Ok(constant);
            }
            cursor += constant.width();
        }
        Err(ConstPoolError::InvalidIndex(index))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&self.count().to_be_bytes());
        for constant in &self.constants {
            bytes.extend_from_slice(&constant.to_bytes());
        }
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_are_deduplicated() {
        let mut cp = ConstantPool::new();
        let a = cp.try_add_method_ref("java/lang/Object", "<init>", "()V").unwrap();
        let b = cp.try_add_method_ref("java/lang/Object", "<init>", "()V").unwrap();
        assert_eq!(a, b);
        let s1 = cp.try_add_string("hi").unwrap();
        let s2 = cp.try_add_string("hi").unwrap();
        assert_eq!(s1, s2);
        assert_eq!(cp.try_add_utf8("java/lang/Object").unwrap(), 1);
    }

    #[test]
    fn test_wide_entries_take_two_slots() {
        let mut cp = ConstantPool::new();
        let l = cp.try_add_long(7).unwrap();
        let i = cp.try_add_integer(7).unwrap();
        assert_eq!(l, 1);
        assert_eq!(i, 3);
        assert_eq!(cp.count(), 4);
        assert_eq!(cp.get(3).unwrap(), &Constant::Integer(7));
        assert!(cp.get(2).is_err());
    }

    #[test]
    fn test_modified_utf8_encoding() {
        assert_eq!(modified_utf8("a\0"), vec![b'a', 0xc0, 0x80]);
        // supplementary characters become two three-byte surrogates
        assert_eq!(modified_utf8("\u{1F600}").len(), 6);
    }
}
