//! Attributes and exception table structures for Java class files

use super::constpool::ConstantPool;
use super::error::ConstPoolResult;

/// A named attribute with an already-serialized payload
#[derive(Debug, Clone)]
pub struct AttributeInfo {
    pub name_index: u16,
    pub info: Vec<u8>,
}

impl AttributeInfo {
    pub fn new(name_index: u16, info: Vec<u8>) -> Self {
        Self { name_index, info }
    }

    /// Interns `name` and wraps the payload
    pub fn named(constant_pool: &mut ConstantPool, name: &str, info: Vec<u8>) -> ConstPoolResult<Self> {
        Ok(Self::new(constant_pool.try_add_utf8(name)?, info))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&self.name_index.to_be_bytes());
        bytes.extend_from_slice(&(self.info.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&self.info);
        bytes
    }
}

#[derive(Debug)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionTableEntry>,
    pub attributes: Vec<AttributeInfo>,
}

impl CodeAttribute {
    pub fn new(max_stack: u16, max_locals: u16, code: Vec<u8>) -> Self {
        Self {
            max_stack,
            max_locals,
            code,
            exception_table: Vec::new(),
            attributes: Vec::new(),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&self.max_stack.to_be_bytes());
        bytes.extend_from_slice(&self.max_locals.to_be_bytes());
        bytes.extend_from_slice(&(self.code.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&self.code);
        bytes.extend_from_slice(&(self.exception_table.len() as u16).to_be_bytes());
        for entry in &self.exception_table {
            bytes.extend_from_slice(&entry.to_bytes());
        }
        bytes.extend_from_slice(&(self.attributes.len() as u16).to_be_bytes());
        for attribute in &self.attributes {
            bytes.extend_from_slice(&attribute.to_bytes());
        }
        bytes
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionTableEntry {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    /// 0 catches every exception
    pub catch_type: u16,
}

impl ExceptionTableEntry {
    pub fn new(start_pc: u16, end_pc: u16, handler_pc: u16, catch_type: u16) -> Self {
        Self { start_pc, end_pc, handler_pc, catch_type }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&self.start_pc.to_be_bytes());
        bytes.extend_from_slice(&self.end_pc.to_be_bytes());
        bytes.extend_from_slice(&self.handler_pc.to_be_bytes());
        bytes.extend_from_slice(&self.catch_type.to_be_bytes());
        bytes
    }
}

#[derive(Debug, Default)]
pub struct LineNumberTableAttribute {
    pub line_number_table: Vec<LineNumberEntry>,
}

impl LineNumberTableAttribute {
    pub fn new() -> Self {
        Self { line_number_table: Vec::new() }
    }

    pub fn add_line_number(&mut self, start_pc: u16, line_number: u16) {
        self.line_number_table.push(LineNumberEntry { start_pc, line_number });
    }

    pub fn is_empty(&self) -> bool {
        self.line_number_table.is_empty()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(self.line_number_table.len() as u16).to_be_bytes());
        for entry in &self.line_number_table {
            bytes.extend_from_slice(&entry.start_pc.to_be_bytes());
            bytes.extend_from_slice(&entry.line_number.to_be_bytes());
        }
        bytes
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineNumberEntry {
    pub start_pc: u16,
    pub line_number: u16,
}

/// Helper to build an AttributeInfo for LineNumberTable
pub fn make_line_number_table_attribute(
    constant_pool: &mut ConstantPool,
    table: &LineNumberTableAttribute,
) -> ConstPoolResult<AttributeInfo> {
    AttributeInfo::named(constant_pool, "LineNumberTable", table.to_bytes())
}

pub fn make_code_attribute(constant_pool: &mut ConstantPool, code: &CodeAttribute) -> ConstPoolResult<AttributeInfo> {
    AttributeInfo::named(constant_pool, "Code", code.to_bytes())
}

pub fn make_source_file_attribute(constant_pool: &mut ConstantPool, file_name: &str) -> ConstPoolResult<AttributeInfo> {
    let index = constant_pool.try_add_utf8(file_name)?;
    AttributeInfo::named(constant_pool, "SourceFile", index.to_be_bytes().to_vec())
}

/// One entry of the `BootstrapMethods` class attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapMethod {
    pub method_ref: u16,
    pub arguments: Vec<u16>,
}

pub fn make_bootstrap_methods_attribute(
    constant_pool: &mut ConstantPool,
    methods: &[BootstrapMethod],
) -> ConstPoolResult<AttributeInfo> {
    let mut info = Vec::new();
    info.extend_from_slice(&(methods.len() as u16).to_be_bytes());
    for m in methods {
        info.extend_from_slice(&m.method_ref.to_be_bytes());
        info.extend_from_slice(&(m.arguments.len() as u16).to_be_bytes());
        for arg in &m.arguments {
            info.extend_from_slice(&arg.to_be_bytes());
        }
    }
    AttributeInfo::named(constant_pool, "BootstrapMethods", info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_attribute_layout() {
        let mut code = CodeAttribute::new(2, 1, vec![0xb1]);
        code.exception_table.push(ExceptionTableEntry::new(0, 1, 1, 0));
        let bytes = code.to_bytes();
        // max_stack, max_locals, code_length, code, table length, entry, attr count
        assert_eq!(bytes.len(), 2 + 2 + 4 + 1 + 2 + 8 + 2);
        assert_eq!(&bytes[4..8], &1u32.to_be_bytes());
    }

    #[test]
    fn test_source_file_attribute() {
        let mut cp = ConstantPool::new();
        let attr = make_source_file_attribute(&mut cp, "Main.lt").unwrap();
        assert_eq!(attr.info, 1u16.to_be_bytes().to_vec());
        assert_eq!(attr.to_bytes().len(), 8);
    }
}
