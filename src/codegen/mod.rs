//! Code generation: typed instruction lists to class-file bytes
//!
//! Each class, interface or annotation type compiled in this run becomes one
//! class file. Types are independent of each other at this stage; the only
//! shared state is the read-only type repository.

pub mod annotation;
pub mod attribute;
pub mod bytecode;
pub mod class;
pub mod class_writer;
pub mod code;
pub mod constpool;
pub mod defs;
pub mod descriptor;
pub mod emitter;
pub mod error;
pub mod opcodes;
pub mod writer;

use std::collections::BTreeMap;

use crate::common::repository::TypeRepository;
use crate::common::types::TypeId;
use crate::config::Config;
use crate::error::Result;

pub use class::ClassFile;
pub use class_writer::ClassWriter;
pub use constpool::{Constant, ConstantPool};
pub use error::{ClassGenerationError, ConstPoolError};

/// Generates class files for `types`, keyed by full type name
pub fn generate(repo: &TypeRepository, types: &[TypeId], config: &Config) -> Result<BTreeMap<String, Vec<u8>>> {
    log::debug!("emit: {} types", types.len());
    let writer = ClassWriter::new(repo, config);
    let mut out = BTreeMap::new();
    for ty in types {
        out.insert(repo.name(*ty).to_string(), writer.write(*ty)?);
    }
    Ok(out)
}
