//! lt compiler back end (ltc)
//!
//! Lowers the untyped syntax tree of lt compilation units to typed
//! descriptors with instruction-list bodies, then writes JVM class files.
//!
//! ## Architecture
//!
//! - **ast**: the syntax tree handed over by the parser
//! - **common**: type descriptors, the type repository and its sources,
//!   imports and lexical scopes
//! - **wash**: semantic passes (record, members, validate, bodies)
//! - **ir**: the typed instruction list of a member body
//! - **codegen**: class-file writing and bytecode emission
//!
//! ## Compilation Flow
//!
//! ```text
//! AST → Record → Members → Validate → Bodies → typed IR → Emit → .class bytes
//! ```

pub mod ast;
pub mod codegen;
pub mod common;
pub mod config;
pub mod consts;
pub mod error;
pub mod ir;
pub mod wash;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::ast::CompilationUnit;
use crate::common::{BuiltinSource, ClassFileSource, TypeRepository};
use crate::wash::{SemanticAnalyzer, TypedProgram};

pub use config::{Config, RuntimeNames};
pub use error::{Error, LineCol, Result, SemanticErrorKind};

/// Repository backed by the configured class path and the built-in tables
pub fn repository(config: &Config) -> Result<TypeRepository> {
    let mut repo = TypeRepository::new();
    if !config.classpath.is_empty() {
        repo.add_source(Box::new(ClassFileSource::new(&config.classpath)?));
    }
    repo.add_source(Box::new(BuiltinSource::new(&config.runtime)));
    Ok(repo)
}

/// Runs the semantic passes over `units`, leaving typed bodies in `repo`
pub fn analyze(units: &[CompilationUnit], repo: &mut TypeRepository, config: &Config) -> Result<TypedProgram> {
    SemanticAnalyzer::new(repo, config).analyze(units)
}

/// Compiles `units` in memory. The result maps full type names to class
/// file bytes, including synthesized closure classes.
pub fn compile(units: &[CompilationUnit], config: &Config) -> Result<BTreeMap<String, Vec<u8>>> {
    let mut repo = repository(config)?;
    let program = analyze(units, &mut repo, config)?;
    codegen::generate(&repo, &program.types, config)
}

/// Compiles `units` and writes one `.class` file per type below `out_dir`,
/// in package directories
pub fn compile_to_dir(units: &[CompilationUnit], config: &Config, out_dir: &Path) -> Result<Vec<PathBuf>> {
    let classes = compile(units, config)?;
    let mut written = Vec::with_capacity(classes.len());
    for (name, bytes) in classes {
        let path = out_dir.join(format!("{}.class", name.replace('.', "/")));
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, bytes)?;
        log::debug!("wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_compiles_to_nothing() {
        let classes = compile(&[], &Config::default()).unwrap();
        assert!(classes.is_empty());
    }

    #[test]
    fn test_missing_classpath_directory_is_skipped() {
        let config = Config::default().with_classpath_entry("/nonexistent/ltc/classpath");
        let mut repo = repository(&config).unwrap();
        assert!(repo.resolve("java.lang.String").unwrap().is_some());
    }
}
