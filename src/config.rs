//! Compiler configuration

use std::path::PathBuf;

use crate::codegen::defs::major_versions;
use crate::error::{Error, Result};

/// Names of the runtime support library the emitted code calls into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeNames {
    /// Static helper class: coercions, comparisons, dynamic field access
    pub runtime_class: String,
    /// Class holding the bootstrap method for late-bound call sites
    pub dynamic_class: String,
    /// Package of the arity-indexed `FunctionN` interfaces
    pub function_package: String,
    /// Infix used when naming synthesized closure classes
    pub lambda_infix: String,
}

impl Default for RuntimeNames {
    fn default() -> Self {
        Self {
            runtime_class: "lt.lang.LtRuntime".to_string(),
            dynamic_class: "lt.lang.Dynamic".to_string(),
            function_package: "lt.lang.function".to_string(),
            lambda_infix: "$Lambda$".to_string(),
        }
    }
}

impl RuntimeNames {
    /// Full name of the function interface for the given arity
    pub fn function_type(&self, arity: usize) -> String {
        format!("{}.Function{}", self.function_package, arity)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Java release number, e.g. 8
    pub target_version: u16,
    pub emit_line_numbers: bool,
    pub emit_source_file: bool,
    /// Directories searched for compiled `.class` files
    pub classpath: Vec<PathBuf>,
    pub runtime: RuntimeNames,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_version: 8,
            emit_line_numbers: true,
            emit_source_file: true,
            classpath: Vec::new(),
            runtime: RuntimeNames::default(),
        }
    }
}

impl Config {
    pub fn with_target_version(mut self, version: u16) -> Self {
        self.target_version = version;
        self
    }

    pub fn with_line_numbers(mut self, emit: bool) -> Self {
        self.emit_line_numbers = emit;
        self
    }

    pub fn with_source_file(mut self, emit: bool) -> Self {
        self.emit_source_file = emit;
        self
    }

    pub fn with_classpath_entry(mut self, dir: impl Into<PathBuf>) -> Self {
        self.classpath.push(dir.into());
        self
    }

    pub fn with_runtime(mut self, runtime: RuntimeNames) -> Self {
        self.runtime = runtime;
        self
    }

    /// Class-file major version for the configured release
    pub fn major_version(&self) -> Result<u16> {
        match self.target_version {
            5 => Ok(major_versions::JAVA_5_0),
            6 => Ok(major_versions::JAVA_6_0),
            7 => Ok(major_versions::JAVA_7),
            8 => Ok(major_versions::JAVA_8),
            other => Err(Error::config(format!("unsupported target version: {}", other))),
        }
    }

    /// Whether `invokedynamic` and method-handle constants may be emitted
    pub fn supports_invokedynamic(&self) -> bool {
        self.target_version >= 7
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_targets_java_8() {
        let config = Config::default();
        assert_eq!(config.major_version().unwrap(), 52);
        assert!(config.supports_invokedynamic());
    }

    #[test]
    fn test_builder_and_rejected_version() {
        let config = Config::default().with_target_version(6).with_line_numbers(false);
        assert_eq!(config.major_version().unwrap(), 50);
        assert!(!config.supports_invokedynamic());
        assert!(!config.emit_line_numbers);
        assert!(Config::default().with_target_version(11).major_version().is_err());
    }

    #[test]
    fn test_function_type_names() {
        assert_eq!(RuntimeNames::default().function_type(2), "lt.lang.function.Function2");
    }
}
