use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::codegen::error::{BytecodeError, ClassGenerationError, ConstPoolError, DescriptorError};

/// Result type for ltc operations
pub type Result<T> = std::result::Result<T, Error>;

/// A source position attached to diagnostics.
///
/// Compiler-generated constructs carry no file and line 0; they render as
/// `<synthetic>`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LineCol {
    pub file: Option<Arc<str>>,
    pub line: u32,
    pub column: u32,
}

impl LineCol {
    pub fn new(file: Arc<str>, line: u32, column: u32) -> Self {
        Self { file: Some(file), line, column }
    }

    pub fn synthetic() -> Self {
        Self::default()
    }

    pub fn is_synthetic(&self) -> bool {
        self.file.is_none() && self.line == 0
    }
}

impl fmt::Display for LineCol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{}:{}:{}", file, self.line, self.column),
            None if self.line > 0 => write!(f, "{}:{}", self.line, self.column),
            None => write!(f, "<synthetic>"),
        }
    }
}

/// What went wrong in a diagnosable semantic error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticErrorKind {
    NotFound,
    Ambiguous,
    IllegalModifier,
    Duplicate,
    IllegalAssignment,
    MissingOverride,
    CircularInheritance,
    TypeMismatch,
    LiteralOverflow,
    IllegalClosureTarget,
    Other,
}

impl fmt::Display for SemanticErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SemanticErrorKind::NotFound => "not found",
            SemanticErrorKind::Ambiguous => "ambiguous",
            SemanticErrorKind::IllegalModifier => "illegal modifier",
            SemanticErrorKind::Duplicate => "duplicate declaration",
            SemanticErrorKind::IllegalAssignment => "illegal assignment",
            SemanticErrorKind::MissingOverride => "missing override",
            SemanticErrorKind::CircularInheritance => "circular inheritance",
            SemanticErrorKind::TypeMismatch => "type mismatch",
            SemanticErrorKind::LiteralOverflow => "literal overflow",
            SemanticErrorKind::IllegalClosureTarget => "illegal closure target",
            SemanticErrorKind::Other => "semantic error",
        };
        f.write_str(text)
    }
}

/// Error types for the ltc compiler
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{pos}: {kind}: {message}")]
    Semantic {
        kind: SemanticErrorKind,
        message: String,
        pos: LineCol,
    },

    #[error("{pos}: unexpected {construct}")]
    UnexpectedConstruct { construct: String, pos: LineCol },

    #[error("Class file error: {0}")]
    ClassFile(#[from] ClassGenerationError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal compiler error: {message}")]
    Internal { message: String },
}

impl Error {
    /// Create a diagnosable semantic error
    pub fn semantic(kind: SemanticErrorKind, message: impl Into<String>, pos: &LineCol) -> Self {
        Self::Semantic {
            kind,
            message: message.into(),
            pos: pos.clone(),
        }
    }

    /// Shorthand for a name/type that could not be resolved
    pub fn not_found(message: impl Into<String>, pos: &LineCol) -> Self {
        Self::semantic(SemanticErrorKind::NotFound, message, pos)
    }

    pub fn unexpected(construct: impl Into<String>, pos: &LineCol) -> Self {
        Self::UnexpectedConstruct {
            construct: construct.into(),
            pos: pos.clone(),
        }
    }

    /// Create an internal invariant violation
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    /// The semantic kind, if this is a diagnosable semantic error
    pub fn semantic_kind(&self) -> Option<SemanticErrorKind> {
        match self {
            Error::Semantic { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, Error::Internal { .. })
    }
}

impl From<ConstPoolError> for Error {
    fn from(err: ConstPoolError) -> Self {
        Error::ClassFile(ClassGenerationError::ConstPool(err))
    }
}

impl From<BytecodeError> for Error {
    fn from(err: BytecodeError) -> Self {
        match err {
            BytecodeError::UnvisitedLabel { .. } | BytecodeError::StackUnderflow { .. } => {
                Error::internal(err.to_string())
            }
            other => Error::ClassFile(ClassGenerationError::Bytecode(other)),
        }
    }
}

impl From<DescriptorError> for Error {
    fn from(err: DescriptorError) -> Self {
        Error::ClassFile(ClassGenerationError::Descriptor(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linecol_display() {
        let pos = LineCol::new(Arc::from("Main.lt"), 3, 7);
        assert_eq!(pos.to_string(), "Main.lt:3:7");
        assert_eq!(LineCol::synthetic().to_string(), "<synthetic>");
        assert!(LineCol::synthetic().is_synthetic());
    }

    #[test]
    fn test_semantic_error_carries_position() {
        let pos = LineCol::new(Arc::from("A.lt"), 1, 2);
        let err = Error::not_found("cannot find symbol x", &pos);
        assert_eq!(err.semantic_kind(), Some(SemanticErrorKind::NotFound));
        assert_eq!(err.to_string(), "A.lt:1:2: not found: cannot find symbol x");
    }

    #[test]
    fn test_unvisited_label_is_internal() {
        let err: Error = BytecodeError::UnvisitedLabel { what: "exception handler".into() }.into();
        assert!(err.is_internal());
    }
}
