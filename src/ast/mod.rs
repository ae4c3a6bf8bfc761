//! Abstract Syntax Tree (AST) handed over by the parser
//!
//! The tree is untyped: names are plain strings and nothing is resolved.
//! Semantic lowering (`wash`) turns it into typed descriptors and IR bodies.

mod nodes;

pub use nodes::*;

use std::sync::Arc;

use crate::error::LineCol;

/// Source location information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl Location {
    pub fn new(line: usize, column: usize, offset: usize) -> Self {
        Self { line, column, offset }
    }
}

/// Span of source code (start and end locations)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: Location,
    pub end: Location,
}

impl Span {
    pub fn new(start: Location, end: Location) -> Self {
        Self { start, end }
    }

    pub fn from_to(start_line: usize, start_col: usize, end_line: usize, end_col: usize) -> Self {
        Self {
            start: Location::new(start_line, start_col, 0),
            end: Location::new(end_line, end_col, 0),
        }
    }

    /// Diagnostic position of the span start within `file`
    pub fn line_col(&self, file: &Arc<str>) -> LineCol {
        LineCol::new(file.clone(), self.start.line as u32, self.start.column as u32)
    }
}

/// AST node trait that all AST nodes implement
pub trait AstNode {
    /// Get the source span of this node
    fn span(&self) -> Span;
}

/// One parsed source file
#[derive(Debug, Clone)]
pub struct CompilationUnit {
    /// File name as it should appear in diagnostics and `SourceFile`
    pub file: String,
    pub package: Option<String>,
    pub imports: Vec<ImportDecl>,
    pub types: Vec<TypeDecl>,
    pub span: Span,
}

impl AstNode for CompilationUnit {
    fn span(&self) -> Span {
        self.span
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_line_col() {
        let file: Arc<str> = Arc::from("A.lt");
        let span = Span::from_to(3, 5, 3, 9);
        assert_eq!(span.line_col(&file).to_string(), "A.lt:3:5");
    }
}
