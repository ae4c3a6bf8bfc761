//! Specific error types for code generation operations

use thiserror::Error;

/// Errors that can occur during constant pool operations
#[derive(Error, Debug)]
pub enum ConstPoolError {
    #[error("Constant pool is out of space")]
    OutOfSpace,
    #[error("Invalid constant pool index: {0}")]
    InvalidIndex(u16),
    #[error("Too many bootstrap methods")]
    TooManyBootstrapMethods,
}

/// Errors that can occur during class file generation
#[derive(Error, Debug)]
pub enum ClassGenerationError {
    #[error("Constant pool error: {0}")]
    ConstPool(#[from] ConstPoolError),
    #[error("Bytecode generation error: {0}")]
    Bytecode(#[from] BytecodeError),
    #[error("Descriptor error: {0}")]
    Descriptor(#[from] DescriptorError),
    #[error("Too many {what}: {count}")]
    TooMany { what: &'static str, count: usize },
}

/// Errors that can occur during bytecode generation
#[derive(Error, Debug)]
pub enum BytecodeError {
    #[error("Stack underflow in {method}")]
    StackUnderflow { method: String },
    #[error("Local variable index out of bounds: {index}")]
    LocalIndexOutOfBounds { index: usize },
    #[error("Branch target too far: {offset}")]
    BranchTooFar { offset: i64 },
    #[error("Method code too large: {size} bytes")]
    CodeTooLarge { size: usize },
    #[error("not all labels are visited: {what}")]
    UnvisitedLabel { what: String },
}

/// Errors that can occur during descriptor generation and parsing
#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("Invalid type descriptor: {descriptor}")]
    InvalidTypeDescriptor { descriptor: String },
    #[error("Invalid method descriptor: {descriptor}")]
    InvalidMethodDescriptor { descriptor: String },
}

/// Generic result type for constant pool operations
pub type ConstPoolResult<T> = Result<T, ConstPoolError>;

/// Generic result type for bytecode operations
pub type BytecodeResult<T> = Result<T, BytecodeError>;
