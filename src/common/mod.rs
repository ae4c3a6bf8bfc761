//! Common definitions shared across modules
//!
//! Type and member descriptors, the type repository with its type sources
//! (built-in tables and compiled class files), import resolution and the
//! lexical scope used while lowering member bodies.

pub mod builtin;
pub mod classpath;
pub mod import;
pub mod repository;
pub mod scope;
pub mod types;

pub use builtin::BuiltinSource;
pub use classpath::ClassFileSource;
pub use import::ImportContext;
pub use repository::{ClassStub, DeclKind, MemberStub, TypeRepository, TypeSource};
pub use scope::{Binding, InnerCallable, Scope, SelfRef};
pub use types::*;
