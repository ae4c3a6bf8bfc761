//! Semantic analysis pipeline
//!
//! Turns parsed compilation units into typed descriptors whose members carry
//! IR bodies. The passes run over every unit before the next pass starts:
//!
//! - Record: every declared type gets an empty descriptor
//! - Members: parents, fields, methods and constructors (signatures only)
//! - Validate: inheritance cycles, parent kinds, overrides
//! - Bodies: statements and expressions are lowered to IR; closures may
//!   synthesize further types

pub mod cast;
pub mod closure;
pub mod enter;
pub mod expr;
pub mod lower;
pub mod resolve;
pub mod stmt;
pub mod validate;

use std::collections::HashMap;

use crate::ast::CompilationUnit;
use crate::common::repository::TypeRepository;
use crate::common::types::TypeId;
use crate::config::Config;
use crate::error::Result;

pub use enter::UnitContext;
pub use lower::Lowerer;

/// Output of semantic analysis: every type that needs a class file
#[derive(Debug, Clone, Default)]
pub struct TypedProgram {
    /// Declared types in source order, followed by synthesized ones
    pub types: Vec<TypeId>,
}

/// State shared by all passes of one compilation
pub struct Session<'a> {
    pub repo: &'a mut TypeRepository,
    pub config: &'a Config,
    /// Types synthesized while lowering bodies
    pub generated: Vec<TypeId>,
    counters: HashMap<(TypeId, &'static str), usize>,
}

impl<'a> Session<'a> {
    pub fn new(repo: &'a mut TypeRepository, config: &'a Config) -> Self {
        Self { repo, config, generated: Vec::new(), counters: HashMap::new() }
    }

    /// Next free index for names of the given family within `owner`
    pub fn next_index(&mut self, owner: TypeId, family: &'static str) -> usize {
        let counter = self.counters.entry((owner, family)).or_insert(0);
        let index = *counter;
        *counter += 1;
        index
    }
}

/// Main semantic analysis pipeline that orchestrates all passes
pub struct SemanticAnalyzer<'a> {
    session: Session<'a>,
}

impl<'a> SemanticAnalyzer<'a> {
    pub fn new(repo: &'a mut TypeRepository, config: &'a Config) -> Self {
        Self { session: Session::new(repo, config) }
    }

    pub fn analyze(mut self, units: &[CompilationUnit]) -> Result<TypedProgram> {
        log::debug!("record: {} units", units.len());
        let mut contexts = Vec::with_capacity(units.len());
        for unit in units {
            contexts.push(enter::record(&mut self.session, unit)?);
        }

        log::debug!("members");
        let mut jobs = Vec::new();
        for (index, unit) in units.iter().enumerate() {
            jobs.extend(enter::enter_members(&mut self.session, &contexts[index], index, unit)?);
        }

        let declared: Vec<TypeId> = contexts.iter().flat_map(|c| c.types.iter().copied()).collect();
        log::debug!("validate: {} types", declared.len());
        validate::validate(self.session.repo, &declared)?;

        log::debug!("bodies: {} members", jobs.len());
        for job in &jobs {
            lower::lower_job(&mut self.session, &contexts[job.unit], job)?;
        }

        let mut types = declared;
        types.extend(self.session.generated.iter().copied());
        Ok(TypedProgram { types })
    }
}
