//! Import resolution
//!
//! Turns the names written in a unit into repository types. Lookup order for
//! a simple name: single-type imports, the unit's own package, on-demand
//! imports, then the implicit packages. Two on-demand imports providing the
//! same simple name make it ambiguous.

use crate::ast::ImportDecl;
use crate::config::RuntimeNames;
use crate::consts::IMPLICIT_IMPORTS;
use crate::error::{Error, LineCol, Result, SemanticErrorKind};

use super::repository::{package_of, TypeRepository};
use super::types::{PrimitiveKind, TypeId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportStatement {
    /// `import a.b.C`
    Single { full_name: String, simple_name: String },
    /// `import a.b.*`
    Star { package: String },
    /// `import static a.b.C.m`
    StaticSingle { class_name: String, member: String },
    /// `import static a.b.C.*`
    StaticStar { class_name: String },
}

impl ImportStatement {
    pub fn from_decl(decl: &ImportDecl) -> Self {
        let name = decl.name.trim_end_matches(".*").to_string();
        match (decl.is_static, decl.is_wildcard) {
            (false, false) => {
                let simple_name = name.rsplit('.').next().unwrap_or(&name).to_string();
                ImportStatement::Single { full_name: name, simple_name }
            }
            (false, true) => ImportStatement::Star { package: name },
            (true, true) => ImportStatement::StaticStar { class_name: name },
            (true, false) => match name.rfind('.') {
                Some(dot) => ImportStatement::StaticSingle {
                    class_name: name[..dot].to_string(),
                    member: name[dot + 1..].to_string(),
                },
                None => ImportStatement::StaticStar { class_name: name },
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImportContext {
    package: String,
    imports: Vec<ImportStatement>,
    implicit: Vec<String>,
}

impl ImportContext {
    pub fn new(package: &str, decls: &[ImportDecl], runtime: &RuntimeNames) -> Self {
        let mut implicit: Vec<String> = IMPLICIT_IMPORTS.iter().map(|p| p.to_string()).collect();
        for extra in [package_of(&runtime.runtime_class), runtime.function_package.clone()] {
            if !extra.is_empty() && !implicit.contains(&extra) {
                implicit.push(extra);
            }
        }
        Self {
            package: package.to_string(),
            imports: decls.iter().map(ImportStatement::from_decl).collect(),
            implicit,
        }
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    /// Full name a type declared in this unit gets
    pub fn qualify(&self, simple_name: &str) -> String {
        if self.package.is_empty() {
            simple_name.to_string()
        } else {
            format!("{}.{}", self.package, simple_name)
        }
    }

    pub fn resolve_type(&self, repo: &mut TypeRepository, name: &str, pos: &LineCol) -> Result<Option<TypeId>> {
        if let Some(element) = name.strip_suffix("[]") {
            return Ok(match self.resolve_type(repo, element, pos)? {
                Some(component) => Some(repo.array_of(component)),
                None => None,
            });
        }
        if name == "void" || PrimitiveKind::from_name(name).is_some() {
            return Ok(repo.lookup(name));
        }
        if let Some(dot) = name.find('.') {
            if let Some(id) = repo.resolve(name)? {
                return Ok(Some(id));
            }
            // Outer.Inner written with a simple outer name
            let (head, rest) = (&name[..dot], &name[dot + 1..]);
            if let Some(outer) = self.resolve_simple(repo, head, pos)? {
                let nested = format!("{}${}", repo.name(outer), rest.replace('.', "$"));
                return repo.resolve(&nested);
            }
            return Ok(None);
        }
        self.resolve_simple(repo, name, pos)
    }

    pub fn require_type(&self, repo: &mut TypeRepository, name: &str, pos: &LineCol) -> Result<TypeId> {
        match self.resolve_type(repo, name, pos)? {
            Some(id) => Ok(id),
            None => Err(Error::not_found(format!("cannot resolve type {}", name), pos)),
        }
    }

    fn resolve_simple(&self, repo: &mut TypeRepository, name: &str, pos: &LineCol) -> Result<Option<TypeId>> {
        for import in &self.imports {
            if let ImportStatement::Single { full_name, simple_name } = import {
                if simple_name == name {
                    return repo.resolve(full_name);
                }
            }
        }
        if let Some(id) = repo.resolve(&self.qualify(name))? {
            return Ok(Some(id));
        }
        let mut found: Option<TypeId> = None;
        for import in &self.imports {
            if let ImportStatement::Star { package } = import {
                if let Some(id) = repo.resolve(&format!("{}.{}", package, name))? {
                    match found {
                        Some(prev) if prev != id => {
                            return Err(Error::semantic(
                                SemanticErrorKind::Ambiguous,
                                format!("{} is ambiguous: {} and {}", name, repo.name(prev), repo.name(id)),
                                pos,
                            ));
                        }
                        _ => found = Some(id),
                    }
                }
            }
        }
        if found.is_some() {
            return Ok(found);
        }
        for package in &self.implicit {
            if let Some(id) = repo.resolve(&format!("{}.{}", package, name))? {
                return Ok(Some(id));
            }
        }
        Ok(None)
    }

    /// Classes whose static member `member` is visible by simple name, in
    /// import order
    pub fn static_sources(&self, member: &str) -> Vec<&str> {
        self.imports
            .iter()
            .filter_map(|import| match import {
                ImportStatement::StaticSingle { class_name, member: m } if m == member => Some(class_name.as_str()),
                ImportStatement::StaticStar { class_name } => Some(class_name.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Span;
    use crate::common::builtin::BuiltinSource;

    fn import(name: &str, is_static: bool, is_wildcard: bool) -> ImportDecl {
        ImportDecl { name: name.to_string(), is_static, is_wildcard, span: Span::default() }
    }

    fn repo() -> TypeRepository {
        TypeRepository::new().with_source(Box::new(BuiltinSource::new(&RuntimeNames::default())))
    }

    #[test]
    fn test_statement_kinds() {
        assert_eq!(
            ImportStatement::from_decl(&import("java.lang.Math.abs", true, false)),
            ImportStatement::StaticSingle { class_name: "java.lang.Math".into(), member: "abs".into() }
        );
        assert_eq!(
            ImportStatement::from_decl(&import("java.util", false, true)),
            ImportStatement::Star { package: "java.util".into() }
        );
    }

    #[test]
    fn test_simple_names_resolve_through_implicit_packages() {
        let mut repo = repo();
        let ctx = ImportContext::new("demo", &[], &RuntimeNames::default());
        let pos = LineCol::synthetic();
        let string = ctx.resolve_type(&mut repo, "String", &pos).unwrap().unwrap();
        assert_eq!(repo.name(string), "java.lang.String");
        let list = ctx.resolve_type(&mut repo, "List[]", &pos).unwrap().unwrap();
        assert_eq!(repo.name(list), "[Ljava.util.List;");
        let f1 = ctx.resolve_type(&mut repo, "Function1", &pos).unwrap().unwrap();
        assert_eq!(repo.name(f1), "lt.lang.function.Function1");
        assert!(ctx.resolve_type(&mut repo, "Nope", &pos).unwrap().is_none());
        assert_eq!(ctx.resolve_type(&mut repo, "int", &pos).unwrap(), Some(TypeId::INT));
    }

    #[test]
    fn test_nested_name_through_outer() {
        let mut repo = repo();
        let ctx = ImportContext::new("", &[import("java.lang.invoke.MethodHandles", false, false)], &RuntimeNames::default());
        let lookup = ctx.resolve_type(&mut repo, "MethodHandles.Lookup", &LineCol::synthetic()).unwrap().unwrap();
        assert_eq!(repo.name(lookup), "java.lang.invoke.MethodHandles$Lookup");
    }

    #[test]
    fn test_static_sources() {
        let ctx = ImportContext::new(
            "",
            &[import("java.lang.Math.max", true, false), import("java.lang.System", true, true)],
            &RuntimeNames::default(),
        );
        assert_eq!(ctx.static_sources("max"), vec!["java.lang.Math", "java.lang.System"]);
        assert_eq!(ctx.static_sources("out"), vec!["java.lang.System"]);
    }
}
