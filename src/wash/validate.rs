//! Hierarchy validation
//!
//! Runs once every declared type has its members. Checks the inheritance
//! graph, parent kinds and override rules, and records which methods
//! override which.

use std::collections::HashSet;

use crate::common::repository::TypeRepository;
use crate::common::types::{MethodId, TypeId, TypeKind};
use crate::error::{Error, Result, SemanticErrorKind};

pub fn validate(repo: &mut TypeRepository, declared: &[TypeId]) -> Result<()> {
    // cycles first: everything after walks ancestors
    for &ty in declared {
        check_cycles(repo, ty)?;
    }
    for &ty in declared {
        check_parents(repo, ty)?;
    }
    for &ty in declared {
        check_overrides(repo, ty)?;
    }
    for &ty in declared {
        check_implemented(repo, ty)?;
    }
    Ok(())
}

fn direct_supers(repo: &TypeRepository, ty: TypeId) -> Vec<TypeId> {
    repo.parent_of(ty).into_iter().chain(repo.interfaces_of(ty).iter().copied()).collect()
}

fn check_cycles(repo: &TypeRepository, ty: TypeId) -> Result<()> {
    let mut stack = direct_supers(repo, ty);
    let mut seen = HashSet::new();
    while let Some(t) = stack.pop() {
        if t == ty {
            let pos = repo.get(ty).ref_info().map(|i| i.line_col.clone()).unwrap_or_default();
            return Err(Error::semantic(
                SemanticErrorKind::CircularInheritance,
                format!("{} inherits from itself", repo.name(ty)),
                &pos,
            ));
        }
        if seen.insert(t) {
            stack.extend(direct_supers(repo, t));
        }
    }
    Ok(())
}

fn check_parents(repo: &TypeRepository, ty: TypeId) -> Result<()> {
    let desc = repo.get(ty);
    let Some(info) = desc.ref_info() else {
        return Ok(());
    };
    let pos = &info.line_col;
    if let Some(parent) = info.parent {
        let parent_desc = repo.get(parent);
        if !parent_desc.is_class() {
            return Err(Error::semantic(
                SemanticErrorKind::TypeMismatch,
                format!("{} cannot extend {}: not a class", desc.full_name, parent_desc.full_name),
                pos,
            ));
        }
        if parent_desc.modifiers().is_final() {
            return Err(Error::semantic(
                SemanticErrorKind::IllegalModifier,
                format!("{} cannot extend final class {}", desc.full_name, parent_desc.full_name),
                pos,
            ));
        }
    }
    for &interface in &info.interfaces {
        let interface_desc = repo.get(interface);
        if !interface_desc.is_interface() {
            return Err(Error::semantic(
                SemanticErrorKind::TypeMismatch,
                format!("{} is not an interface", interface_desc.full_name),
                pos,
            ));
        }
    }
    Ok(())
}

/// Methods of `ancestor` that a method named `name` with `params` overrides
fn overridden_in(repo: &TypeRepository, ancestor: TypeId, name: &str, params: &[TypeId]) -> Vec<MethodId> {
    repo.methods_of(ancestor)
        .iter()
        .copied()
        .filter(|id| {
            let m = repo.method(*id);
            m.name == name && !m.modifiers.is_private() && !m.modifiers.is_static() && m.param_types() == params
        })
        .collect()
}

fn check_overrides(repo: &mut TypeRepository, ty: TypeId) -> Result<()> {
    let ancestors = repo.ancestors(ty);
    let own: Vec<MethodId> = repo.methods_of(ty).to_vec();
    for id in own {
        let method = repo.method(id);
        if method.modifiers.is_private() || method.modifiers.is_static() {
            continue;
        }
        let (name, params, ret, access, pos) = (
            method.name.clone(),
            method.param_types(),
            method.return_type,
            method.modifiers.access(),
            method.line_col.clone(),
        );
        let mut overrides = Vec::new();
        for &ancestor in &ancestors {
            for base_id in overridden_in(repo, ancestor, &name, &params) {
                let base = repo.method(base_id);
                if base.modifiers.is_final() {
                    return Err(Error::semantic(
                        SemanticErrorKind::IllegalModifier,
                        format!("{} overrides final method of {}", name, repo.name(ancestor)),
                        &pos,
                    ));
                }
                if access < base.modifiers.access() {
                    return Err(Error::semantic(
                        SemanticErrorKind::IllegalModifier,
                        format!("{} weakens the access of the method it overrides in {}", name, repo.name(ancestor)),
                        &pos,
                    ));
                }
                let compatible = ret == base.return_type
                    || (repo.get(ret).is_reference()
                        && repo.get(base.return_type).is_reference()
                        && repo.is_assignable(ret, base.return_type));
                if !compatible {
                    return Err(Error::semantic(
                        SemanticErrorKind::TypeMismatch,
                        format!(
                            "{} returns {} but overrides a method of {} returning {}",
                            name,
                            repo.name(ret),
                            repo.name(ancestor),
                            repo.name(base.return_type)
                        ),
                        &pos,
                    ));
                }
                overrides.push((base_id, ancestor));
            }
        }
        for (base_id, ancestor) in overrides {
            log::trace!("{}.{} overrides a method of {}", repo.name(ty), name, repo.name(ancestor));
            repo.method_mut(id).overrides.push(base_id);
            let in_unit = repo.get(ancestor).ref_info().map(|i| i.in_unit).unwrap_or(false);
            if in_unit {
                repo.method_mut(base_id).overridden_by.push(id);
            }
        }
    }
    Ok(())
}

/// A concrete class must implement every abstract method it inherits
fn check_implemented(repo: &TypeRepository, ty: TypeId) -> Result<()> {
    let desc = repo.get(ty);
    if !matches!(desc.kind, TypeKind::Class(_)) || desc.modifiers().is_abstract() {
        return Ok(());
    }
    let ancestors = repo.ancestors(ty);
    let class_chain: Vec<TypeId> = std::iter::once(ty)
        .chain(ancestors.iter().copied().filter(|a| repo.get(*a).is_class()))
        .collect();
    let interfaces: Vec<TypeId> = ancestors.iter().copied().filter(|a| repo.get(*a).is_interface()).collect();

    let implemented = |name: &str, params: &[TypeId]| {
        let concrete = |owner: &TypeId| {
            repo.methods_of(*owner).iter().any(|id| {
                let m = repo.method(*id);
                m.name == name && !m.modifiers.is_abstract() && !m.modifiers.is_static() && m.param_types() == params
            })
        };
        class_chain.iter().any(concrete) || interfaces.iter().any(concrete)
    };

    for owner in std::iter::once(ty).chain(ancestors.iter().copied()) {
        for id in repo.methods_of(owner) {
            let m = repo.method(*id);
            if !m.modifiers.is_abstract() {
                continue;
            }
            if !implemented(&m.name, &m.param_types()) {
                let pos = desc.ref_info().map(|i| i.line_col.clone()).unwrap_or_default();
                return Err(Error::semantic(
                    SemanticErrorKind::MissingOverride,
                    format!("{} does not implement {}.{}", desc.full_name, repo.name(owner), m.name),
                    &pos,
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::bytecode::access_flags::*;
    use crate::common::repository::DeclKind;
    use crate::common::types::{MethodDef, Modifiers, RefTypeInfo};
    use crate::error::LineCol;

    fn declare(repo: &mut TypeRepository, name: &str, kind: DeclKind, flags: u16) -> TypeId {
        let info = RefTypeInfo { modifiers: Modifiers(flags), in_unit: true, ..RefTypeInfo::default() };
        repo.declare(name, kind, info, &LineCol::synthetic()).unwrap()
    }

    fn method(repo: &mut TypeRepository, owner: TypeId, name: &str, ret: TypeId, flags: u16) -> MethodId {
        repo.add_method(MethodDef {
            name: name.to_string(),
            declaring: owner,
            return_type: ret,
            params: Vec::new(),
            modifiers: Modifiers(flags),
            body: None,
            annotations: Vec::new(),
            overrides: Vec::new(),
            overridden_by: Vec::new(),
            annotation_default: None,
            line_col: LineCol::synthetic(),
        })
    }

    fn set_parent(repo: &mut TypeRepository, ty: TypeId, parent: Option<TypeId>, interfaces: Vec<TypeId>) {
        let info = repo.get_mut(ty).ref_info_mut().unwrap();
        info.parent = parent;
        info.interfaces = interfaces;
    }

    #[test]
    fn test_cycle_detected() {
        let mut repo = TypeRepository::new();
        let a = declare(&mut repo, "A", DeclKind::Class, ACC_PUBLIC);
        let b = declare(&mut repo, "B", DeclKind::Class, ACC_PUBLIC);
        set_parent(&mut repo, a, Some(b), vec![]);
        set_parent(&mut repo, b, Some(a), vec![]);
        let err = validate(&mut repo, &[a, b]).unwrap_err();
        assert_eq!(err.semantic_kind(), Some(SemanticErrorKind::CircularInheritance));
    }

    #[test]
    fn test_override_recorded_both_ways() {
        let mut repo = TypeRepository::new();
        let base = declare(&mut repo, "Base", DeclKind::Class, ACC_PUBLIC);
        let sub = declare(&mut repo, "Sub", DeclKind::Class, ACC_PUBLIC);
        set_parent(&mut repo, sub, Some(base), vec![]);
        let m1 = method(&mut repo, base, "run", TypeId::INT, ACC_PUBLIC);
        let m2 = method(&mut repo, sub, "run", TypeId::INT, ACC_PUBLIC);
        validate(&mut repo, &[base, sub]).unwrap();
        assert_eq!(repo.method(m2).overrides, vec![m1]);
        assert_eq!(repo.method(m1).overridden_by, vec![m2]);
    }

    #[test]
    fn test_final_override_and_return_mismatch() {
        let mut repo = TypeRepository::new();
        let base = declare(&mut repo, "Base", DeclKind::Class, ACC_PUBLIC);
        let sub = declare(&mut repo, "Sub", DeclKind::Class, ACC_PUBLIC);
        set_parent(&mut repo, sub, Some(base), vec![]);
        method(&mut repo, base, "run", TypeId::INT, ACC_PUBLIC | ACC_FINAL);
        method(&mut repo, sub, "run", TypeId::INT, ACC_PUBLIC);
        let err = validate(&mut repo, &[base, sub]).unwrap_err();
        assert_eq!(err.semantic_kind(), Some(SemanticErrorKind::IllegalModifier));

        let mut repo = TypeRepository::new();
        let base = declare(&mut repo, "Base", DeclKind::Class, ACC_PUBLIC);
        let sub = declare(&mut repo, "Sub", DeclKind::Class, ACC_PUBLIC);
        set_parent(&mut repo, sub, Some(base), vec![]);
        method(&mut repo, base, "run", TypeId::INT, ACC_PUBLIC);
        method(&mut repo, sub, "run", TypeId::LONG, ACC_PUBLIC);
        let err = validate(&mut repo, &[base, sub]).unwrap_err();
        assert_eq!(err.semantic_kind(), Some(SemanticErrorKind::TypeMismatch));
    }

    #[test]
    fn test_missing_implementation() {
        let mut repo = TypeRepository::new();
        let shape = declare(&mut repo, "Shape", DeclKind::Interface, ACC_PUBLIC | ACC_ABSTRACT);
        let square = declare(&mut repo, "Square", DeclKind::Class, ACC_PUBLIC);
        set_parent(&mut repo, square, None, vec![shape]);
        method(&mut repo, shape, "area", TypeId::DOUBLE, ACC_PUBLIC | ACC_ABSTRACT);
        let err = validate(&mut repo, &[shape, square]).unwrap_err();
        assert_eq!(err.semantic_kind(), Some(SemanticErrorKind::MissingOverride));

        method(&mut repo, square, "area", TypeId::DOUBLE, ACC_PUBLIC);
        validate(&mut repo, &[shape, square]).unwrap();
    }

    #[test]
    fn test_default_method_counts_as_implementation() {
        let mut repo = TypeRepository::new();
        let shape = declare(&mut repo, "Shape", DeclKind::Interface, ACC_PUBLIC | ACC_ABSTRACT);
        let named = declare(&mut repo, "Named", DeclKind::Interface, ACC_PUBLIC | ACC_ABSTRACT);
        let circle = declare(&mut repo, "Circle", DeclKind::Class, ACC_PUBLIC);
        set_parent(&mut repo, named, None, vec![shape]);
        set_parent(&mut repo, circle, None, vec![named]);
        method(&mut repo, shape, "name", TypeId::INT, ACC_PUBLIC | ACC_ABSTRACT);
        method(&mut repo, named, "name", TypeId::INT, ACC_PUBLIC);
        validate(&mut repo, &[shape, named, circle]).unwrap();
    }

    #[test]
    fn test_class_cannot_implement_class() {
        let mut repo = TypeRepository::new();
        let a = declare(&mut repo, "A", DeclKind::Class, ACC_PUBLIC);
        let b = declare(&mut repo, "B", DeclKind::Class, ACC_PUBLIC);
        set_parent(&mut repo, b, None, vec![a]);
        let err = validate(&mut repo, &[a, b]).unwrap_err();
        assert_eq!(err.semantic_kind(), Some(SemanticErrorKind::TypeMismatch));
    }
}
