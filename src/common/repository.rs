//! Type repository: name → descriptor resolution with single-instance caching
//!
//! Primitive and void descriptors are pre-seeded at fixed handles. Array
//! descriptors are synthesized on demand and cached by their computed name.
//! Any other name is first looked up in the cache (types of the current
//! compilation are recorded there up front) and then offered to the
//! registered [`TypeSource`]s, which describe compiled types as
//! [`ClassStub`]s that the repository turns into descriptors.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use crate::codegen::bytecode::access_flags::*;
use crate::codegen::descriptor::{array_type_name, parse_field_descriptor, parse_method_descriptor, type_descriptor};
use crate::error::{Error, LineCol, Result, SemanticErrorKind};

use super::types::*;

/// Structural description of a compiled type, as produced by a [`TypeSource`]
#[derive(Debug, Clone, Default)]
pub struct ClassStub {
    /// Binary name, e.g. `java.util.Map$Entry`
    pub name: String,
    pub access_flags: u16,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<MemberStub>,
    /// Methods and constructors (`<init>`)
    pub methods: Vec<MemberStub>,
    pub annotations: Vec<AnnotationStub>,
}

#[derive(Debug, Clone, Default)]
pub struct MemberStub {
    pub name: String,
    pub descriptor: String,
    pub access_flags: u16,
    pub annotations: Vec<AnnotationStub>,
}

impl MemberStub {
    pub fn new(name: &str, descriptor: &str, access_flags: u16) -> Self {
        Self {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            access_flags,
            annotations: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationStub {
    pub type_name: String,
    pub values: Vec<(String, ElementValue)>,
}

/// Collaborator that derives descriptors of externally compiled types
pub trait TypeSource {
    /// Short description used in log output
    fn describe(&self) -> String;

    /// Describes the named type, or `Ok(None)` if this source does not know it
    fn load(&self, full_name: &str) -> Result<Option<ClassStub>>;
}

/// Which variant of reference type is being declared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Class,
    Interface,
    Annotation,
}

pub struct TypeRepository {
    types: Vec<TypeDescriptor>,
    by_name: HashMap<String, TypeId>,
    fields: Vec<FieldDef>,
    methods: Vec<MethodDef>,
    constructors: Vec<ConstructorDef>,
    sources: Vec<Box<dyn TypeSource>>,
    missing: HashSet<String>,
}

impl fmt::Debug for TypeRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRepository")
            .field("types", &self.types.len())
            .field("methods", &self.methods.len())
            .field("sources", &self.sources.iter().map(|s| s.describe()).collect::<Vec<_>>())
            .finish()
    }
}

impl Default for TypeRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRepository {
    pub fn new() -> Self {
        let mut repo = Self {
            types: Vec::new(),
            by_name: HashMap::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            sources: Vec::new(),
            missing: HashSet::new(),
        };
        // order must match the TypeId constants
        repo.push_type("void".to_string(), TypeKind::Void);
        for kind in PrimitiveKind::ALL {
            let id = repo.push_type(kind.name().to_string(), TypeKind::Primitive(kind));
            debug_assert_eq!(id, TypeId::of_primitive(kind));
        }
        repo.push_type("null".to_string(), TypeKind::Null);
        repo
    }

    pub fn add_source(&mut self, source: Box<dyn TypeSource>) {
        log::debug!("type source registered: {}", source.describe());
        self.sources.push(source);
    }

    pub fn with_source(mut self, source: Box<dyn TypeSource>) -> Self {
        self.add_source(source);
        self
    }

    fn push_type(&mut self, full_name: String, kind: TypeKind) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.by_name.insert(full_name.clone(), id);
        self.types.push(TypeDescriptor { full_name, kind });
        id
    }

    pub fn get(&self, id: TypeId) -> &TypeDescriptor {
        &self.types[id.index()]
    }

    pub(crate) fn get_mut(&mut self, id: TypeId) -> &mut TypeDescriptor {
        &mut self.types[id.index()]
    }

    pub fn name(&self, id: TypeId) -> &str {
        &self.get(id).full_name
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Cache-only lookup
    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    /// Resolves a full name, primitive name, `T[]` suffix form or `[`-prefixed
    /// binary array name
    pub fn resolve(&mut self, name: &str) -> Result<Option<TypeId>> {
        if let Some(id) = self.lookup(name) {
            return Ok(Some(id));
        }
        if let Some(element) = name.strip_suffix("[]") {
            return Ok(match self.resolve(element)? {
                Some(component) => Some(self.array_of(component)),
                None => None,
            });
        }
        if name.starts_with('[') {
            match parse_field_descriptor(&name.replace('.', "/")) {
                Ok((_, used)) if used == name.len() => {}
                _ => return Ok(None),
            }
            return Ok(match self.resolve_descriptor(&name[1..])? {
                Some(component) => Some(self.array_of(component)),
                None => None,
            });
        }
        if self.missing.contains(name) {
            return Ok(None);
        }
        self.load_external(name)
    }

    /// Resolves or raises a positioned not-found error
    pub fn require(&mut self, name: &str, pos: &LineCol) -> Result<TypeId> {
        match self.resolve(name)? {
            Some(id) => Ok(id),
            None => Err(Error::not_found(format!("cannot resolve type {}", name), pos)),
        }
    }

    /// Resolves a library type the lowering depends on; absence is a
    /// compiler defect, not a user error
    pub fn well_known(&mut self, name: &str) -> Result<TypeId> {
        match self.resolve(name)? {
            Some(id) => Ok(id),
            None => Err(Error::internal(format!("missing well-known library type {}", name))),
        }
    }

    fn resolve_descriptor(&mut self, desc: &str) -> Result<Option<TypeId>> {
        let first = desc.chars().next();
        match first {
            Some('[') => self.resolve(desc),
            Some('L') if desc.ends_with(';') => self.resolve(&desc[1..desc.len() - 1].replace('/', ".")),
            Some(c) if desc.len() == 1 => Ok(PrimitiveKind::from_descriptor(c).map(TypeId::of_primitive)),
            _ => Ok(None),
        }
    }

    /// Array type with one more dimension than `component`
    pub fn array_of(&mut self, component: TypeId) -> TypeId {
        let component_desc = type_descriptor(self, component);
        let (element, dimension) = match self.get(component).kind {
            TypeKind::Array { element, dimension, .. } => (element, dimension + 1),
            _ => (component, 1),
        };
        let name = array_type_name(&component_desc, 1);
        if let Some(id) = self.lookup(&name) {
            return id;
        }
        self.push_type(name, TypeKind::Array { component, element, dimension })
    }

    fn load_external(&mut self, name: &str) -> Result<Option<TypeId>> {
        let mut found = None;
        for source in &self.sources {
            if let Some(stub) = source.load(name)? {
                log::trace!("derived {} from {}", name, source.describe());
                found = Some(stub);
                break;
            }
        }
        match found {
            Some(stub) => self.derive(stub).map(Some),
            None => {
                self.missing.insert(name.to_string());
                Ok(None)
            }
        }
    }

    /// Builds the descriptor of an external type. The handle is published in
    /// the name table before member types are resolved so that self- and
    /// mutually-referencing signatures terminate.
    fn derive(&mut self, stub: ClassStub) -> Result<TypeId> {
        let flags = stub.access_flags;
        let package = package_of(&stub.name);
        let info = RefTypeInfo {
            package,
            modifiers: Modifiers(flags & !ACC_SUPER),
            ..RefTypeInfo::default()
        };
        let kind = if flags & ACC_ANNOTATION != 0 {
            TypeKind::Annotation(info)
        } else if flags & ACC_INTERFACE != 0 {
            TypeKind::Interface(info)
        } else {
            TypeKind::Class(info)
        };
        let id = self.push_type(stub.name.clone(), kind);

        let parent = match &stub.super_name {
            Some(parent) => match self.resolve(parent)? {
                Some(p) => Some(p),
                None => {
                    log::debug!("parent {} of {} not found, assuming java.lang.Object", parent, stub.name);
                    self.resolve("java.lang.Object")?
                }
            },
            None => None,
        };
        let mut interfaces = Vec::new();
        for name in &stub.interfaces {
            match self.resolve(name)? {
                Some(i) => interfaces.push(i),
                None => log::debug!("interface {} of {} not found", name, stub.name),
            }
        }
        let annotations = self.derive_annotations(&stub.annotations)?;
        if let Some(info) = self.get_mut(id).ref_info_mut() {
            info.parent = parent;
            info.interfaces = interfaces;
            info.annotations = annotations;
        }

        for field in &stub.fields {
            let (type_name, _) = parse_field_descriptor(&field.descriptor)?;
            let Some(ty) = self.resolve(&type_name)? else {
                log::debug!("skipping field {}.{}: {} not found", stub.name, field.name, type_name);
                continue;
            };
            let annotations = self.derive_annotations(&field.annotations)?;
            self.add_field(FieldDef {
                name: field.name.clone(),
                ty,
                modifiers: Modifiers(field.access_flags),
                declaring: id,
                annotations,
                line_col: LineCol::synthetic(),
            });
        }

        'methods: for method in &stub.methods {
            if method.name == "<clinit>" || method.access_flags & (ACC_SYNTHETIC | ACC_VOLATILE) != 0 {
                // synthetic and bridge methods are not callable by name
                continue;
            }
            let (param_names, ret_name) = parse_method_descriptor(&method.descriptor)?;
            let mut params = Vec::with_capacity(param_names.len());
            for (i, p) in param_names.iter().enumerate() {
                let Some(ty) = self.resolve(p)? else {
                    log::debug!("skipping method {}.{}: {} not found", stub.name, method.name, p);
                    continue 'methods;
                };
                params.push(Param { name: format!("arg{}", i), ty, annotations: Vec::new() });
            }
            let annotations = self.derive_annotations(&method.annotations)?;
            let modifiers = Modifiers(method.access_flags);
            if method.name == "<init>" {
                self.add_constructor(ConstructorDef {
                    declaring: id,
                    params,
                    modifiers,
                    body: None,
                    annotations,
                    line_col: LineCol::synthetic(),
                });
                continue;
            }
            let Some(return_type) = self.resolve(&ret_name)? else {
                log::debug!("skipping method {}.{}: {} not found", stub.name, method.name, ret_name);
                continue;
            };
            self.add_method(MethodDef {
                name: method.name.clone(),
                declaring: id,
                return_type,
                params,
                modifiers,
                body: None,
                annotations,
                overrides: Vec::new(),
                overridden_by: Vec::new(),
                annotation_default: None,
                line_col: LineCol::synthetic(),
            });
        }
        Ok(id)
    }

    fn derive_annotations(&mut self, stubs: &[AnnotationStub]) -> Result<Vec<AnnotationInstance>> {
        let mut out = Vec::new();
        for stub in stubs {
            if let Some(ty) = self.resolve(&stub.type_name)? {
                out.push(AnnotationInstance { ty, values: stub.values.clone() });
            }
        }
        Ok(out)
    }

    /// Records a type of the current compilation with no members yet
    pub fn declare(&mut self, full_name: &str, kind: DeclKind, info: RefTypeInfo, pos: &LineCol) -> Result<TypeId> {
        if self.lookup(full_name).is_some() {
            return Err(Error::semantic(
                SemanticErrorKind::Duplicate,
                format!("duplicate type {}", full_name),
                pos,
            ));
        }
        let kind = match kind {
            DeclKind::Class => TypeKind::Class(info),
            DeclKind::Interface => TypeKind::Interface(info),
            DeclKind::Annotation => TypeKind::Annotation(info),
        };
        Ok(self.push_type(full_name.to_string(), kind))
    }

    pub fn add_field(&mut self, def: FieldDef) -> FieldId {
        let id = FieldId(self.fields.len() as u32);
        let declaring = def.declaring;
        self.fields.push(def);
        if let Some(info) = self.get_mut(declaring).ref_info_mut() {
            info.fields.push(id);
        }
        id
    }

    pub fn add_method(&mut self, def: MethodDef) -> MethodId {
        let id = MethodId(self.methods.len() as u32);
        let declaring = def.declaring;
        self.methods.push(def);
        if let Some(info) = self.get_mut(declaring).ref_info_mut() {
            info.methods.push(id);
        }
        id
    }

    pub fn add_constructor(&mut self, def: ConstructorDef) -> CtorId {
        let id = CtorId(self.constructors.len() as u32);
        let declaring = def.declaring;
        self.constructors.push(def);
        if let Some(info) = self.get_mut(declaring).ref_info_mut() {
            info.constructors.push(id);
        }
        id
    }

    pub fn field(&self, id: FieldId) -> &FieldDef {
        &self.fields[id.0 as usize]
    }

    pub fn method(&self, id: MethodId) -> &MethodDef {
        &self.methods[id.0 as usize]
    }

    pub(crate) fn method_mut(&mut self, id: MethodId) -> &mut MethodDef {
        &mut self.methods[id.0 as usize]
    }

    pub fn constructor(&self, id: CtorId) -> &ConstructorDef {
        &self.constructors[id.0 as usize]
    }

    pub(crate) fn constructor_mut(&mut self, id: CtorId) -> &mut ConstructorDef {
        &mut self.constructors[id.0 as usize]
    }

    pub fn fields_of(&self, ty: TypeId) -> &[FieldId] {
        self.get(ty).ref_info().map(|i| i.fields.as_slice()).unwrap_or(&[])
    }

    pub fn methods_of(&self, ty: TypeId) -> &[MethodId] {
        self.get(ty).ref_info().map(|i| i.methods.as_slice()).unwrap_or(&[])
    }

    pub fn constructors_of(&self, ty: TypeId) -> &[CtorId] {
        self.get(ty).ref_info().map(|i| i.constructors.as_slice()).unwrap_or(&[])
    }

    pub fn parent_of(&self, ty: TypeId) -> Option<TypeId> {
        self.get(ty).ref_info().and_then(|i| i.parent)
    }

    pub fn interfaces_of(&self, ty: TypeId) -> &[TypeId] {
        self.get(ty).ref_info().map(|i| i.interfaces.as_slice()).unwrap_or(&[])
    }

    /// Parent chain followed by the interface closure, breadth first,
    /// excluding `ty` itself
    pub fn ancestors(&self, ty: TypeId) -> Vec<TypeId> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        seen.insert(ty);
        let mut cursor = self.parent_of(ty);
        while let Some(p) = cursor {
            if !seen.insert(p) {
                break;
            }
            out.push(p);
            cursor = self.parent_of(p);
        }
        let mut queue: VecDeque<TypeId> = std::iter::once(ty).chain(out.iter().copied()).collect();
        while let Some(t) = queue.pop_front() {
            for i in self.interfaces_of(t) {
                if seen.insert(*i) {
                    out.push(*i);
                    queue.push_back(*i);
                }
            }
        }
        out
    }

    pub fn is_subtype(&self, sub: TypeId, sup: TypeId) -> bool {
        sub == sup || self.ancestors(sub).contains(&sup)
    }

    /// Reference assignability without conversions
    pub fn is_assignable(&self, from: TypeId, to: TypeId) -> bool {
        if from == to {
            return true;
        }
        let to_desc = self.get(to);
        if !to_desc.is_reference() || matches!(to_desc.kind, TypeKind::Null) {
            return false;
        }
        let from_desc = self.get(from);
        match &from_desc.kind {
            TypeKind::Null => true,
            TypeKind::Primitive(_) | TypeKind::Void => false,
            _ if to_desc.full_name == "java.lang.Object" => true,
            TypeKind::Array { component, .. } => match &to_desc.kind {
                TypeKind::Array { component: to_component, .. } => {
                    let (c, tc) = (*component, *to_component);
                    c == tc || (self.get(c).is_reference() && self.is_assignable(c, tc))
                }
                _ => matches!(to_desc.full_name.as_str(), "java.lang.Cloneable" | "java.io.Serializable"),
            },
            _ => self.is_subtype(from, to),
        }
    }

    /// Boxing class of a primitive
    pub fn wrapper_of(&mut self, kind: PrimitiveKind) -> Result<TypeId> {
        self.well_known(kind.wrapper())
    }

    /// Primitive behind a boxing class
    pub fn unboxed_kind(&self, ty: TypeId) -> Option<PrimitiveKind> {
        PrimitiveKind::from_wrapper(&self.get(ty).full_name)
    }
}

/// Primitive widening conversion (JLS 5.1.2)
pub fn is_widening(from: PrimitiveKind, to: PrimitiveKind) -> bool {
    use PrimitiveKind::*;
    if from == to {
        return true;
    }
    match from {
        Byte => matches!(to, Short | Int | Long | Float | Double),
        Short | Char => matches!(to, Int | Long | Float | Double),
        Int => matches!(to, Long | Float | Double),
        Long => matches!(to, Float | Double),
        Float => matches!(to, Double),
        Double | Boolean => false,
    }
}

pub fn package_of(full_name: &str) -> String {
    match full_name.rfind('.') {
        Some(dot) => full_name[..dot].to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct OneClass;

    impl TypeSource for OneClass {
        fn describe(&self) -> String {
            "test".to_string()
        }

        fn load(&self, full_name: &str) -> Result<Option<ClassStub>> {
            Ok(match full_name {
                "java.lang.Object" => Some(ClassStub {
                    name: full_name.to_string(),
                    access_flags: ACC_PUBLIC,
                    methods: vec![MemberStub::new("<init>", "()V", ACC_PUBLIC)],
                    ..ClassStub::default()
                }),
                "demo.Node" => Some(ClassStub {
                    name: full_name.to_string(),
                    access_flags: ACC_PUBLIC,
                    super_name: Some("java.lang.Object".to_string()),
                    fields: vec![MemberStub::new("next", "Ldemo/Node;", ACC_PUBLIC)],
                    methods: vec![
                        MemberStub::new("size", "()I", ACC_PUBLIC),
                        MemberStub::new("broken", "(Lmissing/Type;)V", ACC_PUBLIC),
                    ],
                    ..ClassStub::default()
                }),
                _ => None,
            })
        }
    }

    #[test]
    fn test_primitives_are_preseeded() {
        let mut repo = TypeRepository::new();
        assert_eq!(repo.resolve("int").unwrap(), Some(TypeId::INT));
        assert_eq!(repo.resolve("void").unwrap(), Some(TypeId::VOID));
        assert_eq!(repo.get(TypeId::DOUBLE).category(), 2);
    }

    #[test]
    fn test_array_descriptors_are_cached() {
        let mut repo = TypeRepository::new();
        let a = repo.resolve("int[]").unwrap().unwrap();
        let b = repo.resolve("[I").unwrap().unwrap();
        assert_eq!(a, b);
        let aa = repo.array_of(a);
        assert_eq!(repo.name(aa), "[[I");
        assert_eq!(repo.resolve("int[][]").unwrap(), Some(aa));
        match repo.get(aa).kind {
            TypeKind::Array { component, element, dimension } => {
                assert_eq!(component, a);
                assert_eq!(element, TypeId::INT);
                assert_eq!(dimension, 2);
            }
            _ => panic!("not an array"),
        }
    }

    #[test]
    fn test_external_derivation_is_single_instance() {
        let mut repo = TypeRepository::new().with_source(Box::new(OneClass));
        let node = repo.resolve("demo.Node").unwrap().unwrap();
        assert_eq!(repo.resolve("demo.Node").unwrap(), Some(node));
        // self-referencing field resolved to the same handle
        let field = repo.field(repo.fields_of(node)[0]);
        assert_eq!(field.ty, node);
        // a method with an unresolvable parameter is skipped
        assert_eq!(repo.methods_of(node).len(), 1);
        let object = repo.lookup("java.lang.Object").unwrap();
        assert_eq!(repo.parent_of(node), Some(object));
        assert!(repo.is_assignable(node, object));
        assert!(!repo.is_assignable(object, node));
        assert_eq!(repo.resolve("no.Such").unwrap(), None);
    }

    #[test]
    fn test_declare_rejects_duplicates() {
        let mut repo = TypeRepository::new();
        let pos = LineCol::synthetic();
        repo.declare("a.B", DeclKind::Class, RefTypeInfo::default(), &pos).unwrap();
        let err = repo.declare("a.B", DeclKind::Class, RefTypeInfo::default(), &pos).unwrap_err();
        assert_eq!(err.semantic_kind(), Some(SemanticErrorKind::Duplicate));
    }

    #[test]
    fn test_widening_ladder() {
        assert!(is_widening(PrimitiveKind::Int, PrimitiveKind::Long));
        assert!(is_widening(PrimitiveKind::Long, PrimitiveKind::Float));
        assert!(!is_widening(PrimitiveKind::Long, PrimitiveKind::Int));
        assert!(!is_widening(PrimitiveKind::Char, PrimitiveKind::Short));
        assert!(!is_widening(PrimitiveKind::Boolean, PrimitiveKind::Int));
    }
}
