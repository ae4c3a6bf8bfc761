//! Type and member descriptors
//!
//! Descriptors live in the [`TypeRepository`](super::repository::TypeRepository)
//! arena and are addressed by small copyable handles. One name maps to exactly
//! one [`TypeId`], so handle equality is descriptor identity.

use std::fmt;

use crate::codegen::bytecode::access_flags::*;
use crate::error::LineCol;
use crate::ir::Body;

/// Handle of a type descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub(crate) u32);

impl TypeId {
    pub const VOID: TypeId = TypeId(0);
    pub const BOOLEAN: TypeId = TypeId(1);
    pub const BYTE: TypeId = TypeId(2);
    pub const SHORT: TypeId = TypeId(3);
    pub const CHAR: TypeId = TypeId(4);
    pub const INT: TypeId = TypeId(5);
    pub const LONG: TypeId = TypeId(6);
    pub const FLOAT: TypeId = TypeId(7);
    pub const DOUBLE: TypeId = TypeId(8);
    /// Type of the `null` literal, assignable to every reference type
    pub const NULL: TypeId = TypeId(9);

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }

    pub fn of_primitive(kind: PrimitiveKind) -> TypeId {
        match kind {
            PrimitiveKind::Boolean => TypeId::BOOLEAN,
            PrimitiveKind::Byte => TypeId::BYTE,
            PrimitiveKind::Short => TypeId::SHORT,
            PrimitiveKind::Char => TypeId::CHAR,
            PrimitiveKind::Int => TypeId::INT,
            PrimitiveKind::Long => TypeId::LONG,
            PrimitiveKind::Float => TypeId::FLOAT,
            PrimitiveKind::Double => TypeId::DOUBLE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CtorId(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Boolean,
    Byte,
    Short,
    Char,
    Int,
    Long,
    Float,
    Double,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 8] = [
        PrimitiveKind::Boolean,
        PrimitiveKind::Byte,
        PrimitiveKind::Short,
        PrimitiveKind::Char,
        PrimitiveKind::Int,
        PrimitiveKind::Long,
        PrimitiveKind::Float,
        PrimitiveKind::Double,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Byte => "byte",
            PrimitiveKind::Short => "short",
            PrimitiveKind::Char => "char",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        PrimitiveKind::ALL.iter().copied().find(|k| k.name() == name)
    }

    pub fn descriptor(self) -> char {
        match self {
            PrimitiveKind::Boolean => 'Z',
            PrimitiveKind::Byte => 'B',
            PrimitiveKind::Short => 'S',
            PrimitiveKind::Char => 'C',
            PrimitiveKind::Int => 'I',
            PrimitiveKind::Long => 'J',
            PrimitiveKind::Float => 'F',
            PrimitiveKind::Double => 'D',
        }
    }

    pub fn from_descriptor(c: char) -> Option<Self> {
        PrimitiveKind::ALL.iter().copied().find(|k| k.descriptor() == c)
    }

    /// Full name of the boxing class
    pub fn wrapper(self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "java.lang.Boolean",
            PrimitiveKind::Byte => "java.lang.Byte",
            PrimitiveKind::Short => "java.lang.Short",
            PrimitiveKind::Char => "java.lang.Character",
            PrimitiveKind::Int => "java.lang.Integer",
            PrimitiveKind::Long => "java.lang.Long",
            PrimitiveKind::Float => "java.lang.Float",
            PrimitiveKind::Double => "java.lang.Double",
        }
    }

    pub fn from_wrapper(name: &str) -> Option<Self> {
        PrimitiveKind::ALL.iter().copied().find(|k| k.wrapper() == name)
    }

    /// Name of the unboxing accessor on the wrapper, e.g. `intValue`
    pub fn unbox_method(self) -> String {
        format!("{}Value", self.name())
    }

    /// Suffix of the runtime coercion helper, e.g. `castToInt`
    pub fn coercion_helper(self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "castToBool",
            PrimitiveKind::Byte => "castToByte",
            PrimitiveKind::Short => "castToShort",
            PrimitiveKind::Char => "castToChar",
            PrimitiveKind::Int => "castToInt",
            PrimitiveKind::Long => "castToLong",
            PrimitiveKind::Float => "castToFloat",
            PrimitiveKind::Double => "castToDouble",
        }
    }

    /// Occupies two stack/local slots
    pub fn is_wide(self) -> bool {
        matches!(self, PrimitiveKind::Long | PrimitiveKind::Double)
    }

    pub fn is_numeric(self) -> bool {
        !matches!(self, PrimitiveKind::Boolean)
    }

    /// Computational kind on the operand stack: sub-int types compute as int
    pub fn computational(self) -> NumKind {
        match self {
            PrimitiveKind::Long => NumKind::Long,
            PrimitiveKind::Float => NumKind::Float,
            PrimitiveKind::Double => NumKind::Double,
            _ => NumKind::Int,
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The four computational kinds of the numeric promotion ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NumKind {
    Int,
    Long,
    Float,
    Double,
}

impl NumKind {
    /// Offset of this kind within a typed opcode family (`iadd`, `ladd`, ...)
    pub fn opcode_offset(self) -> u8 {
        match self {
            NumKind::Int => 0,
            NumKind::Long => 1,
            NumKind::Float => 2,
            NumKind::Double => 3,
        }
    }

    pub fn type_id(self) -> TypeId {
        match self {
            NumKind::Int => TypeId::INT,
            NumKind::Long => TypeId::LONG,
            NumKind::Float => TypeId::FLOAT,
            NumKind::Double => TypeId::DOUBLE,
        }
    }
}

/// Declared access level, ordered from most to least restrictive
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Access {
    Private,
    Package,
    Protected,
    Public,
}

/// Access and property flags of a type or member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Modifiers(pub u16);

impl Modifiers {
    pub fn new(bits: u16) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u16 {
        self.0
    }

    pub fn contains(self, flag: u16) -> bool {
        self.0 & flag == flag
    }

    pub fn insert(&mut self, flag: u16) {
        self.0 |= flag;
    }

    pub fn remove(&mut self, flag: u16) {
        self.0 &= !flag;
    }

    pub fn with(mut self, flag: u16) -> Self {
        self.insert(flag);
        self
    }

    pub fn is_static(self) -> bool {
        self.contains(ACC_STATIC)
    }

    pub fn is_abstract(self) -> bool {
        self.contains(ACC_ABSTRACT)
    }

    pub fn is_final(self) -> bool {
        self.contains(ACC_FINAL)
    }

    pub fn is_private(self) -> bool {
        self.contains(ACC_PRIVATE)
    }

    pub fn access(self) -> Access {
        if self.contains(ACC_PUBLIC) {
            Access::Public
        } else if self.contains(ACC_PROTECTED) {
            Access::Protected
        } else if self.contains(ACC_PRIVATE) {
            Access::Private
        } else {
            Access::Package
        }
    }
}

/// Value of an annotation element
#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Bool(bool),
    Char(u16),
    Short(i16),
    Byte(i8),
    String(String),
    /// Enum constant, by the enum's full name and the constant's name
    Enum { type_name: String, constant: String },
    /// Class literal, by full type name
    Class(String),
    Array(Vec<ElementValue>),
    Annotation(Box<AnnotationInstance>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationInstance {
    pub ty: TypeId,
    pub values: Vec<(String, ElementValue)>,
}

impl AnnotationInstance {
    pub fn value(&self, name: &str) -> Option<&ElementValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

/// Class, interface and annotation-type payload
#[derive(Debug, Clone, Default)]
pub struct RefTypeInfo {
    pub package: String,
    pub modifiers: Modifiers,
    /// Superclass; `None` only for the root object type and interfaces
    pub parent: Option<TypeId>,
    pub interfaces: Vec<TypeId>,
    pub fields: Vec<FieldId>,
    pub methods: Vec<MethodId>,
    pub constructors: Vec<CtorId>,
    pub annotations: Vec<AnnotationInstance>,
    /// `<clinit>` code, present only for types compiled in this run
    pub static_init: Option<Body>,
    /// Source file the type was declared in
    pub source_file: Option<String>,
    pub line_col: LineCol,
    /// Declared or synthesized in this compilation (as opposed to loaded)
    pub in_unit: bool,
}

#[derive(Debug, Clone)]
pub enum TypeKind {
    Primitive(PrimitiveKind),
    Void,
    Null,
    Array {
        /// One dimension less than this type
        component: TypeId,
        /// Innermost non-array type
        element: TypeId,
        dimension: u8,
    },
    Class(RefTypeInfo),
    Interface(RefTypeInfo),
    Annotation(RefTypeInfo),
}

#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    pub full_name: String,
    pub kind: TypeKind,
}

impl TypeDescriptor {
    pub fn primitive(&self) -> Option<PrimitiveKind> {
        match self.kind {
            TypeKind::Primitive(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self.kind, TypeKind::Primitive(_))
    }

    pub fn is_void(&self) -> bool {
        matches!(self.kind, TypeKind::Void)
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, TypeKind::Array { .. })
    }

    pub fn is_interface(&self) -> bool {
        matches!(self.kind, TypeKind::Interface(_) | TypeKind::Annotation(_))
    }

    pub fn is_class(&self) -> bool {
        matches!(self.kind, TypeKind::Class(_))
    }

    pub fn is_reference(&self) -> bool {
        !matches!(self.kind, TypeKind::Primitive(_) | TypeKind::Void)
    }

    pub fn ref_info(&self) -> Option<&RefTypeInfo> {
        match &self.kind {
            TypeKind::Class(info) | TypeKind::Interface(info) | TypeKind::Annotation(info) => Some(info),
            _ => None,
        }
    }

    pub fn ref_info_mut(&mut self) -> Option<&mut RefTypeInfo> {
        match &mut self.kind {
            TypeKind::Class(info) | TypeKind::Interface(info) | TypeKind::Annotation(info) => Some(info),
            _ => None,
        }
    }

    pub fn modifiers(&self) -> Modifiers {
        self.ref_info().map(|i| i.modifiers).unwrap_or(Modifiers(ACC_PUBLIC))
    }

    pub fn package(&self) -> &str {
        match self.ref_info() {
            Some(info) => &info.package,
            None => "",
        }
    }

    pub fn simple_name(&self) -> &str {
        match self.full_name.rfind('.') {
            Some(dot) if !self.is_array() => &self.full_name[dot + 1..],
            _ => &self.full_name,
        }
    }

    /// Operand-stack slots a value of this type occupies
    pub fn category(&self) -> u16 {
        match self.kind {
            TypeKind::Void => 0,
            TypeKind::Primitive(kind) if kind.is_wide() => 2,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: TypeId,
    pub annotations: Vec<AnnotationInstance>,
}

#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub ty: TypeId,
    pub modifiers: Modifiers,
    pub declaring: TypeId,
    pub annotations: Vec<AnnotationInstance>,
    pub line_col: LineCol,
}

#[derive(Debug, Clone)]
pub struct MethodDef {
    pub name: String,
    pub declaring: TypeId,
    pub return_type: TypeId,
    pub params: Vec<Param>,
    pub modifiers: Modifiers,
    pub body: Option<Body>,
    pub annotations: Vec<AnnotationInstance>,
    /// Methods in supertypes this one overrides
    pub overrides: Vec<MethodId>,
    /// Methods in subtypes compiled in this run that override this one
    pub overridden_by: Vec<MethodId>,
    /// Constant default of an annotation-type element
    pub annotation_default: Option<ElementValue>,
    pub line_col: LineCol,
}

impl MethodDef {
    pub fn param_types(&self) -> Vec<TypeId> {
        self.params.iter().map(|p| p.ty).collect()
    }
}

#[derive(Debug, Clone)]
pub struct ConstructorDef {
    pub declaring: TypeId,
    pub params: Vec<Param>,
    pub modifiers: Modifiers,
    pub body: Option<Body>,
    pub annotations: Vec<AnnotationInstance>,
    pub line_col: LineCol,
}

impl ConstructorDef {
    pub fn param_types(&self) -> Vec<TypeId> {
        self.params.iter().map(|p| p.ty).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_tables_agree() {
        for kind in PrimitiveKind::ALL {
            assert_eq!(PrimitiveKind::from_name(kind.name()), Some(kind));
            assert_eq!(PrimitiveKind::from_descriptor(kind.descriptor()), Some(kind));
            assert_eq!(PrimitiveKind::from_wrapper(kind.wrapper()), Some(kind));
        }
        assert_eq!(PrimitiveKind::Char.unbox_method(), "charValue");
    }

    #[test]
    fn test_modifiers_access_levels() {
        assert_eq!(Modifiers(ACC_PUBLIC | ACC_STATIC).access(), Access::Public);
        assert_eq!(Modifiers(ACC_FINAL).access(), Access::Package);
        assert!(Access::Private < Access::Protected);
        let mut m = Modifiers::default().with(ACC_ABSTRACT);
        assert!(m.is_abstract());
        m.remove(ACC_ABSTRACT);
        assert!(!m.is_abstract());
    }
}
