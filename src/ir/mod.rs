//! Typed intermediate representation of member bodies
//!
//! Every instruction of a member lives in one [`Body`] arena and is addressed
//! by an [`InsId`]. Branches and exception-table entries hold handles, never
//! positions; positions are assigned only when the emitter walks the body.
//! Value-producing instructions nest: the operands of an invocation are child
//! instructions, and only the top-level [`Body::code`] list is a statement
//! sequence.

use crate::common::types::{CtorId, FieldId, MethodId, NumKind, TypeId};
use crate::error::LineCol;

/// Handle of an instruction within its owning [`Body`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InsId(u32);

impl InsId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// Also used for boolean, byte, short and char constants
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeKind {
    Static,
    Virtual,
    Special,
    Interface,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Callee {
    Method(MethodId),
    Constructor(CtorId),
}

/// Primitive conversion instructions (`i2l` .. `i2s`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastOp {
    I2L,
    I2F,
    I2D,
    L2I,
    L2F,
    L2D,
    F2I,
    F2L,
    F2D,
    D2I,
    D2L,
    D2F,
    I2B,
    I2C,
    I2S,
}

impl CastOp {
    pub fn opcode(self) -> u8 {
        0x85 + self as u8
    }

    /// Direct conversion between two computational kinds
    pub fn between(from: NumKind, to: NumKind) -> Option<CastOp> {
        use NumKind::*;
        Some(match (from, to) {
            (Int, Long) => CastOp::I2L,
            (Int, Float) => CastOp::I2F,
            (Int, Double) => CastOp::I2D,
            (Long, Int) => CastOp::L2I,
            (Long, Float) => CastOp::L2F,
            (Long, Double) => CastOp::L2D,
            (Float, Int) => CastOp::F2I,
            (Float, Long) => CastOp::F2L,
            (Float, Double) => CastOp::F2D,
            (Double, Int) => CastOp::D2I,
            (Double, Long) => CastOp::D2L,
            (Double, Float) => CastOp::D2F,
            _ => return None,
        })
    }
}

/// Two-operand arithmetic/logic instruction families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    Ushr,
    And,
    Or,
    Xor,
    /// `lcmp`, `fcmpl`, `dcmpl`: pushes -1, 0 or 1
    Cmp,
}

impl ArithOp {
    /// Opcode for the given operand kind
    pub fn opcode(self, kind: NumKind) -> Option<u8> {
        let offset = kind.opcode_offset();
        let integral = matches!(kind, NumKind::Int | NumKind::Long);
        Some(match self {
            ArithOp::Add => 0x60 + offset,
            ArithOp::Sub => 0x64 + offset,
            ArithOp::Mul => 0x68 + offset,
            ArithOp::Div => 0x6c + offset,
            ArithOp::Rem => 0x70 + offset,
            ArithOp::Shl if integral => 0x78 + offset,
            ArithOp::Shr if integral => 0x7a + offset,
            ArithOp::Ushr if integral => 0x7c + offset,
            ArithOp::And if integral => 0x7e + offset,
            ArithOp::Or if integral => 0x80 + offset,
            ArithOp::Xor if integral => 0x82 + offset,
            ArithOp::Cmp => match kind {
                NumKind::Int => return None,
                NumKind::Long => 0x94,
                NumKind::Float => 0x95,
                NumKind::Double => 0x97,
            },
            _ => return None,
        })
    }

    pub fn is_shift(self) -> bool {
        matches!(self, ArithOp::Shl | ArithOp::Shr | ArithOp::Ushr)
    }

    pub fn is_bitwise(self) -> bool {
        matches!(self, ArithOp::And | ArithOp::Or | ArithOp::Xor)
    }
}

/// Static argument of a bootstrap method
#[derive(Debug, Clone, PartialEq)]
pub enum BootstrapArg {
    /// `CONSTANT_MethodType` of the given method's descriptor
    MethodTypeOf(MethodId),
    /// `CONSTANT_MethodHandle` referring to the given method
    Handle(MethodId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Ins {
    // value-producing
    Const { value: Constant, ty: TypeId },
    This { ty: TypeId },
    Load { slot: u16, ty: TypeId },
    GetField { target: InsId, field: FieldId, ty: TypeId },
    GetStatic { field: FieldId, ty: TypeId },
    New { ctor: CtorId, args: Vec<InsId>, ty: TypeId },
    /// `newarray`/`anewarray` of one dimension; `ty` is the array type
    NewArray { length: InsId, ty: TypeId },
    ArrayLoad { array: InsId, index: InsId, ty: TypeId },
    ArrayLength { array: InsId },
    /// `ty` is the return type; constructors invoked on `this` return void
    Invoke {
        kind: InvokeKind,
        callee: Callee,
        target: Option<InsId>,
        args: Vec<InsId>,
        ty: TypeId,
    },
    InvokeDynamic {
        bootstrap: MethodId,
        name: String,
        args: Vec<InsId>,
        static_args: Vec<BootstrapArg>,
        ty: TypeId,
    },
    Cast { op: CastOp, value: InsId, ty: TypeId },
    CheckCast { value: InsId, ty: TypeId },
    TwoVarOp {
        op: ArithOp,
        kind: NumKind,
        left: InsId,
        right: InsId,
        ty: TypeId,
    },
    /// Negation
    OneVarOp { kind: NumKind, value: InsId, ty: TypeId },
    LogicAnd { left: InsId, right: InsId },
    LogicOr { left: InsId, right: InsId },
    ClassLiteral { of: TypeId, ty: TypeId },
    MethodHandle { method: MethodId, ty: TypeId },
    /// Ordered sub-sequence whose value is the last element's value
    Pack { items: Vec<InsId>, auto_pop: bool },

    // side-effect only
    Store { slot: u16, value: InsId, ty: TypeId },
    PutField { target: InsId, field: FieldId, value: InsId },
    PutStatic { field: FieldId, value: InsId },
    ArrayStore { array: InsId, index: InsId, value: InsId, elem: TypeId },
    IfEq { cond: InsId, target: InsId },
    IfNe { cond: InsId, target: InsId },
    Goto { target: InsId },
    Nop,
    Return { value: Option<InsId> },
    Throw { value: InsId },
    /// Binds the exception pushed at handler entry to a local
    ExStore { slot: u16 },
    /// Discards the exception pushed at handler entry
    Pop,
    MonitorEnter { value: InsId },
    MonitorExit { value: InsId },
}

impl Ins {
    /// Instructions that terminate a protected range when scanning forward.
    ///
    /// Besides jumps and stores this includes `Nop`: every label, and the
    /// marker placed before each cleanup copy of a return or outward jump,
    /// is a `Nop`. A range whose inclusive end is followed by a label would
    /// otherwise run on into the cleanup code after it.
    pub fn ends_protected_range(&self) -> bool {
        matches!(self, Ins::Goto { .. } | Ins::Store { .. } | Ins::ExStore { .. } | Ins::Nop)
    }
}

/// One protected region. `end` is the logical, inclusive last instruction;
/// the exclusive end is resolved at emission.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionEntry {
    pub start: InsId,
    pub end: InsId,
    pub handler: InsId,
    /// `None` catches every exception
    pub catch_type: Option<TypeId>,
}

#[derive(Debug, Clone)]
struct Node {
    ins: Ins,
    pos: LineCol,
}

/// Instruction arena, statement list and exception table of one member
#[derive(Debug, Clone, Default)]
pub struct Body {
    nodes: Vec<Node>,
    pub code: Vec<InsId>,
    pub exception_table: Vec<ExceptionEntry>,
}

impl Body {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, ins: Ins, pos: &LineCol) -> InsId {
        let id = InsId(self.nodes.len() as u32);
        self.nodes.push(Node { ins, pos: pos.clone() });
        id
    }

    pub fn get(&self, id: InsId) -> &Ins {
        &self.nodes[id.index()].ins
    }

    pub fn pos(&self, id: InsId) -> &LineCol {
        &self.nodes[id.index()].pos
    }

    /// Rewrites an instruction in place, keeping its identity
    pub fn replace(&mut self, id: InsId, ins: Ins) {
        self.nodes[id.index()].ins = ins;
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Static type of a value-producing instruction; `None` for
    /// side-effect-only instructions and empty packs
    pub fn type_of(&self, id: InsId) -> Option<TypeId> {
        match self.get(id) {
            Ins::Const { ty, .. }
            | Ins::This { ty }
            | Ins::Load { ty, .. }
            | Ins::GetField { ty, .. }
            | Ins::GetStatic { ty, .. }
            | Ins::New { ty, .. }
            | Ins::NewArray { ty, .. }
            | Ins::ArrayLoad { ty, .. }
            | Ins::Invoke { ty, .. }
            | Ins::InvokeDynamic { ty, .. }
            | Ins::Cast { ty, .. }
            | Ins::CheckCast { ty, .. }
            | Ins::TwoVarOp { ty, .. }
            | Ins::OneVarOp { ty, .. }
            | Ins::ClassLiteral { ty, .. }
            | Ins::MethodHandle { ty, .. } => Some(*ty),
            Ins::ArrayLength { .. } => Some(TypeId::INT),
            Ins::LogicAnd { .. } | Ins::LogicOr { .. } => Some(TypeId::BOOLEAN),
            Ins::Pack { items, .. } => items.last().and_then(|last| self.type_of(*last)),
            Ins::Store { .. }
            | Ins::PutField { .. }
            | Ins::PutStatic { .. }
            | Ins::ArrayStore { .. }
            | Ins::IfEq { .. }
            | Ins::IfNe { .. }
            | Ins::Goto { .. }
            | Ins::Nop
            | Ins::Return { .. }
            | Ins::Throw { .. }
            | Ins::ExStore { .. }
            | Ins::Pop
            | Ins::MonitorEnter { .. }
            | Ins::MonitorExit { .. } => None,
        }
    }

    /// Branch target of a jump instruction
    pub fn branch_target(&self, id: InsId) -> Option<InsId> {
        match self.get(id) {
            Ins::IfEq { target, .. } | Ins::IfNe { target, .. } | Ins::Goto { target } => Some(*target),
            _ => None,
        }
    }

    /// Counts instructions in the top-level list and their operands that
    /// satisfy `pred`
    pub fn count_reachable(&self, pred: impl Fn(&Ins) -> bool) -> usize {
        let mut count = 0;
        let mut stack: Vec<InsId> = self.code.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let ins = self.get(id);
            if pred(ins) {
                count += 1;
            }
            stack.extend(self.operands(id).into_iter().rev());
        }
        count
    }

    /// Child values evaluated as part of this instruction, in evaluation order
    pub fn operands(&self, id: InsId) -> Vec<InsId> {
        match self.get(id) {
            Ins::GetField { target, .. } => vec![*target],
            Ins::New { args, .. } => args.clone(),
            Ins::NewArray { length, .. } => vec![*length],
            Ins::ArrayLoad { array, index, .. } => vec![*array, *index],
            Ins::ArrayLength { array } => vec![*array],
            Ins::Invoke { target, args, .. } => target.iter().chain(args.iter()).copied().collect(),
            Ins::InvokeDynamic { args, .. } => args.clone(),
            Ins::Cast { value, .. } | Ins::CheckCast { value, .. } | Ins::OneVarOp { value, .. } => vec![*value],
            Ins::TwoVarOp { left, right, .. }
            | Ins::LogicAnd { left, right }
            | Ins::LogicOr { left, right } => vec![*left, *right],
            Ins::Pack { items, .. } => items.clone(),
            Ins::Store { value, .. } | Ins::PutStatic { field: _, value } => vec![*value],
            Ins::PutField { target, value, .. } => vec![*target, *value],
            Ins::ArrayStore { array, index, value, .. } => vec![*array, *index, *value],
            Ins::IfEq { cond, .. } | Ins::IfNe { cond, .. } => vec![*cond],
            Ins::Return { value } => value.iter().copied().collect(),
            Ins::Throw { value } | Ins::MonitorEnter { value } | Ins::MonitorExit { value } => vec![*value],
            Ins::Const { .. }
            | Ins::This { .. }
            | Ins::Load { .. }
            | Ins::GetStatic { .. }
            | Ins::ClassLiteral { .. }
            | Ins::MethodHandle { .. }
            | Ins::Goto { .. }
            | Ins::Nop
            | Ins::ExStore { .. }
            | Ins::Pop => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cast_opcodes_follow_table_order() {
        assert_eq!(CastOp::I2L.opcode(), 0x85);
        assert_eq!(CastOp::D2F.opcode(), 0x90);
        assert_eq!(CastOp::I2S.opcode(), 0x93);
        assert_eq!(CastOp::between(NumKind::Long, NumKind::Int), Some(CastOp::L2I));
        assert_eq!(CastOp::between(NumKind::Int, NumKind::Int), None);
    }

    #[test]
    fn test_arith_opcodes() {
        assert_eq!(ArithOp::Add.opcode(NumKind::Long), Some(0x61));
        assert_eq!(ArithOp::Rem.opcode(NumKind::Double), Some(0x73));
        assert_eq!(ArithOp::Ushr.opcode(NumKind::Long), Some(0x7d));
        assert_eq!(ArithOp::Xor.opcode(NumKind::Long), Some(0x83));
        assert_eq!(ArithOp::Xor.opcode(NumKind::Float), None);
        assert_eq!(ArithOp::Cmp.opcode(NumKind::Double), Some(0x97));
    }

    #[test]
    fn test_pack_takes_type_of_last_item() {
        let pos = LineCol::synthetic();
        let mut body = Body::new();
        let one = body.add(Ins::Const { value: Constant::Int(1), ty: TypeId::INT }, &pos);
        let store = body.add(Ins::Store { slot: 1, value: one, ty: TypeId::INT }, &pos);
        let load = body.add(Ins::Load { slot: 1, ty: TypeId::INT }, &pos);
        let pack = body.add(Ins::Pack { items: vec![store, load], auto_pop: true }, &pos);
        assert_eq!(body.type_of(pack), Some(TypeId::INT));
        assert_eq!(body.type_of(store), None);
        assert_eq!(body.operands(pack), vec![store, load]);
    }

    #[test]
    fn test_replace_keeps_identity() {
        let pos = LineCol::synthetic();
        let mut body = Body::new();
        let ret = body.add(Ins::Return { value: None }, &pos);
        body.replace(ret, Ins::Nop);
        assert_eq!(body.get(ret), &Ins::Nop);
        assert_eq!(body.len(), 1);
    }

    #[test]
    fn test_protected_range_terminators() {
        assert!(Ins::Nop.ends_protected_range());
        assert!(Ins::ExStore { slot: 2 }.ends_protected_range());
        assert!(!Ins::Return { value: None }.ends_protected_range());
        assert!(!Ins::Pop.ends_protected_range());
    }
}
