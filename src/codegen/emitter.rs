//! Bytecode emitter: walks the instruction list of one member and produces
//! its `Code` attribute
//!
//! The lowered form is a stack-balanced straight line with explicit branches,
//! so a single forward walk suffices. Every instruction gets the position it
//! is first visited at; branches are patched once every position is known.
//! After each top-level statement any value left on the operand stack is
//! discarded, keeping the depth at zero between statements.

use std::collections::HashMap;

use crate::common::repository::TypeRepository;
use crate::common::types::{CtorId, FieldId, MethodId, PrimitiveKind, TypeId, TypeKind};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::ir::{BootstrapArg, Body, Callee, Constant, Ins, InsId, InvokeKind};

use super::attribute::{make_line_number_table_attribute, BootstrapMethod, CodeAttribute, ExceptionTableEntry};
use super::bytecode::{array_type, reference_kind};
use super::code::{Code, MAX_CODE_LENGTH};
use super::constpool::ConstantPool;
use super::defs::CONSTRUCTOR_METHOD_NAME;
use super::descriptor::{internal_name, method_descriptor, type_descriptor};
use super::error::{BytecodeError, ConstPoolError, ConstPoolResult};
use super::opcodes::*;

/// Bootstrap methods referenced by one class, deduplicated
#[derive(Debug, Default)]
pub struct BootstrapTable {
    methods: Vec<BootstrapMethod>,
}

impl BootstrapTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    pub fn methods(&self) -> &[BootstrapMethod] {
        &self.methods
    }

    pub fn index_of(&mut self, method: BootstrapMethod) -> ConstPoolResult<u16> {
        if let Some(i) = self.methods.iter().position(|m| *m == method) {
            return Ok(i as u16);
        }
        if self.methods.len() >= u16::MAX as usize {
            return Err(ConstPoolError::TooManyBootstrapMethods);
        }
        self.methods.push(method);
        Ok((self.methods.len() - 1) as u16)
    }
}

/// Per-class state shared by every member emission
pub struct ClassContext<'a> {
    pub repo: &'a TypeRepository,
    pub config: &'a Config,
    pub cp: &'a mut ConstantPool,
    pub bootstraps: &'a mut BootstrapTable,
}

impl ClassContext<'_> {
    pub fn class_ref(&mut self, ty: TypeId) -> ConstPoolResult<u16> {
        self.cp.try_add_class(&internal_name(self.repo, ty))
    }

    pub fn field_ref(&mut self, field: FieldId) -> ConstPoolResult<u16> {
        let def = self.repo.field(field);
        let owner = internal_name(self.repo, def.declaring);
        let desc = type_descriptor(self.repo, def.ty);
        self.cp.try_add_field_ref(&owner, &def.name, &desc)
    }

    pub fn method_ref(&mut self, method: MethodId) -> ConstPoolResult<u16> {
        let def = self.repo.method(method);
        let owner = internal_name(self.repo, def.declaring);
        let desc = method_descriptor(self.repo, &def.param_types(), def.return_type);
        if self.repo.get(def.declaring).is_interface() {
            self.cp.try_add_interface_method_ref(&owner, &def.name, &desc)
        } else {
            self.cp.try_add_method_ref(&owner, &def.name, &desc)
        }
    }

    pub fn constructor_ref(&mut self, ctor: CtorId) -> ConstPoolResult<u16> {
        let def = self.repo.constructor(ctor);
        let owner = internal_name(self.repo, def.declaring);
        let desc = method_descriptor(self.repo, &def.param_types(), TypeId::VOID);
        self.cp.try_add_method_ref(&owner, CONSTRUCTOR_METHOD_NAME, &desc)
    }

    pub fn method_handle(&mut self, method: MethodId) -> ConstPoolResult<u16> {
        let def = self.repo.method(method);
        let kind = if def.modifiers.is_static() {
            reference_kind::REF_INVOKE_STATIC
        } else if self.repo.get(def.declaring).is_interface() {
            reference_kind::REF_INVOKE_INTERFACE
        } else if def.modifiers.is_private() {
            reference_kind::REF_INVOKE_SPECIAL
        } else {
            reference_kind::REF_INVOKE_VIRTUAL
        };
        let index = self.method_ref(method)?;
        self.cp.try_add_method_handle(kind, index)
    }

    pub fn method_type(&mut self, method: MethodId) -> ConstPoolResult<u16> {
        let def = self.repo.method(method);
        let desc = method_descriptor(self.repo, &def.param_types(), def.return_type);
        self.cp.try_add_method_type(&desc)
    }
}

/// Signature facts about the member being emitted
pub struct MemberShape<'a> {
    pub name: &'a str,
    pub is_static: bool,
    pub params: &'a [TypeId],
    pub return_type: TypeId,
}

/// Emits one member body into a `Code` attribute payload
pub fn emit_body(ctx: &mut ClassContext<'_>, shape: &MemberShape<'_>, body: &Body) -> Result<CodeAttribute> {
    MethodEmitter::new(ctx, shape, body).run()
}

struct MethodEmitter<'c, 'a> {
    ctx: &'c mut ClassContext<'a>,
    body: &'c Body,
    code: Code,
    positions: HashMap<InsId, usize>,
    /// Branch address and the instruction it lands on
    fixups: Vec<(usize, InsId)>,
    return_type: TypeId,
}

impl<'c, 'a> MethodEmitter<'c, 'a> {
    fn new(ctx: &'c mut ClassContext<'a>, shape: &MemberShape<'_>, body: &'c Body) -> Self {
        let mut max_locals = if shape.is_static { 0 } else { 1 };
        for p in shape.params {
            max_locals += ctx.repo.get(*p).category();
        }
        Self {
            ctx,
            body,
            code: Code::new(shape.name, max_locals),
            positions: HashMap::new(),
            fixups: Vec::new(),
            return_type: shape.return_type,
        }
    }

    fn run(mut self) -> Result<CodeAttribute> {
        let body = self.body;
        for id in &body.code {
            self.statement(*id)?;
        }
        let statements_end = self.code.cur_cp();
        let terminated = body
            .code
            .last()
            .map(|last| matches!(body.get(*last), Ins::Return { .. } | Ins::Throw { .. }))
            .unwrap_or(false);
        if !terminated {
            self.emit_default_return();
        }

        for (pc, target) in std::mem::take(&mut self.fixups) {
            let target_pc = self.position(target, "branch target")?;
            self.code.resolve_jump(pc, target_pc)?;
        }
        if self.code.cur_cp() > MAX_CODE_LENGTH {
            return Err(BytecodeError::CodeTooLarge { size: self.code.cur_cp() }.into());
        }

        let statement_index: HashMap<InsId, usize> = body.code.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let mut exception_table = Vec::new();
        for entry in &body.exception_table {
            let start = self.position(entry.start, "exception range start")?;
            let handler = self.position(entry.handler, "exception handler")?;
            let end = self.exclusive_end(entry.end, &statement_index, statements_end)?;
            if start >= end {
                continue;
            }
            let catch_type = match entry.catch_type {
                Some(ty) => self.ctx.class_ref(ty)?,
                None => 0,
            };
            exception_table.push(ExceptionTableEntry::new(start as u16, end as u16, handler as u16, catch_type));
        }

        let (bytes, max_stack, max_locals, lines) = self.code.finish()?;
        let mut attribute = CodeAttribute::new(max_stack, max_locals, bytes);
        attribute.exception_table = exception_table;
        if !lines.is_empty() {
            attribute.attributes.push(make_line_number_table_attribute(self.ctx.cp, &lines)?);
        }
        Ok(attribute)
    }

    /// Emits one top-level statement and discards whatever it leaves on the
    /// operand stack
    fn statement(&mut self, id: InsId) -> Result<()> {
        let body = self.body;
        let pos = body.pos(id);
        if self.ctx.config.emit_line_numbers && !pos.is_synthetic() {
            self.code.mark_line(pos.line);
        }
        self.emit_ins(id)?;
        while self.code.state.depth() > 0 {
            self.code.emit_discard()?;
        }
        Ok(())
    }

    fn position(&self, id: InsId, what: &str) -> Result<usize> {
        self.positions
            .get(&id)
            .copied()
            .ok_or_else(|| BytecodeError::UnvisitedLabel { what: format!("{} #{}", what, id.index()) }.into())
    }

    /// First statement after the inclusive logical end that closes a
    /// protected range
    fn exclusive_end(
        &self,
        end: InsId,
        statement_index: &HashMap<InsId, usize>,
        statements_end: usize,
    ) -> Result<usize> {
        let index = statement_index
            .get(&end)
            .copied()
            .ok_or_else(|| Error::internal(format!("exception range end #{} is not a statement", end.index())))?;
        for id in &self.body.code[index + 1..] {
            if self.body.get(*id).ends_protected_range() {
                return self.position(*id, "exception range end");
            }
        }
        Ok(statements_end)
    }

    fn category(&self, ty: TypeId) -> u16 {
        self.ctx.repo.get(ty).category()
    }

    /// Offset within the load/store/return families
    fn family_offset(&self, ty: TypeId) -> u8 {
        match self.ctx.repo.get(ty).primitive() {
            Some(kind) => kind.computational().opcode_offset(),
            None => REFERENCE_OFFSET,
        }
    }

    /// Offset within the array load/store families
    fn array_offset(&self, elem: TypeId) -> u8 {
        match self.ctx.repo.get(elem).primitive() {
            Some(PrimitiveKind::Int) => 0,
            Some(PrimitiveKind::Long) => 1,
            Some(PrimitiveKind::Float) => 2,
            Some(PrimitiveKind::Double) => 3,
            Some(PrimitiveKind::Byte | PrimitiveKind::Boolean) => 5,
            Some(PrimitiveKind::Char) => 6,
            Some(PrimitiveKind::Short) => 7,
            None => 4,
        }
    }

    fn value_type(&self, id: InsId) -> Result<TypeId> {
        self.body
            .type_of(id)
            .ok_or_else(|| Error::internal(format!("instruction #{} used as a value produces none", id.index())))
    }

    fn ldc(&mut self, index: u16) {
        if index <= 255 {
            self.code.emitop1(LDC, index as u8);
        } else {
            self.code.emitop2(LDC_W, index);
        }
    }

    fn emit_default_return(&mut self) {
        let ty = self.return_type;
        let (constant, ret) = match self.ctx.repo.get(ty).kind {
            TypeKind::Void => (None, RETURN),
            TypeKind::Primitive(kind) => match kind.computational().opcode_offset() {
                0 => (Some(ICONST_0), IRETURN),
                1 => (Some(LCONST_0), LRETURN),
                2 => (Some(FCONST_0), FRETURN),
                _ => (Some(DCONST_0), DRETURN),
            },
            _ => (Some(ACONST_NULL), ARETURN),
        };
        if let Some(op) = constant {
            self.code.emitop(op);
        }
        self.code.emitop(ret);
    }

    fn require_indy(&self, what: &str) -> Result<()> {
        if self.ctx.config.supports_invokedynamic() {
            Ok(())
        } else {
            Err(Error::config(format!(
                "{} requires target version 7 or later, configured {}",
                what, self.ctx.config.target_version
            )))
        }
    }

    fn emit_const(&mut self, value: &Constant) -> Result<()> {
        match value {
            Constant::Int(v) => {
                if !self.code.emit_small_int(*v) {
                    let index = self.ctx.cp.try_add_integer(*v)?;
                    self.ldc(index);
                    self.code.push(1);
                }
            }
            Constant::Long(v) => {
                match v {
                    0 => self.code.emitop(LCONST_0),
                    1 => self.code.emitop(LCONST_1),
                    _ => {
                        let index = self.ctx.cp.try_add_long(*v)?;
                        self.code.emitop2(LDC2_W, index);
                    }
                }
                self.code.push(2);
            }
            Constant::Float(v) => {
                if v.to_bits() == 0 || *v == 1.0 || *v == 2.0 {
                    self.code.emitop(FCONST_0 + *v as u8);
                } else {
                    let index = self.ctx.cp.try_add_float(*v)?;
                    self.ldc(index);
                }
                self.code.push(1);
            }
            Constant::Double(v) => {
                if v.to_bits() == 0 || *v == 1.0 {
                    self.code.emitop(DCONST_0 + *v as u8);
                } else {
                    let index = self.ctx.cp.try_add_double(*v)?;
                    self.code.emitop2(LDC2_W, index);
                }
                self.code.push(2);
            }
            Constant::String(s) => {
                let index = self.ctx.cp.try_add_string(s)?;
                self.ldc(index);
                self.code.push(1);
            }
            Constant::Null => {
                self.code.emitop(ACONST_NULL);
                self.code.push(1);
            }
        }
        Ok(())
    }

    fn emit_branch(&mut self, op: u8, target: InsId) {
        let pc = self.code.emit_jump(op);
        self.fixups.push((pc, target));
    }

    fn emit_ins(&mut self, id: InsId) -> Result<()> {
        let pc = self.code.cur_cp();
        self.positions.entry(id).or_insert(pc);
        let body = self.body;
        match body.get(id) {
            Ins::Const { value, .. } => self.emit_const(value)?,
            Ins::This { .. } => {
                self.code.emitop(ALOAD_0);
                self.code.push(1);
            }
            Ins::Load { slot, ty } => {
                let (offset, category) = (self.family_offset(*ty), self.category(*ty));
                self.code.emit_load(offset, *slot, category)?;
            }
            Ins::GetField { target, field, ty } => {
                self.emit_ins(*target)?;
                let index = self.ctx.field_ref(*field)?;
                self.code.emitop2(GETFIELD, index);
                self.code.pop()?;
                self.code.push(self.category(*ty));
            }
            Ins::GetStatic { field, ty } => {
                let index = self.ctx.field_ref(*field)?;
                self.code.emitop2(GETSTATIC, index);
                self.code.push(self.category(*ty));
            }
            Ins::New { ctor, args, ty } => {
                let class = self.ctx.class_ref(*ty)?;
                self.code.emitop2(NEW, class);
                self.code.push(1);
                self.code.emitop(DUP);
                self.code.push(1);
                for arg in args {
                    self.emit_ins(*arg)?;
                }
                let index = self.ctx.constructor_ref(*ctor)?;
                self.code.emitop2(INVOKESPECIAL, index);
                self.code.pop_n(args.len() + 1)?;
            }
            Ins::NewArray { length, ty } => {
                self.emit_ins(*length)?;
                let component = match self.ctx.repo.get(*ty).kind {
                    TypeKind::Array { component, .. } => component,
                    _ => return Err(Error::internal(format!("newarray of non-array type {}", self.ctx.repo.name(*ty)))),
                };
                match self.ctx.repo.get(component).primitive() {
                    Some(kind) => self.code.emitop1(NEWARRAY, newarray_code(kind)),
                    None => {
                        let class = self.ctx.class_ref(component)?;
                        self.code.emitop2(ANEWARRAY, class);
                    }
                }
                self.code.pop()?;
                self.code.push(1);
            }
            Ins::ArrayLoad { array, index, ty } => {
                self.emit_ins(*array)?;
                self.emit_ins(*index)?;
                self.code.emitop(IALOAD + self.array_offset(*ty));
                self.code.pop_n(2)?;
                self.code.push(self.category(*ty));
            }
            Ins::ArrayLength { array } => {
                self.emit_ins(*array)?;
                self.code.emitop(ARRAYLENGTH);
                self.code.pop()?;
                self.code.push(1);
            }
            Ins::Invoke { kind, callee, target, args, ty } => {
                if let Some(target) = target {
                    self.emit_ins(*target)?;
                }
                for arg in args {
                    self.emit_ins(*arg)?;
                }
                let index = match callee {
                    Callee::Method(m) => self.ctx.method_ref(*m)?,
                    Callee::Constructor(c) => self.ctx.constructor_ref(*c)?,
                };
                let op = match kind {
                    InvokeKind::Static => INVOKESTATIC,
                    InvokeKind::Virtual => INVOKEVIRTUAL,
                    InvokeKind::Special => INVOKESPECIAL,
                    InvokeKind::Interface => INVOKEINTERFACE,
                };
                self.code.emitop2(op, index);
                if *kind == InvokeKind::Interface {
                    let mut count = 1u16;
                    for arg in args {
                        count += self.category(self.value_type(*arg)?);
                    }
                    self.code.emit1(count as u8);
                    self.code.emit1(0);
                }
                self.code.pop_n(args.len() + target.is_some() as usize)?;
                self.code.push(self.category(*ty));
            }
            Ins::InvokeDynamic { bootstrap, name, args, static_args, ty } => {
                self.require_indy("a dynamic call site")?;
                let mut arg_types = Vec::with_capacity(args.len());
                for arg in args {
                    arg_types.push(self.value_type(*arg)?);
                    self.emit_ins(*arg)?;
                }
                let method_ref = self.ctx.method_handle(*bootstrap)?;
                let mut arguments = Vec::with_capacity(static_args.len());
                for arg in static_args {
                    arguments.push(match arg {
                        BootstrapArg::MethodTypeOf(m) => self.ctx.method_type(*m)?,
                        BootstrapArg::Handle(m) => self.ctx.method_handle(*m)?,
                    });
                }
                let bootstrap_index = self.ctx.bootstraps.index_of(BootstrapMethod { method_ref, arguments })?;
                let desc = method_descriptor(self.ctx.repo, &arg_types, *ty);
                let index = self.ctx.cp.try_add_invoke_dynamic(bootstrap_index, name, &desc)?;
                self.code.emitop2(INVOKEDYNAMIC, index);
                self.code.emit2(0);
                self.code.pop_n(args.len())?;
                self.code.push(self.category(*ty));
            }
            Ins::Cast { op, value, ty } => {
                self.emit_ins(*value)?;
                self.code.emitop(op.opcode());
                self.code.pop()?;
                self.code.push(self.category(*ty));
            }
            Ins::CheckCast { value, ty } => {
                self.emit_ins(*value)?;
                let class = self.ctx.class_ref(*ty)?;
                self.code.emitop2(CHECKCAST, class);
            }
            Ins::TwoVarOp { op, kind, left, right, ty } => {
                self.emit_ins(*left)?;
                self.emit_ins(*right)?;
                let opcode = op
                    .opcode(*kind)
                    .ok_or_else(|| Error::internal(format!("no {:?} instruction for {:?} operands", op, kind)))?;
                self.code.emitop(opcode);
                self.code.pop_n(2)?;
                self.code.push(self.category(*ty));
            }
            Ins::OneVarOp { kind, value, ty } => {
                self.emit_ins(*value)?;
                self.code.emitop(INEG + kind.opcode_offset());
                self.code.pop()?;
                self.code.push(self.category(*ty));
            }
            Ins::LogicAnd { left, right } => self.emit_short_circuit(*left, *right, IFEQ, ICONST_1, ICONST_0)?,
            Ins::LogicOr { left, right } => self.emit_short_circuit(*left, *right, IFNE, ICONST_0, ICONST_1)?,
            Ins::ClassLiteral { of, .. } => {
                let repo = self.ctx.repo;
                let wrapper = match repo.get(*of).kind {
                    TypeKind::Primitive(kind) => Some(kind.wrapper().replace('.', "/")),
                    TypeKind::Void => Some("java/lang/Void".to_string()),
                    _ => None,
                };
                match wrapper {
                    Some(owner) => {
                        let index = self.ctx.cp.try_add_field_ref(&owner, "TYPE", "Ljava/lang/Class;")?;
                        self.code.emitop2(GETSTATIC, index);
                    }
                    None => {
                        let class = self.ctx.class_ref(*of)?;
                        self.ldc(class);
                    }
                }
                self.code.push(1);
            }
            Ins::MethodHandle { method, .. } => {
                self.require_indy("a method handle constant")?;
                let index = self.ctx.method_handle(*method)?;
                self.ldc(index);
                self.code.push(1);
            }
            Ins::Pack { items, auto_pop } => {
                if let Some((last, init)) = items.split_last() {
                    for item in init {
                        let depth = self.code.state.depth();
                        self.emit_ins(*item)?;
                        if *auto_pop {
                            while self.code.state.depth() > depth {
                                self.code.emit_discard()?;
                            }
                        }
                    }
                    self.emit_ins(*last)?;
                }
            }
            Ins::Store { slot, value, ty } => {
                self.emit_ins(*value)?;
                self.code.emit_store(self.family_offset(*ty), *slot)?;
            }
            Ins::PutField { target, field, value } => {
                self.emit_ins(*target)?;
                self.emit_ins(*value)?;
                let index = self.ctx.field_ref(*field)?;
                self.code.emitop2(PUTFIELD, index);
                self.code.pop_n(2)?;
            }
            Ins::PutStatic { field, value } => {
                self.emit_ins(*value)?;
                let index = self.ctx.field_ref(*field)?;
                self.code.emitop2(PUTSTATIC, index);
                self.code.pop()?;
            }
            Ins::ArrayStore { array, index, value, elem } => {
                self.emit_ins(*array)?;
                self.emit_ins(*index)?;
                self.emit_ins(*value)?;
                self.code.emitop(IASTORE + self.array_offset(*elem));
                self.code.pop_n(3)?;
            }
            Ins::IfEq { cond, target } => {
                self.emit_ins(*cond)?;
                self.emit_branch(IFEQ, *target);
                self.code.pop()?;
            }
            Ins::IfNe { cond, target } => {
                self.emit_ins(*cond)?;
                self.emit_branch(IFNE, *target);
                self.code.pop()?;
            }
            Ins::Goto { target } => self.emit_branch(GOTO, *target),
            Ins::Nop => {}
            Ins::Return { value } => match value {
                Some(value) => {
                    self.emit_ins(*value)?;
                    self.code.emitop(IRETURN + self.family_offset(self.return_type));
                    self.code.pop()?;
                }
                None => self.code.emitop(RETURN),
            },
            Ins::Throw { value } => {
                self.emit_ins(*value)?;
                self.code.emitop(ATHROW);
                self.code.pop()?;
            }
            Ins::ExStore { slot } => {
                // the handler entry pushes the exception
                self.code.push(1);
                self.code.emit_store(REFERENCE_OFFSET, *slot)?;
            }
            Ins::Pop => {
                self.code.push(1);
                self.code.emit_discard()?;
            }
            Ins::MonitorEnter { value } => {
                self.emit_ins(*value)?;
                self.code.emitop(MONITORENTER);
                self.code.pop()?;
            }
            Ins::MonitorExit { value } => {
                self.emit_ins(*value)?;
                self.code.emitop(MONITOREXIT);
                self.code.pop()?;
            }
        }
        Ok(())
    }

    /// `left; if<test> short; right; if<test> short; <fall>; goto end;
    /// short: <jumped>; end:`
    fn emit_short_circuit(&mut self, left: InsId, right: InsId, test: u8, fall: u8, jumped: u8) -> Result<()> {
        self.emit_ins(left)?;
        let first = self.code.emit_jump(test);
        self.code.pop()?;
        self.emit_ins(right)?;
        let second = self.code.emit_jump(test);
        self.code.pop()?;
        self.code.emitop(fall);
        let skip = self.code.emit_jump(GOTO);
        let short = self.code.cur_cp();
        self.code.resolve_jump(first, short)?;
        self.code.resolve_jump(second, short)?;
        self.code.emitop(jumped);
        let end = self.code.cur_cp();
        self.code.resolve_jump(skip, end)?;
        self.code.push(1);
        Ok(())
    }
}

fn newarray_code(kind: PrimitiveKind) -> u8 {
    match kind {
        PrimitiveKind::Boolean => array_type::T_BOOLEAN,
        PrimitiveKind::Char => array_type::T_CHAR,
        PrimitiveKind::Float => array_type::T_FLOAT,
        PrimitiveKind::Double => array_type::T_DOUBLE,
        PrimitiveKind::Byte => array_type::T_BYTE,
        PrimitiveKind::Short => array_type::T_SHORT,
        PrimitiveKind::Int => array_type::T_INT,
        PrimitiveKind::Long => array_type::T_LONG,
    }
}
