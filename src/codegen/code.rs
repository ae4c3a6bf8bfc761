//! Code generation buffer
//!
//! Holds the bytes of one method body together with the abstract operand
//! stack (tracked per value, by size category), the high-water marks needed
//! for `max_stack`/`max_locals`, and the line-number table.

use super::attribute::LineNumberTableAttribute;
use super::error::{BytecodeError, BytecodeResult};
use super::opcodes;

/// Largest method body the class-file format can describe
pub const MAX_CODE_LENGTH: usize = 65535;

/// Abstract operand stack
#[derive(Debug, Clone, Default)]
pub struct State {
    /// Category (1 or 2) of each value on the stack, bottom first
    pub stack: Vec<u16>,
    /// Current stack depth in slots
    pub stacksize: u16,
    /// Maximum stack depth seen
    pub max_stacksize: u16,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a value of the given category; category 0 (void) pushes nothing
    pub fn push(&mut self, category: u16) {
        if category == 0 {
            return;
        }
        self.stack.push(category);
        self.stacksize += category;
        self.max_stacksize = self.max_stacksize.max(self.stacksize);
    }

    /// Pop one value, returning its category
    pub fn pop(&mut self) -> Option<u16> {
        let category = self.stack.pop()?;
        self.stacksize -= category;
        Some(category)
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

pub struct Code {
    /// Method being generated, for diagnostics
    method: String,
    /// The code buffer
    pub code: Vec<u8>,
    pub state: State,
    /// The maximum number of local variable slots
    pub max_locals: u16,
    line_numbers: LineNumberTableAttribute,
    last_line: u32,
}

impl Code {
    pub fn new(method: impl Into<String>, max_locals: u16) -> Self {
        Self {
            method: method.into(),
            code: Vec::with_capacity(64),
            state: State::new(),
            max_locals,
            line_numbers: LineNumberTableAttribute::new(),
            last_line: 0,
        }
    }

    /// Current code pointer
    pub fn cur_cp(&self) -> usize {
        self.code.len()
    }

    /// Emit one byte of code
    pub fn emit1(&mut self, od: u8) {
        self.code.push(od);
    }

    /// Emit two bytes of code
    pub fn emit2(&mut self, od: u16) {
        self.code.extend_from_slice(&od.to_be_bytes());
    }

    /// Emit four bytes of code
    pub fn emit4(&mut self, od: u32) {
        self.code.extend_from_slice(&od.to_be_bytes());
    }

    /// Emit an opcode
    pub fn emitop(&mut self, op: u8) {
        log::trace!("{}@{} stack={}: {}", self.method, self.cur_cp(), self.state.stacksize, opcodes::opcode_name(op));
        self.emit1(op);
    }

    /// Emit an opcode with a one-byte operand
    pub fn emitop1(&mut self, op: u8, od: u8) {
        self.emitop(op);
        self.emit1(od);
    }

    /// Emit an opcode with a two-byte operand
    pub fn emitop2(&mut self, op: u8, od: u16) {
        self.emitop(op);
        self.emit2(od);
    }

    /// Place two bytes into code at address pc
    pub fn put2(&mut self, pc: usize, od: i16) {
        let bytes = od.to_be_bytes();
        self.code[pc] = bytes[0];
        self.code[pc + 1] = bytes[1];
    }

    pub fn push(&mut self, category: u16) {
        self.state.push(category);
    }

    pub fn pop(&mut self) -> BytecodeResult<u16> {
        self.state.pop().ok_or_else(|| BytecodeError::StackUnderflow { method: self.method.clone() })
    }

    pub fn pop_n(&mut self, n: usize) -> BytecodeResult<()> {
        for _ in 0..n {
            self.pop()?;
        }
        Ok(())
    }

    /// Discards the top value with `pop`/`pop2`
    pub fn emit_discard(&mut self) -> BytecodeResult<()> {
        let category = self.pop()?;
        self.emitop(if category == 2 { opcodes::POP2 } else { opcodes::POP });
        Ok(())
    }

    /// Raise `max_locals` to cover a local occupying `[slot, slot + width)`
    pub fn register_local(&mut self, slot: u16, width: u16) -> BytecodeResult<()> {
        let end = slot as usize + width as usize;
        if end > u16::MAX as usize {
            return Err(BytecodeError::LocalIndexOutOfBounds { index: end });
        }
        self.max_locals = self.max_locals.max(end as u16);
        Ok(())
    }

    /// Load/store family member at `base + offset` with the short `_0`..`_3`
    /// forms and `wide` for slots above 255
    fn emit_local_op(&mut self, base: u8, short_base: u8, offset: u8, slot: u16) {
        if slot <= 3 {
            self.emitop(short_base + offset * 4 + slot as u8);
        } else if slot <= 255 {
            self.emitop1(base + offset, slot as u8);
        } else {
            self.emitop(opcodes::WIDE);
            self.emit1(base + offset);
            self.emit2(slot);
        }
    }

    /// `offset` selects int/long/float/double/reference (0..=4)
    pub fn emit_load(&mut self, offset: u8, slot: u16, category: u16) -> BytecodeResult<()> {
        self.register_local(slot, category)?;
        self.emit_local_op(opcodes::ILOAD, opcodes::ILOAD_0, offset, slot);
        self.push(category);
        Ok(())
    }

    pub fn emit_store(&mut self, offset: u8, slot: u16) -> BytecodeResult<()> {
        let category = self.pop()?;
        self.register_local(slot, category)?;
        self.emit_local_op(opcodes::ISTORE, opcodes::ISTORE_0, offset, slot);
        Ok(())
    }

    /// Emits `iconst`/`bipush`/`sipush` if the value fits one of them
    pub fn emit_small_int(&mut self, value: i32) -> bool {
        match value {
            -1..=5 => self.emitop((opcodes::ICONST_0 as i32 + value) as u8),
            -128..=127 => self.emitop1(opcodes::BIPUSH, value as i8 as u8),
            -32768..=32767 => self.emitop2(opcodes::SIPUSH, value as i16 as u16),
            _ => return false,
        }
        self.push(1);
        true
    }

    /// Emit a branch with a placeholder offset; returns the branch's address
    pub fn emit_jump(&mut self, op: u8) -> usize {
        let pc = self.cur_cp();
        self.emitop2(op, 0);
        pc
    }

    /// Patch the branch at `pc` to land on `target`
    pub fn resolve_jump(&mut self, pc: usize, target: usize) -> BytecodeResult<()> {
        let offset = target as i64 - pc as i64;
        if offset < i16::MIN as i64 || offset > i16::MAX as i64 {
            return Err(BytecodeError::BranchTooFar { offset });
        }
        self.put2(pc + 1, offset as i16);
        Ok(())
    }

    /// Records a line-table entry when the source line changes
    pub fn mark_line(&mut self, line: u32) {
        if line == 0 || line == self.last_line {
            return;
        }
        self.last_line = line;
        let pc = self.cur_cp().min(u16::MAX as usize) as u16;
        self.line_numbers.add_line_number(pc, line.min(u16::MAX as u32) as u16);
    }

    pub fn max_stack(&self) -> u16 {
        self.state.max_stacksize
    }

    /// Finishes the body, returning the bytes and the line table
    pub fn finish(self) -> BytecodeResult<(Vec<u8>, u16, u16, LineNumberTableAttribute)> {
        if self.code.len() > MAX_CODE_LENGTH {
            return Err(BytecodeError::CodeTooLarge { size: self.code.len() });
        }
        let max_stack = self.max_stack();
        Ok((self.code, max_stack, self.max_locals, self.line_numbers))
    }
}
