//! Expression lowering
//!
//! [`Lowerer::expr`] turns one expression into a value instruction and, when
//! the context requires a type, converts the result with [`Lowerer::cast`].
//! Literals, function literals and array literals look at the required type
//! themselves because it decides their representation.

use crate::ast::{
    AccessExpr, ArrayLitExpr, AssignExpr, AstNode, BinaryExpr, BinaryOp, Expr, IndexExpr, Literal, LiteralExpr,
    LogicalExpr, LogicalOp, NameExpr, NewExpr, UnaryExpr, UnaryOp, VarDefExpr,
};
use crate::common::repository::is_widening;
use crate::common::types::{FieldId, NumKind, PrimitiveKind, TypeId, TypeKind};
use crate::consts::{ARRAY_LIST, COMPARE_EQ, COMPARE_GT, COMPARE_LT, OBJECT, STRING};
use crate::error::{Error, LineCol, Result, SemanticErrorKind};
use crate::ir::{ArithOp, Callee, CastOp, Constant, Ins, InsId};

use super::enter::{translate_modifiers, Site};
use super::lower::MemberKind;
use super::resolve::{Arg, FindMode};
use super::Lowerer;

/// Parses a number literal. `required` narrows or widens the result; without
/// it the narrowest of int, long, float and double that holds the literal is
/// chosen.
pub(crate) fn number_constant(
    text: &str,
    negative: bool,
    required: Option<PrimitiveKind>,
    pos: &LineCol,
) -> Result<(Constant, PrimitiveKind)> {
    let required = required.filter(|k| *k != PrimitiveKind::Boolean);
    let written = format!("{}{}", if negative { "-" } else { "" }, text);
    let malformed = || Error::semantic(SemanticErrorKind::TypeMismatch, format!("malformed number {}", written), pos);
    let overflow =
        |kind: PrimitiveKind| Error::semantic(SemanticErrorKind::LiteralOverflow, format!("{} does not fit {}", written, kind), pos);

    let cleaned: String = text.chars().filter(|c| *c != '_').collect();
    let hex = cleaned.starts_with("0x") || cleaned.starts_with("0X");
    let (digits, suffix) = match cleaned.chars().last() {
        Some(c @ ('l' | 'L')) => (&cleaned[..cleaned.len() - 1], Some(c.to_ascii_uppercase())),
        Some(c @ ('f' | 'F' | 'd' | 'D')) if !hex => (&cleaned[..cleaned.len() - 1], Some(c.to_ascii_uppercase())),
        _ => (cleaned.as_str(), None),
    };
    let fractional = !hex && (digits.contains(['.', 'e', 'E']) || matches!(suffix, Some('F' | 'D')));

    if fractional {
        let magnitude: f64 = digits.parse().map_err(|_| malformed())?;
        let value = if negative { -magnitude } else { magnitude };
        let natural = match suffix {
            Some('F') => PrimitiveKind::Float,
            Some('D') => PrimitiveKind::Double,
            Some(_) => return Err(malformed()),
            None if (value as f32) as f64 == value => PrimitiveKind::Float,
            None => PrimitiveKind::Double,
        };
        let kind = match required {
            None => natural,
            Some(k @ (PrimitiveKind::Float | PrimitiveKind::Double)) if suffix.is_none() || is_widening(natural, k) => k,
            Some(k) => {
                return Err(Error::semantic(
                    SemanticErrorKind::TypeMismatch,
                    format!("{} is not a valid {}", written, k),
                    pos,
                ))
            }
        };
        return Ok(match kind {
            PrimitiveKind::Float => {
                let narrowed = value as f32;
                if narrowed.is_infinite() && value.is_finite() {
                    return Err(overflow(kind));
                }
                (Constant::Float(narrowed), kind)
            }
            _ => (Constant::Double(value), kind),
        });
    }

    let magnitude = if hex {
        u128::from_str_radix(&digits[2..], 16)
    } else {
        digits.parse::<u128>()
    }
    .map_err(|e| match e.kind() {
        std::num::IntErrorKind::PosOverflow => overflow(PrimitiveKind::Long),
        _ => malformed(),
    })?;
    let value: i128 = if negative { -(magnitude as i128) } else { magnitude as i128 };

    let natural = match suffix {
        Some('L') => PrimitiveKind::Long,
        _ if fits(value, magnitude, hex, PrimitiveKind::Int) => PrimitiveKind::Int,
        _ => PrimitiveKind::Long,
    };
    let kind = match required {
        None => natural,
        Some(k) if suffix.is_none() || is_widening(natural, k) => k,
        Some(k) => {
            return Err(Error::semantic(
                SemanticErrorKind::TypeMismatch,
                format!("{} is not a valid {}", written, k),
                pos,
            ))
        }
    };
    match kind {
        PrimitiveKind::Float => Ok((Constant::Float(value as f32), kind)),
        PrimitiveKind::Double => Ok((Constant::Double(value as f64), kind)),
        _ if !fits(value, magnitude, hex, kind) => Err(overflow(kind)),
        PrimitiveKind::Long if hex && value >= 0 => Ok((Constant::Long(magnitude as u64 as i64), kind)),
        PrimitiveKind::Long => Ok((Constant::Long(value as i64), kind)),
        PrimitiveKind::Int if hex && value >= 0 => Ok((Constant::Int(magnitude as u32 as i32), kind)),
        _ => Ok((Constant::Int(value as i32), kind)),
    }
}

/// Whether an integral literal fits `kind`. Hex literals may use the sign
/// bit of int and long.
fn fits(value: i128, magnitude: u128, hex: bool, kind: PrimitiveKind) -> bool {
    let (min, max): (i128, i128) = match kind {
        PrimitiveKind::Byte => (i8::MIN.into(), i8::MAX.into()),
        PrimitiveKind::Short => (i16::MIN.into(), i16::MAX.into()),
        PrimitiveKind::Char => (0, u16::MAX.into()),
        PrimitiveKind::Int if hex && value >= 0 => return magnitude <= u32::MAX as u128,
        PrimitiveKind::Int => (i32::MIN.into(), i32::MAX.into()),
        PrimitiveKind::Long if hex && value >= 0 => return magnitude <= u64::MAX as u128,
        PrimitiveKind::Long => (i64::MIN.into(), i64::MAX.into()),
        _ => return true,
    };
    (min..=max).contains(&value)
}

impl Lowerer<'_, '_> {
    /// Lowers `e`; with `required` the result has exactly that type
    pub(crate) fn expr(&mut self, e: &Expr, required: Option<TypeId>) -> Result<InsId> {
        let pos = self.pos(e.span());
        let value = match e {
            Expr::Literal(lit) => self.literal(lit, false, required)?,
            Expr::Unary(u) if u.op == UnaryOp::Neg && is_number(&u.operand) => match &*u.operand {
                Expr::Literal(lit) => self.literal(lit, true, required)?,
                _ => return Err(Error::internal("negated literal lost its literal")),
            },
            Expr::Lambda(l) => return self.closure(l, required),
            Expr::ArrayLit(a) => return self.array_literal(a, required),
            Expr::Null(_) => self.constant(Constant::Null, TypeId::NULL, &pos),
            Expr::Name(n) => self.name(n)?,
            Expr::Access(a) => self.access(a)?,
            Expr::Invocation(call) => self.invocation(call)?,
            Expr::New(n) => self.new_expr(n)?,
            Expr::Index(ix) => self.index(ix)?,
            Expr::Binary(b) => self.binary(b)?,
            Expr::Unary(u) => self.unary(u)?,
            Expr::Logical(l) => self.logical(l)?,
            Expr::Assign(a) => self.assign(a)?,
            Expr::VarDef(v) => self.var_def(v)?,
            Expr::AsType(a) => {
                let ty = self.resolve_type_ref(&a.ty)?;
                self.expr(&a.expr, Some(ty))?
            }
            Expr::TypeOf(t) => {
                let ty = self.resolve_type_ref(&t.ty)?;
                self.class_literal(ty, &pos)?
            }
            Expr::This(_) => self.load_self(&pos)?,
            Expr::Super(_) => return Err(Error::unexpected("`super` outside a member access", &pos)),
        };
        match required {
            Some(ty) => self.cast(value, ty, &pos),
            None => Ok(value),
        }
    }

    /// Primitive kind behind a value, looking through boxing classes
    pub(crate) fn numeric_kind(&self, value: InsId) -> Option<PrimitiveKind> {
        let ty = self.body.type_of(value)?;
        self.primitive_of(ty).or_else(|| self.repo().unboxed_kind(ty))
    }

    pub(crate) fn component_of(&self, ty: TypeId) -> Option<TypeId> {
        match &self.repo().get(ty).kind {
            TypeKind::Array { component, .. } => Some(*component),
            _ => None,
        }
    }

    fn literal(&mut self, lit: &LiteralExpr, negative: bool, required: Option<TypeId>) -> Result<InsId> {
        let pos = self.pos(lit.span);
        let wanted = required.and_then(|t| self.primitive_of(t).or_else(|| self.repo().unboxed_kind(t)));
        match &lit.value {
            Literal::Number(text) => {
                let numeric = wanted.filter(|k| k.is_numeric());
                let (value, kind) = number_constant(text, negative, numeric, &pos)?;
                Ok(self.constant(value, TypeId::of_primitive(kind), &pos))
            }
            Literal::String(s) => {
                let mut chars = s.chars();
                match (wanted, chars.next(), chars.next()) {
                    (Some(PrimitiveKind::Char), Some(c), None) => Ok(self.constant(Constant::Int(c as i32), TypeId::CHAR, &pos)),
                    _ => self.string_constant(s, &pos),
                }
            }
            Literal::Char(c) => Ok(self.constant(Constant::Int(*c as i32), TypeId::CHAR, &pos)),
            Literal::Bool(b) => Ok(self.constant(Constant::Int(*b as i32), TypeId::BOOLEAN, &pos)),
        }
    }

    /// Reads `name`: local, own instance field, own or inherited static
    /// field, statically imported field, then a runtime field lookup on
    /// `this`
    fn name(&mut self, n: &NameExpr) -> Result<InsId> {
        let pos = self.pos(n.span);
        if let Some(binding) = self.scope.lookup(&n.name).cloned() {
            return Ok(self.load(&binding, &pos));
        }
        if let Some(read) = self.field_by_name(&n.name, &pos)? {
            return Ok(read);
        }
        if self.scope.is_static() {
            return Err(Error::not_found(format!("cannot find {}", n.name), &pos));
        }
        let this = self.load_self(&pos)?;
        self.dynamic_get(this, &n.name, &pos)
    }

    /// Field reachable by a bare name from the current context
    fn field_by_name(&mut self, name: &str, pos: &LineCol) -> Result<Option<InsId>> {
        if !self.scope.is_static() {
            if let Some(field) = self.find_field(self.owner, name, FindMode::Instance) {
                let this = self.load_self(pos)?;
                return Ok(Some(self.get_field(this, field, pos)));
            }
        }
        if let Some(field) = self.find_field(self.owner, name, FindMode::Static) {
            return Ok(Some(self.get_static(field, pos)));
        }
        let sources: Vec<String> = self.unit.imports.static_sources(name).into_iter().map(str::to_string).collect();
        for source in sources {
            let Some(ty) = self.type_named(&source, pos)? else {
                continue;
            };
            if let Some(field) = self.find_field(ty, name, FindMode::Static) {
                return Ok(Some(self.get_static(field, pos)));
            }
        }
        Ok(None)
    }

    fn get_field(&mut self, target: InsId, field: FieldId, pos: &LineCol) -> InsId {
        let ty = self.repo().field(field).ty;
        self.add(Ins::GetField { target, field, ty }, pos)
    }

    fn get_static(&mut self, field: FieldId, pos: &LineCol) -> InsId {
        let ty = self.repo().field(field).ty;
        self.add(Ins::GetStatic { field, ty }, pos)
    }

    /// `LtRuntime.getField(target, name, Owner.class)`
    fn dynamic_get(&mut self, target: InsId, name: &str, pos: &LineCol) -> Result<InsId> {
        log::debug!("{}: late-bound read of field {}", pos, name);
        let name = self.string_constant(name, pos)?;
        let caller = self.class_literal(self.owner, pos)?;
        self.runtime_call("getField", vec![target, name, caller], pos)
    }

    fn access(&mut self, a: &AccessExpr) -> Result<InsId> {
        let pos = self.pos(a.span);
        let Some(target) = a.target.as_deref() else {
            return self.name(&NameExpr { name: a.name.clone(), span: a.span });
        };
        if let Expr::Super(_) = target {
            let parent = self
                .repo()
                .parent_of(self.owner)
                .ok_or_else(|| Error::unexpected("`super` in a type without a parent class", &pos))?;
            let field = self
                .find_field(parent, &a.name, FindMode::Instance)
                .ok_or_else(|| Error::not_found(format!("no field {} in {}", a.name, self.repo().name(parent)), &pos))?;
            let this = self.load_self(&pos)?;
            return Ok(self.get_field(this, field, &pos));
        }
        if let Some(ty) = self.as_type_name(target, &pos)? {
            let field = self.find_field(ty, &a.name, FindMode::Static).ok_or_else(|| {
                Error::not_found(format!("no static field {} in {}", a.name, self.repo().name(ty)), &pos)
            })?;
            return Ok(self.get_static(field, &pos));
        }
        let receiver = self.expr(target, None)?;
        let receiver = self.to_reference(receiver, &pos)?;
        let ty = self.ty_of(receiver)?;
        if self.repo().get(ty).is_array() && a.name == "length" {
            return Ok(self.add(Ins::ArrayLength { array: receiver }, &pos));
        }
        match self.find_field(ty, &a.name, FindMode::Any) {
            Some(field) if self.repo().field(field).modifiers.is_static() => {
                let read = self.get_static(field, &pos);
                Ok(self.pack(vec![receiver, read], &pos))
            }
            Some(field) => Ok(self.get_field(receiver, field, &pos)),
            None => self.dynamic_get(receiver, &a.name, &pos),
        }
    }

    /// `a[i]`, `a[i, j]` on arrays; `get(args)` on everything else
    fn index(&mut self, ix: &IndexExpr) -> Result<InsId> {
        let pos = self.pos(ix.span);
        let mut current = self.expr(&ix.target, None)?;
        let mut rest = ix.args.as_slice();
        while let Some((first, tail)) = rest.split_first() {
            let Some(component) = self.component_of(self.ty_of(current)?) else {
                break;
            };
            let index = self.expr(first, Some(TypeId::INT))?;
            current = self.add(Ins::ArrayLoad { array: current, index, ty: component }, &pos);
            rest = tail;
        }
        if rest.is_empty() {
            return Ok(current);
        }
        let receiver = self.to_reference(current, &pos)?;
        let ty = self.ty_of(receiver)?;
        let mut args = Vec::with_capacity(rest.len());
        for e in rest {
            args.push(self.arg(e)?);
        }
        let candidates = self.find_methods(ty, "get", FindMode::Instance);
        match self.select_method(candidates, &args, "get", &pos)? {
            Some(method) => self.call_method(method, Some(receiver), args, false, &pos),
            None => self.dynamic_call("get", vec![receiver], args, &pos),
        }
    }

    fn new_expr(&mut self, n: &NewExpr) -> Result<InsId> {
        let pos = self.pos(n.span);
        let ty = self.resolve_type_ref(&n.ty)?;
        if self.component_of(ty).is_some() {
            let [length] = n.args.as_slice() else {
                return Err(Error::unexpected("array creation needs exactly one length", &pos));
            };
            let length = self.expr(length, Some(TypeId::INT))?;
            return Ok(self.add(Ins::NewArray { length, ty }, &pos));
        }
        let mut args = Vec::with_capacity(n.args.len());
        for e in &n.args {
            args.push(self.arg(e)?);
        }
        self.new_instance(ty, args, &pos)
    }

    fn binary(&mut self, b: &BinaryExpr) -> Result<InsId> {
        let pos = self.pos(b.span);
        let left = self.expr(&b.left, None)?;
        let right = self.expr(&b.right, None)?;
        match b.op {
            BinaryOp::RefEq => return self.runtime_call("isRef", vec![left, right], &pos),
            BinaryOp::RefNe => return self.runtime_call("notRef", vec![left, right], &pos),
            _ => {}
        }
        let string = self.well_known(STRING)?;
        if b.op == BinaryOp::Add && self.ty_of(left)? == string {
            return self.concat(left, right, &pos);
        }
        if b.op.is_comparison() {
            return self.comparison(b.op, left, right, &pos);
        }
        let op = match b.op {
            BinaryOp::Add => ArithOp::Add,
            BinaryOp::Sub => ArithOp::Sub,
            BinaryOp::Mul => ArithOp::Mul,
            BinaryOp::Div => ArithOp::Div,
            BinaryOp::Rem => ArithOp::Rem,
            BinaryOp::Shl => ArithOp::Shl,
            BinaryOp::Shr => ArithOp::Shr,
            BinaryOp::Ushr => ArithOp::Ushr,
            BinaryOp::BitAnd => ArithOp::And,
            BinaryOp::BitOr => ArithOp::Or,
            BinaryOp::BitXor => ArithOp::Xor,
            other => return Err(Error::internal(format!("operator {} reached arithmetic lowering", other))),
        };
        self.arithmetic(op, left, right, &pos)
    }

    /// `left.concat(String.valueOf(right))`
    fn concat(&mut self, left: InsId, right: InsId, pos: &LineCol) -> Result<InsId> {
        let string = self.well_known(STRING)?;
        let args = vec![Arg::Value(right)];
        let candidates = self.find_methods(string, "valueOf", FindMode::Static);
        let value_of = self
            .select_method(candidates, &args, "valueOf", pos)?
            .ok_or_else(|| Error::internal("java.lang.String has no applicable valueOf"))?;
        let text = self.call_method(value_of, None, args, false, pos)?;
        let concat = self.library_method(STRING, "concat", 1)?;
        Ok(self.library_call(concat, Some(left), vec![text], pos))
    }

    fn comparison(&mut self, op: BinaryOp, left: InsId, right: InsId, pos: &LineCol) -> Result<InsId> {
        let mode = match op {
            BinaryOp::Lt => COMPARE_LT,
            BinaryOp::Gt => COMPARE_GT,
            BinaryOp::Le => COMPARE_LT | COMPARE_EQ,
            BinaryOp::Ge => COMPARE_GT | COMPARE_EQ,
            BinaryOp::Eq => COMPARE_EQ,
            _ => COMPARE_GT | COMPARE_LT,
        };
        let equality = matches!(op, BinaryOp::Eq | BinaryOp::Ne);
        match (self.numeric_kind(left), self.numeric_kind(right)) {
            (Some(PrimitiveKind::Boolean), Some(PrimitiveKind::Boolean)) if equality => {
                let l = self.cast(left, TypeId::BOOLEAN, pos)?;
                let r = self.cast(right, TypeId::BOOLEAN, pos)?;
                let differ = self.bool_xor(l, r, pos);
                if op == BinaryOp::Ne {
                    return Ok(differ);
                }
                let one = self.constant(Constant::Int(1), TypeId::BOOLEAN, pos);
                Ok(self.bool_xor(differ, one, pos))
            }
            (Some(l), Some(r)) if l != PrimitiveKind::Boolean && r != PrimitiveKind::Boolean => {
                let kind = l.computational().max(r.computational()).max(NumKind::Long);
                let a = self.promote(left, kind, pos)?;
                let b = self.promote(right, kind, pos)?;
                let cmp = self.add(Ins::TwoVarOp { op: ArithOp::Cmp, kind, left: a, right: b, ty: TypeId::INT }, pos);
                self.compare_mode(cmp, mode, pos)
            }
            _ if equality => {
                let helper = if op == BinaryOp::Eq { "is" } else { "not" };
                self.runtime_call(helper, vec![left, right], pos)
            }
            _ => {
                let receiver = self.to_reference(left, pos)?;
                let ty = self.ty_of(receiver)?;
                let args = vec![Arg::Value(right)];
                let candidates = self.find_methods(ty, "compareTo", FindMode::Instance);
                let result = match self.select_method(candidates, &args, "compareTo", pos)? {
                    Some(method) => self.call_method(method, Some(receiver), args, false, pos)?,
                    None => self.dynamic_call("compareTo", vec![receiver], args, pos)?,
                };
                let result = self.cast(result, TypeId::INT, pos)?;
                let widened = self.add(Ins::Cast { op: CastOp::I2L, value: result, ty: TypeId::LONG }, pos);
                let zero = self.constant(Constant::Long(0), TypeId::LONG, pos);
                let cmp = self.add(
                    Ins::TwoVarOp { op: ArithOp::Cmp, kind: NumKind::Long, left: widened, right: zero, ty: TypeId::INT },
                    pos,
                );
                self.compare_mode(cmp, mode, pos)
            }
        }
    }

    /// `LtRuntime.compare(cmp, mode)`
    fn compare_mode(&mut self, cmp: InsId, mode: i32, pos: &LineCol) -> Result<InsId> {
        let mode = self.constant(Constant::Int(mode), TypeId::INT, pos);
        self.runtime_call("compare", vec![cmp, mode], pos)
    }

    fn bool_xor(&mut self, left: InsId, right: InsId, pos: &LineCol) -> InsId {
        self.add(Ins::TwoVarOp { op: ArithOp::Xor, kind: NumKind::Int, left, right, ty: TypeId::BOOLEAN }, pos)
    }

    fn arithmetic(&mut self, op: ArithOp, left: InsId, right: InsId, pos: &LineCol) -> Result<InsId> {
        match (self.numeric_kind(left), self.numeric_kind(right)) {
            (Some(PrimitiveKind::Boolean), Some(PrimitiveKind::Boolean)) if op.is_bitwise() => {
                let l = self.cast(left, TypeId::BOOLEAN, pos)?;
                let r = self.cast(right, TypeId::BOOLEAN, pos)?;
                return Ok(self.add(Ins::TwoVarOp { op, kind: NumKind::Int, left: l, right: r, ty: TypeId::BOOLEAN }, pos));
            }
            (Some(l), Some(r)) if l != PrimitiveKind::Boolean && r != PrimitiveKind::Boolean => {
                let (kind, right_kind) = if op.is_shift() {
                    (l.computational(), NumKind::Int)
                } else {
                    let kind = l.computational().max(r.computational());
                    (kind, kind)
                };
                if op.opcode(kind).is_some() {
                    let a = self.promote(left, kind, pos)?;
                    let b = self.promote(right, right_kind, pos)?;
                    return Ok(self.add(Ins::TwoVarOp { op, kind, left: a, right: b, ty: kind.type_id() }, pos));
                }
            }
            _ => {}
        }
        let name = match op {
            ArithOp::Add => "add",
            ArithOp::Sub => "subtract",
            ArithOp::Mul => "multiply",
            ArithOp::Div => "divide",
            ArithOp::Rem => "remainder",
            ArithOp::Shl => "shiftLeft",
            ArithOp::Shr => "shiftRight",
            ArithOp::Ushr => "unsignedShiftRight",
            ArithOp::And => "and",
            ArithOp::Or => "or",
            ArithOp::Xor => "xor",
            ArithOp::Cmp => "compareTo",
        };
        self.operator_method(name, left, vec![Arg::Value(right)], pos)
    }

    /// Operator overloading: a method of the left operand, or a late-bound
    /// call of that name
    fn operator_method(&mut self, name: &str, receiver: InsId, args: Vec<Arg<'_>>, pos: &LineCol) -> Result<InsId> {
        let receiver = self.to_reference(receiver, pos)?;
        let ty = self.ty_of(receiver)?;
        let candidates = self.find_methods(ty, name, FindMode::Instance);
        match self.select_method(candidates, &args, name, pos)? {
            Some(method) => self.call_method(method, Some(receiver), args, false, pos),
            None => self.dynamic_call(name, vec![receiver], args, pos),
        }
    }

    fn unary(&mut self, u: &UnaryExpr) -> Result<InsId> {
        let pos = self.pos(u.span);
        let value = self.expr(&u.operand, None)?;
        let kind = self.numeric_kind(value);
        let numeric = kind.filter(|k| *k != PrimitiveKind::Boolean).map(PrimitiveKind::computational);
        match u.op {
            UnaryOp::Neg => match numeric {
                Some(kind) => {
                    let v = self.promote(value, kind, &pos)?;
                    Ok(self.add(Ins::OneVarOp { kind, value: v, ty: kind.type_id() }, &pos))
                }
                None => self.operator_method("negate", value, Vec::new(), &pos),
            },
            UnaryOp::Not => match kind {
                Some(PrimitiveKind::Boolean) => {
                    let v = self.cast(value, TypeId::BOOLEAN, &pos)?;
                    let one = self.constant(Constant::Int(1), TypeId::BOOLEAN, &pos);
                    Ok(self.bool_xor(v, one, &pos))
                }
                _ => self.operator_method("logicNot", value, Vec::new(), &pos),
            },
            UnaryOp::BitNot => match numeric {
                Some(kind @ (NumKind::Int | NumKind::Long)) => {
                    let v = self.promote(value, kind, &pos)?;
                    let ones = match kind {
                        NumKind::Long => self.constant(Constant::Long(-1), TypeId::LONG, &pos),
                        _ => self.constant(Constant::Int(-1), TypeId::INT, &pos),
                    };
                    Ok(self.add(Ins::TwoVarOp { op: ArithOp::Xor, kind, left: v, right: ones, ty: kind.type_id() }, &pos))
                }
                _ => self.operator_method("not", value, Vec::new(), &pos),
            },
            UnaryOp::Plus => match numeric {
                Some(kind) => self.promote(value, kind, &pos),
                None => Ok(value),
            },
        }
    }

    fn logical(&mut self, l: &LogicalExpr) -> Result<InsId> {
        let pos = self.pos(l.span);
        let left = self.expr(&l.left, Some(TypeId::BOOLEAN))?;
        let right = self.expr(&l.right, Some(TypeId::BOOLEAN))?;
        Ok(match l.op {
            LogicalOp::And => self.add(Ins::LogicAnd { left, right }, &pos),
            LogicalOp::Or => self.add(Ins::LogicOr { left, right }, &pos),
        })
    }

    /// An array when an array type is required, a `java.util.ArrayList`
    /// otherwise
    fn array_literal(&mut self, a: &ArrayLitExpr, required: Option<TypeId>) -> Result<InsId> {
        let pos = self.pos(a.span);
        if let Some((ty, component)) = required.and_then(|t| self.component_of(t).map(|c| (t, c))) {
            let length = self.constant(Constant::Int(a.items.len() as i32), TypeId::INT, &pos);
            let array = self.add(Ins::NewArray { length, ty }, &pos);
            let (binding, store) = self.store_temp(array, &pos)?;
            let mut items = vec![store];
            for (i, item) in a.items.iter().enumerate() {
                let target = self.load(&binding, &pos);
                let index = self.constant(Constant::Int(i as i32), TypeId::INT, &pos);
                let value = self.expr(item, Some(component))?;
                items.push(self.add(Ins::ArrayStore { array: target, index, value, elem: component }, &pos));
            }
            items.push(self.load(&binding, &pos));
            return Ok(self.pack(items, &pos));
        }

        let list_ty = self.well_known(ARRAY_LIST)?;
        let list = self.new_instance(list_ty, Vec::new(), &pos)?;
        let (binding, store) = self.store_temp(list, &pos)?;
        let add = self.library_method(ARRAY_LIST, "add", 1)?;
        let object = self.well_known(OBJECT)?;
        let mut items = vec![store];
        for item in &a.items {
            let target = self.load(&binding, &pos);
            let value = self.expr(item, Some(object))?;
            items.push(self.library_call(add, Some(target), vec![value], &pos));
        }
        items.push(self.load(&binding, &pos));
        let value = self.pack(items, &pos);
        match required {
            Some(ty) => self.cast(value, ty, &pos),
            None => Ok(value),
        }
    }

    /// `var x = init`, `x : T`, or a bare `x = init` that introduces `x`.
    /// The declaration's value is the stored value.
    fn var_def(&mut self, v: &VarDefExpr) -> Result<InsId> {
        let pos = self.pos(v.span);
        translate_modifiers(&v.modifiers, Site::Local, &pos)?;
        if v.ty.is_none() {
            if let Some(init) = v.init.as_deref() {
                let target = Expr::Name(NameExpr { name: v.name.clone(), span: v.span });
                if self.scope.lookup(&v.name).is_some() || self.names_field(&v.name, &pos)? {
                    return self.assign_value(&target, init, &pos);
                }
            }
        } else if self.scope.binds_locally(&v.name) {
            return Err(Error::semantic(
                SemanticErrorKind::Duplicate,
                format!("{} is already declared in this block", v.name),
                &pos,
            ));
        }
        let declared = match &v.ty {
            Some(t) => Some(self.resolve_type_ref(t)?),
            None => None,
        };
        self.declare_local(&v.name, declared, v.init.as_deref(), &pos)
    }

    fn declare_local(&mut self, name: &str, declared: Option<TypeId>, init: Option<&Expr>, pos: &LineCol) -> Result<InsId> {
        if declared == Some(TypeId::VOID) {
            return Err(Error::semantic(SemanticErrorKind::TypeMismatch, format!("{} cannot be void", name), pos));
        }
        let value = match init {
            Some(e) => Some(self.expr(e, declared)?),
            None => None,
        };
        let ty = match (declared, value) {
            (Some(ty), _) => ty,
            (None, Some(v)) => match self.ty_of(v)? {
                TypeId::NULL => self.well_known(OBJECT)?,
                TypeId::VOID => {
                    return Err(Error::semantic(
                        SemanticErrorKind::TypeMismatch,
                        format!("{} is initialized with a value of type void", name),
                        pos,
                    ))
                }
                ty => ty,
            },
            (None, None) => self.well_known(OBJECT)?,
        };
        let value = match value {
            Some(v) => v,
            None => self.default_value(ty, pos),
        };
        let binding = self.bind_local(name, ty);
        let store = self.add(Ins::Store { slot: binding.slot, value, ty }, pos);
        let load = self.load(&binding, pos);
        Ok(self.pack(vec![store, load], pos))
    }

    /// Whether a bare name refers to a field from here
    fn names_field(&mut self, name: &str, pos: &LineCol) -> Result<bool> {
        if !self.scope.is_static() && self.find_field(self.owner, name, FindMode::Instance).is_some() {
            return Ok(true);
        }
        if self.find_field(self.owner, name, FindMode::Static).is_some() {
            return Ok(true);
        }
        for source in self.unit.imports.static_sources(name).into_iter().map(str::to_string).collect::<Vec<_>>() {
            if let Some(ty) = self.type_named(&source, pos)? {
                if self.find_field(ty, name, FindMode::Static).is_some() {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn assign(&mut self, a: &AssignExpr) -> Result<InsId> {
        let pos = self.pos(a.span);
        match a.op.binary() {
            Some(op) => {
                let combined = Expr::Binary(BinaryExpr {
                    op,
                    left: a.target.clone(),
                    right: a.value.clone(),
                    span: a.span,
                });
                self.assign_value(&a.target, &combined, &pos)
            }
            None => self.assign_value(&a.target, &a.value, &pos),
        }
    }

    /// Stores `value` into `target`; the result is the stored value
    fn assign_value(&mut self, target: &Expr, value: &Expr, pos: &LineCol) -> Result<InsId> {
        if let Expr::Name(n) = target {
            if let Some(binding) = self.scope.lookup(&n.name).cloned() {
                let v = self.expr(value, Some(binding.ty))?;
                let store = self.add(Ins::Store { slot: binding.slot, value: v, ty: binding.ty }, pos);
                let load = self.load(&binding, pos);
                return Ok(self.pack(vec![store, load], pos));
            }
            if !self.names_field(&n.name, pos)? {
                return self.declare_local(&n.name, None, Some(value), pos);
            }
        }

        let read = self.expr(target, None)?;
        let runtime_get = self.runtime_method("getField", 3)?;
        match self.body.get(read).clone() {
            Ins::GetField { target: receiver, field, ty } => {
                self.check_field_writable(field, pos)?;
                let v = self.expr(value, Some(ty))?;
                self.write_through(v, pos, |lw, value| lw.add(Ins::PutField { target: receiver, field, value }, pos))
            }
            Ins::GetStatic { field, ty } => {
                self.check_field_writable(field, pos)?;
                let v = self.expr(value, Some(ty))?;
                self.write_through(v, pos, |lw, value| lw.add(Ins::PutStatic { field, value }, pos))
            }
            Ins::Pack { items, .. } if items.len() == 2 && matches!(self.body.get(items[1]), Ins::GetStatic { .. }) => {
                let Ins::GetStatic { field, ty } = self.body.get(items[1]).clone() else {
                    return Err(Error::internal("static field read changed shape"));
                };
                self.check_field_writable(field, pos)?;
                let v = self.expr(value, Some(ty))?;
                let receiver = items[0];
                let (binding, store) = self.store_temp(v, pos)?;
                let loaded = self.load(&binding, pos);
                let put = self.add(Ins::PutStatic { field, value: loaded }, pos);
                let result = self.load(&binding, pos);
                Ok(self.pack(vec![receiver, store, put, result], pos))
            }
            Ins::ArrayLoad { array, index, ty } => {
                let v = self.expr(value, Some(ty))?;
                self.write_through(v, pos, |lw, value| lw.add(Ins::ArrayStore { array, index, value, elem: ty }, pos))
            }
            Ins::Invoke { callee: Callee::Method(method), args, .. } if method == runtime_get => {
                let v = self.expr(value, None)?;
                let (binding, store) = self.store_temp(v, pos)?;
                let loaded = self.load(&binding, pos);
                let put = self.runtime_call("putField", vec![args[0], args[1], loaded, args[2]], pos)?;
                let result = self.load(&binding, pos);
                Ok(self.pack(vec![store, put, result], pos))
            }
            Ins::Invoke { callee: Callee::Method(method), target: Some(receiver), args, .. }
                if args.len() == 1 && self.repo().method(method).name == "get" =>
            {
                let v = self.expr(value, None)?;
                self.indexed_set(receiver, args[0], v, pos)
            }
            Ins::InvokeDynamic { name, args, .. } if name == "get" && args.len() == 2 => {
                let v = self.expr(value, None)?;
                self.indexed_set(args[0], args[1], v, pos)
            }
            _ => Err(Error::semantic(SemanticErrorKind::IllegalAssignment, "cannot assign to this expression", pos)),
        }
    }

    /// `store tmp; write(tmp); load tmp`
    fn write_through(
        &mut self,
        value: InsId,
        pos: &LineCol,
        write: impl FnOnce(&mut Self, InsId) -> InsId,
    ) -> Result<InsId> {
        let (binding, store) = self.store_temp(value, pos)?;
        let loaded = self.load(&binding, pos);
        let put = write(self, loaded);
        let result = self.load(&binding, pos);
        Ok(self.pack(vec![store, put, result], pos))
    }

    /// `receiver.set(index, value)` for a `get`-style read
    fn indexed_set(&mut self, receiver: InsId, index: InsId, value: InsId, pos: &LineCol) -> Result<InsId> {
        let (binding, store) = self.store_temp(value, pos)?;
        let loaded = self.load(&binding, pos);
        let ty = self.ty_of(receiver)?;
        let args = vec![Arg::Value(index), Arg::Value(loaded)];
        let candidates = self.find_methods(ty, "set", FindMode::Instance);
        let set = match self.select_method(candidates, &args, "set", pos)? {
            Some(method) => self.call_method(method, Some(receiver), args, false, pos)?,
            None => self.dynamic_call("set", vec![receiver], args, pos)?,
        };
        let result = self.load(&binding, pos);
        Ok(self.pack(vec![store, set, result], pos))
    }

    /// Final fields are assignable only while their owner initializes
    fn check_field_writable(&self, field: FieldId, pos: &LineCol) -> Result<()> {
        let f = self.repo().field(field);
        if !f.modifiers.is_final() {
            return Ok(());
        }
        let initializing = f.declaring == self.owner
            && match self.member {
                MemberKind::Constructor => !f.modifiers.is_static(),
                MemberKind::StaticInit => f.modifiers.is_static(),
                MemberKind::Method => false,
            };
        if initializing {
            Ok(())
        } else {
            Err(Error::semantic(
                SemanticErrorKind::IllegalAssignment,
                format!("cannot assign to final field {}", f.name),
                pos,
            ))
        }
    }
}

fn is_number(e: &Expr) -> bool {
    matches!(e, Expr::Literal(LiteralExpr { value: Literal::Number(_), .. }))
}

#[cfg(test)]
mod tests {
    use crate::ast::Span;
    use crate::wash::lower::tests::with_lowerer;

    use super::*;

    fn pos() -> LineCol {
        LineCol::synthetic()
    }

    fn num(text: &str) -> Expr {
        Expr::Literal(LiteralExpr { value: Literal::Number(text.to_string()), span: Span::default() })
    }

    fn name(n: &str) -> Expr {
        Expr::Name(NameExpr { name: n.to_string(), span: Span::default() })
    }

    #[test]
    fn test_number_literals_pick_narrowest_kind() {
        assert_eq!(number_constant("42", false, None, &pos()).unwrap(), (Constant::Int(42), PrimitiveKind::Int));
        assert_eq!(
            number_constant("3000000000", false, None, &pos()).unwrap(),
            (Constant::Long(3_000_000_000), PrimitiveKind::Long)
        );
        assert_eq!(number_constant("1.5", false, None, &pos()).unwrap(), (Constant::Float(1.5), PrimitiveKind::Float));
        assert_eq!(number_constant("0.1", false, None, &pos()).unwrap(), (Constant::Double(0.1), PrimitiveKind::Double));
        assert_eq!(number_constant("7L", false, None, &pos()).unwrap(), (Constant::Long(7), PrimitiveKind::Long));
        assert_eq!(number_constant("1_000", false, None, &pos()).unwrap().0, Constant::Int(1000));
    }

    #[test]
    fn test_hex_literals_use_sign_bit() {
        assert_eq!(number_constant("0xFFFFFFFF", false, None, &pos()).unwrap(), (Constant::Int(-1), PrimitiveKind::Int));
        assert_eq!(number_constant("0x1F", false, None, &pos()).unwrap().0, Constant::Int(31));
    }

    #[test]
    fn test_required_kind_is_range_checked() {
        assert_eq!(
            number_constant("127", false, Some(PrimitiveKind::Byte), &pos()).unwrap(),
            (Constant::Int(127), PrimitiveKind::Byte)
        );
        assert_eq!(number_constant("128", true, Some(PrimitiveKind::Byte), &pos()).unwrap().0, Constant::Int(-128));
        let err = number_constant("128", false, Some(PrimitiveKind::Byte), &pos()).unwrap_err();
        assert_eq!(err.semantic_kind(), Some(SemanticErrorKind::LiteralOverflow));
        let err = number_constant("2147483648", false, Some(PrimitiveKind::Int), &pos()).unwrap_err();
        assert_eq!(err.semantic_kind(), Some(SemanticErrorKind::LiteralOverflow));
        let err = number_constant("1.5", false, Some(PrimitiveKind::Int), &pos()).unwrap_err();
        assert_eq!(err.semantic_kind(), Some(SemanticErrorKind::TypeMismatch));
        assert_eq!(number_constant("2", false, Some(PrimitiveKind::Double), &pos()).unwrap().0, Constant::Double(2.0));
    }

    #[test]
    fn test_int_plus_boxed_long_is_ladd() {
        with_lowerer(|lw| {
            let long_box = lw.well_known("java.lang.Long").unwrap();
            lw.bind_local("a", TypeId::INT);
            lw.bind_local("b", long_box);
            let sum = Expr::Binary(BinaryExpr {
                op: BinaryOp::Add,
                left: Box::new(name("a")),
                right: Box::new(name("b")),
                span: Span::default(),
            });
            let v = lw.expr(&sum, None).unwrap();
            match lw.body.get(v) {
                Ins::TwoVarOp { op: ArithOp::Add, kind: NumKind::Long, left, right, ty } => {
                    assert_eq!(*ty, TypeId::LONG);
                    assert!(matches!(lw.body.get(*left), Ins::Cast { op: CastOp::I2L, .. }));
                    match lw.body.get(*right) {
                        Ins::Invoke { callee: Callee::Method(m), .. } => assert_eq!(lw.repo().method(*m).name, "longValue"),
                        other => panic!("unexpected {:?}", other),
                    }
                }
                other => panic!("unexpected {:?}", other),
            }
        });
    }

    #[test]
    fn test_literal_boxed_for_reference_target() {
        with_lowerer(|lw| {
            let object = lw.well_known(OBJECT).unwrap();
            let v = lw.expr(&num("5"), Some(object)).unwrap();
            let integer = lw.well_known("java.lang.Integer").unwrap();
            assert_eq!(lw.ty_of(v).unwrap(), integer);
        });
    }

    #[test]
    fn test_declaration_stores_then_loads() {
        with_lowerer(|lw| {
            let decl = Expr::VarDef(VarDefExpr {
                name: "x".into(),
                ty: None,
                init: Some(Box::new(num("1"))),
                modifiers: vec![],
                span: Span::default(),
            });
            let v = lw.expr(&decl, None).unwrap();
            match lw.body.get(v) {
                Ins::Pack { items, .. } => {
                    assert!(matches!(lw.body.get(items[0]), Ins::Store { ty: TypeId::INT, .. }));
                    assert!(matches!(lw.body.get(items[1]), Ins::Load { ty: TypeId::INT, .. }));
                }
                other => panic!("unexpected {:?}", other),
            }
            assert_eq!(lw.scope.lookup("x").map(|b| b.ty), Some(TypeId::INT));
        });
    }

    #[test]
    fn test_unknown_name_in_static_context() {
        with_lowerer(|lw| {
            let err = lw.expr(&name("nothing"), None).unwrap_err();
            assert_eq!(err.semantic_kind(), Some(SemanticErrorKind::NotFound));
        });
    }

    #[test]
    fn test_assigning_to_a_call_is_rejected() {
        with_lowerer(|lw| {
            let call = Expr::Invocation(crate::ast::InvocationExpr {
                callee: Box::new(Expr::Access(AccessExpr {
                    target: Some(Box::new(name("System"))),
                    name: "nanoTime".into(),
                    span: Span::default(),
                })),
                args: vec![],
                span: Span::default(),
            });
            let assign = Expr::Assign(AssignExpr {
                target: Box::new(call),
                op: crate::ast::AssignOp::Assign,
                value: Box::new(num("1")),
                span: Span::default(),
            });
            let err = lw.expr(&assign, None).unwrap_err();
            assert_eq!(err.semantic_kind(), Some(SemanticErrorKind::IllegalAssignment));
        });
    }
}
