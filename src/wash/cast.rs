//! Value conversions
//!
//! Every place that needs a value of a particular type goes through
//! [`Lowerer::cast`]. Conversions the JVM has instructions for are emitted
//! directly; everything else is delegated to the runtime helper class.

use crate::common::repository::is_widening;
use crate::common::types::{NumKind, PrimitiveKind, TypeId};
use crate::error::{Error, LineCol, Result, SemanticErrorKind};
use crate::ir::{Callee, CastOp, Ins, InsId, InvokeKind};

use super::Lowerer;

impl Lowerer<'_, '_> {
    /// Converts `value` so that it can be used where `to` is required
    pub(crate) fn cast(&mut self, value: InsId, to: TypeId, pos: &LineCol) -> Result<InsId> {
        let from = self.ty_of(value)?;
        if from == to {
            return Ok(value);
        }
        if from == TypeId::VOID || to == TypeId::VOID {
            return Err(Error::semantic(
                SemanticErrorKind::TypeMismatch,
                format!("cannot convert {} to {}", self.repo().name(from), self.repo().name(to)),
                pos,
            ));
        }
        match (self.primitive_of(from), self.primitive_of(to)) {
            (Some(f), Some(t)) => self.primitive_cast(value, f, t, pos),
            (None, Some(t)) => match self.repo().unboxed_kind(from) {
                Some(k) => {
                    let unboxed = self.unbox(value, from, k, pos)?;
                    self.primitive_cast(unboxed, k, t, pos)
                }
                None => self.runtime_call(t.coercion_helper(), vec![value], pos),
            },
            (Some(f), None) => {
                let boxed = self.box_value(value, f, pos)?;
                let boxed_ty = self.ty_of(boxed)?;
                if self.repo().is_assignable(boxed_ty, to) {
                    Ok(boxed)
                } else {
                    self.reference_cast(boxed, to, pos)
                }
            }
            (None, None) => {
                if self.repo().is_assignable(from, to) {
                    Ok(value)
                } else {
                    self.reference_cast(value, to, pos)
                }
            }
        }
    }

    fn primitive_cast(&mut self, value: InsId, from: PrimitiveKind, to: PrimitiveKind, pos: &LineCol) -> Result<InsId> {
        if from == to {
            return Ok(value);
        }
        if from == PrimitiveKind::Boolean || to == PrimitiveKind::Boolean {
            let boxed = self.box_value(value, from, pos)?;
            return self.runtime_call(to.coercion_helper(), vec![boxed], pos);
        }
        let mut current = value;
        let (f, t) = (from.computational(), to.computational());
        if let Some(op) = CastOp::between(f, t) {
            current = self.add(Ins::Cast { op, value: current, ty: t.type_id() }, pos);
        }
        if !is_widening(from, to) {
            let narrow = match to {
                PrimitiveKind::Byte => Some(CastOp::I2B),
                PrimitiveKind::Char => Some(CastOp::I2C),
                PrimitiveKind::Short => Some(CastOp::I2S),
                _ => None,
            };
            if let Some(op) = narrow {
                current = self.add(Ins::Cast { op, value: current, ty: TypeId::of_primitive(to) }, pos);
            }
        }
        Ok(current)
    }

    /// Numeric value promoted to a computational kind
    pub(crate) fn promote(&mut self, value: InsId, kind: NumKind, pos: &LineCol) -> Result<InsId> {
        let ty = self.ty_of(value)?;
        match self.primitive_of(ty) {
            Some(p) if p.computational() == kind => Ok(value),
            _ => self.cast(value, kind.type_id(), pos),
        }
    }

    /// `Wrapper.valueOf(value)`
    pub(crate) fn box_value(&mut self, value: InsId, kind: PrimitiveKind, pos: &LineCol) -> Result<InsId> {
        let wrapper = self.repo_mut().wrapper_of(kind)?;
        let param = TypeId::of_primitive(kind);
        let repo = self.repo();
        let method = repo
            .methods_of(wrapper)
            .iter()
            .copied()
            .find(|id| {
                let m = repo.method(*id);
                m.name == "valueOf" && m.modifiers.is_static() && m.param_types() == [param]
            })
            .ok_or_else(|| Error::internal(format!("{} has no valueOf({})", kind.wrapper(), kind)))?;
        Ok(self.add(
            Ins::Invoke {
                kind: InvokeKind::Static,
                callee: Callee::Method(method),
                target: None,
                args: vec![value],
                ty: wrapper,
            },
            pos,
        ))
    }

    /// `value.intValue()` and friends
    fn unbox(&mut self, value: InsId, wrapper: TypeId, kind: PrimitiveKind, pos: &LineCol) -> Result<InsId> {
        let name = kind.unbox_method();
        let repo = self.repo();
        let method = repo
            .methods_of(wrapper)
            .iter()
            .copied()
            .find(|id| {
                let m = repo.method(*id);
                m.name == name && m.params.is_empty()
            })
            .ok_or_else(|| Error::internal(format!("{} has no {}()", kind.wrapper(), name)))?;
        Ok(self.add(
            Ins::Invoke {
                kind: InvokeKind::Virtual,
                callee: Callee::Method(method),
                target: Some(value),
                args: Vec::new(),
                ty: TypeId::of_primitive(kind),
            },
            pos,
        ))
    }

    /// Boxes primitives, leaves references alone
    pub(crate) fn to_reference(&mut self, value: InsId, pos: &LineCol) -> Result<InsId> {
        let ty = self.ty_of(value)?;
        match self.primitive_of(ty) {
            Some(kind) => self.box_value(value, kind, pos),
            None => Ok(value),
        }
    }

    /// Checked conversion between unrelated reference types through the
    /// runtime `cast` helper
    fn reference_cast(&mut self, value: InsId, to: TypeId, pos: &LineCol) -> Result<InsId> {
        let class = self.class_literal(to, pos)?;
        let converted = self.runtime_call("cast", vec![value, class], pos)?;
        Ok(self.add(Ins::CheckCast { value: converted, ty: to }, pos))
    }
}

#[cfg(test)]
mod tests {
    use crate::ir::Constant;
    use crate::wash::lower::tests::with_lowerer;

    use super::*;

    #[test]
    fn test_long_to_byte_narrows_twice() {
        with_lowerer(|lw| {
            let pos = LineCol::synthetic();
            let v = lw.constant(Constant::Long(300), TypeId::LONG, &pos);
            let out = lw.cast(v, TypeId::BYTE, &pos).unwrap();
            assert_eq!(lw.ty_of(out).unwrap(), TypeId::BYTE);
            match lw.body.get(out) {
                Ins::Cast { op: CastOp::I2B, value, .. } => {
                    assert!(matches!(lw.body.get(*value), Ins::Cast { op: CastOp::L2I, .. }));
                }
                other => panic!("unexpected {:?}", other),
            }
        });
    }

    #[test]
    fn test_int_to_object_boxes() {
        with_lowerer(|lw| {
            let pos = LineCol::synthetic();
            let object = lw.well_known("java.lang.Object").unwrap();
            let v = lw.constant(Constant::Int(1), TypeId::INT, &pos);
            let out = lw.cast(v, object, &pos).unwrap();
            let integer = lw.well_known("java.lang.Integer").unwrap();
            assert_eq!(lw.ty_of(out).unwrap(), integer);
        });
    }

    #[test]
    fn test_object_to_int_uses_runtime_helper() {
        with_lowerer(|lw| {
            let pos = LineCol::synthetic();
            let v = lw.constant(Constant::Null, TypeId::NULL, &pos);
            let out = lw.cast(v, TypeId::INT, &pos).unwrap();
            match lw.body.get(out) {
                Ins::Invoke { callee: Callee::Method(m), .. } => assert_eq!(lw.repo().method(*m).name, "castToInt"),
                other => panic!("unexpected {:?}", other),
            }
        });
    }

    #[test]
    fn test_void_value_is_rejected() {
        with_lowerer(|lw| {
            let pos = LineCol::synthetic();
            let method = lw.runtime_method("compare", 2).unwrap();
            let v = lw.add(
                Ins::Invoke { kind: InvokeKind::Static, callee: Callee::Method(method), target: None, args: vec![], ty: TypeId::VOID },
                &pos,
            );
            let err = lw.cast(v, TypeId::INT, &pos).unwrap_err();
            assert_eq!(err.semantic_kind(), Some(SemanticErrorKind::TypeMismatch));
        });
    }
}
