//! Lexical scope of a member body
//!
//! A stack of frames; the bottom frame is the top of the member body and
//! knows the owning type. Bindings are kept in insertion order because both
//! slot numbering and closure capture depend on it. Frames are popped when a
//! block ends, which releases their slots for reuse.

use crate::consts::TEMP_PREFIX;

use super::types::{MethodId, TypeId};

/// How the current body reaches its `this`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelfRef {
    /// Static context
    None,
    /// Instance member: `this` is slot 0
    This(TypeId),
    /// Synthesized static method that received the enclosing `this` as a
    /// parameter
    Local { slot: u16, ty: TypeId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub name: String,
    pub ty: TypeId,
    pub slot: u16,
    /// Slots occupied: 2 for long and double
    pub width: u16,
}

/// A named method declared inside a body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerCallable {
    pub name: String,
    pub method: MethodId,
    /// Locals passed ahead of the declared arguments, by name
    pub captured: Vec<String>,
    /// Whether the enclosing self reference follows the captured locals
    pub takes_self: bool,
    /// Declared parameter count
    pub arity: usize,
}

#[derive(Debug, Default)]
struct Frame {
    bindings: Vec<Binding>,
    inner: Vec<InnerCallable>,
}

#[derive(Debug)]
pub struct Scope {
    owner: TypeId,
    self_ref: SelfRef,
    frames: Vec<Frame>,
}

impl Scope {
    pub fn new(owner: TypeId, self_ref: SelfRef) -> Self {
        Self { owner, self_ref, frames: vec![Frame::default()] }
    }

    pub fn owner(&self) -> TypeId {
        self.owner
    }

    pub fn self_ref(&self) -> SelfRef {
        self.self_ref
    }

    pub fn is_static(&self) -> bool {
        self.self_ref == SelfRef::None
    }

    pub(crate) fn set_self(&mut self, self_ref: SelfRef) {
        self.self_ref = self_ref;
    }

    pub fn push(&mut self) {
        self.frames.push(Frame::default());
    }

    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Current frame nesting depth; the member root is depth 1
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Slot the next binding will occupy
    fn next_slot(&self) -> u16 {
        let base = if matches!(self.self_ref, SelfRef::This(_)) { 1 } else { 0 };
        base + self.frames.iter().flat_map(|f| f.bindings.iter()).map(|b| b.width).sum::<u16>()
    }

    /// Adds a binding to the innermost frame
    pub fn bind(&mut self, name: &str, ty: TypeId, width: u16) -> Binding {
        let binding = Binding { name: name.to_string(), ty, slot: self.next_slot(), width };
        if let Some(frame) = self.frames.last_mut() {
            frame.bindings.push(binding.clone());
        }
        binding
    }

    /// Innermost binding of `name`
    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.frames.iter().rev().find_map(|f| f.bindings.iter().rev().find(|b| b.name == name))
    }

    /// Whether the innermost frame already binds `name`
    pub fn binds_locally(&self, name: &str) -> bool {
        self.frames.last().map(|f| f.bindings.iter().any(|b| b.name == name)).unwrap_or(false)
    }

    pub fn register_inner(&mut self, callable: InnerCallable) {
        if let Some(frame) = self.frames.last_mut() {
            frame.inner.push(callable);
        }
    }

    pub fn lookup_inner(&self, name: &str) -> Option<&InnerCallable> {
        self.frames.iter().rev().find_map(|f| f.inner.iter().rev().find(|c| c.name == name))
    }

    /// Every inner callable visible from the innermost frame, outermost first
    pub fn visible_inner(&self) -> Vec<InnerCallable> {
        self.frames.iter().flat_map(|f| f.inner.iter().cloned()).collect()
    }

    /// First `*N` not bound anywhere in the chain
    pub fn fresh_temp(&self) -> String {
        let mut i = 0;
        loop {
            let name = format!("{}{}", TEMP_PREFIX, i);
            if self.lookup(&name).is_none() {
                return name;
            }
            i += 1;
        }
    }

    /// User-visible locals in insertion order, outermost frame first. A name
    /// shadowed by an inner frame appears once, as its innermost binding.
    pub fn visible_locals(&self) -> Vec<Binding> {
        let mut out: Vec<Binding> = Vec::new();
        for binding in self.frames.iter().flat_map(|f| f.bindings.iter()) {
            if binding.name.starts_with(TEMP_PREFIX) {
                continue;
            }
            out.retain(|b| b.name != binding.name);
            out.push(binding.clone());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_count_self_and_widths() {
        let owner = TypeId::NULL;
        let mut scope = Scope::new(owner, SelfRef::This(owner));
        assert_eq!(scope.bind("a", TypeId::LONG, 2).slot, 1);
        scope.push();
        assert_eq!(scope.bind("b", TypeId::INT, 1).slot, 3);
        scope.pop();
        assert_eq!(scope.bind("c", TypeId::INT, 1).slot, 3);
        assert!(scope.lookup("b").is_none());
    }

    #[test]
    fn test_temporaries_skip_used_names() {
        let mut scope = Scope::new(TypeId::NULL, SelfRef::None);
        let t0 = scope.fresh_temp();
        assert_eq!(t0, "*0");
        scope.bind(&t0, TypeId::INT, 1);
        scope.push();
        assert_eq!(scope.fresh_temp(), "*1");
        assert!(scope.visible_locals().is_empty());
    }

    #[test]
    fn test_inner_callables_walk_ancestors() {
        let mut scope = Scope::new(TypeId::NULL, SelfRef::None);
        scope.register_inner(InnerCallable {
            name: "helper".into(),
            method: MethodId(0),
            captured: vec![],
            takes_self: false,
            arity: 1,
        });
        scope.push();
        assert_eq!(scope.lookup_inner("helper").map(|c| c.arity), Some(1));
        assert_eq!(scope.visible_inner().len(), 1);
    }

    #[test]
    fn test_shadowed_local_captured_once() {
        let mut scope = Scope::new(TypeId::NULL, SelfRef::None);
        scope.bind("x", TypeId::INT, 1);
        scope.push();
        scope.bind("x", TypeId::LONG, 2);
        let locals = scope.visible_locals();
        assert_eq!(locals.len(), 1);
        assert_eq!(locals[0].ty, TypeId::LONG);
    }
}
