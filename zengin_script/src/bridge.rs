//! Member access without pointer-offset arithmetic.
//!
//! The compiled format stores `member_offset`/`class_size` for each member
//! symbol so a C++ host can do `*(T*)((char*)ctx + offset + idx*sizeof(T))`.
//! This crate never performs that cast. Instead, registering a host type
//! installs one closure-backed [`MemberAccessor`] per member symbol; opcode
//! handlers look the accessor up by symbol and call it, so host field layout
//! never has to match the script's memory layout at all.

use std::any::Any;

use crate::error::ScriptError;
use crate::ids::SymbolIndex;
use crate::value::InstanceHandle;

use crate::error::ScriptResult;

/// A value read from or written to a host member field, decoupled from
/// [`crate::value::SymbolValue`] because a single member access touches one
/// element, not a whole symbol's backing array.
#[derive(Debug, Clone)]
pub enum MemberValue {
    Int(i32),
    Float(f32),
    String(String),
    Instance(Option<InstanceHandle>),
}

/// Installed once per `(class symbol, member symbol)` pair at registration
/// time. Erases the host type behind [`InstanceHandle::downcast`] so the
/// table can hold accessors for many host types uniformly.
pub trait MemberAccessor {
    fn get(&self, ctx: &InstanceHandle, index: usize) -> ScriptResult<MemberValue>;
    fn set(&self, ctx: &InstanceHandle, index: usize, value: MemberValue) -> ScriptResult<()>;
}

/// Closure-backed [`MemberAccessor`] over a concrete host type `T`.
pub struct ClosureMember<T> {
    member: SymbolIndex,
    get: Box<dyn Fn(&T, usize) -> MemberValue>,
    set: Box<dyn Fn(&T, usize, MemberValue)>,
}

impl<T: Any> ClosureMember<T> {
    pub fn new(
        member: SymbolIndex,
        get: impl Fn(&T, usize) -> MemberValue + 'static,
        set: impl Fn(&T, usize, MemberValue) + 'static,
    ) -> Self {
        ClosureMember {
            member,
            get: Box::new(get),
            set: Box::new(set),
        }
    }

    fn downcast(&self, ctx: &InstanceHandle) -> ScriptResult<std::rc::Rc<T>> {
        ctx.downcast::<T>()
            .ok_or(ScriptError::NotAMember(self.member))
    }
}

impl<T: Any> MemberAccessor for ClosureMember<T> {
    fn get(&self, ctx: &InstanceHandle, index: usize) -> ScriptResult<MemberValue> {
        let host = self.downcast(ctx)?;
        Ok((self.get)(&host, index))
    }

    fn set(&self, ctx: &InstanceHandle, index: usize, value: MemberValue) -> ScriptResult<()> {
        let host = self.downcast(ctx)?;
        (self.set)(&host, index, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Npc {
        hp: Cell<i32>,
    }

    #[test]
    fn closure_member_round_trips_through_downcast() {
        let handle = InstanceHandle::new(Rc::new(Npc { hp: Cell::new(10) }), SymbolIndex(0));
        let accessor = ClosureMember::<Npc>::new(
            SymbolIndex(1),
            |npc: &Npc, _idx| MemberValue::Int(npc.hp.get()),
            |npc: &Npc, _idx, value| {
                if let MemberValue::Int(v) = value {
                    npc.hp.set(v);
                }
            },
        );

        accessor.set(&handle, 0, MemberValue::Int(42)).unwrap();
        match accessor.get(&handle, 0).unwrap() {
            MemberValue::Int(v) => assert_eq!(v, 42),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn wrong_host_type_is_rejected() {
        struct Other;
        let handle = InstanceHandle::new(Rc::new(Other), SymbolIndex(0));
        let accessor = ClosureMember::<Npc>::new(
            SymbolIndex(1),
            |npc: &Npc, _idx| MemberValue::Int(npc.hp.get()),
            |_npc: &Npc, _idx, _value| {},
        );
        assert!(accessor.get(&handle, 0).is_err());
    }
}
