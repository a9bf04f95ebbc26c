use std::any::{Any, TypeId};
use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;

use crate::ids::SymbolIndex;

/// A symbol's declared Daedalus type. Numeric values match the compiled
/// script format's `datatype` enum so `DataType::try_from(tag)` round-trips
/// what is read off disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum DataType {
    Void = 0,
    Float = 1,
    Int = 2,
    String = 3,
    Class = 4,
    Function = 5,
    Prototype = 6,
    Instance = 7,
}

impl TryFrom<u32> for DataType {
    type Error = u32;

    fn try_from(tag: u32) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(DataType::Void),
            1 => Ok(DataType::Float),
            2 => Ok(DataType::Int),
            3 => Ok(DataType::String),
            4 => Ok(DataType::Class),
            5 => Ok(DataType::Function),
            6 => Ok(DataType::Prototype),
            7 => Ok(DataType::Instance),
            other => Err(other),
        }
    }
}

bitflags! {
    /// Bits set on a [`crate::symbol::Symbol`]. Numeric values match the
    /// compiled script format so the packed on-disk field decodes directly.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SymbolFlags: u32 {
        const CONST      = 1 << 0;
        const HAS_RETURN = 1 << 1;
        const MEMBER     = 1 << 2;
        const EXTERNAL   = 1 << 3;
        /// Meaning unknown in the original compiler; carried through unchanged.
        const MERGED     = 1 << 4;
    }
}

/// A host-owned value backing one concrete "instance" symbol.
///
/// Carries a back-pointer to the symbol that first created it and an opaque
/// host-type tag (`TypeId`) used to reject member accesses against the wrong
/// host struct. Multiple symbols may share the same handle (e.g. `SELF` and
/// the quest NPC it was pointed at via `set_instance`); cloning is cheap
/// reference-count bump, never a copy of host state.
#[derive(Clone)]
pub struct InstanceHandle {
    value: Rc<dyn Any>,
    type_id: TypeId,
    owning_symbol: SymbolIndex,
}

impl InstanceHandle {
    pub fn new<T: Any>(value: Rc<T>, owning_symbol: SymbolIndex) -> Self {
        InstanceHandle {
            type_id: TypeId::of::<T>(),
            value,
            owning_symbol,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn owning_symbol(&self) -> SymbolIndex {
        self.owning_symbol
    }

    pub fn is<T: Any>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    pub fn downcast<T: Any>(&self) -> Option<Rc<T>> {
        Rc::clone(&self.value).downcast::<T>().ok()
    }
}

impl fmt::Debug for InstanceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceHandle")
            .field("type_id", &self.type_id)
            .field("owning_symbol", &self.owning_symbol)
            .finish()
    }
}

impl PartialEq for InstanceHandle {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.value, &other.value)
    }
}

/// Storage for a non-member symbol's value. Modeled as a sum type rather than
/// the tagged `variant<unique_ptr<T[]>...>` the original uses, matching how a
/// Rust rewrite represents a C++ tagged union.
#[derive(Debug, Clone)]
pub enum SymbolValue {
    Ints(Vec<i32>),
    Floats(Vec<f32>),
    Strings(Vec<String>),
    Instance(Option<InstanceHandle>),
    None,
}

impl SymbolValue {
    pub fn len(&self) -> usize {
        match self {
            SymbolValue::Ints(v) => v.len(),
            SymbolValue::Floats(v) => v.len(),
            SymbolValue::Strings(v) => v.len(),
            SymbolValue::Instance(_) => 1,
            SymbolValue::None => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
