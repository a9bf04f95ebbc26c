use crate::ids::SymbolIndex;
use crate::value::{DataType, SymbolFlags, SymbolValue};

/// Where a symbol came from in the original `.d` sources, kept for
/// diagnostics and decompiler-style tooling. Not meaningful at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    pub file_index: u32,
    pub line: u32,
    pub line_offset: u32,
    pub char_offset: u32,
    pub char_count: u32,
}

/// One entry of a script's symbol table.
///
/// Mirrors the compiled format's per-symbol record field for field, including
/// `member_offset`/`class_size`, which a C++ VM uses for pointer-offset member
/// access. This crate never does that arithmetic itself (see
/// [`crate::bridge`]); the fields are kept only because they round-trip from
/// the image and are useful to decompiler-style tooling.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub index: SymbolIndex,
    pub address: u32,
    pub parent: SymbolIndex,
    pub data_type: DataType,
    pub return_type: DataType,
    pub flags: SymbolFlags,
    pub generated: bool,
    pub count: u32,
    pub value: SymbolValue,
    pub member_offset: u32,
    pub class_size: u32,
    pub bound_type: Option<std::any::TypeId>,
    pub source_location: SourceLocation,
}

impl Symbol {
    pub fn is_const(&self) -> bool {
        self.flags.contains(SymbolFlags::CONST)
    }

    pub fn is_member(&self) -> bool {
        self.flags.contains(SymbolFlags::MEMBER)
    }

    pub fn is_external(&self) -> bool {
        self.flags.contains(SymbolFlags::EXTERNAL)
    }

    pub fn has_return(&self) -> bool {
        self.flags.contains(SymbolFlags::HAS_RETURN)
    }

    pub fn is_class(&self) -> bool {
        self.data_type == DataType::Class
    }

    pub fn is_instance(&self) -> bool {
        self.data_type == DataType::Instance
    }

    pub fn has_parent(&self) -> bool {
        !self.parent.is_unset()
    }
}
