use thiserror::Error;

use crate::ids::SymbolIndex;
use crate::value::DataType;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error(transparent)]
    ByteIo(#[from] zengin_byteio::ByteIoError),

    #[error("unknown opcode byte {0:#x}")]
    InvalidOpcode(u8),

    #[error("no instruction at address {0}")]
    InvalidAddress(u32),

    #[error("unknown datatype tag {0}")]
    InvalidDataType(u32),

    #[error("symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("symbol {0:?} is not a member")]
    NotAMember(SymbolIndex),

    #[error("arity mismatch registering {name}: requested {requested}, symbol has {declared}")]
    ArityMismatch {
        name: String,
        requested: u32,
        declared: u32,
    },

    #[error("class {0:?} is already bound to a different host type")]
    ParentConflict(SymbolIndex),

    #[error("cannot register {name} of type {declared:?} against a {actual:?} field")]
    DataTypeMismatch {
        name: String,
        declared: DataType,
        actual: DataType,
    },

    #[error("subscript {index} out of range for symbol {symbol:?} (count {count})")]
    IndexOutOfRange {
        symbol: SymbolIndex,
        index: usize,
        count: u32,
    },

    #[error("symbol {0:?} does not hold a value of the requested type")]
    WrongValueKind(SymbolIndex),
}

pub type ScriptResult<T> = Result<T, ScriptError>;
