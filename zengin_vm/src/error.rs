use thiserror::Error;

use zengin_script::{DataType, SymbolIndex};

/// Runtime errors raised while executing bytecode. Registration-time errors
/// (bad symbol names, arity, etc.) stay in [`zengin_script::ScriptError`];
/// these are the ones `exception_handler` gets a chance to recover from.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error(transparent)]
    Script(#[from] zengin_script::ScriptError),

    #[error("operand stack overflow (capacity {capacity})")]
    StackOverflow { capacity: usize },

    #[error("operand stack underflow")]
    StackUnderflow,

    #[error("call stack overflow (capacity {capacity})")]
    CallStackOverflow { capacity: usize },

    #[error("no instruction at address {0}")]
    InvalidAddress(u32),

    #[error("arithmetic error: {0}")]
    ArithmeticError(&'static str),

    #[error("assignment to const symbol {0:?}")]
    ConstViolation(SymbolIndex),

    #[error("member access on symbol {sym:?} with no context instance")]
    NoContext { sym: SymbolIndex },

    #[error("member {sym:?} has no registered accessor")]
    UnboundMember { sym: SymbolIndex },

    #[error("context instance type does not match symbol {sym:?}'s bound type")]
    WrongContextType { sym: SymbolIndex },

    #[error("external {sym:?} has no registered callback and no default handler")]
    UnregisteredExternal { sym: SymbolIndex },

    #[error("{name} is not flagged external")]
    NotAnExternal { name: String },

    #[error("{name}: host callable takes {host_arity} parameter(s), symbol declares {declared_arity}")]
    ParameterArityMismatch {
        name: String,
        host_arity: usize,
        declared_arity: usize,
    },

    #[error("{name}: parameter {at_index} type mismatch")]
    ParameterTypeMismatch { name: String, at_index: usize },

    #[error("{name}: return type mismatch, declared {declared:?}")]
    ReturnTypeMismatch { name: String, declared: DataType },
}

pub type VmResult<T> = Result<T, VmError>;
