use zengin_script::{InstanceHandle, SymbolIndex};

/// One operand-stack entry. Either a reference into a symbol's storage
/// (what `push_var`/`push_array_var`/`push_instance` leave behind, so the
/// following assign opcode knows where to write) or a plain value already
/// popped out of script storage.
#[derive(Debug, Clone)]
pub enum OperandFrame {
    Reference {
        symbol: SymbolIndex,
        subscript: u32,
        context: Option<InstanceHandle>,
    },
    Int(i32),
    Float(f32),
    InstanceRef(Option<InstanceHandle>),
}

/// Saved caller state, pushed by `unsafe_call` and restored on `return`.
#[derive(Debug, Clone)]
pub struct CallFrame {
    pub returning_symbol: SymbolIndex,
    pub saved_pc: u32,
    pub saved_context: Option<InstanceHandle>,
}

/// A value resolved off the operand stack: either popped directly, or read
/// through a [`OperandFrame::Reference`] out of script/member storage.
#[derive(Debug, Clone)]
pub enum RuntimeValue {
    Int(i32),
    Float(f32),
    Str(String),
    Instance(Option<InstanceHandle>),
}

impl From<zengin_script::MemberValue> for RuntimeValue {
    fn from(value: zengin_script::MemberValue) -> Self {
        match value {
            zengin_script::MemberValue::Int(v) => RuntimeValue::Int(v),
            zengin_script::MemberValue::Float(v) => RuntimeValue::Float(v),
            zengin_script::MemberValue::String(v) => RuntimeValue::Str(v),
            zengin_script::MemberValue::Instance(v) => RuntimeValue::Instance(v),
        }
    }
}

impl From<RuntimeValue> for zengin_script::MemberValue {
    fn from(value: RuntimeValue) -> Self {
        match value {
            RuntimeValue::Int(v) => zengin_script::MemberValue::Int(v),
            RuntimeValue::Float(v) => zengin_script::MemberValue::Float(v),
            RuntimeValue::Str(v) => zengin_script::MemberValue::String(v),
            RuntimeValue::Instance(v) => zengin_script::MemberValue::Instance(v),
        }
    }
}
