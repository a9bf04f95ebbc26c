use std::any::TypeId;
use std::rc::Rc;

use zengin_script::{DataType, ScriptImage, SymbolFlags, SymbolIndex};

use crate::error::{VmError, VmResult};
use crate::vm::DaedalusVM;

/// A host-side callable bound to an external or overridden script symbol.
/// Responsible for popping its own declared parameters off the operand stack
/// and, unless void, pushing its own return value; the VM's
/// [`crate::guard::StackGuard`] fills in a zero return if it doesn't.
pub type ExternalFn = Rc<dyn Fn(&mut DaedalusVM) -> VmResult<()>>;

/// One parameter or return slot's declared host-facing shape, per the
/// dispatch table in §4.4: `int`/`func` map to a signed integer, `string`
/// is an immutable reference, and a class name maps to a shared reference
/// to whatever host type was registered for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostType {
    Void,
    Int,
    Float,
    String,
    Instance(TypeId),
}

impl HostType {
    fn matches(self, declared: DataType) -> bool {
        match (self, declared) {
            (HostType::Void, DataType::Void) => true,
            (HostType::Int, DataType::Int) | (HostType::Int, DataType::Function) => true,
            (HostType::Float, DataType::Float) => true,
            (HostType::String, DataType::String) => true,
            (HostType::Instance(_), DataType::Instance) => true,
            _ => false,
        }
    }
}

/// The host-declared shape of an external or overridden function, validated
/// against the script's own declaration at registration time.
#[derive(Debug, Clone)]
pub struct ExternalSignature {
    pub params: Vec<HostType>,
    pub return_type: HostType,
}

/// Parameter symbols of `function_symbol`, in declaration order: every
/// symbol whose `parent` points back at it.
fn declared_params<'a>(script: &'a ScriptImage, function_symbol: SymbolIndex) -> Vec<&'a zengin_script::Symbol> {
    script
        .symbols()
        .iter()
        .filter(|s| s.parent == function_symbol)
        .collect()
}

/// Validates `signature` against `name`'s declared parameter list and return
/// type, returning the symbol's index on success.
pub fn validate_signature(
    script: &ScriptImage,
    name: &str,
    signature: &ExternalSignature,
    require_external_flag: bool,
) -> VmResult<SymbolIndex> {
    let symbol = script
        .find_symbol_by_name(name)
        .ok_or_else(|| VmError::Script(zengin_script::ScriptError::SymbolNotFound(name.to_string())))?;

    if require_external_flag && !symbol.flags.contains(SymbolFlags::EXTERNAL) {
        return Err(VmError::NotAnExternal {
            name: name.to_string(),
        });
    }

    let params = declared_params(script, symbol.index);
    if params.len() != signature.params.len() {
        return Err(VmError::ParameterArityMismatch {
            name: name.to_string(),
            host_arity: signature.params.len(),
            declared_arity: params.len(),
        });
    }

    for (i, (param_symbol, host_type)) in params.iter().zip(signature.params.iter()).enumerate() {
        if !host_type.matches(param_symbol.data_type) {
            return Err(VmError::ParameterTypeMismatch {
                name: name.to_string(),
                at_index: i,
            });
        }
    }

    if !signature.return_type.matches(symbol.return_type) {
        return Err(VmError::ReturnTypeMismatch {
            name: name.to_string(),
            declared: symbol.return_type,
        });
    }

    Ok(symbol.index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_type_matches_func_as_int() {
        assert!(HostType::Int.matches(DataType::Function));
        assert!(!HostType::Int.matches(DataType::String));
    }
}
