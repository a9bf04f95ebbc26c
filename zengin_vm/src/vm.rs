use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use log::{trace, warn};
use zengin_script::{DataType, Instruction, InstanceHandle, Opcode, ScriptImage, SymbolIndex};

use crate::error::{VmError, VmResult};
use crate::exception::{ExceptionHandler, ExceptionStrategy};
use crate::external::{ExternalFn, ExternalSignature};
use crate::flags::ExecutionFlags;
use crate::frame::{CallFrame, OperandFrame, RuntimeValue};
use crate::guard::StackGuard;
use crate::stack::{CallStack, OperandStack, DEFAULT_CALL_CAP, DEFAULT_STACK_CAP};

/// Symbol indices cached by name at construction so opcode handlers never
/// pay a name lookup. Absent from a script, they stay `None`.
#[derive(Debug, Default)]
struct WellKnownSymbols {
    self_: Option<SymbolIndex>,
    other: Option<SymbolIndex>,
    victim: Option<SymbolIndex>,
    hero: Option<SymbolIndex>,
    item: Option<SymbolIndex>,
    scratch: SymbolIndex,
}

impl WellKnownSymbols {
    fn resolve(script: &ScriptImage) -> Self {
        let find = |name: &str| script.find_symbol_by_name(name).map(|s| s.index);
        WellKnownSymbols {
            self_: find("SELF"),
            other: find("OTHER"),
            victim: find("VICTIM"),
            hero: find("HERO"),
            item: find("ITEM"),
            scratch: script
                .find_symbol_by_name("$PHOENIX_FAKE_STRINGS")
                .map(|s| s.index)
                .expect("ScriptImage::load always appends the scratch string symbol"),
        }
    }
}

pub struct DaedalusVmBuilder {
    script: ScriptImage,
    stack_capacity: usize,
    call_capacity: usize,
    flags: ExecutionFlags,
}

impl DaedalusVmBuilder {
    pub fn new(script: ScriptImage) -> Self {
        DaedalusVmBuilder {
            script,
            stack_capacity: DEFAULT_STACK_CAP,
            call_capacity: DEFAULT_CALL_CAP,
            flags: ExecutionFlags::empty(),
        }
    }

    pub fn with_stack_capacity(mut self, capacity: usize) -> Self {
        self.stack_capacity = capacity;
        self
    }

    pub fn with_call_capacity(mut self, capacity: usize) -> Self {
        self.call_capacity = capacity;
        self
    }

    pub fn with_flags(mut self, flags: ExecutionFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn build(self) -> DaedalusVM {
        let well_known = WellKnownSymbols::resolve(&self.script);
        DaedalusVM {
            script: self.script,
            operand_stack: OperandStack::new(self.stack_capacity),
            call_stack: CallStack::new(self.call_capacity),
            pc: 0,
            self_context: None,
            well_known,
            externals: HashMap::new(),
            overrides: HashMap::new(),
            default_external_handler: None,
            access_trap: None,
            trapped: HashSet::new(),
            exception_handler: None,
            flags: self.flags,
        }
    }
}

pub struct DaedalusVM {
    script: ScriptImage,
    operand_stack: OperandStack,
    call_stack: CallStack,
    pc: u32,
    self_context: Option<InstanceHandle>,
    well_known: WellKnownSymbols,
    externals: HashMap<SymbolIndex, ExternalFn>,
    overrides: HashMap<u32, ExternalFn>,
    default_external_handler: Option<Rc<dyn Fn(&mut DaedalusVM, SymbolIndex) -> VmResult<()>>>,
    access_trap: Option<Rc<dyn Fn(&mut DaedalusVM, SymbolIndex)>>,
    trapped: HashSet<SymbolIndex>,
    exception_handler: Option<ExceptionHandler>,
    flags: ExecutionFlags,
}

impl DaedalusVM {
    pub fn new(script: ScriptImage, flags: ExecutionFlags) -> Self {
        DaedalusVmBuilder::new(script).with_flags(flags).build()
    }

    pub fn script(&self) -> &ScriptImage {
        &self.script
    }

    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn self_context(&self) -> Option<&InstanceHandle> {
        self.self_context.as_ref()
    }

    pub fn set_self_context(&mut self, context: Option<InstanceHandle>) {
        self.self_context = context;
    }

    pub fn operand_stack_mut(&mut self) -> &mut OperandStack {
        &mut self.operand_stack
    }

    pub fn operand_depth(&self) -> usize {
        self.operand_stack.depth()
    }

    pub fn well_known(&self, name: &str) -> Option<SymbolIndex> {
        match name {
            "SELF" => self.well_known.self_,
            "OTHER" => self.well_known.other,
            "VICTIM" => self.well_known.victim,
            "HERO" => self.well_known.hero,
            "ITEM" => self.well_known.item,
            _ => None,
        }
    }

    // ---- push/pop helpers -------------------------------------------------

    pub fn push_int(&mut self, value: i32) -> VmResult<()> {
        self.operand_stack.push(OperandFrame::Int(value))
    }

    pub fn push_float(&mut self, value: f32) -> VmResult<()> {
        self.operand_stack.push(OperandFrame::Float(value))
    }

    pub fn push_string(&mut self, value: impl Into<String>) -> VmResult<()> {
        let scratch = self.well_known.scratch;
        self.script
            .set_string(scratch, 0, value.into())
            .map_err(VmError::Script)?;
        self.push_reference(scratch, 0)
    }

    pub fn push_instance(&mut self, handle: Option<InstanceHandle>) -> VmResult<()> {
        self.operand_stack.push(OperandFrame::InstanceRef(handle))
    }

    pub fn push_reference(&mut self, symbol: SymbolIndex, subscript: u32) -> VmResult<()> {
        if self.access_trap.is_some() && !self.trapped.contains(&symbol) {
            self.trapped.insert(symbol);
            if let Some(trap) = self.access_trap.clone() {
                trap(self, symbol);
            }
        }
        self.operand_stack.push(OperandFrame::Reference {
            symbol,
            subscript,
            context: self.self_context.clone(),
        })
    }

    pub fn pop_int(&mut self) -> VmResult<i32> {
        let frame = self.operand_stack.pop()?;
        self.resolve_int(frame)
    }

    pub fn pop_float(&mut self) -> VmResult<f32> {
        let frame = self.operand_stack.pop()?;
        self.resolve_float(frame)
    }

    pub fn pop_string(&mut self) -> VmResult<String> {
        let frame = self.operand_stack.pop()?;
        self.resolve_string(frame)
    }

    pub fn pop_instance(&mut self) -> VmResult<Option<InstanceHandle>> {
        let frame = self.operand_stack.pop()?;
        self.resolve_instance(frame)
    }

    pub fn pop_reference(&mut self) -> VmResult<(SymbolIndex, u32, Option<InstanceHandle>)> {
        match self.operand_stack.pop()? {
            OperandFrame::Reference {
                symbol,
                subscript,
                context,
            } => Ok((symbol, subscript, context)),
            _ => Err(VmError::ArithmeticError("expected a reference operand")),
        }
    }

    fn resolve_value(&self, frame: OperandFrame) -> VmResult<RuntimeValue> {
        match frame {
            OperandFrame::Int(v) => Ok(RuntimeValue::Int(v)),
            OperandFrame::Float(v) => Ok(RuntimeValue::Float(v)),
            OperandFrame::InstanceRef(v) => Ok(RuntimeValue::Instance(v)),
            OperandFrame::Reference {
                symbol,
                subscript,
                context,
            } => self.read_ref(symbol, subscript, context),
        }
    }

    fn resolve_int(&self, frame: OperandFrame) -> VmResult<i32> {
        match self.resolve_value(frame)? {
            RuntimeValue::Int(v) => Ok(v),
            _ => Err(VmError::ArithmeticError("expected an int operand")),
        }
    }

    fn resolve_float(&self, frame: OperandFrame) -> VmResult<f32> {
        match self.resolve_value(frame)? {
            RuntimeValue::Float(v) => Ok(v),
            _ => Err(VmError::ArithmeticError("expected a float operand")),
        }
    }

    fn resolve_string(&self, frame: OperandFrame) -> VmResult<String> {
        match self.resolve_value(frame)? {
            RuntimeValue::Str(v) => Ok(v),
            _ => Err(VmError::ArithmeticError("expected a string operand")),
        }
    }

    fn resolve_instance(&self, frame: OperandFrame) -> VmResult<Option<InstanceHandle>> {
        match self.resolve_value(frame)? {
            RuntimeValue::Instance(v) => Ok(v),
            _ => Err(VmError::ArithmeticError("expected an instance operand")),
        }
    }

    fn read_ref(
        &self,
        symbol: SymbolIndex,
        subscript: u32,
        context: Option<InstanceHandle>,
    ) -> VmResult<RuntimeValue> {
        let sym = self
            .script
            .find_symbol_by_index(symbol)
            .ok_or_else(|| VmError::Script(zengin_script::ScriptError::NotAMember(symbol)))?;

        if sym.is_member() {
            let ctx = match context {
                Some(c) => c,
                None if self.flags.contains(ExecutionFlags::ALLOW_NULL_INSTANCE_ACCESS) => {
                    warn!("member {} read with no context instance", sym.name);
                    return Ok(Self::zero_runtime_value(sym.data_type));
                }
                None => return Err(VmError::NoContext { sym: symbol }),
            };
            if let Some(bound) = self.script.bound_type(sym.parent) {
                if ctx.type_id() != bound {
                    return Err(VmError::WrongContextType { sym: symbol });
                }
            }
            let accessor = self
                .script
                .member_accessor(symbol)
                .ok_or(VmError::UnboundMember { sym: symbol })?;
            let value = accessor
                .get(&ctx, subscript as usize)
                .map_err(VmError::Script)?;
            Ok(RuntimeValue::from(value))
        } else {
            match sym.data_type {
                DataType::Int | DataType::Function => Ok(RuntimeValue::Int(
                    self.script.get_int(symbol, subscript as usize)?,
                )),
                DataType::Float => Ok(RuntimeValue::Float(
                    self.script.get_float(symbol, subscript as usize)?,
                )),
                DataType::String => Ok(RuntimeValue::Str(
                    self.script.get_string(symbol, subscript as usize)?,
                )),
                DataType::Instance => Ok(RuntimeValue::Instance(self.script.get_instance(symbol)?)),
                _ => Err(VmError::ArithmeticError("symbol has no readable value")),
            }
        }
    }

    fn zero_runtime_value(data_type: DataType) -> RuntimeValue {
        match data_type {
            DataType::Float => RuntimeValue::Float(0.0),
            DataType::String => RuntimeValue::Str(String::new()),
            DataType::Instance => RuntimeValue::Instance(None),
            _ => RuntimeValue::Int(0),
        }
    }

    fn write_ref(
        &mut self,
        symbol: SymbolIndex,
        subscript: u32,
        context: Option<InstanceHandle>,
        value: RuntimeValue,
    ) -> VmResult<()> {
        let sym = self
            .script
            .find_symbol_by_index(symbol)
            .ok_or_else(|| VmError::Script(zengin_script::ScriptError::NotAMember(symbol)))?
            .clone();

        if sym.is_const() && !self.flags.contains(ExecutionFlags::IGNORE_CONST_SPECIFIER) {
            return Err(VmError::ConstViolation(symbol));
        }

        if sym.is_member() {
            let ctx = match context {
                Some(c) => c,
                None if self.flags.contains(ExecutionFlags::ALLOW_NULL_INSTANCE_ACCESS) => {
                    warn!("member {} written with no context instance, dropping", sym.name);
                    return Ok(());
                }
                None => return Err(VmError::NoContext { sym: symbol }),
            };
            if let Some(bound) = self.script.bound_type(sym.parent) {
                if ctx.type_id() != bound {
                    return Err(VmError::WrongContextType { sym: symbol });
                }
            }
            let accessor = self
                .script
                .member_accessor(symbol)
                .ok_or(VmError::UnboundMember { sym: symbol })?;
            accessor
                .set(&ctx, subscript as usize, value.into())
                .map_err(VmError::Script)
        } else {
            match value {
                RuntimeValue::Int(v) => self
                    .script
                    .set_int(symbol, subscript as usize, v)
                    .map_err(VmError::Script),
                RuntimeValue::Float(v) => self
                    .script
                    .set_float(symbol, subscript as usize, v)
                    .map_err(VmError::Script),
                RuntimeValue::Str(v) => self
                    .script
                    .set_string(symbol, subscript as usize, v)
                    .map_err(VmError::Script),
                RuntimeValue::Instance(v) => {
                    self.script.set_instance(symbol, v).map_err(VmError::Script)
                }
            }
        }
    }

    fn push_zero_value(&mut self, data_type: DataType) -> VmResult<()> {
        match data_type {
            DataType::Int | DataType::Function => self.push_int(0),
            DataType::Float => self.push_float(0.0),
            DataType::String => self.push_string(String::new()),
            DataType::Instance => self.push_instance(None),
            _ => Ok(()),
        }
    }

    // ---- registration ------------------------------------------------------

    pub fn register_external(
        &mut self,
        name: &str,
        callback: ExternalFn,
        signature: ExternalSignature,
    ) -> VmResult<()> {
        let symbol = crate::external::validate_signature(&self.script, name, &signature, true)?;
        self.externals.insert(symbol, callback);
        Ok(())
    }

    pub fn override_function(
        &mut self,
        name: &str,
        callback: ExternalFn,
        signature: ExternalSignature,
    ) -> VmResult<()> {
        let symbol = crate::external::validate_signature(&self.script, name, &signature, false)?;
        let address = self
            .script
            .find_symbol_by_index(symbol)
            .expect("symbol just validated")
            .address;
        self.overrides.insert(address, callback);
        Ok(())
    }

    pub fn register_default_external(
        &mut self,
        handler: Rc<dyn Fn(&mut DaedalusVM, SymbolIndex) -> VmResult<()>>,
    ) {
        self.default_external_handler = Some(handler);
    }

    pub fn register_access_trap(&mut self, handler: Rc<dyn Fn(&mut DaedalusVM, SymbolIndex)>) {
        self.access_trap = Some(handler);
    }

    pub fn register_exception_handler(&mut self, handler: ExceptionHandler) {
        self.exception_handler = Some(handler);
    }

    fn dispatch_external(&mut self, symbol: SymbolIndex, callback: ExternalFn) -> VmResult<()> {
        let declared_return = self
            .script
            .find_symbol_by_index(symbol)
            .map(|s| s.return_type)
            .unwrap_or(DataType::Void);
        let mut guard = StackGuard::new(&self.operand_stack);
        let result = callback(self);
        if result.is_ok() {
            // A successful callback is trusted to have pushed its own
            // return value (or to genuinely be void); comparing stack
            // depth before/after would also true for a callback that
            // popped N parameters and pushed one return.
            guard.inhibit();
        }
        if guard.should_fill(&self.operand_stack) && declared_return != DataType::Void {
            self.push_zero_value(declared_return)?;
        }
        result
    }

    pub fn init_instance<T: Any + Default>(&mut self, name: &str) -> VmResult<Rc<T>> {
        let symbol = self
            .script
            .find_symbol_by_name(name)
            .cloned()
            .ok_or_else(|| VmError::Script(zengin_script::ScriptError::SymbolNotFound(name.to_string())))?;

        let instance = Rc::new(T::default());
        let handle = InstanceHandle::new(Rc::clone(&instance), symbol.index);
        self.script
            .set_instance(symbol.index, Some(handle.clone()))
            .map_err(VmError::Script)?;

        if symbol.address != zengin_script::ids::UNSET {
            let previous = self.self_context.take();
            self.self_context = Some(handle);
            let result = self.unsafe_call(symbol.index);
            self.self_context = previous;
            result?;
        }

        Ok(instance)
    }

    // ---- call/return --------------------------------------------------------

    pub fn call_function(&mut self, name: &str) -> VmResult<()> {
        let symbol = self
            .script
            .find_symbol_by_name(name)
            .map(|s| s.index)
            .ok_or_else(|| VmError::Script(zengin_script::ScriptError::SymbolNotFound(name.to_string())))?;
        self.unsafe_call(symbol)
    }

    pub fn call_function_by_symbol(&mut self, symbol: &zengin_script::Symbol) -> VmResult<()> {
        self.unsafe_call(symbol.index)
    }

    pub fn unsafe_jump(&mut self, address: u32) {
        self.pc = address;
    }

    pub fn unsafe_call(&mut self, symbol: SymbolIndex) -> VmResult<()> {
        let address = self
            .script
            .find_symbol_by_index(symbol)
            .ok_or_else(|| VmError::Script(zengin_script::ScriptError::NotAMember(symbol)))?
            .address;

        let target_depth = self.call_stack.depth();
        self.call_stack.push(CallFrame {
            returning_symbol: symbol,
            saved_pc: self.pc,
            saved_context: self.self_context.clone(),
        })?;
        self.pc = address;
        self.run_until_depth(target_depth)
    }

    fn consult_exception_handler(
        &mut self,
        error: &VmError,
        instr: Option<&Instruction>,
    ) -> ExceptionStrategy {
        match self.exception_handler.clone() {
            Some(handler) => {
                let placeholder = Instruction {
                    op: Opcode::Noop,
                    size: 1,
                    address: 0,
                    symbol: 0,
                    immediate: 0,
                    index: 0,
                };
                handler(self, error, instr.unwrap_or(&placeholder))
            }
            None => {
                log::error!(
                    "unhandled vm error at pc={}, call depth={}: {error}",
                    self.pc,
                    self.call_stack.depth()
                );
                ExceptionStrategy::Fail
            }
        }
    }

    fn run_until_depth(&mut self, target_depth: usize) -> VmResult<()> {
        loop {
            let pc = self.pc;
            let instr = match self.script.decode_at(pc) {
                Ok(instr) => instr,
                Err(e) => {
                    let error = VmError::Script(e);
                    match self.consult_exception_handler(&error, None) {
                        ExceptionStrategy::Fail => return Err(error),
                        ExceptionStrategy::Continue => {
                            self.pc = pc + 1;
                            continue;
                        }
                        ExceptionStrategy::Return => {
                            let frame = self.call_stack.pop()?;
                            self.pc = frame.saved_pc;
                            self.self_context = frame.saved_context;
                            if self.call_stack.depth() == target_depth {
                                return Ok(());
                            }
                            continue;
                        }
                    }
                }
            };

            self.pc = pc + instr.size as u32;
            trace!("{pc:#06x}: {:?}", instr.op);

            if instr.op == Opcode::Return {
                let frame = self.call_stack.pop()?;
                self.pc = frame.saved_pc;
                self.self_context = frame.saved_context;
                if self.call_stack.depth() == target_depth {
                    return Ok(());
                }
                continue;
            }

            if let Err(error) = self.execute(&instr) {
                match self.consult_exception_handler(&error, Some(&instr)) {
                    ExceptionStrategy::Fail => return Err(error),
                    ExceptionStrategy::Continue => {}
                    ExceptionStrategy::Return => {
                        let frame = self.call_stack.pop()?;
                        self.pc = frame.saved_pc;
                        self.self_context = frame.saved_context;
                        if self.call_stack.depth() == target_depth {
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    fn pop_binary_ints(&mut self) -> VmResult<(i32, i32)> {
        let rhs = self.pop_int()?;
        let lhs = self.pop_int()?;
        Ok((lhs, rhs))
    }

    fn execute(&mut self, instr: &Instruction) -> VmResult<()> {
        use Opcode::*;
        match instr.op {
            Add => {
                let (a, b) = self.pop_binary_ints()?;
                self.push_int(a.wrapping_add(b))
            }
            Sub => {
                let (a, b) = self.pop_binary_ints()?;
                self.push_int(a.wrapping_sub(b))
            }
            Mul => {
                let (a, b) = self.pop_binary_ints()?;
                self.push_int(a.wrapping_mul(b))
            }
            Div => {
                let (a, b) = self.pop_binary_ints()?;
                if b == 0 {
                    return Err(VmError::ArithmeticError("division by zero"));
                }
                self.push_int(a.wrapping_div(b))
            }
            Mod => {
                let (a, b) = self.pop_binary_ints()?;
                if b == 0 {
                    return Err(VmError::ArithmeticError("modulo by zero"));
                }
                self.push_int(a.wrapping_rem(b))
            }
            BitOr => {
                let (a, b) = self.pop_binary_ints()?;
                self.push_int(a | b)
            }
            BitAnd => {
                let (a, b) = self.pop_binary_ints()?;
                self.push_int(a & b)
            }
            Lt => {
                let (a, b) = self.pop_binary_ints()?;
                self.push_int((a < b) as i32)
            }
            Gt => {
                let (a, b) = self.pop_binary_ints()?;
                self.push_int((a > b) as i32)
            }
            Or => {
                let (a, b) = self.pop_binary_ints()?;
                self.push_int(((a != 0) || (b != 0)) as i32)
            }
            And => {
                let (a, b) = self.pop_binary_ints()?;
                self.push_int(((a != 0) && (b != 0)) as i32)
            }
            Lsl => {
                let (a, b) = self.pop_binary_ints()?;
                self.push_int(a.wrapping_shl(b as u32))
            }
            Lsr => {
                let (a, b) = self.pop_binary_ints()?;
                self.push_int(a.wrapping_shr(b as u32))
            }
            Le => {
                let (a, b) = self.pop_binary_ints()?;
                self.push_int((a <= b) as i32)
            }
            Eq => {
                let (a, b) = self.pop_binary_ints()?;
                self.push_int((a == b) as i32)
            }
            Ne => {
                let (a, b) = self.pop_binary_ints()?;
                self.push_int((a != b) as i32)
            }
            Ge => {
                let (a, b) = self.pop_binary_ints()?;
                self.push_int((a >= b) as i32)
            }
            Plus => {
                let v = self.pop_int()?;
                self.push_int(v)
            }
            Minus => {
                let v = self.pop_int()?;
                self.push_int(v.wrapping_neg())
            }
            Not => {
                let v = self.pop_int()?;
                self.push_int((v == 0) as i32)
            }
            Compl => {
                let v = self.pop_int()?;
                self.push_int(!v)
            }
            Noop => Ok(()),
            AssignInt => {
                let (symbol, subscript, context) = self.pop_reference()?;
                let value = self.pop_int()?;
                self.write_ref(symbol, subscript, context, RuntimeValue::Int(value))
            }
            AssignAdd | AssignSub | AssignMul | AssignDiv => {
                let (symbol, subscript, context) = self.pop_reference()?;
                let value = self.pop_int()?;
                let current = match self.read_ref(symbol, subscript, context.clone())? {
                    RuntimeValue::Int(v) => v,
                    _ => return Err(VmError::ArithmeticError("compound assignment on non-int")),
                };
                let updated = match instr.op {
                    AssignAdd => current.wrapping_add(value),
                    AssignSub => current.wrapping_sub(value),
                    AssignMul => current.wrapping_mul(value),
                    AssignDiv => {
                        if value == 0 {
                            return Err(VmError::ArithmeticError("division by zero"));
                        }
                        current.wrapping_div(value)
                    }
                    _ => unreachable!(),
                };
                self.write_ref(symbol, subscript, context, RuntimeValue::Int(updated))
            }
            Return => unreachable!("Return is handled by the execution loop"),
            Call => self.execute_call(instr),
            CallExternal => self.execute_call_external(instr),
            PushInt => self.push_int(instr.immediate),
            PushVar | PushInstance => self.push_reference(SymbolIndex(instr.symbol), 0),
            AssignString | AssignStringRef => {
                let (symbol, subscript, context) = self.pop_reference()?;
                let value_frame = self.operand_stack.pop()?;
                let value = self.resolve_string(value_frame)?;
                self.write_ref(symbol, subscript, context, RuntimeValue::Str(value))
            }
            AssignFunc => {
                let (symbol, subscript, context) = self.pop_reference()?;
                let value = self.pop_int()?;
                self.write_ref(symbol, subscript, context, RuntimeValue::Int(value))
            }
            AssignFloat => {
                let (symbol, subscript, context) = self.pop_reference()?;
                let value = self.pop_float()?;
                self.write_ref(symbol, subscript, context, RuntimeValue::Float(value))
            }
            AssignInstance => {
                let (symbol, subscript, context) = self.pop_reference()?;
                let value = self.pop_instance()?;
                self.write_ref(symbol, subscript, context, RuntimeValue::Instance(value))
            }
            Jump => {
                self.pc = instr.address;
                Ok(())
            }
            JumpIfZero => {
                let v = self.pop_int()?;
                if v == 0 {
                    self.pc = instr.address;
                }
                Ok(())
            }
            SetInstance => {
                let handle = self.script.get_instance(SymbolIndex(instr.symbol))?;
                self.self_context = handle;
                Ok(())
            }
            PushArrayVar => self.push_reference(SymbolIndex(instr.symbol), instr.index as u32),
        }
    }

    fn execute_call(&mut self, instr: &Instruction) -> VmResult<()> {
        if let Some(callback) = self.overrides.get(&instr.address).cloned() {
            let symbol = self
                .script
                .find_symbol_by_address(instr.address)
                .map(|s| s.index);
            return match symbol {
                Some(sym) => self.dispatch_external(sym, callback),
                None => callback(self),
            };
        }

        let callee = self
            .script
            .find_symbol_by_address(instr.address)
            .map(|s| s.index)
            .unwrap_or(SymbolIndex::UNSET);
        self.call_stack.push(CallFrame {
            returning_symbol: callee,
            saved_pc: self.pc,
            saved_context: self.self_context.clone(),
        })?;
        self.pc = instr.address;
        Ok(())
    }

    fn execute_call_external(&mut self, instr: &Instruction) -> VmResult<()> {
        let symbol = SymbolIndex(instr.symbol);
        if let Some(callback) = self.externals.get(&symbol).cloned() {
            self.dispatch_external(symbol, callback)
        } else if let Some(handler) = self.default_external_handler.clone() {
            handler(self, symbol)
        } else {
            Err(VmError::UnregisteredExternal { sym: symbol })
        }
    }
}
