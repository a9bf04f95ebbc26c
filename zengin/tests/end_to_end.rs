//! Hand-assembled compiled-script bytes exercising the VM against real
//! opcode sequences instead of calling its push/pop helpers directly, plus
//! the archive scenarios from the host-facing contract.

use std::cell::RefCell;
use std::rc::Rc;

use zengin::{
    archive_open, ArchiveError, ClosureMember, DaedalusVM, DaedalusVmBuilder, DataType,
    EntryType, ExecutionFlags, ExternalSignature, HostType, InstanceHandle,
    lenient_exception_handler, MemberValue, Opcode, ScriptImage, SymbolFlags, SymbolIndex,
};

const UNSET: u32 = zengin_script::ids::UNSET;

/// One not-yet-encoded symbol record. Mirrors the fields `ScriptImage::load`
/// actually reads; a field irrelevant to a given `data_type` is left at its
/// zero default and never serialized.
struct SymSpec {
    name: &'static str,
    data_type: DataType,
    flags: SymbolFlags,
    count: u32,
    parent: u32,
    class_size: u32,
    address: u32,
    return_type: u32,
    ints: Vec<i32>,
    floats: Vec<f32>,
    strings: Vec<&'static str>,
}

impl SymSpec {
    fn new(name: &'static str, data_type: DataType) -> Self {
        SymSpec {
            name,
            data_type,
            flags: SymbolFlags::empty(),
            count: 1,
            parent: UNSET,
            class_size: 0,
            address: UNSET,
            return_type: 0,
            ints: Vec::new(),
            floats: Vec::new(),
            strings: Vec::new(),
        }
    }
}

fn encode_symbol(spec: &SymSpec) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&1u32.to_le_bytes());
    for b in spec.name.bytes() {
        buf.push(b ^ 0xFF);
    }
    buf.push(0xFF);

    buf.extend_from_slice(&0u32.to_le_bytes()); // offset_as_member, unused by accessor lookup

    let bit_packed = (spec.count & 0x0FFF) | ((spec.data_type as u32) << 12) | (spec.flags.bits() << 16);
    buf.extend_from_slice(&bit_packed.to_le_bytes());

    buf.extend_from_slice(&0u32.to_le_bytes()); // file_index
    buf.extend_from_slice(&0u32.to_le_bytes()); // line_start
    buf.extend_from_slice(&0u32.to_le_bytes()); // line_count
    buf.extend_from_slice(&0u32.to_le_bytes()); // char_start
    buf.extend_from_slice(&0u32.to_le_bytes()); // char_count

    if spec.data_type == DataType::Class {
        buf.extend_from_slice(&spec.class_size.to_le_bytes());
    }

    // The on-disk reader always consumes exactly `count` values for these
    // three types, member or not; pad short specs with zeros so the decoded
    // byte stream stays in sync regardless of how many were actually given.
    match spec.data_type {
        DataType::Function => {
            buf.extend_from_slice(&spec.address.to_le_bytes());
            buf.extend_from_slice(&spec.return_type.to_le_bytes());
        }
        DataType::Float => {
            for i in 0..spec.count {
                let v = spec.floats.get(i as usize).copied().unwrap_or(0.0);
                buf.extend_from_slice(&v.to_le_bytes());
            }
        }
        DataType::String => {
            for i in 0..spec.count {
                let s = spec.strings.get(i as usize).copied().unwrap_or("");
                buf.extend_from_slice(s.as_bytes());
                buf.push(0);
            }
        }
        DataType::Int => {
            for i in 0..spec.count {
                let v = spec.ints.get(i as usize).copied().unwrap_or(0);
                buf.extend_from_slice(&v.to_le_bytes());
            }
        }
        _ => {}
    }

    buf.extend_from_slice(&spec.parent.to_le_bytes());
    buf
}

fn build_script(symbols: &[SymSpec], code: Vec<u8>) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.push(0); // version magic
    buf.extend_from_slice(&(symbols.len() as u32).to_le_bytes());
    for i in 0..symbols.len() {
        buf.extend_from_slice(&(i as u32).to_le_bytes()); // sort index, discarded on load
    }
    for s in symbols {
        buf.extend_from_slice(&encode_symbol(s));
    }
    buf.extend_from_slice(&(code.len() as u32).to_le_bytes());
    buf.extend_from_slice(&code);
    buf
}

fn op0(op: Opcode) -> Vec<u8> {
    vec![op as u8]
}

fn op_push_int(v: i32) -> Vec<u8> {
    let mut b = vec![Opcode::PushInt as u8];
    b.extend_from_slice(&v.to_le_bytes());
    b
}

fn op_push_var(symbol: u32) -> Vec<u8> {
    let mut b = vec![Opcode::PushVar as u8];
    b.extend_from_slice(&symbol.to_le_bytes());
    b
}

fn op_push_array_var(symbol: u32, index: u8) -> Vec<u8> {
    let mut b = vec![Opcode::PushArrayVar as u8];
    b.extend_from_slice(&symbol.to_le_bytes());
    b.push(index);
    b
}

fn op_call_external(symbol: u32) -> Vec<u8> {
    let mut b = vec![Opcode::CallExternal as u8];
    b.extend_from_slice(&symbol.to_le_bytes());
    b
}

#[test]
fn arithmetic_returns_seven() {
    let symbols = [SymSpec::new("ADD3AND4", DataType::Function)];
    let mut code = op_push_int(3);
    code.extend(op_push_int(4));
    code.extend(op0(Opcode::Add));
    code.extend(op0(Opcode::Return));

    let script = ScriptImage::load(build_script(&symbols, code)).unwrap();
    let mut vm = DaedalusVM::new(script, ExecutionFlags::empty());
    vm.call_function("ADD3AND4").unwrap();
    assert_eq!(vm.pop_int().unwrap(), 7);
}

#[test]
fn division_by_zero_recovers_to_zero_under_lenient_handler() {
    let symbols = [SymSpec::new("DIVBYZERO", DataType::Function)];
    let mut code = op_push_int(10);
    code.extend(op_push_int(0));
    code.extend(op0(Opcode::Div));
    code.extend(op0(Opcode::Return));

    let script = ScriptImage::load(build_script(&symbols, code)).unwrap();
    let mut vm = DaedalusVM::new(script, ExecutionFlags::empty());
    vm.register_exception_handler(Rc::new(lenient_exception_handler));
    vm.call_function("DIVBYZERO").unwrap();
    assert_eq!(vm.pop_int().unwrap(), 0);
}

#[test]
fn external_dispatch_stringifies_an_int() {
    let mut caller = SymSpec::new("MAIN", DataType::Function);
    caller.address = 0;

    let mut external = SymSpec::new("INTTOSTRING", DataType::Function);
    external.flags = SymbolFlags::EXTERNAL;
    external.return_type = DataType::String as u32;

    let mut param = SymSpec::new("value", DataType::Int);
    param.parent = 1; // INTTOSTRING's index

    let symbols = [caller, external, param];

    let mut code = op_push_int(42);
    code.extend(op_call_external(1));
    code.extend(op0(Opcode::Return));

    let script = ScriptImage::load(build_script(&symbols, code)).unwrap();
    let mut vm = DaedalusVM::new(script, ExecutionFlags::empty());
    vm.register_external(
        "INTTOSTRING",
        Rc::new(|vm: &mut DaedalusVM| {
            let v = vm.pop_int()?;
            vm.push_string(format!("{v}"))
        }),
        ExternalSignature {
            params: vec![HostType::Int],
            return_type: HostType::String,
        },
    )
    .unwrap();

    vm.call_function("MAIN").unwrap();
    assert_eq!(vm.pop_string().unwrap(), "42");
}

struct Npc {
    name: RefCell<Vec<String>>,
}

impl Default for Npc {
    fn default() -> Self {
        Npc {
            name: RefCell::new(vec![String::new(); 5]),
        }
    }
}

#[test]
fn member_write_lands_in_the_registered_host_field() {
    let mut main_fn = SymSpec::new("MAIN", DataType::Function);
    main_fn.address = 0;

    let mut class_sym = SymSpec::new("C_NPC", DataType::Class);
    class_sym.class_size = 16;

    let mut name_member = SymSpec::new("NAME", DataType::String);
    name_member.flags = SymbolFlags::MEMBER;
    name_member.count = 5;
    name_member.parent = 1; // C_NPC's index
    name_member.strings = vec!["", "", "", "", ""];

    let mut instance_sym = SymSpec::new("STT_309", DataType::Instance);
    instance_sym.parent = 1; // C_NPC's index

    let mut literal = SymSpec::new("$LIT_WHISTLER", DataType::String);
    literal.strings = vec!["Whistler"];

    let symbols = [main_fn, class_sym, name_member, instance_sym, literal];

    // push_string("Whistler") then push_array_var NAME 0: assign_string pops
    // the target reference first, the value second, so the reference must be
    // the last thing pushed.
    let mut code = op_push_var(4);
    code.extend(op_push_array_var(2, 0));
    code.extend(op0(Opcode::AssignString));
    code.extend(op0(Opcode::Return));

    let mut script = ScriptImage::load(build_script(&symbols, code)).unwrap();
    script.register_class::<Npc>("C_NPC").unwrap();
    script
        .register_member(
            "NAME",
            DataType::String,
            5,
            Box::new(ClosureMember::<Npc>::new(
                SymbolIndex(2),
                |npc: &Npc, idx| MemberValue::String(npc.name.borrow()[idx].clone()),
                |npc: &Npc, idx, value| {
                    if let MemberValue::String(s) = value {
                        npc.name.borrow_mut()[idx] = s;
                    }
                },
            )),
        )
        .unwrap();

    let mut vm = DaedalusVM::new(script, ExecutionFlags::empty());
    let instance = vm.init_instance::<Npc>("STT_309").unwrap();
    let instance_index = vm.script().find_symbol_by_name("STT_309").unwrap().index;
    vm.set_self_context(Some(InstanceHandle::new(Rc::clone(&instance), instance_index)));

    vm.call_function("MAIN").unwrap();
    assert_eq!(instance.name.borrow()[0], "Whistler");
}

#[test]
fn ascii_archive_round_trips_an_int_entry() {
    let bytes = b"ZenGin Archive\nver 1\nphoenix\nASCII\nsaveGame 0\nEND\nobjects 1\nEND\n\
        [obj cClass 0 0]\nk=int:7\n[]\n"
        .to_vec();

    let mut reader = archive_open(bytes).unwrap();
    reader.read_object_begin().unwrap();
    assert_eq!(reader.read_int().unwrap(), 7);
    assert!(reader.read_object_end().unwrap());
}

#[test]
fn binsafe_type_mismatch_reports_expected_and_got() {
    let mut entries = Vec::new();
    entries.push(0x03u8); // Float tag
    entries.extend_from_slice(&1.5f32.to_le_bytes());

    let mut bytes = b"ZenGin Archive\nver 1\nphoenix\nBIN_SAFE\nsaveGame 0\nEND\n".to_vec();
    bytes.extend_from_slice(&1u32.to_le_bytes()); // binsafe_version
    bytes.extend_from_slice(&1u32.to_le_bytes()); // object_count
    let hash_table_offset = 12u32 + entries.len() as u32;
    bytes.extend_from_slice(&hash_table_offset.to_le_bytes());
    bytes.extend_from_slice(&entries);
    bytes.extend_from_slice(&0u32.to_le_bytes()); // empty hash table

    let mut reader = archive_open(bytes).unwrap();
    let err = reader.read_int().unwrap_err();
    assert_eq!(
        err,
        ArchiveError::UnexpectedEntryType {
            expected: EntryType::Int,
            got: EntryType::Float,
        }
    );
}

// ---- invariants (spec §8) -------------------------------------------------

#[test]
fn i1_every_loaded_symbol_resolves_by_index_and_address() {
    let mut fn_sym = SymSpec::new("FOO", DataType::Function);
    fn_sym.address = 3;
    let symbols = [fn_sym];
    let mut code = vec![0u8, 0, 0]; // padding so address 3 is valid
    code.extend(op0(Opcode::Return));

    let script = ScriptImage::load(build_script(&symbols, code)).unwrap();
    for symbol in script.symbols() {
        assert_eq!(script.find_symbol_by_index(symbol.index).unwrap().name, symbol.name);
        if symbol.address != UNSET {
            assert_eq!(
                script.find_symbol_by_address(symbol.address).unwrap().index,
                symbol.index
            );
        }
    }
}

#[test]
fn i3_void_call_leaves_operand_depth_unchanged() {
    let mut noop_fn = SymSpec::new("NOOP", DataType::Function);
    noop_fn.address = 0;
    let symbols = [noop_fn];
    let code = op0(Opcode::Return);

    let script = ScriptImage::load(build_script(&symbols, code)).unwrap();
    let mut vm = DaedalusVM::new(script, ExecutionFlags::empty());
    vm.push_int(1).unwrap();
    let before = vm.operand_depth();
    vm.call_function("NOOP").unwrap();
    assert_eq!(vm.operand_depth(), before);
}

#[test]
fn i2_stack_overflow_raises_instead_of_corrupting() {
    let mut overflow_fn = SymSpec::new("OVERFLOW", DataType::Function);
    overflow_fn.address = 0;
    let symbols = [overflow_fn];

    let mut code = Vec::new();
    for _ in 0..5 {
        code.extend(op_push_int(1));
    }
    code.extend(op0(Opcode::Return));

    let script = ScriptImage::load(build_script(&symbols, code)).unwrap();
    let mut vm = DaedalusVmBuilder::new(script)
        .with_stack_capacity(3)
        .build();
    assert!(vm.call_function("OVERFLOW").is_err());
}

#[test]
fn l3_same_bytecode_is_deterministic() {
    let symbols = [SymSpec::new("ADD3AND4", DataType::Function)];
    let mut code = op_push_int(3);
    code.extend(op_push_int(4));
    code.extend(op0(Opcode::Add));
    code.extend(op0(Opcode::Return));
    let bytes = build_script(&symbols, code);

    let run = || {
        let script = ScriptImage::load(bytes.clone()).unwrap();
        let mut vm = DaedalusVM::new(script, ExecutionFlags::empty());
        vm.call_function("ADD3AND4").unwrap();
        vm.pop_int().unwrap()
    };

    assert_eq!(run(), run());
}
