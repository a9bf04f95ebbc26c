use std::rc::Rc;

use zengin_byteio::ByteReader;

use crate::error::{ScriptError, ScriptResult};

/// On-disk opcode byte. Numeric values match the compiled script format
/// (`phoenix::daedalus::opcode`) exactly, including the gaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Add = 0,
    Sub = 1,
    Mul = 2,
    Div = 3,
    Mod = 4,
    BitOr = 5,
    BitAnd = 6,
    Lt = 7,
    Gt = 8,
    AssignInt = 9,
    Or = 11,
    And = 12,
    Lsl = 13,
    Lsr = 14,
    Le = 15,
    Eq = 16,
    Ne = 17,
    Ge = 18,
    AssignAdd = 19,
    AssignSub = 20,
    AssignMul = 21,
    AssignDiv = 22,
    Plus = 30,
    Minus = 31,
    Not = 32,
    Compl = 33,
    Noop = 45,
    Return = 60,
    Call = 61,
    CallExternal = 62,
    PushInt = 64,
    PushVar = 65,
    PushInstance = 67,
    AssignString = 70,
    AssignStringRef = 71,
    AssignFunc = 72,
    AssignFloat = 73,
    AssignInstance = 74,
    Jump = 75,
    JumpIfZero = 76,
    SetInstance = 80,
    PushArrayVar = 245,
}

impl TryFrom<u8> for Opcode {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        use Opcode::*;
        Ok(match byte {
            0 => Add,
            1 => Sub,
            2 => Mul,
            3 => Div,
            4 => Mod,
            5 => BitOr,
            6 => BitAnd,
            7 => Lt,
            8 => Gt,
            9 => AssignInt,
            11 => Or,
            12 => And,
            13 => Lsl,
            14 => Lsr,
            15 => Le,
            16 => Eq,
            17 => Ne,
            18 => Ge,
            19 => AssignAdd,
            20 => AssignSub,
            21 => AssignMul,
            22 => AssignDiv,
            30 => Plus,
            31 => Minus,
            32 => Not,
            33 => Compl,
            45 => Noop,
            60 => Return,
            61 => Call,
            62 => CallExternal,
            64 => PushInt,
            65 => PushVar,
            67 => PushInstance,
            70 => AssignString,
            71 => AssignStringRef,
            72 => AssignFunc,
            73 => AssignFloat,
            74 => AssignInstance,
            75 => Jump,
            76 => JumpIfZero,
            80 => SetInstance,
            245 => PushArrayVar,
            other => return Err(other),
        })
    }
}

/// One decoded instruction. Only whichever operand fields the opcode
/// actually uses are meaningful; the rest default to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub op: Opcode,
    pub size: u8,
    pub address: u32,
    pub symbol: u32,
    pub immediate: i32,
    pub index: u8,
}

/// Decodes one instruction at `address` in `code`. Pure function of
/// `(code, address)`: decoding twice at the same address yields the same
/// result, and decoding never mutates `code`. Shares `code`'s backing buffer
/// via reference counting rather than copying it, since the VM's execution
/// loop calls this once per step.
pub fn decode_at(code: &Rc<[u8]>, address: u32) -> ScriptResult<Instruction> {
    if (address as usize) >= code.len() {
        return Err(ScriptError::InvalidAddress(address));
    }

    let mut reader = ByteReader::new(Rc::clone(code));
    reader
        .seek(address as usize)
        .map_err(|_| ScriptError::InvalidAddress(address))?;
    let op_byte = reader.read_u8().map_err(|_| ScriptError::InvalidAddress(address))?;
    let op = Opcode::try_from(op_byte).map_err(ScriptError::InvalidOpcode)?;

    let read_u32 = |reader: &mut ByteReader| -> ScriptResult<u32> {
        reader.read_u32().map_err(|_| ScriptError::InvalidAddress(address))
    };

    let mut instr = Instruction {
        op,
        size: 1,
        address: 0,
        symbol: 0,
        immediate: 0,
        index: 0,
    };

    use Opcode::*;
    match op {
        Call => {
            instr.address = read_u32(&mut reader)?;
            instr.size = 5;
        }
        CallExternal => {
            instr.symbol = read_u32(&mut reader)?;
            instr.size = 5;
        }
        PushInt => {
            instr.immediate = read_u32(&mut reader)? as i32;
            instr.size = 5;
        }
        PushVar | PushInstance => {
            instr.symbol = read_u32(&mut reader)?;
            instr.size = 5;
        }
        Jump | JumpIfZero => {
            instr.address = read_u32(&mut reader)?;
            instr.size = 5;
        }
        SetInstance => {
            instr.symbol = read_u32(&mut reader)?;
            instr.size = 5;
        }
        PushArrayVar => {
            instr.symbol = read_u32(&mut reader)?;
            instr.index = reader
                .read_u8()
                .map_err(|_| ScriptError::InvalidAddress(address))?;
            instr.size = 6;
        }
        // Pure stack operations: arithmetic, logic, unary, assign-through-ref,
        // noop and return. No operand bytes follow the opcode byte.
        _ => {}
    }

    Ok(instr)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rc(bytes: Vec<u8>) -> Rc<[u8]> {
        bytes.into()
    }

    #[test]
    fn decodes_one_byte_opcode() {
        let code = rc(vec![Opcode::Add as u8, Opcode::Return as u8]);
        let instr = decode_at(&code, 0).unwrap();
        assert_eq!(instr.op, Opcode::Add);
        assert_eq!(instr.size, 1);
    }

    #[test]
    fn decodes_push_int_with_immediate() {
        let mut code = vec![Opcode::PushInt as u8];
        code.extend_from_slice(&42i32.to_le_bytes());
        let instr = decode_at(&rc(code), 0).unwrap();
        assert_eq!(instr.op, Opcode::PushInt);
        assert_eq!(instr.immediate, 42);
        assert_eq!(instr.size, 5);
    }

    #[test]
    fn decodes_push_array_var_with_symbol_and_index() {
        let mut code = vec![Opcode::PushArrayVar as u8];
        code.extend_from_slice(&7u32.to_le_bytes());
        code.push(3);
        let instr = decode_at(&rc(code), 0).unwrap();
        assert_eq!(instr.symbol, 7);
        assert_eq!(instr.index, 3);
        assert_eq!(instr.size, 6);
    }

    #[test]
    fn out_of_range_address_fails() {
        let code = rc(vec![Opcode::Add as u8]);
        assert!(decode_at(&code, 5).is_err());
    }

    #[test]
    fn unknown_opcode_fails() {
        let code = rc(vec![0xAAu8]);
        assert!(matches!(decode_at(&code, 0), Err(ScriptError::InvalidOpcode(0xAA))));
    }
}
