use std::any::Any;
use std::any::TypeId;
use std::collections::HashMap;
use std::rc::Rc;

use log::trace;
use zengin_byteio::ByteReader;

use crate::bridge::MemberAccessor;
use crate::error::{ScriptError, ScriptResult};
use crate::ids::SymbolIndex;
use crate::instr::{decode_at, Instruction};
use crate::symbol::{SourceLocation, Symbol};
use crate::value::{DataType, SymbolFlags, SymbolValue};

const FAKE_STRINGS_NAME: &str = "$PHOENIX_FAKE_STRINGS";

/// A parsed compiled script: symbol table plus an opaque code segment.
///
/// Immutable in symbol identity after [`ScriptImage::load`]; the only
/// mutation afterward is a host binding a class/member via
/// [`ScriptImage::register_class`] / [`ScriptImage::register_member`], and
/// non-member symbol values changing under VM execution.
pub struct ScriptImage {
    symbols: Vec<Symbol>,
    by_name: HashMap<String, SymbolIndex>,
    by_address: HashMap<u32, SymbolIndex>,
    code: Rc<[u8]>,
    bound_types: HashMap<SymbolIndex, TypeId>,
    members: HashMap<SymbolIndex, Box<dyn MemberAccessor>>,
}

impl ScriptImage {
    pub fn load(bytes: impl Into<Rc<[u8]>>) -> ScriptResult<Self> {
        let bytes = bytes.into();
        let mut reader = ByteReader::new(Rc::clone(&bytes));

        let _version = reader.read_u8()?;

        let symbol_count = reader.read_u32()?;
        for _ in 0..symbol_count {
            // Sort-order indices are used only to build the original by-name
            // index; on-disk vector order is authoritative for `index`, so
            // they're read and discarded here.
            let _sort_index = reader.read_u32()?;
        }

        let mut symbols = Vec::with_capacity(symbol_count as usize);
        for i in 0..symbol_count {
            symbols.push(Self::read_symbol(&mut reader, i)?);
        }

        let code_size = reader.read_u32()?;
        let code = reader.read_bytes(code_size as usize)?;

        symbols.push(Symbol {
            name: FAKE_STRINGS_NAME.to_string(),
            index: SymbolIndex(symbol_count),
            address: crate::ids::UNSET,
            parent: SymbolIndex::UNSET,
            data_type: DataType::String,
            return_type: DataType::Void,
            flags: SymbolFlags::empty(),
            generated: true,
            count: 1,
            value: SymbolValue::Strings(vec![String::new()]),
            member_offset: crate::ids::UNSET,
            class_size: 0,
            bound_type: None,
            source_location: SourceLocation::default(),
        });

        let mut by_name = HashMap::with_capacity(symbols.len());
        let mut by_address = HashMap::new();
        for symbol in &symbols {
            by_name.insert(symbol.name.clone(), symbol.index);
            if symbol.address != crate::ids::UNSET {
                by_address.insert(symbol.address, symbol.index);
            }
        }

        trace!(
            "loaded script image: {} symbols, {} code bytes",
            symbols.len(),
            code.len()
        );

        Ok(ScriptImage {
            symbols,
            by_name,
            by_address,
            code: code.into(),
            bound_types: HashMap::new(),
            members: HashMap::new(),
        })
    }

    /// Names are stored byte-wise XOR 0xFF, terminated by the obfuscated form
    /// of `\0` (0xFF) rather than a literal zero byte.
    fn read_obfuscated_name(reader: &mut ByteReader) -> ScriptResult<String> {
        let mut bytes = Vec::new();
        loop {
            let b = reader.read_u8()?;
            if b == 0xFF {
                break;
            }
            bytes.push(b ^ 0xFF);
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn read_symbol(reader: &mut ByteReader, index: u32) -> ScriptResult<Symbol> {
        let has_name = reader.read_u32()?;
        let name = if has_name != 0 {
            Self::read_obfuscated_name(reader)?
        } else {
            String::new()
        };

        let offset_as_member = reader.read_u32()?;

        let bit_packed = reader.read_u32()?;
        let count = bit_packed & 0x0FFF;
        let data_type = DataType::try_from((bit_packed >> 12) & 0xF)
            .map_err(ScriptError::InvalidDataType)?;
        let flags = SymbolFlags::from_bits_truncate((bit_packed >> 16) & 0x3F);

        let file_index = reader.read_u32()?;
        let line_start = reader.read_u32()?;
        let line_count = reader.read_u32()?;
        let char_start = reader.read_u32()?;
        let char_count = reader.read_u32()?;

        let is_member = flags.contains(SymbolFlags::MEMBER);

        let class_size = if data_type == DataType::Class {
            reader.read_u32()?
        } else {
            0
        };

        let mut address = crate::ids::UNSET;
        let mut value = SymbolValue::None;
        let mut return_type = DataType::Void;
        match data_type {
            DataType::Function => {
                address = reader.read_u32()?;
                return_type = DataType::try_from(reader.read_u32()?)
                    .map_err(ScriptError::InvalidDataType)?;
            }
            DataType::Float => {
                let mut values = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    values.push(reader.read_f32()?);
                }
                if !is_member {
                    value = SymbolValue::Floats(values);
                }
            }
            DataType::String => {
                let mut values = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    values.push(reader.read_line(false)?);
                }
                if !is_member {
                    value = SymbolValue::Strings(values);
                }
            }
            DataType::Int => {
                let mut values = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    values.push(reader.read_i32()?);
                }
                if !is_member {
                    value = SymbolValue::Ints(values);
                }
            }
            DataType::Instance if !is_member => value = SymbolValue::Instance(None),
            _ => {}
        }

        let parent = SymbolIndex(reader.read_u32()?);

        Ok(Symbol {
            name,
            index: SymbolIndex(index),
            address,
            parent,
            data_type,
            return_type,
            flags,
            generated: false,
            count: count.max(1),
            value,
            member_offset: offset_as_member,
            class_size,
            bound_type: None,
            source_location: SourceLocation {
                file_index,
                line: line_start,
                line_offset: line_count,
                char_offset: char_start,
                char_count,
            },
        })
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn code_size(&self) -> usize {
        self.code.len()
    }

    pub fn find_symbol_by_name(&self, name: &str) -> Option<&Symbol> {
        self.by_name.get(name).map(|i| &self.symbols[i.0 as usize])
    }

    pub fn find_symbol_by_address(&self, address: u32) -> Option<&Symbol> {
        self.by_address
            .get(&address)
            .map(|i| &self.symbols[i.0 as usize])
    }

    pub fn find_symbol_by_index(&self, index: SymbolIndex) -> Option<&Symbol> {
        self.symbols.get(index.0 as usize)
    }

    pub fn decode_at(&self, address: u32) -> ScriptResult<Instruction> {
        decode_at(&self.code, address)
    }

    /// Binds a class symbol to a host type. Fails with [`ScriptError::SymbolNotFound`]
    /// if no such symbol exists, [`ScriptError::NotAMember`]-adjacent
    /// [`ScriptError::DataTypeMismatch`] if it isn't a class, or
    /// [`ScriptError::ParentConflict`] if the class is already bound to a
    /// different host type.
    pub fn register_class<T: Any>(&mut self, name: &str) -> ScriptResult<()> {
        let symbol = self
            .by_name
            .get(name)
            .copied()
            .ok_or_else(|| ScriptError::SymbolNotFound(name.to_string()))?;
        let entry = &mut self.symbols[symbol.0 as usize];
        if entry.data_type != DataType::Class {
            return Err(ScriptError::DataTypeMismatch {
                name: name.to_string(),
                declared: DataType::Class,
                actual: entry.data_type,
            });
        }

        let type_id = TypeId::of::<T>();
        match self.bound_types.get(&symbol) {
            Some(existing) if *existing != type_id => {
                return Err(ScriptError::ParentConflict(symbol));
            }
            _ => {}
        }
        self.bound_types.insert(symbol, type_id);
        entry.bound_type = Some(type_id);
        Ok(())
    }

    /// Registers a member accessor for a field symbol. `requested_arity` must
    /// not exceed the symbol's declared `count`, and `field_type` must match
    /// the symbol's declared type.
    pub fn register_member(
        &mut self,
        name: &str,
        field_type: DataType,
        requested_arity: u32,
        accessor: Box<dyn MemberAccessor>,
    ) -> ScriptResult<()> {
        let symbol_index = self
            .by_name
            .get(name)
            .copied()
            .ok_or_else(|| ScriptError::SymbolNotFound(name.to_string()))?;
        let symbol = &self.symbols[symbol_index.0 as usize];

        if !symbol.is_member() {
            return Err(ScriptError::NotAMember(symbol_index));
        }
        if requested_arity > symbol.count {
            return Err(ScriptError::ArityMismatch {
                name: name.to_string(),
                requested: requested_arity,
                declared: symbol.count,
            });
        }
        if symbol.data_type != field_type {
            return Err(ScriptError::DataTypeMismatch {
                name: name.to_string(),
                declared: symbol.data_type,
                actual: field_type,
            });
        }

        self.members.insert(symbol_index, accessor);
        Ok(())
    }

    pub fn member_accessor(&self, index: SymbolIndex) -> Option<&dyn MemberAccessor> {
        self.members.get(&index).map(|b| b.as_ref())
    }

    pub fn bound_type(&self, index: SymbolIndex) -> Option<TypeId> {
        self.bound_types.get(&index).copied()
    }

    fn symbol_mut(&mut self, index: SymbolIndex) -> ScriptResult<&mut Symbol> {
        self.symbols
            .get_mut(index.0 as usize)
            .ok_or(ScriptError::IndexOutOfRange {
                symbol: index,
                index: index.0 as usize,
                count: self.symbols.len() as u32,
            })
    }

    pub fn get_int(&self, index: SymbolIndex, subscript: usize) -> ScriptResult<i32> {
        match self.find_symbol_by_index(index).map(|s| &s.value) {
            Some(SymbolValue::Ints(values)) => values.get(subscript).copied().ok_or(
                ScriptError::IndexOutOfRange {
                    symbol: index,
                    index: subscript,
                    count: values.len() as u32,
                },
            ),
            _ => Err(ScriptError::WrongValueKind(index)),
        }
    }

    pub fn set_int(&mut self, index: SymbolIndex, subscript: usize, value: i32) -> ScriptResult<()> {
        let symbol = self.symbol_mut(index)?;
        match &mut symbol.value {
            SymbolValue::Ints(values) => {
                let slot = values
                    .get_mut(subscript)
                    .ok_or(ScriptError::IndexOutOfRange {
                        symbol: index,
                        index: subscript,
                        count: values.len() as u32,
                    })?;
                *slot = value;
                Ok(())
            }
            _ => Err(ScriptError::WrongValueKind(index)),
        }
    }

    pub fn get_float(&self, index: SymbolIndex, subscript: usize) -> ScriptResult<f32> {
        match self.find_symbol_by_index(index).map(|s| &s.value) {
            Some(SymbolValue::Floats(values)) => values.get(subscript).copied().ok_or(
                ScriptError::IndexOutOfRange {
                    symbol: index,
                    index: subscript,
                    count: values.len() as u32,
                },
            ),
            _ => Err(ScriptError::WrongValueKind(index)),
        }
    }

    pub fn set_float(&mut self, index: SymbolIndex, subscript: usize, value: f32) -> ScriptResult<()> {
        let symbol = self.symbol_mut(index)?;
        match &mut symbol.value {
            SymbolValue::Floats(values) => {
                let slot = values
                    .get_mut(subscript)
                    .ok_or(ScriptError::IndexOutOfRange {
                        symbol: index,
                        index: subscript,
                        count: values.len() as u32,
                    })?;
                *slot = value;
                Ok(())
            }
            _ => Err(ScriptError::WrongValueKind(index)),
        }
    }

    pub fn get_string(&self, index: SymbolIndex, subscript: usize) -> ScriptResult<String> {
        match self.find_symbol_by_index(index).map(|s| &s.value) {
            Some(SymbolValue::Strings(values)) => values.get(subscript).cloned().ok_or(
                ScriptError::IndexOutOfRange {
                    symbol: index,
                    index: subscript,
                    count: values.len() as u32,
                },
            ),
            _ => Err(ScriptError::WrongValueKind(index)),
        }
    }

    pub fn set_string(
        &mut self,
        index: SymbolIndex,
        subscript: usize,
        value: String,
    ) -> ScriptResult<()> {
        let symbol = self.symbol_mut(index)?;
        match &mut symbol.value {
            SymbolValue::Strings(values) => {
                let slot = values
                    .get_mut(subscript)
                    .ok_or(ScriptError::IndexOutOfRange {
                        symbol: index,
                        index: subscript,
                        count: values.len() as u32,
                    })?;
                *slot = value;
                Ok(())
            }
            _ => Err(ScriptError::WrongValueKind(index)),
        }
    }

    pub fn get_instance(&self, index: SymbolIndex) -> ScriptResult<Option<crate::value::InstanceHandle>> {
        match self.find_symbol_by_index(index).map(|s| &s.value) {
            Some(SymbolValue::Instance(handle)) => Ok(handle.clone()),
            _ => Err(ScriptError::WrongValueKind(index)),
        }
    }

    pub fn set_instance(
        &mut self,
        index: SymbolIndex,
        handle: Option<crate::value::InstanceHandle>,
    ) -> ScriptResult<()> {
        let symbol = self.symbol_mut(index)?;
        match &mut symbol.value {
            SymbolValue::Instance(slot) => {
                *slot = handle;
                Ok(())
            }
            other @ SymbolValue::None => {
                *other = SymbolValue::Instance(handle);
                Ok(())
            }
            _ => Err(ScriptError::WrongValueKind(index)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_symbol(buf: &mut Vec<u8>, name: Option<&str>, data_type: u32, value: i32) {
        buf.extend_from_slice(&(name.is_some() as u32).to_le_bytes());
        if let Some(name) = name {
            for b in name.bytes() {
                buf.push(b ^ 0xFF);
            }
            buf.push(0xFF);
        }
        buf.extend_from_slice(&0u32.to_le_bytes()); // offset_as_member
        let bit_packed = 1u32 | (data_type << 12);
        buf.extend_from_slice(&bit_packed.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes()); // file_index
        buf.extend_from_slice(&0u32.to_le_bytes()); // line_start
        buf.extend_from_slice(&0u32.to_le_bytes()); // line_count
        buf.extend_from_slice(&0u32.to_le_bytes()); // char_start
        buf.extend_from_slice(&0u32.to_le_bytes()); // char_count
        buf.extend_from_slice(&value.to_le_bytes()); // one i32 value slot
        buf.extend_from_slice(&0u32.to_le_bytes()); // parent
    }

    #[test]
    fn loads_image_with_one_int_symbol_and_finds_it() {
        let mut buf = Vec::new();
        buf.push(0); // version magic
        buf.extend_from_slice(&1u32.to_le_bytes()); // symbol_count
        buf.extend_from_slice(&0u32.to_le_bytes()); // sort index
        write_symbol(&mut buf, Some("MY_GLOBAL"), DataType::Int as u32, 99);
        buf.extend_from_slice(&0u32.to_le_bytes()); // code_size

        let image = ScriptImage::load(buf).unwrap();
        let symbol = image.find_symbol_by_name("MY_GLOBAL").unwrap();
        assert_eq!(symbol.data_type, DataType::Int);
        match &symbol.value {
            SymbolValue::Ints(v) => assert_eq!(v, &[99]),
            other => panic!("unexpected value: {other:?}"),
        }
        assert!(image.find_symbol_by_name(FAKE_STRINGS_NAME).is_some());
    }

    #[test]
    fn register_class_rejects_non_class_symbol() {
        let mut buf = Vec::new();
        buf.push(0);
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        write_symbol(&mut buf, Some("MY_GLOBAL"), DataType::Int as u32, 1);
        buf.extend_from_slice(&0u32.to_le_bytes());

        struct Host;
        let mut image = ScriptImage::load(buf).unwrap();
        assert!(image.register_class::<Host>("MY_GLOBAL").is_err());
    }

    #[test]
    fn unknown_symbol_name_fails() {
        let mut buf = Vec::new();
        buf.push(0);
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());

        let image = ScriptImage::load(buf).unwrap();
        assert!(matches!(
            image.find_symbol_by_name("NOPE"),
            None
        ));
    }
}
