use zengin_script::{DataType, ScriptImage, SymbolValue};

fn write_symbol(buf: &mut Vec<u8>, name: &str, data_type: u32, values: &[i32]) {
    buf.extend_from_slice(&1u32.to_le_bytes());
    for b in name.bytes() {
        buf.push(b ^ 0xFF);
    }
    buf.push(0xFF);
    buf.extend_from_slice(&0u32.to_le_bytes()); // offset_as_member
    let bit_packed = (values.len() as u32) | (data_type << 12);
    buf.extend_from_slice(&bit_packed.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes()); // file_index
    buf.extend_from_slice(&0u32.to_le_bytes()); // line_start
    buf.extend_from_slice(&0u32.to_le_bytes()); // line_count
    buf.extend_from_slice(&0u32.to_le_bytes()); // char_start
    buf.extend_from_slice(&0u32.to_le_bytes()); // char_count
    for v in values {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    buf.extend_from_slice(&0u32.to_le_bytes()); // parent
}

#[test]
fn by_index_and_by_name_agree_after_load() {
    let mut buf = Vec::new();
    buf.push(0);
    buf.extend_from_slice(&2u32.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(&1u32.to_le_bytes());
    write_symbol(&mut buf, "FIRST", DataType::Int as u32, &[1]);
    write_symbol(&mut buf, "SECOND", DataType::Int as u32, &[2, 3]);
    buf.extend_from_slice(&0u32.to_le_bytes());

    let image = ScriptImage::load(buf).expect("well-formed image loads");

    for symbol in image.symbols() {
        if symbol.generated {
            continue;
        }
        let by_index = image.find_symbol_by_index(symbol.index).unwrap();
        assert_eq!(by_index.name, symbol.name);
        let by_name = image.find_symbol_by_name(&symbol.name).unwrap();
        assert_eq!(by_name.index, symbol.index);
    }

    let second = image.find_symbol_by_name("SECOND").unwrap();
    match &second.value {
        SymbolValue::Ints(values) => assert_eq!(values, &[2, 3]),
        other => panic!("unexpected value: {other:?}"),
    }
}
