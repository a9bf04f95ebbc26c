/// The logical type of one archive entry. Shared by all three physical
/// encodings even though only BIN_SAFE carries an explicit on-disk tag for
/// it; ASCII spells it out as a keyword, BINARY has no tag at all and relies
/// on the caller invoking the correctly-typed reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    String,
    Int,
    Float,
    Byte,
    Word,
    Bool,
    Vec3,
    Color,
    Raw,
    RawFloat,
    Enum,
    Hash,
}

impl EntryType {
    /// ASCII's entry type keyword, as it appears before the `:` in
    /// `name=keyword:payload`.
    pub fn ascii_keyword(self) -> &'static str {
        match self {
            EntryType::String => "string",
            EntryType::Int => "int",
            EntryType::Float => "float",
            EntryType::Byte => "byte",
            EntryType::Word => "word",
            EntryType::Bool => "bool",
            EntryType::Vec3 => "vec3",
            EntryType::Color => "color",
            EntryType::Raw => "raw",
            EntryType::RawFloat => "rawFloat",
            EntryType::Enum => "enum",
            EntryType::Hash => "hash",
        }
    }

    /// BIN_SAFE's on-disk type tag byte.
    pub fn binsafe_tag(self) -> u8 {
        match self {
            EntryType::String => 0x01,
            EntryType::Int => 0x02,
            EntryType::Float => 0x03,
            EntryType::Byte => 0x04,
            EntryType::Word => 0x05,
            EntryType::Bool => 0x06,
            EntryType::Vec3 => 0x07,
            EntryType::Color => 0x08,
            EntryType::Raw => 0x09,
            EntryType::RawFloat => 0x10,
            EntryType::Enum => 0x11,
            EntryType::Hash => 0x12,
        }
    }

    pub fn from_binsafe_tag(tag: u8) -> Option<EntryType> {
        Some(match tag {
            0x01 => EntryType::String,
            0x02 => EntryType::Int,
            0x03 => EntryType::Float,
            0x04 => EntryType::Byte,
            0x05 => EntryType::Word,
            0x06 => EntryType::Bool,
            0x07 => EntryType::Vec3,
            0x08 => EntryType::Color,
            0x09 => EntryType::Raw,
            0x10 => EntryType::RawFloat,
            0x11 => EntryType::Enum,
            0x12 => EntryType::Hash,
            _ => return None,
        })
    }

    /// Fixed on-disk payload size for every BIN_SAFE type except the
    /// variable-length `String`/`Raw`/`RawFloat`, which are preceded by a
    /// `u16` size instead.
    pub fn fixed_binsafe_size(self) -> Option<u16> {
        match self {
            EntryType::Int | EntryType::Float | EntryType::Enum | EntryType::Bool
            | EntryType::Color | EntryType::Hash => Some(4),
            EntryType::Byte => Some(1),
            EntryType::Word => Some(2),
            EntryType::Vec3 => Some(12),
            EntryType::String | EntryType::Raw | EntryType::RawFloat => None,
        }
    }
}

/// An axis-aligned bounding box, read as two back-to-back `vec3`s in every
/// encoding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: [f32; 3],
    pub max: [f32; 3],
}
