pub mod bridge;
pub mod error;
pub mod ids;
pub mod image;
pub mod instr;
pub mod symbol;
pub mod value;

pub use bridge::{ClosureMember, MemberAccessor, MemberValue};
pub use error::{ScriptError, ScriptResult};
pub use ids::SymbolIndex;
pub use image::ScriptImage;
pub use instr::{decode_at, Instruction, Opcode};
pub use symbol::{SourceLocation, Symbol};
pub use value::{DataType, InstanceHandle, SymbolFlags, SymbolValue};
