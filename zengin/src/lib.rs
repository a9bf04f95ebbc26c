//! Facade over the four workspace crates that make up the Daedalus script
//! runtime and the ZenGin archive reader: re-exports their public types
//! behind one dependency and hosts the end-to-end tests that exercise them
//! together. Does not install a logging backend itself — that is the host
//! process's job, same as any library built on the `log` facade.

pub use zengin_archive::{
    archive_open, ArchiveError, ArchiveFormat, ArchiveHeader, ArchiveReader, ArchiveResult,
    AsciiArchiveReader, BinSafeArchiveReader, BinaryArchiveReader, BoundingBox, EntryType,
    ObjectDescriptor,
};
pub use zengin_byteio::{ByteIoError, ByteIoResult, ByteReader};
pub use zengin_script::{
    decode_at, ClosureMember, DataType, Instruction, InstanceHandle, MemberAccessor, MemberValue,
    Opcode, ScriptError, ScriptImage, ScriptResult, SourceLocation, Symbol, SymbolFlags,
    SymbolIndex, SymbolValue,
};
pub use zengin_vm::{
    lenient_exception_handler, CallFrame, CallStack, DaedalusVM, DaedalusVmBuilder,
    ExceptionHandler, ExceptionStrategy, ExecutionFlags, ExternalFn, ExternalSignature, HostType,
    OperandFrame, RuntimeValue, StackGuard, VmError, VmResult,
};
