pub mod error;
pub mod exception;
pub mod external;
pub mod flags;
pub mod frame;
pub mod guard;
pub mod stack;
pub mod vm;

pub use error::{VmError, VmResult};
pub use exception::{lenient_exception_handler, ExceptionHandler, ExceptionStrategy};
pub use external::{ExternalFn, ExternalSignature, HostType};
pub use flags::ExecutionFlags;
pub use frame::{CallFrame, OperandFrame, RuntimeValue};
pub use guard::StackGuard;
pub use stack::{CallStack, OperandStack, DEFAULT_CALL_CAP, DEFAULT_STACK_CAP};
pub use vm::{DaedalusVM, DaedalusVmBuilder};
