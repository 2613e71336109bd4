// Cinder runtime: bytecode loader, disassembler and the stack VM.

pub mod bytecode;
pub mod heap;
pub mod runtime;
pub mod vm;

pub use bytecode::{BytecodeImage, OpCode};
pub use heap::HEAP_START;
pub use runtime::{RunConfig, Runtime, RuntimeError};
pub use vm::{Vm, VmError};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
