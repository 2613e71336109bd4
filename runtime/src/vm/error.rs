use crate::heap::HeapError;
use thiserror::Error;

/// Runtime error taxonomy. Every variant halts the VM; the message is
/// the single line reported to the user.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VmError {
    #[error("Stack underflow")]
    StackUnderflow,

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Modulo by zero")]
    ModuloByZero,

    #[error("FPU division by zero")]
    FpuDivisionByZero,

    #[error("Negative memory address")]
    NegativeAddress,

    #[error("Memory access out of bounds")]
    MemoryOutOfBounds,

    #[error("Heap memory access out of bounds")]
    HeapOutOfBounds,

    #[error("FPU memory access out of bounds")]
    FloatMemoryOutOfBounds,

    #[error("BP-relative access out of bounds")]
    BpOutOfBounds,

    #[error("Invalid base pointer in POP_BP")]
    InvalidBasePointer,

    #[error("Return without call")]
    ReturnWithoutCall,

    #[error("Invalid string ID")]
    InvalidStringId,

    #[error("Invalid allocation size")]
    InvalidAllocationSize,

    #[error("Heap allocation failed")]
    AllocationFailed,

    #[error("Invalid address for free")]
    InvalidFree,

    #[error("Unknown opcode: 0x{0:02X}")]
    UnknownOpcode(u8),

    #[error("Unexpected end of bytecode")]
    UnexpectedEndOfBytecode,

    #[error("Instruction pointer out of bounds")]
    InstructionPointerOutOfBounds,
}

impl From<HeapError> for VmError {
    fn from(err: HeapError) -> Self {
        match err {
            HeapError::OutOfBounds => VmError::HeapOutOfBounds,
            HeapError::InvalidFree => VmError::InvalidFree,
        }
    }
}

pub type VmResult<T> = Result<T, VmError>;
