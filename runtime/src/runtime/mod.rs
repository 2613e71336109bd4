mod config;
mod executor;

pub use config::RunConfig;
pub use executor::Runtime;

use crate::bytecode::LoadError;
use crate::vm::VmError;
use thiserror::Error;

/// Errors surfaced by the runtime front end.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("VM error: {0}")]
    Vm(#[from] VmError),

    #[error("Bytecode loading error: {0}")]
    Load(#[from] LoadError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
