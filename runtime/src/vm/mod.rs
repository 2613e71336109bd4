mod error;
mod interpreter;
mod io;

pub use error::{VmError, VmResult};
pub use interpreter::{Vm, VmStats};
pub use io::{format_float, CaptureIo, ConsoleIo, VmIo};
