//! File-execute front end used by the `cindervm` binary.

use crate::bytecode;
use crate::runtime::{RunConfig, RuntimeResult};
use crate::vm::Vm;
use std::path::Path;

pub struct Runtime {
    config: RunConfig,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_config(RunConfig::default())
    }

    pub fn with_config(config: RunConfig) -> Self {
        Self { config }
    }

    /// Load a bytecode file and run it to completion. Post-run dumps
    /// and statistics are skipped when execution fails.
    pub fn execute_file<P: AsRef<Path>>(&self, path: P) -> RuntimeResult<()> {
        let image = bytecode::load_file(path)?;

        let mut vm = Vm::new();
        vm.set_debug(self.config.debug);
        vm.load_image(image);
        vm.run()?;

        if self.config.dump_stack {
            print!("{}", vm.dump_stack());
        }
        if self.config.dump_memory {
            print!("{}", vm.dump_memory());
        }
        if self.config.stats {
            print!("{}", vm.stats());
        }
        Ok(())
    }

    /// Load a bytecode file and render its listing without executing.
    pub fn disassemble_file<P: AsRef<Path>>(path: P) -> RuntimeResult<String> {
        let image = bytecode::load_file(path)?;
        Ok(bytecode::format_listing(&image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{assemble, write_file, BytecodeImage, OpCode, Operand};
    use crate::runtime::RuntimeError;

    fn write_sample(code: Vec<u8>) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let image = BytecodeImage::new(Vec::new(), code);
        write_file(&image, dir.path().join("sample.ash")).unwrap();
        dir
    }

    #[test]
    fn test_execute_valid_file() {
        let dir = write_sample(assemble(&[
            (OpCode::Push, Some(Operand::Int(1))),
            (OpCode::Pop, None),
            (OpCode::Halt, None),
        ]));
        let runtime = Runtime::new();
        assert!(runtime.execute_file(dir.path().join("sample.ash")).is_ok());
    }

    #[test]
    fn test_execute_missing_file() {
        let runtime = Runtime::new();
        let result = runtime.execute_file("/no/such/file.ash");
        assert!(matches!(result, Err(RuntimeError::Load(_))));
    }

    #[test]
    fn test_runtime_error_propagates() {
        let dir = write_sample(assemble(&[
            (OpCode::Push, Some(Operand::Int(1))),
            (OpCode::Push, Some(Operand::Int(0))),
            (OpCode::Div, None),
            (OpCode::Halt, None),
        ]));
        let runtime = Runtime::new();
        let result = runtime.execute_file(dir.path().join("sample.ash"));
        match result {
            Err(RuntimeError::Vm(e)) => assert_eq!(e.to_string(), "Division by zero"),
            other => panic!("expected VM error, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_disassemble_file() {
        let dir = write_sample(assemble(&[
            (OpCode::Push, Some(Operand::Int(7))),
            (OpCode::Halt, None),
        ]));
        let listing = Runtime::disassemble_file(dir.path().join("sample.ash")).unwrap();
        assert!(listing.contains("PUSH 7"));
        assert!(listing.contains("HALT"));
    }
}
