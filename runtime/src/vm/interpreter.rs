//! The virtual machine: a stack interpreter with segmented memory, an
//! x87-style circular FPU register stack, and a first-fit heap.

use crate::bytecode::{BytecodeImage, OpCode};
use crate::heap::{Heap, HEAP_START};
use crate::vm::error::{VmError, VmResult};
use crate::vm::io::{ConsoleIo, VmIo};
use std::fmt;
use std::fmt::Write;

#[derive(Debug, Clone, Copy)]
struct CallFrame {
    return_address: usize,
    base_pointer: usize,
}

/// Execution counters reported by `--stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmStats {
    pub instructions: u64,
    pub max_stack_depth: usize,
    pub static_cells: usize,
    pub heap_cells: usize,
    pub allocated_blocks: usize,
    pub free_blocks: usize,
}

impl fmt::Display for VmStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== VM Statistics ===")?;
        writeln!(f, "Instructions executed: {}", self.instructions)?;
        writeln!(f, "Max stack depth: {}", self.max_stack_depth)?;
        writeln!(f, "Static memory allocated: {} cells", self.static_cells)?;
        writeln!(f, "Heap size: {} cells", self.heap_cells)?;
        writeln!(
            f,
            "Heap blocks: {} ({} allocated, {} free)",
            self.allocated_blocks + self.free_blocks,
            self.allocated_blocks,
            self.free_blocks
        )
    }
}

pub struct Vm {
    // Loaded image
    code: Vec<u8>,
    string_table: Vec<String>,

    // Execution state
    ip: usize,
    halted: bool,
    error: Option<VmError>,
    debug: bool,

    stack: Vec<i32>,
    memory: Vec<i32>,
    call_stack: Vec<CallFrame>,
    base_pointer: usize,
    heap: Heap,
    cmp_flag: i32,

    // FPU: circular 8-slot register stack plus its own memory space.
    fpu_regs: [f32; 8],
    fpu_top: usize,
    float_memory: Vec<f32>,

    instruction_count: u64,
    max_stack_depth: usize,

    io: Box<dyn VmIo>,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    pub fn new() -> Self {
        Self::with_io(Box::new(ConsoleIo::new()))
    }

    pub fn with_io(io: Box<dyn VmIo>) -> Self {
        Self {
            code: Vec::new(),
            string_table: Vec::new(),
            ip: 0,
            halted: false,
            error: None,
            debug: false,
            stack: Vec::new(),
            memory: vec![0; 1024],
            call_stack: Vec::new(),
            base_pointer: 0,
            heap: Heap::new(),
            cmp_flag: 0,
            fpu_regs: [0.0; 8],
            fpu_top: 0,
            float_memory: vec![0.0; 1024],
            instruction_count: 0,
            max_stack_depth: 0,
            io,
        }
    }

    pub fn set_debug(&mut self, enabled: bool) {
        self.debug = enabled;
    }

    /// Install a bytecode image. Resets all execution state.
    pub fn load_image(&mut self, image: BytecodeImage) {
        self.code = image.code;
        self.string_table = image.strings;
        self.reset();
    }

    /// Restore everything except the loaded code and string table to
    /// its initial state.
    pub fn reset(&mut self) {
        self.ip = 0;
        self.halted = false;
        self.error = None;
        self.stack.clear();
        self.memory.iter_mut().for_each(|c| *c = 0);
        self.call_stack.clear();
        self.base_pointer = 0;
        self.heap.reset();
        self.cmp_flag = 0;
        self.fpu_regs = [0.0; 8];
        self.fpu_top = 0;
        self.float_memory.iter_mut().for_each(|c| *c = 0.0);
        self.instruction_count = 0;
        self.max_stack_depth = 0;
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn error(&self) -> Option<&VmError> {
        self.error.as_ref()
    }

    pub fn stack(&self) -> &[i32] {
        &self.stack
    }

    pub fn string_table(&self) -> &[String] {
        &self.string_table
    }

    pub fn fpu_top(&self) -> usize {
        self.fpu_top
    }

    pub fn stats(&self) -> VmStats {
        VmStats {
            instructions: self.instruction_count,
            max_stack_depth: self.max_stack_depth,
            static_cells: self.memory.len(),
            heap_cells: self.heap.cell_count(),
            allocated_blocks: self.heap.allocated_block_count(),
            free_blocks: self.heap.free_block_count(),
        }
    }

    /// Run until HALT or an error halts the machine.
    pub fn run(&mut self) -> VmResult<()> {
        while !self.halted && self.error.is_none() {
            self.step();
        }
        match &self.error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    /// Execute a single instruction.
    pub fn step(&mut self) {
        if self.halted || self.error.is_some() {
            return;
        }
        if self.ip >= self.code.len() {
            self.fail(VmError::InstructionPointerOutOfBounds);
            return;
        }

        if let Err(e) = self.execute_instruction() {
            self.fail(e);
            return;
        }

        self.instruction_count += 1;
        if self.stack.len() > self.max_stack_depth {
            self.max_stack_depth = self.stack.len();
        }
    }

    fn fail(&mut self, error: VmError) {
        self.error = Some(error);
        self.halted = true;
    }

    fn execute_instruction(&mut self) -> VmResult<()> {
        let start_ip = self.ip;
        let byte = self.read_byte()?;
        let op = OpCode::from_byte(byte).ok_or(VmError::UnknownOpcode(byte))?;

        if self.debug {
            println!("[{}] {}", start_ip, op);
        }

        match op {
            OpCode::Push => {
                let value = self.read_i32()?;
                self.stack.push(value);
            }
            OpCode::Pop => {
                self.pop()?;
            }
            OpCode::Add => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.stack.push(a.wrapping_add(b));
            }
            OpCode::Sub => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.stack.push(a.wrapping_sub(b));
            }
            OpCode::Mul => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.stack.push(a.wrapping_mul(b));
            }
            OpCode::Div => {
                let b = self.pop()?;
                let a = self.pop()?;
                if b == 0 {
                    return Err(VmError::DivisionByZero);
                }
                self.stack.push(a.wrapping_div(b));
            }
            OpCode::Mod => {
                let b = self.pop()?;
                let a = self.pop()?;
                if b == 0 {
                    return Err(VmError::ModuloByZero);
                }
                self.stack.push(a.wrapping_rem(b));
            }
            OpCode::Dup => {
                let value = self.peek();
                self.stack.push(value);
            }
            OpCode::Swap => {
                if self.stack.len() < 2 {
                    return Err(VmError::StackUnderflow);
                }
                let a = self.pop()?;
                let b = self.pop()?;
                self.stack.push(a);
                self.stack.push(b);
            }

            OpCode::Print => {
                let value = self.pop()?;
                self.io.print_int(value);
            }
            OpCode::PrintStr => {
                let id = self.pop()?;
                let s = self
                    .string_table
                    .get(usize::try_from(id).map_err(|_| VmError::InvalidStringId)?)
                    .ok_or(VmError::InvalidStringId)?
                    .clone();
                self.io.print_str(&s);
            }
            OpCode::Input => {
                let value = self.io.read_int();
                self.stack.push(value);
            }
            OpCode::InputStr => {
                let line = self.io.read_line();
                self.string_table.push(line);
                self.stack.push((self.string_table.len() - 1) as i32);
            }
            OpCode::PushStr => {
                let id = self.read_i32()?;
                self.stack.push(id);
            }

            OpCode::Jmp => {
                let addr = self.read_i32()?;
                self.ip = addr as usize;
            }
            OpCode::Jz => {
                let addr = self.read_i32()?;
                let value = self.pop()?;
                if value == 0 {
                    self.ip = addr as usize;
                }
            }
            OpCode::Jnz => {
                let addr = self.read_i32()?;
                let value = self.pop()?;
                if value != 0 {
                    self.ip = addr as usize;
                }
            }
            OpCode::Cmp => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.cmp_flag = match a.cmp(&b) {
                    std::cmp::Ordering::Less => -1,
                    std::cmp::Ordering::Greater => 1,
                    std::cmp::Ordering::Equal => 0,
                };
            }
            OpCode::Jl => {
                let addr = self.read_i32()?;
                if self.cmp_flag < 0 {
                    self.ip = addr as usize;
                }
            }
            OpCode::Jg => {
                let addr = self.read_i32()?;
                if self.cmp_flag > 0 {
                    self.ip = addr as usize;
                }
            }
            OpCode::Jle => {
                let addr = self.read_i32()?;
                if self.cmp_flag <= 0 {
                    self.ip = addr as usize;
                }
            }
            OpCode::Jge => {
                let addr = self.read_i32()?;
                if self.cmp_flag >= 0 {
                    self.ip = addr as usize;
                }
            }

            OpCode::Call => {
                let addr = self.read_i32()?;
                self.call_stack.push(CallFrame {
                    return_address: self.ip,
                    base_pointer: self.base_pointer,
                });
                self.ip = addr as usize;
            }
            OpCode::Ret => {
                let frame = self.call_stack.pop().ok_or(VmError::ReturnWithoutCall)?;
                self.ip = frame.return_address;
                self.base_pointer = frame.base_pointer;
            }
            OpCode::PushBp => {
                self.stack.push(self.base_pointer as i32);
                self.base_pointer = self.stack.len();
            }
            OpCode::PopBp => {
                // Reads the saved BP without popping; the caller's
                // post-call cleanup discards the slot.
                if self.base_pointer == 0 || self.base_pointer > self.stack.len() {
                    return Err(VmError::InvalidBasePointer);
                }
                self.base_pointer = self.stack[self.base_pointer - 1] as usize;
            }

            OpCode::Load => {
                let addr = self.read_i32()?;
                let value = self.load_memory(addr)?;
                self.stack.push(value);
            }
            OpCode::Store => {
                let addr = self.pop()?;
                let value = self.pop()?;
                self.store_memory(addr, value)?;
            }
            OpCode::LoadBp => {
                let offset = self.read_i32()?;
                let addr = self.base_pointer as i64 + offset as i64;
                if addr < 0 || addr >= self.stack.len() as i64 {
                    return Err(VmError::BpOutOfBounds);
                }
                self.stack.push(self.stack[addr as usize]);
            }
            OpCode::StoreBp => {
                let offset = self.read_i32()?;
                let value = self.pop()?;
                let addr = self.base_pointer as i64 + offset as i64;
                if addr < 0 {
                    return Err(VmError::BpOutOfBounds);
                }
                let addr = addr as usize;
                if addr >= self.stack.len() {
                    self.stack.resize(addr + 1, 0);
                }
                self.stack[addr] = value;
            }
            OpCode::LoadIndirect => {
                let addr = self.pop()?;
                let value = self.load_memory(addr)?;
                self.stack.push(value);
            }
            OpCode::StoreIndirect => {
                let addr = self.pop()?;
                let value = self.pop()?;
                self.store_memory(addr, value)?;
            }

            OpCode::Alloc => {
                let size = self.pop()?;
                if size <= 0 {
                    return Err(VmError::InvalidAllocationSize);
                }
                let start = self.heap.alloc(size as usize);
                let addr = HEAP_START as i64 + start as i64;
                if addr + size as i64 > i32::MAX as i64 {
                    return Err(VmError::AllocationFailed);
                }
                self.stack.push(addr as i32);
            }
            OpCode::Free => {
                let addr = self.pop()?;
                if addr < HEAP_START {
                    return Err(VmError::InvalidFree);
                }
                self.heap.free((addr - HEAP_START) as usize)?;
            }

            OpCode::Fpush => {
                let value = self.read_f32()?;
                self.fpush(value);
            }
            OpCode::Fpop => {
                self.fpop();
            }
            OpCode::Fadd => {
                let b = self.fpop();
                let a = self.fpop();
                self.fpush(a + b);
            }
            OpCode::Fsub => {
                let b = self.fpop();
                let a = self.fpop();
                self.fpush(a - b);
            }
            OpCode::Fmul => {
                let b = self.fpop();
                let a = self.fpop();
                self.fpush(a * b);
            }
            OpCode::Fdiv => {
                let b = self.fpop();
                let a = self.fpop();
                if b == 0.0 {
                    return Err(VmError::FpuDivisionByZero);
                }
                self.fpush(a / b);
            }
            OpCode::Fload => {
                let addr = self.read_i32()?;
                if addr < 0 {
                    return Err(VmError::NegativeAddress);
                }
                let value = self
                    .float_memory
                    .get(addr as usize)
                    .copied()
                    .ok_or(VmError::FloatMemoryOutOfBounds)?;
                self.fpush(value);
            }
            OpCode::Fstore => {
                let addr = self.read_i32()?;
                let value = self.fpop();
                if addr < 0 {
                    return Err(VmError::NegativeAddress);
                }
                let addr = addr as usize;
                if addr >= self.float_memory.len() {
                    self.float_memory.resize(addr + 256, 0.0);
                }
                self.float_memory[addr] = value;
            }
            OpCode::Fprint => {
                let value = self.fpop();
                self.io.print_float(value);
            }
            OpCode::Fcmp => {
                let b = self.fpop();
                let a = self.fpop();
                self.cmp_flag = if a < b {
                    -1
                } else if a > b {
                    1
                } else {
                    0
                };
            }
            OpCode::Fneg => {
                let value = self.fpop();
                self.fpush(-value);
            }
            OpCode::Fdup => {
                let value = self.fpeek();
                self.fpush(value);
            }
            OpCode::IntToFp => {
                let value = self.pop()?;
                self.fpush(value as f32);
            }
            OpCode::FpToInt => {
                let value = self.fpop();
                self.stack.push(value as i32);
            }

            OpCode::Halt => {
                self.halted = true;
            }
        }

        Ok(())
    }

    // ----- stack helpers -----

    fn pop(&mut self) -> VmResult<i32> {
        self.stack.pop().ok_or(VmError::StackUnderflow)
    }

    fn peek(&self) -> i32 {
        self.stack.last().copied().unwrap_or(0)
    }

    // ----- segmented memory -----

    fn load_memory(&self, addr: i32) -> VmResult<i32> {
        if addr < 0 {
            return Err(VmError::NegativeAddress);
        }
        if addr >= HEAP_START {
            return Ok(self.heap.load((addr - HEAP_START) as usize)?);
        }
        self.memory
            .get(addr as usize)
            .copied()
            .ok_or(VmError::MemoryOutOfBounds)
    }

    fn store_memory(&mut self, addr: i32, value: i32) -> VmResult<()> {
        if addr < 0 {
            return Err(VmError::NegativeAddress);
        }
        if addr >= HEAP_START {
            self.heap.store((addr - HEAP_START) as usize, value);
            return Ok(());
        }
        let addr = addr as usize;
        if addr >= self.memory.len() {
            self.memory.resize(addr + 1024, 0);
        }
        self.memory[addr] = value;
        Ok(())
    }

    // ----- bytecode reading -----

    fn read_byte(&mut self) -> VmResult<u8> {
        let byte = *self
            .code
            .get(self.ip)
            .ok_or(VmError::UnexpectedEndOfBytecode)?;
        self.ip += 1;
        Ok(byte)
    }

    fn read_i32(&mut self) -> VmResult<i32> {
        if self.ip + 4 > self.code.len() {
            return Err(VmError::UnexpectedEndOfBytecode);
        }
        let bytes: [u8; 4] = self.code[self.ip..self.ip + 4].try_into().unwrap();
        self.ip += 4;
        Ok(i32::from_le_bytes(bytes))
    }

    fn read_f32(&mut self) -> VmResult<f32> {
        if self.ip + 4 > self.code.len() {
            return Err(VmError::UnexpectedEndOfBytecode);
        }
        let bytes: [u8; 4] = self.code[self.ip..self.ip + 4].try_into().unwrap();
        self.ip += 4;
        Ok(f32::from_le_bytes(bytes))
    }

    // ----- FPU circular register stack -----

    fn fpush(&mut self, value: f32) {
        self.fpu_top = (self.fpu_top + 8 - 1) % 8;
        self.fpu_regs[self.fpu_top] = value;
    }

    fn fpop(&mut self) -> f32 {
        let value = self.fpu_regs[self.fpu_top];
        self.fpu_regs[self.fpu_top] = 0.0;
        self.fpu_top = (self.fpu_top + 1) % 8;
        value
    }

    fn fpeek(&self) -> f32 {
        self.fpu_regs[self.fpu_top]
    }

    // ----- diagnostics -----

    /// Stack listing, top first, with the base pointer marked.
    pub fn dump_stack(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== Stack Dump ===");
        let _ = writeln!(out, "Size: {}", self.stack.len());
        if self.stack.is_empty() {
            let _ = writeln!(out, "(empty)");
            return out;
        }
        for i in (0..self.stack.len()).rev() {
            let marker = if i == self.base_pointer { " <-- BP" } else { "" };
            let _ = writeln!(out, "[{}] {}{}", i, self.stack[i], marker);
        }
        out
    }

    /// Non-zero static memory cells.
    pub fn dump_memory(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== Memory Dump ===");
        let mut has_data = false;
        for (i, &value) in self.memory.iter().enumerate() {
            if value != 0 {
                has_data = true;
                let _ = writeln!(out, "[{}] = {}", i, value);
            }
        }
        if !has_data {
            let _ = writeln!(out, "(all zeros)");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{assemble, Operand};
    use crate::vm::io::CaptureIo;
    use OpCode::*;

    fn int(v: i32) -> Option<Operand> {
        Some(Operand::Int(v))
    }

    fn float(v: f32) -> Option<Operand> {
        Some(Operand::Float(v))
    }

    fn make_vm(instrs: &[(OpCode, Option<Operand>)]) -> (Vm, CaptureIo) {
        make_vm_with_input(instrs, &[])
    }

    fn make_vm_with_input(
        instrs: &[(OpCode, Option<Operand>)],
        input: &[&str],
    ) -> (Vm, CaptureIo) {
        let io = CaptureIo::with_input(input);
        let mut vm = Vm::with_io(Box::new(io.clone()));
        vm.load_image(BytecodeImage::new(Vec::new(), assemble(instrs)));
        (vm, io)
    }

    fn run_ok(instrs: &[(OpCode, Option<Operand>)]) -> Vm {
        let (mut vm, _) = make_vm(instrs);
        vm.run().expect("vm error");
        vm
    }

    fn run_err(instrs: &[(OpCode, Option<Operand>)]) -> VmError {
        let (mut vm, _) = make_vm(instrs);
        vm.run().expect_err("expected vm error")
    }

    #[test]
    fn test_push_arithmetic() {
        let vm = run_ok(&[
            (Push, int(7)),
            (Push, int(5)),
            (Add, None),
            (Push, int(2)),
            (Mul, None),
            (Push, int(4)),
            (Sub, None),
            (Push, int(5)),
            (Div, None),
            (Halt, None),
        ]);
        assert_eq!(vm.stack(), &[4]); // ((7+5)*2 - 4) / 5
    }

    #[test]
    fn test_mod_and_negative_div() {
        let vm = run_ok(&[
            (Push, int(-7)),
            (Push, int(2)),
            (Div, None),
            (Push, int(7)),
            (Push, int(3)),
            (Mod, None),
            (Halt, None),
        ]);
        assert_eq!(vm.stack(), &[-3, 1]); // truncating division
    }

    #[test]
    fn test_twos_complement_wrapping() {
        let vm = run_ok(&[
            (Push, int(i32::MAX)),
            (Push, int(1)),
            (Add, None),
            (Halt, None),
        ]);
        assert_eq!(vm.stack(), &[i32::MIN]);
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(
            run_err(&[(Push, int(1)), (Push, int(0)), (Div, None)]),
            VmError::DivisionByZero
        );
        assert_eq!(
            run_err(&[(Push, int(1)), (Push, int(0)), (Mod, None)]),
            VmError::ModuloByZero
        );
    }

    #[test]
    fn test_stack_underflow() {
        assert_eq!(run_err(&[(Pop, None)]), VmError::StackUnderflow);
        assert_eq!(run_err(&[(Push, int(1)), (Swap, None)]), VmError::StackUnderflow);
    }

    #[test]
    fn test_dup_and_swap() {
        let vm = run_ok(&[
            (Push, int(1)),
            (Push, int(2)),
            (Dup, None),
            (Swap, None),
            (Halt, None),
        ]);
        assert_eq!(vm.stack(), &[1, 2, 2]);
    }

    #[test]
    fn test_conditional_jump_targets() {
        // Layout: 0:PUSH 3, 5:PUSH 5, 10:CMP, 11:JL 21, 16:PUSH 99, 21:HALT
        let vm = run_ok(&[
            (Push, int(3)),
            (Push, int(5)),
            (Cmp, None),
            (Jl, int(21)),
            (Push, int(99)),
            (Halt, None),
        ]);
        assert_eq!(vm.stack(), &[] as &[i32]); // PUSH 99 skipped
    }

    #[test]
    fn test_jz_jnz_pop_their_operand() {
        // 0:PUSH 0, 5:JZ 15, 10:PUSH 1, 15:HALT
        let vm = run_ok(&[
            (Push, int(0)),
            (Jz, int(15)),
            (Push, int(1)),
            (Halt, None),
        ]);
        assert_eq!(vm.stack(), &[] as &[i32]);
    }

    #[test]
    fn test_call_ret_and_parameter_addressing() {
        // Calls add(2, 3) and checks the callee sees v1 at BP-3 and v2
        // at BP-2.
        //
        //  0: PUSH 2
        //  5: PUSH 3
        // 10: CALL 21
        // 15: SWAP        (cleanup)
        // 16: POP
        // 17: SWAP
        // 18: POP
        // 19: PRINT
        // 20: HALT
        // 21: PUSH_BP
        // 22: LOAD_BP -3
        // 27: LOAD_BP -2
        // 32: ADD
        // 33: POP_BP
        // 34: RET
        let (mut vm, io) = make_vm(&[
            (Push, int(2)),
            (Push, int(3)),
            (Call, int(21)),
            (Swap, None),
            (Pop, None),
            (Swap, None),
            (Pop, None),
            (Print, None),
            (Halt, None),
            (PushBp, None),
            (LoadBp, int(-3)),
            (LoadBp, int(-2)),
            (Add, None),
            (PopBp, None),
            (Ret, None),
        ]);
        vm.run().expect("vm error");
        assert_eq!(io.output(), "5");
    }

    #[test]
    fn test_ret_without_call() {
        assert_eq!(run_err(&[(Ret, None)]), VmError::ReturnWithoutCall);
    }

    #[test]
    fn test_pop_bp_with_empty_frame() {
        assert_eq!(run_err(&[(PopBp, None)]), VmError::InvalidBasePointer);
    }

    #[test]
    fn test_load_store_static_memory() {
        let vm = run_ok(&[
            (Push, int(42)),
            (Push, int(7)),   // address
            (Store, None),
            (Load, int(7)),
            (Halt, None),
        ]);
        assert_eq!(vm.stack(), &[42]);
    }

    #[test]
    fn test_store_grows_load_oob_errors() {
        // Store far beyond the initial 1024 cells succeeds...
        let vm = run_ok(&[
            (Push, int(9)),
            (Push, int(5000)),
            (Store, None),
            (Load, int(5000)),
            (Halt, None),
        ]);
        assert_eq!(vm.stack(), &[9]);
        // ...but loading an address that was never grown fails.
        assert_eq!(run_err(&[(Load, int(9999))]), VmError::MemoryOutOfBounds);
    }

    #[test]
    fn test_negative_address() {
        assert_eq!(run_err(&[(Load, int(-1))]), VmError::NegativeAddress);
    }

    #[test]
    fn test_indirect_load_store() {
        let vm = run_ok(&[
            (Push, int(11)),  // value
            (Push, int(3)),   // address
            (StoreIndirect, None),
            (Push, int(3)),
            (LoadIndirect, None),
            (Halt, None),
        ]);
        assert_eq!(vm.stack(), &[11]);
    }

    #[test]
    fn test_alloc_returns_heap_addresses() {
        let vm = run_ok(&[
            (Push, int(3)),
            (Alloc, None),
            (Push, int(2)),
            (Alloc, None),
            (Halt, None),
        ]);
        assert_eq!(vm.stack(), &[HEAP_START, HEAP_START + 3]);
    }

    #[test]
    fn test_heap_store_load_through_memory_ops() {
        let vm = run_ok(&[
            (Push, int(1)),
            (Alloc, None),        // HEAP_START on stack
            (Push, int(55)),
            (Swap, None),         // [55, addr]
            (StoreIndirect, None),
            (Load, int(HEAP_START)),
            (Halt, None),
        ]);
        assert_eq!(vm.stack(), &[55]);
    }

    #[test]
    fn test_free_and_double_free() {
        let vm = run_ok(&[
            (Push, int(2)),
            (Alloc, None),
            (Free, None),
            (Halt, None),
        ]);
        assert_eq!(vm.stats().allocated_blocks, 0);

        assert_eq!(
            run_err(&[
                (Push, int(2)),
                (Alloc, None),
                (Dup, None),
                (Free, None),
                (Free, None),
            ]),
            VmError::InvalidFree
        );
    }

    #[test]
    fn test_free_non_heap_address() {
        assert_eq!(run_err(&[(Push, int(5)), (Free, None)]), VmError::InvalidFree);
    }

    #[test]
    fn test_invalid_allocation_size() {
        assert_eq!(
            run_err(&[(Push, int(0)), (Alloc, None)]),
            VmError::InvalidAllocationSize
        );
        assert_eq!(
            run_err(&[(Push, int(-3)), (Alloc, None)]),
            VmError::InvalidAllocationSize
        );
    }

    #[test]
    fn test_fpu_arithmetic() {
        let (mut vm, io) = make_vm(&[
            (Fpush, float(1.5)),
            (Fpush, float(2.25)),
            (Fadd, None),
            (Fprint, None),
            (Halt, None),
        ]);
        vm.run().expect("vm error");
        assert_eq!(io.output(), "3.75");
    }

    #[test]
    fn test_fpu_division_by_zero() {
        assert_eq!(
            run_err(&[(Fpush, float(1.0)), (Fpush, float(0.0)), (Fdiv, None)]),
            VmError::FpuDivisionByZero
        );
    }

    #[test]
    fn test_fpu_top_stays_in_range() {
        // Push more than eight values; the register file wraps.
        let mut instrs = Vec::new();
        for i in 0..20 {
            instrs.push((Fpush, float(i as f32)));
        }
        for _ in 0..20 {
            instrs.push((Fpop, None));
        }
        instrs.push((Halt, None));
        let vm = run_ok(&instrs);
        assert!(vm.fpu_top() < 8);
    }

    #[test]
    fn test_fload_fstore_separate_space() {
        // Float memory does not alias static memory at the same index.
        let (mut vm, io) = make_vm(&[
            (Push, int(7)),
            (Push, int(0)),
            (Store, None),          // memory[0] = 7
            (Fpush, float(2.5)),
            (Fstore, int(0)),       // float_memory[0] = 2.5
            (Load, int(0)),
            (Print, None),
            (Fload, int(0)),
            (Fprint, None),
            (Halt, None),
        ]);
        vm.run().expect("vm error");
        assert_eq!(io.output(), "72.5");
    }

    #[test]
    fn test_int_float_conversions() {
        let vm = run_ok(&[
            (Push, int(3)),
            (IntToFp, None),
            (Fpush, float(0.5)),
            (Fadd, None),
            (FpToInt, None),
            (Halt, None),
        ]);
        assert_eq!(vm.stack(), &[3]); // 3.5 truncates
    }

    #[test]
    fn test_fcmp_directs_jumps() {
        // 1.5 < 2.5: JL taken over a PUSH 99.
        // 0:FPUSH, 5:FPUSH, 10:FCMP, 11:JL 21, 16:PUSH 99, 21:HALT
        let vm = run_ok(&[
            (Fpush, float(1.5)),
            (Fpush, float(2.5)),
            (Fcmp, None),
            (Jl, int(21)),
            (Push, int(99)),
            (Halt, None),
        ]);
        assert_eq!(vm.stack(), &[] as &[i32]);
    }

    #[test]
    fn test_print_and_print_str() {
        let io = CaptureIo::new();
        let mut vm = Vm::with_io(Box::new(io.clone()));
        vm.load_image(BytecodeImage::new(
            vec!["value: ".to_string()],
            assemble(&[
                (PushStr, int(0)),
                (PrintStr, None),
                (Push, int(42)),
                (Print, None),
                (Halt, None),
            ]),
        ));
        vm.run().expect("vm error");
        assert_eq!(io.output(), "value: 42");
    }

    #[test]
    fn test_invalid_string_id() {
        assert_eq!(
            run_err(&[(Push, int(3)), (PrintStr, None)]),
            VmError::InvalidStringId
        );
    }

    #[test]
    fn test_input_reads_and_recovers() {
        let (mut vm, io) = make_vm_with_input(
            &[
                (Input, None),
                (Print, None),
                (Input, None),
                (Print, None),
                (Halt, None),
            ],
            &["7", "garbage"],
        );
        vm.run().expect("vm error");
        assert_eq!(io.output(), "70");
    }

    #[test]
    fn test_input_str_appends_to_table() {
        let (mut vm, _) = make_vm_with_input(&[(InputStr, None), (Halt, None)], &["hello"]);
        vm.run().expect("vm error");
        assert_eq!(vm.stack(), &[0]);
        assert_eq!(vm.string_table(), &["hello".to_string()]);
    }

    #[test]
    fn test_unknown_opcode() {
        let io = CaptureIo::new();
        let mut vm = Vm::with_io(Box::new(io));
        vm.load_image(BytecodeImage::new(Vec::new(), vec![0x00]));
        assert_eq!(vm.run(), Err(VmError::UnknownOpcode(0x00)));
    }

    #[test]
    fn test_truncated_operand() {
        let io = CaptureIo::new();
        let mut vm = Vm::with_io(Box::new(io));
        vm.load_image(BytecodeImage::new(Vec::new(), vec![0x01, 0xAA]));
        assert_eq!(vm.run(), Err(VmError::UnexpectedEndOfBytecode));
    }

    #[test]
    fn test_running_off_the_end() {
        let io = CaptureIo::new();
        let mut vm = Vm::with_io(Box::new(io));
        vm.load_image(BytecodeImage::new(
            Vec::new(),
            assemble(&[(Push, int(1)), (Pop, None)]),
        ));
        assert_eq!(vm.run(), Err(VmError::InstructionPointerOutOfBounds));
    }

    #[test]
    fn test_stats_track_execution() {
        let vm = run_ok(&[
            (Push, int(1)),
            (Push, int(2)),
            (Push, int(3)),
            (Pop, None),
            (Pop, None),
            (Pop, None),
            (Halt, None),
        ]);
        let stats = vm.stats();
        assert_eq!(stats.instructions, 7);
        assert_eq!(stats.max_stack_depth, 3);
    }

    #[test]
    fn test_reset_preserves_image() {
        let (mut vm, _) = make_vm(&[(Push, int(5)), (Halt, None)]);
        vm.run().expect("vm error");
        assert_eq!(vm.stack(), &[5]);

        vm.reset();
        assert!(!vm.is_halted());
        assert!(vm.stack().is_empty());
        assert_eq!(vm.stats().instructions, 0);

        // The same image runs again.
        vm.run().expect("vm error");
        assert_eq!(vm.stack(), &[5]);
    }

    #[test]
    fn test_dump_stack_marks_bp() {
        let (mut vm, _) = make_vm(&[(Push, int(1)), (PushBp, None), (Halt, None)]);
        vm.run().expect("vm error");
        let dump = vm.dump_stack();
        assert!(dump.contains("<-- BP"));
    }

    #[test]
    fn test_dump_memory_lists_nonzero() {
        let (mut vm, _) = make_vm(&[
            (Push, int(77)),
            (Push, int(2)),
            (Store, None),
            (Halt, None),
        ]);
        vm.run().expect("vm error");
        let dump = vm.dump_memory();
        assert!(dump.contains("[2] = 77"));
    }
}
