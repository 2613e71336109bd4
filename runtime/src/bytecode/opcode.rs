//! Opcode table for the Cinder VM.
//!
//! The byte values are the wire format shared with the compiler;
//! changing any of them breaks existing bytecode files.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    // Integer stack
    Push = 0x01,
    Pop = 0x02,
    Add = 0x03,
    Sub = 0x04,
    Mul = 0x05,
    Div = 0x06,
    Mod = 0x07,
    Dup = 0x08,
    Swap = 0x09,

    // I/O
    Print = 0x0A,
    PrintStr = 0x0B,
    InputStr = 0x0C,
    Input = 0x0D,

    // Control flow
    Jmp = 0x10,
    Jz = 0x11,
    Jnz = 0x12,
    Jl = 0x13,
    Jg = 0x14,
    Jle = 0x15,
    Jge = 0x16,
    Cmp = 0x17,
    Call = 0x18,
    Ret = 0x19,

    // Memory and frames
    Load = 0x20,
    Store = 0x21,
    LoadBp = 0x22,
    StoreBp = 0x23,
    PushBp = 0x24,
    PopBp = 0x25,
    PushStr = 0x26,
    LoadIndirect = 0x27,
    StoreIndirect = 0x28,
    Alloc = 0x29,
    Free = 0x2A,

    // FPU (8-slot circular register stack)
    Fpush = 0x30,
    Fpop = 0x31,
    Fadd = 0x32,
    Fsub = 0x33,
    Fmul = 0x34,
    Fdiv = 0x35,
    Fload = 0x36,
    Fstore = 0x37,
    Fprint = 0x38,
    Fcmp = 0x39,
    Fneg = 0x3A,
    Fdup = 0x3B,
    IntToFp = 0x3C,
    FpToInt = 0x3D,

    Halt = 0xFF,
}

/// What follows the opcode byte in the instruction stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    None,
    Int,
    Float,
}

const PUSH: u8 = OpCode::Push as u8;
const POP: u8 = OpCode::Pop as u8;
const ADD: u8 = OpCode::Add as u8;
const SUB: u8 = OpCode::Sub as u8;
const MUL: u8 = OpCode::Mul as u8;
const DIV: u8 = OpCode::Div as u8;
const MOD: u8 = OpCode::Mod as u8;
const DUP: u8 = OpCode::Dup as u8;
const SWAP: u8 = OpCode::Swap as u8;

const PRINT: u8 = OpCode::Print as u8;
const PRINT_STR: u8 = OpCode::PrintStr as u8;
const INPUT_STR: u8 = OpCode::InputStr as u8;
const INPUT: u8 = OpCode::Input as u8;

const JMP: u8 = OpCode::Jmp as u8;
const JZ: u8 = OpCode::Jz as u8;
const JNZ: u8 = OpCode::Jnz as u8;
const JL: u8 = OpCode::Jl as u8;
const JG: u8 = OpCode::Jg as u8;
const JLE: u8 = OpCode::Jle as u8;
const JGE: u8 = OpCode::Jge as u8;
const CMP: u8 = OpCode::Cmp as u8;
const CALL: u8 = OpCode::Call as u8;
const RET: u8 = OpCode::Ret as u8;

const LOAD: u8 = OpCode::Load as u8;
const STORE: u8 = OpCode::Store as u8;
const LOAD_BP: u8 = OpCode::LoadBp as u8;
const STORE_BP: u8 = OpCode::StoreBp as u8;
const PUSH_BP: u8 = OpCode::PushBp as u8;
const POP_BP: u8 = OpCode::PopBp as u8;
const PUSH_STR: u8 = OpCode::PushStr as u8;
const LOAD_INDIRECT: u8 = OpCode::LoadIndirect as u8;
const STORE_INDIRECT: u8 = OpCode::StoreIndirect as u8;
const ALLOC: u8 = OpCode::Alloc as u8;
const FREE: u8 = OpCode::Free as u8;

const FPUSH: u8 = OpCode::Fpush as u8;
const FPOP: u8 = OpCode::Fpop as u8;
const FADD: u8 = OpCode::Fadd as u8;
const FSUB: u8 = OpCode::Fsub as u8;
const FMUL: u8 = OpCode::Fmul as u8;
const FDIV: u8 = OpCode::Fdiv as u8;
const FLOAD: u8 = OpCode::Fload as u8;
const FSTORE: u8 = OpCode::Fstore as u8;
const FPRINT: u8 = OpCode::Fprint as u8;
const FCMP: u8 = OpCode::Fcmp as u8;
const FNEG: u8 = OpCode::Fneg as u8;
const FDUP: u8 = OpCode::Fdup as u8;
const INT_TO_FP: u8 = OpCode::IntToFp as u8;
const FP_TO_INT: u8 = OpCode::FpToInt as u8;

const HALT: u8 = OpCode::Halt as u8;

impl OpCode {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            PUSH => Some(OpCode::Push),
            POP => Some(OpCode::Pop),
            ADD => Some(OpCode::Add),
            SUB => Some(OpCode::Sub),
            MUL => Some(OpCode::Mul),
            DIV => Some(OpCode::Div),
            MOD => Some(OpCode::Mod),
            DUP => Some(OpCode::Dup),
            SWAP => Some(OpCode::Swap),

            PRINT => Some(OpCode::Print),
            PRINT_STR => Some(OpCode::PrintStr),
            INPUT_STR => Some(OpCode::InputStr),
            INPUT => Some(OpCode::Input),

            JMP => Some(OpCode::Jmp),
            JZ => Some(OpCode::Jz),
            JNZ => Some(OpCode::Jnz),
            JL => Some(OpCode::Jl),
            JG => Some(OpCode::Jg),
            JLE => Some(OpCode::Jle),
            JGE => Some(OpCode::Jge),
            CMP => Some(OpCode::Cmp),
            CALL => Some(OpCode::Call),
            RET => Some(OpCode::Ret),

            LOAD => Some(OpCode::Load),
            STORE => Some(OpCode::Store),
            LOAD_BP => Some(OpCode::LoadBp),
            STORE_BP => Some(OpCode::StoreBp),
            PUSH_BP => Some(OpCode::PushBp),
            POP_BP => Some(OpCode::PopBp),
            PUSH_STR => Some(OpCode::PushStr),
            LOAD_INDIRECT => Some(OpCode::LoadIndirect),
            STORE_INDIRECT => Some(OpCode::StoreIndirect),
            ALLOC => Some(OpCode::Alloc),
            FREE => Some(OpCode::Free),

            FPUSH => Some(OpCode::Fpush),
            FPOP => Some(OpCode::Fpop),
            FADD => Some(OpCode::Fadd),
            FSUB => Some(OpCode::Fsub),
            FMUL => Some(OpCode::Fmul),
            FDIV => Some(OpCode::Fdiv),
            FLOAD => Some(OpCode::Fload),
            FSTORE => Some(OpCode::Fstore),
            FPRINT => Some(OpCode::Fprint),
            FCMP => Some(OpCode::Fcmp),
            FNEG => Some(OpCode::Fneg),
            FDUP => Some(OpCode::Fdup),
            INT_TO_FP => Some(OpCode::IntToFp),
            FP_TO_INT => Some(OpCode::FpToInt),

            HALT => Some(OpCode::Halt),

            _ => None,
        }
    }

    pub fn to_byte(self) -> u8 {
        self as u8
    }

    pub fn operand_kind(self) -> OperandKind {
        match self {
            OpCode::Push
            | OpCode::PushStr
            | OpCode::Jmp
            | OpCode::Jz
            | OpCode::Jnz
            | OpCode::Jl
            | OpCode::Jg
            | OpCode::Jle
            | OpCode::Jge
            | OpCode::Call
            | OpCode::Load
            | OpCode::LoadBp
            | OpCode::StoreBp
            | OpCode::Fload
            | OpCode::Fstore => OperandKind::Int,
            OpCode::Fpush => OperandKind::Float,
            _ => OperandKind::None,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            OpCode::Push => "PUSH",
            OpCode::Pop => "POP",
            OpCode::Add => "ADD",
            OpCode::Sub => "SUB",
            OpCode::Mul => "MUL",
            OpCode::Div => "DIV",
            OpCode::Mod => "MOD",
            OpCode::Dup => "DUP",
            OpCode::Swap => "SWAP",
            OpCode::Print => "PRINT",
            OpCode::PrintStr => "PRINT_STR",
            OpCode::InputStr => "INPUT_STR",
            OpCode::Input => "INPUT",
            OpCode::Jmp => "JMP",
            OpCode::Jz => "JZ",
            OpCode::Jnz => "JNZ",
            OpCode::Jl => "JL",
            OpCode::Jg => "JG",
            OpCode::Jle => "JLE",
            OpCode::Jge => "JGE",
            OpCode::Cmp => "CMP",
            OpCode::Call => "CALL",
            OpCode::Ret => "RET",
            OpCode::Load => "LOAD",
            OpCode::Store => "STORE",
            OpCode::LoadBp => "LOAD_BP",
            OpCode::StoreBp => "STORE_BP",
            OpCode::PushBp => "PUSH_BP",
            OpCode::PopBp => "POP_BP",
            OpCode::PushStr => "PUSH_STR",
            OpCode::LoadIndirect => "LOAD_INDIRECT",
            OpCode::StoreIndirect => "STORE_INDIRECT",
            OpCode::Alloc => "ALLOC",
            OpCode::Free => "FREE",
            OpCode::Fpush => "FPUSH",
            OpCode::Fpop => "FPOP",
            OpCode::Fadd => "FADD",
            OpCode::Fsub => "FSUB",
            OpCode::Fmul => "FMUL",
            OpCode::Fdiv => "FDIV",
            OpCode::Fload => "FLOAD",
            OpCode::Fstore => "FSTORE",
            OpCode::Fprint => "FPRINT",
            OpCode::Fcmp => "FCMP",
            OpCode::Fneg => "FNEG",
            OpCode::Fdup => "FDUP",
            OpCode::IntToFp => "INT_TO_FP",
            OpCode::FpToInt => "FP_TO_INT",
            OpCode::Halt => "HALT",
        }
    }

    /// Every opcode, in byte order. Handy for exhaustive tests and the
    /// disassembler round trip.
    pub fn all() -> &'static [OpCode] {
        use OpCode::*;
        &[
            Push, Pop, Add, Sub, Mul, Div, Mod, Dup, Swap, Print, PrintStr, InputStr, Input,
            Jmp, Jz, Jnz, Jl, Jg, Jle, Jge, Cmp, Call, Ret, Load, Store, LoadBp, StoreBp,
            PushBp, PopBp, PushStr, LoadIndirect, StoreIndirect, Alloc, Free, Fpush, Fpop,
            Fadd, Fsub, Fmul, Fdiv, Fload, Fstore, Fprint, Fcmp, Fneg, Fdup, IntToFp, FpToInt,
            Halt,
        ]
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_byte_assignments() {
        // The on-disk byte values; these are the ABI.
        assert_eq!(OpCode::Push.to_byte(), 0x01);
        assert_eq!(OpCode::Pop.to_byte(), 0x02);
        assert_eq!(OpCode::Add.to_byte(), 0x03);
        assert_eq!(OpCode::Sub.to_byte(), 0x04);
        assert_eq!(OpCode::Mul.to_byte(), 0x05);
        assert_eq!(OpCode::Div.to_byte(), 0x06);
        assert_eq!(OpCode::Mod.to_byte(), 0x07);
        assert_eq!(OpCode::Dup.to_byte(), 0x08);
        assert_eq!(OpCode::Swap.to_byte(), 0x09);
        assert_eq!(OpCode::Print.to_byte(), 0x0A);
        assert_eq!(OpCode::PrintStr.to_byte(), 0x0B);
        assert_eq!(OpCode::InputStr.to_byte(), 0x0C);
        assert_eq!(OpCode::Input.to_byte(), 0x0D);
        assert_eq!(OpCode::Jmp.to_byte(), 0x10);
        assert_eq!(OpCode::Jz.to_byte(), 0x11);
        assert_eq!(OpCode::Jnz.to_byte(), 0x12);
        assert_eq!(OpCode::Jl.to_byte(), 0x13);
        assert_eq!(OpCode::Jg.to_byte(), 0x14);
        assert_eq!(OpCode::Jle.to_byte(), 0x15);
        assert_eq!(OpCode::Jge.to_byte(), 0x16);
        assert_eq!(OpCode::Cmp.to_byte(), 0x17);
        assert_eq!(OpCode::Call.to_byte(), 0x18);
        assert_eq!(OpCode::Ret.to_byte(), 0x19);
        assert_eq!(OpCode::Load.to_byte(), 0x20);
        assert_eq!(OpCode::Store.to_byte(), 0x21);
        assert_eq!(OpCode::LoadBp.to_byte(), 0x22);
        assert_eq!(OpCode::StoreBp.to_byte(), 0x23);
        assert_eq!(OpCode::PushBp.to_byte(), 0x24);
        assert_eq!(OpCode::PopBp.to_byte(), 0x25);
        assert_eq!(OpCode::PushStr.to_byte(), 0x26);
        assert_eq!(OpCode::LoadIndirect.to_byte(), 0x27);
        assert_eq!(OpCode::StoreIndirect.to_byte(), 0x28);
        assert_eq!(OpCode::Alloc.to_byte(), 0x29);
        assert_eq!(OpCode::Free.to_byte(), 0x2A);
        assert_eq!(OpCode::Fpush.to_byte(), 0x30);
        assert_eq!(OpCode::Fpop.to_byte(), 0x31);
        assert_eq!(OpCode::Fadd.to_byte(), 0x32);
        assert_eq!(OpCode::Fsub.to_byte(), 0x33);
        assert_eq!(OpCode::Fmul.to_byte(), 0x34);
        assert_eq!(OpCode::Fdiv.to_byte(), 0x35);
        assert_eq!(OpCode::Fload.to_byte(), 0x36);
        assert_eq!(OpCode::Fstore.to_byte(), 0x37);
        assert_eq!(OpCode::Fprint.to_byte(), 0x38);
        assert_eq!(OpCode::Fcmp.to_byte(), 0x39);
        assert_eq!(OpCode::Fneg.to_byte(), 0x3A);
        assert_eq!(OpCode::Fdup.to_byte(), 0x3B);
        assert_eq!(OpCode::IntToFp.to_byte(), 0x3C);
        assert_eq!(OpCode::FpToInt.to_byte(), 0x3D);
        assert_eq!(OpCode::Halt.to_byte(), 0xFF);
    }

    #[test]
    fn test_round_trip_all_opcodes() {
        for &op in OpCode::all() {
            assert_eq!(OpCode::from_byte(op.to_byte()), Some(op));
        }
    }

    #[test]
    fn test_invalid_bytes() {
        assert_eq!(OpCode::from_byte(0x00), None);
        assert_eq!(OpCode::from_byte(0x0E), None);
        assert_eq!(OpCode::from_byte(0x2B), None);
        assert_eq!(OpCode::from_byte(0x3E), None);
        assert_eq!(OpCode::from_byte(0xFE), None);
    }

    #[test]
    fn test_operand_kinds() {
        assert_eq!(OpCode::Push.operand_kind(), OperandKind::Int);
        assert_eq!(OpCode::PushStr.operand_kind(), OperandKind::Int);
        assert_eq!(OpCode::Jmp.operand_kind(), OperandKind::Int);
        assert_eq!(OpCode::Call.operand_kind(), OperandKind::Int);
        assert_eq!(OpCode::Load.operand_kind(), OperandKind::Int);
        assert_eq!(OpCode::LoadBp.operand_kind(), OperandKind::Int);
        assert_eq!(OpCode::StoreBp.operand_kind(), OperandKind::Int);
        assert_eq!(OpCode::Fload.operand_kind(), OperandKind::Int);
        assert_eq!(OpCode::Fstore.operand_kind(), OperandKind::Int);
        assert_eq!(OpCode::Fpush.operand_kind(), OperandKind::Float);

        assert_eq!(OpCode::Add.operand_kind(), OperandKind::None);
        assert_eq!(OpCode::Store.operand_kind(), OperandKind::None);
        assert_eq!(OpCode::Cmp.operand_kind(), OperandKind::None);
        assert_eq!(OpCode::Ret.operand_kind(), OperandKind::None);
        assert_eq!(OpCode::Halt.operand_kind(), OperandKind::None);
    }

    #[test]
    fn test_mnemonics() {
        assert_eq!(OpCode::LoadIndirect.mnemonic(), "LOAD_INDIRECT");
        assert_eq!(OpCode::IntToFp.mnemonic(), "INT_TO_FP");
        assert_eq!(format!("{}", OpCode::PushBp), "PUSH_BP");
    }

    #[test]
    fn test_all_is_exhaustive_and_unique() {
        let all = OpCode::all();
        assert_eq!(all.len(), 49);
        let mut bytes: Vec<u8> = all.iter().map(|op| op.to_byte()).collect();
        bytes.sort_unstable();
        bytes.dedup();
        assert_eq!(bytes.len(), 49);
    }
}
