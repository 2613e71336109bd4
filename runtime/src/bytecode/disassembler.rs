//! Bytecode disassembler (and the inverse assembler used by tests and
//! tooling).

use crate::bytecode::{BytecodeImage, OpCode, OperandKind};
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    Int(i32),
    Float(f32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InstrKind {
    Op(OpCode),
    /// A byte that is not a known opcode.
    Unknown(u8),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Instruction {
    pub address: usize,
    pub kind: InstrKind,
    pub operand: Option<Operand>,
}

/// Decode a code segment into instructions. Unknown bytes become
/// [`InstrKind::Unknown`]; a truncated trailing operand is dropped.
pub fn disassemble(code: &[u8]) -> Vec<Instruction> {
    let mut instructions = Vec::new();
    let mut i = 0;

    while i < code.len() {
        let address = i;
        let byte = code[i];
        i += 1;

        let op = match OpCode::from_byte(byte) {
            Some(op) => op,
            None => {
                instructions.push(Instruction {
                    address,
                    kind: InstrKind::Unknown(byte),
                    operand: None,
                });
                continue;
            }
        };

        let operand = match op.operand_kind() {
            OperandKind::None => None,
            OperandKind::Int if i + 4 <= code.len() => {
                let bytes: [u8; 4] = code[i..i + 4].try_into().unwrap();
                i += 4;
                Some(Operand::Int(i32::from_le_bytes(bytes)))
            }
            OperandKind::Float if i + 4 <= code.len() => {
                let bytes: [u8; 4] = code[i..i + 4].try_into().unwrap();
                i += 4;
                Some(Operand::Float(f32::from_le_bytes(bytes)))
            }
            // Truncated operand: keep the opcode, stop decoding.
            _ => {
                i = code.len();
                None
            }
        };

        instructions.push(Instruction {
            address,
            kind: InstrKind::Op(op),
            operand,
        });
    }

    instructions
}

/// Encode instructions back into a code segment. Operand-carrying
/// opcodes with no operand get a zero.
pub fn assemble(instructions: &[(OpCode, Option<Operand>)]) -> Vec<u8> {
    let mut code = Vec::new();
    for &(op, operand) in instructions {
        code.push(op.to_byte());
        match op.operand_kind() {
            OperandKind::None => {}
            OperandKind::Int => {
                let value = match operand {
                    Some(Operand::Int(v)) => v,
                    Some(Operand::Float(v)) => v as i32,
                    None => 0,
                };
                code.extend_from_slice(&value.to_le_bytes());
            }
            OperandKind::Float => {
                let value = match operand {
                    Some(Operand::Float(v)) => v,
                    Some(Operand::Int(v)) => v as f32,
                    None => 0.0,
                };
                code.extend_from_slice(&value.to_le_bytes());
            }
        }
    }
    code
}

/// Render a full listing: string table, then one line per instruction.
pub fn format_listing(image: &BytecodeImage) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Bytecode Disassembly ===");
    let _ = writeln!(out, "Code size: {} bytes", image.code.len());

    if !image.strings.is_empty() {
        let _ = writeln!(out, "Strings ({}):", image.strings.len());
        for (i, s) in image.strings.iter().enumerate() {
            let _ = writeln!(out, "  [{}] {:?}", i, s);
        }
    }
    out.push('\n');

    for instr in disassemble(&image.code) {
        let _ = write!(out, "{:6}: ", instr.address);
        match instr.kind {
            InstrKind::Op(op) => {
                let _ = write!(out, "{}", op);
                match instr.operand {
                    Some(Operand::Int(v)) => {
                        let _ = write!(out, " {}", v);
                    }
                    Some(Operand::Float(v)) => {
                        let _ = write!(out, " {}", v);
                    }
                    None => {}
                }
            }
            InstrKind::Unknown(byte) => {
                let _ = write!(out, "DB 0x{:02X}", byte);
            }
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_every_opcode() {
        // disassemble(assemble(ops)) == ops across the whole table.
        let mut program: Vec<(OpCode, Option<Operand>)> = Vec::new();
        for &op in OpCode::all() {
            let operand = match op.operand_kind() {
                OperandKind::None => None,
                OperandKind::Int => Some(Operand::Int(-12345)),
                OperandKind::Float => Some(Operand::Float(2.71828)),
            };
            program.push((op, operand));
        }

        let code = assemble(&program);
        let decoded = disassemble(&code);
        assert_eq!(decoded.len(), program.len());

        for (instr, (op, operand)) in decoded.iter().zip(program.iter()) {
            assert_eq!(instr.kind, InstrKind::Op(*op));
            assert_eq!(instr.operand, *operand);
        }
    }

    #[test]
    fn test_addresses_account_for_operands() {
        let code = assemble(&[
            (OpCode::Push, Some(Operand::Int(1))),
            (OpCode::Push, Some(Operand::Int(2))),
            (OpCode::Add, None),
            (OpCode::Halt, None),
        ]);
        let decoded = disassemble(&code);
        assert_eq!(decoded[0].address, 0);
        assert_eq!(decoded[1].address, 5);
        assert_eq!(decoded[2].address, 10);
        assert_eq!(decoded[3].address, 11);
    }

    #[test]
    fn test_unknown_byte() {
        let decoded = disassemble(&[0x00, 0xFF]);
        assert_eq!(decoded[0].kind, InstrKind::Unknown(0x00));
        assert_eq!(decoded[1].kind, InstrKind::Op(OpCode::Halt));
    }

    #[test]
    fn test_truncated_operand() {
        // PUSH with only two operand bytes present.
        let decoded = disassemble(&[0x01, 0xAA, 0xBB]);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].kind, InstrKind::Op(OpCode::Push));
        assert_eq!(decoded[0].operand, None);
    }

    #[test]
    fn test_listing_format() {
        let image = BytecodeImage {
            strings: vec!["hi".to_string()],
            code: assemble(&[
                (OpCode::PushStr, Some(Operand::Int(0))),
                (OpCode::PrintStr, None),
                (OpCode::Halt, None),
            ]),
        };
        let listing = format_listing(&image);
        assert!(listing.contains("[0] \"hi\""));
        assert!(listing.contains("PUSH_STR 0"));
        assert!(listing.contains("PRINT_STR"));
        assert!(listing.contains("HALT"));
    }

    #[test]
    fn test_float_operand_round_trip() {
        let code = assemble(&[(OpCode::Fpush, Some(Operand::Float(1.5)))]);
        let decoded = disassemble(&code);
        assert_eq!(decoded[0].operand, Some(Operand::Float(1.5)));
    }
}
