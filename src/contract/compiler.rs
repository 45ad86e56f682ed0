//! Contract assembler
//!
//! Turns a line-oriented assembly listing into bytecode:
//!
//! ```text
//! ; comments start with ';' or '#'
//! ARG 0
//! JUMPI store
//! REVERT
//! :store
//! PUSH 0x2a
//! RETURN
//! ```

use crate::contract::opcodes::OpCode;
use std::collections::HashMap;
use std::fmt::Write;
use thiserror::Error;

/// Compiler errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompilerError {
    #[error("Line {line}: unknown instruction {name}")]
    UnknownInstruction { line: usize, name: String },
    #[error("Line {line}: {name} expects an operand")]
    MissingOperand { line: usize, name: &'static str },
    #[error("Line {line}: invalid number {value}")]
    InvalidNumber { line: usize, value: String },
    #[error("Undefined label: {0}")]
    UndefinedLabel(String),
    #[error("Duplicate label: {0}")]
    DuplicateLabel(String),
}

/// Two-pass assembler: emit code, then patch label references
#[derive(Debug, Default)]
pub struct Compiler {
    code: Vec<u8>,
    labels: HashMap<String, u32>,
    /// (offset of the placeholder, label name)
    label_refs: Vec<(usize, String)>,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile source code to bytecode
    pub fn compile(&mut self, source: &str) -> Result<Vec<u8>, CompilerError> {
        self.code.clear();
        self.labels.clear();
        self.label_refs.clear();

        for (index, raw) in source.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if let Some(label) = line.strip_prefix(':') {
                let label = label.trim().to_string();
                if self.labels.contains_key(&label) {
                    return Err(CompilerError::DuplicateLabel(label));
                }
                self.labels.insert(label, self.code.len() as u32);
                continue;
            }

            self.compile_instruction(index + 1, line)?;
        }

        for (offset, label) in &self.label_refs {
            let target = self
                .labels
                .get(label)
                .ok_or_else(|| CompilerError::UndefinedLabel(label.clone()))?;
            self.code[*offset..*offset + 4].copy_from_slice(&target.to_be_bytes());
        }

        Ok(std::mem::take(&mut self.code))
    }

    fn compile_instruction(&mut self, line: usize, text: &str) -> Result<(), CompilerError> {
        let mut parts = text.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let opcode = OpCode::from_name(name).ok_or_else(|| CompilerError::UnknownInstruction {
            line,
            name: name.to_string(),
        })?;

        self.code.push(opcode as u8);
        if opcode.immediate_len() == 0 {
            return Ok(());
        }

        let operand = parts.next().ok_or(CompilerError::MissingOperand {
            line,
            name: opcode.name(),
        })?;

        match opcode {
            OpCode::Push => {
                let value = parse_number(line, operand)?;
                self.code.extend_from_slice(&value.to_be_bytes());
            }
            OpCode::Jump | OpCode::JumpIf => {
                self.label_refs.push((self.code.len(), operand.to_string()));
                self.code.extend_from_slice(&[0; 4]);
            }
            OpCode::Arg => {
                let index = u8::try_from(parse_number(line, operand)?).map_err(|_| {
                    CompilerError::InvalidNumber {
                        line,
                        value: operand.to_string(),
                    }
                })?;
                self.code.push(index);
            }
            _ => {}
        }

        Ok(())
    }
}

/// Parse a decimal or `0x` hex number
fn parse_number(line: usize, s: &str) -> Result<u64, CompilerError> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(digits) => u64::from_str_radix(digits, 16),
        None => s.parse::<u64>(),
    };
    parsed.map_err(|_| CompilerError::InvalidNumber {
        line,
        value: s.to_string(),
    })
}

/// Disassemble bytecode to a readable listing
pub fn disassemble(code: &[u8]) -> String {
    let mut output = String::new();
    let mut pc = 0;

    while pc < code.len() {
        let byte = code[pc];
        let Some(opcode) = OpCode::from_byte(byte) else {
            let _ = writeln!(output, "{:04x}: UNKNOWN 0x{:02x}", pc, byte);
            pc += 1;
            continue;
        };

        let _ = write!(output, "{:04x}: {}", pc, opcode.name());
        pc += 1;

        let width = opcode.immediate_len();
        if let Some(immediate) = code.get(pc..pc + width).filter(|_| width > 0) {
            let value = immediate
                .iter()
                .fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
            match opcode {
                OpCode::Jump | OpCode::JumpIf => {
                    let _ = write!(output, " 0x{:04x}", value);
                }
                _ => {
                    let _ = write!(output, " {}", value);
                }
            }
            pc += width;
        }

        output.push('\n');
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_arithmetic() {
        let mut compiler = Compiler::new();
        let code = compiler
            .compile(
                "
            PUSH 10
            PUSH 20
            ADD
            RETURN
        ",
            )
            .unwrap();

        assert_eq!(code[0], OpCode::Push as u8);
        assert_eq!(code[9], OpCode::Push as u8);
        assert_eq!(code[18], OpCode::Add as u8);
        assert_eq!(code[19], OpCode::Return as u8);
    }

    #[test]
    fn test_compile_with_labels() {
        let mut compiler = Compiler::new();
        let code = compiler
            .compile(
                "
            ; skip the 999
            PUSH 1
            JUMPI end
            PUSH 999
            :end
            PUSH 0x2a
            RETURN
        ",
            )
            .unwrap();

        // PUSH(9) + JUMPI(5) + PUSH(9) = 23
        assert_eq!(&code[10..14], &23u32.to_be_bytes());
    }

    #[test]
    fn test_compile_errors() {
        let mut compiler = Compiler::new();
        assert_eq!(
            compiler.compile("FROB"),
            Err(CompilerError::UnknownInstruction {
                line: 1,
                name: "FROB".to_string()
            })
        );
        assert_eq!(
            compiler.compile("PUSH"),
            Err(CompilerError::MissingOperand {
                line: 1,
                name: "PUSH"
            })
        );
        assert!(matches!(
            compiler.compile("ARG 300"),
            Err(CompilerError::InvalidNumber { .. })
        ));
        assert_eq!(
            compiler.compile("JUMP nowhere"),
            Err(CompilerError::UndefinedLabel("nowhere".to_string()))
        );
    }

    #[test]
    fn test_disassemble() {
        let mut compiler = Compiler::new();
        let code = compiler
            .compile(
                "
            ARG 0
            JUMPI done
            PUSH 42
            :done
            CALLVALUE
            RETURN
        ",
            )
            .unwrap();

        let listing = disassemble(&code);
        assert!(listing.contains("0000: ARG 0"));
        assert!(listing.contains("JUMPI 0x0010"));
        assert!(listing.contains("PUSH 42"));
        assert!(listing.contains("0010: CALLVALUE"));
        assert!(listing.contains("RETURN"));
    }
}
