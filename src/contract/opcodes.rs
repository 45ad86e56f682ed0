//! Contract instruction set
//!
//! Every instruction is one byte, optionally followed by an immediate:
//! `PUSH` carries a big-endian u64, `JUMP`/`JUMPI` a big-endian u32 code
//! offset and `ARG` a one-byte argument index.

use serde::{Deserialize, Serialize};

/// Opcodes for the contract VM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum OpCode {
    // Stack
    Push = 0x01,
    Pop = 0x02,
    Dup = 0x03,
    Swap = 0x04,

    // Arithmetic, all wrapping except division
    Add = 0x10,
    Sub = 0x11,
    Mul = 0x12,
    Div = 0x13,
    Mod = 0x14,

    // Comparison, pushing 1 or 0
    Eq = 0x20,
    Lt = 0x21,
    Gt = 0x22,
    IsZero = 0x23,

    // Control flow
    Jump = 0x30,
    /// Jump if the popped value is non-zero
    JumpIf = 0x31,
    Halt = 0x32,
    /// Stop and return the popped value
    Return = 0x33,
    /// Abort; every effect of the call is discarded
    Revert = 0x34,

    // Storage
    /// key, value ->
    SStore = 0x40,
    /// key -> value
    SLoad = 0x41,

    // Call environment
    /// Low word of the calling account
    Caller = 0x50,
    /// Native value sent with the call
    CallValue = 0x51,
    /// Low word of the contract's own address
    Self_ = 0x52,
    /// Contract balance before the call is credited
    SelfBalance = 0x53,
    /// Push call argument by index
    Arg = 0x54,
    ArgCount = 0x55,
}

/// Every opcode with its mnemonic
const INSTRUCTIONS: &[(OpCode, &str)] = &[
    (OpCode::Push, "PUSH"),
    (OpCode::Pop, "POP"),
    (OpCode::Dup, "DUP"),
    (OpCode::Swap, "SWAP"),
    (OpCode::Add, "ADD"),
    (OpCode::Sub, "SUB"),
    (OpCode::Mul, "MUL"),
    (OpCode::Div, "DIV"),
    (OpCode::Mod, "MOD"),
    (OpCode::Eq, "EQ"),
    (OpCode::Lt, "LT"),
    (OpCode::Gt, "GT"),
    (OpCode::IsZero, "ISZERO"),
    (OpCode::Jump, "JUMP"),
    (OpCode::JumpIf, "JUMPI"),
    (OpCode::Halt, "HALT"),
    (OpCode::Return, "RETURN"),
    (OpCode::Revert, "REVERT"),
    (OpCode::SStore, "SSTORE"),
    (OpCode::SLoad, "SLOAD"),
    (OpCode::Caller, "CALLER"),
    (OpCode::CallValue, "CALLVALUE"),
    (OpCode::Self_, "SELF"),
    (OpCode::SelfBalance, "SELFBALANCE"),
    (OpCode::Arg, "ARG"),
    (OpCode::ArgCount, "ARGCOUNT"),
];

impl OpCode {
    /// Decode a byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        INSTRUCTIONS
            .iter()
            .map(|(op, _)| *op)
            .find(|op| *op as u8 == byte)
    }

    /// Look up a mnemonic, case-insensitively
    pub fn from_name(name: &str) -> Option<Self> {
        INSTRUCTIONS
            .iter()
            .find(|(_, mnemonic)| mnemonic.eq_ignore_ascii_case(name))
            .map(|(op, _)| *op)
    }

    /// Size of the immediate following this opcode
    pub fn immediate_len(&self) -> usize {
        match self {
            OpCode::Push => 8,
            OpCode::Jump | OpCode::JumpIf => 4,
            OpCode::Arg => 1,
            _ => 0,
        }
    }

    /// Mnemonic used by the assembler and disassembler
    pub fn name(&self) -> &'static str {
        INSTRUCTIONS
            .iter()
            .find(|(op, _)| op == self)
            .map(|(_, mnemonic)| *mnemonic)
            .unwrap_or("???")
    }

    /// Gas charged before the instruction runs
    pub fn gas_cost(&self) -> u64 {
        match self {
            OpCode::Push | OpCode::Pop | OpCode::Dup | OpCode::Swap => 2,
            OpCode::Add | OpCode::Sub | OpCode::Mul => 3,
            OpCode::Div | OpCode::Mod => 5,
            OpCode::Eq | OpCode::Lt | OpCode::Gt | OpCode::IsZero => 3,
            OpCode::Jump | OpCode::JumpIf => 8,
            OpCode::SStore => 20,
            OpCode::SLoad => 5,
            OpCode::SelfBalance => 10,
            OpCode::Caller | OpCode::CallValue | OpCode::Self_ => 2,
            OpCode::Arg | OpCode::ArgCount => 2,
            OpCode::Halt | OpCode::Return | OpCode::Revert => 0,
        }
    }
}
