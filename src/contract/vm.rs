//! Contract virtual machine
//!
//! A gas-metered stack machine over u64 words. The VM never writes to a
//! contract's storage directly: stores are collected in
//! [`ExecutionResult::storage_changes`] and only applied by the caller once the
//! run succeeds, so a revert leaves no trace.

use crate::contract::opcodes::OpCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Maximum stack size
const MAX_STACK_SIZE: usize = 1024;

/// Default gas limit
pub const DEFAULT_GAS_LIMIT: u64 = 100_000;

/// VM execution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error("Stack overflow")]
    StackOverflow,
    #[error("Stack underflow")]
    StackUnderflow,
    #[error("Invalid opcode 0x{0:02x}")]
    InvalidOpcode(u8),
    #[error("Truncated immediate at offset {0}")]
    TruncatedImmediate(usize),
    #[error("Out of gas")]
    OutOfGas,
    #[error("Invalid jump destination: {0}")]
    InvalidJump(u32),
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Invalid argument index: {0}")]
    InvalidArgument(u8),
    #[error("Execution reverted")]
    Reverted,
}

/// Environment a call runs in
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Low word of the calling account
    pub caller: u64,
    /// Low word of the contract address
    pub address: u64,
    /// Value attached to the call, saturated to a word
    pub call_value: u64,
    /// Contract balance before the call, saturated to a word
    pub self_balance: u64,
    /// Call arguments
    pub args: Vec<u64>,
    pub gas_limit: u64,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self {
            caller: 0,
            address: 0,
            call_value: 0,
            self_balance: 0,
            args: Vec::new(),
            gas_limit: DEFAULT_GAS_LIMIT,
        }
    }
}

/// Result of a successful run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub return_value: Option<u64>,
    pub gas_used: u64,
    /// Storage writes to apply: key -> value
    pub storage_changes: BTreeMap<u64, u64>,
}

/// The contract virtual machine
pub struct VM<'a> {
    code: &'a [u8],
    /// Committed storage, read-only during the run
    storage: &'a BTreeMap<u64, u64>,
    storage_changes: BTreeMap<u64, u64>,
    context: ExecutionContext,
    stack: Vec<u64>,
    pc: usize,
    gas: u64,
    halted: bool,
    return_value: Option<u64>,
}

impl<'a> VM<'a> {
    pub fn new(
        code: &'a [u8],
        storage: &'a BTreeMap<u64, u64>,
        context: ExecutionContext,
    ) -> Self {
        Self {
            code,
            storage,
            storage_changes: BTreeMap::new(),
            gas: context.gas_limit,
            context,
            stack: Vec::with_capacity(64),
            pc: 0,
            halted: false,
            return_value: None,
        }
    }

    /// Run until halt, return or the end of the code
    pub fn execute(mut self) -> Result<ExecutionResult, VmError> {
        while !self.halted && self.pc < self.code.len() {
            self.step()?;
        }

        Ok(ExecutionResult {
            return_value: self.return_value,
            gas_used: self.context.gas_limit - self.gas,
            storage_changes: self.storage_changes,
        })
    }

    fn step(&mut self) -> Result<(), VmError> {
        let byte = self.code[self.pc];
        let opcode = OpCode::from_byte(byte).ok_or(VmError::InvalidOpcode(byte))?;

        self.gas = self
            .gas
            .checked_sub(opcode.gas_cost())
            .ok_or(VmError::OutOfGas)?;
        self.pc += 1;

        match opcode {
            OpCode::Push => {
                let value = u64::from_be_bytes(self.immediate::<8>()?);
                self.push(value)?;
            }
            OpCode::Pop => {
                self.pop()?;
            }
            OpCode::Dup => {
                let value = *self.stack.last().ok_or(VmError::StackUnderflow)?;
                self.push(value)?;
            }
            OpCode::Swap => {
                let len = self.stack.len();
                if len < 2 {
                    return Err(VmError::StackUnderflow);
                }
                self.stack.swap(len - 1, len - 2);
            }
            OpCode::Add => self.binary(|a, b| Ok(a.wrapping_add(b)))?,
            OpCode::Sub => self.binary(|a, b| Ok(a.wrapping_sub(b)))?,
            OpCode::Mul => self.binary(|a, b| Ok(a.wrapping_mul(b)))?,
            OpCode::Div => self.binary(|a, b| a.checked_div(b).ok_or(VmError::DivisionByZero))?,
            OpCode::Mod => self.binary(|a, b| a.checked_rem(b).ok_or(VmError::DivisionByZero))?,
            OpCode::Eq => self.binary(|a, b| Ok(u64::from(a == b)))?,
            OpCode::Lt => self.binary(|a, b| Ok(u64::from(a < b)))?,
            OpCode::Gt => self.binary(|a, b| Ok(u64::from(a > b)))?,
            OpCode::IsZero => {
                let a = self.pop()?;
                self.push(u64::from(a == 0))?;
            }
            OpCode::Jump => {
                let target = u32::from_be_bytes(self.immediate::<4>()?);
                self.jump(target)?;
            }
            OpCode::JumpIf => {
                let target = u32::from_be_bytes(self.immediate::<4>()?);
                if self.pop()? != 0 {
                    self.jump(target)?;
                }
            }
            OpCode::Halt => self.halted = true,
            OpCode::Return => {
                self.return_value = Some(self.pop()?);
                self.halted = true;
            }
            OpCode::Revert => return Err(VmError::Reverted),
            OpCode::SStore => {
                let value = self.pop()?;
                let key = self.pop()?;
                self.storage_changes.insert(key, value);
            }
            OpCode::SLoad => {
                let key = self.pop()?;
                let value = self
                    .storage_changes
                    .get(&key)
                    .or_else(|| self.storage.get(&key))
                    .copied()
                    .unwrap_or(0);
                self.push(value)?;
            }
            OpCode::Caller => self.push(self.context.caller)?,
            OpCode::CallValue => self.push(self.context.call_value)?,
            OpCode::Self_ => self.push(self.context.address)?,
            OpCode::SelfBalance => self.push(self.context.self_balance)?,
            OpCode::Arg => {
                let [index] = self.immediate::<1>()?;
                let value = self
                    .context
                    .args
                    .get(usize::from(index))
                    .copied()
                    .ok_or(VmError::InvalidArgument(index))?;
                self.push(value)?;
            }
            OpCode::ArgCount => self.push(self.context.args.len() as u64)?,
        }

        Ok(())
    }

    fn binary<F>(&mut self, op: F) -> Result<(), VmError>
    where
        F: FnOnce(u64, u64) -> Result<u64, VmError>,
    {
        let b = self.pop()?;
        let a = self.pop()?;
        let result = op(a, b)?;
        self.push(result)
    }

    fn jump(&mut self, target: u32) -> Result<(), VmError> {
        if target as usize >= self.code.len() {
            return Err(VmError::InvalidJump(target));
        }
        self.pc = target as usize;
        Ok(())
    }

    fn push(&mut self, value: u64) -> Result<(), VmError> {
        if self.stack.len() >= MAX_STACK_SIZE {
            return Err(VmError::StackOverflow);
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Result<u64, VmError> {
        self.stack.pop().ok_or(VmError::StackUnderflow)
    }

    /// Read an N-byte immediate and advance past it
    fn immediate<const N: usize>(&mut self) -> Result<[u8; N], VmError> {
        let bytes: [u8; N] = self
            .code
            .get(self.pc..self.pc + N)
            .and_then(|slice| slice.try_into().ok())
            .ok_or(VmError::TruncatedImmediate(self.pc))?;
        self.pc += N;
        Ok(bytes)
    }
}
