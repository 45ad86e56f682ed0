//! Contract support for the execution host
//!
//! Transactions that carry call data are delivered to contracts running on a
//! small stack-based VM. A contract sees the calling wallet through `CALLER`,
//! the transferred amount through `CALLVALUE` and the decoded payload words
//! through `ARG n`.
//!
//! # Example
//!
//! ```rust
//! use quorum_wallet::contract::{Compiler, ContractManager, Invocation};
//! use quorum_wallet::core::Address;
//!
//! let mut compiler = Compiler::new();
//! let bytecode = compiler.compile("
//!     PUSH 42
//!     RETURN
//! ").unwrap();
//!
//! let mut manager = ContractManager::new();
//! let address = manager.deploy(bytecode, Address::from_low_u64_be(1)).unwrap();
//!
//! let result = manager.call(&address, Invocation::default()).unwrap();
//! assert_eq!(result.return_value, Some(42));
//! ```

pub mod compiler;
pub mod contract;
pub mod opcodes;
pub mod vm;

pub use compiler::{disassemble, Compiler, CompilerError};
pub use contract::{Contract, ContractError, ContractManager, Invocation};
pub use opcodes::OpCode;
pub use vm::{ExecutionContext, ExecutionResult, VmError, DEFAULT_GAS_LIMIT, VM};
