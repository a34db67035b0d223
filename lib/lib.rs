//! Kestrel: Instruction Semantics, Symbolic Expressions and Taint.
//!
//! Kestrel lifts decoded machine instructions into bitvector formulas, tracks
//! which pieces of program state are influenced by untrusted input, and keeps
//! the path condition of the execution trace being followed.
//!
//! Kestrel does not decode machine code, and it does not run the program. An
//! external decoder hands Kestrel a `DecodedInstruction`, and an external
//! tracer or emulator provides concrete register and memory values through the
//! `ConcreteState` trait. In return, Kestrel produces symbolic expressions,
//! flag effects, taint updates and path constraints.
//!
//! # Layout
//!
//! * `ast` - The hash-consed formula arena, constant evaluation and the
//! simplification pipeline.
//! * `architecture` - Register tables and the sub-register aliasing rules of
//! supported architectures.
//! * `operand` - Immediate, register and memory operand descriptors.
//! * `symbolic` - Symbolic expressions, symbolic variables, the symbolic state
//! and the path constraint log.
//! * `taint` - Per-register and per-byte taint with assignment and union
//! propagation.
//! * `semantics` - The dispatch table and the per-opcode semantics.
//! * `solver` - The contract with external SMT solvers, and a z3 process
//! adapter.
//! * `context` - `Context`, which ties all of the above together.
//!
//! # Example
//!
//! ```
//! use kestrel::architecture::{Amd64, RegisterId};
//! use kestrel::concrete::ConcreteMemory;
//! use kestrel::instruction::DecodedInstruction;
//! use kestrel::operand::Operand;
//! use kestrel::semantics::Opcode;
//! use kestrel::{Context, RC};
//!
//! let mut context = Context::new(Box::new(ConcreteMemory::new()));
//! context.set_architecture(RC::new(Amd64::new()));
//!
//! let rax = context.register(RegisterId::Rax).unwrap();
//! context.taint_register(&rax);
//!
//! let decoded = DecodedInstruction::new(0x1000, 0x1004, Opcode::Shl, "shl rax, 3")
//!     .operand(Operand::Register(rax))
//!     .operand(Operand::immediate(3, 8));
//!
//! let instruction = context.process(&decoded).unwrap();
//! assert!(!instruction.expressions().is_empty());
//! assert!(context.is_register_tainted(&rax));
//! ```

pub mod architecture;
pub mod ast;
pub mod concrete;
pub mod context;
pub mod instruction;
pub mod operand;
pub mod options;
pub mod semantics;
pub mod solver;
pub mod symbolic;
pub mod taint;

pub use context::Context;

use thiserror::Error;

use crate::architecture::RegisterId;
use crate::ast::{ExpressionId, NodeId, VariableId};
use crate::semantics::Opcode;

#[cfg(not(feature = "thread_safe"))]
pub type RC<T> = std::rc::Rc<T>;
#[cfg(feature = "thread_safe")]
pub type RC<T> = std::sync::Arc<T>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Architecture is not defined")]
    ArchitectureNotSet,
    #[error("Arithmetic error: {0}")]
    Arithmetic(String),
    #[error("Formula references expression {0}, which must be materialized first")]
    DanglingReference(ExpressionId),
    #[error("Illegal operand combination for {opcode}: ({signature})")]
    IllegalOperands { opcode: Opcode, signature: String },
    #[error("Invalid symbolic expression id {0}")]
    InvalidExpressionId(ExpressionId),
    #[error("Invalid ast node id {0}")]
    InvalidNodeId(NodeId),
    #[error("Register {0} is not available in architecture {1}")]
    InvalidRegister(RegisterId, &'static str),
    #[error("Invalid symbolic variable id {0}")]
    InvalidVariableId(VariableId),
    #[error("No symbolic variable named {0}")]
    InvalidVariableName(String),
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Memory operand {0} must be set up with a concrete address")]
    MemoryNotSetUp(usize),
    #[error("No solver is attached to this context")]
    NoSolver,
    #[error("Semantics for {opcode} ({signature}) are not implemented")]
    NotImplemented { opcode: Opcode, signature: String },
    #[error("Solver error: {0}")]
    Solver(String),
    #[error("Sort error, invalid bitness between expressions or bad extension")]
    Sort,
    #[error("Utf8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl Error {
    /// True if this error reports an architecturally legal instruction for
    /// which no semantics exist yet.
    pub fn is_coverage_gap(&self) -> bool {
        matches!(self, Error::NotImplemented { .. })
    }

    /// True if this error was raised before any processing took place because
    /// the caller did not satisfy a precondition.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Error::ArchitectureNotSet | Error::MemoryNotSetUp(_))
    }
}
