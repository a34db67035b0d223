//! Instructions, before and after processing.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ast::ExpressionId;
use crate::operand::Operand;
use crate::semantics::Opcode;

/// An instruction as handed over by a decoder.
///
/// Memory operands must be set up with their concrete addresses before the
/// instruction is processed.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct DecodedInstruction {
    address: u64,
    next_address: u64,
    opcode: Opcode,
    disassembly: String,
    operands: Vec<Operand>,
    thread_id: u64,
}

impl DecodedInstruction {
    /// Create a new `DecodedInstruction`.
    ///
    /// * `address` - The address of this instruction.
    /// * `next_address` - The address of the instruction which follows it in
    /// memory.
    pub fn new<S: Into<String>>(
        address: u64,
        next_address: u64,
        opcode: Opcode,
        disassembly: S,
    ) -> DecodedInstruction {
        DecodedInstruction {
            address,
            next_address,
            opcode,
            disassembly: disassembly.into(),
            operands: Vec::new(),
            thread_id: 0,
        }
    }

    /// Append an operand.
    pub fn operand(mut self, operand: Operand) -> DecodedInstruction {
        self.operands.push(operand);
        self
    }

    pub fn thread(mut self, thread_id: u64) -> DecodedInstruction {
        self.thread_id = thread_id;
        self
    }

    pub fn address(&self) -> u64 {
        self.address
    }

    pub fn next_address(&self) -> u64 {
        self.next_address
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn disassembly(&self) -> &str {
        &self.disassembly
    }

    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }

    /// Mutable access to the operands, to set up memory operands.
    pub fn operands_mut(&mut self) -> &mut [Operand] {
        &mut self.operands
    }

    pub fn thread_id(&self) -> u64 {
        self.thread_id
    }
}

impl fmt::Display for DecodedInstruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{:x}: {}", self.address, self.disassembly)
    }
}

/// A processed instruction, with the symbolic expressions it produced and its
/// effect on control flow.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Instruction {
    address: u64,
    next_address: u64,
    opcode: Opcode,
    disassembly: String,
    operands: Vec<Operand>,
    thread_id: u64,
    expressions: Vec<ExpressionId>,
    is_branch: bool,
    taken: bool,
    target: Option<u64>,
}

impl Instruction {
    pub(crate) fn new(
        decoded: &DecodedInstruction,
        expressions: Vec<ExpressionId>,
        is_branch: bool,
        taken: bool,
        target: Option<u64>,
    ) -> Instruction {
        Instruction {
            address: decoded.address,
            next_address: decoded.next_address,
            opcode: decoded.opcode,
            disassembly: decoded.disassembly.clone(),
            operands: decoded.operands.clone(),
            thread_id: decoded.thread_id,
            expressions,
            is_branch,
            taken,
            target,
        }
    }

    pub fn address(&self) -> u64 {
        self.address
    }

    pub fn next_address(&self) -> u64 {
        self.next_address
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn disassembly(&self) -> &str {
        &self.disassembly
    }

    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }

    pub fn thread_id(&self) -> u64 {
        self.thread_id
    }

    /// The ids of the symbolic expressions this instruction produced, in the
    /// order they were created.
    pub fn expressions(&self) -> &[ExpressionId] {
        &self.expressions
    }

    /// True if this instruction may change control flow.
    pub fn is_branch(&self) -> bool {
        self.is_branch
    }

    /// True if this instruction is a branch which was taken.
    pub fn taken(&self) -> bool {
        self.taken
    }

    /// The branch target, for branches.
    pub fn target(&self) -> Option<u64> {
        self.target
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{:x}: {}", self.address, self.disassembly)
    }
}
