//! The state handlers work against while an instruction is processed.
//!
//! Handlers never touch committed state. Every expression they create, and
//! every binding and taint update they make, is staged in an overlay which
//! later reads of the same instruction observe. The `Context` commits the
//! overlay once the handler succeeds, and drops it otherwise.

use log::trace;
use std::collections::BTreeMap;

use crate::architecture::{Architecture, Register, RegisterId};
use crate::ast::{eval, AstContext, Constant, Environment, ExpressionId, NodeId, VariableId};
use crate::concrete::ConcreteState;
use crate::instruction::DecodedInstruction;
use crate::operand::Operand;
use crate::symbolic::lift;
use crate::symbolic::{MemoryCell, Origin, SymbolicEngine, SymbolicView};
use crate::taint::{TaintEngine, TaintState};
use crate::Error;

/// How the taint of a destination is computed from the taint of its sources.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Propagation {
    /// The destination takes the taint of the sources.
    Assignment,
    /// The destination keeps its taint, and gains the taint of the sources.
    Union,
}

/// An expression created by a handler, not yet committed.
#[derive(Clone, Debug)]
pub(crate) struct Pending {
    pub node: NodeId,
    pub bits: usize,
    pub origin: Origin,
    pub tainted: bool,
}

/// A path constraint staged by a branch.
#[derive(Clone, Copy, Debug)]
pub(crate) struct StagedConstraint {
    pub expression: ExpressionId,
    pub taken: bool,
    pub target: u64,
}

/// Staged bindings and taint, layered over the committed state.
pub(crate) struct Overlay<'a> {
    engine: &'a SymbolicEngine,
    taint: &'a TaintEngine,
    base: u64,
    pending: Vec<Pending>,
    registers: BTreeMap<RegisterId, ExpressionId>,
    memory: BTreeMap<u64, MemoryCell>,
    register_taint: BTreeMap<RegisterId, bool>,
    memory_taint: BTreeMap<u64, bool>,
}

impl<'a> Overlay<'a> {
    fn new(engine: &'a SymbolicEngine, taint: &'a TaintEngine) -> Overlay<'a> {
        Overlay {
            engine,
            taint,
            base: engine.next_expression_id().0,
            pending: Vec::new(),
            registers: BTreeMap::new(),
            memory: BTreeMap::new(),
            register_taint: BTreeMap::new(),
            memory_taint: BTreeMap::new(),
        }
    }

    fn push(&mut self, pending: Pending) -> ExpressionId {
        let id = ExpressionId(self.base + self.pending.len() as u64);
        self.pending.push(pending);
        id
    }

    fn pending(&self, id: ExpressionId) -> Option<&Pending> {
        id.0.checked_sub(self.base)
            .and_then(|index| self.pending.get(index as usize))
    }
}

impl<'a> Environment for Overlay<'a> {
    fn variable_value(&self, id: VariableId) -> Option<Constant> {
        self.engine.variable_value(id)
    }

    fn expression_root(&self, id: ExpressionId) -> Option<NodeId> {
        match self.pending(id) {
            Some(pending) => Some(pending.node),
            None => self.engine.expression_root(id),
        }
    }
}

impl<'a> SymbolicView for Overlay<'a> {
    fn register_binding(&self, parent: RegisterId) -> Option<ExpressionId> {
        match self.registers.get(&parent) {
            Some(id) => Some(*id),
            None => self.engine.register_binding(parent),
        }
    }

    fn memory_binding(&self, address: u64) -> Option<MemoryCell> {
        match self.memory.get(&address) {
            Some(cell) => Some(*cell),
            None => self.engine.memory_binding(address),
        }
    }

    fn expression_bits(&self, id: ExpressionId) -> Option<usize> {
        match self.pending(id) {
            Some(pending) => Some(pending.bits),
            None => self.engine.expression_bits(id),
        }
    }
}

impl<'a> TaintState for Overlay<'a> {
    fn is_enabled(&self) -> bool {
        self.taint.is_enabled()
    }

    fn register_taint(&self, parent: RegisterId) -> bool {
        match self.register_taint.get(&parent) {
            Some(taint) => *taint,
            None => self.taint.register_taint(parent),
        }
    }

    fn memory_taint(&self, address: u64) -> bool {
        match self.memory_taint.get(&address) {
            Some(taint) => *taint,
            None => self.taint.memory_taint(address),
        }
    }

    fn set_register_taint(&mut self, parent: RegisterId, taint: bool) {
        self.register_taint.insert(parent, taint);
    }

    fn set_memory_taint(&mut self, address: u64, taint: bool) {
        self.memory_taint.insert(address, taint);
    }
}

/// Everything a handler staged, ready to be committed.
#[derive(Debug)]
pub(crate) struct Staged {
    /// The id of the first pending expression. Pending expression `i` has id
    /// `base + i`.
    pub base: u64,
    pub pending: Vec<Pending>,
    pub registers: BTreeMap<RegisterId, ExpressionId>,
    pub memory: BTreeMap<u64, MemoryCell>,
    pub register_taint: BTreeMap<RegisterId, bool>,
    pub memory_taint: BTreeMap<u64, bool>,
    pub constraint: Option<StagedConstraint>,
    pub is_branch: bool,
    pub taken: bool,
    pub target: Option<u64>,
}

impl Staged {
    pub fn id(&self, index: usize) -> ExpressionId {
        ExpressionId(self.base + index as u64)
    }

    /// The index of a pending expression, or `None` for committed expressions.
    pub fn index(&self, id: ExpressionId) -> Option<usize> {
        id.0.checked_sub(self.base)
            .map(|index| index as usize)
            .filter(|index| *index < self.pending.len())
    }
}

/// The interface between instruction handlers and the engines.
pub struct Semantics<'a> {
    ast: &'a mut AstContext,
    overlay: Overlay<'a>,
    concrete: &'a dyn ConcreteState,
    architecture: &'a dyn Architecture,
    instruction: &'a DecodedInstruction,
    program_counter_written: bool,
    constraint: Option<StagedConstraint>,
    branch: Option<(bool, u64)>,
}

impl<'a> Semantics<'a> {
    pub(crate) fn new(
        ast: &'a mut AstContext,
        engine: &'a SymbolicEngine,
        taint: &'a TaintEngine,
        concrete: &'a dyn ConcreteState,
        architecture: &'a dyn Architecture,
        instruction: &'a DecodedInstruction,
    ) -> Semantics<'a> {
        Semantics {
            ast,
            overlay: Overlay::new(engine, taint),
            concrete,
            architecture,
            instruction,
            program_counter_written: false,
            constraint: None,
            branch: None,
        }
    }

    pub fn ast(&mut self) -> &mut AstContext {
        self.ast
    }

    pub fn architecture(&self) -> &'a dyn Architecture {
        self.architecture
    }

    pub fn instruction(&self) -> &'a DecodedInstruction {
        self.instruction
    }

    pub fn register(&self, id: RegisterId) -> Result<Register, Error> {
        self.architecture.register(id)
    }

    /// Get operand `index` of the instruction.
    pub fn operand(&self, index: usize) -> Result<&'a Operand, Error> {
        self.instruction
            .operands()
            .get(index)
            .ok_or_else(|| Error::IllegalOperands {
                opcode: self.instruction.opcode(),
                signature: format!("missing operand {}", index),
            })
    }

    /// The concrete address of memory operand `index`.
    pub fn operand_address(&self, index: usize) -> Result<(u64, usize), Error> {
        match self.operand(index)? {
            Operand::Memory(memory) => memory
                .address()
                .map(|address| (address, memory.size()))
                .ok_or(Error::MemoryNotSetUp(index)),
            _ => Err(Error::IllegalOperands {
                opcode: self.instruction.opcode(),
                signature: format!("operand {} is not memory", index),
            }),
        }
    }

    /// Lift operand `index` at its own width.
    pub fn lift(&mut self, index: usize) -> Result<NodeId, Error> {
        match self.operand(index)? {
            Operand::Immediate(immediate) => Ok(self.ast.constant(immediate.constant())),
            Operand::Register(register) => self.lift_register(register),
            Operand::Memory(memory) => {
                let address = memory.address().ok_or(Error::MemoryNotSetUp(index))?;
                lift::lift_memory(
                    self.ast,
                    &self.overlay,
                    self.concrete,
                    address,
                    memory.size(),
                    memory.trusted_value(),
                )
            }
        }
    }

    /// Lift operand `index` at `bits` bits. Narrower immediates are
    /// sign-extended, other operands are zero-extended or truncated.
    pub fn lift_resized(&mut self, index: usize, bits: usize) -> Result<NodeId, Error> {
        let node = self.lift(index)?;
        let current = self.ast.bits(node)?;
        match self.operand(index)? {
            Operand::Immediate(_) if current < bits => self.ast.sext(bits - current, node),
            _ => self.ast.resize(bits, node),
        }
    }

    pub fn lift_register(&mut self, register: &Register) -> Result<NodeId, Error> {
        lift::lift_register(self.ast, &self.overlay, self.concrete, register)
    }

    pub fn lift_flag(&mut self, flag: RegisterId) -> Result<NodeId, Error> {
        let flag = self.register(flag)?;
        self.lift_register(&flag)
    }

    /// Lift the effective address of memory operand `index`, at the word size
    /// of the architecture.
    pub fn lift_effective_address(&mut self, index: usize) -> Result<NodeId, Error> {
        let memory = match self.operand(index)? {
            Operand::Memory(memory) => memory,
            _ => {
                return Err(Error::IllegalOperands {
                    opcode: self.instruction.opcode(),
                    signature: format!("operand {} is not memory", index),
                })
            }
        };
        lift::lift_effective_address(
            self.ast,
            &self.overlay,
            self.concrete,
            memory,
            self.architecture.word_size(),
        )
    }

    /// The staged taint of operand `index`. Immediates are never tainted.
    pub fn operand_taint(&self, index: usize) -> Result<bool, Error> {
        Ok(match self.operand(index)? {
            Operand::Immediate(_) => false,
            Operand::Register(register) => self.overlay.is_register_tainted(register),
            Operand::Memory(memory) => {
                let address = memory.address().ok_or(Error::MemoryNotSetUp(index))?;
                self.overlay.is_memory_tainted(address, memory.size())
            }
        })
    }

    pub fn register_taint(&self, register: &Register) -> bool {
        self.overlay.is_register_tainted(register)
    }

    pub fn flag_taint(&self, flag: RegisterId) -> Result<bool, Error> {
        let flag = self.register(flag)?;
        Ok(self.register_taint(&flag))
    }

    /// Evaluate `node` against the staged state.
    pub fn evaluate(&self, node: NodeId) -> Result<Constant, Error> {
        eval(self.ast, node, &self.overlay)
    }

    fn check_bits(&self, node: NodeId, bits: usize) -> Result<(), Error> {
        if self.ast.bits(node)? != bits {
            Err(Error::Sort)
        } else {
            Ok(())
        }
    }

    fn propagate_register(&mut self, register: &Register, propagation: Propagation, taint: bool) -> bool {
        match propagation {
            Propagation::Assignment => self.overlay.assign_register(register, taint),
            Propagation::Union => self.overlay.union_register(register, taint),
        }
    }

    fn stage_register(
        &mut self,
        register: &Register,
        value: NodeId,
        propagation: Propagation,
        taint: bool,
    ) -> Result<(ExpressionId, bool), Error> {
        self.check_bits(value, register.bits())?;
        let parent = self.architecture.parent(register)?;
        let node = if register.is_parent() {
            value
        } else {
            let current = self.lift_register(&parent)?;
            lift::widen_register_write(self.ast, self.architecture, register, value, current)?
        };
        let taint = self.propagate_register(register, propagation, taint);
        let id = self.overlay.push(Pending {
            node,
            bits: parent.bits(),
            origin: Origin::Register(parent.id()),
            tainted: taint,
        });
        trace!("staged {} := {} ({})", parent.id(), id, self.instruction);
        self.overlay.registers.insert(parent.id(), id);
        Ok((id, taint))
    }

    /// Write `value` to `register`, returning the taint of the register
    /// afterwards.
    pub fn write_register(
        &mut self,
        register: &Register,
        value: NodeId,
        propagation: Propagation,
        taint: bool,
    ) -> Result<bool, Error> {
        self.stage_register(register, value, propagation, taint)
            .map(|(_, taint)| taint)
    }

    /// Write `value` to `size` bytes of memory at `address`, returning the
    /// taint of the memory afterwards.
    pub fn write_memory(
        &mut self,
        address: u64,
        size: usize,
        value: NodeId,
        propagation: Propagation,
        taint: bool,
    ) -> Result<bool, Error> {
        self.check_bits(value, size * 8)?;
        let taint = match propagation {
            Propagation::Assignment => self.overlay.assign_memory(address, size, taint),
            Propagation::Union => self.overlay.union_memory(address, size, taint),
        };
        let id = self.overlay.push(Pending {
            node: value,
            bits: size * 8,
            origin: Origin::Memory { address, size },
            tainted: taint,
        });
        trace!("staged [0x{:x}]:{} := {}", address, size * 8, id);
        for byte in 0..size {
            self.overlay.memory.insert(
                address.wrapping_add(byte as u64),
                MemoryCell {
                    expression: id,
                    byte,
                },
            );
        }
        Ok(taint)
    }

    /// Write `value` to operand `index`.
    pub fn write_operand(
        &mut self,
        index: usize,
        value: NodeId,
        propagation: Propagation,
        taint: bool,
    ) -> Result<bool, Error> {
        match self.operand(index)? {
            Operand::Register(register) => {
                self.write_register(register, value, propagation, taint)
            }
            Operand::Memory(memory) => {
                let address = memory.address().ok_or(Error::MemoryNotSetUp(index))?;
                self.write_memory(address, memory.size(), value, propagation, taint)
            }
            Operand::Immediate(_) => Err(Error::IllegalOperands {
                opcode: self.instruction.opcode(),
                signature: format!("operand {} is an immediate destination", index),
            }),
        }
    }

    /// Write a 1-bit flag. Flags take the taint of the value they derive
    /// from.
    pub fn write_flag(&mut self, flag: RegisterId, value: NodeId, taint: bool) -> Result<(), Error> {
        let flag = self.register(flag)?;
        self.write_register(&flag, value, Propagation::Assignment, taint)?;
        Ok(())
    }

    /// Bind the program counter. Returns the id of its expression.
    pub fn set_program_counter(&mut self, value: NodeId, taint: bool) -> Result<ExpressionId, Error> {
        let program_counter = self.architecture.program_counter();
        let (id, _) = self.stage_register(&program_counter, value, Propagation::Assignment, taint)?;
        self.program_counter_written = true;
        Ok(id)
    }

    pub fn program_counter_written(&self) -> bool {
        self.program_counter_written
    }

    /// Record the outcome of a branch.
    pub fn set_branch(&mut self, taken: bool, target: u64) {
        self.branch = Some((taken, target));
    }

    /// Stage a path constraint asserting that the program counter expression
    /// `program_counter` equals `destination`.
    pub fn add_path_constraint(
        &mut self,
        program_counter: ExpressionId,
        taken: bool,
        destination: u64,
        taint: bool,
    ) -> Result<(), Error> {
        let bits = self.architecture.program_counter().bits();
        let reference = self.ast.reference(program_counter, bits);
        let destination_node = self.ast.bv(destination, bits);
        let predicate = self.ast.equal(reference, destination_node)?;
        let expression = self.overlay.push(Pending {
            node: predicate,
            bits: 1,
            origin: Origin::Volatile,
            tainted: taint,
        });
        self.constraint = Some(StagedConstraint {
            expression,
            taken,
            target: destination,
        });
        Ok(())
    }

    pub(crate) fn finish(self) -> Staged {
        let (taken, target) = match self.branch {
            Some((taken, target)) => (taken, Some(target)),
            None => (false, None),
        };
        Staged {
            base: self.overlay.base,
            pending: self.overlay.pending,
            registers: self.overlay.registers,
            memory: self.overlay.memory,
            register_taint: self.overlay.register_taint,
            memory_taint: self.overlay.memory_taint,
            constraint: self.constraint,
            is_branch: self.branch.is_some(),
            taken,
            target,
        }
    }
}
