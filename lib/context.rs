//! `Context` ties the formula arena, the symbolic state, the taint state and
//! the path constraint log together, and processes instructions against them.
//!
//! Processing is build-then-commit. A handler builds every formula it needs
//! and stages its writes in an overlay. Only once the handler succeeds are the
//! staged expressions entered into the expression table, the bindings and
//! taint updated, and the path constraint appended. A failing instruction
//! leaves no trace outside of unreachable nodes in the arena.

use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::architecture::{Architecture, Register, RegisterId};
use crate::ast::simplification::{ConstantFolding, IdentityElimination, Pipeline, Simplification};
use crate::ast::{
    eval, node_to_string, AstContext, AstStatistics, Constant, Environment, ExpressionId, NodeId,
    VariableId,
};
use crate::concrete::ConcreteState;
use crate::instruction::{DecodedInstruction, Instruction};
use crate::operand::{MemoryOperand, Operand, OperandKind};
use crate::options::{Mode, Options};
use crate::semantics::{self, Semantics, Staged};
use crate::solver::{Model, Solver};
use crate::symbolic::lift;
use crate::symbolic::{
    MemoryCell, Origin, PathConstraint, PathConstraints, SymbolicEngine, SymbolicExpression,
    SymbolicVariable,
};
use crate::taint::{TaintEngine, TaintState};
use crate::{Error, RC};

const CONSTANT_FOLDING: &str = "constant-folding";
const IDENTITY_ELIMINATION: &str = "identity-elimination";

/// Resolves references to expressions which are staged, but not yet
/// committed.
struct CommitEnvironment<'a> {
    engine: &'a SymbolicEngine,
    staged: &'a Staged,
    nodes: &'a [NodeId],
}

impl<'a> Environment for CommitEnvironment<'a> {
    fn variable_value(&self, id: VariableId) -> Option<Constant> {
        self.engine.variable_value(id)
    }

    fn expression_root(&self, id: ExpressionId) -> Option<NodeId> {
        match self.staged.index(id) {
            Some(index) => self.nodes.get(index).copied(),
            None => self.engine.expression_root(id),
        }
    }
}

/// Values computed from committed formulas, to be written back to the
/// concrete state.
#[derive(Default)]
struct WriteBack {
    registers: Vec<(Register, Constant)>,
    memory: Vec<(u64, u8)>,
}

/// A serializable export of the state of a `Context`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Snapshot {
    pub architecture: Option<String>,
    pub options: Options,
    pub registers: BTreeMap<RegisterId, ExpressionId>,
    pub memory: BTreeMap<u64, MemoryCell>,
    pub expressions: Vec<SymbolicExpression>,
    /// The formula of every expression, in SMT-LIB 2 syntax.
    pub formulas: BTreeMap<ExpressionId, String>,
    pub variables: Vec<SymbolicVariable>,
    pub path_constraints: Vec<PathConstraint>,
    pub tainted_registers: Vec<RegisterId>,
    pub tainted_memory: Vec<u64>,
    pub statistics: AstStatistics,
}

impl Snapshot {
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }
}

/// The state of an analysis.
pub struct Context {
    architecture: Option<RC<dyn Architecture>>,
    options: Options,
    ast: AstContext,
    symbolic: SymbolicEngine,
    taint: TaintEngine,
    path: PathConstraints,
    pipeline: Pipeline,
    concrete: Box<dyn ConcreteState>,
    solver: Option<Box<dyn Solver>>,
}

impl Context {
    /// Create a `Context` with default `Options` over the given concrete
    /// state.
    pub fn new(concrete: Box<dyn ConcreteState>) -> Context {
        Context::with_options(concrete, Options::default())
    }

    pub fn with_options(concrete: Box<dyn ConcreteState>, options: Options) -> Context {
        let pipeline = if options.default_simplifications() {
            Pipeline::with_defaults(options.max_simplification_rounds())
        } else {
            Pipeline::new(options.max_simplification_rounds())
        };
        Context {
            architecture: None,
            taint: TaintEngine::new(options.taint()),
            options,
            ast: AstContext::new(),
            symbolic: SymbolicEngine::new(),
            path: PathConstraints::new(),
            pipeline,
            concrete,
            solver: None,
        }
    }

    /// Set the architecture. All symbolic and taint state is reset.
    pub fn set_architecture(&mut self, architecture: RC<dyn Architecture>) {
        debug!("architecture set to {}", architecture.name());
        self.architecture = Some(architecture);
        self.reset();
    }

    pub fn architecture(&self) -> Option<&dyn Architecture> {
        self.architecture.as_deref()
    }

    fn require_architecture(&self) -> Result<RC<dyn Architecture>, Error> {
        self.architecture.clone().ok_or(Error::ArchitectureNotSet)
    }

    /// Look up a register of the current architecture.
    pub fn register(&self, id: RegisterId) -> Result<Register, Error> {
        self.require_architecture()?.register(id)
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Replace the options. The taint engine and the built-in simplification
    /// passes follow the new options, existing state is kept.
    pub fn set_options(&mut self, options: Options) {
        self.taint.set_enabled(options.taint());
        self.pipeline
            .set_max_rounds(options.max_simplification_rounds());
        if options.default_simplifications() {
            let names = self.pipeline.names();
            let folding = names.contains(&CONSTANT_FOLDING);
            let identities = names.contains(&IDENTITY_ELIMINATION);
            if !folding {
                self.pipeline.push(Box::new(ConstantFolding));
            }
            if !identities {
                self.pipeline.push(Box::new(IdentityElimination));
            }
        } else {
            self.pipeline.remove(CONSTANT_FOLDING);
            self.pipeline.remove(IDENTITY_ELIMINATION);
        }
        self.options = options;
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.options.set_mode(mode);
    }

    pub fn set_taint_enabled(&mut self, enabled: bool) {
        self.options.set_taint(enabled);
        self.taint.set_enabled(enabled);
    }

    pub fn set_solver_simplification(&mut self, enabled: bool) {
        self.options.set_solver_simplification(enabled);
    }

    pub fn set_solver(&mut self, solver: Box<dyn Solver>) {
        self.solver = Some(solver);
    }

    pub fn has_solver(&self) -> bool {
        self.solver.is_some()
    }

    pub fn concrete_state(&self) -> &dyn ConcreteState {
        self.concrete.as_ref()
    }

    pub fn concrete_state_mut(&mut self) -> &mut dyn ConcreteState {
        self.concrete.as_mut()
    }

    pub fn set_concrete_state(&mut self, concrete: Box<dyn ConcreteState>) {
        self.concrete = concrete;
    }

    /// The formula arena.
    pub fn ast(&self) -> &AstContext {
        &self.ast
    }

    /// The formula arena, to build formulas in.
    pub fn ast_mut(&mut self) -> &mut AstContext {
        &mut self.ast
    }

    pub fn symbolic_engine(&self) -> &SymbolicEngine {
        &self.symbolic
    }

    pub fn taint_engine(&self) -> &TaintEngine {
        &self.taint
    }

    /// The taint engine, for propagation outside of instruction processing.
    pub fn taint_engine_mut(&mut self) -> &mut TaintEngine {
        &mut self.taint
    }

    /// Process one decoded instruction.
    ///
    /// On error, no symbolic expression, binding, taint or path constraint is
    /// changed.
    pub fn process(&mut self, decoded: &DecodedInstruction) -> Result<Instruction, Error> {
        let architecture = self.require_architecture()?;

        for (index, operand) in decoded.operands().iter().enumerate() {
            if let Operand::Memory(memory) = operand {
                if memory.size() == 0 {
                    return Err(Error::IllegalOperands {
                        opcode: decoded.opcode(),
                        signature: format!("memory operand {} has no size", index),
                    });
                }
                if memory.needs_setup() {
                    return Err(Error::MemoryNotSetUp(index));
                }
            }
        }

        let kinds: Vec<OperandKind> = decoded.operands().iter().map(|o| o.kind()).collect();
        let handler = match semantics::lookup(decoded.opcode(), &kinds) {
            Ok(handler) => handler,
            Err(e) => {
                if e.is_coverage_gap() {
                    debug!("{}: {}", decoded, e);
                }
                return Err(e);
            }
        };

        trace!("processing {}", decoded);
        let staged = {
            let mut semantics = Semantics::new(
                &mut self.ast,
                &self.symbolic,
                &self.taint,
                self.concrete.as_ref(),
                architecture.as_ref(),
                decoded,
            );
            semantics::execute(&mut semantics, handler)?;
            semantics.finish()
        };

        self.commit(decoded, architecture.as_ref(), staged)
    }

    /// The pending expressions a `Concolic` context keeps: tainted ones, and
    /// the pending expressions they reference.
    fn concolic_retention(&self, staged: &Staged) -> Result<Vec<bool>, Error> {
        let mut kept: Vec<bool> = staged.pending.iter().map(|p| p.tainted).collect();
        let mut queue: Vec<usize> = (0..kept.len()).filter(|index| kept[*index]).collect();
        while let Some(index) = queue.pop() {
            for reference in self.ast.collect_references(staged.pending[index].node)? {
                if let Some(referenced) = staged.index(reference) {
                    if !kept[referenced] {
                        kept[referenced] = true;
                        queue.push(referenced);
                    }
                }
            }
        }
        Ok(kept)
    }

    fn write_back_values(
        &self,
        architecture: &dyn Architecture,
        staged: &Staged,
        nodes: &[NodeId],
    ) -> Result<WriteBack, Error> {
        let environment = CommitEnvironment {
            engine: &self.symbolic,
            staged,
            nodes,
        };
        let value_of = |id: ExpressionId| -> Result<Constant, Error> {
            let root = environment
                .expression_root(id)
                .ok_or(Error::InvalidExpressionId(id))?;
            eval(&self.ast, root, &environment)
        };

        let mut write_back = WriteBack::default();
        for (parent, id) in &staged.registers {
            let register = architecture.register(*parent)?;
            write_back.registers.push((register, value_of(*id)?));
        }

        let mut bytes: BTreeMap<ExpressionId, Vec<u8>> = BTreeMap::new();
        for (address, cell) in &staged.memory {
            if !bytes.contains_key(&cell.expression) {
                bytes.insert(cell.expression, value_of(cell.expression)?.to_bytes_le());
            }
            let byte = bytes
                .get(&cell.expression)
                .and_then(|bytes| bytes.get(cell.byte))
                .copied()
                .ok_or(Error::Sort)?;
            write_back.memory.push((*address, byte));
        }
        Ok(write_back)
    }

    fn commit(
        &mut self,
        decoded: &DecodedInstruction,
        architecture: &dyn Architecture,
        staged: Staged,
    ) -> Result<Instruction, Error> {
        let mode = self.options.mode();
        let kept = match mode {
            Mode::FullEmulation => vec![true; staged.pending.len()],
            Mode::ConcreteOnly => vec![false; staged.pending.len()],
            Mode::Concolic => self.concolic_retention(&staged)?,
        };

        let use_solver = self.options.solver_simplification();
        let mut nodes: Vec<NodeId> = staged.pending.iter().map(|p| p.node).collect();
        for (index, node) in nodes.iter_mut().enumerate() {
            if kept[index] {
                *node = self.simplify(*node, use_solver)?;
            }
        }

        let write_back = if mode == Mode::FullEmulation {
            self.write_back_values(architecture, &staged, &nodes)?
        } else {
            WriteBack::default()
        };

        // Nothing below may fail.
        let mut expressions = Vec::new();
        for (index, pending) in staged.pending.iter().enumerate() {
            if !kept[index] {
                continue;
            }
            let id = staged.id(index);
            self.symbolic.insert_expression(SymbolicExpression::new(
                id,
                nodes[index],
                pending.bits,
                decoded.disassembly().to_string(),
                pending.origin,
                pending.tainted,
            ));
            expressions.push(id);
        }
        self.symbolic.skip_to(staged.id(staged.pending.len()));

        let is_kept = |id: ExpressionId| staged.index(id).map(|index| kept[index]).unwrap_or(false);

        for (parent, id) in &staged.registers {
            if is_kept(*id) {
                self.symbolic.bind_register(*parent, *id);
            } else {
                self.symbolic.unbind_register(*parent);
            }
        }
        for (address, cell) in &staged.memory {
            if is_kept(cell.expression) {
                self.symbolic.bind_memory_cell(*address, *cell);
            } else {
                self.symbolic.unbind_memory(*address, 1);
            }
        }

        for (parent, taint) in &staged.register_taint {
            self.taint.set_register_taint(*parent, *taint);
        }
        for (address, taint) in &staged.memory_taint {
            self.taint.set_memory_taint(*address, *taint);
        }

        if let Some(constraint) = staged.constraint {
            if is_kept(constraint.expression) {
                self.path.push(PathConstraint::new(
                    constraint.expression,
                    decoded.address(),
                    constraint.taken,
                    constraint.target,
                ));
            } else {
                debug!("{}: path constraint not retained in {:?} mode", decoded, mode);
            }
        }

        for (register, value) in &write_back.registers {
            self.concrete.set_register_value(register, value);
        }
        for (address, byte) in write_back.memory {
            self.concrete.set_memory_byte(address, byte);
        }

        trace!(
            "{} committed {} of {} expressions",
            decoded,
            expressions.len(),
            staged.pending.len()
        );

        Ok(Instruction::new(
            decoded,
            expressions,
            staged.is_branch,
            staged.taken,
            staged.target,
        ))
    }

    fn simplify(&mut self, node: NodeId, use_solver: bool) -> Result<NodeId, Error> {
        let mut node = self.pipeline.run(&mut self.ast, node)?;
        if !use_solver {
            return Ok(node);
        }
        if let Some(solver) = self.solver.as_mut() {
            // Solvers only see self-contained formulas.
            if self.ast.collect_references(node)?.is_empty() {
                node = match solver.simplify(&mut self.ast, node) {
                    Ok(simplified) => simplified,
                    Err(e) => {
                        warn!("{} could not simplify {}: {}", solver.name(), node, e);
                        return Err(e);
                    }
                };
            }
        }
        Ok(node)
    }

    /// Run the simplification pipeline over `node`, and the solver as well if
    /// `use_solver` is set and a solver is attached.
    pub fn process_simplification(&mut self, node: NodeId, use_solver: bool) -> Result<NodeId, Error> {
        self.simplify(node, use_solver)
    }

    /// Append a simplification pass to the pipeline.
    pub fn record_simplification(&mut self, simplification: Box<dyn Simplification>) {
        debug!("recording simplification {}", simplification.name());
        self.pipeline.push(simplification);
    }

    /// Remove every simplification pass named `name`.
    pub fn remove_simplification(&mut self, name: &str) -> bool {
        self.pipeline.remove(name)
    }

    pub fn simplifications(&self) -> Vec<&str> {
        self.pipeline.names()
    }

    fn new_expression(
        &mut self,
        node: NodeId,
        comment: &str,
        origin: Origin,
        tainted: bool,
    ) -> Result<ExpressionId, Error> {
        let bits = self.ast.bits(node)?;
        let use_solver = self.options.solver_simplification();
        let node = self.simplify(node, use_solver)?;
        Ok(self
            .symbolic
            .new_expression(node, bits, comment.to_string(), origin, tainted))
    }

    /// Create a volatile expression, which is not bound to any location.
    pub fn new_symbolic_expression(&mut self, node: NodeId, comment: &str) -> Result<ExpressionId, Error> {
        self.new_volatile_expression(node, comment)
    }

    pub fn new_volatile_expression(&mut self, node: NodeId, comment: &str) -> Result<ExpressionId, Error> {
        self.new_expression(node, comment, Origin::Volatile, false)
    }

    /// Create an expression for `register` and bind it. Writes to child
    /// registers update their parent.
    pub fn new_register_expression(
        &mut self,
        node: NodeId,
        register: &Register,
        comment: &str,
    ) -> Result<ExpressionId, Error> {
        let architecture = self.require_architecture()?;
        if self.ast.bits(node)? != register.bits() {
            return Err(Error::Sort);
        }
        let parent = architecture.parent(register)?;
        let node = if register.is_parent() {
            node
        } else {
            let current = lift::lift_register(&mut self.ast, &self.symbolic, self.concrete.as_ref(), &parent)?;
            lift::widen_register_write(&mut self.ast, architecture.as_ref(), register, node, current)?
        };
        let tainted = self.taint.is_register_tainted(register);
        let id = self.new_expression(node, comment, Origin::Register(parent.id()), tainted)?;
        self.symbolic.bind_register(parent.id(), id);
        Ok(id)
    }

    /// Create an expression for memory at `address` and bind it. The width of
    /// `node` must be a whole number of bytes.
    pub fn new_memory_expression(
        &mut self,
        node: NodeId,
        address: u64,
        comment: &str,
    ) -> Result<ExpressionId, Error> {
        let bits = self.ast.bits(node)?;
        if bits % 8 != 0 {
            return Err(Error::Sort);
        }
        let size = bits / 8;
        let tainted = self.taint.is_memory_tainted(address, size);
        let id = self.new_expression(node, comment, Origin::Memory { address, size }, tainted)?;
        self.symbolic.bind_memory(address, size, id);
        Ok(id)
    }

    /// Bind `register` to an existing expression.
    pub fn assign_symbolic_expression_to_register(
        &mut self,
        id: ExpressionId,
        register: &Register,
    ) -> Result<(), Error> {
        let bits = self.symbolic.expression(id)?.bits();
        if bits != register.bits() {
            return Err(Error::Sort);
        }
        if register.is_parent() {
            self.symbolic.bind_register(register.id(), id);
            return Ok(());
        }
        let comment = self.symbolic.expression(id)?.comment().to_string();
        let reference = self.ast.reference(id, bits);
        self.new_register_expression(reference, register, &comment)?;
        Ok(())
    }

    /// Bind memory at `address` to an existing expression.
    pub fn assign_symbolic_expression_to_memory(
        &mut self,
        id: ExpressionId,
        address: u64,
    ) -> Result<(), Error> {
        let bits = self.symbolic.expression(id)?.bits();
        if bits % 8 != 0 {
            return Err(Error::Sort);
        }
        self.symbolic.bind_memory(address, bits / 8, id);
        Ok(())
    }

    /// Lift an operand against the current symbolic state.
    pub fn build_symbolic_operand(&mut self, operand: &Operand) -> Result<NodeId, Error> {
        match operand {
            Operand::Immediate(immediate) => Ok(self.ast.constant(immediate.constant())),
            Operand::Register(register) => {
                lift::lift_register(&mut self.ast, &self.symbolic, self.concrete.as_ref(), register)
            }
            Operand::Memory(memory) => {
                let address = memory.address().ok_or(Error::MemoryNotSetUp(0))?;
                lift::lift_memory(
                    &mut self.ast,
                    &self.symbolic,
                    self.concrete.as_ref(),
                    address,
                    memory.size(),
                    memory.trusted_value(),
                )
            }
        }
    }

    /// Lift the effective address of a memory operand.
    pub fn build_effective_address(&mut self, memory: &MemoryOperand) -> Result<NodeId, Error> {
        let bits = self.require_architecture()?.word_size();
        lift::lift_effective_address(
            &mut self.ast,
            &self.symbolic,
            self.concrete.as_ref(),
            memory,
            bits,
        )
    }

    pub fn symbolic_expression(&self, id: ExpressionId) -> Result<&SymbolicExpression, Error> {
        self.symbolic.expression(id)
    }

    pub fn symbolic_expressions(&self) -> &BTreeMap<ExpressionId, SymbolicExpression> {
        self.symbolic.expressions()
    }

    /// Every expression which was tainted when it was created.
    pub fn tainted_symbolic_expressions(&self) -> Vec<&SymbolicExpression> {
        self.symbolic
            .expressions()
            .values()
            .filter(|expression| expression.is_tainted())
            .collect()
    }

    /// Inline every expression `node` references, transitively.
    pub fn full_ast(&mut self, node: NodeId) -> Result<NodeId, Error> {
        self.ast.materialize(node, &self.symbolic)
    }

    pub fn full_ast_from_id(&mut self, id: ExpressionId) -> Result<NodeId, Error> {
        let node = self.symbolic.expression(id)?.node();
        self.full_ast(node)
    }

    /// Evaluate `node`, with every symbolic variable set to its concrete
    /// value.
    pub fn evaluate(&self, node: NodeId) -> Result<Constant, Error> {
        eval(&self.ast, node, &self.symbolic)
    }

    /// Render `node` in SMT-LIB 2 syntax.
    pub fn node_to_string(&self, node: NodeId) -> Result<String, Error> {
        node_to_string(&self.ast, node)
    }

    pub fn ast_statistics(&self) -> AstStatistics {
        self.ast.stats()
    }

    /// A model satisfying the 1-bit formula `node`, if one exists.
    pub fn get_model(&mut self, node: NodeId) -> Result<Option<Model>, Error> {
        Ok(self.get_models(node, 1)?.into_iter().next())
    }

    /// Up to `limit` distinct models satisfying the 1-bit formula `node`.
    pub fn get_models(&mut self, node: NodeId, limit: usize) -> Result<Vec<Model>, Error> {
        if self.solver.is_none() {
            return Err(Error::NoSolver);
        }
        if self.ast.bits(node)? != 1 {
            return Err(Error::Sort);
        }
        let formula = self.full_ast(node)?;
        match self.solver.as_mut() {
            Some(solver) => solver.get_models(&self.ast, formula, limit),
            None => Err(Error::NoSolver),
        }
    }

    pub fn symbolic_variable(&self, id: VariableId) -> Result<&SymbolicVariable, Error> {
        self.symbolic.variable(id)
    }

    pub fn symbolic_variable_by_name(&self, name: &str) -> Result<&SymbolicVariable, Error> {
        self.symbolic.variable_by_name(name)
    }

    pub fn symbolic_variables(&self) -> &[SymbolicVariable] {
        self.symbolic.variables()
    }

    /// Create a free symbolic variable, with a concrete value of zero.
    pub fn new_symbolic_variable(&mut self, bits: usize, comment: &str) -> VariableId {
        self.symbolic
            .new_variable(bits, comment.to_string(), Constant::new(0, bits), Origin::Volatile)
    }

    /// Replace the value of `register` with a fresh symbolic variable, whose
    /// concrete value is the current value of the register.
    pub fn convert_register_to_symbolic_variable(
        &mut self,
        register: &Register,
        comment: &str,
    ) -> Result<VariableId, Error> {
        let value = self.symbolic_register_value(register)?;
        let parent = register.parent();
        let id = self.symbolic.new_variable(
            register.bits(),
            comment.to_string(),
            value,
            Origin::Register(parent),
        );
        let node = self.ast.variable(id, register.bits());
        self.new_register_expression(node, register, comment)?;
        Ok(id)
    }

    /// Replace `size` bytes of memory at `address` with a fresh symbolic
    /// variable.
    pub fn convert_memory_to_symbolic_variable(
        &mut self,
        address: u64,
        size: usize,
        comment: &str,
    ) -> Result<VariableId, Error> {
        let value = self.symbolic_memory_value(address, size)?;
        let id = self.symbolic.new_variable(
            size * 8,
            comment.to_string(),
            value,
            Origin::Memory { address, size },
        );
        let node = self.ast.variable(id, size * 8);
        self.new_memory_expression(node, address, comment)?;
        Ok(id)
    }

    /// Replace an expression with a fresh symbolic variable.
    ///
    /// A new expression holding the variable is bound to every location the
    /// converted expression was bound to. The converted expression itself is
    /// left as is.
    pub fn convert_expression_to_symbolic_variable(
        &mut self,
        id: ExpressionId,
        comment: &str,
    ) -> Result<VariableId, Error> {
        let expression = self.symbolic.expression(id)?.clone();
        let value = eval(&self.ast, expression.node(), &self.symbolic)?;
        let variable = self.symbolic.new_variable(
            expression.bits(),
            comment.to_string(),
            value,
            expression.origin(),
        );
        let node = self.ast.variable(variable, expression.bits());
        let replacement = self.symbolic.new_expression(
            node,
            expression.bits(),
            comment.to_string(),
            expression.origin(),
            expression.is_tainted(),
        );

        let registers: Vec<RegisterId> = self
            .symbolic
            .registers()
            .iter()
            .filter(|(_, bound)| **bound == id)
            .map(|(register, _)| *register)
            .collect();
        for register in registers {
            self.symbolic.bind_register(register, replacement);
        }

        let cells: Vec<(u64, usize)> = self
            .symbolic
            .memory()
            .iter()
            .filter(|(_, cell)| cell.expression == id)
            .map(|(address, cell)| (*address, cell.byte))
            .collect();
        for (address, byte) in cells {
            self.symbolic.bind_memory_cell(
                address,
                MemoryCell {
                    expression: replacement,
                    byte,
                },
            );
        }
        Ok(variable)
    }

    pub fn symbolic_registers(&self) -> &BTreeMap<RegisterId, ExpressionId> {
        self.symbolic.registers()
    }

    pub fn symbolic_memory(&self) -> &BTreeMap<u64, MemoryCell> {
        self.symbolic.memory()
    }

    /// The expression the parent of `register` is bound to.
    pub fn symbolic_register_id(&self, register: &Register) -> Option<ExpressionId> {
        self.symbolic.registers().get(&register.parent()).copied()
    }

    pub fn symbolic_memory_id(&self, address: u64) -> Option<MemoryCell> {
        self.symbolic.memory().get(&address).copied()
    }

    /// The value of `register`, evaluated from its formula.
    pub fn symbolic_register_value(&mut self, register: &Register) -> Result<Constant, Error> {
        let node = lift::lift_register(&mut self.ast, &self.symbolic, self.concrete.as_ref(), register)?;
        self.evaluate(node)
    }

    /// The value of `size` bytes of memory at `address`, evaluated from their
    /// formulas.
    pub fn symbolic_memory_value(&mut self, address: u64, size: usize) -> Result<Constant, Error> {
        let node = lift::lift_memory(
            &mut self.ast,
            &self.symbolic,
            self.concrete.as_ref(),
            address,
            size,
            None,
        )?;
        self.evaluate(node)
    }

    pub fn concretize_register(&mut self, register: &Register) {
        self.symbolic.unbind_register(register.parent());
    }

    pub fn concretize_memory(&mut self, address: u64, size: usize) {
        self.symbolic.unbind_memory(address, size);
    }

    pub fn concretize_all_registers(&mut self) {
        self.symbolic.clear_registers();
    }

    pub fn concretize_all_memory(&mut self) {
        self.symbolic.clear_memory();
    }

    pub fn is_register_tainted(&self, register: &Register) -> bool {
        self.taint.is_register_tainted(register)
    }

    pub fn is_memory_tainted(&self, address: u64, size: usize) -> bool {
        self.taint.is_memory_tainted(address, size)
    }

    pub fn taint_register(&mut self, register: &Register) -> bool {
        self.taint.taint_register(register)
    }

    pub fn untaint_register(&mut self, register: &Register) -> bool {
        self.taint.untaint_register(register)
    }

    pub fn taint_memory(&mut self, address: u64, size: usize) -> bool {
        self.taint.taint_memory(address, size)
    }

    pub fn untaint_memory(&mut self, address: u64, size: usize) -> bool {
        self.taint.untaint_memory(address, size)
    }

    pub fn path_constraints(&self) -> &PathConstraints {
        &self.path
    }

    /// The conjunction of every path constraint, as a self-contained formula.
    pub fn path_constraints_ast(&mut self) -> Result<NodeId, Error> {
        self.path.conjunction(&mut self.ast, &self.symbolic)
    }

    pub fn clear_path_constraints(&mut self) {
        self.path.clear();
    }

    pub fn snapshot(&self) -> Result<Snapshot, Error> {
        let mut formulas = BTreeMap::new();
        for (id, expression) in self.symbolic.expressions() {
            formulas.insert(*id, node_to_string(&self.ast, expression.node())?);
        }
        Ok(Snapshot {
            architecture: self
                .architecture
                .as_ref()
                .map(|architecture| architecture.name().to_string()),
            options: self.options.clone(),
            registers: self.symbolic.registers().clone(),
            memory: self.symbolic.memory().clone(),
            expressions: self.symbolic.expressions().values().cloned().collect(),
            formulas,
            variables: self.symbolic.variables().to_vec(),
            path_constraints: self.path.constraints().to_vec(),
            tainted_registers: self.taint.tainted_registers().iter().copied().collect(),
            tainted_memory: self.taint.tainted_memory().iter().copied().collect(),
            statistics: self.ast.stats(),
        })
    }

    /// Clear every expression, variable, binding, taint, path constraint and
    /// node. The architecture, options, simplification passes, concrete state
    /// and solver are kept.
    pub fn reset(&mut self) {
        trace!("reset");
        self.symbolic.clear();
        self.taint.clear();
        self.path.clear();
        self.ast.clear();
    }
}
