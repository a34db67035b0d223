use log::trace;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::architecture::RegisterId;
use crate::ast::{Constant, Environment, ExpressionId, NodeId, VariableId};
use crate::symbolic::{Origin, SymbolicExpression, SymbolicVariable};
use crate::Error;

/// A byte of memory bound to a byte of a symbolic expression.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct MemoryCell {
    pub expression: ExpressionId,
    /// The index of the byte in the expression, 0 being the least
    /// significant.
    pub byte: usize,
}

/// Read access to symbolic bindings, committed or staged.
pub trait SymbolicView: Environment {
    /// The expression bound to a full-width register.
    fn register_binding(&self, parent: RegisterId) -> Option<ExpressionId>;

    /// The expression byte bound to a byte of memory.
    fn memory_binding(&self, address: u64) -> Option<MemoryCell>;

    /// The width of an expression.
    fn expression_bits(&self, id: ExpressionId) -> Option<usize>;
}

/// The symbolic state of a `Context`.
///
/// Holds every symbolic expression and variable, and binds full-width
/// registers and bytes of memory to expressions. Unbound locations are
/// concrete, and their values come from the concrete state.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct SymbolicEngine {
    expressions: BTreeMap<ExpressionId, SymbolicExpression>,
    next_expression: u64,
    variables: Vec<SymbolicVariable>,
    registers: BTreeMap<RegisterId, ExpressionId>,
    memory: BTreeMap<u64, MemoryCell>,
}

impl SymbolicEngine {
    pub fn new() -> SymbolicEngine {
        SymbolicEngine::default()
    }

    /// The id the next expression will receive.
    pub fn next_expression_id(&self) -> ExpressionId {
        ExpressionId(self.next_expression)
    }

    /// Create a new expression with the next id.
    pub fn new_expression(
        &mut self,
        node: NodeId,
        bits: usize,
        comment: String,
        origin: Origin,
        tainted: bool,
    ) -> ExpressionId {
        let id = self.next_expression_id();
        self.insert_expression(SymbolicExpression::new(
            id, node, bits, comment, origin, tainted,
        ));
        id
    }

    /// Insert an expression which was given its id ahead of time. Ids of
    /// expressions which were never inserted are skipped for good.
    pub(crate) fn insert_expression(&mut self, expression: SymbolicExpression) {
        let id = expression.id();
        trace!("new symbolic expression {}", expression);
        self.next_expression = self.next_expression.max(id.0 + 1);
        self.expressions.insert(id, expression);
    }

    /// Skip ids up to, but not including, `id`.
    pub(crate) fn skip_to(&mut self, id: ExpressionId) {
        self.next_expression = self.next_expression.max(id.0);
    }

    pub fn expression(&self, id: ExpressionId) -> Result<&SymbolicExpression, Error> {
        self.expressions
            .get(&id)
            .ok_or(Error::InvalidExpressionId(id))
    }

    pub fn expressions(&self) -> &BTreeMap<ExpressionId, SymbolicExpression> {
        &self.expressions
    }

    /// Create a new symbolic variable.
    pub fn new_variable(
        &mut self,
        bits: usize,
        comment: String,
        concrete_value: Constant,
        origin: Origin,
    ) -> VariableId {
        let id = VariableId(self.variables.len() as u64);
        trace!("new symbolic variable {}:{} ({})", id, bits, origin);
        self.variables.push(SymbolicVariable::new(
            id,
            bits,
            comment,
            concrete_value,
            origin,
        ));
        id
    }

    pub fn variable(&self, id: VariableId) -> Result<&SymbolicVariable, Error> {
        self.variables
            .get(id.0 as usize)
            .ok_or(Error::InvalidVariableId(id))
    }

    pub fn variable_by_name(&self, name: &str) -> Result<&SymbolicVariable, Error> {
        self.variables
            .iter()
            .find(|variable| variable.name() == name)
            .ok_or_else(|| Error::InvalidVariableName(name.to_string()))
    }

    pub fn variables(&self) -> &[SymbolicVariable] {
        &self.variables
    }

    /// Bind a full-width register to an expression.
    pub fn bind_register(&mut self, parent: RegisterId, id: ExpressionId) {
        self.registers.insert(parent, id);
    }

    /// Make a full-width register concrete.
    pub fn unbind_register(&mut self, parent: RegisterId) {
        self.registers.remove(&parent);
    }

    /// The bound full-width registers.
    pub fn registers(&self) -> &BTreeMap<RegisterId, ExpressionId> {
        &self.registers
    }

    /// Bind `size` bytes of memory at `address` to the bytes of an expression,
    /// little-endian.
    pub fn bind_memory(&mut self, address: u64, size: usize, id: ExpressionId) {
        for byte in 0..size {
            self.memory.insert(
                address.wrapping_add(byte as u64),
                MemoryCell {
                    expression: id,
                    byte,
                },
            );
        }
    }

    pub fn bind_memory_cell(&mut self, address: u64, cell: MemoryCell) {
        self.memory.insert(address, cell);
    }

    /// Make `size` bytes of memory at `address` concrete.
    pub fn unbind_memory(&mut self, address: u64, size: usize) {
        for byte in 0..size as u64 {
            self.memory.remove(&address.wrapping_add(byte));
        }
    }

    /// The bound bytes of memory.
    pub fn memory(&self) -> &BTreeMap<u64, MemoryCell> {
        &self.memory
    }

    pub fn clear_registers(&mut self) {
        self.registers.clear();
    }

    pub fn clear_memory(&mut self) {
        self.memory.clear();
    }

    /// Forget every expression, variable and binding. Ids restart at zero.
    pub fn clear(&mut self) {
        *self = SymbolicEngine::default();
    }
}

impl Environment for SymbolicEngine {
    fn variable_value(&self, id: VariableId) -> Option<Constant> {
        self.variables
            .get(id.0 as usize)
            .map(|variable| variable.concrete_value().clone())
    }

    fn expression_root(&self, id: ExpressionId) -> Option<NodeId> {
        self.expressions.get(&id).map(|expression| expression.node())
    }
}

impl SymbolicView for SymbolicEngine {
    fn register_binding(&self, parent: RegisterId) -> Option<ExpressionId> {
        self.registers.get(&parent).copied()
    }

    fn memory_binding(&self, address: u64) -> Option<MemoryCell> {
        self.memory.get(&address).copied()
    }

    fn expression_bits(&self, id: ExpressionId) -> Option<usize> {
        self.expressions.get(&id).map(|expression| expression.bits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AstContext;

    #[test]
    fn ids_are_monotonic() {
        let mut ast = AstContext::new();
        let mut engine = SymbolicEngine::new();
        let node = ast.bv(1, 8);
        let first = engine.new_expression(node, 8, String::new(), Origin::Volatile, false);
        engine.skip_to(ExpressionId(5));
        let second = engine.new_expression(node, 8, String::new(), Origin::Volatile, false);
        assert_eq!(first, ExpressionId(0));
        assert_eq!(second, ExpressionId(5));
        assert!(engine.expression(ExpressionId(3)).is_err());
        engine.clear();
        assert_eq!(engine.next_expression_id(), ExpressionId(0));
        assert!(matches!(
            engine.expression(first),
            Err(Error::InvalidExpressionId(_))
        ));
    }

    #[test]
    fn memory_bindings_are_per_byte() {
        let mut engine = SymbolicEngine::new();
        engine.bind_memory(0x1000, 4, ExpressionId(2));
        assert_eq!(
            engine.memory_binding(0x1002),
            Some(MemoryCell {
                expression: ExpressionId(2),
                byte: 2
            })
        );
        engine.unbind_memory(0x1001, 2);
        assert!(engine.memory_binding(0x1001).is_none());
        assert!(engine.memory_binding(0x1003).is_some());
    }

    #[test]
    fn variables_by_name() {
        let mut engine = SymbolicEngine::new();
        let id = engine.new_variable(
            32,
            "input".to_string(),
            Constant::new(7, 32),
            Origin::Volatile,
        );
        assert_eq!(engine.variable_by_name("SymVar_0").unwrap().id(), id);
        assert_eq!(
            engine.variable_value(id),
            Some(Constant::new(7, 32))
        );
        assert!(matches!(
            engine.variable_by_name("SymVar_9"),
            Err(Error::InvalidVariableName(_))
        ));
    }
}
