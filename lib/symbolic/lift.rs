//! Lifting of operands into formulas.
//!
//! Bound locations lift to references to the expressions they are bound to.
//! Unbound locations lift to constants holding their concrete values.

use crate::architecture::{Architecture, Register};
use crate::ast::{AstContext, Constant, NodeId};
use crate::concrete::ConcreteState;
use crate::operand::MemoryOperand;
use crate::symbolic::{MemoryCell, SymbolicView};
use crate::Error;

/// Lift a register.
///
/// A child of a bound parent lifts to an extract of the parent's expression.
pub fn lift_register(
    ast: &mut AstContext,
    view: &dyn SymbolicView,
    concrete: &dyn ConcreteState,
    register: &Register,
) -> Result<NodeId, Error> {
    let id = match view.register_binding(register.parent()) {
        Some(id) => id,
        None => return Ok(ast.constant(concrete.register_value(register))),
    };
    let bits = view
        .expression_bits(id)
        .ok_or(Error::InvalidExpressionId(id))?;
    let reference = ast.reference(id, bits);
    if register.offset() == 0 && register.bits() == bits {
        Ok(reference)
    } else {
        ast.extract(
            register.offset() + register.bits() - 1,
            register.offset(),
            reference,
        )
    }
}

/// Lift `size` bytes of memory at `address`.
///
/// `trusted` is a concrete value observed by the tracer, and is preferred over
/// the concrete state for unbound bytes.
pub fn lift_memory(
    ast: &mut AstContext,
    view: &dyn SymbolicView,
    concrete: &dyn ConcreteState,
    address: u64,
    size: usize,
    trusted: Option<&Constant>,
) -> Result<NodeId, Error> {
    if size == 0 {
        return Err(Error::Sort);
    }
    let cells: Vec<_> = (0..size as u64)
        .map(|offset| view.memory_binding(address.wrapping_add(offset)))
        .collect();

    let concrete_value = || match trusted {
        Some(value) if value.bits() == size * 8 => value.clone(),
        _ => concrete.memory_value(address, size),
    };

    if cells.iter().all(|cell| cell.is_none()) {
        return Ok(ast.constant(concrete_value()));
    }

    // An aligned read of a whole expression is a plain reference.
    if let Some(first) = cells[0] {
        let bits = view
            .expression_bits(first.expression)
            .ok_or(Error::InvalidExpressionId(first.expression))?;
        let whole = bits == size * 8
            && cells.iter().enumerate().all(|(byte, cell)| {
                *cell
                    == Some(MemoryCell {
                        expression: first.expression,
                        byte,
                    })
            });
        if whole {
            return Ok(ast.reference(first.expression, bits));
        }
    }

    let bytes = concrete_value().to_bytes_le();
    let mut pieces = Vec::with_capacity(size);
    for (offset, cell) in cells.iter().enumerate().rev() {
        let piece = match cell {
            Some(cell) => {
                let bits = view
                    .expression_bits(cell.expression)
                    .ok_or(Error::InvalidExpressionId(cell.expression))?;
                let reference = ast.reference(cell.expression, bits);
                ast.extract(cell.byte * 8 + 7, cell.byte * 8, reference)?
            }
            None => ast.bv(bytes[offset] as u64, 8),
        };
        pieces.push(piece);
    }
    ast.concat(pieces)
}

/// Lift the effective address `base + index * scale + displacement` of a
/// memory operand, as a formula of `bits` bits.
pub fn lift_effective_address(
    ast: &mut AstContext,
    view: &dyn SymbolicView,
    concrete: &dyn ConcreteState,
    memory: &MemoryOperand,
    bits: usize,
) -> Result<NodeId, Error> {
    let mut address = ast.bv(memory.displacement() as u64, bits);

    if let Some(base) = memory.base() {
        let base = lift_register(ast, view, concrete, base)?;
        let base = ast.resize(bits, base)?;
        address = ast.add(base, address)?;
    }

    if let Some(index) = memory.index() {
        let index = lift_register(ast, view, concrete, index)?;
        let index = ast.resize(bits, index)?;
        let scale = ast.bv(memory.scale(), bits);
        let scaled = ast.mul(index, scale)?;
        address = ast.add(address, scaled)?;
    }

    Ok(address)
}

/// Compute the new value of the parent of `register` when `value` is written
/// to `register`.
///
/// `parent` is the current value of the parent register. Writes which
/// zero-extend discard it.
pub fn widen_register_write(
    ast: &mut AstContext,
    architecture: &dyn Architecture,
    register: &Register,
    value: NodeId,
    parent: NodeId,
) -> Result<NodeId, Error> {
    if register.is_parent() {
        return Ok(value);
    }
    let parent_bits = ast.bits(parent)?;
    if architecture.zero_extends(register) {
        return ast.zext(parent_bits - register.bits(), value);
    }

    let high = register.offset() + register.bits();
    let mut pieces = Vec::with_capacity(3);
    if high < parent_bits {
        pieces.push(ast.extract(parent_bits - 1, high, parent)?);
    }
    pieces.push(value);
    if register.offset() > 0 {
        pieces.push(ast.extract(register.offset() - 1, 0, parent)?);
    }
    ast.concat(pieces)
}
