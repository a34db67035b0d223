//! Stack operations.
//!
//! The second operand of `push` and `pop` is the stack slot, set up by the
//! caller at the address written or read.

use crate::semantics::{Propagation, Semantics};
use crate::Error;

fn adjust_stack_pointer(semantics: &mut Semantics, size: usize, grow: bool) -> Result<(), Error> {
    let stack_pointer = semantics.architecture().stack_pointer();
    let current = semantics.lift_register(&stack_pointer)?;
    let delta = semantics.ast().bv(size as u64, stack_pointer.bits());
    let value = if grow {
        semantics.ast().sub(current, delta)?
    } else {
        semantics.ast().add(current, delta)?
    };
    semantics.write_register(&stack_pointer, value, Propagation::Union, false)?;
    Ok(())
}

pub(crate) fn push(semantics: &mut Semantics) -> Result<(), Error> {
    let (address, size) = semantics.operand_address(1)?;
    let value = semantics.lift_resized(0, size * 8)?;
    let taint = semantics.operand_taint(0)?;
    adjust_stack_pointer(semantics, size, true)?;
    semantics.write_memory(address, size, value, Propagation::Assignment, taint)?;
    Ok(())
}

pub(crate) fn pop(semantics: &mut Semantics) -> Result<(), Error> {
    let (_, size) = semantics.operand_address(1)?;
    let bits = semantics.operand(0)?.bits();
    let value = semantics.lift_resized(1, bits)?;
    let taint = semantics.operand_taint(1)?;
    adjust_stack_pointer(semantics, size, false)?;
    semantics.write_operand(0, value, Propagation::Assignment, taint)?;
    Ok(())
}
