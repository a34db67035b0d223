use crate::ast::NodeId;
use crate::operand::Operand;
use crate::semantics::{Condition, Semantics};
use crate::Error;

fn concrete_address(semantics: &Semantics, node: NodeId) -> Result<u64, Error> {
    semantics.evaluate(node)?.value_u64().ok_or(Error::Sort)
}

pub(crate) fn jmp(semantics: &mut Semantics) -> Result<(), Error> {
    let bits = semantics.architecture().program_counter().bits();
    let target = match semantics.operand(0)? {
        Operand::Immediate(immediate) => semantics.ast().bv(immediate.value(), bits),
        _ => semantics.lift_resized(0, bits)?,
    };
    let taint = semantics.operand_taint(0)?;
    semantics.set_program_counter(target, taint)?;
    let target = concrete_address(semantics, target)?;
    semantics.set_branch(true, target);
    Ok(())
}

/// A conditional jump binds the program counter to
/// `ite(condition, target, next)`, and records which way the branch went as
/// a path constraint.
fn jcc(semantics: &mut Semantics, condition: Condition) -> Result<(), Error> {
    let bits = semantics.architecture().program_counter().bits();
    let target = match semantics.operand(0)? {
        Operand::Immediate(immediate) => immediate.value(),
        _ => {
            return Err(Error::IllegalOperands {
                opcode: semantics.instruction().opcode(),
                signature: "conditional jump to a non immediate".to_string(),
            })
        }
    };
    let next = semantics.instruction().next_address();

    let holds = condition.node(semantics)?;
    let target_node = semantics.ast().bv(target, bits);
    let next_node = semantics.ast().bv(next, bits);
    let program_counter = semantics.ast().ite(holds, target_node, next_node)?;
    let taint = condition.taint(semantics)?;
    let id = semantics.set_program_counter(program_counter, taint)?;

    let taken = semantics.evaluate(holds)?.is_one();
    let destination = if taken { target } else { next };
    semantics.add_path_constraint(id, taken, destination, taint)?;
    semantics.set_branch(taken, target);
    Ok(())
}

pub(crate) fn jz(semantics: &mut Semantics) -> Result<(), Error> {
    jcc(semantics, Condition::Zero)
}

pub(crate) fn jnz(semantics: &mut Semantics) -> Result<(), Error> {
    jcc(semantics, Condition::NotZero)
}

pub(crate) fn jb(semantics: &mut Semantics) -> Result<(), Error> {
    jcc(semantics, Condition::Below)
}

pub(crate) fn jnb(semantics: &mut Semantics) -> Result<(), Error> {
    jcc(semantics, Condition::NotBelow)
}

pub(crate) fn js(semantics: &mut Semantics) -> Result<(), Error> {
    jcc(semantics, Condition::Sign)
}

pub(crate) fn jns(semantics: &mut Semantics) -> Result<(), Error> {
    jcc(semantics, Condition::NotSign)
}

pub(crate) fn nop(_: &mut Semantics) -> Result<(), Error> {
    Ok(())
}
