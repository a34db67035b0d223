use crate::architecture::RegisterId;
use crate::ast::{BinaryOp, NodeId};
use crate::semantics::flags::{self, clear_flag, set_result_flags};
use crate::semantics::{Propagation, Semantics};
use crate::Error;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum FlagEffect {
    Add,
    Sub,
    Logic,
}

/// Operands of a two operand arithmetic or logic instruction, lifted at the
/// width of the destination.
struct Operands {
    lhs: NodeId,
    rhs: NodeId,
    taint: bool,
}

fn operands(semantics: &mut Semantics) -> Result<Operands, Error> {
    let lhs = semantics.lift(0)?;
    let bits = semantics.ast().bits(lhs)?;
    let rhs = semantics.lift_resized(1, bits)?;
    let taint = semantics.operand_taint(1)?;
    Ok(Operands { lhs, rhs, taint })
}

fn write_flags(
    semantics: &mut Semantics,
    effect: FlagEffect,
    operands: &Operands,
    result: NodeId,
    taint: bool,
) -> Result<(), Error> {
    let Operands { lhs, rhs, .. } = *operands;
    match effect {
        FlagEffect::Add => {
            let af = flags::af(semantics, lhs, rhs, result)?;
            semantics.write_flag(RegisterId::Af, af, taint)?;
            let cf = flags::cf_add(semantics, lhs, result)?;
            semantics.write_flag(RegisterId::Cf, cf, taint)?;
            let of = flags::of_add(semantics, lhs, rhs, result)?;
            semantics.write_flag(RegisterId::Of, of, taint)?;
        }
        FlagEffect::Sub => {
            let af = flags::af(semantics, lhs, rhs, result)?;
            semantics.write_flag(RegisterId::Af, af, taint)?;
            let cf = flags::cf_sub(semantics, lhs, rhs)?;
            semantics.write_flag(RegisterId::Cf, cf, taint)?;
            let of = flags::of_sub(semantics, lhs, rhs, result)?;
            semantics.write_flag(RegisterId::Of, of, taint)?;
        }
        FlagEffect::Logic => {
            clear_flag(semantics, RegisterId::Cf)?;
            clear_flag(semantics, RegisterId::Of)?;
        }
    }
    set_result_flags(semantics, result, taint)
}

fn binary(
    semantics: &mut Semantics,
    op: BinaryOp,
    effect: FlagEffect,
    write_back: bool,
) -> Result<(), Error> {
    let operands = operands(semantics)?;
    let result = semantics.ast().binary(op, operands.lhs, operands.rhs)?;
    let taint = if write_back {
        semantics.write_operand(0, result, Propagation::Union, operands.taint)?
    } else {
        semantics.operand_taint(0)? || operands.taint
    };
    write_flags(semantics, effect, &operands, result, taint)
}

pub(crate) fn add(semantics: &mut Semantics) -> Result<(), Error> {
    binary(semantics, BinaryOp::Add, FlagEffect::Add, true)
}

pub(crate) fn sub(semantics: &mut Semantics) -> Result<(), Error> {
    binary(semantics, BinaryOp::Sub, FlagEffect::Sub, true)
}

pub(crate) fn and(semantics: &mut Semantics) -> Result<(), Error> {
    binary(semantics, BinaryOp::And, FlagEffect::Logic, true)
}

pub(crate) fn or(semantics: &mut Semantics) -> Result<(), Error> {
    binary(semantics, BinaryOp::Or, FlagEffect::Logic, true)
}

pub(crate) fn xor(semantics: &mut Semantics) -> Result<(), Error> {
    binary(semantics, BinaryOp::Xor, FlagEffect::Logic, true)
}

pub(crate) fn cmp(semantics: &mut Semantics) -> Result<(), Error> {
    binary(semantics, BinaryOp::Sub, FlagEffect::Sub, false)
}

pub(crate) fn test(semantics: &mut Semantics) -> Result<(), Error> {
    binary(semantics, BinaryOp::And, FlagEffect::Logic, false)
}

pub(crate) fn not(semantics: &mut Semantics) -> Result<(), Error> {
    let dst = semantics.lift(0)?;
    let result = semantics.ast().not(dst)?;
    semantics.write_operand(0, result, Propagation::Union, false)?;
    Ok(())
}

/// `inc` and `dec` leave `cf` untouched.
fn step(semantics: &mut Semantics, op: BinaryOp, effect: FlagEffect) -> Result<(), Error> {
    let lhs = semantics.lift(0)?;
    let bits = semantics.ast().bits(lhs)?;
    let rhs = semantics.ast().bv(1, bits);
    let result = semantics.ast().binary(op, lhs, rhs)?;
    let taint = semantics.write_operand(0, result, Propagation::Union, false)?;

    let af = flags::af(semantics, lhs, rhs, result)?;
    semantics.write_flag(RegisterId::Af, af, taint)?;
    let of = match effect {
        FlagEffect::Sub => flags::of_sub(semantics, lhs, rhs, result)?,
        _ => flags::of_add(semantics, lhs, rhs, result)?,
    };
    semantics.write_flag(RegisterId::Of, of, taint)?;
    set_result_flags(semantics, result, taint)
}

pub(crate) fn inc(semantics: &mut Semantics) -> Result<(), Error> {
    step(semantics, BinaryOp::Add, FlagEffect::Add)
}

pub(crate) fn dec(semantics: &mut Semantics) -> Result<(), Error> {
    step(semantics, BinaryOp::Sub, FlagEffect::Sub)
}
