//! Shifts.
//!
//! The count is taken modulo the width of the destination. A count of zero
//! leaves every flag untouched, so each flag is written as an `ite` over the
//! count which falls back to the flag's current value. Overflow only changes
//! for a count of one.

use crate::architecture::RegisterId;
use crate::ast::{BinaryOp, NodeId};
use crate::semantics::flags::{self, msb};
use crate::semantics::{Propagation, Semantics};
use crate::Error;

struct Shift {
    dst: NodeId,
    count: NodeId,
    result: NodeId,
    bits: usize,
    taint: bool,
}

fn shift(semantics: &mut Semantics, op: BinaryOp) -> Result<Shift, Error> {
    let dst = semantics.lift(0)?;
    let bits = semantics.ast().bits(dst)?;
    let count = semantics.lift_resized(1, bits)?;
    let mask = semantics.ast().bv(bits as u64 - 1, bits);
    let count = semantics.ast().and(count, mask)?;
    let result = semantics.ast().binary(op, dst, count)?;
    let count_taint = semantics.operand_taint(1)?;
    let taint = semantics.write_operand(0, result, Propagation::Union, count_taint)?;
    Ok(Shift {
        dst,
        count,
        result,
        bits,
        taint,
    })
}

/// `ite(count == value, then, else_)`
fn when_count(
    semantics: &mut Semantics,
    shift: &Shift,
    value: u64,
    then: NodeId,
    else_: NodeId,
) -> Result<NodeId, Error> {
    let value = semantics.ast().bv(value, shift.bits);
    let condition = semantics.ast().equal(shift.count, value)?;
    semantics.ast().ite(condition, then, else_)
}

/// Write `flag` unless the count is zero.
fn write_flag(
    semantics: &mut Semantics,
    shift: &Shift,
    flag: RegisterId,
    value: NodeId,
) -> Result<(), Error> {
    let current = semantics.lift_flag(flag)?;
    let value = when_count(semantics, shift, 0, current, value)?;
    semantics.write_flag(flag, value, shift.taint)
}

/// Overflow is only defined for a count of one. Any other count keeps the
/// current flag.
fn write_overflow(semantics: &mut Semantics, shift: &Shift, of: NodeId) -> Result<(), Error> {
    let current = semantics.lift_flag(RegisterId::Of)?;
    let of = when_count(semantics, shift, 1, of, current)?;
    semantics.write_flag(RegisterId::Of, of, shift.taint)
}

fn write_result_flags(semantics: &mut Semantics, shift: &Shift) -> Result<(), Error> {
    let zf = flags::zf(semantics, shift.result)?;
    write_flag(semantics, shift, RegisterId::Zf, zf)?;
    let sf = msb(semantics, shift.result)?;
    write_flag(semantics, shift, RegisterId::Sf, sf)?;
    let pf = flags::pf(semantics, shift.result)?;
    write_flag(semantics, shift, RegisterId::Pf, pf)
}

pub(crate) fn shl(semantics: &mut Semantics) -> Result<(), Error> {
    let shift = shift(semantics, BinaryOp::Shl)?;

    // The last bit shifted out is bit (n - count) of the destination.
    let width = semantics.ast().bv(shift.bits as u64, shift.bits);
    let distance = semantics.ast().sub(width, shift.count)?;
    let out = semantics.ast().lshr(shift.dst, distance)?;
    let cf = semantics.ast().extract(0, 0, out)?;
    write_flag(semantics, &shift, RegisterId::Cf, cf)?;

    let result_msb = msb(semantics, shift.result)?;
    let of = semantics.ast().xor(result_msb, cf)?;
    write_overflow(semantics, &shift, of)?;

    write_result_flags(semantics, &shift)
}

fn right_carry(semantics: &mut Semantics, shift: &Shift, op: BinaryOp) -> Result<NodeId, Error> {
    let one = semantics.ast().bv(1, shift.bits);
    let distance = semantics.ast().sub(shift.count, one)?;
    let out = semantics.ast().binary(op, shift.dst, distance)?;
    semantics.ast().extract(0, 0, out)
}

pub(crate) fn shr(semantics: &mut Semantics) -> Result<(), Error> {
    let shift = shift(semantics, BinaryOp::Lshr)?;
    let cf = right_carry(semantics, &shift, BinaryOp::Lshr)?;
    write_flag(semantics, &shift, RegisterId::Cf, cf)?;
    let of = msb(semantics, shift.dst)?;
    write_overflow(semantics, &shift, of)?;
    write_result_flags(semantics, &shift)
}

pub(crate) fn sar(semantics: &mut Semantics) -> Result<(), Error> {
    let shift = shift(semantics, BinaryOp::Ashr)?;
    let cf = right_carry(semantics, &shift, BinaryOp::Ashr)?;
    write_flag(semantics, &shift, RegisterId::Cf, cf)?;
    let of = semantics.ast().bv(0, 1);
    write_overflow(semantics, &shift, of)?;
    write_result_flags(semantics, &shift)
}
