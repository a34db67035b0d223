use crate::operand::Operand;
use crate::semantics::{Condition, Propagation, Semantics};
use crate::Error;

pub(crate) fn mov(semantics: &mut Semantics) -> Result<(), Error> {
    let bits = semantics.operand(0)?.bits();
    let src = semantics.lift_resized(1, bits)?;
    let taint = semantics.operand_taint(1)?;
    semantics.write_operand(0, src, Propagation::Assignment, taint)?;
    Ok(())
}

fn extend(semantics: &mut Semantics, signed: bool) -> Result<(), Error> {
    let bits = semantics.operand(0)?.bits();
    let src = semantics.lift(1)?;
    let src_bits = semantics.ast().bits(src)?;
    if src_bits > bits {
        return Err(Error::Sort);
    }
    let value = if signed {
        semantics.ast().sext(bits - src_bits, src)?
    } else {
        semantics.ast().zext(bits - src_bits, src)?
    };
    let taint = semantics.operand_taint(1)?;
    semantics.write_operand(0, value, Propagation::Assignment, taint)?;
    Ok(())
}

pub(crate) fn movzx(semantics: &mut Semantics) -> Result<(), Error> {
    extend(semantics, false)
}

pub(crate) fn movsx(semantics: &mut Semantics) -> Result<(), Error> {
    extend(semantics, true)
}

/// The effective address is computed, memory is never read.
pub(crate) fn lea(semantics: &mut Semantics) -> Result<(), Error> {
    let bits = semantics.operand(0)?.bits();
    let address = semantics.lift_effective_address(1)?;
    let address = semantics.ast().resize(bits, address)?;
    let taint = match semantics.operand(1)? {
        Operand::Memory(memory) => {
            memory
                .base()
                .map(|base| semantics.register_taint(base))
                .unwrap_or(false)
                || memory
                    .index()
                    .map(|index| semantics.register_taint(index))
                    .unwrap_or(false)
        }
        _ => false,
    };
    semantics.write_operand(0, address, Propagation::Assignment, taint)?;
    Ok(())
}

fn setcc(semantics: &mut Semantics, condition: Condition) -> Result<(), Error> {
    let bits = semantics.operand(0)?.bits();
    let holds = condition.node(semantics)?;
    let one = semantics.ast().bv(1, bits);
    let zero = semantics.ast().bv(0, bits);
    let value = semantics.ast().ite(holds, one, zero)?;
    let taint = condition.taint(semantics)?;
    semantics.write_operand(0, value, Propagation::Assignment, taint)?;
    Ok(())
}

pub(crate) fn sets(semantics: &mut Semantics) -> Result<(), Error> {
    setcc(semantics, Condition::Sign)
}

pub(crate) fn setns(semantics: &mut Semantics) -> Result<(), Error> {
    setcc(semantics, Condition::NotSign)
}

pub(crate) fn setz(semantics: &mut Semantics) -> Result<(), Error> {
    setcc(semantics, Condition::Zero)
}

pub(crate) fn setnz(semantics: &mut Semantics) -> Result<(), Error> {
    setcc(semantics, Condition::NotZero)
}

pub(crate) fn setb(semantics: &mut Semantics) -> Result<(), Error> {
    setcc(semantics, Condition::Below)
}

pub(crate) fn setnb(semantics: &mut Semantics) -> Result<(), Error> {
    setcc(semantics, Condition::NotBelow)
}

/// The destination is always written. Its taint only follows the source
/// when the condition holds concretely.
fn cmovcc(semantics: &mut Semantics, condition: Condition) -> Result<(), Error> {
    let dst = semantics.lift(0)?;
    let bits = semantics.ast().bits(dst)?;
    let src = semantics.lift_resized(1, bits)?;
    let holds = condition.node(semantics)?;
    let value = semantics.ast().ite(holds, src, dst)?;
    if semantics.evaluate(holds)?.is_one() {
        let taint = semantics.operand_taint(1)?;
        semantics.write_operand(0, value, Propagation::Assignment, taint)?;
    } else {
        semantics.write_operand(0, value, Propagation::Union, false)?;
    }
    Ok(())
}

pub(crate) fn cmovnb(semantics: &mut Semantics) -> Result<(), Error> {
    cmovcc(semantics, Condition::NotBelow)
}

pub(crate) fn cmovz(semantics: &mut Semantics) -> Result<(), Error> {
    cmovcc(semantics, Condition::Zero)
}

pub(crate) fn bswap(semantics: &mut Semantics) -> Result<(), Error> {
    let dst = semantics.lift(0)?;
    let bits = semantics.ast().bits(dst)?;
    let mut bytes = Vec::with_capacity(bits / 8);
    for byte in 0..bits / 8 {
        bytes.push(semantics.ast().extract(byte * 8 + 7, byte * 8, dst)?);
    }
    let value = semantics.ast().concat(bytes)?;
    semantics.write_operand(0, value, Propagation::Union, false)?;
    Ok(())
}

pub(crate) fn andpd(semantics: &mut Semantics) -> Result<(), Error> {
    let dst = semantics.lift(0)?;
    let bits = semantics.ast().bits(dst)?;
    let src = semantics.lift_resized(1, bits)?;
    let value = semantics.ast().and(dst, src)?;
    let taint = semantics.operand_taint(1)?;
    semantics.write_operand(0, value, Propagation::Union, taint)?;
    Ok(())
}

/// Compare packed words. Each 16-bit lane becomes all ones when equal, zero
/// otherwise.
pub(crate) fn pcmpeqw(semantics: &mut Semantics) -> Result<(), Error> {
    let dst = semantics.lift(0)?;
    let bits = semantics.ast().bits(dst)?;
    let src = semantics.lift_resized(1, bits)?;
    let ones = semantics.ast().bv(0xffff, 16);
    let zero = semantics.ast().bv(0, 16);
    let mut lanes = Vec::with_capacity(bits / 16);
    for lane in (0..bits / 16).rev() {
        let ast = semantics.ast();
        let a = ast.extract(lane * 16 + 15, lane * 16, dst)?;
        let b = ast.extract(lane * 16 + 15, lane * 16, src)?;
        let equal = ast.equal(a, b)?;
        lanes.push(ast.ite(equal, ones, zero)?);
    }
    let value = semantics.ast().concat(lanes)?;
    let taint = semantics.operand_taint(1)?;
    semantics.write_operand(0, value, Propagation::Union, taint)?;
    Ok(())
}
