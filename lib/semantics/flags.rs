use crate::architecture::RegisterId;
use crate::ast::NodeId;
use crate::semantics::Semantics;
use crate::Error;

/// The most significant bit of `node`.
pub(crate) fn msb(semantics: &mut Semantics, node: NodeId) -> Result<NodeId, Error> {
    let bits = semantics.ast().bits(node)?;
    semantics.ast().extract(bits - 1, bits - 1, node)
}

pub(crate) fn zf(semantics: &mut Semantics, result: NodeId) -> Result<NodeId, Error> {
    let bits = semantics.ast().bits(result)?;
    let zero = semantics.ast().bv(0, bits);
    semantics.ast().equal(result, zero)
}

/// Set when the low byte of `result` has an even number of set bits.
pub(crate) fn pf(semantics: &mut Semantics, result: NodeId) -> Result<NodeId, Error> {
    let ast = semantics.ast();
    let mut parity = ast.extract(0, 0, result)?;
    for bit in 1..8 {
        let b = ast.extract(bit, bit, result)?;
        parity = ast.xor(parity, b)?;
    }
    ast.not(parity)
}

/// Bit 4 of `lhs ^ rhs ^ result`.
pub(crate) fn af(
    semantics: &mut Semantics,
    lhs: NodeId,
    rhs: NodeId,
    result: NodeId,
) -> Result<NodeId, Error> {
    let ast = semantics.ast();
    let mixed = ast.xor(lhs, rhs)?;
    let mixed = ast.xor(mixed, result)?;
    ast.extract(4, 4, mixed)
}

pub(crate) fn cf_add(semantics: &mut Semantics, lhs: NodeId, result: NodeId) -> Result<NodeId, Error> {
    semantics.ast().ult(result, lhs)
}

pub(crate) fn cf_sub(semantics: &mut Semantics, lhs: NodeId, rhs: NodeId) -> Result<NodeId, Error> {
    semantics.ast().ult(lhs, rhs)
}

pub(crate) fn of_add(
    semantics: &mut Semantics,
    lhs: NodeId,
    rhs: NodeId,
    result: NodeId,
) -> Result<NodeId, Error> {
    let ast = semantics.ast();
    let a = ast.xor(lhs, result)?;
    let b = ast.xor(rhs, result)?;
    let both = ast.and(a, b)?;
    msb(semantics, both)
}

pub(crate) fn of_sub(
    semantics: &mut Semantics,
    lhs: NodeId,
    rhs: NodeId,
    result: NodeId,
) -> Result<NodeId, Error> {
    let ast = semantics.ast();
    let a = ast.xor(lhs, rhs)?;
    let b = ast.xor(lhs, result)?;
    let both = ast.and(a, b)?;
    msb(semantics, both)
}

/// Write `zf`, `sf` and `pf` for `result`.
pub(crate) fn set_result_flags(
    semantics: &mut Semantics,
    result: NodeId,
    taint: bool,
) -> Result<(), Error> {
    let zf = zf(semantics, result)?;
    semantics.write_flag(RegisterId::Zf, zf, taint)?;
    let sf = msb(semantics, result)?;
    semantics.write_flag(RegisterId::Sf, sf, taint)?;
    let pf = pf(semantics, result)?;
    semantics.write_flag(RegisterId::Pf, pf, taint)
}

pub(crate) fn clear_flag(semantics: &mut Semantics, flag: RegisterId) -> Result<(), Error> {
    let zero = semantics.ast().bv(0, 1);
    semantics.write_flag(flag, zero, false)
}

/// A condition on the flags, as tested by conditional jumps, moves and sets.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Condition {
    /// cf = 1
    Below,
    /// cf = 0
    NotBelow,
    /// zf = 1
    Zero,
    /// zf = 0
    NotZero,
    /// sf = 1
    Sign,
    /// sf = 0
    NotSign,
}

impl Condition {
    /// The flags this condition reads.
    pub fn flags(&self) -> &'static [RegisterId] {
        match self {
            Condition::Below | Condition::NotBelow => &[RegisterId::Cf],
            Condition::Zero | Condition::NotZero => &[RegisterId::Zf],
            Condition::Sign | Condition::NotSign => &[RegisterId::Sf],
        }
    }

    /// A 1-bit formula which is 1 when this condition holds.
    pub fn node(&self, semantics: &mut Semantics) -> Result<NodeId, Error> {
        let flag = semantics.lift_flag(self.flags()[0])?;
        match self {
            Condition::Below | Condition::Zero | Condition::Sign => Ok(flag),
            Condition::NotBelow | Condition::NotZero | Condition::NotSign => {
                semantics.ast().not(flag)
            }
        }
    }

    /// True if any flag this condition reads is tainted.
    pub fn taint(&self, semantics: &Semantics) -> Result<bool, Error> {
        for flag in self.flags() {
            if semantics.flag_taint(*flag)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
