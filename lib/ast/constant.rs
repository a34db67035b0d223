//! A `Constant` holds a single bitvector value.
//!
//! Constants are arbitrary width, which allows Kestrel to carry 128-bit vector
//! registers through the same paths as general-purpose registers.

use num_bigint::{BigInt, BigUint};
use num_traits::{One, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Error;

/// A constant bitvector value.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Constant {
    value: BigUint,
    bits: usize,
}

impl Constant {
    /// Create a new `Constant` with the given value and bitness.
    pub fn new(value: u64, bits: usize) -> Constant {
        Constant::new_big(BigUint::from(value), bits)
    }

    /// Create a new `Constant` from a `BigUint`, truncated to the given
    /// bitness.
    pub fn new_big(value: BigUint, bits: usize) -> Constant {
        Constant {
            value: value & Constant::mask(bits),
            bits,
        }
    }

    /// A value with the low `bits` bits set.
    pub fn mask(bits: usize) -> BigUint {
        (BigUint::one() << bits) - BigUint::one()
    }

    /// Create a constant from little-endian bytes. The constant will have
    /// `bytes.len() * 8` bits.
    pub fn from_bytes_le(bytes: &[u8]) -> Constant {
        Constant::new_big(BigUint::from_bytes_le(bytes), bytes.len() * 8)
    }

    /// Get the value of this `Constant`.
    pub fn value(&self) -> &BigUint {
        &self.value
    }

    /// Get the value of this `Constant` if it fits in a u64.
    pub fn value_u64(&self) -> Option<u64> {
        self.value.to_u64()
    }

    /// Get the value of this `Constant` interpreted as a two's complement
    /// signed integer.
    pub fn value_signed(&self) -> BigInt {
        if self.bits > 0 && self.value.bit(self.bits as u64 - 1) {
            BigInt::from(self.value.clone()) - (BigInt::one() << self.bits)
        } else {
            BigInt::from(self.value.clone())
        }
    }

    /// Get the number of bits for this `Constant`.
    pub fn bits(&self) -> usize {
        self.bits
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    pub fn is_one(&self) -> bool {
        self.value.is_one()
    }

    /// True if every bit of this constant is set.
    pub fn is_ones(&self) -> bool {
        self.value == Constant::mask(self.bits)
    }

    /// The little-endian bytes of this constant, padded to `bits / 8` bytes.
    pub fn to_bytes_le(&self) -> Vec<u8> {
        let size = (self.bits + 7) / 8;
        let mut bytes = self.value.to_bytes_le();
        bytes.resize(size, 0);
        bytes
    }

    /// Extract bits `high..=low` from this constant.
    pub fn extract(&self, high: usize, low: usize) -> Result<Constant, Error> {
        if high < low || high >= self.bits {
            return Err(Error::Sort);
        }
        Ok(Constant::new_big(&self.value >> low, high - low + 1))
    }

    /// Zero-extend this constant to `bits` bits.
    pub fn zext(&self, bits: usize) -> Result<Constant, Error> {
        if bits < self.bits {
            return Err(Error::Sort);
        }
        Ok(Constant::new_big(self.value.clone(), bits))
    }

    /// Sign-extend this constant to `bits` bits.
    pub fn sext(&self, bits: usize) -> Result<Constant, Error> {
        if bits < self.bits {
            return Err(Error::Sort);
        }
        Ok(Constant::from_signed(self.value_signed(), bits))
    }

    fn from_signed(value: BigInt, bits: usize) -> Constant {
        let modulus = BigInt::one() << bits;
        let value = ((value % &modulus) + &modulus) % &modulus;
        // The value is non-negative after reduction.
        Constant::new_big(value.to_biguint().unwrap_or_default(), bits)
    }

    fn ensure_sort(&self, rhs: &Constant) -> Result<(), Error> {
        if self.bits != rhs.bits {
            Err(Error::Sort)
        } else {
            Ok(())
        }
    }

    fn boolean(value: bool) -> Constant {
        Constant::new(value as u64, 1)
    }

    pub fn add(&self, rhs: &Constant) -> Result<Constant, Error> {
        self.ensure_sort(rhs)?;
        Ok(Constant::new_big(&self.value + &rhs.value, self.bits))
    }

    pub fn sub(&self, rhs: &Constant) -> Result<Constant, Error> {
        self.ensure_sort(rhs)?;
        let value = (&self.value + (BigUint::one() << self.bits)) - &rhs.value;
        Ok(Constant::new_big(value, self.bits))
    }

    pub fn mul(&self, rhs: &Constant) -> Result<Constant, Error> {
        self.ensure_sort(rhs)?;
        Ok(Constant::new_big(&self.value * &rhs.value, self.bits))
    }

    pub fn udiv(&self, rhs: &Constant) -> Result<Constant, Error> {
        self.ensure_sort(rhs)?;
        if rhs.is_zero() {
            return Err(Error::Arithmetic("Division by zero".to_string()));
        }
        Ok(Constant::new_big(&self.value / &rhs.value, self.bits))
    }

    pub fn urem(&self, rhs: &Constant) -> Result<Constant, Error> {
        self.ensure_sort(rhs)?;
        if rhs.is_zero() {
            return Err(Error::Arithmetic("Division by zero".to_string()));
        }
        Ok(Constant::new_big(&self.value % &rhs.value, self.bits))
    }

    pub fn sdiv(&self, rhs: &Constant) -> Result<Constant, Error> {
        self.ensure_sort(rhs)?;
        if rhs.is_zero() {
            return Err(Error::Arithmetic("Division by zero".to_string()));
        }
        Ok(Constant::from_signed(
            self.value_signed() / rhs.value_signed(),
            self.bits,
        ))
    }

    pub fn srem(&self, rhs: &Constant) -> Result<Constant, Error> {
        self.ensure_sort(rhs)?;
        if rhs.is_zero() {
            return Err(Error::Arithmetic("Division by zero".to_string()));
        }
        Ok(Constant::from_signed(
            self.value_signed() % rhs.value_signed(),
            self.bits,
        ))
    }

    pub fn and(&self, rhs: &Constant) -> Result<Constant, Error> {
        self.ensure_sort(rhs)?;
        Ok(Constant::new_big(&self.value & &rhs.value, self.bits))
    }

    pub fn or(&self, rhs: &Constant) -> Result<Constant, Error> {
        self.ensure_sort(rhs)?;
        Ok(Constant::new_big(&self.value | &rhs.value, self.bits))
    }

    pub fn xor(&self, rhs: &Constant) -> Result<Constant, Error> {
        self.ensure_sort(rhs)?;
        Ok(Constant::new_big(&self.value ^ &rhs.value, self.bits))
    }

    pub fn not(&self) -> Constant {
        Constant::new_big(&self.value ^ Constant::mask(self.bits), self.bits)
    }

    pub fn neg(&self) -> Constant {
        let value = (BigUint::one() << self.bits) - &self.value;
        Constant::new_big(value, self.bits)
    }

    /// The shift amount, or `None` if it is at least as large as the width of
    /// this constant.
    fn shift_amount(&self, rhs: &Constant) -> Option<usize> {
        match rhs.value.to_usize() {
            Some(shift) if shift < self.bits => Some(shift),
            _ => None,
        }
    }

    pub fn shl(&self, rhs: &Constant) -> Result<Constant, Error> {
        self.ensure_sort(rhs)?;
        Ok(match self.shift_amount(rhs) {
            Some(shift) => Constant::new_big(&self.value << shift, self.bits),
            None => Constant::new(0, self.bits),
        })
    }

    pub fn lshr(&self, rhs: &Constant) -> Result<Constant, Error> {
        self.ensure_sort(rhs)?;
        Ok(match self.shift_amount(rhs) {
            Some(shift) => Constant::new_big(&self.value >> shift, self.bits),
            None => Constant::new(0, self.bits),
        })
    }

    pub fn ashr(&self, rhs: &Constant) -> Result<Constant, Error> {
        self.ensure_sort(rhs)?;
        let shift = self.shift_amount(rhs).unwrap_or(self.bits);
        Ok(Constant::from_signed(self.value_signed() >> shift, self.bits))
    }

    pub fn equal(&self, rhs: &Constant) -> Result<Constant, Error> {
        self.ensure_sort(rhs)?;
        Ok(Constant::boolean(self.value == rhs.value))
    }

    pub fn distinct(&self, rhs: &Constant) -> Result<Constant, Error> {
        self.ensure_sort(rhs)?;
        Ok(Constant::boolean(self.value != rhs.value))
    }

    pub fn ult(&self, rhs: &Constant) -> Result<Constant, Error> {
        self.ensure_sort(rhs)?;
        Ok(Constant::boolean(self.value < rhs.value))
    }

    pub fn ule(&self, rhs: &Constant) -> Result<Constant, Error> {
        self.ensure_sort(rhs)?;
        Ok(Constant::boolean(self.value <= rhs.value))
    }

    pub fn slt(&self, rhs: &Constant) -> Result<Constant, Error> {
        self.ensure_sort(rhs)?;
        Ok(Constant::boolean(self.value_signed() < rhs.value_signed()))
    }

    pub fn sle(&self, rhs: &Constant) -> Result<Constant, Error> {
        self.ensure_sort(rhs)?;
        Ok(Constant::boolean(self.value_signed() <= rhs.value_signed()))
    }

    /// Concatenate `rhs` below this constant.
    pub fn concat(&self, rhs: &Constant) -> Constant {
        Constant::new_big(
            (&self.value << rhs.bits) | &rhs.value,
            self.bits + rhs.bits,
        )
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{:X}:{}", self.value, self.bits)
    }
}
