//! The concrete state of the program being analyzed.
//!
//! Kestrel does not run programs. Concrete register and memory values come from
//! an external tracer or emulator through the `ConcreteState` trait.

use log::trace;
use num_bigint::BigUint;
use num_traits::Zero;
use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::architecture::{Register, RegisterId};
use crate::ast::Constant;

/// A provider of concrete register and memory values.
pub trait ConcreteState: Debug + Send {
    /// The value of `register`.
    fn register_value(&self, register: &Register) -> Constant;

    /// Set the value of `register`. The value has the width of `register`.
    fn set_register_value(&mut self, register: &Register, value: &Constant);

    /// The byte at `address`.
    fn memory_byte(&self, address: u64) -> u8;

    fn set_memory_byte(&mut self, address: u64, value: u8);

    /// Read `size` bytes at `address`, little-endian.
    fn memory_value(&self, address: u64, size: usize) -> Constant {
        let bytes: Vec<u8> = (0..size as u64)
            .map(|offset| self.memory_byte(address.wrapping_add(offset)))
            .collect();
        Constant::from_bytes_le(&bytes)
    }

    /// Write `value` at `address`, little-endian.
    fn set_memory_value(&mut self, address: u64, value: &Constant) {
        for (offset, byte) in value.to_bytes_le().into_iter().enumerate() {
            self.set_memory_byte(address.wrapping_add(offset as u64), byte);
        }
    }
}

/// A simple `ConcreteState`, holding full-width register values and sparse
/// little-endian memory. Unset registers and memory read as zero.
#[derive(Clone, Debug, Default)]
pub struct ConcreteMemory {
    registers: BTreeMap<RegisterId, BigUint>,
    memory: BTreeMap<u64, u8>,
}

impl ConcreteMemory {
    pub fn new() -> ConcreteMemory {
        ConcreteMemory::default()
    }

    /// Load `bytes` into memory starting at `address`.
    pub fn load(&mut self, address: u64, bytes: &[u8]) {
        trace!("loading {} bytes at 0x{:x}", bytes.len(), address);
        for (offset, byte) in bytes.iter().enumerate() {
            self.memory.insert(address.wrapping_add(offset as u64), *byte);
        }
    }
}

impl ConcreteState for ConcreteMemory {
    fn register_value(&self, register: &Register) -> Constant {
        let value = match self.registers.get(&register.parent()) {
            Some(value) => value >> register.offset(),
            None => BigUint::zero(),
        };
        Constant::new_big(value, register.bits())
    }

    fn set_register_value(&mut self, register: &Register, value: &Constant) {
        let parent = self
            .registers
            .entry(register.parent())
            .or_insert_with(BigUint::zero);
        let mask = Constant::mask(register.bits()) << register.offset();
        let cleared = &*parent ^ (&*parent & &mask);
        let value = Constant::new_big(value.value().clone(), register.bits());
        *parent = cleared | (value.value() << register.offset());
    }

    fn memory_byte(&self, address: u64) -> u8 {
        self.memory.get(&address).copied().unwrap_or(0)
    }

    fn set_memory_byte(&mut self, address: u64, value: u8) {
        self.memory.insert(address, value);
    }
}
