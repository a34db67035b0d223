//! Operands of decoded instructions.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::architecture::Register;
use crate::ast::Constant;

/// The kind of an operand, as used in dispatch signatures.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum OperandKind {
    Immediate,
    Register,
    Memory,
    /// Padding for signatures shorter than their opcode's arity.
    None,
}

impl fmt::Display for OperandKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OperandKind::Immediate => write!(f, "imm"),
            OperandKind::Register => write!(f, "reg"),
            OperandKind::Memory => write!(f, "mem"),
            OperandKind::None => write!(f, "none"),
        }
    }
}

/// An immediate value.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Immediate {
    value: u64,
    bits: usize,
}

impl Immediate {
    pub fn new(value: u64, bits: usize) -> Immediate {
        Immediate { value, bits }
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn bits(&self) -> usize {
        self.bits
    }

    pub fn constant(&self) -> Constant {
        Constant::new(self.value, self.bits)
    }
}

/// An access to memory.
///
/// `base + index * scale + displacement` describes how the address is
/// computed. The memory operand is set up once `address` holds the concrete
/// address this computation resolved to.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct MemoryOperand {
    address: Option<u64>,
    size: usize,
    base: Option<Register>,
    index: Option<Register>,
    scale: u64,
    displacement: i64,
    concrete_value: Option<Constant>,
    trusted: bool,
}

impl MemoryOperand {
    /// A memory access of `size` bytes, which has not been set up.
    pub fn new(size: usize) -> MemoryOperand {
        MemoryOperand {
            address: None,
            size,
            base: None,
            index: None,
            scale: 1,
            displacement: 0,
            concrete_value: None,
            trusted: false,
        }
    }

    /// A memory access of `size` bytes at a known address.
    pub fn at(address: u64, size: usize) -> MemoryOperand {
        let mut memory = MemoryOperand::new(size);
        memory.address = Some(address);
        memory
    }

    pub fn with_base(mut self, base: Register) -> MemoryOperand {
        self.base = Some(base);
        self
    }

    pub fn with_index(mut self, index: Register, scale: u64) -> MemoryOperand {
        self.index = Some(index);
        self.scale = scale;
        self
    }

    pub fn with_displacement(mut self, displacement: i64) -> MemoryOperand {
        self.displacement = displacement;
        self
    }

    /// Resolve this operand to a concrete address.
    pub fn setup(&mut self, address: u64) {
        self.address = Some(address);
    }

    /// Record the value at this address as observed by the tracer. The value
    /// is trusted, and preferred over the concrete-state provider.
    pub fn set_concrete_value(&mut self, value: Constant) {
        self.concrete_value = Some(value);
        self.trusted = true;
    }

    /// Mark the cached concrete value as stale.
    pub fn untrust(&mut self) {
        self.trusted = false;
    }

    pub fn needs_setup(&self) -> bool {
        self.address.is_none()
    }

    pub fn address(&self) -> Option<u64> {
        self.address
    }

    /// The size of this access in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn bits(&self) -> usize {
        self.size * 8
    }

    pub fn base(&self) -> Option<&Register> {
        self.base.as_ref()
    }

    pub fn index(&self) -> Option<&Register> {
        self.index.as_ref()
    }

    pub fn scale(&self) -> u64 {
        self.scale
    }

    pub fn displacement(&self) -> i64 {
        self.displacement
    }

    /// The cached concrete value, if it is trusted.
    pub fn trusted_value(&self) -> Option<&Constant> {
        if self.trusted {
            self.concrete_value.as_ref()
        } else {
            None
        }
    }

    pub fn is_trusted(&self) -> bool {
        self.trusted
    }
}

#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Operand {
    Immediate(Immediate),
    Register(Register),
    Memory(MemoryOperand),
}

impl Operand {
    pub fn immediate(value: u64, bits: usize) -> Operand {
        Operand::Immediate(Immediate::new(value, bits))
    }

    pub fn memory(memory: MemoryOperand) -> Operand {
        Operand::Memory(memory)
    }

    pub fn kind(&self) -> OperandKind {
        match self {
            Operand::Immediate(_) => OperandKind::Immediate,
            Operand::Register(_) => OperandKind::Register,
            Operand::Memory(_) => OperandKind::Memory,
        }
    }

    pub fn bits(&self) -> usize {
        match self {
            Operand::Immediate(immediate) => immediate.bits(),
            Operand::Register(register) => register.bits(),
            Operand::Memory(memory) => memory.bits(),
        }
    }

    pub fn register(&self) -> Option<&Register> {
        match self {
            Operand::Register(register) => Some(register),
            _ => None,
        }
    }

    pub fn memory_operand(&self) -> Option<&MemoryOperand> {
        match self {
            Operand::Memory(memory) => Some(memory),
            _ => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Operand::Immediate(immediate) => {
                write!(f, "0x{:x}:{}", immediate.value, immediate.bits)
            }
            Operand::Register(register) => register.fmt(f),
            Operand::Memory(memory) => match memory.address {
                Some(address) => write!(f, "[0x{:x}]:{}", address, memory.bits()),
                None => write!(f, "[?]:{}", memory.bits()),
            },
        }
    }
}
