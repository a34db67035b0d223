//! Information and types for Kestrel's supported architectures.
//!
//! An architecture is a table of registers. Every register has a parent, the
//! widest register it aliases, and an offset into that parent. Symbolic state
//! and taint are always kept for parents, and child registers are views into
//! their parent.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Debug;

use crate::Error;

mod x86;

pub use self::x86::{Amd64, X86};

macro_rules! register_ids {
    ($($variant:ident => $name:literal),* $(,)?) => {
        /// Identifies a register, independent of architecture.
        #[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
        pub enum RegisterId {
            $($variant),*
        }

        impl RegisterId {
            /// The lowercase assembly name of this register.
            pub fn name(&self) -> &'static str {
                match self {
                    $(RegisterId::$variant => $name),*
                }
            }

            /// Look up a register by its assembly name.
            pub fn from_name(name: &str) -> Option<RegisterId> {
                match name {
                    $($name => Some(RegisterId::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

register_ids! {
    Rax => "rax", Rbx => "rbx", Rcx => "rcx", Rdx => "rdx",
    Rsi => "rsi", Rdi => "rdi", Rbp => "rbp", Rsp => "rsp",
    R8 => "r8", R9 => "r9", R10 => "r10", R11 => "r11",
    R12 => "r12", R13 => "r13", R14 => "r14", R15 => "r15",
    Rip => "rip",
    Eax => "eax", Ebx => "ebx", Ecx => "ecx", Edx => "edx",
    Esi => "esi", Edi => "edi", Ebp => "ebp", Esp => "esp",
    R8d => "r8d", R9d => "r9d", R10d => "r10d", R11d => "r11d",
    R12d => "r12d", R13d => "r13d", R14d => "r14d", R15d => "r15d",
    Eip => "eip",
    Ax => "ax", Bx => "bx", Cx => "cx", Dx => "dx",
    Si => "si", Di => "di", Bp => "bp", Sp => "sp",
    Ah => "ah", Al => "al", Bh => "bh", Bl => "bl",
    Ch => "ch", Cl => "cl", Dh => "dh", Dl => "dl",
    Cf => "cf", Pf => "pf", Af => "af", Zf => "zf",
    Sf => "sf", Of => "of", Df => "df",
    Xmm0 => "xmm0", Xmm1 => "xmm1", Xmm2 => "xmm2", Xmm3 => "xmm3",
    Xmm4 => "xmm4", Xmm5 => "xmm5", Xmm6 => "xmm6", Xmm7 => "xmm7",
    Xmm8 => "xmm8", Xmm9 => "xmm9", Xmm10 => "xmm10", Xmm11 => "xmm11",
    Xmm12 => "xmm12", Xmm13 => "xmm13", Xmm14 => "xmm14", Xmm15 => "xmm15",
}

impl fmt::Display for RegisterId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A register of a specific architecture.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Register {
    id: RegisterId,
    bits: usize,
    /// The full register. For example, rax is the parent of al.
    parent: RegisterId,
    /// The offset of this register in its parent. For example, ah is offset
    /// 8 bits into rax.
    offset: usize,
}

impl Register {
    pub(crate) const fn new(id: RegisterId, bits: usize, parent: RegisterId, offset: usize) -> Register {
        Register {
            id,
            bits,
            parent,
            offset,
        }
    }

    pub fn id(&self) -> RegisterId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.id.name()
    }

    pub fn bits(&self) -> usize {
        self.bits
    }

    pub fn size(&self) -> usize {
        self.bits / 8
    }

    pub fn parent(&self) -> RegisterId {
        self.parent
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Returns true if this is a full-width register (i.e. rax, rbx, etc)
    pub fn is_parent(&self) -> bool {
        self.id == self.parent
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.id, self.bits)
    }
}

/// Necessary functions for lifting instructions of an architecture.
pub trait Architecture: Debug + Send + Sync {
    /// The name of this architecture.
    fn name(&self) -> &'static str;

    /// Get the size of a natural word for this architecture in bits.
    fn word_size(&self) -> usize;

    /// Every register of this architecture.
    fn registers(&self) -> &'static [Register];

    /// The program counter register.
    fn program_counter(&self) -> Register;

    /// The stack pointer register.
    fn stack_pointer(&self) -> Register;

    /// True if writing `register` clears the bits of its parent above it,
    /// rather than leaving them untouched.
    fn zero_extends(&self, register: &Register) -> bool;

    /// Look up a register of this architecture.
    fn register(&self, id: RegisterId) -> Result<Register, Error> {
        self.registers()
            .iter()
            .find(|register| register.id == id)
            .copied()
            .ok_or(Error::InvalidRegister(id, self.name()))
    }

    /// The parent register of `register`.
    fn parent(&self, register: &Register) -> Result<Register, Error> {
        self.register(register.parent)
    }

    /// Every full-width register of this architecture.
    fn parent_registers(&self) -> Vec<Register> {
        self.registers()
            .iter()
            .filter(|register| register.is_parent())
            .copied()
            .collect()
    }
}
