//! Instruction semantics.
//!
//! Every supported opcode has an entry in the dispatch table, which maps the
//! kinds of its operands to a handler. Operand combinations which are not in
//! the table are illegal. Combinations which are legal, but for which no
//! handler exists yet, are reported as not implemented.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::operand::OperandKind::{self, Immediate, Memory, Register};
use crate::Error;

mod arithmetic;
mod control;
mod data;
mod flags;
mod shift;
mod stack;
mod staging;
#[cfg(test)]
mod test;

pub use self::flags::Condition;
pub use self::staging::{Propagation, Semantics};
pub(crate) use self::staging::{Pending, Staged};

macro_rules! opcodes {
    ($($opcode:ident => $mnemonic:literal),* $(,)?) => {
        /// The opcodes with semantics.
        #[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
        pub enum Opcode {
            $($opcode),*
        }

        impl Opcode {
            pub fn mnemonic(&self) -> &'static str {
                match self {
                    $(Opcode::$opcode => $mnemonic),*
                }
            }

            pub fn from_mnemonic(mnemonic: &str) -> Option<Opcode> {
                match mnemonic {
                    $($mnemonic => Some(Opcode::$opcode),)*
                    _ => None,
                }
            }
        }
    };
}

opcodes! {
    Mov => "mov",
    Movzx => "movzx",
    Movsx => "movsx",
    Lea => "lea",
    Add => "add",
    Sub => "sub",
    And => "and",
    Or => "or",
    Xor => "xor",
    Not => "not",
    Inc => "inc",
    Dec => "dec",
    Shl => "shl",
    Shr => "shr",
    Sar => "sar",
    Cmp => "cmp",
    Test => "test",
    Sets => "sets",
    Setns => "setns",
    Setz => "setz",
    Setnz => "setnz",
    Setb => "setb",
    Setnb => "setnb",
    Push => "push",
    Pop => "pop",
    Jmp => "jmp",
    Jz => "jz",
    Jnz => "jnz",
    Jb => "jb",
    Jnb => "jnb",
    Js => "js",
    Jns => "jns",
    Cmovnb => "cmovnb",
    Cmovz => "cmovz",
    Bswap => "bswap",
    Andpd => "andpd",
    Pcmpeqw => "pcmpeqw",
    Nop => "nop",
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

/// The semantics of one operand combination of an opcode.
pub type Handler = fn(&mut Semantics) -> Result<(), Error>;

/// An operand combination, and its handler if one exists.
pub struct Entry {
    pub signature: &'static [OperandKind],
    pub handler: Option<Handler>,
}

const fn entry(signature: &'static [OperandKind], handler: Handler) -> Entry {
    Entry {
        signature,
        handler: Some(handler),
    }
}

const fn missing(signature: &'static [OperandKind]) -> Entry {
    Entry {
        signature,
        handler: None,
    }
}

macro_rules! entries {
    ($($entry:expr),* $(,)?) => {{
        const ENTRIES: &[Entry] = &[$($entry),*];
        ENTRIES
    }};
}

macro_rules! binary {
    ($handler:path) => {
        entries![
            entry(&[Register, Register], $handler),
            entry(&[Register, Memory], $handler),
            entry(&[Register, Immediate], $handler),
            entry(&[Memory, Register], $handler),
            entry(&[Memory, Immediate], $handler),
        ]
    };
}

macro_rules! unary {
    ($handler:path) => {
        entries![
            entry(&[Register], $handler),
            entry(&[Memory], $handler),
        ]
    };
}

macro_rules! shift {
    ($handler:path) => {
        entries![
            entry(&[Register, Immediate], $handler),
            entry(&[Register, Register], $handler),
            entry(&[Memory, Immediate], $handler),
            missing(&[Memory, Register]),
        ]
    };
}

macro_rules! register_source {
    ($handler:path) => {
        entries![
            entry(&[Register, Register], $handler),
            entry(&[Register, Memory], $handler),
        ]
    };
}

/// The arity of an opcode, and its operand combinations.
pub fn table(opcode: Opcode) -> (usize, &'static [Entry]) {
    match opcode {
        Opcode::Mov => (2, binary!(data::mov)),
        Opcode::Movzx => (2, register_source!(data::movzx)),
        Opcode::Movsx => (2, register_source!(data::movsx)),
        Opcode::Lea => (2, entries![entry(&[Register, Memory], data::lea)]),
        Opcode::Add => (2, binary!(arithmetic::add)),
        Opcode::Sub => (2, binary!(arithmetic::sub)),
        Opcode::And => (2, binary!(arithmetic::and)),
        Opcode::Or => (2, binary!(arithmetic::or)),
        Opcode::Xor => (2, binary!(arithmetic::xor)),
        Opcode::Cmp => (2, binary!(arithmetic::cmp)),
        Opcode::Test => (
            2,
            entries![
                entry(&[Register, Register], arithmetic::test),
                entry(&[Register, Immediate], arithmetic::test),
                entry(&[Memory, Register], arithmetic::test),
                entry(&[Memory, Immediate], arithmetic::test),
            ],
        ),
        Opcode::Not => (1, unary!(arithmetic::not)),
        Opcode::Inc => (1, unary!(arithmetic::inc)),
        Opcode::Dec => (1, unary!(arithmetic::dec)),
        Opcode::Shl => (2, shift!(shift::shl)),
        Opcode::Shr => (2, shift!(shift::shr)),
        Opcode::Sar => (2, shift!(shift::sar)),
        Opcode::Sets => (1, unary!(data::sets)),
        Opcode::Setns => (1, unary!(data::setns)),
        Opcode::Setz => (1, unary!(data::setz)),
        Opcode::Setnz => (1, unary!(data::setnz)),
        Opcode::Setb => (1, unary!(data::setb)),
        Opcode::Setnb => (1, unary!(data::setnb)),
        Opcode::Push => (
            2,
            entries![
                entry(&[Register, Memory], stack::push),
                entry(&[Memory, Memory], stack::push),
                entry(&[Immediate, Memory], stack::push),
            ],
        ),
        Opcode::Pop => (
            2,
            entries![
                entry(&[Register, Memory], stack::pop),
                entry(&[Memory, Memory], stack::pop),
            ],
        ),
        Opcode::Jmp => (
            1,
            entries![
                entry(&[Immediate], control::jmp),
                entry(&[Register], control::jmp),
                entry(&[Memory], control::jmp),
            ],
        ),
        Opcode::Jz => (1, entries![entry(&[Immediate], control::jz)]),
        Opcode::Jnz => (1, entries![entry(&[Immediate], control::jnz)]),
        Opcode::Jb => (1, entries![entry(&[Immediate], control::jb)]),
        Opcode::Jnb => (1, entries![entry(&[Immediate], control::jnb)]),
        Opcode::Js => (1, entries![entry(&[Immediate], control::js)]),
        Opcode::Jns => (1, entries![entry(&[Immediate], control::jns)]),
        Opcode::Cmovnb => (2, register_source!(data::cmovnb)),
        Opcode::Cmovz => (2, register_source!(data::cmovz)),
        Opcode::Bswap => (1, entries![entry(&[Register], data::bswap)]),
        Opcode::Andpd => (2, register_source!(data::andpd)),
        Opcode::Pcmpeqw => (2, register_source!(data::pcmpeqw)),
        Opcode::Nop => (
            1,
            entries![
                entry(&[OperandKind::None], control::nop),
                entry(&[Register], control::nop),
                entry(&[Memory], control::nop),
            ],
        ),
    }
}

fn signature_string(kinds: &[OperandKind]) -> String {
    kinds
        .iter()
        .map(|kind| kind.to_string())
        .collect::<Vec<String>>()
        .join(", ")
}

/// Find the handler for an opcode and the kinds of its operands.
///
/// Operand lists shorter than the arity of the opcode are padded with
/// `OperandKind::None`.
pub fn lookup(opcode: Opcode, operands: &[OperandKind]) -> Result<Handler, Error> {
    let (arity, entries) = table(opcode);
    if operands.len() > arity {
        return Err(Error::IllegalOperands {
            opcode,
            signature: signature_string(operands),
        });
    }
    let mut kinds = operands.to_vec();
    kinds.resize(arity, OperandKind::None);

    let entry = entries
        .iter()
        .find(|entry| entry.signature == kinds.as_slice())
        .ok_or_else(|| Error::IllegalOperands {
            opcode,
            signature: signature_string(operands),
        })?;

    entry.handler.ok_or_else(|| Error::NotImplemented {
        opcode,
        signature: signature_string(operands),
    })
}

/// Run a handler, and bind the program counter to the next instruction if the
/// handler did not set it.
pub(crate) fn execute(semantics: &mut Semantics, handler: Handler) -> Result<(), Error> {
    handler(semantics)?;
    if !semantics.program_counter_written() {
        let bits = semantics.architecture().program_counter().bits();
        let next = semantics.instruction().next_address();
        let next = semantics.ast().bv(next, bits);
        semantics.set_program_counter(next, false)?;
    }
    Ok(())
}
