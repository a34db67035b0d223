//! Symbolic expressions, symbolic variables and the symbolic state.

mod engine;
mod expression;
pub mod lift;
mod path;

pub use self::engine::{MemoryCell, SymbolicEngine, SymbolicView};
pub use self::expression::{Origin, SymbolicExpression, SymbolicVariable};
pub use self::path::{PathConstraint, PathConstraints};
