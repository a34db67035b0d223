//! Hash-consed bitvector formulas.
//!
//! Every formula Kestrel builds lives in an `AstContext`. Nodes are interned,
//! so two structurally equal nodes always share a `NodeId`, and comparing
//! formulas for equality is comparing ids.
//!
//! Symbolic expressions refer to one another through `Node::Reference`. A
//! reference is an opaque leaf to the arena, and is only unfolded by
//! `AstContext::materialize` or by evaluation.

use serde::{Deserialize, Serialize};
use std::fmt;

mod constant;
mod context;
mod eval;
mod node;
pub mod simplification;
mod smtlib;

pub use self::constant::Constant;
pub use self::context::{AstContext, AstStatistics};
pub use self::eval::{eval, Environment, NoEnvironment};
pub use self::node::{BinaryOp, Node, UnaryOp};
pub use self::smtlib::{
    constant_to_smtlib2, node_to_string, smtlib2_definitions, NodeView, Smtlib2Script,
};

/// The identifier of a node in an `AstContext`.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// The identifier of a symbolic expression.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct ExpressionId(pub u64);

impl fmt::Display for ExpressionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ref!{}", self.0)
    }
}

/// The identifier of a symbolic variable.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct VariableId(pub u64);

impl VariableId {
    /// The name of the variable with this id, as it appears in solver
    /// scripts and models.
    pub fn name(&self) -> String {
        format!("SymVar_{}", self.0)
    }
}

impl fmt::Display for VariableId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SymVar_{}", self.0)
    }
}
