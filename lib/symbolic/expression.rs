use serde::{Deserialize, Serialize};
use std::fmt;

use crate::architecture::RegisterId;
use crate::ast::{Constant, ExpressionId, NodeId, VariableId};

/// Where the value of a symbolic expression or symbolic variable was written
/// to, or read from.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Origin {
    /// A full-width register.
    Register(RegisterId),
    /// `size` bytes of memory at `address`.
    Memory { address: u64, size: usize },
    /// Not bound to any location, such as a path predicate or a value created
    /// by the user.
    Volatile,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Origin::Register(register) => register.fmt(f),
            Origin::Memory { address, size } => write!(f, "[0x{:x}]:{}", address, size * 8),
            Origin::Volatile => write!(f, "volatile"),
        }
    }
}

/// An immutable formula bound to one write of one instruction.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SymbolicExpression {
    id: ExpressionId,
    node: NodeId,
    bits: usize,
    comment: String,
    origin: Origin,
    tainted: bool,
}

impl SymbolicExpression {
    pub(crate) fn new(
        id: ExpressionId,
        node: NodeId,
        bits: usize,
        comment: String,
        origin: Origin,
        tainted: bool,
    ) -> SymbolicExpression {
        SymbolicExpression {
            id,
            node,
            bits,
            comment,
            origin,
            tainted,
        }
    }

    pub fn id(&self) -> ExpressionId {
        self.id
    }

    /// The root of the formula of this expression.
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn bits(&self) -> usize {
        self.bits
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Whether the destination of this expression was tainted when it was
    /// created.
    pub fn is_tainted(&self) -> bool {
        self.tainted
    }
}

impl fmt::Display for SymbolicExpression {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} = {}", self.id, self.node)?;
        if !self.comment.is_empty() {
            write!(f, " ; {}", self.comment)?;
        }
        Ok(())
    }
}

/// A free variable of the formulas.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SymbolicVariable {
    id: VariableId,
    bits: usize,
    comment: String,
    concrete_value: Constant,
    origin: Origin,
}

impl SymbolicVariable {
    pub(crate) fn new(
        id: VariableId,
        bits: usize,
        comment: String,
        concrete_value: Constant,
        origin: Origin,
    ) -> SymbolicVariable {
        SymbolicVariable {
            id,
            bits,
            comment,
            concrete_value,
            origin,
        }
    }

    pub fn id(&self) -> VariableId {
        self.id
    }

    /// The name of this variable, `SymVar_<id>`.
    pub fn name(&self) -> String {
        self.id.name()
    }

    pub fn bits(&self) -> usize {
        self.bits
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// The concrete value this variable had when it was created. Evaluation
    /// substitutes this value for the variable.
    pub fn concrete_value(&self) -> &Constant {
        &self.concrete_value
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }
}

impl fmt::Display for SymbolicVariable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.id, self.bits)
    }
}
