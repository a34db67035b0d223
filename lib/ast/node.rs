use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ast::{Constant, ExpressionId, NodeId, VariableId};

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum UnaryOp {
    Not,
    Neg,
}

impl UnaryOp {
    pub fn smtlib2(&self) -> &'static str {
        match self {
            UnaryOp::Not => "bvnot",
            UnaryOp::Neg => "bvneg",
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Udiv,
    Urem,
    Sdiv,
    Srem,
    And,
    Or,
    Xor,
    Shl,
    Lshr,
    Ashr,
    Equal,
    Distinct,
    Ult,
    Ule,
    Ugt,
    Uge,
    Slt,
    Sle,
    Sgt,
    Sge,
}

impl BinaryOp {
    /// True if this operation produces a 1-bit truth value rather than a value
    /// of the width of its operands.
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::Distinct
                | BinaryOp::Ult
                | BinaryOp::Ule
                | BinaryOp::Ugt
                | BinaryOp::Uge
                | BinaryOp::Slt
                | BinaryOp::Sle
                | BinaryOp::Sgt
                | BinaryOp::Sge
        )
    }

    pub fn is_commutative(&self) -> bool {
        matches!(
            self,
            BinaryOp::Add
                | BinaryOp::Mul
                | BinaryOp::And
                | BinaryOp::Or
                | BinaryOp::Xor
                | BinaryOp::Equal
                | BinaryOp::Distinct
        )
    }

    pub fn smtlib2(&self) -> &'static str {
        match self {
            BinaryOp::Add => "bvadd",
            BinaryOp::Sub => "bvsub",
            BinaryOp::Mul => "bvmul",
            BinaryOp::Udiv => "bvudiv",
            BinaryOp::Urem => "bvurem",
            BinaryOp::Sdiv => "bvsdiv",
            BinaryOp::Srem => "bvsrem",
            BinaryOp::And => "bvand",
            BinaryOp::Or => "bvor",
            BinaryOp::Xor => "bvxor",
            BinaryOp::Shl => "bvshl",
            BinaryOp::Lshr => "bvlshr",
            BinaryOp::Ashr => "bvashr",
            BinaryOp::Equal => "=",
            BinaryOp::Distinct => "distinct",
            BinaryOp::Ult => "bvult",
            BinaryOp::Ule => "bvule",
            BinaryOp::Ugt => "bvugt",
            BinaryOp::Uge => "bvuge",
            BinaryOp::Slt => "bvslt",
            BinaryOp::Sle => "bvsle",
            BinaryOp::Sgt => "bvsgt",
            BinaryOp::Sge => "bvsge",
        }
    }
}

/// A single node of a formula. Children are `NodeId`s into the owning
/// `AstContext`.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Node {
    Constant(Constant),
    Variable { id: VariableId, bits: usize },
    /// The value of another symbolic expression.
    Reference { id: ExpressionId, bits: usize },
    Unary { op: UnaryOp, operand: NodeId },
    Binary { op: BinaryOp, lhs: NodeId, rhs: NodeId },
    Extract { high: usize, low: usize, operand: NodeId },
    /// Concatenation, most significant operand first.
    Concat(Vec<NodeId>),
    /// Zero extension by `bits` additional bits.
    ZeroExtend { bits: usize, operand: NodeId },
    /// Sign extension by `bits` additional bits.
    SignExtend { bits: usize, operand: NodeId },
    Ite {
        condition: NodeId,
        then: NodeId,
        else_: NodeId,
    },
}

impl Node {
    /// The children of this node, in order.
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            Node::Constant(_) | Node::Variable { .. } | Node::Reference { .. } => Vec::new(),
            Node::Unary { operand, .. }
            | Node::Extract { operand, .. }
            | Node::ZeroExtend { operand, .. }
            | Node::SignExtend { operand, .. } => vec![*operand],
            Node::Binary { lhs, rhs, .. } => vec![*lhs, *rhs],
            Node::Concat(operands) => operands.clone(),
            Node::Ite {
                condition,
                then,
                else_,
            } => vec![*condition, *then, *else_],
        }
    }

    /// A copy of this node with its children replaced, in order, by
    /// `children`.
    pub fn with_children(&self, children: &[NodeId]) -> Node {
        match self {
            Node::Constant(_) | Node::Variable { .. } | Node::Reference { .. } => self.clone(),
            Node::Unary { op, .. } => Node::Unary {
                op: *op,
                operand: children[0],
            },
            Node::Extract { high, low, .. } => Node::Extract {
                high: *high,
                low: *low,
                operand: children[0],
            },
            Node::ZeroExtend { bits, .. } => Node::ZeroExtend {
                bits: *bits,
                operand: children[0],
            },
            Node::SignExtend { bits, .. } => Node::SignExtend {
                bits: *bits,
                operand: children[0],
            },
            Node::Binary { op, .. } => Node::Binary {
                op: *op,
                lhs: children[0],
                rhs: children[1],
            },
            Node::Concat(_) => Node::Concat(children.to_vec()),
            Node::Ite { .. } => Node::Ite {
                condition: children[0],
                then: children[1],
                else_: children[2],
            },
        }
    }

    /// A short name for the kind of this node, used in statistics.
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Constant(_) => "bv",
            Node::Variable { .. } => "variable",
            Node::Reference { .. } => "reference",
            Node::Unary { op, .. } => op.smtlib2(),
            Node::Binary { op, .. } => op.smtlib2(),
            Node::Extract { .. } => "extract",
            Node::Concat(_) => "concat",
            Node::ZeroExtend { .. } => "zx",
            Node::SignExtend { .. } => "sx",
            Node::Ite { .. } => "ite",
        }
    }

    pub fn constant(&self) -> Option<&Constant> {
        match self {
            Node::Constant(constant) => Some(constant),
            _ => None,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Node::Constant(constant) => constant.fmt(f),
            Node::Variable { id, .. } => id.fmt(f),
            Node::Reference { id, .. } => id.fmt(f),
            Node::Unary { op, operand } => write!(f, "({} {})", op.smtlib2(), operand),
            Node::Binary { op, lhs, rhs } => write!(f, "({} {} {})", op.smtlib2(), lhs, rhs),
            Node::Extract { high, low, operand } => {
                write!(f, "((_ extract {} {}) {})", high, low, operand)
            }
            Node::Concat(operands) => {
                write!(f, "(concat")?;
                for operand in operands {
                    write!(f, " {}", operand)?;
                }
                write!(f, ")")
            }
            Node::ZeroExtend { bits, operand } => {
                write!(f, "((_ zero_extend {}) {})", bits, operand)
            }
            Node::SignExtend { bits, operand } => {
                write!(f, "((_ sign_extend {}) {})", bits, operand)
            }
            Node::Ite {
                condition,
                then,
                else_,
            } => write!(f, "(ite {} {} {})", condition, then, else_),
        }
    }
}
