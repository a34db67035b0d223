//! Concrete evaluation of formulas.

use rustc_hash::FxHashMap;

use crate::ast::{AstContext, BinaryOp, Constant, ExpressionId, Node, NodeId, UnaryOp, VariableId};
use crate::Error;

/// Supplies the values a formula needs to be evaluated: the concrete values of
/// symbolic variables, and the roots of referenced symbolic expressions.
pub trait Environment {
    fn variable_value(&self, id: VariableId) -> Option<Constant>;
    fn expression_root(&self, id: ExpressionId) -> Option<NodeId>;
}

/// An environment with no variables and no expressions. Only closed formulas
/// evaluate under it.
pub struct NoEnvironment;

impl Environment for NoEnvironment {
    fn variable_value(&self, _: VariableId) -> Option<Constant> {
        None
    }

    fn expression_root(&self, _: ExpressionId) -> Option<NodeId> {
        None
    }
}

/// Apply the operation of `node` to the already evaluated `operands`.
///
/// Leaves are not handled here, as their values come from the environment.
pub(crate) fn apply(node: &Node, operands: &[Constant]) -> Result<Constant, Error> {
    Ok(match node {
        Node::Constant(constant) => constant.clone(),
        Node::Variable { .. } | Node::Reference { .. } => {
            return Err(Error::Arithmetic(format!(
                "{} has no value without an environment",
                node
            )))
        }
        Node::Unary { op, .. } => match op {
            UnaryOp::Not => operands[0].not(),
            UnaryOp::Neg => operands[0].neg(),
        },
        Node::Binary { op, .. } => {
            let (lhs, rhs) = (&operands[0], &operands[1]);
            match op {
                BinaryOp::Add => lhs.add(rhs)?,
                BinaryOp::Sub => lhs.sub(rhs)?,
                BinaryOp::Mul => lhs.mul(rhs)?,
                BinaryOp::Udiv => lhs.udiv(rhs)?,
                BinaryOp::Urem => lhs.urem(rhs)?,
                BinaryOp::Sdiv => lhs.sdiv(rhs)?,
                BinaryOp::Srem => lhs.srem(rhs)?,
                BinaryOp::And => lhs.and(rhs)?,
                BinaryOp::Or => lhs.or(rhs)?,
                BinaryOp::Xor => lhs.xor(rhs)?,
                BinaryOp::Shl => lhs.shl(rhs)?,
                BinaryOp::Lshr => lhs.lshr(rhs)?,
                BinaryOp::Ashr => lhs.ashr(rhs)?,
                BinaryOp::Equal => lhs.equal(rhs)?,
                BinaryOp::Distinct => lhs.distinct(rhs)?,
                BinaryOp::Ult => lhs.ult(rhs)?,
                BinaryOp::Ule => lhs.ule(rhs)?,
                BinaryOp::Ugt => rhs.ult(lhs)?,
                BinaryOp::Uge => rhs.ule(lhs)?,
                BinaryOp::Slt => lhs.slt(rhs)?,
                BinaryOp::Sle => lhs.sle(rhs)?,
                BinaryOp::Sgt => rhs.slt(lhs)?,
                BinaryOp::Sge => rhs.sle(lhs)?,
            }
        }
        Node::Extract { high, low, .. } => operands[0].extract(*high, *low)?,
        Node::Concat(_) => {
            let mut iter = operands.iter();
            let first = iter.next().ok_or(Error::Sort)?.clone();
            iter.fold(first, |acc, operand| acc.concat(operand))
        }
        Node::ZeroExtend { bits, .. } => operands[0].zext(operands[0].bits() + bits)?,
        Node::SignExtend { bits, .. } => operands[0].sext(operands[0].bits() + bits)?,
        Node::Ite { .. } => {
            if operands[0].is_one() {
                operands[1].clone()
            } else {
                operands[2].clone()
            }
        }
    })
}

/// Evaluate the formula rooted at `root`.
///
/// References are followed through `environment`, and variables take their
/// values from it. Evaluation is iterative, so deep reference chains do not
/// exhaust the stack.
pub fn eval(
    ast: &AstContext,
    root: NodeId,
    environment: &dyn Environment,
) -> Result<Constant, Error> {
    let mut values: FxHashMap<NodeId, Constant> = FxHashMap::default();
    let mut stack = vec![(root, false)];

    while let Some((id, expanded)) = stack.pop() {
        if values.contains_key(&id) {
            continue;
        }
        let node = ast.node(id)?;
        let children = match node {
            Node::Reference { id: expression, .. } => vec![environment
                .expression_root(*expression)
                .ok_or(Error::InvalidExpressionId(*expression))?],
            _ => node.children(),
        };

        if !expanded {
            stack.push((id, true));
            for child in children {
                if !values.contains_key(&child) {
                    stack.push((child, false));
                }
            }
            continue;
        }

        let operands = children
            .iter()
            .map(|child| values.get(child).cloned().ok_or(Error::InvalidNodeId(*child)))
            .collect::<Result<Vec<Constant>, Error>>()?;

        let value = match node {
            Node::Variable { id: variable, bits } => {
                let value = environment
                    .variable_value(*variable)
                    .ok_or(Error::InvalidVariableId(*variable))?;
                if value.bits() != *bits {
                    value.zext(*bits).or_else(|_| value.extract(*bits - 1, 0))?
                } else {
                    value
                }
            }
            Node::Reference { .. } => operands[0].clone(),
            _ => apply(node, &operands)?,
        };
        values.insert(id, value);
    }

    values.remove(&root).ok_or(Error::InvalidNodeId(root))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Values(Vec<Constant>);

    impl Environment for Values {
        fn variable_value(&self, id: VariableId) -> Option<Constant> {
            self.0.get(id.0 as usize).cloned()
        }

        fn expression_root(&self, _: ExpressionId) -> Option<NodeId> {
            None
        }
    }

    #[test]
    fn evaluates_closed_formulas() {
        let mut ast = AstContext::new();
        let a = ast.bv(0x10, 32);
        let b = ast.bv(0x20, 32);
        let sum = ast.add(a, b).unwrap();
        let four = ast.bv(4, 32);
        let shifted = ast.shl(sum, four).unwrap();
        let value = eval(&ast, shifted, &NoEnvironment).unwrap();
        assert_eq!(value, Constant::new(0x300, 32));
    }

    #[test]
    fn evaluates_variables() {
        let mut ast = AstContext::new();
        let x = ast.variable(VariableId(0), 8);
        let one = ast.bv(1, 8);
        let sum = ast.add(x, one).unwrap();
        let env = Values(vec![Constant::new(0xff, 8)]);
        assert!(eval(&ast, sum, &env).unwrap().is_zero());
        assert!(eval(&ast, sum, &NoEnvironment).is_err());
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let mut ast = AstContext::new();
        let a = ast.bv(1, 8);
        let zero = ast.bv(0, 8);
        let quotient = ast.udiv(a, zero).unwrap();
        match eval(&ast, quotient, &NoEnvironment) {
            Err(Error::Arithmetic(_)) => {}
            _ => panic!("expected an arithmetic error"),
        }
    }

    #[test]
    fn ite_and_comparisons() {
        let mut ast = AstContext::new();
        let a = ast.bv(3, 16);
        let b = ast.bv(0xfffe, 16);
        let below = ast.ult(a, b).unwrap();
        let less = ast.slt(a, b).unwrap();
        let pick = ast.ite(less, a, b).unwrap();
        assert!(eval(&ast, below, &NoEnvironment).unwrap().is_one());
        assert!(eval(&ast, less, &NoEnvironment).unwrap().is_zero());
        assert_eq!(
            eval(&ast, pick, &NoEnvironment).unwrap(),
            Constant::new(0xfffe, 16)
        );
    }
}
