//! Formula simplification.
//!
//! A `Simplification` rewrites a formula into an equivalent one. Passes are
//! chained in a `Pipeline`, which is run to a fixpoint, bounded by a maximum
//! number of rounds.

use log::{debug, trace};

use crate::ast::eval::apply;
use crate::ast::{AstContext, BinaryOp, Constant, Node, NodeId};
use crate::Error;

/// A semantics-preserving rewrite of formulas.
pub trait Simplification: Send {
    /// A name, used to remove this simplification from a pipeline.
    fn name(&self) -> &str;

    /// Simplify the formula rooted at `node`, returning the root of the
    /// simplified formula.
    fn simplify(&mut self, ast: &mut AstContext, node: NodeId) -> Result<NodeId, Error>;
}

/// Folds every operation whose operands are all constants.
///
/// Operations which fail to evaluate, such as a division by zero, are left in
/// place.
#[derive(Clone, Debug, Default)]
pub struct ConstantFolding;

impl Simplification for ConstantFolding {
    fn name(&self) -> &str {
        "constant-folding"
    }

    fn simplify(&mut self, ast: &mut AstContext, node: NodeId) -> Result<NodeId, Error> {
        ast.rewrite(node, |ast, id| {
            let node = ast.node(id)?;
            let children = node.children();
            if children.is_empty() {
                return Ok(id);
            }
            let mut operands = Vec::with_capacity(children.len());
            for child in &children {
                match ast.constant_of(*child) {
                    Some(constant) => operands.push(constant.clone()),
                    None => return Ok(id),
                }
            }
            match apply(node, &operands) {
                Ok(constant) => Ok(ast.constant(constant)),
                Err(_) => Ok(id),
            }
        })
    }
}

/// Removes operations which do not change their operand, such as `x + 0`, and
/// collapses operations with a known result, such as `x ^ x`.
#[derive(Clone, Debug, Default)]
pub struct IdentityElimination;

impl IdentityElimination {
    fn eliminate(ast: &mut AstContext, id: NodeId) -> Result<NodeId, Error> {
        let bits = ast.bits(id)?;
        let node = ast.node(id)?.clone();
        let is = |ast: &AstContext, id: NodeId, f: fn(&Constant) -> bool| {
            ast.constant_of(id).map(f).unwrap_or(false)
        };

        Ok(match node {
            Node::Binary { op, lhs, rhs } => match op {
                BinaryOp::Add | BinaryOp::Or | BinaryOp::Xor
                    if is(ast, lhs, Constant::is_zero) =>
                {
                    rhs
                }
                BinaryOp::Add
                | BinaryOp::Sub
                | BinaryOp::Or
                | BinaryOp::Xor
                | BinaryOp::Shl
                | BinaryOp::Lshr
                | BinaryOp::Ashr
                    if is(ast, rhs, Constant::is_zero) =>
                {
                    lhs
                }
                BinaryOp::Sub | BinaryOp::Xor if lhs == rhs => ast.bv(0, bits),
                BinaryOp::And | BinaryOp::Mul
                    if is(ast, lhs, Constant::is_zero) || is(ast, rhs, Constant::is_zero) =>
                {
                    ast.bv(0, bits)
                }
                BinaryOp::And if is(ast, lhs, Constant::is_ones) => rhs,
                BinaryOp::And if is(ast, rhs, Constant::is_ones) => lhs,
                BinaryOp::And | BinaryOp::Or if lhs == rhs => lhs,
                BinaryOp::Mul if is(ast, lhs, Constant::is_one) => rhs,
                BinaryOp::Mul if is(ast, rhs, Constant::is_one) => lhs,
                BinaryOp::Equal | BinaryOp::Ule | BinaryOp::Uge | BinaryOp::Sle | BinaryOp::Sge
                    if lhs == rhs =>
                {
                    ast.bv(1, 1)
                }
                BinaryOp::Distinct | BinaryOp::Ult | BinaryOp::Ugt | BinaryOp::Slt | BinaryOp::Sgt
                    if lhs == rhs =>
                {
                    ast.bv(0, 1)
                }
                _ => id,
            },
            Node::Unary { op, operand } => match ast.node(operand)? {
                Node::Unary {
                    op: inner,
                    operand: inner_operand,
                } if *inner == op => *inner_operand,
                _ => id,
            },
            Node::Extract { high, low, operand } => {
                if low == 0 && high + 1 == ast.bits(operand)? {
                    operand
                } else {
                    id
                }
            }
            Node::Ite {
                condition,
                then,
                else_,
            } => {
                if then == else_ {
                    then
                } else {
                    match ast.constant_of(condition) {
                        Some(constant) if constant.is_one() => then,
                        Some(_) => else_,
                        None => id,
                    }
                }
            }
            _ => id,
        })
    }
}

impl Simplification for IdentityElimination {
    fn name(&self) -> &str {
        "identity-elimination"
    }

    fn simplify(&mut self, ast: &mut AstContext, node: NodeId) -> Result<NodeId, Error> {
        ast.rewrite(node, IdentityElimination::eliminate)
    }
}

type NodeRewrite = Box<dyn FnMut(&mut AstContext, NodeId) -> Result<NodeId, Error> + Send>;

/// A simplification applying a closure to every node of a formula, children
/// first.
pub struct FnSimplification {
    name: String,
    rewrite: NodeRewrite,
}

impl FnSimplification {
    pub fn new<S, F>(name: S, rewrite: F) -> FnSimplification
    where
        S: Into<String>,
        F: FnMut(&mut AstContext, NodeId) -> Result<NodeId, Error> + Send + 'static,
    {
        FnSimplification {
            name: name.into(),
            rewrite: Box::new(rewrite),
        }
    }
}

impl std::fmt::Debug for FnSimplification {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "FnSimplification({})", self.name)
    }
}

impl Simplification for FnSimplification {
    fn name(&self) -> &str {
        &self.name
    }

    fn simplify(&mut self, ast: &mut AstContext, node: NodeId) -> Result<NodeId, Error> {
        let rewrite = &mut self.rewrite;
        ast.rewrite(node, |ast, id| rewrite(ast, id))
    }
}

/// An ordered chain of simplifications, run to a fixpoint.
pub struct Pipeline {
    passes: Vec<Box<dyn Simplification>>,
    max_rounds: usize,
}

impl Pipeline {
    /// An empty pipeline, which runs at most `max_rounds` rounds.
    pub fn new(max_rounds: usize) -> Pipeline {
        Pipeline {
            passes: Vec::new(),
            max_rounds,
        }
    }

    /// A pipeline with the built-in passes.
    pub fn with_defaults(max_rounds: usize) -> Pipeline {
        let mut pipeline = Pipeline::new(max_rounds);
        pipeline.push(Box::new(ConstantFolding));
        pipeline.push(Box::new(IdentityElimination));
        pipeline
    }

    pub fn push(&mut self, pass: Box<dyn Simplification>) {
        self.passes.push(pass);
    }

    /// Remove every pass with the given name. Returns true if a pass was
    /// removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let len = self.passes.len();
        self.passes.retain(|pass| pass.name() != name);
        self.passes.len() != len
    }

    pub fn names(&self) -> Vec<&str> {
        self.passes.iter().map(|pass| pass.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    pub fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    pub fn set_max_rounds(&mut self, max_rounds: usize) {
        self.max_rounds = max_rounds;
    }

    /// Run every pass, in order, until a round leaves the formula unchanged or
    /// the round limit is reached.
    pub fn run(&mut self, ast: &mut AstContext, node: NodeId) -> Result<NodeId, Error> {
        let mut current = node;
        for round in 0..self.max_rounds {
            let before = current;
            for pass in self.passes.iter_mut() {
                current = pass.simplify(ast, current)?;
            }
            if current == before {
                trace!("simplification reached a fixpoint after {} rounds", round);
                return Ok(current);
            }
        }
        debug!(
            "simplification of {} stopped after {} rounds",
            node, self.max_rounds
        );
        Ok(current)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("passes", &self.names())
            .field("max_rounds", &self.max_rounds)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{eval, Environment, ExpressionId, VariableId};

    struct X(u64);

    impl Environment for X {
        fn variable_value(&self, _: VariableId) -> Option<Constant> {
            Some(Constant::new(self.0, 32))
        }

        fn expression_root(&self, _: ExpressionId) -> Option<NodeId> {
            None
        }
    }

    fn sample(ast: &mut AstContext) -> NodeId {
        // ((x + (2 * 3)) ^ 0) & 0xffffffff
        let x = ast.variable(VariableId(0), 32);
        let two = ast.bv(2, 32);
        let three = ast.bv(3, 32);
        let six = ast.mul(two, three).unwrap();
        let sum = ast.add(x, six).unwrap();
        let zero = ast.bv(0, 32);
        let xored = ast.xor(sum, zero).unwrap();
        let ones = ast.bv(0xffff_ffff, 32);
        ast.and(xored, ones).unwrap()
    }

    #[test]
    fn default_pipeline() {
        let mut ast = AstContext::new();
        let root = sample(&mut ast);
        let mut pipeline = Pipeline::with_defaults(16);
        let simplified = pipeline.run(&mut ast, root).unwrap();

        let x = ast.variable(VariableId(0), 32);
        let six = ast.bv(6, 32);
        let expected = ast.add(x, six).unwrap();
        assert_eq!(simplified, expected);
    }

    #[test]
    fn simplification_is_idempotent_and_preserves_value() {
        let mut ast = AstContext::new();
        let root = sample(&mut ast);
        let mut pipeline = Pipeline::with_defaults(16);
        let once = pipeline.run(&mut ast, root).unwrap();
        let twice = pipeline.run(&mut ast, once).unwrap();
        assert_eq!(once, twice);
        for value in [0, 1, 0xffff_fffa, 0x1234_5678] {
            assert_eq!(
                eval(&ast, root, &X(value)).unwrap(),
                eval(&ast, once, &X(value)).unwrap()
            );
        }
    }

    #[test]
    fn division_by_zero_is_not_folded() {
        let mut ast = AstContext::new();
        let one = ast.bv(1, 8);
        let zero = ast.bv(0, 8);
        let quotient = ast.udiv(one, zero).unwrap();
        let simplified = ConstantFolding.simplify(&mut ast, quotient).unwrap();
        assert_eq!(simplified, quotient);
    }

    #[test]
    fn identities() {
        let mut ast = AstContext::new();
        let x = ast.variable(VariableId(0), 32);
        let cancelled = ast.xor(x, x).unwrap();
        let equal = ast.equal(x, x).unwrap();
        let not = ast.not(x).unwrap();
        let not_not = ast.not(not).unwrap();
        let whole = ast.extract(31, 0, x).unwrap();

        let mut pass = IdentityElimination;
        let zero = ast.bv(0, 32);
        let truth = ast.bv(1, 1);
        assert_eq!(pass.simplify(&mut ast, cancelled).unwrap(), zero);
        assert_eq!(pass.simplify(&mut ast, equal).unwrap(), truth);
        assert_eq!(pass.simplify(&mut ast, not_not).unwrap(), x);
        assert_eq!(pass.simplify(&mut ast, whole).unwrap(), x);

        let condition = ast.variable(VariableId(1), 1);
        let same = ast.ite(condition, x, x).unwrap();
        assert_eq!(pass.simplify(&mut ast, same).unwrap(), x);
    }

    #[test]
    fn pipeline_passes_by_name() {
        let mut pipeline = Pipeline::with_defaults(4);
        pipeline.push(Box::new(FnSimplification::new("noop", |_, id| Ok(id))));
        assert_eq!(
            pipeline.names(),
            vec!["constant-folding", "identity-elimination", "noop"]
        );
        assert!(pipeline.remove("noop"));
        assert!(!pipeline.remove("noop"));
        assert_eq!(pipeline.names().len(), 2);
    }

    #[test]
    fn closure_simplifications_see_every_node() {
        let mut ast = AstContext::new();
        let x = ast.variable(VariableId(0), 32);
        let y = ast.variable(VariableId(1), 32);
        let sum = ast.add(x, y).unwrap();
        let root = ast.not(sum).unwrap();

        // Rewrite y into x everywhere.
        let mut pass = FnSimplification::new("y-to-x", move |ast, id| {
            Ok(match ast.node(id)? {
                Node::Variable { id: VariableId(1), bits } => {
                    let bits = *bits;
                    ast.variable(VariableId(0), bits)
                }
                _ => id,
            })
        });
        let rewritten = pass.simplify(&mut ast, root).unwrap();
        let doubled = ast.add(x, x).unwrap();
        let expected = ast.not(doubled).unwrap();
        assert_eq!(rewritten, expected);
    }
}
