use log::trace;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::ast::{
    BinaryOp, Constant, Environment, ExpressionId, Node, NodeId, UnaryOp, VariableId,
};
use crate::Error;

/// Counters describing the contents of an `AstContext`.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct AstStatistics {
    /// The number of distinct nodes in the arena.
    pub nodes: usize,
    /// The number of times a node was requested which already existed.
    pub hits: u64,
    /// The number of distinct nodes of each kind.
    pub per_kind: BTreeMap<String, usize>,
}

/// An arena of hash-consed formula nodes.
///
/// Nodes are never removed individually. The whole arena is dropped by
/// `clear`, which invalidates every `NodeId` handed out before.
#[derive(Clone, Debug, Default)]
pub struct AstContext {
    nodes: Vec<Node>,
    bits: Vec<usize>,
    dictionary: FxHashMap<Node, NodeId>,
    hits: u64,
}

impl AstContext {
    pub fn new() -> AstContext {
        AstContext::default()
    }

    /// Get the node with the given id.
    pub fn node(&self, id: NodeId) -> Result<&Node, Error> {
        self.nodes.get(id.index()).ok_or(Error::InvalidNodeId(id))
    }

    /// Get the width in bits of the node with the given id.
    pub fn bits(&self, id: NodeId) -> Result<usize, Error> {
        self.bits
            .get(id.index())
            .copied()
            .ok_or(Error::InvalidNodeId(id))
    }

    /// The constant value of the node with the given id, if it is a constant.
    pub fn constant_of(&self, id: NodeId) -> Option<&Constant> {
        self.nodes.get(id.index()).and_then(|node| node.constant())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Drop every node in this arena.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.bits.clear();
        self.dictionary.clear();
        self.hits = 0;
    }

    /// Compute the width of `node`, ensuring its operands have compatible
    /// sorts.
    fn sort(&self, node: &Node) -> Result<usize, Error> {
        Ok(match node {
            Node::Constant(constant) => constant.bits(),
            Node::Variable { bits, .. } | Node::Reference { bits, .. } => *bits,
            Node::Unary { operand, .. } => self.bits(*operand)?,
            Node::Binary { op, lhs, rhs } => {
                let bits = self.bits(*lhs)?;
                if bits != self.bits(*rhs)? {
                    return Err(Error::Sort);
                }
                if op.is_comparison() {
                    1
                } else {
                    bits
                }
            }
            Node::Extract { high, low, operand } => {
                if high < low || *high >= self.bits(*operand)? {
                    return Err(Error::Sort);
                }
                high - low + 1
            }
            Node::Concat(operands) => {
                if operands.is_empty() {
                    return Err(Error::Sort);
                }
                let mut bits = 0;
                for operand in operands {
                    bits += self.bits(*operand)?;
                }
                bits
            }
            Node::ZeroExtend { bits, operand } | Node::SignExtend { bits, operand } => {
                self.bits(*operand)? + bits
            }
            Node::Ite {
                condition,
                then,
                else_,
            } => {
                let bits = self.bits(*then)?;
                if self.bits(*condition)? != 1 || bits != self.bits(*else_)? {
                    return Err(Error::Sort);
                }
                bits
            }
        })
    }

    /// Intern `node`, returning the id of the existing structurally equal node
    /// if there is one.
    pub fn make(&mut self, node: Node) -> Result<NodeId, Error> {
        if let Some(id) = self.dictionary.get(&node) {
            self.hits += 1;
            return Ok(*id);
        }
        let bits = self.sort(&node)?;
        let id = NodeId(self.nodes.len() as u32);
        self.dictionary.insert(node.clone(), id);
        self.nodes.push(node);
        self.bits.push(bits);
        Ok(id)
    }

    /// Intern a node which is known to be well sorted.
    fn make_leaf(&mut self, node: Node) -> NodeId {
        if let Some(id) = self.dictionary.get(&node) {
            self.hits += 1;
            return *id;
        }
        let bits = match &node {
            Node::Constant(constant) => constant.bits(),
            Node::Variable { bits, .. } | Node::Reference { bits, .. } => *bits,
            _ => 0,
        };
        let id = NodeId(self.nodes.len() as u32);
        self.dictionary.insert(node.clone(), id);
        self.nodes.push(node);
        self.bits.push(bits);
        id
    }

    pub fn bv(&mut self, value: u64, bits: usize) -> NodeId {
        self.constant(Constant::new(value, bits))
    }

    pub fn constant(&mut self, constant: Constant) -> NodeId {
        self.make_leaf(Node::Constant(constant))
    }

    pub fn variable(&mut self, id: VariableId, bits: usize) -> NodeId {
        self.make_leaf(Node::Variable { id, bits })
    }

    pub fn reference(&mut self, id: ExpressionId, bits: usize) -> NodeId {
        self.make_leaf(Node::Reference { id, bits })
    }

    pub fn unary(&mut self, op: UnaryOp, operand: NodeId) -> Result<NodeId, Error> {
        self.make(Node::Unary { op, operand })
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: NodeId, rhs: NodeId) -> Result<NodeId, Error> {
        self.make(Node::Binary { op, lhs, rhs })
    }

    pub fn not(&mut self, operand: NodeId) -> Result<NodeId, Error> {
        self.unary(UnaryOp::Not, operand)
    }

    pub fn neg(&mut self, operand: NodeId) -> Result<NodeId, Error> {
        self.unary(UnaryOp::Neg, operand)
    }

    pub fn add(&mut self, lhs: NodeId, rhs: NodeId) -> Result<NodeId, Error> {
        self.binary(BinaryOp::Add, lhs, rhs)
    }

    pub fn sub(&mut self, lhs: NodeId, rhs: NodeId) -> Result<NodeId, Error> {
        self.binary(BinaryOp::Sub, lhs, rhs)
    }

    pub fn mul(&mut self, lhs: NodeId, rhs: NodeId) -> Result<NodeId, Error> {
        self.binary(BinaryOp::Mul, lhs, rhs)
    }

    pub fn udiv(&mut self, lhs: NodeId, rhs: NodeId) -> Result<NodeId, Error> {
        self.binary(BinaryOp::Udiv, lhs, rhs)
    }

    pub fn urem(&mut self, lhs: NodeId, rhs: NodeId) -> Result<NodeId, Error> {
        self.binary(BinaryOp::Urem, lhs, rhs)
    }

    pub fn sdiv(&mut self, lhs: NodeId, rhs: NodeId) -> Result<NodeId, Error> {
        self.binary(BinaryOp::Sdiv, lhs, rhs)
    }

    pub fn srem(&mut self, lhs: NodeId, rhs: NodeId) -> Result<NodeId, Error> {
        self.binary(BinaryOp::Srem, lhs, rhs)
    }

    pub fn and(&mut self, lhs: NodeId, rhs: NodeId) -> Result<NodeId, Error> {
        self.binary(BinaryOp::And, lhs, rhs)
    }

    pub fn or(&mut self, lhs: NodeId, rhs: NodeId) -> Result<NodeId, Error> {
        self.binary(BinaryOp::Or, lhs, rhs)
    }

    pub fn xor(&mut self, lhs: NodeId, rhs: NodeId) -> Result<NodeId, Error> {
        self.binary(BinaryOp::Xor, lhs, rhs)
    }

    pub fn shl(&mut self, lhs: NodeId, rhs: NodeId) -> Result<NodeId, Error> {
        self.binary(BinaryOp::Shl, lhs, rhs)
    }

    pub fn lshr(&mut self, lhs: NodeId, rhs: NodeId) -> Result<NodeId, Error> {
        self.binary(BinaryOp::Lshr, lhs, rhs)
    }

    pub fn ashr(&mut self, lhs: NodeId, rhs: NodeId) -> Result<NodeId, Error> {
        self.binary(BinaryOp::Ashr, lhs, rhs)
    }

    pub fn equal(&mut self, lhs: NodeId, rhs: NodeId) -> Result<NodeId, Error> {
        self.binary(BinaryOp::Equal, lhs, rhs)
    }

    pub fn distinct(&mut self, lhs: NodeId, rhs: NodeId) -> Result<NodeId, Error> {
        self.binary(BinaryOp::Distinct, lhs, rhs)
    }

    pub fn ult(&mut self, lhs: NodeId, rhs: NodeId) -> Result<NodeId, Error> {
        self.binary(BinaryOp::Ult, lhs, rhs)
    }

    pub fn ule(&mut self, lhs: NodeId, rhs: NodeId) -> Result<NodeId, Error> {
        self.binary(BinaryOp::Ule, lhs, rhs)
    }

    pub fn ugt(&mut self, lhs: NodeId, rhs: NodeId) -> Result<NodeId, Error> {
        self.binary(BinaryOp::Ugt, lhs, rhs)
    }

    pub fn uge(&mut self, lhs: NodeId, rhs: NodeId) -> Result<NodeId, Error> {
        self.binary(BinaryOp::Uge, lhs, rhs)
    }

    pub fn slt(&mut self, lhs: NodeId, rhs: NodeId) -> Result<NodeId, Error> {
        self.binary(BinaryOp::Slt, lhs, rhs)
    }

    pub fn sle(&mut self, lhs: NodeId, rhs: NodeId) -> Result<NodeId, Error> {
        self.binary(BinaryOp::Sle, lhs, rhs)
    }

    pub fn sgt(&mut self, lhs: NodeId, rhs: NodeId) -> Result<NodeId, Error> {
        self.binary(BinaryOp::Sgt, lhs, rhs)
    }

    pub fn sge(&mut self, lhs: NodeId, rhs: NodeId) -> Result<NodeId, Error> {
        self.binary(BinaryOp::Sge, lhs, rhs)
    }

    /// Extract bits `high..=low` of `operand`.
    pub fn extract(&mut self, high: usize, low: usize, operand: NodeId) -> Result<NodeId, Error> {
        self.make(Node::Extract { high, low, operand })
    }

    /// Concatenate `operands`, most significant first. A single operand is
    /// returned unchanged.
    pub fn concat(&mut self, operands: Vec<NodeId>) -> Result<NodeId, Error> {
        if operands.len() == 1 {
            self.bits(operands[0])?;
            return Ok(operands[0]);
        }
        self.make(Node::Concat(operands))
    }

    /// Zero-extend `operand` by `bits` additional bits.
    pub fn zext(&mut self, bits: usize, operand: NodeId) -> Result<NodeId, Error> {
        if bits == 0 {
            self.bits(operand)?;
            return Ok(operand);
        }
        self.make(Node::ZeroExtend { bits, operand })
    }

    /// Sign-extend `operand` by `bits` additional bits.
    pub fn sext(&mut self, bits: usize, operand: NodeId) -> Result<NodeId, Error> {
        if bits == 0 {
            self.bits(operand)?;
            return Ok(operand);
        }
        self.make(Node::SignExtend { bits, operand })
    }

    pub fn ite(&mut self, condition: NodeId, then: NodeId, else_: NodeId) -> Result<NodeId, Error> {
        self.make(Node::Ite {
            condition,
            then,
            else_,
        })
    }

    /// Resize `operand` to `bits`, truncating or zero-extending as required.
    pub fn resize(&mut self, bits: usize, operand: NodeId) -> Result<NodeId, Error> {
        let current = self.bits(operand)?;
        if bits == 0 {
            Err(Error::Sort)
        } else if bits > current {
            self.zext(bits - current, operand)
        } else if bits < current {
            self.extract(bits - 1, 0, operand)
        } else {
            Ok(operand)
        }
    }

    /// Count the nodes of this arena by kind.
    pub fn stats(&self) -> AstStatistics {
        let mut per_kind = BTreeMap::new();
        for node in &self.nodes {
            *per_kind.entry(node.kind().to_string()).or_insert(0) += 1;
        }
        AstStatistics {
            nodes: self.nodes.len(),
            hits: self.hits,
            per_kind,
        }
    }

    /// Every node reachable from `root`, children before parents. References
    /// are not followed.
    pub fn post_order(&self, root: NodeId) -> Result<Vec<NodeId>, Error> {
        let mut order = Vec::new();
        let mut visited: FxHashSet<NodeId> = FxHashSet::default();
        let mut stack = vec![(root, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            if !visited.insert(id) {
                continue;
            }
            stack.push((id, true));
            for child in self.node(id)?.children() {
                if !visited.contains(&child) {
                    stack.push((child, false));
                }
            }
        }
        Ok(order)
    }

    /// The symbolic variables appearing in the formula rooted at `root`.
    /// References are not followed.
    pub fn collect_variables(&self, root: NodeId) -> Result<BTreeSet<VariableId>, Error> {
        let mut variables = BTreeSet::new();
        for id in self.post_order(root)? {
            if let Node::Variable { id, .. } = self.node(id)? {
                variables.insert(*id);
            }
        }
        Ok(variables)
    }

    /// The symbolic expressions directly referenced by the formula rooted at
    /// `root`.
    pub fn collect_references(&self, root: NodeId) -> Result<BTreeSet<ExpressionId>, Error> {
        let mut references = BTreeSet::new();
        for id in self.post_order(root)? {
            if let Node::Reference { id, .. } = self.node(id)? {
                references.insert(*id);
            }
        }
        Ok(references)
    }

    /// Rebuild the formula rooted at `root` bottom-up.
    ///
    /// `f` is called once for every reachable node, after that node's children
    /// have been rewritten, with the id of the rebuilt node. Whatever `f`
    /// returns replaces the node in its parents.
    pub fn rewrite<F>(&mut self, root: NodeId, mut f: F) -> Result<NodeId, Error>
    where
        F: FnMut(&mut AstContext, NodeId) -> Result<NodeId, Error>,
    {
        let mut done: FxHashMap<NodeId, NodeId> = FxHashMap::default();
        for id in self.post_order(root)? {
            let node = self.node(id)?.clone();
            let children = node.children();
            let rewritten = children
                .iter()
                .map(|child| done.get(child).copied().ok_or(Error::InvalidNodeId(*child)))
                .collect::<Result<Vec<NodeId>, Error>>()?;
            let rebuilt = if rewritten == children {
                id
            } else {
                self.make(node.with_children(&rewritten))?
            };
            let replacement = f(self, rebuilt)?;
            done.insert(id, replacement);
        }
        done.get(&root).copied().ok_or(Error::InvalidNodeId(root))
    }

    /// Replace every reference reachable from `root` with the formula of the
    /// referenced expression, transitively. The result contains no
    /// `Node::Reference`.
    pub fn materialize(
        &mut self,
        root: NodeId,
        environment: &dyn Environment,
    ) -> Result<NodeId, Error> {
        // Order the reachable expressions so that every expression comes after
        // the expressions it references.
        let mut order: Vec<ExpressionId> = Vec::new();
        let mut seen: BTreeSet<ExpressionId> = BTreeSet::new();
        let mut stack: Vec<(ExpressionId, bool)> = self
            .collect_references(root)?
            .into_iter()
            .map(|id| (id, false))
            .collect();
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            if !seen.insert(id) {
                continue;
            }
            let expression_root = environment
                .expression_root(id)
                .ok_or(Error::InvalidExpressionId(id))?;
            stack.push((id, true));
            for reference in self.collect_references(expression_root)? {
                if !seen.contains(&reference) {
                    stack.push((reference, false));
                }
            }
        }

        trace!("materializing {} through {} expressions", root, order.len());

        let mut materialized: BTreeMap<ExpressionId, NodeId> = BTreeMap::new();
        for id in order {
            let expression_root = environment
                .expression_root(id)
                .ok_or(Error::InvalidExpressionId(id))?;
            let node = self.inline_references(expression_root, &materialized)?;
            materialized.insert(id, node);
        }
        self.inline_references(root, &materialized)
    }

    fn inline_references(
        &mut self,
        root: NodeId,
        materialized: &BTreeMap<ExpressionId, NodeId>,
    ) -> Result<NodeId, Error> {
        self.rewrite(root, |ast, id| match ast.node(id)? {
            Node::Reference { id: expression, .. } => materialized
                .get(expression)
                .copied()
                .ok_or(Error::DanglingReference(*expression)),
            _ => Ok(id),
        })
    }
}
