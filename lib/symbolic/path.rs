use serde::{Deserialize, Serialize};

use crate::ast::{AstContext, Environment, ExpressionId, NodeId};
use crate::Error;

/// A branch predicate asserted true along the executed path.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PathConstraint {
    expression: ExpressionId,
    address: u64,
    taken: bool,
    target: u64,
}

impl PathConstraint {
    pub fn new(expression: ExpressionId, address: u64, taken: bool, target: u64) -> PathConstraint {
        PathConstraint {
            expression,
            address,
            taken,
            target,
        }
    }

    /// The 1-bit expression asserted true.
    pub fn expression(&self) -> ExpressionId {
        self.expression
    }

    /// The address of the branch instruction.
    pub fn address(&self) -> u64 {
        self.address
    }

    pub fn taken(&self) -> bool {
        self.taken
    }

    /// The address control flow continued at.
    pub fn target(&self) -> u64 {
        self.target
    }
}

/// The append-only log of path constraints, in execution order.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct PathConstraints {
    constraints: Vec<PathConstraint>,
}

impl PathConstraints {
    pub fn new() -> PathConstraints {
        PathConstraints::default()
    }

    pub fn push(&mut self, constraint: PathConstraint) {
        self.constraints.push(constraint);
    }

    pub fn constraints(&self) -> &[PathConstraint] {
        &self.constraints
    }

    pub fn iter(&self) -> std::slice::Iter<PathConstraint> {
        self.constraints.iter()
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn clear(&mut self) {
        self.constraints.clear();
    }

    /// The conjunction of every constraint, in order, as a self-contained
    /// formula. The empty conjunction is the 1-bit constant 1.
    pub fn conjunction(
        &self,
        ast: &mut AstContext,
        environment: &dyn Environment,
    ) -> Result<NodeId, Error> {
        let mut conjunction = ast.bv(1, 1);
        for constraint in &self.constraints {
            let predicate = ast.reference(constraint.expression, 1);
            conjunction = ast.and(conjunction, predicate)?;
        }
        ast.materialize(conjunction, environment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{eval, Constant, VariableId};
    use std::collections::BTreeMap;

    struct Predicates(BTreeMap<ExpressionId, NodeId>);

    impl Environment for Predicates {
        fn variable_value(&self, _: VariableId) -> Option<Constant> {
            Some(Constant::new(1, 8))
        }

        fn expression_root(&self, id: ExpressionId) -> Option<NodeId> {
            self.0.get(&id).copied()
        }
    }

    #[test]
    fn order_and_clear() {
        let mut path = PathConstraints::new();
        path.push(PathConstraint::new(ExpressionId(4), 0x10, true, 0x40));
        path.push(PathConstraint::new(ExpressionId(2), 0x20, false, 0x22));
        let addresses: Vec<u64> = path.iter().map(|c| c.address()).collect();
        assert_eq!(addresses, vec![0x10, 0x20]);
        path.clear();
        assert!(path.is_empty());
    }

    #[test]
    fn conjunction() {
        let mut ast = AstContext::new();
        let empty = PathConstraints::new();
        let environment = Predicates(BTreeMap::new());
        let truth = empty.conjunction(&mut ast, &environment).unwrap();
        assert_eq!(truth, ast.bv(1, 1));

        let x = ast.variable(VariableId(0), 8);
        let one = ast.bv(1, 8);
        let two = ast.bv(2, 8);
        let is_one = ast.equal(x, one).unwrap();
        let below_two = ast.ult(x, two).unwrap();
        let mut predicates = BTreeMap::new();
        predicates.insert(ExpressionId(0), is_one);
        predicates.insert(ExpressionId(1), below_two);
        let environment = Predicates(predicates);

        let mut path = PathConstraints::new();
        path.push(PathConstraint::new(ExpressionId(0), 0, true, 0));
        path.push(PathConstraint::new(ExpressionId(1), 4, true, 0));
        let conjunction = path.conjunction(&mut ast, &environment).unwrap();
        assert!(ast.collect_references(conjunction).unwrap().is_empty());
        assert!(eval(&ast, conjunction, &environment).unwrap().is_one());
    }
}
