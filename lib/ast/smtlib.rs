//! Conversion of formulas to SMT-LIB 2.

use rustc_hash::FxHashMap;
use std::fmt;

use crate::ast::{AstContext, Constant, Node, NodeId, VariableId};
use crate::Error;

/// Convert a constant to its `smtlib2` literal.
pub fn constant_to_smtlib2(constant: &Constant) -> String {
    if constant.bits() == 1 {
        format!("#b{}", constant.value())
    } else if constant.bits() % 4 == 0 {
        format!(
            "#x{:0width$x}",
            constant.value(),
            width = constant.bits() / 4
        )
    } else {
        format!("(_ bv{} {})", constant.value(), constant.bits())
    }
}

/// A formula, flattened into one `define-fun` per node.
///
/// Shared subterms are emitted once, so the size of the script is linear in
/// the number of distinct nodes rather than in the size of the unfolded tree.
#[derive(Clone, Debug, Default)]
pub struct Smtlib2Script {
    /// Declarations of the symbolic variables the formula uses.
    pub declarations: Vec<String>,
    /// One definition per node, children before parents.
    pub definitions: Vec<String>,
    /// The variables the formula uses, with their widths.
    pub variables: Vec<(VariableId, usize)>,
    /// The name bound to the root of the formula.
    pub root: String,
}

impl Smtlib2Script {
    /// An assertion that the 1-bit root of this script is true.
    pub fn assert_true(&self) -> String {
        format!("(assert (= {} #b1))", self.root)
    }
}

impl fmt::Display for Smtlib2Script {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for declaration in &self.declarations {
            writeln!(f, "{}", declaration)?;
        }
        for definition in &self.definitions {
            writeln!(f, "{}", definition)?;
        }
        Ok(())
    }
}

fn node_name(id: NodeId) -> String {
    format!("{}", id)
}

fn node_to_smtlib2(node: &Node) -> Result<String, Error> {
    Ok(match node {
        Node::Constant(constant) => constant_to_smtlib2(constant),
        Node::Variable { id, .. } => id.name(),
        Node::Reference { id, .. } => return Err(Error::DanglingReference(*id)),
        Node::Unary { op, operand } => format!("({} {})", op.smtlib2(), node_name(*operand)),
        Node::Binary { op, lhs, rhs } => {
            if op.is_comparison() {
                format!(
                    "(ite ({} {} {}) #b1 #b0)",
                    op.smtlib2(),
                    node_name(*lhs),
                    node_name(*rhs)
                )
            } else {
                format!(
                    "({} {} {})",
                    op.smtlib2(),
                    node_name(*lhs),
                    node_name(*rhs)
                )
            }
        }
        Node::Extract { high, low, operand } => {
            format!("((_ extract {} {}) {})", high, low, node_name(*operand))
        }
        Node::Concat(operands) => {
            // Nest binary concatenations, for solvers which reject n-ary
            // concat.
            let mut iter = operands.iter().rev();
            let mut result = match iter.next() {
                Some(last) => node_name(*last),
                None => return Err(Error::Sort),
            };
            for operand in iter {
                result = format!("(concat {} {})", node_name(*operand), result);
            }
            result
        }
        Node::ZeroExtend { bits, operand } => {
            format!("((_ zero_extend {}) {})", bits, node_name(*operand))
        }
        Node::SignExtend { bits, operand } => {
            format!("((_ sign_extend {}) {})", bits, node_name(*operand))
        }
        Node::Ite {
            condition,
            then,
            else_,
        } => format!(
            "(ite (= {} #b1) {} {})",
            node_name(*condition),
            node_name(*then),
            node_name(*else_)
        ),
    })
}

/// Render the formula rooted at `root` as a single nested SMT-LIB 2 term.
///
/// References are rendered as `ref!N` and are not unfolded. Shared subterms
/// are repeated, so this is meant for display rather than for solvers.
pub fn node_to_string(ast: &AstContext, root: NodeId) -> Result<String, Error> {
    let mut rendered: FxHashMap<NodeId, String> = FxHashMap::default();
    for id in ast.post_order(root)? {
        let node = ast.node(id)?;
        let child = |child: &NodeId| rendered.get(child).cloned().unwrap_or_default();
        let text = match node {
            Node::Constant(constant) => constant_to_smtlib2(constant),
            Node::Variable { id, .. } => id.name(),
            Node::Reference { id, .. } => id.to_string(),
            Node::Unary { op, operand } => format!("({} {})", op.smtlib2(), child(operand)),
            Node::Binary { op, lhs, rhs } => {
                format!("({} {} {})", op.smtlib2(), child(lhs), child(rhs))
            }
            Node::Extract { high, low, operand } => {
                format!("((_ extract {} {}) {})", high, low, child(operand))
            }
            Node::Concat(operands) => format!(
                "(concat {})",
                operands.iter().map(child).collect::<Vec<String>>().join(" ")
            ),
            Node::ZeroExtend { bits, operand } => {
                format!("((_ zero_extend {}) {})", bits, child(operand))
            }
            Node::SignExtend { bits, operand } => {
                format!("((_ sign_extend {}) {})", bits, child(operand))
            }
            Node::Ite {
                condition,
                then,
                else_,
            } => format!("(ite {} {} {})", child(condition), child(then), child(else_)),
        };
        rendered.insert(id, text);
    }
    rendered.remove(&root).ok_or(Error::InvalidNodeId(root))
}

/// A node of an `AstContext`, displayed as a nested SMT-LIB 2 term.
pub struct NodeView<'a> {
    ast: &'a AstContext,
    node: NodeId,
}

impl AstContext {
    pub fn view(&self, node: NodeId) -> NodeView {
        NodeView { ast: self, node }
    }
}

impl<'a> fmt::Display for NodeView<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match node_to_string(self.ast, self.node) {
            Ok(text) => write!(f, "{}", text),
            Err(_) => write!(f, "<invalid {}>", self.node),
        }
    }
}

/// Flatten the formula rooted at `root` into an `Smtlib2Script`.
///
/// The formula must be materialized first. A remaining `Node::Reference`
/// raises `Error::DanglingReference`.
pub fn smtlib2_definitions(ast: &AstContext, root: NodeId) -> Result<Smtlib2Script, Error> {
    let mut script = Smtlib2Script {
        root: node_name(root),
        ..Default::default()
    };

    for id in ast.post_order(root)? {
        let node = ast.node(id)?;
        let bits = ast.bits(id)?;
        if let Node::Variable { id: variable, bits } = node {
            script.declarations.push(format!(
                "(declare-fun {} () (_ BitVec {}))",
                variable.name(),
                bits
            ));
            script.variables.push((*variable, *bits));
        }
        script.definitions.push(format!(
            "(define-fun {} () (_ BitVec {}) {})",
            node_name(id),
            bits,
            node_to_smtlib2(node)?
        ));
    }

    Ok(script)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ExpressionId;

    #[test]
    fn constants() {
        assert_eq!(constant_to_smtlib2(&Constant::new(1, 1)), "#b1");
        assert_eq!(constant_to_smtlib2(&Constant::new(0x2a, 32)), "#x0000002a");
        assert_eq!(constant_to_smtlib2(&Constant::new(5, 3)), "(_ bv5 3)");
    }

    #[test]
    fn definitions() {
        let mut ast = AstContext::new();
        let x = ast.variable(VariableId(3), 8);
        let one = ast.bv(1, 8);
        let lt = ast.ult(x, one).unwrap();
        let script = smtlib2_definitions(&ast, lt).unwrap();

        assert_eq!(
            script.declarations,
            vec!["(declare-fun SymVar_3 () (_ BitVec 8))".to_string()]
        );
        assert_eq!(script.definitions.len(), 3);
        assert_eq!(
            script.definitions.last().unwrap(),
            &format!("(define-fun {} () (_ BitVec 1) (ite (bvult {} {}) #b1 #b0))", lt, x, one)
        );
        assert_eq!(script.assert_true(), format!("(assert (= {} #b1))", lt));
    }

    #[test]
    fn concat_is_nested() {
        let mut ast = AstContext::new();
        let a = ast.bv(1, 8);
        let b = ast.bv(2, 8);
        let c = ast.bv(3, 8);
        let wide = ast.concat(vec![a, b, c]).unwrap();
        let script = smtlib2_definitions(&ast, wide).unwrap();
        assert!(script
            .definitions
            .last()
            .unwrap()
            .ends_with(&format!("(concat {} (concat {} {})))", a, b, c)));
    }

    #[test]
    fn nested_rendering() {
        let mut ast = AstContext::new();
        let x = ast.variable(VariableId(0), 8);
        let reference = ast.reference(ExpressionId(4), 8);
        let sum = ast.add(x, reference).unwrap();
        assert_eq!(
            node_to_string(&ast, sum).unwrap(),
            "(bvadd SymVar_0 ref!4)"
        );
    }

    #[test]
    fn references_must_be_materialized() {
        let mut ast = AstContext::new();
        let reference = ast.reference(ExpressionId(1), 8);
        assert!(matches!(
            smtlib2_definitions(&ast, reference),
            Err(Error::DanglingReference(ExpressionId(1)))
        ));
    }

    #[test]
    fn views() {
        let mut ast = AstContext::new();
        let x = ast.variable(VariableId(0), 8);
        let one = ast.bv(1, 8);
        let sum = ast.add(x, one).unwrap();
        let r = ast.reference(ExpressionId(4), 8);
        let sum = ast.xor(sum, r).unwrap();
        assert_eq!(
            ast.view(sum).to_string(),
            format!("(bvxor (bvadd SymVar_0 #x01) {})", ExpressionId(4))
        );
    }
}
