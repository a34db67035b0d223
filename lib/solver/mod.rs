//! The contract between a `Context` and SMT solvers.
//!
//! Kestrel never decides satisfiability itself. It hands solvers
//! self-contained formulas, with every reference to a symbolic expression
//! materialized, and reads back assignments to symbolic variables.

use std::collections::BTreeMap;

use crate::ast::{AstContext, Constant, NodeId, VariableId};
use crate::Error;

mod z3;

pub use self::z3::Z3Process;

/// An assignment of values to symbolic variables.
pub type Model = BTreeMap<VariableId, Constant>;

/// An SMT solver.
pub trait Solver: Send {
    fn name(&self) -> &str;

    /// Find up to `limit` distinct models satisfying the 1-bit formula
    /// `constraint`. An unsatisfiable formula has no models.
    ///
    /// `constraint` must not hold references to symbolic expressions.
    fn get_models(
        &mut self,
        ast: &AstContext,
        constraint: NodeId,
        limit: usize,
    ) -> Result<Vec<Model>, Error>;

    /// Simplify `node`. Solvers which cannot simplify return `node`
    /// unchanged.
    fn simplify(&mut self, _ast: &mut AstContext, node: NodeId) -> Result<NodeId, Error> {
        Ok(node)
    }
}
