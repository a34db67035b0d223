use log::{debug, warn};
use num_bigint::BigUint;
use regex::Regex;
use std::io::Write;
use std::process;

use crate::ast::{constant_to_smtlib2, smtlib2_definitions, AstContext, Constant, NodeId, VariableId};
use crate::solver::{Model, Solver};
use crate::Error;

/// Drives a `z3` binary over stdin, one process per query.
#[derive(Clone, Debug)]
pub struct Z3Process {
    binary: String,
}

impl Z3Process {
    /// Use the `z3` found in `PATH`.
    pub fn new() -> Z3Process {
        Z3Process::with_binary("z3")
    }

    pub fn with_binary<S: Into<String>>(binary: S) -> Z3Process {
        Z3Process {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    fn run(&self, input: &str) -> Result<String, Error> {
        let mut child = process::Command::new(&self.binary)
            .arg("-in")
            .stdin(process::Stdio::piped())
            .stdout(process::Stdio::piped())
            .stderr(process::Stdio::piped())
            .spawn()?;

        match child.stdin.take() {
            Some(mut stdin) => {
                stdin.write_all(input.as_bytes())?;
                stdin.flush()?;
            }
            None => {
                child.kill()?;
                return Err(Error::Solver("Failed to get stdin from solver process".to_string()));
            }
        }

        let output = child.wait_with_output()?;
        let stdout = String::from_utf8(output.stdout)?;
        if stdout.contains("(error") {
            warn!("{} rejected its input: {}", self.binary, stdout.trim());
            return Err(Error::Solver(stdout.trim().to_string()));
        }
        Ok(stdout)
    }
}

impl Default for Z3Process {
    fn default() -> Z3Process {
        Z3Process::new()
    }
}

fn preamble() -> Vec<String> {
    vec![
        "(set-option :produce-models true)".to_string(),
        "(set-logic QF_BV)".to_string(),
    ]
}

/// A clause excluding `model`.
fn blocking_clause(model: &Model) -> String {
    let equalities = model
        .iter()
        .map(|(id, value)| format!("(= {} {})", id.name(), constant_to_smtlib2(value)))
        .collect::<Vec<String>>()
        .join(" ");
    format!("(assert (not (and true {})))", equalities)
}

fn parse_literal(radix: &str, digits: &str, bits: usize) -> Result<Constant, Error> {
    let radix = if radix == "x" { 16 } else { 2 };
    BigUint::parse_bytes(digits.as_bytes(), radix)
        .map(|value| Constant::new_big(value, bits))
        .ok_or_else(|| Error::Solver(format!("Could not parse solver value {}", digits)))
}

/// Parse the answer to `(check-sat)` and `(get-value ...)`. Returns `None`
/// when the formula is unsatisfiable.
pub(crate) fn parse_model(
    output: &str,
    variables: &[(VariableId, usize)],
) -> Result<Option<Model>, Error> {
    match output.lines().next().map(|line| line.trim()) {
        Some("sat") => {}
        Some("unsat") => return Ok(None),
        Some(status) => return Err(Error::Solver(format!("Solver answered {}", status))),
        None => return Err(Error::Solver("Solver produced no output".to_string())),
    }

    let pattern = Regex::new(r"\(\s*SymVar_(\d+)\s+#(x|b)([0-9a-fA-F]+)\s*\)")
        .map_err(|e| Error::Solver(e.to_string()))?;

    let mut model = Model::new();
    for captures in pattern.captures_iter(output) {
        let id = captures[1]
            .parse::<u64>()
            .map(VariableId)
            .map_err(|e| Error::Solver(e.to_string()))?;
        let bits = variables
            .iter()
            .find(|(variable, _)| *variable == id)
            .map(|(_, bits)| *bits)
            .ok_or(Error::InvalidVariableId(id))?;
        model.insert(id, parse_literal(&captures[2], &captures[3], bits)?);
    }
    Ok(Some(model))
}

impl Solver for Z3Process {
    fn name(&self) -> &str {
        "z3"
    }

    fn get_models(
        &mut self,
        ast: &AstContext,
        constraint: NodeId,
        limit: usize,
    ) -> Result<Vec<Model>, Error> {
        let script = smtlib2_definitions(ast, constraint)?;
        let names = script
            .variables
            .iter()
            .map(|(id, _)| id.name())
            .collect::<Vec<String>>();

        let mut models: Vec<Model> = Vec::new();
        while models.len() < limit {
            let mut lines = preamble();
            lines.push(script.to_string());
            lines.push(script.assert_true());
            for model in &models {
                lines.push(blocking_clause(model));
            }
            lines.push("(check-sat)".to_string());
            if !names.is_empty() {
                lines.push(format!("(get-value ({}))", names.join(" ")));
            }
            lines.push("(exit)\n".to_string());

            let output = self.run(&lines.join("\n"))?;
            match parse_model(&output, &script.variables)? {
                Some(model) => {
                    debug!("z3 model {}: {:?}", models.len(), model);
                    let exhausted = model.is_empty();
                    models.push(model);
                    // Without variables there is nothing left to block.
                    if exhausted {
                        break;
                    }
                }
                None => break,
            }
        }
        Ok(models)
    }

    /// Replace `node` with a constant when z3 reduces it to a literal.
    fn simplify(&mut self, ast: &mut AstContext, node: NodeId) -> Result<NodeId, Error> {
        let bits = ast.bits(node)?;
        let script = smtlib2_definitions(ast, node)?;
        let mut lines = preamble();
        lines.push(script.to_string());
        lines.push(format!("(simplify {})", script.root));
        lines.push("(exit)\n".to_string());

        let output = self.run(&lines.join("\n"))?;
        let pattern =
            Regex::new(r"^#(x|b)([0-9a-fA-F]+)$").map_err(|e| Error::Solver(e.to_string()))?;
        match pattern.captures(output.trim()) {
            Some(captures) => {
                let constant = parse_literal(&captures[1], &captures[2], bits)?;
                Ok(ast.constant(constant))
            }
            None => Ok(node),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_sat() {
        let output = "sat\n((SymVar_0 #x2a)\n (SymVar_3 #b1))\n";
        let variables = vec![(VariableId(0), 8), (VariableId(3), 1)];
        let model = parse_model(output, &variables).unwrap().unwrap();
        assert_eq!(model[&VariableId(0)], Constant::new(0x2a, 8));
        assert_eq!(model[&VariableId(3)], Constant::new(1, 1));
    }

    #[test]
    fn parse_unsat() {
        assert!(parse_model("unsat\n", &[]).unwrap().is_none());
        assert!(matches!(
            parse_model("unknown\n", &[]),
            Err(Error::Solver(_))
        ));
    }

    #[test]
    fn blocking_clauses() {
        let mut model = Model::new();
        model.insert(VariableId(1), Constant::new(5, 8));
        assert_eq!(
            blocking_clause(&model),
            "(assert (not (and true (= SymVar_1 #x05))))"
        );
    }
}
