use serde::{Deserialize, Serialize};
use std::default;

use crate::Error;

/// How much symbolic state a `Context` keeps.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Mode {
    /// No symbolic expression is retained. Formulas are still built to decide
    /// branches, and taint is still tracked.
    ConcreteOnly,
    /// Only expressions carrying taint, and the expressions they reference,
    /// are retained. Untainted writes concretize their destination.
    Concolic,
    /// Every write is bound to an expression, and every committed value is
    /// evaluated and written back to the concrete state.
    FullEmulation,
}

impl default::Default for Mode {
    fn default() -> Mode {
        Mode::FullEmulation
    }
}

/// Various options that can be passed to a `Context`. Options change how much
/// state is kept, and how formulas are simplified.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct Options {
    mode: Mode,
    taint: bool,
    max_simplification_rounds: usize,
    solver_simplification: bool,
    default_simplifications: bool,
}

impl default::Default for Options {
    fn default() -> Options {
        Options {
            mode: Mode::default(),
            taint: true,
            max_simplification_rounds: 16,
            solver_simplification: false,
            default_simplifications: true,
        }
    }
}

impl Options {
    /// Create a new set of Options with the default settings.
    pub fn new() -> Options {
        Options::default()
    }

    /// Parse options from a JSON document. Missing fields take their default
    /// value.
    pub fn from_json(json: &str) -> Result<Options, Error> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    /// Whether taint is tracked. When it is not, every taint query answers
    /// false.
    pub fn taint(&self) -> bool {
        self.taint
    }

    pub fn set_taint(&mut self, taint: bool) {
        self.taint = taint;
    }

    /// The maximum number of rounds the simplification pipeline runs before
    /// giving up on reaching a fixpoint.
    pub fn max_simplification_rounds(&self) -> usize {
        self.max_simplification_rounds
    }

    pub fn set_max_simplification_rounds(&mut self, rounds: usize) {
        self.max_simplification_rounds = rounds;
    }

    /// Whether new expressions are also simplified by the attached solver.
    pub fn solver_simplification(&self) -> bool {
        self.solver_simplification
    }

    pub fn set_solver_simplification(&mut self, solver_simplification: bool) {
        self.solver_simplification = solver_simplification;
    }

    /// Whether a new `Context` installs constant folding and identity
    /// elimination in its simplification pipeline.
    pub fn default_simplifications(&self) -> bool {
        self.default_simplifications
    }

    pub fn set_default_simplifications(&mut self, default_simplifications: bool) {
        self.default_simplifications = default_simplifications;
    }
}

/// Create your options with the builder pattern.
///
/// For more details on the options, see `Options`
pub struct OptionsBuilder {
    options: Options,
}

impl OptionsBuilder {
    pub fn new() -> OptionsBuilder {
        OptionsBuilder {
            options: Options::default(),
        }
    }

    /// Set the symbolic mode. By default this is `Mode::FullEmulation`.
    pub fn mode(mut self, mode: Mode) -> OptionsBuilder {
        self.options.mode = mode;
        self
    }

    /// Enable or disable taint tracking. By default this is true.
    pub fn taint(mut self, taint: bool) -> OptionsBuilder {
        self.options.taint = taint;
        self
    }

    pub fn max_simplification_rounds(mut self, rounds: usize) -> OptionsBuilder {
        self.options.max_simplification_rounds = rounds;
        self
    }

    /// Enable or disable solver simplification. By default this is false.
    pub fn solver_simplification(mut self, solver_simplification: bool) -> OptionsBuilder {
        self.options.solver_simplification = solver_simplification;
        self
    }

    pub fn default_simplifications(mut self, default_simplifications: bool) -> OptionsBuilder {
        self.options.default_simplifications = default_simplifications;
        self
    }

    pub fn build(self) -> Options {
        self.options
    }
}

impl default::Default for OptionsBuilder {
    fn default() -> OptionsBuilder {
        OptionsBuilder::new()
    }
}
