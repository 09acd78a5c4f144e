//! # Equation Facade Module
//!
//! The public entry point of the crate. An `Equation` owns a finished tree,
//! the statistics derived from it (function counts, variable counts, primitive
//! count, total node count) and the function registry it solves with.
//!
//! ## Main operations
//!
//! - `Equation::new(source, notation)` — parse in the named notation and build
//!   the statistics. An equation is immutable after construction.
//! - `make_subject(variable)` — isolate a uniquely occurring variable by
//!   peeling operators off its side of `=` one at a time, each peel applying
//!   the registry's inverse rule for the argument position the variable sits
//!   in. Works on a deep copy; this equation's tree and statistics are
//!   untouched whether the solve succeeds or fails.
//! - `eval_side(side, bindings)` — numeric evaluation of one side through the
//!   registry's forward evaluators.
//!
//! Statistics are maintained incrementally during a solve (labels removed with
//! detached subtrees, labels added by inverse recipes) and verified against a
//! full recount before the result is returned; a mismatch means a defect in a
//! rewrite rule, reported as an internal inconsistency rather than silently
//! repaired.

use std::collections::HashMap;
use std::f64::consts::{E, PI};
use std::fmt;

use log::{debug, info};
use simplelog::{ColorChoice, CombinedLogger, Config, LevelFilter, TermLogger, TerminalMode};

use crate::parsing::scanner::ScannerLimits;
use crate::symbolic::ast::{Ast, Label, NodeId};
use crate::symbolic::errors::EquationError;
use crate::symbolic::notation::{Notation, NotationKind};
use crate::symbolic::registry::{FunctionRegistry, Forward, InverseArgs, Term};

/// Derived structural statistics of an equation tree.
///
/// Invariant: `functions` totals + `variables` totals + `primitives` + 1 (the
/// `=` root) equals `total`. Operators count in the function map under their
/// symbol.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EquationStats {
    pub functions: HashMap<String, usize>,
    pub variables: HashMap<String, usize>,
    pub primitives: usize,
    pub total: usize,
}

impl EquationStats {
    fn of(ast: &Ast) -> EquationStats {
        let (functions, variables, primitives, total) = ast.count_labels();
        EquationStats { functions, variables, primitives, total }
    }

    fn checks_out(&self) -> bool {
        let f: usize = self.functions.values().sum();
        let v: usize = self.variables.values().sum();
        f + v + self.primitives + 1 == self.total
    }

    /// Drops zero entries so an incrementally maintained map compares equal to
    /// a fresh recount.
    fn pruned(mut self) -> EquationStats {
        self.functions.retain(|_, n| *n > 0);
        self.variables.retain(|_, n| *n > 0);
        self
    }
}

/// Which side of `=` to evaluate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

pub struct Equation {
    ast: Ast,
    stats: EquationStats,
    registry: FunctionRegistry,
    notation: NotationKind,
    pub loglevel: Option<String>,
}

impl Equation {
    /// Parses `source` in the named notation ("infix" or "prefix") with the
    /// standard function registry.
    pub fn new(source: &str, notation: &str) -> Result<Equation, EquationError> {
        Equation::with_registry(source, notation, FunctionRegistry::standard())
    }

    /// Same as `new` with a caller-supplied registry.
    pub fn with_registry(
        source: &str,
        notation: &str,
        registry: FunctionRegistry,
    ) -> Result<Equation, EquationError> {
        let notation = NotationKind::from_name(notation, ScannerLimits::default())?;
        let ast = notation.parse(source)?;
        let stats = EquationStats::of(&ast);
        let equation = Equation {
            ast,
            stats,
            registry,
            notation,
            loglevel: None,
        };
        equation.check_consistency()?;
        debug!("equation built: {} node(s)", equation.stats.total);
        Ok(equation)
    }

    /// Console logging setup in the style of the numeric solvers this crate
    /// grew out of: "off"/"none" disables, otherwise the level names map to
    /// `simplelog` filters.
    pub fn with_loglevel(mut self, loglevel: Option<String>) -> Equation {
        if let Some(level) = &loglevel {
            let filter = match level.as_str() {
                "off" | "none" => None,
                "debug" => Some(LevelFilter::Debug),
                "info" => Some(LevelFilter::Info),
                "warn" => Some(LevelFilter::Warn),
                "error" => Some(LevelFilter::Error),
                other => panic!("loglevel must be debug/info/warn/error/off, got {}", other),
            };
            if let Some(filter) = filter {
                // a second init is a no-op; the first logger wins
                let _ = CombinedLogger::init(vec![TermLogger::new(
                    filter,
                    Config::default(),
                    TerminalMode::Mixed,
                    ColorChoice::Auto,
                )]);
            }
        }
        self.loglevel = loglevel;
        self
    }

    pub fn ast(&self) -> &Ast {
        &self.ast
    }

    pub fn stats(&self) -> &EquationStats {
        &self.stats
    }

    /// Variable-name → occurrence-count map.
    pub fn variables(&self) -> &HashMap<String, usize> {
        &self.stats.variables
    }

    /// Function/operator-name → occurrence-count map.
    pub fn functions(&self) -> &HashMap<String, usize> {
        &self.stats.functions
    }

    /// Renders the tree in the notation the equation was built from.
    pub fn unparse(&self) -> String {
        self.notation.unparse(&self.ast)
    }

    /// Verifies the statistics invariant against a full recount.
    pub fn check_consistency(&self) -> Result<(), EquationError> {
        let recount = EquationStats::of(&self.ast);
        if recount != self.stats {
            return Err(EquationError::InternalInconsistency(
                "stored statistics disagree with a recount".to_string(),
            ));
        }
        if !self.stats.checks_out() {
            return Err(EquationError::InternalInconsistency(format!(
                "label counts do not sum to the node total {}",
                self.stats.total
            )));
        }
        Ok(())
    }

    /// Numerically evaluates one side of the equation under the given
    /// variable bindings. `e` and `pi` are built-in constants unless bound.
    pub fn eval_side(
        &self,
        side: Side,
        bindings: &HashMap<String, f64>,
    ) -> Result<f64, EquationError> {
        let root = self.ast.root();
        let id = match side {
            Side::Left => self.ast.children(root)[0],
            Side::Right => self.ast.children(root)[1],
        };
        self.eval_node(id, bindings)
    }

    fn eval_node(&self, id: NodeId, bindings: &HashMap<String, f64>) -> Result<f64, EquationError> {
        match self.ast.label(id) {
            Label::Number(v) => Ok(*v),
            Label::Var(name) => {
                if let Some(v) = bindings.get(name) {
                    return Ok(*v);
                }
                match name.as_str() {
                    "e" => Ok(E),
                    "pi" | r"\pi" => Ok(PI),
                    _ => Err(EquationError::VariableNotAvailable(name.clone())),
                }
            }
            Label::Equals => Err(EquationError::InternalInconsistency(
                "'=' inside a side subtree".to_string(),
            )),
            label => {
                let key = label.key();
                let forward = self.registry.forward(&key).ok_or_else(|| {
                    EquationError::CannotHandle(format!("'{}' has no forward evaluator", key))
                })?;
                let kids = self.ast.children(id);
                match (forward, kids) {
                    (Forward::Unary(f), [a]) => Ok(f(self.eval_node(*a, bindings)?)),
                    (Forward::Binary(f), [a, b]) => Ok(f(
                        self.eval_node(*a, bindings)?,
                        self.eval_node(*b, bindings)?,
                    )),
                    _ => Err(EquationError::InternalInconsistency(format!(
                        "'{}' has {} child(ren), which does not match its evaluator",
                        key,
                        kids.len()
                    ))),
                }
            }
        }
    }

    /// Rearranges the equation so `variable` is a direct child of `=`.
    ///
    /// Preconditions: the variable occurs exactly once. Zero occurrences fail
    /// with `VariableNotAvailable`, two or more with `CannotHandle`, both
    /// before any work happens. The solve runs on a deep copy; `self` is
    /// byte-identical afterwards in every outcome.
    pub fn make_subject(&self, variable: &str) -> Result<Equation, EquationError> {
        match self.ast.find_var(variable).len() {
            0 => return Err(EquationError::VariableNotAvailable(variable.to_string())),
            1 => {}
            n => {
                return Err(EquationError::CannotHandle(format!(
                    "'{}' occurs {} times; only a unique occurrence can be isolated",
                    variable, n
                )));
            }
        }

        let mut work = self.ast.compacted();
        let target = match work.find_var(variable).as_slice() {
            [only] => *only,
            found => {
                return Err(EquationError::InternalInconsistency(format!(
                    "presence check saw one '{}', the working copy has {}",
                    variable,
                    found.len()
                )));
            }
        };
        let mut expected = self.stats.clone();

        let root = work.root();
        loop {
            let on_path = ancestors(&work, target);
            let kids = work.children(root).to_vec();
            let side_idx = kids
                .iter()
                .position(|c| on_path.contains(c))
                .ok_or_else(|| {
                    EquationError::InternalInconsistency(format!(
                        "'{}' is not under either side of '='",
                        variable
                    ))
                })?;
            let side = kids[side_idx];
            let other = kids[1 - side_idx];
            if side == target {
                break;
            }

            let key = match work.label(side) {
                Label::Op(op) => op.symbol().to_string(),
                Label::Function(name) => name.clone(),
                label => {
                    return Err(EquationError::InternalInconsistency(format!(
                        "'{}' on the path to '{}' has no arguments",
                        label, variable
                    )));
                }
            };
            let children = work.children(side).to_vec();
            let arg_index = children
                .iter()
                .position(|c| on_path.contains(c))
                .ok_or_else(|| {
                    EquationError::InternalInconsistency(format!(
                        "no child of '{}' leads to '{}'",
                        key, variable
                    ))
                })?;
            let siblings: Vec<NodeId> = children
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != arg_index)
                .map(|(_, &c)| c)
                .collect();

            let rule = self.registry.inverse(&key, arg_index).ok_or_else(|| {
                EquationError::CannotHandle(format!(
                    "no inverse rule for argument {} of '{}'",
                    arg_index, key
                ))
            })?;
            let recipe = rule(&InverseArgs { other_side: other, siblings: &siblings });
            debug!("peeling '{}' (argument {}) off the '=' node", key, arg_index);

            // bookkeeping: the peeled node goes away, unkept subtrees with it
            take_one(&mut expected.functions, &key)?;
            expected.total -= 1;
            let kept = recipe.kept_ids();
            for &s in siblings.iter().chain(std::iter::once(&other)) {
                if !kept.contains(&s) {
                    remove_subtree(&work, s, &mut expected)?;
                }
            }

            let new_other = build_term(&mut work, &recipe, &mut expected);
            work.rebind_root(side_idx, children[arg_index], new_other);
        }

        let solved = Equation {
            ast: work.compacted(),
            stats: expected.pruned(),
            registry: self.registry.clone(),
            notation: self.notation,
            loglevel: self.loglevel.clone(),
        };
        solved.check_consistency()?;
        info!(
            "'{}' is now the subject; {} node(s) in the result",
            variable, solved.stats.total
        );
        Ok(solved)
    }
}

impl fmt::Display for Equation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.ast)
    }
}

// manual impl: the registry holds fn pointers with no useful Debug output
impl fmt::Debug for Equation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Equation")
            .field("ast", &self.ast)
            .field("stats", &self.stats)
            .field("notation", &self.notation)
            .field("loglevel", &self.loglevel)
            .finish_non_exhaustive()
    }
}

/// The target and every node above it, root included.
fn ancestors(ast: &Ast, target: NodeId) -> Vec<NodeId> {
    let mut path = vec![target];
    let mut cur = target;
    while let Some(p) = ast.node(cur).parent {
        path.push(p);
        cur = p;
    }
    path
}

fn take_one(map: &mut HashMap<String, usize>, key: &str) -> Result<(), EquationError> {
    match map.get_mut(key) {
        Some(n) if *n > 0 => {
            *n -= 1;
            Ok(())
        }
        _ => Err(EquationError::InternalInconsistency(format!(
            "removing '{}' which the statistics do not record",
            key
        ))),
    }
}

/// Subtracts every label of a detached subtree from the running statistics.
fn remove_subtree(
    ast: &Ast,
    id: NodeId,
    stats: &mut EquationStats,
) -> Result<(), EquationError> {
    let mut labels = Vec::new();
    ast.walk(id, &mut |n| labels.push(ast.label(n).clone()));
    for label in labels {
        stats.total = stats.total.checked_sub(1).ok_or_else(|| {
            EquationError::InternalInconsistency("node total underflow".to_string())
        })?;
        match label {
            Label::Number(_) => {
                stats.primitives = stats.primitives.checked_sub(1).ok_or_else(|| {
                    EquationError::InternalInconsistency("primitive count underflow".to_string())
                })?;
            }
            Label::Var(name) => take_one(&mut stats.variables, &name)?,
            Label::Op(op) => take_one(&mut stats.functions, &op.symbol().to_string())?,
            Label::Function(name) => take_one(&mut stats.functions, &name)?,
            Label::Equals => {
                return Err(EquationError::InternalInconsistency(
                    "detached subtree contains '='".to_string(),
                ));
            }
        }
    }
    Ok(())
}

/// Materializes an inverse recipe in the working tree, counting what it adds.
fn build_term(ast: &mut Ast, term: &Term, stats: &mut EquationStats) -> NodeId {
    match term {
        Term::Keep(id) => *id,
        Term::Number(v) => {
            stats.primitives += 1;
            stats.total += 1;
            ast.add_node(Label::Number(*v))
        }
        Term::Func(name, args) => {
            *stats.functions.entry(name.to_string()).or_insert(0) += 1;
            stats.total += 1;
            let node = ast.add_node(Label::Function(name.to_string()));
            for arg in args {
                let child = build_term(ast, arg, stats);
                ast.adopt(node, child);
            }
            node
        }
        Term::Op(op, args) => {
            *stats.functions.entry(op.symbol().to_string()).or_insert(0) += 1;
            stats.total += 1;
            let node = ast.add_node(Label::Op(*op));
            for arg in args {
                let child = build_term(ast, arg, stats);
                ast.adopt(node, child);
            }
            node
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_stats_invariant_holds_after_parse() {
        let eq = Equation::new(r"\frac{a}{b} + 1 = \sqrt(c)", "infix").unwrap();
        assert!(eq.stats().checks_out());
        assert_eq!(eq.functions().get("frac"), Some(&1));
        assert_eq!(eq.functions().get("sqrt"), Some(&1));
        // sqrt's default root 2 and the literal 1 are both primitives
        assert_eq!(eq.stats().primitives, 2);
    }

    #[test]
    fn test_make_subject_simple_addition() {
        let eq = Equation::new("x + 1 = y", "infix").unwrap();
        let solved = eq.make_subject("x").unwrap();
        assert_eq!(solved.to_string(), "x = (y - 1)");
        // the original is untouched
        assert_eq!(eq.to_string(), "(x + 1) = y");
    }

    #[test]
    fn test_make_subject_missing_variable() {
        let eq = Equation::new("x + 1 = y", "infix").unwrap();
        let err = eq.make_subject("z").unwrap_err();
        assert!(matches!(err, EquationError::VariableNotAvailable(ref v) if v == "z"));
    }

    #[test]
    fn test_make_subject_repeated_variable() {
        let eq = Equation::new("x + x = y", "infix").unwrap();
        let err = eq.make_subject("x").unwrap_err();
        assert!(matches!(err, EquationError::CannotHandle(_)));
    }

    #[test]
    fn test_eval_side_with_constants() {
        let eq = Equation::new(r"\ln(e) = \sin(x)", "infix").unwrap();
        let lhs = eq.eval_side(Side::Left, &HashMap::new()).unwrap();
        assert_relative_eq!(lhs, 1.0, epsilon = 1e-12);
        let bindings = HashMap::from([("x".to_string(), 0.0)]);
        let rhs = eq.eval_side(Side::Right, &bindings).unwrap();
        assert_relative_eq!(rhs, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_debug_formatting() {
        // Result<Equation, _> must be unwrappable in tests
        let eq: Result<Equation, EquationError> = Equation::new("x = y", "infix");
        let dump = format!("{:?}", eq.unwrap());
        assert!(dump.starts_with("Equation"));
        assert!(dump.contains("stats"));
    }

    #[test]
    fn test_eval_side_unbound_variable() {
        let eq = Equation::new("x = y", "infix").unwrap();
        let err = eq.eval_side(Side::Left, &HashMap::new()).unwrap_err();
        assert!(matches!(err, EquationError::VariableNotAvailable(ref v) if v == "x"));
    }
}
