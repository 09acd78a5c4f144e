//! # Function Registry Module
//!
//! The pluggable table of function descriptors the equation facade consumes.
//! Each entry bundles a forward numeric evaluator and one inverse rewrite rule
//! per argument position. The table is built once, explicitly, from an
//! enumerated descriptor list — there is no reflection or dynamic discovery.
//!
//! An inverse rule answers: "this node's argument `i` is the unknown; given
//! the subtree on the opposite side of `=` and the sibling arguments, what
//! subtree expresses the unknown?". Rules return a `Term`, a small build
//! recipe mixing existing subtrees (`Keep`) with freshly created nodes, so the
//! rewriter can tell moved structure apart from added structure when it keeps
//! the equation statistics up to date.

use std::collections::HashMap;
use std::f64::consts::FRAC_PI_2;

use crate::symbolic::ast::{InfixOp, NodeId};

/// Build recipe for a replacement subtree.
#[derive(Clone, Debug)]
pub enum Term {
    /// Reuse an existing subtree (moved, not copied).
    Keep(NodeId),
    Number(f64),
    Func(&'static str, Vec<Term>),
    Op(InfixOp, Vec<Term>),
}

impl Term {
    /// Arena ids referenced by `Keep` anywhere in the recipe.
    pub fn kept_ids(&self) -> Vec<NodeId> {
        let mut ids = Vec::new();
        self.collect_kept(&mut ids);
        ids
    }

    fn collect_kept(&self, ids: &mut Vec<NodeId>) {
        match self {
            Term::Keep(id) => ids.push(*id),
            Term::Number(_) => {}
            Term::Func(_, args) | Term::Op(_, args) => {
                for a in args {
                    a.collect_kept(ids);
                }
            }
        }
    }
}

/// What the rule sees: the subtree on the opposite side of `=` and the
/// sibling arguments of the node being inverted, in argument order.
pub struct InverseArgs<'a> {
    pub other_side: NodeId,
    pub siblings: &'a [NodeId],
}

pub type InverseRule = fn(&InverseArgs) -> Term;

/// Forward numeric evaluator; arity matches the node's child count.
#[derive(Clone, Copy)]
pub enum Forward {
    Unary(fn(f64) -> f64),
    Binary(fn(f64, f64) -> f64),
}

#[derive(Clone)]
pub struct FunctionEntry {
    pub name: &'static str,
    pub arity: usize,
    pub forward: Forward,
    /// One rule per argument position.
    pub inverses: Vec<InverseRule>,
}

#[derive(Clone)]
pub struct FunctionRegistry {
    entries: HashMap<String, FunctionEntry>,
}

impl FunctionRegistry {
    /// The full standard table: the five infix operators, the trig family and
    /// its inverses, sqrt, log and frac.
    pub fn standard() -> FunctionRegistry {
        let descriptors = vec![
            // operators; argument order is [left, right]
            FunctionEntry {
                name: "+",
                arity: 2,
                forward: Forward::Binary(|a, b| a + b),
                inverses: vec![inv_add, inv_add],
            },
            FunctionEntry {
                name: "-",
                arity: 2,
                forward: Forward::Binary(|a, b| a - b),
                inverses: vec![inv_sub_left, inv_sub_right],
            },
            FunctionEntry {
                name: "*",
                arity: 2,
                forward: Forward::Binary(|a, b| a * b),
                inverses: vec![inv_mul, inv_mul],
            },
            FunctionEntry {
                name: "/",
                arity: 2,
                forward: Forward::Binary(|a, b| a / b),
                inverses: vec![inv_div_dividend, inv_div_divisor],
            },
            FunctionEntry {
                name: "^",
                arity: 2,
                forward: Forward::Binary(|a, b| a.powf(b)),
                inverses: vec![inv_pow_base, inv_pow_exponent],
            },
            // trig family, forward/inverse pairs kept mutually consistent
            FunctionEntry {
                name: "sin",
                arity: 1,
                forward: Forward::Unary(f64::sin),
                inverses: vec![inv_sin],
            },
            FunctionEntry {
                name: "cos",
                arity: 1,
                forward: Forward::Unary(f64::cos),
                inverses: vec![inv_cos],
            },
            FunctionEntry {
                name: "tan",
                arity: 1,
                forward: Forward::Unary(f64::tan),
                inverses: vec![inv_tan],
            },
            FunctionEntry {
                name: "cot",
                arity: 1,
                forward: Forward::Unary(fwd_cot),
                inverses: vec![inv_cot],
            },
            FunctionEntry {
                name: "arcsin",
                arity: 1,
                forward: Forward::Unary(f64::asin),
                inverses: vec![inv_arcsin],
            },
            FunctionEntry {
                name: "arccos",
                arity: 1,
                forward: Forward::Unary(f64::acos),
                inverses: vec![inv_arccos],
            },
            FunctionEntry {
                name: "arctan",
                arity: 1,
                forward: Forward::Unary(f64::atan),
                inverses: vec![inv_arctan],
            },
            FunctionEntry {
                name: "arccot",
                arity: 1,
                forward: Forward::Unary(fwd_arccot),
                inverses: vec![inv_arccot],
            },
            // two-argument functions; argument order documented per entry
            FunctionEntry {
                // [root, radicand]
                name: "sqrt",
                arity: 2,
                forward: Forward::Binary(|root, x| x.powf(1.0 / root)),
                inverses: vec![inv_sqrt_root, inv_sqrt_radicand],
            },
            FunctionEntry {
                // [base, argument]
                name: "log",
                arity: 2,
                forward: Forward::Binary(|base, x| x.log(base)),
                inverses: vec![inv_log_base, inv_log_argument],
            },
            FunctionEntry {
                // [numerator, denominator]
                name: "frac",
                arity: 2,
                forward: Forward::Binary(|a, b| a / b),
                inverses: vec![inv_frac_numerator, inv_frac_denominator],
            },
        ];

        let mut entries = HashMap::new();
        for d in descriptors {
            entries.insert(d.name.to_string(), d);
        }
        FunctionRegistry { entries }
    }

    pub fn get(&self, name: &str) -> Option<&FunctionEntry> {
        self.entries.get(name)
    }

    pub fn forward(&self, name: &str) -> Option<Forward> {
        self.entries.get(name).map(|e| e.forward)
    }

    pub fn inverse(&self, name: &str, arg_index: usize) -> Option<InverseRule> {
        self.entries
            .get(name)
            .and_then(|e| e.inverses.get(arg_index))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// trig forwards without a direct f64 method

fn fwd_cot(x: f64) -> f64 {
    1.0 / x.tan()
}

fn fwd_arccot(x: f64) -> f64 {
    FRAC_PI_2 - x.atan()
}

// trig inverses: f(x) = O  =>  x = f_inverse(O)

fn inv_sin(a: &InverseArgs) -> Term {
    Term::Func("arcsin", vec![Term::Keep(a.other_side)])
}

fn inv_cos(a: &InverseArgs) -> Term {
    Term::Func("arccos", vec![Term::Keep(a.other_side)])
}

fn inv_tan(a: &InverseArgs) -> Term {
    Term::Func("arctan", vec![Term::Keep(a.other_side)])
}

fn inv_cot(a: &InverseArgs) -> Term {
    Term::Func("arccot", vec![Term::Keep(a.other_side)])
}

fn inv_arcsin(a: &InverseArgs) -> Term {
    Term::Func("sin", vec![Term::Keep(a.other_side)])
}

fn inv_arccos(a: &InverseArgs) -> Term {
    Term::Func("cos", vec![Term::Keep(a.other_side)])
}

fn inv_arctan(a: &InverseArgs) -> Term {
    Term::Func("tan", vec![Term::Keep(a.other_side)])
}

fn inv_arccot(a: &InverseArgs) -> Term {
    Term::Func("cot", vec![Term::Keep(a.other_side)])
}

// operator inverses

/// x + a = O  =>  x = O - a  (either argument; folds all siblings)
fn inv_add(a: &InverseArgs) -> Term {
    Term::Op(InfixOp::Sub, vec![Term::Keep(a.other_side), fold(InfixOp::Add, a.siblings)])
}

/// x - a = O  =>  x = O + a
fn inv_sub_left(a: &InverseArgs) -> Term {
    Term::Op(
        InfixOp::Add,
        vec![Term::Keep(a.other_side), Term::Keep(a.siblings[0])],
    )
}

/// a - x = O  =>  x = a - O
fn inv_sub_right(a: &InverseArgs) -> Term {
    Term::Op(
        InfixOp::Sub,
        vec![Term::Keep(a.siblings[0]), Term::Keep(a.other_side)],
    )
}

/// x * a = O  =>  x = O / a  (either argument; folds all siblings)
fn inv_mul(a: &InverseArgs) -> Term {
    Term::Op(InfixOp::Div, vec![Term::Keep(a.other_side), fold(InfixOp::Mul, a.siblings)])
}

/// x / a = O  =>  x = O * a
fn inv_div_dividend(a: &InverseArgs) -> Term {
    Term::Op(
        InfixOp::Mul,
        vec![Term::Keep(a.other_side), Term::Keep(a.siblings[0])],
    )
}

/// a / x = O  =>  x = a / O
fn inv_div_divisor(a: &InverseArgs) -> Term {
    Term::Op(
        InfixOp::Div,
        vec![Term::Keep(a.siblings[0]), Term::Keep(a.other_side)],
    )
}

/// x ^ a = O  =>  x = O ^ (1 / a)
fn inv_pow_base(a: &InverseArgs) -> Term {
    Term::Op(
        InfixOp::Pow,
        vec![
            Term::Keep(a.other_side),
            Term::Op(InfixOp::Div, vec![Term::Number(1.0), Term::Keep(a.siblings[0])]),
        ],
    )
}

/// a ^ x = O  =>  x = log_a(O)
fn inv_pow_exponent(a: &InverseArgs) -> Term {
    Term::Func("log", vec![Term::Keep(a.siblings[0]), Term::Keep(a.other_side)])
}

/// sqrt[x](v) = O, root unknown: v^(1/x) = O  =>  x = log_O(v)
fn inv_sqrt_root(a: &InverseArgs) -> Term {
    Term::Func("log", vec![Term::Keep(a.other_side), Term::Keep(a.siblings[0])])
}

/// sqrt[r](x) = O, radicand unknown  =>  x = O ^ r
fn inv_sqrt_radicand(a: &InverseArgs) -> Term {
    Term::Op(
        InfixOp::Pow,
        vec![Term::Keep(a.other_side), Term::Keep(a.siblings[0])],
    )
}

/// log_x(v) = O, base unknown  =>  x = v ^ (1 / O)
fn inv_log_base(a: &InverseArgs) -> Term {
    Term::Op(
        InfixOp::Pow,
        vec![
            Term::Keep(a.siblings[0]),
            Term::Op(InfixOp::Div, vec![Term::Number(1.0), Term::Keep(a.other_side)]),
        ],
    )
}

/// log_b(x) = O, argument unknown  =>  x = b ^ O
fn inv_log_argument(a: &InverseArgs) -> Term {
    Term::Op(
        InfixOp::Pow,
        vec![Term::Keep(a.siblings[0]), Term::Keep(a.other_side)],
    )
}

/// frac{x}{d} = O  =>  x = O * d
fn inv_frac_numerator(a: &InverseArgs) -> Term {
    Term::Op(
        InfixOp::Mul,
        vec![Term::Keep(a.other_side), Term::Keep(a.siblings[0])],
    )
}

/// frac{n}{x} = O  =>  x = frac{n}{O}
fn inv_frac_denominator(a: &InverseArgs) -> Term {
    Term::Func("frac", vec![Term::Keep(a.siblings[0]), Term::Keep(a.other_side)])
}

/// Folds sibling subtrees under one operator; a single sibling stays bare.
fn fold(op: InfixOp, siblings: &[NodeId]) -> Term {
    if siblings.len() == 1 {
        Term::Keep(siblings[0])
    } else {
        Term::Op(op, siblings.iter().map(|&s| Term::Keep(s)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_standard_table_is_complete() {
        let reg = FunctionRegistry::standard();
        for name in ["+", "-", "*", "/", "^", "sin", "cos", "tan", "cot", "sqrt", "log", "frac"] {
            let entry = reg.get(name).unwrap();
            assert_eq!(entry.inverses.len(), entry.arity, "entry {}", name);
        }
        assert!(reg.get("nosuch").is_none());
    }

    #[test]
    fn test_forward_inverse_numeric_consistency() {
        let reg = FunctionRegistry::standard();
        let sin = match reg.forward("sin").unwrap() {
            Forward::Unary(f) => f,
            _ => panic!("sin must be unary"),
        };
        let arcsin = match reg.forward("arcsin").unwrap() {
            Forward::Unary(f) => f,
            _ => panic!("arcsin must be unary"),
        };
        assert_relative_eq!(arcsin(sin(0.4)), 0.4, epsilon = 1e-12);

        let sqrt = match reg.forward("sqrt").unwrap() {
            Forward::Binary(f) => f,
            _ => panic!("sqrt must be binary"),
        };
        assert_relative_eq!(sqrt(2.0, 9.0), 3.0, epsilon = 1e-12);
        assert_relative_eq!(sqrt(3.0, 27.0), 3.0, epsilon = 1e-12);

        let log = match reg.forward("log").unwrap() {
            Forward::Binary(f) => f,
            _ => panic!("log must be binary"),
        };
        assert_relative_eq!(log(10.0, 1000.0), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_inverse_rule_shapes() {
        let reg = FunctionRegistry::standard();
        let rule = reg.inverse("+", 0).unwrap();
        let siblings = [7usize];
        let term = rule(&InverseArgs { other_side: 3, siblings: &siblings });
        match term {
            Term::Op(InfixOp::Sub, args) => {
                assert_eq!(args.len(), 2);
                assert!(matches!(args[0], Term::Keep(3)));
                assert!(matches!(args[1], Term::Keep(7)));
            }
            other => panic!("unexpected term {:?}", other),
        }
        assert!(reg.inverse("sin", 1).is_none());
    }

    #[test]
    fn test_kept_ids_walks_nested_terms() {
        let t = Term::Op(
            InfixOp::Pow,
            vec![
                Term::Keep(1),
                Term::Op(InfixOp::Div, vec![Term::Number(1.0), Term::Keep(4)]),
            ],
        );
        assert_eq!(t.kept_ids(), vec![1, 4]);
    }
}
