//! # Notation Module
//!
//! The two surface syntaxes an equation can be read from and written to:
//! infix (the positional-scanning pipeline) and prefix (S-expressions). Both
//! sit behind one `Notation` trait so the equation facade can hold either
//! without boxing.
//!
//! Unparsing is a right inverse of parsing in both notations: rendering a
//! tree and parsing the result reproduces an equivalent tree. The infix
//! renderer parenthesizes every operator node, so the output never depends on
//! the precedence rules that produced the tree.

use enum_dispatch::enum_dispatch;

use crate::parsing::scanner::{ScannerLimits, is_trig};
use crate::parsing::{assembler, prefix};
use crate::symbolic::ast::{Ast, Label, NodeId, fmt_number};
use crate::symbolic::errors::EquationError;

#[enum_dispatch(NotationKind)]
pub trait Notation {
    fn parse(&self, input: &str) -> Result<Ast, EquationError>;
    fn unparse(&self, ast: &Ast) -> String;
}

/// The LaTeX-like infix syntax.
#[derive(Clone, Copy, Debug, Default)]
pub struct InfixNotation {
    pub limits: ScannerLimits,
}

impl Notation for InfixNotation {
    fn parse(&self, input: &str) -> Result<Ast, EquationError> {
        assembler::parse_infix(input, &self.limits)
    }

    fn unparse(&self, ast: &Ast) -> String {
        render_infix(ast)
    }
}

/// The fully parenthesized S-expression syntax.
#[derive(Clone, Copy, Debug, Default)]
pub struct PrefixNotation {
    pub limits: ScannerLimits,
}

impl Notation for PrefixNotation {
    fn parse(&self, input: &str) -> Result<Ast, EquationError> {
        prefix::parse_prefix(input, &self.limits)
    }

    fn unparse(&self, ast: &Ast) -> String {
        prefix::unparse_prefix(ast)
    }
}

#[enum_dispatch]
#[derive(Clone, Copy, Debug)]
pub enum NotationKind {
    Infix(InfixNotation),
    Prefix(PrefixNotation),
}

impl NotationKind {
    pub fn from_name(name: &str, limits: ScannerLimits) -> Result<NotationKind, EquationError> {
        match name {
            "infix" => Ok(NotationKind::Infix(InfixNotation { limits })),
            "prefix" => Ok(NotationKind::Prefix(PrefixNotation { limits })),
            other => Err(EquationError::MalformedInput(format!(
                "unknown notation '{}', expected 'infix' or 'prefix'",
                other
            ))),
        }
    }
}

/// Infix rendering with every operator node parenthesized.
pub fn render_infix(ast: &Ast) -> String {
    let root = ast.root();
    format!(
        "{} = {}",
        render_node(ast, ast.children(root)[0]),
        render_node(ast, ast.children(root)[1])
    )
}

fn render_node(ast: &Ast, id: NodeId) -> String {
    match ast.label(id) {
        Label::Equals => unreachable!("'=' can only be the root"),
        Label::Op(op) => {
            let kids = ast.children(id);
            format!(
                "({} {} {})",
                render_node(ast, kids[0]),
                op.symbol(),
                render_node(ast, kids[1])
            )
        }
        Label::Function(name) => render_function(ast, id, name),
        Label::Var(name) => name.clone(),
        Label::Number(v) => fmt_number(*v),
    }
}

fn render_function(ast: &Ast, id: NodeId, name: &str) -> String {
    let kids = ast.children(id);
    match name {
        "sqrt" => {
            let radicand = render_node(ast, kids[1]);
            match ast.label(kids[0]) {
                Label::Number(v) if *v == 2.0 => format!(r"\sqrt({})", radicand),
                _ => format!(r"\sqrt[{}]({})", render_node(ast, kids[0]), radicand),
            }
        }
        "log" => {
            let argument = render_node(ast, kids[1]);
            match ast.label(kids[0]) {
                Label::Number(v) if *v == 10.0 => format!(r"\log({})", argument),
                Label::Var(base) if base == "e" => format!(r"\ln({})", argument),
                _ => format!(r"\log_{{{}}}({})", render_node(ast, kids[0]), argument),
            }
        }
        "frac" => format!(
            r"\frac{{{}}}{{{}}}",
            render_node(ast, kids[0]),
            render_node(ast, kids[1])
        ),
        name if is_trig(name) => format!(r"\{}({})", name, render_node(ast, kids[0])),
        // decorated variables: \vec{v} and friends
        _ => format!(r"\{}{{{}}}", name, render_node(ast, kids[0])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn infix() -> InfixNotation {
        InfixNotation::default()
    }

    fn prefix_notation() -> PrefixNotation {
        PrefixNotation::default()
    }

    fn reparses(text: &str) {
        let ast = infix().parse(text).unwrap();
        let rendered = infix().unparse(&ast);
        let again = infix().parse(&rendered).unwrap();
        assert!(
            ast.equivalent(&again),
            "render of '{}' did not reparse: '{}'",
            text,
            rendered
        );
    }

    #[test]
    fn test_unparse_is_a_right_inverse() {
        reparses("x + 1 = y");
        reparses("2x_0 = x_0 + 1");
        reparses(r"\sqrt[3](x) = \frac{a}{b}");
        reparses(r"\log_{2}(x) = \ln(y)");
        reparses(r"\sin^2(x) + \cos^2(x) = 1");
        reparses(r"-\alpha = \vec{v}");
    }

    #[test]
    fn test_defaults_render_in_short_form() {
        let ast = infix().parse(r"\sqrt(x) = \log(y)").unwrap();
        assert_eq!(render_infix(&ast), r"\sqrt(x) = \log(y)");
    }

    #[test]
    fn test_cross_notation_equivalence() {
        let from_infix = infix().parse(r"\frac{1}{a} = b + c").unwrap();
        let from_prefix = prefix_notation()
            .parse("(= (frac 1 a) (+ b c))")
            .unwrap();
        assert!(from_infix.equivalent(&from_prefix));
    }

    #[test]
    fn test_from_name() {
        assert!(NotationKind::from_name("infix", ScannerLimits::default()).is_ok());
        assert!(NotationKind::from_name("prefix", ScannerLimits::default()).is_ok());
        assert!(NotationKind::from_name("postfix", ScannerLimits::default()).is_err());
    }
}
