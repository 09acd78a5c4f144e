//! # Prefix Notation Module
//!
//! Parses and renders the S-expression form of an equation, e.g.
//! `(= (/ 1 a) (+ (/ 1 b) (/ 1 c)))`. The grammar is tiny and fully
//! parenthesized, so no positional scanning is needed here: a nom parser
//! produces a generic S-expression which is then lowered onto the arena with
//! head and arity validation.

use itertools::Itertools;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::take_while1,
    character::complete::{char as paren, multispace0},
    combinator::map,
    multi::many1,
    sequence::{delimited, preceded},
};

use crate::parsing::scanner::{ARG_VARIABLE_NAMES, ScannerLimits, is_trig};
use crate::symbolic::ast::{Arena, Ast, InfixOp, Label, NodeId, fmt_number};
use crate::symbolic::errors::EquationError;

/// A raw S-expression before lowering.
#[derive(Clone, Debug, PartialEq)]
enum Sexp {
    Atom(String),
    List(Vec<Sexp>),
}

fn parse_atom(input: &str) -> IResult<&str, Sexp> {
    let token = take_while1(|c: char| !c.is_whitespace() && c != '(' && c != ')');
    let mut parser = map(token, |s: &str| Sexp::Atom(s.to_string()));
    parser.parse(input)
}

fn parse_list(input: &str) -> IResult<&str, Sexp> {
    let items = many1(preceded(multispace0, parse_sexp));
    let mut parser = map(
        delimited(paren('('), items, preceded(multispace0, paren(')'))),
        Sexp::List,
    );
    parser.parse(input)
}

fn parse_sexp(input: &str) -> IResult<&str, Sexp> {
    alt((parse_list, parse_atom)).parse(input)
}

/// Parses a prefix equation string into a finished tree.
pub fn parse_prefix(input: &str, limits: &ScannerLimits) -> Result<Ast, EquationError> {
    if input.len() > limits.max_len {
        return Err(EquationError::SizeLimitExceeded {
            len: input.len(),
            max: limits.max_len,
        });
    }
    if !input.is_ascii() {
        return Err(EquationError::MalformedInput(
            "only ASCII equation strings are supported".to_string(),
        ));
    }

    let trimmed = input.trim();
    let (rest, sexp) = parse_sexp(trimmed).map_err(|e| {
        EquationError::MalformedInput(format!("prefix form does not parse: {}", e))
    })?;
    if !rest.trim().is_empty() {
        return Err(EquationError::MalformedInput(format!(
            "trailing input after the prefix form: '{}'",
            rest.trim()
        )));
    }

    let Sexp::List(items) = sexp else {
        return Err(EquationError::MalformedInput(
            "a prefix equation must be a list headed by '='".to_string(),
        ));
    };
    match items.as_slice() {
        [Sexp::Atom(head), lhs, rhs] if head == "=" => {
            let mut arena = Arena::new();
            let l = lower(lhs, &mut arena)?;
            let r = lower(rhs, &mut arena)?;
            Ok(Ast::seal(arena, l, r).compacted())
        }
        _ => Err(EquationError::MalformedInput(
            "the top-level prefix list must be (= lhs rhs)".to_string(),
        )),
    }
}

/// Mandatory child count per function head.
fn expected_arity(name: &str) -> Option<usize> {
    if is_trig(name) || ARG_VARIABLE_NAMES.contains(&name) {
        Some(1)
    } else if matches!(name, "sqrt" | "log" | "frac") {
        Some(2)
    } else {
        None
    }
}

fn lower(sexp: &Sexp, arena: &mut Arena) -> Result<NodeId, EquationError> {
    match sexp {
        Sexp::Atom(token) => lower_atom(token, arena),
        Sexp::List(items) => {
            let [Sexp::Atom(head), operands @ ..] = items.as_slice() else {
                return Err(EquationError::MalformedInput(
                    "a prefix list must be headed by an operator or function name".to_string(),
                ));
            };
            if operands.is_empty() {
                return Err(EquationError::MalformedInput(format!(
                    "'{}' has no operands",
                    head
                )));
            }
            lower_list(head, operands, arena)
        }
    }
}

fn lower_atom(token: &str, arena: &mut Arena) -> Result<NodeId, EquationError> {
    if let Ok(v) = token.parse::<f64>() {
        return Ok(arena.add(Label::Number(v)));
    }
    let name_chars = token
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '\\');
    if name_chars && !token.is_empty() {
        return Ok(arena.add(Label::Var(token.to_string())));
    }
    Err(EquationError::MalformedInput(format!(
        "'{}' is neither a number nor a variable name",
        token
    )))
}

fn lower_list(
    head: &str,
    operands: &[Sexp],
    arena: &mut Arena,
) -> Result<NodeId, EquationError> {
    if head == "=" {
        return Err(EquationError::MalformedInput(
            "'=' may only appear at the top level".to_string(),
        ));
    }

    let mut head_chars = head.chars();
    if let (Some(c), None) = (head_chars.next(), head_chars.next()) {
        if let Some(op) = InfixOp::from_char(c) {
            if operands.len() != 2 {
                return Err(EquationError::MalformedInput(format!(
                    "'{}' takes exactly 2 operands, found {}",
                    c,
                    operands.len()
                )));
            }
            let node = arena.add(Label::Op(op));
            for operand in operands {
                let child = lower(operand, arena)?;
                arena.adopt(node, child);
            }
            return Ok(node);
        }
    }

    // ln is sugar for log base e in every notation
    if head == "ln" {
        if operands.len() != 1 {
            return Err(EquationError::MalformedInput(format!(
                "'ln' takes exactly 1 operand, found {}",
                operands.len()
            )));
        }
        let node = arena.add(Label::Function("log".to_string()));
        let base = arena.add(Label::Var("e".to_string()));
        arena.adopt(node, base);
        let arg = lower(&operands[0], arena)?;
        arena.adopt(node, arg);
        return Ok(node);
    }

    let Some(arity) = expected_arity(head) else {
        return Err(EquationError::MalformedInput(format!(
            "unknown function '{}' in prefix form",
            head
        )));
    };
    if operands.len() != arity {
        return Err(EquationError::MalformedInput(format!(
            "'{}' takes exactly {} operand(s), found {}",
            head,
            arity,
            operands.len()
        )));
    }
    let node = arena.add(Label::Function(head.to_string()));
    for operand in operands {
        let child = lower(operand, arena)?;
        arena.adopt(node, child);
    }
    Ok(node)
}

/// Renders a tree back into its S-expression form. Right inverse of
/// `parse_prefix` up to whitespace.
pub fn unparse_prefix(ast: &Ast) -> String {
    render(ast, ast.root())
}

fn render(ast: &Ast, id: NodeId) -> String {
    let children = || ast.children(id).iter().map(|&c| render(ast, c)).join(" ");
    match ast.label(id) {
        Label::Equals => format!("(= {})", children()),
        Label::Op(op) => format!("({} {})", op.symbol(), children()),
        Label::Function(name) => format!("({} {})", name, children()),
        Label::Var(name) => name.clone(),
        Label::Number(v) => fmt_number(*v),
    }
}
