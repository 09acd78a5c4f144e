//! # Consecutivity Merger Module
//!
//! Groups all lexical items — backslash items, infix occurrences and leftover
//! atoms — into maximal runs that are adjacent in the original string modulo
//! whitespace. Bracket characters bridge adjacency (bracket pairs are scanner
//! items, not gaps); the `=` sign does not, which is what splits the equation
//! into exactly two groups in well-formed input.
//!
//! This stage also synthesizes the implicit-zero token in front of a unary
//! minus (one whose nearest left neighbor is nothing, `=`, an open bracket,
//! or another operator), so `-x` reaches the tree builder as `0 - x` and
//! `x * -2` as `x * 0 - 2`.
//!
//! Adjacency is transitive over non-overlapping ranges, so the final partition
//! is independent of merge order; the merger verifies confluence by checking
//! that no two final groups are themselves adjacent.

use itertools::Itertools;
use log::debug;

use crate::parsing::leftover::Atom;
use crate::parsing::scanner::{BackslashItem, InfixItem, ScanOutput, Span};
use crate::symbolic::ast::InfixOp;
use crate::symbolic::errors::EquationError;

#[derive(Clone, Debug)]
pub enum LexItem {
    Backslash(BackslashItem),
    Infix(InfixItem),
    Atom(Atom),
}

impl LexItem {
    /// Ganz span for backslash items, single character for operators.
    pub fn span(&self) -> Span {
        match self {
            LexItem::Backslash(item) => item.span,
            LexItem::Infix(item) => Span::new(item.pos, item.pos + 1),
            LexItem::Atom(atom) => atom.span,
        }
    }
}

/// One consecutivity group: items ordered by source position plus their hull.
#[derive(Clone, Debug)]
pub struct Group {
    pub items: Vec<LexItem>,
    pub span: Span,
}

/// Characters that bridge adjacency without being items of their own.
fn bridges(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '{' | '}' | '[' | ']')
}

fn leads_expression(c: Option<char>) -> bool {
    match c {
        None | Some('=') | Some('(') | Some('{') | Some('[') => true,
        Some(c) => InfixOp::from_char(c).is_some(),
    }
}

/// Merges items into maximal adjacent groups.
pub fn merge(input: &str, scan: &ScanOutput, atoms: Vec<Atom>) -> Result<Vec<Group>, EquationError> {
    let mut items: Vec<LexItem> = Vec::new();
    for item in &scan.backslash_items {
        items.push(LexItem::Backslash(item.clone()));
    }
    for infix in &scan.infix_items {
        // operator characters inside a script or subscript belong to the
        // backslash item, not to the expression
        if scan.absorbed_by_name(infix.pos) {
            continue;
        }
        if infix.right_char.is_none() {
            return Err(EquationError::MalformedInput(format!(
                "operator '{}' at {} has nothing to its right",
                infix.op.symbol(),
                infix.pos
            )));
        }
        // unary minus is represented as 0 - x; a minus whose nearest left
        // neighbor is another operator is unary too (x * -2)
        if infix.op.symbol() == '-' && leads_expression(infix.left_char) {
            items.push(LexItem::Atom(Atom::number("0", Span::new(infix.pos, infix.pos))));
        }
        items.push(LexItem::Infix(*infix));
    }
    for atom in atoms {
        items.push(LexItem::Atom(atom));
    }

    // zero-width implicit zeros sort in front of the minus they belong to
    let items = items
        .into_iter()
        .sorted_by_key(|item| (item.span().start, item.span().len()))
        .collect::<Vec<_>>();

    let mut groups: Vec<Group> = Vec::new();
    for item in items {
        let span = item.span();
        let adjacent = groups.last().is_some_and(|g: &Group| {
            span.start <= g.span.end
                || input[g.span.end..span.start].chars().all(bridges)
        });
        if adjacent {
            let group = groups.last_mut().expect("checked non-empty");
            group.items.push(item);
            group.span.end = group.span.end.max(span.end);
        } else {
            groups.push(Group { items: vec![item], span });
        }
    }

    // confluence: the partition must be maximal
    for (a, b) in groups.iter().tuple_windows() {
        if input[a.span.end..b.span.start].chars().all(bridges) {
            return Err(EquationError::InternalInconsistency(format!(
                "adjacent groups left unmerged between {} and {}",
                a.span.end, b.span.start
            )));
        }
    }

    // bracket characters at a group's edge are claimed but are not items, so
    // the item hull can start after an opening bracket; widen each hull over
    // the bridging characters so the tree builder sees every bracket pair the
    // group owns (input is ASCII, checked by the scanner, so byte indexing is
    // char-safe)
    let bytes = input.as_bytes();
    for group in &mut groups {
        while group.span.start > 0 && bridges(bytes[group.span.start - 1] as char) {
            group.span.start -= 1;
        }
        while group.span.end < bytes.len() && bridges(bytes[group.span.end] as char) {
            group.span.end += 1;
        }
    }

    debug!("merger: {} group(s)", groups.len());
    Ok(groups)
}
