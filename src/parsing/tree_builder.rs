//! # Tree Builder Module
//!
//! Turns each consecutivity group into a subtree. The work happens in four
//! phases per group:
//!
//! 1. every lexical item becomes an arena node (atoms as leaves, backslash
//!    functions as nodes whose argument slots are filled later, operators as
//!    empty binary nodes);
//! 2. bracket contents — function argument spans and plain bracket pairs —
//!    are resolved innermost-first: the items inside each span are built into
//!    one subtree, which is either grafted into the owning function's argument
//!    slot (the widest subtree fitting the span, by construction) or promoted
//!    to the enclosing span as a single bracketed operand;
//! 3. each remaining item sequence gets synthetic `*` nodes between adjacent
//!    non-operator items, then operators bind their nearest unconsumed
//!    neighbors in priority order `[^, /, *, -, +]`, which yields standard
//!    left-associative precedence without a separate shunting-yard pass;
//! 4. default arguments land after precedence resolution: sqrt gains the
//!    literal root 2, log the literal base 10, ln becomes log base e, and a
//!    trig function carrying an exponent is wrapped so `\sin^2(x)` reads
//!    `(\sin(x))^2` — an elided trig exponent is simply absent, never a
//!    literal 1.

use log::debug;

use crate::parsing::merger::{Group, LexItem};
use crate::parsing::scanner::{BackslashItem, BackslashKind, ScanOutput, Span};
use crate::symbolic::ast::{Arena, InfixOp, Label, NodeId};
use crate::symbolic::errors::EquationError;

/// A finished group subtree and the source range it came from.
#[derive(Clone, Copy, Debug)]
pub struct BuiltGroup {
    pub root: NodeId,
    pub span: Span,
}

/// One sequence element: an arena node, its ganz span, and whether it is an
/// unfilled operator.
#[derive(Clone, Copy, Debug)]
struct Entry {
    node: NodeId,
    span: Span,
    op: Option<InfixOp>,
}

/// A bracket-delimited build region: a function argument span or a plain
/// bracket pair.
#[derive(Clone, Copy, Debug)]
struct Region {
    content: Span,
    /// Span the promoted operand covers (brackets included) for plain pairs.
    full: Span,
    /// (function index, argument index) when the region is an argument slot.
    owner: Option<(usize, usize)>,
}

/// A backslash function node awaiting its grafted arguments.
struct PendingFunction {
    node: NodeId,
    item: BackslashItem,
    grafts: Vec<Option<NodeId>>,
}

/// Builds every group of the equation into the shared arena.
pub fn build(
    input: &str,
    scan: &ScanOutput,
    groups: &[Group],
    arena: &mut Arena,
) -> Result<Vec<BuiltGroup>, EquationError> {
    let mut built = Vec::with_capacity(groups.len());
    for group in groups {
        built.push(build_group(input, scan, group, arena)?);
    }
    Ok(built)
}

fn build_group(
    input: &str,
    scan: &ScanOutput,
    group: &Group,
    arena: &mut Arena,
) -> Result<BuiltGroup, EquationError> {
    let mut entries: Vec<Entry> = Vec::new();
    let mut functions: Vec<PendingFunction> = Vec::new();

    for item in &group.items {
        match item {
            LexItem::Atom(atom) => {
                let label = match atom.kind {
                    crate::parsing::leftover::AtomKind::Number => {
                        Label::Number(atom.text.parse::<f64>().map_err(|_| {
                            EquationError::MalformedInput(format!(
                                "'{}' is not a valid number",
                                atom.text
                            ))
                        })?)
                    }
                    crate::parsing::leftover::AtomKind::Name => Label::Var(atom.text.clone()),
                };
                let node = arena.add(label);
                entries.push(Entry { node, span: atom.span, op: None });
            }
            LexItem::Infix(infix) => {
                let node = arena.add(Label::Op(infix.op));
                entries.push(Entry {
                    node,
                    span: Span::new(infix.pos, infix.pos + 1),
                    op: Some(infix.op),
                });
            }
            LexItem::Backslash(item) => match item.kind {
                BackslashKind::Symbol => {
                    let node = arena.add(Label::Var(format!("\\{}", item.name)));
                    entries.push(Entry { node, span: item.span, op: None });
                }
                BackslashKind::ArgVariable | BackslashKind::Function => {
                    let node = arena.add(Label::Function(item.name.clone()));
                    entries.push(Entry { node, span: item.span, op: None });
                    functions.push(PendingFunction {
                        node,
                        item: item.clone(),
                        grafts: vec![None; item.args.len()],
                    });
                }
            },
        }
    }

    // build regions: argument slots plus plain (non-owned) bracket pairs
    let mut regions: Vec<Region> = Vec::new();
    for (fi, f) in functions.iter().enumerate() {
        for (ai, &arg) in f.item.args.iter().enumerate() {
            regions.push(Region { content: arg, full: arg, owner: Some((fi, ai)) });
        }
    }
    let owned_opens: Vec<usize> = functions
        .iter()
        .flat_map(|f| f.item.arg_opens.iter().flatten().copied())
        .collect();
    for pair in &scan.bracket_pairs {
        if !group.span.contains(pair.full()) {
            continue;
        }
        if owned_opens.contains(&pair.open) {
            continue;
        }
        // brackets absorbed by a backslash name (scripts, subscripts) are not
        // build regions
        if scan.absorbed_by_name(pair.open) {
            continue;
        }
        regions.push(Region { content: pair.content(), full: pair.full(), owner: None });
    }
    // innermost regions first; proper nesting makes the order well defined
    regions.sort_by_key(|r| r.content.len());

    let mut avail = entries;
    for region in &regions {
        let (inside, rest): (Vec<Entry>, Vec<Entry>) = avail
            .into_iter()
            .partition(|e| region.content.contains(e.span));
        avail = rest;
        if inside.is_empty() {
            return Err(EquationError::MalformedInput(format!(
                "nothing inside the brackets spanning {}..{}",
                region.full.start, region.full.end
            )));
        }
        let subtree = build_sequence(arena, inside)?;
        match region.owner {
            Some((fi, ai)) => functions[fi].grafts[ai] = Some(subtree),
            None => avail.push(Entry { node: subtree, span: region.full, op: None }),
        }
    }

    let top = build_sequence(arena, avail)?;
    attach_function_arguments(input, arena, functions)?;

    // the trig-exponent rewrite may have wrapped the old top node
    let mut root = top;
    while let Some(p) = arena.node(root).parent {
        root = p;
    }
    debug!(
        "tree builder: group {}..{} built, root node {}",
        group.span.start, group.span.end, root
    );
    Ok(BuiltGroup { root, span: group.span })
}

/// Implicit multiplication plus priority-ordered operand binding over one
/// ordered item sequence.
fn build_sequence(arena: &mut Arena, entries: Vec<Entry>) -> Result<NodeId, EquationError> {
    let mut entries = entries;
    entries.sort_by_key(|e| (e.span.start, e.span.len()));

    if let Some(first) = entries.first() {
        if first.op.is_some() {
            return Err(EquationError::MalformedInput(format!(
                "operator '{}' at {} has nothing to its left",
                first.op.expect("checked").symbol(),
                first.span.start
            )));
        }
    }
    if entries.last().is_some_and(|e| e.op.is_some()) {
        let last = entries.last().expect("checked non-empty");
        return Err(EquationError::MalformedInput(format!(
            "operator '{}' at {} has nothing to its right",
            last.op.expect("checked").symbol(),
            last.span.start
        )));
    }

    // a unary minus in the middle of a sequence (its implicit zero was
    // synthesized after another operator) binds the single operand that
    // follows it before precedence runs, so `x * -2` reads x * (0 - 2).
    // Implicit zeros are the only zero-width operand entries; scanning from
    // the right fuses a stacked `--x` innermost-first. A zero leading its
    // sequence is left to the priority loop, which keeps the whole-term
    // reading of a leading minus.
    let mut j = entries.len().saturating_sub(3);
    while j >= 1 {
        let unary_here = j + 2 < entries.len()
            && entries[j].op.is_none()
            && entries[j].span.is_empty()
            && entries[j + 1].op == Some(InfixOp::Sub)
            && entries[j + 2].op.is_none();
        if unary_here {
            let minus = entries[j + 1];
            arena.adopt(minus.node, entries[j].node);
            arena.adopt(minus.node, entries[j + 2].node);
            let span = Span::new(entries[j].span.start, entries[j + 2].span.end);
            entries.splice(j..j + 3, [Entry { node: minus.node, span, op: None }]);
        }
        j -= 1;
    }

    // synthetic * between adjacent items not related by an explicit operator
    let mut with_mul: Vec<Entry> = Vec::with_capacity(entries.len() * 2);
    for entry in entries {
        if let Some(prev) = with_mul.last() {
            if prev.op.is_some() && entry.op.is_some() {
                return Err(EquationError::MalformedInput(format!(
                    "operators '{}' and '{}' are adjacent at {}",
                    prev.op.expect("checked").symbol(),
                    entry.op.expect("checked").symbol(),
                    entry.span.start
                )));
            }
            if prev.op.is_none() && entry.op.is_none() {
                let node = arena.add(Label::Op(InfixOp::Mul));
                with_mul.push(Entry {
                    node,
                    span: Span::new(entry.span.start, entry.span.start),
                    op: Some(InfixOp::Mul),
                });
            }
        }
        with_mul.push(entry);
    }

    // bind operands tightest-first; a filled operator stays available as an
    // operand for the next (looser) priority, which gives left associativity
    let mut consumed = vec![false; with_mul.len()];
    for priority in 0..=4 {
        for i in 0..with_mul.len() {
            let Some(op) = with_mul[i].op else { continue };
            if op.priority() != priority {
                continue;
            }
            let left = (0..i).rev().find(|&j| !consumed[j]);
            let right = (i + 1..with_mul.len()).find(|&j| !consumed[j]);
            let (Some(l), Some(r)) = (left, right) else {
                return Err(EquationError::MalformedInput(format!(
                    "operator '{}' at {} is missing an operand",
                    op.symbol(),
                    with_mul[i].span.start
                )));
            };
            arena.adopt(with_mul[i].node, with_mul[l].node);
            arena.adopt(with_mul[i].node, with_mul[r].node);
            consumed[l] = true;
            consumed[r] = true;
        }
    }

    let roots: Vec<usize> = (0..with_mul.len()).filter(|&i| !consumed[i]).collect();
    match roots.as_slice() {
        [only] => Ok(with_mul[*only].node),
        _ => Err(EquationError::MalformedInput(
            "expression does not reduce to a single tree".to_string(),
        )),
    }
}

/// Attaches grafted arguments in argument order and applies the default
/// special cases.
fn attach_function_arguments(
    input: &str,
    arena: &mut Arena,
    functions: Vec<PendingFunction>,
) -> Result<(), EquationError> {
    for f in functions {
        let mut grafts = Vec::with_capacity(f.grafts.len());
        for (ai, g) in f.grafts.iter().copied().enumerate() {
            grafts.push(g.ok_or_else(|| {
                EquationError::InternalInconsistency(format!(
                    "argument {} of \\{} was never grafted",
                    ai, f.item.name
                ))
            })?);
        }

        match f.item.name.as_str() {
            "sqrt" => {
                let root = match f.item.script {
                    Some(span) => script_node(input, arena, span)?,
                    None => arena.add(Label::Number(2.0)),
                };
                arena.adopt(f.node, root);
                arena.adopt(f.node, grafts[0]);
            }
            "log" => {
                let base = match f.item.script {
                    Some(span) => script_node(input, arena, span)?,
                    None => arena.add(Label::Number(10.0)),
                };
                arena.adopt(f.node, base);
                arena.adopt(f.node, grafts[0]);
            }
            "ln" => {
                arena.set_label(f.node, Label::Function("log".to_string()));
                let base = arena.add(Label::Var("e".to_string()));
                arena.adopt(f.node, base);
                arena.adopt(f.node, grafts[0]);
            }
            name if crate::parsing::scanner::is_trig(name) => {
                arena.adopt(f.node, grafts[0]);
                // sin^2(x) reads (sin(x))^2; an absent exponent stays absent
                if let Some(span) = f.item.script {
                    let exponent = script_node(input, arena, span)?;
                    let pow = arena.add(Label::Op(InfixOp::Pow));
                    arena.replace_in_parent(f.node, pow);
                    arena.adopt(pow, f.node);
                    arena.adopt(pow, exponent);
                }
            }
            _ => {
                // frac and decorated variables: plain arguments in order
                for g in grafts {
                    arena.adopt(f.node, g);
                }
            }
        }
    }
    Ok(())
}

/// A sub/superscript or optional-argument content is atomic: a number or a
/// bare name, never an expression.
fn script_node(input: &str, arena: &mut Arena, span: Span) -> Result<NodeId, EquationError> {
    let text = input[span.start..span.end].trim();
    if let Ok(v) = text.parse::<f64>() {
        return Ok(arena.add(Label::Number(v)));
    }
    if !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '\\')
    {
        return Ok(arena.add(Label::Var(text.to_string())));
    }
    Err(EquationError::MalformedInput(format!(
        "unsupported sub/superscript expression '{}'",
        text
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::{leftover, merger, scanner};

    fn build_input(input: &str) -> (Arena, Vec<BuiltGroup>) {
        let scan = scanner::scan(input, &scanner::ScannerLimits::default()).unwrap();
        let atoms = leftover::collect(input, &scan);
        let groups = merger::merge(input, &scan, atoms).unwrap();
        let mut arena = Arena::new();
        let built = build(input, &scan, &groups, &mut arena).unwrap();
        (arena, built)
    }

    fn op_of(arena: &Arena, id: NodeId) -> InfixOp {
        match arena.label(id) {
            Label::Op(op) => *op,
            other => panic!("expected operator, got {:?}", other),
        }
    }

    #[test]
    fn test_implicit_multiplication() {
        let (arena, built) = build_input("2x = y");
        assert_eq!(built.len(), 2);
        let root = built[0].root;
        assert_eq!(op_of(&arena, root), InfixOp::Mul);
        let kids = &arena.node(root).children;
        assert_eq!(*arena.label(kids[0]), Label::Number(2.0));
        assert_eq!(*arena.label(kids[1]), Label::Var("x".to_string()));
    }

    #[test]
    fn test_precedence_binds_tighter_ops_first() {
        let (arena, built) = build_input("a + b * c ^ 2 = y");
        let plus = built[0].root;
        assert_eq!(op_of(&arena, plus), InfixOp::Add);
        let mul = arena.node(plus).children[1];
        assert_eq!(op_of(&arena, mul), InfixOp::Mul);
        let pow = arena.node(mul).children[1];
        assert_eq!(op_of(&arena, pow), InfixOp::Pow);
    }

    #[test]
    fn test_left_associativity() {
        let (arena, built) = build_input("a - b - c = y");
        let outer = built[0].root;
        assert_eq!(op_of(&arena, outer), InfixOp::Sub);
        let inner = arena.node(outer).children[0];
        assert_eq!(op_of(&arena, inner), InfixOp::Sub);
        assert_eq!(*arena.label(arena.node(outer).children[1]), Label::Var("c".to_string()));
    }

    #[test]
    fn test_brackets_override_precedence() {
        let (arena, built) = build_input("(a + b) * c = y");
        let mul = built[0].root;
        assert_eq!(op_of(&arena, mul), InfixOp::Mul);
        let plus = arena.node(mul).children[0];
        assert_eq!(op_of(&arena, plus), InfixOp::Add);
    }

    #[test]
    fn test_bracket_at_the_end_of_a_side() {
        let (arena, built) = build_input("2 * (a + b) = y");
        let mul = built[0].root;
        assert_eq!(op_of(&arena, mul), InfixOp::Mul);
        let plus = arena.node(mul).children[1];
        assert_eq!(op_of(&arena, plus), InfixOp::Add);
    }

    #[test]
    fn test_bracket_wrapping_a_whole_side() {
        let (arena, built) = build_input("(a + b) = c");
        assert_eq!(op_of(&arena, built[0].root), InfixOp::Add);
    }

    #[test]
    fn test_unary_minus_after_an_operator() {
        let (arena, built) = build_input("x * -2 = y");
        let mul = built[0].root;
        assert_eq!(op_of(&arena, mul), InfixOp::Mul);
        let sub = arena.node(mul).children[1];
        assert_eq!(op_of(&arena, sub), InfixOp::Sub);
        let kids = &arena.node(sub).children;
        assert_eq!(*arena.label(kids[0]), Label::Number(0.0));
        assert_eq!(*arena.label(kids[1]), Label::Number(2.0));
    }

    #[test]
    fn test_sqrt_default_root() {
        let (arena, built) = build_input(r"\sqrt(4) = 2");
        let sqrt = built[0].root;
        assert_eq!(*arena.label(sqrt), Label::Function("sqrt".to_string()));
        let kids = &arena.node(sqrt).children;
        assert_eq!(*arena.label(kids[0]), Label::Number(2.0));
        assert_eq!(*arena.label(kids[1]), Label::Number(4.0));
    }

    #[test]
    fn test_log_default_base_and_ln() {
        let (arena, built) = build_input(r"\log(x) = \ln(y)");
        let log = built[0].root;
        assert_eq!(*arena.label(arena.node(log).children[0]), Label::Number(10.0));
        let ln = built[1].root;
        assert_eq!(*arena.label(ln), Label::Function("log".to_string()));
        assert_eq!(*arena.label(arena.node(ln).children[0]), Label::Var("e".to_string()));
    }

    #[test]
    fn test_trig_exponent_wraps_the_function() {
        let (arena, built) = build_input(r"\sin^2(x) = 1");
        let pow = built[0].root;
        assert_eq!(op_of(&arena, pow), InfixOp::Pow);
        let kids = &arena.node(pow).children;
        assert_eq!(*arena.label(kids[0]), Label::Function("sin".to_string()));
        assert_eq!(*arena.label(kids[1]), Label::Number(2.0));
        // the argument is x, never x^2
        assert_eq!(
            *arena.label(arena.node(kids[0]).children[0]),
            Label::Var("x".to_string())
        );
    }

    #[test]
    fn test_elided_trig_exponent_leaves_no_literal_one() {
        let (arena, built) = build_input(r"\sin(x) = 1");
        let sin = built[0].root;
        assert_eq!(*arena.label(sin), Label::Function("sin".to_string()));
        assert_eq!(arena.node(sin).children.len(), 1);
    }

    #[test]
    fn test_grafting_takes_the_widest_contained_subtree() {
        let (arena, built) = build_input(r"\sqrt(x^2 + y^2) = z");
        let sqrt = built[0].root;
        let radicand = arena.node(sqrt).children[1];
        assert_eq!(op_of(&arena, radicand), InfixOp::Add);
    }

    #[test]
    fn test_frac_argument_order() {
        let (arena, built) = build_input(r"\frac{a}{b} = c");
        let frac = built[0].root;
        let kids = &arena.node(frac).children;
        assert_eq!(*arena.label(kids[0]), Label::Var("a".to_string()));
        assert_eq!(*arena.label(kids[1]), Label::Var("b".to_string()));
    }

    #[test]
    fn test_implicit_zero_before_unary_minus() {
        let (arena, built) = build_input(r"-\sin(2x_0) = -2\sin(x_0)\cos(x_0)");
        for side in &built {
            let sub = side.root;
            assert_eq!(op_of(&arena, sub), InfixOp::Sub);
            assert_eq!(*arena.label(arena.node(sub).children[0]), Label::Number(0.0));
        }
        // right side: 0 - ((2 * sin(x_0)) * cos(x_0))
        let rhs = arena.node(built[1].root).children[1];
        assert_eq!(op_of(&arena, rhs), InfixOp::Mul);
    }

    #[test]
    fn test_braced_subscript_stays_one_variable() {
        let (arena, built) = build_input(r"\theta_{12} + 1 = y");
        let plus = built[0].root;
        assert_eq!(op_of(&arena, plus), InfixOp::Add);
        assert_eq!(
            *arena.label(arena.node(plus).children[0]),
            Label::Var(r"\theta_{12}".to_string())
        );
    }

    #[test]
    fn test_decorated_variable_argument() {
        let (arena, built) = build_input(r"\vec{v} = w");
        let vec_node = built[0].root;
        assert_eq!(*arena.label(vec_node), Label::Function("vec".to_string()));
        assert_eq!(
            *arena.label(arena.node(vec_node).children[0]),
            Label::Var("v".to_string())
        );
    }
}
