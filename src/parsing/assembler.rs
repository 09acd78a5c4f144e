//! # Assembler Module
//!
//! Final stage of the infix pipeline: runs scanner, leftover collection,
//! merging and tree building in order, checks that exactly two parentless
//! subtrees remain (one per side of the `=`), and seals them under the
//! equality root. The result is compacted so node ids are sequential in
//! preorder regardless of arena construction order.

use log::debug;

use crate::parsing::scanner::{self, ScannerLimits};
use crate::parsing::{leftover, merger, tree_builder};
use crate::symbolic::ast::{Arena, Ast};
use crate::symbolic::errors::EquationError;

/// Parses an infix equation string into a finished tree.
pub fn parse_infix(input: &str, limits: &ScannerLimits) -> Result<Ast, EquationError> {
    let scan = scanner::scan(input, limits)?;
    let atoms = leftover::collect(input, &scan);
    let groups = merger::merge(input, &scan, atoms)?;
    if groups.len() != 2 {
        return Err(EquationError::MalformedInput(format!(
            "expected an expression on each side of '=', found {} group(s)",
            groups.len()
        )));
    }

    let mut arena = Arena::new();
    let built = tree_builder::build(input, &scan, &groups, &mut arena)?;

    // the grafting contract: every node except the two side roots has a parent
    let parentless = arena.roots();
    if parentless.len() != 2 {
        return Err(EquationError::InternalInconsistency(format!(
            "expected exactly two parentless nodes around '=', found {}",
            parentless.len()
        )));
    }
    let mut sides: Vec<_> = built.iter().collect();
    sides.sort_by_key(|g| g.span.start);
    let (lhs, rhs) = match sides.as_slice() {
        [l, r] if parentless.contains(&l.root) && parentless.contains(&r.root) => {
            (l.root, r.root)
        }
        _ => {
            return Err(EquationError::InternalInconsistency(
                "group roots and parentless nodes disagree".to_string(),
            ));
        }
    };
    if !(sides[0].span.end <= scan.equals_pos && scan.equals_pos <= sides[1].span.start) {
        return Err(EquationError::InternalInconsistency(
            "side subtrees do not straddle the '=' sign".to_string(),
        ));
    }

    let ast = Ast::seal(arena, lhs, rhs).compacted();
    debug!("assembler: parsed {} node(s)", ast.node_count());
    Ok(ast)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolic::ast::Label;

    #[test]
    fn test_sides_straddle_the_equals() {
        let ast = parse_infix("x + 1 = y", &ScannerLimits::default()).unwrap();
        assert_eq!(*ast.label(ast.root()), Label::Equals);
        assert_eq!(ast.children(ast.root()).len(), 2);
        let rhs = ast.children(ast.root())[1];
        assert_eq!(*ast.label(rhs), Label::Var("y".to_string()));
    }

    #[test]
    fn test_empty_side_is_rejected() {
        assert!(parse_infix("x + 1 =", &ScannerLimits::default()).is_err());
        assert!(parse_infix("= y", &ScannerLimits::default()).is_err());
    }

    #[test]
    fn test_compacted_ids_are_preorder() {
        let ast = parse_infix("x = y", &ScannerLimits::default()).unwrap();
        // preorder from the root: x is node 0, y is node 1, '=' sealed last
        assert_eq!(*ast.label(0), Label::Var("x".to_string()));
        assert_eq!(*ast.label(1), Label::Var("y".to_string()));
        assert_eq!(ast.root(), 2);
    }
}
