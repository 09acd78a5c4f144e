//! # Leftover Collector Module
//!
//! Every character position the scanner did not claim is raw text. Contiguous
//! unclaimed runs coalesce into atomic tokens — numbers or bare variable
//! names — using the numeric/non-numeric character-class transition rule:
//! a run that starts with digits sheds its leading numeric prefix as a number
//! token and keeps the remainder as one variable name, so `2x_0` becomes the
//! tokens `2` and `x_0` while `x_0` alone stays a single variable.

use log::debug;

use crate::parsing::scanner::{ScanOutput, Span};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AtomKind {
    Number,
    Name,
}

/// An atomic leftover token: a numeric literal or a bare variable name.
#[derive(Clone, Debug, PartialEq)]
pub struct Atom {
    pub text: String,
    pub kind: AtomKind,
    pub span: Span,
}

impl Atom {
    pub fn number(text: &str, span: Span) -> Atom {
        Atom { text: text.to_string(), kind: AtomKind::Number, span }
    }

    pub fn name(text: &str, span: Span) -> Atom {
        Atom { text: text.to_string(), kind: AtomKind::Name, span }
    }
}

fn is_numeric_class(c: char) -> bool {
    c.is_ascii_digit() || c == '.'
}

/// Collects all unclaimed, non-whitespace runs and splits each per the
/// transition rule.
pub fn collect(input: &str, scan: &ScanOutput) -> Vec<Atom> {
    let mut atoms = Vec::new();
    let mut run_start: Option<usize> = None;
    for (i, c) in input.char_indices().chain(std::iter::once((input.len(), ' '))) {
        let in_run = i < input.len() && !scan.is_claimed(i) && !c.is_whitespace();
        match (run_start, in_run) {
            (None, true) => run_start = Some(i),
            (Some(start), false) => {
                split_run(&input[start..i], start, &mut atoms);
                run_start = None;
            }
            _ => {}
        }
    }
    debug!("leftover: {} atom(s) collected", atoms.len());
    atoms
}

/// Applies the transition rule to one run.
fn split_run(run: &str, offset: usize, atoms: &mut Vec<Atom>) {
    let numeric_prefix = run.chars().take_while(|&c| is_numeric_class(c)).count();
    if numeric_prefix == run.len() {
        atoms.push(Atom::number(run, Span::new(offset, offset + run.len())));
    } else if numeric_prefix > 0 {
        atoms.push(Atom::number(
            &run[..numeric_prefix],
            Span::new(offset, offset + numeric_prefix),
        ));
        atoms.push(Atom::name(
            &run[numeric_prefix..],
            Span::new(offset + numeric_prefix, offset + run.len()),
        ));
    } else {
        atoms.push(Atom::name(run, Span::new(offset, offset + run.len())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::scanner::{ScannerLimits, scan};

    fn atoms_of(input: &str) -> Vec<Atom> {
        let out = scan(input, &ScannerLimits::default()).unwrap();
        collect(input, &out)
    }

    #[test]
    fn test_number_variable_split() {
        let atoms = atoms_of("2x = y");
        assert_eq!(atoms[0], Atom::number("2", Span::new(0, 1)));
        assert_eq!(atoms[1], Atom::name("x", Span::new(1, 2)));
        assert_eq!(atoms[2], Atom::name("y", Span::new(5, 6)));
    }

    #[test]
    fn test_subscripted_variable_stays_whole() {
        let atoms = atoms_of("2x_0 = x_0");
        assert_eq!(atoms[0].text, "2");
        assert_eq!(atoms[1], Atom::name("x_0", Span::new(1, 4)));
        assert_eq!(atoms[2], Atom::name("x_0", Span::new(7, 10)));
    }

    #[test]
    fn test_decimal_number() {
        let atoms = atoms_of("2.5k = y");
        assert_eq!(atoms[0], Atom::number("2.5", Span::new(0, 3)));
        assert_eq!(atoms[1].text, "k");
    }

    #[test]
    fn test_claimed_positions_are_skipped() {
        let atoms = atoms_of(r"\sqrt(49) = 7");
        let texts: Vec<&str> = atoms.iter().map(|a| a.text.as_str()).collect();
        assert_eq!(texts, vec!["49", "7"]);
        assert!(atoms.iter().all(|a| a.kind == AtomKind::Number));
    }
}
