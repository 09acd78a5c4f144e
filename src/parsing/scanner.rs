//! # Positional Scanner Module
//!
//! First stage of the infix pipeline: a single pass over the raw equation
//! string that extracts three disjoint classes of lexical items without
//! aliasing the input:
//!
//! 1. backslash-prefixed names — plain symbols, argument-taking decorated
//!    variables, or recognized functions with 1–2 arguments and an optional
//!    sub/superscript located by function-specific grammar;
//! 2. bare infix operator occurrences with their immediate left/right
//!    neighbor characters;
//! 3. matched bracket pairs, one stack per bracket type.
//!
//! The three sub-scans write disjoint outputs, so the backslash scan runs in
//! parallel with the infix/bracket scans via `rayon::join`. Downstream stages
//! (leftover collection, merging, tree building) have a strict data dependency
//! on the complete output and start only after this stage returns.
//!
//! Every position claimed here (names, scripts, brackets, operators, the `=`)
//! is off limits to the leftover collector; mandatory argument *contents* stay
//! unclaimed so their tokens are parsed normally and grafted later.

use log::debug;
use regex::Regex;

use crate::symbolic::ast::InfixOp;
use crate::symbolic::errors::EquationError;

/// Backslash names that require a single `{...}` argument and denote a
/// decorated variable rather than a function.
pub const ARG_VARIABLE_NAMES: [&str; 6] = ["vec", "hat", "bar", "tilde", "dot", "overline"];

/// Trigonometric names taking an optional `^{power}`/`^c` superscript.
pub const TRIG_NAMES: [&str; 8] = [
    "sin", "cos", "tan", "cot", "arcsin", "arccos", "arctan", "arccot",
];

pub fn is_trig(name: &str) -> bool {
    TRIG_NAMES.contains(&name)
}

pub fn is_recognized_function(name: &str) -> bool {
    is_trig(name) || matches!(name, "sqrt" | "log" | "ln" | "frac")
}

/// Byte range into the source string, end-exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Span {
        Span { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, other: Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn contains_pos(&self, pos: usize) -> bool {
        self.start <= pos && pos < self.end
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BracketKind {
    Paren,
    Brace,
    Square,
}

impl BracketKind {
    pub fn open_char(self) -> char {
        match self {
            BracketKind::Paren => '(',
            BracketKind::Brace => '{',
            BracketKind::Square => '[',
        }
    }

    pub fn close_char(self) -> char {
        match self {
            BracketKind::Paren => ')',
            BracketKind::Brace => '}',
            BracketKind::Square => ']',
        }
    }

    pub fn from_open(c: char) -> Option<BracketKind> {
        match c {
            '(' => Some(BracketKind::Paren),
            '{' => Some(BracketKind::Brace),
            '[' => Some(BracketKind::Square),
            _ => None,
        }
    }

    pub fn from_close(c: char) -> Option<BracketKind> {
        match c {
            ')' => Some(BracketKind::Paren),
            '}' => Some(BracketKind::Brace),
            ']' => Some(BracketKind::Square),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BracketPair {
    pub kind: BracketKind,
    pub open: usize,
    pub close: usize,
}

impl BracketPair {
    /// Content range between the brackets.
    pub fn content(&self) -> Span {
        Span::new(self.open + 1, self.close)
    }

    /// Full range including the brackets themselves.
    pub fn full(&self) -> Span {
        Span::new(self.open, self.close + 1)
    }
}

/// One bare infix operator occurrence with its nearest non-space neighbor
/// characters, recorded for bracket-collision and unary-minus disambiguation.
#[derive(Clone, Copy, Debug)]
pub struct InfixItem {
    pub op: InfixOp,
    pub pos: usize,
    pub left_char: Option<char>,
    pub right_char: Option<char>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackslashKind {
    /// Zero-argument symbol (`\alpha`, `\theta_1`); becomes a variable leaf.
    Symbol,
    /// Decorated variable with one mandatory brace argument (`\vec{v}`).
    ArgVariable,
    /// Recognized function (`\sin`, `\sqrt`, `\log`, `\ln`, `\frac`).
    Function,
}

#[derive(Clone, Debug)]
pub struct BackslashItem {
    /// Name without the backslash; symbols absorb a trailing subscript
    /// (`\theta_1` scans as name "theta_1").
    pub name: String,
    pub kind: BackslashKind,
    /// Ganz span: name plus script plus arguments including their brackets.
    pub span: Span,
    /// Content of the optional argument: trig `^{p}`/`^c`, log `_{b}`/`_c`,
    /// sqrt `[root]`. `None` means the documented default applies.
    pub script: Option<Span>,
    /// Claimed range of the optional argument including marker and brackets.
    pub script_claim: Option<Span>,
    /// Mandatory argument content spans, in argument order.
    pub args: Vec<Span>,
    /// Open bracket position per mandatory argument; `None` for a bare
    /// single-character argument.
    pub arg_opens: Vec<Option<usize>>,
}

/// Safety limits enforced before scanning starts.
#[derive(Clone, Copy, Debug)]
pub struct ScannerLimits {
    pub max_len: usize,
}

impl Default for ScannerLimits {
    fn default() -> Self {
        ScannerLimits { max_len: 16 * 1024 }
    }
}

#[derive(Clone, Debug)]
pub struct ScanOutput {
    pub backslash_items: Vec<BackslashItem>,
    pub infix_items: Vec<InfixItem>,
    pub bracket_pairs: Vec<BracketPair>,
    pub equals_pos: usize,
    claimed: Vec<bool>,
}

impl ScanOutput {
    pub fn is_claimed(&self, pos: usize) -> bool {
        self.claimed[pos]
    }

    /// True when a backslash name claimed `pos` for itself (its name, script
    /// or argument brackets) rather than for argument content. An operator or
    /// bracket character at such a position is not a lexical item.
    pub fn absorbed_by_name(&self, pos: usize) -> bool {
        self.backslash_items
            .iter()
            .any(|b| b.span.contains_pos(pos) && !b.args.iter().any(|a| a.contains_pos(pos)))
    }
}

/// Runs the full scan. The backslash sub-scan and the infix/bracket sub-scans
/// write disjoint structures and run on separate rayon tasks.
pub fn scan(input: &str, limits: &ScannerLimits) -> Result<ScanOutput, EquationError> {
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

    let (backslash_res, (infix_res, bracket_res)) = rayon::join(
        || scan_backslash_items(input),
        || rayon::join(|| scan_infix_occurrences(input), || scan_bracket_pairs(input)),
    );
    let backslash_items = backslash_res?;
    let (infix_items, equals_positions) = infix_res?;
    let bracket_pairs = bracket_res?;

    let equals_pos = match equals_positions.as_slice() {
        [pos] => *pos,
        [] => {
            return Err(EquationError::MalformedInput(
                "expected exactly one '=' separating the two sides, found none".to_string(),
            ));
        }
        more => {
            return Err(EquationError::MalformedInput(format!(
                "expected exactly one '=', found {}",
                more.len()
            )));
        }
    };

    let mut claimed = vec![false; input.len()];
    for item in &backslash_items {
        for pos in item.span.start..item.span.end {
            if !item.args.iter().any(|a| a.contains_pos(pos)) {
                claimed[pos] = true;
            }
        }
    }
    for pair in &bracket_pairs {
        claimed[pair.open] = true;
        claimed[pair.close] = true;
    }
    for item in &infix_items {
        claimed[item.pos] = true;
    }
    claimed[equals_pos] = true;

    debug!(
        "scanner: {} backslash item(s), {} infix occurrence(s), {} bracket pair(s)",
        backslash_items.len(),
        infix_items.len(),
        bracket_pairs.len()
    );

    Ok(ScanOutput {
        backslash_items,
        infix_items,
        bracket_pairs,
        equals_pos,
        claimed,
    })
}

/// One pass with one stack per bracket type. Unmatched or crossed brackets
/// fail immediately, naming the offending type(s).
fn scan_bracket_pairs(input: &str) -> Result<Vec<BracketPair>, EquationError> {
    let mut pairs = Vec::new();
    let mut stack: Vec<(BracketKind, usize)> = Vec::new();
    for (i, c) in input.char_indices() {
        if let Some(kind) = BracketKind::from_open(c) {
            stack.push((kind, i));
        } else if let Some(kind) = BracketKind::from_close(c) {
            match stack.pop() {
                Some((open_kind, open)) if open_kind == kind => {
                    pairs.push(BracketPair { kind, open, close: i });
                }
                Some((open_kind, open)) => {
                    return Err(EquationError::MalformedInput(format!(
                        "bracket mismatch: '{}' opened at {} but '{}' found at {}",
                        open_kind.open_char(),
                        open,
                        c,
                        i
                    )));
                }
                None => {
                    return Err(EquationError::MalformedInput(format!(
                        "unmatched closing bracket '{}' at {}",
                        c, i
                    )));
                }
            }
        }
    }
    if !stack.is_empty() {
        let kinds: Vec<String> = stack
            .iter()
            .map(|(k, pos)| format!("'{}' at {}", k.open_char(), pos))
            .collect();
        return Err(EquationError::MalformedInput(format!(
            "unmatched opening bracket(s): {}",
            kinds.join(", ")
        )));
    }
    pairs.sort_by_key(|p| p.open);
    Ok(pairs)
}

/// Records every bare operator occurrence with its nearest non-space neighbor
/// characters, plus the positions of all `=` signs.
fn scan_infix_occurrences(input: &str) -> Result<(Vec<InfixItem>, Vec<usize>), EquationError> {
    let mut items = Vec::new();
    let mut equals = Vec::new();
    for (i, c) in input.char_indices() {
        if c == '=' {
            equals.push(i);
            continue;
        }
        if let Some(op) = InfixOp::from_char(c) {
            let left_char = input[..i].chars().rev().find(|ch| !ch.is_whitespace());
            let right_char = input[i + 1..].chars().find(|ch| !ch.is_whitespace());
            items.push(InfixItem { op, pos: i, left_char, right_char });
        }
    }
    Ok((items, equals))
}

/// Finds every `\name` occurrence and applies the function-specific argument
/// grammar documented in the module docs.
fn scan_backslash_items(input: &str) -> Result<Vec<BackslashItem>, EquationError> {
    let name_re = Regex::new(r"\\[a-zA-Z]+").expect("backslash-name pattern is valid");
    let mut items = Vec::new();
    for m in name_re.find_iter(input) {
        let name = &input[m.start() + 1..m.end()];
        let item = if ARG_VARIABLE_NAMES.contains(&name) {
            scan_arg_variable(input, name, m.start(), m.end())?
        } else if is_recognized_function(name) {
            scan_function(input, name, m.start(), m.end())?
        } else {
            scan_symbol(input, name, m.start(), m.end())
        };
        items.push(item);
    }
    Ok(items)
}

/// `\vec{v}` style: one mandatory brace argument.
fn scan_arg_variable(
    input: &str,
    name: &str,
    start: usize,
    cursor: usize,
) -> Result<BackslashItem, EquationError> {
    let (arg, open, end) = expect_argument(input, cursor, BracketKind::Brace, name, "argument")?;
    Ok(BackslashItem {
        name: name.to_string(),
        kind: BackslashKind::ArgVariable,
        span: Span::new(start, end),
        script: None,
        script_claim: None,
        args: vec![arg],
        arg_opens: vec![open],
    })
}

/// Zero-argument symbol; absorbs a trailing `_{...}`/`_c` subscript into the
/// variable name so `\theta_1` stays one variable.
fn scan_symbol(input: &str, name: &str, start: usize, cursor: usize) -> BackslashItem {
    let mut end = cursor;
    let mut full_name = name.to_string();
    let bytes = input.as_bytes();
    if end < bytes.len() && bytes[end] == b'_' {
        if let Ok(Some((_, claim))) = optional_script(input, end, '_') {
            full_name.push_str(&input[claim.start..claim.end]);
            end = claim.end;
        }
    }
    BackslashItem {
        name: full_name,
        kind: BackslashKind::Symbol,
        span: Span::new(start, end),
        script: None,
        script_claim: None,
        args: Vec::new(),
        arg_opens: Vec::new(),
    }
}

/// Recognized functions; grammar per function name.
fn scan_function(
    input: &str,
    name: &str,
    start: usize,
    cursor: usize,
) -> Result<BackslashItem, EquationError> {
    let mut cursor = cursor;
    let mut script = None;
    let mut script_claim = None;
    let mut args = Vec::new();
    let mut arg_opens = Vec::new();

    if is_trig(name) {
        // optional ^{power} or ^c immediately after the name
        if let Some((content, claim)) = optional_script(input, cursor, '^')? {
            script = Some(content);
            script_claim = Some(claim);
            cursor = claim.end;
        }
        let (arg, open, end) = expect_argument(input, cursor, BracketKind::Paren, name, "argument")?;
        args.push(arg);
        arg_opens.push(open);
        cursor = end;
    } else if name == "sqrt" {
        // optional [root] before the mandatory (radicand)
        if input.as_bytes().get(cursor) == Some(&b'[') {
            let close = find_matching(input, cursor, BracketKind::Square)?;
            script = Some(Span::new(cursor + 1, close));
            script_claim = Some(Span::new(cursor, close + 1));
            cursor = close + 1;
        }
        let (arg, open, end) = expect_argument(input, cursor, BracketKind::Paren, name, "radicand")?;
        args.push(arg);
        arg_opens.push(open);
        cursor = end;
    } else if name == "log" {
        // optional _{base} or _c before the mandatory (argument)
        if let Some((content, claim)) = optional_script(input, cursor, '_')? {
            script = Some(content);
            script_claim = Some(claim);
            cursor = claim.end;
        }
        let (arg, open, end) = expect_argument(input, cursor, BracketKind::Paren, name, "argument")?;
        args.push(arg);
        arg_opens.push(open);
        cursor = end;
    } else if name == "ln" {
        let (arg, open, end) = expect_argument(input, cursor, BracketKind::Paren, name, "argument")?;
        args.push(arg);
        arg_opens.push(open);
        cursor = end;
    } else {
        // frac: {numerator}{denominator}, both mandatory, no defaults
        let (num, open_n, after_num) =
            expect_argument(input, cursor, BracketKind::Brace, name, "numerator")?;
        let (den, open_d, end) =
            expect_argument(input, after_num, BracketKind::Brace, name, "denominator")?;
        args.push(num);
        args.push(den);
        arg_opens.push(open_n);
        arg_opens.push(open_d);
        cursor = end;
    }

    Ok(BackslashItem {
        name: name.to_string(),
        kind: BackslashKind::Function,
        span: Span::new(start, cursor),
        script,
        script_claim,
        args,
        arg_opens,
    })
}

/// Parses `^{...}`/`^c` (or `_...`) at `pos`. Returns (content span, claimed
/// span including the marker and any braces), or `None` when the marker is
/// absent.
fn optional_script(
    input: &str,
    pos: usize,
    marker: char,
) -> Result<Option<(Span, Span)>, EquationError> {
    let bytes = input.as_bytes();
    if bytes.get(pos) != Some(&(marker as u8)) {
        return Ok(None);
    }
    match bytes.get(pos + 1) {
        Some(&b'{') => {
            let close = find_matching(input, pos + 1, BracketKind::Brace)?;
            Ok(Some((Span::new(pos + 2, close), Span::new(pos, close + 1))))
        }
        Some(c) if c.is_ascii_alphanumeric() => {
            Ok(Some((Span::new(pos + 1, pos + 2), Span::new(pos, pos + 2))))
        }
        other => Err(EquationError::MalformedInput(format!(
            "expected '{{' or a single character after '{}' at {}, found {:?}",
            marker,
            pos,
            other.map(|&b| b as char)
        ))),
    }
}

/// Locates a mandatory argument at `pos` (whitespace allowed before it):
/// either `kind`-bracket-delimited or a single bare alphanumeric character.
/// Returns (content span, open bracket position if any, position after).
fn expect_argument(
    input: &str,
    pos: usize,
    kind: BracketKind,
    func: &str,
    what: &str,
) -> Result<(Span, Option<usize>, usize), EquationError> {
    let pos = skip_spaces(input, pos);
    let bytes = input.as_bytes();
    match bytes.get(pos) {
        Some(&b) if b as char == kind.open_char() => {
            let close = find_matching(input, pos, kind)?;
            if close == pos + 1 {
                return Err(EquationError::MalformedInput(format!(
                    "empty {} of \\{} at {}",
                    what, func, pos
                )));
            }
            Ok((Span::new(pos + 1, close), Some(pos), close + 1))
        }
        Some(c) if c.is_ascii_alphanumeric() => {
            Ok((Span::new(pos, pos + 1), None, pos + 1))
        }
        found => Err(EquationError::MalformedInput(format!(
            "expected '{}' opening the {} of \\{}, found {:?}",
            kind.open_char(),
            what,
            func,
            found.map(|&b| b as char)
        ))),
    }
}

/// Position of the bracket closing the one opened at `open_pos`.
fn find_matching(input: &str, open_pos: usize, kind: BracketKind) -> Result<usize, EquationError> {
    let mut depth = 0usize;
    for (i, c) in input[open_pos..].char_indices() {
        if c == kind.open_char() {
            depth += 1;
        } else if c == kind.close_char() {
            depth -= 1;
            if depth == 0 {
                return Ok(open_pos + i);
            }
        }
    }
    Err(EquationError::MalformedInput(format!(
        "unmatched opening bracket '{}' at {}",
        kind.open_char(),
        open_pos
    )))
}

fn skip_spaces(input: &str, mut pos: usize) -> usize {
    let bytes = input.as_bytes();
    while pos < bytes.len() && (bytes[pos] as char).is_whitespace() {
        pos += 1;
    }
    pos
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_ok(input: &str) -> ScanOutput {
        scan(input, &ScannerLimits::default()).unwrap()
    }

    #[test]
    fn test_bracket_pairing() {
        let out = scan_ok("(x + {y}) = [z]");
        assert_eq!(out.bracket_pairs.len(), 3);
        assert_eq!(out.bracket_pairs[0].kind, BracketKind::Paren);
        assert_eq!(out.bracket_pairs[0].close, 8);
    }

    #[test]
    fn test_unmatched_open_fails() {
        let err = scan("(x + y = z", &ScannerLimits::default()).unwrap_err();
        assert!(matches!(err, EquationError::MalformedInput(ref m) if m.contains("'('")));
    }

    #[test]
    fn test_crossed_brackets_fail() {
        let err = scan("(x + {y) } = z", &ScannerLimits::default()).unwrap_err();
        assert!(matches!(err, EquationError::MalformedInput(ref m) if m.contains("mismatch")));
    }

    #[test]
    fn test_equals_required() {
        assert!(scan("x + y", &ScannerLimits::default()).is_err());
        assert!(scan("x = y = z", &ScannerLimits::default()).is_err());
    }

    #[test]
    fn test_infix_neighbors() {
        let out = scan_ok("2 - x = y");
        let minus = &out.infix_items[0];
        assert_eq!(minus.op, InfixOp::Sub);
        assert_eq!(minus.left_char, Some('2'));
        assert_eq!(minus.right_char, Some('x'));
    }

    #[test]
    fn test_sqrt_with_and_without_root() {
        let out = scan_ok(r"\sqrt(4) = \sqrt[3](x)");
        let plain = &out.backslash_items[0];
        assert_eq!(plain.name, "sqrt");
        assert!(plain.script.is_none());
        assert_eq!(plain.args.len(), 1);
        let cubed = &out.backslash_items[1];
        let root = cubed.script.unwrap();
        assert_eq!(&r"\sqrt(4) = \sqrt[3](x)"[root.start..root.end], "3");
    }

    #[test]
    fn test_trig_superscript_variants() {
        let input = r"\sin^2(x) + \cos^{12}(x) = 1";
        let out = scan_ok(input);
        let sin = &out.backslash_items[0];
        assert_eq!(&input[sin.script.unwrap().start..sin.script.unwrap().end], "2");
        let cos = &out.backslash_items[1];
        assert_eq!(&input[cos.script.unwrap().start..cos.script.unwrap().end], "12");
        // the script '^' must not leak into leftover atoms
        assert!(out.is_claimed(4));
        assert!(out.is_claimed(5));
    }

    #[test]
    fn test_log_base_and_ln() {
        let input = r"\log_{10}(x) = \ln(y)";
        let out = scan_ok(input);
        let log = &out.backslash_items[0];
        assert_eq!(&input[log.script.unwrap().start..log.script.unwrap().end], "10");
        let ln = &out.backslash_items[1];
        assert_eq!(ln.name, "ln");
        assert!(ln.script.is_none());
    }

    #[test]
    fn test_frac_requires_both_braces() {
        let out = scan_ok(r"\frac{a}{b} = c");
        assert_eq!(out.backslash_items[0].args.len(), 2);
        let err = scan(r"\frac{a} = c", &ScannerLimits::default()).unwrap_err();
        assert!(matches!(err, EquationError::MalformedInput(ref m) if m.contains("denominator")));
    }

    #[test]
    fn test_missing_argument_bracket() {
        let err = scan(r"\sin + 2 = x", &ScannerLimits::default()).unwrap_err();
        assert!(matches!(err, EquationError::MalformedInput(ref m) if m.contains("argument of \\sin")));
    }

    #[test]
    fn test_unknown_backslash_name_is_a_symbol() {
        let input = r"\alpha + \theta_1 = \beta";
        let out = scan_ok(input);
        let names: Vec<&str> = out.backslash_items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "theta_1", "beta"]);
        assert!(out.backslash_items.iter().all(|i| i.kind == BackslashKind::Symbol));
    }

    #[test]
    fn test_decorated_variable() {
        let out = scan_ok(r"\vec{v} = w");
        let item = &out.backslash_items[0];
        assert_eq!(item.kind, BackslashKind::ArgVariable);
        assert_eq!(item.args.len(), 1);
    }

    #[test]
    fn test_argument_content_stays_unclaimed() {
        let input = r"\sqrt(x) = y";
        let out = scan_ok(input);
        assert!(out.is_claimed(0)); // backslash
        assert!(out.is_claimed(5)); // '('
        assert!(!out.is_claimed(6)); // 'x' is leftover territory
    }

    #[test]
    fn test_size_limit() {
        let limits = ScannerLimits { max_len: 4 };
        let err = scan("x = yyy", &limits).unwrap_err();
        assert!(matches!(err, EquationError::SizeLimitExceeded { .. }));
    }
}
