//MIT License
/// Arena-backed tree: nodes addressed by integer id, deep copy by compaction.
pub mod ast;
/// # Equation facade
///
/// Owns the parsed tree plus its statistics and exposes solving and
/// evaluation.
///
/// # Example
/// ```
/// use rearrange::symbolic::equation::Equation;
///
/// let eq = Equation::new("x + 1 = y", "infix").unwrap();
/// let solved = eq.make_subject("x").unwrap();
/// println!("{}", solved); // x = (y - 1)
/// ```
pub mod equation;
pub mod errors;
pub mod notation;
/// Function descriptors: forward evaluators and per-argument inverse rules.
pub mod registry;
