//MIT License
/// # Infix parsing pipeline
///
/// Stages run strictly in order, each consuming the previous one's output:
/// positional scan → leftover collection → consecutivity merge → tree build →
/// assembly under the `=` root. `assembler::parse_infix` drives the whole
/// chain.
///
/// # Example
/// ```
/// use rearrange::parsing::assembler::parse_infix;
/// use rearrange::parsing::scanner::ScannerLimits;
///
/// let ast = parse_infix(r"\frac{1}{a} = \frac{1}{b} + \frac{1}{c}", &ScannerLimits::default()).unwrap();
/// println!("parsed: {}", ast);
/// ```
pub mod assembler;
pub mod leftover;
pub mod merger;
/// S-expression notation: `(= (/ 1 a) (+ (/ 1 b) (/ 1 c)))`.
pub mod prefix;
pub mod scanner;
pub mod tree_builder;
