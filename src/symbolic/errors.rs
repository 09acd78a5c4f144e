//! Error taxonomy for parsing and solving.
//!
//! Three categories are kept apart so that callers can tell "your equation is
//! invalid" (malformed input), "this equation cannot be solved this way"
//! (semantic preconditions) and "the engine has a bug" (internal consistency)
//! from one another. All failures are synchronous and none are retried.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum EquationError {
    /// Unmatched brackets, a missing mandatory argument, no (or several) `=`
    /// signs, or an otherwise unparseable construct. Raised at the point of
    /// detection with an expected-vs-found description.
    MalformedInput(String),
    /// The scanner's configured input size limit was exceeded.
    SizeLimitExceeded { len: usize, max: usize },
    /// `make_subject` was asked for a variable that does not occur.
    VariableNotAvailable(String),
    /// The request is valid but outside what the engine handles, e.g. a
    /// variable occurring more than once or a function with no inverse rule.
    CannotHandle(String),
    /// A defect in a prior stage: an invariant the pipeline guarantees was
    /// observed broken. Not a user error; treat as fatal.
    InternalInconsistency(String),
}

impl fmt::Display for EquationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EquationError::MalformedInput(msg) => write!(f, "Malformed input: {}", msg),
            EquationError::SizeLimitExceeded { len, max } => {
                write!(f, "Input of {} bytes exceeds the configured limit of {}", len, max)
            }
            EquationError::VariableNotAvailable(var) => {
                write!(f, "Variable Not Available: '{}' does not occur in the equation", var)
            }
            EquationError::CannotHandle(msg) => write!(f, "Cannot handle: {}", msg),
            EquationError::InternalInconsistency(msg) => {
                write!(f, "Internal inconsistency (engine defect): {}", msg)
            }
        }
    }
}

impl std::error::Error for EquationError {}

impl EquationError {
    /// True for the two categories a caller may present to an end user.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, EquationError::InternalInconsistency(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_category() {
        let e = EquationError::VariableNotAvailable("x".to_string());
        assert!(e.to_string().contains("Variable Not Available"));
        assert!(e.is_user_error());
        let e = EquationError::InternalInconsistency("3 parentless nodes".to_string());
        assert!(!e.is_user_error());
    }
}
