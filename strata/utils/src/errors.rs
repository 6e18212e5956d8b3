//! Errors raised while building or walking the IR.
use crate::Id;
use thiserror::Error;

/// Convinience wrapper to represent success or meaningul compiler error.
pub type StrataResult<T> = Result<T, Error>;

/// Construction-time and traversal-time contract violations.
///
/// None of these are transient: retrying the same operation on the same
/// input fails the same way. They abort the current build or walk, never the
/// process.
#[derive(Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// A bit-vector type was requested with a width outside `[1, max]`.
    #[error("invalid bit width {width}: widths must be between 1 and {max}")]
    InvalidWidth { width: u64, max: u64 },

    /// Attempt to change a type (or a value's type) after it was locked.
    #[error("type is locked: {0}")]
    TypeLocked(String),

    /// Operand types do not agree.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// Wrong number of operands, nested scopes or fields.
    #[error("`{node}' expects {expected} but got {found}")]
    ArityViolation {
        node: String,
        expected: String,
        found: usize,
    },

    /// An instruction owned by one statement was appended to another.
    #[error(
        "instruction `{instruction}' belongs to statement `{owner}' and cannot be added to `{target}'"
    )]
    CrossStatementReference {
        instruction: Id,
        owner: Id,
        target: Id,
    },

    /// A callable without a body was reached during traversal.
    #[error("callable `{0}' has no context block")]
    UnboundContext(Id),

    /// Structural change after the module was finalized.
    #[error("invalid mutation of finalized module: {0}")]
    InvalidMutation(String),

    /// An operand of the wrong kind.
    #[error("invalid operand: {0}")]
    InvalidOperand(String),

    /// Any other ill-formed construction.
    #[error("malformed IR: {0}")]
    Malformed(String),
}

impl Error {
    pub fn type_locked<S: ToString>(msg: S) -> Self {
        Self::TypeLocked(msg.to_string())
    }

    pub fn type_mismatch<S: ToString>(msg: S) -> Self {
        Self::TypeMismatch(msg.to_string())
    }

    pub fn arity<S: ToString, E: ToString>(
        node: S,
        expected: E,
        found: usize,
    ) -> Self {
        Self::ArityViolation {
            node: node.to_string(),
            expected: expected.to_string(),
            found,
        }
    }

    pub fn invalid_mutation<S: ToString>(msg: S) -> Self {
        Self::InvalidMutation(msg.to_string())
    }

    pub fn invalid_operand<S: ToString>(msg: S) -> Self {
        Self::InvalidOperand(msg.to_string())
    }

    pub fn malformed<S: ToString>(msg: S) -> Self {
        Self::Malformed(msg.to_string())
    }
}

// Print the message rather than the variant so that `main` returning a
// result prints something sensible.
impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages() {
        let err = Error::InvalidWidth { width: 0, max: 256 };
        assert_eq!(
            err.to_string(),
            "invalid bit width 0: widths must be between 1 and 256"
        );
        let err = Error::arity("add", "2 operands", 3);
        assert_eq!(err.to_string(), "`add' expects 2 operands but got 3");
        assert_eq!(format!("{err:?}"), err.to_string());
    }
}
