use serde_derive::{Deserialize, Serialize};
use thiserror::Error;

/// Which side of the factorization a least squares solve belonged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Pass {
    Users,
    Items,
}

impl std::fmt::Display for Pass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Pass::Users => write!(f, "user"),
            Pass::Items => write!(f, "item"),
        }
    }
}

/// Coarse classification of an [`ImplicitError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad matrices, bad parameters or unknown identifiers. Surfaced to the caller as is.
    Input,
    /// A regularized least squares subproblem could not be solved.
    Numerical,
    /// No user in an evaluation had a candidate set with both label classes.
    EvaluationDegenerate,
}

#[derive(Debug, Error)]
pub enum ImplicitError {
    #[error("interaction at ({row}, {col}) is negative: {value}")]
    NegativeInteraction { row: usize, col: usize, value: f64 },

    #[error("interaction at ({row}, {col}) is not finite")]
    NonFiniteInteraction { row: usize, col: usize },

    #[error("coordinate ({row}, {col}) is outside of a {n_rows}x{n_cols} matrix")]
    OutOfBounds {
        row: usize,
        col: usize,
        n_rows: usize,
        n_cols: usize,
    },

    #[error("shape mismatch for {what}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("unknown user identifier {0}")]
    UnknownUser(String),

    #[error("unknown item identifier {0}")]
    UnknownItem(String),

    #[error("singular system while solving {pass} {index}")]
    SingularSystem { pass: Pass, index: usize },

    #[error("every evaluated user had a single label class ({skipped} users skipped)")]
    EvaluationDegenerate { skipped: usize },
}

impl ImplicitError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ImplicitError::SingularSystem { .. } => ErrorKind::Numerical,
            ImplicitError::EvaluationDegenerate { .. } => ErrorKind::EvaluationDegenerate,
            _ => ErrorKind::Input,
        }
    }

    pub(crate) fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        ImplicitError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ImplicitError>;
