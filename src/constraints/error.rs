use thiserror::Error;

/// Errors that can occur while building a constraint list.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConstraintError {
    #[error("constraint list must have at least one item")]
    Empty,
}
