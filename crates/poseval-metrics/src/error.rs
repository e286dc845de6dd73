use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvalError {
    /// The requested action is not part of the fixed evaluation vocabulary.
    #[error("unrecognized action: {0}")]
    UnrecognizedAction(String),
}
