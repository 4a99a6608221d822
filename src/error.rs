// error.rs

use thiserror::Error;

/// Failure of a history expansion. Either variant aborts the whole line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpansionError {
    /// A trigger character was followed by text that is not a designator.
    #[error("{0}: bad event designator")]
    MalformedDesignator(String),
    /// The designator was well formed but nothing in history matched it.
    #[error("{0}: event not found")]
    HistoryReferenceNotFound(String),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ExpansionErrorKind {
    MalformedDesignator,
    HistoryReferenceNotFound,
}

impl ExpansionError {
    pub fn kind(&self) -> ExpansionErrorKind {
        match self {
            ExpansionError::MalformedDesignator(_) => ExpansionErrorKind::MalformedDesignator,
            ExpansionError::HistoryReferenceNotFound(_) => {
                ExpansionErrorKind::HistoryReferenceNotFound
            }
        }
    }

    /// The designator text (or a short description) the error refers to.
    pub fn detail(&self) -> &str {
        match self {
            ExpansionError::MalformedDesignator(d) | ExpansionError::HistoryReferenceNotFound(d) => d,
        }
    }

    pub(crate) fn not_found(designator: impl Into<String>) -> Self {
        ExpansionError::HistoryReferenceNotFound(designator.into())
    }

    pub(crate) fn malformed(designator: impl Into<String>) -> Self {
        ExpansionError::MalformedDesignator(designator.into())
    }
}
