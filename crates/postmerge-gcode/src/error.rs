//! Error types for the G-code crate.

use thiserror::Error;

/// Failure inside the rapid-move heuristic
///
/// Never fatal: the merger copies the offending line through unchanged and turns
/// the rewriter off for the rest of the setup.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HeuristicError {
    /// An axis or feed word does not hold a plain number (macro variable, expression)
    #[error("Cannot read {letter} value '{value}'")]
    InvalidNumber {
        /// The address letter of the word.
        letter: char,
        /// The raw value text.
        value: String,
    },

    /// A feed word holds a negative value
    #[error("Negative feed rate '{value}'")]
    NegativeFeed {
        /// The raw value text.
        value: String,
    },
}
