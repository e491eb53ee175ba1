//! Error taxonomy for the codec.
//!
//! Three failure kinds surface to callers as typed results: lexical,
//! syntactic, and semantic. All are fatal to the call that produced them;
//! nothing is retried. The printer raises no errors.

use thiserror::Error;

use crate::token::Position;

/// Lexical failure, carrying the offending source position.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("unexpected character '{ch}' at {line}:{column}")]
    UnexpectedChar { ch: char, line: u32, column: u32 },

    #[error("unterminated string starting at {line}:{column}")]
    UnterminatedString { line: u32, column: u32 },

    /// Only `\"` and `\\` are legal escapes inside strings.
    #[error("invalid escape '\\{ch}' in string at {line}:{column}")]
    InvalidEscape { ch: char, line: u32, column: u32 },
}

/// Structural failure from the generic parser.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("syntax error at {position}: expected {expected}, found {found}")]
pub struct SyntaxError {
    pub position: Position,
    pub expected: &'static str,
    pub found: String,
}

/// Semantic failure while mapping the generic tree to a document.
///
/// Unknown sections never produce one of these (they are skipped); known
/// sections with a malformed shape do.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MappingError {
    #[error("expected (onboarding-request ...) at top level")]
    NotARequest,

    #[error("missing required field {field} in {context}")]
    MissingField {
        context: &'static str,
        field: &'static str,
    },

    #[error("invalid version {text:?} in :meta")]
    InvalidVersion { text: String },

    #[error("invalid {field} timestamp {text:?}: not RFC 3339")]
    InvalidTimestamp { field: &'static str, text: String },

    #[error("updated-at {updated} precedes created-at {created}")]
    TimestampOrder { created: String, updated: String },

    #[error("duplicate {kind} id {id:?}")]
    DuplicateId { kind: &'static str, id: String },

    #[error("lifecycle states list is empty")]
    EmptyStates,

    #[error("initial state {initial:?} is not a declared state")]
    UnknownInitial { initial: String },
}

/// Umbrella error returned by [`crate::parse`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Mapping(#[from] MappingError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Position;

    #[test]
    fn lex_error_display_carries_position() {
        let err = LexError::UnexpectedChar {
            ch: '@',
            line: 3,
            column: 7,
        };
        assert_eq!(err.to_string(), "unexpected character '@' at 3:7");
    }

    #[test]
    fn syntax_error_display() {
        let err = SyntaxError {
            position: Position::new(1, 12),
            expected: "')'",
            found: "end of input".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "syntax error at 1:12: expected ')', found end of input"
        );
    }

    #[test]
    fn parse_error_wraps_transparently() {
        let err: ParseError = MappingError::NotARequest.into();
        assert_eq!(
            err.to_string(),
            "expected (onboarding-request ...) at top level"
        );
    }
}
