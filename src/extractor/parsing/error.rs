//! Parsing error types.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ParseError {
    #[error("required field '{field}' not found in {context}")]
    MissingField {
        field: &'static str,
        context: &'static str,
    },

    #[error("malformed value for '{field}': {value}")]
    MalformedValue { field: &'static str, value: String },
}

pub type ParseResult<T> = Result<T, ParseError>;
