use thiserror::Error;

const CONTEXT_RADIUS: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WidgetError {
    #[error("not a valid widget invocation: unexpected character at {offset} near `{context}`")]
    InvalidCharacter { offset: usize, context: String },
    #[error("not a valid widget invocation: unterminated block value at {offset} near `{context}`")]
    UnterminatedBlock { offset: usize, context: String },
    #[error("not a valid widget invocation: expected {expected}, found `{found}` at {offset} near `{context}`")]
    UnexpectedToken {
        expected: &'static str,
        found: String,
        offset: usize,
        context: String,
    },
    #[error("not a valid widget invocation: expected {expected} but the input ended near `{context}`")]
    UnexpectedEnd {
        expected: &'static str,
        offset: usize,
        context: String,
    },
    #[error("`{0}` is not a valid widget or argument name")]
    InvalidIdentifier(String),
    #[error("value of `{key}` cannot be written with {syntax} syntax")]
    Unrepresentable { key: String, syntax: &'static str },
}

impl WidgetError {
    /// Byte offset into the parsed input where the failure was detected.
    pub fn offset(&self) -> Option<usize> {
        match self {
            Self::InvalidCharacter { offset, .. }
            | Self::UnterminatedBlock { offset, .. }
            | Self::UnexpectedToken { offset, .. }
            | Self::UnexpectedEnd { offset, .. } => Some(*offset),
            Self::InvalidIdentifier(_) | Self::Unrepresentable { .. } => None,
        }
    }
}

pub type WidgetResult<T> = Result<T, WidgetError>;

/// Text surrounding `offset`, clamped to char boundaries.
pub(crate) fn context(src: &str, offset: usize) -> String {
    let mut start = offset.saturating_sub(CONTEXT_RADIUS);
    while !src.is_char_boundary(start) {
        start -= 1;
    }
    let mut end = (offset + CONTEXT_RADIUS).min(src.len());
    while !src.is_char_boundary(end) {
        end += 1;
    }
    src[start..end].to_string()
}
