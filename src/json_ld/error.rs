use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JsonLdError {
    /// Malformed input document, context or frame. `code` is the JSON-LD
    /// error code, `message` is part of the displayed text.
    #[error("Invalid JSON-LD syntax; {message}")]
    Syntax { code: &'static str, message: String },

    #[error("Dereferencing a URL did not result in a valid JSON-LD context: {url}")]
    LoadingRemoteContext { url: String },

    #[error("Invalid JSON-LD frame; {message}")]
    InvalidFrame { message: String },
}

impl JsonLdError {
    pub fn code(&self) -> &'static str {
        match self {
            JsonLdError::Syntax { code, .. } => code,
            JsonLdError::LoadingRemoteContext { .. } => "loading remote context failed",
            JsonLdError::InvalidFrame { .. } => "invalid frame",
        }
    }
}

pub type Result<T> = std::result::Result<T, JsonLdError>;

/// Return early with [`JsonLdError::Syntax`].
macro_rules! syntax_error {
    ($code:literal, $($arg:tt)+) => {
        return Err($crate::json_ld::JsonLdError::Syntax {
            code: $code,
            message: format!($($arg)+),
        })
    };
}

pub(crate) use syntax_error;
