use thiserror::Error;

use crate::json_ld::JsonLdError;
use crate::literal::LiteralError;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    JsonLd(#[from] JsonLdError),

    #[error(transparent)]
    Literal(#[from] LiteralError),

    /// Failure of the backing quad store.
    #[error(transparent)]
    Store(#[from] anyhow::Error),

    #[error("input is not a JSON document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Passing an IRI to del is not supported anymore. Please pass a JSON-LD document.")]
    UnsupportedIri(String),

    #[error("the frame does not name a subject with @id")]
    MissingId,

    #[error("graph worker is unavailable: {0}")]
    Worker(String),
}

pub type Result<T> = std::result::Result<T, Error>;
