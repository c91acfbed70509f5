use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, QrShareError>;

#[derive(Debug, Error)]
pub enum QrShareError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("failed to decode {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },
    #[error("payload is not a base-10 non-negative integer: {0:?}")]
    InvalidPayload(String),
    #[error("qr encoding failed: {0}")]
    Encode(String),
    #[error("image error: {0}")]
    Image(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Why a single image could not be turned back into a payload.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("image could not be read: {0}")]
    Unreadable(String),
    #[error("no qr symbol found")]
    NoSymbol,
    #[error("expected one qr symbol, found {0}")]
    MultipleSymbols(usize),
    #[error("malformed qr symbol: {0}")]
    Malformed(String),
}

impl QrShareError {
    pub(crate) fn decode(path: impl Into<PathBuf>, source: DecodeError) -> Self {
        QrShareError::Decode {
            path: path.into(),
            source,
        }
    }
}
