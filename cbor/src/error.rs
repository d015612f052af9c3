use crate::header::{HeaderFault, Major};
use alloc::{boxed::Box, string::String};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Malformed item header: {0}")]
    MalformedHeader(#[from] HeaderFault),

    #[error("Not enough data for encoded value")]
    UnexpectedEof,

    #[error(transparent)]
    InvalidUtf8(#[from] core::str::Utf8Error),

    #[error("Indefinite-length string contains a chunk of type {0}")]
    InvalidChunk(Major),

    #[error("Break stop code outside of an indefinite-length item")]
    UnexpectedBreak,

    #[error("Maximum nesting depth {0} exceeded")]
    DepthExceeded(u32),

    #[error("Map contains duplicate keys")]
    DuplicateKey,

    #[error("Non-canonical input: {0}")]
    NonCanonicalInput(&'static str),

    #[error("Indefinite-length items cannot be encoded canonically")]
    IndefiniteLength,

    #[error("Definite-length sequence declared {declared} items, but {actual} were added")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("Invalid simple value {0}")]
    InvalidSimpleValue(u8),

    #[error("Encoded output would exceed {0} bytes")]
    BufferOverflow(usize),

    #[error("Missing field '{0}'")]
    MissingField(&'static str),

    #[error("Unknown field '{0}'")]
    UnknownField(String),

    #[error("Incorrect type, expecting {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Value out of range for {0}")]
    OutOfRange(&'static str),

    #[error("Unknown variant {0}")]
    UnknownVariant(i128),

    #[error("{0} bytes of trailing data after the encoded item")]
    TrailingData(usize),

    #[error("Failed to parse {field}: {source}")]
    InvalidField {
        field: &'static str,
        source: Box<Error>,
    },
}

impl Error {
    /// The innermost error, looking through `InvalidField` wrappers.
    pub fn root_cause(&self) -> &Error {
        match self {
            Self::InvalidField { source, .. } => source.root_cause(),
            e => e,
        }
    }
}

/// Attach the name of the field being processed to an error.
pub trait CaptureFieldErr<T> {
    fn map_field_err(self, field: &'static str) -> Result<T, Error>;
}

impl<T> CaptureFieldErr<T> for Result<T, Error> {
    fn map_field_err(self, field: &'static str) -> Result<T, Error> {
        self.map_err(|e| Error::InvalidField {
            field,
            source: Box::new(e),
        })
    }
}
