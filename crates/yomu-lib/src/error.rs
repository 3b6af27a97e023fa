use thiserror::Error;
use yomu_codec::{CodecError, DecodeError};

#[derive(Debug, Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(#[source] anyhow::Error),
    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },
    #[error("extraction error: {0}")]
    Extraction(#[source] anyhow::Error),
    #[error("protocol decode error: {0}")]
    ProtocolDecode(#[from] DecodeError),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("no source with id {0}")]
    UnknownSource(i64),
}

impl Error {
    /// Classifies an error raised by adapter code. Decoder and codec failures
    /// keep their own kind; anything else is an extraction failure.
    pub fn from_adapter(err: anyhow::Error) -> Self {
        let err = match err.downcast::<DecodeError>() {
            Ok(e) => return Error::ProtocolDecode(e),
            Err(err) => err,
        };
        let err = match err.downcast::<CodecError>() {
            Ok(e) => return Error::Codec(e),
            Err(err) => err,
        };
        match err.downcast::<Error>() {
            Ok(e) => e,
            Err(err) => Error::Extraction(err),
        }
    }

    pub fn extraction(msg: impl std::fmt::Display) -> Self {
        Error::Extraction(anyhow::anyhow!("{msg}"))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
