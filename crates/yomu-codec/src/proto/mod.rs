//! Schema driven decoding of protobuf-compatible binary payloads into JSON
//! records.
//!
//! Two decoders are provided. [`NativeDecoder`] compiles the schema into
//! index tables once and decodes straight from them; [`InterpretedDecoder`]
//! walks the schema by name on every step. Both produce the same records for
//! the same input.

mod interpreted;
mod native;
pub mod schema;
mod value;
pub mod wire;

use std::{str::FromStr, sync::Arc};

use serde_json::Value;
use thiserror::Error;

pub use interpreted::InterpretedDecoder;
pub use native::NativeDecoder;
pub use schema::{EnumDef, FieldDef, FieldKind, Label, MessageDef, ScalarKind, Schema};
pub use wire::{Encoder, Reader, WireType, WireValue};

/// Nesting deeper than this is rejected instead of recursing further.
pub const MAX_DEPTH: usize = 64;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("buffer truncated")]
    Truncated,
    #[error("varint overflows 64 bits")]
    VarintOverflow,
    #[error("invalid wire type {0}")]
    InvalidWireType(u8),
    #[error("invalid field number")]
    InvalidTag,
    #[error("field {field} has unexpected wire type {wire_type}")]
    WireTypeMismatch { field: String, wire_type: u8 },
    #[error("field {0} is not valid utf-8")]
    InvalidUtf8(String),
    #[error("unknown type {0}")]
    UnknownType(String),
    #[error("missing required field {0}")]
    MissingRequired(String),
    #[error("message nesting exceeds {MAX_DEPTH} levels")]
    RecursionLimit,
}

pub trait Decoder: Send + Sync {
    /// Decodes `buf` as an instance of the message type named `message`.
    fn decode(&self, message: &str, buf: &[u8]) -> Result<Value, DecodeError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DecoderKind {
    #[default]
    Native,
    Interpreted,
}

impl DecoderKind {
    pub fn build(self, schema: Schema) -> Result<Arc<dyn Decoder>, DecodeError> {
        let decoder: Arc<dyn Decoder> = match self {
            Self::Native => Arc::new(NativeDecoder::new(&schema)?),
            Self::Interpreted => Arc::new(InterpretedDecoder::new(schema)),
        };

        Ok(decoder)
    }
}

impl FromStr for DecoderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "native" => Ok(Self::Native),
            "interpreted" => Ok(Self::Interpreted),
            other => Err(format!("unknown decoder {other}")),
        }
    }
}
