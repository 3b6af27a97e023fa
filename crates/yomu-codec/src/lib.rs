#[macro_use]
extern crate log;

pub mod cipher;
pub mod proto;

pub use cipher::CodecError;
pub use proto::DecodeError;
