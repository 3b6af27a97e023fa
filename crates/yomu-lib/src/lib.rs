pub mod adapter;
pub mod error;
pub mod http;
pub mod models;
pub mod prelude;

/// This is used to ensure both engine and adapters use the same version
pub static LIB_VERSION: &str = env!("CARGO_PKG_VERSION");
