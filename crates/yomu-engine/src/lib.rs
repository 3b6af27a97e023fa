#[macro_use]
extern crate log;

pub mod catalog;
pub mod config;
pub mod date;
pub mod engine;
pub mod fetch;
pub mod manager;
pub mod numbering;
pub mod prelude;
pub mod reconcile;
pub mod scanlator;
