#![forbid(unsafe_code)]

pub mod config;
pub mod error;

pub use config::MinissConfig;
pub use error::{MinissError, MinissResult};
