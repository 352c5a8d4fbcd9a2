//! Error types

pub mod error;

pub use error::{ConfigError, NavError, NavResult};
