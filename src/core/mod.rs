//! Core types and constants for the indoor navigation core

pub mod types;
pub mod constants;

pub use types::*;
pub use constants::*;
