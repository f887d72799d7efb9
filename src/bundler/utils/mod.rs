//! Shared helpers for bundlers.

pub mod fs;
pub mod process;
