//! Shared utilities for the orchestration core

pub mod error;
pub mod logging;

pub use error::{ForgeError, Result};
pub use logging::init_tracing;
