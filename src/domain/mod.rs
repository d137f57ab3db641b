//! Domain layer for Convention Guard
//!
//! CDD Principle: Domain Model - Pure vocabulary of convention enforcement
//! - Diagnostics, severities, run reports and the error taxonomy
//! - Independent of file systems, parsers and output formats

pub mod diagnostics;

// Re-export main domain types for convenience
pub use diagnostics::*;
