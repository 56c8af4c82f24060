//! Report output.
//!
//! This module handles writing analysis results to disk:
//! - Versioned JSON report schema
//! - Pretty JSON writer and reader

pub mod json;
pub mod schema;

// Re-export main functions
pub use json::{read_report, report_to_string, write_report};
pub use schema::AnalysisReport;
