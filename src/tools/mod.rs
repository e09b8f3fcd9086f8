//! Developer tooling that ships alongside the garden service: build
//! monitoring, AI security review, test reporting and pattern-based fixes.

pub mod autofix;
pub mod build_monitor;
pub mod git;
pub mod security_review;
pub mod test_summary;
