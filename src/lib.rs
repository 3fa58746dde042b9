//! Testloom library crate
//!
//! Exposes the pipeline stages so benchmarks and external tooling can
//! exercise them without going through CLI startup.

pub mod autofix;
pub mod block;
pub mod config;
pub mod dedupe;
pub mod driver;
pub mod error;
pub mod extract;
pub mod language;
pub mod llm;
pub mod rebuild;
pub mod scan;
pub mod util;
pub mod validate;
pub mod variation;
