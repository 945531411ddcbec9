//! Command Line Interface (CLI) layer of `xnatdownload`.
//!
//! This module defines argument parsing (`args`), option-validation errors
//! (`errors`) and the orchestration logic (`runner`): banner, option checks,
//! logging, credentials, download and the optional BIDS conversion. It wires
//! user-provided options to the library functionality exposed via `xnatdl::api`.
pub mod args;
pub mod errors;
pub mod runner;

pub use args::CliArgs;
pub use runner::run;
