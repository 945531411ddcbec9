//! xnatdownload: download scans and assessors from XNAT, optionally followed
//! by a BIDS conversion of the downloaded projects.
//! The logic lives in `cli`; embedders should use `xnatdl::api` directly.
use std::process::ExitCode;

use clap::Parser;

mod cli;

fn main() -> ExitCode {
    let args = cli::CliArgs::parse();
    match cli::run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
