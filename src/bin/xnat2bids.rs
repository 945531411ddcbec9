//! xnat2bids: convert an existing xnatdownload tree of a project into BIDS.
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use xnatdl::api;
use xnatdl::io::{XnatClient, XnatCredentials};

#[derive(Parser, Debug)]
#[command(
    name = "xnat2bids",
    version,
    about = "Convert downloaded XNAT projects to BIDS",
    arg_required_else_help = true
)]
struct Args {
    /// XNAT host URL
    #[arg(long, env = "XNAT_HOST")]
    host: Option<String>,

    /// XNAT user name
    #[arg(short = 'u', long, env = "XNAT_USER")]
    username: Option<String>,

    /// Project ID(s), comma separated
    #[arg(short = 'p', long)]
    project: String,

    /// Directory of the existing download
    #[arg(short = 'd', long)]
    directory: PathBuf,

    /// Output directory of the BIDS conversion
    #[arg(long = "bids_dir")]
    bids_dir: PathBuf,

    /// Write the log to this file instead of stderr
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Verbose (debug) logging
    #[arg(long, default_value_t = false)]
    debug: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    xnatdl::logging::init(args.output.as_deref(), args.debug)?;

    if !args.directory.is_dir() {
        return Err(format!("download directory {:?} does not exist", args.directory).into());
    }

    let credentials = XnatCredentials::resolve(args.host.as_deref(), args.username.as_deref())?;
    let client = XnatClient::connect(&credentials)?;

    let mut failures = 0;
    for project in args.project.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match api::convert_to_bids(&client, &args.directory, &args.bids_dir, project) {
            Ok(report) => info!(
                "{}: {} subject(s), {} session(s), {} file(s) converted, {} skipped, {} header(s) rewritten",
                project,
                report.subjects,
                report.sessions,
                report.converted,
                report.skipped,
                report.headers_rewritten
            ),
            Err(e) => {
                error!("BIDS conversion of {} failed: {}", project, e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        return Err(format!("{} project(s) failed", failures).into());
    }
    Ok(())
}
