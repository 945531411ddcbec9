use clap::Parser;
use std::path::PathBuf;

const LONG_ABOUT: &str = "\
Download scans and assessor resources from XNAT into a local directory.

Objects are selected by project, then filtered by subject, session, scan type,
quality, assessor type and status. Filters are comma separated lists of shell
globs (or regular expressions with --fullRegex); `all` selects everything.
A download_report.csv is kept in the directory so that later runs only fetch
what is missing (or what changed on XNAT with --update).

Examples:
  xnatdownload -p PID -d /tmp/dl -s T1,fMRI* --rs NIFTI
  xnatdownload -p PID -d /tmp/dl -a fMRIQA --status COMPLETE --ra PDF
  xnatdownload -d /tmp/dl -c objects.csv --rs NIFTI
  xnatdownload -p PID -d /tmp/dl -s all --rs NIFTI -b --bids_dir /tmp/bids";

#[derive(Parser, Debug)]
#[command(
    name = "xnatdownload",
    version,
    about = "Download XNAT scans and assessors",
    long_about = LONG_ABOUT,
    arg_required_else_help = true
)]
pub struct CliArgs {
    /// XNAT host URL
    #[arg(long, env = "XNAT_HOST")]
    pub host: Option<String>,

    /// XNAT user name
    #[arg(short = 'u', long, env = "XNAT_USER")]
    pub username: Option<String>,

    /// Project ID(s) on XNAT, comma separated
    #[arg(short = 'p', long)]
    pub project: Option<String>,

    /// Local directory to download into
    #[arg(short = 'd', long)]
    pub directory: Option<PathBuf>,

    /// Put every resource directly in the directory, without sub-folders
    #[arg(short = 'D', long = "oneDirectory", default_value_t = false)]
    pub one_directory: bool,

    /// Subject label(s) to keep
    #[arg(long = "subj")]
    pub subjects: Option<String>,

    /// Session label(s) to keep
    #[arg(long = "sess")]
    pub sessions: Option<String>,

    /// Scan type(s) to download
    #[arg(short = 's', long = "scantype")]
    pub scan_types: Option<String>,

    /// Assessor/process type(s) to download
    #[arg(short = 'a', long = "assessortype")]
    pub assessor_types: Option<String>,

    /// Scan type(s) to exclude
    #[arg(long = "WOS")]
    pub without_scan_types: Option<String>,

    /// Assessor type(s) to exclude
    #[arg(long = "WOP")]
    pub without_assessor_types: Option<String>,

    /// Scan quality values to keep (usable, questionable, unusable)
    #[arg(long)]
    pub quality: Option<String>,

    /// Assessor procstatus values to keep
    #[arg(long)]
    pub status: Option<String>,

    /// Assessor QC status values to keep
    #[arg(long)]
    pub qcstatus: Option<String>,

    /// CSV listing the objects to download (report column layout)
    #[arg(short = 'c', long = "csvfile")]
    pub csv_file: Option<PathBuf>,

    /// Scan resource(s) to download
    #[arg(long = "rs")]
    pub scan_resources: Option<String>,

    /// Assessor resource(s) to download
    #[arg(long = "ra")]
    pub assessor_resources: Option<String>,

    /// Single scan to download: project-x-subject-x-session-x-scanID
    #[arg(long = "selectionS")]
    pub selection_scan: Option<String>,

    /// Single assessor label to download
    #[arg(long = "selectionP")]
    pub selection_assessor: Option<String>,

    /// Download everything again, replacing local copies
    #[arg(long, default_value_t = false)]
    pub overwrite: bool,

    /// Re-download resources modified on XNAT since the last download
    #[arg(long, default_value_t = false)]
    pub update: bool,

    /// Treat filters as regular expressions instead of shell globs
    #[arg(long = "fullRegex", default_value_t = false)]
    pub full_regex: bool,

    /// Write the log to this file instead of stderr
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Do not write download_report.csv
    #[arg(short = 'i', long = "ignore", default_value_t = false)]
    pub ignore_report: bool,

    /// Convert the downloaded project to BIDS afterwards
    #[arg(short = 'b', long, default_value_t = false)]
    pub bids: bool,

    /// Output directory of the BIDS conversion
    #[arg(long = "bids_dir")]
    pub bids_dir: Option<PathBuf>,

    /// Verbose (debug) logging
    #[arg(long, default_value_t = false)]
    pub debug: bool,
}
