//! Crate-level error type and `Result` alias for stable, structured error handling.
//! Converts underlying I/O, HTTP, CSV, JSON, XML, glob and archive errors, and provides
//! semantic variants for argument validation and per-item processing failures.
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("XNAT request {uri} failed with status {status}")]
    Xnat { uri: String, status: u16 },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Invalid filter expression: {0}")]
    Regex(#[from] regex::Error),

    #[error("Invalid glob pattern: {0}")]
    Glob(#[from] glob::PatternError),

    #[error("Password prompt failed: {0}")]
    Prompt(#[from] inquire::InquireError),

    #[error("Invalid NIfTI header in {path}: {reason}")]
    Nifti { path: String, reason: String },

    #[error("Invalid argument: {arg}={value}")]
    InvalidArgument { arg: &'static str, value: String },

    #[error("Missing required argument: {arg}")]
    MissingArgument { arg: String },

    #[error("None of the projects {projects} exist or are accessible on XNAT")]
    NoAccessibleProject { projects: String },

    #[error("No repetition time mapping for scan type `{scan_type}` in project {project}")]
    MissingRepetitionTime { project: String, scan_type: String },

    #[error("Processing error: {0}")]
    Processing(String),
}

impl Error {
    pub fn nifti<P: AsRef<std::path::Path>, R: std::fmt::Display>(path: P, reason: R) -> Self {
        Error::Nifti {
            path: path.as_ref().display().to_string(),
            reason: reason.to_string(),
        }
    }
}
