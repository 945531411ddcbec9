use std::path::PathBuf;

use thiserror::Error;

/// Application-specific errors for the CLI
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Missing required argument: {arg}")]
    MissingArgument { arg: String },

    #[error("Input CSV file {path:?} does not exist")]
    MissingCsv { path: PathBuf },

    #[error("Directory {path:?} does not exist; --update needs a previous download")]
    NothingToUpdate { path: PathBuf },

    #[error("--overwrite and --update cannot be used together")]
    OverwriteAndUpdate,

    #[error("{what} requested but no resources given: use {flag}")]
    MissingResources { what: &'static str, flag: &'static str },

    #[error("Nothing to download: use -s/--scantype, -a/--assessortype, --WOS, --WOP, --selectionS or --selectionP")]
    NothingSelected,

    #[error("{flag} given without the matching type filter ({types})")]
    ResourcesWithoutTypes {
        flag: &'static str,
        types: &'static str,
    },
}
