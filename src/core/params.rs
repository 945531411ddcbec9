//! Typed download parameters: what to list, filter and fetch, and how the
//! local tree and report are handled.
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::Selection;

/// Download parameters, built from the CLI and loggable as JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadParams {
    /// Local download root
    pub directory: PathBuf,
    pub projects: Vec<String>,
    pub subjects: Option<Selection>,
    pub sessions: Option<Selection>,

    pub scan_types: Option<Selection>,
    pub without_scan_types: Option<Selection>,
    pub qualities: Option<Selection>,
    pub scan_resources: Option<Selection>,

    pub assessor_types: Option<Selection>,
    pub without_assessor_types: Option<Selection>,
    pub proc_status: Option<Selection>,
    pub qc_status: Option<Selection>,
    pub assessor_resources: Option<Selection>,

    /// Read the objects to download from this CSV instead of listing XNAT
    pub csv_file: Option<PathBuf>,
    /// `project-x-subject-x-session-x-scan` of a single scan to download
    pub selection_scan: Option<String>,
    /// Label of a single assessor to download
    pub selection_assessor: Option<String>,

    /// Put every resource directly in `directory` (no sub-folders)
    pub one_dir: bool,
    pub overwrite: bool,
    pub update: bool,
    /// Treat filters as regular expressions instead of shell globs
    pub full_regex: bool,
    /// Do not write `download_report.csv`
    pub ignore_report: bool,

    /// Run the BIDS conversion into this directory after downloading
    pub bids_dir: Option<PathBuf>,
}

impl Default for DownloadParams {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            projects: Vec::new(),
            subjects: None,
            sessions: None,
            scan_types: None,
            without_scan_types: None,
            qualities: None,
            scan_resources: None,
            assessor_types: None,
            without_assessor_types: None,
            proc_status: None,
            qc_status: None,
            assessor_resources: None,
            csv_file: None,
            selection_scan: None,
            selection_assessor: None,
            one_dir: false,
            overwrite: false,
            update: false,
            full_regex: false,
            ignore_report: false,
            bids_dir: None,
        }
    }
}

impl DownloadParams {
    pub fn has_selection(&self) -> bool {
        self.selection_scan.is_some() || self.selection_assessor.is_some()
    }

    /// Scans are listed only when a type filter asks for them
    pub fn wants_scans(&self) -> bool {
        self.scan_types.is_some() || self.without_scan_types.is_some()
    }

    pub fn wants_assessors(&self) -> bool {
        self.assessor_types.is_some() || self.without_assessor_types.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclusion_filters_select_object_kinds() {
        let params = DownloadParams {
            without_scan_types: Some(Selection::Only(vec!["Localizer".into()])),
            ..Default::default()
        };
        assert!(params.wants_scans());
        assert!(!params.wants_assessors());
        assert!(!params.has_selection());
    }
}
