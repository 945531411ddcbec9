//! Local path construction for downloaded scans, assessors and resources.
use std::path::{Path, PathBuf};

use crate::types::{AssessorRecord, ScanRecord};

/// Separator XNAT labels are joined with in local names and report keys
pub const LABEL_SEP: &str = "-x-";

fn clean_scan_type(scan_type: &str) -> String {
    let st = scan_type.trim().replace('/', "_").replace(' ', "");
    if st.is_empty() { "UNK".to_string() } else { st }
}

fn clean_series_description(series_description: &str) -> String {
    series_description
        .trim()
        .replace('/', "_")
        .replace(' ', "")
        .replace(':', "_")
}

/// Folder name of a scan: `ID-x-type[-x-series_description]`
pub fn scan_label(scan: &ScanRecord) -> String {
    let mut label = format!("{}{}{}", scan.id, LABEL_SEP, clean_scan_type(&scan.scan_type));
    let sd = clean_series_description(&scan.series_description);
    if !sd.is_empty() {
        label.push_str(LABEL_SEP);
        label.push_str(&sd);
    }
    label
}

/// Where a scan's resources are downloaded
pub fn scan_path(directory: &Path, scan: &ScanRecord, one_dir: bool) -> PathBuf {
    if one_dir {
        return directory.to_path_buf();
    }
    directory
        .join(&scan.project_id)
        .join(&scan.subject_label)
        .join(&scan.session_label)
        .join(scan_label(scan))
}

/// Where an assessor's resources are downloaded
pub fn assessor_path(directory: &Path, assessor: &AssessorRecord, one_dir: bool) -> PathBuf {
    if one_dir {
        return directory.to_path_buf();
    }
    directory
        .join(&assessor.project_id)
        .join(&assessor.subject_label)
        .join(&assessor.session_label)
        .join(&assessor.label)
}

/// Name used for a resource in one-directory mode
pub fn one_dir_resource_label(owner_key: &str, resource: &str) -> String {
    format!("{}{}{}", owner_key, LABEL_SEP, resource)
}

/// Split a `project-x-subject-x-session-x-scan` selection
pub fn split_selection(selection: &str) -> Vec<&str> {
    selection.split(LABEL_SEP).collect()
}
