//! JSON sidecars of converted NIfTI files and repetition time reconciliation.
use std::fs;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::core::bids::naming::stem;
use crate::error::{Error, Result};
use crate::io::nifti;

pub type Sidecar = Map<String, Value>;

/// Round to millisecond precision before comparing repetition times
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// `<stem>.json` next to the NIfTI file, or an empty object
pub fn read_source_sidecar(nifti_path: &Path) -> Result<Sidecar> {
    let name = nifti_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let json_path = nifti_path.with_file_name(format!("{}.json", stem(&name)));
    if !json_path.exists() {
        debug!("No sidecar {:?}, starting from an empty one", json_path);
        return Ok(Sidecar::new());
    }
    match serde_json::from_str(&fs::read_to_string(&json_path)?)? {
        Value::Object(map) => Ok(map),
        _ => Err(Error::Processing(format!(
            "{} does not hold a JSON object",
            json_path.display()
        ))),
    }
}

/// Where a converted file came from on XNAT
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance<'a> {
    pub filename: &'a str,
    pub uri: String,
    pub series_description: &'a str,
    pub scan_type: &'a str,
}

pub fn add_provenance(sidecar: &mut Sidecar, provenance: &Provenance<'_>) {
    sidecar.insert("XNATfilename".into(), provenance.filename.into());
    sidecar.insert("XNATProvenance".into(), provenance.uri.clone().into());
    sidecar.insert(
        "SeriesDescription".into(),
        provenance.series_description.into(),
    );
    sidecar.insert("ScanType".into(), provenance.scan_type.into());
}

/// What the reconciliation found
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrReconciliation {
    pub mapped: f64,
    pub sidecar: Option<f64>,
    pub header: f64,
    pub header_rewritten: bool,
}

/// Compare the mapped repetition time with the sidecar and the NIfTI header of
/// the copied file. A differing header is rewritten to the mapped value; the
/// sidecar always ends up with the mapped value and the task name.
pub fn reconcile_repetition_time(
    sidecar: &mut Sidecar,
    nifti_path: &Path,
    mapped: f64,
    task: &str,
) -> Result<TrReconciliation> {
    let mapped = round3(mapped);
    let sidecar_tr = sidecar
        .get("RepetitionTime")
        .and_then(Value::as_f64)
        .map(round3);
    if let Some(tr) = sidecar_tr {
        if tr != mapped {
            warn!(
                "RepetitionTime {} in the sidecar of {:?} differs from the mapped {}",
                tr, nifti_path, mapped
            );
        }
    }

    let header = round3(nifti::read_header_timing(nifti_path)?.repetition_time_seconds());
    let header_rewritten = header != mapped;
    if header_rewritten {
        warn!(
            "Header repetition time {} of {:?} differs from the mapped {}; rewriting the header",
            header, nifti_path, mapped
        );
        nifti::write_repetition_time(nifti_path, mapped)?;
    }

    sidecar.insert("RepetitionTime".into(), mapped.into());
    sidecar.insert("TaskName".into(), task.into());

    Ok(TrReconciliation {
        mapped,
        sidecar: sidecar_tr,
        header,
        header_rewritten,
    })
}

/// Pretty JSON with two-space indentation
pub fn write_sidecar(path: &Path, sidecar: &Sidecar) -> Result<()> {
    let mut text = serde_json::to_string_pretty(sidecar)?;
    text.push('\n');
    fs::write(path, text)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::nifti::tests::write_minimal_header;
    use serde_json::json;

    #[test]
    fn rounding() {
        assert_eq!(round3(2.00049), 2.0);
        assert_eq!(round3(0.7999999), 0.8);
    }

    #[test]
    fn source_sidecar_is_found_by_stem() {
        let dir = tempfile::tempdir().unwrap();
        let nii = dir.path().join("bold.nii.gz");
        fs::write(dir.path().join("bold.json"), r#"{"EchoTime": 0.03}"#).unwrap();
        let sidecar = read_source_sidecar(&nii).unwrap();
        assert_eq!(sidecar["EchoTime"], json!(0.03));
        assert!(read_source_sidecar(&dir.path().join("other.nii")).unwrap().is_empty());
    }

    #[test]
    fn mismatching_header_is_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let nii = dir.path().join("bold.nii");
        write_minimal_header(&nii, 3000.0, 16, false);

        let mut sidecar = Sidecar::new();
        sidecar.insert("RepetitionTime".into(), json!(2.5));
        let outcome = reconcile_repetition_time(&mut sidecar, &nii, 2.0, "rest").unwrap();
        assert_eq!(outcome.header, 3.0);
        assert_eq!(outcome.sidecar, Some(2.5));
        assert!(outcome.header_rewritten);
        assert_eq!(sidecar["RepetitionTime"], json!(2.0));
        assert_eq!(sidecar["TaskName"], json!("rest"));

        let timing = nifti::read_header_timing(&nii).unwrap();
        assert!((timing.pixdim4 - 2000.0).abs() < 1e-3);
    }

    #[test]
    fn matching_header_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let nii = dir.path().join("bold.nii");
        write_minimal_header(&nii, 2.0, 8, false);
        let mut sidecar = Sidecar::new();
        let outcome = reconcile_repetition_time(&mut sidecar, &nii, 2.0004, "rest").unwrap();
        assert!(!outcome.header_rewritten);
        assert_eq!(outcome.sidecar, None);
    }
}
