mod common;

use std::fs;
use std::path::{Path, PathBuf};

use common::{FakeXnat, HOST, scan, write_minimal_header};
use serde_json::{Value, json};
use xnatdl::core::bids::mapping::{DATATYPE_MAPPING, REPETITION_TIME_MAPPING, TASK_MAPPING};
use xnatdl::io::nifti::read_header_timing;
use chrono::Local;
use xnatdl::{DownloadParams, Investigator, convert_downloaded, convert_to_bids, run_download};

const SECONDS: u8 = 8;
const MILLISECONDS: u8 = 16;

struct Tree {
    _dir: tempfile::TempDir,
    download: PathBuf,
    bids: PathBuf,
}

fn resource_dir(root: &Path, subject: &str, session: &str, scan_folder: &str) -> PathBuf {
    let dir = root
        .join("PID")
        .join(subject)
        .join(session)
        .join(scan_folder)
        .join("NIFTI");
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// Download tree with an anat, a func (TR 2.5 s in ms), a localizer and a dwi scan
fn tree() -> Tree {
    let dir = tempfile::tempdir().unwrap();
    let download = dir.path().join("download");
    let bids = dir.path().join("bids");

    let t1 = resource_dir(&download, "S1", "S1_MR1", "101-x-T1");
    write_minimal_header(&t1.join("t1.nii.gz"), 0.0, SECONDS, true);

    let bold = resource_dir(&download, "S1", "S1_MR1", "301-x-fMRI_rest");
    write_minimal_header(&bold.join("bold.nii.gz"), 2500.0, MILLISECONDS, true);
    fs::write(
        bold.join("bold.json"),
        r#"{"RepetitionTime": 2.5, "EchoTime": 0.03}"#,
    )
    .unwrap();

    let loc = resource_dir(&download, "S1", "S1_MR1", "401-x-Localizer");
    write_minimal_header(&loc.join("loc.nii"), 0.0, SECONDS, false);

    let dwi = resource_dir(&download, "S2", "S2_MR1", "501-x-DTI");
    write_minimal_header(&dwi.join("dti.nii.gz"), 0.0, SECONDS, true);
    fs::write(dwi.join("dti.bvec"), "0 1 0\n").unwrap();
    fs::write(dwi.join("dti.bval"), "0 1000\n").unwrap();

    Tree {
        _dir: dir,
        download,
        bids,
    }
}

fn xnat() -> FakeXnat {
    let mut xnat = FakeXnat::new().with_project("PID", &["S1", "S2"]);
    for (subject, session, id, scan_type) in [
        ("S1", "S1_MR1", "101", "T1"),
        ("S1", "S1_MR1", "301", "fMRI_rest"),
        ("S1", "S1_MR1", "401", "Localizer"),
        ("S2", "S2_MR1", "501", "DTI"),
    ] {
        xnat.scans.push(scan("PID", subject, session, id, scan_type));
    }
    xnat.pi = Some(Investigator {
        firstname: "Ada".into(),
        lastname: "Lovelace".into(),
    });
    xnat.set_project_file(
        "PID",
        REPETITION_TIME_MAPPING.0,
        REPETITION_TIME_MAPPING.1,
        json!({ "fMRI_rest": 2.0 }),
    );
    xnat.set_project_file(
        "PID",
        TASK_MAPPING.0,
        TASK_MAPPING.1,
        json!({ "PID": { "fMRI_rest": "rest" } }),
    );
    xnat
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn project_is_converted() {
    let tree = tree();
    let report = convert_to_bids(&xnat(), &tree.download, &tree.bids, "PID").unwrap();
    assert_eq!(report.subjects, 2);
    assert_eq!(report.sessions, 2);
    assert_eq!(report.converted, 5);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.headers_rewritten, 1);

    let project = tree.bids.join("PID");
    let anat = project.join("sub-01/ses-01/anat");
    assert!(anat.join("sub-01_ses-01_acq-101_T1w.nii.gz").is_file());
    let sidecar = read_json(&anat.join("sub-01_ses-01_acq-101_T1w.json"));
    assert_eq!(
        sidecar["XNATProvenance"],
        format!(
            "{}/data/projects/PID/subjects/S1/experiments/S1_MR1/scans/101",
            HOST
        )
    );
    assert_eq!(sidecar["XNATfilename"], "t1.nii.gz");
    assert_eq!(sidecar["ScanType"], "T1");

    let dwi = project.join("sub-02/ses-01/dwi");
    for ext in ["nii.gz", "bvec", "bval"] {
        assert!(dwi.join(format!("sub-02_ses-01_acq-501_run-01_dwi.{}", ext)).is_file());
    }

    // nothing is written for the localizer
    let written: Vec<_> = fs::read_dir(&anat).unwrap().collect();
    assert_eq!(written.len(), 2);

    let description = read_json(&project.join("dataset_description.json"));
    assert_eq!(description["Name"], "PID");
    assert_eq!(description["BIDSVersion"], "1.0.1");
    assert_eq!(description["DatasetDOI"], HOST);
    assert_eq!(description["Authors"], json!(["Ada Lovelace"]));
}

#[test]
fn functional_header_follows_mapped_repetition_time() {
    let tree = tree();
    convert_to_bids(&xnat(), &tree.download, &tree.bids, "PID").unwrap();

    let func = tree.bids.join("PID/sub-01/ses-01/func");
    let stem = "sub-01_ses-01_task-rest_acq-301_run-01_bold";
    let timing = read_header_timing(&func.join(format!("{}.nii.gz", stem))).unwrap();
    assert!((timing.pixdim4 - 2000.0).abs() < 1e-3);
    assert!((timing.repetition_time_seconds() - 2.0).abs() < 1e-6);

    let sidecar = read_json(&func.join(format!("{}.json", stem)));
    assert_eq!(sidecar["RepetitionTime"], 2.0);
    assert_eq!(sidecar["TaskName"], "rest");
    assert_eq!(sidecar["EchoTime"], 0.03);

    // the download stays untouched
    let source = tree
        .download
        .join("PID/S1/S1_MR1/301-x-fMRI_rest/NIFTI/bold.nii.gz");
    assert!((read_header_timing(&source).unwrap().pixdim4 - 2500.0).abs() < 1e-3);
}

#[test]
fn functional_scans_without_repetition_time_are_skipped() {
    let tree = tree();
    let mut xnat = xnat();
    xnat.project_files.clear();
    let report = convert_to_bids(&xnat, &tree.download, &tree.bids, "PID").unwrap();
    assert_eq!(report.converted, 4);
    assert_eq!(report.skipped, 2);
    assert!(!tree.bids.join("PID/sub-01/ses-01/func").exists());
}

#[test]
fn unreadable_functional_header_leaves_no_copy() {
    let tree = tree();
    let bold = tree
        .download
        .join("PID/S1/S1_MR1/301-x-fMRI_rest/NIFTI/bold.nii.gz");
    fs::write(&bold, b"not a nifti header").unwrap();

    let report = convert_to_bids(&xnat(), &tree.download, &tree.bids, "PID").unwrap();
    assert_eq!(report.converted, 4);
    assert_eq!(report.skipped, 2);
    let func = tree.bids.join("PID/sub-01/ses-01/func");
    let stem = "sub-01_ses-01_task-rest_acq-301_run-01_bold";
    assert!(!func.join(format!("{}.nii.gz", stem)).exists());
    assert!(!func.join(format!("{}.json", stem)).exists());
}

#[test]
fn datatype_mapping_overrides_the_rules() {
    let tree = tree();
    let mut xnat = xnat();
    xnat.set_project_file(
        "PID",
        DATATYPE_MAPPING.0,
        DATATYPE_MAPPING.1,
        json!({ "Localizer": "anat", "DTI": "not-a-datatype" }),
    );
    let report = convert_to_bids(&xnat, &tree.download, &tree.bids, "PID").unwrap();
    assert_eq!(report.skipped, 0);
    assert!(
        tree.bids
            .join("PID/sub-01/ses-01/anat/sub-01_ses-01_acq-401_T1w.nii")
            .is_file()
    );
    // an invalid mapped value falls back to the rules
    assert!(tree.bids.join("PID/sub-02/ses-01/dwi").is_dir());
}

#[test]
fn rerun_overwrites_previous_output() {
    let tree = tree();
    let xnat = xnat();
    convert_to_bids(&xnat, &tree.download, &tree.bids, "PID").unwrap();
    let report = convert_to_bids(&xnat, &tree.download, &tree.bids, "PID").unwrap();
    assert_eq!(report.converted, 5);
    // the copy made by the second run is rewritten again
    assert_eq!(report.headers_rewritten, 1);
}

#[test]
fn missing_project_folder_is_an_error() {
    let tree = tree();
    assert!(convert_to_bids(&xnat(), &tree.download, &tree.bids, "OTHER").is_err());
}

#[test]
fn csv_download_converts_the_downloaded_projects() {
    let dir = tempfile::tempdir().unwrap();
    let header = dir.path().join("t1.nii.gz");
    write_minimal_header(&header, 0.0, SECONDS, true);
    let content = fs::read(&header).unwrap();
    let mut xnat = xnat();
    xnat.add_scan(
        scan("PID", "S1", "S1_MR1", "101", "T1"),
        "NIFTI",
        &[("t1.nii.gz", content.as_slice())],
    );

    let csv = dir.path().join("objects.csv");
    fs::write(&csv, "scan,PID,S1,xnat:mrSessionData,S1_MR1,101,T1,,usable,NIFTI\n").unwrap();
    let params = DownloadParams {
        directory: dir.path().join("download"),
        csv_file: Some(csv),
        bids_dir: Some(dir.path().join("bids")),
        ..Default::default()
    };
    let summary = run_download(&xnat, &params, &Local::now()).unwrap();
    let reports = convert_downloaded(&xnat, &params, &summary);

    assert_eq!(reports.keys().collect::<Vec<_>>(), ["PID"]);
    assert_eq!(reports["PID"].converted, 1);
    assert!(
        dir.path()
            .join("bids/PID/sub-01/ses-01/anat/sub-01_ses-01_acq-101_T1w.nii.gz")
            .is_file()
    );
}
