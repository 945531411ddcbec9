//! The download report (`download_report.csv`) and input CSV handling.
//!
//! The report starts with a `Last download date = YYYY-MM-DD HH:MM:SS` line, then a
//! header line, then one row per downloaded resource. It is read back on the next
//! run to skip objects whose resources were already fetched.
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Local};
use tracing::{info, warn};

use crate::error::Result;
use crate::types::{AssessorRecord, ObjectType, ScanRecord};

pub const REPORT_NAME: &str = "download_report.csv";
pub const COMMAND_LINE_NAME: &str = "download_commandLine.txt";

pub const REPORT_HEADER: [&str; 11] = [
    "object_type",
    "project_id",
    "subject_label",
    "session_type",
    "session_label",
    "as_label",
    "as_type",
    "as_description",
    "quality",
    "resource",
    "fpath",
];

const LAST_DOWNLOAD_PREFIX: &str = "Last download date";

/// State recovered from a previous run's report
#[derive(Debug, Default, Clone)]
pub struct PreviousReport {
    /// `YYYYMMDDHHMMSS` of the previous run
    pub last_download: Option<i64>,
    /// scan report key -> resources downloaded
    pub scans: HashMap<String, Vec<String>>,
    /// assessor label -> resources downloaded
    pub assessors: HashMap<String, Vec<String>>,
    pub rows: Vec<Vec<String>>,
}

/// Turn `YYYY-MM-DD HH:MM:SS` (or any punctuation of it) into `YYYYMMDDHHMMSS`
pub fn compact_timestamp(date: &str) -> Option<i64> {
    let digits: String = date
        .trim()
        .chars()
        .filter(|c| !matches!(c, '-' | ':' | ' '))
        .collect();
    digits.parse().ok()
}

pub fn format_timestamp(date: &DateTime<Local>) -> String {
    date.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Read `download_report.csv` from `directory`; an absent report yields an empty state
pub fn read_report(directory: &Path) -> Result<PreviousReport> {
    let path = directory.join(REPORT_NAME);
    let mut report = PreviousReport::default();
    if !path.exists() {
        return Ok(report);
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(&path)?;
    let mut records = reader.records();

    if let Some(first) = records.next() {
        let first = first?;
        let line = first.get(0).unwrap_or_default();
        report.last_download = line
            .strip_prefix(LAST_DOWNLOAD_PREFIX)
            .and_then(|rest| rest.split('=').nth(1))
            .and_then(compact_timestamp);
        if report.last_download.is_none() {
            warn!("Could not read the last download date from {:?}", path);
        }
    }
    // header line
    records.next().transpose()?;

    for record in records {
        let row: Vec<String> = record?.iter().map(str::to_string).collect();
        if row.len() < 6 {
            continue;
        }
        let resource = row[row.len() - 2].clone();
        match ObjectType::from_column(&row[0]) {
            Some(ObjectType::Scan) => {
                let key = [row[1].as_str(), row[2].as_str(), row[4].as_str(), row[5].as_str()]
                    .join("-x-");
                report.scans.entry(key).or_default().push(resource);
            }
            Some(ObjectType::Assessor) => {
                report
                    .assessors
                    .entry(row[5].clone())
                    .or_default()
                    .push(resource);
            }
            None => continue,
        }
        report.rows.push(row);
    }
    info!("Reading {} from previous download: done.", REPORT_NAME);
    Ok(report)
}

/// True unless `key` was downloaded before with exactly the `requested` resources
pub fn need_download(
    key: &str,
    requested: &[String],
    previous: &HashMap<String, Vec<String>>,
) -> bool {
    if previous.is_empty() {
        return true;
    }
    match previous.get(key) {
        Some(done) => {
            let done: HashSet<&str> = done.iter().map(String::as_str).collect();
            let requested: HashSet<&str> = requested.iter().map(String::as_str).collect();
            done != requested
        }
        None => true,
    }
}

/// Objects listed in a user-provided CSV
#[derive(Debug, Default, Clone)]
pub struct InputList {
    pub scans: Vec<ScanRecord>,
    pub assessors: Vec<AssessorRecord>,
    /// Distinct `resource` column values of scan rows
    pub scan_resources: Vec<String>,
    pub assessor_resources: Vec<String>,
}

fn column(row: &csv::StringRecord, index: usize) -> String {
    row.get(index).unwrap_or_default().to_string()
}

/// Read the objects to download from a CSV laid out like the report columns
pub fn read_input_csv(path: &Path) -> Result<InputList> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut list = InputList::default();
    let mut scan_resources = BTreeSet::new();
    let mut assessor_resources = BTreeSet::new();
    for record in reader.records() {
        let row = record?;
        let resource = column(&row, 9);
        match ObjectType::from_column(row.get(0).unwrap_or_default()) {
            Some(ObjectType::Scan) => {
                list.scans.push(ScanRecord {
                    project_id: column(&row, 1),
                    subject_label: column(&row, 2),
                    session_type: column(&row, 3),
                    session_label: column(&row, 4),
                    id: column(&row, 5),
                    scan_type: column(&row, 6),
                    series_description: column(&row, 7),
                    quality: column(&row, 8),
                    resources: Vec::new(),
                });
                if !resource.is_empty() {
                    scan_resources.insert(resource);
                }
            }
            Some(ObjectType::Assessor) => {
                list.assessors.push(AssessorRecord {
                    project_id: column(&row, 1),
                    subject_label: column(&row, 2),
                    session_type: column(&row, 3),
                    session_label: column(&row, 4),
                    label: column(&row, 5),
                    proctype: column(&row, 6),
                    procstatus: column(&row, 7),
                    qcstatus: column(&row, 8),
                    resources: Vec::new(),
                });
                if !resource.is_empty() {
                    assessor_resources.insert(resource);
                }
            }
            None => {}
        }
    }
    list.scan_resources = scan_resources.into_iter().collect();
    list.assessor_resources = assessor_resources.into_iter().collect();
    Ok(list)
}

/// Writer for a new `download_report.csv`
pub struct ReportWriter {
    writer: csv::Writer<File>,
}

impl ReportWriter {
    /// Create the report and write the date and header lines
    pub fn create(path: &Path, now: &DateTime<Local>) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new().flexible(true).from_path(path)?;
        writer.write_record([format!(
            "{} = {}",
            LAST_DOWNLOAD_PREFIX,
            format_timestamp(now)
        )])?;
        writer.write_record(REPORT_HEADER)?;
        writer.flush()?;
        Ok(Self { writer })
    }

    pub fn write_row(&mut self, row: &[String]) -> Result<()> {
        self.writer.write_record(row)?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn compact_timestamp_strips_punctuation() {
        assert_eq!(compact_timestamp(" 2021-03-04 05:06:07"), Some(20210304050607));
        assert_eq!(compact_timestamp("not a date"), None);
    }

    #[test]
    fn identical_resource_set_is_skipped() {
        let mut previous = HashMap::new();
        previous.insert("P-x-S-x-E-x-1".to_string(), strings(&["NIFTI", "DICOM"]));
        assert!(!need_download("P-x-S-x-E-x-1", &strings(&["DICOM", "NIFTI"]), &previous));
        assert!(need_download("P-x-S-x-E-x-1", &strings(&["NIFTI"]), &previous));
        assert!(need_download("P-x-S-x-E-x-2", &strings(&["NIFTI"]), &previous));
        assert!(need_download("anything", &[], &HashMap::new()));
    }

    #[test]
    fn report_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let now = Local.with_ymd_and_hms(2022, 1, 2, 3, 4, 5).unwrap();
        {
            let mut writer = ReportWriter::create(&dir.path().join(REPORT_NAME), &now).unwrap();
            writer
                .write_row(&strings(&[
                    "scan", "P", "S", "xnat:mrSessionData", "E", "1", "T1", "MPRAGE", "usable",
                    "NIFTI", "/dl/P/S/E/1-x-T1/NIFTI",
                ]))
                .unwrap();
            writer
                .write_row(&strings(&[
                    "assessor", "P", "S", "xnat:mrSessionData", "E", "P-x-S-x-E-x-fMRIQA",
                    "fMRIQA", "COMPLETE", "Passed", "PDF", "/dl/P/S/E/P-x-S-x-E-x-fMRIQA/PDF",
                ]))
                .unwrap();
        }

        let report = read_report(dir.path()).unwrap();
        assert_eq!(report.last_download, Some(20220102030405));
        assert_eq!(report.scans["P-x-S-x-E-x-1"], strings(&["NIFTI"]));
        assert_eq!(report.assessors["P-x-S-x-E-x-fMRIQA"], strings(&["PDF"]));
        assert_eq!(report.rows.len(), 2);
    }

    #[test]
    fn missing_report_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let report = read_report(dir.path()).unwrap();
        assert!(report.last_download.is_none());
        assert!(report.rows.is_empty());
    }

    #[test]
    fn input_csv_collects_records_and_resources() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.csv");
        std::fs::write(
            &path,
            "scan,P,S,xnat:mrSessionData,E,1,T1,MPRAGE,usable,NIFTI\n\
             scan,P,S,xnat:mrSessionData,E,2\n\
             assessor,P,S,xnat:mrSessionData,E,P-x-S-x-E-x-FS,FS,COMPLETE,Passed,STATS\n\
             comment,ignored\n",
        )
        .unwrap();
        let list = read_input_csv(&path).unwrap();
        assert_eq!(list.scans.len(), 2);
        assert_eq!(list.scans[1].id, "2");
        assert!(list.scans[1].scan_type.is_empty());
        assert_eq!(list.assessors[0].proctype, "FS");
        assert_eq!(list.scan_resources, strings(&["NIFTI"]));
        assert_eq!(list.assessor_resources, strings(&["STATS"]));
    }
}
