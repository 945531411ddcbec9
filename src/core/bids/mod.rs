//! Conversion of a downloaded project tree into the BIDS layout.
//!
//! The download tree `<download>/<project>/<subject>/<session>/<scan>/<resource>/`
//! is walked in sorted order; NIfTI and gradient files are copied to
//! `<bids>/<project>/sub-XX/ses-YY/<datatype>/` under their BIDS names, NIfTI
//! files get a JSON sidecar with XNAT provenance, and functional scans have
//! their repetition time reconciled with the project mapping.
pub mod datatype;
pub mod description;
pub mod mapping;
pub mod naming;
pub mod sidecar;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{error, info, warn};

use crate::core::paths::LABEL_SEP;
use crate::error::{Error, Result};
use crate::io::xnat::{ResourceOwner, XnatApi};
use crate::types::{BidsDataType, ScanRecord};

pub use datatype::DataTypeRules;
pub use description::DatasetDescription;
pub use mapping::{BidsMappings, ProjectMapping};
pub use naming::BidsName;

/// Counters of one project conversion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BidsReport {
    pub subjects: usize,
    pub sessions: usize,
    pub converted: usize,
    pub skipped: usize,
    pub headers_rewritten: usize,
}

/// Sub-folders of `path` sorted by name, hidden ones left out
fn sorted_dirs(path: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if entry.path().is_dir() && !name.starts_with('.') {
            dirs.push((name, entry.path()));
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn sorted_files(path: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if entry.path().is_file() {
            files.push((name, entry.path()));
        }
    }
    files.sort();
    Ok(files)
}

/// Scan ID of a scan folder (`ID-x-type[-x-series]`)
pub fn scan_id_of_folder(folder: &str) -> &str {
    folder.split(LABEL_SEP).next().unwrap_or(folder)
}

/// Scan type of a scan folder, used when XNAT does not list the scan
pub fn scan_type_of_folder(folder: &str) -> &str {
    folder.split(LABEL_SEP).nth(1).unwrap_or_default()
}

/// Position of a session in the BIDS tree
#[derive(Debug, Clone, Copy)]
struct SessionSlot<'s> {
    subject: &'s str,
    session: &'s str,
    subject_index: usize,
    session_index: usize,
}

/// Conversion settings resolved for one scan
struct ScanPlan {
    datatype: BidsDataType,
    task: Option<String>,
    repetition_time: Option<f64>,
}

pub struct BidsConverter<'a, A: XnatApi + ?Sized> {
    api: &'a A,
    project: String,
    source: PathBuf,
    target: PathBuf,
    mappings: BidsMappings,
    rules: DataTypeRules,
    /// (subject, session, scan ID) -> listing record
    scans: HashMap<(String, String, String), ScanRecord>,
    report: BidsReport,
}

impl<'a, A: XnatApi + ?Sized> BidsConverter<'a, A> {
    pub fn new(api: &'a A, download_dir: &Path, bids_dir: &Path, project: &str) -> Result<Self> {
        let source = download_dir.join(project);
        if !source.is_dir() {
            return Err(Error::Processing(format!(
                "no downloaded data for project {} in {}",
                project,
                download_dir.display()
            )));
        }

        let mappings = BidsMappings::load(api, project)?;
        let scans = match api.project_scans(project) {
            Ok(scans) => scans,
            Err(e) => {
                warn!("Could not list the scans of {}: {}", project, e);
                Vec::new()
            }
        };
        let scans = scans
            .into_iter()
            .map(|s| {
                (
                    (s.subject_label.clone(), s.session_label.clone(), s.id.clone()),
                    s,
                )
            })
            .collect();

        Ok(Self {
            api,
            project: project.to_string(),
            source,
            target: bids_dir.join(project),
            mappings,
            rules: DataTypeRules::new()?,
            scans,
            report: BidsReport::default(),
        })
    }

    pub fn run(mut self) -> Result<BidsReport> {
        info!("Converting project {} to BIDS in {:?}", self.project, self.target);
        fs::create_dir_all(&self.target)?;

        for (subject_i, (subject, subject_path)) in sorted_dirs(&self.source)?.iter().enumerate() {
            self.report.subjects += 1;
            for (session_i, (session, session_path)) in sorted_dirs(subject_path)?.iter().enumerate()
            {
                self.report.sessions += 1;
                let slot = SessionSlot {
                    subject,
                    session,
                    subject_index: subject_i + 1,
                    session_index: session_i + 1,
                };
                for (folder, scan_path) in sorted_dirs(session_path)? {
                    if BidsDataType::from_folder(&folder).is_some() {
                        continue;
                    }
                    self.convert_scan(slot, &folder, &scan_path)?;
                }
            }
        }

        let pi = match self.api.project_investigator(&self.project) {
            Ok(pi) => pi,
            Err(e) => {
                warn!("Could not read the PI of {}: {}", self.project, e);
                None
            }
        };
        let path = DatasetDescription::new(&self.project, self.api.host(), pi.as_ref())
            .write(&self.target)?;
        info!("Wrote {:?}", path);
        info!(
            "BIDS conversion of {}: {} file(s) converted, {} skipped",
            self.project, self.report.converted, self.report.skipped
        );
        Ok(self.report)
    }

    fn scan_record(&self, slot: SessionSlot<'_>, folder: &str) -> ScanRecord {
        let id = scan_id_of_folder(folder);
        self.scans
            .get(&(slot.subject.to_string(), slot.session.to_string(), id.to_string()))
            .cloned()
            .unwrap_or_else(|| ScanRecord {
                project_id: self.project.clone(),
                subject_label: slot.subject.to_string(),
                session_label: slot.session.to_string(),
                id: id.to_string(),
                scan_type: scan_type_of_folder(folder).to_string(),
                ..Default::default()
            })
    }

    fn plan(&self, scan: &ScanRecord) -> Option<ScanPlan> {
        let Some(datatype) = self
            .rules
            .resolve(&scan.scan_type, self.mappings.datatype.as_ref())
        else {
            warn!(
                "Unknown BIDS datatype for scan type `{}` ({}), skipped",
                scan.scan_type,
                scan.report_key()
            );
            return None;
        };
        if datatype != BidsDataType::Func {
            return Some(ScanPlan {
                datatype,
                task: None,
                repetition_time: None,
            });
        }

        let Some(repetition_time) = self
            .mappings
            .repetition_time
            .as_ref()
            .and_then(|m| m.number(&scan.scan_type))
        else {
            let e = Error::MissingRepetitionTime {
                project: self.project.clone(),
                scan_type: scan.scan_type.clone(),
            };
            error!("{}; scan {} skipped", e, scan.report_key());
            return None;
        };
        let task = match self.mappings.task.as_ref().and_then(|m| m.text(&scan.scan_type)) {
            Some(task) => task,
            None => {
                let task = naming::alphanumeric(&scan.scan_type);
                warn!(
                    "No task mapping for scan type `{}`, using `{}`",
                    scan.scan_type, task
                );
                task
            }
        };
        Some(ScanPlan {
            datatype,
            task: Some(task),
            repetition_time: Some(repetition_time),
        })
    }

    fn convert_scan(&mut self, slot: SessionSlot<'_>, folder: &str, scan_path: &Path) -> Result<()> {
        let mut files = Vec::new();
        for (_, resource_path) in sorted_dirs(scan_path)? {
            for (name, path) in sorted_files(&resource_path)? {
                if naming::is_convertible(&name) {
                    files.push((name, path));
                }
            }
        }
        if files.is_empty() {
            return Ok(());
        }

        let scan = self.scan_record(slot, folder);
        let Some(plan) = self.plan(&scan) else {
            self.report.skipped += files.len();
            return Ok(());
        };

        let out_dir = self
            .target
            .join(naming::subject_folder(slot.subject_index))
            .join(naming::session_folder(slot.session_index))
            .join(plan.datatype.folder());
        fs::create_dir_all(&out_dir)?;

        let name = BidsName {
            subject: slot.subject_index,
            session: slot.session_index,
            datatype: plan.datatype,
            scan_id: &scan.id,
            scan_type: &scan.scan_type,
            task: plan.task.as_deref(),
        };
        for (file_name, source) in &files {
            match self.convert_file(&scan, &plan, &name, file_name, source, &out_dir) {
                Ok(()) => self.report.converted += 1,
                Err(e) => {
                    error!("Could not convert {:?}: {}", source, e);
                    self.report.skipped += 1;
                }
            }
        }
        Ok(())
    }

    /// Copy one file under its BIDS name; a failed conversion leaves no copy behind
    fn convert_file(
        &mut self,
        scan: &ScanRecord,
        plan: &ScanPlan,
        name: &BidsName<'_>,
        file_name: &str,
        source: &Path,
        out_dir: &Path,
    ) -> Result<()> {
        let dest = out_dir.join(name.file_name(file_name));
        let result = self.copy_with_sidecar(scan, plan, name, file_name, source, &dest);
        if result.is_err() && dest.exists() {
            if let Err(e) = fs::remove_file(&dest) {
                warn!("Could not remove {}: {}", dest.display(), e);
            }
        }
        result
    }

    fn copy_with_sidecar(
        &mut self,
        scan: &ScanRecord,
        plan: &ScanPlan,
        name: &BidsName<'_>,
        file_name: &str,
        source: &Path,
        dest: &Path,
    ) -> Result<()> {
        fs::copy(source, dest)?;
        info!("  {} -> {}", file_name, dest.display());
        if !naming::is_nifti(file_name) {
            return Ok(());
        }

        let mut json = sidecar::read_source_sidecar(source)?;
        sidecar::add_provenance(
            &mut json,
            &sidecar::Provenance {
                filename: file_name,
                uri: format!(
                    "{}{}",
                    self.api.host(),
                    ResourceOwner::of_scan(scan).uri()
                ),
                series_description: &scan.series_description,
                scan_type: &scan.scan_type,
            },
        );
        if let (Some(tr), Some(task)) = (plan.repetition_time, plan.task.as_deref()) {
            let outcome = sidecar::reconcile_repetition_time(&mut json, dest, tr, task)?;
            if outcome.header_rewritten {
                self.report.headers_rewritten += 1;
            }
        }
        sidecar::write_sidecar(&dest.with_file_name(format!("{}.json", name.stem())), &json)
    }
}

/// Convert the downloaded data of `project` into `<bids_dir>/<project>`
pub fn transform_to_bids<A: XnatApi + ?Sized>(
    api: &A,
    download_dir: &Path,
    bids_dir: &Path,
    project: &str,
) -> Result<BidsReport> {
    BidsConverter::new(api, download_dir, bids_dir, project)?.run()
}
