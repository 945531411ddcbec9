//! Resource download orchestration.
//!
//! `Downloader` fetches the resources of scans and assessors into their local
//! folders, decides whether a resource is fresh enough to be skipped, and
//! appends one report row per downloaded resource.
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::{debug, error, info, warn};

use crate::core::paths::one_dir_resource_label;
use crate::core::report::ReportWriter;
use crate::error::Result;
use crate::io::archive::extract_resource_zip;
use crate::io::xnat::{RemoteFile, ResourceOwner, ResourceRef, XnatApi};
use crate::types::{AssessorRecord, ScanRecord, Selection};

/// Resource label of Philips PAR/REC data, fetched as its `PAR` and `REC` parts
pub const PARREC: &str = "PARREC";
const PARREC_PARTS: [&str; 2] = ["PAR", "REC"];
const PARREC_LABEL: &str = "file";

/// Counters of a download run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    pub downloaded: usize,
    pub up_to_date: usize,
    pub missing: usize,
    pub errors: usize,
    /// Projects an object was processed for
    pub projects: BTreeSet<String>,
}

/// `YYYYMMDDHHMMSS` of a local time
pub fn compact_local(time: &DateTime<Local>) -> i64 {
    time.format("%Y%m%d%H%M%S")
        .to_string()
        .parse()
        .unwrap_or_default()
}

/// Modification time of a local file or folder as `YYYYMMDDHHMMSS`
pub fn local_timestamp(path: &Path) -> Result<i64> {
    let modified: DateTime<Local> = fs::metadata(path)?.modified()?.into();
    Ok(compact_local(&modified))
}

fn is_empty_dir(path: &Path) -> bool {
    path.is_dir()
        && fs::read_dir(path)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false)
}

/// Resource labels to fetch for an object.
///
/// `All` resolves to the labels known from the listing, or asks XNAT when the
/// listing carried none.
pub fn resolve_resources<A: XnatApi + ?Sized>(
    api: &A,
    owner: &ResourceOwner,
    known: &[String],
    selection: &Selection,
) -> Result<Vec<String>> {
    match selection {
        Selection::Only(values) => Ok(values.clone()),
        Selection::All if !known.is_empty() => Ok(known.to_vec()),
        Selection::All => api.resource_labels(owner),
    }
}

pub struct Downloader<'a, A: XnatApi + ?Sized> {
    api: &'a A,
    one_dir: bool,
    /// Update mode: local copies older than the remote resource are re-fetched
    update: bool,
    report: Option<ReportWriter>,
    summary: DownloadSummary,
}

impl<'a, A: XnatApi + ?Sized> Downloader<'a, A> {
    pub fn new(api: &'a A, one_dir: bool) -> Self {
        Self {
            api,
            one_dir,
            update: false,
            report: None,
            summary: DownloadSummary::default(),
        }
    }

    pub fn with_report(mut self, report: ReportWriter) -> Self {
        self.report = Some(report);
        self
    }

    pub fn with_update(mut self, update: bool) -> Self {
        self.update = update;
        self
    }

    pub fn summary(&self) -> &DownloadSummary {
        &self.summary
    }

    pub fn into_summary(self) -> DownloadSummary {
        self.summary
    }

    /// Download the requested resources of one scan into `directory`.
    /// `row` is the report prefix of the scan; `None` disables report rows.
    pub fn download_scan(
        &mut self,
        directory: &Path,
        scan: &ScanRecord,
        resources: &Selection,
        row: Option<&[String]>,
    ) -> Result<()> {
        if self
            .api
            .scan(&scan.project_id, &scan.subject_label, &scan.session_label, &scan.id)?
            .is_none()
        {
            warn!("No scan with the ID given: {}", scan.report_key());
            self.summary.missing += 1;
            return Ok(());
        }
        self.summary.projects.insert(scan.project_id.clone());

        let owner = ResourceOwner::of_scan(scan);
        let labels = resolve_resources(self.api, &owner, &scan.resources, resources)?;
        for label in labels {
            if label == PARREC {
                let parrec_dir = directory.join(PARREC);
                fs::create_dir_all(&parrec_dir)?;
                for part in PARREC_PARTS {
                    self.download_resource(
                        &parrec_dir,
                        &owner.resource(part),
                        true,
                        PARREC_LABEL,
                        row,
                    );
                }
            } else {
                let local_label = one_dir_resource_label(&scan.report_key(), &label);
                self.download_resource(
                    directory,
                    &owner.resource(&label),
                    self.one_dir,
                    &local_label,
                    row,
                );
            }
        }
        Ok(())
    }

    /// Download the requested output resources of one assessor into `directory`
    pub fn download_assessor(
        &mut self,
        directory: &Path,
        assessor: &AssessorRecord,
        resources: &Selection,
        row: Option<&[String]>,
    ) -> Result<()> {
        if self
            .api
            .assessor(
                &assessor.project_id,
                &assessor.subject_label,
                &assessor.session_label,
                &assessor.label,
            )?
            .is_none()
        {
            warn!("No assessor with the label given: {}", assessor.label);
            self.summary.missing += 1;
            return Ok(());
        }
        self.summary.projects.insert(assessor.project_id.clone());

        let owner = ResourceOwner::of_assessor(assessor);
        let labels = resolve_resources(self.api, &owner, &assessor.resources, resources)?;
        for label in labels {
            let local_label = one_dir_resource_label(&assessor.label, &label);
            self.download_resource(
                directory,
                &owner.resource(&label),
                self.one_dir,
                &local_label,
                row,
            );
        }
        Ok(())
    }

    /// Download one resource; failures are logged and counted, not propagated
    fn download_resource(
        &mut self,
        directory: &Path,
        resource: &ResourceRef,
        one_dir: bool,
        label: &str,
        row: Option<&[String]>,
    ) {
        let result = match self.api.resource_files(resource) {
            Ok(None) => {
                warn!("Resource {} not found for {}", resource.label, resource.owner.uri());
                self.summary.missing += 1;
                return;
            }
            Ok(Some(files)) if files.is_empty() => {
                error!("Resource {} of {} has no files", resource.label, resource.owner.uri());
                self.summary.missing += 1;
                return;
            }
            Ok(Some(files)) => {
                let row = row.map(<[String]>::to_vec);
                if one_dir {
                    self.one_dir_download(directory, resource, label, &files, row)
                } else {
                    self.default_download(directory, resource, &files, row)
                }
            }
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            error!("Failed to download {}: {}", resource.uri(), e);
            self.summary.errors += 1;
        }
    }

    fn one_dir_download(
        &mut self,
        directory: &Path,
        resource: &ResourceRef,
        label: &str,
        files: &[RemoteFile],
        row: Option<Vec<String>>,
    ) -> Result<()> {
        let target = if files.len() > 1 {
            directory.join(label)
        } else {
            directory.join(format!("{}__{}", label, files[0].name))
        };
        if !self.needs_download(resource, &target)? {
            info!("  -> {} up to date, skipped.", target.display());
            self.summary.up_to_date += 1;
            return Ok(());
        }

        if files.len() > 1 {
            fs::create_dir_all(directory)?;
            let staging = tempfile::Builder::new()
                .prefix(".xnatdl-")
                .tempdir_in(directory)?;
            self.fetch_files(resource, files, staging.path())?;
            if target.exists() {
                fs::remove_dir_all(&target)?;
            }
            fs::rename(staging.path().join(&resource.label), &target)?;
        } else {
            info!("  -> downloading {}", target.display());
            self.api.download_file(&files[0], &target)?;
        }
        self.record(row, &resource.label, &target)
    }

    fn default_download(
        &mut self,
        directory: &Path,
        resource: &ResourceRef,
        files: &[RemoteFile],
        row: Option<Vec<String>>,
    ) -> Result<()> {
        let target = directory.join(&resource.label);
        if !self.needs_download(resource, &target)? {
            info!("  -> {} up to date, skipped.", target.display());
            self.summary.up_to_date += 1;
            return Ok(());
        }
        self.fetch_files(resource, files, directory)?;
        self.record(row, &resource.label, &target)
    }

    /// Absent, empty, or (update mode) older than the remote copy
    fn needs_download(&self, resource: &ResourceRef, target: &Path) -> Result<bool> {
        if !target.exists() || is_empty_dir(target) {
            return Ok(true);
        }
        if !self.update {
            return Ok(false);
        }
        let remote = self.api.resource_last_modified(resource)?;
        let local = local_timestamp(target)?;
        debug!("{}: remote {} local {}", resource.uri(), remote, local);
        Ok(remote > local)
    }

    /// Fetch the files of `resource` into `<directory>/<resource label>`
    fn fetch_files(
        &self,
        resource: &ResourceRef,
        files: &[RemoteFile],
        directory: &Path,
    ) -> Result<PathBuf> {
        let output_dir = directory.join(&resource.label);
        fs::create_dir_all(&output_dir)?;

        if files.len() > 1 {
            info!(
                "  -> downloading {} files of {} as a zip archive",
                files.len(),
                resource.label
            );
            let archive = tempfile::Builder::new()
                .suffix(".zip")
                .tempfile_in(directory)?;
            self.api.download_resource_zip(resource, archive.path())?;
            extract_resource_zip(archive.path(), &output_dir)?;
        } else {
            let file = &files[0];
            let dest = output_dir.join(&file.name);
            info!("  -> downloading {}", dest.display());
            self.api.download_file(file, &dest)?;
            if file.name.to_ascii_lowercase().ends_with(".zip") {
                extract_resource_zip(&dest, &output_dir)?;
                fs::remove_file(&dest)?;
            }
        }
        Ok(output_dir)
    }

    fn record(&mut self, row: Option<Vec<String>>, resource: &str, path: &Path) -> Result<()> {
        self.summary.downloaded += 1;
        if let (Some(mut row), Some(report)) = (row, self.report.as_mut()) {
            row.push(resource.to_string());
            row.push(path.display().to_string());
            report.write_row(&row)?;
        }
        Ok(())
    }
}
