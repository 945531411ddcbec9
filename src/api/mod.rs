//! High-level library API: list, filter and download the requested XNAT objects
//! (`run_download`) and convert a downloaded project to BIDS (`convert_to_bids`).
//! Prefer these entrypoints over the `core` building blocks when embedding xnatdl.
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use chrono::{DateTime, Local};
use tracing::{error, info, warn};

use crate::core::bids::{BidsReport, transform_to_bids};
use crate::core::download::{Downloader, resolve_resources};
use crate::core::filter::{
    AssessorFilters, ScanFilters, filter_assessors, filter_records, filter_scans,
    filter_subjects_sessions,
};
use crate::core::params::DownloadParams;
use crate::core::paths::{assessor_path, scan_path, split_selection};
use crate::core::report::{
    PreviousReport, REPORT_NAME, ReportWriter, need_download, read_input_csv, read_report,
};
use crate::error::{Error, Result};
use crate::io::xnat::{ResourceOwner, XnatApi};
use crate::types::{AssessorRecord, ScanRecord, Selection};

pub use crate::core::download::DownloadSummary;

/// Objects selected for download, with the state carried over from a previous run
#[derive(Debug, Clone, Default)]
pub struct Listing {
    pub scans: Vec<ScanRecord>,
    pub assessors: Vec<AssessorRecord>,
    /// Update mode: date of the previous download
    pub last_download: Option<i64>,
    /// Default mode: rows of the previous report to carry over
    pub previous_rows: Vec<Vec<String>>,
    pub from_csv: bool,
    pub scan_resources: Option<Selection>,
    pub assessor_resources: Option<Selection>,
}

/// Keep the projects that exist and have at least one subject
pub fn check_projects<A: XnatApi + ?Sized>(api: &A, projects: &[String]) -> Result<Vec<String>> {
    let mut accessible = Vec::new();
    for project in projects {
        if !api.project_exists(project)? {
            warn!("Project {} does not exist on XNAT, skipped.", project);
            continue;
        }
        if api.subject_labels(project)?.is_empty() {
            warn!("Project {} has no subjects, skipped.", project);
            continue;
        }
        accessible.push(project.clone());
    }
    if accessible.is_empty() {
        return Err(Error::NoAccessibleProject {
            projects: projects.join(","),
        });
    }
    Ok(accessible)
}

fn log_project_table(scans: &[ScanRecord], assessors: &[AssessorRecord]) {
    let mut counts: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for s in scans {
        counts.entry(&s.project_id).or_default().0 += 1;
    }
    for a in assessors {
        counts.entry(&a.project_id).or_default().1 += 1;
    }
    info!("-------------------------------------------------------------");
    info!("| {:<20} | {:<15} | {:<16} |", "Project ID", "Scans", "Assessors");
    info!("-------------------------------------------------------------");
    for (project, (n_scans, n_assessors)) in &counts {
        info!("| {:<20} | {:<15} | {:<16} |", project, n_scans, n_assessors);
    }
    info!("-------------------------------------------------------------");
}

/// Drop objects already downloaded with the same resources
fn pending_scans<A: XnatApi + ?Sized>(
    api: &A,
    scans: Vec<ScanRecord>,
    resources: Option<&Selection>,
    previous: &PreviousReport,
) -> Result<Vec<ScanRecord>> {
    let mut pending = Vec::new();
    for scan in scans {
        let key = scan.report_key();
        if let (Some(selection), true) = (resources, previous.scans.contains_key(&key)) {
            let requested =
                resolve_resources(api, &ResourceOwner::of_scan(&scan), &scan.resources, selection)?;
            if !need_download(&key, &requested, &previous.scans) {
                continue;
            }
        }
        pending.push(scan);
    }
    Ok(pending)
}

fn pending_assessors<A: XnatApi + ?Sized>(
    api: &A,
    assessors: Vec<AssessorRecord>,
    resources: Option<&Selection>,
    previous: &PreviousReport,
) -> Result<Vec<AssessorRecord>> {
    let mut pending = Vec::new();
    for assessor in assessors {
        let key = assessor.report_key();
        if let (Some(selection), true) = (resources, previous.assessors.contains_key(&key)) {
            let requested = resolve_resources(
                api,
                &ResourceOwner::of_assessor(&assessor),
                &assessor.resources,
                selection,
            )?;
            if !need_download(&key, &requested, &previous.assessors) {
                continue;
            }
        }
        pending.push(assessor);
    }
    Ok(pending)
}

/// Gather the objects to download: from the input CSV or the project listings,
/// filtered by the options and by what a previous run already fetched
pub fn list_objects<A: XnatApi + ?Sized>(api: &A, params: &DownloadParams) -> Result<Listing> {
    let mut listing = Listing {
        scan_resources: params.scan_resources.clone(),
        assessor_resources: params.assessor_resources.clone(),
        ..Default::default()
    };

    let (scans, assessors) = if let Some(csv) = &params.csv_file {
        info!("Reading the objects to download from {:?}", csv);
        let input = read_input_csv(csv)?;
        listing.from_csv = true;
        if listing.scan_resources.is_none() && !input.scan_resources.is_empty() {
            warn!("--rs not set, using the scan resources of the CSV: {}", input.scan_resources.join(","));
            listing.scan_resources = Some(Selection::Only(input.scan_resources.clone()));
        }
        if listing.assessor_resources.is_none() && !input.assessor_resources.is_empty() {
            warn!(
                "--ra not set, using the assessor resources of the CSV: {}",
                input.assessor_resources.join(",")
            );
            listing.assessor_resources = Some(Selection::Only(input.assessor_resources.clone()));
        }
        (input.scans, input.assessors)
    } else {
        let projects = check_projects(api, &params.projects)?;
        let mut scans = Vec::new();
        let mut assessors = Vec::new();
        for project in &projects {
            if params.wants_scans() {
                info!("Listing the scans of project {}...", project);
                scans.extend(api.project_scans(project)?);
            }
            if params.wants_assessors() {
                info!("Listing the assessors of project {}...", project);
                assessors.extend(api.project_assessors(project)?);
            }
        }
        (scans, assessors)
    };

    let scans = filter_scans(
        scans,
        &ScanFilters {
            types: params.scan_types.clone(),
            without: params.without_scan_types.clone(),
            qualities: params.qualities.clone(),
        },
        listing.from_csv,
        params.full_regex,
    )?;
    let scans = filter_subjects_sessions(
        scans,
        |s| &s.subject_label,
        |s| &s.session_label,
        params.subjects.as_ref(),
        params.sessions.as_ref(),
        params.full_regex,
    )?;
    let assessors = filter_assessors(
        assessors,
        &AssessorFilters {
            proctypes: params.assessor_types.clone(),
            without: params.without_assessor_types.clone(),
            procstatus: params.proc_status.clone(),
            qcstatus: params.qc_status.clone(),
        },
        listing.from_csv,
        params.full_regex,
    )?;
    let assessors = filter_subjects_sessions(
        assessors,
        |a| &a.subject_label,
        |a| &a.session_label,
        params.subjects.as_ref(),
        params.sessions.as_ref(),
        params.full_regex,
    )?;

    if listing.from_csv {
        listing.scans = scans;
        listing.assessors = assessors;
    } else if params.overwrite {
        info!("Overwrite mode: previous downloads are ignored.");
        listing.scans = scans;
        listing.assessors = assessors;
    } else {
        let previous = read_report(&params.directory)?;
        if params.update {
            info!("Update mode: resources modified on XNAT after the local copy are fetched again.");
            if let Some(date) = previous.last_download {
                info!("Previous download: {}", date);
            }
            listing.last_download = previous.last_download;
            listing.scans = scans;
            listing.assessors = assessors;
        } else {
            listing.scans =
                pending_scans(api, scans, listing.scan_resources.as_ref(), &previous)?;
            listing.assessors =
                pending_assessors(api, assessors, listing.assessor_resources.as_ref(), &previous)?;
            listing.previous_rows = previous.rows;
        }
    }

    log_project_table(&listing.scans, &listing.assessors);
    Ok(listing)
}

/// Download every object `params` selects into `params.directory`
pub fn run_download<A: XnatApi + ?Sized>(
    api: &A,
    params: &DownloadParams,
    now: &DateTime<Local>,
) -> Result<DownloadSummary> {
    fs::create_dir_all(&params.directory)?;
    if params.has_selection() {
        return download_selection(api, params);
    }

    let listing = list_objects(api, params)?;
    // objects read from a CSV file get a fresh report without rows
    let with_rows = !params.ignore_report && !listing.from_csv;

    let mut downloader =
        Downloader::new(api, params.one_dir).with_update(params.update && !params.overwrite);
    if !params.ignore_report {
        let mut report = ReportWriter::create(&params.directory.join(REPORT_NAME), now)?;
        for row in &listing.previous_rows {
            report.write_row(row)?;
        }
        downloader = downloader.with_report(report);
    }

    let pairs: BTreeSet<(&str, &str)> = listing
        .scans
        .iter()
        .map(|s| (s.project_id.as_str(), s.subject_label.as_str()))
        .chain(
            listing
                .assessors
                .iter()
                .map(|a| (a.project_id.as_str(), a.subject_label.as_str())),
        )
        .collect();

    let mut failures = 0;
    for (index, (project, subject)) in pairs.iter().enumerate() {
        info!("[{}/{}] Project: {} / Subject: {}", index + 1, pairs.len(), project, subject);

        for scan in listing
            .scans
            .iter()
            .filter(|s| s.project_id == *project && s.subject_label == *subject)
        {
            let Some(resources) = listing.scan_resources.as_ref() else {
                warn!("No scan resources requested, scan {} skipped.", scan.report_key());
                continue;
            };
            info!("  * Session {} / Scan {} ({})", scan.session_label, scan.id, scan.scan_type);
            let folder = scan_path(&params.directory, scan, params.one_dir);
            if params.overwrite && !params.one_dir && folder.exists() {
                fs::remove_dir_all(&folder)?;
            }
            let row = with_rows.then(|| scan.report_prefix());
            if let Err(e) = downloader.download_scan(&folder, scan, resources, row.as_deref()) {
                error!("Scan {} failed: {}", scan.report_key(), e);
                failures += 1;
            }
        }

        for assessor in listing
            .assessors
            .iter()
            .filter(|a| a.project_id == *project && a.subject_label == *subject)
        {
            let Some(resources) = listing.assessor_resources.as_ref() else {
                warn!("No assessor resources requested, assessor {} skipped.", assessor.label);
                continue;
            };
            info!("  * Assessor {}", assessor.label);
            let folder = assessor_path(&params.directory, assessor, params.one_dir);
            if params.overwrite && !params.one_dir && folder.exists() {
                fs::remove_dir_all(&folder)?;
            }
            let row = with_rows.then(|| assessor.report_prefix());
            if let Err(e) = downloader.download_assessor(&folder, assessor, resources, row.as_deref())
            {
                error!("Assessor {} failed: {}", assessor.label, e);
                failures += 1;
            }
        }
    }

    let mut summary = downloader.into_summary();
    summary.errors += failures;
    info!(
        "Download finished: {} resource(s) downloaded, {} up to date, {} missing, {} error(s)",
        summary.downloaded, summary.up_to_date, summary.missing, summary.errors
    );
    Ok(summary)
}

/// `--selectionS` / `--selectionP`: one scan or assessor, no report
fn download_selection<A: XnatApi + ?Sized>(
    api: &A,
    params: &DownloadParams,
) -> Result<DownloadSummary> {
    let mut downloader = Downloader::new(api, params.one_dir);

    if let Some(selection) = &params.selection_scan {
        match &params.scan_resources {
            None => warn!("No scan resources requested (--rs), selection {} skipped.", selection),
            Some(resources) => {
                let parts = split_selection(selection);
                let [project, subject, session, scan_id] = parts.as_slice() else {
                    return Err(Error::InvalidArgument {
                        arg: "--selectionS",
                        value: selection.clone(),
                    });
                };
                match api.scan(project, subject, session, scan_id)? {
                    None => warn!("No scan with the ID given: {}", selection),
                    Some(scan) => {
                        let kept = match &params.qualities {
                            Some(Selection::Only(qualities)) => filter_records(
                                vec![scan],
                                |s| &s.quality,
                                qualities,
                                false,
                                params.full_regex,
                            )?,
                            _ => vec![scan],
                        };
                        match kept.first() {
                            None => info!("Scan {} does not have the requested quality.", selection),
                            Some(scan) => {
                                let folder = if params.one_dir {
                                    params.directory.clone()
                                } else {
                                    params.directory.join(selection)
                                };
                                downloader.download_scan(&folder, scan, resources, None)?;
                            }
                        }
                    }
                }
            }
        }
    }

    if let Some(label) = &params.selection_assessor {
        match &params.assessor_resources {
            None => warn!("No assessor resources requested (--ra), selection {} skipped.", label),
            Some(resources) => {
                let parts = split_selection(label);
                if parts.len() < 4 {
                    return Err(Error::InvalidArgument {
                        arg: "--selectionP",
                        value: label.clone(),
                    });
                }
                match api.assessor(parts[0], parts[1], parts[2], label)? {
                    None => warn!("No assessor with the label given: {}", label),
                    Some(assessor) => {
                        let kept = match &params.proc_status {
                            Some(Selection::Only(statuses)) => filter_records(
                                vec![assessor],
                                |a| &a.procstatus,
                                statuses,
                                false,
                                params.full_regex,
                            )?,
                            _ => vec![assessor],
                        };
                        match kept.first() {
                            None => info!("Assessor {} does not have the requested status.", label),
                            Some(assessor) => {
                                let folder = if params.one_dir {
                                    params.directory.clone()
                                } else {
                                    params.directory.join(label)
                                };
                                downloader.download_assessor(&folder, assessor, resources, None)?;
                            }
                        }
                    }
                }
            }
        }
    }

    Ok(downloader.into_summary())
}

/// Projects the BIDS step converts: the requested ones, or the projects of the
/// downloaded objects when they came from a CSV file or a selection
pub fn bids_projects(params: &DownloadParams, summary: &DownloadSummary) -> Vec<String> {
    if params.projects.is_empty() {
        summary.projects.iter().cloned().collect()
    } else {
        params.projects.clone()
    }
}

/// Convert the projects of a finished download when `params.bids_dir` is set.
/// A failing project is logged and left out of the result.
pub fn convert_downloaded<A: XnatApi + ?Sized>(
    api: &A,
    params: &DownloadParams,
    summary: &DownloadSummary,
) -> BTreeMap<String, BidsReport> {
    let mut reports = BTreeMap::new();
    let Some(bids_dir) = &params.bids_dir else {
        return reports;
    };
    for project in bids_projects(params, summary) {
        match convert_to_bids(api, &params.directory, bids_dir, &project) {
            Ok(report) => {
                info!(
                    "BIDS {}: {} subject(s), {} session(s), {} file(s) converted, {} skipped",
                    project, report.subjects, report.sessions, report.converted, report.skipped
                );
                reports.insert(project, report);
            }
            Err(e) => error!("BIDS conversion of {} failed: {}", project, e),
        }
    }
    reports
}

/// Convert `<download_dir>/<project>` into `<bids_dir>/<project>`
pub fn convert_to_bids<A: XnatApi + ?Sized>(
    api: &A,
    download_dir: &Path,
    bids_dir: &Path,
    project: &str,
) -> Result<BidsReport> {
    fs::create_dir_all(bids_dir)?;
    transform_to_bids(api, download_dir, bids_dir, project)
}
