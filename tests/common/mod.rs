#![allow(dead_code)]
//! In-memory XNAT backend for the integration tests.
use std::cell::Cell;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use flate2::Compression;
use flate2::write::GzEncoder;
use serde_json::Value;
use xnatdl::io::xnat::{RemoteFile, ResourceOwner, ResourceRef};
use xnatdl::{AssessorRecord, Investigator, Result, ScanRecord, XnatApi};
use zip::write::SimpleFileOptions;

pub const HOST: &str = "https://xnat.test";

#[derive(Default)]
pub struct FakeXnat {
    /// project -> subject labels
    pub projects: BTreeMap<String, Vec<String>>,
    pub scans: Vec<ScanRecord>,
    pub assessors: Vec<AssessorRecord>,
    /// resource uri -> files (name, content)
    pub resources: BTreeMap<String, Vec<(String, Vec<u8>)>>,
    /// resource uri -> last modified
    pub modified: HashMap<String, i64>,
    /// (project, resource, file) -> JSON
    pub project_files: HashMap<(String, String, String), Value>,
    pub pi: Option<Investigator>,
    pub downloads: Cell<usize>,
}

pub fn scan(project: &str, subject: &str, session: &str, id: &str, scan_type: &str) -> ScanRecord {
    ScanRecord {
        project_id: project.into(),
        subject_label: subject.into(),
        session_type: "xnat:mrSessionData".into(),
        session_label: session.into(),
        id: id.into(),
        scan_type: scan_type.into(),
        series_description: String::new(),
        quality: "usable".into(),
        resources: Vec::new(),
    }
}

pub fn assessor(project: &str, subject: &str, session: &str, proctype: &str) -> AssessorRecord {
    AssessorRecord {
        project_id: project.into(),
        subject_label: subject.into(),
        session_type: "xnat:mrSessionData".into(),
        session_label: session.into(),
        label: format!("{}-x-{}-x-{}-x-{}", project, subject, session, proctype),
        proctype: proctype.into(),
        procstatus: "COMPLETE".into(),
        qcstatus: "Passed".into(),
        resources: Vec::new(),
    }
}

/// Bare little-endian NIfTI-1 header, no image data
pub fn write_minimal_header(path: &Path, pixdim4: f32, xyzt_units: u8, gzip: bool) {
    let mut bytes = vec![0u8; 352];
    LittleEndian::write_i32(&mut bytes[0..4], 348);
    LittleEndian::write_i16(&mut bytes[40..42], 4);
    LittleEndian::write_f32(&mut bytes[92..96], pixdim4);
    LittleEndian::write_f32(&mut bytes[108..112], 352.0);
    bytes[123] = xyzt_units;
    bytes[344..348].copy_from_slice(b"n+1\0");
    if gzip {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&bytes).unwrap();
        bytes = encoder.finish().unwrap();
    }
    fs::write(path, bytes).unwrap();
}

impl FakeXnat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(mut self, project: &str, subjects: &[&str]) -> Self {
        self.projects.insert(
            project.to_string(),
            subjects.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    pub fn add_scan(&mut self, scan: ScanRecord, resource: &str, files: &[(&str, &[u8])]) {
        let owner = ResourceOwner::of_scan(&scan);
        self.resources.insert(
            owner.resource(resource).uri(),
            files
                .iter()
                .map(|(n, c)| (n.to_string(), c.to_vec()))
                .collect(),
        );
        if !self.scans.iter().any(|s| s == &scan) {
            self.scans.push(scan);
        }
    }

    pub fn add_assessor(
        &mut self,
        assessor: AssessorRecord,
        resource: &str,
        files: &[(&str, &[u8])],
    ) {
        let owner = ResourceOwner::of_assessor(&assessor);
        self.resources.insert(
            owner.resource(resource).uri(),
            files
                .iter()
                .map(|(n, c)| (n.to_string(), c.to_vec()))
                .collect(),
        );
        if !self.assessors.iter().any(|a| a == &assessor) {
            self.assessors.push(assessor);
        }
    }

    pub fn set_project_file(&mut self, project: &str, resource: &str, file: &str, value: Value) {
        self.project_files.insert(
            (project.to_string(), resource.to_string(), file.to_string()),
            value,
        );
    }

    fn content(&self, uri: &str) -> Option<&[u8]> {
        let (resource, name) = uri.rsplit_once("/files/")?;
        self.resources
            .get(resource)?
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c.as_slice())
    }
}

impl XnatApi for FakeXnat {
    fn host(&self) -> &str {
        HOST
    }

    fn project_exists(&self, project: &str) -> Result<bool> {
        Ok(self.projects.contains_key(project))
    }

    fn subject_labels(&self, project: &str) -> Result<Vec<String>> {
        Ok(self.projects.get(project).cloned().unwrap_or_default())
    }

    fn project_scans(&self, project: &str) -> Result<Vec<ScanRecord>> {
        Ok(self
            .scans
            .iter()
            .filter(|s| s.project_id == project)
            .cloned()
            .collect())
    }

    fn project_assessors(&self, project: &str) -> Result<Vec<AssessorRecord>> {
        Ok(self
            .assessors
            .iter()
            .filter(|a| a.project_id == project)
            .cloned()
            .collect())
    }

    fn scan(
        &self,
        project: &str,
        subject: &str,
        session: &str,
        scan_id: &str,
    ) -> Result<Option<ScanRecord>> {
        Ok(self
            .scans
            .iter()
            .find(|s| {
                s.project_id == project
                    && s.subject_label == subject
                    && s.session_label == session
                    && s.id == scan_id
            })
            .cloned())
    }

    fn assessor(
        &self,
        project: &str,
        subject: &str,
        session: &str,
        label: &str,
    ) -> Result<Option<AssessorRecord>> {
        Ok(self
            .assessors
            .iter()
            .find(|a| {
                a.project_id == project
                    && a.subject_label == subject
                    && a.session_label == session
                    && a.label == label
            })
            .cloned())
    }

    fn resource_labels(&self, owner: &ResourceOwner) -> Result<Vec<String>> {
        let prefix = format!("{}/", owner.resources_uri());
        Ok(self
            .resources
            .keys()
            .filter_map(|uri| uri.strip_prefix(&prefix))
            .map(str::to_string)
            .collect())
    }

    fn resource_files(&self, resource: &ResourceRef) -> Result<Option<Vec<RemoteFile>>> {
        let uri = resource.uri();
        Ok(self.resources.get(&uri).map(|files| {
            files
                .iter()
                .map(|(name, content)| RemoteFile {
                    name: name.clone(),
                    uri: format!("{}/files/{}", uri, name),
                    size: Some(content.len() as u64),
                })
                .collect()
        }))
    }

    fn resource_last_modified(&self, resource: &ResourceRef) -> Result<i64> {
        Ok(self.modified.get(&resource.uri()).copied().unwrap_or(0))
    }

    fn download_file(&self, file: &RemoteFile, dest: &Path) -> Result<()> {
        let content = self.content(&file.uri).unwrap_or_default();
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(dest, content)?;
        self.downloads.set(self.downloads.get() + 1);
        Ok(())
    }

    fn download_resource_zip(&self, resource: &ResourceRef, dest: &Path) -> Result<()> {
        let files = self.resources.get(&resource.uri()).cloned().unwrap_or_default();
        let mut zip = zip::ZipWriter::new(File::create(dest)?);
        for (name, content) in files {
            zip.start_file(
                format!("E/scans/1/resources/{}/files/{}", resource.label, name),
                SimpleFileOptions::default(),
            )?;
            zip.write_all(&content)?;
        }
        zip.finish()?;
        self.downloads.set(self.downloads.get() + 1);
        Ok(())
    }

    fn project_investigator(&self, _project: &str) -> Result<Option<Investigator>> {
        Ok(self.pi.clone())
    }

    fn project_resource_json(
        &self,
        project: &str,
        resource: &str,
        file: &str,
    ) -> Result<Option<Value>> {
        Ok(self
            .project_files
            .get(&(project.to_string(), resource.to_string(), file.to_string()))
            .cloned())
    }
}
