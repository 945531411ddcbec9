//! XNAT access: the `XnatApi` trait used by the download and BIDS code, and the
//! `XnatClient` implementation talking to the XNAT REST API over blocking HTTP.
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::Path;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use serde_json::{Map, Value};
use tracing::debug;
use urlencoding::encode;

use crate::error::{Error, Result};
use crate::io::catalog::{self, Investigator};
use crate::io::credentials::XnatCredentials;
use crate::types::{AssessorRecord, ScanRecord};

const DEFAULT_TIMEOUT_SECS: u64 = 3600;

const SESSION_XSI_TYPE: &str = "xnat:imageSessionData";

const SCAN_COLUMNS: &[&str] = &[
    "ID",
    "label",
    "project",
    "subject_label",
    "xsiType",
    "xnat:imagescandata/id",
    "xnat:imagescandata/type",
    "xnat:imagescandata/quality",
    "xnat:imagescandata/series_description",
    "xnat:imagescandata/file/label",
];

const ASSESSOR_COLUMNS: &[&str] = &[
    "ID",
    "label",
    "project",
    "subject_label",
    "xsiType",
    "proc:genprocdata/label",
    "proc:genprocdata/proctype",
    "proc:genprocdata/procstatus",
    "proc:genprocdata/validation/status",
    "proc:genprocdata/out/file/label",
];

/// The object a resource hangs off
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceOwner {
    Scan {
        project: String,
        subject: String,
        session: String,
        scan_id: String,
    },
    Assessor {
        project: String,
        subject: String,
        session: String,
        label: String,
    },
}

impl ResourceOwner {
    pub fn of_scan(scan: &ScanRecord) -> Self {
        ResourceOwner::Scan {
            project: scan.project_id.clone(),
            subject: scan.subject_label.clone(),
            session: scan.session_label.clone(),
            scan_id: scan.id.clone(),
        }
    }

    pub fn of_assessor(assessor: &AssessorRecord) -> Self {
        ResourceOwner::Assessor {
            project: assessor.project_id.clone(),
            subject: assessor.subject_label.clone(),
            session: assessor.session_label.clone(),
            label: assessor.label.clone(),
        }
    }

    /// REST path of the owner, e.g. `/data/projects/P/subjects/S/experiments/E/scans/1`.
    /// Labels are percent-encoded.
    pub fn uri(&self) -> String {
        match self {
            ResourceOwner::Scan {
                project,
                subject,
                session,
                scan_id,
            } => format!(
                "/data/projects/{}/subjects/{}/experiments/{}/scans/{}",
                encode(project),
                encode(subject),
                encode(session),
                encode(scan_id)
            ),
            ResourceOwner::Assessor {
                project,
                subject,
                session,
                label,
            } => format!(
                "/data/projects/{}/subjects/{}/experiments/{}/assessors/{}",
                encode(project),
                encode(subject),
                encode(session),
                encode(label)
            ),
        }
    }

    /// Scans expose `resources`, assessors their output resources
    pub fn resources_uri(&self) -> String {
        match self {
            ResourceOwner::Scan { .. } => format!("{}/resources", self.uri()),
            ResourceOwner::Assessor { .. } => format!("{}/out/resources", self.uri()),
        }
    }

    pub fn resource(&self, label: &str) -> ResourceRef {
        ResourceRef {
            owner: self.clone(),
            label: label.to_string(),
        }
    }
}

/// A named resource of a scan or assessor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    pub owner: ResourceOwner,
    pub label: String,
}

impl ResourceRef {
    pub fn uri(&self) -> String {
        format!("{}/{}", self.owner.resources_uri(), encode(&self.label))
    }
}

/// A file inside a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub name: String,
    /// Server-relative URI of the file content
    pub uri: String,
    pub size: Option<u64>,
}

/// Everything the downloader and BIDS converter need from XNAT
pub trait XnatApi {
    /// Base URL of the server, used for provenance
    fn host(&self) -> &str;

    fn project_exists(&self, project: &str) -> Result<bool>;

    fn subject_labels(&self, project: &str) -> Result<Vec<String>>;

    /// All scans of a project, one record per scan with its resource labels
    fn project_scans(&self, project: &str) -> Result<Vec<ScanRecord>>;

    /// All assessors of a project, one record per assessor with its output resource labels
    fn project_assessors(&self, project: &str) -> Result<Vec<AssessorRecord>>;

    fn scan(
        &self,
        project: &str,
        subject: &str,
        session: &str,
        scan_id: &str,
    ) -> Result<Option<ScanRecord>>;

    fn assessor(
        &self,
        project: &str,
        subject: &str,
        session: &str,
        label: &str,
    ) -> Result<Option<AssessorRecord>>;

    fn resource_labels(&self, owner: &ResourceOwner) -> Result<Vec<String>>;

    /// Files of a resource; `None` when the resource does not exist
    fn resource_files(&self, resource: &ResourceRef) -> Result<Option<Vec<RemoteFile>>>;

    /// Last creation/modification time of the resource as `YYYYMMDDHHMMSS`
    fn resource_last_modified(&self, resource: &ResourceRef) -> Result<i64>;

    fn download_file(&self, file: &RemoteFile, dest: &Path) -> Result<()>;

    /// Download the whole resource as a zip archive
    fn download_resource_zip(&self, resource: &ResourceRef, dest: &Path) -> Result<()>;

    fn project_investigator(&self, project: &str) -> Result<Option<Investigator>>;

    /// JSON content of a file stored in a project-level resource; `None` when absent
    fn project_resource_json(
        &self,
        project: &str,
        resource: &str,
        file: &str,
    ) -> Result<Option<Value>>;
}

/// Blocking REST client for an XNAT server
pub struct XnatClient {
    client: Client,
    host: String,
    user: Option<String>,
    password: Option<String>,
}

impl XnatClient {
    pub fn connect(credentials: &XnatCredentials) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            host: credentials.host.trim_end_matches('/').to_string(),
            user: credentials.user.clone(),
            password: credentials.password.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.host, path)
    }

    fn send(&self, path: &str) -> Result<Response> {
        let url = self.url(path);
        debug!("GET {}", url);
        let mut request = self.client.get(&url);
        if let Some(user) = &self.user {
            request = request.basic_auth(user, self.password.as_deref());
        }
        Ok(request.send()?)
    }

    fn get(&self, path: &str) -> Result<Response> {
        let response = self.send(path)?;
        if !response.status().is_success() {
            return Err(Error::Xnat {
                uri: path.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }

    /// Like `get`, but a 404 is reported as `None`
    fn get_optional(&self, path: &str) -> Result<Option<Response>> {
        let response = self.send(path)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Error::Xnat {
                uri: path.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(Some(response))
    }

    fn get_json(&self, path: &str) -> Result<Value> {
        Ok(self.get(path)?.json()?)
    }

    fn experiments_query(project: &str, columns: &[&str]) -> String {
        format!(
            "/data/archive/experiments?project={}&xsiType={}&columns={}&format=json",
            encode(project),
            SESSION_XSI_TYPE,
            columns.join(",")
        )
    }

    fn save(mut response: Response, dest: &Path) -> Result<()> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = File::create(dest)?;
        response.copy_to(&mut file)?;
        Ok(())
    }
}

impl XnatApi for XnatClient {
    fn host(&self) -> &str {
        &self.host
    }

    fn project_exists(&self, project: &str) -> Result<bool> {
        Ok(self
            .get_optional(&format!("/data/projects/{}?format=json", encode(project)))?
            .is_some())
    }

    fn subject_labels(&self, project: &str) -> Result<Vec<String>> {
        let value = self.get_json(&format!(
            "/data/projects/{}/subjects?format=json",
            encode(project)
        ))?;
        Ok(result_rows(&value)
            .iter()
            .map(|row| field(row, "label"))
            .filter(|label| !label.is_empty())
            .collect())
    }

    fn project_scans(&self, project: &str) -> Result<Vec<ScanRecord>> {
        let value = self.get_json(&Self::experiments_query(project, SCAN_COLUMNS))?;
        Ok(parse_scan_rows(result_rows(&value)))
    }

    fn project_assessors(&self, project: &str) -> Result<Vec<AssessorRecord>> {
        let value = self.get_json(&Self::experiments_query(project, ASSESSOR_COLUMNS))?;
        Ok(parse_assessor_rows(result_rows(&value)))
    }

    fn scan(
        &self,
        project: &str,
        subject: &str,
        session: &str,
        scan_id: &str,
    ) -> Result<Option<ScanRecord>> {
        let owner = ResourceOwner::Scan {
            project: project.to_string(),
            subject: subject.to_string(),
            session: session.to_string(),
            scan_id: scan_id.to_string(),
        };
        let Some(response) = self.get_optional(&format!("{}?format=json", owner.uri()))? else {
            return Ok(None);
        };
        let value: Value = response.json()?;
        let fields = item_fields(&value);
        Ok(Some(ScanRecord {
            project_id: project.to_string(),
            subject_label: subject.to_string(),
            session_type: String::new(),
            session_label: session.to_string(),
            id: scan_id.to_string(),
            scan_type: field(&fields, "type"),
            series_description: field(&fields, "series_description"),
            quality: field(&fields, "quality"),
            resources: Vec::new(),
        }))
    }

    fn assessor(
        &self,
        project: &str,
        subject: &str,
        session: &str,
        label: &str,
    ) -> Result<Option<AssessorRecord>> {
        let owner = ResourceOwner::Assessor {
            project: project.to_string(),
            subject: subject.to_string(),
            session: session.to_string(),
            label: label.to_string(),
        };
        let Some(response) = self.get_optional(&format!("{}?format=json", owner.uri()))? else {
            return Ok(None);
        };
        let value: Value = response.json()?;
        let fields = item_fields(&value);
        Ok(Some(AssessorRecord {
            project_id: project.to_string(),
            subject_label: subject.to_string(),
            session_type: String::new(),
            session_label: session.to_string(),
            label: label.to_string(),
            proctype: field(&fields, "proctype"),
            procstatus: field(&fields, "procstatus"),
            qcstatus: field(&fields, "validation/status"),
            resources: Vec::new(),
        }))
    }

    fn resource_labels(&self, owner: &ResourceOwner) -> Result<Vec<String>> {
        let value = self.get_json(&format!("{}?format=json", owner.resources_uri()))?;
        Ok(result_rows(&value)
            .iter()
            .map(|row| field(row, "label"))
            .filter(|label| !label.is_empty())
            .collect())
    }

    fn resource_files(&self, resource: &ResourceRef) -> Result<Option<Vec<RemoteFile>>> {
        let Some(response) = self.get_optional(&format!("{}/files?format=json", resource.uri()))?
        else {
            return Ok(None);
        };
        let value: Value = response.json()?;
        Ok(Some(parse_file_rows(result_rows(&value))))
    }

    fn resource_last_modified(&self, resource: &ResourceRef) -> Result<i64> {
        let xml = self
            .get(&format!("{}?format=xml", resource.uri()))?
            .text()?;
        catalog::last_modified(&xml)
    }

    fn download_file(&self, file: &RemoteFile, dest: &Path) -> Result<()> {
        Self::save(self.get(&file.uri)?, dest)
    }

    fn download_resource_zip(&self, resource: &ResourceRef, dest: &Path) -> Result<()> {
        Self::save(self.get(&format!("{}/files?format=zip", resource.uri()))?, dest)
    }

    fn project_investigator(&self, project: &str) -> Result<Option<Investigator>> {
        let xml = self
            .get(&format!("/data/projects/{}?format=xml", encode(project)))?
            .text()?;
        catalog::project_investigator(&xml)
    }

    fn project_resource_json(
        &self,
        project: &str,
        resource: &str,
        file: &str,
    ) -> Result<Option<Value>> {
        let path = format!(
            "/data/projects/{}/resources/{}/files/{}",
            encode(project),
            encode(resource),
            encode(file)
        );
        match self.get_optional(&path)? {
            Some(response) => Ok(Some(serde_json::from_str(&response.text()?)?)),
            None => Ok(None),
        }
    }
}

/// Rows of an XNAT `{"ResultSet": {"Result": [...]}}` listing
pub fn result_rows(value: &Value) -> Vec<Map<String, Value>> {
    value
        .pointer("/ResultSet/Result")
        .and_then(Value::as_array)
        .map(|rows| rows.iter().filter_map(|r| r.as_object().cloned()).collect())
        .unwrap_or_default()
}

/// `data_fields` of the first item of an XNAT `{"items": [...]}` document
fn item_fields(value: &Value) -> Map<String, Value> {
    value
        .pointer("/items/0/data_fields")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

/// String value of a column; numbers are rendered, anything else is empty
pub fn field(row: &Map<String, Value>, key: &str) -> String {
    match row.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn push_unique(values: &mut Vec<String>, value: String) {
    if !value.is_empty() && !values.contains(&value) {
        values.push(value);
    }
}

/// Fold the experiments listing (one row per scan and resource) into scan records
pub fn parse_scan_rows(rows: Vec<Map<String, Value>>) -> Vec<ScanRecord> {
    let mut scans: Vec<ScanRecord> = Vec::new();
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    for row in rows {
        let id = field(&row, "xnat:imagescandata/id");
        if id.is_empty() {
            continue;
        }
        let session = field(&row, "label");
        let resource = field(&row, "xnat:imagescandata/file/label");
        let key = (session.clone(), id.clone());
        if let Some(&i) = index.get(&key) {
            push_unique(&mut scans[i].resources, resource);
            continue;
        }
        let mut scan = ScanRecord {
            project_id: field(&row, "project"),
            subject_label: field(&row, "subject_label"),
            session_type: field(&row, "xsiType"),
            session_label: session,
            id,
            scan_type: field(&row, "xnat:imagescandata/type"),
            series_description: field(&row, "xnat:imagescandata/series_description"),
            quality: field(&row, "xnat:imagescandata/quality"),
            resources: Vec::new(),
        };
        push_unique(&mut scan.resources, resource);
        index.insert(key, scans.len());
        scans.push(scan);
    }
    scans
}

/// Fold the experiments listing (one row per assessor and output resource) into assessor records
pub fn parse_assessor_rows(rows: Vec<Map<String, Value>>) -> Vec<AssessorRecord> {
    let mut assessors: Vec<AssessorRecord> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for row in rows {
        let label = field(&row, "proc:genprocdata/label");
        if label.is_empty() {
            continue;
        }
        let resource = field(&row, "proc:genprocdata/out/file/label");
        if let Some(&i) = index.get(&label) {
            push_unique(&mut assessors[i].resources, resource);
            continue;
        }
        let mut assessor = AssessorRecord {
            project_id: field(&row, "project"),
            subject_label: field(&row, "subject_label"),
            session_type: field(&row, "xsiType"),
            session_label: field(&row, "label"),
            label: label.clone(),
            proctype: field(&row, "proc:genprocdata/proctype"),
            procstatus: field(&row, "proc:genprocdata/procstatus"),
            qcstatus: field(&row, "proc:genprocdata/validation/status"),
            resources: Vec::new(),
        };
        push_unique(&mut assessor.resources, resource);
        index.insert(label, assessors.len());
        assessors.push(assessor);
    }
    assessors
}

pub fn parse_file_rows(rows: Vec<Map<String, Value>>) -> Vec<RemoteFile> {
    rows.iter()
        .filter_map(|row| {
            let name = field(row, "Name");
            let uri = field(row, "URI");
            if name.is_empty() || uri.is_empty() {
                return None;
            }
            Some(RemoteFile {
                name,
                uri,
                size: field(row, "Size").parse().ok(),
            })
        })
        .collect()
}
