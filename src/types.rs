//! Shared types used across xnatdl.
//! Includes `ObjectType`, the parsed option list `Selection`, the listing records
//! `ScanRecord` / `AssessorRecord`, and the BIDS `BidsDataType`.
use serde::{Deserialize, Serialize};

/// Kind of XNAT object a report row describes
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum ObjectType {
    Scan,
    Assessor,
}

impl ObjectType {
    pub fn from_column(value: &str) -> Option<Self> {
        match value {
            "scan" => Some(ObjectType::Scan),
            "assessor" => Some(ObjectType::Assessor),
            _ => None,
        }
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectType::Scan => write!(f, "scan"),
            ObjectType::Assessor => write!(f, "assessor"),
        }
    }
}

/// A comma separated option value after parsing: either every value or an explicit list
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Selection {
    All,
    Only(Vec<String>),
}

impl Selection {
    pub fn is_all(&self) -> bool {
        matches!(self, Selection::All)
    }

    /// Explicit values, empty for `All`
    pub fn values(&self) -> &[String] {
        match self {
            Selection::All => &[],
            Selection::Only(values) => values,
        }
    }

    pub fn contains(&self, value: &str) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(values) => values.iter().any(|v| v == value),
        }
    }
}

impl std::fmt::Display for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selection::All => write!(f, "all"),
            Selection::Only(values) => write!(f, "{}", values.join(",")),
        }
    }
}

/// One scan as listed by XNAT (or read back from an input CSV)
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct ScanRecord {
    pub project_id: String,
    pub subject_label: String,
    pub session_type: String,
    pub session_label: String,
    pub id: String,
    pub scan_type: String,
    pub series_description: String,
    pub quality: String,
    /// Resource labels known from the listing; empty means "ask XNAT"
    #[serde(default)]
    pub resources: Vec<String>,
}

impl ScanRecord {
    /// `project-x-subject-x-session-x-ID`, the key used in the download report
    pub fn report_key(&self) -> String {
        [
            self.project_id.as_str(),
            self.subject_label.as_str(),
            self.session_label.as_str(),
            self.id.as_str(),
        ]
        .join("-x-")
    }

    /// First nine report columns for this scan
    pub fn report_prefix(&self) -> Vec<String> {
        vec![
            ObjectType::Scan.to_string(),
            self.project_id.clone(),
            self.subject_label.clone(),
            self.session_type.clone(),
            self.session_label.clone(),
            self.id.clone(),
            self.scan_type.clone(),
            self.series_description.clone(),
            self.quality.clone(),
        ]
    }
}

/// One assessor (processing result) as listed by XNAT
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct AssessorRecord {
    pub project_id: String,
    pub subject_label: String,
    pub session_type: String,
    pub session_label: String,
    pub label: String,
    pub proctype: String,
    pub procstatus: String,
    pub qcstatus: String,
    #[serde(default)]
    pub resources: Vec<String>,
}

impl AssessorRecord {
    pub fn report_key(&self) -> String {
        self.label.clone()
    }

    pub fn report_prefix(&self) -> Vec<String> {
        vec![
            ObjectType::Assessor.to_string(),
            self.project_id.clone(),
            self.subject_label.clone(),
            self.session_type.clone(),
            self.session_label.clone(),
            self.label.clone(),
            self.proctype.clone(),
            self.procstatus.clone(),
            self.qcstatus.clone(),
        ]
    }
}

/// BIDS data-type folder a scan is sorted into
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BidsDataType {
    Anat,
    Func,
    Dwi,
    Fmap,
}

impl BidsDataType {
    pub const ALL: [BidsDataType; 4] = [
        BidsDataType::Anat,
        BidsDataType::Func,
        BidsDataType::Dwi,
        BidsDataType::Fmap,
    ];

    pub fn folder(&self) -> &'static str {
        match self {
            BidsDataType::Anat => "anat",
            BidsDataType::Func => "func",
            BidsDataType::Dwi => "dwi",
            BidsDataType::Fmap => "fmap",
        }
    }

    pub fn from_folder(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|dt| dt.folder() == name)
    }
}

impl std::fmt::Display for BidsDataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.folder())
    }
}
