//! Project-level mapping files stored as XNAT project resources.
use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Result;
use crate::io::xnat::XnatApi;

/// `(resource label, file name)` of the scan type -> datatype mapping
pub const DATATYPE_MAPPING: (&str, &str) = ("BIDS_datatype", "datatype_mapping.json");
/// `(resource label, file name)` of the scan type -> task name mapping
pub const TASK_MAPPING: (&str, &str) = ("BIDS_task", "task_mapping.json");
/// `(resource label, file name)` of the scan type -> repetition time (seconds) mapping
pub const REPETITION_TIME_MAPPING: (&str, &str) =
    ("BIDS_repetition_time_sec", "repetition_time_sec.json");

/// Scan type keyed mapping, either flat or nested under the project ID
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectMapping {
    entries: BTreeMap<String, Value>,
}

impl ProjectMapping {
    pub fn from_json(value: &Value, project: &str) -> Self {
        let object = match value.get(project) {
            Some(Value::Object(nested)) => Some(nested),
            _ => value.as_object(),
        };
        let entries = object
            .map(|o| o.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact key first, then the first trimmed case-insensitive match in key order
    fn lookup(&self, scan_type: &str) -> Option<&Value> {
        self.entries.get(scan_type).or_else(|| {
            let wanted = scan_type.trim();
            self.entries
                .iter()
                .find(|(k, _)| k.trim().eq_ignore_ascii_case(wanted))
                .map(|(_, v)| v)
        })
    }

    pub fn text(&self, scan_type: &str) -> Option<String> {
        match self.lookup(scan_type)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn number(&self, scan_type: &str) -> Option<f64> {
        match self.lookup(scan_type)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Fetch and parse a mapping file; absent files give `None`
    pub fn load<A: XnatApi + ?Sized>(
        api: &A,
        project: &str,
        (resource, file): (&str, &str),
    ) -> Result<Option<Self>> {
        match api.project_resource_json(project, resource, file)? {
            Some(value) => {
                let mapping = Self::from_json(&value, project);
                if mapping.is_empty() {
                    warn!("{}/{} of project {} is empty", resource, file, project);
                }
                debug!("Loaded {}/{} for {}", resource, file, project);
                Ok(Some(mapping))
            }
            None => Ok(None),
        }
    }
}

/// The three mappings of a project
#[derive(Debug, Clone, Default)]
pub struct BidsMappings {
    pub datatype: Option<ProjectMapping>,
    pub task: Option<ProjectMapping>,
    pub repetition_time: Option<ProjectMapping>,
}

impl BidsMappings {
    pub fn load<A: XnatApi + ?Sized>(api: &A, project: &str) -> Result<Self> {
        Ok(Self {
            datatype: ProjectMapping::load(api, project, DATATYPE_MAPPING)?,
            task: ProjectMapping::load(api, project, TASK_MAPPING)?,
            repetition_time: ProjectMapping::load(api, project, REPETITION_TIME_MAPPING)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flat_and_nested_mappings() {
        let flat = ProjectMapping::from_json(&json!({"fMRI_rest": 2.0}), "PID");
        assert_eq!(flat.number("fMRI_rest"), Some(2.0));

        let nested = ProjectMapping::from_json(&json!({"PID": {"fMRI_rest": "1.5"}}), "PID");
        assert_eq!(nested.number("fMRI_rest"), Some(1.5));
        assert_eq!(nested.number("T1"), None);
    }

    #[test]
    fn lookup_falls_back_to_case_insensitive() {
        let m = ProjectMapping::from_json(&json!({"fMRI_Rest ": "rest"}), "PID");
        assert_eq!(m.text("fmri_rest"), Some("rest".to_string()));
        assert_eq!(m.text("other"), None);
    }

    #[test]
    fn case_insensitive_lookup_is_stable() {
        let m = ProjectMapping::from_json(
            &json!({"fmri_rest": "second", "FMRI_REST": "first", "fMRI_rest": "exact"}),
            "PID",
        );
        assert_eq!(m.text("fMRI_rest"), Some("exact".to_string()));
        assert_eq!(m.text("Fmri_Rest"), Some("first".to_string()));
    }
}
