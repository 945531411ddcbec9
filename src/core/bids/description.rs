//! `dataset_description.json` of a converted project.
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::io::catalog::Investigator;

pub const DATASET_DESCRIPTION: &str = "dataset_description.json";
pub const BIDS_VERSION: &str = "1.0.1";
pub const NO_AUTHOR: &str = "No Author defined on XNAT";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetDescription {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "BIDSVersion")]
    pub bids_version: String,
    #[serde(rename = "DatasetDOI")]
    pub dataset_doi: String,
    #[serde(rename = "Authors")]
    pub authors: Vec<String>,
}

impl DatasetDescription {
    pub fn new(project: &str, host: &str, pi: Option<&Investigator>) -> Self {
        let author = pi
            .map(Investigator::display_name)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| NO_AUTHOR.to_string());
        Self {
            name: project.to_string(),
            bids_version: BIDS_VERSION.to_string(),
            dataset_doi: host.to_string(),
            authors: vec![author],
        }
    }

    /// Write into `project_dir`, replacing any previous description
    pub fn write(&self, project_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(project_dir)?;
        let path = project_dir.join(DATASET_DESCRIPTION);
        let mut text = serde_json::to_string_pretty(self)?;
        text.push('\n');
        fs::write(&path, text)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authors_fall_back_when_no_pi() {
        let d = DatasetDescription::new("PID", "https://xnat.org", None);
        assert_eq!(d.authors, vec![NO_AUTHOR.to_string()]);
        let pi = Investigator {
            firstname: "Ada".into(),
            lastname: "Lovelace".into(),
        };
        let d = DatasetDescription::new("PID", "https://xnat.org", Some(&pi));
        assert_eq!(d.authors, vec!["Ada Lovelace".to_string()]);
    }

    #[test]
    fn written_with_bids_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = DatasetDescription::new("PID", "https://xnat.org", None)
            .write(dir.path())
            .unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(value["BIDSVersion"], "1.0.1");
        assert_eq!(value["DatasetDOI"], "https://xnat.org");
        assert_eq!(value["Name"], "PID");
    }
}
