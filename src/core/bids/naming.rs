//! BIDS folder and file naming.
use crate::types::BidsDataType;

const NIFTI_EXTENSIONS: [&str; 2] = [".nii.gz", ".nii"];

pub fn subject_folder(index: usize) -> String {
    format!("sub-{:02}", index)
}

pub fn session_folder(index: usize) -> String {
    format!("ses-{:02}", index)
}

/// Keep ASCII letters and digits only
pub fn alphanumeric(value: &str) -> String {
    value.chars().filter(char::is_ascii_alphanumeric).collect()
}

pub fn is_nifti(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    NIFTI_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

fn is_gradient_file(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    ["bvec", "bval"]
        .iter()
        .any(|g| lower.ends_with(&format!(".{}", g)) || lower.ends_with(&format!("{}.txt", g)))
}

/// Files the conversion picks up
pub fn is_convertible(name: &str) -> bool {
    is_nifti(name) || is_gradient_file(name)
}

/// Name before the first `.`
pub fn stem(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}

/// Extension used in the BIDS name: the text after the first `.`, except for
/// gradient tables saved as `*bvec.txt`/`*bval.txt`
pub fn extension(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    for gradient in ["bvec", "bval"] {
        if lower.ends_with(&format!("{}.txt", gradient)) {
            return gradient.to_string();
        }
    }
    name.split_once('.')
        .map(|(_, ext)| ext.to_string())
        .unwrap_or_default()
}

/// Anatomical suffix from the scan type, `T1w` by default
pub fn anat_suffix(scan_type: &str) -> &'static str {
    let upper = scan_type.to_ascii_uppercase();
    if upper.contains("FLAIR") {
        "FLAIR"
    } else if upper.contains("T2") {
        "T2w"
    } else {
        "T1w"
    }
}

/// BIDS file name of one converted file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidsName<'a> {
    pub subject: usize,
    pub session: usize,
    pub datatype: BidsDataType,
    pub scan_id: &'a str,
    pub scan_type: &'a str,
    /// Task label, used for `func`
    pub task: Option<&'a str>,
}

impl BidsName<'_> {
    /// Name without extension
    pub fn stem(&self) -> String {
        let entities = format!(
            "{}_{}",
            subject_folder(self.subject),
            session_folder(self.session)
        );
        let acq = alphanumeric(self.scan_id);
        match self.datatype {
            BidsDataType::Anat => {
                format!("{}_acq-{}_{}", entities, acq, anat_suffix(self.scan_type))
            }
            BidsDataType::Func => format!(
                "{}_task-{}_acq-{}_run-01_bold",
                entities,
                self.task.map(alphanumeric).unwrap_or_else(|| alphanumeric(self.scan_type)),
                acq
            ),
            BidsDataType::Dwi => format!("{}_acq-{}_run-01_dwi", entities, acq),
            BidsDataType::Fmap => format!("{}_acq-{}_run-01_fieldmap", entities, acq),
        }
    }

    pub fn file_name(&self, source_name: &str) -> String {
        let ext = extension(source_name);
        if ext.is_empty() {
            self.stem()
        } else {
            format!("{}.{}", self.stem(), ext)
        }
    }
}
