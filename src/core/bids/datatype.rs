//! Scan type -> BIDS datatype resolution.
use regex::Regex;
use tracing::warn;

use crate::core::bids::mapping::ProjectMapping;
use crate::error::Result;
use crate::types::BidsDataType;

/// Default rules, first match wins
const DEFAULT_RULES: [(BidsDataType, &str); 4] = [
    (BidsDataType::Dwi, r"(?i)dwi|dti|diffusion"),
    (BidsDataType::Fmap, r"(?i)fmap|field.?map"),
    (BidsDataType::Func, r"(?i)fmri|bold|rest|task"),
    (BidsDataType::Anat, r"(?i)T1|T2|T1W|MPRAGE|FLAIR"),
];

#[derive(Debug, Clone)]
pub struct DataTypeRules {
    rules: Vec<(BidsDataType, Regex)>,
}

impl DataTypeRules {
    pub fn new() -> Result<Self> {
        let rules = DEFAULT_RULES
            .iter()
            .map(|(dt, pattern)| Ok((*dt, Regex::new(pattern)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    pub fn classify(&self, scan_type: &str) -> Option<BidsDataType> {
        self.rules
            .iter()
            .find(|(_, re)| re.is_match(scan_type))
            .map(|(dt, _)| *dt)
    }

    /// The project mapping wins over the rules; an unusable mapped value falls back
    pub fn resolve(
        &self,
        scan_type: &str,
        mapping: Option<&ProjectMapping>,
    ) -> Option<BidsDataType> {
        if let Some(value) = mapping.and_then(|m| m.text(scan_type)) {
            match BidsDataType::from_folder(&value) {
                Some(dt) => return Some(dt),
                None => warn!(
                    "Datatype mapping gives `{}` for scan type {}, which is not a BIDS datatype",
                    value, scan_type
                ),
            }
        }
        self.classify(scan_type)
    }
}
