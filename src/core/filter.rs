//! Option-list parsing and record filtering.
//!
//! Filter expressions are shell globs matched against the whole value unless
//! `full_regex` is set, in which case they are regular expressions anchored at
//! the start of the value.
use regex::Regex;
use tracing::info;

use crate::error::Result;
use crate::types::{AssessorRecord, ScanRecord, Selection};

/// Parse a comma separated CLI value: `None` when unset/empty/`nan`, `All` for `all`
pub fn parse_option_list(option: Option<&str>) -> Option<Selection> {
    let option = option?.trim();
    if option.is_empty() || option == "nan" {
        None
    } else if option.eq_ignore_ascii_case("all") {
        Some(Selection::All)
    } else {
        Some(Selection::Only(
            option
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        ))
    }
}

/// A compiled filter expression
#[derive(Debug, Clone)]
pub enum Matcher {
    Glob(glob::Pattern),
    Regex(Regex),
}

impl Matcher {
    pub fn is_match(&self, value: &str) -> bool {
        match self {
            Matcher::Glob(pattern) => pattern.matches(value),
            Matcher::Regex(re) => re.is_match(value),
        }
    }
}

/// Compile one filter expression
pub fn compile_expression(expression: &str, full_regex: bool) -> Result<Matcher> {
    if full_regex {
        Ok(Matcher::Regex(Regex::new(&format!("^(?:{})", expression))?))
    } else {
        Ok(Matcher::Glob(glob::Pattern::new(expression)?))
    }
}

/// Keep items whose field matches any expression, or none of them when `exclude`
pub fn filter_records<T, F>(
    items: Vec<T>,
    field: F,
    expressions: &[String],
    exclude: bool,
    full_regex: bool,
) -> Result<Vec<T>>
where
    F: Fn(&T) -> &str,
{
    let patterns = expressions
        .iter()
        .map(|e| compile_expression(e, full_regex))
        .collect::<Result<Vec<_>>>()?;

    Ok(items
        .into_iter()
        .filter(|item| {
            let value = field(item);
            let matched = patterns.iter().any(|p| p.is_match(value));
            matched != exclude
        })
        .collect())
}

fn filter_selection<T, F>(
    items: Vec<T>,
    field: F,
    selection: Option<&Selection>,
    full_regex: bool,
) -> Result<Vec<T>>
where
    F: Fn(&T) -> &str,
{
    match selection {
        Some(Selection::Only(values)) => filter_records(items, field, values, false, full_regex),
        _ => Ok(items),
    }
}

/// Scan filter options
#[derive(Debug, Clone, Default)]
pub struct ScanFilters {
    pub types: Option<Selection>,
    pub without: Option<Selection>,
    pub qualities: Option<Selection>,
}

/// Assessor filter options
#[derive(Debug, Clone, Default)]
pub struct AssessorFilters {
    pub proctypes: Option<Selection>,
    pub without: Option<Selection>,
    pub procstatus: Option<Selection>,
    pub qcstatus: Option<Selection>,
}

pub fn filter_scans(
    scans: Vec<ScanRecord>,
    filters: &ScanFilters,
    from_csv: bool,
    full_regex: bool,
) -> Result<Vec<ScanRecord>> {
    if !from_csv && filters.types.is_none() && filters.without.is_none() {
        return Ok(Vec::new());
    }
    if matches!(filters.without, Some(Selection::All)) {
        return Ok(Vec::new());
    }
    let mut scans = filter_selection(scans, |s| &s.scan_type, filters.types.as_ref(), full_regex)?;
    if let Some(Selection::Only(without)) = &filters.without {
        scans = filter_records(scans, |s| &s.scan_type, without, true, full_regex)?;
    }
    filter_selection(scans, |s| &s.quality, filters.qualities.as_ref(), full_regex)
}

pub fn filter_assessors(
    assessors: Vec<AssessorRecord>,
    filters: &AssessorFilters,
    from_csv: bool,
    full_regex: bool,
) -> Result<Vec<AssessorRecord>> {
    if !from_csv && filters.proctypes.is_none() && filters.without.is_none() {
        return Ok(Vec::new());
    }
    if matches!(filters.without, Some(Selection::All)) {
        return Ok(Vec::new());
    }
    let mut assessors = filter_selection(
        assessors,
        |a| &a.proctype,
        filters.proctypes.as_ref(),
        full_regex,
    )?;
    if let Some(Selection::Only(without)) = &filters.without {
        assessors = filter_records(assessors, |a| &a.proctype, without, true, full_regex)?;
    }
    let assessors = filter_selection(
        assessors,
        |a| &a.procstatus,
        filters.procstatus.as_ref(),
        full_regex,
    )?;
    filter_selection(assessors, |a| &a.qcstatus, filters.qcstatus.as_ref(), full_regex)
}

/// Restrict records to the requested subjects and sessions (`All` means no restriction)
pub fn filter_subjects_sessions<T, S, E>(
    items: Vec<T>,
    subject_of: S,
    session_of: E,
    subjects: Option<&Selection>,
    sessions: Option<&Selection>,
    full_regex: bool,
) -> Result<Vec<T>>
where
    S: Fn(&T) -> &str,
    E: Fn(&T) -> &str,
{
    let mut items = items;
    if let Some(Selection::Only(subjects)) = subjects {
        info!("Filtering the subjects...");
        items = filter_records(items, subject_of, subjects, false, full_regex)?;
    }
    if let Some(Selection::Only(sessions)) = sessions {
        info!("Filtering the sessions...");
        items = filter_records(items, session_of, sessions, false, full_regex)?;
    }
    Ok(items)
}
