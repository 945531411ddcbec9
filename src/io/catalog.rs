//! XML documents returned by XNAT: resource catalogs (entry timestamps) and
//! project documents (principal investigator).
use chrono::Local;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::Result;

/// Principal investigator of a project
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Investigator {
    pub firstname: String,
    pub lastname: String,
}

impl Investigator {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.firstname.trim(), self.lastname.trim())
            .trim()
            .to_string()
    }
}

/// `2019-05-01T12:34:56.789-05:00` -> `20190501123456`
pub fn catalog_timestamp(value: &str) -> Option<i64> {
    let value = value.split('.').next().unwrap_or_default();
    let value: String = value.chars().take(19).collect();
    let digits: String = value.chars().filter(char::is_ascii_digit).collect();
    if digits.len() != 14 {
        return None;
    }
    digits.parse().ok()
}

fn entry_times(e: &BytesStart<'_>, times: &mut Vec<i64>) -> Result<()> {
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).to_string();
        if key == "createdTime" || key == "modifiedTime" {
            if let Some(t) = catalog_timestamp(&attr.unescape_value()?) {
                times.push(t);
            }
        }
    }
    Ok(())
}

/// Latest `createdTime`/`modifiedTime` over the catalog entries, as `YYYYMMDDHHMMSS`.
/// Falls back to the current time when the catalog carries no timestamps.
pub fn last_modified(xml: &str) -> Result<i64> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut times = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) | Event::Empty(ref e) => {
                if e.local_name().as_ref() == b"entry" {
                    entry_times(e, &mut times)?;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    match times.into_iter().max() {
        Some(t) => Ok(t),
        None => Ok(Local::now()
            .format("%Y%m%d%H%M%S")
            .to_string()
            .parse()
            .unwrap_or_default()),
    }
}

/// PI first and last name from a project XML document
pub fn project_investigator(xml: &str) -> Result<Option<Investigator>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut curr = String::new();
    let mut in_pi = false;
    let mut pi: Option<Investigator> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => {
                let tag = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if tag == "PI" {
                    in_pi = true;
                    pi.get_or_insert_with(Investigator::default);
                }
                curr = tag;
            }
            Event::End(ref e) => {
                if e.local_name().as_ref() == b"PI" {
                    in_pi = false;
                }
                curr.clear();
            }
            Event::Text(e) => {
                let txt = e.unescape()?;
                if let Some(pi) = pi.as_mut() {
                    match curr.as_str() {
                        "firstname" if in_pi => pi.firstname = txt.to_string(),
                        "lastname" if in_pi => pi.lastname = txt.to_string(),
                        _ => {}
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(pi.filter(|p| !p.display_name().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<cat:Catalog xmlns:cat="http://nrg.wustl.edu/catalog" ID="NIFTI">
  <cat:entries>
    <cat:entry URI="t1.nii.gz" ID="t1.nii.gz" createdTime="2019-05-01T12:34:56.789-05:00" modifiedTime="2020-02-03T04:05:06.000-05:00"/>
    <cat:entry URI="t1.json" ID="t1.json" createdTime="2021-01-01T00:00:01.000-05:00"/>
  </cat:entries>
</cat:Catalog>"#;

    #[test]
    fn latest_entry_time_wins() {
        assert_eq!(last_modified(CATALOG).unwrap(), 20210101000001);
    }

    #[test]
    fn catalog_without_times_is_now() {
        let t = last_modified("<cat:Catalog><cat:entries/></cat:Catalog>").unwrap();
        assert!(t > 20200101000000);
    }

    #[test]
    fn timestamps_are_compacted() {
        assert_eq!(catalog_timestamp("2019-05-01T12:34:56"), Some(20190501123456));
        assert_eq!(catalog_timestamp("2019-05-01 12:34:56.1"), Some(20190501123456));
        assert_eq!(catalog_timestamp("yesterday"), None);
    }

    #[test]
    fn investigator_is_read_from_project_document() {
        let xml = r#"<xnat:Project ID="PID" xmlns:xnat="http://nrg.wustl.edu/xnat">
  <xnat:name>My project</xnat:name>
  <xnat:PI>
    <xnat:firstname>Ada</xnat:firstname>
    <xnat:lastname>Lovelace</xnat:lastname>
  </xnat:PI>
  <xnat:investigators>
    <xnat:investigator><xnat:firstname>Other</xnat:firstname></xnat:investigator>
  </xnat:investigators>
</xnat:Project>"#;
        let pi = project_investigator(xml).unwrap().unwrap();
        assert_eq!(pi.display_name(), "Ada Lovelace");
    }

    #[test]
    fn project_without_investigator() {
        let xml = r#"<xnat:Project ID="PID"><xnat:name>x</xnat:name></xnat:Project>"#;
        assert!(project_investigator(xml).unwrap().is_none());
    }
}
