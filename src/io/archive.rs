//! Extraction of resource zip archives downloaded from XNAT.
//!
//! XNAT zips carry the full archive path of each file
//! (`<session>/scans/<id>/resources/<label>/files/<relative path>`); only the part
//! after the `files` component is kept.
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::debug;
use zip::ZipArchive;

use crate::error::Result;

/// Path of a zip entry relative to the resource root
pub fn resource_relative_path(entry: &Path) -> PathBuf {
    let components: Vec<Component<'_>> = entry.components().collect();
    match components
        .iter()
        .position(|c| c.as_os_str() == "files")
    {
        Some(i) if i + 1 < components.len() => components[i + 1..].iter().collect(),
        _ => entry.to_path_buf(),
    }
}

/// Extract every file of `zip_path` into `output_dir`; returns the number of files written
pub fn extract_resource_zip(zip_path: &Path, output_dir: &Path) -> Result<usize> {
    let mut archive = ZipArchive::new(File::open(zip_path)?)?;
    fs::create_dir_all(output_dir)?;

    let mut written = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        // entries escaping the archive root are skipped
        let Some(name) = entry.enclosed_name() else {
            continue;
        };
        let dest = output_dir.join(resource_relative_path(&name));
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&dest)?;
        io::copy(&mut entry, &mut out)?;
        written += 1;
    }
    debug!("Extracted {} file(s) from {:?} into {:?}", written, zip_path, output_dir);
    Ok(written)
}
