//! NIfTI-1 header timing: the repetition time (`pixdim[4]`) and its unit
//! (`xyzt_units`), for plain `.nii` and gzip-compressed `.nii.gz` files.
//! Headers are parsed with the `nifti` crate; only the `pixdim[4]` rewrite
//! patches bytes in place.
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use ::nifti::{Endianness, NiftiHeader};
use tracing::debug;

use crate::error::{Error, Result};

// pixdim is f32[8] at 76
const PIXDIM4_OFFSET: usize = 92;

const TIME_UNIT_MASK: u8 = 0x38;

/// Time unit coded in `xyzt_units`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Unknown,
    Seconds,
    Milliseconds,
    Microseconds,
}

impl TimeUnit {
    pub fn from_xyzt_units(units: u8) -> Self {
        match units & TIME_UNIT_MASK {
            8 => TimeUnit::Seconds,
            16 => TimeUnit::Milliseconds,
            24 => TimeUnit::Microseconds,
            _ => TimeUnit::Unknown,
        }
    }

    /// Seconds per unit; unknown units are taken as seconds
    fn scale(self) -> f64 {
        match self {
            TimeUnit::Milliseconds => 1e-3,
            TimeUnit::Microseconds => 1e-6,
            TimeUnit::Seconds | TimeUnit::Unknown => 1.0,
        }
    }

    pub fn to_seconds(self, value: f64) -> f64 {
        value * self.scale()
    }

    pub fn seconds_in_unit(self, seconds: f64) -> f64 {
        seconds / self.scale()
    }
}

/// Timing fields of a NIfTI header
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NiftiTiming {
    pub endianness: Endianness,
    /// Raw `pixdim[4]`, in `unit`
    pub pixdim4: f64,
    pub unit: TimeUnit,
}

impl NiftiTiming {
    pub fn repetition_time_seconds(&self) -> f64 {
        self.unit.to_seconds(self.pixdim4)
    }
}

fn is_gzip(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0x1f && bytes[1] == 0x8b
}

fn load(path: &Path) -> Result<(Vec<u8>, bool)> {
    let raw = fs::read(path)?;
    if is_gzip(&raw) {
        let mut decoded = Vec::new();
        GzDecoder::new(raw.as_slice()).read_to_end(&mut decoded)?;
        Ok((decoded, true))
    } else {
        Ok((raw, false))
    }
}

fn timing_of(header: &NiftiHeader) -> NiftiTiming {
    NiftiTiming {
        endianness: header.endianness,
        pixdim4: header.pixdim[4] as f64,
        unit: TimeUnit::from_xyzt_units(header.xyzt_units as u8),
    }
}

/// Read the timing fields of a `.nii` or `.nii.gz` header
pub fn read_header_timing(path: &Path) -> Result<NiftiTiming> {
    let header = NiftiHeader::from_file(path).map_err(|e| Error::nifti(path, e))?;
    Ok(timing_of(&header))
}

/// Overwrite `pixdim[4]` with `seconds`, expressed in the header's own time unit.
/// The file keeps its compression.
pub fn write_repetition_time(path: &Path, seconds: f64) -> Result<NiftiTiming> {
    let (mut bytes, gzipped) = load(path)?;
    let header = NiftiHeader::from_reader(bytes.as_slice()).map_err(|e| Error::nifti(path, e))?;
    let timing = timing_of(&header);
    let value = timing.unit.seconds_in_unit(seconds);
    let field = &mut bytes[PIXDIM4_OFFSET..PIXDIM4_OFFSET + 4];
    match timing.endianness {
        Endianness::Little => LittleEndian::write_f32(field, value as f32),
        Endianness::Big => BigEndian::write_f32(field, value as f32),
    }
    debug!(
        "Rewriting pixdim[4] of {:?}: {} -> {} ({:?})",
        path, timing.pixdim4, value, timing.unit
    );

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    if gzipped {
        let mut encoder = GzEncoder::new(tmp.as_file_mut(), Compression::default());
        encoder.write_all(&bytes)?;
        encoder.finish()?;
    } else {
        tmp.as_file_mut().write_all(&bytes)?;
    }
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;

    Ok(NiftiTiming {
        pixdim4: value,
        ..timing
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Write a bare little-endian NIfTI-1 header with no image data
    pub(crate) fn write_minimal_header(path: &Path, pixdim4: f32, xyzt_units: u8, gzip: bool) {
        let mut bytes = vec![0u8; 352];
        LittleEndian::write_i32(&mut bytes[0..4], 348);
        LittleEndian::write_i16(&mut bytes[40..42], 4);
        LittleEndian::write_f32(&mut bytes[PIXDIM4_OFFSET..PIXDIM4_OFFSET + 4], pixdim4);
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

    #[test]
    fn reads_plain_and_gzipped_headers() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("bold.nii");
        let gz = dir.path().join("bold.nii.gz");
        write_minimal_header(&plain, 2.0, 2 | 8, false);
        write_minimal_header(&gz, 2500.0, 2 | 16, true);

        let t = read_header_timing(&plain).unwrap();
        assert_eq!(t.endianness, Endianness::Little);
        assert_eq!(t.unit, TimeUnit::Seconds);
        assert!((t.repetition_time_seconds() - 2.0).abs() < 1e-9);

        let t = read_header_timing(&gz).unwrap();
        assert_eq!(t.unit, TimeUnit::Milliseconds);
        assert!((t.repetition_time_seconds() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn rewrite_keeps_unit_and_compression() {
        let dir = tempfile::tempdir().unwrap();
        let gz = dir.path().join("bold.nii.gz");
        write_minimal_header(&gz, 2000.0, 16, true);

        let written = write_repetition_time(&gz, 1.5).unwrap();
        assert!((written.pixdim4 - 1500.0).abs() < 1e-6);
        assert!(is_gzip(&fs::read(&gz).unwrap()));

        let t = read_header_timing(&gz).unwrap();
        assert!((t.repetition_time_seconds() - 1.5).abs() < 1e-6);
    }

    #[test]
    fn big_endian_header_is_read_and_patched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("be.nii");
        let mut bytes = vec![0u8; 352];
        BigEndian::write_i32(&mut bytes[0..4], 348);
        BigEndian::write_i16(&mut bytes[40..42], 4);
        BigEndian::write_f32(&mut bytes[92..96], 3.0);
        BigEndian::write_f32(&mut bytes[108..112], 352.0);
        bytes[123] = 8;
        bytes[344..348].copy_from_slice(b"n+1\0");
        fs::write(&path, &bytes).unwrap();

        let t = read_header_timing(&path).unwrap();
        assert_eq!(t.endianness, Endianness::Big);
        assert!((t.pixdim4 - 3.0).abs() < 1e-9);

        write_repetition_time(&path, 1.25).unwrap();
        let patched = fs::read(&path).unwrap();
        assert_eq!(BigEndian::read_f32(&patched[92..96]), 1.25);
    }

    #[test]
    fn garbage_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.nii");
        fs::write(&path, b"not a nifti file at all").unwrap();
        assert!(matches!(read_header_timing(&path), Err(Error::Nifti { .. })));
        assert!(matches!(write_repetition_time(&path, 2.0), Err(Error::Nifti { .. })));
    }

    #[test]
    fn time_units() {
        assert_eq!(TimeUnit::from_xyzt_units(2 | 24), TimeUnit::Microseconds);
        assert_eq!(TimeUnit::from_xyzt_units(2), TimeUnit::Unknown);
        assert!((TimeUnit::Milliseconds.seconds_in_unit(2.0) - 2000.0).abs() < 1e-9);
    }
}
