//! KMZ archives: a zip container holding one KML document

use crate::{Result, SplitError};
use std::fs::File;
use std::io::{BufReader, Read, Seek, Write};
use std::path::Path;
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

/// Entry name used for the document inside written archives
pub const KMZ_ENTRY_NAME: &str = "doc.kml";

/// Return the text of the first `.kml` entry in the archive
pub fn extract_kml<R: Read + Seek>(reader: R) -> Result<String> {
    let mut archive = zip::ZipArchive::new(reader)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_file() && entry.name().to_ascii_lowercase().ends_with(".kml") {
            tracing::debug!("Reading KML entry '{}' ({} bytes)", entry.name(), entry.size());
            let mut text = String::new();
            entry.read_to_string(&mut text)?;
            return Ok(text);
        }
    }

    Err(SplitError::NotFound(format!(
        "no .kml document among {} archive entries",
        archive.len()
    )))
}

/// Open a KMZ file and return the text of its first `.kml` entry
pub fn extract_kml_from_path(path: &Path) -> Result<String> {
    extract_kml(BufReader::new(File::open(path)?))
}

/// Write `kml` as the single deflate-compressed entry of a new archive
pub fn package_kml<W: Write + Seek>(writer: W, kml: &str) -> Result<W> {
    let mut archive = zip::ZipWriter::new(writer);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    archive.start_file(KMZ_ENTRY_NAME, options)?;
    archive.write_all(kml.as_bytes())?;
    Ok(archive.finish()?)
}
