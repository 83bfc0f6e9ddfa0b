//! Zip bundle of a site's documents.
//!
//! Entries are added in file-name order and carry the zip format's fixed
//! default timestamp, so unchanged documents give an identical archive.

use super::tmp_path;
use crate::error::Result;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// Bundle every `*.xml` file in `dir` into the zip file at `archive`.
///
/// Returns the number of documents archived. The archive is built next to its
/// final path and renamed into place once complete.
#[instrument(level = "info", skip_all, fields(dir = %dir.display(), archive = %archive.display()))]
pub fn archive_documents(dir: &Path, archive: &Path) -> Result<usize> {
    let mut documents: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "xml"))
        .collect();
    documents.sort();

    let tmp = tmp_path(archive);
    let mut zip = ZipWriter::new(File::create(&tmp)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for path in &documents {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        zip.start_file(name, options)?;
        zip.write_all(&fs::read(path)?)?;
    }
    zip.finish()?;
    fs::rename(&tmp, archive)?;

    info!(documents = documents.len(), "Archived site documents");
    Ok(documents.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_archive_contains_only_documents() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        fs::write(dir.join("2.xml"), "<document global-id=\"x-2\"/>").unwrap();
        fs::write(dir.join("1.xml"), "<document global-id=\"x-1\"/>").unwrap();
        fs::write(dir.join("notes.txt"), "ignored").unwrap();
        let archive_path = dir.join("Test.zip");

        assert_eq!(archive_documents(dir, &archive_path).unwrap(), 2);
        // a second run must not pick up the previous archive
        assert_eq!(archive_documents(dir, &archive_path).unwrap(), 2);

        let mut zip = zip::ZipArchive::new(File::open(&archive_path).unwrap()).unwrap();
        assert_eq!(zip.len(), 2);
        assert_eq!(zip.by_index(0).unwrap().name(), "1.xml");
        let mut content = String::new();
        zip.by_name("2.xml").unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "<document global-id=\"x-2\"/>");
    }

    #[test]
    fn test_archive_is_reproducible() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        fs::write(dir.join("1.xml"), "<document/>").unwrap();
        let archive_path = dir.join("Test.zip");

        archive_documents(dir, &archive_path).unwrap();
        let first = fs::read(&archive_path).unwrap();
        archive_documents(dir, &archive_path).unwrap();
        assert_eq!(first, fs::read(&archive_path).unwrap());
    }
}
