//! Persisted crawl state and output files.
//!
//! This module contains submodules responsible for everything the crawler
//! writes to disk:
//!
//! # Submodules
//!
//! - [`snapshot`]: the canonical article list that marks discovery as complete
//! - [`document`]: one XML document per fetched article
//! - [`archive`]: a zip bundle of all documents of a site
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! └── Politika/
//!     └── data/
//!         ├── news_list          # snapshot
//!         └── articles/
//!             ├── 1.xml
//!             ├── 2.xml
//!             └── Politika.zip
//! ```
//!
//! Files are written to a `.tmp` sibling and renamed into place, so an
//! interrupted run never leaves a half-written snapshot or document behind.

pub mod archive;
pub mod document;
pub mod snapshot;

use crate::error::Result;
use crate::models::ShortArticle;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Paths of one site's persisted state.
#[derive(Debug, Clone)]
pub struct SiteLayout {
    site_name: String,
    data_dir: PathBuf,
}

impl SiteLayout {
    pub fn new(output_dir: impl AsRef<Path>, site_name: &str) -> Self {
        Self {
            site_name: site_name.to_string(),
            data_dir: output_dir.as_ref().join(site_name).join("data"),
        }
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join("news_list")
    }

    pub fn articles_dir(&self) -> PathBuf {
        self.data_dir.join("articles")
    }

    pub fn document_path(&self, local_id: &str) -> PathBuf {
        self.articles_dir().join(format!("{local_id}.xml"))
    }

    pub fn archive_path(&self) -> PathBuf {
        self.articles_dir().join(format!("{}.zip", self.site_name))
    }

    /// Whether discovery has already completed for this site.
    pub fn snapshot_exists(&self) -> bool {
        self.snapshot_path().is_file()
    }

    /// Whether the document of a canonical-list entry is already on disk.
    pub fn document_exists(&self, article: &ShortArticle) -> bool {
        article
            .local_id()
            .is_some_and(|local_id| self.document_path(local_id).is_file())
    }
}

/// Write `bytes` to `path` through a temporary file and a rename.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let tmp = tmp_path(path);
    let mut file = fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(&tmp, path).await?;
    Ok(())
}

pub(crate) fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
