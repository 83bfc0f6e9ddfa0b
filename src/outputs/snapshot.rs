//! Canonical-list snapshot.
//!
//! The snapshot is a bincode encoding of the deduplicated, sorted and numbered
//! [`ShortArticle`] list. Its presence is what tells a restarted crawl that
//! discovery is done; it is loaded verbatim and never regenerated.

use super::write_atomic;
use crate::error::Result;
use crate::models::ShortArticle;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

#[instrument(level = "info", skip_all, fields(path = %path.display(), count = articles.len()))]
pub async fn save(path: &Path, articles: &[ShortArticle]) -> Result<()> {
    let bytes = bincode::serde::encode_to_vec(articles, bincode::config::standard())?;
    write_atomic(path, &bytes).await?;
    info!(bytes = bytes.len(), "Saved article list snapshot");
    Ok(())
}

#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn load(path: &Path) -> Result<Vec<ShortArticle>> {
    let bytes = fs::read(path).await?;
    let (articles, _): (Vec<ShortArticle>, usize) =
        bincode::serde::decode_from_slice(&bytes, bincode::config::standard())?;
    info!(count = articles.len(), "Loaded article list snapshot");
    Ok(articles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::canonicalize;
    use crate::config::SiteConfig;

    #[tokio::test]
    async fn test_snapshot_preserves_ids_and_titles() {
        let site = SiteConfig::named("Politika", "sr-01");
        let discovered = vec![
            ShortArticle::new(&site, "jezik", "http://p/2", "Ћирилица", "2016-03-01"),
            ShortArticle::new(&site, "jezika", "http://p/1", "Abeceda", "2017-04-02"),
        ];
        let canonical = canonicalize(discovered, "sr-01").articles;

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("data/news_list");
        save(&path, &canonical).await.unwrap();
        let loaded = load(&path).await.unwrap();

        assert_eq!(loaded.len(), 2);
        for (a, b) in canonical.iter().zip(&loaded) {
            assert_eq!(a.url, b.url);
            assert_eq!(a.id, b.id);
            assert_eq!(a.title(), b.title());
            assert_eq!(a.title_transliterated(), b.title_transliterated());
            assert_eq!(a.keyword, b.keyword);
            assert_eq!(a.time, b.time);
        }
        assert_eq!(loaded[1].title_transliterated(), "Ćirilica");
    }

    #[tokio::test]
    async fn test_load_missing_snapshot_fails() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(load(&tmp.path().join("news_list")).await.is_err());
    }
}
