//! Canonical article list: duplicate removal, ordering and id assignment.
//!
//! Discovery returns the same article many times (once per matching keyword).
//! The canonical list keeps one entry per URL, sorts by transliterated title
//! and numbers the entries `"{site_id}-1"`, `"{site_id}-2"`, ... in that order.
//! The numbering depends only on position, so the same discovery output always
//! yields the same ids.

use crate::models::ShortArticle;
use itertools::Itertools;
use tracing::{info, instrument};

/// Keep the first article seen for every URL.
///
/// Returns the surviving articles in their original relative order together
/// with the number of entries removed.
#[instrument(level = "info", skip_all, fields(input = articles.len()))]
pub fn remove_duplicates(articles: Vec<ShortArticle>) -> (Vec<ShortArticle>, usize) {
    let original = articles.len();
    let unique: Vec<ShortArticle> = articles
        .into_iter()
        .unique_by(|a| a.url.clone())
        .collect();
    let removed = original - unique.len();
    info!(removed, from = original, "Removed duplicate articles");
    (unique, removed)
}

/// Stable ascending sort by transliterated title.
pub fn sort(mut articles: Vec<ShortArticle>) -> Vec<ShortArticle> {
    articles.sort_by(|a, b| a.title_transliterated().cmp(b.title_transliterated()));
    info!(count = articles.len(), "Articles sorted by title");
    articles
}

/// Assign `"{site_id}-{rank}"` ids, rank being the 1-based position.
pub fn build_ids(articles: &mut [ShortArticle], site_id: &str) {
    for (i, article) in articles.iter_mut().enumerate() {
        article.id = Some(format!("{site_id}-{}", i + 1));
    }
    info!(count = articles.len(), %site_id, "Article ids built");
}

/// The canonical list and how it was derived.
#[derive(Debug, Clone)]
pub struct Canonical {
    pub articles: Vec<ShortArticle>,
    pub discovered: usize,
    pub removed: usize,
}

/// Dedup, sort and number a discovery result in one step.
pub fn canonicalize(articles: Vec<ShortArticle>, site_id: &str) -> Canonical {
    let discovered = articles.len();
    let (unique, removed) = remove_duplicates(articles);
    let mut articles = sort(unique);
    build_ids(&mut articles, site_id);
    Canonical {
        articles,
        discovered,
        removed,
    }
}
