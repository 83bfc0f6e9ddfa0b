//! Data models for discovered articles, fetched articles and their comments.
//!
//! This module defines the core data structures used throughout the crawl:
//! - [`ShortArticle`]: a search-result stub (url, title, date) found during discovery
//! - [`Article`]: the fully fetched article, built from a [`ShortArticle`]
//! - [`Comment`]: one node of an article's comment thread
//!
//! Identity of a [`ShortArticle`] is its URL: equality and hashing look at
//! nothing else, which is what duplicate removal relies on.

use crate::config::SiteConfig;
use crate::error::{Error, Result};
use crate::transliterate::transliterate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::hash::{Hash, Hasher};

/// A search-result reference to an article.
///
/// `title_transliterated` is derived from `title`, so the title can only be
/// changed through [`ShortArticle::set_title`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortArticle {
    /// The search keyword that found this article.
    pub keyword: String,
    /// Canonical article URL; the identity of the article within a site.
    pub url: String,
    title: String,
    title_transliterated: String,
    /// Publication date, `YYYY-MM-DD`.
    pub time: String,
    /// Human-readable site name, e.g. `Politika`.
    pub site_name: String,
    /// Short site code, e.g. `sr-01`.
    pub site_id: String,
    /// `"{site_id}-{rank}"`, assigned once the canonical list is built.
    pub id: Option<String>,
}

impl ShortArticle {
    pub fn new(
        site: &SiteConfig,
        keyword: impl Into<String>,
        url: impl Into<String>,
        title: impl Into<String>,
        time: impl Into<String>,
    ) -> Self {
        let title = title.into();
        Self {
            keyword: keyword.into(),
            url: url.into(),
            title_transliterated: transliterate(&title),
            title,
            time: time.into(),
            site_name: site.name.clone(),
            site_id: site.id.clone(),
            id: None,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn title_transliterated(&self) -> &str {
        &self.title_transliterated
    }

    /// Replace the title, keeping the transliterated copy in sync.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.title_transliterated = transliterate(&self.title);
    }

    /// The numeric part of `id` once the `"{site_id}-"` prefix is stripped.
    ///
    /// This is the on-disk file stem of the article's document.
    pub fn local_id(&self) -> Option<&str> {
        let id = self.id.as_deref()?;
        id.strip_prefix(self.site_id.as_str())
            .and_then(|rest| rest.strip_prefix('-'))
    }
}

impl PartialEq for ShortArticle {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}

impl Eq for ShortArticle {}

impl Hash for ShortArticle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.url.hash(state);
    }
}

/// A fully fetched article, ready to be written as a document.
///
/// Articles are streamed: each one is serialized right after it is fetched and
/// then dropped.
#[derive(Debug, Clone)]
pub struct Article {
    /// The canonical-list entry this article was fetched from.
    pub short: ShortArticle,
    /// `"{id}.xml"`.
    pub document_name: String,
    /// `id` without the site prefix.
    pub local_id: String,
    /// Formatted body text.
    pub text: String,
    pub text_transliterated: String,
    /// Transliterated author line, empty when unknown.
    pub author: String,
    /// Comments in depth-first thread order.
    pub comments: Vec<Comment>,
    /// Comment total advertised by the page, when it shows one. Not persisted.
    pub reported_comments: Option<usize>,
}

impl Article {
    /// Build an article from its canonical-list entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the entry has no id yet, which means it did
    /// not come from a canonical list.
    pub fn new(
        short: ShortArticle,
        text: impl Into<String>,
        author: &str,
        comments: Vec<Comment>,
    ) -> Result<Self> {
        let id = short
            .id
            .clone()
            .ok_or_else(|| Error::parse(format!("article {} has no id", short.url)))?;
        let local_id = short
            .local_id()
            .map(str::to_string)
            .ok_or_else(|| Error::parse(format!("id {id} lacks site prefix {}", short.site_id)))?;
        let text = text.into();
        Ok(Self {
            document_name: format!("{id}.xml"),
            local_id,
            text_transliterated: transliterate(&text),
            text,
            author: transliterate(author.trim()),
            comments,
            reported_comments: None,
            short,
        })
    }

    pub fn with_reported_comments(mut self, reported: Option<usize>) -> Self {
        self.reported_comments = reported;
        self
    }

    pub fn id(&self) -> &str {
        self.short.id.as_deref().unwrap_or_default()
    }

    pub fn source_id(&self) -> &str {
        &self.short.site_id
    }

    pub fn source_name(&self) -> &str {
        &self.short.site_name
    }

    /// `Some((reported, scraped))` when the page advertised a different number
    /// of comments than were collected.
    pub fn comment_count_mismatch(&self) -> Option<(usize, usize)> {
        let reported = self.reported_comments?;
        (reported != self.comments.len()).then_some((reported, self.comments.len()))
    }
}

/// A single comment of an article thread.
///
/// `id` is the path of 1-based sibling ranks from the root, joined with
/// hyphens (`"3"`, `"3-2"`, `"3-2-1"`); `parent_id` is the id of the direct
/// parent, or empty for a root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub parent_id: String,
    pub text: String,
    pub text_transliterated: String,
}

impl Comment {
    pub fn new(id: impl Into<String>, parent_id: impl Into<String>, raw_text: &str) -> Self {
        let text = normalize_comment_text(raw_text);
        Self {
            id: id.into(),
            parent_id: parent_id.into(),
            text_transliterated: transliterate(&text),
            text,
        }
    }

    /// Nesting depth; roots are depth 1.
    pub fn depth(&self) -> usize {
        self.id.matches('-').count() + 1
    }
}

/// Fold line breaks into single spaces, decode XML entities and trim.
pub fn normalize_comment_text(raw: &str) -> String {
    // breaks become a space, not nothing, so words split across lines stay apart
    let single_line = raw
        .replace('\r', "")
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .join(" ");
    match quick_xml::escape::unescape(&single_line) {
        Ok(Cow::Owned(decoded)) => decoded.trim().to_string(),
        // borrowed: nothing to decode; error: stray `&`, keep the text as scraped
        _ => single_line.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn site() -> SiteConfig {
        SiteConfig::named("Politika", "sr-01")
    }

    #[test]
    fn test_short_article_identity_is_url() {
        let a = ShortArticle::new(&site(), "jezik", "https://x/1", "Prvi", "2018-01-01");
        let b = ShortArticle::new(&site(), "jezika", "https://x/1", "Drugi", "2019-02-02");
        let c = ShortArticle::new(&site(), "jezik", "https://x/2", "Prvi", "2018-01-01");
        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_set_title_recomputes_transliteration() {
        let mut a = ShortArticle::new(&site(), "jezik", "https://x/1", "Језик", "2018-01-01");
        assert_eq!(a.title_transliterated(), "Jezik");
        a.set_title("Писмо");
        assert_eq!(a.title(), "Писмо");
        assert_eq!(a.title_transliterated(), "Pismo");
    }

    #[test]
    fn test_local_id_strips_site_prefix() {
        let mut a = ShortArticle::new(&site(), "jezik", "https://x/1", "A", "2018-01-01");
        assert_eq!(a.local_id(), None);
        a.id = Some("sr-01-42".to_string());
        assert_eq!(a.local_id(), Some("42"));
    }

    #[test]
    fn test_article_derived_fields() {
        let mut short = ShortArticle::new(&site(), "jezik", "https://x/1", "Наслов", "2018-01-01");
        short.id = Some("sr-01-7".to_string());
        let article = Article::new(short, "Текст", "  Петар Петровић ", vec![]).unwrap();
        assert_eq!(article.document_name, "sr-01-7.xml");
        assert_eq!(article.local_id, "7");
        assert_eq!(article.source_id(), "sr-01");
        assert_eq!(article.source_name(), "Politika");
        assert_eq!(article.text_transliterated, "Tekst");
        assert_eq!(article.author, "Petar Petrović");
    }

    #[test]
    fn test_article_requires_id() {
        let short = ShortArticle::new(&site(), "jezik", "https://x/1", "A", "2018-01-01");
        assert!(Article::new(short, "t", "", vec![]).is_err());
    }

    #[test]
    fn test_comment_count_mismatch() {
        let mut short = ShortArticle::new(&site(), "jezik", "https://x/1", "A", "2018-01-01");
        short.id = Some("sr-01-1".to_string());
        let comments = vec![Comment::new("1", "", "a"), Comment::new("1-1", "1", "b")];
        let article = Article::new(short, "t", "", comments).unwrap();

        assert_eq!(article.clone().comment_count_mismatch(), None);
        assert_eq!(
            article.clone().with_reported_comments(Some(2)).comment_count_mismatch(),
            None
        );
        assert_eq!(
            article.with_reported_comments(Some(5)).comment_count_mismatch(),
            Some((5, 2))
        );
    }

    #[test]
    fn test_comment_text_normalization() {
        let c = Comment::new("2-1", "2", "  Prvi red\r\n\n drugi &amp; &quot;treći&quot; &lt;b&gt; ");
        assert_eq!(c.text, "Prvi red drugi & \"treći\" <b>");
        assert_eq!(c.depth(), 2);
        assert_eq!(Comment::new("1", "", "jedan\ndva").text, "jedan dva");
    }

    #[test]
    fn test_comment_text_with_stray_ampersand() {
        let c = Comment::new("1", "", "A & B");
        assert_eq!(c.text, "A & B");
        assert_eq!(c.depth(), 1);
    }
}
