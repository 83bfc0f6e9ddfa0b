//! Per-site crawl pipeline.
//!
//! ```text
//! Discovering ──► Snapshotting ──┐
//!                                ├──► Fetching ──► Archiving ──► Done
//! Loaded (snapshot on disk) ─────┘
//! ```
//!
//! Discovery runs only when no snapshot exists. Once the canonical list is
//! saved its ids are final, so a restarted crawl resumes at the fetch phase
//! with the same numbering. Documents already on disk are skipped unless the
//! crawler is told to refetch.

use crate::catalog::canonicalize;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::ShortArticle;
use crate::outputs::archive::archive_documents;
use crate::outputs::document::write_document;
use crate::outputs::{SiteLayout, snapshot};
use crate::scrapers::{DiscoverContext, SiteAdapter};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Pipeline phase, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Discovering,
    Snapshotting,
    Loaded,
    Fetching,
    Archiving,
    Done,
}

/// Counters of one site crawl.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    /// Listing entries found during discovery (0 when resumed from a snapshot).
    pub discovered: usize,
    pub removed_duplicates: usize,
    /// Size of the canonical list.
    pub canonical: usize,
    pub fetched: usize,
    pub skipped_existing: usize,
    pub failed: usize,
    pub archived: usize,
}

/// Discovery output with the number of keyword passes that failed.
#[derive(Debug, Default)]
struct Discovery {
    articles: Vec<ShortArticle>,
    failed: usize,
}

pub struct Crawler<'a> {
    adapter: &'a dyn SiteAdapter,
    config: &'a Config,
    layout: SiteLayout,
    skip_existing: bool,
}

impl<'a> Crawler<'a> {
    pub fn new(adapter: &'a dyn SiteAdapter, config: &'a Config, output_dir: impl AsRef<Path>) -> Self {
        let layout = SiteLayout::new(output_dir, &adapter.site().name);
        Self {
            adapter,
            config,
            layout,
            skip_existing: true,
        }
    }

    /// Whether articles with a document on disk are left alone.
    pub fn skip_existing(mut self, skip: bool) -> Self {
        self.skip_existing = skip;
        self
    }

    pub fn layout(&self) -> &SiteLayout {
        &self.layout
    }

    /// Run the whole pipeline for this site.
    ///
    /// # Errors
    ///
    /// Only failures that leave no consistent state to continue from are
    /// returned: reading or writing the snapshot, building the archive, and
    /// [`Error::IncompleteDiscovery`] when a keyword pass could not be read. In
    /// the last case no snapshot is written, so the next run discovers again.
    /// Article-level failures are counted in the report.
    #[instrument(level = "info", skip_all, fields(site = %self.adapter.site().name))]
    pub async fn run(&self) -> Result<CrawlReport> {
        let t0 = Instant::now();
        let mut report = CrawlReport::default();

        let articles = if self.layout.snapshot_exists() {
            self.enter(Phase::Loaded);
            snapshot::load(&self.layout.snapshot_path()).await?
        } else {
            self.enter(Phase::Discovering);
            let discovered = self.discover().await;
            if discovered.failed > 0 {
                error!(failed = discovered.failed, "Discovery incomplete; not saving a snapshot");
                return Err(Error::IncompleteDiscovery {
                    failed: discovered.failed,
                });
            }
            self.enter(Phase::Snapshotting);
            let canonical = canonicalize(discovered.articles, &self.adapter.site().id);
            report.discovered = canonical.discovered;
            report.removed_duplicates = canonical.removed;
            snapshot::save(&self.layout.snapshot_path(), &canonical.articles).await?;
            canonical.articles
        };
        report.canonical = articles.len();

        self.enter(Phase::Fetching);
        self.fetch_all(&articles, &mut report).await;

        self.enter(Phase::Archiving);
        std::fs::create_dir_all(self.layout.articles_dir())?;
        report.archived = archive_documents(&self.layout.articles_dir(), &self.layout.archive_path())?;

        self.enter(Phase::Done);
        info!(
            discovered = report.discovered,
            removed = report.removed_duplicates,
            canonical = report.canonical,
            fetched = report.fetched,
            skipped = report.skipped_existing,
            failed = report.failed,
            archived = report.archived,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Site crawl finished"
        );
        Ok(report)
    }

    fn enter(&self, phase: Phase) {
        info!(site = %self.adapter.site().name, ?phase, "Entering phase");
    }

    async fn discover(&self) -> Discovery {
        let keywords = self.config.keywords(self.adapter.language());
        let contexts = self.adapter.contexts();
        let mut discovery = Discovery::default();
        for keyword in keywords {
            for ctx in &contexts {
                if !self.discover_keyword(keyword, ctx, &mut discovery.articles).await {
                    discovery.failed += 1;
                }
            }
        }
        let extra = self.adapter.extra_articles();
        if !extra.is_empty() {
            info!(count = extra.len(), "Adding articles from outside the site search");
            discovery.articles.extend(extra);
        }
        info!(count = discovery.articles.len(), failed = discovery.failed, "Discovery finished");
        discovery
    }

    /// Paginate one keyword until the last page, a stop signal or a bad page.
    ///
    /// Returns `false` when the pass could not be read: the page count or the
    /// first page failed, or a later page hit a transport error. A malformed or
    /// repeated later page only ends the keyword.
    #[instrument(level = "info", skip(self, found))]
    async fn discover_keyword(&self, keyword: &str, ctx: &DiscoverContext, found: &mut Vec<ShortArticle>) -> bool {
        let pages = match self.adapter.page_count(keyword, ctx).await {
            Ok(pages) => pages.max(1),
            Err(e) => {
                warn!(error = %e, "Could not read page count");
                return false;
            }
        };
        info!(pages, "Paginating keyword");

        let mut previous: Option<Vec<String>> = None;
        for page in 1..=pages {
            let result = match self.adapter.discover_page(keyword, page, ctx).await {
                Ok(result) => result,
                Err(e) if page == 1 || e.is_transient() => {
                    warn!(page, error = %e, "Listing page could not be read");
                    return false;
                }
                Err(e) => {
                    warn!(page, error = %e, "Malformed listing page; ending keyword");
                    return true;
                }
            };
            let urls: Vec<String> = result.articles.iter().map(|a| a.url.clone()).collect();
            if !urls.is_empty() && previous.as_ref() == Some(&urls) {
                warn!(page, "Listing page repeats the previous one; ending keyword");
                return true;
            }
            debug!(page, count = urls.len(), stop = result.stop, "Listing page");
            found.extend(result.articles);
            if result.stop {
                debug!(page, "Reached articles older than the window");
                return true;
            }
            previous = Some(urls);
        }
        true
    }

    async fn fetch_all(&self, articles: &[ShortArticle], report: &mut CrawlReport) {
        let total = articles.len();
        for (i, short) in articles.iter().enumerate() {
            if self.skip_existing && self.layout.document_exists(short) {
                report.skipped_existing += 1;
                continue;
            }
            info!(n = i + 1, total, url = %short.url, "Fetching article");
            if self.fetch_one(short).await {
                report.fetched += 1;
            } else {
                report.failed += 1;
            }
        }
    }

    async fn fetch_one(&self, short: &ShortArticle) -> bool {
        let article = match self.adapter.fetch_full(short).await {
            Ok(Some(article)) => article,
            Ok(None) => {
                warn!(url = %short.url, "Invalid article page; skipping");
                return false;
            }
            Err(e) => {
                error!(url = %short.url, error = %e, "Article fetch failed; skipping");
                return false;
            }
        };
        if let Some((reported, scraped)) = article.comment_count_mismatch() {
            warn!(url = %short.url, reported, scraped, "Comment count mismatch");
        }
        let path = self.layout.document_path(&article.local_id);
        match write_document(&path, &article).await {
            Ok(()) => {
                debug!(document = %article.document_name, path = %path.display(), "Stored article");
                true
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Could not store article");
                false
            }
        }
    }
}
