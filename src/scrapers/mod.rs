//! Newspaper site adapters.
//!
//! Each site module implements [`SiteAdapter`], the capability set the crawl
//! pipeline drives:
//!
//! 1. **Discovery**: `page_count` and `discover_page` walk a keyword's search
//!    results, optionally once per [`DiscoverContext`] (e.g. per year)
//! 2. **Fetching**: `fetch_full` downloads one article and its comments
//!
//! # Supported Sources
//!
//! | Source | Module | Id | Discovery | Comments |
//! |--------|--------|----|-----------|----------|
//! | Politika | [`politika`] | sr-01 | paged HTML search | REST JSON, paged per thread |
//! | Kurir | [`kurir`] | sr-02 | paged HTML search | paged HTML |
//! | Večer | [`vecer`] | si-04 | paged HTML search per year | Facebook plugin |
//! | Svet24 | [`svet24`] | si-05 | paged HTML search | Facebook plugin |
//! | 24ur | [`ur24`] | si-06 | rendered pages | GraphQL, nested replies |
//!
//! # Common Patterns
//!
//! - Selectors are compiled once in the adapter constructor
//! - HTML is parsed in synchronous helpers that return owned data, so no parsed
//!   document is held across an `.await`
//! - `Ok(None)` from `fetch_full` means the page did not have the expected
//!   structure; network problems are `Err`

pub mod facebook;
pub mod format;
pub mod kurir;
pub mod politika;
pub mod render;
pub mod svet24;
pub mod ur24;
pub mod vecer;

use crate::config::{Config, Language, SiteConfig};
use crate::error::{Error, Result};
use crate::fetch::HttpClient;
use crate::models::{Article, Comment, ShortArticle};
use crate::utils::render_template;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use scraper::{ElementRef, Selector};
use url::Url;

/// Adapter-specific pagination state for one discovery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoverContext {
    pub year: Option<i32>,
}

/// One page of search results.
#[derive(Debug, Clone, Default)]
pub struct DiscoveredPage {
    pub articles: Vec<ShortArticle>,
    /// An article older than the window was reached; stop paginating.
    pub stop: bool,
}

/// Where a comment thread lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentLocator {
    /// Foreign key of a site-hosted comment API.
    ForeignKey(String),
    /// The site's numeric article id.
    ArticleId(String),
    /// Facebook comments plugin attached to a page.
    Facebook {
        app_id: String,
        domain: String,
        url: String,
    },
}

/// A flattened comment thread and the total the site claims to have.
#[derive(Debug, Clone, Default)]
pub struct CommentThread {
    pub comments: Vec<Comment>,
    pub reported: Option<usize>,
}

impl CommentThread {
    pub fn new(comments: Vec<Comment>, reported: Option<usize>) -> Self {
        Self { comments, reported }
    }
}

/// Capability set of one newspaper.
#[async_trait(?Send)]
pub trait SiteAdapter {
    fn site(&self) -> &SiteConfig;

    /// Selects the keyword list used for discovery.
    fn language(&self) -> Language {
        Language::Slovene
    }

    /// Discovery passes run for every keyword.
    fn contexts(&self) -> Vec<DiscoverContext> {
        vec![DiscoverContext::default()]
    }

    /// Number of result pages for a keyword, 1 when it cannot be told.
    async fn page_count(&self, keyword: &str, ctx: &DiscoverContext) -> Result<u32>;

    async fn discover_page(&self, keyword: &str, page: u32, ctx: &DiscoverContext) -> Result<DiscoveredPage>;

    /// Entries added to the discovery result from outside the site search.
    fn extra_articles(&self) -> Vec<ShortArticle> {
        Vec::new()
    }

    async fn fetch_full(&self, short: &ShortArticle) -> Result<Option<Article>>;

    async fn fetch_comments(&self, locator: &CommentLocator) -> Result<CommentThread>;

    /// Elements dropped from article bodies.
    fn noise(&self) -> &[Selector] {
        &[]
    }

    fn format_text(&self, body: ElementRef<'_>, lead: Option<ElementRef<'_>>) -> String {
        format::format_article(body, lead, self.noise())
    }
}

/// Build the adapter for a configured site.
///
/// # Errors
///
/// [`Error::UnknownSite`] when no adapter exists for the site name, or a
/// configuration error when one of its URL templates is unusable.
pub fn build_adapter(site: &SiteConfig, config: &Config, http: HttpClient) -> Result<Box<dyn SiteAdapter>> {
    let window = config.window();
    let site = site.clone();
    let adapter: Box<dyn SiteAdapter> = match site.name.as_str() {
        "Politika" => Box::new(politika::Politika::new(site, window, http)?),
        "Kurir" => Box::new(kurir::Kurir::new(site, window, http)?),
        "Večer" => Box::new(vecer::Vecer::new(site, window, http)?),
        "Svet24" => Box::new(svet24::Svet24::new(site, window, http)?),
        "ur24" => {
            let renderer = render::HttpRenderer::new(http.clone());
            Box::new(ur24::Ur24::new(site, window, http, Box::new(renderer))?)
        }
        other => return Err(Error::UnknownSite(other.to_string())),
    };
    Ok(adapter)
}

/// Fill a search URL template.
pub(crate) fn search_url(site: &SiteConfig, keyword: &str, page: u32, ctx: &DiscoverContext) -> String {
    let keyword = urlencoding::encode(keyword);
    let page = page.to_string();
    let year = ctx.year.map(|y| y.to_string()).unwrap_or_default();
    render_template(
        &site.search_url,
        &[("keyword", keyword.as_ref()), ("page", page.as_str()), ("year", year.as_str())],
    )
}

/// Base URL relative listing links are resolved against.
pub(crate) fn site_base(site: &SiteConfig) -> Result<Url> {
    Url::parse(&site.search_url)
        .map_err(|e| Error::Config(format!("site `{}` search_url: {e}", site.name)))
}

pub(crate) fn resolve(base: &Url, href: &str) -> Option<String> {
    base.join(href.trim()).ok().map(|u| u.to_string())
}

/// Listing dates are stored as `YYYY-MM-DD`.
pub(crate) fn day(date: NaiveDateTime) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parse `text` with the first matching format; date-only formats mean midnight.
pub(crate) fn parse_datetime(text: &str, formats: &[&str]) -> Option<NaiveDateTime> {
    let text = text.trim();
    formats.iter().find_map(|fmt| {
        NaiveDateTime::parse_from_str(text, fmt).ok().or_else(|| {
            chrono::NaiveDate::parse_from_str(text, fmt)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
    })
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_adapter_for_every_default_site() {
        let config = Config::default();
        for (name, site) in &config.sites {
            let adapter = build_adapter(site, &config, testing::http()).unwrap();
            assert_eq!(&adapter.site().name, name);
        }
    }

    #[test]
    fn test_build_adapter_unknown_site() {
        let config = Config::default();
        let site = testing::site("Nope", "xx-01", "http://localhost/", "");
        assert!(matches!(
            build_adapter(&site, &config, testing::http()),
            Err(Error::UnknownSite(name)) if name == "Nope"
        ));
    }

    #[test]
    fn test_search_url_encodes_keyword() {
        let site = testing::site("Večer", "si-04", "https://v/iskalnik?q={keyword}&time_range={year}&page={page}", "");
        let ctx = DiscoverContext { year: Some(2016) };
        assert_eq!(
            search_url(&site, "jezični", 3, &ctx),
            "https://v/iskalnik?q=jezi%C4%8Dni&time_range=2016&page=3"
        );
    }

    #[test]
    fn test_parse_datetime_formats() {
        let formats = ["%d.%m.%Y, %H:%M", "%d.%m.%Y"];
        assert_eq!(day(parse_datetime("12.03.2018, 14:35", &formats).unwrap()), "2018-03-12");
        assert_eq!(day(parse_datetime(" 01.02.2017 ", &formats).unwrap()), "2017-02-01");
        assert!(parse_datetime("yesterday", &formats).is_none());
    }

    #[test]
    fn test_resolve_relative_links() {
        let site = testing::site("Politika", "sr-01", "http://www.politika.rs/search/index/keyword:{keyword}", "");
        let base = site_base(&site).unwrap();
        assert_eq!(
            resolve(&base, "/scc/clanak/1/naslov").unwrap(),
            "http://www.politika.rs/scc/clanak/1/naslov"
        );
        assert_eq!(resolve(&base, "https://other/x").unwrap(), "https://other/x");
    }
}
