//! Kurir article scraper.
//!
//! Search listings are not strictly date-ordered, so entries outside the
//! window are skipped without ending the keyword. Fresh entries carry a
//! relative age (`pre 3h 20m`) instead of a date.
//!
//! Comments are served as HTML fragments, 1-based pages, until an empty
//! page. A row with the `comReply` class answers the closest preceding root.

use super::format::{self, inline_text, inline_text_without, selector, selectors};
use super::{
    CommentLocator, CommentThread, DiscoverContext, DiscoveredPage, SiteAdapter, day, parse_datetime, resolve,
    search_url, site_base,
};
use crate::comments::{CommentTreeBuilder, RawComment};
use crate::config::{DateWindow, Language, SiteConfig};
use crate::error::{Error, Result};
use crate::fetch::HttpClient;
use crate::models::{Article, ShortArticle};
use crate::utils::render_template;
use async_trait::async_trait;
use chrono::{Local, NaiveDateTime, TimeDelta};
use itertools::Itertools;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument, warn};
use url::Url;

const MAX_COMMENT_PAGES: u32 = 1000;

/// Marks a title reconstructed from a URL slug, to be replaced from the page.
pub const PLACEHOLDER_TITLE: &str = "*****";

/// Publication date of an entry that has not been fetched yet.
const UNKNOWN_TIME: &str = "";

/// Paragraphs containing these (lowercased) are photo credits or promos.
const CREDIT_MARKERS: &[&str] = &["foto:", "pogledajte bonus video"];

struct Selectors {
    last_page: Selector,
    item: Selector,
    item_link: Selector,
    item_time: Selector,
    item_title: Selector,
    title_skip: Vec<Selector>,
    author: Selector,
    share: Selector,
    published: Selector,
    body: Selector,
    lead: Selector,
    article_nav: Selector,
    comment: Selector,
    comment_text: Selector,
}

pub struct Kurir {
    site: SiteConfig,
    window: DateWindow,
    http: HttpClient,
    base: Url,
    relative_age: Regex,
    sel: Selectors,
    noise: Vec<Selector>,
}

#[derive(Debug)]
struct ArticlePage {
    text: String,
    author: String,
    article_id: String,
    title: Option<String>,
    time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CommentRow {
    reply: bool,
    record: RawComment,
}

impl Kurir {
    pub fn new(site: SiteConfig, window: DateWindow, http: HttpClient) -> Result<Self> {
        let sel = Selectors {
            last_page: selector("a.pag_last[href]")?,
            item: selector("div.itemContent")?,
            item_link: selector("a.itemLnk[href]")?,
            item_time: selector("div.time")?,
            item_title: selector("h2")?,
            title_skip: selectors(&["span"])?,
            author: selector(r#"span[itemprop="author"] span[itemprop="name"]"#)?,
            share: selector("div.shareWrap[data-title]")?,
            published: selector(r#"span[itemprop="datePublished"][content]"#)?,
            body: selector(r#"div[itemprop="articleBody"]"#)?,
            lead: selector("div.lead")?,
            article_nav: selector("div.articleNav[data-id]")?,
            comment: selector("div.com_comment")?,
            comment_text: selector("div.comTxt")?,
        };
        let relative_age = Regex::new(r"pre\s+(?:(\d+)h)?\s*(?:(\d+)m)?")
            .map_err(|e| Error::Config(format!("relative age pattern: {e}")))?;
        Ok(Self {
            base: site_base(&site)?,
            noise: selectors(&[
                "div.wdgRelated",
                "div.articleImageCaption",
                "div.artSource",
                "div.embeddedContent",
                "div.galNfo",
                r#"span[itemprop="author"]"#,
                r#"span[itemprop="publisher"]"#,
            ])?,
            site,
            window,
            http,
            relative_age,
            sel,
        })
    }

    /// Age of a `pre Xh Ym` listing stamp.
    fn relative_age(&self, text: &str) -> Option<TimeDelta> {
        let captures = self.relative_age.captures(text)?;
        let number = |i: usize| captures.get(i).and_then(|m| m.as_str().parse::<i64>().ok());
        let (hours, minutes) = (number(1), number(2));
        if hours.is_none() && minutes.is_none() {
            return None;
        }
        Some(TimeDelta::hours(hours.unwrap_or(0)) + TimeDelta::minutes(minutes.unwrap_or(0)))
    }

    fn listing_date(&self, text: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
        match self.relative_age(text) {
            Some(age) => Some(now - age),
            None => parse_datetime(text, &["%d-%m-%Y", "%d.%m.%Y."]),
        }
    }

    fn parse_page_count(&self, html: &str) -> u32 {
        let doc = Html::parse_document(html);
        doc.select(&self.sel.last_page)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| href.split('?').next())
            .and_then(|path| path.trim_end_matches('/').rsplit('/').next())
            .and_then(|page| page.parse().ok())
            .unwrap_or(1)
    }

    fn parse_listing(&self, keyword: &str, html: &str, now: NaiveDateTime) -> DiscoveredPage {
        let doc = Html::parse_document(html);
        let mut page = DiscoveredPage::default();
        for item in doc.select(&self.sel.item) {
            let Some(url) = item
                .select(&self.sel.item_link)
                .next()
                .and_then(|a| a.value().attr("href"))
                .and_then(|href| resolve(&self.base, href))
            else {
                continue;
            };
            let Some(date) = item
                .select(&self.sel.item_time)
                .next()
                .and_then(|t| self.listing_date(&inline_text(t), now))
            else {
                debug!(%url, "Listing entry without a readable date");
                continue;
            };
            if !self.window.contains(date.date()) {
                continue;
            }
            let title = item
                .select(&self.sel.item_title)
                .next()
                .map(|h2| inline_text_without(h2, &self.sel.title_skip))
                .unwrap_or_default();
            page.articles.push(ShortArticle::new(&self.site, keyword, url, title, day(date)));
        }
        page
    }

    fn parse_article(&self, html: &str) -> Option<ArticlePage> {
        let doc = Html::parse_document(html);
        let body = doc.select(&self.sel.body).next()?;
        let article_id = doc
            .select(&self.sel.article_nav)
            .next()?
            .value()
            .attr("data-id")?
            .to_string();
        let author = doc
            .select(&self.sel.author)
            .next()
            .map(inline_text)
            .filter(|a| !a.contains("Foto"))
            .unwrap_or_default();
        let title = doc
            .select(&self.sel.share)
            .next()
            .and_then(|s| s.value().attr("data-title"))
            .map(|t| t.trim().to_string());
        let time = doc
            .select(&self.sel.published)
            .next()
            .and_then(|s| s.value().attr("content"))
            .and_then(|c| parse_datetime(c.get(..16).unwrap_or(c), &["%Y-%m-%dT%H:%M"]))
            .map(day);
        Some(ArticlePage {
            text: self.format_text(body, doc.select(&self.sel.lead).next()),
            author,
            article_id,
            title,
            time,
        })
    }

    fn parse_comment_page(&self, html: &str) -> Vec<CommentRow> {
        let doc = Html::parse_fragment(html);
        doc.select(&self.sel.comment)
            .map(|row| {
                let reply = row.value().classes().any(|c| c == "comReply");
                let record = match row.select(&self.sel.comment_text).next() {
                    Some(text) => RawComment::new(text.text().collect::<String>()),
                    None => RawComment::malformed(),
                };
                CommentRow { reply, record }
            })
            .collect()
    }
}

fn is_credit_line(line: &str) -> bool {
    let line = line.to_lowercase();
    CREDIT_MARKERS.iter().any(|marker| line.contains(marker))
}

#[async_trait(?Send)]
impl SiteAdapter for Kurir {
    fn site(&self) -> &SiteConfig {
        &self.site
    }

    fn language(&self) -> Language {
        Language::Serbian
    }

    async fn page_count(&self, keyword: &str, ctx: &DiscoverContext) -> Result<u32> {
        let html = self.http.get_text(&search_url(&self.site, keyword, 1, ctx)).await?;
        Ok(self.parse_page_count(&html))
    }

    #[instrument(level = "debug", skip(self, ctx))]
    async fn discover_page(&self, keyword: &str, page: u32, ctx: &DiscoverContext) -> Result<DiscoveredPage> {
        let html = self.http.get_text(&search_url(&self.site, keyword, page, ctx)).await?;
        Ok(self.parse_listing(keyword, &html, Local::now().naive_local()))
    }

    /// Configured extra URLs, titled from their slug until the full fetch
    /// reads the real title and date.
    fn extra_articles(&self) -> Vec<ShortArticle> {
        self.site
            .extra_articles
            .iter()
            .map(|extra| {
                let slug = extra.url.trim_end_matches('/').rsplit('/').next().unwrap_or_default();
                ShortArticle::new(
                    &self.site,
                    extra.keyword.as_str(),
                    extra.url.as_str(),
                    format!("{slug} {PLACEHOLDER_TITLE}"),
                    UNKNOWN_TIME,
                )
            })
            .collect()
    }

    #[instrument(level = "debug", skip_all, fields(url = %short.url))]
    async fn fetch_full(&self, short: &ShortArticle) -> Result<Option<Article>> {
        let html = self.http.get_text(&short.url).await?;
        let Some(page) = self.parse_article(&html) else {
            return Ok(None);
        };
        let mut short = short.clone();
        if short.title().ends_with(PLACEHOLDER_TITLE) {
            if let Some(title) = page.title {
                short.set_title(title);
            }
            if let Some(time) = page.time {
                short.time = time;
            }
        }
        let thread = self.fetch_comments(&CommentLocator::ArticleId(page.article_id)).await?;
        if !thread.comments.is_empty() {
            debug!(comments = thread.comments.len(), "Fetched comments");
        }
        Ok(Some(Article::new(short, page.text, &page.author, thread.comments)?))
    }

    #[instrument(level = "debug", skip(self))]
    async fn fetch_comments(&self, locator: &CommentLocator) -> Result<CommentThread> {
        let CommentLocator::ArticleId(id) = locator else {
            return Err(Error::parse("Kurir comments are located by article id"));
        };
        let mut builder = CommentTreeBuilder::new();
        let mut previous: Vec<CommentRow> = Vec::new();
        for page in 1..=MAX_COMMENT_PAGES {
            let page_str = page.to_string();
            let url = render_template(&self.site.comments_url, &[("id", id.as_str()), ("page", page_str.as_str())]);
            let response = self.http.get(&url).await?;
            if !response.is_success() || response.body.trim().is_empty() {
                break;
            }
            let rows = self.parse_comment_page(&response.body);
            if rows.is_empty() {
                break;
            }
            if rows == previous {
                warn!(page, "Comment page repeats the previous one");
                break;
            }
            for row in &rows {
                match builder.last_root_id() {
                    Some(root) if row.reply => {
                        builder.push_reply(&root, row.record.clone());
                    }
                    _ => {
                        builder.push_root(row.record.clone());
                    }
                }
            }
            previous = rows;
        }
        Ok(CommentThread::new(builder.finish(), None))
    }

    fn noise(&self) -> &[Selector] {
        &self.noise
    }

    fn format_text(&self, body: ElementRef<'_>, lead: Option<ElementRef<'_>>) -> String {
        format::format_article(body, lead, &self.noise)
            .lines()
            .filter(|line| !is_credit_line(line))
            .join("\n")
    }
}
