//! Politika article scraper.
//!
//! Search results are paged HTML sorted by date, newest first, so the first
//! entry older than the window ends a keyword. Comments come from a JSON API
//! keyed by a foreign key embedded in the article's comment form:
//!
//! ```text
//! GET {comments_url}?page=N                          top-level threads, 404 past the end
//! GET {comments_url}?page=N&parent_id=P&ids=a,b      further replies of thread P
//! ```
//!
//! A thread carries its first replies inline (`SubComment`); the remaining
//! ones are paged separately and continue the same reply numbering.

use super::format::{inline_text, selector, selectors};
use super::{
    CommentLocator, CommentThread, DiscoverContext, DiscoveredPage, SiteAdapter, day, parse_datetime, resolve,
    search_url, site_base,
};
use crate::comments::{CommentTreeBuilder, RawComment};
use crate::config::{DateVerdict, DateWindow, Language, SiteConfig};
use crate::error::{Error, Result};
use crate::fetch::HttpClient;
use crate::models::{Article, ShortArticle};
use crate::utils::render_template;
use async_trait::async_trait;
use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

const DATE_FORMATS: &[&str] = &["%d.%m.%Y, %H:%M", "%d.%m.%Y"];
const MAX_COMMENT_PAGES: u32 = 1000;

struct Selectors {
    pagination: Selector,
    dates: Selector,
    titles: Selector,
    item_date: Selector,
    item_time: Selector,
    link: Selector,
    body: Selector,
    lead: Selector,
    author: Selector,
    comment_form: Selector,
    comment_total: Selector,
}

pub struct Politika {
    site: SiteConfig,
    window: DateWindow,
    http: HttpClient,
    base: Url,
    sel: Selectors,
    noise: Vec<Selector>,
}

/// Fields of an article page the pipeline needs.
#[derive(Debug)]
struct ArticlePage {
    text: String,
    author: String,
    foreign_key: Option<String>,
    reported: Option<usize>,
}

/// A top-level thread of one comment page.
#[derive(Debug)]
struct ThreadRecord {
    key: String,
    record: RawComment,
    reply_keys: Vec<String>,
}

#[derive(Deserialize)]
struct CommentPage {
    #[serde(default)]
    data: Vec<Value>,
}

#[derive(Deserialize)]
struct Thread {
    #[serde(rename = "Comment")]
    comment: Entry,
    #[serde(rename = "SubComment", default)]
    sub_comments: Vec<Entry>,
}

#[derive(Deserialize)]
struct Entry {
    #[serde(default)]
    id: Value,
    text: String,
}

#[derive(Deserialize)]
struct Reply {
    #[serde(rename = "Comment")]
    comment: Entry,
}

impl Politika {
    pub fn new(site: SiteConfig, window: DateWindow, http: HttpClient) -> Result<Self> {
        let sel = Selectors {
            pagination: selector("div.pagination ul li")?,
            dates: selector("div.arial.light-gray.inline-block.uppercase.border-left.px1.ml1")?,
            titles: selector("div.clearfix.h4.bold.roboto-slab.mt1")?,
            item_date: selector("span.item-date")?,
            item_time: selector("span.item-time")?,
            link: selector("a[href]")?,
            body: selector("div.article-content.mt3.mb3")?,
            lead: selector("div.h4.mt0.mb2.regular.roboto-slab")?,
            author: selector(r#"meta[name="author"]"#)?,
            comment_form: selector("form.clearfix.mxn1.comment-form")?,
            comment_total: selector("a.px1.light-blue")?,
        };
        Ok(Self {
            base: site_base(&site)?,
            noise: selectors(&["div.caption-title", "div.article-content.mt3.mb3"])?,
            site,
            window,
            http,
            sel,
        })
    }

    fn parse_page_count(&self, html: &str) -> u32 {
        let doc = Html::parse_document(html);
        doc.select(&self.sel.pagination)
            .last()
            .and_then(|li| inline_text(li).parse().ok())
            .unwrap_or(1)
    }

    fn parse_listing(&self, keyword: &str, html: &str) -> Result<DiscoveredPage> {
        let doc = Html::parse_document(html);
        let dates: Vec<_> = doc.select(&self.sel.dates).collect();
        let titles: Vec<_> = doc.select(&self.sel.titles).collect();
        if dates.len() != titles.len() {
            return Err(Error::parse(format!(
                "listing has {} dates but {} titles",
                dates.len(),
                titles.len()
            )));
        }

        let mut page = DiscoveredPage::default();
        for (date_div, title_div) in dates.into_iter().zip(titles) {
            let Some(date_text) = date_div.select(&self.sel.item_date).next().map(inline_text) else {
                continue;
            };
            let time = date_div
                .select(&self.sel.item_time)
                .next()
                .map(inline_text)
                .and_then(|t| t.rsplit(' ').next().map(str::to_string));
            let stamp = match time {
                Some(time) => format!("{date_text}, {time}"),
                None => date_text,
            };
            let Some(date) = parse_datetime(&stamp, DATE_FORMATS) else {
                warn!(%stamp, "Unparseable listing date");
                continue;
            };
            let Some(url) = title_div
                .select(&self.sel.link)
                .next()
                .and_then(|a| a.value().attr("href"))
                .and_then(|href| resolve(&self.base, href))
            else {
                continue;
            };
            match self.window.check(date.date()) {
                DateVerdict::Skip => continue,
                DateVerdict::Stop => {
                    page.stop = true;
                    break;
                }
                DateVerdict::Admit => page.articles.push(ShortArticle::new(
                    &self.site,
                    keyword,
                    url,
                    inline_text(title_div),
                    day(date),
                )),
            }
        }
        Ok(page)
    }

    fn parse_article(&self, html: &str) -> Option<ArticlePage> {
        let doc = Html::parse_document(html);
        let body = doc.select(&self.sel.body).next()?;
        let lead = doc.select(&self.sel.lead).next();
        let author = doc
            .select(&self.sel.author)
            .next()
            .and_then(|meta| meta.value().attr("content"))
            .unwrap_or_default()
            .to_string();
        let foreign_key = doc
            .select(&self.sel.comment_form)
            .next()
            .and_then(|form| form.value().attr("data-foreign-key"))
            .map(str::to_string);
        let reported = doc
            .select(&self.sel.comment_total)
            .next()
            .and_then(|a| inline_text(a).parse().ok());
        Some(ArticlePage {
            text: self.format_text(body, lead),
            author,
            foreign_key,
            reported,
        })
    }

    fn comments_url(&self, key: &str, page: u32) -> String {
        let page = page.to_string();
        render_template(&self.site.comments_url, &[("id", key), ("page", page.as_str())])
    }

    /// Append the separately paged replies of one thread.
    async fn extend_replies(&self, builder: &mut CommentTreeBuilder, root: &str, key: &str, thread: &ThreadRecord) {
        let ids = thread.reply_keys.join(",");
        for page in 1..=MAX_COMMENT_PAGES {
            let url = format!("{}&parent_id={}&ids={}", self.comments_url(key, page), thread.key, ids);
            let body = match self.http.get_text(&url).await {
                Ok(body) => body,
                Err(e) => {
                    warn!(parent = %thread.key, page, error = %e, "Reply page failed");
                    return;
                }
            };
            let replies = match parse_replies(&body) {
                Ok(replies) if !replies.is_empty() => replies,
                Ok(_) => return,
                Err(e) => {
                    debug!(parent = %thread.key, page, error = %e, "Unreadable reply page");
                    return;
                }
            };
            for reply in replies {
                builder.push_reply(root, reply);
            }
        }
    }
}

fn strip_bom(body: &str) -> &str {
    body.trim_start_matches('\u{feff}')
}

fn key_string(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Threads of a top-level page; unreadable entries are `None`.
fn parse_threads(body: &str) -> Result<Vec<Option<ThreadRecord>>> {
    let page: CommentPage = serde_json::from_str(strip_bom(body))?;
    Ok(page
        .data
        .into_iter()
        .map(|entry| {
            let thread: Thread = serde_json::from_value(entry).ok()?;
            let reply_keys = thread.sub_comments.iter().map(|s| key_string(&s.id)).collect();
            let replies = thread
                .sub_comments
                .into_iter()
                .map(|s| RawComment::new(s.text))
                .collect();
            Some(ThreadRecord {
                key: key_string(&thread.comment.id),
                record: RawComment::new(thread.comment.text).with_replies(replies),
                reply_keys,
            })
        })
        .collect())
}

fn parse_replies(body: &str) -> Result<Vec<RawComment>> {
    let page: CommentPage = serde_json::from_str(strip_bom(body))?;
    Ok(page
        .data
        .into_iter()
        .map(|entry| match serde_json::from_value::<Reply>(entry) {
            Ok(reply) => RawComment::new(reply.comment.text),
            Err(_) => RawComment::malformed(),
        })
        .collect())
}

#[async_trait(?Send)]
impl SiteAdapter for Politika {
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
        self.parse_listing(keyword, &html)
    }

    #[instrument(level = "debug", skip_all, fields(url = %short.url))]
    async fn fetch_full(&self, short: &ShortArticle) -> Result<Option<Article>> {
        let html = self.http.get_text(&short.url).await?;
        let Some(page) = self.parse_article(&html) else {
            return Ok(None);
        };
        let thread = match page.foreign_key {
            Some(key) => self.fetch_comments(&CommentLocator::ForeignKey(key)).await?,
            None => {
                warn!(url = %short.url, "Article has no comment foreign key");
                CommentThread::default()
            }
        };
        let article = Article::new(short.clone(), page.text, &page.author, thread.comments)?
            .with_reported_comments(page.reported);
        Ok(Some(article))
    }

    #[instrument(level = "debug", skip(self))]
    async fn fetch_comments(&self, locator: &CommentLocator) -> Result<CommentThread> {
        let CommentLocator::ForeignKey(key) = locator else {
            return Err(Error::parse("Politika comments are located by foreign key"));
        };
        let mut builder = CommentTreeBuilder::new();
        for page in 1..=MAX_COMMENT_PAGES {
            let response = self.http.get(&self.comments_url(key, page)).await?;
            if response.status == 404 {
                break;
            }
            let threads = match parse_threads(&response.into_success()?) {
                Ok(threads) => threads,
                Err(e) => {
                    warn!(page, error = %e, "Unreadable comment page");
                    break;
                }
            };
            if threads.is_empty() {
                break;
            }
            for thread in threads {
                let Some(thread) = thread else {
                    builder.push_root(RawComment::malformed());
                    continue;
                };
                let has_replies = !thread.reply_keys.is_empty();
                let Some(root) = builder.push_root(thread.record.clone()) else {
                    continue;
                };
                if has_replies {
                    self.extend_replies(&mut builder, &root, key, &thread).await;
                }
            }
        }
        Ok(CommentThread::new(builder.finish(), None))
    }

    fn noise(&self) -> &[Selector] {
        &self.noise
    }
}
