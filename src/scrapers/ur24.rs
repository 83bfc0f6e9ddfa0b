//! 24ur article scraper.
//!
//! Listing and article pages are read through the adapter's [`PageRenderer`]
//! handle. Comments come from a GraphQL endpoint, 100 per page, with replies
//! nested to any depth:
//!
//! ```text
//! {comments( itemType: ARTICLE itemId: 123 page: 1 perPage: 100 ) {total totalShown comments {id body replies {...}}}}
//! ```

use super::format::{inline_text, selector};
use super::render::PageRenderer;
use super::{
    CommentLocator, CommentThread, DiscoverContext, DiscoveredPage, SiteAdapter, day, parse_datetime, resolve,
    search_url, site_base,
};
use crate::comments::{CommentTreeBuilder, RawComment};
use crate::config::{DateVerdict, DateWindow, SiteConfig};
use crate::error::{Error, Result};
use crate::fetch::{Fetch, HttpClient, Request};
use crate::models::{Article, ShortArticle};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

const PER_PAGE: u64 = 100;
const MAX_COMMENT_PAGES: u32 = 1000;
const DATE_FORMATS: &[&str] = &["%d.%m.%Y, %H:%M", "%d.%m.%Y"];

struct Selectors {
    pagination: Selector,
    details: Selector,
    title: Selector,
    body: Selector,
    author: Selector,
    article_id: Selector,
}

pub struct Ur24 {
    site: SiteConfig,
    window: DateWindow,
    http: HttpClient,
    renderer: Box<dyn PageRenderer>,
    base: Url,
    sel: Selectors,
}

#[derive(Debug)]
struct ArticlePage {
    text: String,
    author: String,
    article_id: String,
}

impl Ur24 {
    pub fn new(site: SiteConfig, window: DateWindow, http: HttpClient, renderer: Box<dyn PageRenderer>) -> Result<Self> {
        let sel = Selectors {
            pagination: selector(".pagination .pagination__item[href]")?,
            details: selector(".card__details")?,
            title: selector(".card__title-inside")?,
            body: selector(".article__body")?,
            author: selector(".article__details-main")?,
            article_id: selector(r#"meta[name="onl:articleId"]"#)?,
        };
        Ok(Self {
            base: site_base(&site)?,
            site,
            window,
            http,
            renderer,
            sel,
        })
    }

    fn parse_page_count(&self, html: &str) -> u32 {
        let doc = Html::parse_document(html);
        doc.select(&self.sel.pagination)
            .last()
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| href.rsplit("stran=").next())
            .and_then(|page| page.split('&').next())
            .and_then(|page| page.parse().ok())
            .unwrap_or(1)
    }

    fn parse_listing(&self, keyword: &str, html: &str) -> DiscoveredPage {
        let doc = Html::parse_document(html);
        let mut page = DiscoveredPage::default();
        for details in doc.select(&self.sel.details) {
            let stamp = inline_text(details);
            let Some(date) = parse_datetime(&stamp, DATE_FORMATS) else {
                debug!(%stamp, "Card without a readable date");
                continue;
            };
            let Some(url) = enclosing_link(details).and_then(|href| resolve(&self.base, href)) else {
                continue;
            };
            let title = details
                .parent()
                .and_then(ElementRef::wrap)
                .and_then(|card| card.select(&self.sel.title).next())
                .map(inline_text)
                .unwrap_or_default();
            match self.window.check(date.date()) {
                DateVerdict::Skip => continue,
                DateVerdict::Stop => {
                    page.stop = true;
                    break;
                }
                DateVerdict::Admit => {
                    page.articles.push(ShortArticle::new(&self.site, keyword, url, title, day(date)));
                }
            }
        }
        page
    }

    fn parse_article(&self, html: &str) -> Option<ArticlePage> {
        let doc = Html::parse_document(html);
        let body = doc.select(&self.sel.body).next()?;
        let article_id = doc
            .select(&self.sel.article_id)
            .next()?
            .value()
            .attr("content")?
            .to_string();
        let author = doc.select(&self.sel.author).next().map(inline_text).unwrap_or_default();
        Some(ArticlePage {
            text: self.format_text(body, None),
            author,
            article_id,
        })
    }
}

/// `href` of the card link wrapping a listing element.
fn enclosing_link(element: ElementRef<'_>) -> Option<&str> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "a")
        .and_then(|a| a.value().attr("href"))
}

fn comments_query(article_id: &str, page: u32) -> String {
    format!(
        "{{comments( itemType: ARTICLE itemId: {article_id} page: {page} perPage: {PER_PAGE} )  \
         {{total totalShown comments {{id body replies {{id body}}}}}}}}"
    )
}

/// A GraphQL comment and its replies, recursively.
fn raw_comment(value: &Value) -> RawComment {
    let replies = value
        .get("replies")
        .and_then(Value::as_array)
        .map(|replies| replies.iter().map(raw_comment).collect())
        .unwrap_or_default();
    let body = value.get("body").and_then(Value::as_str).map(str::to_string);
    RawComment { body, replies }
}

fn as_count(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

#[async_trait(?Send)]
impl SiteAdapter for Ur24 {
    fn site(&self) -> &SiteConfig {
        &self.site
    }

    async fn page_count(&self, keyword: &str, ctx: &DiscoverContext) -> Result<u32> {
        let html = self.renderer.render(&search_url(&self.site, keyword, 1, ctx)).await?;
        Ok(self.parse_page_count(&html))
    }

    #[instrument(level = "debug", skip(self, ctx))]
    async fn discover_page(&self, keyword: &str, page: u32, ctx: &DiscoverContext) -> Result<DiscoveredPage> {
        let html = self.renderer.render(&search_url(&self.site, keyword, page, ctx)).await?;
        Ok(self.parse_listing(keyword, &html))
    }

    #[instrument(level = "debug", skip_all, fields(url = %short.url))]
    async fn fetch_full(&self, short: &ShortArticle) -> Result<Option<Article>> {
        let html = self.renderer.render(&short.url).await?;
        let Some(page) = self.parse_article(&html) else {
            return Ok(None);
        };
        let thread = self.fetch_comments(&CommentLocator::ArticleId(page.article_id)).await?;
        let article =
            Article::new(short.clone(), page.text, &page.author, thread.comments)?.with_reported_comments(thread.reported);
        Ok(Some(article))
    }

    #[instrument(level = "debug", skip(self))]
    async fn fetch_comments(&self, locator: &CommentLocator) -> Result<CommentThread> {
        let CommentLocator::ArticleId(id) = locator else {
            return Err(Error::parse("24ur comments are located by article id"));
        };
        let mut builder = CommentTreeBuilder::new();
        let mut reported = None;
        for page in 1..=MAX_COMMENT_PAGES {
            let request = Request::post(&self.site.comments_url, comments_query(id, page), "application/graphql");
            let response = self.http.fetch(&request).await?;
            if !response.is_success() {
                warn!(page, status = response.status, "Comment page failed");
                break;
            }
            let json: Value = match serde_json::from_str(&response.body) {
                Ok(json) => json,
                Err(e) => {
                    warn!(page, error = %e, "Unreadable comment page");
                    break;
                }
            };
            let Some(total) = json.pointer("/data/comments/total").and_then(as_count) else {
                warn!(page, "Comment page without a total");
                break;
            };
            reported = Some(total as usize);
            let records: Vec<RawComment> = json
                .pointer("/data/comments/comments")
                .and_then(Value::as_array)
                .map(|comments| comments.iter().map(raw_comment).collect())
                .unwrap_or_default();
            if total == 0 || records.is_empty() {
                break;
            }
            builder.push_roots(records);
            if u64::from(page) >= total.div_ceil(PER_PAGE) {
                break;
            }
        }
        Ok(CommentThread::new(builder.finish(), reported))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::testing;
    use serde_json::json;
    use std::collections::HashMap;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Serves canned pages in place of a browser.
    struct CannedRenderer(HashMap<String, String>);

    #[async_trait(?Send)]
    impl PageRenderer for CannedRenderer {
        async fn render(&self, url: &str) -> Result<String> {
            self.0
                .get(url)
                .cloned()
                .ok_or_else(|| Error::HttpStatus { url: url.to_string(), status: 404 })
        }
    }

    fn adapter(comments_url: &str, pages: &[(&str, &str)]) -> Ur24 {
        let site = testing::site("ur24", "si-06", "https://www.24ur.com/iskanje?q={keyword}&stran={page}", comments_url);
        let pages = pages.iter().map(|(u, h)| (u.to_string(), h.to_string())).collect();
        Ur24::new(site, testing::window(), testing::http(), Box::new(CannedRenderer(pages))).unwrap()
    }

    fn card(href: &str, title: &str, stamp: &str) -> String {
        format!(
            r#"<a href="{href}"><div class="card"><div class="card__wrap"><div class="card__content">
                 <span class="card__title-inside">{title}</span>
                 <div class="card__details">{stamp}</div>
               </div></div></div></a>"#
        )
    }

    #[tokio::test]
    async fn test_discovery_through_renderer() {
        let listing = [
            card("/novice/slovenija/jezik-1", "Jezik v šolah", "05.03.2019, 10:20"),
            card("/novice/svet/novo", "Novo", "02.01.2020, 10:00"),
            card("/novice/slovenija/jezik-2", "Slovenščina", "11.11.2016"),
            card("/novice/arhiv/staro", "Staro", "30.12.2014, 09:00"),
            card("/novice/arhiv/starejse", "Starejše", "01.01.2014, 09:00"),
        ]
        .concat();
        let first = r#"<div class="pagination">
            <a class="pagination__item" href="/iskanje?q=jezik&stran=2">2</a>
            <a class="pagination__item" href="/iskanje?q=jezik&stran=31">Konec</a></div>"#;
        let ur24 = adapter(
            "http://localhost/graphql/",
            &[
                ("https://www.24ur.com/iskanje?q=jezik&stran=1", first),
                ("https://www.24ur.com/iskanje?q=jezik&stran=4", &listing),
            ],
        );
        let ctx = DiscoverContext::default();

        assert_eq!(ur24.page_count("jezik", &ctx).await.unwrap(), 31);
        let page = ur24.discover_page("jezik", 4, &ctx).await.unwrap();
        assert!(page.stop);
        let found: Vec<_> = page.articles.iter().map(|a| (a.url.as_str(), a.time.as_str())).collect();
        assert_eq!(
            found,
            vec![
                ("https://www.24ur.com/novice/slovenija/jezik-1", "2019-03-05"),
                ("https://www.24ur.com/novice/slovenija/jezik-2", "2016-11-11"),
            ]
        );
        assert_eq!(page.articles[0].title(), "Jezik v šolah");
        assert!(ur24.discover_page("jezik", 5, &ctx).await.is_err());
    }

    #[test]
    fn test_raw_comment_handles_deep_and_broken_records() {
        let value = json!({"id": 1, "body": "a", "replies": [
            {"id": 2, "body": "b", "replies": [{"id": 3, "body": "c"}]},
            {"id": 4}
        ]});
        let record = raw_comment(&value);
        assert_eq!(record.body.as_deref(), Some("a"));
        assert_eq!(record.replies[0].replies[0].body.as_deref(), Some("c"));
        assert!(record.replies[1].body.is_none());
    }

    #[test]
    fn test_comments_query() {
        assert_eq!(
            comments_query("123", 2),
            "{comments( itemType: ARTICLE itemId: 123 page: 2 perPage: 100 )  \
             {total totalShown comments {id body replies {id body}}}}"
        );
    }

    #[tokio::test]
    async fn test_graphql_comment_pagination() {
        let server = MockServer::start().await;
        let page1 = json!({"data": {"comments": {"total": 150, "totalShown": 100, "comments": [
            {"id": 1, "body": "Prvi", "replies": [
                {"id": 2, "body": "Odgovor", "replies": [{"id": 3, "body": "Globlje"}]}
            ]},
            {"id": 4, "body": "Drugi", "replies": []}
        ]}}});
        let page2 = json!({"data": {"comments": {"total": "150", "comments": [
            {"id": 5, "body": "Tretji"}
        ]}}});
        Mock::given(method("POST"))
            .and(path("/graphql/"))
            .and(header("content-type", "application/graphql"))
            .and(body_string_contains("itemId: 777 page: 1 "))
            .respond_with(ResponseTemplate::new(200).set_body_json(page1))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/graphql/"))
            .and(body_string_contains("itemId: 777 page: 2 "))
            .respond_with(ResponseTemplate::new(200).set_body_json(page2))
            .expect(1)
            .mount(&server)
            .await;

        let ur24 = adapter(&format!("{}/graphql/", server.uri()), &[]);
        let thread = ur24
            .fetch_comments(&CommentLocator::ArticleId("777".to_string()))
            .await
            .unwrap();
        let tree: Vec<_> = thread
            .comments
            .iter()
            .map(|c| (c.id.as_str(), c.parent_id.as_str(), c.text.as_str()))
            .collect();
        assert_eq!(
            tree,
            vec![
                ("1", "", "Prvi"),
                ("1-1", "1", "Odgovor"),
                ("1-1-1", "1-1", "Globlje"),
                ("2", "", "Drugi"),
                ("3", "", "Tretji"),
            ]
        );
        assert_eq!(thread.reported, Some(150));
    }

    #[tokio::test]
    async fn test_article_without_comments() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"comments": {"total": 0}}})))
            .mount(&server)
            .await;
        let article_url = "https://www.24ur.com/novice/slovenija/jezik-1";
        let html = r#"<html><head><meta name="onl:articleId" content="777"></head><body>
            <div class="article__details-main">Ana Novak | 24ur.com</div>
            <div class="article__body"><p>Prvi odstavek.</p><script>track()</script><p>Drugi.</p></div>
            </body></html>"#;
        let ur24 = adapter(&format!("{}/graphql/", server.uri()), &[(article_url, html)]);
        let mut short = ShortArticle::new(ur24.site(), "jezik", article_url, "Jezik", "2019-03-05");
        short.id = Some("si-06-1".to_string());

        let article = ur24.fetch_full(&short).await.unwrap().unwrap();
        assert_eq!(article.text, "Prvi odstavek.\nDrugi.");
        assert_eq!(article.author, "Ana Novak | 24ur.com");
        assert!(article.comments.is_empty());
        assert_eq!(article.comment_count_mismatch(), None);
    }
}
