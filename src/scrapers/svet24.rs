//! Svet24 article scraper.
//!
//! Listing entries carry stamps like `21. sep 2017, 08:30` with Slovene or
//! English month abbreviations. Results are not date-ordered, so entries
//! outside the window are only skipped. Comments live in the Facebook
//! comments plugin.

use super::facebook::FacebookComments;
use super::format::{inline_text, selector, selectors};
use super::{
    CommentLocator, CommentThread, DiscoverContext, DiscoveredPage, SiteAdapter, day, resolve, search_url,
    site_base,
};
use crate::config::{DateWindow, SiteConfig};
use crate::error::{Error, Result};
use crate::fetch::HttpClient;
use crate::models::{Article, ShortArticle};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{instrument, warn};
use url::Url;

const MONTHS: &[(&str, u32)] = &[
    ("jan", 1),
    ("feb", 2),
    ("mar", 3),
    ("apr", 4),
    ("maj", 5),
    ("may", 5),
    ("jun", 6),
    ("jul", 7),
    ("avg", 8),
    ("aug", 8),
    ("sep", 9),
    ("okt", 10),
    ("oct", 10),
    ("nov", 11),
    ("dec", 12),
];

struct Selectors {
    pagination: Selector,
    dates: Selector,
    links: Selector,
    title: Selector,
    body: Selector,
    lead: Selector,
    author: Selector,
    app_id: Selector,
}

pub struct Svet24 {
    site: SiteConfig,
    window: DateWindow,
    http: HttpClient,
    base: Url,
    stamp: Regex,
    facebook: FacebookComments,
    sel: Selectors,
    noise: Vec<Selector>,
}

#[derive(Debug)]
struct ArticlePage {
    text: String,
    author: String,
    app_id: String,
}

impl Svet24 {
    pub fn new(site: SiteConfig, window: DateWindow, http: HttpClient) -> Result<Self> {
        let sel = Selectors {
            pagination: selector("div.flex.items-center.justify-center a")?,
            dates: selector("div.sub-article-info")?,
            links: selector("a.sub-article.group.img-lin-grad")?,
            title: selector("h4")?,
            body: selector("div.article-text.article-video-scroll.clearfix")?,
            lead: selector(r#"p[itemprop="description"]"#)?,
            author: selector("span.inline-flex.items-center")?,
            app_id: selector(r#"meta[property="fb:app_id"]"#)?,
        };
        let stamp = Regex::new(r"(\d{1,2})\.\s*(\p{L}{3})\p{L}*\.?\s+(\d{4}),?\s*(\d{1,2}):(\d{2})")
            .map_err(|e| Error::Config(format!("listing stamp pattern: {e}")))?;
        Ok(Self {
            base: site_base(&site)?,
            facebook: FacebookComments::new(&site.comments_url)?,
            noise: selectors(&["div.article-img-desc", "div.author"])?,
            site,
            window,
            http,
            stamp,
            sel,
        })
    }

    fn parse_stamp(&self, text: &str) -> Option<NaiveDateTime> {
        let c = self.stamp.captures(text)?;
        let month_name = c[2].to_lowercase();
        let month = MONTHS.iter().find(|(name, _)| *name == month_name)?.1;
        NaiveDate::from_ymd_opt(c[3].parse().ok()?, month, c[1].parse().ok()?)?
            .and_hms_opt(c[4].parse().ok()?, c[5].parse().ok()?, 0)
    }

    fn parse_page_count(&self, html: &str) -> u32 {
        let doc = Html::parse_document(html);
        let links: Vec<_> = doc.select(&self.sel.pagination).collect();
        links
            .len()
            .checked_sub(2)
            .and_then(|i| inline_text(links[i]).parse().ok())
            .unwrap_or(1)
    }

    fn parse_listing(&self, keyword: &str, html: &str) -> Result<DiscoveredPage> {
        let doc = Html::parse_document(html);
        let dates: Vec<_> = doc.select(&self.sel.dates).collect();
        let links: Vec<_> = doc.select(&self.sel.links).collect();
        if dates.len() != links.len() {
            return Err(Error::parse(format!(
                "listing has {} dates but {} links",
                dates.len(),
                links.len()
            )));
        }

        let mut page = DiscoveredPage::default();
        for (date_div, link) in dates.into_iter().zip(links) {
            let text = date_div.text().collect::<String>();
            let stamp = text.lines().map(str::trim).filter(|l| !l.is_empty()).last().unwrap_or_default();
            let Some(date) = self.parse_stamp(stamp) else {
                warn!(%stamp, "Unparseable listing date");
                continue;
            };
            let Some(url) = link.value().attr("href").and_then(|href| resolve(&self.base, href)) else {
                continue;
            };
            if !self.window.contains(date.date()) {
                continue;
            }
            let title = link.select(&self.sel.title).next().map(inline_text).unwrap_or_default();
            page.articles.push(ShortArticle::new(&self.site, keyword, url, title, day(date)));
        }
        Ok(page)
    }

    fn parse_article(&self, html: &str) -> Option<ArticlePage> {
        let doc = Html::parse_document(html);
        let body = doc.select(&self.sel.body).next()?;
        let app_id = doc
            .select(&self.sel.app_id)
            .next()?
            .value()
            .attr("content")?
            .to_string();
        let author = doc.select(&self.sel.author).next().map(inline_text).unwrap_or_default();
        Some(ArticlePage {
            text: self.format_text(body, doc.select(&self.sel.lead).next()),
            author,
            app_id,
        })
    }
}

#[async_trait(?Send)]
impl SiteAdapter for Svet24 {
    fn site(&self) -> &SiteConfig {
        &self.site
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
        let locator = CommentLocator::Facebook {
            app_id: page.app_id,
            domain: self.base.host_str().unwrap_or_default().to_string(),
            url: short.url.clone(),
        };
        let thread = self.fetch_comments(&locator).await?;
        Ok(Some(Article::new(short.clone(), page.text, &page.author, thread.comments)?))
    }

    async fn fetch_comments(&self, locator: &CommentLocator) -> Result<CommentThread> {
        let CommentLocator::Facebook { app_id, domain, url } = locator else {
            return Err(Error::parse("Svet24 comments are located through Facebook"));
        };
        self.facebook.fetch(&self.http, app_id, domain, url).await
    }

    fn noise(&self) -> &[Selector] {
        &self.noise
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::testing;

    fn adapter() -> Svet24 {
        let site = testing::site(
            "Svet24",
            "si-05",
            "https://novice.svet24.si/iskanje?q={keyword}&stran={page}",
            "https://www.facebook.com/plugins/feedback.php?app_id={id}&href={url}",
        );
        Svet24::new(site, testing::window(), testing::http()).unwrap()
    }

    fn entry(href: &str, title: &str, stamp: &str) -> String {
        format!(
            r#"<a class="sub-article group img-lin-grad" href="{href}"><h4> {title} </h4></a>
               <div class="sub-article-info">
                 Slovenija
                 {stamp}
               </div>"#
        )
    }

    #[test]
    fn test_parse_stamp() {
        let svet24 = adapter();
        let date = svet24.parse_stamp("21. sep 2017, 08:30").unwrap();
        assert_eq!(date.to_string(), "2017-09-21 08:30:00");
        assert_eq!(day(svet24.parse_stamp("3. avg 2016, 17:05").unwrap()), "2016-08-03");
        assert_eq!(day(svet24.parse_stamp("3. Aug 2016, 17:05").unwrap()), "2016-08-03");
        assert!(svet24.parse_stamp("včeraj").is_none());
    }

    #[test]
    fn test_page_count_uses_second_to_last_link() {
        let svet24 = adapter();
        let html = r#"<div class="flex items-center justify-center">
            <a>1</a><a>2</a><a>23</a><a>Naprej</a></div>"#;
        assert_eq!(svet24.parse_page_count(html), 23);
        assert_eq!(svet24.parse_page_count("<div></div>"), 1);
    }

    #[test]
    fn test_listing_skips_out_of_window() {
        let svet24 = adapter();
        let html = [
            entry("/novice/1", "Novo", "2. jan 2021, 10:00"),
            entry("/novice/2", "Jezik in šola", "14. maj 2018, 09:15"),
            entry("/novice/3", "Staro", "1. dec 2014, 12:00"),
        ]
        .concat();
        let page = svet24.parse_listing("jezik", &html).unwrap();
        assert!(!page.stop);
        assert_eq!(page.articles.len(), 1);
        assert_eq!(page.articles[0].url, "https://novice.svet24.si/novice/2");
        assert_eq!(page.articles[0].title(), "Jezik in šola");
        assert_eq!(page.articles[0].time, "2018-05-14");
    }

    #[test]
    fn test_parse_article() {
        let svet24 = adapter();
        let html = r#"<html><head><meta property="fb:app_id" content="99"></head><body>
            <p itemprop="description">Uvod</p>
            <span class="inline-flex items-center"> M. K. </span>
            <div class="article-text article-video-scroll clearfix">
              <p>Besedilo.</p><div class="author">Avtor: M. K.</div>
              <div class="article-img-desc">Foto: Shutterstock</div>
            </div></body></html>"#;
        let page = svet24.parse_article(html).unwrap();
        assert_eq!(page.text, "Uvod. Besedilo.");
        assert_eq!(page.author, "M. K.");
        assert_eq!(page.app_id, "99");
    }
}
