//! Večer article scraper.
//!
//! The search form filters by calendar year, so discovery runs one pass per
//! year of the window. Comments live in the Facebook comments plugin.

use super::facebook::FacebookComments;
use super::format::{inline_text, selector, selectors};
use super::{
    CommentLocator, CommentThread, DiscoverContext, DiscoveredPage, SiteAdapter, day, parse_datetime, resolve,
    search_url, site_base,
};
use crate::config::{DateWindow, SiteConfig};
use crate::error::{Error, Result};
use crate::fetch::HttpClient;
use crate::models::{Article, ShortArticle};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument, warn};
use url::Url;

struct Selectors {
    last_page: Selector,
    titles: Selector,
    dates: Selector,
    link: Selector,
    body: Selector,
    lead: Selector,
    author: Selector,
    app_id: Selector,
}

pub struct Vecer {
    site: SiteConfig,
    window: DateWindow,
    http: HttpClient,
    base: Url,
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

impl Vecer {
    pub fn new(site: SiteConfig, window: DateWindow, http: HttpClient) -> Result<Self> {
        let sel = Selectors {
            last_page: selector("a.Pagination-link.last[data-page]")?,
            titles: selector("div.card_title.has_ellipsis")?,
            dates: selector("div.card_date")?,
            link: selector("a[href]")?,
            body: selector("div.itemFullText")?,
            lead: selector("h2.itemSubTitle")?,
            author: selector("div.col-authorname")?,
            app_id: selector(r#"meta[property="fb:app_id"]"#)?,
        };
        Ok(Self {
            base: site_base(&site)?,
            facebook: FacebookComments::new(&site.comments_url)?,
            noise: selectors(&["div.ArticleImage-description"])?,
            site,
            window,
            http,
            sel,
        })
    }

    fn parse_page_count(&self, html: &str) -> u32 {
        let doc = Html::parse_document(html);
        doc.select(&self.sel.last_page)
            .next()
            .and_then(|a| a.value().attr("data-page"))
            .and_then(|page| page.trim().parse().ok())
            .unwrap_or(1)
    }

    fn parse_listing(&self, keyword: &str, html: &str) -> Result<DiscoveredPage> {
        let doc = Html::parse_document(html);
        let titles: Vec<_> = doc.select(&self.sel.titles).collect();
        let dates: Vec<_> = doc.select(&self.sel.dates).collect();
        if titles.len() != dates.len() {
            return Err(Error::parse(format!(
                "listing has {} titles but {} dates",
                titles.len(),
                dates.len()
            )));
        }

        let mut page = DiscoveredPage::default();
        for (title_div, date_div) in titles.into_iter().zip(dates) {
            let stamp = inline_text(date_div);
            let Some(date) = parse_datetime(&stamp, &["%d.%m.%Y, %H.%M", "%d.%m.%Y"]) else {
                warn!(%stamp, "Unparseable listing date");
                continue;
            };
            // the card two levels up holds the link
            let Some(url) = card(date_div)
                .and_then(|card| card.select(&self.sel.link).next())
                .and_then(|a| a.value().attr("href"))
                .and_then(|href| resolve(&self.base, href))
            else {
                continue;
            };
            if self.window.contains(date.date()) {
                page.articles.push(ShortArticle::new(
                    &self.site,
                    keyword,
                    url,
                    inline_text(title_div),
                    day(date),
                ));
            }
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

fn card(date_div: ElementRef<'_>) -> Option<ElementRef<'_>> {
    date_div.parent()?.parent().and_then(ElementRef::wrap)
}

#[async_trait(?Send)]
impl SiteAdapter for Vecer {
    fn site(&self) -> &SiteConfig {
        &self.site
    }

    fn contexts(&self) -> Vec<DiscoverContext> {
        self.window
            .years()
            .map(|year| DiscoverContext { year: Some(year) })
            .collect()
    }

    async fn page_count(&self, keyword: &str, ctx: &DiscoverContext) -> Result<u32> {
        let html = self.http.get_text(&search_url(&self.site, keyword, 1, ctx)).await?;
        Ok(self.parse_page_count(&html))
    }

    #[instrument(level = "debug", skip(self))]
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
        if !thread.comments.is_empty() {
            debug!(comments = thread.comments.len(), "Fetched comments");
        }
        Ok(Some(Article::new(short.clone(), page.text, &page.author, thread.comments)?))
    }

    async fn fetch_comments(&self, locator: &CommentLocator) -> Result<CommentThread> {
        let CommentLocator::Facebook { app_id, domain, url } = locator else {
            return Err(Error::parse("Večer comments are located through Facebook"));
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

    fn adapter() -> Vecer {
        let site = testing::site(
            "Večer",
            "si-04",
            "https://www.vecer.com/iskalnik?q={keyword}&time_range={year}&page={page}",
            "https://www.facebook.com/plugins/feedback.php?app_id={id}&href={url}",
        );
        Vecer::new(site, testing::window(), testing::http()).unwrap()
    }

    fn card_html(href: &str, title: &str, date: &str) -> String {
        format!(
            r#"<div class="card"><a href="{href}"><img src="x.jpg"></a><div class="card_body">
                 <div class="card_title has_ellipsis"> {title} </div>
                 <div class="card_date">{date}</div>
               </div></div>"#
        )
    }

    #[test]
    fn test_one_context_per_year() {
        let years: Vec<_> = adapter().contexts().into_iter().map(|c| c.year.unwrap()).collect();
        assert_eq!(years, vec![2015, 2016, 2017, 2018, 2019]);
    }

    #[test]
    fn test_page_count() {
        let vecer = adapter();
        let html = r##"<a class="Pagination-link last" data-page="8" href="#">»</a>"##;
        assert_eq!(vecer.parse_page_count(html), 8);
        assert_eq!(vecer.parse_page_count(""), 1);
    }

    #[test]
    fn test_listing() {
        let vecer = adapter();
        let html = format!(
            "<section>{}{}</section>",
            card_html("/slovenija/jezik-1", "Slovenščina v šoli", "21.09.2017, 08.30"),
            card_html("/svet/staro-2", "Staro", "31.12.2014, 23.00"),
        );
        let page = vecer.parse_listing("jezik", &html).unwrap();
        assert!(!page.stop);
        assert_eq!(page.articles.len(), 1);
        assert_eq!(page.articles[0].url, "https://www.vecer.com/slovenija/jezik-1");
        assert_eq!(page.articles[0].title(), "Slovenščina v šoli");
        assert_eq!(page.articles[0].time, "2017-09-21");
    }

    #[test]
    fn test_parse_article() {
        let vecer = adapter();
        let html = r#"<html><head><meta property="fb:app_id" content="1234"></head><body>
            <h2 class="itemSubTitle">Podnaslov.</h2>
            <div class="col-authorname"> Ana Novak </div>
            <div class="itemFullText"><p>Prvi.</p>
              <div class="ArticleImage-description">Foto: arhiv</div><p>Drugi.</p></div>
        </body></html>"#;
        let page = vecer.parse_article(html).unwrap();
        assert_eq!(page.text, "Podnaslov. Prvi.\nDrugi.");
        assert_eq!(page.author, "Ana Novak");
        assert_eq!(page.app_id, "1234");

        let without_app = r#"<div class="itemFullText"><p>Prvi.</p></div>"#;
        assert!(vecer.parse_article(without_app).is_none());
    }
}
