//! Crawl configuration loaded from an optional YAML file.
//!
//! Every field has a built-in default, so the crawler runs without any file:
//!
//! ```yaml
//! min_date: 2015-01-01
//! max_date: 2020-01-01
//! keywords:
//!   slovene: [jezik, jezika]
//!   serbian: [jezik, jezici]
//! http:
//!   timeout_secs: 30
//!   max_retries: 3
//! sites:
//!   Politika:
//!     id: sr-01
//!     search_url: "http://www.politika.rs/search/index/keyword:{keyword}/sort:date/page:{page}"
//!     comments_url: "http://www.politika.rs/api/v1/getComments/{id}?page={page}"
//! ```
//!
//! A `sites` table in the file replaces the built-in one as a whole.

use crate::error::{Error, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument};

const SLOVENE_KEYWORDS: &[&str] = &[
    "jezik", "jezika", "jeziku", "jezikom", "jezikov", "jezikoma", "jezikih", "jeziki", "jezike",
    "jezični", "jezičen", "jezičnega", "jezičnemu", "jezičnem", "jezičnim", "jezična", "jezičnih",
    "jezičnima", "jezične", "jezičnimi", "jezično", "slovenščina", "slovenščine", "slovenščini",
    "slovenščino", "slovenščin", "slovenščinama", "slovenščinah", "slovenščinam", "slovenščinami",
];

const SERBIAN_KEYWORDS: &[&str] = &[
    "jezik", "jezika", "jeziku", "jezikom", "jezici", "jezicima", "jezike", "jezički", "jezičkog",
    "jezičkoga", "jezičkom", "jezičkome", "jezičkomu", "jezičkim", "jezičkima", "jezičkih",
    "jezičke", "jezička", "jezičkoj", "jezičku", "jezičko",
];

const FACEBOOK_COMMENTS_URL: &str = "https://www.facebook.com/plugins/feedback.php?app_id={id}\
&channel=https://staticxx.facebook.com/connect/xd_arbiter.php?origin=https%3A%2F%2F{domain}\
&href={url}";

/// Top-level crawl configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Articles published before this date end a keyword's pagination.
    pub min_date: NaiveDate,
    /// Articles published on or after this date are skipped.
    pub max_date: NaiveDate,
    pub keywords: Keywords,
    pub http: HttpConfig,
    pub sites: BTreeMap<String, SiteConfig>,
}

/// Search keywords per language.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Keywords {
    pub slovene: Vec<String>,
    pub serbian: Vec<String>,
}

/// Settings for the shared HTTP client.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub max_retries: usize,
    pub base_delay_ms: u64,
    pub user_agent: String,
}

/// Per-site settings: short id and URL templates.
///
/// Templates use `{keyword}`, `{page}`, `{year}` and `{id}` placeholders.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Filled from the `sites` table key.
    #[serde(skip)]
    pub name: String,
    pub id: String,
    pub search_url: String,
    #[serde(default)]
    pub comments_url: String,
    /// Known article URLs outside the site search, added after discovery.
    #[serde(default)]
    pub extra_articles: Vec<ExtraArticle>,
}

/// An article URL the site search does not return, with the keyword it is
/// filed under.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExtraArticle {
    pub url: String,
    pub keyword: String,
}

/// Search language of a site, selecting the keyword list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Slovene,
    Serbian,
}

/// Half-open publication window `[min, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub min: NaiveDate,
    pub max: NaiveDate,
}

/// What to do with a listing entry given its publication date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateVerdict {
    Admit,
    /// Too recent; skip it but keep paginating.
    Skip,
    /// Older than the window; newest-first listings stop here.
    Stop,
}

impl DateWindow {
    pub fn check(&self, date: NaiveDate) -> DateVerdict {
        if date >= self.max {
            DateVerdict::Skip
        } else if date < self.min {
            DateVerdict::Stop
        } else {
            DateVerdict::Admit
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.check(date) == DateVerdict::Admit
    }

    /// Calendar years `min.year .. max.year`, for year-paged search forms.
    pub fn years(&self) -> std::ops::Range<i32> {
        use chrono::Datelike;
        self.min.year()..self.max.year()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_date: NaiveDate::from_ymd_opt(2015, 1, 1).unwrap_or_default(),
            max_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default(),
            keywords: Keywords::default(),
            http: HttpConfig::default(),
            sites: default_sites(),
        }
    }
}

impl Default for Keywords {
    fn default() -> Self {
        Self {
            slovene: SLOVENE_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            serbian: SERBIAN_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
            base_delay_ms: 1000,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

fn site(id: &str, search_url: &str, comments_url: &str) -> SiteConfig {
    SiteConfig {
        name: String::new(),
        id: id.to_string(),
        search_url: search_url.to_string(),
        comments_url: comments_url.to_string(),
        extra_articles: Vec::new(),
    }
}

fn default_sites() -> BTreeMap<String, SiteConfig> {
    let mut sites = BTreeMap::new();
    sites.insert(
        "Politika".to_string(),
        site(
            "sr-01",
            "http://www.politika.rs/search/index/keyword:{keyword}/sort:date/page:{page}",
            "http://www.politika.rs/api/v1/getComments/{id}?page={page}",
        ),
    );
    sites.insert(
        "Kurir".to_string(),
        site(
            "sr-02",
            "https://www.kurir.rs/pretraga/{page}?q={keyword}",
            "https://www.kurir.rs/ajax/comments/{id}/{page}",
        ),
    );
    sites.insert(
        "Večer".to_string(),
        site(
            "si-04",
            "https://www.vecer.com/iskalnik?q={keyword}&time_range={year}&page={page}",
            FACEBOOK_COMMENTS_URL,
        ),
    );
    sites.insert(
        "Svet24".to_string(),
        site(
            "si-05",
            "https://novice.svet24.si/iskanje?q={keyword}&stran={page}",
            FACEBOOK_COMMENTS_URL,
        ),
    );
    sites.insert(
        "ur24".to_string(),
        site(
            "si-06",
            "https://www.24ur.com/iskanje?q={keyword}&stran={page}",
            "https://gql.24ur.si/graphql/",
        ),
    );
    for (name, site) in sites.iter_mut() {
        site.name = name.clone();
    }
    sites
}

impl Config {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid YAML, or
    /// describes an empty or inverted date window.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_yaml(&raw)?;
        info!(sites = config.sites.len(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        // an empty document deserializes as unit, not as a defaulted map
        let mut config: Config = if raw.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(raw)?
        };
        for (name, site) in config.sites.iter_mut() {
            site.name = name.clone();
        }
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.min_date >= self.max_date {
            return Err(Error::Config(format!(
                "min_date {} must be before max_date {}",
                self.min_date, self.max_date
            )));
        }
        if let Some((name, _)) = self.sites.iter().find(|(_, s)| s.id.trim().is_empty()) {
            return Err(Error::Config(format!("site `{name}` has an empty id")));
        }
        Ok(())
    }

    /// Look up a configured site by name.
    pub fn site(&self, name: &str) -> Result<&SiteConfig> {
        self.sites
            .get(name)
            .ok_or_else(|| Error::UnknownSite(name.to_string()))
    }

    pub fn window(&self) -> DateWindow {
        DateWindow {
            min: self.min_date,
            max: self.max_date,
        }
    }

    pub fn keywords(&self, language: Language) -> &[String] {
        match language {
            Language::Slovene => &self.keywords.slovene,
            Language::Serbian => &self.keywords.serbian,
        }
    }
}

#[cfg(test)]
impl SiteConfig {
    pub fn named(name: &str, id: &str) -> Self {
        SiteConfig {
            name: name.to_string(),
            id: id.to_string(),
            search_url: String::new(),
            comments_url: String::new(),
            extra_articles: Vec::new(),
        }
    }
}
