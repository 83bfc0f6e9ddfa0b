//! XML article documents.
//!
//! One document is written per fetched article:
//!
//! ```xml
//! <?xml version="1.0" encoding="utf-8"?>
//! <document global-id="sr-01-7">
//!   <url>…</url><source-id>sr-01</source-id><local-id>7</local-id><source-name>Politika</source-name>
//!   <article>
//!     <article-title/><article-title-transliterated/><article-time/>
//!     <article-author/><article-text/><article-text-transliterated/>
//!   </article>
//!   <comments>
//!     <comments-count>1</comments-count>
//!     <comment-list>
//!       <comment comment-id="1">
//!         <comment-parent-id/><comment-text/><comment-text-transliterated/>
//!       </comment>
//!     </comment-list>
//!   </comments>
//! </document>
//! ```
//!
//! Text is stored decoded; only the characters XML itself requires are
//! escaped on output. Serialization is deterministic, so writing the same
//! article twice produces identical bytes.

use super::write_atomic;
use crate::error::Result;
use crate::models::Article;
use quick_xml::se::{QuoteLevel, Serializer};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, instrument};

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="utf-8"?>"#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "document", rename_all = "kebab-case")]
pub struct Document {
    #[serde(rename = "@global-id")]
    pub global_id: String,
    pub url: String,
    pub source_id: String,
    pub local_id: String,
    pub source_name: String,
    pub article: DocumentArticle,
    pub comments: DocumentComments,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DocumentArticle {
    pub article_title: String,
    pub article_title_transliterated: String,
    pub article_time: String,
    pub article_author: String,
    pub article_text: String,
    pub article_text_transliterated: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DocumentComments {
    pub comments_count: usize,
    pub comment_list: CommentList,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentList {
    #[serde(rename = "comment", default)]
    pub comments: Vec<DocumentComment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DocumentComment {
    #[serde(rename = "@comment-id")]
    pub comment_id: String,
    pub comment_parent_id: String,
    pub comment_text: String,
    pub comment_text_transliterated: String,
}

impl Document {
    pub fn from_article(article: &Article) -> Self {
        let comments = article
            .comments
            .iter()
            .map(|c| DocumentComment {
                comment_id: c.id.clone(),
                comment_parent_id: c.parent_id.clone(),
                comment_text: xml_text(&c.text),
                comment_text_transliterated: xml_text(&c.text_transliterated),
            })
            .collect::<Vec<_>>();
        Self {
            global_id: article.id().to_string(),
            url: xml_text(&article.short.url),
            source_id: article.source_id().to_string(),
            local_id: article.local_id.clone(),
            source_name: article.source_name().to_string(),
            article: DocumentArticle {
                article_title: xml_text(article.short.title()),
                article_title_transliterated: xml_text(article.short.title_transliterated()),
                article_time: article.short.time.clone(),
                article_author: xml_text(&article.author),
                article_text: xml_text(&article.text),
                article_text_transliterated: xml_text(&article.text_transliterated),
            },
            comments: DocumentComments {
                comments_count: comments.len(),
                comment_list: CommentList { comments },
            },
        }
    }

    pub fn to_xml(&self) -> Result<String> {
        let mut xml = String::from(XML_DECLARATION);
        let mut serializer = Serializer::new(&mut xml);
        serializer.set_quote_level(QuoteLevel::Minimal);
        self.serialize(serializer)?;
        Ok(xml)
    }

    pub fn from_xml(xml: &str) -> Result<Self> {
        Ok(quick_xml::de::from_str(xml)?)
    }
}

/// Drop characters XML 1.0 cannot carry: C0 controls other than tab, LF and
/// CR, and the noncharacters U+FFFE and U+FFFF.
fn xml_text(text: &str) -> String {
    text.chars()
        .filter(|&c| matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && c != '\u{FFFE}' && c != '\u{FFFF}'))
        .collect()
}

/// Serialize an article and write it to `path`.
#[instrument(level = "info", skip_all, fields(path = %path.display(), id = %article.id()))]
pub async fn write_document(path: &Path, article: &Article) -> Result<()> {
    let xml = Document::from_article(article).to_xml()?;
    write_atomic(path, xml.as_bytes()).await?;
    debug!(bytes = xml.len(), comments = article.comments.len(), "Wrote article document");
    Ok(())
}
