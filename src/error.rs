//! Crate-wide error type.
//!
//! Per-article failures are absorbed by the crawl loop, so most of these
//! variants end up as a single `error!`/`warn!` line rather than a process
//! exit. Only configuration problems ([`Error::UnknownSite`],
//! [`Error::Config`], [`Error::Selector`]) are meant to stop a run;
//! [`Error::IncompleteDiscovery`] stops a single site.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML config error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("XML serialization error: {0}")]
    XmlSerialize(#[from] quick_xml::se::SeError),

    #[error("XML deserialization error: {0}")]
    XmlDeserialize(#[from] quick_xml::de::DeError),

    #[error("snapshot encode error: {0}")]
    SnapshotEncode(#[from] bincode::error::EncodeError),

    #[error("snapshot decode error: {0}")]
    SnapshotDecode(#[from] bincode::error::DecodeError),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("invalid CSS selector `{0}`")]
    Selector(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("unknown site `{0}`")]
    UnknownSite(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("discovery incomplete: {failed} keyword passes failed")]
    IncompleteDiscovery { failed: usize },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn parse(msg: impl Into<String>) -> Self {
        Error::Parse(msg.into())
    }

    /// Network-level failures, as opposed to pages that were read but not understood.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Http(_) | Error::HttpStatus { .. })
    }
}
