//! Page rendering for sites whose markup is assembled client-side.
//!
//! The adapter that needs rendered pages owns a [`PageRenderer`] handle,
//! acquired when the adapter is built and released when it is dropped.
//! [`HttpRenderer`] is the default: it returns the server-delivered HTML,
//! which is enough whenever the listing and article markup is served
//! pre-rendered. A browser-backed renderer can be plugged in behind the
//! same trait.

use crate::error::Result;
use crate::fetch::HttpClient;
use async_trait::async_trait;
use tracing::instrument;

#[async_trait(?Send)]
pub trait PageRenderer {
    /// The HTML of `url` after rendering.
    async fn render(&self, url: &str) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct HttpRenderer {
    http: HttpClient,
}

impl HttpRenderer {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait(?Send)]
impl PageRenderer for HttpRenderer {
    #[instrument(level = "debug", skip(self))]
    async fn render(&self, url: &str) -> Result<String> {
        self.http.get_text(url).await
    }
}
