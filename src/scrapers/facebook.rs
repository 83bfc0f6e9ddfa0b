//! Facebook comments plugin.
//!
//! Several Slovene sites embed the Facebook comments plugin instead of running
//! their own comment system. The plugin page carries a `handleServerJS({...});}`
//! call whose JSON lists the top-level comment ids and an `idMap` with their
//! bodies. Replies of each top-level comment are loaded with one POST to the
//! plugin's pager endpoint, which answers with `for (;;);` followed by JSON.

use super::CommentThread;
use crate::comments::{CommentTreeBuilder, RawComment};
use crate::error::{Error, Result};
use crate::fetch::{Fetch, HttpClient, Request};
use crate::utils::render_template;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, instrument, warn};

pub const PAGER_URL: &str = "https://www.facebook.com/plugins/comments/async/comment/{id}/pager/";

/// Path of the comment listing inside the plugin's server JS payload.
const PLUGIN_COMMENTS: &str = "/require/2/3/0/props/comments";

#[derive(Debug, Clone)]
pub struct FacebookComments {
    plugin_url: String,
    pager_url: String,
    server_js: Regex,
    json_object: Regex,
}

impl FacebookComments {
    /// `plugin_url` is a template with `{id}` (app id), `{domain}` and `{url}`.
    pub fn new(plugin_url: &str) -> Result<Self> {
        Ok(Self {
            plugin_url: plugin_url.to_string(),
            pager_url: PAGER_URL.to_string(),
            server_js: compile(r#"handleServerJS\((\{"instances".*)\);\}"#)?,
            json_object: compile(r"(?s)\{.*\}")?,
        })
    }

    pub fn with_pager_url(mut self, pager_url: &str) -> Self {
        self.pager_url = pager_url.to_string();
        self
    }

    /// Fetch the whole thread attached to `url`.
    ///
    /// A reply page that fails to load costs only that comment's replies.
    #[instrument(level = "debug", skip(self, http))]
    pub async fn fetch(&self, http: &HttpClient, app_id: &str, domain: &str, url: &str) -> Result<CommentThread> {
        let encoded = urlencoding::encode(url);
        let plugin = render_template(
            &self.plugin_url,
            &[("id", app_id), ("domain", domain), ("url", encoded.as_ref())],
        );
        let body = http.get_text(&plugin).await?;
        let top = self.parse_plugin(&body)?;
        debug!(count = top.len(), "Top-level Facebook comments");

        let mut builder = CommentTreeBuilder::new();
        for (comment_id, record) in top {
            let Some(root) = builder.push_root(record) else {
                continue;
            };
            let pager = render_template(&self.pager_url, &[("id", comment_id.as_str())]);
            let replies = match http.fetch(&Request::form(pager, &[("__a", "1")])).await {
                Ok(response) => response.into_success().and_then(|body| self.parse_pager(&body)),
                Err(e) => Err(e),
            };
            match replies {
                Ok(replies) => {
                    for reply in replies {
                        builder.push_reply(&root, reply);
                    }
                }
                Err(e) => warn!(%comment_id, error = %e, "Could not load Facebook replies"),
            }
        }
        Ok(CommentThread::new(builder.finish(), None))
    }

    /// Top-level `(facebook id, record)` pairs of a plugin page.
    ///
    /// A page without the server JS payload has no comments.
    pub fn parse_plugin(&self, body: &str) -> Result<Vec<(String, RawComment)>> {
        let Some(captures) = self.server_js.captures(body) else {
            return Ok(Vec::new());
        };
        let json: Value = serde_json::from_str(&captures[1])?;
        let comments = json
            .pointer(PLUGIN_COMMENTS)
            .ok_or_else(|| Error::parse("Facebook plugin payload has no comment listing"))?;
        Ok(listed_comments(comments))
    }

    /// Replies listed in a pager response.
    pub fn parse_pager(&self, body: &str) -> Result<Vec<RawComment>> {
        let object = self
            .json_object
            .find(body)
            .ok_or_else(|| Error::parse("Facebook pager response has no JSON"))?;
        let json: Value = serde_json::from_str(object.as_str())?;
        let payload = json
            .get("payload")
            .ok_or_else(|| Error::parse("Facebook pager response has no payload"))?;
        Ok(listed_comments(payload).into_iter().map(|(_, c)| c).collect())
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::Config(format!("regex `{pattern}`: {e}")))
}

/// Resolve `commentIDs` against `idMap`, keeping listing order.
fn listed_comments(listing: &Value) -> Vec<(String, RawComment)> {
    let ids = listing
        .get("commentIDs")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    ids.iter()
        .filter_map(Value::as_str)
        .map(|id| {
            let body = listing
                .get("idMap")
                .and_then(|m| m.get(id))
                .and_then(|c| c.pointer("/body/text"))
                .and_then(Value::as_str);
            let record = match body {
                Some(text) => RawComment::new(text),
                None => RawComment::malformed(),
            };
            (id.to_string(), record)
        })
        .collect()
}
