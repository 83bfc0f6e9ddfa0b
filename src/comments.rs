//! Comment tree reconstruction.
//!
//! Sites deliver comment threads in very different shapes: flat HTML pages
//! where replies are marked by a CSS class, REST endpoints paged per thread,
//! or GraphQL responses with arbitrarily nested replies. Adapters translate
//! whatever they get into [`RawComment`] records and feed them to a
//! [`CommentTreeBuilder`], which assigns the hierarchical ids and produces the
//! final depth-first sequence.
//!
//! # Id scheme
//!
//! ```text
//! 1        first root
//! 1-1      first reply to 1
//! 1-1-1    first reply to 1-1
//! 1-2      second reply to 1
//! 2        second root
//! ```
//!
//! The builder keeps its counters between calls, so it can be fed one source
//! page at a time.

use crate::models::Comment;
use std::collections::HashMap;
use tracing::warn;

/// A comment as read from a site, before ids are assigned.
///
/// `body` is `None` when the record could not be read; such a record is
/// dropped together with its replies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawComment {
    pub body: Option<String>,
    pub replies: Vec<RawComment>,
}

impl RawComment {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: Some(body.into()),
            replies: Vec::new(),
        }
    }

    pub fn malformed() -> Self {
        Self::default()
    }

    pub fn with_replies(mut self, replies: Vec<RawComment>) -> Self {
        self.replies = replies;
        self
    }
}

/// Incrementally builds a flat, depth-first comment list.
#[derive(Debug, Default)]
pub struct CommentTreeBuilder {
    comments: Vec<Comment>,
    roots: usize,
    /// Last reply rank handed out under each parent id.
    replies: HashMap<String, usize>,
    skipped: usize,
}

impl CommentTreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a root comment and its whole reply subtree.
    ///
    /// Returns the id assigned to the root, or `None` if the record was
    /// malformed and skipped.
    pub fn push_root(&mut self, record: RawComment) -> Option<String> {
        let body = self.accept(record.body)?;
        self.roots += 1;
        let id = self.roots.to_string();
        self.emit(id.clone(), String::new(), &body, record.replies);
        Some(id)
    }

    /// Append every record of one source page as a root.
    pub fn push_roots(&mut self, records: impl IntoIterator<Item = RawComment>) {
        for record in records {
            self.push_root(record);
        }
    }

    /// Append a reply (and its subtree) under an already emitted comment.
    ///
    /// The reply's rank continues after any replies the parent already has,
    /// which lets reply pages fetched separately extend a thread.
    pub fn push_reply(&mut self, parent_id: &str, record: RawComment) -> Option<String> {
        let body = self.accept(record.body)?;
        let id = self.next_reply_id(parent_id);
        self.emit(id.clone(), parent_id.to_string(), &body, record.replies);
        Some(id)
    }

    /// Id of the most recently emitted root, if any.
    pub fn last_root_id(&self) -> Option<String> {
        (self.roots > 0).then(|| self.roots.to_string())
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    /// Number of malformed records dropped so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn finish(self) -> Vec<Comment> {
        if self.skipped > 0 {
            warn!(skipped = self.skipped, kept = self.comments.len(), "Skipped malformed comments");
        }
        self.comments
    }

    fn accept(&mut self, body: Option<String>) -> Option<String> {
        if body.is_none() {
            self.skipped += 1;
        }
        body
    }

    fn next_reply_id(&mut self, parent_id: &str) -> String {
        let rank = self.replies.entry(parent_id.to_string()).or_insert(0);
        *rank += 1;
        format!("{parent_id}-{rank}")
    }

    fn emit(&mut self, id: String, parent_id: String, body: &str, replies: Vec<RawComment>) {
        self.comments.push(Comment::new(id.clone(), parent_id, body));
        for reply in replies {
            let Some(body) = self.accept(reply.body) else {
                continue;
            };
            let child = self.next_reply_id(&id);
            self.emit(child, id.clone(), &body, reply.replies);
        }
    }
}

/// Build a complete thread from root records in one call.
pub fn build_thread(records: impl IntoIterator<Item = RawComment>) -> Vec<Comment> {
    let mut builder = CommentTreeBuilder::new();
    builder.push_roots(records);
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(comments: &[Comment]) -> Vec<(&str, &str)> {
        comments
            .iter()
            .map(|c| (c.id.as_str(), c.parent_id.as_str()))
            .collect()
    }

    #[test]
    fn test_root_then_root_with_reply() {
        let thread = build_thread(vec![
            RawComment::new("A"),
            RawComment::new("B").with_replies(vec![RawComment::new("C")]),
        ]);
        assert_eq!(ids(&thread), vec![("1", ""), ("2", ""), ("2-1", "2")]);
        let texts: Vec<_> = thread.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_depth_first_order_with_deep_nesting() {
        let thread = build_thread(vec![
            RawComment::new("a").with_replies(vec![
                RawComment::new("a1").with_replies(vec![
                    RawComment::new("a1x"),
                    RawComment::new("a1y").with_replies(vec![RawComment::new("a1y!")]),
                ]),
                RawComment::new("a2"),
            ]),
            RawComment::new("b"),
        ]);
        assert_eq!(
            ids(&thread),
            vec![
                ("1", ""),
                ("1-1", "1"),
                ("1-1-1", "1-1"),
                ("1-1-2", "1-1"),
                ("1-1-2-1", "1-1-2"),
                ("1-2", "1"),
                ("2", ""),
            ]
        );
        assert_eq!(thread[4].depth(), 4);
    }

    #[test]
    fn test_counter_carries_across_pages() {
        let mut builder = CommentTreeBuilder::new();
        builder.push_roots(vec![RawComment::new("p1a"), RawComment::new("p1b")]);
        builder.push_roots(vec![RawComment::new("p2a").with_replies(vec![RawComment::new("r")])]);
        let thread = builder.finish();
        assert_eq!(ids(&thread), vec![("1", ""), ("2", ""), ("3", ""), ("3-1", "3")]);
    }

    #[test]
    fn test_reply_pages_continue_rank() {
        let mut builder = CommentTreeBuilder::new();
        let root = builder
            .push_root(RawComment::new("root").with_replies(vec![RawComment::new("r1"), RawComment::new("r2")]))
            .unwrap();
        assert_eq!(builder.push_reply(&root, RawComment::new("r3")), Some("1-3".to_string()));
        assert_eq!(builder.last_root_id(), Some("1".to_string()));
        assert_eq!(builder.len(), 4);
    }

    #[test]
    fn test_malformed_records_are_skipped() {
        let mut builder = CommentTreeBuilder::new();
        builder.push_roots(vec![
            RawComment::new("ok"),
            RawComment::malformed().with_replies(vec![RawComment::new("orphan")]),
            RawComment::new("also ok").with_replies(vec![RawComment::malformed(), RawComment::new("reply")]),
        ]);
        assert_eq!(builder.skipped(), 2);
        let thread = builder.finish();
        assert_eq!(ids(&thread), vec![("1", ""), ("2", ""), ("2-1", "2")]);
        assert_eq!(thread[2].text, "reply");
    }

    #[test]
    fn test_empty_replies_contribute_nothing() {
        let builder = CommentTreeBuilder::new();
        assert!(builder.is_empty());
        assert_eq!(builder.last_root_id(), None);
        assert!(build_thread(Vec::new()).is_empty());
        assert_eq!(build_thread(vec![RawComment::new("x").with_replies(vec![])]).len(), 1);
    }
}
