//! Page-title lookup used by the `links` transformer.

use lol_html::{RewriteStrSettings, rewrite_str, text};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TitleError {
    #[error("request timed out")]
    Timeout,
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("page has no <title>")]
    NoTitle,
}

pub trait TitleLookup {
    fn title(&self, url: &str) -> Result<String, TitleError>;
}

/// Lookup for runs without network access; every link fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTitles;

impl TitleLookup for NoTitles {
    fn title(&self, url: &str) -> Result<String, TitleError> {
        Err(TitleError::Transport(format!("title lookup disabled for {url}")))
    }
}

/// Fixed url -> title table.
#[derive(Debug, Clone, Default)]
pub struct StaticTitles {
    titles: HashMap<String, String>,
}

impl StaticTitles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, title: &str) -> Self {
        self.titles.insert(url.to_string(), title.to_string());
        self
    }
}

impl TitleLookup for StaticTitles {
    fn title(&self, url: &str) -> Result<String, TitleError> {
        self.titles.get(url).cloned().ok_or(TitleError::NoTitle)
    }
}

/// Text of the first `<title>` in a page, entity-decoded and trimmed.
pub fn extract_title(page: &str) -> Option<String> {
    let mut title = String::new();
    let mut done = false;
    let handlers = vec![text!("title", |chunk| {
        if !done {
            title.push_str(chunk.as_str());
            done = chunk.last_in_text_node();
        }
        Ok(())
    })];
    rewrite_str(
        page,
        RewriteStrSettings {
            element_content_handlers: handlers,
            ..RewriteStrSettings::new()
        },
    )
    .ok()?;

    let title = htmlize::unescape(title.as_str());
    let title = title.trim();
    (!title.is_empty()).then(|| title.to_string())
}
