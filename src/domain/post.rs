use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::normalizer::html;

pub type PostId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub url: String,
    pub alt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub name: String,
    pub taxonomy: String,
}

/// A post as returned by the content API. Rich-text fields hold rendered HTML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub published_at: Option<DateTime<Utc>>,
    pub excerpt: String,
    pub content: String,
    pub link: Option<String>,
    pub featured_media: Option<Media>,
    pub author: Option<String>,
    pub terms: Vec<Term>,
}

impl Post {
    pub fn new(id: PostId) -> Self {
        Self {
            id,
            title: String::new(),
            published_at: None,
            excerpt: String::new(),
            content: String::new(),
            link: None,
            featured_media: None,
            author: None,
            terms: Vec::new(),
        }
    }

    pub fn display_title(&self) -> String {
        let title = html::to_plain_text(&self.title);
        if title.is_empty() {
            "(Untitled)".to_string()
        } else {
            title
        }
    }

    /// Rendered HTML of the best available body
    pub fn body_html(&self) -> &str {
        if self.content.trim().is_empty() {
            &self.excerpt
        } else {
            &self.content
        }
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.terms
            .iter()
            .filter(|t| t.taxonomy == "category")
            .map(|t| t.name.as_str())
    }

    /// Text handed to the speech engine: title followed by the flattened body.
    pub fn speech_text(&self) -> String {
        let body = html::to_plain_text(self.body_html());
        let title = self.display_title();
        if body.is_empty() {
            title
        } else {
            format!("{}. {}", title.trim_end_matches('.'), body)
        }
    }
}
