pub mod html;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::app::Result;
use crate::domain::{Media, Post, Term};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Rendered {
    Object { rendered: String },
    Plain(String),
}

impl Rendered {
    fn into_string(self) -> String {
        match self {
            Rendered::Object { rendered } => rendered,
            Rendered::Plain(s) => s,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WpPost {
    id: u64,
    #[serde(default)]
    title: Option<Rendered>,
    #[serde(default)]
    date_gmt: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    excerpt: Option<Rendered>,
    #[serde(default)]
    content: Option<Rendered>,
    #[serde(default)]
    link: Option<String>,
    /// Search results carry `url` instead of `link`
    #[serde(default)]
    url: Option<String>,
    /// Search results carry `type`; anything other than "post" is skipped
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default, rename = "_embedded")]
    embedded: Option<Embedded>,
}

#[derive(Debug, Default, Deserialize)]
struct Embedded {
    #[serde(default)]
    author: Vec<WpAuthor>,
    #[serde(default, rename = "wp:featuredmedia")]
    featured_media: Vec<WpMedia>,
    #[serde(default, rename = "wp:term")]
    terms: Vec<Vec<WpTerm>>,
}

// Embedded entries can be error objects when the linked resource is private,
// which is why every field is optional.
#[derive(Debug, Deserialize)]
struct WpAuthor {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WpMedia {
    #[serde(default)]
    source_url: Option<String>,
    #[serde(default)]
    alt_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WpTerm {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    taxonomy: Option<String>,
}

/// Converts WordPress REST JSON into domain [`Post`]s.
#[derive(Clone, Default)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize_post(&self, body: &[u8]) -> Result<Post> {
        let raw: WpPost = serde_json::from_slice(body)?;
        Ok(Self::convert(raw))
    }

    /// Decode a listing. Search results that are not posts are skipped and
    /// counted.
    pub fn normalize_posts(&self, body: &[u8]) -> Result<(Vec<Post>, usize)> {
        let raw: Vec<WpPost> = serde_json::from_slice(body)?;
        let sent = raw.len();
        let posts: Vec<Post> = raw
            .into_iter()
            .filter(|p| p.kind.as_deref().is_none_or(|k| k == "post"))
            .map(Self::convert)
            .collect();
        let skipped = sent - posts.len();
        Ok((posts, skipped))
    }

    fn convert(raw: WpPost) -> Post {
        let embedded = raw.embedded.unwrap_or_default();

        let featured_media = embedded
            .featured_media
            .into_iter()
            .find_map(|m| {
                m.source_url.map(|url| Media {
                    url,
                    alt: m.alt_text.filter(|a| !a.trim().is_empty()),
                })
            });

        let terms = embedded
            .terms
            .into_iter()
            .flatten()
            .filter_map(|t| match (t.name, t.taxonomy) {
                (Some(name), Some(taxonomy)) => Some(Term {
                    name: html_escape::decode_html_entities(&name).to_string(),
                    taxonomy,
                }),
                _ => None,
            })
            .collect();

        Post {
            id: raw.id,
            title: raw.title.map(Rendered::into_string).unwrap_or_default(),
            published_at: raw
                .date_gmt
                .as_deref()
                .and_then(parse_wp_date)
                .or_else(|| raw.date.as_deref().and_then(parse_wp_date)),
            excerpt: raw.excerpt.map(Rendered::into_string).unwrap_or_default(),
            content: raw.content.map(Rendered::into_string).unwrap_or_default(),
            link: raw.link.or(raw.url),
            featured_media,
            author: embedded.author.into_iter().find_map(|a| a.name),
            terms,
        }
    }
}

/// WordPress dates come without an offset (`2024-03-01T10:00:00`); `date_gmt`
/// is UTC by definition.
fn parse_wp_date(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .map(|naive| naive.and_utc())
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
        })
}
