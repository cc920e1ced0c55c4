use serde::{Deserialize, Serialize};

use crate::domain::Post;

/// Pagination metadata for one API call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub page: u32,
    pub per_page: u32,
    /// From `X-WP-Total`, when the server sent it
    pub total: Option<u64>,
    /// From `X-WP-TotalPages`, when the server sent it
    pub total_pages: Option<u32>,
    /// Entries the server sent that are not posts
    #[serde(default)]
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedPage {
    pub posts: Vec<Post>,
    pub meta: PageMeta,
}

impl FeedPage {
    /// Entries the server returned, including skipped ones
    pub fn fetched(&self) -> usize {
        self.posts.len() + self.meta.skipped
    }

    /// A page shorter than requested is the last one.
    pub fn is_short(&self) -> bool {
        self.fetched() < self.meta.per_page as usize
    }

    pub fn has_more(&self) -> bool {
        match self.meta.total_pages {
            Some(total) if self.meta.page >= total => false,
            _ => !self.is_short(),
        }
    }
}
