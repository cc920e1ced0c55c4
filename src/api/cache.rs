use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::api::ContentApi;
use crate::app::Result;
use crate::domain::{FeedPage, Post, PostId};

/// Session-scoped posts by id. Entries are inserted or replaced, never evicted.
#[derive(Default)]
pub struct PostCache {
    posts: Mutex<HashMap<PostId, Post>>,
}

impl PostCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: PostId) -> Option<Post> {
        self.posts.lock().ok()?.get(&id).cloned()
    }

    pub fn insert(&self, post: Post) {
        if let Ok(mut posts) = self.posts.lock() {
            posts.insert(post.id, post);
        }
    }

    /// Store listing results without replacing richer copies already held.
    pub fn insert_page(&self, page: &FeedPage) {
        if let Ok(mut posts) = self.posts.lock() {
            for post in &page.posts {
                let keep_existing = posts
                    .get(&post.id)
                    .is_some_and(|existing| !existing.content.is_empty() && post.content.is_empty());
                if !keep_existing {
                    posts.insert(post.id, post.clone());
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.posts.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Wraps an API so single-post lookups are answered from the [`PostCache`]
/// when possible, and listings fill it.
pub struct CachedApi {
    inner: Arc<dyn ContentApi>,
    posts: Arc<PostCache>,
}

impl CachedApi {
    pub fn new(inner: Arc<dyn ContentApi>, posts: Arc<PostCache>) -> Self {
        Self { inner, posts }
    }
}

#[async_trait]
impl ContentApi for CachedApi {
    async fn list_posts(
        &self,
        page: u32,
        per_page: u32,
        cancel: &CancellationToken,
    ) -> Result<FeedPage> {
        let result = self.inner.list_posts(page, per_page, cancel).await?;
        self.posts.insert_page(&result);
        Ok(result)
    }

    async fn get_post(&self, id: PostId, cancel: &CancellationToken) -> Result<Post> {
        // Search results carry no body, so only a cached copy with content counts
        if let Some(post) = self.posts.get(id).filter(|p| !p.body_html().is_empty()) {
            tracing::debug!("Post {} served from session cache", id);
            return Ok(post);
        }
        let post = self.inner.get_post(id, cancel).await?;
        self.posts.insert(post.clone());
        Ok(post)
    }

    async fn search(
        &self,
        term: &str,
        page: u32,
        per_page: u32,
        cancel: &CancellationToken,
    ) -> Result<FeedPage> {
        let result = self.inner.search(term, page, per_page, cancel).await?;
        self.posts.insert_page(&result);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::domain::PageMeta;

    #[derive(Default)]
    struct CountingApi {
        get_calls: AtomicUsize,
    }

    fn full_post(id: PostId) -> Post {
        let mut post = Post::new(id);
        post.title = format!("Post {}", id);
        post.content = "<p>Body</p>".into();
        post
    }

    #[async_trait]
    impl ContentApi for CountingApi {
        async fn list_posts(&self, page: u32, per_page: u32, _: &CancellationToken) -> Result<FeedPage> {
            Ok(FeedPage {
                posts: vec![full_post(1), full_post(2)],
                meta: PageMeta { page, per_page, total: None, total_pages: None, skipped: 0 },
            })
        }

        async fn get_post(&self, id: PostId, _: &CancellationToken) -> Result<Post> {
            self.get_calls.fetch_add(1, Ordering::SeqCst);
            Ok(full_post(id))
        }

        async fn search(&self, _: &str, page: u32, per_page: u32, _: &CancellationToken) -> Result<FeedPage> {
            let mut bare = Post::new(1);
            bare.title = "Post 1".into();
            Ok(FeedPage {
                posts: vec![bare],
                meta: PageMeta { page, per_page, total: None, total_pages: None, skipped: 0 },
            })
        }
    }

    #[tokio::test]
    async fn test_get_post_fetches_once() {
        let inner = Arc::new(CountingApi::default());
        let api = CachedApi::new(inner.clone(), Arc::new(PostCache::new()));
        let cancel = CancellationToken::new();

        api.get_post(9, &cancel).await.unwrap();
        api.get_post(9, &cancel).await.unwrap();
        assert_eq!(inner.get_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_listing_fills_cache() {
        let inner = Arc::new(CountingApi::default());
        let posts = Arc::new(PostCache::new());
        let api = CachedApi::new(inner.clone(), posts.clone());
        let cancel = CancellationToken::new();

        api.list_posts(1, 12, &cancel).await.unwrap();
        assert_eq!(posts.len(), 2);

        let post = api.get_post(2, &cancel).await.unwrap();
        assert_eq!(post.id, 2);
        assert_eq!(inner.get_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_bodiless_search_result_does_not_shadow_full_post() {
        let inner = Arc::new(CountingApi::default());
        let posts = Arc::new(PostCache::new());
        let api = CachedApi::new(inner.clone(), posts.clone());
        let cancel = CancellationToken::new();

        api.list_posts(1, 12, &cancel).await.unwrap();
        api.search("post", 1, 12, &cancel).await.unwrap();

        assert_eq!(posts.get(1).unwrap().content, "<p>Body</p>");
    }

    #[tokio::test]
    async fn test_bodiless_entry_triggers_fetch() {
        let inner = Arc::new(CountingApi::default());
        let api = CachedApi::new(inner.clone(), Arc::new(PostCache::new()));
        let cancel = CancellationToken::new();

        api.search("post", 1, 12, &cancel).await.unwrap();
        let post = api.get_post(1, &cancel).await.unwrap();

        assert_eq!(post.content, "<p>Body</p>");
        assert_eq!(inner.get_calls.load(Ordering::SeqCst), 1);
    }
}
