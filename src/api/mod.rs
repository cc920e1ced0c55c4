pub mod cache;
pub mod http_client;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::app::Result;
use crate::domain::{FeedPage, Post, PostId};

pub use cache::{CachedApi, PostCache};
pub use http_client::WpClient;

/// Read access to the remote content API.
///
/// Every call takes a cancellation token. A cancelled call resolves to
/// [`BroadsheetError::Cancelled`](crate::app::BroadsheetError::Cancelled),
/// which callers treat as a no-op.
#[async_trait]
pub trait ContentApi: Send + Sync {
    async fn list_posts(
        &self,
        page: u32,
        per_page: u32,
        cancel: &CancellationToken,
    ) -> Result<FeedPage>;

    async fn get_post(&self, id: PostId, cancel: &CancellationToken) -> Result<Post>;

    async fn search(
        &self,
        term: &str,
        page: u32,
        per_page: u32,
        cancel: &CancellationToken,
    ) -> Result<FeedPage>;
}
