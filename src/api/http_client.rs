use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Response, StatusCode};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::api::ContentApi;
use crate::app::{BroadsheetError, Result};
use crate::config::ApiConfig;
use crate::domain::{FeedPage, PageMeta, Post, PostId};
use crate::normalizer::Normalizer;
use crate::store::{CachedResponse, ResponseCache};

const TOTAL_HEADER: &str = "x-wp-total";
const TOTAL_PAGES_HEADER: &str = "x-wp-totalpages";

/// WordPress answers a page past the end with 400 and this code.
const INVALID_PAGE_CODE: &str = "rest_post_invalid_page_number";

struct RawResponse {
    body: Vec<u8>,
    total: Option<u64>,
    total_pages: Option<u32>,
}

/// reqwest-based client for a WordPress REST namespace.
pub struct WpClient {
    client: Client,
    base: Url,
    version_param: String,
    version: String,
    normalizer: Normalizer,
    cache: Option<Arc<dyn ResponseCache>>,
}

impl WpClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .gzip(true)
            .brotli(true)
            .user_agent(config.user_agent.clone())
            .build()?;

        // Url::join drops the last segment unless the base ends with '/'
        let mut base = Url::parse(&config.base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self {
            client,
            base,
            version_param: config.version_param.clone(),
            version: config.version.clone(),
            normalizer: Normalizer::new(),
            cache: None,
        })
    }

    /// Keep successful responses in `cache` and serve them when the network fails.
    pub fn with_cache(mut self, cache: Arc<dyn ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    fn endpoint(&self, path: &str, query: &[(&str, String)], embed: bool) -> Result<Url> {
        let mut url = self.base.join(path)?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
            if embed {
                pairs.append_key_only("_embed");
            }
        }
        Ok(url)
    }

    async fn fetch(&self, url: Url, cancel: &CancellationToken) -> Result<RawResponse> {
        let cache_url = url.to_string();
        let mut request_url = url;
        request_url
            .query_pairs_mut()
            .append_pair(&self.version_param, &self.version);

        tracing::debug!("GET {}", request_url);

        let sent = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(BroadsheetError::Cancelled),
            result = self.client.get(request_url).send() => result,
        };
        let response = match sent {
            Ok(response) => response,
            Err(e) => return self.offline_fallback(&cache_url, e.into()),
        };

        let status = response.status();
        let total = header_number::<u64>(&response, TOTAL_HEADER);
        let total_pages = header_number::<u32>(&response, TOTAL_PAGES_HEADER);

        let read = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(BroadsheetError::Cancelled),
            result = response.bytes() => result,
        };
        let body = match read {
            Ok(bytes) => bytes.to_vec(),
            Err(e) => return self.offline_fallback(&cache_url, e.into()),
        };

        if status == StatusCode::BAD_REQUEST && is_past_last_page(&body) {
            tracing::debug!("Page past the end: {}", cache_url);
            return Ok(RawResponse {
                body: b"[]".to_vec(),
                total,
                total_pages,
            });
        }

        if !status.is_success() {
            return Err(BroadsheetError::Remote {
                status: status.as_u16(),
            });
        }

        if let Some(cache) = &self.cache {
            let cached = CachedResponse {
                body: body.clone(),
                total,
                total_pages,
                fetched_at: Utc::now(),
            };
            if let Err(e) = cache.put(&cache_url, &cached) {
                tracing::warn!("Failed to cache response for {}: {}", cache_url, e);
            }
        }

        Ok(RawResponse {
            body,
            total,
            total_pages,
        })
    }

    /// Only transport failures fall back to the offline copy; HTTP errors
    /// from a reachable server are reported as they are.
    fn offline_fallback(&self, cache_url: &str, err: BroadsheetError) -> Result<RawResponse> {
        if !matches!(err, BroadsheetError::Network(_)) {
            return Err(err);
        }

        let Some(cache) = &self.cache else {
            return Err(err);
        };

        match cache.get(cache_url) {
            Ok(Some(cached)) => {
                tracing::info!(
                    "Network unavailable, serving copy from {} for {}",
                    cached.fetched_at.format("%Y-%m-%d %H:%M"),
                    cache_url
                );
                Ok(RawResponse {
                    body: cached.body,
                    total: cached.total,
                    total_pages: cached.total_pages,
                })
            }
            Ok(None) => Err(err),
            Err(e) => {
                tracing::warn!("Offline cache lookup failed: {}", e);
                Err(err)
            }
        }
    }

    fn page(&self, raw: RawResponse, page: u32, per_page: u32) -> Result<FeedPage> {
        let (posts, skipped) = self.normalizer.normalize_posts(&raw.body)?;
        Ok(FeedPage {
            posts,
            meta: PageMeta {
                page,
                per_page,
                total: raw.total,
                total_pages: raw.total_pages,
                skipped,
            },
        })
    }
}

fn header_number<T: std::str::FromStr>(response: &Response, name: &str) -> Option<T> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

fn is_past_last_page(body: &[u8]) -> bool {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("code").and_then(|c| c.as_str()).map(|c| c == INVALID_PAGE_CODE))
        .unwrap_or(false)
}

#[async_trait]
impl ContentApi for WpClient {
    async fn list_posts(
        &self,
        page: u32,
        per_page: u32,
        cancel: &CancellationToken,
    ) -> Result<FeedPage> {
        let url = self.endpoint(
            "posts",
            &[("page", page.to_string()), ("per_page", per_page.to_string())],
            true,
        )?;
        let raw = self.fetch(url, cancel).await?;
        self.page(raw, page, per_page)
    }

    async fn get_post(&self, id: PostId, cancel: &CancellationToken) -> Result<Post> {
        let url = self.endpoint(&format!("posts/{}", id), &[], true)?;
        let raw = self.fetch(url, cancel).await?;
        self.normalizer.normalize_post(&raw.body)
    }

    async fn search(
        &self,
        term: &str,
        page: u32,
        per_page: u32,
        cancel: &CancellationToken,
    ) -> Result<FeedPage> {
        let url = self.endpoint(
            "search",
            &[
                ("search", term.to_string()),
                ("page", page.to_string()),
                ("per_page", per_page.to_string()),
            ],
            false,
        )?;
        let raw = self.fetch(url, cancel).await?;
        self.page(raw, page, per_page)
    }
}
