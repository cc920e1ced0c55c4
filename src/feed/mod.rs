//! Paginated feed engine behind the home and search lists.
//!
//! The controller never performs I/O itself. [`FeedController::load_more`]
//! hands out a [`PageTicket`] describing the one request that may be in flight;
//! whoever runs the request (inline, or on a spawned task in the TUI) reports
//! the outcome through [`FeedController::complete`]. Outcomes for tickets that
//! were superseded by a reset are dropped without touching any state.

use std::collections::HashSet;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::ContentApi;
use crate::app::{BroadsheetError, Result};
use crate::domain::{FeedPage, Post, PostId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSource {
    Latest,
    Search(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Idle,
    Fetching,
    /// Terminal until the next reset
    Exhausted,
}

/// Permission to fetch one page.
#[derive(Debug, Clone)]
pub struct PageTicket {
    pub page: u32,
    pub cancel: CancellationToken,
    id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    Appended { added: usize, dropped: usize },
    Exhausted { added: usize, dropped: usize },
    Failed { message: String },
    /// Stale or cancelled outcome; nothing changed
    Ignored,
}

pub struct FeedController {
    source: FeedSource,
    page_size: u32,
    cursor: u32,
    state: FeedState,
    posts: Vec<Post>,
    seen: HashSet<PostId>,
    next_ticket: u64,
    pending: Option<(u64, CancellationToken)>,
    last_error: Option<String>,
    total: Option<u64>,
    disposed: bool,
}

impl FeedController {
    pub fn new(source: FeedSource, page_size: u32) -> Self {
        Self {
            source,
            page_size: page_size.max(1),
            cursor: 1,
            state: FeedState::Idle,
            posts: Vec::new(),
            seen: HashSet::new(),
            next_ticket: 0,
            pending: None,
            last_error: None,
            total: None,
            disposed: false,
        }
    }

    /// Reset to page 1 and request it.
    pub fn start(&mut self) -> Option<PageTicket> {
        self.reset();
        self.load_more()
    }

    /// Request the next page, unless one is already in flight or the feed
    /// has ended. Repeated triggers are dropped rather than queued.
    pub fn load_more(&mut self) -> Option<PageTicket> {
        if self.disposed || self.state != FeedState::Idle {
            return None;
        }

        self.next_ticket += 1;
        let cancel = CancellationToken::new();
        self.pending = Some((self.next_ticket, cancel.clone()));
        self.state = FeedState::Fetching;
        debug!("Requesting page {} of {:?}", self.cursor, self.source);

        Some(PageTicket {
            page: self.cursor,
            cancel,
            id: self.next_ticket,
        })
    }

    /// Apply the outcome of the request described by `ticket`.
    pub fn complete(&mut self, ticket: &PageTicket, outcome: Result<FeedPage>) -> FeedEvent {
        match &self.pending {
            Some((id, _)) if *id == ticket.id => {}
            _ => return FeedEvent::Ignored,
        }
        self.pending = None;
        self.state = FeedState::Idle;

        // A response that raced past its cancellation is still a cancellation
        if ticket.cancel.is_cancelled() {
            return FeedEvent::Ignored;
        }

        let page = match outcome {
            Ok(page) => page,
            Err(BroadsheetError::Cancelled) => return FeedEvent::Ignored,
            Err(e) => {
                warn!("Loading page {} failed: {}", ticket.page, e);
                let message = e.user_message();
                self.last_error = Some(message.clone());
                return FeedEvent::Failed { message };
            }
        };

        self.last_error = None;
        if page.meta.total.is_some() {
            self.total = page.meta.total;
        }

        // End of data is judged on what the server sent, before dedup
        let fetched = page.fetched();
        let received = page.posts.len();
        let short = fetched < self.page_size as usize;
        let last_by_header = page
            .meta
            .total_pages
            .is_some_and(|total| ticket.page >= total);

        let mut added = 0;
        for post in page.posts {
            if self.seen.insert(post.id) {
                self.posts.push(post);
                added += 1;
            }
        }
        let dropped = received - added;

        if short || last_by_header {
            self.state = FeedState::Exhausted;
            info!(
                "Feed {:?} exhausted at page {} ({} posts)",
                self.source,
                ticket.page,
                self.posts.len()
            );
            FeedEvent::Exhausted { added, dropped }
        } else {
            self.cursor += 1;
            info!("Appended {} posts from page {}", added, ticket.page);
            FeedEvent::Appended { added, dropped }
        }
    }

    /// Cancel any in-flight request and return to the initial state.
    pub fn reset(&mut self) {
        self.cancel_pending();
        self.cursor = 1;
        self.state = FeedState::Idle;
        self.posts.clear();
        self.seen.clear();
        self.last_error = None;
        self.total = None;
    }

    /// Cancel in-flight work permanently; later triggers are ignored.
    pub fn dispose(&mut self) {
        self.reset();
        self.disposed = true;
    }

    fn cancel_pending(&mut self) {
        if let Some((_, cancel)) = self.pending.take() {
            cancel.cancel();
        }
    }

    pub fn source(&self) -> &FeedSource {
        &self.source
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn state(&self) -> FeedState {
        self.state
    }

    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    pub fn is_fetching(&self) -> bool {
        self.state == FeedState::Fetching
    }

    pub fn is_exhausted(&self) -> bool {
        self.state == FeedState::Exhausted
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Total reported by the server, when it sent one
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    /// Fetch and apply the next page inline.
    pub async fn load_next(&mut self, api: &dyn ContentApi) -> Option<FeedEvent> {
        let ticket = self.load_more()?;
        let outcome = fetch_page(api, &self.source, &ticket, self.page_size).await;
        Some(self.complete(&ticket, outcome))
    }
}

impl Drop for FeedController {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}

/// Perform the request a ticket describes.
pub async fn fetch_page(
    api: &dyn ContentApi,
    source: &FeedSource,
    ticket: &PageTicket,
    page_size: u32,
) -> Result<FeedPage> {
    match source {
        FeedSource::Latest => api.list_posts(ticket.page, page_size, &ticket.cancel).await,
        FeedSource::Search(term) => {
            api.search(term, ticket.page, page_size, &ticket.cancel)
                .await
        }
    }
}
