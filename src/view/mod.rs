//! Mounted views and the navigation protocol between them.
//!
//! [`Navigator`] is synchronous. Mounting a view or reacting to a result may
//! produce [`Job`]s; the caller runs them (inline or on spawned tasks) and
//! feeds each [`Outcome`] back through [`Navigator::apply`]. Outcomes from a
//! view that has since been unmounted are discarded.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::api::ContentApi;
use crate::app::{BroadsheetError, Result};
use crate::domain::{FeedPage, Post, PostId};
use crate::feed::{fetch_page, FeedController, FeedEvent, FeedSource, PageTicket};
use crate::router::{Route, Router, ScrollTarget, Transition};
use crate::speech::SpeechController;

/// A scrollable list backed by a feed.
pub struct ListView {
    pub feed: FeedController,
    pub selected: usize,
    /// Offset to select once enough posts have loaded
    pending_restore: Option<usize>,
}

impl ListView {
    fn new(feed: FeedController) -> Self {
        Self {
            feed,
            selected: 0,
            pending_restore: None,
        }
    }

    pub fn selected_post(&self) -> Option<&Post> {
        self.feed.posts().get(self.selected)
    }

    pub fn is_restoring(&self) -> bool {
        self.pending_restore.is_some()
    }

    /// Move the selection towards a saved offset, requesting more pages while
    /// the offset is out of reach.
    fn continue_restore(&mut self, event: &FeedEvent) -> Option<PageTicket> {
        let target = self.pending_restore?;
        let loaded = self.feed.posts().len();

        if target < loaded {
            self.selected = target;
            self.pending_restore = None;
            return None;
        }

        match event {
            FeedEvent::Ignored => None,
            FeedEvent::Failed { .. } | FeedEvent::Exhausted { .. } => {
                self.selected = loaded.saturating_sub(1);
                self.pending_restore = None;
                None
            }
            FeedEvent::Appended { .. } => self.feed.load_more(),
        }
    }
}

#[derive(Debug)]
pub enum PostState {
    Loading,
    Ready(Box<Post>),
    Failed(String),
}

pub struct PostView {
    pub id: PostId,
    pub state: PostState,
    pub scroll: u16,
    cancel: CancellationToken,
}

impl PostView {
    pub fn post(&self) -> Option<&Post> {
        match &self.state {
            PostState::Ready(post) => Some(&**post),
            _ => None,
        }
    }
}

pub enum View {
    /// Nothing mounted yet
    Blank,
    Home(ListView),
    Search { query: String, list: ListView },
    Post(PostView),
    About,
    NotFound(String),
}

impl View {
    pub fn list(&self) -> Option<&ListView> {
        match self {
            View::Home(list) | View::Search { list, .. } => Some(list),
            _ => None,
        }
    }

    fn list_mut(&mut self) -> Option<&mut ListView> {
        match self {
            View::Home(list) | View::Search { list, .. } => Some(list),
            _ => None,
        }
    }

    fn scroll_offset(&self) -> usize {
        match self {
            View::Home(list) | View::Search { list, .. } => list.selected,
            View::Post(post) => post.scroll as usize,
            _ => 0,
        }
    }
}

/// Work requested by a view. Carries the mount it belongs to.
#[derive(Debug)]
pub enum Job {
    Page {
        mount: u64,
        source: FeedSource,
        ticket: PageTicket,
        page_size: u32,
    },
    Post {
        mount: u64,
        id: PostId,
        cancel: CancellationToken,
    },
}

impl Job {
    pub async fn run(self, api: &dyn ContentApi) -> Outcome {
        match self {
            Job::Page {
                mount,
                source,
                ticket,
                page_size,
            } => {
                let result = fetch_page(api, &source, &ticket, page_size).await;
                Outcome::Page {
                    mount,
                    ticket,
                    result,
                }
            }
            Job::Post { mount, id, cancel } => {
                let result = api.get_post(id, &cancel).await;
                Outcome::Post { mount, id, result }
            }
        }
    }
}

#[derive(Debug)]
pub enum Outcome {
    Page {
        mount: u64,
        ticket: PageTicket,
        result: Result<FeedPage>,
    },
    Post {
        mount: u64,
        id: PostId,
        result: Result<Post>,
    },
}

pub struct Navigator {
    router: Router,
    view: View,
    mount: u64,
    page_size: u32,
    prefetch_distance: usize,
}

impl Navigator {
    pub fn new(page_size: u32, prefetch_distance: usize) -> Self {
        Self {
            router: Router::new(),
            view: View::Blank,
            mount: 0,
            page_size,
            prefetch_distance,
        }
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn route(&self) -> Option<&Route> {
        self.router.current()
    }

    pub fn can_go_back(&self) -> bool {
        self.router.can_go_back()
    }

    /// Unmount the current view, then mount the one for `route`.
    pub fn navigate(&mut self, route: Route, speech: &mut SpeechController) -> Vec<Job> {
        let offset = self.view.scroll_offset();
        self.unmount(speech);
        let transition = self.router.navigate(route, offset);
        self.mount(transition)
    }

    pub fn back(&mut self, speech: &mut SpeechController) -> Option<Vec<Job>> {
        if !self.router.can_go_back() {
            return None;
        }
        let offset = self.view.scroll_offset();
        self.unmount(speech);
        let transition = self.router.back(offset)?;
        Some(self.mount(transition))
    }

    /// Re-navigate to the current route.
    pub fn refresh(&mut self, speech: &mut SpeechController) -> Vec<Job> {
        match self.router.current().cloned() {
            Some(route) => self.navigate(route, speech),
            None => Vec::new(),
        }
    }

    fn unmount(&mut self, speech: &mut SpeechController) {
        match std::mem::replace(&mut self.view, View::Blank) {
            View::Home(mut list) | View::Search { mut list, .. } => list.feed.dispose(),
            View::Post(post) => {
                post.cancel.cancel();
                speech.stop_if(post.id);
            }
            View::Blank | View::About | View::NotFound(_) => {}
        }
    }

    fn mount(&mut self, transition: Transition) -> Vec<Job> {
        self.mount += 1;
        info!("Mounting {} ({:?})", transition.to, transition.scroll);

        let mut jobs = Vec::new();
        self.view = match transition.to {
            Route::Home => {
                let mut list = ListView::new(FeedController::new(FeedSource::Latest, self.page_size));
                if let ScrollTarget::Restore(offset) = transition.scroll {
                    list.pending_restore = Some(offset);
                }
                jobs.extend(list.feed.start().map(|t| self.page_job(&list.feed, t)));
                View::Home(list)
            }
            Route::Search(query) => {
                let source = FeedSource::Search(query.clone());
                let mut list = ListView::new(FeedController::new(source, self.page_size));
                if !query.is_empty() {
                    jobs.extend(list.feed.start().map(|t| self.page_job(&list.feed, t)));
                }
                View::Search { query, list }
            }
            Route::Post(id) => {
                let cancel = CancellationToken::new();
                jobs.push(Job::Post {
                    mount: self.mount,
                    id,
                    cancel: cancel.clone(),
                });
                View::Post(PostView {
                    id,
                    state: PostState::Loading,
                    scroll: 0,
                    cancel,
                })
            }
            Route::About => View::About,
            Route::NotFound(raw) => View::NotFound(raw),
        };
        jobs
    }

    fn page_job(&self, feed: &FeedController, ticket: PageTicket) -> Job {
        Job::Page {
            mount: self.mount,
            source: feed.source().clone(),
            ticket,
            page_size: feed.page_size(),
        }
    }

    /// Apply a finished job. May request follow-up work.
    pub fn apply(&mut self, outcome: Outcome) -> Vec<Job> {
        match outcome {
            Outcome::Page {
                mount,
                ticket,
                result,
            } if mount == self.mount => {
                let Some(list) = self.view.list_mut() else {
                    return Vec::new();
                };
                let event = list.feed.complete(&ticket, result);
                let next = list.continue_restore(&event);
                let feed_source = list.feed.source().clone();
                let page_size = list.feed.page_size();
                next.map(|ticket| Job::Page {
                    mount,
                    source: feed_source,
                    ticket,
                    page_size,
                })
                .into_iter()
                .collect()
            }
            Outcome::Post { mount, id, result } if mount == self.mount => {
                if let View::Post(view) = &mut self.view {
                    if view.id == id {
                        match result {
                            Ok(post) => view.state = PostState::Ready(Box::new(post)),
                            Err(BroadsheetError::Cancelled) => {}
                            Err(e) => view.state = PostState::Failed(e.user_message()),
                        }
                    }
                }
                Vec::new()
            }
            _ => {
                debug!("Dropping result for an unmounted view");
                Vec::new()
            }
        }
    }

    /// Move the list selection or scroll the post body by `delta` rows.
    /// Coming within the prefetch distance of the list end loads the next page.
    pub fn move_by(&mut self, delta: isize) -> Vec<Job> {
        let mount = self.mount;
        let distance = self.prefetch_distance;

        match &mut self.view {
            View::Home(list) | View::Search { list, .. } => {
                let len = list.feed.posts().len();
                if len > 0 {
                    let max = (len - 1) as isize;
                    list.selected = (list.selected as isize + delta).clamp(0, max) as usize;
                    list.pending_restore = None;
                }
                if !list.feed.posts().is_empty() || list.feed.last_error().is_some() {
                    let remaining = len.saturating_sub(list.selected + 1);
                    if remaining <= distance {
                        if let Some(ticket) = list.feed.load_more() {
                            return vec![Job::Page {
                                mount,
                                source: list.feed.source().clone(),
                                ticket,
                                page_size: list.feed.page_size(),
                            }];
                        }
                    }
                }
                Vec::new()
            }
            View::Post(post) => {
                let scroll = post.scroll as isize + delta;
                post.scroll = scroll.clamp(0, u16::MAX as isize) as u16;
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    /// Route for the selected list entry.
    pub fn selected_route(&self) -> Option<Route> {
        self.view
            .list()
            .and_then(ListView::selected_post)
            .map(|post| Route::Post(post.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::config::SpeechConfig;
    use crate::domain::PageMeta;
    use crate::speech::Speaker;

    /// A site with posts `1..=total`, newest first by id.
    struct FakeSite {
        total: u64,
        list_calls: AtomicUsize,
        search_calls: AtomicUsize,
    }

    impl FakeSite {
        fn new(total: u64) -> Self {
            Self {
                total,
                list_calls: AtomicUsize::new(0),
                search_calls: AtomicUsize::new(0),
            }
        }

        fn page(&self, page: u32, per_page: u32) -> FeedPage {
            let start = (page as u64 - 1) * per_page as u64 + 1;
            let end = (start + per_page as u64 - 1).min(self.total);
            FeedPage {
                posts: (start..=end).map(Post::new).collect(),
                meta: PageMeta {
                    page,
                    per_page,
                    total: None,
                    total_pages: None,
                    skipped: 0,
                },
            }
        }
    }

    #[async_trait]
    impl ContentApi for FakeSite {
        async fn list_posts(
            &self,
            page: u32,
            per_page: u32,
            cancel: &CancellationToken,
        ) -> Result<FeedPage> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            if cancel.is_cancelled() {
                return Err(BroadsheetError::Cancelled);
            }
            Ok(self.page(page, per_page))
        }

        async fn get_post(&self, id: PostId, cancel: &CancellationToken) -> Result<Post> {
            if cancel.is_cancelled() {
                return Err(BroadsheetError::Cancelled);
            }
            if id > self.total {
                return Err(BroadsheetError::Remote { status: 404 });
            }
            let mut post = Post::new(id);
            post.title = format!("Post {}", id);
            post.content = "<p>Body text.</p>".into();
            Ok(post)
        }

        async fn search(
            &self,
            _term: &str,
            page: u32,
            per_page: u32,
            _cancel: &CancellationToken,
        ) -> Result<FeedPage> {
            self.search_calls.fetch_add(1, Ordering::SeqCst);
            let mut found = self.page(page, per_page);
            found.posts.truncate(2);
            Ok(found)
        }
    }

    struct SilentSpeaker;

    #[async_trait]
    impl Speaker for SilentSpeaker {
        async fn speak(&self, _text: &str) -> Result<()> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    fn speech() -> SpeechController {
        SpeechController::new(Arc::new(SilentSpeaker), &SpeechConfig::default()).0
    }

    async fn run_all(nav: &mut Navigator, api: &FakeSite, mut jobs: Vec<Job>) {
        while let Some(job) = jobs.pop() {
            let outcome = job.run(api).await;
            jobs.extend(nav.apply(outcome));
        }
    }

    fn home_len(nav: &Navigator) -> usize {
        nav.view().list().map(|l| l.feed.posts().len()).unwrap_or(0)
    }

    #[tokio::test]
    async fn test_home_mount_loads_first_page() {
        let api = FakeSite::new(30);
        let mut speech = speech();
        let mut nav = Navigator::new(12, 3);

        let jobs = nav.navigate(Route::Home, &mut speech);
        assert_eq!(jobs.len(), 1);
        run_all(&mut nav, &api, jobs).await;

        assert!(matches!(nav.view(), View::Home(_)));
        assert_eq!(home_len(&nav), 12);
    }

    #[tokio::test]
    async fn test_navigation_cancels_pending_page() {
        let api = FakeSite::new(30);
        let mut speech = speech();
        let mut nav = Navigator::new(12, 3);

        let mut jobs = nav.navigate(Route::Home, &mut speech);
        let stale = jobs.pop().unwrap();
        if let Job::Page { ticket, .. } = &stale {
            assert!(!ticket.cancel.is_cancelled());
        }

        let post_jobs = nav.navigate(Route::Post(3), &mut speech);
        if let Job::Page { ticket, .. } = &stale {
            assert!(ticket.cancel.is_cancelled());
        }

        // The stale page resolves after the post view mounted
        let outcome = stale.run(&api).await;
        assert!(nav.apply(outcome).is_empty());
        run_all(&mut nav, &api, post_jobs).await;

        match nav.view() {
            View::Post(view) => assert_eq!(view.post().unwrap().id, 3),
            _ => panic!("expected post view"),
        }
    }

    #[tokio::test]
    async fn test_stale_outcome_after_refresh_ignored() {
        let api = FakeSite::new(30);
        let mut speech = speech();
        let mut nav = Navigator::new(12, 3);

        let stale = nav.navigate(Route::Home, &mut speech);
        let fresh = nav.refresh(&mut speech);
        run_all(&mut nav, &api, stale).await;
        assert_eq!(home_len(&nav), 0);

        run_all(&mut nav, &api, fresh).await;
        assert_eq!(home_len(&nav), 12);
    }

    #[tokio::test]
    async fn test_home_reentry_restores_offset() {
        let api = FakeSite::new(40);
        let mut speech = speech();
        let mut nav = Navigator::new(12, 3);

        let jobs = nav.navigate(Route::Home, &mut speech);
        run_all(&mut nav, &api, jobs).await;
        let jobs = nav.move_by(15);
        run_all(&mut nav, &api, jobs).await;
        let jobs = nav.move_by(15);
        run_all(&mut nav, &api, jobs).await;
        let selected = nav.view().list().unwrap().selected;
        assert!(selected >= 15);

        let jobs = nav.navigate(nav.selected_route().unwrap(), &mut speech);
        run_all(&mut nav, &api, jobs).await;

        let jobs = nav.navigate(Route::Home, &mut speech);
        run_all(&mut nav, &api, jobs).await;

        let list = nav.view().list().unwrap();
        assert_eq!(list.selected, selected);
        assert!(!list.is_restoring());
        assert!(list.feed.posts().len() > selected);
    }

    #[tokio::test]
    async fn test_restore_clamps_when_feed_runs_out() {
        let api = FakeSite::new(40);
        let mut speech = speech();
        let mut nav = Navigator::new(12, 3);

        let jobs = nav.navigate(Route::Home, &mut speech);
        run_all(&mut nav, &api, jobs).await;
        for _ in 0..5 {
            let jobs = nav.move_by(100);
            run_all(&mut nav, &api, jobs).await;
        }
        assert_eq!(nav.view().list().unwrap().selected, 39);
        nav.navigate(Route::About, &mut speech);

        // The site shrinks while the user is away
        let smaller = FakeSite::new(20);
        let jobs = nav.navigate(Route::Home, &mut speech);
        run_all(&mut nav, &smaller, jobs).await;

        let list = nav.view().list().unwrap();
        assert_eq!(list.selected, 19);
        assert!(list.feed.is_exhausted());
    }

    #[tokio::test]
    async fn test_prefetch_triggers_once() {
        let api = FakeSite::new(40);
        let mut speech = speech();
        let mut nav = Navigator::new(12, 3);

        let jobs = nav.navigate(Route::Home, &mut speech);
        run_all(&mut nav, &api, jobs).await;

        assert!(nav.move_by(5).is_empty());
        let mut triggered = Vec::new();
        for _ in 0..6 {
            triggered.extend(nav.move_by(1));
        }
        assert_eq!(triggered.len(), 1);

        run_all(&mut nav, &api, triggered).await;
        assert_eq!(home_len(&nav), 24);
        assert_eq!(api.list_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_leaving_post_stops_its_speech() {
        let api = FakeSite::new(5);
        let mut speech = speech();
        let mut nav = Navigator::new(12, 3);

        let jobs = nav.navigate(Route::Post(2), &mut speech);
        run_all(&mut nav, &api, jobs).await;
        let text = match nav.view() {
            View::Post(view) => view.post().unwrap().speech_text(),
            _ => panic!("expected post view"),
        };
        speech.start(2, &text).unwrap();
        assert_eq!(speech.speaking(), Some(2));

        nav.navigate(Route::About, &mut speech);
        assert_eq!(speech.speaking(), None);
    }

    #[tokio::test]
    async fn test_post_view_cancels_on_leave() {
        let api = FakeSite::new(5);
        let mut speech = speech();
        let mut nav = Navigator::new(12, 3);

        let mut jobs = nav.navigate(Route::Post(2), &mut speech);
        let job = jobs.pop().unwrap();
        nav.navigate(Route::About, &mut speech);

        if let Job::Post { cancel, .. } = &job {
            assert!(cancel.is_cancelled());
        }
        let outcome = job.run(&api).await;
        assert!(matches!(
            outcome,
            Outcome::Post {
                result: Err(BroadsheetError::Cancelled),
                ..
            }
        ));
        nav.apply(outcome);
        assert!(matches!(nav.view(), View::About));
    }

    #[tokio::test]
    async fn test_missing_post_shows_inline_error() {
        let api = FakeSite::new(5);
        let mut speech = speech();
        let mut nav = Navigator::new(12, 3);

        let jobs = nav.navigate(Route::Post(99), &mut speech);
        run_all(&mut nav, &api, jobs).await;
        match nav.view() {
            View::Post(view) => assert!(matches!(&view.state, PostState::Failed(m) if m.contains("Not found"))),
            _ => panic!("expected post view"),
        }
    }

    #[tokio::test]
    async fn test_empty_search_prompts_without_fetching() {
        let api = FakeSite::new(5);
        let mut speech = speech();
        let mut nav = Navigator::new(12, 3);

        assert!(nav.navigate(Route::Search(String::new()), &mut speech).is_empty());
        assert!(nav.move_by(1).is_empty());

        let jobs = nav.navigate(Route::Search("budget".into()), &mut speech);
        run_all(&mut nav, &api, jobs).await;
        assert_eq!(api.search_calls.load(Ordering::SeqCst), 1);
        match nav.view() {
            View::Search { query, list } => {
                assert_eq!(query, "budget");
                assert!(list.feed.is_exhausted());
                assert_eq!(list.feed.posts().len(), 2);
            }
            _ => panic!("expected search view"),
        }
    }

    #[tokio::test]
    async fn test_not_found_and_back() {
        let mut speech = speech();
        let mut nav = Navigator::new(12, 3);

        nav.navigate(Route::About, &mut speech);
        nav.navigate(crate::router::resolve("#/post/abc"), &mut speech);
        assert!(matches!(nav.view(), View::NotFound(raw) if raw == "#/post/abc"));

        assert!(nav.back(&mut speech).is_some());
        assert!(matches!(nav.view(), View::About));
        assert!(nav.back(&mut speech).is_none());
    }
}
