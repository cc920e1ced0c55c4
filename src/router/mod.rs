//! Fragment routing: `#/`, `#/post/{id}`, `#/about`, `#/search?q={term}`.

use std::fmt;

use tracing::debug;

use crate::domain::PostId;

const HISTORY_LIMIT: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    Post(PostId),
    About,
    Search(String),
    /// Anything unrecognized, carrying the fragment as typed
    NotFound(String),
}

/// Resolve a location fragment to a route.
///
/// The leading `#` and `/` are optional and a trailing slash is tolerated.
/// Post ids must be positive decimal integers.
pub fn resolve(fragment: &str) -> Route {
    let raw = fragment.trim();
    let stripped = raw.strip_prefix('#').unwrap_or(raw);
    let stripped = stripped.strip_prefix('/').unwrap_or(stripped);

    let (path, query) = match stripped.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (stripped, None),
    };
    let path = path.trim_end_matches('/');
    let segments: Vec<&str> = if path.is_empty() {
        Vec::new()
    } else {
        path.split('/').collect()
    };

    let route = match segments.as_slice() {
        [] => Route::Home,
        ["about"] => Route::About,
        ["search"] => Route::Search(query.map(search_term).unwrap_or_default()),
        ["post", id] => match parse_post_id(id) {
            Some(id) => Route::Post(id),
            None => Route::NotFound(raw.to_string()),
        },
        _ => Route::NotFound(raw.to_string()),
    };
    debug!("Resolved {:?} to {:?}", fragment, route);
    route
}

fn parse_post_id(segment: &str) -> Option<PostId> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse::<PostId>().ok().filter(|id| *id > 0)
}

fn search_term(query: &str) -> String {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "q")
        .map(|(_, value)| value.trim().to_string())
        .unwrap_or_default()
}

impl Route {
    /// Canonical fragment for this route.
    pub fn fragment(&self) -> String {
        match self {
            Route::Home => "#/".to_string(),
            Route::Post(id) => format!("#/post/{}", id),
            Route::About => "#/about".to_string(),
            Route::Search(term) if term.is_empty() => "#/search".to_string(),
            Route::Search(term) => {
                let query: String = url::form_urlencoded::Serializer::new(String::new())
                    .append_pair("q", term)
                    .finish();
                format!("#/search?{}", query)
            }
            Route::NotFound(raw) => raw.clone(),
        }
    }

    /// Whether leaving this route remembers its scroll position.
    pub fn restores_scroll(&self) -> bool {
        matches!(self, Route::Home)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Home => write!(f, "Home"),
            Route::Post(id) => write!(f, "Post {}", id),
            Route::About => write!(f, "About"),
            Route::Search(term) if term.is_empty() => write!(f, "Search"),
            Route::Search(term) => write!(f, "Search \"{}\"", term),
            Route::NotFound(raw) => write!(f, "Not found ({})", raw),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollTarget {
    Top,
    Restore(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: Option<Route>,
    pub to: Route,
    pub scroll: ScrollTarget,
}

impl Transition {
    pub fn is_refresh(&self) -> bool {
        self.from.as_ref() == Some(&self.to)
    }
}

/// Tracks the current route, back history and the home feed's saved offset.
#[derive(Debug, Default)]
pub struct Router {
    current: Option<Route>,
    history: Vec<Route>,
    home_offset: Option<usize>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&Route> {
        self.current.as_ref()
    }

    pub fn can_go_back(&self) -> bool {
        !self.history.is_empty()
    }

    /// Move to `to`. `outgoing_offset` is the scroll position of the view
    /// being left. Navigating to the current route is a refresh and scrolls
    /// to the top.
    pub fn navigate(&mut self, to: Route, outgoing_offset: usize) -> Transition {
        let from = self.current.take();
        if let Some(previous) = &from {
            if *previous != to {
                self.history.push(previous.clone());
                if self.history.len() > HISTORY_LIMIT {
                    self.history.remove(0);
                }
            }
        }
        self.enter(from, to, outgoing_offset)
    }

    /// Return to the previous route, if any.
    pub fn back(&mut self, outgoing_offset: usize) -> Option<Transition> {
        let to = self.history.pop()?;
        let from = self.current.take();
        Some(self.enter(from, to, outgoing_offset))
    }

    fn enter(&mut self, from: Option<Route>, to: Route, outgoing_offset: usize) -> Transition {
        let refresh = from.as_ref() == Some(&to);

        if let Some(previous) = &from {
            if previous.restores_scroll() {
                self.home_offset = Some(outgoing_offset);
            }
        }

        let scroll = match (&to, self.home_offset) {
            (Route::Home, Some(offset)) if !refresh => ScrollTarget::Restore(offset),
            _ => ScrollTarget::Top,
        };
        if refresh && to.restores_scroll() {
            self.home_offset = None;
        }

        self.current = Some(to.clone());
        Transition { from, to, scroll }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_routes() {
        assert_eq!(resolve("#/"), Route::Home);
        assert_eq!(resolve(""), Route::Home);
        assert_eq!(resolve("#"), Route::Home);
        assert_eq!(resolve("#/post/42"), Route::Post(42));
        assert_eq!(resolve("post/42/"), Route::Post(42));
        assert_eq!(resolve("#/about"), Route::About);
        assert_eq!(resolve("#/search?q=climate"), Route::Search("climate".into()));
    }

    #[test]
    fn test_non_numeric_post_id_is_not_found() {
        assert_eq!(resolve("#/post/abc"), Route::NotFound("#/post/abc".into()));
        assert!(matches!(resolve("#/post/0"), Route::NotFound(_)));
        assert!(matches!(resolve("#/post/-3"), Route::NotFound(_)));
        assert!(matches!(resolve("#/post/+3"), Route::NotFound(_)));
        assert!(matches!(resolve("#/post/"), Route::NotFound(_)));
        assert!(matches!(resolve("#/post/1/2"), Route::NotFound(_)));
    }

    #[test]
    fn test_unknown_routes_not_found() {
        assert!(matches!(resolve("#/category/news"), Route::NotFound(_)));
        assert!(matches!(resolve("#/About"), Route::NotFound(_)));
    }

    #[test]
    fn test_search_query_decoding() {
        assert_eq!(
            resolve("#/search?q=rust+lang%21"),
            Route::Search("rust lang!".into())
        );
        assert_eq!(resolve("#/search"), Route::Search(String::new()));
        assert_eq!(resolve("#/search?page=2"), Route::Search(String::new()));
    }

    #[test]
    fn test_fragment_resolves_back() {
        for route in [
            Route::Home,
            Route::Post(7),
            Route::About,
            Route::Search("a&b c".into()),
            Route::Search(String::new()),
        ] {
            assert_eq!(resolve(&route.fragment()), route);
        }
    }

    #[test]
    fn test_home_offset_restored_on_reentry() {
        let mut router = Router::new();
        let first = router.navigate(Route::Home, 0);
        assert_eq!(first.scroll, ScrollTarget::Top);
        assert_eq!(first.from, None);

        let to_post = router.navigate(Route::Post(5), 17);
        assert_eq!(to_post.scroll, ScrollTarget::Top);

        let home = router.navigate(Route::Home, 0);
        assert_eq!(home.scroll, ScrollTarget::Restore(17));
    }

    #[test]
    fn test_non_home_views_scroll_to_top() {
        let mut router = Router::new();
        router.navigate(Route::Post(1), 0);
        router.navigate(Route::About, 30);
        let back = router.navigate(Route::Post(1), 4);
        assert_eq!(back.scroll, ScrollTarget::Top);
    }

    #[test]
    fn test_same_route_is_refresh() {
        let mut router = Router::new();
        router.navigate(Route::Home, 0);
        router.navigate(Route::About, 9);
        router.navigate(Route::Home, 0);

        let refresh = router.navigate(Route::Home, 9);
        assert!(refresh.is_refresh());
        assert_eq!(refresh.scroll, ScrollTarget::Top);
        // Refresh does not add a history entry
        assert_eq!(router.back(0).unwrap().to, Route::About);
    }

    #[test]
    fn test_back_walks_history() {
        let mut router = Router::new();
        router.navigate(Route::Home, 0);
        router.navigate(Route::Post(3), 8);
        router.navigate(Route::Post(4), 0);

        assert_eq!(router.back(0).unwrap().to, Route::Post(3));
        let home = router.back(0).unwrap();
        assert_eq!(home.to, Route::Home);
        assert_eq!(home.scroll, ScrollTarget::Restore(8));
        assert!(router.back(0).is_none());
        assert_eq!(router.current(), Some(&Route::Home));
    }
}
