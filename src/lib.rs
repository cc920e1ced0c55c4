//! # Broadsheet
//!
//! A terminal-first reader for WordPress news sites.
//!
//! ## Architecture
//!
//! ```text
//! ContentApi → Normalizer → FeedController → Navigator → UI
//!      ↕
//! ResponseCache (offline copies)
//! ```
//!
//! - [`api`]: REST client with cancellation and an offline fallback
//! - [`feed`]: Paginated feed engine with duplicate suppression
//! - [`view`]: Views and the navigation protocol between them
//! - [`tui`]: Terminal user interface built with ratatui
//!
//! ## Quick Start
//!
//! ```bash
//! # Latest posts
//! broadsheet --base-url https://news.example.org/wp-json/wp/v2/ latest
//!
//! # One post, or read it aloud
//! broadsheet show 42
//! broadsheet speak 42
//!
//! # Launch TUI at a search
//! broadsheet tui '#/search?q=budget'
//! ```

/// REST access to the news site.
///
/// - [`ContentApi`](api::ContentApi): async trait, every call cancellable
/// - [`WpClient`](api::WpClient): reqwest implementation
/// - [`CachedApi`](api::CachedApi): session post cache in front of any API
pub mod api;

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together the API client,
/// offline cache, post cache and speaker.
pub mod app;

/// Command-line interface using clap.
///
/// - `latest [--page N] [--all]` - Print feed pages
/// - `show <id>` - Print one post
/// - `search <term>` - Search posts
/// - `speak <id>` - Read a post aloud
/// - `route <fragment>` - Resolve a location fragment
/// - `clear-cache` - Delete offline copies
/// - `tui [fragment]` - Launch the TUI
pub mod cli;

/// Configuration loaded from `~/.config/broadsheet/config.toml`.
pub mod config;

/// Core domain models: [`Post`](domain::Post) and [`FeedPage`](domain::FeedPage).
pub mod domain;

pub mod feed;

/// WordPress JSON decoding and rich-text flattening.
pub mod normalizer;

/// Location fragments and navigation history.
pub mod router;

/// Chunked read-aloud playback.
pub mod speech;

/// SQLite-backed offline copies of API responses.
pub mod store;

/// Terminal user interface.
///
/// One view at a time (home feed, post, search, about) above a status bar.
/// Keybindings: j/k move, Enter opens, h goes back, / searches, : jumps to a
/// fragment, s reads aloud, q quits.
pub mod tui;

pub mod view;
