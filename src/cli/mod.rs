pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "broadsheet")]
#[command(about = "A terminal reader for WordPress news sites", long_about = None)]
pub struct Cli {
    /// Root of the site's REST namespace, overriding the config file
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Load configuration from this file instead of the default location
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the latest posts
    Latest {
        /// Page to print
        #[arg(short, long, default_value_t = 1)]
        page: u32,

        /// Keep loading pages until the feed runs out
        #[arg(long, conflicts_with = "page")]
        all: bool,
    },
    /// Print a single post
    Show {
        /// Post id
        id: u64,
    },
    /// Search posts
    Search {
        /// Search term
        term: String,

        #[arg(short, long, default_value_t = 1)]
        page: u32,
    },
    /// Read a post aloud
    Speak {
        /// Post id
        id: u64,
    },
    /// Show which view a location fragment opens
    Route {
        /// Fragment such as "#/post/42" or "#/search?q=budget"
        fragment: String,
    },
    /// Delete the offline copies of API responses
    ClearCache,
    /// Launch the TUI
    Tui {
        /// Fragment to open first
        #[arg(default_value = "#/")]
        fragment: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_latest_all() {
        let cli = Cli::parse_from(["broadsheet", "latest", "--all"]);
        assert!(matches!(cli.command, Commands::Latest { all: true, page: 1 }));
    }

    #[test]
    fn test_global_base_url() {
        let cli = Cli::parse_from([
            "broadsheet",
            "show",
            "42",
            "--base-url",
            "https://news.example.org/wp-json/wp/v2/",
        ]);
        assert_eq!(
            cli.base_url.as_deref(),
            Some("https://news.example.org/wp-json/wp/v2/")
        );
        assert!(matches!(cli.command, Commands::Show { id: 42 }));
    }

    #[test]
    fn test_tui_default_fragment() {
        let cli = Cli::parse_from(["broadsheet", "tui"]);
        match cli.command {
            Commands::Tui { fragment } => assert_eq!(fragment, "#/"),
            _ => panic!("expected tui"),
        }
    }

    #[test]
    fn test_parse_clear_cache() {
        let cli = Cli::parse_from(["broadsheet", "clear-cache"]);
        assert!(matches!(cli.command, Commands::ClearCache));
    }

    #[test]
    fn test_page_and_all_conflict() {
        assert!(Cli::try_parse_from(["broadsheet", "latest", "--all", "--page", "2"]).is_err());
    }
}
