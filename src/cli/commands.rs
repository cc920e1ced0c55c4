use tokio_util::sync::CancellationToken;

use crate::app::{AppContext, BroadsheetError, Result};
use crate::domain::{FeedPage, Post};
use crate::feed::{FeedController, FeedEvent, FeedSource};
use crate::normalizer::html;
use crate::router::{self, Route};
use crate::speech::{SpeechController, SpeechEvent};
use crate::store::ResponseCache;

pub async fn latest(ctx: &AppContext, page: u32, all: bool) -> Result<()> {
    let page_size = ctx.config.api.page_size;

    if !all {
        let result = ctx
            .api
            .list_posts(page, page_size, &CancellationToken::new())
            .await?;
        print_page(&result);
        return Ok(());
    }

    let mut feed = FeedController::new(FeedSource::Latest, page_size);
    let mut printed = 0;
    while let Some(event) = feed.load_next(ctx.api.as_ref()).await {
        if let FeedEvent::Failed { message } = event {
            return Err(BroadsheetError::Other(message));
        }
        for post in &feed.posts()[printed..] {
            println!("{}", format_summary(post));
        }
        printed = feed.posts().len();
    }

    println!("{} posts", printed);
    Ok(())
}

pub async fn show(ctx: &AppContext, id: u64) -> Result<()> {
    let post = ctx.api.get_post(id, &CancellationToken::new()).await?;
    println!("{}", format_post(&post));
    Ok(())
}

pub async fn search(ctx: &AppContext, term: &str, page: u32) -> Result<()> {
    let term = term.trim();
    if term.is_empty() {
        println!("Nothing to search for");
        return Ok(());
    }

    let result = ctx
        .api
        .search(term, page, ctx.config.api.page_size, &CancellationToken::new())
        .await?;
    if result.posts.is_empty() {
        println!("No posts match \"{}\"", term);
    } else {
        print_page(&result);
    }
    Ok(())
}

/// Read a post aloud until it finishes or Ctrl-C is pressed.
pub async fn speak(ctx: &AppContext, id: u64) -> Result<()> {
    let post = ctx.api.get_post(id, &CancellationToken::new()).await?;
    let (mut speech, mut events) = SpeechController::new(ctx.speaker.clone(), &ctx.config.speech);

    speech.start(post.id, &post.speech_text())?;
    println!("Reading \"{}\" (Ctrl-C to stop)", post.display_title());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                speech.stop();
                println!("Stopped");
                break;
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                if let SpeechEvent::ChunkStarted { index, total, .. } = &event {
                    println!("  [{}/{}]", index + 1, total);
                }
                speech.handle(event);
                if speech.speaking().is_none() {
                    break;
                }
            }
        }
    }

    match speech.last_error() {
        Some(message) => Err(BroadsheetError::Speech(message.to_string())),
        None => Ok(()),
    }
}

pub fn route(fragment: &str) {
    let route = router::resolve(fragment);
    println!("{}", describe_route(&route));
}

fn print_page(page: &FeedPage) {
    for post in &page.posts {
        println!("{}", format_summary(post));
    }
    match page.meta.total_pages {
        Some(total) => println!("Page {} of {}", page.meta.page, total),
        None => println!("Page {}", page.meta.page),
    }
    if page.has_more() {
        println!("More with --page {}", page.meta.page + 1);
    }
}

/// Drop every offline copy.
pub fn clear_cache(ctx: &AppContext) -> Result<()> {
    match &ctx.cache {
        Some(cache) => {
            let removed = cache.clear()?;
            println!("Removed {} cached responses", removed);
        }
        None => println!("Offline cache is disabled"),
    }
    Ok(())
}

/// One listing line: id, date, title.
pub fn format_summary(post: &Post) -> String {
    let date = post
        .published_at
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| " ".repeat(10));
    format!("{:>7}  {}  {}", post.id, date, post.display_title())
}

pub fn format_post(post: &Post) -> String {
    let mut lines = vec![post.display_title(), String::new()];

    if let Some(author) = &post.author {
        lines.push(format!("By: {}", author));
    }
    if let Some(date) = post.published_at {
        lines.push(format!("Date: {}", date.format("%Y-%m-%d %H:%M")));
    }
    let categories: Vec<&str> = post.categories().collect();
    if !categories.is_empty() {
        lines.push(format!("In: {}", categories.join(", ")));
    }
    if let Some(link) = &post.link {
        lines.push(format!("Link: {}", link));
    }
    if let Some(media) = &post.featured_media {
        lines.push(format!("Image: {}", media.url));
    }
    for embed in html::embeds(post.body_html()) {
        lines.push(format!("Player: {}", embed));
    }

    for paragraph in html::paragraphs(post.body_html()) {
        lines.push(String::new());
        lines.push(paragraph);
    }

    lines.join("\n")
}

pub fn describe_route(route: &Route) -> String {
    match route {
        Route::NotFound(_) => format!("{} -> not found", route.fragment()),
        _ => format!("{} -> {}", route.fragment(), route),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::domain::Term;

    fn sample() -> Post {
        let mut post = Post::new(42);
        post.title = "Rates &amp; bonds".into();
        post.published_at = Some(chrono::Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap());
        post.author = Some("Ana Ruiz".into());
        post.terms = vec![Term {
            name: "Economy".into(),
            taxonomy: "category".into(),
        }];
        post.content = r#"<p>First.</p><iframe src="https://player.example.com/v/1"></iframe><p>Second.</p>"#
            .into();
        post
    }

    #[test]
    fn test_format_summary() {
        assert_eq!(format_summary(&sample()), "     42  2024-03-01  Rates & bonds");
        assert_eq!(format_summary(&Post::new(7)), format!("      7  {}  (Untitled)", " ".repeat(10)));
    }

    #[test]
    fn test_format_post_sections() {
        let text = format_post(&sample());
        assert!(text.starts_with("Rates & bonds\n\nBy: Ana Ruiz\n"));
        assert!(text.contains("In: Economy"));
        assert!(text.contains("Player: https://player.example.com/v/1"));
        assert!(text.ends_with("First.\n\nSecond."));
    }

    #[test]
    fn test_describe_route() {
        assert_eq!(describe_route(&router::resolve("post/9")), "#/post/9 -> Post 9");
        assert_eq!(
            describe_route(&router::resolve("#/post/abc")),
            "#/post/abc -> not found"
        );
    }
}
