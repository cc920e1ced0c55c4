use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame,
};

use crate::app::error::OFFLINE_MESSAGE;
use crate::config::ColorConfig;
use crate::feed::FeedState;
use crate::normalizer::html;
use crate::tui::app::TuiApp;
use crate::view::{ListView, PostState, PostView, View};

pub fn render(frame: &mut Frame, app: &mut TuiApp, colors: &ColorConfig) {
    app.sync_list_state();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(5),    // View
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    // Maximized mode drops the border and title around the view
    let block = if app.maximized {
        Block::default()
    } else {
        Block::default()
            .title(view_title(app))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(colors.active_border))
    };

    if app.navigator.view().list().is_some() {
        render_list(frame, app, chunks[0], block, colors);
        render_status_bar(frame, app, chunks[1], colors);
        return;
    }

    match app.navigator.view() {
        View::Home(_) | View::Search { .. } => {}
        View::Post(view) => render_post(frame, view, chunks[0], block, colors),
        View::About => render_about(frame, chunks[0], block, colors),
        View::NotFound(raw) => {
            let text = Text::from(vec![
                Line::from(Span::styled(
                    "Page not found",
                    Style::default().fg(colors.error).add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
                Line::from(format!("Nothing lives at {}", raw)),
                Line::from("Press g for the home feed."),
            ]);
            frame.render_widget(Paragraph::new(text).block(block), chunks[0]);
        }
        View::Blank => frame.render_widget(block, chunks[0]),
    }

    render_status_bar(frame, app, chunks[1], colors);
}

fn view_title(app: &TuiApp) -> String {
    match app.navigator.route() {
        Some(route) => format!(" {} ", route),
        None => " Broadsheet ".to_string(),
    }
}

fn render_list(frame: &mut Frame, app: &mut TuiApp, area: Rect, block: Block, colors: &ColorConfig) {
    let (list_view, query) = match app.navigator.view() {
        View::Home(list) => (list, None),
        View::Search { query, list } => (list, Some(query.as_str())),
        _ => return,
    };

    if query == Some("") {
        let text = Paragraph::new("Press / and type a search term.").block(block);
        frame.render_widget(text, area);
        return;
    }

    let mut items: Vec<ListItem> = list_view
        .feed
        .posts()
        .iter()
        .map(|post| {
            let date = post
                .published_at
                .map(|d| d.format("%m/%d").to_string())
                .unwrap_or_else(|| "     ".to_string());
            ListItem::new(Line::from(vec![
                Span::styled(date, Style::default().fg(colors.metadata_date)),
                Span::raw(" "),
                Span::styled(post.display_title(), Style::default().fg(colors.title)),
            ]))
        })
        .collect();

    if let Some(footer) = list_footer(list_view, colors) {
        items.push(footer);
    }

    let highlight_style = Style::default()
        .bg(colors.selection_bg)
        .fg(colors.selection_fg)
        .add_modifier(Modifier::BOLD);

    let list = List::new(items)
        .block(block)
        .highlight_style(highlight_style)
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut app.list_state);
}

/// Trailing row describing the feed's loading state.
fn list_footer(list: &ListView, colors: &ColorConfig) -> Option<ListItem<'static>> {
    if let Some(message) = list.feed.last_error() {
        let style = if message == OFFLINE_MESSAGE {
            Style::default().fg(colors.notice)
        } else {
            Style::default().fg(colors.error)
        };
        return Some(ListItem::new(format!("{} (move down to retry)", message)).style(style));
    }

    let text = match list.feed.state() {
        FeedState::Fetching if list.is_restoring() => "Restoring your place...".to_string(),
        FeedState::Fetching => "Loading...".to_string(),
        FeedState::Exhausted if list.feed.posts().is_empty() => "No posts".to_string(),
        FeedState::Exhausted => format!("End of feed ({} posts)", list.feed.posts().len()),
        FeedState::Idle => match list.feed.total() {
            Some(total) => format!("{} of {} posts", list.feed.posts().len(), total),
            None => return None,
        },
    };
    Some(ListItem::new(text).style(Style::default().fg(colors.inactive_border)))
}

fn render_post(frame: &mut Frame, view: &PostView, area: Rect, block: Block, colors: &ColorConfig) {
    let post = match &view.state {
        PostState::Ready(post) => post,
        PostState::Loading => {
            frame.render_widget(Paragraph::new("Loading post...").block(block), area);
            return;
        }
        PostState::Failed(message) => {
            let style = if message == OFFLINE_MESSAGE {
                Style::default().fg(colors.notice)
            } else {
                Style::default().fg(colors.error)
            };
            let text = Text::from(vec![
                Line::from(Span::styled(message.clone(), style)),
                Line::from(""),
                Line::from("Press R to retry."),
            ]);
            frame.render_widget(Paragraph::new(text).block(block), area);
            return;
        }
    };

    let mut lines = Vec::new();

    lines.push(Line::from(Span::styled(
        post.display_title(),
        Style::default().fg(colors.title).add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(""));

    if let Some(author) = &post.author {
        lines.push(Line::from(Span::styled(
            format!("By: {}", author),
            Style::default().fg(colors.metadata_author),
        )));
    }
    if let Some(date) = post.published_at {
        lines.push(Line::from(Span::styled(
            format!("Date: {}", date.format("%Y-%m-%d %H:%M")),
            Style::default().fg(colors.metadata_date),
        )));
    }
    let categories: Vec<&str> = post.categories().collect();
    if !categories.is_empty() {
        lines.push(Line::from(format!("In: {}", categories.join(", "))));
    }
    if let Some(link) = &post.link {
        lines.push(Line::from(Span::styled(
            format!("Link: {}", link),
            Style::default().fg(colors.metadata_link),
        )));
    }
    if let Some(media) = &post.featured_media {
        let label = media.alt.as_deref().unwrap_or("Image");
        lines.push(Line::from(Span::styled(
            format!("{}: {}", label, media.url),
            Style::default().fg(colors.metadata_link),
        )));
    }
    for (i, embed) in html::embeds(post.body_html()).iter().enumerate() {
        let hint = if i == 0 { "  (v to open)" } else { "" };
        lines.push(Line::from(Span::styled(
            format!("Player: {}{}", embed, hint),
            Style::default().fg(colors.metadata_link),
        )));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(
        "─".repeat(area.width.saturating_sub(2) as usize),
    ));

    for paragraph in html::paragraphs(post.body_html()) {
        lines.push(Line::from(""));
        lines.push(Line::from(paragraph));
    }

    let paragraph = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((view.scroll, 0));

    frame.render_widget(paragraph, area);
}

fn render_about(frame: &mut Frame, area: Rect, block: Block, colors: &ColorConfig) {
    let text = Text::from(vec![
        Line::from(Span::styled(
            concat!("Broadsheet ", env!("CARGO_PKG_VERSION")),
            Style::default().fg(colors.title).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from("A terminal reader for WordPress news sites."),
        Line::from(""),
        Line::from("Routes: #/  #/post/{id}  #/search?q={term}  #/about"),
        Line::from("Press : to jump to one, / to search, s in a post to hear it."),
    ]);
    frame.render_widget(Paragraph::new(text).block(block).wrap(Wrap { trim: false }), area);
}

fn render_status_bar(frame: &mut Frame, app: &TuiApp, area: Rect, colors: &ColorConfig) {
    let status = if let Some(prompt) = &app.prompt {
        format!("{}{}_", prompt.label(), prompt.input)
    } else if let Some(msg) = &app.status_message {
        msg.clone()
    } else if let Some((chunk, total)) = app.speech.progress() {
        format!("Reading aloud {}/{}  s:Stop  h:Back  q:Quit", chunk + 1, total)
    } else if let Some(err) = app.speech.last_error() {
        format!("Speech stopped: {}", err)
    } else {
        let hints = match app.navigator.view() {
            View::Post(_) => "j/k:Scroll  s:Speak  o:Open  v:Player  h:Back  g:Home  m:Max  q:Quit",
            _ => "j/k:Nav  Enter:Open  /:Search  ::Go to  R:Refresh  a:About  h:Back  q:Quit",
        };
        hints.to_string()
    };

    let paragraph =
        Paragraph::new(status).style(Style::default().fg(colors.status_fg).bg(colors.status_bg));

    frame.render_widget(paragraph, area);
}
