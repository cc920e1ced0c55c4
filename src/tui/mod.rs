pub mod app;
pub mod event;
pub mod layout;

use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::Duration;

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;
use tracing::info;

use crate::app::{AppContext, Result};
use crate::router;
use crate::speech::SpeechController;
use crate::view::{Job, Navigator, Outcome};

use self::app::TuiApp;
use self::event::{AppEvent, EventHandler};

type Tui = Terminal<CrosstermBackend<Stdout>>;

/// Run the TUI starting at `fragment`.
pub async fn run(ctx: Arc<AppContext>, fragment: &str) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let result = run_app(&mut terminal, ctx, fragment).await;
    restore_terminal(&mut terminal)?;
    result
}

fn setup_terminal() -> Result<Tui> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Tui) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

async fn run_app(terminal: &mut Tui, ctx: Arc<AppContext>, fragment: &str) -> Result<()> {
    let config = ctx.config.clone();
    let (speech, mut speech_events) = SpeechController::new(ctx.speaker.clone(), &config.speech);
    let navigator = Navigator::new(config.api.page_size, config.feed.prefetch_distance);
    let mut tui_app = TuiApp::new(navigator, speech);
    let event_handler = EventHandler::new(Duration::from_millis(50));

    // Finished jobs come back here and are applied between frames
    let (outcome_tx, mut outcomes) = mpsc::unbounded_channel::<Outcome>();

    info!("Starting TUI at {}", fragment);
    let jobs = tui_app.navigate(router::resolve(fragment));
    spawn_jobs(&ctx, &outcome_tx, jobs);

    loop {
        while let Ok(outcome) = outcomes.try_recv() {
            let jobs = tui_app.navigator.apply(outcome);
            spawn_jobs(&ctx, &outcome_tx, jobs);
        }
        while let Ok(event) = speech_events.try_recv() {
            tui_app.speech.handle(event);
        }

        terminal.draw(|frame| layout::render(frame, &mut tui_app, &config.colors))?;

        match event_handler.next()? {
            AppEvent::Key(key) => {
                let jobs = if tui_app.prompt.is_some() {
                    tui_app.handle_prompt_key(key)
                } else {
                    let action = config.keybindings.get_action(&key);
                    tui_app.handle_action(action)
                };
                spawn_jobs(&ctx, &outcome_tx, jobs);
            }
            AppEvent::Tick => {}
        }

        if tui_app.should_quit {
            break;
        }
    }

    tui_app.speech.stop();
    Ok(())
}

fn spawn_jobs(ctx: &Arc<AppContext>, outcomes: &mpsc::UnboundedSender<Outcome>, jobs: Vec<Job>) {
    for job in jobs {
        let api = ctx.api.clone();
        let outcomes = outcomes.clone();
        tokio::spawn(async move {
            let outcome = job.run(api.as_ref()).await;
            // The loop may already have exited
            let _ = outcomes.send(outcome);
        });
    }
}
