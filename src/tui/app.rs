use crossterm::event::{KeyCode, KeyEvent};
use ratatui::widgets::ListState;

use crate::domain::Post;
use crate::normalizer::html;
use crate::router::{self, Route};
use crate::speech::{SpeechController, SpeechToggle};
use crate::tui::event::Action;
use crate::view::{Job, Navigator, View};

pub const PAGE_SIZE: isize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Search,
    Goto,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub kind: PromptKind,
    pub input: String,
}

impl Prompt {
    pub fn label(&self) -> &'static str {
        match self.kind {
            PromptKind::Search => "Search: ",
            PromptKind::Goto => "Go to: #",
        }
    }
}

pub struct TuiApp {
    pub navigator: Navigator,
    pub speech: SpeechController,
    pub status_message: Option<String>,
    pub prompt: Option<Prompt>,
    pub should_quit: bool,
    pub maximized: bool,
    pub list_state: ListState,
}

impl TuiApp {
    pub fn new(navigator: Navigator, speech: SpeechController) -> Self {
        let mut list_state = ListState::default();
        list_state.select(Some(0));

        Self {
            navigator,
            speech,
            status_message: None,
            prompt: None,
            should_quit: false,
            maximized: false,
            list_state,
        }
    }

    pub fn navigate(&mut self, route: Route) -> Vec<Job> {
        self.clear_status();
        self.navigator.navigate(route, &mut self.speech)
    }

    pub fn handle_action(&mut self, action: Action) -> Vec<Job> {
        match action {
            Action::Quit => {
                self.should_quit = true;
                Vec::new()
            }
            Action::MoveUp => self.navigator.move_by(-1),
            Action::MoveDown => self.navigator.move_by(1),
            Action::NextPage => self.navigator.move_by(PAGE_SIZE),
            Action::PrevPage => self.navigator.move_by(-PAGE_SIZE),
            Action::Select => match self.navigator.selected_route() {
                Some(route) => self.navigate(route),
                None => Vec::new(),
            },
            Action::Back => match self.navigator.back(&mut self.speech) {
                Some(jobs) => {
                    self.clear_status();
                    jobs
                }
                None => {
                    self.set_status("Nothing to go back to".to_string());
                    Vec::new()
                }
            },
            Action::Home => self.navigate(Route::Home),
            Action::About => self.navigate(Route::About),
            Action::Search => {
                let input = match self.navigator.route() {
                    Some(Route::Search(term)) => term.clone(),
                    _ => String::new(),
                };
                self.open_prompt(PromptKind::Search, input);
                Vec::new()
            }
            Action::Goto => {
                let input = self
                    .navigator
                    .route()
                    .map(|r| r.fragment().trim_start_matches('#').to_string())
                    .unwrap_or_default();
                self.open_prompt(PromptKind::Goto, input);
                Vec::new()
            }
            Action::Refresh => {
                self.clear_status();
                self.navigator.refresh(&mut self.speech)
            }
            Action::Speak => {
                self.toggle_speech();
                Vec::new()
            }
            Action::OpenInBrowser => {
                if let Some(link) = self.current_post().and_then(|p| p.link.clone()) {
                    self.open_external(&link);
                }
                Vec::new()
            }
            Action::OpenEmbed => {
                let embed = self
                    .open_post()
                    .and_then(|p| html::embeds(p.body_html()).into_iter().next());
                match embed {
                    Some(url) => self.open_external(&url),
                    None => self.set_status("No embedded player in this post".to_string()),
                }
                Vec::new()
            }
            Action::ToggleMaximize => {
                self.maximized = !self.maximized;
                Vec::new()
            }
            Action::None => Vec::new(),
        }
    }

    fn open_prompt(&mut self, kind: PromptKind, input: String) {
        self.prompt = Some(Prompt { kind, input });
    }

    /// Edit the open prompt. Enter navigates, Esc abandons.
    pub fn handle_prompt_key(&mut self, key: KeyEvent) -> Vec<Job> {
        let Some(prompt) = self.prompt.as_mut() else {
            return Vec::new();
        };

        match key.code {
            KeyCode::Esc => {
                self.prompt = None;
                Vec::new()
            }
            KeyCode::Backspace => {
                prompt.input.pop();
                Vec::new()
            }
            KeyCode::Char(c) => {
                prompt.input.push(c);
                Vec::new()
            }
            KeyCode::Enter => {
                let route = match prompt.kind {
                    PromptKind::Search => Route::Search(prompt.input.trim().to_string()),
                    PromptKind::Goto => router::resolve(&prompt.input),
                };
                self.prompt = None;
                self.navigate(route)
            }
            _ => Vec::new(),
        }
    }

    /// Post shown in the detail view, once loaded.
    fn open_post(&self) -> Option<&Post> {
        match self.navigator.view() {
            View::Post(view) => view.post(),
            _ => None,
        }
    }

    /// Open post, or the selected entry of a list.
    fn current_post(&self) -> Option<&Post> {
        self.open_post().or_else(|| {
            self.navigator
                .view()
                .list()
                .and_then(|list| list.selected_post())
        })
    }

    fn toggle_speech(&mut self) {
        let Some((id, text)) = self.open_post().map(|p| (p.id, p.speech_text())) else {
            self.set_status("Open a post to read it aloud".to_string());
            return;
        };

        match self.speech.toggle(id, &text) {
            Ok(SpeechToggle::Started) => self.set_status("Reading aloud (s to stop)".to_string()),
            Ok(SpeechToggle::Stopped) => self.set_status("Stopped reading".to_string()),
            Err(e) => self.set_status(e.to_string()),
        }
    }

    fn open_external(&mut self, url: &str) {
        if let Err(e) = open::that(url) {
            self.set_status(format!("Failed to open browser: {}", e));
        }
    }

    /// Keep the widget selection in line with the mounted list.
    pub fn sync_list_state(&mut self) {
        let selected = self.navigator.view().list().map_or(0, |list| list.selected);
        self.list_state.select(Some(selected));
    }

    pub fn set_status(&mut self, message: String) {
        self.status_message = Some(message);
    }

    pub fn clear_status(&mut self) {
        self.status_message = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use crossterm::event::KeyModifiers;

    use crate::app::Result;
    use crate::config::SpeechConfig;
    use crate::speech::Speaker;

    struct SilentSpeaker;

    #[async_trait]
    impl Speaker for SilentSpeaker {
        async fn speak(&self, _text: &str) -> Result<()> {
            Ok(())
        }
    }

    fn app() -> TuiApp {
        let (speech, _rx) = SpeechController::new(Arc::new(SilentSpeaker), &SpeechConfig::default());
        TuiApp::new(Navigator::new(12, 3), speech)
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(app: &mut TuiApp, text: &str) {
        for c in text.chars() {
            app.handle_prompt_key(key(KeyCode::Char(c)));
        }
    }

    #[test]
    fn test_search_prompt_submits_route() {
        let mut app = app();
        app.handle_action(Action::Search);
        type_text(&mut app, "budgetx");
        app.handle_prompt_key(key(KeyCode::Backspace));

        let jobs = app.handle_prompt_key(key(KeyCode::Enter));
        assert_eq!(jobs.len(), 1);
        assert!(app.prompt.is_none());
        assert_eq!(app.navigator.route(), Some(&Route::Search("budget".into())));
    }

    #[test]
    fn test_goto_prompt_resolves_fragment() {
        let mut app = app();
        app.handle_action(Action::Goto);
        type_text(&mut app, "/post/abc");
        app.handle_prompt_key(key(KeyCode::Enter));

        assert!(matches!(app.navigator.view(), View::NotFound(_)));
    }

    #[test]
    fn test_goto_prompt_prefilled_with_current_fragment() {
        let mut app = app();
        app.navigate(Route::About);
        app.handle_action(Action::Goto);
        assert_eq!(app.prompt.as_ref().unwrap().input, "/about");
    }

    #[test]
    fn test_escape_abandons_prompt() {
        let mut app = app();
        app.navigate(Route::About);
        app.handle_action(Action::Search);
        type_text(&mut app, "x");

        assert!(app.handle_prompt_key(key(KeyCode::Esc)).is_empty());
        assert!(app.prompt.is_none());
        assert_eq!(app.navigator.route(), Some(&Route::About));
    }

    #[test]
    fn test_back_without_history_sets_status() {
        let mut app = app();
        app.navigate(Route::Home);
        assert!(app.handle_action(Action::Back).is_empty());
        assert!(app.status_message.is_some());
    }

    #[test]
    fn test_speak_outside_post_view() {
        let mut app = app();
        app.navigate(Route::About);
        app.handle_action(Action::Speak);
        assert_eq!(app.speech.speaking(), None);
        assert!(app.status_message.is_some());
    }
}
