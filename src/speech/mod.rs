//! Read-aloud playback for the detail view.
//!
//! At most one session is live. Starting a new one cancels the previous
//! session before anything else happens, and chunks of a session are spoken
//! strictly one after another.

pub mod chunker;
pub mod speaker;

pub use chunker::chunk_text;
pub use speaker::{CommandSpeaker, Speaker};

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::app::{BroadsheetError, Result};
use crate::config::SpeechConfig;
use crate::domain::PostId;

/// Progress reports from a running session, tagged with its session number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    ChunkStarted {
        session: u64,
        index: usize,
        total: usize,
    },
    Finished {
        session: u64,
    },
    Failed {
        session: u64,
        message: String,
    },
}

impl SpeechEvent {
    pub fn session(&self) -> u64 {
        match self {
            SpeechEvent::ChunkStarted { session, .. }
            | SpeechEvent::Finished { session }
            | SpeechEvent::Failed { session, .. } => *session,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechToggle {
    Started,
    Stopped,
}

struct Session {
    id: u64,
    post: PostId,
    cancel: CancellationToken,
    chunk: usize,
    total: usize,
}

pub struct SpeechController {
    speaker: Arc<dyn Speaker>,
    chunk_chars: usize,
    max_chunks: usize,
    events: mpsc::UnboundedSender<SpeechEvent>,
    next_session: u64,
    active: Option<Session>,
    last_error: Option<String>,
}

impl SpeechController {
    /// Returns the controller and the receiver its sessions report to. Feed
    /// every received event back through [`SpeechController::handle`].
    pub fn new(
        speaker: Arc<dyn Speaker>,
        config: &SpeechConfig,
    ) -> (Self, mpsc::UnboundedReceiver<SpeechEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let controller = Self {
            speaker,
            chunk_chars: config.chunk_chars,
            max_chunks: config.max_chunks,
            events,
            next_session: 0,
            active: None,
            last_error: None,
        };
        (controller, rx)
    }

    /// Start reading `post`, or stop if that post is already being read.
    pub fn toggle(&mut self, post: PostId, text: &str) -> Result<SpeechToggle> {
        if self.speaking() == Some(post) {
            self.stop();
            return Ok(SpeechToggle::Stopped);
        }
        self.start(post, text)?;
        Ok(SpeechToggle::Started)
    }

    /// Begin a new session, cancelling any live one first. Must be called
    /// from within a Tokio runtime.
    pub fn start(&mut self, post: PostId, text: &str) -> Result<u64> {
        self.stop();

        let chunks = chunk_text(text, self.chunk_chars, self.max_chunks);
        if chunks.is_empty() {
            return Err(BroadsheetError::Speech("Nothing to read".into()));
        }

        self.next_session += 1;
        let session = self.next_session;
        let cancel = CancellationToken::new();
        info!(
            "Speech session {} for post {}: {} chunks",
            session,
            post,
            chunks.len()
        );

        self.active = Some(Session {
            id: session,
            post,
            cancel: cancel.clone(),
            chunk: 0,
            total: chunks.len(),
        });
        self.last_error = None;

        tokio::spawn(play(
            self.speaker.clone(),
            chunks,
            session,
            cancel,
            self.events.clone(),
        ));
        Ok(session)
    }

    pub fn stop(&mut self) {
        if let Some(session) = self.active.take() {
            debug!("Stopping speech session {}", session.id);
            session.cancel.cancel();
        }
    }

    /// Stop only if `post` is the one being read.
    pub fn stop_if(&mut self, post: PostId) {
        if self.speaking() == Some(post) {
            self.stop();
        }
    }

    pub fn speaking(&self) -> Option<PostId> {
        self.active.as_ref().map(|s| s.post)
    }

    /// `(chunk index, chunk count)` of the live session.
    pub fn progress(&self) -> Option<(usize, usize)> {
        self.active.as_ref().map(|s| (s.chunk, s.total))
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Apply a session report. Returns false for reports from sessions that
    /// are no longer live.
    pub fn handle(&mut self, event: SpeechEvent) -> bool {
        let Some(active) = self.active.as_mut() else {
            return false;
        };
        if active.id != event.session() {
            return false;
        }

        match event {
            SpeechEvent::ChunkStarted { index, .. } => {
                active.chunk = index;
            }
            SpeechEvent::Finished { session } => {
                info!("Speech session {} finished", session);
                self.active = None;
            }
            SpeechEvent::Failed { session, message } => {
                warn!("Speech session {} failed: {}", session, message);
                self.active = None;
                self.last_error = Some(message);
            }
        }
        true
    }
}

impl Drop for SpeechController {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn play(
    speaker: Arc<dyn Speaker>,
    chunks: Vec<String>,
    session: u64,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<SpeechEvent>,
) {
    let total = chunks.len();

    for (index, chunk) in chunks.iter().enumerate() {
        if cancel.is_cancelled() {
            return;
        }
        let _ = events.send(SpeechEvent::ChunkStarted {
            session,
            index,
            total,
        });

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            result = speaker.speak(chunk) => result,
        };

        if let Err(e) = result {
            let _ = events.send(SpeechEvent::Failed {
                session,
                message: e.to_string(),
            });
            return;
        }
    }

    if !cancel.is_cancelled() {
        let _ = events.send(SpeechEvent::Finished { session });
    }
}
