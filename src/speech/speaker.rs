use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::app::{BroadsheetError, Result};
use crate::config::SpeechConfig;

/// Something that can read text aloud. `speak` resolves once the text has
/// been spoken; dropping the future must stop playback.
#[async_trait]
pub trait Speaker: Send + Sync {
    async fn speak(&self, text: &str) -> Result<()>;
}

/// Speaks through an external program such as `espeak` or `say`, passing
/// the text as the final argument.
pub struct CommandSpeaker {
    command: String,
    args: Vec<String>,
}

impl CommandSpeaker {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    pub fn from_config(config: &SpeechConfig) -> Self {
        Self::new(config.command.clone(), config.args.clone())
    }
}

#[async_trait]
impl Speaker for CommandSpeaker {
    async fn speak(&self, text: &str) -> Result<()> {
        debug!("Running {} for {} chars", self.command, text.chars().count());

        let status = Command::new(&self.command)
            .args(&self.args)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| BroadsheetError::Speech(format!("Failed to run {}: {}", self.command, e)))?;

        if status.success() {
            Ok(())
        } else {
            Err(BroadsheetError::Speech(format!(
                "{} exited with {}",
                self.command, status
            )))
        }
    }
}
