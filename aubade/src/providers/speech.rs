//! Text-to-speech via an external command (piper by default).

use crate::config::TtsConfig;
use crate::errors::{AubadeError, Result};
use crate::greeting::SpeechRenderer;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

/// Runs an argv template with the text on stdin; `{output}` is the WAV path.
#[derive(Debug, Clone)]
pub struct CommandSpeech {
    command: Vec<String>,
    timeout: Duration,
}

impl CommandSpeech {
    /// Creates a renderer from configuration.
    #[must_use]
    pub fn from_config(config: &TtsConfig) -> Self {
        Self {
            command: config.command.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    async fn run(&self, program: &str, args: &[String], text: &str) -> Result<std::process::Output> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes()).await?;
            stdin.shutdown().await?;
        }
        Ok(child.wait_with_output().await?)
    }
}

#[async_trait]
impl SpeechRenderer for CommandSpeech {
    async fn render(&self, text: &str, output: &Path) -> Result<()> {
        let Some((program, args)) = self.command.split_first() else {
            return Err(AubadeError::Config("tts.command is empty".to_string()));
        };
        let target = output.to_string_lossy();
        let args: Vec<String> = args.iter().map(|a| a.replace("{output}", &target)).collect();

        info!(program = %program, output = %output.display(), chars = text.len(), "Rendering speech");
        debug!(?args, "Speech command");

        let result = tokio::time::timeout(self.timeout, self.run(program, &args, text))
            .await
            .map_err(|_| AubadeError::collaborator("tts", format!("{program} timed out after {:?}", self.timeout)))??;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(AubadeError::collaborator(
                "tts",
                format!("{program} exited with {}: {}", result.status, stderr.trim()),
            ));
        }
        if !output.exists() {
            return Err(AubadeError::collaborator(
                "tts",
                format!("{program} wrote nothing to {}", output.display()),
            ));
        }
        Ok(())
    }
}
