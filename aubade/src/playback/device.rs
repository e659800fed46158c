//! Audio device control.

use crate::config::PlaybackConfig;
use crate::errors::PlaybackFailure;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Controls the playback node's audio output.
#[async_trait]
pub trait PlaybackDevice: Send + Sync {
    /// Stops whatever is currently playing.
    async fn stop_all(&self) -> Result<(), PlaybackFailure>;

    /// Sets the output volume (0-100).
    async fn set_volume(&self, volume: u8) -> Result<(), PlaybackFailure>;

    /// Plays an audio file to completion.
    async fn play_file(&self, path: &Path) -> Result<(), PlaybackFailure>;

    /// Plays a short notification cue.
    async fn play_cue(&self, path: &Path) -> Result<(), PlaybackFailure> {
        self.play_file(path).await
    }

    /// Replaces the media queue with `references` and starts it.
    async fn queue_references(&self, references: &[String]) -> Result<(), PlaybackFailure>;
}

/// A device driven by external commands.
///
/// Each operation is an argv template; `{file}`, `{volume}` and
/// `{reference}` are substituted. Empty templates are skipped.
#[derive(Debug, Clone)]
pub struct CommandDevice {
    play: Vec<String>,
    cue: Vec<String>,
    stop: Vec<String>,
    volume: Vec<String>,
    clear_queue: Vec<String>,
    enqueue: Vec<String>,
    start_queue: Vec<String>,
    play_timeout: Duration,
    command_timeout: Duration,
}

impl CommandDevice {
    /// Creates a device from configuration.
    #[must_use]
    pub fn from_config(config: &PlaybackConfig) -> Self {
        Self {
            play: config.play_command.clone(),
            cue: config.cue_command.clone(),
            stop: config.stop_command.clone(),
            volume: config.volume_command.clone(),
            clear_queue: config.clear_queue_command.clone(),
            enqueue: config.enqueue_command.clone(),
            start_queue: config.start_queue_command.clone(),
            play_timeout: Duration::from_secs(config.play_timeout_secs),
            command_timeout: Duration::from_secs(config.command_timeout_secs),
        }
    }

    async fn run(
        &self,
        target: &str,
        template: &[String],
        substitutions: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<(), PlaybackFailure> {
        let Some((program, args)) = template.split_first() else {
            debug!(target, "No command configured, skipping");
            return Ok(());
        };
        let args: Vec<String> = args
            .iter()
            .map(|arg| {
                substitutions
                    .iter()
                    .fold(arg.clone(), |acc, (key, value)| acc.replace(key, value))
            })
            .collect();

        debug!(target, program = %program, ?args, "Running device command");
        let child = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(timeout, child)
            .await
            .map_err(|_| PlaybackFailure::new(target, format!("{program} timed out after {timeout:?}")))?
            .map_err(|e| PlaybackFailure::new(target, format!("cannot run {program}: {e}")))?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(PlaybackFailure::new(
                target,
                format!("{program} exited with {}: {}", output.status, stderr.trim()),
            ))
        }
    }
}

#[async_trait]
impl PlaybackDevice for CommandDevice {
    async fn stop_all(&self) -> Result<(), PlaybackFailure> {
        self.run("stop", &self.stop, &[], self.command_timeout).await
    }

    async fn set_volume(&self, volume: u8) -> Result<(), PlaybackFailure> {
        let volume = volume.min(100).to_string();
        self.run("volume", &self.volume, &[("{volume}", volume.as_str())], self.command_timeout)
            .await
    }

    async fn play_file(&self, path: &Path) -> Result<(), PlaybackFailure> {
        let file = path.to_string_lossy();
        let file: &str = &file;
        self.run(file, &self.play, &[("{file}", file)], self.play_timeout)
            .await
    }

    async fn play_cue(&self, path: &Path) -> Result<(), PlaybackFailure> {
        let file = path.to_string_lossy();
        let file: &str = &file;
        self.run(file, &self.cue, &[("{file}", file)], self.command_timeout)
            .await
    }

    async fn queue_references(&self, references: &[String]) -> Result<(), PlaybackFailure> {
        self.run("queue", &self.clear_queue, &[], self.command_timeout).await?;
        for reference in references {
            self.run("queue", &self.enqueue, &[("{reference}", reference.as_str())], self.command_timeout)
                .await?;
        }
        self.run("queue", &self.start_queue, &[], self.command_timeout).await
    }
}

/// Picks a random `.wav` file from `dir`.
pub fn pick_cue<R: Rng + ?Sized>(dir: &Path, rng: &mut R) -> Option<PathBuf> {
    let mut cues: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
        })
        .collect();
    cues.sort();
    cues.choose(rng).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn device(play: &[&str]) -> CommandDevice {
        let config = PlaybackConfig {
            play_command: play.iter().map(ToString::to_string).collect(),
            stop_command: Vec::new(),
            play_timeout_secs: 2,
            ..PlaybackConfig::default()
        };
        CommandDevice::from_config(&config)
    }

    #[test]
    fn test_pick_cue_only_wav() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("chime-a.wav"), b"").unwrap();
        std::fs::write(dir.path().join("chime-b.WAV"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();

        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..20 {
            let cue = pick_cue(dir.path(), &mut rng).unwrap();
            assert!(cue.extension().unwrap().eq_ignore_ascii_case("wav"));
        }
    }

    #[test]
    fn test_pick_cue_empty_or_missing() {
        let dir = tempfile::tempdir().unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(pick_cue(dir.path(), &mut rng).is_none());
        assert!(pick_cue(&dir.path().join("missing"), &mut rng).is_none());
    }

    #[tokio::test]
    async fn test_empty_template_is_skipped() {
        device(&[]).stop_all().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_success_and_failure() {
        device(&["true", "{file}"]).play_file(Path::new("greeting.wav")).await.unwrap();

        let err = device(&["false", "{file}"])
            .play_file(Path::new("greeting.wav"))
            .await
            .unwrap_err();
        assert_eq!(err.target, "greeting.wav");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_timeout() {
        let config = PlaybackConfig {
            play_command: vec!["sleep".to_string(), "5".to_string()],
            play_timeout_secs: 0,
            ..PlaybackConfig::default()
        };
        let err = CommandDevice::from_config(&config)
            .play_file(Path::new("greeting.wav"))
            .await
            .unwrap_err();
        assert!(err.message.contains("timed out"));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let err = device(&["aubade-no-such-player", "{file}"])
            .play_file(Path::new("greeting.wav"))
            .await
            .unwrap_err();
        assert!(err.message.contains("cannot run"));
    }
}
