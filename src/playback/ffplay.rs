use anyhow::{Context, Result};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct PlayerOptions {
    pub program: String,
    pub volume: u8,
    pub show_window: bool,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            program: "ffplay".into(),
            volume: 100,
            show_window: false,
        }
    }
}

/// Audible playback running in its own process.
///
/// Nothing is synchronized with it. A monitor thread logs how it exits and
/// hands the exit code back through `exit`.
pub struct Player {
    exit: Receiver<Option<i32>>,
}

impl Player {
    pub fn spawn(audio_file: &Path, options: &PlayerOptions) -> Result<Self> {
        let args = player_args(audio_file, options);

        let mut child = Command::new(&options.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("Failed to spawn {}. Is it installed?", options.program))?;

        log::info!("Player started: {} {}", options.program, args.join(" "));

        let program = options.program.clone();
        let (tx, exit) = mpsc::channel();
        std::thread::Builder::new()
            .name("player-monitor".into())
            .spawn(move || {
                let code = match child.wait() {
                    Ok(status) => {
                        match status.code() {
                            Some(0) => log::info!("Player exited with code 0"),
                            Some(code) => log::warn!("Player exited with code {}", code),
                            None => log::warn!("Player was terminated by a signal"),
                        }
                        status.code()
                    }
                    Err(err) => {
                        log::warn!("Failed to wait for {}: {}", program, err);
                        None
                    }
                };
                // Nobody may be waiting any more.
                let _ = tx.send(code);
            })
            .context("Failed to start player monitor thread")?;

        Ok(Self { exit })
    }

    /// Waits up to `timeout` for the player to exit and returns its exit code.
    ///
    /// `None` if it is still running, was killed by a signal, or could not be waited on.
    pub fn wait_timeout(self, timeout: Duration) -> Option<i32> {
        match self.exit.recv_timeout(timeout) {
            Ok(code) => code,
            Err(_) => {
                log::debug!("Player still running after {:?}, not waiting for it", timeout);
                None
            }
        }
    }
}

fn player_args(audio_file: &Path, options: &PlayerOptions) -> Vec<String> {
    let mut args = vec![
        "-autoexit".to_string(),
        "-loglevel".into(), "error".into(),
        "-volume".into(), options.volume.min(100).to_string(),
    ];
    if !options.show_window {
        args.push("-nodisp".into());
    }
    args.push(audio_file.to_string_lossy().into_owned());
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_args_are_headless() {
        let args = player_args(Path::new("song.mp3"), &PlayerOptions::default());
        assert_eq!(
            args,
            vec!["-autoexit", "-loglevel", "error", "-volume", "100", "-nodisp", "song.mp3"]
        );
    }

    #[test]
    fn window_and_volume_options() {
        let options = PlayerOptions {
            volume: 250,
            show_window: true,
            ..PlayerOptions::default()
        };
        let args = player_args(Path::new("a b.flac"), &options);
        assert!(!args.contains(&"-nodisp".to_string()));
        assert_eq!(args[4], "100");
        assert_eq!(args.last().unwrap(), "a b.flac");
    }

    #[test]
    fn missing_program_fails_to_spawn() {
        let options = PlayerOptions {
            program: "ledpulse-no-such-player".into(),
            ..PlayerOptions::default()
        };
        assert!(Player::spawn(Path::new("song.mp3"), &options).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn reports_exit_code() {
        let timeout = Duration::from_secs(5);
        let ok = PlayerOptions {
            program: "true".into(),
            ..PlayerOptions::default()
        };
        assert_eq!(Player::spawn(Path::new("x"), &ok).unwrap().wait_timeout(timeout), Some(0));

        let failing = PlayerOptions {
            program: "false".into(),
            ..PlayerOptions::default()
        };
        assert_eq!(
            Player::spawn(Path::new("x"), &failing).unwrap().wait_timeout(timeout),
            Some(1)
        );
    }

    #[cfg(unix)]
    #[test]
    fn exit_code_is_kept_until_asked_for() {
        let ok = PlayerOptions {
            program: "true".into(),
            ..PlayerOptions::default()
        };
        let player = Player::spawn(Path::new("x"), &ok).unwrap();
        std::thread::sleep(Duration::from_millis(500));
        assert_eq!(player.wait_timeout(Duration::ZERO), Some(0));
    }
}
