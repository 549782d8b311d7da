//! OS-command speech sink with graceful degradation.
//!
//! Engine preference order: espeak-ng (then plain espeak), then macOS
//! `say`. When neither is on PATH the sink still constructs; it reports
//! not-ready and the queue drops utterances after admission. Synthesis
//! runs the command to completion on a blocking thread under a timeout;
//! `cancel()` kills the live child process.

use async_trait::async_trait;
use blurt_core::{SpeakParams, SpeechSink};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::SinkError;

/// How often the blocking worker polls the child for exit.
const CHILD_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Clone, Debug)]
pub struct CommandSinkConfig {
    pub espeak_bin: Option<PathBuf>,
    pub say_bin: Option<PathBuf>,
    pub timeout_ms: u64,
}

impl Default for CommandSinkConfig {
    fn default() -> Self {
        let timeout_ms = std::env::var("BLURT_TTS_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(20_000);
        let espeak_bin = resolve_bin("BLURT_ESPEAK_BIN", &["espeak-ng", "espeak"]);
        let say_bin = resolve_bin("BLURT_SAY_BIN", &["say"]);

        Self {
            espeak_bin,
            say_bin,
            timeout_ms,
        }
    }
}

/// Resolves a speech binary: an env override wins when it names an
/// existing file, otherwise the candidate names are tried on PATH in
/// order.
fn resolve_bin(env_key: &str, candidates: &[&str]) -> Option<PathBuf> {
    if let Some(overridden) = std::env::var_os(env_key).map(PathBuf::from) {
        if overridden.exists() {
            return Some(overridden);
        }
    }
    candidates.iter().find_map(|name| find_on_path(name))
}

fn find_on_path(name: &str) -> Option<PathBuf> {
    let name = Path::new(name);
    // Anything with a directory component is taken as-is.
    if name.parent().is_some_and(|p| !p.as_os_str().is_empty()) {
        return name.exists().then(|| name.to_path_buf());
    }
    std::env::split_paths(&std::env::var_os("PATH")?)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.exists())
}

#[derive(Clone, Debug, PartialEq)]
enum Engine {
    Espeak(PathBuf),
    Say(PathBuf),
    None,
}

impl Engine {
    fn name(&self) -> &'static str {
        match self {
            Engine::Espeak(_) => "espeak-ng",
            Engine::Say(_) => "say",
            Engine::None => "none",
        }
    }
}

type ChildSlot = Arc<Mutex<Option<Child>>>;

pub struct CommandSink {
    engine: Engine,
    timeout: Duration,
    child: ChildSlot,
}

impl CommandSink {
    pub fn new(config: CommandSinkConfig) -> Self {
        let engine = if let Some(bin) = config.espeak_bin {
            Engine::Espeak(bin)
        } else if let Some(bin) = config.say_bin {
            Engine::Say(bin)
        } else {
            Engine::None
        };
        match &engine {
            Engine::Espeak(bin) | Engine::Say(bin) => {
                info!(target = "tts", engine = engine.name(), bin = ?bin, "Detected speech engine");
            }
            Engine::None => {
                warn!(
                    target = "tts",
                    "No speech engine detected (espeak-ng/say missing); sink not ready"
                );
            }
        }
        Self {
            engine,
            timeout: Duration::from_millis(config.timeout_ms),
            child: Arc::new(Mutex::new(None)),
        }
    }

    fn build_command(&self, text: &str, params: &SpeakParams) -> Option<Command> {
        match &self.engine {
            Engine::Espeak(bin) => {
                let mut cmd = Command::new(bin);
                if let Some(voice) = &params.voice {
                    cmd.arg("-v").arg(voice);
                }
                cmd.arg("-s").arg(espeak_wpm(params.rate).to_string());
                cmd.arg("-a").arg(espeak_amplitude(params.volume).to_string());
                cmd.arg("-p").arg(espeak_pitch(params.pitch).to_string());
                cmd.arg(text);
                Some(cmd)
            }
            Engine::Say(bin) => {
                let mut cmd = Command::new(bin);
                if let Some(voice) = &params.voice {
                    cmd.arg("-v").arg(voice);
                }
                cmd.arg("-r").arg(say_rate(params.rate).to_string());
                cmd.arg(text);
                Some(cmd)
            }
            Engine::None => None,
        }
    }
}

#[async_trait]
impl SpeechSink for CommandSink {
    async fn deliver(&self, text: &str, params: &SpeakParams) -> blurt_core::Result<()> {
        let Some(mut cmd) = self.build_command(text, params) else {
            // Degrade gracefully: the text was already logged upstream.
            info!(target = "tts", text, "no speech engine; utterance not rendered");
            return Ok(());
        };
        cmd.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());
        debug!(target = "tts", command = ?cmd, "Running speech engine");

        let slot = Arc::clone(&self.child);
        let worker = task::spawn_blocking(move || run_child(cmd, slot));
        match timeout(self.timeout, worker).await {
            Ok(Ok(Ok(Some(status)))) if status.success() => Ok(()),
            Ok(Ok(Ok(Some(status)))) => {
                Err(SinkError::Engine(format!("speech engine exited with {status}")).into())
            }
            // Child taken by cancel(); treated as a completed utterance.
            Ok(Ok(Ok(None))) => Ok(()),
            Ok(Ok(Err(e))) => Err(SinkError::Io(e).into()),
            Ok(Err(join)) => Err(SinkError::Engine(format!("worker panicked: {join}")).into()),
            Err(_) => {
                self.cancel();
                Err(SinkError::Timeout(self.timeout).into())
            }
        }
    }

    fn cancel(&self) {
        if let Some(mut child) = self.child.lock().unwrap().take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    fn list_voices(&self) -> Vec<String> {
        let output = match &self.engine {
            Engine::Espeak(bin) => Command::new(bin).arg("--voices").output(),
            Engine::Say(bin) => Command::new(bin).args(["-v", "?"]).output(),
            Engine::None => return Vec::new(),
        };
        let Ok(output) = output else {
            return Vec::new();
        };
        let listing = String::from_utf8_lossy(&output.stdout);
        match &self.engine {
            Engine::Espeak(_) => parse_espeak_voices(&listing),
            Engine::Say(_) => parse_say_voices(&listing),
            Engine::None => Vec::new(),
        }
    }

    fn is_ready(&self) -> bool {
        self.engine != Engine::None
    }
}

/// Runs the child to completion, parking it in `slot` so `cancel()` can
/// kill it. Returns `None` when the child was taken away mid-run.
fn run_child(mut cmd: Command, slot: ChildSlot) -> std::io::Result<Option<ExitStatus>> {
    let child = cmd.spawn()?;
    slot.lock().unwrap().replace(child);
    loop {
        let mut guard = slot.lock().unwrap();
        let Some(child) = guard.as_mut() else {
            return Ok(None);
        };
        match child.try_wait()? {
            Some(status) => {
                guard.take();
                return Ok(Some(status));
            }
            None => {
                drop(guard);
                std::thread::sleep(CHILD_POLL_INTERVAL);
            }
        }
    }
}

fn espeak_wpm(rate: f32) -> i32 {
    (160.0 * rate).round().clamp(80.0, 450.0) as i32
}

fn espeak_amplitude(volume: f32) -> i32 {
    (100.0 * volume).round().clamp(50.0, 200.0) as i32
}

fn espeak_pitch(pitch: f32) -> i32 {
    (50.0 * pitch).round().clamp(0.0, 99.0) as i32
}

fn say_rate(rate: f32) -> i32 {
    (175.0 * rate).round().clamp(90.0, 400.0) as i32
}

/// `espeak-ng --voices` prints a fixed-width table; the voice name is the
/// fourth column.
fn parse_espeak_voices(listing: &str) -> Vec<String> {
    listing
        .lines()
        .skip(1)
        .filter_map(|line| line.split_whitespace().nth(3))
        .map(|name| name.to_string())
        .collect()
}

/// `say -v ?` prints `Name  locale  # sample`; the name is everything
/// before the locale column.
fn parse_say_voices(listing: &str) -> Vec<String> {
    listing
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .map(|name| name.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prosody_mapping_clamps() {
        assert_eq!(espeak_wpm(1.0), 160);
        assert_eq!(espeak_wpm(0.1), 80);
        assert_eq!(espeak_wpm(10.0), 450);
        assert_eq!(espeak_amplitude(1.0), 100);
        assert_eq!(espeak_amplitude(0.0), 50);
        assert_eq!(espeak_amplitude(5.0), 200);
        assert_eq!(espeak_pitch(1.0), 50);
        assert_eq!(espeak_pitch(0.0), 0);
        assert_eq!(espeak_pitch(3.0), 99);
        assert_eq!(say_rate(1.0), 175);
        assert_eq!(say_rate(0.1), 90);
    }

    #[test]
    fn espeak_command_carries_prosody_flags() {
        let sink = CommandSink::new(CommandSinkConfig {
            espeak_bin: Some(PathBuf::from("/usr/bin/espeak-ng")),
            say_bin: None,
            timeout_ms: 1_000,
        });
        let params = SpeakParams {
            voice: Some("en-GB".to_string()),
            rate: 1.5,
            pitch: 1.0,
            volume: 1.0,
        };
        let cmd = sink.build_command("hello", &params).unwrap();
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect();
        assert_eq!(
            args,
            vec!["-v", "en-GB", "-s", "240", "-a", "100", "-p", "50", "hello"]
        );
    }

    #[test]
    fn say_command_maps_rate_to_wpm() {
        let sink = CommandSink::new(CommandSinkConfig {
            espeak_bin: None,
            say_bin: Some(PathBuf::from("/usr/bin/say")),
            timeout_ms: 1_000,
        });
        let cmd = sink
            .build_command("hi", &SpeakParams::default())
            .unwrap();
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect();
        assert_eq!(args, vec!["-r", "175", "hi"]);
    }

    #[test]
    fn missing_engines_mean_not_ready() {
        let sink = CommandSink::new(CommandSinkConfig {
            espeak_bin: None,
            say_bin: None,
            timeout_ms: 1_000,
        });
        assert!(!sink.is_ready());
        assert!(sink
            .build_command("hi", &SpeakParams::default())
            .is_none());
        assert!(sink.list_voices().is_empty());
    }

    #[test]
    fn espeak_voice_table_parses() {
        let listing = "\
Pty Language       Age/Gender VoiceName          File                 Other Languages
 5  af              --/M      Afrikaans          gmw/af
 5  en-gb           --/M      English_(Great_Britain) gmw/en
";
        assert_eq!(
            parse_espeak_voices(listing),
            vec!["Afrikaans", "English_(Great_Britain)"]
        );
    }

    #[test]
    fn say_voice_listing_parses() {
        let listing = "\
Alex                en_US    # Most people recognize me by my voice.
Samantha            en_US    # Hello, my name is Samantha.
";
        assert_eq!(parse_say_voices(listing), vec!["Alex", "Samantha"]);
    }
}
