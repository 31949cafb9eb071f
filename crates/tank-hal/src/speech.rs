//! Audio output: prerecorded phrases and text to speech.
//!
//! Phrases live in sub-folders of a phrases directory; each folder name is a
//! phrase key and every audio file inside it (`.wav`, `.mp3`, `.aif`, any
//! case) is one take.  Each use of a phrase plays one take at random.
//!
//! [`PlayerSpeaker`] hands playback to an external player / TTS command on a
//! background worker, so a caller never waits for audio to finish.  While a
//! clip is still queued, new requests are dropped rather than piling up.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::thread;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tank_types::{PhraseCue, TankError};
use tracing::{debug, info, warn};

const AUDIO_EXTENSIONS: [&str; 3] = ["wav", "mp3", "aif"];

/// Something that can make the tank talk.
///
/// Both calls may fail; callers in the control loop log the failure and
/// carry on.
pub trait Speaker: Send {
    /// Play one take of the phrase identified by `cue`.
    fn say_phrase(&mut self, cue: &PhraseCue) -> Result<(), TankError>;

    /// Speak `text` with the synthesizer.
    fn say(&mut self, text: &str) -> Result<(), TankError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Phrase library
// ─────────────────────────────────────────────────────────────────────────────

/// Index of prerecorded takes, keyed by phrase name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhraseLibrary {
    phrases: BTreeMap<String, Vec<PathBuf>>,
}

impl PhraseLibrary {
    /// Scan `dir` for phrase folders.
    ///
    /// # Errors
    ///
    /// [`TankError::Config`] when `dir` cannot be read.
    pub fn scan(dir: &Path) -> Result<Self, TankError> {
        let entries = fs::read_dir(dir).map_err(|e| {
            TankError::Config(format!("cannot read phrases dir {}: {e}", dir.display()))
        })?;
        let mut phrases = BTreeMap::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let mut takes: Vec<PathBuf> = fs::read_dir(&path)
                .map(|files| {
                    files
                        .flatten()
                        .map(|f| f.path())
                        .filter(|p| p.is_file() && is_audio_file(p))
                        .collect()
                })
                .unwrap_or_default();
            takes.sort();
            phrases.insert(name.to_string(), takes);
        }
        let library = Self { phrases };
        info!(phrases = ?library.keys(), "found prerecorded phrases");
        Ok(library)
    }

    pub fn keys(&self) -> Vec<&str> {
        self.phrases.keys().map(String::as_str).collect()
    }

    pub fn takes(&self, key: &str) -> &[PathBuf] {
        self.phrases.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Pick one take of `key` at random.
    pub fn pick<R: Rng + ?Sized>(&self, key: &str, rng: &mut R) -> Result<&Path, TankError> {
        self.takes(key)
            .choose(rng)
            .map(PathBuf::as_path)
            .ok_or_else(|| TankError::SpeechFailure(format!("no recordings for phrase '{key}'")))
    }
}

fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| AUDIO_EXTENSIONS.iter().any(|a| ext.eq_ignore_ascii_case(a)))
}

// ─────────────────────────────────────────────────────────────────────────────
// External-command speaker
// ─────────────────────────────────────────────────────────────────────────────

/// Speaker that runs an audio player for phrases and a TTS program for text.
///
/// `player` and `tts` are argv vectors; the clip path or the text is
/// appended as the last argument.
pub struct PlayerSpeaker {
    library: PhraseLibrary,
    player: Vec<String>,
    tts: Vec<String>,
    rng: StdRng,
    queue: SyncSender<Vec<String>>,
}

impl PlayerSpeaker {
    pub fn new(library: PhraseLibrary, player: Vec<String>, tts: Vec<String>) -> Self {
        let (queue, jobs) = mpsc::sync_channel::<Vec<String>>(1);
        thread::Builder::new()
            .name("tank-speech".to_string())
            .spawn(move || {
                for argv in jobs {
                    run_to_completion(&argv);
                }
            })
            .map_err(|e| warn!(error = %e, "failed to start speech worker"))
            .ok();
        Self {
            library,
            player,
            tts,
            rng: StdRng::from_entropy(),
            queue,
        }
    }

    fn enqueue(&self, program: &[String], last_arg: String) -> Result<(), TankError> {
        if program.is_empty() {
            return Err(TankError::SpeechFailure("no program configured".into()));
        }
        let mut argv = program.to_vec();
        argv.push(last_arg);
        match self.queue.try_send(argv) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(argv)) => {
                debug!(?argv, "speech busy, dropping request");
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => {
                Err(TankError::SpeechFailure("speech worker is not running".into()))
            }
        }
    }
}

impl Speaker for PlayerSpeaker {
    fn say_phrase(&mut self, cue: &PhraseCue) -> Result<(), TankError> {
        let clip = self.library.pick(cue.key(), &mut self.rng)?.to_path_buf();
        info!(clip = %clip.display(), "playing");
        self.enqueue(&self.player, clip.to_string_lossy().into_owned())
    }

    fn say(&mut self, text: &str) -> Result<(), TankError> {
        info!(text, "saying");
        self.enqueue(&self.tts, text.to_string())
    }
}

fn run_to_completion(argv: &[String]) {
    let Some((program, args)) = argv.split_first() else {
        return;
    };
    match Command::new(program)
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
    {
        Ok(status) if status.success() => {}
        Ok(status) => warn!(%program, %status, "speech command failed"),
        Err(e) => warn!(%program, error = %e, "speech command could not be started"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Silent speaker
// ─────────────────────────────────────────────────────────────────────────────

/// Speaker for setups without audio: logs what it would have said.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentSpeaker;

impl Speaker for SilentSpeaker {
    fn say_phrase(&mut self, cue: &PhraseCue) -> Result<(), TankError> {
        info!(phrase = %cue, "silent: would play phrase");
        Ok(())
    }

    fn say(&mut self, text: &str) -> Result<(), TankError> {
        info!(text, "silent: would say");
        Ok(())
    }
}
