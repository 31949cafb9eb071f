//! [`SpeechCue`] – fire-and-continue wrapper around a [`Speaker`].
//!
//! The control loop never looks at the outcome of a cue: failures are
//! logged here and dropped.

use tank_hal::Speaker;
use tank_types::PhraseCue;
use tracing::warn;

pub struct SpeechCue {
    speaker: Box<dyn Speaker>,
}

impl SpeechCue {
    pub fn new(speaker: Box<dyn Speaker>) -> Self {
        Self { speaker }
    }

    pub fn fire(&mut self, cue: &PhraseCue) {
        if let Err(e) = self.speaker.say_phrase(cue) {
            warn!(phrase = %cue, error = %e, "speech cue failed");
        }
    }

    pub fn say(&mut self, text: &str) {
        if let Err(e) = self.speaker.say(text) {
            warn!(text, error = %e, "speech failed");
        }
    }
}
