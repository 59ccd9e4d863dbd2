//! Speech capabilities consumed by the session controller
//!
//! Recognition and synthesis engines are external. The controller only needs
//! to start/stop them and hear back about their lifecycle, which they report
//! by posting [`Event`](crate::session::Event)s into the controller's channel.

pub mod console;
mod voice;

pub use voice::{choose_voice, strip_emojis, Utterance, Voice, VoiceChooser};

use anyhow::Result;

use crate::config::LanguageProfile;
use crate::session::Profile;

/// Per-session recognizer settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionConfig {
    /// BCP-47 language tag
    pub lang: String,
    pub interim_results: bool,
    pub continuous: bool,
    pub max_alternatives: u32,
}

impl RecognitionConfig {
    pub fn for_language(language: &LanguageProfile) -> Self {
        Self {
            lang: language.lang.clone(),
            interim_results: true,
            continuous: true,
            max_alternatives: 1,
        }
    }
}

/// Speech recognition capability
///
/// Implementations post `RecognitionStarted`, `RecognitionEnded`,
/// `RecognitionError` and `Transcript` events for the profile they were
/// started with.
#[async_trait::async_trait]
pub trait Recognizer: Send + Sync {
    /// Begin a recognition session; fails if one is already running
    async fn start(&self, profile: Profile, config: &RecognitionConfig) -> Result<()>;

    /// Stop the session for `profile`; may fail if it is not running
    async fn stop(&self, profile: Profile) -> Result<()>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Speech synthesis capability
///
/// Implementations post `SynthesisStarted` when audio begins and
/// `SynthesisEnded` when it finishes.
#[async_trait::async_trait]
pub trait Synthesizer: Send + Sync {
    /// Voices currently available for selection
    fn voices(&self) -> Vec<Voice>;

    /// Queue an utterance
    async fn speak(&self, utterance: Utterance) -> Result<()>;

    /// Drop anything queued or playing
    async fn cancel(&self) -> Result<()>;

    fn name(&self) -> &str;
}
