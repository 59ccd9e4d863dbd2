use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{LanguageProfile, VoicePreferences};

/// A voice offered by the synthesis engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    pub name: String,
    /// BCP-47 language tag (e.g. "en-US")
    pub lang: String,
}

impl Voice {
    pub fn new(name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
        }
    }
}

/// Picks a voice for a language from what the engine offers
pub type VoiceChooser = Arc<dyn Fn(&[Voice], &VoicePreferences) -> Option<Voice> + Send + Sync>;

/// Default chooser: a preferred-name voice within the allowed languages, else
/// any voice in those languages
///
/// With no language hints every voice qualifies but only a name match is
/// returned, so the engine default is kept when nothing fits.
pub fn choose_voice(voices: &[Voice], prefs: &VoicePreferences) -> Option<Voice> {
    let lang_ok = |voice: &Voice| {
        prefs.lang_hints.is_empty()
            || prefs
                .lang_hints
                .iter()
                .any(|hint| voice.lang.contains(hint.as_str()))
    };
    let name_ok = |voice: &Voice| {
        let name = voice.name.to_lowercase();
        prefs
            .name_hints
            .iter()
            .any(|hint| name.contains(&hint.to_lowercase()))
    };

    let preferred = voices.iter().find(|&v| lang_ok(v) && name_ok(v));
    let fallback = || {
        if prefs.lang_hints.is_empty() {
            None
        } else {
            voices.iter().find(|&v| lang_ok(v))
        }
    };

    preferred.or_else(fallback).cloned()
}

/// Remove emoji so the synthesizer doesn't read them out
pub fn strip_emojis(text: &str) -> String {
    text.chars()
        .filter(|c| {
            !matches!(
                *c as u32,
                0x1F300..=0x1F6FF | 0x1F900..=0x1F9FF | 0x2600..=0x26FF | 0x2700..=0x27BF
            )
        })
        .collect()
}

/// Text plus voice settings handed to the synthesizer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Utterance {
    pub text: String,
    pub lang: String,
    pub voice: Option<Voice>,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

impl Utterance {
    pub fn new(text: &str, language: &LanguageProfile, voice: Option<Voice>) -> Self {
        Self {
            text: strip_emojis(text),
            lang: language.lang.clone(),
            voice,
            rate: language.voice.rate,
            pitch: language.voice.pitch,
            volume: language.voice.volume,
        }
    }
}
