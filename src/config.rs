use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::session::Profile;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub session: SessionTimings,
    pub relay: RelayClientConfig,
    pub agent: AgentConfig,
    pub languages: LanguagesConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "diaa".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8888,
        }
    }
}

/// Timing and retry policy for the session controller
///
/// Delays are expressed in milliseconds in the config file.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionTimings {
    /// Maximum number of consecutive failed recognition starts
    pub max_retries: u32,

    /// Backoff before retrying a failed start or a transient recognition error
    pub retry_delay_ms: u64,

    /// Delay before restarting recognition after it ends, a language switch or a mute
    pub restart_delay_ms: u64,

    /// Delay before resuming recognition once synthesis finishes
    pub resume_after_speech_ms: u64,

    /// Quiet period after a final transcript before it is dispatched
    pub debounce_ms: u64,

    /// Start listening on boot without a user action
    pub auto_start: bool,

    /// Delay before the boot-time start
    pub auto_start_delay_ms: u64,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 1000,
            restart_delay_ms: 500,
            resume_after_speech_ms: 1000,
            debounce_ms: 1500,
            auto_start: false,
            auto_start_delay_ms: 1000,
        }
    }
}

impl SessionTimings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }

    pub fn resume_after_speech(&self) -> Duration {
        Duration::from_millis(self.resume_after_speech_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn auto_start_delay(&self) -> Duration {
        Duration::from_millis(self.auto_start_delay_ms)
    }
}

/// Where the front-end sends finalized transcripts
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayClientConfig {
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for RelayClientConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8888/message".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Dialogflow CX agent coordinates used by the relay server
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AgentConfig {
    pub project_id: Option<String>,
    pub location: Option<String>,
    pub agent_id: Option<String>,
    pub access_token: Option<String>,
    pub language_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LanguagesConfig {
    pub primary: LanguageProfile,
    pub secondary: LanguageProfile,
}

impl Default for LanguagesConfig {
    fn default() -> Self {
        Self {
            primary: LanguageProfile::english(),
            secondary: LanguageProfile::bengali(),
        }
    }
}

impl LanguagesConfig {
    pub fn get(&self, profile: Profile) -> &LanguageProfile {
        match profile {
            Profile::Primary => &self.primary,
            Profile::Secondary => &self.secondary,
        }
    }
}

/// A recognition language together with its user-facing phrasing
///
/// Each slot of [`LanguagesConfig`] has its own built-in profile; a partial
/// table in the config file only overrides the fields it names.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LanguageProfile {
    /// BCP-47 tag handed to the recognizer and synthesizer (e.g. "en-US")
    pub lang: String,

    /// Status shown while recognition is listening in this language
    pub listening_text: String,

    /// Status shown right after switching to this language
    pub switched_text: String,

    /// Label of the control that switches *to* this language
    pub switch_label: String,

    pub voice: VoicePreferences,
}

impl LanguageProfile {
    pub fn english() -> Self {
        Self {
            lang: "en-US".to_string(),
            listening_text: "Listening...".to_string(),
            switched_text: "Listening in English...".to_string(),
            switch_label: "Switch to English".to_string(),
            voice: VoicePreferences {
                rate: 1.1,
                pitch: 1.1,
                volume: 1.0,
                name_hints: vec![
                    "female".to_string(),
                    "Samantha".to_string(),
                    "Google US English Female".to_string(),
                ],
                lang_hints: Vec::new(),
            },
        }
    }

    pub fn bengali() -> Self {
        Self {
            lang: "bn-IN".to_string(),
            listening_text: "বাংলায় শুনছি...".to_string(),
            switched_text: "বাংলায় শুনছি...".to_string(),
            switch_label: "বাংলায় যান".to_string(),
            voice: VoicePreferences {
                rate: 0.9,
                pitch: 1.2,
                volume: 1.0,
                name_hints: vec!["female".to_string(), "woman".to_string()],
                lang_hints: vec!["bn".to_string(), "hi-IN".to_string()],
            },
        }
    }
}

/// Inputs for the voice chooser
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VoicePreferences {
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,

    /// Name fragments of preferred voices, matched case-insensitively
    pub name_hints: Vec<String>,

    /// Language fragments a voice must match; empty accepts any language
    pub lang_hints: Vec<String>,
}

impl Default for VoicePreferences {
    fn default() -> Self {
        Self {
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
            name_hints: Vec::new(),
            lang_hints: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from an optional file, overridden by `DIAA__*` environment variables
    ///
    /// Built-in defaults are the lowest layer, so nested tables merge field by field.
    pub fn load(path: &str) -> Result<Self> {
        let defaults = config::Config::try_from(&Config::default())
            .context("Failed to build default configuration")?;

        let settings = config::Config::builder()
            .add_source(defaults)
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("DIAA").separator("__"))
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path))?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_controller_policy() {
        let cfg = Config::default();

        assert_eq!(cfg.session.max_retries, 3);
        assert_eq!(cfg.session.retry_delay(), Duration::from_millis(1000));
        assert_eq!(cfg.session.restart_delay(), Duration::from_millis(500));
        assert_eq!(cfg.session.debounce(), Duration::from_millis(1500));
        assert!(!cfg.session.auto_start);
        assert_eq!(cfg.languages.primary.lang, "en-US");
        assert_eq!(cfg.languages.secondary.lang, "bn-IN");
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let cfg = Config::load("/nonexistent/diaa-config").unwrap();
        assert_eq!(cfg.service.http.port, 8888);
    }

    #[test]
    fn test_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("diaa.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[session]
debounce_ms = 800
auto_start = true

[languages.secondary]
lang = "hi-IN"
"#
        )
        .unwrap();

        let base = dir.path().join("diaa");
        let cfg = Config::load(base.to_str().unwrap()).unwrap();
        assert_eq!(cfg.session.debounce_ms, 800);
        assert!(cfg.session.auto_start);
        assert_eq!(cfg.session.max_retries, 3);
        assert_eq!(cfg.languages.secondary.lang, "hi-IN");
    }

    #[test]
    fn test_partial_language_table_keeps_slot_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("diaa.toml"),
            "[languages.secondary]\nlang = \"bn-BD\"\n",
        )
        .unwrap();

        let base = dir.path().join("diaa");
        let cfg = Config::load(base.to_str().unwrap()).unwrap();
        let secondary = &cfg.languages.secondary;
        let bengali = LanguageProfile::bengali();

        assert_eq!(secondary.lang, "bn-BD");
        assert_eq!(secondary.listening_text, bengali.listening_text);
        assert_eq!(secondary.switch_label, bengali.switch_label);
        assert_eq!(secondary.voice.name_hints, bengali.voice.name_hints);
        assert_eq!(secondary.voice.lang_hints, bengali.voice.lang_hints);
        assert_eq!(cfg.languages.primary.lang, "en-US");
    }
}
