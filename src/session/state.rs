use serde::Serialize;

use crate::config::LanguageProfile;

/// Which recognition language configuration is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    #[default]
    Primary,
    Secondary,
}

impl Profile {
    pub fn other(self) -> Self {
        match self {
            Profile::Primary => Profile::Secondary,
            Profile::Secondary => Profile::Primary,
        }
    }

    pub const ALL: [Profile; 2] = [Profile::Primary, Profile::Secondary];
}

/// What the status line currently says
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum Status {
    Idle,
    Listening,
    Switched,
    Interim(String),
    Heard(String),
    Processing,
    Speaking(String),
    NoSpeech,
    PermissionDenied,
    RecognitionFailed,
    RecognitionError(String),
    ConnectionError,
    SessionEnded,
}

impl Status {
    /// Statuses that must stay on screen until the user acts
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Status::PermissionDenied
                | Status::RecognitionFailed
                | Status::RecognitionError(_)
                | Status::ConnectionError
        )
    }

    /// Render the status line in the phrasing of the active language
    pub fn render(&self, language: &LanguageProfile) -> String {
        match self {
            Status::Idle => "Click Start to begin listening".to_string(),
            Status::Listening => language.listening_text.clone(),
            Status::Switched => language.switched_text.clone(),
            Status::Interim(text) => format!("Listening: {}", text),
            Status::Heard(text) => format!("You: \"{}\"", text),
            Status::Processing => "Processing...".to_string(),
            Status::Speaking(text) => format!("DIAA: \"{}\"", text),
            Status::NoSpeech => {
                "No speech detected. Please check your microphone and speak clearly.".to_string()
            }
            Status::PermissionDenied => "Please enable microphone access".to_string(),
            Status::RecognitionFailed => {
                "Speech recognition failed. Please refresh the page.".to_string()
            }
            Status::RecognitionError(kind) => format!("Error: {}", kind),
            Status::ConnectionError => "Connection error. Please try again.".to_string(),
            Status::SessionEnded => "Session Ended".to_string(),
        }
    }
}

/// Everything the UI needs to draw the controls
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UiSnapshot {
    pub status: Status,

    /// Rendered status line
    pub status_text: String,

    /// Whether the start control should be offered
    pub start_visible: bool,

    pub profile: Profile,

    /// Label of the language switch control (names the *other* language)
    pub switch_label: String,

    pub listening: bool,
    pub speaking: bool,
}

/// Controller-owned session state
///
/// Mutated only by [`super::Session::handle`].
#[derive(Debug, Clone)]
pub struct SessionState {
    /// User asked for continuous listening
    pub listening: bool,

    /// Synthesis is producing audio
    pub speaking: bool,

    pub profile: Profile,

    /// Consecutive failed starts, at most `max_retries`
    pub retries: u32,

    /// Final transcript waiting for the debounce window to close
    pub pending: Option<String>,

    /// Recognition session believed to be running
    pub running: Option<Profile>,

    /// Text handed to the synthesizer, shown once playback starts
    pub announcing: Option<String>,

    pub status: Status,
    pub start_visible: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            listening: false,
            speaking: false,
            profile: Profile::Primary,
            retries: 0,
            pending: None,
            running: None,
            announcing: None,
            status: Status::Idle,
            start_visible: true,
        }
    }
}
