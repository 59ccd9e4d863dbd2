pub mod config;
pub mod http;
pub mod relay;
pub mod session;
pub mod speech;

pub use config::{Config, LanguageProfile, LanguagesConfig, SessionTimings, VoicePreferences};
pub use http::{create_router, AppState};
pub use relay::{DialogAgent, DialogflowAgent, HttpRelay, Relay, RelayError};
pub use session::{
    event_channel, Collaborators, ControllerHandle, Event, EventSender, Profile,
    RecognitionErrorKind, SessionController, Status, UiSnapshot,
};
pub use speech::{RecognitionConfig, Recognizer, Synthesizer, Utterance, Voice};
