//! Session state machine
//!
//! `Session::handle` is the single place where [`SessionState`] changes. Every
//! user action, recognition/synthesis callback, timer expiry and relay reply
//! arrives as an [`Event`]; the machine answers with the [`Effect`]s the
//! driver must carry out. No I/O happens here, which keeps every transition
//! testable without a runtime.

use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::state::{Profile, SessionState, Status};
use crate::config::SessionTimings;
use crate::relay::RelayError;

/// Spoken when the relay cannot produce a reply
pub const APOLOGY: &str = "Sorry, I couldn't process your request at the moment. Please check your internet connection and try again.";

/// Scheduled task slots owned by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timer {
    /// Delayed (re)start of recognition, used for restarts and retry backoff
    Restart,
    /// Quiet period before a final transcript is dispatched
    Debounce,
    /// Boot-time start
    AutoStart,
}

/// Error kinds reported by the recognition platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionErrorKind {
    NotAllowed,
    NoSpeech,
    Aborted,
    Other(String),
}

impl RecognitionErrorKind {
    /// Map a platform error code such as `not-allowed`
    pub fn from_code(code: &str) -> Self {
        match code {
            "not-allowed" | "service-not-allowed" => Self::NotAllowed,
            "no-speech" => Self::NoSpeech,
            "aborted" => Self::Aborted,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for RecognitionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAllowed => f.write_str("not-allowed"),
            Self::NoSpeech => f.write_str("no-speech"),
            Self::Aborted => f.write_str("aborted"),
            Self::Other(code) => f.write_str(code),
        }
    }
}

#[derive(Debug)]
pub enum Event {
    // User controls
    StartRequested,
    MuteRequested,
    StopRequested,
    SwitchRequested,

    // Timers
    AutoStartDue,
    RestartDue,
    DebounceElapsed,

    // Outcome of a StartRecognition effect
    StartSucceeded(Profile),
    StartFailed(Profile, String),

    // Recognition callbacks
    RecognitionStarted(Profile),
    RecognitionEnded(Profile),
    RecognitionError(Profile, RecognitionErrorKind),
    Transcript {
        profile: Profile,
        text: String,
        is_final: bool,
    },

    // Synthesis callbacks
    SynthesisStarted,
    SynthesisEnded,

    RelayReplied(Result<String, RelayError>),

    /// Stop everything; the driver exits afterwards
    Shutdown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    StartRecognition(Profile),
    /// Best-effort; stopping an idle session is tolerated
    StopRecognition(Profile),
    Schedule(Timer, Duration),
    Cancel(Timer),
    Dispatch(String),
    Speak { text: String, profile: Profile },
    CancelSpeech,
}

/// The session controller's decision logic
#[derive(Debug, Clone)]
pub struct Session {
    state: SessionState,
    timings: SessionTimings,
}

impl Session {
    pub fn new(timings: SessionTimings) -> Self {
        Self {
            state: SessionState::default(),
            timings,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn timings(&self) -> &SessionTimings {
        &self.timings
    }

    /// Effects to run once when the controller boots
    pub fn boot(&self) -> Vec<Effect> {
        if self.timings.auto_start {
            vec![Effect::Schedule(
                Timer::AutoStart,
                self.timings.auto_start_delay(),
            )]
        } else {
            Vec::new()
        }
    }

    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        debug!("Session event: {:?}", event);

        let mut effects = Vec::new();
        match event {
            Event::StartRequested | Event::AutoStartDue => self.request_start(&mut effects),
            Event::MuteRequested => self.mute(&mut effects),
            Event::StopRequested | Event::Shutdown => self.stop_session(&mut effects),
            Event::SwitchRequested => self.switch_profile(&mut effects),

            Event::RestartDue => {
                if self.state.listening && !self.state.speaking {
                    self.safe_start(&mut effects);
                } else {
                    debug!(
                        "Restart skipped (listening={}, speaking={})",
                        self.state.listening, self.state.speaking
                    );
                }
            }
            Event::DebounceElapsed => self.flush_transcript(&mut effects),

            Event::StartSucceeded(profile) => {
                self.state.running = Some(profile);
                self.state.retries = 0;
            }
            Event::StartFailed(profile, reason) => {
                self.start_failed(profile, &reason, &mut effects)
            }

            Event::RecognitionStarted(profile) => self.session_started(profile, &mut effects),
            Event::RecognitionEnded(profile) => self.session_ended(profile, &mut effects),
            Event::RecognitionError(profile, kind) => {
                self.session_error(profile, kind, &mut effects)
            }
            Event::Transcript {
                profile,
                text,
                is_final,
            } => self.transcript(profile, text, is_final, &mut effects),

            Event::SynthesisStarted => self.synthesis_started(&mut effects),
            Event::SynthesisEnded => self.synthesis_ended(&mut effects),

            Event::RelayReplied(result) => self.relay_replied(result, &mut effects),
        }
        effects
    }

    // ========================================================================
    // User controls
    // ========================================================================

    fn request_start(&mut self, effects: &mut Vec<Effect>) {
        info!("Listening requested ({:?})", self.state.profile);

        self.state.listening = true;
        self.state.retries = 0;
        self.state.start_visible = false;
        effects.push(Effect::Cancel(Timer::Restart));
        self.safe_start(effects);
    }

    fn mute(&mut self, effects: &mut Vec<Effect>) {
        if !self.state.speaking {
            return;
        }

        self.state.speaking = false;
        self.state.announcing = None;
        effects.push(Effect::CancelSpeech);
        if self.state.listening {
            effects.push(Effect::Schedule(
                Timer::Restart,
                self.timings.restart_delay(),
            ));
        }
    }

    fn stop_session(&mut self, effects: &mut Vec<Effect>) {
        info!("Session stopped by user");

        self.state.listening = false;
        self.state.speaking = false;
        self.state.pending = None;
        self.state.running = None;
        self.state.announcing = None;

        for profile in Profile::ALL {
            effects.push(Effect::StopRecognition(profile));
        }
        effects.push(Effect::CancelSpeech);
        effects.push(Effect::Cancel(Timer::Debounce));
        effects.push(Effect::Cancel(Timer::Restart));
        effects.push(Effect::Cancel(Timer::AutoStart));

        self.state.status = Status::SessionEnded;
        self.state.start_visible = true;
    }

    fn switch_profile(&mut self, effects: &mut Vec<Effect>) {
        let previous = self.state.profile;
        effects.push(Effect::StopRecognition(previous));
        if self.state.running == Some(previous) {
            self.state.running = None;
        }

        self.state.profile = previous.other();
        self.state.status = Status::Switched;
        info!("Switched language {:?} -> {:?}", previous, self.state.profile);

        if self.state.listening && !self.state.speaking {
            effects.push(Effect::Schedule(
                Timer::Restart,
                self.timings.restart_delay(),
            ));
        }
    }

    // ========================================================================
    // Recognition lifecycle
    // ========================================================================

    /// Start the active profile unless it is already running
    fn safe_start(&mut self, effects: &mut Vec<Effect>) {
        let active = self.state.profile;
        match self.state.running {
            Some(profile) if profile == active => {
                debug!("Recognition already running, skipping start");
                return;
            }
            Some(other) => {
                effects.push(Effect::StopRecognition(other));
                self.state.running = None;
            }
            None => {}
        }
        effects.push(Effect::StartRecognition(active));
    }

    fn start_failed(&mut self, profile: Profile, reason: &str, effects: &mut Vec<Effect>) {
        warn!("Failed to start recognition ({:?}): {}", profile, reason);

        if self.state.retries < self.timings.max_retries {
            self.state.retries += 1;
            effects.push(Effect::Schedule(
                Timer::Restart,
                self.timings.retry_delay(),
            ));
        } else {
            warn!("Max retries reached, stopping recognition attempts");
            self.state.listening = false;
            self.state.status = Status::RecognitionFailed;
            self.state.start_visible = true;
        }
    }

    fn session_started(&mut self, profile: Profile, effects: &mut Vec<Effect>) {
        if !self.state.listening || self.state.profile != profile {
            // Started after the user stopped or switched away
            effects.push(Effect::StopRecognition(profile));
            return;
        }

        if !self.state.speaking {
            self.state.status = Status::Listening;
        }
        self.state.start_visible = false;
    }

    fn session_ended(&mut self, profile: Profile, effects: &mut Vec<Effect>) {
        if self.state.running == Some(profile) {
            self.state.running = None;
        }

        if self.state.listening {
            if !self.state.speaking && profile == self.state.profile {
                effects.push(Effect::Schedule(
                    Timer::Restart,
                    self.timings.restart_delay(),
                ));
            }
        } else {
            if !self.state.status.is_error() && self.state.status != Status::SessionEnded {
                self.state.status = Status::Idle;
            }
            self.state.start_visible = true;
        }
    }

    fn session_error(
        &mut self,
        profile: Profile,
        kind: RecognitionErrorKind,
        effects: &mut Vec<Effect>,
    ) {
        warn!("Speech recognition error ({:?}): {}", profile, kind);

        match kind {
            RecognitionErrorKind::NotAllowed => {
                self.state.listening = false;
                self.state.status = Status::PermissionDenied;
                self.state.start_visible = true;
                effects.push(Effect::Cancel(Timer::Restart));
            }
            RecognitionErrorKind::NoSpeech => {
                self.state.status = Status::NoSpeech;
                if self.state.listening {
                    effects.push(Effect::Schedule(
                        Timer::Restart,
                        self.timings.retry_delay(),
                    ));
                }
            }
            RecognitionErrorKind::Aborted => {
                info!("Recognition aborted, attempting restart...");
                if self.state.listening {
                    effects.push(Effect::Schedule(
                        Timer::Restart,
                        self.timings.retry_delay(),
                    ));
                }
            }
            RecognitionErrorKind::Other(code) => {
                self.state.listening = false;
                self.state.status = Status::RecognitionError(code);
                self.state.start_visible = true;
                effects.push(Effect::Cancel(Timer::Restart));
            }
        }
    }

    fn transcript(
        &mut self,
        profile: Profile,
        text: String,
        is_final: bool,
        effects: &mut Vec<Effect>,
    ) {
        if !self.state.listening || self.state.speaking || profile != self.state.profile {
            return;
        }

        effects.push(Effect::Cancel(Timer::Debounce));
        if is_final {
            self.state.status = Status::Heard(text.clone());
            self.state.pending = Some(text);
            effects.push(Effect::Schedule(Timer::Debounce, self.timings.debounce()));
        } else {
            self.state.pending = None;
            self.state.status = Status::Interim(text);
        }
    }

    fn flush_transcript(&mut self, effects: &mut Vec<Effect>) {
        if let Some(text) = self.state.pending.take() {
            info!("Dispatching transcript: {}", text);
            self.state.status = Status::Processing;
            effects.push(Effect::Dispatch(text));
        }
    }

    // ========================================================================
    // Synthesis and relay
    // ========================================================================

    fn synthesis_started(&mut self, effects: &mut Vec<Effect>) {
        self.state.speaking = true;
        if let Some(text) = self.state.announcing.take() {
            self.state.status = Status::Speaking(text);
        }
        effects.push(Effect::StopRecognition(self.state.profile));
        self.state.running = None;
    }

    fn synthesis_ended(&mut self, effects: &mut Vec<Effect>) {
        self.state.speaking = false;
        if self.state.listening {
            if matches!(self.state.status, Status::Speaking(_)) {
                self.state.status = Status::Listening;
            }
            effects.push(Effect::Schedule(
                Timer::Restart,
                self.timings.resume_after_speech(),
            ));
        }
    }

    fn relay_replied(&mut self, result: Result<String, RelayError>, effects: &mut Vec<Effect>) {
        if !self.state.listening {
            debug!("Discarding relay reply after session stop");
            if self.state.status == Status::Processing {
                self.state.status = Status::Idle;
                self.state.start_visible = true;
            }
            return;
        }

        let profile = self.state.profile;
        match result {
            Ok(reply) => {
                self.state.status = Status::Speaking(reply.clone());
                effects.push(Effect::Speak {
                    text: reply,
                    profile,
                });
            }
            Err(e) => {
                warn!("Relay request failed: {}", e);
                self.state.status = Status::ConnectionError;
                self.state.announcing = Some(APOLOGY.to_string());
                effects.push(Effect::Speak {
                    text: APOLOGY.to_string(),
                    profile,
                });
            }
        }
    }
}
