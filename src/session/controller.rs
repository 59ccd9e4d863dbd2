use anyhow::{anyhow, Result};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use super::machine::{Effect, Event, Session, Timer};
use super::state::UiSnapshot;
use super::timers::{TimerElapsed, Timers};
use super::EventSender;
use crate::config::{LanguagesConfig, SessionTimings};
use crate::relay::Relay;
use crate::speech::{
    choose_voice, RecognitionConfig, Recognizer, Synthesizer, Utterance, VoiceChooser,
};

/// External capabilities the controller drives
#[derive(Clone)]
pub struct Collaborators {
    pub recognizer: Arc<dyn Recognizer>,
    pub synthesizer: Arc<dyn Synthesizer>,
    pub relay: Arc<dyn Relay>,
}

/// Runs the session state machine against real collaborators
///
/// A single task owns the [`Session`]; recognition and synthesis callbacks,
/// timers and relay replies all arrive through channels and are handled one
/// at a time.
pub struct SessionController {
    session: Session,
    languages: LanguagesConfig,
    collaborators: Collaborators,
    chooser: VoiceChooser,
    timers: Timers,
    events_tx: EventSender,
    events_rx: mpsc::UnboundedReceiver<Event>,
    timer_rx: mpsc::UnboundedReceiver<TimerElapsed>,
    ui: watch::Sender<UiSnapshot>,
}

/// User-facing controls of a running controller
#[derive(Clone)]
pub struct ControllerHandle {
    events: EventSender,
    ui: watch::Receiver<UiSnapshot>,
}

impl SessionController {
    /// Create a controller
    ///
    /// `events_tx`/`events_rx` must come from the same
    /// [`event_channel`](super::event_channel) the collaborators post into.
    pub fn new(
        timings: SessionTimings,
        languages: LanguagesConfig,
        collaborators: Collaborators,
        events_tx: EventSender,
        events_rx: mpsc::UnboundedReceiver<Event>,
    ) -> (Self, ControllerHandle) {
        let session = Session::new(timings);
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let (ui, ui_rx) = watch::channel(snapshot(&session, &languages));

        let controller = Self {
            session,
            languages,
            collaborators,
            chooser: Arc::new(choose_voice),
            timers: Timers::new(timer_tx),
            events_tx: events_tx.clone(),
            events_rx,
            timer_rx,
            ui,
        };

        let handle = ControllerHandle {
            events: events_tx,
            ui: ui_rx,
        };

        (controller, handle)
    }

    /// Replace the voice selection heuristic
    pub fn with_voice_chooser(mut self, chooser: VoiceChooser) -> Self {
        self.chooser = chooser;
        self
    }

    /// Process events until a shutdown is requested
    pub async fn run(mut self) {
        info!(
            "Session controller started (recognizer={}, synthesizer={})",
            self.collaborators.recognizer.name(),
            self.collaborators.synthesizer.name()
        );

        let boot = self.session.boot();
        self.apply(boot).await;

        loop {
            let event = tokio::select! {
                Some(event) = self.events_rx.recv() => event,
                Some(elapsed) = self.timer_rx.recv() => {
                    if !self.timers.accept(elapsed) {
                        continue;
                    }
                    match elapsed.timer {
                        Timer::Restart => Event::RestartDue,
                        Timer::Debounce => Event::DebounceElapsed,
                        Timer::AutoStart => Event::AutoStartDue,
                    }
                }
                else => break,
            };

            let shutdown = matches!(event, Event::Shutdown);
            self.process(event).await;
            if shutdown {
                break;
            }
        }

        self.timers.cancel_all();
        info!("Session controller stopped");
    }

    async fn process(&mut self, event: Event) {
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            let effects = self.session.handle(event);
            for effect in effects {
                if let Some(follow_up) = self.execute(effect).await {
                    queue.push_back(follow_up);
                }
            }
        }
        self.publish();
    }

    async fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            if let Some(follow_up) = self.execute(effect).await {
                self.process(follow_up).await;
            }
        }
        self.publish();
    }

    /// Carry out one effect; an immediate outcome is returned as a follow-up event
    async fn execute(&mut self, effect: Effect) -> Option<Event> {
        match effect {
            Effect::StartRecognition(profile) => {
                let config = RecognitionConfig::for_language(self.languages.get(profile));
                match self.collaborators.recognizer.start(profile, &config).await {
                    Ok(()) => Some(Event::StartSucceeded(profile)),
                    Err(e) => Some(Event::StartFailed(profile, format!("{:#}", e))),
                }
            }

            Effect::StopRecognition(profile) => {
                if let Err(e) = self.collaborators.recognizer.stop(profile).await {
                    debug!("Error stopping recognition ({:?}): {:#}", profile, e);
                }
                None
            }

            Effect::Schedule(timer, after) => {
                self.timers.schedule(timer, after);
                None
            }

            Effect::Cancel(timer) => {
                self.timers.cancel(timer);
                None
            }

            Effect::Dispatch(text) => {
                let relay = Arc::clone(&self.collaborators.relay);
                let events = self.events_tx.clone();
                tokio::spawn(async move {
                    let result = relay.send(&text).await;
                    let _ = events.send(Event::RelayReplied(result));
                });
                None
            }

            Effect::Speak { text, profile } => {
                let language = self.languages.get(profile);
                let voices = self.collaborators.synthesizer.voices();
                let voice = (self.chooser)(&voices, &language.voice);
                let utterance = Utterance::new(&text, language, voice);

                match self.collaborators.synthesizer.speak(utterance).await {
                    Ok(()) => None,
                    Err(e) => {
                        error!("Failed to speak reply: {:#}", e);
                        Some(Event::SynthesisEnded)
                    }
                }
            }

            Effect::CancelSpeech => {
                if let Err(e) = self.collaborators.synthesizer.cancel().await {
                    warn!("Failed to cancel speech: {:#}", e);
                }
                None
            }
        }
    }

    fn publish(&self) {
        let next = snapshot(&self.session, &self.languages);
        self.ui.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            if current.status_text != next.status_text {
                info!("Status: {}", next.status_text);
            }
            *current = next;
            true
        });
    }
}

fn snapshot(session: &Session, languages: &LanguagesConfig) -> UiSnapshot {
    let state = session.state();
    UiSnapshot {
        status: state.status.clone(),
        status_text: state.status.render(languages.get(state.profile)),
        start_visible: state.start_visible,
        profile: state.profile,
        switch_label: languages.get(state.profile.other()).switch_label.clone(),
        listening: state.listening,
        speaking: state.speaking,
    }
}

impl ControllerHandle {
    pub fn start(&self) -> Result<()> {
        self.send(Event::StartRequested)
    }

    pub fn mute(&self) -> Result<()> {
        self.send(Event::MuteRequested)
    }

    pub fn stop(&self) -> Result<()> {
        self.send(Event::StopRequested)
    }

    pub fn switch_language(&self) -> Result<()> {
        self.send(Event::SwitchRequested)
    }

    /// Stop the session and end the controller task
    pub fn shutdown(&self) -> Result<()> {
        self.send(Event::Shutdown)
    }

    /// Latest UI state
    pub fn snapshot(&self) -> UiSnapshot {
        self.ui.borrow().clone()
    }

    /// Receiver notified on every UI change
    pub fn subscribe(&self) -> watch::Receiver<UiSnapshot> {
        self.ui.clone()
    }

    fn send(&self, event: Event) -> Result<()> {
        self.events
            .send(event)
            .map_err(|_| anyhow!("session controller is not running"))
    }
}
