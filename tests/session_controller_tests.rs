// Session controller tests against scripted speech engines and relay
//
// Tokio time is paused, so timer-driven behaviour (debounce, restart, retry
// backoff) runs deterministically and instantly.

use anyhow::{bail, Result};
use diaa_voice::session::APOLOGY;
use diaa_voice::{
    event_channel, Collaborators, ControllerHandle, Event, EventSender, LanguagesConfig, Profile,
    RecognitionConfig, RecognitionErrorKind, Recognizer, Relay, RelayError, SessionController,
    SessionTimings, Status, Synthesizer, Utterance, Voice,
};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

// ============================================================================
// Fakes
// ============================================================================

struct FakeRecognizer {
    events: EventSender,
    running: Mutex<Option<Profile>>,
    starts: Mutex<Vec<Profile>>,
    failures_left: AtomicU32,
    overlaps: AtomicU32,
}

impl FakeRecognizer {
    fn new(events: EventSender, failures: u32) -> Self {
        Self {
            events,
            running: Mutex::new(None),
            starts: Mutex::new(Vec::new()),
            failures_left: AtomicU32::new(failures),
            overlaps: AtomicU32::new(0),
        }
    }

    fn running(&self) -> Option<Profile> {
        *self.running.lock().unwrap()
    }

    fn start_count(&self) -> usize {
        self.starts.lock().unwrap().len()
    }

    /// Platform ends the session on its own, as continuous recognizers do
    fn end_naturally(&self) {
        if let Some(profile) = self.running.lock().unwrap().take() {
            self.events.send(Event::RecognitionEnded(profile)).unwrap();
        }
    }
}

#[async_trait::async_trait]
impl Recognizer for FakeRecognizer {
    async fn start(&self, profile: Profile, config: &RecognitionConfig) -> Result<()> {
        assert!(config.continuous && config.interim_results);
        assert_eq!(config.max_alternatives, 1);

        self.starts.lock().unwrap().push(profile);
        if self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            bail!("recognizer busy");
        }

        let mut running = self.running.lock().unwrap();
        if running.is_some() {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
            bail!("already started");
        }
        *running = Some(profile);
        self.events.send(Event::RecognitionStarted(profile)).unwrap();
        Ok(())
    }

    async fn stop(&self, profile: Profile) -> Result<()> {
        let mut running = self.running.lock().unwrap();
        if *running != Some(profile) {
            bail!("not running");
        }
        *running = None;
        self.events.send(Event::RecognitionEnded(profile)).unwrap();
        Ok(())
    }

    fn name(&self) -> &str {
        "fake"
    }
}

struct FakeSynthesizer {
    events: EventSender,
    spoken: Mutex<Vec<Utterance>>,
    speaking: Arc<AtomicBool>,
    playing: Mutex<Option<JoinHandle<()>>>,
}

impl FakeSynthesizer {
    fn new(events: EventSender) -> Self {
        Self {
            events,
            spoken: Mutex::new(Vec::new()),
            speaking: Arc::new(AtomicBool::new(false)),
            playing: Mutex::new(None),
        }
    }

    fn spoken(&self) -> Vec<String> {
        self.spoken
            .lock()
            .unwrap()
            .iter()
            .map(|u| u.text.clone())
            .collect()
    }

    fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Synthesizer for FakeSynthesizer {
    fn voices(&self) -> Vec<Voice> {
        vec![
            Voice::new("Samantha", "en-US"),
            Voice::new("Bangla Female", "bn-IN"),
        ]
    }

    async fn speak(&self, utterance: Utterance) -> Result<()> {
        self.spoken.lock().unwrap().push(utterance);

        let events = self.events.clone();
        let speaking = Arc::clone(&self.speaking);
        let task = tokio::spawn(async move {
            speaking.store(true, Ordering::SeqCst);
            events.send(Event::SynthesisStarted).unwrap();
            tokio::time::sleep(Duration::from_secs(2)).await;
            speaking.store(false, Ordering::SeqCst);
            events.send(Event::SynthesisEnded).unwrap();
        });
        *self.playing.lock().unwrap() = Some(task);
        Ok(())
    }

    async fn cancel(&self) -> Result<()> {
        if let Some(task) = self.playing.lock().unwrap().take() {
            task.abort();
        }
        self.speaking.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &str {
        "fake"
    }
}

struct FakeRelay {
    status: Option<u16>,
    messages: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl Relay for FakeRelay {
    async fn send(&self, message: &str) -> std::result::Result<String, RelayError> {
        self.messages.lock().unwrap().push(message.to_string());
        match self.status {
            Some(code) => Err(RelayError::Status(code)),
            None => Ok(format!("You said {}", message)),
        }
    }
}

impl FakeRelay {
    fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    handle: ControllerHandle,
    events: EventSender,
    recognizer: Arc<FakeRecognizer>,
    synthesizer: Arc<FakeSynthesizer>,
    relay: Arc<FakeRelay>,
}

#[derive(Default)]
struct Options {
    timings: SessionTimings,
    start_failures: u32,
    relay_status: Option<u16>,
}

fn harness(options: Options) -> Harness {
    let (events_tx, events_rx) = event_channel();
    let recognizer = Arc::new(FakeRecognizer::new(events_tx.clone(), options.start_failures));
    let synthesizer = Arc::new(FakeSynthesizer::new(events_tx.clone()));
    let relay = Arc::new(FakeRelay {
        status: options.relay_status,
        messages: Mutex::new(Vec::new()),
    });

    let collaborators = Collaborators {
        recognizer: recognizer.clone(),
        synthesizer: synthesizer.clone(),
        relay: relay.clone(),
    };
    let (controller, handle) = SessionController::new(
        options.timings,
        LanguagesConfig::default(),
        collaborators,
        events_tx.clone(),
        events_rx,
    );
    tokio::spawn(controller.run());

    Harness {
        handle,
        events: events_tx,
        recognizer,
        synthesizer,
        relay,
    }
}

impl Harness {
    fn transcript(&self, text: &str, is_final: bool) {
        let profile = self.handle.snapshot().profile;
        self.events
            .send(Event::Transcript {
                profile,
                text: text.to_string(),
                is_final,
            })
            .unwrap();
    }

    fn error(&self, code: &str) {
        let profile = self.handle.snapshot().profile;
        self.events
            .send(Event::RecognitionError(
                profile,
                RecognitionErrorKind::from_code(code),
            ))
            .unwrap();
    }
}

async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

async fn started(options: Options) -> Harness {
    let h = harness(options);
    h.handle.start().unwrap();
    advance(10).await;
    h
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_start_begins_listening() {
    let h = started(Options::default()).await;

    assert_eq!(h.recognizer.running(), Some(Profile::Primary));
    let ui = h.handle.snapshot();
    assert!(ui.listening);
    assert!(!ui.start_visible);
    assert_eq!(ui.status, Status::Listening);
    assert_eq!(ui.status_text, "Listening...");
    assert_eq!(ui.switch_label, "বাংলায় যান");
}

#[tokio::test(start_paused = true)]
async fn test_permission_denied_is_terminal() {
    let h = started(Options::default()).await;

    h.error("not-allowed");
    h.recognizer.end_naturally();
    advance(5_000).await;

    let ui = h.handle.snapshot();
    assert!(!ui.listening);
    assert_eq!(ui.status, Status::PermissionDenied);
    assert_eq!(ui.status_text, "Please enable microphone access");
    assert!(ui.start_visible);
    assert_eq!(h.recognizer.start_count(), 1, "no automatic restart");
}

#[tokio::test(start_paused = true)]
async fn test_no_speech_restarts_recognition() {
    let h = started(Options::default()).await;

    // Platforms end the session right after reporting the error
    h.error("no-speech");
    h.recognizer.end_naturally();
    advance(400).await;
    assert_eq!(h.handle.snapshot().status, Status::NoSpeech);
    assert_eq!(h.recognizer.running(), None);

    advance(200).await;
    assert_eq!(h.recognizer.running(), Some(Profile::Primary));
    assert_eq!(h.recognizer.start_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_aborted_retries_after_delay() {
    let h = started(Options::default()).await;

    h.error("aborted");
    advance(10).await;
    h.recognizer.end_naturally();
    h.error("aborted");
    advance(900).await;
    assert_eq!(h.recognizer.running(), None);

    advance(200).await;
    assert_eq!(h.recognizer.running(), Some(Profile::Primary));
}

#[tokio::test(start_paused = true)]
async fn test_natural_end_restarts_recognition() {
    let h = started(Options::default()).await;

    h.recognizer.end_naturally();
    advance(400).await;
    assert_eq!(h.recognizer.running(), None);

    advance(200).await;
    assert_eq!(h.recognizer.running(), Some(Profile::Primary));
}

#[tokio::test(start_paused = true)]
async fn test_interim_results_debounce_to_one_dispatch() {
    let h = started(Options::default()).await;

    h.transcript("h", false);
    h.transcript("he", false);
    h.transcript("hello", false);
    advance(10).await;
    assert_eq!(h.handle.snapshot().status_text, "Listening: hello");

    h.transcript("hello", true);
    advance(1_400).await;
    assert!(h.relay.messages().is_empty());
    assert_eq!(h.handle.snapshot().status_text, "You: \"hello\"");

    advance(200).await;
    assert_eq!(h.relay.messages(), vec!["hello".to_string()]);

    advance(10_000).await;
    assert_eq!(h.relay.messages().len(), 1);
    assert_eq!(h.synthesizer.spoken(), vec!["You said hello".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_newer_final_restarts_quiet_period() {
    let h = started(Options::default()).await;

    h.transcript("hello", true);
    advance(1_000).await;
    h.transcript("hello there", true);
    advance(1_000).await;
    assert!(h.relay.messages().is_empty());

    advance(600).await;
    assert_eq!(h.relay.messages(), vec!["hello there".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_speaking_stops_recognition_and_resumes_after() {
    let h = started(Options::default()).await;

    h.transcript("hello", true);
    advance(1_600).await;

    assert!(h.synthesizer.is_speaking());
    assert_eq!(h.recognizer.running(), None);
    let ui = h.handle.snapshot();
    assert!(ui.speaking);
    assert_eq!(ui.status_text, "DIAA: \"You said hello\"");

    // Speech lasts 2s, then recognition resumes 1s later
    advance(2_000).await;
    assert!(!h.synthesizer.is_speaking());
    assert_eq!(h.recognizer.running(), None);

    advance(1_100).await;
    assert_eq!(h.recognizer.running(), Some(Profile::Primary));
    assert_eq!(h.handle.snapshot().status, Status::Listening);
}

#[tokio::test(start_paused = true)]
async fn test_relay_failure_speaks_apology() {
    let h = started(Options {
        relay_status: Some(500),
        ..Options::default()
    })
    .await;

    h.transcript("hello", true);
    advance(1_600).await;

    let ui = h.handle.snapshot();
    assert_ne!(ui.status, Status::Processing);
    assert_eq!(ui.status_text, format!("DIAA: \"{}\"", APOLOGY));
    assert_eq!(h.synthesizer.spoken(), vec![APOLOGY.to_string()]);

    // Session carries on once the apology is spoken
    advance(5_000).await;
    assert!(h.handle.snapshot().listening);
    assert_eq!(h.recognizer.running(), Some(Profile::Primary));
}

#[tokio::test(start_paused = true)]
async fn test_switch_language_while_listening() {
    let h = started(Options::default()).await;

    h.handle.switch_language().unwrap();
    advance(10).await;
    assert_eq!(h.recognizer.running(), None);
    let ui = h.handle.snapshot();
    assert_eq!(ui.profile, Profile::Secondary);
    assert_eq!(ui.status_text, "বাংলায় শুনছি...");
    assert_eq!(ui.switch_label, "Switch to English");

    advance(500).await;
    assert_eq!(h.recognizer.running(), Some(Profile::Secondary));

    h.handle.switch_language().unwrap();
    advance(10).await;
    assert_eq!(h.handle.snapshot().status_text, "Listening in English...");
    advance(500).await;
    assert_eq!(h.recognizer.running(), Some(Profile::Primary));
}

#[tokio::test(start_paused = true)]
async fn test_reply_spoken_in_active_language() {
    let h = started(Options::default()).await;

    h.handle.switch_language().unwrap();
    advance(600).await;
    h.transcript("নমস্কার", true);
    advance(1_600).await;

    let spoken = h.synthesizer.spoken.lock().unwrap().clone();
    assert_eq!(spoken.len(), 1);
    assert_eq!(spoken[0].lang, "bn-IN");
    assert_eq!(spoken[0].voice, Some(Voice::new("Bangla Female", "bn-IN")));
    assert_eq!(spoken[0].rate, 0.9);
}

#[tokio::test(start_paused = true)]
async fn test_start_failures_retry_until_success() {
    let h = started(Options {
        start_failures: 2,
        ..Options::default()
    })
    .await;

    assert_eq!(h.recognizer.running(), None);
    advance(2_100).await;
    assert_eq!(h.recognizer.start_count(), 3);
    assert_eq!(h.recognizer.running(), Some(Profile::Primary));
    assert!(h.handle.snapshot().listening);
}

#[tokio::test(start_paused = true)]
async fn test_start_failures_exhaust_retries() {
    let h = started(Options {
        start_failures: u32::MAX,
        ..Options::default()
    })
    .await;

    advance(10_000).await;

    // First attempt plus three retries
    assert_eq!(h.recognizer.start_count(), 4);
    let ui = h.handle.snapshot();
    assert!(!ui.listening);
    assert!(ui.start_visible);
    assert_eq!(ui.status, Status::RecognitionFailed);

    // Manual restart gets a fresh retry budget
    h.handle.start().unwrap();
    advance(10_000).await;
    assert_eq!(h.recognizer.start_count(), 8);
}

#[tokio::test(start_paused = true)]
async fn test_never_more_than_one_session() {
    let h = started(Options::default()).await;

    h.handle.switch_language().unwrap();
    h.handle.start().unwrap();
    h.handle.switch_language().unwrap();
    advance(100).await;
    h.recognizer.end_naturally();
    h.handle.stop().unwrap();
    h.handle.start().unwrap();
    h.handle.start().unwrap();
    advance(100).await;
    h.recognizer.end_naturally();
    h.handle.switch_language().unwrap();
    advance(5_000).await;

    assert_eq!(h.recognizer.overlaps.load(Ordering::SeqCst), 0);
    assert_eq!(h.recognizer.running(), Some(Profile::Secondary));
}

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_pending_dispatch() {
    let h = started(Options::default()).await;

    h.transcript("hello", true);
    advance(500).await;
    h.handle.stop().unwrap();
    advance(5_000).await;

    assert!(h.relay.messages().is_empty());
    assert_eq!(h.recognizer.running(), None);
    let ui = h.handle.snapshot();
    assert!(!ui.listening);
    assert!(ui.start_visible);
    assert_eq!(ui.status_text, "Session Ended");
}

#[tokio::test(start_paused = true)]
async fn test_final_result_after_stop_is_not_sent() {
    let h = started(Options::default()).await;

    h.handle.stop().unwrap();
    advance(10).await;
    // Recognizers may flush one last result after stop()
    h.transcript("bye", true);
    advance(5_000).await;

    assert!(h.relay.messages().is_empty());
    let ui = h.handle.snapshot();
    assert_eq!(ui.status_text, "Session Ended");
    assert!(ui.start_visible);
}

#[tokio::test(start_paused = true)]
async fn test_mute_cuts_speech_and_resumes() {
    let h = started(Options::default()).await;

    h.transcript("hello", true);
    advance(1_600).await;
    assert!(h.synthesizer.is_speaking());

    h.handle.mute().unwrap();
    advance(10).await;
    assert!(!h.synthesizer.is_speaking());
    assert!(!h.handle.snapshot().speaking);

    advance(500).await;
    assert_eq!(h.recognizer.running(), Some(Profile::Primary));
}

#[tokio::test(start_paused = true)]
async fn test_auto_start() {
    let h = harness(Options {
        timings: SessionTimings {
            auto_start: true,
            ..SessionTimings::default()
        },
        ..Options::default()
    });

    advance(900).await;
    assert_eq!(h.recognizer.running(), None);

    advance(200).await;
    assert_eq!(h.recognizer.running(), Some(Profile::Primary));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_everything() {
    let h = started(Options::default()).await;

    h.handle.shutdown().unwrap();
    advance(10).await;

    assert_eq!(h.recognizer.running(), None);
    assert!(h.handle.start().is_err());
}
