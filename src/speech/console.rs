//! Terminal stand-ins for the speech engines
//!
//! `ConsoleRecognizer` turns typed lines into final transcripts while a
//! session is running. `ConsoleSynthesizer` prints utterances and holds the
//! "speaking" state for roughly as long as reading them aloud would take.

use anyhow::{bail, Result};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{RecognitionConfig, Recognizer, Synthesizer, Utterance, Voice};
use crate::session::{Event, EventSender, Profile};

pub struct ConsoleRecognizer {
    events: EventSender,
    running: Mutex<Option<(Profile, RecognitionConfig)>>,
}

impl ConsoleRecognizer {
    pub fn new(events: EventSender) -> Self {
        Self {
            events,
            running: Mutex::new(None),
        }
    }

    /// Deliver a typed line as a final transcript of the running session
    pub async fn feed(&self, text: &str) {
        let running = self.running.lock().await;
        match running.as_ref() {
            Some((profile, config)) => {
                debug!("Transcript [{}]: {}", config.lang, text);
                let _ = self.events.send(Event::Transcript {
                    profile: *profile,
                    text: text.to_string(),
                    is_final: true,
                });
            }
            None => warn!("Not listening, ignoring input: {}", text),
        }
    }

    pub async fn running(&self) -> Option<Profile> {
        self.running.lock().await.as_ref().map(|(profile, _)| *profile)
    }
}

#[async_trait::async_trait]
impl Recognizer for ConsoleRecognizer {
    async fn start(&self, profile: Profile, config: &RecognitionConfig) -> Result<()> {
        let mut running = self.running.lock().await;
        if let Some((current, _)) = running.as_ref() {
            bail!("recognition already started for {:?}", current);
        }

        info!("Console recognition started ({})", config.lang);
        *running = Some((profile, config.clone()));
        let _ = self.events.send(Event::RecognitionStarted(profile));
        Ok(())
    }

    async fn stop(&self, profile: Profile) -> Result<()> {
        let mut running = self.running.lock().await;
        match running.as_ref() {
            Some((current, _)) if *current == profile => {
                *running = None;
                info!("Console recognition stopped ({:?})", profile);
                let _ = self.events.send(Event::RecognitionEnded(profile));
                Ok(())
            }
            _ => bail!("recognition not running for {:?}", profile),
        }
    }

    fn name(&self) -> &str {
        "console"
    }
}

pub struct ConsoleSynthesizer {
    events: EventSender,
    voices: Vec<Voice>,
    words_per_second: f32,
    playing: Mutex<Option<JoinHandle<()>>>,
}

impl ConsoleSynthesizer {
    pub fn new(events: EventSender, voices: Vec<Voice>) -> Self {
        Self {
            events,
            voices,
            words_per_second: 2.5,
            playing: Mutex::new(None),
        }
    }

    fn speaking_time(&self, utterance: &Utterance) -> Duration {
        let words = utterance.text.split_whitespace().count().max(1) as f32;
        let rate = utterance.rate.max(0.1);
        Duration::from_secs_f32(words / (self.words_per_second * rate))
    }
}

#[async_trait::async_trait]
impl Synthesizer for ConsoleSynthesizer {
    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    async fn speak(&self, utterance: Utterance) -> Result<()> {
        let mut playing = self.playing.lock().await;
        if let Some(previous) = playing.take() {
            previous.abort();
        }

        let events = self.events.clone();
        let duration = self.speaking_time(&utterance);
        let voice = utterance
            .voice
            .as_ref()
            .map(|v| v.name.clone())
            .unwrap_or_else(|| "default".to_string());

        *playing = Some(tokio::spawn(async move {
            let _ = events.send(Event::SynthesisStarted);
            println!("DIAA [{}, {}]: {}", utterance.lang, voice, utterance.text);
            tokio::time::sleep(duration).await;
            let _ = events.send(Event::SynthesisEnded);
        }));

        Ok(())
    }

    async fn cancel(&self) -> Result<()> {
        if let Some(playing) = self.playing.lock().await.take() {
            playing.abort();
            debug!("Console speech cancelled");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LanguageProfile;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_recognizer_rejects_double_start() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let recognizer = ConsoleRecognizer::new(tx);
        let config = RecognitionConfig::for_language(&LanguageProfile::english());

        recognizer.start(Profile::Primary, &config).await.unwrap();
        assert!(recognizer.start(Profile::Primary, &config).await.is_err());
        assert!(matches!(
            rx.recv().await,
            Some(Event::RecognitionStarted(Profile::Primary))
        ));
    }

    #[tokio::test]
    async fn test_recognizer_stop_when_idle_fails() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let recognizer = ConsoleRecognizer::new(tx);
        assert!(recognizer.stop(Profile::Secondary).await.is_err());
    }

    #[tokio::test]
    async fn test_feed_only_while_running() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let recognizer = ConsoleRecognizer::new(tx);
        recognizer.feed("ignored").await;
        assert!(rx.try_recv().is_err());

        let config = RecognitionConfig::for_language(&LanguageProfile::bengali());
        recognizer.start(Profile::Secondary, &config).await.unwrap();
        recognizer.feed("নমস্কার").await;

        assert!(matches!(rx.recv().await, Some(Event::RecognitionStarted(_))));
        match rx.recv().await {
            Some(Event::Transcript {
                profile,
                text,
                is_final,
            }) => {
                assert_eq!(profile, Profile::Secondary);
                assert_eq!(text, "নমস্কার");
                assert!(is_final);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_synthesizer_reports_lifecycle() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let synthesizer = ConsoleSynthesizer::new(tx, Vec::new());
        let utterance = Utterance::new("hello there", &LanguageProfile::english(), None);

        synthesizer.speak(utterance).await.unwrap();
        assert!(matches!(rx.recv().await, Some(Event::SynthesisStarted)));
        assert!(matches!(rx.recv().await, Some(Event::SynthesisEnded)));
    }
}
