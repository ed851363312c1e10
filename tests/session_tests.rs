use babelcast::{
    LocalRoomBus, OutboundUpdate, OutgoingMessage, RoomBus, Session, SessionContext, SessionError,
    SessionHandle, SessionParams, SttEngine, SttError, SttEvent, SttEventSender, SttStream,
    SttStreamConfig, TranscriptUpdate, Translator, Synthesizer,
};
use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

const RECV_DEADLINE: Duration = Duration::from_secs(2);
const SILENCE: Duration = Duration::from_millis(100);

// ============================================================================
// Mock collaborators
// ============================================================================

/// Transcription engine driven by hand: tests grab the event sender a session
/// registered and inject transcript updates through it, the same path the
/// real engine's callback context uses.
#[derive(Default)]
struct MockSttEngine {
    fail_start: bool,
    sender: Mutex<Option<SttEventSender>>,
    finishes: Arc<AtomicUsize>,
    frames: Arc<Mutex<Vec<Bytes>>>,
}

impl MockSttEngine {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail_start: true,
            ..Self::default()
        })
    }

    fn emit(&self, text: &str, is_final: bool) {
        self.sender
            .lock()
            .unwrap()
            .as_ref()
            .expect("engine was never started")
            .send(SttEvent::Transcript(TranscriptUpdate {
                text: text.to_string(),
                is_final,
            }))
            .unwrap();
    }

    fn finishes(&self) -> usize {
        self.finishes.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SttEngine for MockSttEngine {
    async fn start(
        &self,
        _config: SttStreamConfig,
        events: SttEventSender,
    ) -> Result<Box<dyn SttStream>, SttError> {
        if self.fail_start {
            return Err(SttError::ConnectionFailed("connection refused".to_string()));
        }

        *self.sender.lock().unwrap() = Some(events);

        Ok(Box::new(MockSttStream {
            finishes: Arc::clone(&self.finishes),
            frames: Arc::clone(&self.frames),
        }))
    }
}

struct MockSttStream {
    finishes: Arc<AtomicUsize>,
    frames: Arc<Mutex<Vec<Bytes>>>,
}

#[async_trait::async_trait]
impl SttStream for MockSttStream {
    async fn send_audio(&mut self, frame: Bytes) -> Result<(), SttError> {
        self.frames.lock().unwrap().push(frame);
        Ok(())
    }

    async fn finish(&mut self) {
        self.finishes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Marks translations with the target language so tests can tell what was
/// requested.
#[derive(Default)]
struct PrefixTranslator {
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl Translator for PrefixTranslator {
    async fn translate(&self, text: &str, _source_lang: &str, target_lang: &str) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        format!("[{target_lang}] {text}")
    }
}

/// Models a translation engine that is down: the client contract degrades to
/// the original text.
#[derive(Default)]
struct DegradedTranslator {
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl Translator for DegradedTranslator {
    async fn translate(&self, text: &str, _source_lang: &str, _target_lang: &str) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        text.to_string()
    }
}

struct SlowTranslator {
    delay: Duration,
}

#[async_trait::async_trait]
impl Translator for SlowTranslator {
    async fn translate(&self, text: &str, _source_lang: &str, _target_lang: &str) -> String {
        tokio::time::sleep(self.delay).await;
        text.to_string()
    }
}

#[derive(Default)]
struct FixedSynthesizer {
    calls: AtomicUsize,
    last_input: Mutex<Option<(String, String)>>,
}

#[async_trait::async_trait]
impl Synthesizer for FixedSynthesizer {
    async fn synthesize(&self, text: &str, target_lang: &str) -> Option<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_input.lock().unwrap() = Some((text.to_string(), target_lang.to_string()));
        Some(Bytes::from_static(b"fake-mp3"))
    }
}

#[derive(Default)]
struct FailingSynthesizer {
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl Synthesizer for FailingSynthesizer {
    async fn synthesize(&self, _text: &str, _target_lang: &str) -> Option<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        None
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn context(
    bus: Arc<dyn RoomBus>,
    stt: Arc<MockSttEngine>,
    translator: Arc<dyn Translator>,
    synthesizer: Arc<dyn Synthesizer>,
) -> SessionContext {
    SessionContext {
        bus,
        stt,
        translator,
        synthesizer,
    }
}

async fn connect(
    ctx: &SessionContext,
    room: &str,
    source: &str,
    target: &str,
) -> (SessionHandle, mpsc::Receiver<OutboundUpdate>) {
    let (tx, rx) = mpsc::channel(16);
    let params = SessionParams {
        room: room.to_string(),
        source_lang: source.to_string(),
        target_lang: target.to_string(),
    };

    let handle = Session::connect(ctx.clone(), params, tx)
        .await
        .expect("session should connect");

    (handle, rx)
}

async fn expect_update(rx: &mut mpsc::Receiver<OutboundUpdate>) -> OutboundUpdate {
    timeout(RECV_DEADLINE, rx.recv())
        .await
        .expect("timed out waiting for update")
        .expect("update channel closed")
}

fn transcription(update: &OutboundUpdate) -> (&str, &str, &str) {
    let OutgoingMessage::Transcription {
        text,
        translation,
        lang,
    } = &update.message;
    (text, translation, lang)
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn final_transcripts_publish_exactly_once() {
    let bus: Arc<dyn RoomBus> = Arc::new(LocalRoomBus::new());
    let engine = MockSttEngine::new();
    let ctx = context(
        Arc::clone(&bus),
        Arc::clone(&engine),
        Arc::new(PrefixTranslator::default()),
        Arc::new(FixedSynthesizer::default()),
    );

    // Plain membership observing what actually gets published to the room.
    let mut observer = bus.join("sala").await.unwrap();

    let (speaker, mut speaker_rx) = connect(&ctx, "sala", "es", "en").await;

    // Partial results never broadcast.
    engine.emit("Hol", false);
    assert!(timeout(SILENCE, observer.recv()).await.is_err());

    // Finalized text is trimmed and published once.
    engine.emit("  Hola  ", true);
    let event = timeout(RECV_DEADLINE, observer.recv()).await.unwrap().unwrap();
    assert_eq!(event.text, "Hola");
    assert_eq!(event.source_lang, "es");
    assert_eq!(event.origin_session, speaker.id());

    // Whitespace-only finals never broadcast.
    engine.emit("   ", true);
    assert!(timeout(SILENCE, observer.recv()).await.is_err());

    // And no duplicate of the first utterance arrived either.
    let _ = expect_update(&mut speaker_rx).await; // self-echo
    assert!(timeout(SILENCE, observer.recv()).await.is_err());
}

#[tokio::test]
async fn self_echo_skips_translation_and_synthesis() {
    let translator = Arc::new(PrefixTranslator::default());
    let synthesizer = Arc::new(FixedSynthesizer::default());

    let engine = MockSttEngine::new();
    let ctx = context(
        Arc::new(LocalRoomBus::new()),
        Arc::clone(&engine),
        Arc::clone(&translator) as Arc<dyn Translator>,
        Arc::clone(&synthesizer) as Arc<dyn Synthesizer>,
    );

    let (_speaker, mut rx) = connect(&ctx, "sala", "es", "en").await;

    engine.emit("Hola", true);

    let update = expect_update(&mut rx).await;
    assert_eq!(transcription(&update), ("Hola", "", "es"));
    assert!(update.audio.is_none());

    assert_eq!(translator.calls.load(Ordering::SeqCst), 0);
    assert_eq!(synthesizer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn listener_gets_translation_with_audio() {
    let bus: Arc<dyn RoomBus> = Arc::new(LocalRoomBus::new());
    let translator: Arc<dyn Translator> = Arc::new(PrefixTranslator::default());
    let synthesizer = Arc::new(FixedSynthesizer::default());

    let alice_engine = MockSttEngine::new();
    let alice_ctx = context(
        Arc::clone(&bus),
        Arc::clone(&alice_engine),
        Arc::clone(&translator),
        Arc::clone(&synthesizer) as Arc<dyn Synthesizer>,
    );
    let bob_ctx = context(
        Arc::clone(&bus),
        MockSttEngine::new(),
        Arc::clone(&translator),
        Arc::clone(&synthesizer) as Arc<dyn Synthesizer>,
    );

    // Alice speaks Spanish and listens in English; Bob speaks English and
    // listens in French.
    let (_alice, mut alice_rx) = connect(&alice_ctx, "sala", "es", "en").await;
    let (_bob, mut bob_rx) = connect(&bob_ctx, "sala", "en", "fr").await;

    alice_engine.emit("Hola", true);

    let alice_update = expect_update(&mut alice_rx).await;
    assert_eq!(transcription(&alice_update), ("Hola", "", "es"));
    assert!(alice_update.audio.is_none());

    let bob_update = expect_update(&mut bob_rx).await;
    assert_eq!(transcription(&bob_update), ("Hola", "[fr] Hola", "es"));
    assert_eq!(bob_update.audio.as_deref(), Some(b"fake-mp3".as_slice()));

    let last = synthesizer.last_input.lock().unwrap().clone();
    assert_eq!(last, Some(("[fr] Hola".to_string(), "fr".to_string())));
}

#[tokio::test]
async fn synthesis_failure_still_delivers_text() {
    let bus: Arc<dyn RoomBus> = Arc::new(LocalRoomBus::new());
    let translator: Arc<dyn Translator> = Arc::new(PrefixTranslator::default());
    let synthesizer = Arc::new(FailingSynthesizer::default());

    let alice_engine = MockSttEngine::new();
    let alice_ctx = context(
        Arc::clone(&bus),
        Arc::clone(&alice_engine),
        Arc::clone(&translator),
        Arc::clone(&synthesizer) as Arc<dyn Synthesizer>,
    );
    let bob_ctx = context(
        Arc::clone(&bus),
        MockSttEngine::new(),
        Arc::clone(&translator),
        Arc::clone(&synthesizer) as Arc<dyn Synthesizer>,
    );

    let (_alice, _alice_rx) = connect(&alice_ctx, "sala", "es", "en").await;
    let (_bob, mut bob_rx) = connect(&bob_ctx, "sala", "en", "fr").await;

    alice_engine.emit("Hola", true);

    let bob_update = expect_update(&mut bob_rx).await;
    assert_eq!(transcription(&bob_update), ("Hola", "[fr] Hola", "es"));
    assert!(bob_update.audio.is_none());
    assert_eq!(synthesizer.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn degraded_translation_synthesizes_original_text() {
    let bus: Arc<dyn RoomBus> = Arc::new(LocalRoomBus::new());
    let translator: Arc<dyn Translator> = Arc::new(DegradedTranslator::default());
    let synthesizer = Arc::new(FixedSynthesizer::default());

    let alice_engine = MockSttEngine::new();
    let alice_ctx = context(
        Arc::clone(&bus),
        Arc::clone(&alice_engine),
        Arc::clone(&translator),
        Arc::clone(&synthesizer) as Arc<dyn Synthesizer>,
    );
    let bob_ctx = context(
        Arc::clone(&bus),
        MockSttEngine::new(),
        Arc::clone(&translator),
        Arc::clone(&synthesizer) as Arc<dyn Synthesizer>,
    );

    let (_alice, _alice_rx) = connect(&alice_ctx, "sala", "es", "en").await;
    let (_bob, mut bob_rx) = connect(&bob_ctx, "sala", "en", "fr").await;

    alice_engine.emit("Hola", true);

    // The fallback text still flows through synthesis in the French voice.
    let bob_update = expect_update(&mut bob_rx).await;
    assert_eq!(transcription(&bob_update), ("Hola", "Hola", "es"));
    assert!(bob_update.audio.is_some());

    let last = synthesizer.last_input.lock().unwrap().clone();
    assert_eq!(last, Some(("Hola".to_string(), "fr".to_string())));
}

#[tokio::test]
async fn audio_frames_are_forwarded_verbatim() {
    let engine = MockSttEngine::new();
    let ctx = context(
        Arc::new(LocalRoomBus::new()),
        Arc::clone(&engine),
        Arc::new(PrefixTranslator::default()),
        Arc::new(FixedSynthesizer::default()),
    );

    let (session, _rx) = connect(&ctx, "sala", "es", "en").await;

    session.send_audio(Bytes::from_static(b"\x01\x02\x03"));
    session.send_audio(Bytes::from_static(b"\x04\x05"));

    tokio::time::sleep(SILENCE).await;

    let frames = engine.frames.lock().unwrap().clone();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].as_ref(), b"\x01\x02\x03");
    assert_eq!(frames[1].as_ref(), b"\x04\x05");
}

#[tokio::test]
async fn disconnect_mid_pipeline_is_contained() {
    let bus: Arc<dyn RoomBus> = Arc::new(LocalRoomBus::new());
    let translator: Arc<dyn Translator> = Arc::new(SlowTranslator {
        delay: Duration::from_millis(300),
    });
    let synthesizer: Arc<dyn Synthesizer> = Arc::new(FixedSynthesizer::default());

    let alice_engine = MockSttEngine::new();
    let bob_engine = MockSttEngine::new();

    let alice_ctx = context(
        Arc::clone(&bus),
        Arc::clone(&alice_engine),
        Arc::clone(&translator),
        Arc::clone(&synthesizer),
    );
    let bob_ctx = context(
        Arc::clone(&bus),
        Arc::clone(&bob_engine),
        Arc::clone(&translator),
        Arc::clone(&synthesizer),
    );

    let (_alice, mut alice_rx) = connect(&alice_ctx, "sala", "es", "en").await;
    let (bob, _bob_rx) = connect(&bob_ctx, "sala", "en", "fr").await;

    // Bob disconnects while his translate+synthesize pipeline for Alice's
    // utterance is still in flight.
    alice_engine.emit("Hola", true);
    bob.shutdown();
    bob.closed().await;

    // Bob's transcription stream was closed exactly once.
    assert_eq!(bob_engine.finishes(), 1);

    // Alice is unaffected and still receives her self-echo.
    let alice_update = expect_update(&mut alice_rx).await;
    assert_eq!(transcription(&alice_update), ("Hola", "", "es"));

    // Let the orphaned pipeline run out; nothing may panic.
    tokio::time::sleep(Duration::from_millis(400)).await;
}

#[tokio::test]
async fn stt_start_failure_aborts_connect() {
    let ctx = context(
        Arc::new(LocalRoomBus::new()),
        MockSttEngine::failing(),
        Arc::new(PrefixTranslator::default()),
        Arc::new(FixedSynthesizer::default()),
    );

    let (tx, _rx) = mpsc::channel(16);
    let params = SessionParams {
        room: "sala".to_string(),
        source_lang: "es".to_string(),
        target_lang: "en".to_string(),
    };

    let result = Session::connect(ctx, params, tx).await;
    assert!(matches!(result, Err(SessionError::UpstreamUnavailable(_))));
}

#[tokio::test]
async fn transport_closure_tears_down_once() {
    let engine = MockSttEngine::new();
    let ctx = context(
        Arc::new(LocalRoomBus::new()),
        Arc::clone(&engine),
        Arc::new(PrefixTranslator::default()),
        Arc::new(FixedSynthesizer::default()),
    );

    let (session, rx) = connect(&ctx, "sala", "es", "en").await;

    // Dropping the input side models the transport going away; shutdown on
    // top of it must stay idempotent.
    session.shutdown();
    session.shutdown();
    session.closed().await;

    assert_eq!(engine.finishes(), 1);
    drop(rx);
}
