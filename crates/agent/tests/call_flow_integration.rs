//! Call flow integration tests
//!
//! Drive the orchestrator end to end, with the rule-based collaborators for
//! realistic conversations and scripted collaborators for precise control.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use cold_call_agent::{
    CallError, CallOrchestrator, CallOutcome, CallPolicy, RuleBasedClassifier, SessionStore,
    TemplateGenerator,
};
use cold_call_core::{
    CallContext, CallState, CollaboratorError, Trigger, TriggerClassifier, Utterance,
    UtteranceGenerator,
};

/// Classifier replaying a fixed sequence of triggers, then `None`
#[derive(Default)]
struct ScriptedClassifier {
    script: Mutex<VecDeque<Option<Trigger>>>,
    calls: AtomicU32,
}

impl ScriptedClassifier {
    fn new(script: impl IntoIterator<Item = Option<Trigger>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: AtomicU32::new(0),
        })
    }

    fn silent() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, trigger: Option<Trigger>) {
        self.script.lock().push_back(trigger);
    }
}

#[async_trait]
impl TriggerClassifier for ScriptedClassifier {
    async fn classify(
        &self,
        _state: CallState,
        _history: &[Utterance],
        _latest_message: &str,
    ) -> Result<Option<Trigger>, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.script.lock().pop_front().flatten())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Generator recording the states it was asked about
#[derive(Default)]
struct RecordingGenerator {
    states: Mutex<Vec<CallState>>,
    /// Fail this many upcoming calls
    failures: AtomicU32,
    delay: Option<Duration>,
    empty: bool,
}

impl RecordingGenerator {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    fn fail_next(&self, n: u32) {
        self.failures.store(n, Ordering::SeqCst);
    }

    fn states(&self) -> Vec<CallState> {
        self.states.lock().clone()
    }
}

#[async_trait]
impl UtteranceGenerator for RecordingGenerator {
    async fn generate(
        &self,
        state: CallState,
        context: &CallContext,
        _history: &[Utterance],
    ) -> Result<String, CollaboratorError> {
        self.states.lock().push(state);
        if let Some(delay) = self.delay {
            if state != CallState::Greeting {
                tokio::time::sleep(delay).await;
            }
        }
        let pending = self.failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.failures.store(pending - 1, Ordering::SeqCst);
            return Err(CollaboratorError::Unavailable("model overloaded".to_string()));
        }
        if self.empty {
            return Ok("   ".to_string());
        }
        Ok(format!("[{}] line for {}", state, context.first_name()))
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Classifier that never answers in time
struct HangingClassifier {
    calls: AtomicU32,
}

#[async_trait]
impl TriggerClassifier for HangingClassifier {
    async fn classify(
        &self,
        _state: CallState,
        _history: &[Utterance],
        _latest_message: &str,
    ) -> Result<Option<Trigger>, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(None)
    }

    fn name(&self) -> &str {
        "hanging"
    }
}

fn policy(max_agent_turns: u32) -> CallPolicy {
    CallPolicy {
        max_agent_turns,
        collaborator_timeout: Duration::from_millis(200),
        max_retries: 1,
        retry_backoff: Duration::from_millis(5),
    }
}

fn rule_based() -> CallOrchestrator {
    CallOrchestrator::new(
        Arc::new(SessionStore::new(100)),
        Arc::new(RuleBasedClassifier::new()),
        Arc::new(TemplateGenerator::default()),
        policy(12),
    )
}

fn scripted(
    classifier: Arc<ScriptedClassifier>,
    generator: Arc<RecordingGenerator>,
    max_agent_turns: u32,
) -> CallOrchestrator {
    CallOrchestrator::new(
        Arc::new(SessionStore::new(100)),
        classifier,
        generator,
        policy(max_agent_turns),
    )
}

fn james() -> CallContext {
    CallContext::new("James Carter")
        .with_company("TechCorp")
        .with_title("VP of Sales")
        .with_industry("B2B SaaS")
        .with_company_size("200")
        .with_hook("growing the outbound team fast this year")
        .with_pain_hypothesis("reps lose hours to manual call logging")
}

async fn assert_history_consistent(calls: &CallOrchestrator, id: &str) {
    let summary = calls.summary(id).await.unwrap();
    assert_eq!(
        summary.conversation.len(),
        2 * summary.total_turns as usize + 1,
        "history out of step with turn count"
    );
}

#[tokio::test]
async fn test_happy_path_books_meeting() {
    let calls = rule_based();
    let opening = calls.start("call-1", james()).await.unwrap();
    assert_eq!(opening.state, CallState::Greeting);
    assert!(!opening.is_call_over);

    let script = [
        ("Yeah, this is James. Doing pretty well, thanks.", CallState::Greeting),
        ("Pretty busy week, but can't complain.", CallState::Rapport),
        ("Yeah, we've been growing outbound fast this year.", CallState::Rapport),
        ("Sure, what's up?", CallState::Discovery),
        (
            "Right now our reps log every call manually in spreadsheets and it's a mess.",
            CallState::Discovery,
        ),
        ("Honestly it eats about 10 hours a week per rep.", CallState::Pitch),
        ("How does that work?", CallState::Close),
        ("Thursday at 2pm works for me.", CallState::WrapUp),
        ("Sure, it's james@techcorp.com.", CallState::End),
    ];

    for (i, (message, expected)) in script.iter().enumerate() {
        let result = calls.turn("call-1", message).await.unwrap();
        assert_eq!(result.state, *expected, "step {} ({message})", i + 1);
        assert_eq!(result.is_call_over, *expected == CallState::End);
        assert!(!result.agent_message.is_empty());
        assert_history_consistent(&calls, "call-1").await;
    }

    let summary = calls.summary("call-1").await.unwrap();
    assert_eq!(summary.outcome, CallOutcome::MeetingBooked);
    assert_eq!(summary.total_turns, 9);
    assert_eq!(
        summary.states_visited,
        vec![
            CallState::Greeting,
            CallState::Rapport,
            CallState::Discovery,
            CallState::Pitch,
            CallState::Close,
            CallState::WrapUp,
            CallState::End,
        ]
    );

    assert!(matches!(
        calls.turn("call-1", "Anything else?").await,
        Err(CallError::CallAlreadyOver(_))
    ));
}

#[tokio::test]
async fn test_not_interested_on_first_turn() {
    let calls = rule_based();
    calls.start("call-2", james()).await.unwrap();

    let result = calls
        .turn("call-2", "Not interested. Take me off your list.")
        .await
        .unwrap();
    assert_eq!(result.state, CallState::WrapUp);
    assert!(!result.is_call_over);

    let result = calls.turn("call-2", "Bye.").await.unwrap();
    assert_eq!(result.state, CallState::End);
    assert!(result.is_call_over);

    let summary = calls.summary("call-2").await.unwrap();
    assert_eq!(summary.outcome, CallOutcome::NotInterested);
}

#[tokio::test]
async fn test_rapport_needs_small_talk_first() {
    let classifier = ScriptedClassifier::new([
        Some(Trigger::RapportReady),
        Some(Trigger::RapportReady),
    ]);
    let calls = scripted(classifier, RecordingGenerator::new(), 12);
    calls.start("call-3", james()).await.unwrap();

    let first = calls.turn("call-3", "Hi.").await.unwrap();
    assert_eq!(first.state, CallState::Greeting);

    let second = calls.turn("call-3", "Good, you?").await.unwrap();
    assert_eq!(second.state, CallState::Rapport);
}

#[tokio::test]
async fn test_callback_exits_every_live_state() {
    use Trigger::*;

    let paths: Vec<(CallState, Vec<Trigger>)> = vec![
        (CallState::Greeting, vec![]),
        (CallState::Rapport, vec![SmallTalk, RapportReady]),
        (
            CallState::Discovery,
            vec![SmallTalk, RapportReady, TransitionReady],
        ),
        (
            CallState::Pitch,
            vec![SmallTalk, RapportReady, TransitionReady, PainQuantified],
        ),
        (
            CallState::Objection,
            vec![
                SmallTalk,
                RapportReady,
                TransitionReady,
                PainQuantified,
                ObjectionRaised,
            ],
        ),
        (
            CallState::Close,
            vec![
                SmallTalk,
                RapportReady,
                TransitionReady,
                PainQuantified,
                BuyingSignal,
            ],
        ),
    ];

    for (target, path) in paths {
        let classifier = ScriptedClassifier::new(path.iter().copied().map(Some));
        let generator = RecordingGenerator::new();
        let calls = scripted(classifier.clone(), generator.clone(), 12);
        calls.start("call", james()).await.unwrap();

        let mut state = CallState::Greeting;
        for _ in &path {
            state = calls.turn("call", "...").await.unwrap().state;
        }
        assert_eq!(state, target);

        let before = generator.states().len();
        classifier.push(Some(CallbackRequested));
        let result = calls.turn("call", "Can you call me back?").await.unwrap();
        assert_eq!(result.state, CallState::WrapUp, "callback from {target}");

        let generated = generator.states();
        assert_eq!(&generated[before..], &[CallState::WrapUp]);

        let summary = calls.summary("call").await.unwrap();
        assert_eq!(summary.outcome, CallOutcome::CallbackRequested);
    }
}

#[tokio::test]
async fn test_turn_budget_forces_timeout() {
    let classifier = ScriptedClassifier::silent();
    let generator = RecordingGenerator::new();
    let calls = scripted(classifier, generator, 3);
    calls.start("call-4", james()).await.unwrap();

    for _ in 0..3 {
        let result = calls.turn("call-4", "Mm-hmm.").await.unwrap();
        assert_eq!(result.state, CallState::Greeting);
    }

    let result = calls.turn("call-4", "Mm-hmm.").await.unwrap();
    assert_eq!(result.state, CallState::WrapUp);

    let result = calls.turn("call-4", "Okay.").await.unwrap();
    assert_eq!(result.state, CallState::End);
    assert!(result.is_call_over);

    let summary = calls.summary("call-4").await.unwrap();
    assert_eq!(summary.outcome, CallOutcome::TimedOut);
}

#[tokio::test]
async fn test_advancing_trigger_beats_turn_budget() {
    let classifier = ScriptedClassifier::new([
        Some(Trigger::SmallTalk),
        Some(Trigger::RapportReady),
    ]);
    let calls = scripted(classifier, RecordingGenerator::new(), 1);
    calls.start("call-5", james()).await.unwrap();

    calls.turn("call-5", "Fine.").await.unwrap();
    // Over budget, but RAPPORT_READY moves the call so it is honored
    let result = calls.turn("call-5", "Sure.").await.unwrap();
    assert_eq!(result.state, CallState::Rapport);
}

#[tokio::test]
async fn test_classifier_timeout_is_ignored() {
    let classifier = ScriptedClassifier::new([Some(Trigger::Timeout)]);
    let calls = scripted(classifier, RecordingGenerator::new(), 12);
    calls.start("call-6", james()).await.unwrap();

    let result = calls.turn("call-6", "Hello?").await.unwrap();
    assert_eq!(result.state, CallState::Greeting);
}

#[tokio::test]
async fn test_generator_failure_leaves_session_untouched() {
    let classifier = ScriptedClassifier::new([Some(Trigger::SmallTalk), Some(Trigger::SmallTalk)]);
    let generator = RecordingGenerator::new();
    let calls = scripted(classifier, generator.clone(), 12);
    calls.start("call-7", james()).await.unwrap();
    let before = calls.summary("call-7").await.unwrap();

    // First attempt and the single retry both fail
    generator.fail_next(2);
    let err = calls.turn("call-7", "Doing well.").await.unwrap_err();
    assert!(matches!(
        err,
        CallError::ServiceUnavailable {
            collaborator: "generator",
            ..
        }
    ));

    let after = calls.summary("call-7").await.unwrap();
    assert_eq!(after.total_turns, before.total_turns);
    assert_eq!(after.conversation, before.conversation);
    assert_eq!(after.state, before.state);

    // A single failure is absorbed by the retry
    generator.fail_next(1);
    let result = calls.turn("call-7", "Doing well.").await.unwrap();
    assert_eq!(result.state, CallState::Greeting);
    assert_eq!(calls.summary("call-7").await.unwrap().total_turns, 1);
    assert_history_consistent(&calls, "call-7").await;
}

#[tokio::test]
async fn test_classifier_timeout_retries_then_fails() {
    let classifier = Arc::new(HangingClassifier {
        calls: AtomicU32::new(0),
    });
    let calls = CallOrchestrator::new(
        Arc::new(SessionStore::new(10)),
        classifier.clone(),
        RecordingGenerator::new(),
        CallPolicy {
            collaborator_timeout: Duration::from_millis(20),
            ..policy(12)
        },
    );
    calls.start("call-8", james()).await.unwrap();

    let err = calls.turn("call-8", "Hello?").await.unwrap_err();
    match err {
        CallError::ServiceUnavailable { collaborator, source } => {
            assert_eq!(collaborator, "classifier");
            assert_eq!(source, CollaboratorError::Timeout { after_ms: 20 });
        }
        other => panic!("expected ServiceUnavailable, got {other:?}"),
    }
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 2);
    assert_eq!(calls.summary("call-8").await.unwrap().total_turns, 0);
}

#[tokio::test]
async fn test_empty_opening_leaves_no_session() {
    let generator = Arc::new(RecordingGenerator {
        empty: true,
        ..RecordingGenerator::default()
    });
    let calls = scripted(ScriptedClassifier::silent(), generator, 12);

    let err = calls.start("call-9", james()).await.unwrap_err();
    assert!(matches!(
        err,
        CallError::ServiceUnavailable {
            source: CollaboratorError::EmptyOutput,
            ..
        }
    ));
    assert_eq!(calls.active_sessions(), 0);
}

#[tokio::test]
async fn test_same_session_is_busy_other_sessions_proceed() {
    let generator = RecordingGenerator::slow(Duration::from_millis(100));
    let calls = Arc::new(CallOrchestrator::new(
        Arc::new(SessionStore::new(10)),
        ScriptedClassifier::silent(),
        generator,
        CallPolicy {
            collaborator_timeout: Duration::from_secs(2),
            ..policy(12)
        },
    ));
    calls.start("a", james()).await.unwrap();
    calls.start("b", james()).await.unwrap();

    let in_flight = {
        let calls = Arc::clone(&calls);
        tokio::spawn(async move { calls.turn("a", "first").await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(matches!(
        calls.turn("a", "second").await,
        Err(CallError::Busy(_))
    ));
    calls.turn("b", "independent").await.unwrap();

    in_flight.await.unwrap().unwrap();
    assert_eq!(calls.summary("a").await.unwrap().total_turns, 1);
    assert_history_consistent(&calls, "a").await;
}

#[tokio::test(start_paused = true)]
async fn test_idle_session_expires() {
    let store = SessionStore::new(10).with_expiry(Duration::from_secs(30), Duration::from_secs(5));
    let calls = CallOrchestrator::new(
        Arc::new(store),
        Arc::new(RuleBasedClassifier::new()),
        Arc::new(TemplateGenerator::default()),
        policy(12),
    );
    calls.start("call-10", james()).await.unwrap();

    tokio::time::advance(Duration::from_secs(31)).await;
    assert!(matches!(
        calls.turn("call-10", "Hello?").await,
        Err(CallError::UnknownSession(_))
    ));

    // The id is free again
    calls.start("call-10", james()).await.unwrap();
}
