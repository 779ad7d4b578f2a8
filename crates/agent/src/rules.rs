//! Rule-based trigger classifier
//!
//! Phrase rules compiled once per process. A reply can match several rules;
//! only triggers the current state accepts are kept and the highest-priority
//! one wins, so exit requests always beat everything else.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use cold_call_core::{
    CallState, CollaboratorError, Speaker, Trigger, TriggerClassifier, Utterance,
};

const TRIGGER_PATTERNS: &[(Trigger, &str)] = &[
    (
        Trigger::NotInterested,
        r"(?i)\b(not interested|no thanks|no thank you|take me off|remove me|stop calling|do not call|don'?t call)\b",
    ),
    (
        Trigger::CallbackRequested,
        r"(?i)\b(call (me )?back|bad time|not a good time|in a meeting|call (me )?later|try me (later|next week|tomorrow))\b",
    ),
    (
        Trigger::TransitionReady,
        r"(?i)\b(sure|go ahead|what'?s (up|this about)|what is this about|i'?ve got a (minute|few minutes)|shoot|i'?m listening)\b",
    ),
    (
        Trigger::DiscoverySignal,
        r"(?i)\b(right now|currently|our (team|reps|process|sales|crm)|we (use|log|track|do it)|manual(ly)?|spreadsheets?|struggl\w*|a mess|takes forever)\b",
    ),
    (
        Trigger::PainQuantified,
        r"(?i)(\d+(\.\d+)?\s*(%|percent\b|hours?\b|hrs?\b|days?\b|weeks?\b|reps?\b|deals?\b|dollars?\b|k\b)|\$\s*\d+)",
    ),
    (
        Trigger::BuyingSignal,
        r"(?i)\b(how does (that|it|this) work|tell me more|pricing|how much|what does it cost|sounds interesting|walk me through)\b",
    ),
    (
        Trigger::ObjectionRaised,
        r"(?i)\b(too expensive|expensive|budget|already (have|use)|concern(ed|s)?|not sure|worried|we tried|won'?t work for us)\b",
    ),
    (
        Trigger::ObjectionOvercome,
        r"(?i)\b(makes sense|fair enough|that helps|good point|that'?s fair|i see what you mean)\b",
    ),
    (
        Trigger::MeetingTimeAccepted,
        r"(?i)\b(works for me|that works|sounds good|let'?s do (it|that)|book it|(monday|tuesday|wednesday|thursday|friday)\b.*\b(works|is fine|is good))\b",
    ),
    (
        Trigger::EmailProvided,
        r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}",
    ),
    (
        Trigger::MoreInfoRequested,
        r"(?i)\b(send (me )?(some )?(info|information|details|something|materials|an email)|email me|shoot me an email)\b",
    ),
    (
        Trigger::Disqualified,
        r"(?i)\b(no budget|not the right person|not the decision maker|we'?re too small|it'?s just me|don'?t (have|do) (any )?(sales|outbound))\b",
    ),
];

static COMPILED_PATTERNS: Lazy<Vec<(Trigger, Regex)>> = Lazy::new(|| {
    TRIGGER_PATTERNS
        .iter()
        .filter_map(|(trigger, pattern)| match Regex::new(pattern) {
            Ok(regex) => Some((*trigger, regex)),
            Err(e) => {
                tracing::error!(trigger = %trigger, error = %e, "Invalid trigger pattern");
                None
            }
        })
        .collect()
});

/// Deterministic classifier over phrase rules
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleBasedClassifier;

impl RuleBasedClassifier {
    pub fn new() -> Self {
        Self
    }

    /// All accepted triggers whose rules match, in rule order
    fn candidates(state: CallState, message: &str) -> Vec<Trigger> {
        COMPILED_PATTERNS
            .iter()
            .filter(|(trigger, _)| state.accepts(*trigger))
            .filter(|(_, regex)| regex.is_match(message))
            .map(|(trigger, _)| *trigger)
            .collect()
    }

    /// Classify a reply without going through the async trait
    pub fn detect(state: CallState, history: &[Utterance], message: &str) -> Option<Trigger> {
        if state.is_terminal() || message.trim().is_empty() {
            return None;
        }

        let detected = Trigger::prioritized(Self::candidates(state, message));
        if detected.is_some() || state != CallState::Greeting {
            return detected;
        }

        // In GREETING every plain reply is social: the first one is small talk,
        // later ones mean the prospect is ready to hear the hook
        let replied_before = history.iter().any(|u| u.speaker == Speaker::Prospect);
        Some(if replied_before {
            Trigger::RapportReady
        } else {
            Trigger::SmallTalk
        })
    }
}

#[async_trait]
impl TriggerClassifier for RuleBasedClassifier {
    async fn classify(
        &self,
        state: CallState,
        history: &[Utterance],
        latest_message: &str,
    ) -> Result<Option<Trigger>, CollaboratorError> {
        let trigger = Self::detect(state, history, latest_message);
        tracing::debug!(
            state = %state,
            trigger = trigger.map(|t| t.as_str()).unwrap_or("NONE"),
            "Rule-based classification"
        );
        Ok(trigger)
    }

    fn name(&self) -> &str {
        "rules"
    }
}
