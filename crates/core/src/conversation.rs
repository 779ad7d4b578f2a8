//! Conversation history entries and turn results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::CallState;
use crate::trigger::Trigger;

/// Who spoke
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Agent,
    Prospect,
}

impl Speaker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Speaker::Agent => "agent",
            Speaker::Prospect => "prospect",
        }
    }
}

/// One line of the call transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub speaker: Speaker,
    pub message: String,
    /// State the call was in when the line was spoken
    pub state: CallState,
    pub timestamp: DateTime<Utc>,
    /// Trigger the engine resolved from this line (prospect lines only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<Trigger>,
}

impl Utterance {
    pub fn agent(message: impl Into<String>, state: CallState) -> Self {
        Self {
            speaker: Speaker::Agent,
            message: message.into(),
            state,
            timestamp: Utc::now(),
            trigger: None,
        }
    }

    pub fn prospect(message: impl Into<String>, state: CallState) -> Self {
        Self {
            speaker: Speaker::Prospect,
            message: message.into(),
            state,
            timestamp: Utc::now(),
            trigger: None,
        }
    }

    pub fn with_trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub fn is_agent(&self) -> bool {
        self.speaker == Speaker::Agent
    }
}

/// What the caller gets back from `start` and `turn`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnResult {
    pub state: CallState,
    pub agent_message: String,
    pub is_call_over: bool,
}

impl TurnResult {
    pub fn new(state: CallState, agent_message: impl Into<String>) -> Self {
        Self {
            state,
            agent_message: agent_message.into(),
            is_call_over: state.is_terminal(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_over_follows_state() {
        for state in CallState::ALL {
            let result = TurnResult::new(state, "hi");
            assert_eq!(result.is_call_over, state == CallState::End);
        }
    }

    #[test]
    fn test_utterance_constructors() {
        let line = Utterance::agent("Hello!", CallState::Greeting);
        assert!(line.is_agent());
        assert_eq!(line.state, CallState::Greeting);

        let reply = Utterance::prospect("Hi", CallState::Greeting);
        assert_eq!(reply.speaker, Speaker::Prospect);
        assert_eq!(reply.speaker.as_str(), "prospect");
        assert!(reply.trigger.is_none());
    }

    #[test]
    fn test_trigger_serialized_only_when_set() {
        let plain = serde_json::to_value(Utterance::prospect("Hi", CallState::Greeting)).unwrap();
        assert!(plain.get("trigger").is_none());

        let tagged = Utterance::prospect("Sure, Tuesday works", CallState::Close)
            .with_trigger(Trigger::MeetingTimeAccepted);
        let json = serde_json::to_value(&tagged).unwrap();
        assert_eq!(json["trigger"], "MEETING_TIME_ACCEPTED");

        let back: Utterance = serde_json::from_value(json).unwrap();
        assert_eq!(back.trigger, Some(Trigger::MeetingTimeAccepted));
    }

    #[test]
    fn test_turn_result_wire_format() {
        let json = serde_json::to_value(TurnResult::new(CallState::WrapUp, "Thanks!")).unwrap();
        assert_eq!(json["state"], "WRAP_UP");
        assert_eq!(json["agent_message"], "Thanks!");
        assert_eq!(json["is_call_over"], false);
    }
}
