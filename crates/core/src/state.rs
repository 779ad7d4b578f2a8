//! Call states and their per-state profile

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::knowledge::KnowledgeCategory;
use crate::trigger::Trigger;

/// Stages of an outbound sales call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallState {
    /// Opening line, identity check and small talk
    #[default]
    Greeting,
    /// Reference the personalization hook and ask permission to continue
    Rapport,
    /// Uncover the prospect's current process and pain
    Discovery,
    /// Connect the discovered pain to the product
    Pitch,
    /// Handle pushback
    Objection,
    /// Ask for a specific next step
    Close,
    /// Confirm next steps and say goodbye
    WrapUp,
    /// Call is over
    End,
}

/// Edges of the call graph. A state listing itself may stay in place.
static STATE_SUCCESSORS: Lazy<HashMap<CallState, &'static [CallState]>> = Lazy::new(|| {
    use CallState::*;
    let mut map = HashMap::new();
    map.insert(Greeting, &[Greeting, Rapport, WrapUp] as &[_]);
    map.insert(Rapport, &[Rapport, Discovery, WrapUp] as &[_]);
    map.insert(Discovery, &[Discovery, Pitch, WrapUp] as &[_]);
    map.insert(Pitch, &[Pitch, Objection, Close, WrapUp] as &[_]);
    map.insert(Objection, &[Objection, Close, WrapUp] as &[_]);
    map.insert(Close, &[Close, WrapUp] as &[_]);
    map.insert(WrapUp, &[WrapUp, End] as &[_]);
    map.insert(End, &[] as &[_]);
    map
});

/// Static description of how the agent should behave in a state
#[derive(Debug, Clone, Copy)]
pub struct StateProfile {
    pub description: &'static str,
    pub objective: &'static str,
    pub guidelines: &'static [&'static str],
    /// Reference material worth retrieving while in this state
    pub knowledge_categories: &'static [KnowledgeCategory],
}

impl CallState {
    /// All states in typical progression order
    pub const ALL: [CallState; 8] = [
        CallState::Greeting,
        CallState::Rapport,
        CallState::Discovery,
        CallState::Pitch,
        CallState::Objection,
        CallState::Close,
        CallState::WrapUp,
        CallState::End,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CallState::Greeting => "GREETING",
            CallState::Rapport => "RAPPORT",
            CallState::Discovery => "DISCOVERY",
            CallState::Pitch => "PITCH",
            CallState::Objection => "OBJECTION",
            CallState::Close => "CLOSE",
            CallState::WrapUp => "WRAP_UP",
            CallState::End => "END",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CallState::End)
    }

    /// States reachable in a single turn, including staying in place
    pub fn successors(&self) -> &'static [CallState] {
        STATE_SUCCESSORS.get(self).copied().unwrap_or(&[])
    }

    pub fn can_transition_to(&self, target: CallState) -> bool {
        self.successors().contains(&target)
    }

    /// Triggers that carry meaning in this state.
    ///
    /// TIMEOUT is never listed: it is raised by the transition engine, not
    /// by a classifier.
    pub fn valid_triggers(&self) -> &'static [Trigger] {
        use Trigger::*;
        match self {
            CallState::Greeting => &[SmallTalk, RapportReady, CallbackRequested, NotInterested],
            CallState::Rapport => &[TransitionReady, CallbackRequested, NotInterested],
            CallState::Discovery => &[
                DiscoverySignal,
                PainQuantified,
                Disqualified,
                CallbackRequested,
                NotInterested,
            ],
            CallState::Pitch => &[
                BuyingSignal,
                ObjectionRaised,
                MoreInfoRequested,
                CallbackRequested,
                NotInterested,
            ],
            CallState::Objection => &[
                ObjectionOvercome,
                ObjectionRaised,
                CallbackRequested,
                NotInterested,
            ],
            CallState::Close => &[
                MeetingTimeAccepted,
                MoreInfoRequested,
                CallbackRequested,
                NotInterested,
            ],
            CallState::WrapUp => &[EmailProvided, CallbackRequested, NotInterested],
            CallState::End => &[],
        }
    }

    pub fn accepts(&self, trigger: Trigger) -> bool {
        self.valid_triggers().contains(&trigger)
    }

    pub fn profile(&self) -> StateProfile {
        use KnowledgeCategory::*;
        match self {
            CallState::Greeting => StateProfile {
                description: "Initial contact with the prospect",
                objective: "Introduce yourself and the company, confirm you are speaking with \
                            the right person and share one brief moment of small talk.",
                guidelines: &[
                    "Keep it under 15 seconds",
                    "Use the prospect's first name",
                    "Do not pitch yet",
                    "Move on only after at least one small-talk exchange",
                ],
                knowledge_categories: &[CompanySpecific],
            },
            CallState::Rapport => StateProfile {
                description: "Build a brief connection before business talk",
                objective: "Reference the personalization hook to show you did your homework, \
                            then ask for permission to share why you are calling.",
                guidelines: &[
                    "Keep it to one or two exchanges",
                    "Use the pre-call research hook",
                    "Bridge with the reason for the call and wait for a go-ahead",
                ],
                knowledge_categories: &[CompanySpecific],
            },
            CallState::Discovery => StateProfile {
                description: "Understand the prospect's current situation",
                objective: "Ask open-ended questions to uncover pain and its measurable impact.",
                guidelines: &[
                    "Ask one question at a time",
                    "Let the prospect talk",
                    "Dig deeper once when they describe their process",
                    "Do not pitch prematurely",
                ],
                knowledge_categories: &[QualifyingCriteria],
            },
            CallState::Pitch => StateProfile {
                description: "Present value tailored to the discovered pain",
                objective: "Connect their specific pain to the product in two or three sentences.",
                guidelines: &[
                    "Lead with their pain, not features",
                    "Keep it concise, no monologues",
                    "Ask a check-in question after the key claim",
                ],
                knowledge_categories: &[ProductKnowledge, CaseStudies, CompetitorIntelligence],
            },
            CallState::Objection => StateProfile {
                description: "Handle pushback or concerns",
                objective: "Acknowledge the concern, address it and guide back to value.",
                guidelines: &[
                    "Never argue, acknowledge first",
                    "Address one concern at a time",
                    "If the objection persists, offer to follow up instead",
                ],
                knowledge_categories: &[ObjectionHandling, CaseStudies, CompetitorIntelligence],
            },
            CallState::Close => StateProfile {
                description: "Ask for a commitment",
                objective: "Propose a specific short meeting at a specific time.",
                guidelines: &[
                    "Offer a concrete slot",
                    "Keep the ask small: a 15-minute demo",
                    "If they hesitate, offer to send information first",
                ],
                knowledge_categories: &[ProductKnowledge],
            },
            CallState::WrapUp => StateProfile {
                description: "End the call gracefully",
                objective: "Confirm agreed next steps, collect an email when one is needed \
                            and thank the prospect.",
                guidelines: &[
                    "Summarize what was agreed",
                    "Confirm the email for follow-up when needed",
                    "Always end positively, even on a rejection",
                ],
                knowledge_categories: &[ComplianceRules],
            },
            CallState::End => StateProfile {
                description: "Call is complete",
                objective: "Say goodbye.",
                guidelines: &[],
                knowledge_categories: &[],
            },
        }
    }
}

impl std::fmt::Display for CallState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state() {
        assert_eq!(CallState::default(), CallState::Greeting);
    }

    #[test]
    fn test_only_end_is_terminal() {
        for state in CallState::ALL {
            assert_eq!(state.is_terminal(), state == CallState::End);
        }
        assert!(CallState::End.successors().is_empty());
        assert!(CallState::End.valid_triggers().is_empty());
    }

    #[test]
    fn test_every_live_state_can_reach_wrap_up() {
        for state in CallState::ALL.iter().filter(|s| !s.is_terminal()) {
            assert!(state.can_transition_to(CallState::WrapUp), "{state}");
            assert!(state.can_transition_to(*state), "{state} must be able to stay");
        }
    }

    #[test]
    fn test_end_only_from_wrap_up() {
        for state in CallState::ALL {
            assert_eq!(
                state.can_transition_to(CallState::End),
                state == CallState::WrapUp
            );
        }
    }

    #[test]
    fn test_timeout_never_valid() {
        for state in CallState::ALL {
            assert!(!state.accepts(Trigger::Timeout));
        }
    }

    #[test]
    fn test_knowledge_categories() {
        assert!(CallState::Objection
            .profile()
            .knowledge_categories
            .contains(&KnowledgeCategory::ObjectionHandling));
        assert_eq!(
            CallState::WrapUp.profile().knowledge_categories,
            &[KnowledgeCategory::ComplianceRules]
        );
        assert!(CallState::End.profile().knowledge_categories.is_empty());
    }

    #[test]
    fn test_wire_names() {
        let json = serde_json::to_string(&CallState::WrapUp).unwrap();
        assert_eq!(json, "\"WRAP_UP\"");
        let state: CallState = serde_json::from_str("\"OBJECTION\"").unwrap();
        assert_eq!(state, CallState::Objection);
        assert_eq!(CallState::WrapUp.to_string(), "WRAP_UP");
    }
}
