//! Triggers detected from the prospect's replies

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// A discrete classification of the prospect's latest message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trigger {
    /// Benign personal reply with no substantive content
    SmallTalk,
    /// Small talk done and prospect is open to the company hook
    RapportReady,
    /// Prospect invites the reason for the call
    TransitionReady,
    /// Prospect describes their current process or pain
    DiscoverySignal,
    /// Prospect gives a concrete, measurable impact of the pain
    PainQuantified,
    /// Prospect asks how the product works or signals interest
    BuyingSignal,
    /// Prospect raises a concrete concern
    ObjectionRaised,
    /// Objection no longer blocks progress
    ObjectionOvercome,
    /// Prospect agrees to a proposed time
    MeetingTimeAccepted,
    /// Prospect supplies contact info
    EmailProvided,
    /// Prospect asks to be contacted later
    CallbackRequested,
    /// Prospect asks for written materials instead of a meeting
    MoreInfoRequested,
    /// Prospect is not a viable buyer
    Disqualified,
    /// Explicit rejection
    NotInterested,
    /// Raised by the transition engine when the turn budget runs out
    Timeout,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown trigger: {0}")]
pub struct UnknownTrigger(pub String);

impl Trigger {
    pub const ALL: [Trigger; 15] = [
        Trigger::SmallTalk,
        Trigger::RapportReady,
        Trigger::TransitionReady,
        Trigger::DiscoverySignal,
        Trigger::PainQuantified,
        Trigger::BuyingSignal,
        Trigger::ObjectionRaised,
        Trigger::ObjectionOvercome,
        Trigger::MeetingTimeAccepted,
        Trigger::EmailProvided,
        Trigger::CallbackRequested,
        Trigger::MoreInfoRequested,
        Trigger::Disqualified,
        Trigger::NotInterested,
        Trigger::Timeout,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::SmallTalk => "SMALL_TALK",
            Trigger::RapportReady => "RAPPORT_READY",
            Trigger::TransitionReady => "TRANSITION_READY",
            Trigger::DiscoverySignal => "DISCOVERY_SIGNAL",
            Trigger::PainQuantified => "PAIN_QUANTIFIED",
            Trigger::BuyingSignal => "BUYING_SIGNAL",
            Trigger::ObjectionRaised => "OBJECTION_RAISED",
            Trigger::ObjectionOvercome => "OBJECTION_OVERCOME",
            Trigger::MeetingTimeAccepted => "MEETING_TIME_ACCEPTED",
            Trigger::EmailProvided => "EMAIL_PROVIDED",
            Trigger::CallbackRequested => "CALLBACK_REQUESTED",
            Trigger::MoreInfoRequested => "MORE_INFO_REQUESTED",
            Trigger::Disqualified => "DISQUALIFIED",
            Trigger::NotInterested => "NOT_INTERESTED",
            Trigger::Timeout => "TIMEOUT",
        }
    }

    /// Graceful-exit triggers that override any other signal in a turn
    pub fn is_exit(&self) -> bool {
        matches!(self, Trigger::CallbackRequested | Trigger::NotInterested)
    }

    /// Only the transition engine may raise these
    pub fn is_synthetic(&self) -> bool {
        matches!(self, Trigger::Timeout)
    }

    /// Rank used when several signals are present in one reply
    pub fn priority(&self) -> u8 {
        match self {
            Trigger::CallbackRequested | Trigger::NotInterested => 100,
            Trigger::Timeout => 90,
            Trigger::Disqualified => 80,
            Trigger::EmailProvided => 75,
            Trigger::MeetingTimeAccepted => 70,
            Trigger::MoreInfoRequested => 60,
            Trigger::ObjectionRaised => 50,
            Trigger::BuyingSignal => 45,
            Trigger::ObjectionOvercome => 40,
            Trigger::PainQuantified => 30,
            Trigger::DiscoverySignal => 20,
            Trigger::TransitionReady => 15,
            Trigger::RapportReady => 10,
            Trigger::SmallTalk => 0,
        }
    }

    /// Resolve several candidate signals to one trigger.
    ///
    /// Highest priority wins; on a tie the first candidate is kept.
    pub fn prioritized<I>(candidates: I) -> Option<Trigger>
    where
        I: IntoIterator<Item = Trigger>,
    {
        candidates.into_iter().fold(None, |best, candidate| match best {
            Some(current) if current.priority() >= candidate.priority() => Some(current),
            _ => Some(candidate),
        })
    }
}

impl FromStr for Trigger {
    type Err = UnknownTrigger;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(|c: char| c == ' ' || c == '-', "_");
        Trigger::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| UnknownTrigger(s.to_string()))
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trigger() {
        assert_eq!("CALLBACK_REQUESTED".parse::<Trigger>(), Ok(Trigger::CallbackRequested));
        assert_eq!(" small_talk ".parse::<Trigger>(), Ok(Trigger::SmallTalk));
        assert_eq!("buying-signal".parse::<Trigger>(), Ok(Trigger::BuyingSignal));
        assert!("NONE".parse::<Trigger>().is_err());
        assert!("".parse::<Trigger>().is_err());
    }

    #[test]
    fn test_as_str_matches_serde() {
        for trigger in Trigger::ALL {
            let json = serde_json::to_string(&trigger).unwrap();
            assert_eq!(json, format!("\"{}\"", trigger.as_str()));
        }
    }

    #[test]
    fn test_exit_triggers_win() {
        let picked = Trigger::prioritized([
            Trigger::BuyingSignal,
            Trigger::NotInterested,
            Trigger::ObjectionRaised,
        ]);
        assert_eq!(picked, Some(Trigger::NotInterested));

        let picked = Trigger::prioritized([Trigger::CallbackRequested, Trigger::MeetingTimeAccepted]);
        assert_eq!(picked, Some(Trigger::CallbackRequested));
    }

    #[test]
    fn test_tie_keeps_first() {
        let picked = Trigger::prioritized([Trigger::CallbackRequested, Trigger::NotInterested]);
        assert_eq!(picked, Some(Trigger::CallbackRequested));
    }

    #[test]
    fn test_empty_candidates() {
        assert_eq!(Trigger::prioritized(Vec::new()), None);
    }

    #[test]
    fn test_only_timeout_is_synthetic() {
        let synthetic: Vec<_> = Trigger::ALL.iter().filter(|t| t.is_synthetic()).collect();
        assert_eq!(synthetic, vec![&Trigger::Timeout]);
    }
}
