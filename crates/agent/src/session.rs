//! Per-call session record

use chrono::{DateTime, Utc};
use serde::Serialize;

use cold_call_core::{CallContext, CallState, Speaker, Trigger, Utterance};

use crate::transition::{Counters, Effect, Transition};

/// One entry of the transition audit log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionRecord {
    pub from: CallState,
    pub trigger: Option<Trigger>,
    pub to: CallState,
    /// Prospect turn that caused the move
    pub turn: u32,
    pub at: DateTime<Utc>,
}

/// The record of one call
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub session_id: String,
    pub context: CallContext,
    pub state: CallState,
    /// Prospect turns processed
    pub turn_count: u32,
    pub history: Vec<Utterance>,
    pub small_talk_exchanges: u32,
    pub discovery_probes: u32,
    pub objections_raised: u32,
    pub awaiting_email: bool,
    pub transitions: Vec<TransitionRecord>,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl Session {
    pub fn new(session_id: impl Into<String>, context: CallContext) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            context,
            state: CallState::Greeting,
            turn_count: 0,
            history: Vec::new(),
            small_talk_exchanges: 0,
            discovery_probes: 0,
            objections_raised: 0,
            awaiting_email: false,
            transitions: Vec::new(),
            created_at: now,
            last_activity_at: now,
        }
    }

    pub fn is_call_over(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn counters(&self) -> Counters {
        Counters {
            small_talk_exchanges: self.small_talk_exchanges,
            discovery_probes: self.discovery_probes,
            awaiting_email: self.awaiting_email,
        }
    }

    /// Apply an engine step: effects, then the state change
    ///
    /// The prospect line that produced the step is tagged with its trigger.
    pub fn apply(&mut self, transition: &Transition) {
        if let (Some(trigger), Some(last)) = (transition.trigger, self.history.last_mut()) {
            if !last.is_agent() {
                last.trigger = Some(trigger);
            }
        }

        for effect in &transition.effects {
            match effect {
                Effect::CountSmallTalk => self.small_talk_exchanges += 1,
                Effect::CountDiscoveryProbe => self.discovery_probes += 1,
                Effect::CountObjection => self.objections_raised += 1,
                Effect::AwaitEmail => self.awaiting_email = true,
                Effect::WaiveEmail => self.awaiting_email = false,
            }
        }

        if transition.changes_state() {
            self.transitions.push(TransitionRecord {
                from: transition.from,
                trigger: transition.trigger,
                to: transition.to,
                turn: self.turn_count,
                at: Utc::now(),
            });
        }
        self.state = transition.to;
    }

    pub fn record_agent(&mut self, message: impl Into<String>) {
        self.history.push(Utterance::agent(message, self.state));
        self.last_activity_at = Utc::now();
    }

    /// Append the prospect's line and count the turn
    pub fn record_prospect(&mut self, message: impl Into<String>) {
        self.history.push(Utterance::prospect(message, self.state));
        self.turn_count += 1;
        self.last_activity_at = Utc::now();
    }

    /// Move to WRAP_UP outside the engine, after an invariant violation
    pub fn force_wrap_up(&mut self) {
        if self.state == CallState::WrapUp || self.state.is_terminal() {
            self.awaiting_email = false;
            return;
        }
        self.apply(&Transition {
            from: self.state,
            to: CallState::WrapUp,
            trigger: None,
            effects: vec![Effect::WaiveEmail],
        });
    }

    /// One opening line plus one prospect line and one reply per turn
    pub fn history_consistent(&self) -> bool {
        self.history.len() == 2 * self.turn_count as usize + 1
    }

    /// Distinct states in the order they were first entered
    pub fn states_visited(&self) -> Vec<CallState> {
        let mut visited = vec![CallState::Greeting];
        for record in &self.transitions {
            if !visited.contains(&record.to) {
                visited.push(record.to);
            }
        }
        visited
    }

    pub fn prospect_lines(&self) -> impl Iterator<Item = &Utterance> {
        self.history
            .iter()
            .filter(|u| u.speaker == Speaker::Prospect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transition::resolve;

    fn session() -> Session {
        let mut session = Session::new("call-1", CallContext::new("James Carter"));
        session.record_agent("Hi James, this is Sarah.");
        session
    }

    #[test]
    fn test_new_session() {
        let session = Session::new("call-1", CallContext::new("James"));
        assert_eq!(session.state, CallState::Greeting);
        assert_eq!(session.turn_count, 0);
        assert!(!session.is_call_over());
        assert!(!session.history_consistent());
    }

    #[test]
    fn test_turn_keeps_history_consistent() {
        let mut session = session();
        assert!(session.history_consistent());

        session.record_prospect("Doing well, thanks.");
        assert!(!session.history_consistent());
        session.record_agent("Glad to hear it.");
        assert!(session.history_consistent());
        assert_eq!(session.turn_count, 1);
        assert_eq!(session.prospect_lines().count(), 1);
    }

    #[test]
    fn test_apply_records_state_changes_only() {
        let mut session = session();
        session.record_prospect("Busy week.");
        let t = resolve(session.state, Some(Trigger::SmallTalk), &session.counters()).unwrap();
        session.apply(&t);
        assert_eq!(session.small_talk_exchanges, 1);
        assert!(session.transitions.is_empty());

        let t = resolve(session.state, Some(Trigger::RapportReady), &session.counters()).unwrap();
        session.apply(&t);
        assert_eq!(session.state, CallState::Rapport);
        assert_eq!(session.transitions.len(), 1);
        assert_eq!(session.transitions[0].turn, 1);
        assert_eq!(
            session.states_visited(),
            vec![CallState::Greeting, CallState::Rapport]
        );
    }

    #[test]
    fn test_apply_tags_prospect_line() {
        let mut session = session();
        session.record_prospect("Not interested, thanks.");
        let t = resolve(session.state, Some(Trigger::NotInterested), &session.counters()).unwrap();
        session.apply(&t);
        assert_eq!(
            session.history.last().and_then(|u| u.trigger),
            Some(Trigger::NotInterested)
        );

        // Agent lines are never tagged
        session.record_agent("Understood.");
        let t = resolve(session.state, None, &session.counters()).unwrap();
        session.apply(&t);
        assert!(session.history.iter().filter(|u| u.is_agent()).all(|u| u.trigger.is_none()));
    }

    #[test]
    fn test_force_wrap_up() {
        let mut session = session();
        session.state = CallState::Pitch;
        session.awaiting_email = true;
        session.force_wrap_up();
        assert_eq!(session.state, CallState::WrapUp);
        assert!(!session.awaiting_email);
        assert_eq!(session.transitions.last().map(|r| r.trigger), Some(None));
    }
}
