//! Post-call summary

use chrono::{DateTime, Utc};
use serde::Serialize;

use cold_call_core::{CallState, Trigger, Utterance};

use crate::session::{Session, TransitionRecord};

/// How the call turned out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    MeetingBooked,
    MaterialsRequested,
    CallbackRequested,
    Disqualified,
    NotInterested,
    TimedOut,
    /// Ended without any of the above
    Completed,
    InProgress,
}

impl CallOutcome {
    /// Derived from the triggers that moved the call, strongest first
    pub fn from_session(session: &Session) -> Self {
        let fired = |trigger: Trigger| {
            session
                .transitions
                .iter()
                .any(|record| record.trigger == Some(trigger))
        };

        if fired(Trigger::MeetingTimeAccepted) {
            CallOutcome::MeetingBooked
        } else if fired(Trigger::MoreInfoRequested) {
            CallOutcome::MaterialsRequested
        } else if fired(Trigger::CallbackRequested) {
            CallOutcome::CallbackRequested
        } else if fired(Trigger::Disqualified) {
            CallOutcome::Disqualified
        } else if fired(Trigger::NotInterested) {
            CallOutcome::NotInterested
        } else if fired(Trigger::Timeout) {
            CallOutcome::TimedOut
        } else if session.is_call_over() {
            CallOutcome::Completed
        } else {
            CallOutcome::InProgress
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CallSummary {
    pub session_id: String,
    pub prospect: String,
    pub company: String,
    pub state: CallState,
    pub outcome: CallOutcome,
    pub total_turns: u32,
    pub objections_raised: u32,
    pub discovery_probes: u32,
    pub is_call_over: bool,
    pub states_visited: Vec<CallState>,
    pub transitions: Vec<TransitionRecord>,
    pub conversation: Vec<Utterance>,
    pub started_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl CallSummary {
    pub fn from_session(session: &Session) -> Self {
        Self {
            session_id: session.session_id.clone(),
            prospect: session.context.prospect_name.clone(),
            company: session.context.prospect_company.clone(),
            state: session.state,
            outcome: CallOutcome::from_session(session),
            total_turns: session.turn_count,
            objections_raised: session.objections_raised,
            discovery_probes: session.discovery_probes,
            is_call_over: session.is_call_over(),
            states_visited: session.states_visited(),
            transitions: session.transitions.clone(),
            conversation: session.history.clone(),
            started_at: session.created_at,
            last_activity_at: session.last_activity_at,
        }
    }
}
