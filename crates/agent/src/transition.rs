//! Transition engine
//!
//! A pure function from `(state, trigger, counters)` to the next state and
//! the bookkeeping the session must apply. Nothing here touches a session,
//! a clock or a collaborator.

use serde::Serialize;
use thiserror::Error;

use cold_call_core::{CallState, Trigger};

/// Session counters the engine reads to evaluate guards
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub small_talk_exchanges: u32,
    pub discovery_probes: u32,
    /// WRAP_UP is waiting for the prospect's email
    pub awaiting_email: bool,
}

/// Bookkeeping produced by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    CountSmallTalk,
    CountDiscoveryProbe,
    CountObjection,
    /// Entering WRAP_UP with a follow-up that needs an email
    AwaitEmail,
    /// Entering or staying in WRAP_UP without waiting for an email
    WaiveEmail,
}

/// Outcome of one engine step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: CallState,
    pub to: CallState,
    pub trigger: Option<Trigger>,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn new(from: CallState, to: CallState, trigger: Option<Trigger>) -> Self {
        Self {
            from,
            to,
            trigger,
            effects: Vec::new(),
        }
    }

    fn with(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn changes_state(&self) -> bool {
        self.from != self.to
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("no transition defined from terminal state {state} (trigger {trigger:?})")]
    TerminalState {
        state: CallState,
        trigger: Option<Trigger>,
    },

    #[error("illegal edge {from} -> {to} (trigger {trigger:?})")]
    IllegalEdge {
        from: CallState,
        to: CallState,
        trigger: Option<Trigger>,
    },
}

/// Compute the next state for a classified turn.
///
/// `None` means the classifier found no signal: the call stays where it is,
/// except in WRAP_UP with nothing left to collect, where the turn is the
/// closing confirmation and the call ends.
pub fn resolve(
    state: CallState,
    trigger: Option<Trigger>,
    counters: &Counters,
) -> Result<Transition, InvariantViolation> {
    use CallState::*;
    use Trigger::*;

    if state.is_terminal() {
        return Err(InvariantViolation::TerminalState { state, trigger });
    }

    let stay = Transition::new(state, state, trigger);
    let to = |next: CallState| Transition::new(state, next, trigger);

    let transition = match (state, trigger) {
        (WrapUp, Some(EmailProvided)) => to(End),
        (WrapUp, Some(Timeout)) if counters.awaiting_email => stay.with(Effect::WaiveEmail),
        (WrapUp, Some(t)) if counters.awaiting_email && t.is_exit() => to(End),
        (WrapUp, _) if counters.awaiting_email => stay,
        (WrapUp, _) => to(End),

        (_, None) => stay,
        (_, Some(Timeout)) => to(WrapUp).with(Effect::WaiveEmail),
        (_, Some(t)) if t.is_exit() => to(WrapUp).with(Effect::WaiveEmail),

        (Greeting, Some(SmallTalk)) => stay.with(Effect::CountSmallTalk),
        (Greeting, Some(RapportReady)) if counters.small_talk_exchanges >= 1 => to(Rapport),
        // Blocked by the guard; the reply still counts as an exchange
        (Greeting, Some(RapportReady)) => stay.with(Effect::CountSmallTalk),

        (Rapport, Some(TransitionReady)) => to(Discovery),

        (Discovery, Some(DiscoverySignal)) if counters.discovery_probes == 0 => {
            stay.with(Effect::CountDiscoveryProbe)
        }
        (Discovery, Some(DiscoverySignal)) => to(Pitch).with(Effect::CountDiscoveryProbe),
        (Discovery, Some(PainQuantified)) => to(Pitch),
        (Discovery, Some(Disqualified)) => to(WrapUp).with(Effect::WaiveEmail),

        (Pitch, Some(BuyingSignal)) => to(Close),
        (Pitch, Some(ObjectionRaised)) => to(Objection).with(Effect::CountObjection),
        (Pitch, Some(MoreInfoRequested)) => to(WrapUp).with(Effect::AwaitEmail),

        (Objection, Some(ObjectionOvercome)) => to(Close),
        (Objection, Some(ObjectionRaised)) => stay.with(Effect::CountObjection),

        (Close, Some(MeetingTimeAccepted)) => to(WrapUp).with(Effect::AwaitEmail),
        (Close, Some(MoreInfoRequested)) => to(WrapUp).with(Effect::AwaitEmail),

        _ => stay,
    };

    if !transition.from.can_transition_to(transition.to) {
        return Err(InvariantViolation::IllegalEdge {
            from: transition.from,
            to: transition.to,
            trigger,
        });
    }

    Ok(transition)
}

/// Whether a trigger would move the call out of its current state
pub fn is_advancing(state: CallState, trigger: Option<Trigger>, counters: &Counters) -> bool {
    trigger.is_some()
        && resolve(state, trigger, counters)
            .map(|t| t.changes_state())
            .unwrap_or(false)
}
