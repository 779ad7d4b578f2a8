//! Template utterance generator
//!
//! Spoken lines per state, filled from the prospect context and persona.
//! Repeated visits to a state rotate through its lines so the agent does not
//! repeat itself word for word.

use async_trait::async_trait;

use cold_call_core::{
    CallContext, CallState, CollaboratorError, Persona, Trigger, Utterance, UtteranceGenerator,
};

/// Deterministic generator over spoken templates
#[derive(Debug, Clone, Default)]
pub struct TemplateGenerator {
    persona: Persona,
}

impl TemplateGenerator {
    pub fn new(persona: Persona) -> Self {
        Self { persona }
    }

    /// Agent lines already spoken in `state`
    fn visits(state: CallState, history: &[Utterance]) -> usize {
        history
            .iter()
            .filter(|u| u.is_agent() && u.state == state)
            .count()
    }

    fn pick(lines: &[String], visits: usize) -> String {
        lines
            .get(visits % lines.len().max(1))
            .cloned()
            .unwrap_or_default()
    }

    /// Trigger the engine resolved for the prospect's latest line
    fn last_trigger(history: &[Utterance]) -> Option<Trigger> {
        history.iter().rev().find(|u| !u.is_agent())?.trigger
    }

    fn lines(&self, state: CallState, ctx: &CallContext, history: &[Utterance]) -> Vec<String> {
        let first = ctx.first_name();
        let agent = &self.persona.agent_name;
        let company = &self.persona.company_name;
        let product = &self.persona.product_name;
        let their_company = if ctx.prospect_company.is_empty() {
            "your team"
        } else {
            ctx.prospect_company.as_str()
        };

        match state {
            CallState::Greeting => vec![
                format!(
                    "Hi {first}, this is {agent} calling from {company}. How's your week going so far?"
                ),
                "Ha, I hear you. Hope things ease up a little.".to_string(),
                "Totally fair. I'll keep this short.".to_string(),
            ],
            CallState::Rapport => {
                let opener = if ctx.personalization_hook.is_empty() {
                    format!(
                        "I'll be quick. I work with sales teams like {their_company} on how reps spend their day."
                    )
                } else {
                    format!(
                        "I noticed {their_company} is {}, which is actually why I'm reaching out.",
                        ctx.personalization_hook
                    )
                };
                vec![
                    format!("{opener} Mind if I take thirty seconds to explain why I called?"),
                    "That's great to hear. Would you be open to hearing why I reached out?"
                        .to_string(),
                ]
            }
            CallState::Discovery => {
                let question = if ctx.pain_hypothesis.is_empty() {
                    "how is your team handling call notes and follow-ups today?".to_string()
                } else {
                    format!(
                        "a lot of teams we talk to say {}. How is that going for you today?",
                        ctx.pain_hypothesis
                    )
                };
                vec![
                    format!("Appreciate it, {first}. Quick question: {question}"),
                    "Got it. And roughly how much time does that cost each rep in a typical week?"
                        .to_string(),
                    "Interesting. What happens to follow-ups when things get busy?".to_string(),
                ]
            }
            CallState::Pitch => vec![
                format!(
                    "That's exactly the problem {product} was built for. It logs every call and \
                     drafts the follow-up automatically, so your reps get that time back for selling. \
                     Does that sound like it could help?"
                ),
                format!("Most teams see the difference in the first week. Would it help to see {product} in action?"),
            ],
            CallState::Objection => vec![
                "That's a fair concern, and I hear it a lot. It plugs into what you already use \
                 rather than replacing it. Would that address it?"
                    .to_string(),
                "Totally understand. What would you need to see to feel comfortable with it?"
                    .to_string(),
            ],
            CallState::Close => vec![
                "Would you be open to a quick 15-minute demo? I have Thursday at 2pm or Friday morning."
                    .to_string(),
                "What does your calendar look like later this week for fifteen minutes?".to_string(),
            ],
            CallState::WrapUp => {
                let reason = Self::last_trigger(history);
                if reason == Some(Trigger::Timeout) {
                    return vec![format!(
                        "I've kept you long enough, {first}. Thanks so much for your time today."
                    )];
                }
                if Self::visits(CallState::WrapUp, history) > 0 {
                    return vec![
                        "No worries. What's the best email to send that to?".to_string(),
                        "Just the email address is all I need and I'll let you go.".to_string(),
                    ];
                }
                match reason {
                    Some(Trigger::MeetingTimeAccepted) => vec![
                        "Perfect, I'll send a calendar invite for that. What's the best email to send it to?"
                            .to_string(),
                    ],
                    Some(Trigger::MoreInfoRequested) => vec![
                        "Happy to. What's the best email to send that over to?".to_string(),
                    ],
                    Some(Trigger::CallbackRequested) => vec![format!(
                        "No problem at all, {first}. I'll try you again at a better time. Does that work?"
                    )],
                    _ => vec![format!(
                        "Understood, {first}. Thanks for your time, I really appreciate it."
                    )],
                }
            }
            CallState::End => vec![format!(
                "Thanks again, {first}. Have a great rest of your day!"
            )],
        }
    }
}

#[async_trait]
impl UtteranceGenerator for TemplateGenerator {
    async fn generate(
        &self,
        state: CallState,
        context: &CallContext,
        history: &[Utterance],
    ) -> Result<String, CollaboratorError> {
        let lines = self.lines(state, context, history);
        let line = Self::pick(&lines, Self::visits(state, history));
        if line.is_empty() {
            return Err(CollaboratorError::EmptyOutput);
        }
        Ok(line)
    }

    fn name(&self) -> &str {
        "templates"
    }
}
