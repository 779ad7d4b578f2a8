//! Prompt building
//!
//! Every prompt is assembled as: identity and rules, prospect context, the
//! current state's profile, then a task section that differs between
//! classification and generation. The transcript follows as chat turns.

use serde::{Deserialize, Serialize};
use std::fmt;

use cold_call_core::{CallContext, CallState, Persona, Speaker, Utterance};

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

impl From<&Utterance> for Message {
    fn from(utterance: &Utterance) -> Self {
        match utterance.speaker {
            Speaker::Agent => Message::assistant(utterance.message.clone()),
            Speaker::Prospect => Message::user(utterance.message.clone()),
        }
    }
}

/// What the model is asked to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    /// Pick one trigger for the prospect's latest reply
    Classify,
    /// Say the agent's next line
    Generate,
}

const BASE_RULES: &str = "\
## Personality & Tone
- Professional but conversational, confident without being pushy
- Keep responses short: two or three sentences. This is a phone call, not an email.
- Ask one question at a time
- Use the prospect's first name naturally, but don't overuse it

## Hard Rules
- Never make guarantees about specific results
- Never fabricate case studies, statistics or customer names
- If the prospect asks to be removed from the call list, comply and end the call
- Never misrepresent the purpose of the call";

/// Builds chat messages for one collaborator request
pub struct PromptBuilder {
    messages: Vec<Message>,
    persona: Persona,
}

impl PromptBuilder {
    pub fn new(persona: Persona) -> Self {
        Self {
            messages: Vec::new(),
            persona,
        }
    }

    /// Append the system prompt for a state
    pub fn system_prompt(
        mut self,
        state: CallState,
        context: Option<&CallContext>,
        mode: PromptMode,
    ) -> Self {
        let mut system = format!(
            "You are {agent}, a sales development representative at {company} making an \
             outbound cold call about {product}.\n\n{rules}",
            agent = self.persona.agent_name,
            company = self.persona.company_name,
            product = self.persona.product_name,
            rules = BASE_RULES,
        );

        if let Some(ctx) = context {
            system.push_str(&Self::prospect_section(ctx));
        }

        system.push_str(&Self::state_section(state));

        match mode {
            PromptMode::Classify => system.push_str(&Self::classify_section(state)),
            PromptMode::Generate => system.push_str(&Self::generate_section(state)),
        }

        self.messages.push(Message::system(system));
        self
    }

    /// Add retrieved knowledge to the system prompt
    pub fn with_knowledge(mut self, knowledge: &str) -> Self {
        let section = format!(
            "\n\n## Knowledge to use\n\
             Use these facts where they help. Do not read them out verbatim.\n\n{}",
            knowledge
        );
        match self.messages.iter_mut().find(|m| m.role == Role::System) {
            Some(system) => system.content.push_str(&section),
            None => self.messages.push(Message::system(section.trim_start())),
        }
        self
    }

    /// Append the transcript as chat turns
    pub fn with_history(mut self, history: &[Utterance]) -> Self {
        self.messages.extend(history.iter().map(Message::from));
        self
    }

    pub fn user_message(mut self, content: impl Into<String>) -> Self {
        self.messages.push(Message::user(content));
        self
    }

    pub fn build(self) -> Vec<Message> {
        self.messages
    }

    fn prospect_section(ctx: &CallContext) -> String {
        let field = |value: &str| {
            if value.trim().is_empty() {
                "unknown".to_string()
            } else {
                value.trim().to_string()
            }
        };

        format!(
            "\n\n## Prospect Context\n\
             - Name: {}\n\
             - Title: {}\n\
             - Company: {}\n\
             - Industry: {}\n\
             - Company size: {}\n\
             - Personalization hook: {}\n\
             - Pain hypothesis: {}",
            field(&ctx.prospect_name),
            field(&ctx.prospect_title),
            field(&ctx.prospect_company),
            field(&ctx.prospect_industry),
            field(&ctx.prospect_company_size),
            field(&ctx.personalization_hook),
            field(&ctx.pain_hypothesis),
        )
    }

    fn state_section(state: CallState) -> String {
        let profile = state.profile();
        let mut section = format!(
            "\n\n## Current State: {}\n{}\n\n### Objective\n{}",
            state, profile.description, profile.objective
        );
        if !profile.guidelines.is_empty() {
            section.push_str("\n\n### Guidelines");
            for guideline in profile.guidelines {
                section.push_str("\n- ");
                section.push_str(guideline);
            }
        }
        section
    }

    fn classify_section(state: CallState) -> String {
        let valid: Vec<&str> = state.valid_triggers().iter().map(|t| t.as_str()).collect();
        format!(
            "\n\n## Task\n\
             Classify the prospect's latest message. Do not write a reply.\n\
             Choose the single trigger that best matches what the prospect said or implied, \
             or NONE if the call should stay in the current state. Be conservative. \
             CALLBACK_REQUESTED and NOT_INTERESTED take priority over everything else, but \
             only for clear requests, never for jokes or mild pushback.\n\n\
             Valid triggers: {}\n\n\
             Respond with JSON only, no markdown:\n\
             {{\"trigger\": \"<trigger or NONE>\", \"reasoning\": \"<one sentence>\"}}",
            valid.join(", ")
        )
    }

    fn generate_section(state: CallState) -> String {
        let closing = if state.is_terminal() {
            "The call is ending now. Say a short, warm goodbye."
        } else {
            "Say the next thing you would say on the phone in this state."
        };
        format!(
            "\n\n## Task\n{}\n\
             Respond with spoken words only: no JSON, no stage directions, no quotes.",
            closing
        )
    }
}
