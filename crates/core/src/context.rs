//! Per-call prospect context and seller persona

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("prospect_name must not be empty")]
    MissingProspectName,
}

/// Pre-call research about the prospect, fixed for the lifetime of a call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallContext {
    pub prospect_name: String,
    pub prospect_company: String,
    pub prospect_title: String,
    pub prospect_industry: String,
    pub prospect_company_size: String,
    /// A specific fact used to open rapport
    pub personalization_hook: String,
    /// A guessed pain point
    pub pain_hypothesis: String,
}

impl CallContext {
    pub fn new(prospect_name: impl Into<String>) -> Self {
        Self {
            prospect_name: prospect_name.into(),
            ..Default::default()
        }
    }

    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.prospect_company = company.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.prospect_title = title.into();
        self
    }

    pub fn with_industry(mut self, industry: impl Into<String>) -> Self {
        self.prospect_industry = industry.into();
        self
    }

    pub fn with_company_size(mut self, size: impl Into<String>) -> Self {
        self.prospect_company_size = size.into();
        self
    }

    pub fn with_hook(mut self, hook: impl Into<String>) -> Self {
        self.personalization_hook = hook.into();
        self
    }

    pub fn with_pain_hypothesis(mut self, pain: impl Into<String>) -> Self {
        self.pain_hypothesis = pain.into();
        self
    }

    pub fn validate(&self) -> Result<(), ContextError> {
        if self.prospect_name.trim().is_empty() {
            return Err(ContextError::MissingProspectName);
        }
        Ok(())
    }

    /// First word of the prospect's name, used when addressing them
    pub fn first_name(&self) -> &str {
        self.prospect_name
            .split_whitespace()
            .next()
            .unwrap_or(self.prospect_name.as_str())
    }
}

/// Who is calling: the seller identity shared by every call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub agent_name: String,
    pub company_name: String,
    pub product_name: String,
}

impl Persona {
    pub fn new(
        agent_name: impl Into<String>,
        company_name: impl Into<String>,
        product_name: impl Into<String>,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            company_name: company_name.into(),
            product_name: product_name.into(),
        }
    }
}

impl Default for Persona {
    fn default() -> Self {
        Self::new("Sarah", "SalesPilot", "SalesPilot AI")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_requires_name() {
        assert_eq!(
            CallContext::default().validate(),
            Err(ContextError::MissingProspectName)
        );
        assert!(CallContext::new("   ").validate().is_err());
        assert!(CallContext::new("James Carter").validate().is_ok());
    }

    #[test]
    fn test_first_name() {
        assert_eq!(CallContext::new("James Carter").first_name(), "James");
        assert_eq!(CallContext::new("Priya").first_name(), "Priya");
    }

    #[test]
    fn test_missing_fields_deserialize_empty() {
        let ctx: CallContext = serde_json::from_str(r#"{"prospect_name":"James"}"#).unwrap();
        assert_eq!(ctx.prospect_name, "James");
        assert!(ctx.prospect_company.is_empty());
        assert!(ctx.pain_hypothesis.is_empty());
    }
}
