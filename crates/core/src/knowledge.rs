//! Knowledge categories consulted per call state

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of reference material the agent can draw on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeCategory {
    /// Facts about the seller's own company
    CompanySpecific,
    /// What makes a prospect a fit
    QualifyingCriteria,
    ProductKnowledge,
    CaseStudies,
    CompetitorIntelligence,
    ObjectionHandling,
    /// Rules the agent must follow; enforced through the base prompt
    ComplianceRules,
}

impl KnowledgeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            KnowledgeCategory::CompanySpecific => "company_specific",
            KnowledgeCategory::QualifyingCriteria => "qualifying_criteria",
            KnowledgeCategory::ProductKnowledge => "product_knowledge",
            KnowledgeCategory::CaseStudies => "case_studies",
            KnowledgeCategory::CompetitorIntelligence => "competitor_intelligence",
            KnowledgeCategory::ObjectionHandling => "objection_handling",
            KnowledgeCategory::ComplianceRules => "compliance_rules",
        }
    }
}

impl fmt::Display for KnowledgeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
