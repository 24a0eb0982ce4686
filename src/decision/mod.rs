//! Query routing decisions
//!
//! Classifies a query into an [`Intent`] and picks the external sources worth
//! asking. Classification runs in three steps, first match wins:
//!
//! 1. specific identifiers (trial ids, PMIDs, DOIs, FDA application numbers)
//! 2. scored domain rules
//! 3. general-medical fallback

mod agent;
mod rules;
mod types;

pub use agent::{DecisionAgent, FALLBACK_CONFIDENCE};
pub use rules::{
    classify, default_domains, DomainMatch, DomainRule, Identifier, DOMAIN_THRESHOLD,
    IDENTIFIER_CONFIDENCE, PATTERN_INCREMENT,
};
pub use types::{Decision, Intent};
