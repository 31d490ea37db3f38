//! Centralized prompt registry (§4.7, §9 "prompts embedded in code").
//!
//! Every AI call in the pipeline goes through one of these functions rather
//! than an inline string literal, so prompts stay versioned alongside the
//! schema they target and are easy to audit as a single surface, instead of
//! a generic template engine.

use crate::models::evidence::FileMetadata;

/// Prompt version embedded in every request for audit purposes; bumped
/// whenever a prompt's wording changes in a way that could shift model
/// output, independent of the crate's own version.
pub const PROMPT_VERSION: &str = "1.0.0";

pub fn document_analysis_system_prompt() -> String {
    format!(
        "You are a forensic document analyst supporting civil litigation (prompt v{PROMPT_VERSION}).\n\
         Read the provided document text and extract a structured analysis: a neutral summary,\n\
         every named entity (person, organization, date, legal term, or other) with a confidence\n\
         score, the document type, its overall sentiment, its legal significance, and any risk\n\
         flags that apply. Reserve confidence above 0.9 for facts that are extremely clear from\n\
         the text alone. Never infer facts the text does not support. Quote verbatim text when an\n\
         entity's relevance depends on exact wording."
    )
}

pub fn document_analysis_user_context(text: &str, metadata: &FileMetadata) -> String {
    format!(
        "Filename: {}\nMIME type: {}\n\n---\n{}\n---",
        metadata.filename, metadata.mime, text
    )
}

pub fn image_analysis_system_prompt() -> String {
    format!(
        "You are a forensic image analyst supporting civil litigation (prompt v{PROMPT_VERSION}).\n\
         Describe the scene, transcribe any visible text (OCR), list detected objects, note\n\
         whether people are present, note any visible timestamps, and assess the image's\n\
         potential evidential value. Flag any risk categories that plainly apply; do not guess at\n\
         identities or intent beyond what is visually evident."
    )
}

pub fn image_analysis_user_prompt(metadata: &FileMetadata) -> String {
    format!("Filename: {}\nMIME type: {}", metadata.filename, metadata.mime)
}

pub fn email_analysis_system_prompt() -> String {
    format!(
        "You are a forensic communications analyst supporting civil litigation (prompt v{PROMPT_VERSION}).\n\
         Given an email thread's headers and body text, identify every participant with their\n\
         role, authority level, message count, and a deference score (0 = dominant, 1 =\n\
         deferential). Classify the overall communication pattern, provide one sentiment value\n\
         per message in chronological order, and flag escalation events (tone changes, new\n\
         recipients, authority escalations, threats) at their 0-based message position."
    )
}

pub fn email_analysis_user_context(headers: &str, body: &str) -> String {
    format!("Headers:\n{headers}\n\nBody:\n{body}")
}

/// Case type used to select the executive-summary prompt (§4.7 step 4).
/// `workplace` is an accepted alias for `employment`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseType {
    Generic,
    Employment,
    Contract,
}

impl CaseType {
    pub fn from_str(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "workplace" | "employment" => CaseType::Employment,
            "contract" => CaseType::Contract,
            _ => CaseType::Generic,
        }
    }
}

pub fn executive_summary_system_prompt(case_type: CaseType) -> String {
    let framing = match case_type {
        CaseType::Generic => {
            "Focus on the facts as established by the evidence, without assuming a particular \
             area of law."
        }
        CaseType::Employment => {
            "This is a workplace/employment matter: pay particular attention to power dynamics, \
             retaliation, harassment, discrimination, and policy violations."
        }
        CaseType::Contract => {
            "This is a contract matter: pay particular attention to offer/acceptance, breach, \
             performance, and consideration evidenced by the correlated entities and timeline."
        }
    };
    format!(
        "You are preparing an executive summary of a legal case for counsel (prompt v{PROMPT_VERSION}).\n\
         {framing}\n\
         Produce a concise executive summary, 3 to 5 key findings, legal implications, recommended\n\
         actions, and an overall risk assessment grounded strictly in the evidence and correlation\n\
         results provided. Do not speculate beyond what the evidence supports."
    )
}

pub fn chunk_summary_system_prompt() -> String {
    format!(
        "You are summarizing one chunk of evidence from a larger legal case (prompt v{PROMPT_VERSION}).\n\
         Produce a concise summary of this chunk and its notable findings. This summary will be\n\
         combined with summaries of other chunks to produce a single case-wide executive summary,\n\
         so preserve any fact that could matter case-wide rather than trying to draw final\n\
         conclusions yourself."
    )
}

pub fn legal_pattern_system_prompt() -> String {
    format!(
        "You are a forensic analyst looking for cross-evidence legal patterns (prompt v{PROMPT_VERSION}).\n\
         Given correlated entities, a reconstructed timeline, and evidence summaries, identify\n\
         contradictions (statements from different evidence items that cannot both be true),\n\
         corroboration (independent evidence supporting the same claim), and evidence gaps. Every\n\
         source you cite must be one of the sha256 identifiers provided; never invent one.\n\
         Assign severity/strength conservatively."
    )
}

pub fn entity_resolution_system_prompt() -> String {
    format!(
        "You are resolving whether two person-entity mentions from different evidence items refer\n\
         to the same real individual (prompt v{PROMPT_VERSION}). Default to false when evidence is\n\
         ambiguous: a shared first name alone is never sufficient, and a unique identifier (email\n\
         address, organization, role, or similar) must appear in your supporting signals before\n\
         you answer true. Prefer false negatives to false positives."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_type_aliases_workplace_to_employment() {
        assert_eq!(CaseType::from_str("workplace"), CaseType::Employment);
        assert_eq!(CaseType::from_str("Employment"), CaseType::Employment);
    }

    #[test]
    fn case_type_defaults_to_generic() {
        assert_eq!(CaseType::from_str("unknown"), CaseType::Generic);
    }

    #[test]
    fn prompts_embed_the_version() {
        assert!(document_analysis_system_prompt().contains(PROMPT_VERSION));
        assert!(legal_pattern_system_prompt().contains(PROMPT_VERSION));
    }
}
