//! LLM analysis adapter: one chat call per application, a fixed instruction
//! contract, and a validating parser that fills safe defaults instead of
//! trusting the model's shape.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::aggregate::clamp_score;
use super::ScoringError;
use crate::llm::InferenceClient;

const ANALYSIS_SYSTEM_PROMPT: &str = "You are a recruiting analyst comparing one candidate against one job posting. \
Respond with ONLY a JSON object of this exact shape: \
{\"skill_score\": <int 0-100>, \"experience_score\": <int 0-100>, \"summary\": <string>, \
\"recommendation\": <\"strong_match\"|\"good_match\"|\"moderate_match\"|\"weak_match\"|\"poor_match\">, \
\"strengths\": [<string>], \"concerns\": [<string>], \"skills_found\": [<string>], \
\"skills_missing\": [<string>], \"experience_details\": <string>}. \
Be generous: reward transferable skills and relevant industry experience rather than exact keyword overlap. \
Most qualified candidates should land in the 70-95 range.";

pub fn build_analysis_prompt(candidate_text: &str, job_text: &str) -> String {
    format!(
        "CANDIDATE PROFILE:\n{candidate_text}\n\nJOB POSTING:\n{job_text}\n\n\
        Evaluate how well this candidate matches this job and respond with the JSON object only."
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    StrongMatch,
    GoodMatch,
    ModerateMatch,
    WeakMatch,
    PoorMatch,
}

impl Default for Recommendation {
    fn default() -> Self {
        Recommendation::ModerateMatch
    }
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::StrongMatch => "strong_match",
            Recommendation::GoodMatch => "good_match",
            Recommendation::ModerateMatch => "moderate_match",
            Recommendation::WeakMatch => "weak_match",
            Recommendation::PoorMatch => "poor_match",
        }
    }

    /// Unknown labels fall back to the safe default rather than failing the
    /// whole analysis.
    pub fn parse_or_default(value: &str) -> Self {
        match value {
            "strong_match" => Recommendation::StrongMatch,
            "good_match" => Recommendation::GoodMatch,
            "moderate_match" => Recommendation::ModerateMatch,
            "weak_match" => Recommendation::WeakMatch,
            "poor_match" => Recommendation::PoorMatch,
            _ => Recommendation::default(),
        }
    }
}

/// Sanitized result of one analysis call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisOutcome {
    pub skill_score: u8,
    pub experience_score: u8,
    pub summary: String,
    pub recommendation: Recommendation,
    pub strengths: Vec<String>,
    pub concerns: Vec<String>,
    pub skills_found: Vec<String>,
    pub skills_missing: Vec<String>,
    pub experience_details: String,
}

/// Wire shape as the model reports it; every field optional so a partial
/// object still parses and gets defaulted.
#[derive(Debug, Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    skill_score: Option<i64>,
    #[serde(default)]
    experience_score: Option<i64>,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    recommendation: String,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    concerns: Vec<String>,
    #[serde(default)]
    skills_found: Vec<String>,
    #[serde(default)]
    skills_missing: Vec<String>,
    #[serde(default)]
    experience_details: String,
}

/// Locate the JSON object inside model output, tolerating fenced blocks and
/// surrounding prose.
fn extract_json_object(content: &str) -> Option<&str> {
    let trimmed = content.trim();

    let candidate = if let Some(fence_start) = trimmed.find("```") {
        let after_fence = &trimmed[fence_start + 3..];
        let after_lang = after_fence
            .strip_prefix("json")
            .unwrap_or(after_fence)
            .trim_start();
        match after_lang.find("```") {
            Some(fence_end) => &after_lang[..fence_end],
            None => after_lang,
        }
    } else {
        trimmed
    };

    let start = candidate.find('{')?;
    let end = candidate.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&candidate[start..=end])
}

/// Parse and sanitize model output. Missing fields become safe defaults;
/// out-of-range scores are clamped. Only a payload with no JSON object at
/// all is an error.
pub fn parse_analysis(content: &str) -> Result<AnalysisOutcome, ScoringError> {
    let json = extract_json_object(content).ok_or_else(|| {
        ScoringError::ExternalService("analysis response contained no JSON object".into())
    })?;

    let raw: RawAnalysis = serde_json::from_str(json).map_err(|err| {
        ScoringError::ExternalService(format!("analysis response failed to parse: {err}"))
    })?;

    Ok(AnalysisOutcome {
        skill_score: clamp_score(raw.skill_score.unwrap_or(0)),
        experience_score: clamp_score(raw.experience_score.unwrap_or(0)),
        summary: raw.summary.trim().to_string(),
        recommendation: Recommendation::parse_or_default(raw.recommendation.trim()),
        strengths: raw.strengths,
        concerns: raw.concerns,
        skills_found: raw.skills_found,
        skills_missing: raw.skills_missing,
        experience_details: raw.experience_details.trim().to_string(),
    })
}

#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    async fn analyze(
        &self,
        candidate_text: &str,
        job_text: &str,
    ) -> Result<AnalysisOutcome, ScoringError>;
}

#[async_trait]
impl AnalysisProvider for InferenceClient {
    async fn analyze(
        &self,
        candidate_text: &str,
        job_text: &str,
    ) -> Result<AnalysisOutcome, ScoringError> {
        let prompt = build_analysis_prompt(candidate_text, job_text);
        let content = self
            .chat_completion(ANALYSIS_SYSTEM_PROMPT, &prompt)
            .await?;
        parse_analysis(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_complete_payload() {
        let content = r#"{
            "skill_score": 85,
            "experience_score": 78,
            "summary": "Strong systems background.",
            "recommendation": "good_match",
            "strengths": ["Rust", "distributed systems"],
            "concerns": ["no Kubernetes"],
            "skills_found": ["Rust", "Postgres"],
            "skills_missing": ["Kubernetes"],
            "experience_details": "8 years backend"
        }"#;

        let outcome = parse_analysis(content).unwrap();
        assert_eq!(outcome.skill_score, 85);
        assert_eq!(outcome.experience_score, 78);
        assert_eq!(outcome.recommendation, Recommendation::GoodMatch);
        assert_eq!(outcome.strengths.len(), 2);
        assert_eq!(outcome.skills_missing, vec!["Kubernetes".to_string()]);
    }

    #[test]
    fn missing_fields_get_safe_defaults() {
        let outcome = parse_analysis(r#"{"skill_score": 70}"#).unwrap();
        assert_eq!(outcome.skill_score, 70);
        assert_eq!(outcome.experience_score, 0);
        assert_eq!(outcome.summary, "");
        assert_eq!(outcome.recommendation, Recommendation::ModerateMatch);
        assert!(outcome.strengths.is_empty());
        assert!(outcome.concerns.is_empty());
        assert_eq!(outcome.experience_details, "");
    }

    #[test]
    fn out_of_range_scores_are_clamped() {
        let outcome =
            parse_analysis(r#"{"skill_score": 140, "experience_score": -3}"#).unwrap();
        assert_eq!(outcome.skill_score, 100);
        assert_eq!(outcome.experience_score, 0);
    }

    #[test]
    fn unknown_recommendation_defaults_to_moderate() {
        let outcome = parse_analysis(r#"{"recommendation": "hire_immediately"}"#).unwrap();
        assert_eq!(outcome.recommendation, Recommendation::ModerateMatch);
    }

    #[test]
    fn tolerates_fenced_json_with_prose() {
        let content = "Here is the analysis:\n```json\n{\"skill_score\": 66}\n```\nDone.";
        let outcome = parse_analysis(content).unwrap();
        assert_eq!(outcome.skill_score, 66);
    }

    #[test]
    fn payload_without_json_is_an_external_service_error() {
        let err = parse_analysis("I cannot answer that.").unwrap_err();
        assert!(matches!(err, ScoringError::ExternalService(_)));
    }

    #[test]
    fn malformed_json_is_an_external_service_error() {
        let err = parse_analysis(r#"{"skill_score": }"#).unwrap_err();
        assert!(matches!(err, ScoringError::ExternalService(_)));
    }

    #[test]
    fn recommendation_round_trips_through_as_str() {
        for recommendation in [
            Recommendation::StrongMatch,
            Recommendation::GoodMatch,
            Recommendation::ModerateMatch,
            Recommendation::WeakMatch,
            Recommendation::PoorMatch,
        ] {
            assert_eq!(
                Recommendation::parse_or_default(recommendation.as_str()),
                recommendation
            );
        }
    }

    #[test]
    fn prompt_includes_both_text_blocks() {
        let prompt = build_analysis_prompt("candidate block", "job block");
        assert!(prompt.contains("CANDIDATE PROFILE:\ncandidate block"));
        assert!(prompt.contains("JOB POSTING:\njob block"));
    }
}
