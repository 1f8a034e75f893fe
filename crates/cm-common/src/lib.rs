pub mod api;
pub mod db;
pub mod llm;
pub mod logging;
pub mod run_id;
pub mod scoring;

use serde_json::Value;

// Read-only records consumed by the scoring engine. The surrounding ATS owns
// their lifecycle; this crate never writes to them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Candidate {
    pub id: Option<i64>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub current_company: Option<String>,
    pub current_title: Option<String>,
    pub location: Option<String>,
    pub resume_url: Option<String>,
    pub resume_parsed_data: Option<Value>,
    pub tags: Vec<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Job {
    pub id: Option<i64>,
    pub title: String,
    pub department: Option<String>,
    pub location: Option<String>,
    pub employment_type: Option<String>,
    pub description: Option<String>,
    pub requirements: Option<String>,
}

/// One candidate tracked against one job posting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Application {
    pub id: i64,
    pub organization_id: i64,
    pub candidate_id: i64,
    pub job_id: i64,
}

impl Candidate {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_name_trims_surrounding_whitespace() {
        let candidate = Candidate {
            first_name: "  Ada ".into(),
            last_name: " Lovelace ".into(),
            ..Default::default()
        };

        assert_eq!(candidate.full_name(), "Ada Lovelace");
    }

    #[test]
    fn full_name_handles_missing_last_name() {
        let candidate = Candidate {
            first_name: "Prince".into(),
            ..Default::default()
        };

        assert_eq!(candidate.full_name(), "Prince");
    }
}
