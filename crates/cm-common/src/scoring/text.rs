//! Builds the plain-text blocks handed to the analysis and embedding
//! adapters. Identical inputs must always produce identical text: the blocks
//! feed prompts and embeddings, and reproducible scores need reproducible
//! inputs.

use serde_json::Value;

use crate::{Candidate, Job};

fn push_field(out: &mut String, label: &str, value: &str) {
    let value = value.trim();
    if value.is_empty() {
        return;
    }
    out.push_str(label);
    out.push_str(": ");
    out.push_str(value);
    out.push('\n');
}

/// Fold the upstream resume parser's JSON output into stable `key: value`
/// lines, sorted by key so map ordering can never leak into the text.
fn push_parsed_resume(out: &mut String, parsed: &Value) {
    let Value::Object(map) = parsed else {
        return;
    };

    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();

    for key in keys {
        let rendered = match &map[key] {
            Value::String(s) => s.trim().to_string(),
            Value::Array(items) => items
                .iter()
                .filter_map(|item| item.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null | Value::Object(_) => continue,
        };
        push_field(out, key, &rendered);
    }
}

/// Candidate profile as one deterministic text block. Field order is fixed;
/// absent fields are skipped rather than rendered empty.
pub fn build_candidate_text(candidate: &Candidate, resume_text: &str) -> String {
    let mut out = String::new();

    push_field(&mut out, "Name", &candidate.full_name());
    push_field(&mut out, "Email", &candidate.email);
    if let Some(title) = &candidate.current_title {
        push_field(&mut out, "Current title", title);
    }
    if let Some(company) = &candidate.current_company {
        push_field(&mut out, "Current company", company);
    }
    if let Some(location) = &candidate.location {
        push_field(&mut out, "Location", location);
    }
    if !candidate.tags.is_empty() {
        push_field(&mut out, "Tags", &candidate.tags.join(", "));
    }
    if let Some(notes) = &candidate.notes {
        push_field(&mut out, "Notes", notes);
    }
    if let Some(parsed) = &candidate.resume_parsed_data {
        push_parsed_resume(&mut out, parsed);
    }
    if !resume_text.trim().is_empty() {
        out.push_str("Resume:\n");
        out.push_str(resume_text.trim());
        out.push('\n');
    }

    out
}

/// Job posting as one deterministic text block, same rules as the candidate
/// side.
pub fn build_job_text(job: &Job) -> String {
    let mut out = String::new();

    push_field(&mut out, "Job title", &job.title);
    if let Some(department) = &job.department {
        push_field(&mut out, "Department", department);
    }
    if let Some(location) = &job.location {
        push_field(&mut out, "Location", location);
    }
    if let Some(employment_type) = &job.employment_type {
        push_field(&mut out, "Employment type", employment_type);
    }
    if let Some(description) = &job.description {
        push_field(&mut out, "Description", description);
    }
    if let Some(requirements) = &job.requirements {
        push_field(&mut out, "Requirements", requirements);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_candidate() -> Candidate {
        Candidate {
            id: Some(1),
            first_name: "Grace".into(),
            last_name: "Hopper".into(),
            email: "grace@example.com".into(),
            current_company: Some("Navy".into()),
            current_title: Some("Rear Admiral".into()),
            location: None,
            resume_url: None,
            resume_parsed_data: Some(json!({
                "skills": ["COBOL", "compilers"],
                "years_experience": 40,
                "ignored_nested": {"a": 1},
            })),
            tags: vec!["veteran".into()],
            notes: None,
        }
    }

    #[test]
    fn candidate_text_is_deterministic() {
        let candidate = sample_candidate();
        let first = build_candidate_text(&candidate, "resume body");
        let second = build_candidate_text(&candidate, "resume body");
        assert_eq!(first, second);
    }

    #[test]
    fn candidate_text_skips_absent_fields() {
        let candidate = sample_candidate();
        let text = build_candidate_text(&candidate, "");
        assert!(!text.contains("Location:"));
        assert!(!text.contains("Notes:"));
        assert!(!text.contains("Resume:"));
    }

    #[test]
    fn parsed_resume_fields_are_sorted_and_flattened() {
        let candidate = sample_candidate();
        let text = build_candidate_text(&candidate, "");

        assert!(text.contains("skills: COBOL, compilers"));
        assert!(text.contains("years_experience: 40"));
        assert!(!text.contains("ignored_nested"));

        let skills_at = text.find("skills:").unwrap();
        let years_at = text.find("years_experience:").unwrap();
        assert!(skills_at < years_at);
    }

    #[test]
    fn resume_text_is_appended_when_present() {
        let candidate = sample_candidate();
        let text = build_candidate_text(&candidate, "  10 years of systems work  ");
        assert!(text.ends_with("Resume:\n10 years of systems work\n"));
    }

    #[test]
    fn job_text_uses_fixed_field_order() {
        let job = Job {
            id: Some(7),
            title: "Platform Engineer".into(),
            department: Some("Engineering".into()),
            location: Some("Remote".into()),
            employment_type: Some("full_time".into()),
            description: Some("Build the platform.".into()),
            requirements: Some("Rust, Postgres".into()),
        };

        let text = build_job_text(&job);
        let expected = "Job title: Platform Engineer\nDepartment: Engineering\nLocation: Remote\nEmployment type: full_time\nDescription: Build the platform.\nRequirements: Rust, Postgres\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn blank_fields_are_treated_as_absent() {
        let job = Job {
            title: "Analyst".into(),
            department: Some("   ".into()),
            ..Default::default()
        };

        let text = build_job_text(&job);
        assert_eq!(text, "Job title: Analyst\n");
    }
}
