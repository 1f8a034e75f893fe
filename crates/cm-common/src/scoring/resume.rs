//! Resume text extraction from the document store.
//!
//! Availability beats completeness here: a candidate with an unreachable or
//! unparsable resume still gets scored, just from profile fields alone.
//! Every failure path degrades to an empty string with a warning log.

use std::time::Duration;

use tracing::warn;

/// Bound on extracted resume text, keeps downstream prompts tractable.
pub const RESUME_TEXT_MAX_CHARS: usize = 8_000;

const FETCH_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone)]
pub struct ResumeFetcher {
    client: reqwest::Client,
}

impl Default for ResumeFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ResumeFetcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self { client }
    }

    /// Resolve a resume reference to plain text. Never fails: missing
    /// references, non-http URLs, transport errors and binary payloads all
    /// degrade to `""`.
    pub async fn fetch_text(&self, resume_url: Option<&str>) -> String {
        let Some(url) = resume_url.map(str::trim).filter(|u| !u.is_empty()) else {
            return String::new();
        };

        if !url.starts_with("http://") && !url.starts_with("https://") {
            warn!(resume_url = %url, "unsupported resume reference; scoring without resume text");
            return String::new();
        }

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(resume_url = %url, error = %err, "resume fetch failed; scoring without resume text");
                return String::new();
            }
        };

        if !response.status().is_success() {
            warn!(
                resume_url = %url,
                status = %response.status(),
                "resume store returned non-success; scoring without resume text"
            );
            return String::new();
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();

        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => {
                warn!(resume_url = %url, error = %err, "resume body unreadable; scoring without resume text");
                return String::new();
            }
        };

        let text = if content_type.contains("text/html") {
            strip_html(&body)
        } else {
            body
        };

        bound_text(&text)
    }
}

/// Normalize extracted text: drop control characters, collapse whitespace
/// runs, truncate on a char boundary at [`RESUME_TEXT_MAX_CHARS`].
pub fn bound_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len().min(RESUME_TEXT_MAX_CHARS));
    let mut chars = 0usize;
    let mut pending_space = false;

    for ch in raw.chars() {
        if ch.is_whitespace() || ch.is_control() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            if chars + 1 >= RESUME_TEXT_MAX_CHARS {
                break;
            }
            out.push(' ');
            chars += 1;
            pending_space = false;
        }
        if chars >= RESUME_TEXT_MAX_CHARS {
            break;
        }
        out.push(ch);
        chars += 1;
    }

    out
}

/// Minimal tag stripper for HTML resume exports. Script and style bodies are
/// dropped entirely; everything else keeps its text content.
fn strip_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len() / 2);
    let mut rest = html;

    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        rest = &rest[open..];

        let tag_name: String = rest[1..]
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        let Some(close) = rest.find('>') else {
            // Unterminated tag; drop the remainder.
            return out;
        };
        rest = &rest[close + 1..];

        if tag_name == "script" || tag_name == "style" {
            let end_tag = format!("</{tag_name}");
            match rest.to_ascii_lowercase().find(&end_tag) {
                Some(end) => {
                    rest = &rest[end..];
                    if let Some(close) = rest.find('>') {
                        rest = &rest[close + 1..];
                    } else {
                        return out;
                    }
                }
                None => return out,
            }
        } else {
            // Block-ish boundaries become whitespace so words don't merge.
            out.push(' ');
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_reference_degrades_to_empty() {
        let fetcher = ResumeFetcher::new();
        assert_eq!(fetcher.fetch_text(None).await, "");
        assert_eq!(fetcher.fetch_text(Some("   ")).await, "");
    }

    #[tokio::test]
    async fn non_http_reference_degrades_to_empty() {
        let fetcher = ResumeFetcher::new();
        assert_eq!(fetcher.fetch_text(Some("s3://bucket/resume.pdf")).await, "");
        assert_eq!(fetcher.fetch_text(Some("file:///tmp/resume.txt")).await, "");
    }

    #[test]
    fn bound_text_collapses_whitespace_and_controls() {
        let bounded = bound_text("Rust \t engineer\n\nwith   systems\u{0007} work");
        assert_eq!(bounded, "Rust engineer with systems work");
    }

    #[test]
    fn bound_text_truncates_at_char_limit() {
        let long = "a".repeat(RESUME_TEXT_MAX_CHARS * 2);
        let bounded = bound_text(&long);
        assert_eq!(bounded.chars().count(), RESUME_TEXT_MAX_CHARS);
    }

    #[test]
    fn bound_text_counts_chars_not_bytes() {
        let long = "漢".repeat(RESUME_TEXT_MAX_CHARS + 50);
        let bounded = bound_text(&long);
        assert_eq!(bounded.chars().count(), RESUME_TEXT_MAX_CHARS);
    }

    #[test]
    fn strip_html_keeps_text_content() {
        let html = "<html><body><h1>Resume</h1><p>Rust engineer</p></body></html>";
        let stripped = bound_text(&strip_html(html));
        assert_eq!(stripped, "Resume Rust engineer");
    }

    #[test]
    fn strip_html_drops_script_and_style_bodies() {
        let html = "<p>Keep</p><script>alert('no')</script><style>p{}</style><p>this</p>";
        let stripped = bound_text(&strip_html(html));
        assert_eq!(stripped, "Keep this");
    }

    #[test]
    fn strip_html_survives_unterminated_markup() {
        let stripped = strip_html("text <unclosed");
        assert_eq!(stripped, "text ");
    }
}
