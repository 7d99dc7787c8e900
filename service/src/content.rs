//! Content generation - obtaining one fresh etymology per dispatch run.
//!
//! The [`ContentProvider`] trait is the seam between the dispatch pipeline
//! and the generative backend. The production implementation calls the
//! Google Generative Language API with a prompt that excludes recently sent
//! sayings and biases toward liked (and away from disliked) material. The
//! provider returns free text that must parse into exactly one structured
//! record; any failure is a hard failure for the run - there is no fallback
//! content.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

/// One generated etymology record.
///
/// Immutable once generated. The saying text doubles as the natural key
/// joining send records, feedback rows, and feedback tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Etymology {
    pub saying: String,
    pub origin: String,
    pub meaning: String,
    pub era: String,
}

/// Content provider failure. Aborts the dispatch run that hit it.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("content provider request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("content provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("content provider returned no candidates")]
    Empty,

    #[error("content provider response did not parse: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Port for the generative content backend.
#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// Generate one etymology, excluding `recent` sayings and steering by
    /// the liked/disliked sets.
    async fn generate(
        &self,
        recent: &[String],
        liked: &[String],
        disliked: &[String],
    ) -> Result<Etymology, ContentError>;
}

/// Google Generative Language API client.
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    timeout: Duration,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: String,
}

const GENERATE_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent";

impl GeminiProvider {
    pub fn new(client: Client, api_key: String, timeout: Duration) -> Self {
        Self {
            client,
            api_key,
            timeout,
        }
    }
}

#[async_trait]
impl ContentProvider for GeminiProvider {
    async fn generate(
        &self,
        recent: &[String],
        liked: &[String],
        disliked: &[String],
    ) -> Result<Etymology, ContentError> {
        let prompt = build_prompt(recent, liked, disliked);

        info!(
            recent_count = recent.len(),
            liked_count = liked.len(),
            disliked_count = disliked.len(),
            "content_generate_start"
        );

        let response = self
            .client
            .post(GENERATE_URL)
            .query(&[("key", self.api_key.as_str())])
            .timeout(self.timeout)
            .json(&json!({
                "contents": [{ "parts": [{ "text": prompt }] }],
                "generationConfig": {
                    "temperature": 1.0,
                    "maxOutputTokens": 1024,
                }
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ContentError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: GenerateResponse = response.json().await?;
        let text = payload
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .ok_or(ContentError::Empty)?;

        let etymology = parse_etymology(text)?;

        info!(saying = %etymology.saying, era = %etymology.era, "content_generate_complete");

        Ok(etymology)
    }
}

/// Build the generation prompt with the novelty and preference constraints.
fn build_prompt(recent: &[String], liked: &[String], disliked: &[String]) -> String {
    let mut prompt = String::from(
        "Generate a fascinating etymology for a common English saying or phrase.\n\n\
         Requirements:\n\
         - Choose a well-known saying or idiom that people use regularly\n\
         - The origin story should be historically accurate and interesting\n\
         - Include the time period or era when it originated\n\
         - Explain what the saying means in modern usage",
    );

    if !recent.is_empty() {
        prompt.push_str("\n\nDo NOT use any of these recently used sayings: ");
        prompt.push_str(&recent.join(", "));
    }

    if !liked.is_empty() || !disliked.is_empty() {
        prompt.push_str("\n\nBased on subscriber feedback:");
        if !liked.is_empty() {
            prompt.push_str("\n- These sayings were LIKED (generate more like these): ");
            prompt.push_str(&liked.join(", "));
        }
        if !disliked.is_empty() {
            prompt.push_str("\n- These sayings were DISLIKED (avoid similar ones): ");
            prompt.push_str(&disliked.join(", "));
        }
    }

    prompt.push_str(
        "\n\nReturn ONLY valid JSON in this exact format (no markdown, no code blocks):\n\
         {\n\
         \x20 \"saying\": \"the exact saying or phrase\",\n\
         \x20 \"origin\": \"detailed historical origin story (2-3 sentences)\",\n\
         \x20 \"meaning\": \"modern meaning and usage (1-2 sentences)\",\n\
         \x20 \"era\": \"time period (e.g., '16th Century', 'Ancient Rome', '1800s')\"\n\
         }",
    );

    prompt
}

/// Parse provider text into an [`Etymology`], tolerating Markdown code
/// fences around the JSON.
fn parse_etymology(raw: &str) -> Result<Etymology, serde_json::Error> {
    let cleaned = strip_code_fences(raw);
    serde_json::from_str(&cleaned)
}

/// Remove ```json / ``` wrapper markers the model sometimes adds despite
/// the prompt.
fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences() {
        let fenced = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(fenced), "{\"a\": 1}");

        let bare_fence = "```\n{\"a\": 1}\n```\n";
        assert_eq!(strip_code_fences(bare_fence), "{\"a\": 1}");

        let plain = "{\"a\": 1}";
        assert_eq!(strip_code_fences(plain), "{\"a\": 1}");
    }

    #[test]
    fn test_parse_etymology_with_fences() {
        let raw = "```json\n{\n  \"saying\": \"break the ice\",\n  \"origin\": \"From ships breaking ice.\",\n  \"meaning\": \"To ease tension.\",\n  \"era\": \"16th Century\"\n}\n```";
        let etymology = parse_etymology(raw).unwrap();
        assert_eq!(etymology.saying, "break the ice");
        assert_eq!(etymology.era, "16th Century");
    }

    #[test]
    fn test_parse_etymology_rejects_prose() {
        assert!(parse_etymology("Sure! Here is an etymology for you.").is_err());
    }

    #[test]
    fn test_parse_etymology_rejects_missing_fields() {
        assert!(parse_etymology("{\"saying\": \"break the ice\"}").is_err());
    }

    #[test]
    fn test_prompt_includes_exclusions() {
        let recent = vec!["break the ice".to_string(), "bite the bullet".to_string()];
        let prompt = build_prompt(&recent, &[], &[]);
        assert!(prompt.contains("Do NOT use any of these recently used sayings: break the ice, bite the bullet"));
        assert!(!prompt.contains("Based on subscriber feedback"));
    }

    #[test]
    fn test_prompt_includes_feedback_bias() {
        let liked = vec!["raining cats and dogs".to_string()];
        let disliked = vec!["spill the beans".to_string()];
        let prompt = build_prompt(&[], &liked, &disliked);
        assert!(prompt.contains("LIKED (generate more like these): raining cats and dogs"));
        assert!(prompt.contains("DISLIKED (avoid similar ones): spill the beans"));
    }

    #[test]
    fn test_prompt_without_history_has_no_constraint_sections() {
        let prompt = build_prompt(&[], &[], &[]);
        assert!(!prompt.contains("Do NOT use"));
        assert!(!prompt.contains("Based on subscriber feedback"));
        assert!(prompt.contains("Return ONLY valid JSON"));
    }
}
