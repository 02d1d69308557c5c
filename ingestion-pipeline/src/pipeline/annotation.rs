use common::storage::types::code_artifact::normalize_tags;
use serde::Deserialize;
use thiserror::Error;

pub const SUMMARY_FAILED: &str = "AI summary failed";
pub const PARSE_ERROR_TAG: &str = "parse-error";
pub const UNKNOWN_USE_CASE: &str = "unknown";

/// Semantic annotation of one artifact.
///
/// `Degraded` carries why the summary engine produced nothing usable; its accessors
/// yield the sentinel values that get persisted in place of a real annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Annotation {
    Parsed {
        summary: String,
        tags: Vec<String>,
        use_case: String,
    },
    Degraded {
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum AnnotationError {
    #[error("annotation is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("annotation field `{0}` is missing or empty")]
    MissingField(&'static str),
}

#[derive(Debug, Deserialize)]
struct RawAnnotation {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    tags: Option<RawTags>,
    #[serde(default, alias = "useCase", alias = "use-case")]
    use_case: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTags {
    List(Vec<String>),
    Csv(String),
}

impl RawTags {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::List(tags) => tags,
            Self::Csv(joined) => joined.split(',').map(str::to_string).collect(),
        }
    }
}

impl Annotation {
    pub fn degraded(reason: impl Into<String>) -> Self {
        Self::Degraded {
            reason: reason.into(),
        }
    }

    /// Parses raw summary-engine output. Never fails: anything unusable degrades.
    pub fn parse(raw: &str) -> Self {
        match parse_annotation(raw) {
            Ok(annotation) => annotation,
            Err(err) => Self::degraded(err.to_string()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    pub fn summary(&self) -> &str {
        match self {
            Self::Parsed { summary, .. } => summary,
            Self::Degraded { .. } => SUMMARY_FAILED,
        }
    }

    pub fn tags(&self) -> Vec<String> {
        match self {
            Self::Parsed { tags, .. } => tags.clone(),
            Self::Degraded { .. } => vec![PARSE_ERROR_TAG.to_string()],
        }
    }

    pub fn use_case(&self) -> &str {
        match self {
            Self::Parsed { use_case, .. } => use_case,
            Self::Degraded { .. } => UNKNOWN_USE_CASE,
        }
    }
}

fn parse_annotation(raw: &str) -> Result<Annotation, AnnotationError> {
    let payload: RawAnnotation = serde_json::from_str(json_body(raw))?;

    let summary = non_blank(payload.summary).ok_or(AnnotationError::MissingField("summary"))?;
    let use_case =
        non_blank(payload.use_case).ok_or(AnnotationError::MissingField("use_case"))?;
    let tags = normalize_tags(payload.tags.map(RawTags::into_vec).unwrap_or_default());

    Ok(Annotation::Parsed {
        summary,
        tags,
        use_case,
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// Strips a Markdown fence and any prose around the outermost object.
fn json_body(raw: &str) -> &str {
    let mut body = raw.trim();

    if let Some(rest) = body.strip_prefix("```") {
        // A fence without a newline wraps the body on the same line.
        body = rest.split_once('\n').map_or(rest, |(_, after)| after);
        body = body.trim_end().strip_suffix("```").unwrap_or(body).trim();
    }

    match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if start < end => &body[start..=end],
        _ => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_plain_json() {
        let annotation = Annotation::parse(
            r#"{"summary": "Entry point.", "tags": ["go", "cli", "go"], "use_case": "Start the binary."}"#,
        );

        assert_eq!(
            annotation,
            Annotation::Parsed {
                summary: "Entry point.".into(),
                tags: vec!["cli".into(), "go".into()],
                use_case: "Start the binary.".into(),
            }
        );
        assert!(!annotation.is_degraded());
    }

    #[test]
    fn test_tolerates_code_fence_and_csv_tags() {
        let raw = "```json\n{\"summary\": \"Router setup\", \"tags\": \"http, axum ,\", \"use_case\": \"Wire routes\"}\n```";
        let annotation = Annotation::parse(raw);

        assert_eq!(annotation.summary(), "Router setup");
        assert_eq!(annotation.tags(), vec!["axum".to_string(), "http".to_string()]);
        assert_eq!(annotation.use_case(), "Wire routes");
    }

    #[test]
    fn test_tolerates_single_line_fence() {
        for raw in [
            "```{\"summary\": \"s\", \"tags\": [\"go\"], \"use_case\": \"u\"}```",
            "```json{\"summary\": \"s\", \"tags\": [\"go\"], \"use_case\": \"u\"}```",
        ] {
            let annotation = Annotation::parse(raw);
            assert!(!annotation.is_degraded(), "degraded on {raw}");
            assert_eq!(annotation.summary(), "s");
            assert_eq!(annotation.tags(), vec!["go".to_string()]);
            assert_eq!(annotation.use_case(), "u");
        }
    }

    #[test]
    fn test_tolerates_surrounding_prose() {
        let raw = "Here you go:\n{\"summary\": \"s\", \"tags\": [], \"use_case\": \"u\"}\nThanks";
        let annotation = Annotation::parse(raw);
        assert_eq!(annotation.summary(), "s");
        assert!(annotation.tags().is_empty());
    }

    #[test]
    fn test_garbage_degrades_to_sentinels() {
        let annotation = Annotation::parse("I am not JSON");

        assert!(annotation.is_degraded());
        assert_eq!(annotation.summary(), SUMMARY_FAILED);
        assert_eq!(annotation.tags(), vec![PARSE_ERROR_TAG.to_string()]);
        assert_eq!(annotation.use_case(), UNKNOWN_USE_CASE);
    }

    #[test]
    fn test_missing_fields_degrade() {
        for raw in [
            r#"{"tags": ["x"], "use_case": "u"}"#,
            r#"{"summary": "  ", "use_case": "u"}"#,
            r#"{"summary": "s", "tags": ["x"]}"#,
            r#"{"summary": "s", "tags": 7, "use_case": "u"}"#,
        ] {
            assert!(Annotation::parse(raw).is_degraded(), "expected degrade for {raw}");
        }
    }

    #[test]
    fn test_missing_tags_is_empty_set() {
        let annotation = Annotation::parse(r#"{"summary": "s", "use_case": "u"}"#);
        assert!(!annotation.is_degraded());
        assert!(annotation.tags().is_empty());
    }
}
