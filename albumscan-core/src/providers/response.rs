//! Backend payload parsing
//!
//! Models reply with text that should be a JSON object; some wrap it in a
//! Markdown code fence, which is stripped before parsing. Every failure here
//! is a [`ProviderError::Validation`].

use super::ProviderError;
use crate::types::{
    Confidence, EnrichmentResult, IdentificationOutcome, IdentificationResult, Recommendation,
    RefinementStrategy, SearchRefinement,
};
use serde::{Deserialize, Deserializer};
use std::str::FromStr;

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum IdentificationPayload {
    Identified {
        #[serde(default)]
        artist: String,
        #[serde(default)]
        title: String,
        #[serde(default, deserialize_with = "lenient_year")]
        year: Option<String>,
        #[serde(default)]
        genres: Vec<String>,
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        confidence: Option<String>,
    },
    NeedsRefinement {
        #[serde(default)]
        strategy: Option<RefinementStrategy>,
        query: String,
        #[serde(default)]
        reason: String,
        #[serde(default)]
        observation: serde_json::Value,
    },
    Unresolved {
        #[serde(default)]
        message: String,
    },
}

#[derive(Debug, Deserialize)]
struct ReviewPayload {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    bullets: Vec<String>,
    rating: f32,
    #[serde(default)]
    recommendation: String,
    #[serde(default, alias = "keyTracks")]
    key_tracks: Vec<String>,
}

/// `year` arrives as `"1997"`, `1997` or `null`
fn lenient_year<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Strip surrounding whitespace and an optional Markdown code fence
pub fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn validation(context: &str, err: impl std::fmt::Display) -> ProviderError {
    ProviderError::Validation(format!("{}: {}", context, err))
}

/// Parse one identification round
pub fn parse_identification(text: &str) -> Result<IdentificationOutcome, ProviderError> {
    let payload: IdentificationPayload = serde_json::from_str(extract_json(text))
        .map_err(|e| validation("identification payload", e))?;

    match payload {
        IdentificationPayload::Identified {
            artist,
            title,
            year,
            genres,
            label,
            confidence,
        } => {
            let confidence = match confidence.as_deref() {
                Some(value) => Confidence::from_str(value).map_err(|e| validation("confidence", e))?,
                None => Confidence::Low,
            };
            let result = IdentificationResult {
                artist,
                title,
                year,
                genres,
                label,
                confidence,
            }
            .validate()
            .map_err(|e| validation("identification", e))?;
            Ok(IdentificationOutcome::Identified(result))
        }
        IdentificationPayload::NeedsRefinement {
            strategy,
            query,
            reason,
            observation,
        } => {
            if query.trim().is_empty() {
                return Err(ProviderError::Validation("refinement query is empty".to_string()));
            }
            Ok(IdentificationOutcome::NeedsRefinement(SearchRefinement {
                strategy: strategy.unwrap_or(RefinementStrategy::Metadata),
                query,
                reason,
                observation,
            }))
        }
        IdentificationPayload::Unresolved { message } => {
            let message = if message.trim().is_empty() {
                "album could not be identified".to_string()
            } else {
                message
            };
            Ok(IdentificationOutcome::Unresolved(message))
        }
    }
}

/// Parse and validate a review
pub fn parse_review(text: &str) -> Result<EnrichmentResult, ProviderError> {
    let payload: ReviewPayload =
        serde_json::from_str(extract_json(text)).map_err(|e| validation("review payload", e))?;

    let recommendation =
        Recommendation::from_str(&payload.recommendation).map_err(|e| validation("review", e))?;

    EnrichmentResult {
        summary: payload.summary,
        bullets: payload.bullets,
        rating: payload.rating,
        recommendation,
        key_tracks: payload.key_tracks,
    }
    .validate()
    .map_err(|e| validation("review", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identified_with_numeric_year() {
        let outcome = parse_identification(
            r#"{"status":"identified","artist":"Radiohead","title":"OK Computer","year":1997,
                "genres":["Alternative Rock"],"label":"Parlophone","confidence":"high"}"#,
        )
        .unwrap();

        let IdentificationOutcome::Identified(result) = outcome else {
            panic!("expected identified outcome");
        };
        assert_eq!(result.year.as_deref(), Some("1997"));
        assert_eq!(result.confidence, Confidence::High);
        assert_eq!(result.genres, vec!["Alternative Rock".to_string()]);
    }

    #[test]
    fn test_fenced_payload() {
        let text = "```json\n{\"status\":\"unresolved\",\"message\":\"blurry image\"}\n```";
        assert_eq!(
            parse_identification(text).unwrap(),
            IdentificationOutcome::Unresolved("blurry image".to_string())
        );
    }

    #[test]
    fn test_refinement_payload() {
        let outcome = parse_identification(
            r#"{"status":"needs_refinement","strategy":"visual","query":"prism rainbow black cover",
                "reason":"no text visible","observation":{"colors":["black"]}}"#,
        )
        .unwrap();

        let IdentificationOutcome::NeedsRefinement(refinement) = outcome else {
            panic!("expected refinement");
        };
        assert_eq!(refinement.strategy, RefinementStrategy::Visual);
        assert_eq!(refinement.observation["colors"][0], "black");
    }

    #[test]
    fn test_empty_artist_is_validation_error() {
        let result = parse_identification(
            r#"{"status":"identified","artist":" ","title":"OK Computer","confidence":"low"}"#,
        );
        assert!(matches!(result, Err(ProviderError::Validation(_))));
    }

    #[test]
    fn test_unknown_status_rejected() {
        let result = parse_identification(r#"{"status":"maybe"}"#);
        assert!(matches!(result, Err(ProviderError::Validation(_))));
        assert!(matches!(
            parse_identification("I think this is OK Computer"),
            Err(ProviderError::Validation(_))
        ));
    }

    #[test]
    fn test_review_payload() {
        let review = parse_review(
            r#"{"summary":"A landmark.","bullets":["Dense","Paranoid","Influential"],
                "rating":9.5,"recommendation":"essential","keyTracks":["Airbag","Let Down"]}"#,
        )
        .unwrap();

        assert_eq!(review.recommendation, Recommendation::Essential);
        assert_eq!(review.key_tracks.len(), 2);
        assert_eq!(review.rating, 9.5);
    }

    #[test]
    fn test_review_rating_out_of_range() {
        let result = parse_review(
            r#"{"summary":"Loud.","bullets":["Very loud"],"rating":11,
                "recommendation":"Skip","key_tracks":["Track 1"]}"#,
        );
        assert!(matches!(result, Err(ProviderError::Validation(_))));
    }

    #[test]
    fn test_review_missing_recommendation() {
        let result = parse_review(
            r#"{"summary":"Fine.","bullets":["Ok"],"rating":5,"key_tracks":["One"]}"#,
        );
        assert!(matches!(result, Err(ProviderError::Validation(_))));
    }

    #[test]
    fn test_extract_json_plain() {
        assert_eq!(extract_json("  {\"a\":1}\n"), "{\"a\":1}");
        assert_eq!(extract_json("```\n{\"a\":1}\n```"), "{\"a\":1}");
    }
}
