//! Model-listing probe.
//!
//! Endpoints disagree about where their model list lives and what shape it
//! has. The probe derives a small set of candidate URLs from the configured
//! base, tries them in order, and accepts the first non-empty parse.

use crate::client::CompletionClient;
use crate::error::ApiError;
use serde_json::Value;
use url::Url;

/// Result of a successful probe: the models plus the base URL that the
/// winning endpoint implies for completion calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCatalog {
    pub models: Vec<String>,
    pub active_base_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate {
    url: String,
    derived_base_url: String,
}

/// Fetches the list of available models from the configured endpoint.
///
/// A 401 short-circuits the probe immediately; other failures fall through
/// to the next candidate, and the last error surfaces when all fail.
pub async fn fetch_available_models(
    client: &CompletionClient,
    input_url: &str,
    api_key: &str,
) -> Result<ModelCatalog, ApiError> {
    let candidates = candidate_endpoints(input_url)?;

    let mut last_error = ApiError::Request {
        message: "no model endpoint responded".to_string(),
        is_retryable: false,
    };

    for candidate in candidates {
        log::debug!("probing model endpoint {}", candidate.url);
        match client.get_json(&candidate.url, api_key).await {
            Ok(json) => {
                let models = parse_models_json(&json);
                if !models.is_empty() {
                    return Ok(ModelCatalog {
                        models,
                        active_base_url: candidate.derived_base_url,
                    });
                }
                last_error = ApiError::Parse(format!(
                    "no models recognized in response from {}",
                    candidate.url
                ));
            }
            Err(ApiError::Unauthorized) => return Err(ApiError::Unauthorized),
            Err(err) => last_error = err,
        }
    }

    Err(last_error)
}

/// Candidate list/probe URLs in priority order, duplicates removed.
fn candidate_endpoints(input_url: &str) -> Result<Vec<Candidate>, ApiError> {
    let parsed =
        Url::parse(input_url).map_err(|_| ApiError::InvalidBaseUrl(input_url.to_string()))?;

    let clean = input_url.trim_end_matches('/');
    let origin = parsed.origin().ascii_serialization();

    let raw = vec![
        Candidate {
            url: format!("{clean}/models"),
            derived_base_url: clean.to_string(),
        },
        Candidate {
            url: format!("{clean}/v1/models"),
            derived_base_url: format!("{clean}/v1"),
        },
        Candidate {
            url: format!("{origin}/api/models"),
            derived_base_url: format!("{origin}/v1"),
        },
        Candidate {
            url: format!("{origin}/v1/models"),
            derived_base_url: format!("{origin}/v1"),
        },
    ];

    let mut unique: Vec<Candidate> = Vec::with_capacity(raw.len());
    for candidate in raw {
        if !unique.iter().any(|c| c.url == candidate.url) {
            unique.push(candidate);
        }
    }
    Ok(unique)
}

/// Accepts the three response shapes seen in the wild:
/// an aggregator map `{"data": {"1": ["m"], ...}}`, the standard
/// `{"data": [{"id": "m"}, ...]}`, and a bare array of strings or
/// `{"id": ...}` objects. Unrecognized entries are skipped.
fn parse_models_json(json: &Value) -> Vec<String> {
    if let Some(data) = json.get("data") {
        if let Some(map) = data.as_object() {
            let mut models: Vec<String> = map
                .values()
                .filter_map(|v| v.as_array())
                .flatten()
                .filter_map(|v| v.as_str())
                .map(String::from)
                .collect();
            models.sort();
            models.dedup();
            return models;
        }
        if let Some(list) = data.as_array() {
            let mut models: Vec<String> = list
                .iter()
                .filter_map(|m| m.get("id").and_then(Value::as_str))
                .map(String::from)
                .collect();
            models.sort();
            return models;
        }
    }

    if let Some(list) = json.as_array() {
        let mut models: Vec<String> = list
            .iter()
            .filter_map(|m| m.as_str().or_else(|| m.get("id").and_then(Value::as_str)))
            .map(String::from)
            .collect();
        models.sort();
        return models;
    }

    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_candidates_from_path_base() {
        let candidates = candidate_endpoints("https://api.example.com/v1").unwrap();
        let urls: Vec<&str> = candidates.iter().map(|c| c.url.as_str()).collect();
        // The origin-level /v1/models duplicates the first candidate here.
        assert_eq!(
            urls,
            vec![
                "https://api.example.com/v1/models",
                "https://api.example.com/v1/v1/models",
                "https://api.example.com/api/models",
            ]
        );
        assert_eq!(candidates[0].derived_base_url, "https://api.example.com/v1");
    }

    #[test]
    fn test_candidates_deduplicate() {
        let candidates = candidate_endpoints("https://api.example.com").unwrap();
        let urls: Vec<&str> = candidates.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://api.example.com/models",
                "https://api.example.com/v1/models",
                "https://api.example.com/api/models",
            ]
        );
    }

    #[test]
    fn test_invalid_url_is_rejected_before_network() {
        assert!(matches!(
            candidate_endpoints("not a url"),
            Err(ApiError::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn test_parse_aggregator_map() {
        let json = json!({ "data": { "1": ["gpt-3", "gpt-4"], "2": ["gpt-4"] } });
        assert_eq!(parse_models_json(&json), vec!["gpt-3", "gpt-4"]);
    }

    #[test]
    fn test_parse_standard_list() {
        let json = json!({ "data": [{ "id": "b-model" }, { "id": "a-model" }] });
        assert_eq!(parse_models_json(&json), vec!["a-model", "b-model"]);
    }

    #[test]
    fn test_parse_bare_array_mixed() {
        let json = json!(["plain", { "id": "object" }, 42]);
        assert_eq!(parse_models_json(&json), vec!["object", "plain"]);
    }

    #[test]
    fn test_parse_unrecognized_shape_is_empty() {
        assert!(parse_models_json(&json!({ "models": "nope" })).is_empty());
    }
}
