//! The JSON contract between the bot and the language model.
//!
//! Models are asked for a bare JSON object but regularly wrap it in markdown
//! fences or surround it with a sentence of prose. [`parse_meme_idea`] accepts
//! both and insists on all four fields being present with the right types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A caption pair and template query produced for one trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemeIdea {
    pub is_memable: bool,
    pub top_text: String,
    pub bottom_text: String,
    pub search_query: String,
}

/// Why a model response could not be turned into a [`MemeIdea`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractError {
    #[error("response is empty")]
    Empty,

    #[error("response is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("response is JSON but not an object")]
    NotAnObject,

    #[error("required field '{0}' is missing")]
    MissingField(&'static str),

    #[error("field '{field}' must be a {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },
}

/// JSON schema sent to the provider alongside the prompt.
pub fn idea_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "is_memable": {"type": "boolean", "description": "True if the message deserves a meme"},
            "top_text": {"type": "string", "description": "Caption for the top of the image"},
            "bottom_text": {"type": "string", "description": "Caption for the bottom of the image"},
            "search_query": {"type": "string", "description": "Short literal description of the template image to search for"}
        },
        "required": ["is_memable", "top_text", "bottom_text", "search_query"]
    })
}

/// Parse a raw model response into a [`MemeIdea`].
///
/// Does not judge `is_memable`; a well-formed "not memable" answer parses fine.
pub fn parse_meme_idea(raw: &str) -> Result<MemeIdea, ContractError> {
    let cleaned = strip_code_fences(raw);
    if cleaned.is_empty() {
        return Err(ContractError::Empty);
    }

    let value = match serde_json::from_str::<Value>(cleaned) {
        Ok(value) => value,
        Err(first_err) => match extract_object(cleaned) {
            Some(candidate) => serde_json::from_str::<Value>(candidate)
                .map_err(|_| ContractError::InvalidJson(first_err.to_string()))?,
            None => return Err(ContractError::InvalidJson(first_err.to_string())),
        },
    };

    let Value::Object(object) = value else {
        return Err(ContractError::NotAnObject);
    };

    Ok(MemeIdea {
        is_memable: bool_field(&object, "is_memable")?,
        top_text: string_field(&object, "top_text")?,
        bottom_text: string_field(&object, "bottom_text")?,
        search_query: string_field(&object, "search_query")?,
    })
}

/// Remove a leading ```` ``` ```` / ```` ```json ```` line and a trailing fence.
fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();

    if let Some(rest) = text.strip_prefix("```") {
        // Drop the info string (e.g. `json`) up to the end of the fence line.
        text = match rest.find('\n') {
            Some(newline) => &rest[newline + 1..],
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
        };
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }

    text.trim()
}

/// The outermost `{ ... }` span, for answers with prose around the object.
fn extract_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn bool_field(object: &Map<String, Value>, field: &'static str) -> Result<bool, ContractError> {
    match object.get(field) {
        None | Some(Value::Null) => Err(ContractError::MissingField(field)),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(ContractError::WrongType {
            field,
            expected: "boolean",
        }),
    }
}

fn string_field(
    object: &Map<String, Value>,
    field: &'static str,
) -> Result<String, ContractError> {
    match object.get(field) {
        None | Some(Value::Null) => Err(ContractError::MissingField(field)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(ContractError::WrongType {
            field,
            expected: "string",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{"is_memable": true, "top_text": "Top", "bottom_text": "Bottom", "search_query": "cat"}"#;

    #[test]
    fn parses_plain_json() {
        let idea = parse_meme_idea(VALID).expect("valid idea");
        assert!(idea.is_memable);
        assert_eq!(idea.top_text, "Top");
        assert_eq!(idea.bottom_text, "Bottom");
        assert_eq!(idea.search_query, "cat");
    }

    #[test]
    fn strips_json_fence() {
        let raw = format!("```json\n{VALID}\n```");
        assert_eq!(parse_meme_idea(&raw).expect("fenced"), parse_meme_idea(VALID).unwrap());
    }

    #[test]
    fn strips_bare_fence_with_whitespace() {
        let raw = format!("  \n```\n{VALID}\n```  \n");
        assert!(parse_meme_idea(&raw).is_ok());
    }

    #[test]
    fn strips_single_line_fence() {
        let raw = format!("```json{VALID}```");
        assert!(parse_meme_idea(&raw).is_ok());
    }

    #[test]
    fn recovers_object_surrounded_by_prose() {
        let raw = format!("Sure! Here is your meme:\n{VALID}\nEnjoy.");
        assert!(parse_meme_idea(&raw).is_ok());
    }

    #[test]
    fn malformed_json_is_an_error() {
        let err = parse_meme_idea("{\"is_memable\": true, \"top_text\": ").unwrap_err();
        assert!(matches!(err, ContractError::InvalidJson(_)));
    }

    #[test]
    fn plain_text_is_an_error() {
        let err = parse_meme_idea("I cannot help with that").unwrap_err();
        assert!(matches!(err, ContractError::InvalidJson(_)));
    }

    #[test]
    fn empty_and_fence_only_responses_are_empty() {
        assert_eq!(parse_meme_idea("").unwrap_err(), ContractError::Empty);
        assert_eq!(parse_meme_idea("```json\n```").unwrap_err(), ContractError::Empty);
    }

    #[test]
    fn array_is_not_an_object() {
        assert_eq!(parse_meme_idea("[1, 2]").unwrap_err(), ContractError::NotAnObject);
    }

    #[test]
    fn each_missing_field_is_reported() {
        for field in ["is_memable", "top_text", "bottom_text", "search_query"] {
            let mut object: Map<String, Value> = serde_json::from_str(VALID).unwrap();
            object.remove(field);
            let raw = Value::Object(object).to_string();
            assert_eq!(
                parse_meme_idea(&raw).unwrap_err(),
                ContractError::MissingField(field),
                "field {field}"
            );
        }
    }

    #[test]
    fn null_counts_as_missing() {
        let raw = r#"{"is_memable": true, "top_text": null, "bottom_text": "b", "search_query": "q"}"#;
        assert_eq!(
            parse_meme_idea(raw).unwrap_err(),
            ContractError::MissingField("top_text")
        );
    }

    #[test]
    fn wrong_types_are_rejected() {
        let raw = r#"{"is_memable": "yes", "top_text": "t", "bottom_text": "b", "search_query": "q"}"#;
        assert!(matches!(
            parse_meme_idea(raw).unwrap_err(),
            ContractError::WrongType { field: "is_memable", .. }
        ));
    }

    #[test]
    fn not_memable_still_parses() {
        let raw = r#"{"is_memable": false, "top_text": "", "bottom_text": "", "search_query": ""}"#;
        let idea = parse_meme_idea(raw).expect("well-formed");
        assert!(!idea.is_memable);
    }

    #[test]
    fn schema_lists_all_required_fields() {
        let schema = idea_schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(required, vec!["is_memable", "top_text", "bottom_text", "search_query"]);
    }
}
