// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parsing of `StreamGenerate` response bodies.
//!
//! The body is a sequence of length-prefixed JSON lines behind an XSSI
//! guard. Line 3 holds `[["wrb.fr",null,"<json>"]]`, where the inner
//! string is itself a JSON array carrying the answer.

use aienvoy_core::EnvoyError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const ANSWER_LINE: usize = 3;

/// One drafted reply. Bard returns several and shows the first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub id: String,
    pub content: String,
}

/// A parsed Bard answer together with the ids needed to continue it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub content: String,
    pub conversation_id: String,
    pub response_id: String,
    pub choices: Vec<Choice>,
}

impl Answer {
    /// Id of the displayed choice, used when asking a follow-up.
    pub fn choice_id(&self) -> &str {
        self.choices.first().map(|c| c.id.as_str()).unwrap_or_default()
    }
}

fn unexpected(what: &str) -> EnvoyError {
    EnvoyError::provider(format!("unexpected Bard response: {what}"))
}

fn string_at<'a>(value: &'a Value, path: &[usize]) -> Option<&'a str> {
    path.iter()
        .try_fold(value, |v, &i| v.get(i))
        .and_then(Value::as_str)
}

/// Parses a full `StreamGenerate` body.
pub fn parse_body(body: &str) -> Result<Answer, EnvoyError> {
    let line = body
        .lines()
        .nth(ANSWER_LINE)
        .ok_or_else(|| unexpected("body has fewer than 4 lines"))?;
    parse_line(line)
}

/// Parses the `[["wrb.fr",null,"<json>"]]` envelope line.
pub fn parse_line(line: &str) -> Result<Answer, EnvoyError> {
    let envelope: Value = serde_json::from_str(line)
        .map_err(|e| EnvoyError::provider_from(format!("unexpected Bard response: {e}"), e))?;
    let inner = string_at(&envelope, &[0, 2])
        .ok_or_else(|| unexpected("answer envelope is empty, check the __Secure-1PSID cookie"))?;
    let data: Value = serde_json::from_str(inner)
        .map_err(|e| EnvoyError::provider_from(format!("unexpected Bard response: {e}"), e))?;

    let choices = data
        .get(4)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    Some(Choice {
                        id: string_at(item, &[0])?.to_string(),
                        content: string_at(item, &[1, 0])?.to_string(),
                    })
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    let content = choices
        .first()
        .map(|c| c.content.clone())
        .ok_or_else(|| unexpected("no answer choices"))?;

    Ok(Answer {
        content,
        conversation_id: string_at(&data, &[1, 0]).unwrap_or_default().to_string(),
        response_id: string_at(&data, &[1, 1]).unwrap_or_default().to_string(),
        choices,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn body(content: &str) -> String {
        let inner = json!([
            null,
            ["c_1", "r_1"],
            null,
            null,
            [["rc_1", [content]], ["rc_2", ["Another draft"]]]
        ]);
        let envelope = json!([["wrb.fr", null, inner.to_string()]]);
        format!(")]}}'\n\n512\n{envelope}\n25\n[[\"di\",71],[\"af.httprm\",70]]\n")
    }

    #[test]
    fn parses_answer_and_ids() {
        let answer = parse_body(&body("Hello from Bard")).unwrap();
        assert_eq!(answer.content, "Hello from Bard");
        assert_eq!(answer.conversation_id, "c_1");
        assert_eq!(answer.response_id, "r_1");
        assert_eq!(answer.choices.len(), 2);
        assert_eq!(answer.choice_id(), "rc_1");
    }

    #[test]
    fn short_body_is_an_error() {
        let err = parse_body(")]}'\n\n12\n").unwrap_err();
        assert!(err.to_string().contains("fewer than 4 lines"));
    }

    #[test]
    fn null_envelope_payload_is_an_error() {
        let err = parse_line(r#"[["wrb.fr",null,null]]"#).unwrap_err();
        assert!(err.to_string().contains("__Secure-1PSID"));
    }

    #[test]
    fn missing_choices_is_an_error() {
        let inner = json!([null, ["c", "r"]]).to_string();
        let line = json!([["wrb.fr", null, inner]]).to_string();
        assert!(parse_line(&line).is_err());
    }
}
