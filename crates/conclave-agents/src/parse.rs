//! Model response parsing into typed replies.
//!
//! The model returns raw text that should be JSON. Several recovery
//! strategies run before giving up: direct parse, markdown code block
//! extraction, trailing-comma stripping, and both combined. A response that
//! defeats all of them is a parse error the decision engine converts into a
//! heuristic fallback.

use serde_json::Value;

use crate::error::AgentError;

/// A validated decision extracted from a model response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedReply {
    /// Nominate these seats for the mission.
    Team {
        /// Nominated seat indexes.
        members: Vec<u8>,
    },
    /// Vote on the locked proposal.
    Vote {
        /// Approve when true, reject when false.
        approve: bool,
    },
    /// Play a mission card.
    Mission {
        /// Play fail when true, success when false.
        fail: bool,
    },
    /// Say something at the table.
    Chat {
        /// The message text.
        text: String,
    },
    /// Yield the speaking turn without a message.
    Pass,
    /// Name the assassination target.
    Assassinate {
        /// The targeted seat index.
        target: u8,
    },
}

/// Parse a raw model response through the recovery strategies.
///
/// # Errors
///
/// Returns [`AgentError::Parse`] when no strategy yields a JSON object with
/// a known `action` discriminator and well-formed fields.
pub fn parse_reply(raw: &str) -> Result<ParsedReply, AgentError> {
    let trimmed = raw.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return convert(&value);
    }

    if let Some(inner) = extract_json_from_codeblock(trimmed)
        && let Ok(value) = serde_json::from_str::<Value>(inner)
    {
        return convert(&value);
    }

    let cleaned = strip_trailing_commas(trimmed);
    if let Ok(value) = serde_json::from_str::<Value>(&cleaned) {
        return convert(&value);
    }

    if let Some(inner) = extract_json_from_codeblock(trimmed) {
        let cleaned_inner = strip_trailing_commas(inner);
        if let Ok(value) = serde_json::from_str::<Value>(&cleaned_inner) {
            return convert(&value);
        }
    }

    Err(AgentError::Parse(format!(
        "all parse strategies failed for: {trimmed}"
    )))
}

/// Convert a parsed JSON value into a typed reply.
fn convert(value: &Value) -> Result<ParsedReply, AgentError> {
    let action = value
        .get("action")
        .and_then(Value::as_str)
        .ok_or_else(|| AgentError::Parse("missing 'action' field".to_owned()))?;

    match action.to_lowercase().replace('_', "-").as_str() {
        "propose-team" | "team" | "propose" => {
            let members = value
                .get("members")
                .and_then(Value::as_array)
                .ok_or_else(|| AgentError::Parse("team reply missing 'members'".to_owned()))?
                .iter()
                .map(|m| {
                    m.as_u64()
                        .and_then(|n| u8::try_from(n).ok())
                        .ok_or_else(|| AgentError::Parse(format!("invalid member seat: {m}")))
                })
                .collect::<Result<Vec<u8>, AgentError>>()?;
            Ok(ParsedReply::Team { members })
        }
        "vote" => {
            let vote = value
                .get("vote")
                .and_then(Value::as_str)
                .ok_or_else(|| AgentError::Parse("vote reply missing 'vote'".to_owned()))?;
            match vote.to_lowercase().as_str() {
                "approve" | "accept" | "yes" => Ok(ParsedReply::Vote { approve: true }),
                "reject" | "refuse" | "no" => Ok(ParsedReply::Vote { approve: false }),
                other => Err(AgentError::Parse(format!("unknown vote value: {other}"))),
            }
        }
        "mission" | "play" => {
            let play = value
                .get("play")
                .and_then(Value::as_str)
                .ok_or_else(|| AgentError::Parse("mission reply missing 'play'".to_owned()))?;
            match play.to_lowercase().as_str() {
                "success" | "succeed" | "pass" => Ok(ParsedReply::Mission { fail: false }),
                "fail" | "sabotage" => Ok(ParsedReply::Mission { fail: true }),
                other => Err(AgentError::Parse(format!("unknown play value: {other}"))),
            }
        }
        "chat" | "say" | "speak" => {
            let text = value
                .get("text")
                .and_then(Value::as_str)
                .map(str::trim)
                .unwrap_or_default();
            if text.is_empty() {
                Ok(ParsedReply::Pass)
            } else {
                Ok(ParsedReply::Chat {
                    text: text.to_owned(),
                })
            }
        }
        "pass" | "silence" | "none" => Ok(ParsedReply::Pass),
        "assassinate" | "assassination" => {
            let target = value
                .get("target")
                .and_then(Value::as_u64)
                .and_then(|n| u8::try_from(n).ok())
                .ok_or_else(|| {
                    AgentError::Parse("assassinate reply missing 'target'".to_owned())
                })?;
            Ok(ParsedReply::Assassinate { target })
        }
        other => Err(AgentError::Parse(format!("unknown action: {other}"))),
    }
}

/// Extract the body of a markdown code block, if present.
fn extract_json_from_codeblock(text: &str) -> Option<&str> {
    let start = text
        .find("```json")
        .map(|i| after_fence(text, i, 7))
        .or_else(|| text.find("```").map(|i| after_fence(text, i, 3)))?;

    let remaining = text.get(start..)?;
    let end = remaining.find("```")?;
    remaining.get(..end).map(str::trim)
}

/// Index of the first content character after a code fence at `at`.
fn after_fence(text: &str, at: usize, fence_len: usize) -> usize {
    let after_tag = at.checked_add(fence_len).unwrap_or(at);
    text.get(after_tag..)
        .and_then(|s| s.find('\n'))
        .and_then(|nl| after_tag.checked_add(nl))
        .and_then(|pos| pos.checked_add(1))
        .unwrap_or(after_tag)
}

/// Strip trailing commas before closing braces and brackets.
fn strip_trailing_commas(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();

    let mut i = 0;
    while i < len {
        let c = chars.get(i).copied().unwrap_or(' ');
        if c == ',' {
            let mut j = i.checked_add(1).unwrap_or(i);
            while j < len && chars.get(j).copied().unwrap_or(' ').is_whitespace() {
                j = j.checked_add(1).unwrap_or(j);
            }
            let next = chars.get(j).copied().unwrap_or(' ');
            if next == '}' || next == ']' {
                i = i.checked_add(1).unwrap_or(len);
                continue;
            }
        }
        result.push(c);
        i = i.checked_add(1).unwrap_or(len);
    }

    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parse_team() {
        let reply = parse_reply(r#"{"action": "propose-team", "members": [0, 2, 4]}"#).unwrap();
        assert_eq!(
            reply,
            ParsedReply::Team {
                members: vec![0, 2, 4]
            }
        );
    }

    #[test]
    fn parse_vote_synonyms() {
        let approve = parse_reply(r#"{"action": "vote", "vote": "Approve"}"#).unwrap();
        assert_eq!(approve, ParsedReply::Vote { approve: true });
        let reject = parse_reply(r#"{"action": "vote", "vote": "no"}"#).unwrap();
        assert_eq!(reject, ParsedReply::Vote { approve: false });
    }

    #[test]
    fn parse_mission_play() {
        let success = parse_reply(r#"{"action": "mission", "play": "success"}"#).unwrap();
        assert_eq!(success, ParsedReply::Mission { fail: false });
        let fail = parse_reply(r#"{"action": "mission", "play": "FAIL"}"#).unwrap();
        assert_eq!(fail, ParsedReply::Mission { fail: true });
    }

    #[test]
    fn parse_chat_and_empty_chat() {
        let chat = parse_reply(r#"{"action": "chat", "text": "seat 2 is lying"}"#).unwrap();
        assert_eq!(
            chat,
            ParsedReply::Chat {
                text: "seat 2 is lying".to_owned()
            }
        );
        let silent = parse_reply(r#"{"action": "chat", "text": "  "}"#).unwrap();
        assert_eq!(silent, ParsedReply::Pass);
    }

    #[test]
    fn parse_assassinate() {
        let reply = parse_reply(r#"{"action": "assassinate", "target": 1}"#).unwrap();
        assert_eq!(reply, ParsedReply::Assassinate { target: 1 });
    }

    #[test]
    fn parse_from_codeblock() {
        let raw = "Here is my decision:\n\n```json\n{\"action\": \"pass\"}\n```\n\nDone.";
        assert_eq!(parse_reply(raw).unwrap(), ParsedReply::Pass);
    }

    #[test]
    fn parse_trailing_comma() {
        let raw = r#"{"action": "vote", "vote": "approve",}"#;
        assert_eq!(
            parse_reply(raw).unwrap(),
            ParsedReply::Vote { approve: true }
        );
    }

    #[test]
    fn parse_snake_case_action() {
        let raw = r#"{"action": "propose_team", "members": [1, 3]}"#;
        assert_eq!(
            parse_reply(raw).unwrap(),
            ParsedReply::Team {
                members: vec![1, 3]
            }
        );
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(parse_reply("I think I will approve this team.").is_err());
        assert!(parse_reply("").is_err());
        assert!(parse_reply(r#"{"action": "teleport"}"#).is_err());
        assert!(parse_reply(r#"{"action": "vote", "vote": "maybe"}"#).is_err());
    }

    #[test]
    fn out_of_range_seat_is_a_parse_error() {
        assert!(parse_reply(r#"{"action": "propose-team", "members": [0, 999]}"#).is_err());
    }
}
