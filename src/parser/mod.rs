//! Response parser cascade: turns raw model output into a [`ParsedOutput`].
//!
//! Grounded on `proteus/src/agent/utils/llm_response_parser.py`, which tries,
//! in order: (1) the whole response as JSON, (2) a set of `Thought:` /
//! `Action:` / `Action Input:` / `Answer:` regexes plus the bracket form
//! `Action: tool[k=v]`, (3) handing the raw text to the model with a
//! "reformat this as JSON" repair prompt, and (4) giving up and treating the
//! entire response as a final answer. Every stage after (1) marks its output
//! `synthetic = true` so callers can tell a clean parse from a rescued one
//! (see SPEC_FULL.md's Open Question 1 resolution).

pub mod bracket;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ParseError;
use crate::model::ModelClient;

/// A tool invocation extracted from model output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub tool_input: Value,
}

/// The result of parsing one round of model output.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedOutput {
    Action {
        thought: Option<String>,
        call: ToolCall,
        synthetic: bool,
    },
    Finish {
        thought: Option<String>,
        answer: String,
        synthetic: bool,
    },
}

impl ParsedOutput {
    pub fn is_synthetic(&self) -> bool {
        match self {
            ParsedOutput::Action { synthetic, .. } => *synthetic,
            ParsedOutput::Finish { synthetic, .. } => *synthetic,
        }
    }
}

static THOUGHT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)Thought:\s*(.*?)(?=\n(?:Action|Answer):|$)").unwrap()
});
static ACTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)Action:\s*(.*?)(?=\nAction Input:|$)").unwrap());
static ACTION_INPUT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)Action Input:\s*(.*?)(?=\n(?:Thought|Action|Answer):|$)").unwrap()
});
static ANSWER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)Answer:\s*(.*?)(?=\n(?:Thought|Action):|$)").unwrap());
static BRACKET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)Action:\s*([^\[\s]+)\[(.*?)\]").unwrap());

/// Parses `text`, the model's raw completion for one ReAct iteration.
///
/// `repair` is called only when stages 1-2 both fail to find a well-formed
/// action or answer; it's `None` in tests that want to pin cascade behavior
/// without a model round trip.
pub async fn parse(
    text: &str,
    repair: Option<&dyn ModelClient>,
) -> Result<ParsedOutput, ParseError> {
    let trimmed = text.trim();

    if let Some(parsed) = parse_json_stage(trimmed) {
        return Ok(parsed);
    }

    // The regex stage accepts either an ASCII or a fullwidth colon after each
    // keyword (`Thought:` / `Thought：`), since some models emit CJK-width
    // punctuation.
    let normalized = trimmed.replace('：', ":");
    if let Some(parsed) = parse_regex_stage(&normalized) {
        return Ok(parsed);
    }

    if let Some(model) = repair {
        if let Some(parsed) = parse_repair_stage(trimmed, model).await {
            return Ok(parsed);
        }
    }

    Ok(ParsedOutput::Finish {
        thought: None,
        answer: trimmed.to_string(),
        synthetic: true,
    })
}

/// Stage 1 of the cascade: the literal shape spec.md section 4.4 describes,
/// `{thinking: string, tool: {name: string, params: object|string}}`. If
/// `tool.params` is itself a JSON-encoded string it's parsed once more, per
/// the spec; a `final_answer` call is not special-cased here — it reaches
/// [`crate::agent::core::AgentCore::handle_parsed`] as an ordinary
/// [`ParsedOutput::Action`] like any other tool, which is what already
/// extracts its answer text.
fn parse_json_stage(text: &str) -> Option<ParsedOutput> {
    let value: Value = serde_json::from_str(text).ok()?;
    let obj = value.as_object()?;
    let tool_obj = obj.get("tool")?.as_object()?;

    let thought = obj.get("thinking").and_then(|v| v.as_str()).map(String::from);
    let name = tool_obj.get("name").and_then(|v| v.as_str())?.to_string();
    let params = match tool_obj.get("params") {
        Some(Value::String(s)) => {
            serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.clone()))
        }
        Some(other) => other.clone(),
        None => Value::Null,
    };

    Some(ParsedOutput::Action {
        thought,
        call: ToolCall {
            tool: name,
            tool_input: params,
        },
        synthetic: false,
    })
}

fn parse_regex_stage(text: &str) -> Option<ParsedOutput> {
    let thought = THOUGHT_RE
        .captures(text)
        .map(|c| c[1].trim().to_string())
        .filter(|s| !s.is_empty());

    if let Some(answer) = ANSWER_RE.captures(text).map(|c| c[1].trim().to_string()) {
        if !answer.is_empty() {
            return Some(ParsedOutput::Finish {
                thought,
                answer,
                synthetic: true,
            });
        }
    }

    if let Some(bracket) = BRACKET_RE.captures(text) {
        let tool = bracket[1].trim().to_string();
        let tool_input = bracket::parse_kv_args(&bracket[2]);
        return Some(ParsedOutput::Action {
            thought,
            call: ToolCall { tool, tool_input },
            synthetic: true,
        });
    }

    let tool = ACTION_RE.captures(text).map(|c| c[1].trim().to_string())?;
    if tool.is_empty() {
        return None;
    }
    let raw_input = ACTION_INPUT_RE
        .captures(text)
        .map(|c| c[1].trim().to_string())
        .unwrap_or_default();

    let tool_input = serde_json::from_str(&raw_input)
        .unwrap_or_else(|_| Value::String(raw_input));

    Some(ParsedOutput::Action {
        thought,
        call: ToolCall { tool, tool_input },
        synthetic: true,
    })
}

const REPAIR_PROMPT: &str = "The following text should describe a tool call, but it \
doesn't parse cleanly. Respond with ONLY a JSON object of the shape \
{\"thinking\": \"...\", \"tool\": {\"name\": \"tool_name\", \"params\": {...}}}. \
To give a final answer, call the final_answer tool with params {\"answer\": \"...\"}. \
Text:\n\n";

async fn parse_repair_stage(text: &str, model: &dyn ModelClient) -> Option<ParsedOutput> {
    let prompt = format!("{REPAIR_PROMPT}{text}");
    let messages = vec![crate::model::Message::user(prompt)];
    let (completion, _usage) = model.complete(&messages, None).await.ok()?;
    let mut parsed = parse_json_stage(completion.trim())?;
    mark_synthetic(&mut parsed);
    Some(parsed)
}

fn mark_synthetic(output: &mut ParsedOutput) {
    match output {
        ParsedOutput::Action { synthetic, .. } => *synthetic = true,
        ParsedOutput::Finish { synthetic, .. } => *synthetic = true,
    }
}

/// Indents every line of a Markdown-formatted observation by four spaces,
/// preserving heading/list/fence/table/blockquote structure, for display as
/// a nested block under a `Observation:` prefix.
pub fn format_observation_markdown(observation: &str) -> String {
    observation
        .lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("    {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn json_stage_parses_action() {
        let text = r#"{"thinking": "need to look this up", "tool": {"name": "search", "params": {"query": "rust"}}}"#;
        let parsed = parse(text, None).await.unwrap();
        match parsed {
            ParsedOutput::Action { call, synthetic, thought } => {
                assert_eq!(call.tool, "search");
                assert_eq!(thought.as_deref(), Some("need to look this up"));
                assert!(!synthetic);
            }
            _ => panic!("expected action"),
        }
    }

    #[tokio::test]
    async fn json_stage_parses_final_answer_as_an_action() {
        let text = r#"{"thinking": "done", "tool": {"name": "final_answer", "params": {"answer": "42"}}}"#;
        let parsed = parse(text, None).await.unwrap();
        match parsed {
            ParsedOutput::Action { call, synthetic, .. } => {
                assert_eq!(call.tool, "final_answer");
                assert_eq!(call.tool_input["answer"], "42");
                assert!(!synthetic);
            }
            _ => panic!("expected action"),
        }
    }

    #[tokio::test]
    async fn json_stage_reparses_string_encoded_params() {
        let text = r#"{"thinking": "ok", "tool": {"name": "search", "params": "{\"query\": \"rust\"}"}}"#;
        let parsed = parse(text, None).await.unwrap();
        match parsed {
            ParsedOutput::Action { call, .. } => {
                assert_eq!(call.tool_input["query"], "rust");
            }
            _ => panic!("expected action"),
        }
    }

    #[tokio::test]
    async fn regex_stage_parses_react_lines() {
        let text = "Thought: I should search\nAction: search\nAction Input: {\"query\": \"rust\"}";
        let parsed = parse(text, None).await.unwrap();
        match parsed {
            ParsedOutput::Action {
                thought,
                call,
                synthetic,
            } => {
                assert_eq!(thought.as_deref(), Some("I should search"));
                assert_eq!(call.tool, "search");
                assert!(synthetic);
            }
            _ => panic!("expected action"),
        }
    }

    #[tokio::test]
    async fn regex_stage_parses_answer_line() {
        let text = "Thought: done\nAnswer: the result is 42";
        let parsed = parse(text, None).await.unwrap();
        match parsed {
            ParsedOutput::Finish { answer, .. } => assert_eq!(answer, "the result is 42"),
            _ => panic!("expected finish"),
        }
    }

    #[tokio::test]
    async fn bracket_form_parses() {
        let text = "Action: search[query=\"rust async\", limit=5]";
        let parsed = parse(text, None).await.unwrap();
        match parsed {
            ParsedOutput::Action { call, .. } => {
                assert_eq!(call.tool, "search");
                assert_eq!(call.tool_input["query"], "rust async");
                assert_eq!(call.tool_input["limit"], 5);
            }
            _ => panic!("expected action"),
        }
    }

    #[tokio::test]
    async fn unparseable_text_falls_back_to_synthetic_answer() {
        let text = "I'm not sure what to do here.";
        let parsed = parse(text, None).await.unwrap();
        match parsed {
            ParsedOutput::Finish { answer, synthetic, .. } => {
                assert_eq!(answer, text);
                assert!(synthetic);
            }
            _ => panic!("expected finish"),
        }
    }

    #[tokio::test]
    async fn regex_stage_accepts_fullwidth_colon() {
        let text = "Thought：I should search\nAction：search\nAction Input：{\"query\": \"rust\"}";
        let parsed = parse(text, None).await.unwrap();
        match parsed {
            ParsedOutput::Action { thought, call, .. } => {
                assert_eq!(thought.as_deref(), Some("I should search"));
                assert_eq!(call.tool, "search");
            }
            _ => panic!("expected action"),
        }
    }

    #[test]
    fn markdown_observation_indents_every_line() {
        let observation = "# Heading\n\n- item one\n- item two";
        let formatted = format_observation_markdown(observation);
        assert_eq!(formatted, "    # Heading\n\n    - item one\n    - item two");
    }
}
