//! The `final_answer` tool: the canonical way a ReAct loop signals it's
//! done. Its presence in an action is what every default
//! `TerminationCondition::ToolName` list matches against.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::ToolError;
use crate::tools::{render_full_description, ParamSpec, Tool, ToolDescriptor};

pub struct FinalAnswerTool {
    descriptor: ToolDescriptor,
}

impl FinalAnswerTool {
    pub fn new() -> Self {
        let mut parameters = HashMap::new();
        parameters.insert(
            "answer".to_string(),
            ParamSpec {
                type_name: "string".to_string(),
                description: "the final answer to return to the caller".to_string(),
                required: true,
            },
        );
        let description = "Ends the loop and returns the given answer.".to_string();
        let mut output_schema = HashMap::new();
        output_schema.insert("answer".to_string(), "the answer text returned to the caller".to_string());
        let full_description = render_full_description(&description, &parameters, &output_schema);
        FinalAnswerTool {
            descriptor: ToolDescriptor {
                name: "final_answer".to_string(),
                description,
                full_description,
                parameters,
                output_schema,
                is_async: false,
                max_retries: 0,
                retry_delay_secs: 0.0,
            },
        }
    }
}

impl Default for FinalAnswerTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for FinalAnswerTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, args: Value) -> Result<Value, ToolError> {
        // The agent loop special-cases this tool's name before it ever calls
        // `invoke` (it terminates instead of executing), so this body only
        // runs if something calls it directly, e.g. from a test.
        Ok(args)
    }
}
