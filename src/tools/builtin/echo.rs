//! A minimal example tool: returns its input unchanged. Used in tests and as
//! a template for new tool authors.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::ToolError;
use crate::tools::{render_full_description, ParamSpec, Tool, ToolDescriptor};

pub struct EchoTool {
    descriptor: ToolDescriptor,
}

impl EchoTool {
    pub fn new() -> Self {
        let mut parameters = HashMap::new();
        parameters.insert(
            "value".to_string(),
            ParamSpec {
                type_name: "string".to_string(),
                description: "value to echo back".to_string(),
                required: true,
            },
        );
        let description = "Echoes the given value back.".to_string();
        let mut output_schema = HashMap::new();
        output_schema.insert("value".to_string(), "the same value that was passed in".to_string());
        let full_description = render_full_description(&description, &parameters, &output_schema);
        EchoTool {
            descriptor: ToolDescriptor {
                name: "echo".to_string(),
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

impl Default for EchoTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for EchoTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, args: Value) -> Result<Value, ToolError> {
        Ok(args)
    }
}
