//! Tool descriptors and the registry an agent consults when executing an
//! action. A tool exposes a name, a description used in the prompt, a
//! parameter schema, and an async `invoke`.

pub mod builtin;
pub mod execution;
pub mod memory;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ToolError;

/// One parameter a tool accepts, as advertised to the model in the prompt.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub type_name: String,
    pub description: String,
    pub required: bool,
}

/// Static metadata about a tool, independent of any particular invocation.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: String,
    /// The short, one-line form shown in `tool_names`-style summaries.
    pub description: String,
    /// The formatted help text — `description` plus a parameter table and
    /// an output schema table — rendered into the `tools` prompt variable
    /// (spec.md section 3's tool descriptor data model, section 4.3's
    /// `tools` substitution). Build with [`render_full_description`] rather
    /// than hand-writing it.
    pub full_description: String,
    pub parameters: HashMap<String, ParamSpec>,
    /// Field name → description for the tool's result map.
    pub output_schema: HashMap<String, String>,
    /// Whether the tool should be offloaded to the cooperative worker pool
    /// rather than awaited inline — set for tools doing CPU-bound or
    /// blocking work.
    pub is_async: bool,
    pub max_retries: u32,
    pub retry_delay_secs: f64,
}

/// Renders a tool's `full_description`: `description` followed by a
/// `Parameters:` table and a `Returns:` table, each sorted by field name so
/// output is deterministic. Tools with no parameters or no documented
/// output fields simply omit that section.
pub fn render_full_description(
    description: &str,
    parameters: &HashMap<String, ParamSpec>,
    output_schema: &HashMap<String, String>,
) -> String {
    let mut text = description.to_string();

    if !parameters.is_empty() {
        let mut names: Vec<&String> = parameters.keys().collect();
        names.sort();
        text.push_str("\nParameters:");
        for name in names {
            let spec = &parameters[name];
            let required = if spec.required { "required" } else { "optional" };
            text.push_str(&format!(
                "\n- {name} ({}, {required}): {}",
                spec.type_name, spec.description
            ));
        }
    }

    if !output_schema.is_empty() {
        let mut names: Vec<&String> = output_schema.keys().collect();
        names.sort();
        text.push_str("\nReturns:");
        for name in names {
            text.push_str(&format!("\n- {name}: {}", output_schema[name]));
        }
    }

    text
}

/// The executable behavior behind a [`ToolDescriptor`].
#[async_trait]
pub trait Tool: Send + Sync {
    fn descriptor(&self) -> &ToolDescriptor;

    /// Runs the tool against `args` (already type-coerced by the parser) and
    /// returns its result as JSON. Tool-internal failures should be
    /// propagated as `Err` so [`execution::execute_tool`] can apply the
    /// retry policy from [`ToolDescriptor::max_retries`].
    async fn invoke(&self, args: Value) -> Result<Value, ToolError>;
}

/// The set of tools available to one agent.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        ToolRegistry {
            tools: HashMap::new(),
        }
    }

    /// Registers `tool`, failing if its name collides with one already
    /// present — tool names must be unique per agent.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.descriptor().name.clone();
        if self.tools.contains_key(&name) {
            return Err(ToolError::DuplicateName(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        let mut descs: Vec<ToolDescriptor> =
            self.tools.values().map(|t| t.descriptor().clone()).collect();
        descs.sort_by(|a, b| a.name.cmp(&b.name));
        descs
    }

    /// A cache key for this registry's tool set, stable under reordering —
    /// usable as a key into a tool-description-string cache.
    pub fn cache_key(&self) -> String {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names.join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::builtin::echo::EchoTool;

    #[test]
    fn register_rejects_duplicate_names() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool::new())).unwrap();
        let err = registry.register(Arc::new(EchoTool::new()));
        assert!(matches!(err, Err(ToolError::DuplicateName(_))));
    }

    #[test]
    fn cache_key_is_sorted_and_stable() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool::new())).unwrap();
        assert_eq!(registry.cache_key(), "echo");
    }

    #[test]
    fn render_full_description_includes_parameter_and_output_tables() {
        let mut parameters = HashMap::new();
        parameters.insert(
            "value".to_string(),
            ParamSpec {
                type_name: "string".to_string(),
                description: "value to echo back".to_string(),
                required: true,
            },
        );
        let mut output_schema = HashMap::new();
        output_schema.insert("value".to_string(), "the echoed value".to_string());

        let rendered = render_full_description("Echoes the given value back.", &parameters, &output_schema);
        assert!(rendered.contains("Parameters:"));
        assert!(rendered.contains("- value (string, required): value to echo back"));
        assert!(rendered.contains("Returns:"));
        assert!(rendered.contains("- value: the echoed value"));
    }

    #[test]
    fn render_full_description_omits_empty_sections() {
        let rendered = render_full_description("Does nothing.", &HashMap::new(), &HashMap::new());
        assert_eq!(rendered, "Does nothing.");
    }
}
