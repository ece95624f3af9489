//! Bridges tools advertised by an MCP server into the agent's registry.
//!
//! The CRM tool surface is introspected dynamically; nothing here knows what
//! the tools do.

use std::sync::Arc;

use {anyhow::Result, async_trait::async_trait};

use crmlink_mcp::{McpClient, types::McpToolDef};

use crate::tool_registry::{AgentTool, ToolRegistry};

/// A remote MCP tool exposed to the agent loop.
pub struct McpTool {
    def: McpToolDef,
    client: Arc<McpClient>,
}

#[async_trait]
impl AgentTool for McpTool {
    fn name(&self) -> &str {
        &self.def.name
    }

    fn description(&self) -> &str {
        &self.def.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        self.def.input_schema.clone()
    }

    async fn execute(&self, params: serde_json::Value) -> Result<serde_json::Value> {
        let result = self.client.call_tool(&self.def.name, params).await?;
        if result.is_error {
            anyhow::bail!("{}", result.text());
        }
        Ok(serde_json::Value::String(result.text()))
    }
}

/// Register every tool the connected client has listed.
pub fn register_mcp_tools(registry: &mut ToolRegistry, client: &Arc<McpClient>) {
    for def in client.tools() {
        registry.register(Box::new(McpTool {
            def: def.clone(),
            client: Arc::clone(client),
        }));
    }
}
