use async_trait::async_trait;

/// LLM provider abstraction. Completions are non-streaming: the agent loop
/// needs whole responses to dispatch tool calls.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Model identifier (e.g. "gemini-2.5-flash").
    fn id(&self) -> &str;

    /// Run one completion over the conversation so far. `tools` carries the
    /// schemas from [`crate::tool_registry::ToolRegistry::list_schemas`].
    async fn complete(
        &self,
        messages: &[serde_json::Value],
        tools: &[serde_json::Value],
    ) -> anyhow::Result<CompletionResponse>;
}

/// Response from an LLM completion call.
#[derive(Debug)]
pub struct CompletionResponse {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Usage,
}

#[derive(Debug, Clone)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone, Default)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}
