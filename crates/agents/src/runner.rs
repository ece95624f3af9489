use std::sync::Arc;

use {
    anyhow::{Result, bail},
    tracing::{debug, info, warn},
};

use crate::{
    model::{CompletionResponse, LlmProvider},
    tool_registry::ToolRegistry,
};

/// Maximum number of tool-call loop iterations before giving up.
const MAX_ITERATIONS: usize = 25;

/// System prompt for the CRM agent run.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a CRM assistant. Use the available tools to \
    search, create, and update leads, contacts, and deals on the user's behalf. Report what you \
    did in plain language.";

/// Result of running the agent loop.
#[derive(Debug)]
pub struct AgentRunResult {
    pub text: String,
    pub iterations: usize,
    pub tool_calls_made: usize,
}

/// Callback for surfacing progress out of the runner.
pub type OnEvent = Box<dyn Fn(RunnerEvent) + Send + Sync>;

/// Events emitted during the agent run.
#[derive(Debug, Clone)]
pub enum RunnerEvent {
    /// LLM is processing (show a "thinking" indicator).
    Thinking,
    /// LLM finished thinking (hide the indicator).
    ThinkingDone,
    ToolCallStart { id: String, name: String },
    ToolCallEnd { id: String, name: String, success: bool },
}

fn emit(on_event: Option<&OnEvent>, event: RunnerEvent) {
    if let Some(cb) = on_event {
        cb(event);
    }
}

/// Run the agent loop: send messages to the LLM, execute tool calls, repeat
/// until the model answers with plain text.
pub async fn run_agent_loop(
    provider: Arc<dyn LlmProvider>,
    tools: &ToolRegistry,
    system_prompt: &str,
    user_message: &str,
    on_event: Option<&OnEvent>,
) -> Result<AgentRunResult> {
    let tool_schemas = tools.list_schemas();

    let mut messages: Vec<serde_json::Value> = vec![
        serde_json::json!({"role": "system", "content": system_prompt}),
        serde_json::json!({"role": "user", "content": user_message}),
    ];

    let mut iterations = 0;
    let mut total_tool_calls = 0;

    loop {
        iterations += 1;
        if iterations > MAX_ITERATIONS {
            warn!("agent loop exceeded max iterations ({MAX_ITERATIONS})");
            bail!("agent loop exceeded max iterations");
        }

        debug!(iteration = iterations, "calling LLM");
        emit(on_event, RunnerEvent::Thinking);
        let response: CompletionResponse = provider.complete(&messages, &tool_schemas).await?;
        emit(on_event, RunnerEvent::ThinkingDone);

        // No tool calls: the text response is the final answer.
        if response.tool_calls.is_empty() {
            let text = response.text.unwrap_or_default();
            info!(iterations, tool_calls = total_tool_calls, "agent loop complete");
            return Ok(AgentRunResult {
                text,
                iterations,
                tool_calls_made: total_tool_calls,
            });
        }

        // Record the assistant turn, tool calls included.
        let tool_calls_json: Vec<serde_json::Value> = response
            .tool_calls
            .iter()
            .map(|tc| {
                serde_json::json!({
                    "id": tc.id,
                    "name": tc.name,
                    "arguments": tc.arguments,
                })
            })
            .collect();
        messages.push(serde_json::json!({
            "role": "assistant",
            "content": response.text,
            "tool_calls": tool_calls_json,
        }));

        // Execute each tool call and feed the result back.
        for tc in &response.tool_calls {
            total_tool_calls += 1;
            emit(on_event, RunnerEvent::ToolCallStart {
                id: tc.id.clone(),
                name: tc.name.clone(),
            });

            let (result, success) = if let Some(tool) = tools.get(&tc.name) {
                match tool.execute(tc.arguments.clone()).await {
                    Ok(val) => (serde_json::json!({"result": val}), true),
                    Err(e) => {
                        warn!(tool = %tc.name, error = %e, "tool execution failed");
                        (serde_json::json!({"error": e.to_string()}), false)
                    },
                }
            } else {
                warn!(tool = %tc.name, "unknown tool");
                (
                    serde_json::json!({"error": format!("unknown tool: {}", tc.name)}),
                    false,
                )
            };

            emit(on_event, RunnerEvent::ToolCallEnd {
                id: tc.id.clone(),
                name: tc.name.clone(),
                success,
            });

            messages.push(serde_json::json!({
                "role": "tool",
                "tool_call_id": tc.id,
                "name": tc.name,
                "content": result,
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::model::{ToolCall, Usage},
        async_trait::async_trait,
    };

    /// Mock provider that returns text on the first call.
    struct MockProvider {
        response_text: String,
    }

    #[async_trait]
    impl LlmProvider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        fn id(&self) -> &str {
            "mock-model"
        }

        async fn complete(
            &self,
            _messages: &[serde_json::Value],
            _tools: &[serde_json::Value],
        ) -> Result<CompletionResponse> {
            Ok(CompletionResponse {
                text: Some(self.response_text.clone()),
                tool_calls: vec![],
                usage: Usage::default(),
            })
        }
    }

    #[tokio::test]
    async fn simple_text_response_terminates_in_one_iteration() {
        let provider = Arc::new(MockProvider {
            response_text: "Hello!".into(),
        });
        let tools = ToolRegistry::new();
        let result = run_agent_loop(provider, &tools, DEFAULT_SYSTEM_PROMPT, "Hi", None)
            .await
            .unwrap();
        assert_eq!(result.text, "Hello!");
        assert_eq!(result.iterations, 1);
        assert_eq!(result.tool_calls_made, 0);
    }

    /// Mock provider that makes one tool call then returns text built from
    /// the tool result it was fed.
    struct ToolCallingProvider {
        call_count: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl LlmProvider for ToolCallingProvider {
        fn name(&self) -> &str {
            "mock"
        }

        fn id(&self) -> &str {
            "mock-model"
        }

        async fn complete(
            &self,
            messages: &[serde_json::Value],
            _tools: &[serde_json::Value],
        ) -> Result<CompletionResponse> {
            let count = self
                .call_count
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if count == 0 {
                Ok(CompletionResponse {
                    text: None,
                    tool_calls: vec![ToolCall {
                        id: "call_1".into(),
                        name: "echo_tool".into(),
                        arguments: serde_json::json!({"text": "hi"}),
                    }],
                    usage: Usage::default(),
                })
            } else {
                // The tool result must have been fed back by the runner.
                let last = messages.last().unwrap();
                assert_eq!(last["role"], "tool");
                assert_eq!(last["name"], "echo_tool");
                assert_eq!(last["content"]["result"]["text"], "hi");
                Ok(CompletionResponse {
                    text: Some("Done!".into()),
                    tool_calls: vec![],
                    usage: Usage::default(),
                })
            }
        }
    }

    /// Simple echo tool for testing.
    struct EchoTool;

    #[async_trait]
    impl crate::tool_registry::AgentTool for EchoTool {
        fn name(&self) -> &str {
            "echo_tool"
        }

        fn description(&self) -> &str {
            "Echoes input"
        }

        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {"text": {"type": "string"}}})
        }

        async fn execute(&self, params: serde_json::Value) -> Result<serde_json::Value> {
            Ok(params)
        }
    }

    #[tokio::test]
    async fn tool_call_is_executed_and_fed_back() {
        let provider = Arc::new(ToolCallingProvider {
            call_count: std::sync::atomic::AtomicUsize::new(0),
        });
        let mut tools = ToolRegistry::new();
        tools.register(Box::new(EchoTool));

        let result = run_agent_loop(
            provider,
            &tools,
            DEFAULT_SYSTEM_PROMPT,
            "Use the tool",
            None,
        )
        .await
        .unwrap();

        assert_eq!(result.text, "Done!");
        assert_eq!(result.iterations, 2);
        assert_eq!(result.tool_calls_made, 1);
    }

    /// Provider that always asks for an unknown tool.
    struct LoopingProvider;

    #[async_trait]
    impl LlmProvider for LoopingProvider {
        fn name(&self) -> &str {
            "mock"
        }

        fn id(&self) -> &str {
            "mock-model"
        }

        async fn complete(
            &self,
            _messages: &[serde_json::Value],
            _tools: &[serde_json::Value],
        ) -> Result<CompletionResponse> {
            Ok(CompletionResponse {
                text: None,
                tool_calls: vec![ToolCall {
                    id: "call_x".into(),
                    name: "missing_tool".into(),
                    arguments: serde_json::json!({}),
                }],
                usage: Usage::default(),
            })
        }
    }

    #[tokio::test]
    async fn runaway_loop_is_bounded() {
        let provider = Arc::new(LoopingProvider);
        let tools = ToolRegistry::new();
        let err = run_agent_loop(provider, &tools, DEFAULT_SYSTEM_PROMPT, "loop", None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("max iterations"));
    }
}
