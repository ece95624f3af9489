pub mod gemini;
pub mod mcp_tools;
pub mod model;
pub mod refine;
pub mod runner;
pub mod tool_registry;

pub use {
    gemini::GeminiProvider,
    model::{CompletionResponse, LlmProvider, ToolCall, Usage},
    refine::refine_prompt,
    runner::{AgentRunResult, DEFAULT_SYSTEM_PROMPT, OnEvent, RunnerEvent, run_agent_loop},
    tool_registry::{AgentTool, ToolRegistry},
};
