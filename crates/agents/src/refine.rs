//! Pre-agent prompt refinement: turn raw user input into a crisp instruction
//! before it reaches the tool-calling loop.

use crate::model::LlmProvider;

const REFINE_INSTRUCTIONS: &str = "You are an expert at translating user requests into clear, \
    actionable instructions for an AI agent that manages a CRM. The agent has tools to search, \
    create, and update leads, contacts, and deals.\n\n\
    Convert the user's input into a precise, step-by-step prompt for the agent. \
    If the user input is already clear, just repeat it. \
    Do not add any preamble or explanation, just return the refined prompt.";

/// Refine raw input. Falls back to the input verbatim when the model returns
/// no text.
pub async fn refine_prompt(provider: &dyn LlmProvider, user_input: &str) -> anyhow::Result<String> {
    let messages = vec![
        serde_json::json!({"role": "system", "content": REFINE_INSTRUCTIONS}),
        serde_json::json!({"role": "user", "content": user_input}),
    ];

    let response = provider.complete(&messages, &[]).await?;
    Ok(response
        .text
        .map_or_else(|| user_input.to_string(), |t| t.trim().to_string()))
}
