//! Interactive chat REPL against the CRM agent.

use std::{io::Write, sync::Arc};

use anyhow::{Context, Result};

use {
    crmlink_agents::{
        GeminiProvider, LlmProvider, OnEvent, RunnerEvent, ToolRegistry,
        mcp_tools::register_mcp_tools,
        refine_prompt,
        runner::{DEFAULT_SYSTEM_PROMPT, run_agent_loop},
    },
    crmlink_config::Settings,
    crmlink_mcp::McpClient,
    crmlink_oauth::TokenManager,
};

pub async fn run_chat(settings: Settings) -> Result<()> {
    settings.validate()?;

    // Bearer auth is best-effort: without OAuth credentials (or with a token
    // fetch failure) the agent still runs, and the MCP endpoint decides
    // whether to accept unauthenticated calls.
    let bearer = match settings.oauth_config() {
        None => None,
        Some(config) => {
            let mut manager = TokenManager::new(config);
            match manager.access_token().await {
                Ok(token) => Some(token),
                Err(e) => {
                    eprintln!("Warning: could not get access token: {e}");
                    eprintln!("Continuing without bearer token authentication...");
                    None
                },
            }
        },
    };

    let api_key = settings
        .google_api_key
        .clone()
        .context("GOOGLE_API_KEY is required")?;
    let provider: Arc<dyn LlmProvider> = Arc::new(GeminiProvider::new(api_key));

    let mcp_url = settings.mcp_url.clone().context("ZOHO_MCP_URL is required")?;
    let mut client = McpClient::connect("zoho_crm", &mcp_url, bearer).await?;
    let tool_count = client.list_tools().await?.len();
    let client = Arc::new(client);

    let mut tools = ToolRegistry::new();
    register_mcp_tools(&mut tools, &client);

    println!("Zoho CRM Agent Ready! ({tool_count} tools; type 'exit' to quit)");
    println!("{}", "-".repeat(50));

    let on_event: OnEvent = Box::new(|event| match event {
        RunnerEvent::ToolCallStart { name, .. } => println!("  -> calling {name}"),
        RunnerEvent::ToolCallEnd { name, success, .. } => {
            println!("  <- {name} {}", if success { "ok" } else { "failed" });
        },
        _ => {},
    });

    let stdin = std::io::stdin();
    loop {
        print!("\nYou: ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            // EOF
            println!("Goodbye!");
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            println!("Goodbye!");
            break;
        }

        println!("Processing input...");
        let refined = match refine_prompt(provider.as_ref(), input).await {
            Ok(prompt) => prompt,
            Err(e) => {
                eprintln!("Error refining prompt: {e}");
                continue;
            },
        };
        println!("Refined Prompt: {refined}");

        println!("\n--- Agent Thoughts ---");
        match run_agent_loop(
            Arc::clone(&provider),
            &tools,
            DEFAULT_SYSTEM_PROMPT,
            &refined,
            Some(&on_event),
        )
        .await
        {
            Ok(result) => {
                println!("\n--- Conversation Complete ---");
                println!("{}", result.text);
            },
            Err(e) => {
                eprintln!("Error during conversation: {e}");
                eprintln!("The agent encountered an error but is still running. Please try again.");
            },
        }
    }

    Ok(())
}
