mod auth_commands;
mod chat;

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use crmlink_config::Settings;

#[derive(Parser)]
#[command(name = "crmlink", about = "CRMLink — conversational agent for Zoho CRM")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session with the CRM agent.
    Chat,
    /// OAuth authentication management.
    Auth {
        #[command(subcommand)]
        action: auth_commands::AuthAction,
    },
    /// Start the web gateway.
    Gateway {
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "crmlink starting");

    let settings = Settings::from_env();

    match cli.command {
        Commands::Chat => chat::run_chat(settings).await,
        Commands::Auth { action } => auth_commands::handle_auth(settings, action).await,
        Commands::Gateway { bind, port } => {
            crmlink_gateway::start_gateway(settings, &bind, port).await
        },
    }
}
