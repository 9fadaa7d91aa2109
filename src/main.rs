mod agents;
mod config;
mod error;
mod llm_client;
mod orchestrator;
mod registry;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use agents::Reply;
use anyhow::Context;
use clap::{Parser, Subcommand};
use config::AppConfig;
use error::CoordinatorError;
use llm_client::{build_provider_from_env, EchoProvider, SharedChatProvider};
use orchestrator::Coordinator;
use registry::Registry;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    name = "foundry-agents",
    about = "Route nutrition and meal-planning questions to specialised chat agents"
)]
struct Cli {
    /// Optional one-shot prompt; if omitted the CLI enters interactive mode.
    #[arg(short, long)]
    prompt: Option<String>,

    /// Path of the agent registry file (defaults to AGENTS_REGISTRY_PATH or agents_registry.json).
    #[arg(long)]
    registry: Option<PathBuf>,

    /// Use the offline echo provider instead of a chat-completion backend.
    #[arg(long, default_value_t = false)]
    offline: bool,

    /// Per-agent call timeout in milliseconds (defaults to AGENT_TIMEOUT_MS or 60000).
    #[arg(long)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the agents recorded in the registry without contacting the provider.
    Agents,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();

    let mut config = AppConfig::from_env().context("Invalid configuration")?;
    if let Some(path) = cli.registry.clone() {
        config.registry_path = path;
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.agent_timeout = Duration::from_millis(timeout_ms.max(1));
    }

    if let Some(Commands::Agents) = cli.command {
        return list_agents(&config);
    }

    let provider: SharedChatProvider = if cli.offline {
        EchoProvider::shared()
    } else {
        build_provider_from_env(false).context("Chat provider initialization failed")?
    };

    let mut coordinator = Coordinator::new(config, provider);
    coordinator
        .start()
        .await
        .context("Multi-agent system failed to start")?;

    if let Some(prompt) = cli.prompt {
        run_single(&coordinator, &prompt).await;
        return Ok(());
    }

    run_repl(&coordinator).await
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .try_init();
}

fn list_agents(config: &AppConfig) -> anyhow::Result<()> {
    let registry = Registry::load(&config.registry_path)?;
    if registry.is_empty() {
        println!("No agents registered at {}", registry.path().display());
        return Ok(());
    }

    println!(
        "{} agents registered at {}:",
        registry.len(),
        registry.path().display()
    );
    for record in registry.records() {
        println!(
            "- {} [{}] created {} id={}",
            record.name,
            record.role,
            record.created_at.to_rfc3339(),
            record.external_id.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

fn render_reply(reply: &Reply) -> String {
    if reply.is_degraded() {
        format!("\n{} (unavailable):\n{}\n", reply.agent, reply.text.trim())
    } else {
        format!("\n{}:\n{}\n", reply.agent, reply.text.trim())
    }
}

fn print_outcome(outcome: Result<Vec<Reply>, CoordinatorError>) {
    match outcome {
        Ok(replies) => {
            for reply in &replies {
                println!("{}", render_reply(reply));
            }
        }
        Err(err) => {
            error!(?err, "Query failed");
            println!("\nError: {err}\n");
        }
    }
}

async fn run_single(coordinator: &Coordinator, prompt: &str) {
    print_outcome(coordinator.handle(prompt).await);
}

fn is_exit_command(input: &str) -> bool {
    input.eq_ignore_ascii_case("quit") || input.eq_ignore_ascii_case("exit")
}

async fn run_repl(coordinator: &Coordinator) -> anyhow::Result<()> {
    println!("Nutrition agents ready. Ask a question, type 'both' to ask every agent, or 'exit' to quit.");
    for agent in coordinator.agents() {
        println!(
            "  - {} ({})",
            agent.name(),
            agent.record().external_id.as_deref().unwrap_or("local")
        );
    }
    let records = coordinator.registry_snapshot().await;
    println!(
        "  unmatched questions go to {}; registry: {} ({} agents)\n",
        coordinator.classifier().default_agent(),
        coordinator.registry_path().display(),
        records.len()
    );

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("You > ");
        io::stdout().flush()?;

        let Some(line) = lines.next().transpose()? else {
            break;
        };
        let trimmed = line.trim();

        if is_exit_command(trimmed) {
            info!("User exited CLI");
            break;
        }

        if trimmed.is_empty() {
            continue;
        }

        if trimmed.eq_ignore_ascii_case("both") {
            print!("Question for both agents > ");
            io::stdout().flush()?;
            let Some(question) = lines.next().transpose()? else {
                break;
            };
            let question = question.trim();
            if !question.is_empty() {
                let decision = coordinator.classifier().everyone();
                print_outcome(coordinator.dispatch(question, &decision).await);
            }
            continue;
        }

        run_single(coordinator, trimmed).await;
    }

    Ok(())
}
