//! Clawlink CLI
//!
//! Terminal front-end for a gateway session and the knowledge graph.

use std::time::Duration;

use anyhow::{bail, Context};
use backoff::backoff::Backoff;
use backoff::ExponentialBackoffBuilder;
use clap::{Parser, Subcommand};
use clawlink::config::{config_path, load_config, load_config_from_path, save_config, validate_config};
use clawlink::gateway::{ConnectionState, GatewaySession, SessionEvent};
use clawlink::kg::{AgentTask, Entity, EntityTypeFilter, KnowledgeGraphClient, TaskFilter};
use clawlink::{AppConfig, VERSION};
use console::style;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::{debug, warn};

#[derive(Parser)]
#[command(
    name = "clawlink",
    version = VERSION,
    about = "Clawlink - client for OpenClaw agent gateways",
    long_about = None
)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "CLAWLINK_JSON_LOGS")]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the agent over the gateway
    Chat {
        /// Reconnect attempts after a retryable connect failure
        #[arg(long, default_value_t = 0)]
        retry: u32,
    },

    /// Connect and report gateway status
    Status,

    /// Query the knowledge graph
    Kg {
        #[command(subcommand)]
        action: KgAction,
    },

    /// Inspect or edit the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum KgAction {
    /// Row counts
    Stats,
    /// List entities
    Entities {
        /// Filter: people, companies or projects
        #[arg(long = "type", short)]
        entity_type: Option<String>,
    },
    /// Show one entity
    Entity { name: String },
    /// List tasks
    Tasks {
        /// Filter: in_progress, pending or completed
        #[arg(long, short)]
        status: Option<String>,
    },
    /// Relationships of an entity
    Relationships { entity: String },
    /// Node and edge counts of the whole graph
    Graph,
    /// Search entities
    Search { query: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (tokens masked)
    Show,
    /// Print the config file path
    Path,
    /// Set a value in the config file
    Set { key: String, value: String },
    /// Validate the effective configuration
    Validate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("clawlink=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cli.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }

    match cli.command {
        Commands::Chat { retry } => chat(retry).await,
        Commands::Status => gateway_status().await,
        Commands::Kg { action } => knowledge_graph(action).await,
        Commands::Config { action } => manage_config(action),
    }
}

// ============================================================================
// Gateway
// ============================================================================

/// Connect, retrying retryable failures with exponential backoff
async fn connect_with_retry(session: &GatewaySession, retries: u32) -> clawlink::Result<()> {
    let mut policy = ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(500))
        .with_max_interval(Duration::from_secs(10))
        .with_max_elapsed_time(None)
        .build();

    let mut attempt = 0;
    loop {
        match session.connect().await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_retryable() && attempt < retries => {
                attempt += 1;
                let delay = policy.next_backoff().unwrap_or(Duration::from_secs(10));
                println!(
                    "   {} {} (retry {}/{} in {:.1}s)",
                    style("⚠").yellow(),
                    e,
                    attempt,
                    retries,
                    delay.as_secs_f64()
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

fn print_event(event: SessionEvent) {
    match event {
        // Optimistic messages carry the session key and were typed here
        SessionEvent::MessageAppended(message) if message.session_key.is_none() => {
            let who = if message.is_assistant() {
                style("Agent").magenta().bold()
            } else if message.is_user() {
                style("You").green().bold()
            } else {
                style(message.role.as_str()).dim()
            };
            println!("{}: {}", who, message.content);
        }
        SessionEvent::AgentNameChanged(name) => {
            println!("   {} Agent: {}", style("ℹ").blue(), style(name).cyan());
        }
        SessionEvent::ConnectionChanged(ConnectionState::Disconnected) => {
            println!("   {} Disconnected", style("✗").red());
        }
        SessionEvent::Error(fault) => {
            println!("   {} {}", style("✗").red(), fault);
        }
        _ => {}
    }
}

async fn chat(retries: u32) -> anyhow::Result<()> {
    let config = load_config()?;
    let session = GatewaySession::new(config.gateway);
    let mut events = session.subscribe();

    connect_with_retry(&session, retries)
        .await
        .context("Failed to connect to gateway")?;

    println!();
    println!("   {} Connected", style("✓").green());
    println!("   {}", style("Commands:").dim());
    println!("   {}  - Exit chat", style("/quit").yellow());
    println!("   {} - Ask for gateway status", style("/status").yellow());
    println!("   {} - Reload recent history", style("/history").yellow());
    println!();

    session.fetch_history().await?;

    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => print_event(event),
                Err(broadcast::error::RecvError::Lagged(n)) => debug!("Skipped {} events", n),
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let result = match input {
            "/quit" | "/exit" => break,
            "/status" => session.check_status().await,
            "/history" => session.fetch_history().await,
            _ => session.send_message(input).await,
        };
        // Failures are also reported through the event stream
        if let Err(e) = result {
            debug!("Command failed: {}", e);
        }
    }

    session.disconnect().await;
    printer.abort();
    println!("{} Goodbye!", style("👋").bold());
    Ok(())
}

async fn gateway_status() -> anyhow::Result<()> {
    let config = load_config()?;

    println!();
    println!("{}", style("📊 Gateway Status").cyan().bold());
    println!();

    let session = GatewaySession::new(config.gateway);
    let mut events = session.subscribe();

    if let Err(e) = session.connect().await {
        println!("   {} Gateway: {}", style("✗").red(), e);
        return Ok(());
    }
    println!("   {} Gateway connected", style("✓").green());

    session.check_status().await?;
    let agent = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(SessionEvent::AgentNameChanged(name)) => return Some(name),
                Ok(SessionEvent::ConnectionChanged(ConnectionState::Disconnected)) => return None,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .await
    .ok()
    .flatten();

    match agent {
        Some(name) => println!("      └─ Agent: {}", style(name).cyan()),
        None => println!("      └─ Agent: {}", style("no status reply").dim()),
    }

    session.disconnect().await;

    if config.knowledge_graph.is_configured() {
        let client = KnowledgeGraphClient::new(&config.knowledge_graph)?;
        match client.stats().await {
            Ok(_) => println!("   {} Knowledge graph reachable", style("✓").green()),
            Err(e) => println!("   {} Knowledge graph: {}", style("✗").red(), e),
        }
    }

    println!();
    Ok(())
}

// ============================================================================
// Knowledge graph
// ============================================================================

fn entity_filter(raw: &str) -> anyhow::Result<EntityTypeFilter> {
    EntityTypeFilter::ALL
        .into_iter()
        .find(|f| f.label().eq_ignore_ascii_case(raw) || f.api_value() == Some(raw))
        .with_context(|| format!("Unknown entity type '{}'", raw))
}

fn task_filter(raw: &str) -> anyhow::Result<TaskFilter> {
    TaskFilter::ALL
        .into_iter()
        .find(|f| f.label().eq_ignore_ascii_case(raw) || f.api_value() == Some(raw))
        .with_context(|| format!("Unknown task status '{}'", raw))
}

fn print_entity_line(entity: &Entity) {
    println!(
        "   {} {} {}",
        style(format!("[{}]", entity.entity_type)).dim(),
        style(&entity.name).cyan(),
        entity.summary.as_deref().unwrap_or("")
    );
}

fn print_task_line(task: &AgentTask) {
    let status = if task.is_completed() {
        style(task.status.as_str()).green()
    } else {
        style(task.status.as_str()).yellow()
    };
    println!(
        "   {} {} {}",
        status,
        task.name,
        style(task.priority.as_deref().unwrap_or("medium")).dim()
    );
}

async fn knowledge_graph(action: KgAction) -> anyhow::Result<()> {
    let config = load_config()?;
    if !config.knowledge_graph.is_configured() {
        bail!("Knowledge graph URL is not set; run `clawlink config set kg.url <URL>`");
    }
    let client = KnowledgeGraphClient::new(&config.knowledge_graph)?;

    match action {
        KgAction::Stats => {
            let stats = client.stats().await?;
            let rows = [
                ("Entities", stats.entity_count),
                ("Facts", stats.fact_count),
                ("Relationships", stats.relationship_count),
                ("Events", stats.event_count),
                ("Tasks", stats.task_count),
            ];
            for (label, count) in rows {
                println!("   {:<14} {}", label, style(count.unwrap_or(0)).cyan());
            }
        }
        KgAction::Entities { entity_type } => {
            let filter = match entity_type {
                Some(raw) => entity_filter(&raw)?,
                None => EntityTypeFilter::All,
            };
            for entity in client.entities(filter.api_value()).await? {
                print_entity_line(&entity);
            }
        }
        KgAction::Entity { name } => {
            let entity = client.entity(&name).await?;
            print_entity_line(&entity);
            for fact in entity.facts.iter().flatten() {
                println!("      └─ {}: {}", fact.key, fact.value);
            }
            for rel in entity.relationships.iter().flatten() {
                println!(
                    "      └─ {} {} {}",
                    rel.source_entity.as_deref().unwrap_or("?"),
                    style(&rel.relation_type).yellow(),
                    rel.target_entity.as_deref().unwrap_or("?")
                );
            }
            for task in entity.tasks.iter().flatten() {
                print_task_line(task);
            }
        }
        KgAction::Tasks { status } => {
            let filter = match status {
                Some(raw) => task_filter(&raw)?,
                None => TaskFilter::All,
            };
            let mut tasks = client.tasks(filter.api_value()).await?;
            tasks.sort_by(|a, b| b.priority_level().cmp(&a.priority_level()));
            for task in &tasks {
                print_task_line(task);
            }
        }
        KgAction::Relationships { entity } => {
            for rel in client.relationships(&entity).await? {
                println!(
                    "   {} {} {}",
                    rel.source_entity.as_deref().unwrap_or(&entity),
                    style(&rel.relation_type).yellow(),
                    rel.target_entity.as_deref().unwrap_or("?")
                );
            }
        }
        KgAction::Graph => {
            let graph = client.graph().await?;
            println!(
                "   {} nodes, {} edges",
                style(graph.nodes.len()).cyan(),
                style(graph.edges.len()).cyan()
            );
        }
        KgAction::Search { query } => {
            let results = client.search(&query).await?;
            if results.is_empty() {
                println!("   {} No results", style("ℹ").blue());
            }
            for result in results {
                println!(
                    "   {} {} {}",
                    style(format!("[{}]", result.result_type)).dim(),
                    style(&result.name).cyan(),
                    result.score.map(|s| format!("{:.2}", s)).unwrap_or_default()
                );
            }
        }
    }
    Ok(())
}

// ============================================================================
// Configuration
// ============================================================================

fn mask_tokens(value: &mut serde_json::Value) {
    if let serde_json::Value::Object(map) = value {
        for (key, entry) in map.iter_mut() {
            if key == "token" {
                if entry.as_str().map_or(false, |s| !s.is_empty()) {
                    *entry = serde_json::Value::String("********".to_string());
                }
            } else {
                mask_tokens(entry);
            }
        }
    }
}

fn manage_config(action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config()?;
            let mut value = serde_json::to_value(&config)?;
            mask_tokens(&mut value);
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        ConfigAction::Path => {
            println!("{}", config_path().display());
        }
        ConfigAction::Set { key, value } => {
            let path = config_path();
            let mut config = if path.exists() {
                load_config_from_path(&path)?
            } else {
                AppConfig::default()
            };
            config.set_value(&key, &value)?;
            save_config(&config, &path)?;
            println!("   {} {} updated in {}", style("✓").green(), key, path.display());
        }
        ConfigAction::Validate => {
            let config = load_config()?;
            let result = validate_config(&config);

            for issue in &result.errors {
                println!("   {} {}: {}", style("✗").red(), issue.path, issue.message);
                if let Some(suggestion) = &issue.suggestion {
                    println!("      └─ {}", style(suggestion).dim());
                }
            }
            for issue in &result.warnings {
                println!("   {} {}: {}", style("⚠").yellow(), issue.path, issue.message);
                if let Some(suggestion) = &issue.suggestion {
                    println!("      └─ {}", style(suggestion).dim());
                }
            }

            if result.valid {
                println!("   {} Configuration is valid", style("✓").green());
            } else {
                warn!("Configuration has {} error(s)", result.errors.len());
                bail!("Configuration is invalid");
            }
        }
    }
    Ok(())
}
