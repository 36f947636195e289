//! TrialScout - clinical trial questions answered from ClinicalTrials.gov
//!
//! A CLI tool that uses Ollama with tool-calling to query the
//! ClinicalTrials.gov registry and assemble structured answers.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (connection, config, model failure, etc.)

mod agent;
mod analysis;
mod cli;
mod config;
mod models;
mod registry;
mod report;
mod session;

use agent::{AgentConfig, OllamaOracle, OracleConfig, ReasoningOracle, ToolExecutor, TrialsAgent};
use anyhow::{Context, Result};
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE};
use indicatif::{ProgressBar, ProgressStyle};
use registry::{HttpRegistry, RegistryClient, RegistryTransport};
use session::SessionLogger;
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("TrialScout v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .trialscout.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml()?;
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to customize the model, registry endpoint and session logging.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: failed to set tracing subscriber: {}", e);
    }
}

/// Build the agent from configuration and answer one question or run the shell.
async fn run(args: Args) -> Result<()> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let transport = HttpRegistry::new(&config.registry.base_url, config.registry.timeout_seconds)
        .context("Failed to create registry client")?;

    let oracle = OllamaOracle::new(OracleConfig {
        ollama_url: config.model.ollama_url.clone(),
        model_name: config.model.name.clone(),
        temperature: config.model.temperature,
        timeout_seconds: config.model.timeout_seconds,
    })?;

    let agent_config = AgentConfig {
        max_context_messages: config.session.max_context_messages,
    };
    let mut agent = TrialsAgent::new(
        agent_config,
        oracle,
        ToolExecutor::new(RegistryClient::new(transport)),
    );

    if config.session.enabled {
        match SessionLogger::new(&config.session.log_dir) {
            Ok(session) => agent = agent.with_session(session),
            Err(e) => warn!("Session logging disabled: {:#}", e),
        }
    }

    match args.question() {
        Some(question) => ask(&mut agent, question, &args).await,
        None => run_shell(&mut agent, &config, &args).await,
    }
}

fn spinner(args: &Args) -> Option<ProgressBar> {
    if args.quiet || args.format == OutputFormat::Json {
        return None;
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message("Consulting ClinicalTrials.gov...");
    pb.enable_steady_tick(Duration::from_millis(120));
    Some(pb)
}

/// Answer one question and print the result.
async fn ask<O, T>(agent: &mut TrialsAgent<O, T>, question: &str, args: &Args) -> Result<()>
where
    O: ReasoningOracle,
    T: RegistryTransport,
{
    if args.format == OutputFormat::Text {
        println!("\n🤔 Question: {}", question);
    }

    let progress = spinner(args);
    let result = agent.run(question).await;
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }
    let turn = result?;

    match args.format {
        OutputFormat::Json => {
            println!("{}", report::generate_json_reply(&turn.reply)?);
        }
        OutputFormat::Text => {
            if !args.quiet {
                for executed in &turn.tool_calls {
                    print!("{}", report::render_tool_call(&executed.call));
                }
            }
            println!("{}", report::render_reply(&turn.reply));
        }
    }

    Ok(())
}

/// Interactive shell with conversation memory.
async fn run_shell<O, T>(agent: &mut TrialsAgent<O, T>, config: &Config, args: &Args) -> Result<()>
where
    O: ReasoningOracle,
    T: RegistryTransport,
{
    let rule = "=".repeat(60);
    println!("{}", rule);
    println!("🏥 TrialScout - Clinical Trials Feasibility Assistant");
    println!("{}", rule);
    println!("Ask questions about clinical trials from ClinicalTrials.gov");
    println!("   Model: {}", config.model.name);
    println!("Commands: 'exit' to leave, 'clear' to reset memory\n");

    if let Some(session) = agent.session() {
        println!("📝 Logging to: {}\n", session.session_file().display());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!(">>> ");
        std::io::stdout().flush().context("Failed to flush stdout")?;

        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            println!("\nGoodbye! 👋");
            break;
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input.to_lowercase().as_str() {
            "exit" | "quit" | "q" => {
                println!("Goodbye! 👋");
                break;
            }
            "clear" => {
                agent.clear_memory();
                println!("🧹 Memory cleared!\n");
                continue;
            }
            _ => {}
        }

        // errors end the question, not the shell
        if let Err(e) = ask(agent, input, args).await {
            error!("Question failed: {:#}", e);
            println!("\n❌ Error: {:#}\n", e);
        }

        println!("{}", "-".repeat(60));
    }

    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
