use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use scholar_core::config::{Config, StorageMode};
use scholar_core::{ChatManager, ChatSession};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "scholar")]
#[command(about = "Research assistant that answers from Wikipedia and ArXiv", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    #[arg(short, long, help = "Log tool calls and cache activity")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Start an interactive chat")]
    Chat {
        #[arg(long, help = "Save the conversation to this JSON file after every turn")]
        transcript: Option<PathBuf>,
    },

    #[command(about = "Ask a single question")]
    Ask {
        #[arg(required = true, num_args = 1.., help = "The question")]
        query: Vec<String>,
    },

    #[command(about = "Show current configuration")]
    Show,

    #[command(about = "Model management commands")]
    Model {
        #[command(subcommand)]
        command: ModelCommands,
    },

    #[command(about = "Document cache commands")]
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
}

#[derive(Subcommand)]
enum ModelCommands {
    #[command(about = "Show current model")]
    Show,

    #[command(about = "Set the LLM model")]
    Set {
        #[arg(help = "Model name (e.g., 'llama-3.1-8b-instant' or 'llama3.2:latest')")]
        model: String,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    #[command(about = "Show how many documents each cache holds")]
    Stats,

    #[command(about = "Delete every cached document")]
    Clear {
        #[arg(short, long, help = "Do not ask for confirmation")]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Chat { transcript } => chat(&cli.config, transcript).await,
        Commands::Ask { query } => ask(&cli.config, &query.join(" ")).await,
        Commands::Show => show_config(&cli.config),
        Commands::Model { command } => match command {
            ModelCommands::Show => show_model(&cli.config),
            ModelCommands::Set { model } => set_model(&cli.config, &model),
        },
        Commands::Cache { command } => match command {
            CacheCommands::Stats => cache_stats(&cli.config).await,
            CacheCommands::Clear { yes } => cache_clear(&cli.config, yes).await,
        },
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "scholar_core=info,scholar_tools=info"
    } else {
        "scholar_core=warn,scholar_tools=warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Loads and validates configuration; nothing is asked before this passes.
async fn start_assistant(config_path: &Path) -> Result<ChatManager> {
    let config = Config::resolve(config_path).context("Failed to load config")?;
    config.validate()?;
    scholar_tools::build_research_assistant(config).await
}

async fn ask(config_path: &Path, query: &str) -> Result<()> {
    let manager = start_assistant(config_path).await?;
    let answer = manager.query(query).await?;
    println!("{}", answer);
    Ok(())
}

async fn chat(config_path: &Path, transcript: Option<PathBuf>) -> Result<()> {
    let manager = start_assistant(config_path).await?;
    let transcript = transcript.or_else(|| {
        manager
            .config()
            .chat
            .transcript_path
            .as_ref()
            .map(PathBuf::from)
    });

    let mut session = match &transcript {
        Some(path) if path.exists() => {
            let session = ChatSession::load(path)?;
            println!(
                "{} Resumed {} turns from {}",
                "→".blue(),
                session.len(),
                path.display()
            );
            session
        }
        _ => ChatSession::new(),
    };

    println!("{}", "Research Assistant".bold().green());
    println!(
        "Ask about anything on Wikipedia or ArXiv. Commands: {}, {}, {}",
        "/history".cyan(),
        "/clear".cyan(),
        "exit".cyan()
    );
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", "Human:".bold().blue());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();

        match input {
            "" => continue,
            "exit" | "quit" => break,
            "/history" => {
                if session.is_empty() {
                    println!("{}", "No history yet.".yellow());
                } else {
                    println!("{}", session.render());
                }
                continue;
            }
            "/clear" => {
                session.clear();
                println!("{}", "History cleared.".yellow());
                continue;
            }
            _ => {}
        }

        println!("{}", "Thinking...".dimmed());
        match manager.ask(&mut session, input).await {
            Ok(answer) => println!("{} {}\n", "AI:".bold().green(), answer),
            Err(e) => println!("{} {:#}\n", "Error:".bold().red(), e),
        }

        if let Some(path) = &transcript {
            if let Err(e) = session.save(path) {
                warn!(error = %e, "Failed to save transcript");
            }
        }
    }

    Ok(())
}

fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    format!("{}****", visible)
}

fn show_config(config_path: &Path) -> Result<()> {
    let config = Config::resolve(config_path).context("Failed to load config")?;

    println!("{}", "Current Configuration:".bold().green());
    println!();
    println!("{}", "LLM:".bold());
    println!("  Provider:       {}", config.llm.provider.as_str());
    println!("  Model:          {}", config.llm.model.cyan());
    println!("  Base URL:       {}", config.llm.base_url());
    println!("  Temperature:    {}", config.llm.temperature);
    println!(
        "  API Key:        {}",
        config
            .llm
            .api_key
            .as_deref()
            .map(mask_secret)
            .unwrap_or_else(|| "(not set)".red().to_string())
    );
    println!();
    println!("{}", "Embeddings:".bold());
    println!("  Model:          {}", config.embedding.model.cyan());
    println!("  Base URL:       {}", config.embedding.base_url);
    println!();
    println!("{}", "Storage:".bold());
    match &config.storage.storage_mode {
        StorageMode::Embedded { path } => println!("  Embedded:       {}", path),
        StorageMode::Grpc { url } => println!("  Qdrant:         {}", url),
        StorageMode::Memory => println!("  In memory (not persisted)"),
    }
    if let Some(min_score) = config.storage.min_score {
        println!("  Min score:      {}", min_score);
    }
    println!();
    println!("{}", "Agent:".bold());
    println!("  Max docs:       {}", config.retrieval.max_docs);
    println!("  Max iterations: {}", config.agent.max_iterations);
    println!("  Early stopping: {:?}", config.agent.early_stopping);

    Ok(())
}

fn show_model(config_path: &Path) -> Result<()> {
    let config = Config::resolve(config_path).context("Failed to load config")?;

    println!("{}: {}", "Current model".bold(), config.llm.model.cyan());
    Ok(())
}

/// Rewrites `llm.model` in the YAML document, creating the file or section
/// when missing.
fn update_model(content: &str, model: &str) -> Result<String> {
    let mut config: serde_yaml::Value = if content.trim().is_empty() {
        serde_yaml::Value::Mapping(Default::default())
    } else {
        serde_yaml::from_str(content).context("Failed to parse config")?
    };

    let root = config
        .as_mapping_mut()
        .context("Config file is not a YAML mapping")?;
    let llm = root
        .entry(serde_yaml::Value::String("llm".to_string()))
        .or_insert_with(|| serde_yaml::Value::Mapping(Default::default()));
    let llm_map = llm
        .as_mapping_mut()
        .context("`llm` section is not a YAML mapping")?;
    llm_map.insert(
        serde_yaml::Value::String("model".to_string()),
        serde_yaml::Value::String(model.to_string()),
    );

    serde_yaml::to_string(&config).context("Failed to serialize config")
}

fn set_model(config_path: &Path, model: &str) -> Result<()> {
    let content = if config_path.exists() {
        std::fs::read_to_string(config_path).context("Failed to read config file")?
    } else {
        String::new()
    };

    let updated_content = update_model(&content, model)?;
    std::fs::write(config_path, updated_content).context("Failed to write config file")?;

    println!("{} Model updated to: {}", "✓".green().bold(), model.cyan());

    Ok(())
}

async fn cache_stats(config_path: &Path) -> Result<()> {
    let config = Config::resolve(config_path).context("Failed to load config")?;
    let cache = scholar_tools::open_cache(&config).await?;

    println!("{}", "Document cache:".bold().green());
    for collection in cache.collections() {
        let count = collection.count().await?;
        println!("  {:<12} {} documents", collection.name().cyan(), count);
    }
    Ok(())
}

async fn cache_clear(config_path: &Path, yes: bool) -> Result<()> {
    if !yes {
        print!("Delete every cached Wikipedia and ArXiv document? [y/N] ");
        std::io::stdout().flush()?;

        let mut answer = String::new();
        BufReader::new(tokio::io::stdin())
            .read_line(&mut answer)
            .await?;
        if !matches!(answer.trim(), "y" | "Y" | "yes") {
            println!("Aborted.");
            return Ok(());
        }
    }

    let config = Config::resolve(config_path).context("Failed to load config")?;
    let cache = scholar_tools::open_cache(&config).await?;
    for collection in cache.collections() {
        collection.clear().await?;
    }

    println!("{} Cache cleared", "✓".green().bold());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_model_existing_section() {
        let yaml = "llm:\n  provider: groq\n  model: old\nagent:\n  max_iterations: 5\n";
        let updated = update_model(yaml, "llama-3.3-70b-versatile").unwrap();
        let config: Config = serde_yaml::from_str(&updated).unwrap();

        assert_eq!(config.llm.model, "llama-3.3-70b-versatile");
        assert_eq!(config.agent.max_iterations, 5);
    }

    #[test]
    fn test_update_model_empty_file() {
        let updated = update_model("", "llama3.2:latest").unwrap();
        let config: Config = serde_yaml::from_str(&updated).unwrap();
        assert_eq!(config.llm.model, "llama3.2:latest");
    }

    #[test]
    fn test_set_model_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        set_model(&path, "mixtral").unwrap();
        assert_eq!(Config::load(&path).unwrap().llm.model, "mixtral");
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("gsk_abcdef123"), "gsk_****");
        assert_eq!(mask_secret("ab"), "ab****");
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from(["scholar", "-v", "ask", "what", "is", "BERT?"]).unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Ask { query } => assert_eq!(query.join(" "), "what is BERT?"),
            _ => panic!("expected ask"),
        }
    }
}
