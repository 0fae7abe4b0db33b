#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::assigning_clones,
    clippy::bool_to_int_with_if,
    clippy::case_sensitive_file_extension_comparisons,
    clippy::cast_possible_wrap,
    clippy::doc_markdown,
    clippy::field_reassign_with_default,
    clippy::float_cmp,
    clippy::implicit_clone,
    clippy::items_after_statements,
    clippy::map_unwrap_or,
    clippy::manual_let_else,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::needless_pass_by_value,
    clippy::needless_raw_string_hashes,
    clippy::redundant_closure_for_method_calls,
    clippy::similar_names,
    clippy::single_match_else,
    clippy::struct_field_names,
    clippy::too_many_lines,
    clippy::uninlined_format_args,
    clippy::unused_self,
    clippy::cast_precision_loss,
    clippy::unnecessary_cast,
    clippy::unnecessary_lazy_evaluations,
    clippy::unnecessary_literal_bound,
    clippy::unnecessary_map_or,
    clippy::unnecessary_wraps,
    dead_code
)]

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

fn parse_temperature(s: &str) -> std::result::Result<f64, String> {
    let t: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if !(0.0..=2.0).contains(&t) {
        return Err("temperature must be between 0.0 and 2.0".to_string());
    }
    Ok(t)
}

mod agent;
mod checkpoint;
mod client;
mod config;
mod graph;
mod providers;
mod tools;

use agent::{AgentRoster, LlmClassifier, LoopLimits, QueryClassifier};
use client::{ChatClient, ConsoleIo};
use config::Config;
use graph::{ConversationGraph, RunOutcome};
use providers::Provider;
use tools::ToolContext;

// Re-export so binary modules can use crate::<CommandEnum> while keeping a single source of truth.
pub use routebot::ThreadCommands;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CompletionShell {
    #[value(name = "bash")]
    Bash,
    #[value(name = "fish")]
    Fish,
    #[value(name = "zsh")]
    Zsh,
    #[value(name = "powershell")]
    PowerShell,
    #[value(name = "elvish")]
    Elvish,
}

/// `routebot` - one router, four specialist agents, a human in the loop.
#[derive(Parser, Debug)]
#[command(name = "routebot")]
#[command(author = "theonlyhennygod")]
#[command(version)]
#[command(about = "Multi-agent chatbot with human feedback.", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the interactive chat loop
    #[command(long_about = "\
Start the interactive chat loop.

Each query is classified as academic, news, shopping or general and \
answered by the matching agent. After every answer you are asked \
whether it helped; answering 'no' lets you add a clarification and \
the agent tries again. Type 'exit' to quit.

Examples:
  routebot chat                                  # interactive session
  routebot chat -m \"Summarize my notes on TCP\"   # single query
  routebot chat --thread research -p openai --model gpt-4o-mini")]
    Chat {
        /// Single query mode (don't enter the read loop)
        #[arg(short, long)]
        message: Option<String>,

        /// Conversation thread id; defaults to config conversation.default_thread_id
        #[arg(long, conflicts_with = "new_thread")]
        thread: Option<String>,

        /// Start on a fresh, randomly named thread
        #[arg(long)]
        new_thread: bool,

        /// Provider to use (gemini, openai, openrouter, custom:<URL>)
        #[arg(short, long)]
        provider: Option<String>,

        /// Model to use
        #[arg(long)]
        model: Option<String>,

        /// Temperature (0.0 - 2.0); defaults to config default_temperature
        #[arg(short, long, value_parser = parse_temperature)]
        temperature: Option<f64>,
    },

    /// Resume a suspended thread with a single answer
    #[command(long_about = "\
Resume a suspended thread with a single answer.

Feeds the answer to the thread's pending question (satisfaction check \
or clarification request) and prints what happens next: either the \
next question or the final response.

Examples:
  routebot resume --thread 1 yes
  routebot resume --thread 1 no
  routebot resume --thread 1 \"focus on battery life\"")]
    Resume {
        /// Thread id to resume
        #[arg(long)]
        thread: String,

        /// Answer to the pending question
        answer: String,
    },

    /// Print the category the router would pick for a query
    Classify {
        /// Query to classify
        query: String,
    },

    /// Inspect and purge conversation threads
    #[command(long_about = "\
Inspect and purge conversation threads.

Every thread is checkpointed after each step so it can be resumed \
later. Use these commands to see where a thread stopped or to delete it.

Examples:
  routebot threads list
  routebot threads show 1
  routebot threads delete 1 --yes")]
    Threads {
        #[command(subcommand)]
        thread_command: ThreadCommands,
    },

    /// Show system status (full details)
    Status,

    /// List supported AI providers
    Providers,

    /// Manage configuration
    #[command(long_about = "\
Manage routebot configuration.

Use 'schema' to dump the full JSON Schema for the config file, which \
documents every available key, type, and default value.

Examples:
  routebot config schema              # print JSON Schema to stdout
  routebot config schema > schema.json")]
    Config {
        #[command(subcommand)]
        config_command: ConfigCommands,
    },

    /// Generate shell completion script to stdout
    #[command(long_about = "\
Generate shell completion scripts for `routebot`.

The script is printed to stdout so it can be sourced directly:

Examples:
  source <(routebot completions bash)
  routebot completions zsh > ~/.zfunc/_routebot
  routebot completions fish > ~/.config/fish/completions/routebot.fish")]
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Dump the full configuration JSON Schema to stdout
    Schema,
}

/// Build the shared provider from config plus CLI overrides.
fn build_provider(config: &Config, provider_override: Option<&str>) -> Result<Arc<dyn Provider>> {
    let name = provider_override.unwrap_or_else(|| config.provider_name());
    let provider = providers::create_provider_with_url(
        name,
        config.api_key.as_deref(),
        config.api_url.as_deref(),
    )?;
    Ok(Arc::from(provider))
}

/// Composition root: provider, classifier, agents and checkpoint store.
fn build_graph(
    config: &Config,
    provider: Arc<dyn Provider>,
    model: &str,
    temperature: f64,
) -> Result<ConversationGraph> {
    let classifier = Arc::new(LlmClassifier::new(provider.clone(), model, temperature));
    let ctx = ToolContext {
        provider,
        model: model.to_string(),
        temperature,
        product_catalog_path: config.tools.catalog_path(&config.workspace_dir),
    };
    let limits = LoopLimits::new(
        config.agent.max_tool_iterations,
        config.agent.max_tool_output_chars,
    );
    let roster = AgentRoster::from_provider(&ctx, limits);
    let store = checkpoint::create_checkpoint_store(&config.checkpoint, &config.workspace_dir)?;
    Ok(ConversationGraph::new(classifier, roster, store))
}

fn print_outcome(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Interrupted { request, .. } => {
            if let graph::InterruptRequest::SatisfactionCheck { response, .. } = request {
                println!("{response}\n");
            }
            println!("{}", request.message());
        }
        RunOutcome::Completed(state) => println!("{}", state.response),
    }
}

#[tokio::main]
#[allow(clippy::too_many_lines)]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(config_dir) = &cli.config_dir {
        if config_dir.trim().is_empty() {
            bail!("--config-dir cannot be empty");
        }
        std::env::set_var("ROUTEBOT_CONFIG_DIR", config_dir);
    }

    // Completions must remain stdout-only and should not load config or initialize logging.
    // This avoids warnings/log lines corrupting sourced completion scripts.
    if let Commands::Completions { shell } = &cli.command {
        let mut stdout = std::io::stdout().lock();
        write_shell_completion(*shell, &mut stdout)?;
        return Ok(());
    }

    // Respects RUST_LOG. The chat loop defaults to WARN so log lines stay out of the conversation.
    let default_level = if matches!(cli.command, Commands::Chat { .. }) {
        "warn"
    } else {
        "info"
    };
    let subscriber = fmt::Subscriber::builder()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    // All other commands need config loaded first (env overrides and validation included)
    let config = Config::load_or_init().await?;

    match cli.command {
        Commands::Completions { .. } => unreachable!(),

        Commands::Chat {
            message,
            thread,
            new_thread,
            provider,
            model,
            temperature,
        } => {
            let provider = build_provider(&config, provider.as_deref())?;
            let model = model.unwrap_or_else(|| config.model_name().to_string());
            let temperature = temperature.unwrap_or(config.default_temperature);
            let graph = build_graph(&config, provider, &model, temperature)?;

            let thread_id = if new_thread {
                uuid::Uuid::new_v4().to_string()
            } else {
                thread.unwrap_or_else(|| config.conversation.default_thread_id.clone())
            };
            info!(thread_id = %thread_id, model = %model, "Starting chat");

            let client = ChatClient::new(graph, &thread_id);
            let mut io = ConsoleIo::new();
            match message {
                Some(query) => client.process_query(&query, &mut io).await.map(|_| ()),
                None => client.run(&mut io).await,
            }
        }

        Commands::Resume { thread, answer } => {
            let provider = build_provider(&config, None)?;
            let graph = build_graph(
                &config,
                provider,
                config.model_name(),
                config.default_temperature,
            )?;
            let outcome = graph
                .resume(&thread, &answer)
                .await
                .with_context(|| format!("Failed to resume thread '{thread}'"))?;
            print_outcome(&outcome);
            Ok(())
        }

        Commands::Classify { query } => {
            let provider = build_provider(&config, None)?;
            let classifier =
                LlmClassifier::new(provider, config.model_name(), config.default_temperature);
            println!("{}", classifier.classify(&query).await);
            Ok(())
        }

        Commands::Threads { thread_command } => {
            checkpoint::handle_thread_command(thread_command, &config).await
        }

        Commands::Status => {
            println!("🤖 routebot Status");
            println!();
            println!("Version:     {}", env!("CARGO_PKG_VERSION"));
            println!("Workspace:   {}", config.workspace_dir.display());
            println!("Config:      {}", config.config_path.display());
            println!();
            println!("🔌 Provider:      {}", config.provider_name());
            println!("   Model:         {}", config.model_name());
            println!("   Temperature:   {}", config.default_temperature);
            println!(
                "💾 Checkpoints:   {} ({})",
                config.checkpoint.backend,
                checkpoint::database_path(&config.checkpoint, &config.workspace_dir).display()
            );
            println!(
                "🧵 Thread:        {}",
                config.conversation.default_thread_id
            );
            println!();
            println!("Agents:");
            println!(
                "  Max tool iterations:  {}",
                config.agent.max_tool_iterations
            );
            println!(
                "  Max tool output:      {} chars",
                config.agent.max_tool_output_chars
            );
            println!(
                "  Product catalog:      {}",
                config
                    .tools
                    .catalog_path(&config.workspace_dir)
                    .display()
            );

            Ok(())
        }

        Commands::Providers => {
            let providers = providers::list_providers();
            let current = config.provider_name().trim().to_ascii_lowercase();
            println!("Supported providers ({} total):\n", providers.len());
            println!("  ID (use in config)  DESCRIPTION");
            println!("  ─────────────────── ───────────");
            for p in &providers {
                let is_active = p.name.eq_ignore_ascii_case(&current)
                    || p.aliases
                        .iter()
                        .any(|alias| alias.eq_ignore_ascii_case(&current));
                let marker = if is_active { " (active)" } else { "" };
                let aliases = if p.aliases.is_empty() {
                    String::new()
                } else {
                    format!("  (aliases: {})", p.aliases.join(", "))
                };
                println!("  {:<19} {}{}{}", p.name, p.display_name, marker, aliases);
            }
            println!("\n  custom:<URL>        Any OpenAI-compatible endpoint");
            Ok(())
        }

        Commands::Config { config_command } => match config_command {
            ConfigCommands::Schema => {
                let schema = schemars::schema_for!(config::Config);
                println!(
                    "{}",
                    serde_json::to_string_pretty(&schema).expect("failed to serialize JSON Schema")
                );
                Ok(())
            }
        },
    }
}

fn write_shell_completion<W: Write>(shell: CompletionShell, writer: &mut W) -> Result<()> {
    use clap_complete::generate;
    use clap_complete::shells;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();

    match shell {
        CompletionShell::Bash => generate(shells::Bash, &mut cmd, bin_name.clone(), writer),
        CompletionShell::Fish => generate(shells::Fish, &mut cmd, bin_name.clone(), writer),
        CompletionShell::Zsh => generate(shells::Zsh, &mut cmd, bin_name.clone(), writer),
        CompletionShell::PowerShell => {
            generate(shells::PowerShell, &mut cmd, bin_name.clone(), writer);
        }
        CompletionShell::Elvish => generate(shells::Elvish, &mut cmd, bin_name, writer),
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{CommandFactory, Parser};

    #[test]
    fn cli_definition_has_no_flag_conflicts() {
        Cli::command().debug_assert();
    }

    #[test]
    fn completions_cli_parses_supported_shells() {
        for shell in ["bash", "fish", "zsh", "powershell", "elvish"] {
            let cli = Cli::try_parse_from(["routebot", "completions", shell])
                .expect("completions invocation should parse");
            match cli.command {
                Commands::Completions { .. } => {}
                other => panic!("expected completions command, got {other:?}"),
            }
        }
    }

    #[test]
    fn completion_generation_mentions_binary_name() {
        let mut output = Vec::new();
        write_shell_completion(CompletionShell::Bash, &mut output)
            .expect("completion generation should succeed");
        let script = String::from_utf8(output).expect("completion output should be valid utf-8");
        assert!(
            script.contains("routebot"),
            "completion script should reference binary name"
        );
    }

    #[test]
    fn chat_accepts_overrides() {
        let cli = Cli::try_parse_from([
            "routebot", "chat", "-m", "hi", "--thread", "t1", "-p", "openai", "--model", "m",
            "-t", "0.2",
        ])
        .unwrap();
        match cli.command {
            Commands::Chat {
                message,
                thread,
                new_thread,
                provider,
                model,
                temperature,
            } => {
                assert_eq!(message.as_deref(), Some("hi"));
                assert_eq!(thread.as_deref(), Some("t1"));
                assert!(!new_thread);
                assert_eq!(provider.as_deref(), Some("openai"));
                assert_eq!(model.as_deref(), Some("m"));
                assert_eq!(temperature, Some(0.2));
            }
            other => panic!("expected chat command, got {other:?}"),
        }
    }

    #[test]
    fn chat_rejects_out_of_range_temperature() {
        assert!(Cli::try_parse_from(["routebot", "chat", "-t", "2.5"]).is_err());
        assert!(Cli::try_parse_from(["routebot", "chat", "-t", "warm"]).is_err());
    }

    #[test]
    fn chat_thread_and_new_thread_conflict() {
        assert!(Cli::try_parse_from(["routebot", "chat", "--thread", "a", "--new-thread"]).is_err());
    }

    #[test]
    fn resume_requires_thread_and_answer() {
        let cli = Cli::try_parse_from(["routebot", "resume", "--thread", "1", "no"]).unwrap();
        match cli.command {
            Commands::Resume { thread, answer } => {
                assert_eq!(thread, "1");
                assert_eq!(answer, "no");
            }
            other => panic!("expected resume command, got {other:?}"),
        }
        assert!(Cli::try_parse_from(["routebot", "resume", "yes"]).is_err());
    }

    #[test]
    fn threads_subcommands_parse() {
        let cli = Cli::try_parse_from(["routebot", "threads", "delete", "7", "--yes"]).unwrap();
        match cli.command {
            Commands::Threads { thread_command } => assert_eq!(
                thread_command,
                ThreadCommands::Delete {
                    thread_id: "7".into(),
                    yes: true
                }
            ),
            other => panic!("expected threads command, got {other:?}"),
        }
    }
}
