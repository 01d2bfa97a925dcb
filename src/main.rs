use clap::{Parser, Subcommand};
use kimia_chat::commands::{check_collection, run_chat};
use kimia_chat::config::{ConfigError, run_interactive_config, show_config};
use kimia_chat::{ChatError, Result};

#[derive(Parser)]
#[command(name = "kimia-chat")]
#[command(about = "Retrieval-augmented chatbot for KIMIA Assess, backed by Qdrant and OpenAI")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session
    Chat {
        /// Run connectivity diagnostics before the first question
        #[arg(long)]
        verbose: bool,
    },
    /// Check the Qdrant connection and the target collection
    Check {
        /// Create and seed the collection if it does not exist
        #[arg(long)]
        create: bool,
    },
    /// Configure provider secrets
    Config {
        /// Show the resolved configuration
        #[arg(long)]
        show: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Chat { verbose } => run_chat(verbose),
        Commands::Check { create } => check_collection(create),
        Commands::Config { show } => {
            if show {
                show_config()
            } else {
                run_interactive_config()
            }
        }
    };

    if let Err(err) = result {
        if is_configuration_error(&err) {
            // Missing or invalid configuration halts with exit code 1
            // before any provider call.
            eprintln!("❌ {err:#}");
            std::process::exit(1);
        }
        return Err(err.into());
    }

    Ok(())
}

fn is_configuration_error(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause.downcast_ref::<ConfigError>().is_some()
            || matches!(cause.downcast_ref::<ChatError>(), Some(ChatError::Config(_)))
    })
}
